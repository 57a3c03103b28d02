use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::allocate::DEFAULT_SEED;
use crate::error::{AllocationError, EngineResult};
use crate::level::{LevelCatalog, DEFAULT_LEVELS};
use crate::models::ClassSpec;
use crate::promotion::{
    PromotionRule, DEFAULT_FAIL_GRADES, DEFAULT_PASS_GRADES, DEFAULT_PLACEMENT_GRADES,
};

pub const DEFAULT_CLASS_COUNT: usize = 1;
pub const DEFAULT_CLASS_CAPACITY: u32 = 20;

/// Roster header names for the six columns every row must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub level: String,
    pub category: String,
    pub grade: String,
}

impl ColumnMap {
    pub fn required(&self) -> [&str; 6] {
        [
            self.student_id.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.level.as_str(),
            self.category.as_str(),
            self.grade.as_str(),
        ]
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            student_id: "student_id".to_string(),
            first_name: "first_name".to_string(),
            last_name: "last_name".to_string(),
            level: "level".to_string(),
            category: "category".to_string(),
            grade: "grade".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub catalog: Vec<String>,
    pub pass_grades: Vec<String>,
    pub fail_grades: Vec<String>,
    pub placement_grades: Vec<String>,
    pub seed: u64,
    pub columns: ColumnMap,
    /// Classes per target level, in rotation order.
    pub levels: BTreeMap<String, Vec<ClassSpec>>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_LEVELS.iter().map(|level| level.to_string()).collect(),
            pass_grades: DEFAULT_PASS_GRADES.iter().map(|g| g.to_string()).collect(),
            fail_grades: DEFAULT_FAIL_GRADES.iter().map(|g| g.to_string()).collect(),
            placement_grades: DEFAULT_PLACEMENT_GRADES
                .iter()
                .map(|g| g.to_string())
                .collect(),
            seed: DEFAULT_SEED,
            columns: ColumnMap::default(),
            levels: BTreeMap::new(),
        }
    }
}

impl AllocationConfig {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }

    pub fn catalog(&self) -> LevelCatalog {
        LevelCatalog::new(self.catalog.iter().cloned())
    }

    pub fn promotion_rule(&self) -> PromotionRule {
        PromotionRule::new(&self.pass_grades, &self.fail_grades, &self.placement_grades)
    }

    /// Class plan keyed by normalized level names.
    pub fn plan(&self) -> EngineResult<ClassPlan> {
        let catalog = self.catalog();
        let mut levels: BTreeMap<String, Vec<ClassSpec>> = BTreeMap::new();
        for (level, classes) in &self.levels {
            let normalized = catalog.normalize(level);
            if levels.insert(normalized.clone(), classes.clone()).is_some() {
                return Err(AllocationError::InvalidPlan {
                    reason: format!("level {normalized} is configured more than once"),
                });
            }
        }
        let plan = ClassPlan::new(levels);
        plan.validate()?;
        Ok(plan)
    }

    /// The configured plan, or a uniform one over `levels` when the file lists
    /// no classes. A class count or capacity only applies to the uniform plan,
    /// so passing one next to configured classes is an error.
    pub fn plan_or_uniform<I, S>(
        &self,
        levels: I,
        count: Option<usize>,
        capacity: Option<u32>,
    ) -> EngineResult<ClassPlan>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.levels.is_empty() {
            let plan = ClassPlan::uniform(
                levels,
                count.unwrap_or(DEFAULT_CLASS_COUNT),
                capacity.unwrap_or(DEFAULT_CLASS_CAPACITY),
            );
            plan.validate()?;
            return Ok(plan);
        }
        if count.is_some() || capacity.is_some() {
            return Err(AllocationError::InvalidPlan {
                reason: "class count and capacity cannot override classes listed in the configuration"
                    .to_string(),
            });
        }
        self.plan()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPlan {
    levels: BTreeMap<String, Vec<ClassSpec>>,
}

impl ClassPlan {
    pub fn new(levels: BTreeMap<String, Vec<ClassSpec>>) -> Self {
        Self { levels }
    }

    /// `count` classes per level named `{level}.01`, `{level}.02`, ...
    pub fn uniform<I, S>(levels: I, count: usize, capacity: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let levels = levels
            .into_iter()
            .map(|level| {
                let level = level.as_ref().to_string();
                let classes = (1..=count)
                    .map(|index| ClassSpec {
                        name: class_name(&level, index),
                        capacity,
                    })
                    .collect();
                (level, classes)
            })
            .collect();
        Self { levels }
    }

    pub fn levels(&self) -> &BTreeMap<String, Vec<ClassSpec>> {
        &self.levels
    }

    pub fn classes_for(&self, level: &str) -> Option<&[ClassSpec]> {
        self.levels.get(level).map(Vec::as_slice)
    }

    pub fn into_levels(self) -> BTreeMap<String, Vec<ClassSpec>> {
        self.levels
    }

    /// Class names must be unique and must map to distinct file names, case
    /// insensitively, since each class is written to `<file_stem>.csv`.
    pub fn validate(&self) -> EngineResult<()> {
        let mut seen = HashSet::new();
        let mut stems: HashMap<String, String> = HashMap::new();
        for (level, classes) in &self.levels {
            if classes.is_empty() {
                return Err(AllocationError::NoClasses {
                    level: level.clone(),
                });
            }
            for class in classes {
                let name = class.name.trim();
                if name.is_empty() {
                    return Err(AllocationError::InvalidPlan {
                        reason: format!("level {level} has a class without a name"),
                    });
                }
                if class.capacity == 0 {
                    return Err(AllocationError::InvalidPlan {
                        reason: format!("class {name} must have a capacity above zero"),
                    });
                }
                if !seen.insert(name.to_string()) {
                    return Err(AllocationError::InvalidPlan {
                        reason: format!("class name {name} is used more than once"),
                    });
                }
                let stem = file_stem(name);
                if let Some(other) = stems.insert(stem.to_lowercase(), name.to_string()) {
                    return Err(AllocationError::InvalidPlan {
                        reason: format!(
                            "class names {other} and {name} both write to {stem}.csv"
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

pub fn class_name(level: &str, index: usize) -> String {
    format!("{level}.{index:02}")
}

/// File name (without extension) a class list is written under.
pub fn file_stem(class_name: &str) -> String {
    class_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config: AllocationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.catalog, vec!["A1", "A2", "B1", "B2", "C1"]);
        assert_eq!(config.columns, ColumnMap::default());
        assert!(config.promotion_rule().is_pass("b"));
    }

    #[test]
    fn partial_columns_keep_other_defaults() {
        let config: AllocationConfig =
            serde_json::from_str(r#"{"columns": {"level": "Seviyesi"}}"#).unwrap();
        assert_eq!(config.columns.level, "Seviyesi");
        assert_eq!(config.columns.grade, "grade");
    }

    #[test]
    fn plan_normalizes_level_keys() {
        let config: AllocationConfig = serde_json::from_str(
            r#"{"levels": {"a2": [{"name": "A2.01", "capacity": 18}]}}"#,
        )
        .unwrap();
        let plan = config.plan().unwrap();
        let classes = plan.classes_for("A2").unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].capacity, 18);
    }

    #[test]
    fn plan_rejects_levels_configured_twice() {
        let config: AllocationConfig = serde_json::from_str(
            r#"{"levels": {
                "a2": [{"name": "A2.01", "capacity": 18}],
                "A2": [{"name": "A2.02", "capacity": 18}]
            }}"#,
        )
        .unwrap();
        assert!(matches!(
            config.plan(),
            Err(AllocationError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn uniform_plan_only_without_configured_classes() {
        let config = AllocationConfig::default();
        let plan = config.plan_or_uniform(["A2"], None, None).unwrap();
        assert_eq!(plan.classes_for("A2").unwrap()[0].capacity, DEFAULT_CLASS_CAPACITY);
        let plan = config.plan_or_uniform(["A2"], Some(3), Some(12)).unwrap();
        assert_eq!(plan.classes_for("A2").unwrap().len(), 3);
        assert_eq!(plan.classes_for("A2").unwrap()[2].capacity, 12);

        let configured = AllocationConfig {
            levels: ClassPlan::uniform(["B1"], 2, 18).into_levels(),
            ..AllocationConfig::default()
        };
        let plan = configured.plan_or_uniform(["A2"], None, None).unwrap();
        assert!(plan.classes_for("A2").is_none());
        assert_eq!(plan.classes_for("B1").unwrap().len(), 2);
        for (count, capacity) in [(Some(3), None), (None, Some(12))] {
            assert!(matches!(
                configured.plan_or_uniform(["A2"], count, capacity),
                Err(AllocationError::InvalidPlan { .. })
            ));
        }
    }

    #[test]
    fn uniform_plan_uses_numbered_names() {
        let plan = ClassPlan::uniform(["A2", "B1"], 3, 20);
        let names: Vec<&str> = plan
            .classes_for("B1")
            .unwrap()
            .iter()
            .map(|class| class.name.as_str())
            .collect();
        assert_eq!(names, vec!["B1.01", "B1.02", "B1.03"]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_classes() {
        let zero = ClassPlan::new(BTreeMap::from([(
            "A1".to_string(),
            vec![ClassSpec {
                name: "A1.01".to_string(),
                capacity: 0,
            }],
        )]));
        assert!(matches!(
            zero.validate(),
            Err(AllocationError::InvalidPlan { .. })
        ));

        let empty = ClassPlan::new(BTreeMap::from([("A1".to_string(), Vec::new())]));
        assert!(matches!(
            empty.validate(),
            Err(AllocationError::NoClasses { .. })
        ));

        let mut duplicate = ClassPlan::uniform(["A1"], 1, 20).into_levels();
        duplicate.insert(
            "A2".to_string(),
            vec![ClassSpec {
                name: "A1.01".to_string(),
                capacity: 20,
            }],
        );
        assert!(matches!(
            ClassPlan::new(duplicate).validate(),
            Err(AllocationError::InvalidPlan { .. })
        ));
    }

    fn plan_with(names: &[&str]) -> ClassPlan {
        let classes = names
            .iter()
            .map(|name| ClassSpec {
                name: name.to_string(),
                capacity: 20,
            })
            .collect();
        ClassPlan::new(BTreeMap::from([("A2".to_string(), classes)]))
    }

    #[test]
    fn file_stem_replaces_path_characters() {
        assert_eq!(file_stem("A2.01"), "A2.01");
        assert_eq!(file_stem(" Prep/B1:2 "), "Prep_B1_2");
    }

    #[test]
    fn validate_rejects_names_sharing_a_file() {
        match plan_with(&["Prep/1", "Prep_1"]).validate() {
            Err(AllocationError::InvalidPlan { reason }) => {
                assert!(reason.contains("Prep/1"));
                assert!(reason.contains("Prep_1.csv"));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            plan_with(&["a2.01", "A2.01"]).validate(),
            Err(AllocationError::InvalidPlan { .. })
        ));
        assert!(plan_with(&["Prep/1", "Prep/2"]).validate().is_ok());
    }
}

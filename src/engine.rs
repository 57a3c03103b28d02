use std::collections::BTreeMap;

use crate::allocate::{self, DEFAULT_SEED};
use crate::config::{AllocationConfig, ClassPlan};
use crate::error::{AllocationError, EngineResult};
use crate::level::{self, LevelCatalog};
use crate::models::{AllocationResult, GradeOutcome, LevelCount, StudentRecord, Target, Warning};
use crate::promotion::{resolve_target, PromotionRule};
use crate::roster;

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub catalog: LevelCatalog,
    pub rule: PromotionRule,
    pub seed: u64,
}

impl RunSettings {
    pub fn from_config(config: &AllocationConfig) -> Self {
        Self {
            catalog: config.catalog(),
            rule: config.promotion_rule(),
            seed: config.seed,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            catalog: LevelCatalog::default(),
            rule: PromotionRule::default(),
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// One result per target level, in catalog order.
    pub levels: Vec<AllocationResult>,
    /// Students promoted past the last catalog level.
    pub completed: Vec<StudentRecord>,
    pub warnings: Vec<Warning>,
    pub dropped_missing_level: usize,
}

impl RunOutcome {
    pub fn level(&self, name: &str) -> Option<&AllocationResult> {
        self.levels.iter().find(|result| result.level == name)
    }

    pub fn allocated(&self) -> usize {
        self.levels.iter().map(|result| result.demand).sum()
    }
}

/// Normalizes every level and drops rows that have none. Returns the kept
/// rows and how many were dropped.
pub fn prepare(students: Vec<StudentRecord>, catalog: &LevelCatalog) -> (Vec<StudentRecord>, usize) {
    let total = students.len();
    let kept: Vec<StudentRecord> = students
        .into_iter()
        .map(|mut student| {
            student.level = catalog.normalize(&student.level);
            student
        })
        .filter(|student| !level::is_missing(&student.level))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

/// [`prepare`], failing with [`AllocationError::EmptyLevelSet`] when no row
/// has a level.
pub fn prepare_nonempty(
    students: Vec<StudentRecord>,
    catalog: &LevelCatalog,
) -> EngineResult<(Vec<StudentRecord>, usize)> {
    let (kept, dropped) = prepare(students, catalog);
    if kept.is_empty() {
        return Err(AllocationError::EmptyLevelSet);
    }
    Ok((kept, dropped))
}

fn count_levels<'a, I>(levels: I, catalog: &LevelCatalog) -> Vec<LevelCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for level in levels {
        *counts.entry(level).or_default() += 1;
    }
    let mut result: Vec<LevelCount> = counts
        .into_iter()
        .map(|(level, students)| LevelCount {
            level: level.to_string(),
            students,
        })
        .collect();
    result.sort_by(|a, b| catalog.display_order(&a.level, &b.level));
    result
}

/// Current levels of prepared students with their headcounts.
pub fn detected_levels(students: &[StudentRecord], catalog: &LevelCatalog) -> Vec<LevelCount> {
    count_levels(students.iter().map(|s| s.level.as_str()), catalog)
}

/// Splits prepared students by the level they move to. Graduates are
/// returned separately, in roster order.
pub fn partition_by_target(
    students: &[StudentRecord],
    settings: &RunSettings,
) -> (BTreeMap<String, Vec<StudentRecord>>, Vec<StudentRecord>) {
    let mut by_level: BTreeMap<String, Vec<StudentRecord>> = BTreeMap::new();
    let mut completed = Vec::new();
    for student in students {
        match resolve_target(&student.level, &student.grade, &settings.catalog, &settings.rule) {
            Target::Level(target) => by_level.entry(target).or_default().push(student.clone()),
            Target::Graduated => completed.push(student.clone()),
        }
    }
    (by_level, completed)
}

/// Levels students will study at next, with headcounts; graduates excluded.
pub fn target_levels(students: &[StudentRecord], settings: &RunSettings) -> Vec<LevelCount> {
    let (by_level, _) = partition_by_target(students, settings);
    let mut result: Vec<LevelCount> = by_level
        .into_iter()
        .map(|(level, students)| LevelCount {
            level,
            students: students.len(),
        })
        .collect();
    result.sort_by(|a, b| settings.catalog.display_order(&a.level, &b.level));
    result
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeSummary {
    pub pass: usize,
    pub fail: usize,
    pub placement: usize,
    pub unrecognized: usize,
}

pub fn grade_summary(students: &[StudentRecord], rule: &PromotionRule) -> GradeSummary {
    let mut summary = GradeSummary::default();
    for student in students {
        match rule.classify(&student.grade) {
            GradeOutcome::Pass => summary.pass += 1,
            GradeOutcome::Fail => summary.fail += 1,
            GradeOutcome::Placement => summary.placement += 1,
            GradeOutcome::Unrecognized => summary.unrecognized += 1,
        }
    }
    summary
}

/// One full allocation run. Fatal problems abort before any class is filled;
/// everything else comes back as warnings next to a complete result.
pub fn run(
    students: Vec<StudentRecord>,
    plan: &ClassPlan,
    settings: &RunSettings,
) -> EngineResult<RunOutcome> {
    let mut warnings = Vec::new();

    if let Some(duplicates) = roster::find_duplicates(&students) {
        tracing::warn!(%duplicates, "duplicate student ids, every row is still allocated");
        warnings.push(duplicates);
    }

    let (students, dropped) = prepare_nonempty(students, &settings.catalog)?;
    if dropped > 0 {
        tracing::warn!(rows = dropped, "skipping roster rows without a level");
        warnings.push(Warning::MissingLevelRows { rows: dropped });
    }

    for count in detected_levels(&students, &settings.catalog) {
        if !settings.catalog.contains(&count.level) {
            tracing::warn!(level = %count.level, students = count.students, "level not in catalog");
            warnings.push(Warning::UnknownLevel {
                level: count.level,
                students: count.students,
            });
        }
    }

    let (by_level, completed) = partition_by_target(&students, settings);
    let mut order: Vec<String> = by_level.keys().cloned().collect();
    settings.catalog.sort_levels(&mut order);

    plan.validate()?;
    for level in &order {
        if plan.classes_for(level).is_none() {
            return Err(AllocationError::MissingLevelConfig {
                level: level.clone(),
            });
        }
    }

    let mut levels = Vec::with_capacity(order.len());
    for level in order {
        let classes = plan
            .classes_for(&level)
            .ok_or_else(|| AllocationError::MissingLevelConfig {
                level: level.clone(),
            })?;
        let cohort = by_level.get(&level).map(Vec::as_slice).unwrap_or_default();
        let result = allocate::allocate(&level, cohort, classes, settings.seed)?;
        if result.shortfall().is_some() {
            tracing::warn!(
                level = %result.level,
                demand = result.demand,
                capacity = result.capacity,
                "capacity shortfall"
            );
            warnings.push(Warning::CapacityShortfall {
                level: result.level.clone(),
                demand: result.demand,
                capacity: result.capacity,
            });
        }
        levels.push(result);
    }

    if !completed.is_empty() {
        tracing::info!(students = completed.len(), "students completed the final level");
    }

    Ok(RunOutcome {
        levels,
        completed,
        warnings,
        dropped_missing_level: dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassSpec;

    fn student(id: &str, level: &str, grade: &str, category: &str) -> StudentRecord {
        StudentRecord {
            student_id: id.to_string(),
            first_name: format!("Name{id}"),
            last_name: format!("Surname{id}"),
            level: level.to_string(),
            grade: grade.to_string(),
            category: category.to_string(),
            extra: vec![("email".to_string(), format!("{id}@example.com"))],
        }
    }

    fn settings() -> RunSettings {
        RunSettings {
            catalog: LevelCatalog::new(["A1", "A2", "B1"]),
            ..RunSettings::default()
        }
    }

    fn ids_in(result: &AllocationResult) -> Vec<String> {
        let mut ids: Vec<String> = result
            .classes
            .iter()
            .flat_map(|bucket| bucket.students.iter().map(|s| s.student_id.clone()))
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn four_student_scenario() {
        let roster = vec![
            student("1", "A1", "A", "OSYM"),
            student("2", "A1", "F", "OSYM"),
            student("3", "a1", "Placement", "YOS"),
            student("4", "A1", "B", "OSYM"),
        ];
        let plan = ClassPlan::uniform(["A1", "A2"], 2, 2);
        let outcome = run(roster, &plan, &settings()).unwrap();

        let levels: Vec<&str> = outcome.levels.iter().map(|r| r.level.as_str()).collect();
        assert_eq!(levels, vec!["A1", "A2"]);
        assert_eq!(ids_in(outcome.level("A1").unwrap()), vec!["2", "3"]);
        assert_eq!(ids_in(outcome.level("A2").unwrap()), vec!["1", "4"]);
        assert!(outcome.completed.is_empty());
        assert!(outcome.warnings.is_empty());

        for result in &outcome.levels {
            assert_eq!(result.classes.len(), 2);
            for bucket in &result.classes {
                assert_eq!(bucket.headcount(), 1);
            }
        }
    }

    #[test]
    fn graduates_are_kept_aside() {
        let roster = vec![
            student("1", "B1", "A", "OSYM"),
            student("2", "B1", "F", "OSYM"),
        ];
        let plan = ClassPlan::uniform(["B1"], 1, 20);
        let outcome = run(roster, &plan, &settings()).unwrap();
        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.completed[0].student_id, "1");
        assert_eq!(ids_in(outcome.level("B1").unwrap()), vec!["2"]);
        assert_eq!(outcome.allocated(), 1);
    }

    #[test]
    fn rows_without_level_never_reach_classes() {
        let roster = vec![
            student("1", "nan", "A", "OSYM"),
            student("2", "NAN", "F", "OSYM"),
            student("3", "A2", "F", "OSYM"),
        ];
        let plan = ClassPlan::uniform(["A2"], 2, 20);
        let outcome = run(roster, &plan, &settings()).unwrap();
        assert_eq!(outcome.dropped_missing_level, 2);
        assert_eq!(ids_in(outcome.level("A2").unwrap()), vec!["3"]);
        assert!(outcome
            .warnings
            .contains(&Warning::MissingLevelRows { rows: 2 }));
    }

    #[test]
    fn only_missing_levels_is_fatal() {
        let roster = vec![student("1", "nan", "A", "OSYM")];
        let err = run(roster, &ClassPlan::default(), &settings()).unwrap_err();
        assert!(matches!(err, AllocationError::EmptyLevelSet));
    }

    #[test]
    fn prepare_nonempty_keeps_usable_rows() {
        let (kept, dropped) = prepare_nonempty(
            vec![student("1", "a2", "F", "OSYM"), student("2", "", "F", "OSYM")],
            &settings().catalog,
        )
        .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].level, "A2");
        assert_eq!(dropped, 1);

        let err = prepare_nonempty(
            vec![student("1", "NaN", "A", "OSYM")],
            &settings().catalog,
        )
        .unwrap_err();
        assert!(matches!(err, AllocationError::EmptyLevelSet));
        assert!(matches!(
            prepare_nonempty(Vec::new(), &settings().catalog),
            Err(AllocationError::EmptyLevelSet)
        ));
    }

    #[test]
    fn missing_configuration_aborts_run() {
        let roster = vec![student("1", "A1", "A", "OSYM")];
        let plan = ClassPlan::uniform(["A1"], 1, 20);
        let err = run(roster, &plan, &settings()).unwrap_err();
        match err {
            AllocationError::MissingLevelConfig { level } => assert_eq!(level, "A2"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicates_and_shortfall_are_warnings() {
        let roster = vec![
            student("1", "A2", "F", "OSYM"),
            student("1", "A2", "F", "OSYM"),
            student("2", "A2", "F", "YOS"),
        ];
        let plan = ClassPlan::new(BTreeMap::from([(
            "A2".to_string(),
            vec![ClassSpec {
                name: "A2.01".to_string(),
                capacity: 2,
            }],
        )]));
        let outcome = run(roster, &plan, &settings()).unwrap();
        assert_eq!(outcome.allocated(), 3);
        assert!(outcome.warnings.contains(&Warning::DuplicateStudentIds {
            ids: vec!["1".to_string()],
            rows: vec![1, 2],
        }));
        assert!(outcome.warnings.contains(&Warning::CapacityShortfall {
            level: "A2".to_string(),
            demand: 3,
            capacity: 2,
        }));
    }

    #[test]
    fn unknown_levels_stay_and_are_flagged() {
        let roster = vec![student("1", "c2", "A", "OSYM")];
        let plan = ClassPlan::uniform(["C2"], 1, 20);
        let outcome = run(roster, &plan, &settings()).unwrap();
        assert_eq!(ids_in(outcome.level("C2").unwrap()), vec!["1"]);
        assert!(outcome.warnings.contains(&Warning::UnknownLevel {
            level: "C2".to_string(),
            students: 1,
        }));
    }

    #[test]
    fn runs_are_reproducible() {
        let roster: Vec<StudentRecord> = (0..60)
            .map(|id| {
                student(
                    &id.to_string(),
                    ["A1", "A2", "B1"][id % 3],
                    ["A", "F", "Placement", "C"][id % 4],
                    ["OSYM", "YOS", "DGS"][id % 5 % 3],
                )
            })
            .collect();
        let plan = ClassPlan::uniform(["A1", "A2", "B1"], 3, 8);
        let first = run(roster.clone(), &plan, &settings()).unwrap();
        let second = run(roster.clone(), &plan, &settings()).unwrap();
        assert_eq!(first, second);

        let total: usize = first.allocated() + first.completed.len();
        assert_eq!(total, roster.len());
    }

    #[test]
    fn seed_changes_the_permutation_only() {
        let roster: Vec<StudentRecord> = (0..12)
            .map(|id| student(&id.to_string(), "A2", "F", "OSYM"))
            .collect();
        let plan = ClassPlan::uniform(["A2"], 2, 6);
        let default = run(roster.clone(), &plan, &settings()).unwrap();
        let reseeded = run(
            roster,
            &plan,
            &RunSettings {
                seed: 7,
                ..settings()
            },
        )
        .unwrap();
        assert_eq!(ids_in(&default.levels[0]), ids_in(&reseeded.levels[0]));
        assert_eq!(default.levels[0].classes[0].headcount(), 6);
        assert_eq!(reseeded.levels[0].classes[0].headcount(), 6);
    }

    #[test]
    fn grade_summary_counts_each_outcome() {
        let students = vec![
            student("1", "A1", "a", "X"),
            student("2", "A1", "F", "X"),
            student("3", "A1", "placement", "X"),
            student("4", "A1", "W", "X"),
            student("5", "A1", "D", "X"),
        ];
        let summary = grade_summary(&students, &PromotionRule::default());
        assert_eq!(
            summary,
            GradeSummary {
                pass: 2,
                fail: 1,
                placement: 1,
                unrecognized: 1,
            }
        );
    }

    #[test]
    fn target_levels_exclude_graduates() {
        let (prepared, _) = prepare(
            vec![
                student("1", "a1", "A", "X"),
                student("2", "B1", "A", "X"),
                student("3", "A2", "F", "X"),
                student("4", "Z9", "F", "X"),
            ],
            &settings().catalog,
        );
        let targets = target_levels(&prepared, &settings());
        let summary: Vec<(&str, usize)> = targets
            .iter()
            .map(|count| (count.level.as_str(), count.students))
            .collect();
        assert_eq!(summary, vec![("A2", 2), ("Z9", 1)]);

        let detected = detected_levels(&prepared, &settings().catalog);
        assert_eq!(detected[0].level, "A1");
        assert_eq!(detected.last().map(|c| c.level.as_str()), Some("Z9"));
    }
}

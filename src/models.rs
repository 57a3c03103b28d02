use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub level: String,
    pub grade: String,
    pub category: String,
    /// Roster columns outside the required six, in header order.
    pub extra: Vec<(String, String)>,
}

impl StudentRecord {
    pub fn extra_value(&self, column: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassBucket {
    pub name: String,
    pub capacity: u32,
    pub students: Vec<StudentRecord>,
}

impl ClassBucket {
    pub fn headcount(&self) -> usize {
        self.students.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationResult {
    pub level: String,
    /// One bucket per configured class, in rotation order.
    pub classes: Vec<ClassBucket>,
    pub demand: usize,
    pub capacity: u64,
}

impl AllocationResult {
    pub fn bucket(&self, class_name: &str) -> Option<&ClassBucket> {
        self.classes.iter().find(|bucket| bucket.name == class_name)
    }

    /// Students beyond the configured capacity, if any.
    pub fn shortfall(&self) -> Option<u64> {
        let demand = self.demand as u64;
        (demand > self.capacity).then(|| demand - self.capacity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementRecord {
    pub student_id: String,
    pub module_number: u32,
    #[serde(rename = "level")]
    pub resolved_level: String,
    pub class_code: String,
    pub academic_term: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Level(String),
    Graduated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeOutcome {
    Pass,
    Fail,
    Placement,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    DuplicateStudentIds {
        ids: Vec<String>,
        rows: Vec<usize>,
    },
    CapacityShortfall {
        level: String,
        demand: usize,
        capacity: u64,
    },
    MissingLevelRows {
        rows: usize,
    },
    UnknownLevel {
        level: String,
        students: usize,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::DuplicateStudentIds { ids, rows } => write!(
                f,
                "duplicate student ids {} on roster rows {}",
                ids.join(", "),
                rows.iter()
                    .map(|row| row.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Warning::CapacityShortfall {
                level,
                demand,
                capacity,
            } => write!(
                f,
                "level {level} has {demand} students for {capacity} seats; overflow is spread evenly"
            ),
            Warning::MissingLevelRows { rows } => {
                write!(f, "{rows} roster rows without a level were skipped")
            }
            Warning::UnknownLevel { level, students } => write!(
                f,
                "level {level} is not in the catalog; its {students} students keep their level"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCount {
    pub level: String,
    pub students: usize,
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("roster is missing required columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("roster repeats required columns: {}", columns.join(", "))]
    DuplicateColumns { columns: Vec<String> },

    #[error("no levels left in the roster after removing rows without a level")]
    EmptyLevelSet,

    #[error("no class configuration for level {level}")]
    MissingLevelConfig { level: String },

    #[error("level {level} has no classes to allocate into")]
    NoClasses { level: String },

    #[error("invalid class plan: {reason}")]
    InvalidPlan { reason: String },

    #[error("output directory {path} already exists")]
    OutputExists { path: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = std::result::Result<T, AllocationError>;

//! Stratified class allocation for preparatory language programmes.
//!
//! Students are promoted from their current level by grade, grouped by the
//! level they move to, and dealt round-robin into that level's classes so
//! every (grade, category) group is spread evenly.

pub mod allocate;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod level;
pub mod logger;
pub mod models;
pub mod placement;
pub mod promotion;
pub mod report;
pub mod roster;

pub use engine::{run, RunOutcome, RunSettings};
pub use error::{AllocationError, EngineResult};

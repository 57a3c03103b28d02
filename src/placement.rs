use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::level::LevelCatalog;
use crate::models::{AllocationResult, PlacementRecord};

const CLASS_CODE_SEPARATORS: [char; 5] = ['.', '-', '_', '/', ' '];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassCodeStyle {
    /// Part of the class name after the last separator ("A2.03" -> "03").
    #[default]
    Short,
    /// The whole class name.
    Full,
}

/// Suffix after the last separator in a class name; the full name when it has none.
pub fn short_code(class_name: &str) -> &str {
    let name = class_name.trim();
    match name.rfind(|c: char| CLASS_CODE_SEPARATORS.contains(&c)) {
        Some(index) if index + 1 < name.len() => &name[index + 1..],
        _ => name,
    }
}

pub fn class_code(class_name: &str, style: ClassCodeStyle) -> String {
    match style {
        ClassCodeStyle::Short => short_code(class_name).to_string(),
        ClassCodeStyle::Full => class_name.trim().to_string(),
    }
}

/// One record per allocated student: levels in catalog order, then classes
/// in configured order, then students in assignment order.
pub fn flatten(
    results: &[AllocationResult],
    catalog: &LevelCatalog,
    module_number: u32,
    academic_term: &str,
    style: ClassCodeStyle,
) -> Vec<PlacementRecord> {
    let mut ordered: Vec<&AllocationResult> = results.iter().collect();
    ordered.sort_by(|a, b| catalog.display_order(&a.level, &b.level));

    let mut records = Vec::new();
    for result in ordered {
        for bucket in &result.classes {
            let code = class_code(&bucket.name, style);
            for student in &bucket.students {
                records.push(PlacementRecord {
                    student_id: student.student_id.clone(),
                    module_number,
                    resolved_level: result.level.clone(),
                    class_code: code.clone(),
                    academic_term: academic_term.to_string(),
                });
            }
        }
    }
    records
}

use std::fmt::Write;

use chrono::NaiveDate;

use crate::engine::RunOutcome;

#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub generated_on: NaiveDate,
    pub module_number: u32,
    pub academic_term: &'a str,
}

pub fn build_report(context: &ReportContext<'_>, outcome: &RunOutcome) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Class Allocation Report");
    let _ = writeln!(
        output,
        "Generated on {} for module {} of {}",
        context.generated_on, context.module_number, context.academic_term
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{} students placed across {} levels, {} completed the final level.",
        outcome.allocated(),
        outcome.levels.len(),
        outcome.completed.len()
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Levels");

    if outcome.levels.is_empty() {
        let _ = writeln!(output, "No students left to place.");
    }

    for result in &outcome.levels {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} ({} students, {} seats)",
            result.level, result.demand, result.capacity
        );
        for bucket in &result.classes {
            let _ = writeln!(
                output,
                "- {}: {} / {}",
                bucket.name,
                bucket.headcount(),
                bucket.capacity
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Completed");

    if outcome.completed.is_empty() {
        let _ = writeln!(output, "No students completed the final level.");
    } else {
        for student in &outcome.completed {
            let _ = writeln!(
                output,
                "- {} {} ({}, {})",
                student.first_name, student.last_name, student.student_id, student.level
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Warnings");

    if outcome.warnings.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        for warning in &outcome.warnings {
            let _ = writeln!(output, "- {warning}");
        }
    }

    output
}

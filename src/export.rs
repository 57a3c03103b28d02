use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::config::file_stem;
use crate::engine::RunOutcome;
use crate::error::{AllocationError, EngineResult};
use crate::level::LevelCatalog;
use crate::placement::{self, ClassCodeStyle};
use crate::report::{self, ReportContext};
use crate::roster::Roster;

pub const PLACEMENT_HEADERS: [&str; 5] = [
    "student_id",
    "module_number",
    "level",
    "class_code",
    "academic_term",
];

#[derive(Debug, Clone)]
pub struct ExportOptions<'a> {
    pub module_number: u32,
    pub academic_term: &'a str,
    pub code_style: ClassCodeStyle,
    pub generated_on: NaiveDate,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub class_files: usize,
    pub placements: usize,
    pub completed: usize,
}

/// Academic year a date falls in; terms start in September.
pub fn academic_term_for(date: NaiveDate) -> String {
    let start = if date.month() >= 9 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{}-{}", start, start + 1)
}

fn staging_dir(out_dir: &Path) -> EngineResult<PathBuf> {
    let mut name = out_dir
        .file_name()
        .map(|name| name.to_os_string())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} cannot be used as an output directory", out_dir.display()),
            )
        })?;
    name.push(".partial");
    Ok(out_dir.with_file_name(name))
}

/// Writes every export file into `out_dir`. Files are staged next to it and
/// moved into place only once all of them are written.
pub fn write_exports(
    out_dir: &Path,
    roster: &Roster,
    outcome: &RunOutcome,
    catalog: &LevelCatalog,
    options: &ExportOptions<'_>,
) -> EngineResult<ExportSummary> {
    let staging = staging_dir(out_dir)?;
    if out_dir.exists() && !options.force {
        return Err(AllocationError::OutputExists {
            path: out_dir.display().to_string(),
        });
    }

    if staging.exists() {
        if !options.force {
            return Err(AllocationError::OutputExists {
                path: staging.display().to_string(),
            });
        }
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let summary = match write_all(&staging, roster, outcome, catalog, options) {
        Ok(summary) => summary,
        Err(err) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }
    };

    if out_dir.exists() {
        fs::remove_dir_all(out_dir)?;
    }
    fs::rename(&staging, out_dir)?;
    tracing::info!(path = %out_dir.display(), "exports written");
    Ok(summary)
}

fn write_all(
    dir: &Path,
    roster: &Roster,
    outcome: &RunOutcome,
    catalog: &LevelCatalog,
    options: &ExportOptions<'_>,
) -> EngineResult<ExportSummary> {
    let classes_dir = dir.join("classes");
    fs::create_dir_all(&classes_dir)?;

    let mut written = HashSet::new();
    for result in &outcome.levels {
        for bucket in &result.classes {
            let stem = file_stem(&bucket.name);
            if !written.insert(stem.to_lowercase()) {
                return Err(AllocationError::InvalidPlan {
                    reason: format!("class {} would overwrite {stem}.csv", bucket.name),
                });
            }
            let path = classes_dir.join(format!("{stem}.csv"));
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(&roster.headers)?;
            for student in &bucket.students {
                writer.write_record(roster.row(student))?;
            }
            writer.flush()?;
        }
    }

    let records = placement::flatten(
        &outcome.levels,
        catalog,
        options.module_number,
        options.academic_term,
        options.code_style,
    );
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(dir.join("placements.csv"))?;
    writer.write_record(PLACEMENT_HEADERS)?;
    for record in &records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(dir.join("completed.csv"))?;
    writer.write_record(&roster.headers)?;
    for student in &outcome.completed {
        writer.write_record(roster.row(student))?;
    }
    writer.flush()?;

    let context = ReportContext {
        generated_on: options.generated_on,
        module_number: options.module_number,
        academic_term: options.academic_term,
    };
    fs::write(dir.join("report.md"), report::build_report(&context, outcome))?;

    Ok(ExportSummary {
        class_files: written.len(),
        placements: records.len(),
        completed: outcome.completed.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn academic_term_switches_in_september() {
        let august = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();
        let september = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        assert_eq!(academic_term_for(august), "2025-2026");
        assert_eq!(academic_term_for(september), "2026-2027");
    }

    #[test]
    fn staging_dir_sits_next_to_output() {
        let staging = staging_dir(Path::new("/tmp/run/out")).unwrap();
        assert_eq!(staging, PathBuf::from("/tmp/run/out.partial"));
        assert!(staging_dir(Path::new("/")).is_err());
    }
}

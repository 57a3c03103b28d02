use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::config::ColumnMap;
use crate::error::{AllocationError, EngineResult};
use crate::level::MISSING_LEVEL;
use crate::models::{StudentRecord, Warning};

/// Students read from a roster file, plus the header order used to write
/// them back out.
#[derive(Debug, Clone)]
pub struct Roster {
    pub headers: Vec<String>,
    pub columns: ColumnMap,
    pub students: Vec<StudentRecord>,
}

impl Roster {
    /// A student's cells in roster header order. Passthrough cells are taken
    /// by position, so repeated header names keep their own values.
    pub fn row<'a>(&self, student: &'a StudentRecord) -> Vec<&'a str> {
        let mut extra = student.extra.iter().map(|(_, value)| value.as_str());
        self.headers
            .iter()
            .map(|header| {
                required_field(&self.columns, student, header)
                    .unwrap_or_else(|| extra.next().unwrap_or(""))
            })
            .collect()
    }
}

fn required_field<'a>(
    columns: &ColumnMap,
    student: &'a StudentRecord,
    header: &str,
) -> Option<&'a str> {
    let value = if header == columns.student_id {
        &student.student_id
    } else if header == columns.first_name {
        &student.first_name
    } else if header == columns.last_name {
        &student.last_name
    } else if header == columns.level {
        &student.level
    } else if header == columns.category {
        &student.category
    } else if header == columns.grade {
        &student.grade
    } else {
        return None;
    };
    Some(value)
}

pub fn read_roster(path: &Path, columns: &ColumnMap) -> EngineResult<Roster> {
    let file = std::fs::File::open(path)?;
    read_roster_from(file, columns)
}

pub fn read_roster_from<R: Read>(input: R, columns: &ColumnMap) -> EngineResult<Roster> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let missing: Vec<String> = columns
        .required()
        .into_iter()
        .filter(|column| !headers.iter().any(|header| header == column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AllocationError::MissingColumns { columns: missing });
    }

    let repeated: Vec<String> = columns
        .required()
        .into_iter()
        .filter(|column| headers.iter().filter(|header| header == column).count() > 1)
        .map(|column| column.to_string())
        .collect();
    if !repeated.is_empty() {
        return Err(AllocationError::DuplicateColumns { columns: repeated });
    }

    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(position, header)| (header.clone(), position))
        .collect();
    let required = columns.required();

    let mut students = Vec::new();
    for result in reader.records() {
        let record = result?;
        let cell = |column: &str| -> String {
            index
                .get(column)
                .and_then(|position| record.get(*position))
                .unwrap_or("")
                .trim()
                .to_string()
        };

        let mut level = cell(&columns.level);
        if level.is_empty() {
            level = MISSING_LEVEL.to_string();
        }

        let extra = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !required.contains(&header.as_str()))
            .map(|(position, header)| {
                (
                    header.clone(),
                    record.get(position).unwrap_or("").to_string(),
                )
            })
            .collect();

        students.push(StudentRecord {
            student_id: cell(&columns.student_id),
            first_name: cell(&columns.first_name),
            last_name: cell(&columns.last_name),
            level,
            grade: cell(&columns.grade),
            category: cell(&columns.category),
            extra,
        });
    }

    tracing::debug!(rows = students.len(), "roster read");
    Ok(Roster {
        headers,
        columns: columns.clone(),
        students,
    })
}

/// Ids appearing on more than one row, with every offending row (1-based).
pub fn find_duplicates(students: &[StudentRecord]) -> Option<Warning> {
    let mut rows_by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for (position, student) in students.iter().enumerate() {
        let rows = rows_by_id.entry(student.student_id.as_str()).or_default();
        if rows.is_empty() {
            first_seen.push(student.student_id.as_str());
        }
        rows.push(position + 1);
    }

    let mut ids = Vec::new();
    let mut rows = Vec::new();
    for id in first_seen {
        if let Some(found) = rows_by_id.get(id).filter(|found| found.len() > 1) {
            ids.push(id.to_string());
            rows.extend(found.iter().copied());
        }
    }
    rows.sort_unstable();

    (!ids.is_empty()).then_some(Warning::DuplicateStudentIds { ids, rows })
}

/// A roster file with the expected headers and a few sample rows.
pub fn write_template(path: &Path, columns: &ColumnMap) -> EngineResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns.required())?;
    let samples = [
        ["23001", "Ahmet", "Yılmaz", "A1", "ÖSYM", "A"],
        ["23002", "Ayşe", "Demir", "A1", "ÖSYM", "F"],
        ["23003", "John", "Doe", "A2", "YÖS", "Placement"],
        ["23004", "Fatma", "Kaya", "B1", "ÖSYM", "B"],
    ];
    for sample in samples {
        writer.write_record(sample)?;
    }
    writer.flush()?;
    Ok(())
}

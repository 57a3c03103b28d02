use std::collections::HashSet;

use crate::level::LevelCatalog;
use crate::models::{GradeOutcome, Target};

pub const DEFAULT_PASS_GRADES: [&str; 4] = ["A", "B", "C", "D"];
pub const DEFAULT_FAIL_GRADES: [&str; 1] = ["F"];
pub const DEFAULT_PLACEMENT_GRADES: [&str; 1] = ["PLACEMENT"];

/// Grade sets, stored upper-cased. Only the pass set moves a student up.
#[derive(Debug, Clone)]
pub struct PromotionRule {
    pass: HashSet<String>,
    fail: HashSet<String>,
    placement: HashSet<String>,
}

fn grade_set<I, S>(grades: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    grades
        .into_iter()
        .map(|grade| grade.as_ref().trim().to_uppercase())
        .collect()
}

impl PromotionRule {
    pub fn new<P, F, L, S>(pass: P, fail: F, placement: L) -> Self
    where
        P: IntoIterator<Item = S>,
        F: IntoIterator<Item = S>,
        L: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            pass: grade_set(pass),
            fail: grade_set(fail),
            placement: grade_set(placement),
        }
    }

    pub fn is_pass(&self, grade: &str) -> bool {
        self.pass.contains(&grade.trim().to_uppercase())
    }

    pub fn classify(&self, grade: &str) -> GradeOutcome {
        let key = grade.trim().to_uppercase();
        if self.pass.contains(&key) {
            GradeOutcome::Pass
        } else if self.fail.contains(&key) {
            GradeOutcome::Fail
        } else if self.placement.contains(&key) {
            GradeOutcome::Placement
        } else {
            GradeOutcome::Unrecognized
        }
    }
}

impl Default for PromotionRule {
    fn default() -> Self {
        Self::new(
            DEFAULT_PASS_GRADES,
            DEFAULT_FAIL_GRADES,
            DEFAULT_PLACEMENT_GRADES,
        )
    }
}

/// Level a student studies at next. Passing moves one catalog step up, past
/// the last level the student graduates; every other grade keeps the level.
pub fn resolve_target(
    current_level: &str,
    grade: &str,
    catalog: &LevelCatalog,
    rule: &PromotionRule,
) -> Target {
    if !rule.is_pass(grade) {
        return Target::Level(current_level.to_string());
    }

    match catalog.position(current_level) {
        Some(index) => match catalog.levels().get(index + 1) {
            Some(next) => Target::Level(next.clone()),
            None => Target::Graduated,
        },
        None => Target::Level(current_level.to_string()),
    }
}

use std::cmp::Ordering;
use std::collections::HashMap;

/// Marker a roster level normalizes to when the cell held no value.
pub const MISSING_LEVEL: &str = "NAN";

pub const DEFAULT_LEVELS: [&str; 5] = ["A1", "A2", "B1", "B2", "C1"];

#[derive(Debug, Clone)]
pub struct LevelCatalog {
    levels: Vec<String>,
    lookup: HashMap<String, String>,
}

impl LevelCatalog {
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let levels: Vec<String> = levels
            .into_iter()
            .map(|level| level.into().trim().to_string())
            .filter(|level| !level.is_empty())
            .collect();
        let lookup = levels
            .iter()
            .map(|level| (level.to_uppercase(), level.clone()))
            .collect();
        Self { levels, lookup }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Canonical catalog casing for a known level, the upper-cased label otherwise.
    pub fn normalize(&self, raw_level: &str) -> String {
        let key = raw_level.trim().to_uppercase();
        match self.lookup.get(&key) {
            Some(canonical) => canonical.clone(),
            None => key,
        }
    }

    pub fn position(&self, level: &str) -> Option<usize> {
        self.levels.iter().position(|known| known == level)
    }

    pub fn contains(&self, level: &str) -> bool {
        self.position(level).is_some()
    }

    /// Catalog levels first in catalog order, unknown levels after them by name.
    pub fn display_order(&self, a: &str, b: &str) -> Ordering {
        match (self.position(a), self.position(b)) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    pub fn sort_levels(&self, levels: &mut [String]) {
        levels.sort_by(|a, b| self.display_order(a, b));
    }
}

impl Default for LevelCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_LEVELS)
    }
}

pub fn is_missing(level: &str) -> bool {
    let level = level.trim();
    level.is_empty() || level.eq_ignore_ascii_case(MISSING_LEVEL)
}

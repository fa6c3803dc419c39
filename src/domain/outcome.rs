use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Category;

/// Result of one category's scrape attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn succeeded(records: usize) -> Self {
        Self {
            success: true,
            records,
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            records: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Outcomes of one orchestrator run, keyed by category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RunReport {
    outcomes: BTreeMap<Category, Outcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: Category, outcome: Outcome) {
        self.outcomes.insert(category, outcome);
    }

    pub fn get(&self, category: Category) -> Option<&Outcome> {
        self.outcomes.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &Outcome)> {
        self.outcomes.iter().map(|(c, o)| (*c, o))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.values().all(|o| o.success)
    }

    pub fn total_records(&self) -> usize {
        self.outcomes.values().map(|o| o.records).sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.values().filter(|o| !o.success).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_has_zero_records() {
        let outcome = Outcome::failed("Timed out");
        assert!(!outcome.success);
        assert_eq!(outcome.records, 0);
        assert_eq!(outcome.error.as_deref(), Some("Timed out"));
    }

    #[test]
    fn test_outcome_json_omits_missing_error() {
        let json = serde_json::to_string(&Outcome::succeeded(12)).unwrap();
        assert_eq!(json, r#"{"success":true,"records":12}"#);
    }

    #[test]
    fn test_report_serializes_keyed_by_category() {
        let mut report = RunReport::new();
        report.insert(Category::Rainfall, Outcome::failed("boom"));
        report.insert(Category::Gauge, Outcome::succeeded(3));

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["gauge"]["records"], 3);
        assert_eq!(value["rainfall"]["error"], "boom");
        assert_eq!(report.failures(), 1);
        assert_eq!(report.total_records(), 3);
        assert!(!report.all_succeeded());
    }
}

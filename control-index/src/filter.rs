//! Caller-owned filter state for browsing extracted controls

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::control::{parse_flag, Control, ControlField};

/// Case-insensitive substring filters plus tri-state flag filters.
///
/// Empty strings and `None` flags match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFilter {
    pub identifier: String,
    pub name: String,
    pub uri: String,
    pub table_code: String,
    pub taxonomy: String,
    pub market: String,
    pub required: Option<bool>,
    pub correction_available: Option<bool>,
    pub approval: Option<bool>,
}

impl ControlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every criterion
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True if no criterion is set
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, control: &Control) -> bool {
        let text_criteria = [
            (ControlField::Identifier, &self.identifier),
            (ControlField::Name, &self.name),
            (ControlField::Uri, &self.uri),
            (ControlField::TableCode, &self.table_code),
            (ControlField::Taxonomy, &self.taxonomy),
            (ControlField::Market, &self.market),
        ];
        let flag_criteria = [
            (ControlField::Required, self.required),
            (ControlField::CorrectionAvailable, self.correction_available),
            (ControlField::Approval, self.approval),
        ];

        text_criteria
            .iter()
            .all(|(field, needle)| contains_ignore_case(control.get(*field), needle))
            && flag_criteria.iter().all(|(field, wanted)| match wanted {
                Some(wanted) => parse_flag(control.get(*field)) == Some(*wanted),
                None => true,
            })
    }

    /// Matching controls, in input order
    pub fn apply<'a>(&self, controls: &'a [Control]) -> Vec<&'a Control> {
        controls.iter().filter(|c| self.matches(c)).collect()
    }
}

/// Sorted unique non-empty values of one field, for filter choices
pub fn distinct_values(controls: &[Control], field: ControlField) -> Vec<String> {
    controls
        .iter()
        .map(|c| c.get(field).trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls() -> Vec<Control> {
        vec![
            Control::builder()
                .identifier("R-001")
                .name("Остатки по счетам")
                .set(ControlField::Required, "да")
                .set(ControlField::Market, "Брокеры")
                .set(ControlField::TableCode, "0420001")
                .build()
                .unwrap(),
            Control::builder()
                .identifier("R-002")
                .name("Сроки отчётности")
                .set(ControlField::Required, "Нет")
                .set(ControlField::Market, "Страховщики")
                .build()
                .unwrap(),
            Control::builder()
                .identifier("X-100")
                .name("Проверка остатков")
                .set(ControlField::Market, "Брокеры")
                .set(ControlField::Approval, "да")
                .build()
                .unwrap(),
        ]
    }

    fn ids(matched: &[&Control]) -> Vec<String> {
        matched.iter().map(|c| c.identifier().to_string()).collect()
    }

    #[test]
    fn test_empty_filter_matches_all_in_order() {
        let all = controls();
        let filter = ControlFilter::new();
        assert!(filter.is_empty());
        assert_eq!(ids(&filter.apply(&all)), vec!["R-001", "R-002", "X-100"]);
    }

    #[test]
    fn test_substring_case_insensitive() {
        let all = controls();
        let filter = ControlFilter {
            name: "ОСТАТК".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&all)), vec!["R-001", "X-100"]);

        let filter = ControlFilter {
            identifier: "r-".to_string(),
            market: "брокер".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&all)), vec!["R-001"]);
    }

    #[test]
    fn test_flag_filters() {
        let all = controls();
        let filter = ControlFilter {
            required: Some(false),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&all)), vec!["R-002"]);

        // Blank flag matches neither yes nor no
        let filter = ControlFilter {
            approval: Some(false),
            ..Default::default()
        };
        assert!(filter.apply(&all).is_empty());
    }

    #[test]
    fn test_reset() {
        let mut filter = ControlFilter {
            taxonomy: "x".to_string(),
            approval: Some(true),
            ..Default::default()
        };
        assert!(!filter.is_empty());
        filter.reset();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_distinct_values() {
        let all = controls();
        assert_eq!(
            distinct_values(&all, ControlField::Market),
            vec!["Брокеры", "Страховщики"]
        );
        assert_eq!(distinct_values(&all, ControlField::TableCode), vec!["0420001"]);
        assert!(distinct_values(&all, ControlField::Taxonomy).is_empty());
    }
}

//! Item selection.
//!
//! A focus combines id sections (`2.2` selects `2.2.1` through `2.2.10`,
//! matched component-wise) with an optional regular expression over the
//! item label `[id] title`. An item runs when it satisfies both.

use super::item::CheckItem;
use nb_common::ItemId;
use regex::Regex;

/// Which items of a registry to run.
#[derive(Debug, Clone, Default)]
pub struct Focus {
    sections: Vec<ItemId>,
    pattern: Option<Regex>,
}

impl Focus {
    /// Select everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Select items under any of `sections`. An empty list selects all.
    pub fn sections(sections: Vec<ItemId>) -> Self {
        Self {
            sections,
            pattern: None,
        }
    }

    /// Additionally require the item label to match `pattern`.
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Parse a comma-separated section list such as `2.2.5,2.2.6`.
    pub fn parse_sections(list: &str) -> Result<Vec<ItemId>, String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ItemId>())
            .collect()
    }

    pub fn section_ids(&self) -> &[ItemId] {
        &self.sections
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    pub fn matches(&self, item: &CheckItem) -> bool {
        let in_section =
            self.sections.is_empty() || self.sections.iter().any(|s| item.id.is_within(s));
        in_section
            && self
                .pattern
                .as_ref()
                .map_or(true, |re| re.is_match(&item.label()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::item::Check;
    use crate::predicate::PermissionPredicate;

    fn item(id: [u32; 3], title: &str) -> CheckItem {
        CheckItem::scored(id, title, Check::Permissions(PermissionPredicate::at_most(0o644)))
    }

    #[test]
    fn test_all_matches_everything() {
        assert!(Focus::all().matches(&item([2, 2, 1], "x")));
    }

    #[test]
    fn test_section_prefix_is_component_wise() {
        let focus = Focus::sections(Focus::parse_sections("2.2.1").unwrap());
        assert!(focus.matches(&item([2, 2, 1], "x")));
        assert!(!focus.matches(&item([2, 2, 10], "x")));
    }

    #[test]
    fn test_multiple_sections() {
        let focus = Focus::sections(Focus::parse_sections("2.2.5, 2.2.6").unwrap());
        assert!(focus.matches(&item([2, 2, 5], "x")));
        assert!(focus.matches(&item([2, 2, 6], "x")));
        assert!(!focus.matches(&item([2, 2, 7], "x")));
    }

    #[test]
    fn test_parse_sections_rejects_garbage() {
        assert!(Focus::parse_sections("2.2,abc").is_err());
        assert!(Focus::parse_sections("").unwrap().is_empty());
    }

    #[test]
    fn test_regex_over_label() {
        let focus = Focus::all().with_pattern(Regex::new(r"\[2\.1\]|ownership").unwrap());
        assert!(focus.matches(&item([2, 2, 2], "Ensure that the kubelet.conf file ownership is set")));
        assert!(!focus.matches(&item([2, 2, 1], "Ensure that the kubelet.conf file permissions")));
    }

    #[test]
    fn test_sections_and_regex_both_apply() {
        let focus = Focus::sections(vec![ItemId::from([2, 2, 0])])
            .with_pattern(Regex::new("permissions").unwrap());
        assert!(!focus.matches(&item([2, 2, 1], "permissions")));

        let focus = Focus::sections(Focus::parse_sections("2.2").unwrap())
            .with_pattern(Regex::new("permissions").unwrap());
        assert!(focus.matches(&item([2, 2, 1], "permissions")));
        assert!(!focus.matches(&item([2, 2, 2], "ownership")));
    }
}

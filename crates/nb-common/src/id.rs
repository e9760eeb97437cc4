//! Benchmark item identity.
//!
//! Item ids are the stable external keys of a benchmark ("2.2.1"). They are
//! used for focus filtering and reporting and are never renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dotted numeric benchmark item id, e.g. `2.2.10`.
///
/// Ordering is component-wise numeric, so `2.2.9 < 2.2.10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(Vec<u32>);

impl ItemId {
    /// Parse a dotted id. Returns None for empty or non-numeric components.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let mut parts = Vec::new();
        for component in s.split('.') {
            if component.is_empty() || !component.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            parts.push(component.parse().ok()?);
        }
        Some(ItemId(parts))
    }

    /// Components of the id.
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// True if `self` is `section` or lies underneath it.
    ///
    /// Matching is component-wise: `2.2.10` is under `2.2` and `2.2.10`,
    /// but not under `2.2.1`.
    pub fn is_within(&self, section: &ItemId) -> bool {
        self.0.starts_with(&section.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", c)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for ItemId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemId::parse(s).ok_or_else(|| format!("invalid item id: {}", s))
    }
}

impl TryFrom<String> for ItemId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl<const N: usize> From<[u32; N]> for ItemId {
    fn from(components: [u32; N]) -> Self {
        ItemId(components.to_vec())
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.to_string()
    }
}

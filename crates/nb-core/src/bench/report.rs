//! Run report: per-item outcomes plus a summary.

use super::outcome::{CheckOutcome, MissingProcessPolicy, Status};
use chrono::{DateTime, Utc};
use nb_common::ItemId;
use serde::{Deserialize, Serialize};

/// Outcome of one item, with its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReport {
    pub id: ItemId,
    pub title: String,
    pub scored: bool,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

impl ItemReport {
    pub fn status(&self) -> Status {
        self.outcome.status()
    }
}

/// Outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl Summary {
    pub fn tally(items: &[ItemReport]) -> Self {
        let mut summary = Summary {
            total: items.len(),
            ..Default::default()
        };
        for item in items {
            match item.status() {
                Status::Pass => summary.passed += 1,
                Status::Fail => summary.failed += 1,
                Status::Skip => summary.skipped += 1,
                Status::Error => summary.errored += 1,
            }
        }
        summary
    }
}

/// Complete result of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: String,
    pub run_id: String,
    pub host_id: String,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub missing_process: MissingProcessPolicy,
    /// Items in declaration order.
    pub items: Vec<ItemReport>,
    pub summary: Summary,
}

impl RunReport {
    pub fn item(&self, id: &ItemId) -> Option<&ItemReport> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errored > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::outcome::SkipReason;

    fn report(id: [u32; 3], outcome: CheckOutcome) -> ItemReport {
        ItemReport {
            id: id.into(),
            title: "t".into(),
            scored: true,
            outcome,
        }
    }

    #[test]
    fn test_tally() {
        let items = vec![
            report([2, 2, 1], CheckOutcome::Pass { detail: "0640 <= 0644".into() }),
            report([2, 2, 2], CheckOutcome::Fail { detail: "owner 1:1".into() }),
            report(
                [2, 2, 3],
                CheckOutcome::Skip {
                    reason: SkipReason::FileNotFound { path: "/x".into() },
                },
            ),
            report([2, 2, 4], CheckOutcome::Pass { detail: "ok".into() }),
        ];
        let s = Summary::tally(&items);
        assert_eq!(
            s,
            Summary {
                total: 4,
                passed: 2,
                failed: 1,
                skipped: 1,
                errored: 0
            }
        );
    }

    #[test]
    fn test_item_report_flattens_outcome() {
        let item = report([2, 2, 1], CheckOutcome::Fail { detail: "0666 > 0644".into() });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "2.2.1");
        assert_eq!(json["status"], "fail");
        assert_eq!(json["detail"], "0666 > 0644");

        let back: ItemReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}

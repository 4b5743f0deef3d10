//! Compare the board UI snapshot against the statuses stored in the database.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

/// Status columns the board UI tests expect to render.
pub const EXPECTED_STATUSES: [&str; 4] = ["Developing", "Under Review", "Testing", "Done"];

/// Names of the level-3 headings in an accessibility tree (one per board
/// column), in document order with repeats dropped.
pub fn column_headings(snapshot: &Value) -> Vec<String> {
    let mut columns = Vec::new();
    collect_headings(snapshot, &mut columns);
    columns
}

/// The column headings as a set, for membership checks.
pub fn status_columns(snapshot: &Value) -> BTreeSet<String> {
    column_headings(snapshot).into_iter().collect()
}

fn collect_headings(node: &Value, out: &mut Vec<String>) {
    if node["role"] == "heading" && node["level"] == 3 {
        if let Some(name) = node["name"].as_str() {
            if !out.iter().any(|seen| seen == name) {
                out.push(name.to_string());
            }
        }
    }
    if let Some(children) = node["children"].as_array() {
        for child in children {
            collect_headings(child, out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Pass,
    Fail,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub outcome: CheckOutcome,
    pub message: String,
}

impl Check {
    fn new(outcome: CheckOutcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub checks: Vec<Check>,
}

impl DiffReport {
    pub fn compare(ui_statuses: &BTreeSet<String>, db_statuses: &BTreeSet<String>) -> Self {
        let expected: BTreeSet<String> = EXPECTED_STATUSES.iter().map(|s| s.to_string()).collect();
        let mut checks = Vec::with_capacity(4);

        checks.push(if ui_statuses.len() == expected.len() {
            Check::new(
                CheckOutcome::Pass,
                format!("UI column count is correct ({})", ui_statuses.len()),
            )
        } else {
            Check::new(
                CheckOutcome::Fail,
                format!(
                    "UI shows {} columns, expected {}",
                    ui_statuses.len(),
                    expected.len()
                ),
            )
        });

        let unexpected = join(ui_statuses.difference(&expected));
        checks.push(if unexpected.is_empty() {
            Check::new(CheckOutcome::Pass, "UI only shows expected statuses")
        } else {
            Check::new(
                CheckOutcome::Fail,
                format!("UI has unexpected columns: {}", unexpected),
            )
        });

        let missing_in_ui = join(db_statuses.difference(ui_statuses));
        checks.push(if missing_in_ui.is_empty() {
            Check::new(CheckOutcome::Pass, "All DB statuses are visible in the UI")
        } else {
            Check::new(
                CheckOutcome::Fail,
                format!("UI is missing statuses from DB: {}", missing_in_ui),
            )
        });

        let untested = join(db_statuses.difference(&expected));
        checks.push(if untested.is_empty() {
            Check::new(CheckOutcome::Pass, "All DB statuses are covered by tests")
        } else {
            Check::new(
                CheckOutcome::Warn,
                format!("Test assertions do not account for: {}", untested),
            )
        });

        Self { checks }
    }

    /// Compare a saved accessibility snapshot file against a board database.
    pub fn from_files(snapshot_path: &Path, db_path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(snapshot_path).with_context(|| {
            format!(
                "Snapshot {} not found; capture it with the board UI tests first",
                snapshot_path.display()
            )
        })?;
        let snapshot: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Snapshot {} is not valid JSON", snapshot_path.display()))?;

        let conn = super::open_read_only(db_path)?;
        let db_statuses = super::distinct_statuses(&conn)?;

        Ok(Self::compare(&status_columns(&snapshot), &db_statuses))
    }

    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.outcome == CheckOutcome::Fail)
    }
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "UI Snapshot Test Summary")?;
        writeln!(f, "{}", "-".repeat(35))?;
        for (i, check) in self.checks.iter().enumerate() {
            let label = match check.outcome {
                CheckOutcome::Pass => "PASS",
                CheckOutcome::Fail => "FAIL",
                CheckOutcome::Warn => "WARN",
            };
            writeln!(f, "[{}] Test {}: {}", label, i + 1, check.message)?;
        }
        Ok(())
    }
}

//! Terminal reporting for the CLI commands.

use crate::io::ScoredRow;

pub mod format;

pub use format::*;

/// Outcome counts of a batch scoring run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreSummary {
    pub rows: usize,
    pub scored: usize,
    pub failed: usize,
}

impl ScoreSummary {
    pub fn from_rows(rows: &[ScoredRow]) -> Self {
        let scored = rows.iter().filter(|r| r.outcome.is_ok()).count();
        Self {
            rows: rows.len(),
            scored,
            failed: rows.len() - scored,
        }
    }
}

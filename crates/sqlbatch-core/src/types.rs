//! Result types shared by drivers

/// Outcome of a single executed statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementResult {
    /// Rows inserted, updated or deleted by the statement
    pub affected_rows: u64,
}

impl StatementResult {
    pub fn new(affected_rows: u64) -> Self {
        Self { affected_rows }
    }
}

/// Total rows affected by a batch of statement results
pub fn total_affected_rows(results: &[StatementResult]) -> u64 {
    results.iter().map(|r| r.affected_rows).sum()
}

use serde::Serialize;

/// Counters for one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Rules returned by the due scan.
    pub due: usize,
    /// Rules this tick won the claim for.
    pub claimed: usize,
    /// Due rules another executor claimed first.
    pub skipped: usize,
    pub done: usize,
    pub failed: usize,
    /// Failed dispatches released for another attempt.
    pub retried: usize,
    /// Store calls that errored or terminal writes that did not apply.
    pub store_errors: usize,
}

impl TickReport {
    pub(crate) fn store_failure() -> Self {
        Self {
            store_errors: 1,
            ..Self::default()
        }
    }

    /// Nothing was due and nothing went wrong.
    pub fn is_idle(&self) -> bool {
        self.due == 0 && self.store_errors == 0
    }
}

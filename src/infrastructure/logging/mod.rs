pub mod in_memory;

use crate::core::errors::LedgerError;
use crate::core::models::{ActivityEntry, ActivityHistory};
use async_trait::async_trait;

/// Per-group history of ledger actions.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, entry: ActivityEntry) -> Result<(), LedgerError>;

    /// Oldest first. Records whose kind is unknown to this build are
    /// counted in [`ActivityHistory::quarantined`] and left out.
    async fn history(&self, group_id: &str) -> Result<ActivityHistory, LedgerError>;
}

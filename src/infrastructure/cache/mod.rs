pub mod cache_keys;
pub mod in_memory;

use crate::core::errors::LedgerError;
use crate::core::models::LedgerView;
use async_trait::async_trait;

/// Read-through store of derived ledger views. A view is only ever handed
/// out for the exact version it was computed at; mutation paths never
/// write here.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_ledger_view(&self, group_id: &str, version: u64) -> Result<Option<LedgerView>, LedgerError>;
    async fn save_ledger_view(&self, view: &LedgerView) -> Result<(), LedgerError>;
}

pub mod in_memory;

use crate::core::errors::LedgerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEntity {
    Payments,
    Settlements,
    Members,
}

/// "Something in this group changed." Delivery is at-least-once and
/// unordered; receivers recompute rather than apply the event.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ChangeEvent {
    pub group_id: String,
    pub entity: ChangeEntity,
    pub version: u64,
}

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn publish(&self, event: ChangeEvent) -> Result<(), LedgerError>;
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

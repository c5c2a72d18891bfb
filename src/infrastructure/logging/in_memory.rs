use crate::core::errors::LedgerError;
use crate::core::models::{ActivityEntry, ActivityEvent, ActivityHistory};
use crate::infrastructure::logging::ActivityLog;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Row as a store would keep it: the event is opaque JSON until read.
#[derive(Clone, Debug)]
struct StoredActivity {
    id: String,
    group_id: String,
    user_id: String,
    payload: serde_json::Value,
    timestamp: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct InMemoryActivityLog {
    rows: Arc<RwLock<Vec<StoredActivity>>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a payload as-is, for rows written by other producers.
    pub async fn record_raw(&self, group_id: &str, user_id: &str, payload: serde_json::Value) {
        let mut rows = self.rows.write().await;
        rows.push(StoredActivity {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            payload,
            timestamp: Utc::now(),
        });
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn record(&self, entry: ActivityEntry) -> Result<(), LedgerError> {
        let payload = serde_json::to_value(&entry.event)
            .map_err(|e| LedgerError::InternalServerError(format!("Failed to serialize activity: {}", e)))?;
        let mut rows = self.rows.write().await;
        rows.push(StoredActivity {
            id: entry.id,
            group_id: entry.group_id,
            user_id: entry.user_id,
            payload,
            timestamp: entry.timestamp,
        });
        Ok(())
    }

    async fn history(&self, group_id: &str) -> Result<ActivityHistory, LedgerError> {
        let rows = self.rows.read().await;
        let mut history = ActivityHistory::default();
        for row in rows.iter().filter(|r| r.group_id == group_id) {
            match serde_json::from_value::<ActivityEvent>(row.payload.clone()) {
                Ok(event) => history.entries.push(ActivityEntry {
                    id: row.id.clone(),
                    group_id: row.group_id.clone(),
                    user_id: row.user_id.clone(),
                    event,
                    timestamp: row.timestamp,
                }),
                Err(e) => {
                    warn!(activity_id = %row.id, group_id, error = %e, "quarantined activity record");
                    history.quarantined += 1;
                }
            }
        }
        Ok(history)
    }
}

use crate::core::errors::LedgerError;
use crate::core::models::LedgerView;
use crate::infrastructure::cache::Cache;
use crate::infrastructure::cache::cache_keys::ledger_view_key;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryCache {
    cache: Arc<RwLock<HashMap<String, LedgerView>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_ledger_view(&self, group_id: &str, version: u64) -> Result<Option<LedgerView>, LedgerError> {
        let cache = self.cache.read().await;
        Ok(cache
            .get(&ledger_view_key(group_id))
            .filter(|view| view.version == version)
            .cloned())
    }

    async fn save_ledger_view(&self, view: &LedgerView) -> Result<(), LedgerError> {
        let mut cache = self.cache.write().await;
        let key = ledger_view_key(&view.group_id);
        // a slow reader must not replace a newer view with an older one
        if cache.get(&key).is_some_and(|current| current.version > view.version) {
            return Ok(());
        }
        cache.insert(key, view.clone());
        Ok(())
    }
}

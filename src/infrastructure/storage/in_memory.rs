use crate::core::errors::LedgerError;
use crate::core::models::{Group, Transaction, TransactionFilter, TransactionStatus};
use crate::infrastructure::storage::{AppendOutcome, LedgerSnapshot, StatusUpdate, Storage};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_IDEMPOTENCY_CAPACITY: usize = 10_000;

/// (group id, creator, key)
type IdempotencySlot = (String, String, String);

#[derive(Default)]
struct State {
    groups: HashMap<String, Group>,
    transactions: HashMap<String, Transaction>,
    // per group, in append order
    group_transactions: HashMap<String, Vec<String>>,
    idempotency: HashMap<IdempotencySlot, String>,
    // oldest first, for eviction
    idempotency_order: VecDeque<IdempotencySlot>,
    versions: HashMap<String, u64>,
}

impl State {
    fn bump(&mut self, group_id: &str) {
        *self.versions.entry(group_id.to_string()).or_insert(0) += 1;
    }

    fn remember_key(&mut self, slot: IdempotencySlot, transaction_id: String, capacity: usize) {
        while self.idempotency_order.len() >= capacity.max(1) {
            match self.idempotency_order.pop_front() {
                Some(oldest) => {
                    self.idempotency.remove(&oldest);
                }
                None => break,
            }
        }
        self.idempotency_order.push_back(slot.clone());
        self.idempotency.insert(slot, transaction_id);
    }
}

fn same_request(stored: &Transaction, incoming: &Transaction) -> bool {
    stored.kind == incoming.kind && stored.description == incoming.description && stored.splits == incoming.splits
}

/// One lock over all tables, so an append, its idempotency record and the
/// version bump land together.
#[derive(Clone)]
pub struct InMemoryStorage {
    state: Arc<RwLock<State>>,
    idempotency_capacity: usize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_idempotency_capacity(DEFAULT_IDEMPOTENCY_CAPACITY)
    }

    /// Keeps at most `capacity` idempotency keys; the oldest are forgotten
    /// first, after which a replay appends again.
    pub fn with_idempotency_capacity(capacity: usize) -> Self {
        InMemoryStorage {
            state: Arc::new(RwLock::new(State::default())),
            idempotency_capacity: capacity,
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_group(&self, group: Group) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        state.bump(&group.id);
        state.groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<Group>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.groups.get(group_id).cloned())
    }

    async fn append_transaction(
        &self,
        transaction: Transaction,
        idempotency_key: Option<&str>,
    ) -> Result<AppendOutcome, LedgerError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&transaction.group_id) {
            return Err(LedgerError::GroupNotFound(transaction.group_id.clone()));
        }

        if let Some(key) = idempotency_key {
            let slot = (
                transaction.group_id.clone(),
                transaction.created_by.clone(),
                key.to_string(),
            );
            if let Some(existing) = state.idempotency.get(&slot).and_then(|id| state.transactions.get(id)) {
                if !same_request(existing, &transaction) {
                    return Err(LedgerError::IdempotencyKeyReused(key.to_string()));
                }
                return Ok(AppendOutcome::Replayed(existing.clone()));
            }
            state.remember_key(slot, transaction.id.clone(), self.idempotency_capacity);
        }

        state
            .group_transactions
            .entry(transaction.group_id.clone())
            .or_default()
            .push(transaction.id.clone());
        state.bump(&transaction.group_id);
        state.transactions.insert(transaction.id.clone(), transaction.clone());
        Ok(AppendOutcome::Appended(transaction))
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.transactions.get(transaction_id).cloned())
    }

    async fn list_transactions(&self, group_id: &str, filter: TransactionFilter) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .group_transactions
            .get(group_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.transactions.get(id))
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn compare_and_set_status(
        &self,
        transaction_id: &str,
        expected: TransactionStatus,
        to: TransactionStatus,
        resolved_by: &str,
    ) -> Result<StatusUpdate, LedgerError> {
        let mut state = self.state.write().await;
        let transaction = state
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;

        if transaction.status != expected {
            return Ok(StatusUpdate::Rejected(transaction.status));
        }
        transaction.status = to;
        transaction.resolved_by = Some(resolved_by.to_string());
        transaction.updated_at = Utc::now();
        let updated = transaction.clone();
        state.bump(&updated.group_id);
        Ok(StatusUpdate::Applied(updated))
    }

    async fn group_version(&self, group_id: &str) -> Result<u64, LedgerError> {
        let state = self.state.read().await;
        state
            .versions
            .get(group_id)
            .copied()
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))
    }

    async fn snapshot(&self, group_id: &str) -> Result<Option<LedgerSnapshot>, LedgerError> {
        let state = self.state.read().await;
        let Some(group) = state.groups.get(group_id).cloned() else {
            return Ok(None);
        };
        let transactions = state
            .group_transactions
            .get(group_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.transactions.get(id))
            .cloned()
            .collect();
        Ok(Some(LedgerSnapshot {
            group,
            transactions,
            version: state.versions.get(group_id).copied().unwrap_or(0),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Money, Split, TransactionKind};

    async fn storage_with_group(capacity: usize) -> InMemoryStorage {
        let storage = InMemoryStorage::with_idempotency_capacity(capacity);
        storage
            .save_group(Group {
                id: "g1".to_string(),
                name: "Flat".to_string(),
                members: Vec::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        storage
    }

    fn payment(id: &str, created_by: &str, cents: i64) -> Transaction {
        Transaction {
            id: id.to_string(),
            group_id: "g1".to_string(),
            kind: TransactionKind::Payment,
            status: TransactionStatus::Active,
            description: "Rent".to_string(),
            created_by: created_by.to_string(),
            resolved_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            splits: vec![
                Split::new(created_by, Money::from_cents(cents)),
                Split::new("other", Money::from_cents(-cents)),
            ],
        }
    }

    #[tokio::test]
    async fn test_replay_returns_stored_transaction_without_appending() {
        let storage = storage_with_group(8).await;

        let first = storage.append_transaction(payment("t1", "a", 500), Some("k")).await.unwrap();
        assert!(!first.is_replay());
        let version = storage.group_version("g1").await.unwrap();

        let again = storage.append_transaction(payment("t2", "a", 500), Some("k")).await.unwrap();
        assert!(again.is_replay());
        assert_eq!(again.into_transaction().id, "t1");
        assert_eq!(storage.group_version("g1").await.unwrap(), version);
        assert_eq!(storage.list_transactions("g1", TransactionFilter::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keys_belong_to_their_creator() {
        let storage = storage_with_group(8).await;

        storage.append_transaction(payment("t1", "a", 500), Some("k")).await.unwrap();
        let other = storage.append_transaction(payment("t2", "b", 500), Some("k")).await.unwrap();
        assert!(!other.is_replay());

        let reused = storage.append_transaction(payment("t3", "a", 700), Some("k")).await;
        assert_eq!(reused.unwrap_err(), LedgerError::IdempotencyKeyReused("k".to_string()));
        assert_eq!(storage.list_transactions("g1", TransactionFilter::all()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_oldest_keys_are_evicted_at_capacity() {
        let storage = storage_with_group(2).await;

        for (id, key) in [("t1", "k1"), ("t2", "k2"), ("t3", "k3")] {
            storage.append_transaction(payment(id, "a", 500), Some(key)).await.unwrap();
        }

        // k1 was forgotten, k3 is still remembered
        let late = storage.append_transaction(payment("t4", "a", 500), Some("k1")).await.unwrap();
        assert!(!late.is_replay());
        let recent = storage.append_transaction(payment("t5", "a", 500), Some("k3")).await.unwrap();
        assert!(recent.is_replay());

        let state = storage.state.read().await;
        assert!(state.idempotency.len() <= 2);
        assert_eq!(state.idempotency.len(), state.idempotency_order.len());
    }
}

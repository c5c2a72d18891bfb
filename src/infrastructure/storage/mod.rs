use crate::core::errors::LedgerError;
use crate::core::models::{Group, Transaction, TransactionFilter, TransactionStatus};
use async_trait::async_trait;

/// Result of a conditional status update.
#[derive(Clone, Debug)]
pub enum StatusUpdate {
    Applied(Transaction),
    /// The stored status no longer matched; nothing was written.
    Rejected(TransactionStatus),
}

/// Result of an append.
#[derive(Clone, Debug)]
pub enum AppendOutcome {
    Appended(Transaction),
    /// The idempotency key was already used by the same caller for the same
    /// request; the stored transaction is returned and nothing was written.
    Replayed(Transaction),
}

impl AppendOutcome {
    pub fn is_replay(&self) -> bool {
        matches!(self, AppendOutcome::Replayed(_))
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            AppendOutcome::Appended(transaction) | AppendOutcome::Replayed(transaction) => transaction,
        }
    }
}

/// A group, all of its transactions and the version they were read at,
/// taken under one lock.
#[derive(Clone, Debug)]
pub struct LedgerSnapshot {
    pub group: Group,
    pub transactions: Vec<Transaction>,
    pub version: u64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_group(&self, group: Group) -> Result<(), LedgerError>;
    async fn get_group(&self, group_id: &str) -> Result<Option<Group>, LedgerError>;

    /// Appends a transaction with all of its splits, or nothing.
    ///
    /// Idempotency keys are scoped to the group and the transaction's
    /// creator. Reusing a key for an identical request replays the stored
    /// transaction; reusing it for a different kind, description or splits
    /// fails with [`LedgerError::IdempotencyKeyReused`].
    async fn append_transaction(
        &self,
        transaction: Transaction,
        idempotency_key: Option<&str>,
    ) -> Result<AppendOutcome, LedgerError>;

    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<Transaction>, LedgerError>;

    /// Oldest first.
    async fn list_transactions(&self, group_id: &str, filter: TransactionFilter) -> Result<Vec<Transaction>, LedgerError>;

    /// Sets `status` to `to` only while it still equals `expected`.
    async fn compare_and_set_status(
        &self,
        transaction_id: &str,
        expected: TransactionStatus,
        to: TransactionStatus,
        resolved_by: &str,
    ) -> Result<StatusUpdate, LedgerError>;

    /// Monotonic counter bumped by every write touching the group.
    async fn group_version(&self, group_id: &str) -> Result<u64, LedgerError>;

    async fn snapshot(&self, group_id: &str) -> Result<Option<LedgerSnapshot>, LedgerError>;
}

pub mod in_memory;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::core::models::transaction::TransactionStatus;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

/// Broad class of a failure; decides how the boundary reports it and
/// whether a retry may help.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Conflict,
    Transient,
}

#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq)]
pub enum LedgerError {
    // Validation
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Amount {0} has more than two decimal places")]
    TooManyDecimals(String),
    #[error("Amount {0} exceeds the allowed maximum")]
    AmountTooLarge(String),
    #[error("Split amounts sum to {0}, expected 0")]
    UnbalancedSplits(String),
    #[error("Invalid split layout: {0}")]
    InvalidSplitShape(String),
    #[error("User {0} in split is not a group member")]
    UnknownSplitUser(String),
    #[error("Cannot settle with yourself")]
    SelfSettlement,
    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),

    // Authorization
    #[error("Missing or invalid credentials: {0}")]
    Unauthenticated(String),
    #[error("User {0} is not a group member")]
    NotGroupMember(String),
    #[error("User {0} is not a group manager")]
    NotGroupManager(String),
    #[error("Only the creditor may resolve settlement {settlement_id}, not user {user_id}")]
    NotSettlementCreditor { settlement_id: String, user_id: String },
    #[error("User {user_id} may not void payment {payment_id}")]
    NotPaymentOwner { payment_id: String, user_id: String },

    // Not found
    #[error("Group {0} not found")]
    GroupNotFound(String),
    #[error("Transaction {0} not found")]
    TransactionNotFound(String),
    #[error("Settlement {0} not found")]
    SettlementNotFound(String),

    // Conflict
    #[error("Settlement {id} is already {current}")]
    SettlementNotPending { id: String, current: TransactionStatus },
    #[error("Payment {0} is already voided")]
    PaymentAlreadyVoided(String),
    #[error("Transaction {0} is not a {1}")]
    WrongTransactionKind(String, String),
    #[error("User {0} is already a group member")]
    AlreadyGroupMember(String),
    #[error("Status of transaction {id} changed concurrently, now {current}")]
    StatusChanged { id: String, current: TransactionStatus },
    #[error("Idempotency key {0} was already used for a different request")]
    IdempotencyKeyReused(String),

    // Transient
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Store call timed out after {0} ms")]
    Timeout(u64),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            NonPositiveAmount
            | TooManyDecimals(_)
            | AmountTooLarge(_)
            | UnbalancedSplits(_)
            | InvalidSplitShape(_)
            | UnknownSplitUser(_)
            | SelfSettlement
            | InvalidInput(..) => ErrorKind::Validation,
            Unauthenticated(_)
            | NotGroupMember(_)
            | NotGroupManager(_)
            | NotSettlementCreditor { .. }
            | NotPaymentOwner { .. } => ErrorKind::Authorization,
            GroupNotFound(_) | TransactionNotFound(_) | SettlementNotFound(_) => ErrorKind::NotFound,
            SettlementNotPending { .. }
            | PaymentAlreadyVoided(_)
            | WrongTransactionKind(..)
            | AlreadyGroupMember(_)
            | StatusChanged { .. }
            | IdempotencyKeyReused(_) => ErrorKind::Conflict,
            StorageError(_) | Timeout(_) | InternalServerError(_) => ErrorKind::Transient,
        }
    }

    /// Conflicts are terminal: the transition lost a race and retrying
    /// cannot make it apply.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StorageError(_) | LedgerError::Timeout(_))
    }
}

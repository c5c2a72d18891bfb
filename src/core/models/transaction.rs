use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use super::money::Money;

pub type UserId = String;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Payment,
    Settlement,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Payment => "payment",
            TransactionKind::Settlement => "settlement",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Active,
    Voided,
    Pending,
    Confirmed,
    Rejected,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Voided => "voided",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Split {
    pub user_id: UserId,
    pub amount: Money,
}

impl Split {
    pub fn new(user_id: impl Into<UserId>, amount: Money) -> Self {
        Split {
            user_id: user_id.into(),
            amount,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: String,
    pub group_id: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub description: String,
    pub created_by: UserId,
    pub resolved_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub splits: Vec<Split>,
}

impl Transaction {
    /// Whether this transaction's splits count toward balances.
    pub fn is_effective(&self) -> bool {
        matches!(
            (self.kind, self.status),
            (TransactionKind::Payment, TransactionStatus::Active)
                | (TransactionKind::Settlement, TransactionStatus::Confirmed)
        )
    }

    pub fn split_total(&self) -> Money {
        self.splits.iter().map(|s| s.amount).sum()
    }

    /// The user holding the single positive split: the payer of a payment,
    /// the debtor of a settlement.
    pub fn payer(&self) -> Option<&str> {
        self.splits
            .iter()
            .find(|s| s.amount.is_positive())
            .map(|s| s.user_id.as_str())
    }

    /// The receiving side of a settlement (its negative split).
    pub fn creditor(&self) -> Option<&str> {
        match self.kind {
            TransactionKind::Settlement => self
                .splits
                .iter()
                .find(|s| s.amount.is_negative())
                .map(|s| s.user_id.as_str()),
            TransactionKind::Payment => None,
        }
    }

    /// Settled amount for a settlement, total paid for a payment.
    pub fn amount(&self) -> Money {
        self.splits
            .iter()
            .filter(|s| s.amount.is_positive())
            .map(|s| s.amount)
            .sum()
    }
}

/// Read filter for [`crate::infrastructure::storage::Storage::list_transactions`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pending_settlements() -> Self {
        TransactionFilter {
            kind: Some(TransactionKind::Settlement),
            status: Some(TransactionStatus::Pending),
        }
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.kind.is_none_or(|k| k == transaction.kind) && self.status.is_none_or(|s| s == transaction.status)
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::money::Money;
use super::transaction::{Transaction, UserId};

pub type Balances = BTreeMap<UserId, Money>;

/// `from` owes `to` the given amount.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Transfer {
    pub from: UserId,
    pub to: UserId,
    pub amount: Money,
}

impl Transfer {
    pub fn new(from: impl Into<UserId>, to: impl Into<UserId>, amount: Money) -> Self {
        Transfer {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }
}

/// A counted transaction whose splits did not sum to zero. It was left out
/// of the balances it is reported next to.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub transaction_id: String,
    pub imbalance: Money,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BalanceSheet {
    pub balances: Balances,
    pub violations: Vec<IntegrityViolation>,
}

impl BalanceSheet {
    pub fn total(&self) -> Money {
        self.balances.values().sum()
    }

    pub fn balance_of(&self, user_id: &str) -> Money {
        self.balances.get(user_id).copied().unwrap_or(Money::ZERO)
    }
}

/// Everything a participant sees for a group, derived from one snapshot of
/// the ledger at `version`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LedgerView {
    pub group_id: String,
    pub version: u64,
    pub sheet: BalanceSheet,
    pub debts: Vec<Transfer>,
    pub outstanding: Vec<Transfer>,
    pub pending_settlements: Vec<Transaction>,
}

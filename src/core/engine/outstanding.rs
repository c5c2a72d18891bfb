//! Suggested debts minus what is already proposed against them.
//!
//! Partial settlements are allowed, so a pending settlement covers a debt
//! only up to its amount. Pending amounts are summed per `(from, to)` pair
//! and subtracted from the matching debt; fully covered debts disappear.
//! Proposals in the opposite direction are not netted against a debt.

use std::collections::HashMap;

use crate::core::models::{Money, Transaction, TransactionKind, TransactionStatus, Transfer};

pub fn outstanding_debts(debts: &[Transfer], settlements: &[Transaction]) -> Vec<Transfer> {
    let mut proposed: HashMap<(&str, &str), Money> = HashMap::new();
    for settlement in settlements
        .iter()
        .filter(|t| t.kind == TransactionKind::Settlement && t.status == TransactionStatus::Pending)
    {
        if let (Some(from), Some(to)) = (settlement.payer(), settlement.creditor()) {
            *proposed.entry((from, to)).or_insert(Money::ZERO) += settlement.amount();
        }
    }

    debts
        .iter()
        .filter_map(|debt| {
            let covered = proposed
                .get(&(debt.from.as_str(), debt.to.as_str()))
                .copied()
                .unwrap_or(Money::ZERO);
            let left = debt.amount - covered;
            left.is_positive()
                .then(|| Transfer::new(debt.from.clone(), debt.to.clone(), left))
        })
        .collect()
}

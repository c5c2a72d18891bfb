//! Minimal settling transfers for a balance map.
//!
//! Greedy largest-magnitude matching: the largest remaining debtor pays the
//! largest remaining creditor `min(debt, credit)`, and whoever is exhausted
//! drops out. Every step retires at least one party and the last step
//! retires two, so `k` non-zero balances summing to zero settle in at most
//! `k - 1` transfers. Equal magnitudes are taken in ascending user id order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::core::models::{Balances, Money, Transfer, UserId};

/// Heap entry: largest capacity first, then smallest user id.
type Party = (Money, Reverse<UserId>);

pub fn simplify(balances: &Balances) -> Vec<Transfer> {
    let mut creditors: BinaryHeap<Party> = BinaryHeap::new();
    let mut debtors: BinaryHeap<Party> = BinaryHeap::new();

    for (user_id, amount) in balances {
        let amount = Money::new(amount.as_decimal());
        if amount.is_positive() {
            creditors.push((amount, Reverse(user_id.clone())));
        } else if amount.is_negative() {
            debtors.push((amount.abs(), Reverse(user_id.clone())));
        }
    }

    let mut transfers = Vec::with_capacity(creditors.len().min(debtors.len()));
    while let (Some((debt, Reverse(debtor))), Some((credit, Reverse(creditor)))) = (debtors.pop(), creditors.pop()) {
        let amount = debt.min(credit);
        transfers.push(Transfer::new(debtor.clone(), creditor.clone(), amount));

        let debt_left = debt - amount;
        let credit_left = credit - amount;
        if debt_left.is_positive() {
            debtors.push((debt_left, Reverse(debtor)));
        }
        if credit_left.is_positive() {
            creditors.push((credit_left, Reverse(creditor)));
        }
    }

    transfers
}

/// Balances left after applying `transfers` to `balances`: a payer's
/// balance rises by what they pay, a receiver's falls by what they get.
pub fn apply_transfers(balances: &Balances, transfers: &[Transfer]) -> Balances {
    let mut remaining = balances.clone();
    for transfer in transfers {
        *remaining.entry(transfer.from.clone()).or_insert(Money::ZERO) += transfer.amount;
        *remaining.entry(transfer.to.clone()).or_insert(Money::ZERO) -= transfer.amount;
    }
    remaining
}

//! Net balances from a group's transaction history.
//!
//! Only active payments and confirmed settlements count. A counted
//! transaction whose splits do not sum to zero is left out and reported in
//! [`BalanceSheet::violations`]; the rest of the group is still computed.

use log::warn;
use std::collections::BTreeMap;

use crate::core::models::{BalanceSheet, IntegrityViolation, Money, Transaction, UserId};

pub fn compute_balances<'a, M, T>(members: M, transactions: T) -> BalanceSheet
where
    M: IntoIterator<Item = &'a UserId>,
    T: IntoIterator<Item = &'a Transaction>,
{
    let mut balances: BTreeMap<UserId, Money> = members.into_iter().map(|id| (id.clone(), Money::ZERO)).collect();
    let mut violations = Vec::new();

    for transaction in transactions.into_iter().filter(|t| t.is_effective()) {
        let imbalance = transaction.split_total();
        if !imbalance.is_zero() {
            warn!(
                "excluding transaction {} from group {}: splits sum to {}",
                transaction.id, transaction.group_id, imbalance
            );
            violations.push(IntegrityViolation {
                transaction_id: transaction.id.clone(),
                imbalance,
            });
            continue;
        }
        for split in &transaction.splits {
            *balances.entry(split.user_id.clone()).or_insert(Money::ZERO) += split.amount;
        }
    }

    for amount in balances.values_mut() {
        *amount = Money::new(amount.as_decimal());
    }

    BalanceSheet { balances, violations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Split, TransactionKind, TransactionStatus};
    use chrono::Utc;
    use rstest::rstest;

    fn tx(id: &str, kind: TransactionKind, status: TransactionStatus, splits: &[(&str, i64)]) -> Transaction {
        Transaction {
            id: id.to_string(),
            group_id: "g1".to_string(),
            kind,
            status,
            description: String::new(),
            created_by: "a".to_string(),
            resolved_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            splits: splits
                .iter()
                .map(|(user, cents)| Split::new(*user, Money::from_cents(*cents)))
                .collect(),
        }
    }

    fn members(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn even_three_way_payment() {
        let payment = tx(
            "p1",
            TransactionKind::Payment,
            TransactionStatus::Active,
            &[("a", 9000), ("a", -3000), ("b", -3000), ("c", -3000)],
        );
        let sheet = compute_balances(&members(&["a", "b", "c"]), [&payment]);
        assert_eq!(sheet.balance_of("a"), Money::from_cents(6000));
        assert_eq!(sheet.balance_of("b"), Money::from_cents(-3000));
        assert_eq!(sheet.balance_of("c"), Money::from_cents(-3000));
        assert!(sheet.total().is_zero());
        assert!(sheet.violations.is_empty());
    }

    #[test]
    fn idle_members_are_seeded_with_zero() {
        let history: Vec<Transaction> = Vec::new();
        let sheet = compute_balances(&members(&["a", "b"]), &history);
        assert_eq!(sheet.balances.len(), 2);
        assert!(sheet.balances.values().all(|m| m.is_zero()));
    }

    #[rstest]
    #[case::voided_payment(TransactionKind::Payment, TransactionStatus::Voided)]
    #[case::pending_settlement(TransactionKind::Settlement, TransactionStatus::Pending)]
    #[case::rejected_settlement(TransactionKind::Settlement, TransactionStatus::Rejected)]
    fn non_effective_transactions_are_ignored(#[case] kind: TransactionKind, #[case] status: TransactionStatus) {
        let t = tx("t1", kind, status, &[("a", 500), ("b", -500)]);
        let sheet = compute_balances(&members(&["a", "b"]), [&t]);
        assert!(sheet.balances.values().all(|m| m.is_zero()));
    }

    #[test]
    fn confirmed_settlement_counts() {
        let t = tx(
            "s1",
            TransactionKind::Settlement,
            TransactionStatus::Confirmed,
            &[("b", 3000), ("a", -3000)],
        );
        let sheet = compute_balances(&members(&["a", "b"]), [&t]);
        assert_eq!(sheet.balance_of("a"), Money::from_cents(-3000));
        assert_eq!(sheet.balance_of("b"), Money::from_cents(3000));
    }

    #[test]
    fn unbalanced_transaction_is_excluded_and_flagged() {
        let _ = env_logger::try_init();
        let good = tx(
            "good",
            TransactionKind::Payment,
            TransactionStatus::Active,
            &[("a", 1000), ("b", -1000)],
        );
        let bad = tx(
            "bad",
            TransactionKind::Payment,
            TransactionStatus::Active,
            &[("a", 1000), ("b", -900)],
        );
        let sheet = compute_balances(&members(&["a", "b"]), [&good, &bad]);
        assert_eq!(sheet.balance_of("a"), Money::from_cents(1000));
        assert!(sheet.total().is_zero());
        assert_eq!(
            sheet.violations,
            vec![IntegrityViolation {
                transaction_id: "bad".to_string(),
                imbalance: Money::from_cents(100),
            }]
        );
    }

    #[test]
    fn former_members_keep_their_balance() {
        let t = tx(
            "p1",
            TransactionKind::Payment,
            TransactionStatus::Active,
            &[("a", 1000), ("gone", -1000)],
        );
        let sheet = compute_balances(&members(&["a"]), [&t]);
        assert_eq!(sheet.balance_of("gone"), Money::from_cents(-1000));
        assert!(sheet.total().is_zero());
    }
}

//! State machine for settlements and payment voiding.
//!
//! ```text
//! settlement: pending --confirm--> confirmed
//!             pending --reject---> rejected
//! payment:    active  --void-----> voided
//! ```
//!
//! The functions here decide whether a transition is allowed. Applying it is
//! the store's compare-and-swap, keyed on the `from` status, so two racing
//! callers cannot both win.

use crate::core::errors::LedgerError;
use crate::core::models::{Group, Money, Split, Transaction, TransactionKind, TransactionStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Reject,
    Void,
}

impl Transition {
    pub fn kind(self) -> TransactionKind {
        match self {
            Transition::Confirm | Transition::Reject => TransactionKind::Settlement,
            Transition::Void => TransactionKind::Payment,
        }
    }

    pub fn from_status(self) -> TransactionStatus {
        match self {
            Transition::Confirm | Transition::Reject => TransactionStatus::Pending,
            Transition::Void => TransactionStatus::Active,
        }
    }

    pub fn to_status(self) -> TransactionStatus {
        match self {
            Transition::Confirm => TransactionStatus::Confirmed,
            Transition::Reject => TransactionStatus::Rejected,
            Transition::Void => TransactionStatus::Voided,
        }
    }

    /// Error reported when the compare-and-swap finds `current` instead of
    /// [`Transition::from_status`].
    pub fn conflict(self, id: &str, current: TransactionStatus) -> LedgerError {
        match self {
            Transition::Confirm | Transition::Reject => LedgerError::SettlementNotPending {
                id: id.to_string(),
                current,
            },
            Transition::Void if current == TransactionStatus::Voided => LedgerError::PaymentAlreadyVoided(id.to_string()),
            Transition::Void => LedgerError::StatusChanged {
                id: id.to_string(),
                current,
            },
        }
    }
}

/// Splits for a new settlement: the debtor pays in, the creditor receives.
pub fn propose(group: &Group, from: &str, to: &str, amount: Money) -> Result<Vec<Split>, LedgerError> {
    if !amount.is_positive() {
        return Err(LedgerError::NonPositiveAmount);
    }
    if from == to {
        return Err(LedgerError::SelfSettlement);
    }
    if !group.is_member(from) {
        return Err(LedgerError::NotGroupMember(from.to_string()));
    }
    if !group.is_member(to) {
        return Err(LedgerError::UnknownSplitUser(to.to_string()));
    }
    Ok(vec![Split::new(from, amount), Split::new(to, -amount)])
}

/// Checks that `user_id` may apply `transition` to `transaction`. Does not
/// look at the current status; that is the compare-and-swap's job.
pub fn authorize(group: &Group, transaction: &Transaction, transition: Transition, user_id: &str) -> Result<(), LedgerError> {
    if transaction.kind != transition.kind() {
        return Err(LedgerError::WrongTransactionKind(
            transaction.id.clone(),
            transition.kind().to_string(),
        ));
    }
    match transition {
        Transition::Confirm | Transition::Reject => {
            if transaction.creditor() != Some(user_id) {
                return Err(LedgerError::NotSettlementCreditor {
                    settlement_id: transaction.id.clone(),
                    user_id: user_id.to_string(),
                });
            }
        }
        Transition::Void => {
            if !group.is_manager(user_id) && transaction.payer() != Some(user_id) {
                return Err(LedgerError::NotPaymentOwner {
                    payment_id: transaction.id.clone(),
                    user_id: user_id.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Fails early when the transaction is visibly past the transition's start
/// state. Racing callers can both pass this; the store decides between them.
pub fn ensure_startable(transaction: &Transaction, transition: Transition) -> Result<(), LedgerError> {
    if transaction.status != transition.from_status() {
        return Err(transition.conflict(&transaction.id, transaction.status));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{GroupMember, Role};
    use chrono::Utc;

    fn group() -> Group {
        Group {
            id: "g1".to_string(),
            name: "Trip".to_string(),
            members: vec![
                GroupMember {
                    user_id: "a".to_string(),
                    role: Role::Manager,
                },
                GroupMember {
                    user_id: "b".to_string(),
                    role: Role::Member,
                },
                GroupMember {
                    user_id: "c".to_string(),
                    role: Role::Member,
                },
            ],
            created_at: Utc::now(),
        }
    }

    fn settlement(status: TransactionStatus) -> Transaction {
        Transaction {
            id: "s1".to_string(),
            group_id: "g1".to_string(),
            kind: TransactionKind::Settlement,
            status,
            description: String::new(),
            created_by: "b".to_string(),
            resolved_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            splits: vec![
                Split::new("b", Money::from_cents(3000)),
                Split::new("a", Money::from_cents(-3000)),
            ],
        }
    }

    #[test]
    fn proposal_builds_equal_and_opposite_splits() {
        let splits = propose(&group(), "b", "a", Money::from_cents(3000)).unwrap();
        assert_eq!(splits[0], Split::new("b", Money::from_cents(3000)));
        assert_eq!(splits[1], Split::new("a", Money::from_cents(-3000)));
    }

    #[test]
    fn proposal_validation() {
        let g = group();
        assert_eq!(propose(&g, "b", "a", Money::ZERO), Err(LedgerError::NonPositiveAmount));
        assert_eq!(propose(&g, "b", "b", Money::from_cents(1)), Err(LedgerError::SelfSettlement));
        assert_eq!(
            propose(&g, "b", "x", Money::from_cents(1)),
            Err(LedgerError::UnknownSplitUser("x".to_string()))
        );
        assert_eq!(
            propose(&g, "x", "a", Money::from_cents(1)),
            Err(LedgerError::NotGroupMember("x".to_string()))
        );
    }

    #[test]
    fn only_the_creditor_resolves() {
        let g = group();
        let s = settlement(TransactionStatus::Pending);
        assert!(authorize(&g, &s, Transition::Confirm, "a").is_ok());
        assert!(matches!(
            authorize(&g, &s, Transition::Reject, "c"),
            Err(LedgerError::NotSettlementCreditor { .. })
        ));
        // the debtor cannot confirm their own proposal
        assert!(authorize(&g, &s, Transition::Confirm, "b").is_err());
    }

    #[test]
    fn resolved_settlements_conflict() {
        let s = settlement(TransactionStatus::Rejected);
        assert_eq!(
            ensure_startable(&s, Transition::Confirm),
            Err(LedgerError::SettlementNotPending {
                id: "s1".to_string(),
                current: TransactionStatus::Rejected,
            })
        );
    }

    #[test]
    fn settlements_cannot_be_voided() {
        let s = settlement(TransactionStatus::Pending);
        assert!(matches!(
            authorize(&group(), &s, Transition::Void, "a"),
            Err(LedgerError::WrongTransactionKind(..))
        ));
    }
}

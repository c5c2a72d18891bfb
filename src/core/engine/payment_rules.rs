use std::collections::BTreeSet;

use crate::core::errors::LedgerError;
use crate::core::models::{Group, Money, Split, UserId};

/// Checks the shape of a payment's splits against its group and returns
/// them normalised to two decimal places.
///
/// A payment has exactly one positive split (the payer, for the full total)
/// and one or more negative splits that together cancel it. The payer may
/// also appear among the negative splits for their own share.
pub fn validate_payment(group: &Group, splits: &[Split]) -> Result<Vec<Split>, LedgerError> {
    if splits.len() < 2 {
        return Err(LedgerError::InvalidSplitShape(
            "a payment needs a payer and at least one beneficiary".to_string(),
        ));
    }

    let mut normalized = Vec::with_capacity(splits.len());
    for split in splits {
        let amount = Money::parse_exact(split.amount.as_decimal())?;
        if amount.is_zero() {
            return Err(LedgerError::InvalidSplitShape(format!(
                "split for user {} has a zero amount",
                split.user_id
            )));
        }
        if !group.is_member(&split.user_id) {
            return Err(LedgerError::UnknownSplitUser(split.user_id.clone()));
        }
        normalized.push(Split::new(split.user_id.clone(), amount));
    }

    let payers = normalized.iter().filter(|s| s.amount.is_positive()).count();
    if payers != 1 {
        return Err(LedgerError::InvalidSplitShape(format!(
            "expected exactly one payer, found {}",
            payers
        )));
    }

    let total: Money = normalized.iter().map(|s| s.amount).sum();
    if !total.is_zero() {
        return Err(LedgerError::UnbalancedSplits(total.to_string()));
    }

    Ok(normalized)
}

/// Builds payment splits without the caller doing the cent arithmetic.
pub struct PaymentDraft;

impl PaymentDraft {
    /// `payer` paid `total` on behalf of `beneficiaries` in equal shares.
    /// Cents that do not divide evenly go one each to beneficiaries in
    /// ascending id order.
    pub fn even(payer: &str, total: Money, beneficiaries: &[UserId]) -> Result<Vec<Split>, LedgerError> {
        let total = Money::parse_exact(total.as_decimal())?;
        if !total.is_positive() {
            return Err(LedgerError::NonPositiveAmount);
        }
        let ordered: BTreeSet<&UserId> = beneficiaries.iter().collect();
        if ordered.is_empty() {
            return Err(LedgerError::InvalidSplitShape("no beneficiaries".to_string()));
        }

        let cents = total.cents();
        let count = ordered.len() as i64;
        let (base, remainder) = (cents / count, cents % count);
        if base == 0 {
            return Err(LedgerError::InvalidSplitShape(format!(
                "{} cannot be shared between {} beneficiaries",
                total, count
            )));
        }

        let mut splits = vec![Split::new(payer, total)];
        for (index, user_id) in ordered.into_iter().enumerate() {
            let share = base + i64::from((index as i64) < remainder);
            splits.push(Split::new(user_id.clone(), Money::from_cents(-share)));
        }
        Ok(splits)
    }

    /// `payer` paid for `shares` in the given amounts; the total is their sum.
    pub fn exact(payer: &str, shares: &[(UserId, Money)]) -> Result<Vec<Split>, LedgerError> {
        let total: Money = shares.iter().map(|(_, amount)| *amount).sum();
        if !total.is_positive() {
            return Err(LedgerError::NonPositiveAmount);
        }
        let mut splits = vec![Split::new(payer, total)];
        splits.extend(shares.iter().map(|(user_id, amount)| Split::new(user_id.clone(), -*amount)));
        Ok(splits)
    }
}

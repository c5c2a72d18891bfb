use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::Money;
use super::transaction::UserId;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PaymentAdded {
    pub transaction_id: String,
    pub description: String,
    pub payer_id: UserId,
    pub total: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PaymentVoided {
    pub transaction_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SettlementProposed {
    pub settlement_id: String,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SettlementResolved {
    pub settlement_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct GroupCreated {
    pub name: String,
    pub member_ids: Vec<UserId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MemberAdded {
    pub user_id: UserId,
}

/// Every ledger action that ends up in a group's history. Decoding a kind
/// not listed here fails; readers quarantine such records.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ActivityEvent {
    PaymentAdded(PaymentAdded),
    PaymentVoided(PaymentVoided),
    SettlementProposed(SettlementProposed),
    SettlementConfirmed(SettlementResolved),
    SettlementRejected(SettlementResolved),
    GroupCreated(GroupCreated),
    MemberAdded(MemberAdded),
}

impl ActivityEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ActivityEvent::PaymentAdded(_) => "payment_added",
            ActivityEvent::PaymentVoided(_) => "payment_voided",
            ActivityEvent::SettlementProposed(_) => "settlement_proposed",
            ActivityEvent::SettlementConfirmed(_) => "settlement_confirmed",
            ActivityEvent::SettlementRejected(_) => "settlement_rejected",
            ActivityEvent::GroupCreated(_) => "group_created",
            ActivityEvent::MemberAdded(_) => "member_added",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    pub id: String,
    pub group_id: String,
    pub user_id: UserId,
    pub event: ActivityEvent,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(group_id: &str, user_id: &str, event: ActivityEvent) -> Self {
        ActivityEntry {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            event,
            timestamp: Utc::now(),
        }
    }
}

/// A group's decoded history plus the number of records that could not be
/// decoded and were left out.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ActivityHistory {
    pub entries: Vec<ActivityEntry>,
    pub quarantined: usize,
}

use crate::auth::jwt::{Claims, JwtService};
use crate::core::engine::{
    Transition, compute_balances, outstanding_debts, settlement_lifecycle, simplify, validate_payment,
};
use crate::core::errors::{FieldError, LedgerError};
use crate::core::models::activity::{
    GroupCreated, MemberAdded, PaymentAdded, PaymentVoided, SettlementProposed, SettlementResolved,
};
use crate::core::models::{
    ActivityEntry, ActivityEvent, ActivityHistory, BalanceSheet, Group, GroupMember, LedgerView, Money, Role, Split,
    Transaction, TransactionFilter, TransactionKind, TransactionStatus, Transfer,
};
use crate::core::retry::RetryPolicy;
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::ActivityLog;
use crate::infrastructure::notifier::{ChangeEntity, ChangeEvent, ChangeNotifier};
use crate::infrastructure::storage::{AppendOutcome, StatusUpdate, Storage};
use chrono::Utc;
use std::collections::BTreeSet;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const MAX_DESCRIPTION_LEN: usize = 255;
const MAX_GROUP_NAME_LEN: usize = 100;

pub struct LedgerService<L: ActivityLog, S: Storage, C: Cache, N: ChangeNotifier> {
    storage: S,
    activity: L,
    cache: C,
    notifier: N,
    retry: RetryPolicy,
    jwt_service: JwtService,
}

impl<L: ActivityLog, S: Storage, C: Cache, N: ChangeNotifier> LedgerService<L, S, C, N> {
    pub fn new(storage: S, activity: L, cache: C, notifier: N, jwt_secret: String) -> Self {
        LedgerService {
            storage,
            activity,
            cache,
            notifier,
            retry: RetryPolicy::default(),
            jwt_service: JwtService::new(jwt_secret),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, LedgerError> {
        self.jwt_service.validate_token(token)
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    async fn load_group(&self, group_id: &str) -> Result<Group, LedgerError> {
        self.retry
            .run(|| self.storage.get_group(group_id))
            .await?
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))
    }

    async fn validate_group_membership(&self, group_id: &str, user_id: &str) -> Result<Group, LedgerError> {
        let group = self.load_group(group_id).await?;
        if !group.is_member(user_id) {
            return Err(LedgerError::NotGroupMember(user_id.to_string()));
        }
        Ok(group)
    }

    fn validate_string_input(&self, field: &str, value: &str, max_length: usize) -> Result<(), LedgerError> {
        let invalid = |title: String, description: String| {
            LedgerError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title,
                    description,
                },
            )
        };
        if value.trim().is_empty() {
            return Err(invalid(format!("Invalid {}", field), format!("{} cannot be empty", field)));
        }
        if value.chars().count() > max_length {
            return Err(invalid(
                format!("{} Too Long", field),
                format!("{} cannot exceed {} characters", field, max_length),
            ));
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(invalid(
                format!("Invalid {}", field),
                format!("{} contains control characters", field),
            ));
        }
        Ok(())
    }

    /// Records the action and tells subscribers the group moved on. The
    /// write has already landed, so failures here are logged, not returned.
    async fn after_mutation(&self, group_id: &str, user_id: &str, entity: ChangeEntity, event: ActivityEvent) {
        let name = event.name();
        if let Err(e) = self.activity.record(ActivityEntry::new(group_id, user_id, event)).await {
            warn!(group_id, action = name, error = %e, "failed to record activity");
        }
        let version = match self.storage.group_version(group_id).await {
            Ok(version) => version,
            Err(e) => {
                warn!(group_id, error = %e, "failed to read group version");
                return;
            }
        };
        let change = ChangeEvent {
            group_id: group_id.to_string(),
            entity,
            version,
        };
        if let Err(e) = self.notifier.publish(change).await {
            warn!(group_id, error = %e, "failed to publish change event");
        }
    }

    #[instrument(skip(self, member_ids))]
    pub async fn create_group(&self, name: String, member_ids: Vec<String>, created_by: &str) -> Result<Group, LedgerError> {
        self.validate_string_input("name", &name, MAX_GROUP_NAME_LEN)?;
        let mut others: BTreeSet<String> = member_ids.into_iter().collect();
        others.remove(created_by);
        for member_id in &others {
            self.validate_string_input("member_id", member_id, MAX_DESCRIPTION_LEN)?;
        }

        let mut members = vec![GroupMember {
            user_id: created_by.to_string(),
            role: Role::Manager,
        }];
        members.extend(others.into_iter().map(|user_id| GroupMember {
            user_id,
            role: Role::Member,
        }));

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name,
            members,
            created_at: Utc::now(),
        };
        self.retry.run(|| self.storage.save_group(group.clone())).await?;
        info!(group_id = %group.id, "group created");

        self.after_mutation(
            &group.id,
            created_by,
            ChangeEntity::Members,
            ActivityEvent::GroupCreated(GroupCreated {
                name: group.name.clone(),
                member_ids: group.members.iter().map(|m| m.user_id.clone()).collect(),
            }),
        )
        .await;
        Ok(group)
    }

    #[instrument(skip(self))]
    pub async fn add_member(&self, group_id: &str, user_id: &str, added_by: &str) -> Result<Group, LedgerError> {
        let mut group = self.validate_group_membership(group_id, added_by).await?;
        if !group.is_manager(added_by) {
            return Err(LedgerError::NotGroupManager(added_by.to_string()));
        }
        self.validate_string_input("user_id", user_id, MAX_DESCRIPTION_LEN)?;
        if group.is_member(user_id) {
            return Err(LedgerError::AlreadyGroupMember(user_id.to_string()));
        }

        group.members.push(GroupMember {
            user_id: user_id.to_string(),
            role: Role::Member,
        });
        self.retry.run(|| self.storage.save_group(group.clone())).await?;

        self.after_mutation(
            group_id,
            added_by,
            ChangeEntity::Members,
            ActivityEvent::MemberAdded(MemberAdded {
                user_id: user_id.to_string(),
            }),
        )
        .await;
        Ok(group)
    }

    pub async fn get_group(&self, group_id: &str, queried_by: &str) -> Result<Group, LedgerError> {
        self.validate_group_membership(group_id, queried_by).await
    }

    /// Appends a payment. Without an idempotency key the append is tried
    /// once, since a retried append could land twice.
    #[instrument(skip(self, splits))]
    pub async fn add_payment(
        &self,
        group_id: &str,
        description: String,
        splits: Vec<Split>,
        created_by: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let group = self.validate_group_membership(group_id, created_by).await?;
        self.validate_string_input("description", &description, MAX_DESCRIPTION_LEN)?;
        let splits = validate_payment(&group, &splits)?;

        let now = Utc::now();
        let payment = Transaction {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            kind: TransactionKind::Payment,
            status: TransactionStatus::Active,
            description,
            created_by: created_by.to_string(),
            resolved_by: None,
            created_at: now,
            updated_at: now,
            splits,
        };
        let outcome = self.append(payment, idempotency_key).await?;
        if outcome.is_replay() {
            let stored = outcome.into_transaction();
            info!(transaction_id = %stored.id, "payment replayed");
            return Ok(stored);
        }
        let stored = outcome.into_transaction();
        info!(transaction_id = %stored.id, "payment added");

        self.after_mutation(
            group_id,
            created_by,
            ChangeEntity::Payments,
            ActivityEvent::PaymentAdded(PaymentAdded {
                transaction_id: stored.id.clone(),
                description: stored.description.clone(),
                payer_id: stored.payer().unwrap_or_default().to_string(),
                total: stored.amount(),
            }),
        )
        .await;
        Ok(stored)
    }

    #[instrument(skip(self))]
    pub async fn void_payment(&self, group_id: &str, payment_id: &str, voided_by: &str) -> Result<Transaction, LedgerError> {
        let voided = self
            .resolve(payment_id, Transition::Void, voided_by, Some(group_id))
            .await?;
        info!(transaction_id = %voided.id, "payment voided");

        self.after_mutation(
            group_id,
            voided_by,
            ChangeEntity::Payments,
            ActivityEvent::PaymentVoided(PaymentVoided {
                transaction_id: voided.id.clone(),
            }),
        )
        .await;
        Ok(voided)
    }

    /// `from` proposes paying `to_user_id`. Nothing counts until the
    /// creditor confirms.
    #[instrument(skip(self))]
    pub async fn propose_settlement(
        &self,
        group_id: &str,
        to_user_id: &str,
        amount: Money,
        from: &str,
        idempotency_key: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let group = self.validate_group_membership(group_id, from).await?;
        let amount = Money::parse_exact(amount.as_decimal())?;
        let splits = settlement_lifecycle::propose(&group, from, to_user_id, amount)?;

        let now = Utc::now();
        let settlement = Transaction {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            kind: TransactionKind::Settlement,
            status: TransactionStatus::Pending,
            description: format!("Settlement to {}", to_user_id),
            created_by: from.to_string(),
            resolved_by: None,
            created_at: now,
            updated_at: now,
            splits,
        };
        let outcome = self.append(settlement, idempotency_key).await?;
        if outcome.is_replay() {
            let stored = outcome.into_transaction();
            info!(settlement_id = %stored.id, "settlement proposal replayed");
            return Ok(stored);
        }
        let stored = outcome.into_transaction();
        info!(settlement_id = %stored.id, "settlement proposed");

        self.after_mutation(
            group_id,
            from,
            ChangeEntity::Settlements,
            ActivityEvent::SettlementProposed(SettlementProposed {
                settlement_id: stored.id.clone(),
                from_user_id: from.to_string(),
                to_user_id: to_user_id.to_string(),
                amount: stored.amount(),
            }),
        )
        .await;
        Ok(stored)
    }

    #[instrument(skip(self))]
    pub async fn confirm_settlement(&self, settlement_id: &str, confirmed_by: &str) -> Result<Transaction, LedgerError> {
        let settlement = self
            .resolve(settlement_id, Transition::Confirm, confirmed_by, None)
            .await?;
        info!(settlement_id, "settlement confirmed");

        self.after_mutation(
            &settlement.group_id,
            confirmed_by,
            ChangeEntity::Settlements,
            ActivityEvent::SettlementConfirmed(SettlementResolved {
                settlement_id: settlement_id.to_string(),
            }),
        )
        .await;
        Ok(settlement)
    }

    #[instrument(skip(self))]
    pub async fn reject_settlement(&self, settlement_id: &str, rejected_by: &str) -> Result<Transaction, LedgerError> {
        let settlement = self
            .resolve(settlement_id, Transition::Reject, rejected_by, None)
            .await?;
        info!(settlement_id, "settlement rejected");

        self.after_mutation(
            &settlement.group_id,
            rejected_by,
            ChangeEntity::Settlements,
            ActivityEvent::SettlementRejected(SettlementResolved {
                settlement_id: settlement_id.to_string(),
            }),
        )
        .await;
        Ok(settlement)
    }

    /// A replay already had its activity recorded and its change published
    /// by the call that first appended it.
    async fn append(&self, transaction: Transaction, idempotency_key: Option<&str>) -> Result<AppendOutcome, LedgerError> {
        let policy = match idempotency_key {
            Some(_) => self.retry,
            None => RetryPolicy {
                max_retries: 0,
                ..self.retry
            },
        };
        policy
            .run(|| self.storage.append_transaction(transaction.clone(), idempotency_key))
            .await
    }

    /// Applies a status transition through the store's compare-and-swap.
    /// The swap is tried once: a retried swap that had already landed would
    /// come back as a conflict.
    async fn resolve(
        &self,
        transaction_id: &str,
        transition: Transition,
        user_id: &str,
        group_id: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let not_found = || match transition.kind() {
            TransactionKind::Settlement => LedgerError::SettlementNotFound(transaction_id.to_string()),
            TransactionKind::Payment => LedgerError::TransactionNotFound(transaction_id.to_string()),
        };
        let transaction = self
            .retry
            .run(|| self.storage.get_transaction(transaction_id))
            .await?
            .ok_or_else(not_found)?;
        if group_id.is_some_and(|g| g != transaction.group_id) {
            return Err(not_found());
        }

        let group = self.validate_group_membership(&transaction.group_id, user_id).await?;
        settlement_lifecycle::authorize(&group, &transaction, transition, user_id)?;
        settlement_lifecycle::ensure_startable(&transaction, transition)?;

        let once = RetryPolicy {
            max_retries: 0,
            ..self.retry
        };
        let update = once
            .run(|| {
                self.storage
                    .compare_and_set_status(transaction_id, transition.from_status(), transition.to_status(), user_id)
            })
            .await?;
        match update {
            StatusUpdate::Applied(updated) => Ok(updated),
            StatusUpdate::Rejected(current) => Err(transition.conflict(transaction_id, current)),
        }
    }

    /// Balances, debts and pending proposals for a group, derived from one
    /// snapshot. Served from the cache only while the group's version is
    /// unchanged.
    pub async fn ledger_view(&self, group_id: &str) -> Result<LedgerView, LedgerError> {
        let version = self.retry.run(|| self.storage.group_version(group_id)).await?;
        match self.cache.get_ledger_view(group_id, version).await {
            Ok(Some(view)) => return Ok(view),
            Ok(None) => {}
            Err(e) => warn!(group_id, error = %e, "ledger view cache read failed"),
        }

        let snapshot = self
            .retry
            .run(|| self.storage.snapshot(group_id))
            .await?
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))?;

        let sheet = compute_balances(&snapshot.group.member_ids(), &snapshot.transactions);
        let debts = simplify(&sheet.balances);
        let pending_settlements: Vec<Transaction> = snapshot
            .transactions
            .into_iter()
            .filter(|t| TransactionFilter::pending_settlements().matches(t))
            .collect();
        let outstanding = outstanding_debts(&debts, &pending_settlements);

        let view = LedgerView {
            group_id: group_id.to_string(),
            version: snapshot.version,
            sheet,
            debts,
            outstanding,
            pending_settlements,
        };
        if let Err(e) = self.cache.save_ledger_view(&view).await {
            warn!(group_id, error = %e, "ledger view cache write failed");
        }
        Ok(view)
    }

    pub async fn get_ledger_view(&self, group_id: &str, queried_by: &str) -> Result<LedgerView, LedgerError> {
        let (_, view) = futures::try_join!(
            self.validate_group_membership(group_id, queried_by),
            self.ledger_view(group_id)
        )?;
        Ok(view)
    }

    pub async fn get_balances(&self, group_id: &str, queried_by: &str) -> Result<BalanceSheet, LedgerError> {
        Ok(self.get_ledger_view(group_id, queried_by).await?.sheet)
    }

    pub async fn get_simplified_debts(&self, group_id: &str, queried_by: &str) -> Result<Vec<Transfer>, LedgerError> {
        Ok(self.get_ledger_view(group_id, queried_by).await?.debts)
    }

    pub async fn get_outstanding_debts(&self, group_id: &str, queried_by: &str) -> Result<Vec<Transfer>, LedgerError> {
        Ok(self.get_ledger_view(group_id, queried_by).await?.outstanding)
    }

    pub async fn get_pending_settlements(&self, group_id: &str, queried_by: &str) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.get_ledger_view(group_id, queried_by).await?.pending_settlements)
    }

    pub async fn get_transactions(
        &self,
        group_id: &str,
        filter: TransactionFilter,
        queried_by: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.validate_group_membership(group_id, queried_by).await?;
        self.retry
            .run(|| self.storage.list_transactions(group_id, filter))
            .await
    }

    pub async fn get_activity(&self, group_id: &str, queried_by: &str) -> Result<ActivityHistory, LedgerError> {
        self.validate_group_membership(group_id, queried_by).await?;
        self.activity.history(group_id).await
    }
}

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    api::models::{AddMemberRequest, AddPaymentRequest, CreateGroupRequest, ErrorResponse, ProposeSettlementRequest},
    core::{
        errors::ErrorKind,
        models::{
            ActivityEntry, ActivityEvent, ActivityHistory, BalanceSheet, Group, GroupMember, IntegrityViolation,
            LedgerView, Money, Role, Split, Transaction, TransactionKind, TransactionStatus, Transfer,
        },
    },
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        super::handlers::create_group,
        super::handlers::get_group,
        super::handlers::add_member,
        super::handlers::add_payment,
        super::handlers::void_payment,
        super::handlers::propose_settlement,
        super::handlers::get_pending_settlements,
        super::handlers::confirm_settlement,
        super::handlers::reject_settlement,
        super::handlers::get_balances,
        super::handlers::get_simplified_debts,
        super::handlers::get_outstanding_debts,
        super::handlers::get_transactions,
        super::handlers::get_activity
    ),
    components(schemas(
        CreateGroupRequest,
        AddMemberRequest,
        AddPaymentRequest,
        ProposeSettlementRequest,
        ErrorResponse,
        ErrorKind,
        Group,
        GroupMember,
        Role,
        Money,
        Split,
        Transaction,
        TransactionKind,
        TransactionStatus,
        Transfer,
        BalanceSheet,
        IntegrityViolation,
        LedgerView,
        ActivityEntry,
        ActivityEvent,
        ActivityHistory
    )),
    modifiers(&BearerAuth),
    info(
        title = "Tally API",
        description = "Shared-expense ledger: payments, balances, simplified debts and settlements",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;

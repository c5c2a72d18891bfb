use crate::{
    api::models::*,
    auth::jwt::Claims,
    core::{
        errors::LedgerError,
        models::{ActivityHistory, BalanceSheet, Group, Transaction, TransactionFilter, Transfer},
        services::LedgerService,
    },
    infrastructure::{
        cache::in_memory::InMemoryCache, logging::in_memory::InMemoryActivityLog,
        notifier::in_memory::InMemoryNotifier, storage::in_memory::InMemoryStorage,
    },
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
};
use http::header;
use std::sync::Arc;

pub type AppService = LedgerService<InMemoryActivityLog, InMemoryStorage, InMemoryCache, InMemoryNotifier>;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// Middleware to validate JWT
async fn auth_middleware(
    State(service): State<Arc<AppService>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| LedgerError::Unauthenticated("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| LedgerError::Unauthenticated("Invalid Authorization header".to_string()))?;

    let claims = service.validate_token(token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

// Define API routes
pub fn api_routes(service: Arc<AppService>) -> Router {
    Router::new()
        .route("/groups", post(create_group))
        .route("/groups/{group_id}", get(get_group))
        .route("/groups/{group_id}/members", post(add_member))
        .route("/groups/{group_id}/payments", post(add_payment))
        .route("/groups/{group_id}/payments/{payment_id}/void", post(void_payment))
        .route("/groups/{group_id}/settlements", post(propose_settlement))
        .route("/groups/{group_id}/settlements/pending", get(get_pending_settlements))
        .route("/settlements/{settlement_id}/confirm", post(confirm_settlement))
        .route("/settlements/{settlement_id}/reject", post(reject_settlement))
        .route("/groups/{group_id}/balances", get(get_balances))
        .route("/groups/{group_id}/debts", get(get_simplified_debts))
        .route("/groups/{group_id}/debts/outstanding", get(get_outstanding_debts))
        .route("/groups/{group_id}/transactions", get(get_transactions))
        .route("/groups/{group_id}/activity", get(get_activity))
        .route_layer(middleware::from_fn_with_state(service.clone(), auth_middleware))
        .with_state(service)
}

#[utoipa::path(
    post,
    path = "/api/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created successfully", body = Group),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn create_group(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let group = service.create_group(req.name, req.member_ids, &claims.sub).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Group retrieved successfully", body = Group),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_group(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    let group = service.get_group(&group_id, &claims.sub).await?;
    Ok(Json(group))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/members",
    request_body = AddMemberRequest,
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Member added successfully", body = Group),
        (status = 403, description = "Not a group manager", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 409, description = "Already a group member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn add_member(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<Group>, ApiError> {
    let group = service.add_member(&group_id, &req.user_id, &claims.sub).await?;
    Ok(Json(group))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/payments",
    request_body = AddPaymentRequest,
    params(
        ("group_id" = String, Path, description = "ID of the group"),
        ("Idempotency-Key" = Option<String>, Header, description = "Replays of the same key return the first result")
    ),
    responses(
        (status = 201, description = "Payment recorded", body = Transaction),
        (status = 400, description = "Invalid splits", body = ErrorResponse),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn add_payment(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AddPaymentRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let payment = service
        .add_payment(&group_id, req.description, req.splits, &claims.sub, idempotency_key(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/payments/{payment_id}/void",
    params(
        ("group_id" = String, Path, description = "ID of the group"),
        ("payment_id" = String, Path, description = "ID of the payment to void")
    ),
    responses(
        (status = 200, description = "Payment voided", body = Transaction),
        (status = 403, description = "Neither payer nor group manager", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse),
        (status = 409, description = "Payment already voided", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn void_payment(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path((group_id, payment_id)): Path<(String, String)>,
) -> Result<Json<Transaction>, ApiError> {
    let payment = service.void_payment(&group_id, &payment_id, &claims.sub).await?;
    Ok(Json(payment))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/settlements",
    request_body = ProposeSettlementRequest,
    params(
        ("group_id" = String, Path, description = "ID of the group"),
        ("Idempotency-Key" = Option<String>, Header, description = "Replays of the same key return the first result")
    ),
    responses(
        (status = 201, description = "Settlement proposed", body = Transaction),
        (status = 400, description = "Invalid amount or self settlement", body = ErrorResponse),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn propose_settlement(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ProposeSettlementRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let settlement = service
        .propose_settlement(&group_id, &req.to_user_id, req.amount, &claims.sub, idempotency_key(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(settlement)))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/settlements/pending",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Pending settlements", body = Vec<Transaction>),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_pending_settlements(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let settlements = service.get_pending_settlements(&group_id, &claims.sub).await?;
    Ok(Json(settlements))
}

#[utoipa::path(
    post,
    path = "/api/settlements/{settlement_id}/confirm",
    params(
        ("settlement_id" = String, Path, description = "ID of the settlement")
    ),
    responses(
        (status = 200, description = "Settlement confirmed", body = Transaction),
        (status = 403, description = "Only the creditor may confirm", body = ErrorResponse),
        (status = 404, description = "Settlement not found", body = ErrorResponse),
        (status = 409, description = "Settlement no longer pending", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn confirm_settlement(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(settlement_id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let settlement = service.confirm_settlement(&settlement_id, &claims.sub).await?;
    Ok(Json(settlement))
}

#[utoipa::path(
    post,
    path = "/api/settlements/{settlement_id}/reject",
    params(
        ("settlement_id" = String, Path, description = "ID of the settlement")
    ),
    responses(
        (status = 200, description = "Settlement rejected", body = Transaction),
        (status = 403, description = "Only the creditor may reject", body = ErrorResponse),
        (status = 404, description = "Settlement not found", body = ErrorResponse),
        (status = 409, description = "Settlement no longer pending", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn reject_settlement(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(settlement_id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let settlement = service.reject_settlement(&settlement_id, &claims.sub).await?;
    Ok(Json(settlement))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/balances",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Net balance per member", body = BalanceSheet),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_balances(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<BalanceSheet>, ApiError> {
    let sheet = service.get_balances(&group_id, &claims.sub).await?;
    Ok(Json(sheet))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/debts",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Simplified transfers", body = Vec<Transfer>),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_simplified_debts(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Transfer>>, ApiError> {
    let debts = service.get_simplified_debts(&group_id, &claims.sub).await?;
    Ok(Json(debts))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/debts/outstanding",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Transfers not yet covered by a pending settlement", body = Vec<Transfer>),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_outstanding_debts(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Transfer>>, ApiError> {
    let debts = service.get_outstanding_debts(&group_id, &claims.sub).await?;
    Ok(Json(debts))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/transactions",
    params(
        ("group_id" = String, Path, description = "ID of the group"),
        TransactionQuery
    ),
    responses(
        (status = 200, description = "Transactions in append order", body = Vec<Transaction>),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_transactions(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let filter = TransactionFilter {
        kind: query.kind,
        status: query.status,
    };
    let transactions = service.get_transactions(&group_id, filter, &claims.sub).await?;
    Ok(Json(transactions))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/activity",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Activity feed", body = ActivityHistory),
        (status = 403, description = "Not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_activity(
    State(service): State<Arc<AppService>>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> Result<Json<ActivityHistory>, ApiError> {
    let history = service.get_activity(&group_id, &claims.sub).await?;
    Ok(Json(history))
}

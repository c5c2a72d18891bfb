use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::core::errors::{ErrorKind, LedgerError};
use crate::core::models::{Money, Split, TransactionKind, TransactionStatus};

#[derive(Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    pub member_ids: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AddPaymentRequest {
    pub description: String,
    pub splits: Vec<Split>,
}

#[derive(Deserialize, ToSchema)]
pub struct ProposeSettlementRequest {
    pub to_user_id: String,
    pub amount: Money,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

// Newtype wrapper for LedgerError to implement IntoResponse
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            LedgerError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            err => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Transient => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(ApiError(LedgerError::SelfSettlement).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(LedgerError::NotSettlementCreditor {
                settlement_id: "s".into(),
                user_id: "c".into(),
            })
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError(LedgerError::PaymentAlreadyVoided("p".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(LedgerError::Unauthenticated("no token".into())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError(LedgerError::Timeout(10)).status(), StatusCode::GATEWAY_TIMEOUT);
    }
}

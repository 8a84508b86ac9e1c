use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sea_orm::DbErr;

use ednova_auth_types::identity::SessionRejection;

use crate::tenant::TenantError;

/// Marker placed on error responses caused by a lost tenant database
/// connection. The tenant middleware evicts the handle when it sees it.
#[derive(Debug, Clone, Copy)]
pub struct TenantFault;

/// LMS service error variants.
#[derive(Debug, thiserror::Error)]
pub enum LmsError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("note index out of range")]
    InvalidIndex,
    #[error("unauthorised user or token is expired, please log in")]
    Unauthorized,
    #[error("email or password does not match")]
    InvalidCredentials,
    #[error("you do not have permission to access this route")]
    Forbidden,
    #[error("you can't access this course")]
    NoActivePurchase,
    #[error("{0} already exists")]
    AlreadyExists(&'static str),
    #[error("you already have an active purchase for this course")]
    AlreadyPurchased,
    #[error("{0} service is unavailable")]
    ExternalService(&'static str),
    #[error("tenant could not be resolved")]
    InvalidTenant,
    #[error("tenant store unavailable")]
    TenantUnavailable,
    #[error("tenant not resolved for this request")]
    TenantMissing,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl LmsError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION",
            Self::InvalidIndex => "INVALID_INDEX",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Forbidden => "FORBIDDEN",
            Self::NoActivePurchase => "NO_ACTIVE_PURCHASE",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::AlreadyPurchased => "ALREADY_PURCHASED",
            Self::ExternalService(_) => "EXTERNAL_SERVICE",
            Self::InvalidTenant => "INVALID_TENANT",
            Self::TenantUnavailable => "TENANT_UNAVAILABLE",
            Self::TenantMissing => "TENANT_MISSING",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the error comes from the tenant database connection itself
    /// rather than from a query.
    fn is_connection_loss(&self) -> bool {
        match self {
            Self::Internal(e) => matches!(
                e.downcast_ref::<DbErr>(),
                Some(DbErr::ConnectionAcquire(_) | DbErr::Conn(_))
            ),
            _ => false,
        }
    }
}

impl From<TenantError> for LmsError {
    fn from(e: TenantError) -> Self {
        match e {
            TenantError::InvalidName(_) | TenantError::NotAllowed(_) => {
                tracing::warn!(error = %e, "tenant rejected");
                Self::InvalidTenant
            }
            TenantError::Connect { tenant, source } => {
                tracing::error!(tenant = %tenant, error = %format!("{source:#}"), "tenant connection failed");
                Self::TenantUnavailable
            }
        }
    }
}

impl From<SessionRejection> for LmsError {
    fn from(_: SessionRejection) -> Self {
        Self::Unauthorized
    }
}

impl IntoResponse for LmsError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidIndex => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NoActivePurchase => StatusCode::FORBIDDEN,
            Self::AlreadyExists(_) | Self::AlreadyPurchased => StatusCode::CONFLICT,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidTenant
            | Self::TenantUnavailable
            | Self::TenantMissing
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let fault = self.is_connection_loss();
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %format!("{e:#}"), kind = "INTERNAL", "internal error");
        }
        if let Self::TenantMissing = self {
            tracing::error!(kind = "TENANT_MISSING", "tenant handle missing from request");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        let mut response = (status, axum::Json(body)).into_response();
        if fault {
            response.extensions_mut().insert(TenantFault);
        }
        response
    }
}

//! Session cookie extractor.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRef, FromRequestParts};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use ednova_domain::tenant::TenantName;
use ednova_domain::user::UserRole;
use http::StatusCode;
use http::request::Parts;
use serde_json::json;
use uuid::Uuid;

use crate::cookie::SESSION_COOKIE;
use crate::token::{AuthError, validate_session_token};

/// HMAC secret used to sign session tokens. Exposed to the extractor via `FromRef`.
#[derive(Clone)]
pub struct SessionKey(pub Arc<str>);

impl SessionKey {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signed-in user of the tenant the request is routed to.
///
/// Rejects with 401 when the `token` cookie is absent or invalid, or when the
/// token was issued for a different tenant than the one resolved for this
/// request (the resolved [`TenantName`] is read from request extensions).
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub tenant: TenantName,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionRejection {
    #[error("not signed in")]
    Missing,
    #[error("invalid session: {0}")]
    Invalid(#[from] AuthError),
    #[error("session belongs to another tenant")]
    WrongTenant,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        tracing::debug!(reason = %self, "session rejected");
        let body = json!({
            "kind": "UNAUTHORIZED",
            "message": "unauthorised user or token is expired, please log in",
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    SessionKey: FromRef<S>,
{
    type Rejection = SessionRejection;

    // Extract synchronously and return a 'static future so the result is `Send`
    // without borrowing `parts` across the await point.
    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let key = SessionKey::from_ref(state);
        let token = CookieJar::from_headers(&parts.headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_owned())
            .filter(|v| !v.is_empty());
        let resolved = parts.extensions.get::<TenantName>().cloned();

        async move {
            let token = token.ok_or(SessionRejection::Missing)?;
            let info = validate_session_token(&token, key.as_str())?;
            if resolved.is_some_and(|t| t != info.tenant) {
                return Err(SessionRejection::WrongTenant);
            }
            Ok(Self {
                user_id: info.user_id,
                role: info.role,
                tenant: info.tenant,
            })
        }
    }
}

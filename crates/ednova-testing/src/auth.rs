//! Mock session helpers for router tests.
//!
//! `MockSession` signs a real session token with a test secret so requests go
//! through the same `SessionUser` extractor as production traffic.

use axum::http::{HeaderName, HeaderValue, header};
use ednova_auth_types::cookie::SESSION_COOKIE;
use ednova_auth_types::token::issue_session_token;
use ednova_domain::tenant::TenantName;
use ednova_domain::user::UserRole;
use uuid::Uuid;

/// Secret shared between `MockSession` and the app under test.
pub const TEST_SESSION_SECRET: &str = "ednova-test-session-secret";

/// Identity to sign into a test request.
pub struct MockSession {
    pub user_id: Uuid,
    pub role: UserRole,
    pub tenant: TenantName,
}

impl MockSession {
    pub fn new(user_id: Uuid, role: UserRole, tenant: &str) -> Self {
        Self {
            user_id,
            role,
            tenant: TenantName::parse(tenant).unwrap(),
        }
    }

    pub fn learner(tenant: &str) -> Self {
        Self::new(Uuid::new_v4(), UserRole::User, tenant)
    }

    pub fn admin(tenant: &str) -> Self {
        Self::new(Uuid::new_v4(), UserRole::Admin, tenant)
    }

    /// Signed session token.
    pub fn token(&self) -> String {
        let (token, _) = issue_session_token(
            self.user_id,
            self.role,
            &self.tenant,
            3600,
            TEST_SESSION_SECRET,
        )
        .unwrap();
        token
    }

    /// `Cookie` header carrying the session token.
    pub fn cookie_header(&self) -> (HeaderName, HeaderValue) {
        let value = format!("{SESSION_COOKIE}={}", self.token());
        (header::COOKIE, HeaderValue::from_str(&value).unwrap())
    }
}

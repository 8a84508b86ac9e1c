use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use sea_orm::DatabaseConnection;

use ednova_auth_types::identity::SessionKey;
use ednova_domain::tenant::TenantName;

use crate::error::LmsError;
use crate::infra::connector::PgTenantConnector;
use crate::infra::db::{
    DbAnnouncementRepository, DbBadgeRepository, DbCourseRepository, DbPurchaseRepository,
    DbUserRepository,
};
use crate::infra::mail::HttpMailSender;
use crate::infra::payment::HttpPaymentGateway;
use crate::infra::progress::DbProgressRepository;
use crate::infra::storage::HttpObjectStorage;
use crate::tenant::{TenantHandle, TenantRegistry};
use crate::usecase::locks::UserLocks;

/// Shared application state passed to every handler via axum `State`.
///
/// Holds nothing tenant-specific: the tenant's store arrives per request
/// through the [`Tenant`] extractor.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TenantRegistry<PgTenantConnector>>,
    pub session_key: SessionKey,
    pub session_ttl_secs: u64,
    pub cookie_domain: Option<String>,
    pub front_url: String,
    pub payment_currency: String,
    pub payments: HttpPaymentGateway,
    pub storage: HttpObjectStorage,
    pub mail: HttpMailSender,
    pub user_locks: UserLocks,
}

impl FromRef<AppState> for SessionKey {
    fn from_ref(state: &AppState) -> Self {
        state.session_key.clone()
    }
}

impl AppState {
    pub fn payment_gateway(&self) -> HttpPaymentGateway {
        self.payments.clone()
    }

    pub fn object_storage(&self) -> HttpObjectStorage {
        self.storage.clone()
    }

    pub fn mail_sender(&self) -> HttpMailSender {
        self.mail.clone()
    }
}

/// The tenant store resolved for this request by
/// [`crate::tenant::resolve_tenant`]. Hands out typed repositories bound to
/// that tenant's connection.
#[derive(Clone)]
pub struct Tenant {
    handle: Arc<TenantHandle<DatabaseConnection>>,
}

impl Tenant {
    pub fn name(&self) -> &TenantName {
        self.handle.name()
    }

    fn db(&self) -> DatabaseConnection {
        self.handle.conn().clone()
    }

    pub fn users(&self) -> DbUserRepository {
        DbUserRepository { db: self.db() }
    }

    pub fn courses(&self) -> DbCourseRepository {
        DbCourseRepository { db: self.db() }
    }

    pub fn purchases(&self) -> DbPurchaseRepository {
        DbPurchaseRepository { db: self.db() }
    }

    pub fn progress(&self) -> DbProgressRepository {
        DbProgressRepository { db: self.db() }
    }

    pub fn badges(&self) -> DbBadgeRepository {
        DbBadgeRepository { db: self.db() }
    }

    pub fn announcements(&self) -> DbAnnouncementRepository {
        DbAnnouncementRepository { db: self.db() }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = LmsError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let handle = parts
            .extensions
            .get::<Arc<TenantHandle<DatabaseConnection>>>()
            .cloned()
            .ok_or(LmsError::TenantMissing)?;
        Ok(Self { handle })
    }
}

use axum::{
    Json,
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ednova_auth_types::identity::SessionUser;
use ednova_domain::pagination::PageRequest;

use crate::domain::types::{Announcement, AnnouncementCategory};
use crate::error::LmsError;
use crate::handlers::require_admin;
use crate::state::Tenant;
use crate::usecase::announcement::{
    CreateAnnouncementInput, CreateAnnouncementUseCase, ListAnnouncementsUseCase,
};

#[derive(Serialize)]
pub struct AnnouncementResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: AnnouncementCategory,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<Announcement> for AnnouncementResponse {
    fn from(a: Announcement) -> Self {
        Self {
            id: a.id,
            title: a.title,
            content: a.content,
            category: a.category,
            created_at: a.created_at,
        }
    }
}

/// GET /announcements, newest first.
pub async fn list_announcements(
    tenant: Tenant,
    _session: SessionUser,
    Query(page): Query<PageRequest>,
) -> Result<Json<Vec<AnnouncementResponse>>, LmsError> {
    let usecase = ListAnnouncementsUseCase {
        announcements: tenant.announcements(),
    };
    let items = usecase.execute(page).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[derive(Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
    pub category: String,
}

pub async fn create_announcement(
    tenant: Tenant,
    session: SessionUser,
    Json(body): Json<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, LmsError> {
    require_admin(&session)?;
    let usecase = CreateAnnouncementUseCase {
        announcements: tenant.announcements(),
    };
    let announcement = usecase
        .execute(CreateAnnouncementInput {
            title: body.title,
            content: body.content,
            category: body.category,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(AnnouncementResponse::from(announcement))))
}

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use ednova_auth_types::identity::SessionUser;

use crate::domain::types::Badge;
use crate::error::LmsError;
use crate::handlers::{FormData, require_admin};
use crate::state::{AppState, Tenant};
use crate::usecase::badge::{CreateBadgeInput, CreateBadgeUseCase, DeleteBadgeUseCase, ListBadgesUseCase};

#[derive(Serialize)]
pub struct BadgeResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub xp_threshold: i64,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<Badge> for BadgeResponse {
    fn from(b: Badge) -> Self {
        Self {
            id: b.id,
            title: b.title,
            content: b.content,
            image_url: b.image.map(|i| i.public_url),
            xp_threshold: b.xp_threshold,
            created_at: b.created_at,
        }
    }
}

pub async fn list_badges(tenant: Tenant) -> Result<Json<Vec<BadgeResponse>>, LmsError> {
    let usecase = ListBadgesUseCase {
        badges: tenant.badges(),
    };
    let badges = usecase.execute().await?;
    Ok(Json(badges.into_iter().map(Into::into).collect()))
}

pub async fn create_badge(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, LmsError> {
    require_admin(&session)?;
    let mut form = FormData::read(multipart).await?;
    let input = CreateBadgeInput {
        title: form.required("title")?,
        content: form.text("content").unwrap_or_default(),
        xp_threshold: form.parse_required("xp_threshold")?,
        image: form.require_file("image")?,
    };
    let usecase = CreateBadgeUseCase {
        badges: tenant.badges(),
        storage: state.object_storage(),
    };
    let badge = usecase.execute(input).await?;
    Ok((StatusCode::CREATED, Json(BadgeResponse::from(badge))))
}

pub async fn delete_badge(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path(badge_id): Path<Uuid>,
) -> Result<StatusCode, LmsError> {
    require_admin(&session)?;
    let usecase = DeleteBadgeUseCase {
        badges: tenant.badges(),
        storage: state.object_storage(),
    };
    usecase.execute(badge_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

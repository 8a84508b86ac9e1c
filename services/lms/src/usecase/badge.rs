use chrono::Utc;
use uuid::Uuid;

use ednova_domain::badge::{self, BadgePlan};

use crate::domain::repository::{BadgeRepository, ObjectStorage, ProgressUnit};
use crate::domain::types::{Badge, Upload};
use crate::error::LmsError;
use crate::usecase::upload::{delete_quietly, upload_then_write};

/// Bring the unit's user's badges in line with `xp`. Writes nothing when the
/// held set is already consistent.
pub async fn reconcile<U: ProgressUnit>(unit: &mut U, xp: i64) -> Result<BadgePlan, LmsError> {
    let catalog = unit.badge_catalog().await?;
    let held = unit.held_badges().await?;
    let plan = badge::plan(xp, &catalog, &held);
    if !plan.is_empty() {
        unit.apply_badge_plan(&plan).await?;
    }
    Ok(plan)
}

pub struct ListBadgesUseCase<B: BadgeRepository> {
    pub badges: B,
}

impl<B: BadgeRepository> ListBadgesUseCase<B> {
    pub async fn execute(&self) -> Result<Vec<Badge>, LmsError> {
        self.badges.list().await
    }
}

pub struct CreateBadgeInput {
    pub title: String,
    pub content: String,
    pub xp_threshold: i64,
    pub image: Upload,
}

pub struct CreateBadgeUseCase<B: BadgeRepository, S: ObjectStorage> {
    pub badges: B,
    pub storage: S,
}

impl<B: BadgeRepository, S: ObjectStorage> CreateBadgeUseCase<B, S> {
    pub async fn execute(&self, input: CreateBadgeInput) -> Result<Badge, LmsError> {
        let title = input.title.trim().to_owned();
        if title.is_empty() {
            return Err(LmsError::validation("title is required"));
        }
        if input.xp_threshold < 0 {
            return Err(LmsError::validation("xp threshold must not be negative"));
        }

        let badges = &self.badges;
        let content = input.content.trim().to_owned();
        let xp_threshold = input.xp_threshold;
        let badge = upload_then_write(&self.storage, "badges", input.image, |image| async move {
            let badge = Badge {
                id: Uuid::now_v7(),
                title,
                content,
                image: Some(image),
                xp_threshold,
                created_at: Utc::now(),
            };
            badges.create(&badge).await?;
            Ok::<_, LmsError>(badge)
        })
        .await?;
        tracing::info!(badge_id = %badge.id, xp_threshold = badge.xp_threshold, "badge created");
        Ok(badge)
    }
}

pub struct DeleteBadgeUseCase<B: BadgeRepository, S: ObjectStorage> {
    pub badges: B,
    pub storage: S,
}

impl<B: BadgeRepository, S: ObjectStorage> DeleteBadgeUseCase<B, S> {
    pub async fn execute(&self, id: Uuid) -> Result<(), LmsError> {
        let badge = self
            .badges
            .find(id)
            .await?
            .ok_or(LmsError::NotFound("badge"))?;
        if !self.badges.delete(id).await? {
            return Err(LmsError::NotFound("badge"));
        }
        if let Some(image) = &badge.image {
            delete_quietly(&self.storage, &image.asset_id).await;
        }
        Ok(())
    }
}

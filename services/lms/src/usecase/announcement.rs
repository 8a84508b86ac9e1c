use chrono::Utc;
use uuid::Uuid;

use ednova_domain::pagination::PageRequest;

use crate::domain::repository::AnnouncementRepository;
use crate::domain::types::{ANNOUNCEMENT_TITLE_MAX_CHARS, Announcement, AnnouncementCategory};
use crate::error::LmsError;

pub struct ListAnnouncementsUseCase<A: AnnouncementRepository> {
    pub announcements: A,
}

impl<A: AnnouncementRepository> ListAnnouncementsUseCase<A> {
    pub async fn execute(&self, page: PageRequest) -> Result<Vec<Announcement>, LmsError> {
        self.announcements.list(page).await
    }
}

pub struct CreateAnnouncementInput {
    pub title: String,
    pub content: String,
    pub category: String,
}

pub struct CreateAnnouncementUseCase<A: AnnouncementRepository> {
    pub announcements: A,
}

impl<A: AnnouncementRepository> CreateAnnouncementUseCase<A> {
    pub async fn execute(&self, input: CreateAnnouncementInput) -> Result<Announcement, LmsError> {
        let title = input.title.trim();
        if title.is_empty() || title.chars().count() > ANNOUNCEMENT_TITLE_MAX_CHARS {
            return Err(LmsError::validation(format!(
                "title must be 1-{ANNOUNCEMENT_TITLE_MAX_CHARS} characters"
            )));
        }
        let content = input.content.trim();
        if content.is_empty() {
            return Err(LmsError::validation("content is required"));
        }
        let category = AnnouncementCategory::parse(input.category.trim()).ok_or_else(|| {
            LmsError::validation("category must be Technical Issues, General Guidance or Warning")
        })?;

        let announcement = Announcement {
            id: Uuid::now_v7(),
            title: title.to_owned(),
            content: content.to_owned(),
            category,
            created_at: Utc::now(),
        };
        self.announcements.create(&announcement).await?;
        Ok(announcement)
    }
}

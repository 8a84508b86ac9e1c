use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ednova_domain::user::UserRole;

/// Longest note a learner may attach to a lecture.
pub const NOTE_MAX_CHARS: usize = 200;

/// Lifetime of e-mail verification and password reset tokens.
pub const ACCOUNT_TOKEN_TTL_MINS: i64 = 15;

/// Purchased access is granted in 30-day months.
pub const DAYS_PER_MONTH: i64 = 30;

/// Longest access period a course may grant (100 years).
pub const MAX_EXPIRY_MONTHS: i32 = 1200;

/// Highest course price, in major currency units.
pub const MAX_COURSE_PRICE: i64 = 10_000_000;

pub const ANNOUNCEMENT_TITLE_MAX_CHARS: usize = 200;

/// Account within one tenant.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub xp: i64,
    pub verified: bool,
    pub avatar: Option<StoredAsset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Single-use token stored as its SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountToken {
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl AccountToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountTokenKind {
    Verify,
    Reset,
}

/// Reference to a binary stored in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub asset_id: String,
    pub public_url: String,
}

/// File received from a multipart form, not yet uploaded.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct Badge {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image: Option<StoredAsset>,
    pub xp_threshold: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: i64,
    pub expiry_months: i32,
    pub created_by: String,
    pub thumbnail: Option<StoredAsset>,
    pub number_of_lectures: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Expiration of a purchase made at `purchased_at`. `None` when the date
    /// is out of range.
    pub fn access_until(&self, purchased_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = i64::from(self.expiry_months).checked_mul(DAYS_PER_MONTH)?;
        purchased_at.checked_add_signed(Duration::try_days(days)?)
    }
}

#[derive(Debug, Clone)]
pub struct Lecture {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub description: String,
    pub media: Option<StoredAsset>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub total_points: i64,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

/// Kind of a course sequence step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    Video,
    Quiz,
}

impl SequenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Quiz => "quiz",
        }
    }
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SequenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "quiz" => Ok(Self::Quiz),
            other => Err(format!("unknown sequence kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceItem {
    pub kind: SequenceKind,
    pub content_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub payment_session_id: Option<String>,
    pub purchase_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
}

impl Purchase {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date > now
    }
}

/// Learner's state for one lecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureProgress {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub lecture_id: Uuid,
    pub marked: bool,
    pub notes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl LectureProgress {
    pub fn new(user_id: Uuid, course_id: Uuid, lecture_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            course_id,
            lecture_id,
            marked: false,
            notes: Vec::new(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub quiz_id: Uuid,
    pub score: i64,
    pub total_points: i64,
    pub submitted_at: DateTime<Utc>,
}

/// A learner's entry for one course, with how many lectures they marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub marked_lectures: i64,
    pub enrolled_at: DateTime<Utc>,
}

/// Inclusive reporting window. A missing bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// Everything recorded for one (user, course) pair.
#[derive(Debug, Clone, Default)]
pub struct CourseProgress {
    pub lectures: Vec<LectureProgress>,
    pub quiz_attempts: Vec<QuizAttempt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncementCategory {
    #[serde(rename = "Technical Issues")]
    TechnicalIssues,
    #[serde(rename = "General Guidance")]
    GeneralGuidance,
    #[serde(rename = "Warning")]
    Warning,
}

impl AnnouncementCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TechnicalIssues => "Technical Issues",
            Self::GeneralGuidance => "General Guidance",
            Self::Warning => "Warning",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Technical Issues" => Some(Self::TechnicalIssues),
            "General Guidance" => Some(Self::GeneralGuidance),
            "Warning" => Some(Self::Warning),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: AnnouncementCategory,
    pub created_at: DateTime<Utc>,
}

/// Hosted checkout requested from the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub tenant: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Payment session as reported back by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub id: String,
    pub paid: bool,
    pub user_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub tenant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#![allow(async_fn_in_trait)]

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use ednova_domain::badge::{BadgePlan, BadgeThreshold};
use ednova_domain::pagination::PageRequest;

use crate::domain::types::{
    AccountToken, AccountTokenKind, Announcement, Badge, CheckoutRequest, CheckoutSession,
    Course, CourseProgress, Enrollment, Lecture, LectureProgress, Mail, PaymentSession,
    Purchase, Question, Quiz, QuizAttempt, SequenceItem, StoredAsset, Upload, User,
};
use crate::error::LmsError;

/// Repository for tenant user accounts.
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, LmsError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, LmsError>;
    async fn email_taken(&self, email: &str) -> Result<bool, LmsError>;
    /// Whether another user (not `except`) already uses `name`.
    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> Result<bool, LmsError>;
    async fn create(&self, user: &User) -> Result<(), LmsError>;
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        avatar: Option<&StoredAsset>,
    ) -> Result<(), LmsError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), LmsError>;

    /// Store (or clear, with `None`) the verification or reset token digest.
    async fn set_token(
        &self,
        id: Uuid,
        kind: AccountTokenKind,
        token: Option<&AccountToken>,
    ) -> Result<(), LmsError>;

    async fn find_by_token(
        &self,
        kind: AccountTokenKind,
        digest: &str,
    ) -> Result<Option<(User, AccountToken)>, LmsError>;

    /// Set the verified flag and drop the verification token.
    async fn mark_verified(&self, id: Uuid) -> Result<(), LmsError>;

    /// Users ordered by XP, highest first.
    async fn leaderboard(&self, page: PageRequest) -> Result<Vec<User>, LmsError>;

    /// Every user, newest account first.
    async fn list_all(&self) -> Result<Vec<User>, LmsError>;
}

/// Repository for courses and their content (lectures, quizzes, sequence).
pub trait CourseRepository: Send + Sync {
    async fn list(&self, category: Option<&str>) -> Result<Vec<Course>, LmsError>;
    async fn find(&self, id: Uuid) -> Result<Option<Course>, LmsError>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Course>, LmsError>;
    async fn title_taken(&self, title: &str, except: Option<Uuid>) -> Result<bool, LmsError>;
    async fn create(&self, course: &Course) -> Result<(), LmsError>;
    async fn update(&self, course: &Course) -> Result<(), LmsError>;
    /// Delete a course with all of its content. Returns `true` if it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, LmsError>;
    async fn categories(&self) -> Result<Vec<String>, LmsError>;

    async fn lectures(&self, course_id: Uuid) -> Result<Vec<Lecture>, LmsError>;
    async fn find_lecture(
        &self,
        course_id: Uuid,
        lecture_id: Uuid,
    ) -> Result<Option<Lecture>, LmsError>;
    /// Append a lecture and bump the course's lecture count.
    async fn add_lecture(&self, lecture: &Lecture) -> Result<(), LmsError>;
    /// Rewrite a lecture's name, description and media. `false` if it is gone.
    async fn update_lecture(&self, lecture: &Lecture) -> Result<bool, LmsError>;
    /// Remove a lecture, its sequence entries and decrement the lecture count.
    async fn remove_lecture(&self, course_id: Uuid, lecture_id: Uuid) -> Result<bool, LmsError>;

    async fn quizzes(&self, course_id: Uuid) -> Result<Vec<Quiz>, LmsError>;
    async fn find_quiz(&self, course_id: Uuid, quiz_id: Uuid) -> Result<Option<Quiz>, LmsError>;
    async fn add_quiz(&self, quiz: &Quiz) -> Result<(), LmsError>;
    /// Rewrite a quiz's title and description. `false` if it is gone.
    async fn update_quiz(&self, quiz: &Quiz) -> Result<bool, LmsError>;
    async fn delete_quiz(&self, course_id: Uuid, quiz_id: Uuid) -> Result<bool, LmsError>;
    /// Add a question and return the quiz's new total points.
    async fn add_question(&self, question: &Question) -> Result<i64, LmsError>;
    /// Replace a question and recompute the quiz total. `None` if no such question.
    async fn update_question(&self, question: &Question) -> Result<Option<i64>, LmsError>;
    /// Delete a question and recompute the quiz total. `None` if no such question.
    async fn delete_question(
        &self,
        quiz_id: Uuid,
        question_id: Uuid,
    ) -> Result<Option<i64>, LmsError>;

    async fn sequence(&self, course_id: Uuid) -> Result<Vec<SequenceItem>, LmsError>;
    async fn replace_sequence(
        &self,
        course_id: Uuid,
        items: &[SequenceItem],
    ) -> Result<(), LmsError>;
}

/// Repository for course purchases.
pub trait PurchaseRepository: Send + Sync {
    async fn has_active(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, LmsError>;

    /// Append a purchase. Returns `false` if the payment session was already recorded.
    async fn record(&self, purchase: &Purchase) -> Result<bool, LmsError>;

    async fn purchased_course_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, LmsError>;

    /// Every purchase, oldest first.
    async fn list_all(&self) -> Result<Vec<Purchase>, LmsError>;
}

/// Repository for the badge catalog and badge possession.
pub trait BadgeRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Badge>, LmsError>;
    async fn find(&self, id: Uuid) -> Result<Option<Badge>, LmsError>;
    async fn create(&self, badge: &Badge) -> Result<(), LmsError>;
    async fn delete(&self, id: Uuid) -> Result<bool, LmsError>;
    /// Badge ids held by each of the given users.
    async fn held_by_users(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>, LmsError>;
}

pub trait AnnouncementRepository: Send + Sync {
    /// Newest first.
    async fn list(&self, page: PageRequest) -> Result<Vec<Announcement>, LmsError>;
    async fn create(&self, announcement: &Announcement) -> Result<(), LmsError>;
}

/// Progress store. Mutations go through a [`ProgressUnit`], which holds the
/// user's row lock until committed.
pub trait ProgressRepository: Send + Sync {
    type Unit: ProgressUnit;

    /// Open a unit of work for `user_id`. `NotFound` if the user does not exist.
    async fn begin(&self, user_id: Uuid) -> Result<Self::Unit, LmsError>;

    /// `None` when the user has no entry for the course.
    async fn course_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<CourseProgress>, LmsError>;

    async fn lecture_progress(
        &self,
        user_id: Uuid,
        lecture_id: Uuid,
    ) -> Result<Option<LectureProgress>, LmsError>;

    /// Idempotently create the user's entry for a course.
    async fn init_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), LmsError>;

    /// Every course entry of every user.
    async fn enrollments(&self) -> Result<Vec<Enrollment>, LmsError>;
}

/// One all-or-nothing progress mutation for a single user. Dropping a unit
/// without calling [`ProgressUnit::commit`] discards every change.
pub trait ProgressUnit: Send {
    async fn ensure_course(&mut self, course_id: Uuid) -> Result<(), LmsError>;
    async fn lecture_progress(
        &mut self,
        lecture_id: Uuid,
    ) -> Result<Option<LectureProgress>, LmsError>;
    async fn save_lecture_progress(&mut self, progress: &LectureProgress) -> Result<(), LmsError>;
    async fn best_quiz_score(&mut self, quiz_id: Uuid) -> Result<Option<i64>, LmsError>;
    async fn append_quiz_attempt(&mut self, attempt: &QuizAttempt) -> Result<(), LmsError>;
    /// Add `delta` to the user's XP (floored at zero) and return the new total.
    async fn apply_xp_delta(&mut self, delta: i64) -> Result<i64, LmsError>;
    async fn held_badges(&mut self) -> Result<HashSet<Uuid>, LmsError>;
    async fn badge_catalog(&mut self) -> Result<Vec<BadgeThreshold>, LmsError>;
    async fn apply_badge_plan(&mut self, plan: &BadgePlan) -> Result<(), LmsError>;
    async fn commit(self) -> Result<(), LmsError>;
}

/// Hosted checkout provider.
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: &CheckoutRequest)
    -> Result<CheckoutSession, LmsError>;
    async fn fetch_session(&self, session_id: &str) -> Result<PaymentSession, LmsError>;
}

/// Object storage / CDN for uploaded assets.
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, folder: &str, upload: Upload) -> Result<StoredAsset, LmsError>;
    async fn delete(&self, asset_id: &str) -> Result<(), LmsError>;
}

pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), LmsError>;
}

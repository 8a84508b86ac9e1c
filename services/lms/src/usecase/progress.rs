//! Learner progress: lecture marks, quiz attempts and notes.
//!
//! Every mutation runs as one [`ProgressUnit`] under the user's
//! [`UserLocks`] entry: progress change, then XP ledger, then badge
//! reconciliation, then commit.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use ednova_domain::tenant::TenantName;
use ednova_domain::xp;

use crate::domain::repository::{
    CourseRepository, ProgressRepository, ProgressUnit, PurchaseRepository,
};
use crate::domain::types::{
    Course, CourseProgress, LectureProgress, NOTE_MAX_CHARS, Quiz, QuizAttempt,
};
use crate::error::LmsError;
use crate::usecase::access::{Caller, ensure_course_access};
use crate::usecase::badge::reconcile;
use crate::usecase::locks::UserLocks;

/// XP and badge changes caused by one progress mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    pub xp_delta: i64,
    pub xp: i64,
    pub awarded: Vec<Uuid>,
    pub revoked: Vec<Uuid>,
}

async fn settle<U: ProgressUnit>(mut unit: U, delta: i64) -> Result<Reward, LmsError> {
    let total = unit.apply_xp_delta(delta).await?;
    let plan = reconcile(&mut unit, total).await?;
    unit.commit().await?;
    Ok(Reward {
        xp_delta: delta,
        xp: total,
        awarded: plan.awarded,
        revoked: plan.revoked,
    })
}

async fn find_course<C: CourseRepository>(courses: &C, course_id: Uuid) -> Result<Course, LmsError> {
    courses
        .find(course_id)
        .await?
        .ok_or(LmsError::NotFound("course"))
}

async fn ensure_lecture<C: CourseRepository>(
    courses: &C,
    course_id: Uuid,
    lecture_id: Uuid,
) -> Result<(), LmsError> {
    find_course(courses, course_id).await?;
    courses
        .find_lecture(course_id, lecture_id)
        .await?
        .ok_or(LmsError::NotFound("lecture"))?;
    Ok(())
}

// ── Course progress ──────────────────────────────────────────────────────────

pub struct GetCourseProgressUseCase<C: CourseRepository, Pu: PurchaseRepository, P: ProgressRepository>
{
    pub courses: C,
    pub purchases: Pu,
    pub progress: P,
}

impl<C, Pu, P> GetCourseProgressUseCase<C, Pu, P>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
{
    pub async fn execute(&self, caller: Caller, course_id: Uuid) -> Result<CourseProgress, LmsError> {
        find_course(&self.courses, course_id).await?;
        ensure_course_access(&self.purchases, caller, course_id).await?;
        self.progress
            .course_progress(caller.user_id, course_id)
            .await?
            .ok_or(LmsError::NotFound("progress"))
    }
}

pub struct MyCoursesUseCase<C: CourseRepository, Pu: PurchaseRepository> {
    pub courses: C,
    pub purchases: Pu,
}

impl<C: CourseRepository, Pu: PurchaseRepository> MyCoursesUseCase<C, Pu> {
    pub async fn execute(&self, user_id: Uuid) -> Result<Vec<Course>, LmsError> {
        let ids = self.purchases.purchased_course_ids(user_id).await?;
        self.courses.find_many(&ids).await
    }
}

// ── Lecture marks ────────────────────────────────────────────────────────────

pub struct MarkLectureInput {
    pub course_id: Uuid,
    pub lecture_id: Uuid,
    pub checked: bool,
    pub gain_xp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkLectureOutput {
    /// `None` when the lecture had never been touched.
    pub previous: Option<bool>,
    pub marked: bool,
    pub reward: Reward,
}

pub struct MarkLectureUseCase<C, Pu, P>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
{
    pub courses: C,
    pub purchases: Pu,
    pub progress: P,
    pub locks: UserLocks,
    pub tenant: TenantName,
}

impl<C, Pu, P> MarkLectureUseCase<C, Pu, P>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
{
    pub async fn execute(
        &self,
        caller: Caller,
        input: MarkLectureInput,
    ) -> Result<MarkLectureOutput, LmsError> {
        if input.gain_xp < 0 {
            return Err(LmsError::validation("gainXP must not be negative"));
        }
        ensure_lecture(&self.courses, input.course_id, input.lecture_id).await?;
        ensure_course_access(&self.purchases, caller, input.course_id).await?;

        let _guard = self.locks.lock(&self.tenant, caller.user_id).await;
        let mut unit = self.progress.begin(caller.user_id).await?;
        unit.ensure_course(input.course_id).await?;

        let current = unit.lecture_progress(input.lecture_id).await?;
        let previous = current.as_ref().map(|p| p.marked);
        let delta = xp::lecture_delta(previous, input.checked, input.gain_xp);
        if previous != Some(input.checked) {
            let mut entry = current.unwrap_or_else(|| {
                LectureProgress::new(caller.user_id, input.course_id, input.lecture_id, Utc::now())
            });
            entry.marked = input.checked;
            entry.updated_at = Utc::now();
            unit.save_lecture_progress(&entry).await?;
        }

        let reward = settle(unit, delta).await?;
        tracing::info!(
            user_id = %caller.user_id,
            lecture_id = %input.lecture_id,
            marked = input.checked,
            xp_delta = reward.xp_delta,
            xp = reward.xp,
            "lecture mark applied"
        );
        Ok(MarkLectureOutput {
            previous,
            marked: input.checked,
            reward,
        })
    }
}

// ── Quiz submission ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct QuizAnswer {
    pub question_id: Uuid,
    pub answer: String,
}

/// Sum of points of correctly answered questions. Answers are compared
/// case-insensitively after trimming; each question counts once.
pub fn grade(quiz: &Quiz, answers: &[QuizAnswer]) -> i64 {
    let mut seen = HashSet::new();
    let mut score = 0;
    for answer in answers {
        let Some(question) = quiz.questions.iter().find(|q| q.id == answer.question_id) else {
            tracing::warn!(
                quiz_id = %quiz.id,
                question_id = %answer.question_id,
                "answer for unknown question ignored"
            );
            continue;
        };
        if !seen.insert(question.id) {
            continue;
        }
        if answer.answer.trim().to_lowercase() == question.correct_answer.trim().to_lowercase() {
            score += question.points;
        }
    }
    score
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitQuizOutput {
    pub score: i64,
    pub total_points: i64,
    pub previous_best: Option<i64>,
    pub reward: Reward,
}

pub struct SubmitQuizUseCase<C, Pu, P>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
{
    pub courses: C,
    pub purchases: Pu,
    pub progress: P,
    pub locks: UserLocks,
    pub tenant: TenantName,
}

impl<C, Pu, P> SubmitQuizUseCase<C, Pu, P>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
{
    pub async fn execute(
        &self,
        caller: Caller,
        course_id: Uuid,
        quiz_id: Uuid,
        answers: &[QuizAnswer],
    ) -> Result<SubmitQuizOutput, LmsError> {
        find_course(&self.courses, course_id).await?;
        let quiz = self
            .courses
            .find_quiz(course_id, quiz_id)
            .await?
            .ok_or(LmsError::NotFound("quiz"))?;
        ensure_course_access(&self.purchases, caller, course_id).await?;
        let score = grade(&quiz, answers);

        let _guard = self.locks.lock(&self.tenant, caller.user_id).await;
        let mut unit = self.progress.begin(caller.user_id).await?;
        unit.ensure_course(course_id).await?;

        let previous_best = unit.best_quiz_score(quiz_id).await?;
        unit.append_quiz_attempt(&QuizAttempt {
            id: Uuid::now_v7(),
            user_id: caller.user_id,
            course_id,
            quiz_id,
            score,
            total_points: quiz.total_points,
            submitted_at: Utc::now(),
        })
        .await?;

        let reward = settle(unit, xp::quiz_delta(previous_best, score)).await?;
        tracing::info!(
            user_id = %caller.user_id,
            quiz_id = %quiz_id,
            score,
            xp_delta = reward.xp_delta,
            "quiz submitted"
        );
        Ok(SubmitQuizOutput {
            score,
            total_points: quiz.total_points,
            previous_best,
            reward,
        })
    }
}

// ── Notes ────────────────────────────────────────────────────────────────────

/// Note operations on one lecture's progress entry.
pub struct LectureNotesUseCase<C, Pu, P>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
{
    pub courses: C,
    pub purchases: Pu,
    pub progress: P,
    pub locks: UserLocks,
    pub tenant: TenantName,
}

impl<C, Pu, P> LectureNotesUseCase<C, Pu, P>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
{
    async fn guard(&self, caller: Caller, course_id: Uuid, lecture_id: Uuid) -> Result<(), LmsError> {
        ensure_lecture(&self.courses, course_id, lecture_id).await?;
        ensure_course_access(&self.purchases, caller, course_id).await
    }

    pub async fn list(
        &self,
        caller: Caller,
        course_id: Uuid,
        lecture_id: Uuid,
    ) -> Result<Vec<String>, LmsError> {
        self.guard(caller, course_id, lecture_id).await?;
        Ok(self
            .progress
            .lecture_progress(caller.user_id, lecture_id)
            .await?
            .map(|p| p.notes)
            .unwrap_or_default())
    }

    /// Append a note. An identical existing note is not added twice.
    pub async fn add(
        &self,
        caller: Caller,
        course_id: Uuid,
        lecture_id: Uuid,
        note: &str,
    ) -> Result<Vec<String>, LmsError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(LmsError::validation("note must not be empty"));
        }
        if note.chars().count() > NOTE_MAX_CHARS {
            return Err(LmsError::validation(format!(
                "note must be at most {NOTE_MAX_CHARS} characters"
            )));
        }
        self.guard(caller, course_id, lecture_id).await?;

        let _guard = self.locks.lock(&self.tenant, caller.user_id).await;
        let mut unit = self.progress.begin(caller.user_id).await?;
        unit.ensure_course(course_id).await?;
        let mut entry = unit
            .lecture_progress(lecture_id)
            .await?
            .unwrap_or_else(|| LectureProgress::new(caller.user_id, course_id, lecture_id, Utc::now()));
        if !entry.notes.iter().any(|n| n == note) {
            entry.notes.push(note.to_owned());
            entry.updated_at = Utc::now();
            unit.save_lecture_progress(&entry).await?;
        }
        unit.commit().await?;
        Ok(entry.notes)
    }

    /// Remove the note at `index`. `InvalidIndex` leaves the list untouched.
    pub async fn delete(
        &self,
        caller: Caller,
        course_id: Uuid,
        lecture_id: Uuid,
        index: usize,
    ) -> Result<Vec<String>, LmsError> {
        self.guard(caller, course_id, lecture_id).await?;

        let _guard = self.locks.lock(&self.tenant, caller.user_id).await;
        let mut unit = self.progress.begin(caller.user_id).await?;
        let mut entry = unit
            .lecture_progress(lecture_id)
            .await?
            .ok_or(LmsError::InvalidIndex)?;
        if index >= entry.notes.len() {
            return Err(LmsError::InvalidIndex);
        }
        entry.notes.remove(index);
        entry.updated_at = Utc::now();
        unit.save_lecture_progress(&entry).await?;
        unit.commit().await?;
        Ok(entry.notes)
    }
}

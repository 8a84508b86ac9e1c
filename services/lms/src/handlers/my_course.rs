use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ednova_auth_types::identity::SessionUser;

use crate::domain::types::{CourseProgress, LectureProgress, QuizAttempt};
use crate::error::LmsError;
use crate::handlers::caller;
use crate::handlers::course::CourseResponse;
use crate::infra::db::{DbCourseRepository, DbPurchaseRepository};
use crate::infra::progress::DbProgressRepository;
use crate::state::{AppState, Tenant};
use crate::usecase::progress::{
    GetCourseProgressUseCase, LectureNotesUseCase, MarkLectureInput, MarkLectureUseCase,
    MarkLectureOutput, MyCoursesUseCase, QuizAnswer, Reward, SubmitQuizUseCase,
};

#[derive(Serialize)]
pub struct RewardResponse {
    pub xp_delta: i64,
    pub xp: i64,
    pub badges_awarded: Vec<Uuid>,
    pub badges_revoked: Vec<Uuid>,
}

impl From<Reward> for RewardResponse {
    fn from(r: Reward) -> Self {
        Self {
            xp_delta: r.xp_delta,
            xp: r.xp,
            badges_awarded: r.awarded,
            badges_revoked: r.revoked,
        }
    }
}

fn notes_usecase(
    state: &AppState,
    tenant: &Tenant,
) -> LectureNotesUseCase<DbCourseRepository, DbPurchaseRepository, DbProgressRepository> {
    LectureNotesUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
        progress: tenant.progress(),
        locks: state.user_locks.clone(),
        tenant: tenant.name().clone(),
    }
}

// ── GET /my-courses ──────────────────────────────────────────────────────────

pub async fn list_my_courses(
    tenant: Tenant,
    session: SessionUser,
) -> Result<Json<Vec<CourseResponse>>, LmsError> {
    let usecase = MyCoursesUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
    };
    let courses = usecase.execute(session.user_id).await?;
    Ok(Json(courses.into_iter().map(Into::into).collect()))
}

// ── GET /my-courses/{course_id} ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct LectureProgressResponse {
    pub lecture_id: Uuid,
    pub marked: bool,
    pub notes: Vec<String>,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<LectureProgress> for LectureProgressResponse {
    fn from(p: LectureProgress) -> Self {
        Self {
            lecture_id: p.lecture_id,
            marked: p.marked,
            notes: p.notes,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct QuizAttemptResponse {
    pub quiz_id: Uuid,
    pub score: i64,
    pub total_points: i64,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub submitted_at: DateTime<Utc>,
}

impl From<QuizAttempt> for QuizAttemptResponse {
    fn from(a: QuizAttempt) -> Self {
        Self {
            quiz_id: a.quiz_id,
            score: a.score,
            total_points: a.total_points,
            submitted_at: a.submitted_at,
        }
    }
}

#[derive(Serialize)]
pub struct CourseProgressResponse {
    pub course_id: Uuid,
    pub lectures: Vec<LectureProgressResponse>,
    pub quiz_attempts: Vec<QuizAttemptResponse>,
}

impl CourseProgressResponse {
    fn new(course_id: Uuid, progress: CourseProgress) -> Self {
        Self {
            course_id,
            lectures: progress.lectures.into_iter().map(Into::into).collect(),
            quiz_attempts: progress.quiz_attempts.into_iter().map(Into::into).collect(),
        }
    }
}

pub async fn get_progress(
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseProgressResponse>, LmsError> {
    let usecase = GetCourseProgressUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
        progress: tenant.progress(),
    };
    let progress = usecase.execute(caller(&session), course_id).await?;
    Ok(Json(CourseProgressResponse::new(course_id, progress)))
}

// ── PUT /my-courses/{course_id}/lectures/{lecture_id}/mark ───────────────────

#[derive(Deserialize)]
pub struct MarkLectureRequest {
    pub checked: bool,
    #[serde(default, alias = "gainXP")]
    pub gain_xp: i64,
}

#[derive(Serialize)]
pub struct MarkLectureResponse {
    pub lecture_id: Uuid,
    /// `null` when the lecture had never been marked or unmarked.
    pub previous_marked: Option<bool>,
    pub marked: bool,
    #[serde(flatten)]
    pub reward: RewardResponse,
}

impl MarkLectureResponse {
    fn new(lecture_id: Uuid, output: MarkLectureOutput) -> Self {
        Self {
            lecture_id,
            previous_marked: output.previous,
            marked: output.marked,
            reward: output.reward.into(),
        }
    }
}

pub async fn mark_lecture(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, lecture_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<MarkLectureRequest>,
) -> Result<Json<MarkLectureResponse>, LmsError> {
    let usecase = MarkLectureUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
        progress: tenant.progress(),
        locks: state.user_locks.clone(),
        tenant: tenant.name().clone(),
    };
    let output = usecase
        .execute(
            caller(&session),
            MarkLectureInput {
                course_id,
                lecture_id,
                checked: body.checked,
                gain_xp: body.gain_xp,
            },
        )
        .await?;
    Ok(Json(MarkLectureResponse::new(lecture_id, output)))
}

// ── Notes ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct NotesResponse {
    pub lecture_id: Uuid,
    pub notes: Vec<String>,
}

pub async fn list_notes(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, lecture_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<NotesResponse>, LmsError> {
    let notes = notes_usecase(&state, &tenant)
        .list(caller(&session), course_id, lecture_id)
        .await?;
    Ok(Json(NotesResponse { lecture_id, notes }))
}

#[derive(Deserialize)]
pub struct AddNoteRequest {
    pub note: String,
}

pub async fn add_note(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, lecture_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<AddNoteRequest>,
) -> Result<Json<NotesResponse>, LmsError> {
    let notes = notes_usecase(&state, &tenant)
        .add(caller(&session), course_id, lecture_id, &body.note)
        .await?;
    Ok(Json(NotesResponse { lecture_id, notes }))
}

pub async fn delete_note(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, lecture_id, index)): Path<(Uuid, Uuid, usize)>,
) -> Result<Json<NotesResponse>, LmsError> {
    let notes = notes_usecase(&state, &tenant)
        .delete(caller(&session), course_id, lecture_id, index)
        .await?;
    Ok(Json(NotesResponse { lecture_id, notes }))
}

// ── POST /my-courses/{course_id}/quizzes/{quiz_id}/submit ────────────────────

#[derive(Deserialize)]
pub struct AnswerRequest {
    pub question_id: Uuid,
    pub answer: String,
}

#[derive(Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<AnswerRequest>,
}

#[derive(Serialize)]
pub struct SubmitQuizResponse {
    pub quiz_id: Uuid,
    pub score: i64,
    pub total_points: i64,
    pub previous_best: Option<i64>,
    #[serde(flatten)]
    pub reward: RewardResponse,
}

pub async fn submit_quiz(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, quiz_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SubmitQuizRequest>,
) -> Result<Json<SubmitQuizResponse>, LmsError> {
    let answers: Vec<QuizAnswer> = body
        .answers
        .into_iter()
        .map(|a| QuizAnswer {
            question_id: a.question_id,
            answer: a.answer,
        })
        .collect();
    let usecase = SubmitQuizUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
        progress: tenant.progress(),
        locks: state.user_locks.clone(),
        tenant: tenant.name().clone(),
    };
    let output = usecase
        .execute(caller(&session), course_id, quiz_id, &answers)
        .await?;
    Ok(Json(SubmitQuizResponse {
        quiz_id,
        score: output.score,
        total_points: output.total_points,
        previous_best: output.previous_best,
        reward: output.reward.into(),
    }))
}

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ednova_auth_types::identity::SessionUser;

use crate::domain::repository::UserRepository;
use crate::domain::types::{Course, Lecture, Question, Quiz, SequenceItem, SequenceKind};
use crate::error::LmsError;
use crate::handlers::{FormData, caller, require_admin};
use crate::state::{AppState, Tenant};
use crate::usecase::course::{
    AddLectureInput, CourseCatalogUseCase, CreateCourseInput, CreateCourseUseCase,
    DeleteCourseUseCase, GetCourseUseCase, GetQuizUseCase, GetSequenceUseCase,
    LectureAdminUseCase, ListQuizzesUseCase, QuestionInput, QuestionPatch, QuizAdminUseCase,
    SequenceStep, UpdateCourseInput, UpdateCourseUseCase, UpdateLectureInput,
    UpdateSequenceUseCase,
};

const MISSING_CONTENT: &str = "content not found";

#[derive(Serialize)]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: i64,
    pub expiry_months: i32,
    pub created_by: String,
    pub thumbnail_url: Option<String>,
    pub number_of_lectures: i32,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(c: Course) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            category: c.category,
            price: c.price,
            expiry_months: c.expiry_months,
            created_by: c.created_by,
            thumbnail_url: c.thumbnail.map(|t| t.public_url),
            number_of_lectures: c.number_of_lectures,
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct LectureResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub video_url: Option<String>,
    pub position: i32,
}

impl From<Lecture> for LectureResponse {
    fn from(l: Lecture) -> Self {
        Self {
            id: l.id,
            name: l.name,
            description: l.description,
            video_url: l.media.map(|m| m.public_url),
            position: l.position,
        }
    }
}

#[derive(Serialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub points: i64,
    /// Only shown to admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

impl QuestionResponse {
    fn new(q: Question, with_answer: bool) -> Self {
        Self {
            id: q.id,
            question: q.question,
            options: q.options,
            points: q.points,
            correct_answer: with_answer.then_some(q.correct_answer),
        }
    }
}

#[derive(Serialize)]
pub struct QuizResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub total_points: i64,
    pub questions: Vec<QuestionResponse>,
}

impl QuizResponse {
    fn new(q: Quiz, with_answers: bool) -> Self {
        Self {
            id: q.id,
            title: q.title,
            description: q.description,
            total_points: q.total_points,
            questions: q
                .questions
                .into_iter()
                .map(|question| QuestionResponse::new(question, with_answers))
                .collect(),
        }
    }
}

// ── GET /courses ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ListCoursesQuery {
    pub category: Option<String>,
}

pub async fn list_courses(
    tenant: Tenant,
    Query(query): Query<ListCoursesQuery>,
) -> Result<Json<Vec<CourseResponse>>, LmsError> {
    let usecase = CourseCatalogUseCase {
        courses: tenant.courses(),
    };
    let courses = usecase.list(query.category.as_deref()).await?;
    Ok(Json(courses.into_iter().map(Into::into).collect()))
}

pub async fn list_categories(tenant: Tenant) -> Result<Json<Vec<String>>, LmsError> {
    let usecase = CourseCatalogUseCase {
        courses: tenant.courses(),
    };
    Ok(Json(usecase.categories().await?))
}

// ── GET /courses/{course_id} ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub lectures: Vec<LectureResponse>,
}

pub async fn get_course(
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseDetailResponse>, LmsError> {
    let usecase = GetCourseUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
    };
    let detail = usecase.execute(caller(&session), course_id).await?;
    Ok(Json(CourseDetailResponse {
        course: detail.course.into(),
        lectures: detail.lectures.into_iter().map(Into::into).collect(),
    }))
}

// ── POST /courses ────────────────────────────────────────────────────────────

pub async fn create_course(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, LmsError> {
    require_admin(&session)?;
    let mut form = FormData::read(multipart).await?;
    let input = CreateCourseInput {
        title: form.required("title")?,
        description: form.text("description").unwrap_or_default(),
        category: form.required("category")?,
        price: form.parse_required("price")?,
        expiry_months: form.parse_required("expiry_months")?,
        thumbnail: form.take_file("thumbnail"),
    };
    let admin_name = tenant
        .users()
        .find_by_id(session.user_id)
        .await?
        .map(|u| u.name)
        .unwrap_or_else(|| session.user_id.to_string());

    let usecase = CreateCourseUseCase {
        courses: tenant.courses(),
        storage: state.object_storage(),
    };
    let course = usecase.execute(&admin_name, input).await?;
    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}

// ── PUT /courses/{course_id} ─────────────────────────────────────────────────

pub async fn update_course(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<CourseResponse>, LmsError> {
    require_admin(&session)?;
    let mut form = FormData::read(multipart).await?;
    let input = UpdateCourseInput {
        title: form.text("title"),
        description: form.text("description"),
        category: form.text("category"),
        price: form.parse("price")?,
        expiry_months: form.parse("expiry_months")?,
        thumbnail: form.take_file("thumbnail"),
    };
    let usecase = UpdateCourseUseCase {
        courses: tenant.courses(),
        storage: state.object_storage(),
    };
    Ok(Json(usecase.execute(course_id, input).await?.into()))
}

// ── DELETE /courses/{course_id} ──────────────────────────────────────────────

pub async fn delete_course(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
) -> Result<StatusCode, LmsError> {
    require_admin(&session)?;
    let usecase = DeleteCourseUseCase {
        courses: tenant.courses(),
        storage: state.object_storage(),
    };
    usecase.execute(course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Lectures ─────────────────────────────────────────────────────────────────

pub async fn add_lecture(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, LmsError> {
    require_admin(&session)?;
    let mut form = FormData::read(multipart).await?;
    let input = AddLectureInput {
        name: form.required("name")?,
        description: form.text("description").unwrap_or_default(),
        media: form.require_file("video")?,
    };
    let usecase = LectureAdminUseCase {
        courses: tenant.courses(),
        storage: state.object_storage(),
    };
    let lecture = usecase.add(course_id, input).await?;
    Ok((StatusCode::CREATED, Json(LectureResponse::from(lecture))))
}

pub async fn update_lecture(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, lecture_id)): Path<(Uuid, Uuid)>,
    multipart: Multipart,
) -> Result<Json<LectureResponse>, LmsError> {
    require_admin(&session)?;
    let mut form = FormData::read(multipart).await?;
    let input = UpdateLectureInput {
        name: form.text("name"),
        description: form.text("description"),
        media: form.take_file("video"),
    };
    let usecase = LectureAdminUseCase {
        courses: tenant.courses(),
        storage: state.object_storage(),
    };
    Ok(Json(usecase.update(course_id, lecture_id, input).await?.into()))
}

pub async fn remove_lecture(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, lecture_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, LmsError> {
    require_admin(&session)?;
    let usecase = LectureAdminUseCase {
        courses: tenant.courses(),
        storage: state.object_storage(),
    };
    usecase.remove(course_id, lecture_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Quizzes ──────────────────────────────────────────────────────────────────

pub async fn list_quizzes(
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<QuizResponse>>, LmsError> {
    let usecase = ListQuizzesUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
    };
    let quizzes = usecase.execute(caller(&session), course_id).await?;
    let with_answers = session.is_admin();
    Ok(Json(
        quizzes
            .into_iter()
            .map(|q| QuizResponse::new(q, with_answers))
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct CreateQuizRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

pub async fn add_quiz(
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
    Json(body): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, LmsError> {
    require_admin(&session)?;
    let usecase = QuizAdminUseCase {
        courses: tenant.courses(),
    };
    let quiz = usecase
        .add_quiz(course_id, &body.title, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(QuizResponse::new(quiz, true))))
}

pub async fn get_quiz(
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, quiz_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QuizResponse>, LmsError> {
    let usecase = GetQuizUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
    };
    let quiz = usecase.execute(caller(&session), course_id, quiz_id).await?;
    Ok(Json(QuizResponse::new(quiz, session.is_admin())))
}

#[derive(Deserialize)]
pub struct UpdateQuizRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub async fn update_quiz(
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, quiz_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateQuizRequest>,
) -> Result<Json<QuizResponse>, LmsError> {
    require_admin(&session)?;
    let usecase = QuizAdminUseCase {
        courses: tenant.courses(),
    };
    let quiz = usecase
        .update_quiz(
            course_id,
            quiz_id,
            body.title.as_deref(),
            body.description.as_deref(),
        )
        .await?;
    Ok(Json(QuizResponse::new(quiz, true)))
}

pub async fn delete_quiz(
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, quiz_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, LmsError> {
    require_admin(&session)?;
    let usecase = QuizAdminUseCase {
        courses: tenant.courses(),
    };
    usecase.delete_quiz(course_id, quiz_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct CreateQuestionRequest {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub points: i64,
}

#[derive(Serialize)]
pub struct QuestionSavedResponse {
    pub question: QuestionResponse,
    pub total_points: i64,
}

pub async fn add_question(
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, quiz_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, LmsError> {
    require_admin(&session)?;
    let usecase = QuizAdminUseCase {
        courses: tenant.courses(),
    };
    let (question, total_points) = usecase
        .add_question(
            course_id,
            quiz_id,
            QuestionInput {
                question: body.question,
                options: body.options,
                correct_answer: body.correct_answer,
                points: body.points,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(QuestionSavedResponse {
            question: QuestionResponse::new(question, true),
            total_points,
        }),
    ))
}

#[derive(Serialize)]
pub struct QuizQuestionsResponse {
    pub quiz_title: String,
    pub total_points: i64,
    pub questions: Vec<QuestionResponse>,
}

pub async fn list_questions(
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, quiz_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QuizQuestionsResponse>, LmsError> {
    let usecase = GetQuizUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
    };
    let quiz = usecase.execute(caller(&session), course_id, quiz_id).await?;
    let with_answers = session.is_admin();
    Ok(Json(QuizQuestionsResponse {
        quiz_title: quiz.title,
        total_points: quiz.total_points,
        questions: quiz
            .questions
            .into_iter()
            .map(|q| QuestionResponse::new(q, with_answers))
            .collect(),
    }))
}

#[derive(Deserialize)]
pub struct UpdateQuestionRequest {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub points: Option<i64>,
}

pub async fn update_question(
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, quiz_id, question_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(body): Json<UpdateQuestionRequest>,
) -> Result<Json<QuestionSavedResponse>, LmsError> {
    require_admin(&session)?;
    let usecase = QuizAdminUseCase {
        courses: tenant.courses(),
    };
    let (question, total_points) = usecase
        .update_question(
            course_id,
            quiz_id,
            question_id,
            QuestionPatch {
                question: body.question,
                options: body.options,
                correct_answer: body.correct_answer,
                points: body.points,
            },
        )
        .await?;
    Ok(Json(QuestionSavedResponse {
        question: QuestionResponse::new(question, true),
        total_points,
    }))
}

#[derive(Serialize)]
pub struct TotalPointsResponse {
    pub total_points: i64,
}

pub async fn delete_question(
    tenant: Tenant,
    session: SessionUser,
    Path((course_id, quiz_id, question_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<TotalPointsResponse>, LmsError> {
    require_admin(&session)?;
    let usecase = QuizAdminUseCase {
        courses: tenant.courses(),
    };
    let total_points = usecase
        .delete_question(course_id, quiz_id, question_id)
        .await?;
    Ok(Json(TotalPointsResponse { total_points }))
}

// ── Sequence ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(untagged)]
pub enum StepContent {
    Lecture(LectureResponse),
    Quiz(QuizResponse),
    Missing { message: &'static str },
}

#[derive(Serialize)]
pub struct SequenceStepResponse {
    pub kind: SequenceKind,
    pub content_id: Uuid,
    pub content: StepContent,
}

pub async fn get_sequence(
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<SequenceStepResponse>>, LmsError> {
    let usecase = GetSequenceUseCase {
        courses: tenant.courses(),
        purchases: tenant.purchases(),
    };
    let with_answers = session.is_admin();
    let steps = usecase.execute(caller(&session), course_id).await?;
    Ok(Json(
        steps
            .into_iter()
            .map(|step| match step {
                SequenceStep::Video(lecture) => SequenceStepResponse {
                    kind: SequenceKind::Video,
                    content_id: lecture.id,
                    content: StepContent::Lecture(lecture.into()),
                },
                SequenceStep::Quiz(quiz) => SequenceStepResponse {
                    kind: SequenceKind::Quiz,
                    content_id: quiz.id,
                    content: StepContent::Quiz(QuizResponse::new(quiz, with_answers)),
                },
                SequenceStep::Missing(item) => SequenceStepResponse {
                    kind: item.kind,
                    content_id: item.content_id,
                    content: StepContent::Missing {
                        message: MISSING_CONTENT,
                    },
                },
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct UpdateSequenceRequest {
    pub items: Vec<SequenceItem>,
}

pub async fn update_sequence(
    tenant: Tenant,
    session: SessionUser,
    Path(course_id): Path<Uuid>,
    Json(body): Json<UpdateSequenceRequest>,
) -> Result<Json<Vec<SequenceItem>>, LmsError> {
    require_admin(&session)?;
    let usecase = UpdateSequenceUseCase {
        courses: tenant.courses(),
    };
    Ok(Json(usecase.execute(course_id, body.items).await?))
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::repository::{CourseRepository, ObjectStorage, PurchaseRepository};
use crate::domain::types::{
    Course, Lecture, MAX_COURSE_PRICE, MAX_EXPIRY_MONTHS, Question, Quiz, SequenceItem,
    SequenceKind, StoredAsset, Upload,
};
use crate::error::LmsError;
use crate::usecase::access::{Caller, ensure_course_access};
use crate::usecase::upload::{delete_quietly, upload_then_write};

const MIN_OPTIONS: usize = 2;

async fn find_course<C: CourseRepository>(courses: &C, id: Uuid) -> Result<Course, LmsError> {
    courses.find(id).await?.ok_or(LmsError::NotFound("course"))
}

fn required(field: &str, value: &str) -> Result<String, LmsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LmsError::validation(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

fn validate_pricing(price: i64, expiry_months: i32) -> Result<(), LmsError> {
    if !(0..=MAX_COURSE_PRICE).contains(&price) {
        return Err(LmsError::validation(format!(
            "price must be between 0 and {MAX_COURSE_PRICE}"
        )));
    }
    if !(1..=MAX_EXPIRY_MONTHS).contains(&expiry_months) {
        return Err(LmsError::validation(format!(
            "expiry must be between 1 and {MAX_EXPIRY_MONTHS} months"
        )));
    }
    Ok(())
}

// ── Catalog ──────────────────────────────────────────────────────────────────

pub struct CourseCatalogUseCase<C: CourseRepository> {
    pub courses: C,
}

impl<C: CourseRepository> CourseCatalogUseCase<C> {
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<Course>, LmsError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        self.courses.list(category).await
    }

    pub async fn categories(&self) -> Result<Vec<String>, LmsError> {
        self.courses.categories().await
    }
}

#[derive(Debug, Clone)]
pub struct CourseDetail {
    pub course: Course,
    pub lectures: Vec<Lecture>,
}

pub struct GetCourseUseCase<C: CourseRepository, P: PurchaseRepository> {
    pub courses: C,
    pub purchases: P,
}

impl<C: CourseRepository, P: PurchaseRepository> GetCourseUseCase<C, P> {
    pub async fn execute(&self, caller: Caller, course_id: Uuid) -> Result<CourseDetail, LmsError> {
        let course = find_course(&self.courses, course_id).await?;
        ensure_course_access(&self.purchases, caller, course_id).await?;
        let lectures = self.courses.lectures(course_id).await?;
        Ok(CourseDetail { course, lectures })
    }
}

// ── Course admin ─────────────────────────────────────────────────────────────

pub struct CreateCourseInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: i64,
    pub expiry_months: i32,
    pub thumbnail: Option<Upload>,
}

pub struct CreateCourseUseCase<C: CourseRepository, S: ObjectStorage> {
    pub courses: C,
    pub storage: S,
}

impl<C: CourseRepository, S: ObjectStorage> CreateCourseUseCase<C, S> {
    pub async fn execute(&self, created_by: &str, input: CreateCourseInput) -> Result<Course, LmsError> {
        let title = required("title", &input.title)?;
        let category = required("category", &input.category)?;
        validate_pricing(input.price, input.expiry_months)?;
        if self.courses.title_taken(&title, None).await? {
            return Err(LmsError::AlreadyExists("course title"));
        }

        let now = Utc::now();
        let course = Course {
            id: Uuid::now_v7(),
            title,
            description: input.description.trim().to_owned(),
            category,
            price: input.price,
            expiry_months: input.expiry_months,
            created_by: created_by.to_owned(),
            thumbnail: None,
            number_of_lectures: 0,
            created_at: now,
            updated_at: now,
        };

        let courses = &self.courses;
        let course = match input.thumbnail {
            Some(upload) => {
                upload_then_write(&self.storage, "thumbnails", upload, |asset| async move {
                    let course = Course {
                        thumbnail: Some(asset),
                        ..course
                    };
                    courses.create(&course).await?;
                    Ok::<_, LmsError>(course)
                })
                .await?
            }
            None => {
                courses.create(&course).await?;
                course
            }
        };
        tracing::info!(course_id = %course.id, "course created");
        Ok(course)
    }
}

#[derive(Default)]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub expiry_months: Option<i32>,
    pub thumbnail: Option<Upload>,
}

pub struct UpdateCourseUseCase<C: CourseRepository, S: ObjectStorage> {
    pub courses: C,
    pub storage: S,
}

impl<C: CourseRepository, S: ObjectStorage> UpdateCourseUseCase<C, S> {
    pub async fn execute(&self, course_id: Uuid, input: UpdateCourseInput) -> Result<Course, LmsError> {
        let current = find_course(&self.courses, course_id).await?;
        let mut course = current.clone();
        if let Some(title) = &input.title {
            let title = required("title", title)?;
            if title != current.title && self.courses.title_taken(&title, Some(course_id)).await? {
                return Err(LmsError::AlreadyExists("course title"));
            }
            course.title = title;
        }
        if let Some(description) = &input.description {
            course.description = description.trim().to_owned();
        }
        if let Some(category) = &input.category {
            course.category = required("category", category)?;
        }
        course.price = input.price.unwrap_or(course.price);
        course.expiry_months = input.expiry_months.unwrap_or(course.expiry_months);
        validate_pricing(course.price, course.expiry_months)?;
        course.updated_at = Utc::now();

        let courses = &self.courses;
        let updated = match input.thumbnail {
            Some(upload) => {
                let updated = upload_then_write(&self.storage, "thumbnails", upload, |asset| async move {
                    let course = Course {
                        thumbnail: Some(asset),
                        ..course
                    };
                    courses.update(&course).await?;
                    Ok::<_, LmsError>(course)
                })
                .await?;
                if let Some(old) = &current.thumbnail {
                    delete_quietly(&self.storage, &old.asset_id).await;
                }
                updated
            }
            None => {
                courses.update(&course).await?;
                course
            }
        };
        Ok(updated)
    }
}

pub struct DeleteCourseUseCase<C: CourseRepository, S: ObjectStorage> {
    pub courses: C,
    pub storage: S,
}

impl<C: CourseRepository, S: ObjectStorage> DeleteCourseUseCase<C, S> {
    pub async fn execute(&self, course_id: Uuid) -> Result<(), LmsError> {
        let course = find_course(&self.courses, course_id).await?;
        let lectures = self.courses.lectures(course_id).await?;
        if !self.courses.delete(course_id).await? {
            return Err(LmsError::NotFound("course"));
        }
        let assets = course
            .thumbnail
            .iter()
            .chain(lectures.iter().filter_map(|l| l.media.as_ref()));
        for asset in assets {
            delete_quietly(&self.storage, &asset.asset_id).await;
        }
        tracing::info!(course_id = %course_id, "course deleted");
        Ok(())
    }
}

// ── Lectures ─────────────────────────────────────────────────────────────────

pub struct AddLectureInput {
    pub name: String,
    pub description: String,
    pub media: Upload,
}

#[derive(Default)]
pub struct UpdateLectureInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub media: Option<Upload>,
}

pub struct LectureAdminUseCase<C: CourseRepository, S: ObjectStorage> {
    pub courses: C,
    pub storage: S,
}

impl<C: CourseRepository, S: ObjectStorage> LectureAdminUseCase<C, S> {
    pub async fn add(&self, course_id: Uuid, input: AddLectureInput) -> Result<Lecture, LmsError> {
        let name = required("name", &input.name)?;
        let course = find_course(&self.courses, course_id).await?;
        let courses = &self.courses;
        let description = input.description.trim().to_owned();
        upload_then_write(&self.storage, "lectures", input.media, |media: StoredAsset| async move {
            let lecture = Lecture {
                id: Uuid::now_v7(),
                course_id,
                name,
                description,
                media: Some(media),
                position: course.number_of_lectures,
                created_at: Utc::now(),
            };
            courses.add_lecture(&lecture).await?;
            Ok::<_, LmsError>(lecture)
        })
        .await
    }

    pub async fn remove(&self, course_id: Uuid, lecture_id: Uuid) -> Result<(), LmsError> {
        let lecture = self
            .courses
            .find_lecture(course_id, lecture_id)
            .await?
            .ok_or(LmsError::NotFound("lecture"))?;
        if !self.courses.remove_lecture(course_id, lecture_id).await? {
            return Err(LmsError::NotFound("lecture"));
        }
        if let Some(media) = &lecture.media {
            delete_quietly(&self.storage, &media.asset_id).await;
        }
        Ok(())
    }

    /// Rename or re-describe a lecture, optionally replacing its video. The
    /// old video is deleted only after the new one is stored.
    pub async fn update(
        &self,
        course_id: Uuid,
        lecture_id: Uuid,
        input: UpdateLectureInput,
    ) -> Result<Lecture, LmsError> {
        if input.name.is_none() && input.description.is_none() && input.media.is_none() {
            return Err(LmsError::validation("no lecture fields to update"));
        }
        let current = self
            .courses
            .find_lecture(course_id, lecture_id)
            .await?
            .ok_or(LmsError::NotFound("lecture"))?;
        let mut lecture = current.clone();
        if let Some(name) = &input.name {
            lecture.name = required("name", name)?;
        }
        if let Some(description) = &input.description {
            lecture.description = description.trim().to_owned();
        }

        let courses = &self.courses;
        match input.media {
            Some(upload) => {
                let updated = upload_then_write(&self.storage, "lectures", upload, |media| async move {
                    let lecture = Lecture {
                        media: Some(media),
                        ..lecture
                    };
                    if !courses.update_lecture(&lecture).await? {
                        return Err(LmsError::NotFound("lecture"));
                    }
                    Ok::<_, LmsError>(lecture)
                })
                .await?;
                if let Some(old) = &current.media {
                    delete_quietly(&self.storage, &old.asset_id).await;
                }
                Ok(updated)
            }
            None => {
                if !courses.update_lecture(&lecture).await? {
                    return Err(LmsError::NotFound("lecture"));
                }
                Ok(lecture)
            }
        }
    }
}

// ── Quizzes ──────────────────────────────────────────────────────────────────

pub struct ListQuizzesUseCase<C: CourseRepository, P: PurchaseRepository> {
    pub courses: C,
    pub purchases: P,
}

impl<C: CourseRepository, P: PurchaseRepository> ListQuizzesUseCase<C, P> {
    pub async fn execute(&self, caller: Caller, course_id: Uuid) -> Result<Vec<Quiz>, LmsError> {
        find_course(&self.courses, course_id).await?;
        ensure_course_access(&self.purchases, caller, course_id).await?;
        self.courses.quizzes(course_id).await
    }
}

pub struct GetQuizUseCase<C: CourseRepository, P: PurchaseRepository> {
    pub courses: C,
    pub purchases: P,
}

impl<C: CourseRepository, P: PurchaseRepository> GetQuizUseCase<C, P> {
    pub async fn execute(&self, caller: Caller, course_id: Uuid, quiz_id: Uuid) -> Result<Quiz, LmsError> {
        find_course(&self.courses, course_id).await?;
        ensure_course_access(&self.purchases, caller, course_id).await?;
        self.courses
            .find_quiz(course_id, quiz_id)
            .await?
            .ok_or(LmsError::NotFound("quiz"))
    }
}

pub struct QuestionInput {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub points: i64,
}

/// Fields of a question to replace; the rest are kept.
#[derive(Default)]
pub struct QuestionPatch {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub points: Option<i64>,
}

impl QuestionPatch {
    fn is_empty(&self) -> bool {
        self.question.is_none()
            && self.options.is_none()
            && self.correct_answer.is_none()
            && self.points.is_none()
    }

    fn apply_to(self, current: &Question) -> QuestionInput {
        QuestionInput {
            question: self.question.unwrap_or_else(|| current.question.clone()),
            options: self.options.unwrap_or_else(|| current.options.clone()),
            correct_answer: self
                .correct_answer
                .unwrap_or_else(|| current.correct_answer.clone()),
            points: self.points.unwrap_or(current.points),
        }
    }
}

/// Validate `input` into a question of `quiz_id`. Options are trimmed and
/// blank ones dropped; the correct answer must be one of them.
fn build_question(
    id: Uuid,
    quiz_id: Uuid,
    created_at: DateTime<Utc>,
    input: QuestionInput,
) -> Result<Question, LmsError> {
    let question = required("question", &input.question)?;
    let options: Vec<String> = input
        .options
        .iter()
        .map(|o| o.trim().to_owned())
        .filter(|o| !o.is_empty())
        .collect();
    if options.len() < MIN_OPTIONS {
        return Err(LmsError::validation(format!(
            "a question needs at least {MIN_OPTIONS} options"
        )));
    }
    let correct_answer = input.correct_answer.trim().to_owned();
    if !options.contains(&correct_answer) {
        return Err(LmsError::validation("correct answer must be one of the options"));
    }
    if input.points < 1 {
        return Err(LmsError::validation("points must be positive"));
    }
    Ok(Question {
        id,
        quiz_id,
        question,
        options,
        correct_answer,
        points: input.points,
        created_at,
    })
}

pub struct QuizAdminUseCase<C: CourseRepository> {
    pub courses: C,
}

impl<C: CourseRepository> QuizAdminUseCase<C> {
    pub async fn add_quiz(&self, course_id: Uuid, title: &str, description: &str) -> Result<Quiz, LmsError> {
        let title = required("title", title)?;
        find_course(&self.courses, course_id).await?;
        let quiz = Quiz {
            id: Uuid::now_v7(),
            course_id,
            title,
            description: description.trim().to_owned(),
            total_points: 0,
            questions: vec![],
            created_at: Utc::now(),
        };
        self.courses.add_quiz(&quiz).await?;
        Ok(quiz)
    }

    pub async fn update_quiz(
        &self,
        course_id: Uuid,
        quiz_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Quiz, LmsError> {
        if title.is_none() && description.is_none() {
            return Err(LmsError::validation("no quiz fields to update"));
        }
        let mut quiz = self
            .courses
            .find_quiz(course_id, quiz_id)
            .await?
            .ok_or(LmsError::NotFound("quiz"))?;
        if let Some(title) = title {
            quiz.title = required("title", title)?;
        }
        if let Some(description) = description {
            quiz.description = description.trim().to_owned();
        }
        if !self.courses.update_quiz(&quiz).await? {
            return Err(LmsError::NotFound("quiz"));
        }
        Ok(quiz)
    }

    pub async fn delete_quiz(&self, course_id: Uuid, quiz_id: Uuid) -> Result<(), LmsError> {
        if !self.courses.delete_quiz(course_id, quiz_id).await? {
            return Err(LmsError::NotFound("quiz"));
        }
        Ok(())
    }

    /// Add a question; returns it with the quiz's new total points.
    pub async fn add_question(
        &self,
        course_id: Uuid,
        quiz_id: Uuid,
        input: QuestionInput,
    ) -> Result<(Question, i64), LmsError> {
        let question = build_question(Uuid::now_v7(), quiz_id, Utc::now(), input)?;
        self.courses
            .find_quiz(course_id, quiz_id)
            .await?
            .ok_or(LmsError::NotFound("quiz"))?;
        let total = self.courses.add_question(&question).await?;
        Ok((question, total))
    }

    /// Replace some fields of a question; returns it with the quiz's new
    /// total points.
    pub async fn update_question(
        &self,
        course_id: Uuid,
        quiz_id: Uuid,
        question_id: Uuid,
        patch: QuestionPatch,
    ) -> Result<(Question, i64), LmsError> {
        if patch.is_empty() {
            return Err(LmsError::validation("no question fields to update"));
        }
        let quiz = self
            .courses
            .find_quiz(course_id, quiz_id)
            .await?
            .ok_or(LmsError::NotFound("quiz"))?;
        let current = quiz
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(LmsError::NotFound("question"))?;
        let question = build_question(
            current.id,
            quiz_id,
            current.created_at,
            patch.apply_to(current),
        )?;
        let total = self
            .courses
            .update_question(&question)
            .await?
            .ok_or(LmsError::NotFound("question"))?;
        Ok((question, total))
    }

    /// Delete a question; returns the quiz's new total points.
    pub async fn delete_question(
        &self,
        course_id: Uuid,
        quiz_id: Uuid,
        question_id: Uuid,
    ) -> Result<i64, LmsError> {
        self.courses
            .find_quiz(course_id, quiz_id)
            .await?
            .ok_or(LmsError::NotFound("quiz"))?;
        self.courses
            .delete_question(quiz_id, question_id)
            .await?
            .ok_or(LmsError::NotFound("question"))
    }
}

// ── Sequence ─────────────────────────────────────────────────────────────────

/// One resolved sequence step.
#[derive(Debug, Clone)]
pub enum SequenceStep {
    Video(Lecture),
    Quiz(Quiz),
    /// The step points at content that no longer exists.
    Missing(SequenceItem),
}

pub struct GetSequenceUseCase<C: CourseRepository, P: PurchaseRepository> {
    pub courses: C,
    pub purchases: P,
}

impl<C: CourseRepository, P: PurchaseRepository> GetSequenceUseCase<C, P> {
    pub async fn execute(&self, caller: Caller, course_id: Uuid) -> Result<Vec<SequenceStep>, LmsError> {
        find_course(&self.courses, course_id).await?;
        ensure_course_access(&self.purchases, caller, course_id).await?;
        let items = self.courses.sequence(course_id).await?;
        let lectures = self.courses.lectures(course_id).await?;
        let quizzes = self.courses.quizzes(course_id).await?;
        Ok(items
            .into_iter()
            .map(|item| match item.kind {
                SequenceKind::Video => lectures
                    .iter()
                    .find(|l| l.id == item.content_id)
                    .cloned()
                    .map_or(SequenceStep::Missing(item), SequenceStep::Video),
                SequenceKind::Quiz => quizzes
                    .iter()
                    .find(|q| q.id == item.content_id)
                    .cloned()
                    .map_or(SequenceStep::Missing(item), SequenceStep::Quiz),
            })
            .collect())
    }
}

pub struct UpdateSequenceUseCase<C: CourseRepository> {
    pub courses: C,
}

impl<C: CourseRepository> UpdateSequenceUseCase<C> {
    /// Replace the sequence. Every step must reference existing content of
    /// its declared kind, and no content may appear twice.
    pub async fn execute(&self, course_id: Uuid, items: Vec<SequenceItem>) -> Result<Vec<SequenceItem>, LmsError> {
        find_course(&self.courses, course_id).await?;
        let lectures: HashSet<Uuid> = self
            .courses
            .lectures(course_id)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();
        let quizzes: HashSet<Uuid> = self
            .courses
            .quizzes(course_id)
            .await?
            .into_iter()
            .map(|q| q.id)
            .collect();

        let mut seen = HashSet::new();
        for (position, item) in items.iter().enumerate() {
            let known = match item.kind {
                SequenceKind::Video => lectures.contains(&item.content_id),
                SequenceKind::Quiz => quizzes.contains(&item.content_id),
            };
            if !known {
                return Err(LmsError::validation(format!(
                    "sequence step {position} references unknown {} {}",
                    item.kind, item.content_id
                )));
            }
            if !seen.insert(item.content_id) {
                return Err(LmsError::validation(format!(
                    "sequence step {position} repeats {}",
                    item.content_id
                )));
            }
        }

        self.courses.replace_sequence(course_id, &items).await?;
        Ok(items)
    }
}

use std::collections::HashMap;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use ednova_domain::pagination::PageRequest;
use ednova_domain::user::UserRole;
use ednova_lms_schema::{
    announcements, badges, course_sequence, courses, lectures, purchases, questions, quizzes,
    user_badges, users,
};

use crate::domain::repository::{
    AnnouncementRepository, BadgeRepository, CourseRepository, PurchaseRepository,
    UserRepository,
};
use crate::domain::types::{
    AccountToken, AccountTokenKind, Announcement, AnnouncementCategory, Badge, Course, Lecture,
    Purchase, Question, Quiz, SequenceItem, StoredAsset, User,
};
use crate::error::LmsError;

fn asset(id: Option<String>, url: Option<String>) -> Option<StoredAsset> {
    match (id, url) {
        (Some(asset_id), Some(public_url)) => Some(StoredAsset {
            asset_id,
            public_url,
        }),
        _ => None,
    }
}

fn asset_columns(asset: Option<&StoredAsset>) -> (Option<String>, Option<String>) {
    match asset {
        Some(a) => (Some(a.asset_id.clone()), Some(a.public_url.clone())),
        None => (None, None),
    }
}

// ── User repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, LmsError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user by id")?;
        Ok(model.map(user_from_model))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, LmsError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find user by email")?;
        Ok(model.map(user_from_model))
    }

    async fn email_taken(&self, email: &str) -> Result<bool, LmsError> {
        let count = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .count(&self.db)
            .await
            .context("count users by email")?;
        Ok(count > 0)
    }

    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> Result<bool, LmsError> {
        let mut query = users::Entity::find().filter(users::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(users::Column::Id.ne(id));
        }
        let count = query
            .count(&self.db)
            .await
            .context("count users by name")?;
        Ok(count > 0)
    }

    async fn create(&self, user: &User) -> Result<(), LmsError> {
        let (avatar_asset_id, avatar_url) = asset_columns(user.avatar.as_ref());
        users::ActiveModel {
            id: Set(user.id),
            name: Set(user.name.clone()),
            email: Set(user.email.clone()),
            password_hash: Set(user.password_hash.clone()),
            role: Set(i16::from(user.role.as_u8())),
            xp: Set(user.xp),
            verified: Set(user.verified),
            avatar_asset_id: Set(avatar_asset_id),
            avatar_url: Set(avatar_url),
            verify_token_hash: Set(None),
            verify_token_expires_at: Set(None),
            reset_token_hash: Set(None),
            reset_token_expires_at: Set(None),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
        }
        .insert(&self.db)
        .await
        .context("insert user")?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        avatar: Option<&StoredAsset>,
    ) -> Result<(), LmsError> {
        let mut model = users::ActiveModel {
            id: Set(id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(name) = name {
            model.name = Set(name.to_owned());
        }
        if let Some(avatar) = avatar {
            model.avatar_asset_id = Set(Some(avatar.asset_id.clone()));
            model.avatar_url = Set(Some(avatar.public_url.clone()));
        }
        model.update(&self.db).await.context("update user profile")?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), LmsError> {
        users::ActiveModel {
            id: Set(id),
            password_hash: Set(password_hash.to_owned()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("update user password")?;
        Ok(())
    }

    async fn set_token(
        &self,
        id: Uuid,
        kind: AccountTokenKind,
        token: Option<&AccountToken>,
    ) -> Result<(), LmsError> {
        let digest = token.map(|t| t.digest.clone());
        let expires_at = token.map(|t| t.expires_at);
        let mut model = users::ActiveModel {
            id: Set(id),
            ..Default::default()
        };
        match kind {
            AccountTokenKind::Verify => {
                model.verify_token_hash = Set(digest);
                model.verify_token_expires_at = Set(expires_at);
            }
            AccountTokenKind::Reset => {
                model.reset_token_hash = Set(digest);
                model.reset_token_expires_at = Set(expires_at);
            }
        }
        model.update(&self.db).await.context("set account token")?;
        Ok(())
    }

    async fn find_by_token(
        &self,
        kind: AccountTokenKind,
        digest: &str,
    ) -> Result<Option<(User, AccountToken)>, LmsError> {
        let column = match kind {
            AccountTokenKind::Verify => users::Column::VerifyTokenHash,
            AccountTokenKind::Reset => users::Column::ResetTokenHash,
        };
        let model = users::Entity::find()
            .filter(column.eq(digest))
            .one(&self.db)
            .await
            .context("find user by account token")?;
        let Some(model) = model else {
            return Ok(None);
        };
        let expires_at = match kind {
            AccountTokenKind::Verify => model.verify_token_expires_at,
            AccountTokenKind::Reset => model.reset_token_expires_at,
        };
        let Some(expires_at) = expires_at else {
            return Ok(None);
        };
        let token = AccountToken {
            digest: digest.to_owned(),
            expires_at,
        };
        Ok(Some((user_from_model(model), token)))
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), LmsError> {
        users::ActiveModel {
            id: Set(id),
            verified: Set(true),
            verify_token_hash: Set(None),
            verify_token_expires_at: Set(None),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark user verified")?;
        Ok(())
    }

    async fn leaderboard(&self, page: PageRequest) -> Result<Vec<User>, LmsError> {
        let PageRequest { per_page, .. } = page.clamped();
        let models = users::Entity::find()
            .order_by_desc(users::Column::Xp)
            .order_by_asc(users::Column::CreatedAt)
            .offset(page.offset())
            .limit(u64::from(per_page))
            .all(&self.db)
            .await
            .context("list leaderboard")?;
        Ok(models.into_iter().map(user_from_model).collect())
    }

    async fn list_all(&self) -> Result<Vec<User>, LmsError> {
        let models = users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list users")?;
        Ok(models.into_iter().map(user_from_model).collect())
    }
}

pub(crate) fn user_from_model(model: users::Model) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        password_hash: model.password_hash,
        role: u8::try_from(model.role)
            .ok()
            .and_then(UserRole::from_u8)
            .unwrap_or(UserRole::User),
        xp: model.xp,
        verified: model.verified,
        avatar: asset(model.avatar_asset_id, model.avatar_url),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

// ── Course repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbCourseRepository {
    pub db: DatabaseConnection,
}

impl CourseRepository for DbCourseRepository {
    async fn list(&self, category: Option<&str>) -> Result<Vec<Course>, LmsError> {
        let mut query = courses::Entity::find();
        if let Some(category) = category {
            query = query.filter(courses::Column::Category.eq(category));
        }
        let models = query
            .order_by_desc(courses::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list courses")?;
        Ok(models.into_iter().map(course_from_model).collect())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Course>, LmsError> {
        let model = courses::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find course")?;
        Ok(model.map(course_from_model))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Course>, LmsError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let models = courses::Entity::find()
            .filter(courses::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(courses::Column::Title)
            .all(&self.db)
            .await
            .context("find courses by ids")?;
        Ok(models.into_iter().map(course_from_model).collect())
    }

    async fn title_taken(&self, title: &str, except: Option<Uuid>) -> Result<bool, LmsError> {
        let mut query = courses::Entity::find().filter(courses::Column::Title.eq(title));
        if let Some(id) = except {
            query = query.filter(courses::Column::Id.ne(id));
        }
        let count = query
            .count(&self.db)
            .await
            .context("count courses by title")?;
        Ok(count > 0)
    }

    async fn create(&self, course: &Course) -> Result<(), LmsError> {
        let (thumbnail_asset_id, thumbnail_url) = asset_columns(course.thumbnail.as_ref());
        courses::ActiveModel {
            id: Set(course.id),
            title: Set(course.title.clone()),
            description: Set(course.description.clone()),
            category: Set(course.category.clone()),
            price: Set(course.price),
            expiry_months: Set(course.expiry_months),
            created_by: Set(course.created_by.clone()),
            thumbnail_asset_id: Set(thumbnail_asset_id),
            thumbnail_url: Set(thumbnail_url),
            number_of_lectures: Set(0),
            created_at: Set(course.created_at),
            updated_at: Set(course.updated_at),
        }
        .insert(&self.db)
        .await
        .context("insert course")?;
        Ok(())
    }

    async fn update(&self, course: &Course) -> Result<(), LmsError> {
        let (thumbnail_asset_id, thumbnail_url) = asset_columns(course.thumbnail.as_ref());
        courses::ActiveModel {
            id: Set(course.id),
            title: Set(course.title.clone()),
            description: Set(course.description.clone()),
            category: Set(course.category.clone()),
            price: Set(course.price),
            expiry_months: Set(course.expiry_months),
            thumbnail_asset_id: Set(thumbnail_asset_id),
            thumbnail_url: Set(thumbnail_url),
            updated_at: Set(course.updated_at),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("update course")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, LmsError> {
        let result = courses::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .context("delete course")?;
        Ok(result.rows_affected > 0)
    }

    async fn categories(&self) -> Result<Vec<String>, LmsError> {
        let categories: Vec<String> = courses::Entity::find()
            .select_only()
            .column(courses::Column::Category)
            .distinct()
            .order_by_asc(courses::Column::Category)
            .into_tuple()
            .all(&self.db)
            .await
            .context("list course categories")?;
        Ok(categories)
    }

    async fn lectures(&self, course_id: Uuid) -> Result<Vec<Lecture>, LmsError> {
        let models = lectures::Entity::find()
            .filter(lectures::Column::CourseId.eq(course_id))
            .order_by_asc(lectures::Column::Position)
            .all(&self.db)
            .await
            .context("list lectures")?;
        Ok(models.into_iter().map(lecture_from_model).collect())
    }

    async fn find_lecture(
        &self,
        course_id: Uuid,
        lecture_id: Uuid,
    ) -> Result<Option<Lecture>, LmsError> {
        let model = lectures::Entity::find_by_id(lecture_id)
            .filter(lectures::Column::CourseId.eq(course_id))
            .one(&self.db)
            .await
            .context("find lecture")?;
        Ok(model.map(lecture_from_model))
    }

    async fn add_lecture(&self, lecture: &Lecture) -> Result<(), LmsError> {
        let txn = self.db.begin().await.context("begin add lecture")?;
        let course = courses::Entity::find_by_id(lecture.course_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .context("lock course")?
            .ok_or(LmsError::NotFound("course"))?;
        let (media_asset_id, media_url) = asset_columns(lecture.media.as_ref());
        lectures::ActiveModel {
            id: Set(lecture.id),
            course_id: Set(lecture.course_id),
            name: Set(lecture.name.clone()),
            description: Set(lecture.description.clone()),
            media_asset_id: Set(media_asset_id),
            media_url: Set(media_url),
            position: Set(course.number_of_lectures),
            created_at: Set(lecture.created_at),
        }
        .insert(&txn)
        .await
        .context("insert lecture")?;
        set_lecture_count(&txn, course.id, course.number_of_lectures + 1).await?;
        txn.commit().await.context("commit add lecture")?;
        Ok(())
    }

    async fn update_lecture(&self, lecture: &Lecture) -> Result<bool, LmsError> {
        let (media_asset_id, media_url) = asset_columns(lecture.media.as_ref());
        let result = lectures::Entity::update_many()
            .col_expr(lectures::Column::Name, Expr::value(lecture.name.clone()))
            .col_expr(
                lectures::Column::Description,
                Expr::value(lecture.description.clone()),
            )
            .col_expr(lectures::Column::MediaAssetId, Expr::value(media_asset_id))
            .col_expr(lectures::Column::MediaUrl, Expr::value(media_url))
            .filter(lectures::Column::Id.eq(lecture.id))
            .filter(lectures::Column::CourseId.eq(lecture.course_id))
            .exec(&self.db)
            .await
            .context("update lecture")?;
        Ok(result.rows_affected > 0)
    }

    async fn remove_lecture(&self, course_id: Uuid, lecture_id: Uuid) -> Result<bool, LmsError> {
        let txn = self.db.begin().await.context("begin remove lecture")?;
        let course = courses::Entity::find_by_id(course_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .context("lock course")?
            .ok_or(LmsError::NotFound("course"))?;
        let removed = lectures::Entity::delete_many()
            .filter(lectures::Column::Id.eq(lecture_id))
            .filter(lectures::Column::CourseId.eq(course_id))
            .exec(&txn)
            .await
            .context("delete lecture")?;
        if removed.rows_affected == 0 {
            return Ok(false);
        }
        drop_from_sequence(&txn, course_id, lecture_id).await?;
        let remaining = lectures::Entity::find()
            .filter(lectures::Column::CourseId.eq(course_id))
            .count(&txn)
            .await
            .context("count lectures")?;
        let remaining = i32::try_from(remaining).context("lecture count overflow")?;
        set_lecture_count(&txn, course.id, remaining).await?;
        txn.commit().await.context("commit remove lecture")?;
        Ok(true)
    }

    async fn quizzes(&self, course_id: Uuid) -> Result<Vec<Quiz>, LmsError> {
        let quiz_models = quizzes::Entity::find()
            .filter(quizzes::Column::CourseId.eq(course_id))
            .order_by_asc(quizzes::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list quizzes")?;
        if quiz_models.is_empty() {
            return Ok(vec![]);
        }
        let question_models = questions::Entity::find()
            .filter(questions::Column::QuizId.is_in(quiz_models.iter().map(|q| q.id)))
            .order_by_asc(questions::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list questions")?;
        let mut by_quiz: HashMap<Uuid, Vec<questions::Model>> = HashMap::new();
        for question in question_models {
            by_quiz.entry(question.quiz_id).or_default().push(question);
        }
        Ok(quiz_models
            .into_iter()
            .map(|quiz| {
                let questions = by_quiz.remove(&quiz.id).unwrap_or_default();
                quiz_from_model(quiz, questions)
            })
            .collect())
    }

    async fn find_quiz(&self, course_id: Uuid, quiz_id: Uuid) -> Result<Option<Quiz>, LmsError> {
        let Some(quiz) = quizzes::Entity::find_by_id(quiz_id)
            .filter(quizzes::Column::CourseId.eq(course_id))
            .one(&self.db)
            .await
            .context("find quiz")?
        else {
            return Ok(None);
        };
        let questions = questions::Entity::find()
            .filter(questions::Column::QuizId.eq(quiz_id))
            .order_by_asc(questions::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list quiz questions")?;
        Ok(Some(quiz_from_model(quiz, questions)))
    }

    async fn add_quiz(&self, quiz: &Quiz) -> Result<(), LmsError> {
        quizzes::ActiveModel {
            id: Set(quiz.id),
            course_id: Set(quiz.course_id),
            title: Set(quiz.title.clone()),
            description: Set(quiz.description.clone()),
            total_points: Set(0),
            created_at: Set(quiz.created_at),
        }
        .insert(&self.db)
        .await
        .context("insert quiz")?;
        Ok(())
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<bool, LmsError> {
        let result = quizzes::Entity::update_many()
            .col_expr(quizzes::Column::Title, Expr::value(quiz.title.clone()))
            .col_expr(
                quizzes::Column::Description,
                Expr::value(quiz.description.clone()),
            )
            .filter(quizzes::Column::Id.eq(quiz.id))
            .filter(quizzes::Column::CourseId.eq(quiz.course_id))
            .exec(&self.db)
            .await
            .context("update quiz")?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_quiz(&self, course_id: Uuid, quiz_id: Uuid) -> Result<bool, LmsError> {
        let txn = self.db.begin().await.context("begin delete quiz")?;
        let removed = quizzes::Entity::delete_many()
            .filter(quizzes::Column::Id.eq(quiz_id))
            .filter(quizzes::Column::CourseId.eq(course_id))
            .exec(&txn)
            .await
            .context("delete quiz")?;
        if removed.rows_affected == 0 {
            return Ok(false);
        }
        drop_from_sequence(&txn, course_id, quiz_id).await?;
        txn.commit().await.context("commit delete quiz")?;
        Ok(true)
    }

    async fn add_question(&self, question: &Question) -> Result<i64, LmsError> {
        let txn = self.db.begin().await.context("begin add question")?;
        let quiz = quizzes::Entity::find_by_id(question.quiz_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .context("lock quiz")?
            .ok_or(LmsError::NotFound("quiz"))?;
        questions::ActiveModel {
            id: Set(question.id),
            quiz_id: Set(question.quiz_id),
            question: Set(question.question.clone()),
            options: Set(serde_json::to_value(&question.options).context("encode options")?),
            correct_answer: Set(question.correct_answer.clone()),
            points: Set(question.points),
            created_at: Set(question.created_at),
        }
        .insert(&txn)
        .await
        .context("insert question")?;
        let total = quiz.total_points + question.points;
        set_quiz_total(&txn, quiz.id, total).await?;
        txn.commit().await.context("commit add question")?;
        Ok(total)
    }

    async fn update_question(&self, question: &Question) -> Result<Option<i64>, LmsError> {
        let txn = self.db.begin().await.context("begin update question")?;
        quizzes::Entity::find_by_id(question.quiz_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .context("lock quiz")?
            .ok_or(LmsError::NotFound("quiz"))?;
        let options = serde_json::to_value(&question.options).context("encode options")?;
        let updated = questions::Entity::update_many()
            .col_expr(
                questions::Column::Question,
                Expr::value(question.question.clone()),
            )
            .col_expr(questions::Column::Options, Expr::value(options))
            .col_expr(
                questions::Column::CorrectAnswer,
                Expr::value(question.correct_answer.clone()),
            )
            .col_expr(questions::Column::Points, Expr::value(question.points))
            .filter(questions::Column::Id.eq(question.id))
            .filter(questions::Column::QuizId.eq(question.quiz_id))
            .exec(&txn)
            .await
            .context("update question")?;
        if updated.rows_affected == 0 {
            return Ok(None);
        }
        let total = quiz_points(&txn, question.quiz_id).await?;
        set_quiz_total(&txn, question.quiz_id, total).await?;
        txn.commit().await.context("commit update question")?;
        Ok(Some(total))
    }

    async fn delete_question(
        &self,
        quiz_id: Uuid,
        question_id: Uuid,
    ) -> Result<Option<i64>, LmsError> {
        let txn = self.db.begin().await.context("begin delete question")?;
        quizzes::Entity::find_by_id(quiz_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .context("lock quiz")?
            .ok_or(LmsError::NotFound("quiz"))?;
        let removed = questions::Entity::delete_many()
            .filter(questions::Column::Id.eq(question_id))
            .filter(questions::Column::QuizId.eq(quiz_id))
            .exec(&txn)
            .await
            .context("delete question")?;
        if removed.rows_affected == 0 {
            return Ok(None);
        }
        let total = quiz_points(&txn, quiz_id).await?;
        set_quiz_total(&txn, quiz_id, total).await?;
        txn.commit().await.context("commit delete question")?;
        Ok(Some(total))
    }

    async fn sequence(&self, course_id: Uuid) -> Result<Vec<SequenceItem>, LmsError> {
        let models = course_sequence::Entity::find()
            .filter(course_sequence::Column::CourseId.eq(course_id))
            .order_by_asc(course_sequence::Column::Position)
            .all(&self.db)
            .await
            .context("list course sequence")?;
        let mut items = Vec::with_capacity(models.len());
        for model in models {
            match model.kind.parse() {
                Ok(kind) => items.push(SequenceItem {
                    kind,
                    content_id: model.content_id,
                }),
                Err(e) => tracing::warn!(course_id = %course_id, error = %e, "skipping sequence entry"),
            }
        }
        Ok(items)
    }

    async fn replace_sequence(
        &self,
        course_id: Uuid,
        items: &[SequenceItem],
    ) -> Result<(), LmsError> {
        let txn = self.db.begin().await.context("begin replace sequence")?;
        course_sequence::Entity::delete_many()
            .filter(course_sequence::Column::CourseId.eq(course_id))
            .exec(&txn)
            .await
            .context("clear course sequence")?;
        insert_sequence(&txn, course_id, items).await?;
        txn.commit().await.context("commit replace sequence")?;
        Ok(())
    }
}

async fn set_lecture_count<C: ConnectionTrait>(
    conn: &C,
    course_id: Uuid,
    count: i32,
) -> Result<(), LmsError> {
    courses::ActiveModel {
        id: Set(course_id),
        number_of_lectures: Set(count),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("update lecture count")?;
    Ok(())
}

/// Sum of the points of every question currently in the quiz.
async fn quiz_points<C: ConnectionTrait>(conn: &C, quiz_id: Uuid) -> Result<i64, LmsError> {
    let points: Vec<i64> = questions::Entity::find()
        .select_only()
        .column(questions::Column::Points)
        .filter(questions::Column::QuizId.eq(quiz_id))
        .into_tuple()
        .all(conn)
        .await
        .context("list question points")?;
    Ok(points.iter().sum())
}

async fn set_quiz_total<C: ConnectionTrait>(
    conn: &C,
    quiz_id: Uuid,
    total: i64,
) -> Result<(), LmsError> {
    quizzes::ActiveModel {
        id: Set(quiz_id),
        total_points: Set(total),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("update quiz total")?;
    Ok(())
}

/// Remove every sequence step pointing at `content_id` and renumber the rest.
async fn drop_from_sequence<C: ConnectionTrait>(
    conn: &C,
    course_id: Uuid,
    content_id: Uuid,
) -> Result<(), LmsError> {
    let models = course_sequence::Entity::find()
        .filter(course_sequence::Column::CourseId.eq(course_id))
        .order_by_asc(course_sequence::Column::Position)
        .all(conn)
        .await
        .context("load course sequence")?;
    if !models.iter().any(|m| m.content_id == content_id) {
        return Ok(());
    }
    let kept: Vec<SequenceItem> = models
        .into_iter()
        .filter(|m| m.content_id != content_id)
        .filter_map(|m| {
            m.kind.parse().ok().map(|kind| SequenceItem {
                kind,
                content_id: m.content_id,
            })
        })
        .collect();
    course_sequence::Entity::delete_many()
        .filter(course_sequence::Column::CourseId.eq(course_id))
        .exec(conn)
        .await
        .context("clear course sequence")?;
    insert_sequence(conn, course_id, &kept).await
}

async fn insert_sequence<C: ConnectionTrait>(
    conn: &C,
    course_id: Uuid,
    items: &[SequenceItem],
) -> Result<(), LmsError> {
    if items.is_empty() {
        return Ok(());
    }
    let mut rows = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        rows.push(course_sequence::ActiveModel {
            course_id: Set(course_id),
            position: Set(i32::try_from(position).context("sequence too long")?),
            kind: Set(item.kind.as_str().to_owned()),
            content_id: Set(item.content_id),
        });
    }
    course_sequence::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await
        .context("insert course sequence")?;
    Ok(())
}

fn course_from_model(model: courses::Model) -> Course {
    Course {
        id: model.id,
        title: model.title,
        description: model.description,
        category: model.category,
        price: model.price,
        expiry_months: model.expiry_months,
        created_by: model.created_by,
        thumbnail: asset(model.thumbnail_asset_id, model.thumbnail_url),
        number_of_lectures: model.number_of_lectures,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn lecture_from_model(model: lectures::Model) -> Lecture {
    Lecture {
        id: model.id,
        course_id: model.course_id,
        name: model.name,
        description: model.description,
        media: asset(model.media_asset_id, model.media_url),
        position: model.position,
        created_at: model.created_at,
    }
}

fn quiz_from_model(model: quizzes::Model, questions: Vec<questions::Model>) -> Quiz {
    let mut questions: Vec<Question> = questions.into_iter().map(question_from_model).collect();
    questions.sort_by_key(|q| q.created_at);
    Quiz {
        id: model.id,
        course_id: model.course_id,
        title: model.title,
        description: model.description,
        total_points: model.total_points,
        questions,
        created_at: model.created_at,
    }
}

fn question_from_model(model: questions::Model) -> Question {
    Question {
        id: model.id,
        quiz_id: model.quiz_id,
        question: model.question,
        options: serde_json::from_value(model.options).unwrap_or_default(),
        correct_answer: model.correct_answer,
        points: model.points,
        created_at: model.created_at,
    }
}

// ── Purchase repository ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbPurchaseRepository {
    pub db: DatabaseConnection,
}

impl PurchaseRepository for DbPurchaseRepository {
    async fn has_active(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, LmsError> {
        let count = purchases::Entity::find()
            .filter(purchases::Column::UserId.eq(user_id))
            .filter(purchases::Column::CourseId.eq(course_id))
            .filter(purchases::Column::ExpirationDate.gt(now))
            .count(&self.db)
            .await
            .context("count active purchases")?;
        Ok(count > 0)
    }

    async fn record(&self, purchase: &Purchase) -> Result<bool, LmsError> {
        let model = purchases::ActiveModel {
            id: Set(purchase.id),
            user_id: Set(purchase.user_id),
            course_id: Set(purchase.course_id),
            payment_session_id: Set(purchase.payment_session_id.clone()),
            purchase_date: Set(purchase.purchase_date),
            expiration_date: Set(purchase.expiration_date),
        };
        let inserted = purchases::Entity::insert(model)
            .on_conflict(
                OnConflict::column(purchases::Column::PaymentSessionId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert purchase")?;
        Ok(inserted > 0)
    }

    async fn purchased_course_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, LmsError> {
        let ids: Vec<Uuid> = purchases::Entity::find()
            .select_only()
            .column(purchases::Column::CourseId)
            .distinct()
            .filter(purchases::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await
            .context("list purchased course ids")?;
        Ok(ids)
    }

    async fn list_all(&self) -> Result<Vec<Purchase>, LmsError> {
        let models = purchases::Entity::find()
            .order_by_asc(purchases::Column::PurchaseDate)
            .all(&self.db)
            .await
            .context("list purchases")?;
        Ok(models
            .into_iter()
            .map(|m| Purchase {
                id: m.id,
                user_id: m.user_id,
                course_id: m.course_id,
                payment_session_id: m.payment_session_id,
                purchase_date: m.purchase_date,
                expiration_date: m.expiration_date,
            })
            .collect())
    }
}

// ── Badge repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbBadgeRepository {
    pub db: DatabaseConnection,
}

impl BadgeRepository for DbBadgeRepository {
    async fn list(&self) -> Result<Vec<Badge>, LmsError> {
        let models = badges::Entity::find()
            .order_by_asc(badges::Column::XpThreshold)
            .all(&self.db)
            .await
            .context("list badges")?;
        Ok(models.into_iter().map(badge_from_model).collect())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Badge>, LmsError> {
        let model = badges::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find badge")?;
        Ok(model.map(badge_from_model))
    }

    async fn create(&self, badge: &Badge) -> Result<(), LmsError> {
        let (image_asset_id, image_url) = asset_columns(badge.image.as_ref());
        badges::ActiveModel {
            id: Set(badge.id),
            title: Set(badge.title.clone()),
            content: Set(badge.content.clone()),
            image_asset_id: Set(image_asset_id),
            image_url: Set(image_url),
            xp_threshold: Set(badge.xp_threshold),
            created_at: Set(badge.created_at),
        }
        .insert(&self.db)
        .await
        .context("insert badge")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, LmsError> {
        let result = badges::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .context("delete badge")?;
        Ok(result.rows_affected > 0)
    }

    async fn held_by_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Uuid>>, LmsError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = user_badges::Entity::find()
            .filter(user_badges::Column::UserId.is_in(user_ids.iter().copied()))
            .order_by_asc(user_badges::Column::AwardedAt)
            .all(&self.db)
            .await
            .context("list held badges")?;
        let mut held: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for row in rows {
            held.entry(row.user_id).or_default().push(row.badge_id);
        }
        Ok(held)
    }
}

fn badge_from_model(model: badges::Model) -> Badge {
    Badge {
        id: model.id,
        title: model.title,
        content: model.content,
        image: asset(model.image_asset_id, model.image_url),
        xp_threshold: model.xp_threshold,
        created_at: model.created_at,
    }
}

// ── Announcement repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAnnouncementRepository {
    pub db: DatabaseConnection,
}

impl AnnouncementRepository for DbAnnouncementRepository {
    async fn list(&self, page: PageRequest) -> Result<Vec<Announcement>, LmsError> {
        let PageRequest { per_page, .. } = page.clamped();
        let models = announcements::Entity::find()
            .order_by_desc(announcements::Column::CreatedAt)
            .offset(page.offset())
            .limit(u64::from(per_page))
            .all(&self.db)
            .await
            .context("list announcements")?;
        Ok(models
            .into_iter()
            .filter_map(|m| {
                let category = AnnouncementCategory::parse(&m.category)?;
                Some(Announcement {
                    id: m.id,
                    title: m.title,
                    content: m.content,
                    category,
                    created_at: m.created_at,
                })
            })
            .collect())
    }

    async fn create(&self, announcement: &Announcement) -> Result<(), LmsError> {
        announcements::ActiveModel {
            id: Set(announcement.id),
            title: Set(announcement.title.clone()),
            content: Set(announcement.content.clone()),
            category: Set(announcement.category.as_str().to_owned()),
            created_at: Set(announcement.created_at),
        }
        .insert(&self.db)
        .await
        .context("insert announcement")?;
        Ok(())
    }
}

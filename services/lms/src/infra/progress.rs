use std::collections::{HashMap, HashSet};

use anyhow::Context as _;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::OnConflict,
};
use uuid::Uuid;

use ednova_domain::badge::{BadgePlan, BadgeThreshold};
use ednova_domain::xp;
use ednova_lms_schema::{
    badges, course_progress, lecture_progress, quiz_attempts, user_badges, users,
};

use crate::domain::repository::{ProgressRepository, ProgressUnit};
use crate::domain::types::{CourseProgress, Enrollment, LectureProgress, QuizAttempt};
use crate::error::LmsError;

#[derive(Clone)]
pub struct DbProgressRepository {
    pub db: DatabaseConnection,
}

impl ProgressRepository for DbProgressRepository {
    type Unit = DbProgressUnit;

    async fn begin(&self, user_id: Uuid) -> Result<DbProgressUnit, LmsError> {
        let txn = self.db.begin().await.context("begin progress unit")?;
        // SELECT ... FOR UPDATE: concurrent units for the same user queue here.
        let user = users::Entity::find_by_id(user_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .context("lock user row")?
            .ok_or(LmsError::NotFound("user"))?;
        Ok(DbProgressUnit {
            txn,
            user_id,
            xp: user.xp,
        })
    }

    async fn course_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<CourseProgress>, LmsError> {
        let entry = course_progress::Entity::find_by_id((user_id, course_id))
            .one(&self.db)
            .await
            .context("find course progress")?;
        if entry.is_none() {
            return Ok(None);
        }
        let lectures = lecture_progress::Entity::find()
            .filter(lecture_progress::Column::UserId.eq(user_id))
            .filter(lecture_progress::Column::CourseId.eq(course_id))
            .all(&self.db)
            .await
            .context("list lecture progress")?;
        let attempts = quiz_attempts::Entity::find()
            .filter(quiz_attempts::Column::UserId.eq(user_id))
            .filter(quiz_attempts::Column::CourseId.eq(course_id))
            .order_by_asc(quiz_attempts::Column::SubmittedAt)
            .all(&self.db)
            .await
            .context("list quiz attempts")?;
        Ok(Some(CourseProgress {
            lectures: lectures
                .into_iter()
                .map(lecture_progress_from_model)
                .collect::<Result<_, _>>()?,
            quiz_attempts: attempts.into_iter().map(attempt_from_model).collect(),
        }))
    }

    async fn lecture_progress(
        &self,
        user_id: Uuid,
        lecture_id: Uuid,
    ) -> Result<Option<LectureProgress>, LmsError> {
        let model = lecture_progress::Entity::find_by_id((user_id, lecture_id))
            .one(&self.db)
            .await
            .context("find lecture progress")?;
        model.map(lecture_progress_from_model).transpose()
    }

    async fn init_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), LmsError> {
        insert_course_entry(&self.db, user_id, course_id).await
    }

    async fn enrollments(&self) -> Result<Vec<Enrollment>, LmsError> {
        let entries = course_progress::Entity::find()
            .order_by_asc(course_progress::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list course progress entries")?;
        let marked: Vec<(Uuid, Uuid, i64)> = lecture_progress::Entity::find()
            .select_only()
            .column(lecture_progress::Column::UserId)
            .column(lecture_progress::Column::CourseId)
            .column_as(lecture_progress::Column::LectureId.count(), "marked")
            .filter(lecture_progress::Column::Marked.eq(true))
            .group_by(lecture_progress::Column::UserId)
            .group_by(lecture_progress::Column::CourseId)
            .into_tuple()
            .all(&self.db)
            .await
            .context("count marked lectures")?;
        let marked: HashMap<(Uuid, Uuid), i64> = marked
            .into_iter()
            .map(|(user_id, course_id, count)| ((user_id, course_id), count))
            .collect();
        Ok(entries
            .into_iter()
            .map(|entry| Enrollment {
                marked_lectures: marked
                    .get(&(entry.user_id, entry.course_id))
                    .copied()
                    .unwrap_or(0),
                user_id: entry.user_id,
                course_id: entry.course_id,
                enrolled_at: entry.created_at,
            })
            .collect())
    }
}

/// Open transaction holding the user's row lock.
pub struct DbProgressUnit {
    txn: DatabaseTransaction,
    user_id: Uuid,
    xp: i64,
}

impl ProgressUnit for DbProgressUnit {
    async fn ensure_course(&mut self, course_id: Uuid) -> Result<(), LmsError> {
        insert_course_entry(&self.txn, self.user_id, course_id).await
    }

    async fn lecture_progress(
        &mut self,
        lecture_id: Uuid,
    ) -> Result<Option<LectureProgress>, LmsError> {
        let model = lecture_progress::Entity::find_by_id((self.user_id, lecture_id))
            .one(&self.txn)
            .await
            .context("find lecture progress")?;
        model.map(lecture_progress_from_model).transpose()
    }

    async fn save_lecture_progress(&mut self, progress: &LectureProgress) -> Result<(), LmsError> {
        let model = lecture_progress::ActiveModel {
            user_id: Set(progress.user_id),
            lecture_id: Set(progress.lecture_id),
            course_id: Set(progress.course_id),
            marked: Set(progress.marked),
            notes: Set(serde_json::to_value(&progress.notes).context("encode notes")?),
            updated_at: Set(progress.updated_at),
        };
        lecture_progress::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    lecture_progress::Column::UserId,
                    lecture_progress::Column::LectureId,
                ])
                .update_columns([
                    lecture_progress::Column::Marked,
                    lecture_progress::Column::Notes,
                    lecture_progress::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await
            .context("upsert lecture progress")?;
        Ok(())
    }

    async fn best_quiz_score(&mut self, quiz_id: Uuid) -> Result<Option<i64>, LmsError> {
        let scores: Vec<i64> = quiz_attempts::Entity::find()
            .select_only()
            .column(quiz_attempts::Column::Score)
            .filter(quiz_attempts::Column::UserId.eq(self.user_id))
            .filter(quiz_attempts::Column::QuizId.eq(quiz_id))
            .into_tuple()
            .all(&self.txn)
            .await
            .context("list quiz scores")?;
        Ok(scores.into_iter().max())
    }

    async fn append_quiz_attempt(&mut self, attempt: &QuizAttempt) -> Result<(), LmsError> {
        quiz_attempts::ActiveModel {
            id: Set(attempt.id),
            user_id: Set(attempt.user_id),
            course_id: Set(attempt.course_id),
            quiz_id: Set(attempt.quiz_id),
            score: Set(attempt.score),
            total_points: Set(attempt.total_points),
            submitted_at: Set(attempt.submitted_at),
        }
        .insert(&self.txn)
        .await
        .context("insert quiz attempt")?;
        Ok(())
    }

    async fn apply_xp_delta(&mut self, delta: i64) -> Result<i64, LmsError> {
        let total = xp::apply_delta(self.xp, delta);
        if total != self.xp {
            users::ActiveModel {
                id: Set(self.user_id),
                xp: Set(total),
                updated_at: Set(Utc::now()),
                ..Default::default()
            }
            .update(&self.txn)
            .await
            .context("update user xp")?;
            self.xp = total;
        }
        Ok(total)
    }

    async fn held_badges(&mut self) -> Result<HashSet<Uuid>, LmsError> {
        let ids: Vec<Uuid> = user_badges::Entity::find()
            .select_only()
            .column(user_badges::Column::BadgeId)
            .filter(user_badges::Column::UserId.eq(self.user_id))
            .into_tuple()
            .all(&self.txn)
            .await
            .context("list held badges")?;
        Ok(ids.into_iter().collect())
    }

    async fn badge_catalog(&mut self) -> Result<Vec<BadgeThreshold>, LmsError> {
        let rows: Vec<(Uuid, i64)> = badges::Entity::find()
            .select_only()
            .column(badges::Column::Id)
            .column(badges::Column::XpThreshold)
            .into_tuple()
            .all(&self.txn)
            .await
            .context("load badge catalog")?;
        Ok(rows
            .into_iter()
            .map(|(id, xp_threshold)| BadgeThreshold { id, xp_threshold })
            .collect())
    }

    async fn apply_badge_plan(&mut self, plan: &BadgePlan) -> Result<(), LmsError> {
        if !plan.awarded.is_empty() {
            let now = Utc::now();
            let rows = plan.awarded.iter().map(|badge_id| user_badges::ActiveModel {
                user_id: Set(self.user_id),
                badge_id: Set(*badge_id),
                awarded_at: Set(now),
            });
            user_badges::Entity::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([
                        user_badges::Column::UserId,
                        user_badges::Column::BadgeId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.txn)
                .await
                .context("award badges")?;
        }
        if !plan.revoked.is_empty() {
            user_badges::Entity::delete_many()
                .filter(user_badges::Column::UserId.eq(self.user_id))
                .filter(user_badges::Column::BadgeId.is_in(plan.revoked.iter().copied()))
                .exec(&self.txn)
                .await
                .context("revoke badges")?;
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), LmsError> {
        self.txn.commit().await.context("commit progress unit")?;
        Ok(())
    }
}

async fn insert_course_entry<C: sea_orm::ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<(), LmsError> {
    let model = course_progress::ActiveModel {
        user_id: Set(user_id),
        course_id: Set(course_id),
        created_at: Set(Utc::now()),
    };
    course_progress::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                course_progress::Column::UserId,
                course_progress::Column::CourseId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .context("insert course progress")?;
    Ok(())
}

fn lecture_progress_from_model(model: lecture_progress::Model) -> Result<LectureProgress, LmsError> {
    let notes = serde_json::from_value(model.notes)
        .with_context(|| format!("decode notes of lecture {}", model.lecture_id))?;
    Ok(LectureProgress {
        user_id: model.user_id,
        course_id: model.course_id,
        lecture_id: model.lecture_id,
        marked: model.marked,
        notes,
        updated_at: model.updated_at,
    })
}

fn attempt_from_model(model: quiz_attempts::Model) -> QuizAttempt {
    QuizAttempt {
        id: model.id,
        user_id: model.user_id,
        course_id: model.course_id,
        quiz_id: model.quiz_id,
        score: model.score,
        total_points: model.total_points,
        submitted_at: model.submitted_at,
    }
}

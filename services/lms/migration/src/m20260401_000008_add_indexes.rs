use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .table(Users::Table)
                    .col(Users::Xp)
                    .name("idx_users_xp")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(Purchases::Table)
                    .col(Purchases::UserId)
                    .col(Purchases::CourseId)
                    .name("idx_purchases_user_id_course_id")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(QuizAttempts::Table)
                    .col(QuizAttempts::UserId)
                    .col(QuizAttempts::QuizId)
                    .name("idx_quiz_attempts_user_id_quiz_id")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(Lectures::Table)
                    .col(Lectures::CourseId)
                    .name("idx_lectures_course_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_lectures_course_id").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_quiz_attempts_user_id_quiz_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_purchases_user_id_course_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_users_xp").to_owned())
            .await
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Xp,
}

#[derive(Iden)]
enum Purchases {
    Table,
    UserId,
    CourseId,
}

#[derive(Iden)]
enum QuizAttempts {
    Table,
    UserId,
    QuizId,
}

#[derive(Iden)]
enum Lectures {
    Table,
    CourseId,
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CourseProgress::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CourseProgress::UserId).uuid().not_null())
                    .col(ColumnDef::new(CourseProgress::CourseId).uuid().not_null())
                    .col(
                        ColumnDef::new(CourseProgress::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(CourseProgress::UserId)
                            .col(CourseProgress::CourseId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CourseProgress::Table, CourseProgress::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CourseProgress::Table, CourseProgress::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LectureProgress::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LectureProgress::UserId).uuid().not_null())
                    .col(ColumnDef::new(LectureProgress::LectureId).uuid().not_null())
                    .col(ColumnDef::new(LectureProgress::CourseId).uuid().not_null())
                    .col(
                        ColumnDef::new(LectureProgress::Marked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(LectureProgress::Notes)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(LectureProgress::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(LectureProgress::UserId)
                            .col(LectureProgress::LectureId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(LectureProgress::Table, LectureProgress::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(LectureProgress::Table, LectureProgress::LectureId)
                            .to(Lectures::Table, Lectures::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QuizAttempts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(QuizAttempts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(QuizAttempts::UserId).uuid().not_null())
                    .col(ColumnDef::new(QuizAttempts::CourseId).uuid().not_null())
                    .col(ColumnDef::new(QuizAttempts::QuizId).uuid().not_null())
                    .col(ColumnDef::new(QuizAttempts::Score).big_integer().not_null())
                    .col(
                        ColumnDef::new(QuizAttempts::TotalPoints)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuizAttempts::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(QuizAttempts::Table, QuizAttempts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(QuizAttempts::Table, QuizAttempts::QuizId)
                            .to(Quizzes::Table, Quizzes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuizAttempts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LectureProgress::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CourseProgress::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CourseProgress {
    Table,
    UserId,
    CourseId,
    CreatedAt,
}

#[derive(Iden)]
enum LectureProgress {
    Table,
    UserId,
    LectureId,
    CourseId,
    Marked,
    Notes,
    UpdatedAt,
}

#[derive(Iden)]
enum QuizAttempts {
    Table,
    Id,
    UserId,
    CourseId,
    QuizId,
    Score,
    TotalPoints,
    SubmittedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}

#[derive(Iden)]
enum Courses {
    Table,
    Id,
}

#[derive(Iden)]
enum Lectures {
    Table,
    Id,
}

#[derive(Iden)]
enum Quizzes {
    Table,
    Id,
}

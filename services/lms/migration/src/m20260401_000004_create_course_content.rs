use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Lectures::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Lectures::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Lectures::CourseId).uuid().not_null())
                    .col(ColumnDef::new(Lectures::Name).string().not_null())
                    .col(ColumnDef::new(Lectures::Description).text().not_null())
                    .col(ColumnDef::new(Lectures::MediaAssetId).string().null())
                    .col(ColumnDef::new(Lectures::MediaUrl).string().null())
                    .col(ColumnDef::new(Lectures::Position).integer().not_null())
                    .col(
                        ColumnDef::new(Lectures::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Lectures::Table, Lectures::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Quizzes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Quizzes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Quizzes::CourseId).uuid().not_null())
                    .col(ColumnDef::new(Quizzes::Title).string().not_null())
                    .col(
                        ColumnDef::new(Quizzes::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Quizzes::TotalPoints)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Quizzes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Quizzes::Table, Quizzes::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Questions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Questions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Questions::QuizId).uuid().not_null())
                    .col(ColumnDef::new(Questions::Question).text().not_null())
                    .col(ColumnDef::new(Questions::Options).json_binary().not_null())
                    .col(ColumnDef::new(Questions::CorrectAnswer).string().not_null())
                    .col(
                        ColumnDef::new(Questions::Points)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Questions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Questions::Table, Questions::QuizId)
                            .to(Quizzes::Table, Quizzes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CourseSequence::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CourseSequence::CourseId).uuid().not_null())
                    .col(ColumnDef::new(CourseSequence::Position).integer().not_null())
                    .col(ColumnDef::new(CourseSequence::Kind).string().not_null())
                    .col(ColumnDef::new(CourseSequence::ContentId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(CourseSequence::CourseId)
                            .col(CourseSequence::Position),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CourseSequence::Table, CourseSequence::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CourseSequence::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Questions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Quizzes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Lectures::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Lectures {
    Table,
    Id,
    CourseId,
    Name,
    Description,
    MediaAssetId,
    MediaUrl,
    Position,
    CreatedAt,
}

#[derive(Iden)]
enum Quizzes {
    Table,
    Id,
    CourseId,
    Title,
    Description,
    TotalPoints,
    CreatedAt,
}

#[derive(Iden)]
enum Questions {
    Table,
    Id,
    QuizId,
    Question,
    Options,
    CorrectAnswer,
    Points,
    CreatedAt,
}

#[derive(Iden)]
enum CourseSequence {
    Table,
    CourseId,
    Position,
    Kind,
    ContentId,
}

#[derive(Iden)]
enum Courses {
    Table,
    Id,
}

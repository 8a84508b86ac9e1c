use ednova_lms_migration::Migrator;
use sea_orm_migration::prelude::*;

/// Runs against the tenant database named in `DATABASE_URL`.
#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}

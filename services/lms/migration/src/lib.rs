use sea_orm_migration::prelude::*;

mod m20260401_000001_create_users;
mod m20260401_000002_create_badges;
mod m20260401_000003_create_courses;
mod m20260401_000004_create_course_content;
mod m20260401_000005_create_purchases;
mod m20260401_000006_create_progress;
mod m20260401_000007_create_announcements;
mod m20260401_000008_add_indexes;

/// Schema of one tenant database. Applied on first connection to each tenant.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260401_000001_create_users::Migration),
            Box::new(m20260401_000002_create_badges::Migration),
            Box::new(m20260401_000003_create_courses::Migration),
            Box::new(m20260401_000004_create_course_content::Migration),
            Box::new(m20260401_000005_create_purchases::Migration),
            Box::new(m20260401_000006_create_progress::Migration),
            Box::new(m20260401_000007_create_announcements::Migration),
            Box::new(m20260401_000008_add_indexes::Migration),
        ]
    }
}

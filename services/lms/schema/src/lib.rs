//! sea-orm entities for a single tenant database.
//!
//! Every tenant gets its own database with this exact set of tables; nothing
//! here refers to the tenant itself.

pub mod announcements;
pub mod badges;
pub mod course_progress;
pub mod course_sequence;
pub mod courses;
pub mod lecture_progress;
pub mod lectures;
pub mod purchases;
pub mod questions;
pub mod quiz_attempts;
pub mod quizzes;
pub mod user_badges;
pub mod users;

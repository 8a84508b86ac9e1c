use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};

use ednova_core::health::healthz;
use ednova_core::middleware::{propagate_request_id_layer, request_id_layer, trace_layer};

use crate::handlers::{
    announcement::{create_announcement, list_announcements},
    badge::{create_badge, delete_badge, list_badges},
    course::{
        add_lecture, add_question, add_quiz, create_course, delete_course, delete_question,
        delete_quiz, get_course, get_quiz, get_sequence, list_categories, list_courses,
        list_questions, list_quizzes, remove_lecture, update_course, update_lecture,
        update_question, update_quiz, update_sequence,
    },
    dashboard::{
        completion_rates, revenue, sales_by_course, sales_by_user, signups, top_courses,
        user_growth,
    },
    my_course::{
        add_note, delete_note, get_progress, list_my_courses, list_notes, mark_lecture,
        submit_quiz,
    },
    payment::{checkout, verify},
    user::{
        change_password, complete_verification, forgot_password, get_me, leaderboard, list_users,
        login, logout, register, register_admin, request_verification, reset_password,
        update_me,
    },
};
use crate::infra::connector::PgTenantConnector;
use crate::state::AppState;
use crate::tenant::resolve_tenant;

/// Largest accepted request body; lecture videos arrive as multipart uploads.
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Routes served under `/{tenant}/api/v1`, without tenant resolution.
fn api_routes() -> Router<AppState> {
    Router::new()
        // Users
        .route("/user/register", post(register))
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route("/user/me", get(get_me).put(update_me))
        .route("/user/password", put(change_password))
        .route("/user/verify", post(request_verification))
        .route("/user/verify/{token}", post(complete_verification))
        .route("/user/forgot-password", post(forgot_password))
        .route("/user/reset/{token}", post(reset_password))
        .route("/user/leaderboard", get(leaderboard))
        .route("/user/admin", post(register_admin))
        .route("/user/all", get(list_users))
        // Courses
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/categories", get(list_categories))
        .route(
            "/courses/{course_id}",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/courses/{course_id}/lectures", post(add_lecture))
        .route(
            "/courses/{course_id}/lectures/{lecture_id}",
            put(update_lecture).delete(remove_lecture),
        )
        .route(
            "/courses/{course_id}/quizzes",
            get(list_quizzes).post(add_quiz),
        )
        .route(
            "/courses/{course_id}/quizzes/{quiz_id}",
            get(get_quiz).put(update_quiz).delete(delete_quiz),
        )
        .route(
            "/courses/{course_id}/quizzes/{quiz_id}/questions",
            get(list_questions).post(add_question),
        )
        .route(
            "/courses/{course_id}/quizzes/{quiz_id}/questions/{question_id}",
            put(update_question).delete(delete_question),
        )
        .route(
            "/courses/{course_id}/sequence",
            get(get_sequence).put(update_sequence),
        )
        // Learner progress
        .route("/my-courses", get(list_my_courses))
        .route("/my-courses/{course_id}", get(get_progress))
        .route(
            "/my-courses/{course_id}/lectures/{lecture_id}/mark",
            put(mark_lecture),
        )
        .route(
            "/my-courses/{course_id}/lectures/{lecture_id}/notes",
            get(list_notes).post(add_note),
        )
        .route(
            "/my-courses/{course_id}/lectures/{lecture_id}/notes/{index}",
            delete(delete_note),
        )
        .route(
            "/my-courses/{course_id}/quizzes/{quiz_id}/submit",
            post(submit_quiz),
        )
        // Payments
        .route("/payments/checkout", post(checkout))
        .route("/payments/verify", post(verify))
        // Badges
        .route("/badges", get(list_badges).post(create_badge))
        .route("/badges/{badge_id}", delete(delete_badge))
        // Announcements
        .route(
            "/announcements",
            get(list_announcements).post(create_announcement),
        )
        // Admin dashboard
        .route("/admin/dashboard/sales-by-user", get(sales_by_user))
        .route("/admin/dashboard/sales-by-course", get(sales_by_course))
        .route("/admin/dashboard/users", get(signups))
        .route("/admin/analytics/user-growth", get(user_growth))
        .route("/admin/analytics/revenue", get(revenue))
        .route("/admin/analytics/top-courses", get(top_courses))
        .route("/admin/analytics/completion-rates", get(completion_rates))
}

pub fn build_router(state: AppState) -> Router {
    let api = api_routes().route_layer(from_fn_with_state(
        state.registry.clone(),
        resolve_tenant::<PgTenantConnector>,
    ));

    Router::new()
        // Health
        .route("/healthz", get(healthz))
        // Tenant API
        .nest("/{tenant}/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(propagate_request_id_layer())
        .layer(trace_layer())
        .layer(request_id_layer())
        .with_state(state)
}

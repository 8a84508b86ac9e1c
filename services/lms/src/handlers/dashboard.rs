use axum::{Json, extract::Query};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ednova_auth_types::identity::SessionUser;

use crate::domain::types::DateRange;
use crate::error::LmsError;
use crate::handlers::course::CourseResponse;
use crate::handlers::require_admin;
use crate::infra::db::{DbCourseRepository, DbPurchaseRepository, DbUserRepository};
use crate::infra::progress::DbProgressRepository;
use crate::state::Tenant;
use crate::usecase::analytics::{
    AnalyticsUseCase, CourseCompletion, DailyRevenue, DailySignups, TopCourse,
};
use crate::usecase::dashboard::{ActivePurchase, SalesDashboardUseCase, UserPurchases};
use crate::usecase::user::ListUsersUseCase;

type Dashboard = SalesDashboardUseCase<DbUserRepository, DbCourseRepository, DbPurchaseRepository>;

type Analytics = AnalyticsUseCase<
    DbUserRepository,
    DbCourseRepository,
    DbPurchaseRepository,
    DbProgressRepository,
>;

fn dashboard(tenant: &Tenant) -> Dashboard {
    SalesDashboardUseCase {
        users: tenant.users(),
        courses: tenant.courses(),
        purchases: tenant.purchases(),
    }
}

fn analytics(tenant: &Tenant) -> Analytics {
    AnalyticsUseCase {
        users: tenant.users(),
        courses: tenant.courses(),
        purchases: tenant.purchases(),
        progress: tenant.progress(),
    }
}

// ── GET /admin/dashboard/sales-by-user ───────────────────────────────────────

#[derive(Serialize)]
pub struct PurchasedCourseResponse {
    pub course_id: Uuid,
    pub course_title: String,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub purchase_date: DateTime<Utc>,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub expiration_date: DateTime<Utc>,
}

impl From<ActivePurchase> for PurchasedCourseResponse {
    fn from(p: ActivePurchase) -> Self {
        Self {
            course_id: p.course_id,
            course_title: p.course_title,
            purchase_date: p.purchase_date,
            expiration_date: p.expiration_date,
        }
    }
}

#[derive(Serialize)]
pub struct BuyerResponse {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub purchased_courses: Vec<PurchasedCourseResponse>,
}

impl From<UserPurchases> for BuyerResponse {
    fn from(b: UserPurchases) -> Self {
        let (name, email, avatar_url) = match b.user {
            Some(user) => (
                Some(user.name),
                Some(user.email),
                user.avatar.map(|a| a.public_url),
            ),
            None => (None, None, None),
        };
        Self {
            user_id: b.user_id,
            name,
            email,
            avatar_url,
            purchased_courses: b.courses.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct SalesByUserResponse {
    pub total_users: usize,
    pub buyers: Vec<BuyerResponse>,
}

pub async fn sales_by_user(
    tenant: Tenant,
    session: SessionUser,
) -> Result<Json<SalesByUserResponse>, LmsError> {
    require_admin(&session)?;
    let sales = dashboard(&tenant).by_user(Utc::now()).await?;
    Ok(Json(SalesByUserResponse {
        total_users: sales.total_users,
        buyers: sales.buyers.into_iter().map(Into::into).collect(),
    }))
}

// ── GET /admin/dashboard/sales-by-course ─────────────────────────────────────

#[derive(Serialize)]
pub struct CourseSalesResponse {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub active_purchases: usize,
}

#[derive(Serialize)]
pub struct SalesByCourseResponse {
    pub total_courses: usize,
    pub courses: Vec<CourseSalesResponse>,
}

pub async fn sales_by_course(
    tenant: Tenant,
    session: SessionUser,
) -> Result<Json<SalesByCourseResponse>, LmsError> {
    require_admin(&session)?;
    let sales = dashboard(&tenant).by_course(Utc::now()).await?;
    Ok(Json(SalesByCourseResponse {
        total_courses: sales.total_courses,
        courses: sales
            .courses
            .into_iter()
            .map(|c| CourseSalesResponse {
                course: c.course.into(),
                active_purchases: c.active_purchases,
            })
            .collect(),
    }))
}

// ── GET /admin/dashboard/users ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct SignupResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct SignupsResponse {
    pub total_users: usize,
    pub users: Vec<SignupResponse>,
}

pub async fn signups(
    tenant: Tenant,
    session: SessionUser,
) -> Result<Json<SignupsResponse>, LmsError> {
    require_admin(&session)?;
    let usecase = ListUsersUseCase {
        users: tenant.users(),
        badges: tenant.badges(),
    };
    let users: Vec<SignupResponse> = usecase
        .execute()
        .await?
        .into_iter()
        .map(|p| SignupResponse {
            id: p.user.id,
            name: p.user.name,
            email: p.user.email,
            created_at: p.user.created_at,
        })
        .collect();
    Ok(Json(SignupsResponse {
        total_users: users.len(),
        users,
    }))
}

// ── GET /admin/analytics/* ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl From<RangeQuery> for DateRange {
    fn from(q: RangeQuery) -> Self {
        Self {
            from: q.from,
            to: q.to,
        }
    }
}

#[derive(Serialize)]
pub struct DailySignupsResponse {
    pub date: NaiveDate,
    pub count: u64,
}

impl From<DailySignups> for DailySignupsResponse {
    fn from(d: DailySignups) -> Self {
        Self {
            date: d.date,
            count: d.count,
        }
    }
}

pub async fn user_growth(
    tenant: Tenant,
    session: SessionUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<DailySignupsResponse>>, LmsError> {
    require_admin(&session)?;
    let days = analytics(&tenant).user_growth(range.into()).await?;
    Ok(Json(days.into_iter().map(Into::into).collect()))
}

#[derive(Serialize)]
pub struct DailyRevenueResponse {
    pub date: NaiveDate,
    pub total_revenue: i64,
    pub total_purchases: u64,
}

impl From<DailyRevenue> for DailyRevenueResponse {
    fn from(d: DailyRevenue) -> Self {
        Self {
            date: d.date,
            total_revenue: d.total_revenue,
            total_purchases: d.total_purchases,
        }
    }
}

pub async fn revenue(
    tenant: Tenant,
    session: SessionUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<DailyRevenueResponse>>, LmsError> {
    require_admin(&session)?;
    let days = analytics(&tenant).revenue(range.into()).await?;
    Ok(Json(days.into_iter().map(Into::into).collect()))
}

#[derive(Serialize)]
pub struct TopCourseResponse {
    pub course_id: Uuid,
    pub title: String,
    pub purchase_count: u64,
}

impl From<TopCourse> for TopCourseResponse {
    fn from(t: TopCourse) -> Self {
        Self {
            course_id: t.course_id,
            title: t.title,
            purchase_count: t.purchase_count,
        }
    }
}

pub async fn top_courses(
    tenant: Tenant,
    session: SessionUser,
) -> Result<Json<Vec<TopCourseResponse>>, LmsError> {
    require_admin(&session)?;
    let top = analytics(&tenant).top_courses().await?;
    Ok(Json(top.into_iter().map(Into::into).collect()))
}

#[derive(Serialize)]
pub struct CompletionRateResponse {
    pub course_id: Uuid,
    pub course_title: String,
    pub total_enrollments: u64,
    pub total_completions: u64,
    pub completion_rate: f64,
}

impl From<CourseCompletion> for CompletionRateResponse {
    fn from(c: CourseCompletion) -> Self {
        Self {
            course_id: c.course_id,
            course_title: c.course_title,
            total_enrollments: c.total_enrollments,
            total_completions: c.total_completions,
            completion_rate: c.completion_rate,
        }
    }
}

pub async fn completion_rates(
    tenant: Tenant,
    session: SessionUser,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<CompletionRateResponse>>, LmsError> {
    require_admin(&session)?;
    let rates = analytics(&tenant).completion_rates(range.into()).await?;
    Ok(Json(rates.into_iter().map(Into::into).collect()))
}

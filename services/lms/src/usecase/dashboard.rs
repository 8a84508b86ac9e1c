use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::repository::{CourseRepository, PurchaseRepository, UserRepository};
use crate::domain::types::{Course, User};
use crate::error::LmsError;

/// Unexpired purchase of a course that still exists.
#[derive(Debug, Clone)]
pub struct ActivePurchase {
    pub course_id: Uuid,
    pub course_title: String,
    pub purchase_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
}

/// One buyer and the courses they can currently access. `user` is `None`
/// when the account was deleted after buying.
#[derive(Debug, Clone)]
pub struct UserPurchases {
    pub user_id: Uuid,
    pub user: Option<User>,
    pub courses: Vec<ActivePurchase>,
}

#[derive(Debug, Clone)]
pub struct SalesByUser {
    pub total_users: usize,
    pub buyers: Vec<UserPurchases>,
}

#[derive(Debug, Clone)]
pub struct CourseSales {
    pub course: Course,
    pub active_purchases: usize,
}

#[derive(Debug, Clone)]
pub struct SalesByCourse {
    pub total_courses: usize,
    pub courses: Vec<CourseSales>,
}

pub struct SalesDashboardUseCase<U: UserRepository, C: CourseRepository, P: PurchaseRepository> {
    pub users: U,
    pub courses: C,
    pub purchases: P,
}

impl<U, C, P> SalesDashboardUseCase<U, C, P>
where
    U: UserRepository,
    C: CourseRepository,
    P: PurchaseRepository,
{
    /// Everyone who ever bought a course, in order of their first purchase.
    pub async fn by_user(&self, now: DateTime<Utc>) -> Result<SalesByUser, LmsError> {
        let users = self.users.list_all().await?;
        let courses: HashMap<Uuid, Course> = self
            .courses
            .list(None)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let total_users = users.len();
        let mut users: HashMap<Uuid, User> = users.into_iter().map(|u| (u.id, u)).collect();

        let mut buyers: Vec<UserPurchases> = Vec::new();
        let mut slot: HashMap<Uuid, usize> = HashMap::new();
        for purchase in self.purchases.list_all().await? {
            let index = *slot.entry(purchase.user_id).or_insert_with(|| {
                buyers.push(UserPurchases {
                    user_id: purchase.user_id,
                    user: users.remove(&purchase.user_id),
                    courses: Vec::new(),
                });
                buyers.len() - 1
            });
            if !purchase.is_active(now) {
                continue;
            }
            if let Some(course) = courses.get(&purchase.course_id) {
                buyers[index].courses.push(ActivePurchase {
                    course_id: course.id,
                    course_title: course.title.clone(),
                    purchase_date: purchase.purchase_date,
                    expiration_date: purchase.expiration_date,
                });
            }
        }
        Ok(SalesByUser {
            total_users,
            buyers,
        })
    }

    /// Every course with the number of its unexpired purchases.
    pub async fn by_course(&self, now: DateTime<Utc>) -> Result<SalesByCourse, LmsError> {
        let mut active: HashMap<Uuid, usize> = HashMap::new();
        for purchase in self.purchases.list_all().await? {
            if purchase.is_active(now) {
                *active.entry(purchase.course_id).or_default() += 1;
            }
        }
        let courses: Vec<CourseSales> = self
            .courses
            .list(None)
            .await?
            .into_iter()
            .map(|course| CourseSales {
                active_purchases: active.get(&course.id).copied().unwrap_or(0),
                course,
            })
            .collect();
        Ok(SalesByCourse {
            total_courses: courses.len(),
            courses,
        })
    }
}

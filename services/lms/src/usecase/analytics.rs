use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::repository::{
    CourseRepository, ProgressRepository, PurchaseRepository, UserRepository,
};
use crate::domain::types::{Course, DateRange};
use crate::error::LmsError;

/// Length of the best-sellers list.
pub const TOP_COURSES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySignups {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub total_revenue: i64,
    pub total_purchases: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopCourse {
    pub course_id: Uuid,
    pub title: String,
    pub purchase_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseCompletion {
    pub course_id: Uuid,
    pub course_title: String,
    pub total_enrollments: u64,
    pub total_completions: u64,
    /// Percentage of enrollments with every lecture marked.
    pub completion_rate: f64,
}

fn check_range(range: DateRange) -> Result<DateRange, LmsError> {
    match (range.from, range.to) {
        (Some(from), Some(to)) if from > to => {
            Err(LmsError::validation("from must not be after to"))
        }
        _ => Ok(range),
    }
}

/// Tenant-wide reports for administrators. Days are UTC calendar days.
pub struct AnalyticsUseCase<U, C, P, R>
where
    U: UserRepository,
    C: CourseRepository,
    P: PurchaseRepository,
    R: ProgressRepository,
{
    pub users: U,
    pub courses: C,
    pub purchases: P,
    pub progress: R,
}

impl<U, C, P, R> AnalyticsUseCase<U, C, P, R>
where
    U: UserRepository,
    C: CourseRepository,
    P: PurchaseRepository,
    R: ProgressRepository,
{
    async fn courses_by_id(&self) -> Result<HashMap<Uuid, Course>, LmsError> {
        Ok(self
            .courses
            .list(None)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }

    /// New accounts per day, oldest day first.
    pub async fn user_growth(&self, range: DateRange) -> Result<Vec<DailySignups>, LmsError> {
        let range = check_range(range)?;
        let mut days: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for user in self.users.list_all().await? {
            if range.contains(user.created_at) {
                *days.entry(user.created_at.date_naive()).or_default() += 1;
            }
        }
        Ok(days
            .into_iter()
            .map(|(date, count)| DailySignups { date, count })
            .collect())
    }

    /// Purchases and revenue per day of purchase, at the courses' current
    /// prices. Purchases of deleted courses are left out.
    pub async fn revenue(&self, range: DateRange) -> Result<Vec<DailyRevenue>, LmsError> {
        let range = check_range(range)?;
        let courses = self.courses_by_id().await?;
        let mut days: BTreeMap<NaiveDate, (i64, u64)> = BTreeMap::new();
        for purchase in self.purchases.list_all().await? {
            if !range.contains(purchase.purchase_date) {
                continue;
            }
            let Some(course) = courses.get(&purchase.course_id) else {
                continue;
            };
            let day = days.entry(purchase.purchase_date.date_naive()).or_default();
            day.0 = day.0.saturating_add(course.price);
            day.1 += 1;
        }
        Ok(days
            .into_iter()
            .map(|(date, (total_revenue, total_purchases))| DailyRevenue {
                date,
                total_revenue,
                total_purchases,
            })
            .collect())
    }

    /// Most purchased existing courses of all time, best seller first.
    pub async fn top_courses(&self) -> Result<Vec<TopCourse>, LmsError> {
        let courses = self.courses_by_id().await?;
        let mut counts: HashMap<Uuid, u64> = HashMap::new();
        for purchase in self.purchases.list_all().await? {
            *counts.entry(purchase.course_id).or_default() += 1;
        }
        let mut top: Vec<TopCourse> = counts
            .into_iter()
            .filter_map(|(course_id, purchase_count)| {
                courses.get(&course_id).map(|course| TopCourse {
                    course_id,
                    title: course.title.clone(),
                    purchase_count,
                })
            })
            .collect();
        top.sort_by(|a, b| {
            Reverse(a.purchase_count)
                .cmp(&Reverse(b.purchase_count))
                .then_with(|| a.title.cmp(&b.title))
        });
        top.truncate(TOP_COURSES);
        Ok(top)
    }

    /// Share of enrollments that reached every lecture, highest rate first.
    /// Enrollments are filtered by the day the learner joined the course. A
    /// course without lectures never counts as completed.
    pub async fn completion_rates(&self, range: DateRange) -> Result<Vec<CourseCompletion>, LmsError> {
        let range = check_range(range)?;
        let courses = self.courses_by_id().await?;
        let mut tally: HashMap<Uuid, (u64, u64)> = HashMap::new();
        for enrollment in self.progress.enrollments().await? {
            if !range.contains(enrollment.enrolled_at) {
                continue;
            }
            let Some(course) = courses.get(&enrollment.course_id) else {
                continue;
            };
            let lectures = i64::from(course.number_of_lectures);
            let completed = lectures > 0 && enrollment.marked_lectures >= lectures;
            let entry = tally.entry(course.id).or_default();
            entry.0 += 1;
            entry.1 += u64::from(completed);
        }
        let mut rates: Vec<CourseCompletion> = tally
            .into_iter()
            .filter_map(|(course_id, (total_enrollments, total_completions))| {
                let course = courses.get(&course_id)?;
                Some(CourseCompletion {
                    course_id,
                    course_title: course.title.clone(),
                    total_enrollments,
                    total_completions,
                    completion_rate: total_completions as f64 * 100.0 / total_enrollments as f64,
                })
            })
            .collect();
        rates.sort_by(|a, b| {
            b.completion_rate
                .total_cmp(&a.completion_rate)
                .then_with(|| a.course_title.cmp(&b.course_title))
        });
        Ok(rates)
    }
}

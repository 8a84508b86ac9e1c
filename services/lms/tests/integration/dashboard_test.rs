use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use ednova_domain::user::UserRole;
use ednova_lms::domain::types::{DateRange, LectureProgress, Purchase};
use ednova_lms::error::LmsError;
use ednova_lms::usecase::analytics::{AnalyticsUseCase, TOP_COURSES};
use ednova_lms::usecase::dashboard::SalesDashboardUseCase;

use crate::helpers::{
    MockCourseRepo, MockDb, MockProgressRepo, MockPurchaseRepo, MockUserRepo, active_purchase,
    test_course, test_lecture, test_user,
};

fn dashboard(db: &MockDb) -> SalesDashboardUseCase<MockUserRepo, MockCourseRepo, MockPurchaseRepo> {
    SalesDashboardUseCase {
        users: db.users(),
        courses: db.courses(),
        purchases: db.purchases(),
    }
}

fn analytics(
    db: &MockDb,
) -> AnalyticsUseCase<MockUserRepo, MockCourseRepo, MockPurchaseRepo, MockProgressRepo> {
    AnalyticsUseCase {
        users: db.users(),
        courses: db.courses(),
        purchases: db.purchases(),
        progress: db.progress(),
    }
}

fn expired_purchase(user_id: Uuid, course_id: Uuid) -> Purchase {
    let now = Utc::now();
    Purchase {
        purchase_date: now - Duration::days(60),
        expiration_date: now - Duration::days(30),
        ..active_purchase(user_id, course_id)
    }
}

fn purchase_on(user_id: Uuid, course_id: Uuid, day: u32, hour: u32) -> Purchase {
    let at = Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap();
    Purchase {
        purchase_date: at,
        expiration_date: at + Duration::days(30),
        ..active_purchase(user_id, course_id)
    }
}

// ── Sales ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_list_only_active_purchases_per_buyer() {
    let db = MockDb::new();
    let rust = test_course(100, 1);
    let go = test_course(80, 1);
    db.insert_course(&rust);
    db.insert_course(&go);
    let buyer = test_user(UserRole::User);
    let lapsed = test_user(UserRole::User);
    let browser = test_user(UserRole::User);
    for user in [&buyer, &lapsed, &browser] {
        db.insert_user(user);
    }
    db.insert_purchase(&active_purchase(buyer.id, rust.id));
    db.insert_purchase(&expired_purchase(buyer.id, go.id));
    db.insert_purchase(&expired_purchase(lapsed.id, rust.id));
    let deleted_user = Uuid::new_v4();
    db.insert_purchase(&active_purchase(deleted_user, go.id));

    let sales = dashboard(&db).by_user(Utc::now()).await.unwrap();

    assert_eq!(sales.total_users, 3);
    assert_eq!(sales.buyers.len(), 3);
    let of = |id: Uuid| sales.buyers.iter().find(|b| b.user_id == id).unwrap();
    let buyer_sales = of(buyer.id);
    assert_eq!(buyer_sales.user.as_ref().unwrap().email, buyer.email);
    assert_eq!(buyer_sales.courses.len(), 1);
    assert_eq!(buyer_sales.courses[0].course_title, rust.title);
    assert!(of(lapsed.id).courses.is_empty());
    assert!(of(deleted_user).user.is_none());
    assert_eq!(of(deleted_user).courses.len(), 1);
    assert!(sales.buyers.iter().all(|b| b.user_id != browser.id));
}

#[tokio::test]
async fn should_count_active_purchases_per_course() {
    let db = MockDb::new();
    let rust = test_course(100, 1);
    let go = test_course(80, 1);
    let unsold = test_course(10, 1);
    for course in [&rust, &go, &unsold] {
        db.insert_course(course);
    }
    for _ in 0..2 {
        db.insert_purchase(&active_purchase(Uuid::new_v4(), rust.id));
    }
    db.insert_purchase(&expired_purchase(Uuid::new_v4(), rust.id));
    db.insert_purchase(&expired_purchase(Uuid::new_v4(), go.id));

    let sales = dashboard(&db).by_course(Utc::now()).await.unwrap();

    assert_eq!(sales.total_courses, 3);
    let count = |id: Uuid| {
        sales
            .courses
            .iter()
            .find(|c| c.course.id == id)
            .unwrap()
            .active_purchases
    };
    assert_eq!((count(rust.id), count(go.id), count(unsold.id)), (2, 0, 0));
}

// ── Analytics ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_bucket_signups_by_day_within_range() {
    let db = MockDb::new();
    let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap();
    for created_at in [day(1, 8), day(1, 23), day(2, 0), day(5, 12)] {
        let mut user = test_user(UserRole::User);
        user.created_at = created_at;
        db.insert_user(&user);
    }

    let all = analytics(&db).user_growth(DateRange::default()).await.unwrap();
    let counts: Vec<(String, u64)> = all.iter().map(|d| (d.date.to_string(), d.count)).collect();
    assert_eq!(
        counts,
        vec![
            ("2026-03-01".to_owned(), 2),
            ("2026-03-02".to_owned(), 1),
            ("2026-03-05".to_owned(), 1),
        ]
    );

    let window = DateRange {
        from: Some(day(1, 12)),
        to: Some(day(2, 0)),
    };
    let within = analytics(&db).user_growth(window).await.unwrap();
    let counts: Vec<u64> = within.iter().map(|d| d.count).collect();
    assert_eq!(counts, vec![1, 1]);

    let inverted = DateRange {
        from: Some(day(5, 0)),
        to: Some(day(1, 0)),
    };
    let result = analytics(&db).user_growth(inverted).await;
    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
}

#[tokio::test]
async fn should_sum_revenue_per_purchase_day() {
    let db = MockDb::new();
    let rust = test_course(100, 1);
    let go = test_course(80, 1);
    db.insert_course(&rust);
    db.insert_course(&go);
    let gone = Uuid::new_v4();
    db.insert_purchase(&purchase_on(Uuid::new_v4(), rust.id, 1, 9));
    db.insert_purchase(&purchase_on(Uuid::new_v4(), go.id, 1, 18));
    db.insert_purchase(&purchase_on(Uuid::new_v4(), rust.id, 3, 9));
    db.insert_purchase(&purchase_on(Uuid::new_v4(), gone, 3, 10));

    let days = analytics(&db).revenue(DateRange::default()).await.unwrap();

    let rows: Vec<(String, i64, u64)> = days
        .iter()
        .map(|d| (d.date.to_string(), d.total_revenue, d.total_purchases))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("2026-03-01".to_owned(), 180, 2),
            ("2026-03-03".to_owned(), 100, 1),
        ]
    );
}

#[tokio::test]
async fn should_rank_best_selling_courses() {
    let db = MockDb::new();
    let mut courses = Vec::new();
    for (title, sold) in [("Alpha", 1), ("Bravo", 5), ("Charlie", 3), ("Delta", 3), ("Echo", 2)] {
        let mut course = test_course(10, 1);
        course.title = title.to_owned();
        db.insert_course(&course);
        for _ in 0..sold {
            db.insert_purchase(&active_purchase(Uuid::new_v4(), course.id));
        }
        courses.push(course);
    }
    for _ in 0..9 {
        db.insert_purchase(&active_purchase(Uuid::new_v4(), Uuid::new_v4()));
    }

    let top = analytics(&db).top_courses().await.unwrap();

    assert_eq!(top.len(), TOP_COURSES);
    let ranked: Vec<(&str, u64)> = top
        .iter()
        .map(|t| (t.title.as_str(), t.purchase_count))
        .collect();
    assert_eq!(
        ranked,
        vec![("Bravo", 5), ("Charlie", 3), ("Delta", 3), ("Echo", 2)]
    );
}

#[tokio::test]
async fn should_report_completion_rates() {
    let db = MockDb::new();
    let mut full = test_course(10, 1);
    full.title = "Full".to_owned();
    full.number_of_lectures = 2;
    let mut empty = test_course(10, 1);
    empty.title = "Empty".to_owned();
    db.insert_course(&full);
    db.insert_course(&empty);
    let lectures = [test_lecture(full.id, 0), test_lecture(full.id, 1)];
    for lecture in &lectures {
        db.insert_lecture(lecture);
    }

    let finished = Uuid::new_v4();
    let halfway = Uuid::new_v4();
    let idle = Uuid::new_v4();
    let joined = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    {
        let mut store = db.store.lock().unwrap();
        for user_id in [finished, halfway, idle] {
            store.enrolled.insert((user_id, full.id), joined);
        }
        store.enrolled.insert((idle, empty.id), joined);
        let marked = |user_id, lecture_id| LectureProgress {
            marked: true,
            ..LectureProgress::new(user_id, full.id, lecture_id, joined)
        };
        store.lecture_progress.push(marked(finished, lectures[0].id));
        store.lecture_progress.push(marked(finished, lectures[1].id));
        store.lecture_progress.push(marked(halfway, lectures[0].id));
        store.lecture_progress.push(LectureProgress::new(halfway, full.id, lectures[1].id, joined));
    }

    let rates = analytics(&db)
        .completion_rates(DateRange::default())
        .await
        .unwrap();

    assert_eq!(rates.len(), 2);
    assert_eq!(rates[0].course_id, full.id);
    assert_eq!((rates[0].total_enrollments, rates[0].total_completions), (3, 1));
    assert!((rates[0].completion_rate - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(rates[1].course_title, "Empty");
    assert_eq!(rates[1].total_completions, 0);
    assert_eq!(rates[1].completion_rate, 0.0);

    let later = DateRange {
        from: Some(joined + Duration::days(1)),
        to: None,
    };
    assert!(analytics(&db).completion_rates(later).await.unwrap().is_empty());
}

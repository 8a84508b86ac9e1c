use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use ednova_domain::user::UserRole;
use ednova_lms::domain::types::{Course, Lecture, NOTE_MAX_CHARS, Quiz, User};
use ednova_lms::error::LmsError;
use ednova_lms::usecase::access::Caller;
use ednova_lms::usecase::locks::UserLocks;
use ednova_lms::usecase::progress::{
    GetCourseProgressUseCase, LectureNotesUseCase, MarkLectureInput, MarkLectureUseCase,
    QuizAnswer, SubmitQuizUseCase,
};

use crate::helpers::{
    MockCourseRepo, MockDb, MockProgressRepo, MockPurchaseRepo, active_purchase, tenant,
    test_badge, test_course, test_lecture, test_quiz, test_user,
};

struct Fixture {
    db: MockDb,
    learner: User,
    course: Course,
    lecture: Lecture,
    locks: UserLocks,
}

fn setup() -> Fixture {
    let db = MockDb::new();
    let learner = test_user(UserRole::User);
    let course = test_course(500, 6);
    let lecture = test_lecture(course.id, 1);
    db.insert_user(&learner);
    db.insert_course(&course);
    db.insert_lecture(&lecture);
    db.insert_purchase(&active_purchase(learner.id, course.id));
    Fixture {
        db,
        learner,
        course,
        lecture,
        locks: UserLocks::default(),
    }
}

fn caller(user: &User) -> Caller {
    Caller {
        user_id: user.id,
        role: user.role,
    }
}

impl Fixture {
    fn marks(&self) -> MarkLectureUseCase<MockCourseRepo, MockPurchaseRepo, MockProgressRepo> {
        MarkLectureUseCase {
            courses: self.db.courses(),
            purchases: self.db.purchases(),
            progress: self.db.progress(),
            locks: self.locks.clone(),
            tenant: tenant("acme"),
        }
    }

    fn quizzes(&self) -> SubmitQuizUseCase<MockCourseRepo, MockPurchaseRepo, MockProgressRepo> {
        SubmitQuizUseCase {
            courses: self.db.courses(),
            purchases: self.db.purchases(),
            progress: self.db.progress(),
            locks: self.locks.clone(),
            tenant: tenant("acme"),
        }
    }

    fn notes(&self) -> LectureNotesUseCase<MockCourseRepo, MockPurchaseRepo, MockProgressRepo> {
        LectureNotesUseCase {
            courses: self.db.courses(),
            purchases: self.db.purchases(),
            progress: self.db.progress(),
            locks: self.locks.clone(),
            tenant: tenant("acme"),
        }
    }

    async fn mark(&self, lecture_id: Uuid, checked: bool, gain_xp: i64) -> Result<i64, LmsError> {
        self.marks()
            .execute(
                caller(&self.learner),
                MarkLectureInput {
                    course_id: self.course.id,
                    lecture_id,
                    checked,
                    gain_xp,
                },
            )
            .await
            .map(|out| out.reward.xp)
    }

    async fn submit(&self, quiz: &Quiz, correct: &[usize]) -> i64 {
        let answers: Vec<QuizAnswer> = quiz
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| QuizAnswer {
                question_id: q.id,
                answer: if correct.contains(&i) {
                    q.correct_answer.clone()
                } else {
                    "wrong".to_owned()
                },
            })
            .collect();
        self.quizzes()
            .execute(caller(&self.learner), self.course.id, quiz.id, &answers)
            .await
            .unwrap()
            .reward
            .xp
    }
}

// ── Lecture marks ────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_alternate_xp_when_toggling_lecture() {
    let f = setup();
    let lecture = f.lecture.id;

    assert_eq!(f.mark(lecture, true, 10).await.unwrap(), 10);
    assert_eq!(f.mark(lecture, true, 10).await.unwrap(), 10);
    assert_eq!(f.mark(lecture, false, 10).await.unwrap(), 0);
    assert_eq!(f.mark(lecture, false, 10).await.unwrap(), 0);
    assert_eq!(f.mark(lecture, true, 10).await.unwrap(), 10);

    assert_eq!(f.db.xp(f.learner.id), 10);
}

#[tokio::test]
async fn should_report_previous_mark_state() {
    let f = setup();
    let input = |checked| MarkLectureInput {
        course_id: f.course.id,
        lecture_id: f.lecture.id,
        checked,
        gain_xp: 5,
    };

    let first = f.marks().execute(caller(&f.learner), input(true)).await.unwrap();
    assert_eq!(first.previous, None);
    assert_eq!(first.reward.xp_delta, 5);

    let second = f.marks().execute(caller(&f.learner), input(false)).await.unwrap();
    assert_eq!(second.previous, Some(true));
    assert!(!second.marked);
    assert_eq!(second.reward.xp_delta, -5);
}

#[tokio::test]
async fn should_create_unmarked_entry_without_xp() {
    let f = setup();

    assert_eq!(f.mark(f.lecture.id, false, 10).await.unwrap(), 0);

    let entry = f
        .db
        .store
        .lock()
        .unwrap()
        .lecture_progress
        .iter()
        .find(|p| p.lecture_id == f.lecture.id)
        .cloned()
        .unwrap();
    assert!(!entry.marked);
}

#[tokio::test]
async fn should_never_take_xp_below_zero() {
    let f = setup();

    f.mark(f.lecture.id, true, 5).await.unwrap();
    let xp = f.mark(f.lecture.id, false, 20).await.unwrap();

    assert_eq!(xp, 0);
    assert_eq!(f.db.xp(f.learner.id), 0);
}

#[tokio::test]
async fn should_reject_negative_gain() {
    let f = setup();

    let result = f.mark(f.lecture.id, true, -1).await;

    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    assert_eq!(f.db.xp(f.learner.id), 0);
}

#[tokio::test]
async fn should_reject_unknown_lecture() {
    let f = setup();

    let result = f.mark(Uuid::new_v4(), true, 10).await;

    assert!(matches!(result, Err(LmsError::NotFound("lecture"))), "got {result:?}");
}

#[tokio::test]
async fn should_require_active_purchase() {
    let f = setup();
    let outsider = test_user(UserRole::User);
    f.db.insert_user(&outsider);

    let result = f
        .marks()
        .execute(
            caller(&outsider),
            MarkLectureInput {
                course_id: f.course.id,
                lecture_id: f.lecture.id,
                checked: true,
                gain_xp: 10,
            },
        )
        .await;

    assert!(matches!(result, Err(LmsError::NoActivePurchase)), "got {result:?}");
    assert_eq!(f.db.xp(outsider.id), 0);
}

#[tokio::test]
async fn should_deny_expired_purchase() {
    let f = setup();
    let lapsed = test_user(UserRole::User);
    f.db.insert_user(&lapsed);
    let mut purchase = active_purchase(lapsed.id, f.course.id);
    purchase.expiration_date = chrono::Utc::now() - chrono::Duration::seconds(1);
    f.db.insert_purchase(&purchase);

    let result = f
        .notes()
        .list(caller(&lapsed), f.course.id, f.lecture.id)
        .await;

    assert!(matches!(result, Err(LmsError::NoActivePurchase)), "got {result:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_serialize_concurrent_mutations_per_user() {
    let f = setup();
    let lectures: Vec<Lecture> = (2..12).map(|i| test_lecture(f.course.id, i)).collect();
    for lecture in &lectures {
        f.db.insert_lecture(lecture);
    }
    let usecase = Arc::new(f.marks());
    let who = caller(&f.learner);

    let tasks: Vec<_> = lectures
        .iter()
        .map(|lecture| {
            let usecase = Arc::clone(&usecase);
            let input = MarkLectureInput {
                course_id: f.course.id,
                lecture_id: lecture.id,
                checked: true,
                gain_xp: 5,
            };
            tokio::spawn(async move { usecase.execute(who, input).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(f.db.xp(f.learner.id), 50);
    assert!(f.locks.is_empty());
}

// ── Quiz submissions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn should_pay_only_improvement_over_best_attempt() {
    let f = setup();
    let quiz = test_quiz(f.course.id, &[("a", 4), ("b", 8), ("c", 8)]);
    f.db.insert_quiz(&quiz);

    assert_eq!(f.submit(&quiz, &[0, 1]).await, 12);
    assert_eq!(f.submit(&quiz, &[2]).await, 12);
    assert_eq!(f.submit(&quiz, &[0, 1, 2]).await, 20);

    let scores: Vec<i64> = f.db.attempts(f.learner.id).iter().map(|a| a.score).collect();
    assert_eq!(scores, vec![12, 8, 20]);
}

#[tokio::test]
async fn should_report_previous_best() {
    let f = setup();
    let quiz = test_quiz(f.course.id, &[("a", 4), ("b", 8), ("c", 8)]);
    f.db.insert_quiz(&quiz);
    f.submit(&quiz, &[0, 1]).await;

    let answers = [QuizAnswer {
        question_id: quiz.questions[2].id,
        answer: "C".to_owned(),
    }];
    let out = f
        .quizzes()
        .execute(caller(&f.learner), f.course.id, quiz.id, &answers)
        .await
        .unwrap();

    assert_eq!(out.score, 8);
    assert_eq!(out.total_points, 20);
    assert_eq!(out.previous_best, Some(12));
    assert_eq!(out.reward.xp_delta, 0);
}

#[tokio::test]
async fn should_reject_quiz_from_other_course() {
    let f = setup();
    let other = test_course(100, 1);
    f.db.insert_course(&other);
    let quiz = test_quiz(other.id, &[("a", 4)]);
    f.db.insert_quiz(&quiz);

    let result = f
        .quizzes()
        .execute(caller(&f.learner), f.course.id, quiz.id, &[])
        .await;

    assert!(matches!(result, Err(LmsError::NotFound("quiz"))), "got {result:?}");
}

// ── Badges ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_award_and_revoke_badges_with_xp() {
    let f = setup();
    let starter = test_badge("Starter", 10);
    let scholar = test_badge("Scholar", 50);
    f.db.insert_badge(&starter);
    f.db.insert_badge(&scholar);
    let second = test_lecture(f.course.id, 2);
    f.db.insert_lecture(&second);

    let out = f
        .marks()
        .execute(
            caller(&f.learner),
            MarkLectureInput {
                course_id: f.course.id,
                lecture_id: f.lecture.id,
                checked: true,
                gain_xp: 10,
            },
        )
        .await
        .unwrap();
    assert_eq!(out.reward.awarded, vec![starter.id]);
    assert_eq!(f.db.held_badges(f.learner.id), HashSet::from([starter.id]));

    f.mark(second.id, true, 45).await.unwrap();
    assert_eq!(f.db.held_badges(f.learner.id), HashSet::from([starter.id, scholar.id]));

    f.mark(second.id, false, 45).await.unwrap();
    assert_eq!(f.db.held_badges(f.learner.id), HashSet::from([starter.id]));

    let out = f
        .marks()
        .execute(
            caller(&f.learner),
            MarkLectureInput {
                course_id: f.course.id,
                lecture_id: f.lecture.id,
                checked: false,
                gain_xp: 10,
            },
        )
        .await
        .unwrap();
    assert_eq!(out.reward.revoked, vec![starter.id]);
    assert!(f.db.held_badges(f.learner.id).is_empty());
}

// ── Notes ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_leave_notes_untouched_on_invalid_index() {
    let f = setup();
    let notes = f.notes();
    let who = caller(&f.learner);
    notes.add(who, f.course.id, f.lecture.id, "first").await.unwrap();
    notes.add(who, f.course.id, f.lecture.id, "second").await.unwrap();

    let result = notes.delete(who, f.course.id, f.lecture.id, 5).await;

    assert!(matches!(result, Err(LmsError::InvalidIndex)), "got {result:?}");
    assert_eq!(f.db.notes(f.learner.id, f.lecture.id), vec!["first", "second"]);
}

#[tokio::test]
async fn should_delete_note_by_index() {
    let f = setup();
    let notes = f.notes();
    let who = caller(&f.learner);
    notes.add(who, f.course.id, f.lecture.id, "first").await.unwrap();
    notes.add(who, f.course.id, f.lecture.id, "second").await.unwrap();

    let remaining = notes.delete(who, f.course.id, f.lecture.id, 0).await.unwrap();

    assert_eq!(remaining, vec!["second"]);
    assert_eq!(f.db.notes(f.learner.id, f.lecture.id), vec!["second"]);
}

#[tokio::test]
async fn should_report_invalid_index_without_entry() {
    let f = setup();

    let result = f
        .notes()
        .delete(caller(&f.learner), f.course.id, f.lecture.id, 0)
        .await;

    assert!(matches!(result, Err(LmsError::InvalidIndex)), "got {result:?}");
}

#[tokio::test]
async fn should_ignore_duplicate_note() {
    let f = setup();
    let notes = f.notes();
    let who = caller(&f.learner);
    notes.add(who, f.course.id, f.lecture.id, "ownership").await.unwrap();

    let list = notes
        .add(who, f.course.id, f.lecture.id, "  ownership ")
        .await
        .unwrap();

    assert_eq!(list, vec!["ownership"]);
}

#[tokio::test]
async fn should_enforce_note_length() {
    let f = setup();
    let notes = f.notes();
    let who = caller(&f.learner);

    let longest = "n".repeat(NOTE_MAX_CHARS);
    assert!(notes.add(who, f.course.id, f.lecture.id, &longest).await.is_ok());

    let too_long = "n".repeat(NOTE_MAX_CHARS + 1);
    let result = notes.add(who, f.course.id, f.lecture.id, &too_long).await;
    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");

    let result = notes.add(who, f.course.id, f.lecture.id, "   ").await;
    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    assert_eq!(f.db.notes(f.learner.id, f.lecture.id).len(), 1);
}

#[tokio::test]
async fn should_keep_notes_when_mark_toggles() {
    let f = setup();
    let who = caller(&f.learner);
    f.notes()
        .add(who, f.course.id, f.lecture.id, "remember lifetimes")
        .await
        .unwrap();

    f.mark(f.lecture.id, true, 10).await.unwrap();

    assert_eq!(
        f.db.notes(f.learner.id, f.lecture.id),
        vec!["remember lifetimes"]
    );
}

// ── Course progress ──────────────────────────────────────────────────────────

#[tokio::test]
async fn should_report_missing_progress_before_any_activity() {
    let f = setup();
    let usecase = GetCourseProgressUseCase {
        courses: f.db.courses(),
        purchases: f.db.purchases(),
        progress: f.db.progress(),
    };

    let result = usecase.execute(caller(&f.learner), f.course.id).await;
    assert!(matches!(result, Err(LmsError::NotFound("progress"))), "got {result:?}");

    f.mark(f.lecture.id, true, 10).await.unwrap();
    let progress = usecase.execute(caller(&f.learner), f.course.id).await.unwrap();
    assert_eq!(progress.lectures.len(), 1);
    assert!(progress.lectures[0].marked);
}

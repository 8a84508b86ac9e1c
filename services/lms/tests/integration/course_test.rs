use ednova_domain::user::UserRole;
use ednova_lms::domain::types::{SequenceKind, StoredAsset};
use ednova_lms::error::LmsError;
use ednova_lms::usecase::access::Caller;
use ednova_lms::usecase::course::{
    AddLectureInput, CourseCatalogUseCase, CreateCourseInput, CreateCourseUseCase,
    DeleteCourseUseCase, GetCourseUseCase, GetQuizUseCase, GetSequenceUseCase,
    LectureAdminUseCase, QuestionInput, QuestionPatch, QuizAdminUseCase, SequenceStep,
    UpdateCourseInput, UpdateCourseUseCase, UpdateLectureInput, UpdateSequenceUseCase,
};

use crate::helpers::{
    MockDb, MockStorage, active_purchase, quiz_item, test_course, test_lecture, test_quiz,
    test_upload, test_user, video,
};

fn admin() -> Caller {
    Caller {
        user_id: uuid::Uuid::new_v4(),
        role: UserRole::Admin,
    }
}

fn course_input(title: &str) -> CreateCourseInput {
    CreateCourseInput {
        title: title.to_owned(),
        description: "Async Rust from first principles".to_owned(),
        category: "programming".to_owned(),
        price: 500,
        expiry_months: 6,
        thumbnail: Some(test_upload("cover.png")),
    }
}

// ── Course admin ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_create_course_with_thumbnail() {
    let db = MockDb::new();
    let storage = MockStorage::default();
    let usecase = CreateCourseUseCase {
        courses: db.courses(),
        storage: storage.clone(),
    };

    let course = usecase.execute("ferris", course_input("Async Rust")).await.unwrap();

    assert_eq!(course.created_by, "ferris");
    assert_eq!(course.number_of_lectures, 0);
    assert_eq!(course.thumbnail.unwrap().asset_id, "thumbnails/cover.png");
    assert_eq!(db.store.lock().unwrap().courses.len(), 1);
}

#[tokio::test]
async fn should_reject_invalid_course_before_upload() {
    let db = MockDb::new();
    let existing = test_course(100, 1);
    db.insert_course(&existing);
    let storage = MockStorage::default();
    let usecase = CreateCourseUseCase {
        courses: db.courses(),
        storage: storage.clone(),
    };

    let duplicate = usecase.execute("ferris", course_input(&existing.title)).await;
    assert!(matches!(duplicate, Err(LmsError::AlreadyExists(_))), "got {duplicate:?}");

    let mut free_forever = course_input("Free forever");
    free_forever.expiry_months = 0;
    let result = usecase.execute("ferris", free_forever).await;
    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");

    let mut negative = course_input("Negative");
    negative.price = -1;
    let result = usecase.execute("ferris", negative).await;
    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");

    let mut centuries = course_input("Centuries");
    centuries.expiry_months = 100_000_000;
    let result = usecase.execute("ferris", centuries).await;
    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");

    let mut priceless = course_input("Priceless");
    priceless.price = i64::MAX;
    let result = usecase.execute("ferris", priceless).await;
    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");

    assert!(storage.uploaded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_update_course_and_swap_thumbnail() {
    let db = MockDb::new();
    let mut course = test_course(100, 1);
    course.thumbnail = Some(StoredAsset {
        asset_id: "thumbnails/old.png".to_owned(),
        public_url: "https://cdn.test/thumbnails/old.png".to_owned(),
    });
    db.insert_course(&course);
    let storage = MockStorage::default();

    let updated = UpdateCourseUseCase {
        courses: db.courses(),
        storage: storage.clone(),
    }
    .execute(
        course.id,
        UpdateCourseInput {
            price: Some(900),
            thumbnail: Some(test_upload("new.png")),
            ..UpdateCourseInput::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.price, 900);
    assert_eq!(updated.title, course.title);
    assert_eq!(updated.thumbnail.unwrap().asset_id, "thumbnails/new.png");
    assert_eq!(*storage.deleted.lock().unwrap(), vec!["thumbnails/old.png"]);
}

#[tokio::test]
async fn should_filter_catalog_by_category() {
    let db = MockDb::new();
    let rust = test_course(100, 1);
    let mut design = test_course(100, 1);
    design.category = "design".to_owned();
    db.insert_course(&rust);
    db.insert_course(&design);
    let catalog = CourseCatalogUseCase {
        courses: db.courses(),
    };

    let listed = catalog.list(Some("design")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, design.id);

    assert_eq!(catalog.list(None).await.unwrap().len(), 2);
    assert_eq!(catalog.categories().await.unwrap(), vec!["design", "programming"]);
}

#[tokio::test]
async fn should_gate_course_detail_on_purchase() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    db.insert_lecture(&test_lecture(course.id, 0));
    let learner = test_user(UserRole::User);
    let usecase = GetCourseUseCase {
        courses: db.courses(),
        purchases: db.purchases(),
    };
    let as_learner = Caller {
        user_id: learner.id,
        role: learner.role,
    };

    let denied = usecase.execute(as_learner, course.id).await;
    assert!(matches!(denied, Err(LmsError::NoActivePurchase)), "got {denied:?}");

    let detail = usecase.execute(admin(), course.id).await.unwrap();
    assert_eq!(detail.lectures.len(), 1);

    db.insert_purchase(&active_purchase(learner.id, course.id));
    assert!(usecase.execute(as_learner, course.id).await.is_ok());
}

#[tokio::test]
async fn should_delete_course_assets() {
    let db = MockDb::new();
    let mut course = test_course(100, 1);
    course.thumbnail = Some(StoredAsset {
        asset_id: "thumbnails/c.png".to_owned(),
        public_url: String::new(),
    });
    db.insert_course(&course);
    let mut lecture = test_lecture(course.id, 0);
    lecture.media = Some(StoredAsset {
        asset_id: "lectures/l.mp4".to_owned(),
        public_url: String::new(),
    });
    db.insert_lecture(&lecture);
    let storage = MockStorage::default();
    let usecase = DeleteCourseUseCase {
        courses: db.courses(),
        storage: storage.clone(),
    };

    usecase.execute(course.id).await.unwrap();

    assert!(db.store.lock().unwrap().courses.is_empty());
    assert!(db.store.lock().unwrap().lectures.is_empty());
    assert_eq!(
        *storage.deleted.lock().unwrap(),
        vec!["thumbnails/c.png", "lectures/l.mp4"]
    );
    let again = usecase.execute(course.id).await;
    assert!(matches!(again, Err(LmsError::NotFound("course"))));
}

// ── Lectures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_keep_lecture_count_in_step() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let storage = MockStorage::default();
    let usecase = LectureAdminUseCase {
        courses: db.courses(),
        storage: storage.clone(),
    };
    let input = |name: &str| AddLectureInput {
        name: name.to_owned(),
        description: String::new(),
        media: test_upload(&format!("{name}.mp4")),
    };

    let first = usecase.add(course.id, input("intro")).await.unwrap();
    let second = usecase.add(course.id, input("traits")).await.unwrap();
    assert_eq!((first.position, second.position), (0, 1));
    assert_eq!(db.lecture_count(course.id), 2);

    usecase.remove(course.id, first.id).await.unwrap();
    assert_eq!(db.lecture_count(course.id), 1);
    assert_eq!(*storage.deleted.lock().unwrap(), vec!["lectures/intro.mp4"]);

    let missing = usecase.remove(course.id, first.id).await;
    assert!(matches!(missing, Err(LmsError::NotFound("lecture"))));
}

#[tokio::test]
async fn should_not_add_lecture_when_upload_fails() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);

    let result = LectureAdminUseCase {
        courses: db.courses(),
        storage: MockStorage::failing(),
    }
    .add(
        course.id,
        AddLectureInput {
            name: "intro".to_owned(),
            description: String::new(),
            media: test_upload("intro.mp4"),
        },
    )
    .await;

    assert!(matches!(result, Err(LmsError::ExternalService("storage"))), "got {result:?}");
    assert!(db.store.lock().unwrap().lectures.is_empty());
}

#[tokio::test]
async fn should_update_lecture_and_replace_video() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let mut lecture = test_lecture(course.id, 0);
    lecture.media = Some(StoredAsset {
        asset_id: "lectures/old.mp4".to_owned(),
        public_url: String::new(),
    });
    db.insert_lecture(&lecture);
    let storage = MockStorage::default();
    let usecase = LectureAdminUseCase {
        courses: db.courses(),
        storage: storage.clone(),
    };

    let renamed = usecase
        .update(
            course.id,
            lecture.id,
            UpdateLectureInput {
                name: Some("  Borrowing ".to_owned()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Borrowing");
    assert_eq!(renamed.media, lecture.media);
    assert!(storage.deleted.lock().unwrap().is_empty());

    let replaced = usecase
        .update(
            course.id,
            lecture.id,
            UpdateLectureInput {
                media: Some(test_upload("new.mp4")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(replaced.media.unwrap().asset_id, "lectures/new.mp4");
    assert_eq!(replaced.name, "Borrowing");
    assert_eq!(*storage.deleted.lock().unwrap(), vec!["lectures/old.mp4"]);
    let stored = db.store.lock().unwrap().lectures[0].clone();
    assert_eq!(stored.name, "Borrowing");
    assert_eq!(stored.media.unwrap().asset_id, "lectures/new.mp4");
    assert_eq!(db.lecture_count(course.id), 0);
}

#[tokio::test]
async fn should_reject_empty_or_unknown_lecture_update() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let lecture = test_lecture(course.id, 0);
    db.insert_lecture(&lecture);
    let usecase = LectureAdminUseCase {
        courses: db.courses(),
        storage: MockStorage::default(),
    };

    let empty = usecase
        .update(course.id, lecture.id, UpdateLectureInput::default())
        .await;
    assert!(matches!(empty, Err(LmsError::Validation(_))), "got {empty:?}");

    let blank_name = usecase
        .update(
            course.id,
            lecture.id,
            UpdateLectureInput {
                name: Some("   ".to_owned()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(blank_name, Err(LmsError::Validation(_))), "got {blank_name:?}");

    let other_course = usecase
        .update(
            uuid::Uuid::new_v4(),
            lecture.id,
            UpdateLectureInput {
                description: Some("moved".to_owned()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(other_course, Err(LmsError::NotFound("lecture"))), "got {other_course:?}");
}

// ── Quizzes ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_update_quiz_details() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let quiz = test_quiz(course.id, &[("a", 2)]);
    db.insert_quiz(&quiz);
    let usecase = QuizAdminUseCase {
        courses: db.courses(),
    };

    let updated = usecase
        .update_quiz(course.id, quiz.id, Some(" Lifetimes "), None)
        .await
        .unwrap();
    assert_eq!(updated.title, "Lifetimes");
    assert_eq!(updated.total_points, 2);
    assert_eq!(db.store.lock().unwrap().quizzes[0].title, "Lifetimes");

    let nothing = usecase.update_quiz(course.id, quiz.id, None, None).await;
    assert!(matches!(nothing, Err(LmsError::Validation(_))), "got {nothing:?}");
    let blank = usecase.update_quiz(course.id, quiz.id, Some(""), None).await;
    assert!(matches!(blank, Err(LmsError::Validation(_))), "got {blank:?}");
    let missing = usecase
        .update_quiz(course.id, uuid::Uuid::new_v4(), None, Some("x"))
        .await;
    assert!(matches!(missing, Err(LmsError::NotFound("quiz"))), "got {missing:?}");
}

#[tokio::test]
async fn should_keep_quiz_total_in_step_with_edited_question() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let quiz = test_quiz(course.id, &[("a", 5), ("b", 3)]);
    db.insert_quiz(&quiz);
    let target = quiz.questions[0].clone();
    let usecase = QuizAdminUseCase {
        courses: db.courses(),
    };

    let (question, total) = usecase
        .update_question(
            course.id,
            quiz.id,
            target.id,
            QuestionPatch {
                points: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(question.points, 10);
    assert_eq!(question.correct_answer, "a");
    assert_eq!(total, 13);
    assert_eq!(db.store.lock().unwrap().quizzes[0].total_points, 13);

    let (question, total) = usecase
        .update_question(
            course.id,
            quiz.id,
            target.id,
            QuestionPatch {
                options: Some(vec!["x".to_owned(), "y".to_owned()]),
                correct_answer: Some("y".to_owned()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(question.options, vec!["x", "y"]);
    assert_eq!(total, 13);
}

#[tokio::test]
async fn should_reject_invalid_question_edit_without_touching_total() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let quiz = test_quiz(course.id, &[("a", 5)]);
    db.insert_quiz(&quiz);
    let target = quiz.questions[0].clone();
    let usecase = QuizAdminUseCase {
        courses: db.courses(),
    };

    for bad in [
        QuestionPatch::default(),
        QuestionPatch {
            options: Some(vec!["x".to_owned(), "y".to_owned()]),
            ..Default::default()
        },
        QuestionPatch {
            correct_answer: Some("c".to_owned()),
            ..Default::default()
        },
        QuestionPatch {
            options: Some(vec!["a".to_owned()]),
            ..Default::default()
        },
        QuestionPatch {
            points: Some(0),
            ..Default::default()
        },
    ] {
        let result = usecase
            .update_question(course.id, quiz.id, target.id, bad)
            .await;
        assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    }
    let missing = usecase
        .update_question(
            course.id,
            quiz.id,
            uuid::Uuid::new_v4(),
            QuestionPatch {
                points: Some(1),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(missing, Err(LmsError::NotFound("question"))), "got {missing:?}");

    let stored = db.store.lock().unwrap().quizzes[0].clone();
    assert_eq!(stored.total_points, 5);
    assert_eq!(stored.questions[0].options, target.options);
}

#[tokio::test]
async fn should_gate_single_quiz_on_purchase() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let quiz = test_quiz(course.id, &[("a", 1), ("b", 2)]);
    db.insert_quiz(&quiz);
    let learner = test_user(UserRole::User);
    let as_learner = Caller {
        user_id: learner.id,
        role: learner.role,
    };
    let usecase = GetQuizUseCase {
        courses: db.courses(),
        purchases: db.purchases(),
    };

    let denied = usecase.execute(as_learner, course.id, quiz.id).await;
    assert!(matches!(denied, Err(LmsError::NoActivePurchase)), "got {denied:?}");

    db.insert_purchase(&active_purchase(learner.id, course.id));
    let found = usecase.execute(as_learner, course.id, quiz.id).await.unwrap();
    assert_eq!(found.questions.len(), 2);
    assert_eq!(found.total_points, 3);

    let other_course = test_course(100, 1);
    db.insert_course(&other_course);
    let wrong_course = usecase.execute(admin(), other_course.id, quiz.id).await;
    assert!(matches!(wrong_course, Err(LmsError::NotFound("quiz"))), "got {wrong_course:?}");
}

#[tokio::test]
async fn should_track_quiz_total_points() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let usecase = QuizAdminUseCase {
        courses: db.courses(),
    };
    let quiz = usecase.add_quiz(course.id, "Ownership", "").await.unwrap();
    let question = |points| QuestionInput {
        question: "Who owns the value?".to_owned(),
        options: vec!["the binding".to_owned(), "the heap".to_owned()],
        correct_answer: "the binding".to_owned(),
        points,
    };

    let (first, total) = usecase.add_question(course.id, quiz.id, question(5)).await.unwrap();
    assert_eq!(total, 5);
    let (_, total) = usecase.add_question(course.id, quiz.id, question(3)).await.unwrap();
    assert_eq!(total, 8);

    let total = usecase
        .delete_question(course.id, quiz.id, first.id)
        .await
        .unwrap();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn should_validate_questions() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let quiz = test_quiz(course.id, &[]);
    db.insert_quiz(&quiz);
    let usecase = QuizAdminUseCase {
        courses: db.courses(),
    };
    let input = |options: &[&str], correct: &str, points| QuestionInput {
        question: "Pick one".to_owned(),
        options: options.iter().map(|o| (*o).to_owned()).collect(),
        correct_answer: correct.to_owned(),
        points,
    };

    for bad in [
        input(&["only"], "only", 1),
        input(&["a", "b"], "c", 1),
        input(&["a", "b"], "a", 0),
        input(&["a", "  "], "a", 1),
    ] {
        let result = usecase.add_question(course.id, quiz.id, bad).await;
        assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    }
}

// ── Sequence ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_validate_sequence_updates() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let lecture = test_lecture(course.id, 0);
    let quiz = test_quiz(course.id, &[("a", 1)]);
    db.insert_lecture(&lecture);
    db.insert_quiz(&quiz);
    let usecase = UpdateSequenceUseCase {
        courses: db.courses(),
    };

    let saved = usecase
        .execute(course.id, vec![video(lecture.id), quiz_item(quiz.id)])
        .await
        .unwrap();
    assert_eq!(saved.len(), 2);

    let wrong_kind = usecase.execute(course.id, vec![quiz_item(lecture.id)]).await;
    assert!(matches!(wrong_kind, Err(LmsError::Validation(_))), "got {wrong_kind:?}");

    let repeated = usecase
        .execute(course.id, vec![video(lecture.id), video(lecture.id)])
        .await;
    assert!(matches!(repeated, Err(LmsError::Validation(_))), "got {repeated:?}");

    let stored = db.store.lock().unwrap().sequences[&course.id].clone();
    assert_eq!(stored, vec![video(lecture.id), quiz_item(quiz.id)]);
}

#[tokio::test]
async fn should_render_missing_sequence_content() {
    let db = MockDb::new();
    let course = test_course(100, 1);
    db.insert_course(&course);
    let lecture = test_lecture(course.id, 0);
    let gone = test_lecture(course.id, 1);
    db.insert_lecture(&lecture);
    db.store
        .lock()
        .unwrap()
        .sequences
        .insert(course.id, vec![video(lecture.id), video(gone.id)]);

    let steps = GetSequenceUseCase {
        courses: db.courses(),
        purchases: db.purchases(),
    }
    .execute(admin(), course.id)
    .await
    .unwrap();

    assert!(matches!(&steps[0], SequenceStep::Video(l) if l.id == lecture.id));
    assert!(matches!(
        &steps[1],
        SequenceStep::Missing(item) if item.content_id == gone.id && item.kind == SequenceKind::Video
    ));
}

use std::collections::HashSet;

use ednova_lms::error::LmsError;
use ednova_lms::usecase::badge::{
    CreateBadgeInput, CreateBadgeUseCase, DeleteBadgeUseCase, ListBadgesUseCase,
};

use crate::helpers::{MockDb, MockStorage, test_upload};

fn input(title: &str, xp_threshold: i64) -> CreateBadgeInput {
    CreateBadgeInput {
        title: title.to_owned(),
        content: "Awarded for steady progress".to_owned(),
        xp_threshold,
        image: test_upload(&format!("{title}.png")),
    }
}

#[tokio::test]
async fn should_create_badges_in_threshold_order() {
    let db = MockDb::new();
    let usecase = CreateBadgeUseCase {
        badges: db.badges(),
        storage: MockStorage::default(),
    };
    usecase.execute(input("scholar", 50)).await.unwrap();
    let starter = usecase.execute(input("starter", 10)).await.unwrap();
    assert_eq!(starter.image.unwrap().asset_id, "badges/starter.png");

    let listed = ListBadgesUseCase {
        badges: db.badges(),
    }
    .execute()
    .await
    .unwrap();

    let thresholds: Vec<i64> = listed.iter().map(|b| b.xp_threshold).collect();
    assert_eq!(thresholds, vec![10, 50]);
}

#[tokio::test]
async fn should_reject_invalid_badge_before_upload() {
    let db = MockDb::new();
    let storage = MockStorage::default();
    let usecase = CreateBadgeUseCase {
        badges: db.badges(),
        storage: storage.clone(),
    };

    for bad in [input("  ", 10), input("negative", -1)] {
        let result = usecase.execute(bad).await;
        assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    }
    assert!(storage.uploaded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_delete_badge_with_image_and_holdings() {
    let db = MockDb::new();
    let storage = MockStorage::default();
    let badge = CreateBadgeUseCase {
        badges: db.badges(),
        storage: storage.clone(),
    }
    .execute(input("starter", 10))
    .await
    .unwrap();
    let holder = uuid::Uuid::new_v4();
    db.store
        .lock()
        .unwrap()
        .held
        .insert(holder, HashSet::from([badge.id]));
    let usecase = DeleteBadgeUseCase {
        badges: db.badges(),
        storage: storage.clone(),
    };

    usecase.execute(badge.id).await.unwrap();

    assert!(db.held_badges(holder).is_empty());
    assert_eq!(*storage.deleted.lock().unwrap(), vec!["badges/starter.png"]);
    let again = usecase.execute(badge.id).await;
    assert!(matches!(again, Err(LmsError::NotFound("badge"))));
}

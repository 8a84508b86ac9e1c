use ednova_domain::pagination::PageRequest;
use ednova_lms::domain::types::AnnouncementCategory;
use ednova_lms::error::LmsError;
use ednova_lms::usecase::announcement::{
    CreateAnnouncementInput, CreateAnnouncementUseCase, ListAnnouncementsUseCase,
};

use crate::helpers::MockDb;

fn input(title: &str, category: &str) -> CreateAnnouncementInput {
    CreateAnnouncementInput {
        title: title.to_owned(),
        content: "The platform will be read-only on Sunday.".to_owned(),
        category: category.to_owned(),
    }
}

#[tokio::test]
async fn should_list_announcements_newest_first() {
    let db = MockDb::new();
    let create = CreateAnnouncementUseCase {
        announcements: db.announcements(),
    };
    create.execute(input("Maintenance", "Warning")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    create
        .execute(input("Study tips", "General Guidance"))
        .await
        .unwrap();

    let listed = ListAnnouncementsUseCase {
        announcements: db.announcements(),
    }
    .execute(PageRequest::default())
    .await
    .unwrap();

    let titles: Vec<&str> = listed.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Study tips", "Maintenance"]);
    assert_eq!(listed[1].category, AnnouncementCategory::Warning);
}

#[tokio::test]
async fn should_validate_announcements() {
    let db = MockDb::new();
    let create = CreateAnnouncementUseCase {
        announcements: db.announcements(),
    };

    for bad in [
        input("", "Warning"),
        input(&"t".repeat(201), "Warning"),
        input("Outage", "Gossip"),
    ] {
        let result = create.execute(bad).await;
        assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    }

    let mut empty = input("Outage", "Technical Issues");
    empty.content = "   ".to_owned();
    assert!(matches!(create.execute(empty).await, Err(LmsError::Validation(_))));
    assert!(db.store.lock().unwrap().announcements.is_empty());
}

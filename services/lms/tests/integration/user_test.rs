use std::collections::HashSet;

use chrono::{Duration, Utc};

use ednova_domain::pagination::PageRequest;
use ednova_domain::user::UserRole;
use ednova_lms::domain::repository::UserRepository;
use ednova_lms::domain::types::{AccountToken, AccountTokenKind, StoredAsset};
use ednova_lms::error::LmsError;
use ednova_lms::usecase::credential::{digest_token, verify_password};
use ednova_lms::usecase::upload::upload_then_write;
use ednova_lms::usecase::user::{
    ChangePasswordUseCase, CompleteVerificationUseCase, GetProfileUseCase, LeaderboardUseCase,
    ListUsersUseCase, LoginUseCase, RegisterInput, RegisterUseCase, ResetPasswordUseCase,
    SendAccountTokenUseCase, UpdateProfileInput, UpdateProfileUseCase,
};

use crate::helpers::{
    MockDb, MockMail, MockStorage, MockUserRepo, TEST_FRONT_URL, TEST_PASSWORD, tenant, test_badge,
    test_upload, test_user,
};

// ── Register / login ─────────────────────────────────────────────────────────

#[tokio::test]
async fn should_register_learner_with_normalized_email() {
    let db = MockDb::new();
    let usecase = RegisterUseCase { users: db.users() };

    let user = usecase
        .execute(RegisterInput {
            name: "  Ferris ".to_owned(),
            email: " Ferris@Example.COM ".to_owned(),
            password: "crabs-all-the-way".to_owned(),
        })
        .await
        .unwrap();

    assert_eq!(user.name, "Ferris");
    assert_eq!(user.email, "ferris@example.com");
    assert_eq!(user.role, UserRole::User);
    assert_eq!(user.xp, 0);
    assert!(!user.verified);
    assert!(verify_password("crabs-all-the-way", &db.user(user.id).password_hash));
}

#[tokio::test]
async fn should_reject_duplicate_email_and_name() {
    let db = MockDb::new();
    let existing = test_user(UserRole::User);
    db.insert_user(&existing);
    let usecase = RegisterUseCase { users: db.users() };

    let result = usecase
        .execute(RegisterInput {
            name: "someone-new".to_owned(),
            email: existing.email.to_uppercase(),
            password: TEST_PASSWORD.to_owned(),
        })
        .await;
    assert!(matches!(result, Err(LmsError::AlreadyExists("email"))), "got {result:?}");

    let result = usecase
        .execute(RegisterInput {
            name: existing.name.clone(),
            email: "new@example.com".to_owned(),
            password: TEST_PASSWORD.to_owned(),
        })
        .await;
    assert!(matches!(result, Err(LmsError::AlreadyExists("name"))), "got {result:?}");
}

#[tokio::test]
async fn should_validate_registration_fields() {
    let db = MockDb::new();
    let usecase = RegisterUseCase { users: db.users() };
    let input = |name: &str, email: &str, password: &str| RegisterInput {
        name: name.to_owned(),
        email: email.to_owned(),
        password: password.to_owned(),
    };

    for bad in [
        input("ab", "a@b.test", TEST_PASSWORD),
        input(&"x".repeat(31), "a@b.test", TEST_PASSWORD),
        input("ferris", "not-an-email", TEST_PASSWORD),
        input("ferris", "@b.test", TEST_PASSWORD),
        input("ferris", "a@b.test", "short"),
    ] {
        let result = usecase.execute(bad).await;
        assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    }
    assert!(db.store.lock().unwrap().users.is_empty());
}

#[tokio::test]
async fn should_fail_login_uniformly() {
    let db = MockDb::new();
    let user = test_user(UserRole::User);
    db.insert_user(&user);
    let usecase = LoginUseCase { users: db.users() };

    let ok = usecase.execute(&user.email.to_uppercase(), TEST_PASSWORD).await.unwrap();
    assert_eq!(ok.id, user.id);

    let wrong_password = usecase.execute(&user.email, "not the password").await;
    let unknown_email = usecase.execute("ghost@example.com", TEST_PASSWORD).await;
    assert!(matches!(wrong_password, Err(LmsError::InvalidCredentials)));
    assert!(matches!(unknown_email, Err(LmsError::InvalidCredentials)));
}

#[tokio::test]
async fn should_change_password_after_checking_old_one() {
    let db = MockDb::new();
    let user = test_user(UserRole::User);
    db.insert_user(&user);
    let usecase = ChangePasswordUseCase { users: db.users() };

    let result = usecase.execute(user.id, "wrong-old-password", "brand-new-pass").await;
    assert!(matches!(result, Err(LmsError::InvalidCredentials)));

    usecase
        .execute(user.id, TEST_PASSWORD, "brand-new-pass")
        .await
        .unwrap();
    assert!(verify_password("brand-new-pass", &db.user(user.id).password_hash));
}

#[tokio::test]
async fn should_register_admin_under_learner_rules() {
    let db = MockDb::new();
    let existing = test_user(UserRole::User);
    db.insert_user(&existing);
    let usecase = RegisterUseCase { users: db.users() };

    let admin = usecase
        .register_admin(RegisterInput {
            name: "Headmaster".to_owned(),
            email: "Head@School.io".to_owned(),
            password: TEST_PASSWORD.to_owned(),
        })
        .await
        .unwrap();
    assert_eq!(admin.role, UserRole::Admin);
    assert_eq!(admin.email, "head@school.io");
    assert_eq!(db.user(admin.id).role, UserRole::Admin);
    let login = LoginUseCase { users: db.users() }
        .execute("head@school.io", TEST_PASSWORD)
        .await
        .unwrap();
    assert!(login.role.is_admin());

    let taken = usecase
        .register_admin(RegisterInput {
            name: "Another head".to_owned(),
            email: existing.email.clone(),
            password: TEST_PASSWORD.to_owned(),
        })
        .await;
    assert!(matches!(taken, Err(LmsError::AlreadyExists("email"))), "got {taken:?}");

    let short = usecase
        .register_admin(RegisterInput {
            name: "Deputy".to_owned(),
            email: "deputy@school.io".to_owned(),
            password: "short".to_owned(),
        })
        .await;
    assert!(matches!(short, Err(LmsError::Validation(_))), "got {short:?}");
}

// ── Verification / reset ─────────────────────────────────────────────────────

fn send_tokens(db: &MockDb, mail: &MockMail) -> SendAccountTokenUseCase<MockUserRepo, MockMail> {
    SendAccountTokenUseCase {
        users: db.users(),
        mail: mail.clone(),
        front_url: format!("{TEST_FRONT_URL}/"),
        tenant: tenant("acme"),
    }
}

#[tokio::test]
async fn should_verify_account_with_mailed_token() {
    let db = MockDb::new();
    let user = test_user(UserRole::User);
    db.insert_user(&user);
    let mail = MockMail::default();

    send_tokens(&db, &mail)
        .execute(AccountTokenKind::Verify, &user.email)
        .await
        .unwrap();

    let body = mail.sent.lock().unwrap()[0].body.clone();
    assert!(body.contains(&format!("{TEST_FRONT_URL}/acme/verify/")), "{body}");
    let token = mail.last_token("verify");
    assert_eq!(token.len(), 40);

    let complete = CompleteVerificationUseCase { users: db.users() };
    complete.execute(&token).await.unwrap();
    assert!(db.user(user.id).verified);

    let reused = complete.execute(&token).await;
    assert!(matches!(reused, Err(LmsError::Validation(_))), "got {reused:?}");
}

#[tokio::test]
async fn should_refuse_to_verify_twice() {
    let db = MockDb::new();
    let mut user = test_user(UserRole::User);
    user.verified = true;
    db.insert_user(&user);
    let mail = MockMail::default();

    let result = send_tokens(&db, &mail)
        .execute(AccountTokenKind::Verify, &user.email)
        .await;

    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    assert!(mail.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_drop_token_when_mail_fails() {
    let db = MockDb::new();
    let user = test_user(UserRole::User);
    db.insert_user(&user);

    let result = send_tokens(&db, &MockMail::failing())
        .execute(AccountTokenKind::Reset, &user.email)
        .await;

    assert!(matches!(result, Err(LmsError::ExternalService("mail"))), "got {result:?}");
    assert!(db.store.lock().unwrap().tokens.is_empty());
}

#[tokio::test]
async fn should_reject_expired_token() {
    let db = MockDb::new();
    let user = test_user(UserRole::User);
    db.insert_user(&user);
    db.users()
        .set_token(
            user.id,
            AccountTokenKind::Verify,
            Some(&AccountToken {
                digest: digest_token("stale-token"),
                expires_at: Utc::now() - Duration::minutes(1),
            }),
        )
        .await
        .unwrap();

    let result = CompleteVerificationUseCase { users: db.users() }
        .execute("stale-token")
        .await;

    assert!(matches!(result, Err(LmsError::Validation(_))), "got {result:?}");
    assert!(!db.user(user.id).verified);
    assert!(db.store.lock().unwrap().tokens.is_empty());
}

#[tokio::test]
async fn should_reset_password_once() {
    let db = MockDb::new();
    let user = test_user(UserRole::User);
    db.insert_user(&user);
    let mail = MockMail::default();

    send_tokens(&db, &mail)
        .execute(AccountTokenKind::Reset, &user.email)
        .await
        .unwrap();
    let token = mail.last_token("reset");

    let reset = ResetPasswordUseCase { users: db.users() };
    let too_short = reset.execute(&token, "short").await;
    assert!(matches!(too_short, Err(LmsError::Validation(_))));

    reset.execute(&token, "a-fresh-password").await.unwrap();
    assert!(verify_password("a-fresh-password", &db.user(user.id).password_hash));

    let reused = reset.execute(&token, "another-password").await;
    assert!(matches!(reused, Err(LmsError::Validation(_))), "got {reused:?}");
}

// ── Profile ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_replace_avatar_and_delete_old_one() {
    let db = MockDb::new();
    let mut user = test_user(UserRole::User);
    user.avatar = Some(StoredAsset {
        asset_id: "avatars/old.png".to_owned(),
        public_url: "https://cdn.test/avatars/old.png".to_owned(),
    });
    db.insert_user(&user);
    let storage = MockStorage::default();
    let usecase = UpdateProfileUseCase {
        users: db.users(),
        storage: storage.clone(),
    };

    let updated = usecase
        .execute(
            user.id,
            UpdateProfileInput {
                name: Some("ferris-the-crab".to_owned()),
                avatar: Some(test_upload("new.png")),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "ferris-the-crab");
    assert_eq!(updated.avatar.unwrap().asset_id, "avatars/new.png");
    assert_eq!(*storage.deleted.lock().unwrap(), vec!["avatars/old.png"]);
    assert_eq!(db.user(user.id).name, "ferris-the-crab");
}

#[tokio::test]
async fn should_not_upload_avatar_when_name_is_taken() {
    let db = MockDb::new();
    let user = test_user(UserRole::User);
    let other = test_user(UserRole::User);
    db.insert_user(&user);
    db.insert_user(&other);
    let storage = MockStorage::default();

    let result = UpdateProfileUseCase {
        users: db.users(),
        storage: storage.clone(),
    }
    .execute(
        user.id,
        UpdateProfileInput {
            name: Some(other.name.clone()),
            avatar: Some(test_upload("new.png")),
        },
    )
    .await;

    assert!(matches!(result, Err(LmsError::AlreadyExists("name"))), "got {result:?}");
    assert!(storage.uploaded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_remove_uploaded_asset_when_write_fails() {
    let storage = MockStorage::default();

    let result: Result<(), LmsError> =
        upload_then_write(&storage, "badges", test_upload("gold.png"), |_asset| async {
            Err(LmsError::validation("write failed"))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(*storage.uploaded.lock().unwrap(), vec!["badges/gold.png"]);
    assert_eq!(*storage.deleted.lock().unwrap(), vec!["badges/gold.png"]);
}

#[tokio::test]
async fn should_show_held_badges_on_profile() {
    let db = MockDb::new();
    let user = test_user(UserRole::User);
    db.insert_user(&user);
    let badge = test_badge("Starter", 10);
    db.insert_badge(&badge);
    db.store
        .lock()
        .unwrap()
        .held
        .insert(user.id, HashSet::from([badge.id]));

    let profile = GetProfileUseCase {
        users: db.users(),
        badges: db.badges(),
    }
    .execute(user.id)
    .await
    .unwrap();

    assert_eq!(profile.user.id, user.id);
    assert_eq!(profile.badges, vec![badge.id]);
}

// ── Leaderboard ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_rank_users_by_xp() {
    let db = MockDb::new();
    for xp in [5, 50, 20] {
        let mut user = test_user(UserRole::User);
        user.xp = xp;
        db.insert_user(&user);
    }

    let board = LeaderboardUseCase {
        users: db.users(),
        badges: db.badges(),
    }
    .execute(PageRequest::default())
    .await
    .unwrap();

    let xp: Vec<i64> = board.iter().map(|p| p.user.xp).collect();
    assert_eq!(xp, vec![50, 20, 5]);
    assert!(board.iter().all(|p| p.badges.is_empty()));
}

// ── Admin listing ────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_list_every_user_newest_first_with_badges() {
    let db = MockDb::new();
    let mut oldest = test_user(UserRole::Admin);
    oldest.created_at = Utc::now() - Duration::days(3);
    let mut middle = test_user(UserRole::User);
    middle.created_at = Utc::now() - Duration::days(1);
    let newest = test_user(UserRole::User);
    for user in [&middle, &oldest, &newest] {
        db.insert_user(user);
    }
    let badge = test_badge("Starter", 10);
    db.insert_badge(&badge);
    db.store
        .lock()
        .unwrap()
        .held
        .insert(middle.id, HashSet::from([badge.id]));

    let users = ListUsersUseCase {
        users: db.users(),
        badges: db.badges(),
    }
    .execute()
    .await
    .unwrap();

    let ids: Vec<_> = users.iter().map(|p| p.user.id).collect();
    assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
    assert_eq!(users[1].badges, vec![badge.id]);
    assert!(users[0].badges.is_empty());
}

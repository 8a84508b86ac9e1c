use std::sync::Arc;
use std::time::Duration;

use ednova_domain::tenant::TenantNameError;
use ednova_domain::user::UserRole;
use ednova_lms::domain::repository::UserRepository;
use ednova_lms::tenant::{TenantError, TenantRegistry, TenantState};

use crate::helpers::{MockConnector, tenant, test_user};

// ── resolve ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_connect_once_for_concurrent_first_requests() {
    let connector = MockConnector::with_delay(Duration::from_millis(50));
    let registry = Arc::new(TenantRegistry::new(connector.clone()));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.resolve("acme").await.unwrap() })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap());
    }

    assert_eq!(connector.connect_count(), 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(handles[0].name().as_str(), "acme");
}

#[tokio::test]
async fn should_reuse_cached_handle() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());

    let first = registry.resolve("acme").await.unwrap();
    let second = registry.resolve("acme").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.connect_count(), 1);
    assert!(first.is_ready());
}

#[tokio::test]
async fn should_keep_tenants_isolated() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());

    let acme = registry.resolve("acme").await.unwrap();
    let beta = registry.resolve("beta").await.unwrap();

    assert_eq!(acme.conn().tenant, "acme");
    assert_eq!(beta.conn().tenant, "beta");
    assert_ne!(acme.conn().serial, beta.conn().serial);
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn should_not_share_data_between_tenants() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());
    let acme = registry.resolve("acme").await.unwrap();
    let beta = registry.resolve("beta").await.unwrap();

    let user = test_user(UserRole::User);
    acme.conn().db.users().create(&user).await.unwrap();

    let acme_users = acme.conn().db.users();
    let beta_users = beta.conn().db.users();
    assert!(acme_users.find_by_id(user.id).await.unwrap().is_some());
    assert!(beta_users.find_by_id(user.id).await.unwrap().is_none());
    assert!(beta_users.find_by_email(&user.email).await.unwrap().is_none());
    assert!(!beta_users.email_taken(&user.email).await.unwrap());
}

#[tokio::test]
async fn should_keep_tenant_data_across_reconnects() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());
    let user = test_user(UserRole::User);
    let first = registry.resolve("acme").await.unwrap();
    first.conn().db.users().create(&user).await.unwrap();

    registry.evict(first.name());
    let second = registry.resolve("acme").await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.conn().db.users().find_by_id(user.id).await.unwrap().is_some());
}

#[tokio::test]
async fn should_reject_invalid_names_without_connecting() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());

    for raw in ["", "Acme", "acme corp", "../etc", "-acme"] {
        let result = registry.resolve(raw).await;
        assert!(
            matches!(result, Err(TenantError::InvalidName(_))),
            "expected InvalidName for {raw:?}"
        );
    }
    assert_eq!(connector.connect_count(), 0);
    assert!(registry.tenants().is_empty());
}

#[tokio::test]
async fn should_reject_reserved_database_names() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());

    for raw in ["postgres", "template0", "template1"] {
        let result = registry.resolve(raw).await;
        assert!(
            matches!(
                result,
                Err(TenantError::InvalidName(TenantNameError::Reserved(_)))
            ),
            "expected Reserved for {raw:?}"
        );
    }
    assert_eq!(connector.connect_count(), 0);
    assert!(registry.tenants().is_empty());
}

#[tokio::test]
async fn should_reject_tenants_outside_allow_list() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone()).with_allow_list(["acme", "beta"]);

    assert!(registry.resolve("acme").await.is_ok());
    let result = registry.resolve("gamma").await;

    assert!(matches!(result, Err(TenantError::NotAllowed(_))));
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn should_not_cache_failed_connection() {
    let connector = MockConnector::default();
    connector.set_unreachable("acme", true);
    let registry = TenantRegistry::new(connector.clone());

    let result = registry.resolve("acme").await;
    assert!(matches!(result, Err(TenantError::Connect { .. })));
    assert!(registry.tenants().is_empty());

    connector.set_unreachable("acme", false);
    let handle = registry.resolve("acme").await.unwrap();
    assert!(handle.is_ready());
    assert_eq!(connector.connect_count(), 2);
}

// ── eviction ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reconnect_after_evict() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());

    let first = registry.resolve("acme").await.unwrap();
    assert!(registry.evict(&tenant("acme")));
    assert!(!registry.evict(&tenant("acme")));
    assert_eq!(first.state(), TenantState::Disconnected);

    let second = registry.resolve("acme").await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn should_evict_errored_handle() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());

    let handle = registry.resolve("acme").await.unwrap();
    registry.mark_errored(&handle);

    assert_eq!(handle.state(), TenantState::Errored);
    assert!(registry.tenants().is_empty());
    let fresh = registry.resolve("acme").await.unwrap();
    assert!(fresh.is_ready());
}

#[tokio::test]
async fn should_not_evict_newer_handle_when_stale_one_errors() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());

    let stale = registry.resolve("acme").await.unwrap();
    registry.evict(&tenant("acme"));
    let fresh = registry.resolve("acme").await.unwrap();

    registry.mark_errored(&stale);

    let again = registry.resolve("acme").await.unwrap();
    assert!(Arc::ptr_eq(&fresh, &again));
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn should_sweep_dead_connections_only() {
    let connector = MockConnector::default();
    let registry = TenantRegistry::new(connector.clone());

    registry.resolve("acme").await.unwrap();
    registry.resolve("beta").await.unwrap();
    connector.kill("acme");

    let evicted = registry.sweep().await;

    assert_eq!(evicted, vec![tenant("acme")]);
    assert_eq!(
        registry.tenants(),
        vec![(tenant("beta"), TenantState::Ready)]
    );
}

#[tokio::test(start_paused = true)]
async fn should_sweep_periodically() {
    let connector = MockConnector::default();
    let registry = Arc::new(TenantRegistry::new(connector.clone()));
    registry.resolve("acme").await.unwrap();

    let task = ednova_lms::tenant::spawn_health_sweep(Arc::clone(&registry), Duration::from_secs(30));
    connector.kill("acme");
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert!(registry.tenants().is_empty());
    task.abort();
}

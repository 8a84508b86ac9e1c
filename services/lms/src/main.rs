use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use ednova_auth_types::identity::SessionKey;
use ednova_core::config::Config;
use ednova_core::tracing::init_tracing;

use ednova_lms::config::LmsConfig;
use ednova_lms::infra::connector::PgTenantConnector;
use ednova_lms::infra::mail::HttpMailSender;
use ednova_lms::infra::payment::HttpPaymentGateway;
use ednova_lms::infra::storage::HttpObjectStorage;
use ednova_lms::router::build_router;
use ednova_lms::state::AppState;
use ednova_lms::tenant::{TenantRegistry, spawn_health_sweep};
use ednova_lms::usecase::locks::UserLocks;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = LmsConfig::from_env();

    let connector = PgTenantConnector::new(
        config.tenant_database_base_url.clone(),
        config.tenant_max_connections,
    );
    let mut registry = TenantRegistry::new(connector);
    if let Some(allowed) = config.allow_list() {
        info!(tenants = ?allowed, "serving allow-listed tenants only");
        registry = registry.with_allow_list(allowed);
    }
    let registry = Arc::new(registry);
    spawn_health_sweep(
        Arc::clone(&registry),
        Duration::from_secs(config.tenant_health_interval_secs),
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build HTTP client");

    let state = AppState {
        registry,
        session_key: SessionKey::new(config.session_secret.as_str()),
        session_ttl_secs: config.session_ttl_secs,
        cookie_domain: config.cookie_domain.clone(),
        front_url: config.front_url.clone(),
        payment_currency: config.payment_currency.clone(),
        payments: HttpPaymentGateway {
            client: http.clone(),
            api_url: config.payment_api_url.clone(),
            api_key: config.payment_api_key.clone(),
        },
        storage: HttpObjectStorage {
            client: http.clone(),
            api_url: config.storage_api_url.clone(),
            api_key: config.storage_api_key.clone(),
            public_url: config.storage_public_url.clone(),
        },
        mail: HttpMailSender {
            client: http,
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
        },
        user_locks: UserLocks::default(),
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.lms_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("lms service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}

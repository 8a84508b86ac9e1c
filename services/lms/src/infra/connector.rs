use std::time::Duration;

use anyhow::Context as _;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement,
};
use sea_orm_migration::MigratorTrait;

use ednova_domain::tenant::TenantName;
use ednova_lms_migration::Migrator;

use crate::tenant::TenantConnector;

/// Maintenance database used to provision tenant databases.
const ADMIN_DATABASE: &str = "postgres";

/// One Postgres database per tenant on a shared server: tenant `acme` lives in
/// `{base_url}/acme`.
#[derive(Debug, Clone)]
pub struct PgTenantConnector {
    pub base_url: String,
    pub max_connections: u32,
}

impl PgTenantConnector {
    pub fn new(base_url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            max_connections,
        }
    }

    fn url_for(&self, database: &str) -> String {
        format!("{}/{database}", self.base_url)
    }

    async fn database_exists(admin: &DatabaseConnection, name: &str) -> anyhow::Result<bool> {
        let row = admin
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT 1 FROM pg_database WHERE datname = $1",
                [name.into()],
            ))
            .await
            .context("look up tenant database")?;
        Ok(row.is_some())
    }

    async fn create_if_missing(
        admin: &DatabaseConnection,
        tenant: &TenantName,
    ) -> anyhow::Result<()> {
        if Self::database_exists(admin, tenant.as_str()).await? {
            return Ok(());
        }
        let created = admin.execute_unprepared(&create_database_sql(tenant)).await;
        if let Err(e) = created {
            // Another instance may have won the race.
            if !Self::database_exists(admin, tenant.as_str()).await? {
                return Err(e).context("create tenant database");
            }
            tracing::debug!(tenant = %tenant, error = %e, "tenant database already created");
            return Ok(());
        }
        tracing::info!(tenant = %tenant, "tenant database created");
        Ok(())
    }

    /// Create the tenant database if the server does not have it yet.
    async fn ensure_database(&self, tenant: &TenantName) -> anyhow::Result<()> {
        let mut opts = ConnectOptions::new(self.url_for(ADMIN_DATABASE));
        opts.max_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .sqlx_logging(false);
        let admin = Database::connect(opts)
            .await
            .context("connect to maintenance database")?;

        let result = Self::create_if_missing(&admin, tenant).await;
        if let Err(e) = admin.close().await {
            tracing::warn!(error = %e, "failed to close maintenance connection");
        }
        result
    }
}

/// Tenant names are restricted to `[a-z0-9_-]`, so quoting is enough. The
/// copy starts from `template0` so nothing written to `template1` reaches a
/// tenant.
fn create_database_sql(tenant: &TenantName) -> String {
    format!("CREATE DATABASE \"{}\" TEMPLATE template0", tenant.as_str())
}

impl TenantConnector for PgTenantConnector {
    type Conn = DatabaseConnection;

    async fn connect(&self, tenant: &TenantName) -> anyhow::Result<DatabaseConnection> {
        self.ensure_database(tenant).await?;

        let mut opts = ConnectOptions::new(self.url_for(tenant.as_str()));
        opts.max_connections(self.max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(5))
            .sqlx_logging(false);
        let db = Database::connect(opts)
            .await
            .with_context(|| format!("connect to tenant database {tenant}"))?;
        Migrator::up(&db, None)
            .await
            .with_context(|| format!("migrate tenant database {tenant}"))?;
        Ok(db)
    }

    async fn is_live(&self, conn: &DatabaseConnection) -> bool {
        conn.ping().await.is_ok()
    }
}

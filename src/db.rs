use anyhow::{Context, anyhow};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::info;

use crate::{
    auth::handlers::{NewAccount, create_account},
    config::Config,
    model::role::Role,
};

const MAX_CONNECTIONS: u32 = 10;

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Applies `migrations/*.sql`, embedded at compile time
pub async fn run_migrations(pool: &MySqlPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");
    Ok(())
}

/// Creates the first admin account when configured and none exists yet
pub async fn ensure_bootstrap_admin(pool: &MySqlPool, config: &Config) -> anyhow::Result<()> {
    let Some(admin) = &config.bootstrap_admin else {
        return Ok(());
    };

    let admins = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = ?")
        .bind(Role::Admin.id())
        .fetch_one(pool)
        .await
        .context("Failed to count admin accounts")?;
    if admins > 0 {
        return Ok(());
    }

    let id = create_account(
        pool,
        NewAccount {
            name: "Administrator",
            email: &admin.email,
            employee_code: "ADMIN-001",
            password: &admin.password,
            role: Role::Admin,
            phone: None,
            department: None,
            designation: Some("System Administrator"),
        },
    )
    .await
    .map_err(|e| anyhow!("Failed to create bootstrap admin: {e}"))?;

    info!(user_id = id, email = %admin.email, "Bootstrap admin created");
    Ok(())
}

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use finbridge::config::AppConfig;
use finbridge::db::{self, SqliteRepository};
use finbridge::models::User;
use finbridge::repo::Repository;
use finbridge::services::auth;
use finbridge::{api, scanner, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finbridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load();
    let paths = config.app_paths();
    paths.ensure_dirs().await?;

    let database_url = config.database_url();
    tracing::debug!("Database URL: {}", database_url);

    let connect_options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        // WAL with NORMAL sync is safe and much faster
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(connect_options)
        .await?;

    db::migrate(&pool).await?;

    let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::new(pool));

    // First run: create a default admin so the web UI has a login
    if repo.get_users().await?.is_empty() {
        let admin = User {
            id: Uuid::new_v4().to_string(),
            name: "admin".to_string(),
            password_hash: auth::hash_password("admin")?,
            is_admin: true,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_login: None,
            last_used: None,
        };
        repo.upsert_user(&admin).await?;
        tracing::info!("Created default admin user (username: admin, password: admin)");
    }

    if config.libraries.is_empty() {
        tracing::warn!("No libraries configured; the server will serve empty views");
    }
    let library = scanner::scan_libraries(&config.libraries)?;
    tracing::info!(
        "Library scan complete: {} collections, {} items",
        library.collections().len(),
        library.items().count(),
    );

    let bind = format!("{}:{}", config.server.bind_address, config.server.port);
    let state = Arc::new(AppState {
        library,
        repo,
        config,
        server_id: Uuid::new_v4().simple().to_string(),
    });

    let app = api::router(state);

    tracing::info!("Starting server on {}", bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

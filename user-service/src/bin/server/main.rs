use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use user_service::config::Config;
use user_service::config::DatabaseConfig;
use user_service::domain::user::service::UserService;
use user_service::inbound::http::router::create_router;
use user_service::inbound::http::router::UserRepositoryAdapter;
use user_service::outbound::repositories::PostgresUserStore;
use user_service::outbound::repositories::StorageMode;

const DATABASE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "user-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;
    let strict = config.server.environment.is_strict();

    tracing::info!(
        environment = ?config.server.environment,
        http_port = config.server.http_port,
        storage_mode = %config.database.mode,
        jwt_expiration_hours = config.jwt.expiration_hours,
        "Configuration loaded"
    );

    if config.jwt.uses_placeholder_secret() {
        tracing::warn!("jwt.secret is the built-in placeholder; set JWT__SECRET before deploying");
    }

    let authenticator = Arc::new(Authenticator::new(
        config.jwt.secret.as_bytes(),
        config.jwt.expiration_hours,
    ));

    let user_repository = match config.database.mode {
        StorageMode::Persistent => match connect_database(&config.database).await {
            Ok(pool) => UserRepositoryAdapter::persistent(PostgresUserStore::new(pool), !strict),
            Err(e) if !strict => {
                tracing::warn!(
                    error = %e,
                    "Database unavailable, starting with in-memory storage"
                );
                UserRepositoryAdapter::transient()
            }
            Err(e) => return Err(e),
        },
        StorageMode::Transient => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            UserRepositoryAdapter::transient()
        }
    };

    let user_service = Arc::new(UserService::new(
        Arc::new(user_repository),
        Arc::clone(&authenticator),
    ));

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(user_service, authenticator, !strict);

    axum::serve(http_listener, http_application)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server exited successfully");

    Ok(())
}

async fn connect_database(database: &DatabaseConfig) -> Result<PgPool, anyhow::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(DATABASE_CONNECT_TIMEOUT)
        .connect(&database.url)
        .await?;
    tracing::info!(
        max_connections = database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    Ok(pool)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

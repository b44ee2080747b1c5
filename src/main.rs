use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use task_portal::{
    AppState, PermissionPolicy,
    auth::TokenService,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point for the application, responsible for initializing
/// all core components: configuration, logging, database, token service, the
/// permission policy, and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (fail-fast)
    // Loads .env file settings before configuration can be read. AppConfig::load()
    // refuses to start without a signing secret or database URL.
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // Prioritizes RUST_LOG, falling back to sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "task_portal=debug,tower_http=info,axum=trace".into());

    // 3. Initialize logging based on environment.
    match config.env {
        Env::Local => {
            // LOCAL: pretty output for human readability during debugging.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON output for ingestion by centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // Instantiate the repository, wrapped in an Arc for thread-safe sharing.
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Token Service & Permission Policy
    // Both are immutable values built once here and shared read-only across every
    // request-handling task.
    let tokens = TokenService::new(&config.jwt_secret, config.token_ttl_minutes);
    let policy = PermissionPolicy::new();

    // Regenerate the persisted role projection from the in-memory policy so the
    // display tables can never drift from the runtime authority.
    let role_rows: Vec<(String, String)> = policy
        .role_rows()
        .into_iter()
        .map(|(name, description)| (name.to_string(), description))
        .collect();
    if !repo.seed_roles(&role_rows).await {
        tracing::warn!("Role projection seeding failed; display tables may be stale");
    }

    // 6. Unified State Assembly
    let app_state = AppState {
        repo,
        tokens,
        policy,
        config,
    };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("FATAL: failed to bind 0.0.0.0:3000");

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:3000/swagger-ui");

    // The long-running Axum server process.
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {:?}", e);
    }
}

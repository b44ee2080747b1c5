use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repository;

// Module for routing segregation by API prefix.
pub mod routes;

use auth::{AuthUser, TokenService};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use policy::PermissionPolicy;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the application.
/// It aggregates all API paths and data schemas decorated with the
/// `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // List all public handler functions here for documentation generation.
    paths(
        handlers::register, handlers::register_with_role, handlers::login,
        handlers::refresh_token, handlers::validate_token, handlers::logout,
        handlers::get_users, handlers::get_user_by_id, handlers::get_permissions,
        handlers::setup_permissions, handlers::list_tasks, handlers::create_task,
        handlers::get_task, handlers::update_task, handlers::update_task_status,
        handlers::delete_task
    ),
    // List all models (schemas) used in the request/response bodies.
    components(
        schemas(
            models::RegisterRequest, models::LoginForm, models::UserResponse,
            models::TokenResponse, models::TokenValidationResponse, models::MessageResponse,
            models::RolePermissions, models::Task, models::CreateTaskRequest,
            models::UpdateTaskRequest, models::UpdateTaskStatusRequest,
            models::TaskCreateResponse, models::TaskStatusResponse, models::TaskDeleteResponse,
            errors::ErrorBody,
        )
    ),
    tags(
        (name = "task-portal", description = "Task management API with role-based access control")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**: a single, thread-safe, immutable
/// container holding all essential application services and configuration, shared
/// across all incoming requests. The permission policy and the token service are
/// built once at startup and only ever read afterwards, so no synchronization is
/// needed on the request path.
#[derive(Clone)]
pub struct AppState {
    /// Repository layer: abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Token service: issues and verifies session tokens (process-wide secret).
    pub tokens: TokenService,
    /// The static role → permission map, sole runtime authorization authority.
    pub policy: PermissionPolicy,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow handlers and extractors to selectively pull
// components from the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for PermissionPolicy {
    fn from_ref(app_state: &AppState) -> PermissionPolicy {
        app_state.policy
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the task routes.
///
/// *Mechanism*: it attempts to extract `AuthUser` from the request. Since
/// `AuthUser` implements `FromRequestParts`, a failed verification (bad signature,
/// expired token, deleted user) rejects the request with a 401 before the handler
/// runs. Authorization — whether this user may do this thing — stays with the
/// per-handler guard calls.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped
/// middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // GET /health
        // Unauthenticated liveness endpoint for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // Auth surface: registration/login are public; the protected handlers in
        // this group perform their own extraction and guard checks.
        .nest("/api/auth", routes::auth::auth_routes())
        // Task surface: every route requires a valid session, enforced by the
        // authentication layer before any handler runs.
        .nest(
            "/api/tasks",
            routes::tasks::task_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Apply the unified state to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing: wraps the request/response lifecycle in a span
                // that includes the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS layer.
        .layer(cors)
}

/// trace_span_logger
///
/// Helper used by `TraceLayer` to customize span creation: extracts the
/// `x-request-id` header (if present) and includes it in the structured logging
/// metadata alongside the HTTP method and URI, so every log line for a single
/// request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Auth Router Module
///
/// Defines the identity surface mounted under `/api/auth`. The module mixes three
/// access tiers:
/// - **Public**: registration and login, reachable without a token.
/// - **Token**: refresh/validate/logout, which operate on the presented bearer
///   token itself via the `Bearer` extractor.
/// - **Authenticated**: user listing and permission introspection, which resolve
///   a full `AuthUser` and run explicit guard checks in the handler.
///
/// Method/path pairs are part of the external contract and must not change.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /api/auth/register
        // New account creation with the role carried in the JSON body.
        // Duplicate username/email and out-of-catalog roles fail with 400.
        .route("/register", post(handlers::register))
        // POST /api/auth/register-with-role?role_name=...
        // Registration variant taking the role as a query parameter, defaulting
        // to "student". Any role present in the body is ignored.
        .route("/register-with-role", post(handlers::register_with_role))
        // POST /api/auth/login
        // OAuth2 password-style form login. Returns the bearer token plus the
        // role claim. Failures are uniform to prevent username enumeration.
        .route("/login", post(handlers::login))
        // POST /api/auth/token/refresh
        // Exchanges a valid token for one with a fresh expiry window. No
        // password required; the server keeps no session state either way.
        .route("/token/refresh", post(handlers::refresh_token))
        // POST /api/auth/token/validate
        // Reports token validity. Signature/expiry failures are 200 {valid:false}.
        .route("/token/validate", post(handlers::validate_token))
        // POST /api/auth/logout
        // Acknowledges logout. Stateless tokens cannot be revoked server-side;
        // the client discards its copy.
        .route("/logout", post(handlers::logout))
        // GET /api/auth/users
        // Full account listing, gated by read:users (admin only).
        .route("/users", get(handlers::get_users))
        // GET /api/auth/users/{id}
        // Single account, readable by the account holder or an admin.
        .route("/users/{id}", get(handlers::get_user_by_id))
        // GET /api/auth/permissions
        // Policy introspection: admins get every role mapping, others their own.
        .route("/permissions", get(handlers::get_permissions))
        // POST /api/auth/permissions/setup
        // Admin-only, idempotent regeneration of the persisted role projection.
        .route("/permissions/setup", post(handlers::setup_permissions))
}

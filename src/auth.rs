use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    errors::ApiError,
    policy::{Identity, Role},
    repository::RepositoryState,
};

/// Claims
///
/// The payload structure inside a session token. Signed with the server's
/// symmetric secret and validated on every authenticated request. Tokens are
/// stateless and self-contained: nothing about a session is persisted server-side,
/// and there is no revocation list — logout is a client-side act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the username of the authenticated user.
    pub sub: String,
    /// The role claim captured at issuance. The extractor re-reads the current
    /// role from the database, so a role change takes effect on the next request,
    /// not the next login.
    pub role: String,
    /// Issued At (iat): timestamp when the token was created.
    pub iat: usize,
    /// Expiration Time (exp): always `iat + configured TTL`.
    pub exp: usize,
}

/// AuthError
///
/// Token verification failures. `InvalidToken` covers signature mismatch and
/// malformed payloads; `Expired` is a structurally valid token past its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => ApiError::InvalidToken,
            AuthError::Expired => ApiError::Expired,
        }
    }
}

/// TokenService
///
/// Issues and verifies HS256 session tokens. The signing secret and TTL are fixed
/// at construction from the loaded configuration; the service itself is stateless
/// and cheap to clone into the shared application state.
///
/// Every public operation delegates to an `*_at` variant taking an explicit `now`,
/// so expiry behavior is testable without sleeping or patching the system clock.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        TokenService {
            secret: secret.to_string(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// issue
    ///
    /// Produces a signed token for the given identity with expiry `now + TTL`.
    /// Pure computation; no server-side session record is created.
    pub fn issue(&self, username: &str, role: Role) -> Result<String, ApiError> {
        self.issue_at(Utc::now(), username, role)
    }

    /// Clock-injected variant of [`TokenService::issue`].
    pub fn issue_at(
        &self,
        now: DateTime<Utc>,
        username: &str,
        role: Role,
    ) -> Result<String, ApiError> {
        let claims = Claims {
            sub: username.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!("token signing failed: {:?}", e);
            ApiError::Internal
        })
    }

    /// verify
    ///
    /// Checks signature validity and expiry. Returns the decoded claims on
    /// success; `InvalidToken` or `Expired` otherwise.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Clock-injected variant of [`TokenService::verify`]. Signature and payload
    /// shape are checked by the decoder; expiry is compared against the passed-in
    /// clock so tests can step time forward explicitly.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        // Expiry is enforced below against the injected clock, not the wall clock.
        validation.validate_exp = false;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidToken)?;

        if now.timestamp() >= token_data.claims.exp as i64 {
            return Err(AuthError::Expired);
        }
        Ok(token_data.claims)
    }

    /// refresh
    ///
    /// Verifies the incoming token and issues a replacement with the same subject
    /// and role but a fresh expiry window. No password re-authentication is
    /// required; this extends sessions without server-side state. The tradeoff is
    /// documented and deliberate: a stolen valid token can be refreshed
    /// indefinitely, since no revocation mechanism exists.
    pub fn refresh(&self, token: &str) -> Result<(String, Claims), ApiError> {
        let claims = self.verify(token)?;
        let role = Role::parse(&claims.role).ok_or(ApiError::InvalidToken)?;
        let renewed = self.issue(&claims.sub, role)?;
        Ok((renewed, claims))
    }
}

// --- Password hashing (argon2) ---

/// Hashes a plaintext password into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {:?}", e);
            ApiError::Internal
        })
}

/// Constant-time verification of a plaintext password against a stored PHC string.
/// An unparseable stored hash verifies as false rather than erroring, so login
/// failures stay uniform.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// --- Extractors ---

/// Bearer
///
/// Extracts the raw bearer token from the Authorization header. Used by the token
/// lifecycle endpoints (refresh, validate, logout) that operate on the token
/// itself rather than on a resolved user.
#[derive(Debug)]
pub struct Bearer(pub String);

impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::InvalidToken)?;

        Ok(Bearer(token.to_string()))
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the output of verifying the
/// bearer token and re-reading the user record. Handlers take this as a function
/// argument, keeping authentication cleanly separated from business logic.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
}

impl AuthUser {
    /// The guard-facing view of this user.
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
            is_active: self.is_active,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// The process:
/// 1. Dependency resolution: pull the Repository and TokenService from state.
/// 2. Token extraction and verification (signature + expiry).
/// 3. DB lookup by the subject claim. This rejects tokens for users deleted after
///    issuance, and picks up the user's *current* role and active flag rather than
///    trusting the claims snapshot.
///
/// Rejection: 401 with `invalid_token` / `token_expired` reason codes. The active
/// flag is deliberately not checked here — the authorization guard reports
/// inactive accounts as a 403 `inactive_account` denial instead.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let tokens = TokenService::from_ref(state);

        let Bearer(token) = Bearer::from_request_parts(parts, state).await?;
        let claims = tokens.verify(&token)?;

        let user = repo
            .get_user_by_username(&claims.sub)
            .await
            .ok_or(ApiError::InvalidToken)?;

        // A role outside the closed set means the row was edited out-of-band.
        let role = user.role().ok_or(ApiError::InvalidToken)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role,
            is_active: user.is_active,
        })
    }
}

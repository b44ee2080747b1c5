use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::policy::Role;

// --- Field constraints (enforced in request validation) ---

pub const TITLE_MIN_LEN: usize = 1;
pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 1000;

/// TaskStatus
///
/// The closed set of task lifecycle states. Persisted as text; parsed back through
/// this enum so an invalid value can never round-trip silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table. This is the only
/// struct that carries the password hash; it never leaves the process — API
/// responses go through [`UserResponse`] instead.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    // The user's login identifier. Globally unique.
    pub username: String,
    // Globally unique contact address.
    pub email: String,
    // Argon2 PHC string produced at registration. Never serialized.
    pub password_hash: String,
    // The RBAC field: 'student', 'teacher' or 'admin'.
    pub role: String,
    // Inactive accounts fail every authorization check.
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The parsed role. Rows are written through the enum, so a parse failure
    /// here means the database was edited out-of-band; callers treat it as a
    /// denied request rather than trusting an unknown role string.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

/// Task
///
/// A task record from the `tasks` table. `user_id` is the owning user and is
/// immutable once set; every authorization decision about the task keys off it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, Default)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Internal insert payload handed to the repository by the registration handlers,
/// after the password has been hashed and the role validated.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for POST /api/auth/register. The role arrives as a plain string
/// so an out-of-catalog value surfaces as an `invalid_role` failure instead of a
/// generic deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

/// LoginForm
///
/// Form body for POST /api/auth/login (OAuth2 password-style form fields).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// CreateTaskRequest
///
/// Input payload for POST /api/tasks. Status defaults to "pending" when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl CreateTaskRequest {
    /// Field-constraint validation: title 1–200 chars, description ≤1000 chars,
    /// status inside the closed set.
    pub fn validate(&self) -> Result<TaskStatus, &'static str> {
        validate_title(&self.title)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        match &self.status {
            None => Ok(TaskStatus::Pending),
            Some(s) => TaskStatus::parse(s)
                .ok_or("status must be one of: pending, in_progress, completed"),
        }
    }
}

/// UpdateTaskRequest
///
/// Partial update payload for PUT /api/tasks/{id}. All fields are optional;
/// only provided fields are written (COALESCE at the repository layer).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl UpdateTaskRequest {
    pub fn validate(&self) -> Result<Option<TaskStatus>, &'static str> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        match &self.status {
            None => Ok(None),
            Some(s) => TaskStatus::parse(s)
                .map(Some)
                .ok_or("status must be one of: pending, in_progress, completed"),
        }
    }
}

/// UpdateTaskStatusRequest
///
/// Body for PATCH /api/tasks/{id}/status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateTaskStatusRequest {
    pub status: String,
}

fn validate_title(title: &str) -> Result<(), &'static str> {
    let len = title.chars().count();
    if len < TITLE_MIN_LEN {
        return Err("title must not be empty");
    }
    if len > TITLE_MAX_LEN {
        return Err("title must be at most 200 characters");
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), &'static str> {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err("description must be at most 1000 characters");
    }
    Ok(())
}

// --- Response Schemas (Output) ---

/// UserResponse
///
/// Public projection of a user record. Deliberately excludes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// TokenResponse
///
/// Output of login and refresh: the bearer token plus the role claim, which the
/// frontend uses to select its view without decoding the token itself.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, role: &str) -> Self {
        TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            role: role.to_string(),
        }
    }
}

/// TokenValidationResponse
///
/// Output of POST /api/auth/token/validate. A failed validation is a 200 with
/// `valid: false`, never a 401 — the endpoint reports on a token, it is not
/// itself gated by one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl TokenValidationResponse {
    pub fn invalid() -> Self {
        TokenValidationResponse::default()
    }
}

/// MessageResponse
///
/// Generic `{"message": ...}` payload (logout, permissions setup).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// RolePermissions
///
/// One role's grant list, as shown by the permissions introspection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RolePermissions {
    pub role: String,
    pub permissions: Vec<String>,
}

// --- Audit-friendly Task Responses ---

/// TaskCreateResponse
///
/// Creation receipt wrapping the new task row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskCreateResponse {
    pub message: String,
    pub task: Task,
    pub created_at: DateTime<Utc>,
}

/// TaskStatusResponse
///
/// Status-transition receipt recording the old and new state for audit output.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskStatusResponse {
    pub message: String,
    pub task_id: i64,
    pub old_status: String,
    pub new_status: String,
    pub updated_at: DateTime<Utc>,
}

/// TaskDeleteResponse
///
/// Deletion receipt with the removed id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskDeleteResponse {
    pub message: String,
    pub deleted_task_id: i64,
    pub deleted_at: DateTime<Utc>,
}

use crate::{
    AppState,
    auth::{AuthUser, Bearer, hash_password, verify_password},
    errors::{ApiError, ApiResult},
    models::{
        CreateTaskRequest, LoginForm, MessageResponse, NewUser, RegisterRequest, RolePermissions,
        Task, TaskCreateResponse, TaskDeleteResponse, TaskStatus, TaskStatusResponse,
        TokenResponse, TokenValidationResponse, UpdateTaskRequest, UpdateTaskStatusRequest,
        UserResponse,
    },
    policy::{
        DELETE_TASK_CANDIDATES, Denied, Permission, Role, TaskScope, UPDATE_TASK_CANDIDATES,
        authorize, authorize_task_mutation,
    },
    repository::CreateUserError,
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;

// --- Query Structs ---

/// RoleQuery
///
/// Accepted query parameters for the role-explicit registration endpoint.
/// The parameter is named `role_name` on the wire; existing clients depend on it.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct RoleQuery {
    /// Optional role name (student, teacher, admin). Defaults to "student".
    pub role_name: Option<String>,
}

// --- Internal helpers ---

/// Runs the shared registration flow: role validation, password hashing, and the
/// atomic insert. Uniqueness is settled by the database's unique index, so a
/// duplicate registration always maps to `Conflict` — even under concurrency.
async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
    role: Role,
) -> ApiResult<UserResponse> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::Validation("username must not be empty".to_string()));
    }
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(ApiError::Validation("email must be a valid address".to_string()));
    }
    if payload.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            CreateUserError::Duplicate => ApiError::Conflict,
            CreateUserError::Database => ApiError::Internal,
        })?;

    Ok(user.into())
}

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates a new user account. The role travels in the JSON body
/// and must be inside the closed catalog; omitting it defaults to "student".
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = UserResponse),
        (status = 400, description = "Conflict or invalid role")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<UserResponse>> {
    let role = match payload.role.as_deref() {
        None => Role::Student,
        Some(raw) => Role::parse(raw).ok_or(ApiError::InvalidRole)?,
    };
    let user = register_user(&state, payload, role).await?;
    Ok(Json(user))
}

/// register_with_role
///
/// [Public Route] Same as `register`, but the role is passed as a query parameter.
/// Any role present in the body is ignored; the query value (or the "student"
/// default) wins.
#[utoipa::path(
    post,
    path = "/api/auth/register-with-role",
    params(RoleQuery),
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = UserResponse),
        (status = 400, description = "Conflict or invalid role")
    )
)]
pub async fn register_with_role(
    State(state): State<AppState>,
    Query(query): Query<RoleQuery>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<UserResponse>> {
    let role = match query.role_name.as_deref() {
        None => Role::Student,
        Some(raw) => Role::parse(raw).ok_or(ApiError::InvalidRole)?,
    };
    let user = register_user(&state, payload, role).await?;
    Ok(Json(user))
}

/// login
///
/// [Public Route] Password authentication. The failure response is uniform: an
/// unknown username and a wrong password are indistinguishable to the caller, so
/// the endpoint cannot be used to enumerate accounts. On success the user's
/// `last_login` is stamped and a fresh token is issued.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .repo
        .get_user_by_username(&form.username)
        .await
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&form.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let role = user.role().ok_or(ApiError::Internal)?;

    state.repo.touch_last_login(user.id).await;

    let access_token = state.tokens.issue(&user.username, role)?;
    Ok(Json(TokenResponse::bearer(access_token, role.as_str())))
}

/// refresh_token
///
/// [Token Route] Exchanges a still-valid bearer token for a new one with a fresh
/// expiry window, without a password round trip. The subject must still exist;
/// a token for a deleted user cannot be renewed.
#[utoipa::path(
    post,
    path = "/api/auth/token/refresh",
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Bearer(token): Bearer,
) -> ApiResult<Json<TokenResponse>> {
    let (renewed, claims) = state.tokens.refresh(&token)?;

    if state.repo.get_user_by_username(&claims.sub).await.is_none() {
        return Err(ApiError::InvalidToken);
    }

    Ok(Json(TokenResponse::bearer(renewed, &claims.role)))
}

/// validate_token
///
/// [Token Route] Reports on a token without gating on it: signature or expiry
/// failures produce a 200 with `valid: false` rather than a 401. A structurally
/// valid token whose subject no longer exists is rejected outright.
#[utoipa::path(
    post,
    path = "/api/auth/token/validate",
    responses(
        (status = 200, description = "Validation result", body = TokenValidationResponse),
        (status = 401, description = "Token subject no longer exists")
    )
)]
pub async fn validate_token(
    State(state): State<AppState>,
    Bearer(token): Bearer,
) -> ApiResult<Json<TokenValidationResponse>> {
    let claims = match state.tokens.verify(&token) {
        Ok(claims) => claims,
        Err(_) => return Ok(Json(TokenValidationResponse::invalid())),
    };

    let user = state
        .repo
        .get_user_by_username(&claims.sub)
        .await
        .ok_or(ApiError::InvalidToken)?;

    Ok(Json(TokenValidationResponse {
        valid: true,
        username: Some(user.username.clone()),
        role: Some(user.role.clone()),
        is_active: Some(user.is_active),
    }))
}

/// logout
///
/// [Token Route] Verifies the presented token and acknowledges the logout. The
/// subject must still exist; a deleted user's token is rejected like any other
/// authenticated request. No server-side state changes: tokens are stateless and
/// remain technically valid until expiry. Revocation is intentionally out of scope.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Invalid token")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Bearer(token): Bearer,
) -> ApiResult<Json<MessageResponse>> {
    let claims = state.tokens.verify(&token)?;

    if state.repo.get_user_by_username(&claims.sub).await.is_none() {
        return Err(ApiError::InvalidToken);
    }

    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// get_users
///
/// [Admin Route] Lists every user account. Gated by `read:users`, which only the
/// admin role holds.
#[utoipa::path(
    get,
    path = "/api/auth/users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 403, description = "Denied")
    )
)]
pub async fn get_users(
    auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    authorize(&state.policy, &auth.identity(), Permission::ReadUsers, None)?;

    let users = state
        .repo
        .list_users()
        .await
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(Json(users))
}

/// get_user_by_id
///
/// [Authenticated Route] A user may read their own record; everyone else needs
/// `read:users` (admin).
#[utoipa::path(
    get,
    path = "/api/auth/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 403, description = "Denied"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_user_by_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserResponse>> {
    let identity = auth.identity();
    if !identity.is_active {
        return Err(Denied::InactiveAccount.into());
    }

    let user = state.repo.get_user(id).await.ok_or(ApiError::NotFound("user"))?;

    if auth.id != id {
        authorize(&state.policy, &identity, Permission::ReadUsers, None)?;
    }

    Ok(Json(user.into()))
}

/// get_permissions
///
/// [Authenticated Route] Introspection over the static policy map. Admins see the
/// complete role → permission mapping; everyone else sees only their own role's
/// grants. Output is rendered from the in-memory policy, never from the persisted
/// projection tables.
#[utoipa::path(
    get,
    path = "/api/auth/permissions",
    responses((status = 200, description = "Role permission mappings"))
)]
pub async fn get_permissions(
    auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    let identity = auth.identity();
    if !identity.is_active {
        return Err(Denied::InactiveAccount.into());
    }

    if auth.role == Role::Admin {
        let mappings: Vec<RolePermissions> = Role::ALL
            .iter()
            .map(|role| RolePermissions {
                role: role.as_str().to_string(),
                permissions: state
                    .policy
                    .permission_names(*role)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();
        Ok(Json(serde_json::json!({ "role_permissions": mappings })))
    } else {
        Ok(Json(serde_json::json!({
            "role": auth.role.as_str(),
            "permissions": state.policy.permission_names(auth.role),
        })))
    }
}

/// setup_permissions
///
/// [Admin Route] Idempotently regenerates the persisted `roles` rows from the
/// in-memory policy. The table is a display-only projection; repeated calls are
/// no-ops for existing rows.
#[utoipa::path(
    post,
    path = "/api/auth/permissions/setup",
    responses(
        (status = 200, description = "Setup complete", body = MessageResponse),
        (status = 403, description = "Denied")
    )
)]
pub async fn setup_permissions(
    auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<MessageResponse>> {
    let identity = auth.identity();
    if !identity.is_active {
        return Err(Denied::InactiveAccount.into());
    }
    if auth.role != Role::Admin {
        return Err(Denied::MissingPermission.into());
    }

    let rows: Vec<(String, String)> = state
        .policy
        .role_rows()
        .into_iter()
        .map(|(name, description)| (name.to_string(), description))
        .collect();

    if !state.repo.seed_roles(&rows).await {
        return Err(ApiError::Internal);
    }

    Ok(Json(MessageResponse {
        message: "Permissions setup completed".to_string(),
    }))
}

// --- Task Handlers ---

/// list_tasks
///
/// [Authenticated Route] Lists tasks under `read:tasks`. Roles holding
/// `read:all-tasks` (or the unscoped admin set) see every task; everyone else
/// sees only their own.
#[utoipa::path(
    get,
    path = "/api/tasks",
    responses(
        (status = 200, description = "Tasks", body = [Task]),
        (status = 403, description = "Denied")
    )
)]
pub async fn list_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Task>>> {
    authorize(&state.policy, &auth.identity(), Permission::ReadTasks, None)?;

    let owner = match state.policy.task_read_scope(auth.role) {
        TaskScope::All => None,
        TaskScope::Own => Some(auth.id),
    };
    Ok(Json(state.repo.list_tasks(owner).await))
}

/// create_task
///
/// [Authenticated Route] Creates a task owned by the caller. Gated by
/// `create:tasks`; payload constraints (title 1–200, description ≤1000, status in
/// the closed set) are enforced before the insert.
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 200, description = "Created", body = TaskCreateResponse),
        (status = 403, description = "Denied"),
        (status = 422, description = "Validation failure")
    )
)]
pub async fn create_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> ApiResult<Json<TaskCreateResponse>> {
    authorize(&state.policy, &auth.identity(), Permission::CreateTasks, None)?;

    let status = payload
        .validate()
        .map_err(|msg| ApiError::Validation(msg.to_string()))?;

    let task = state
        .repo
        .create_task(
            auth.id,
            &payload.title,
            payload.description.as_deref(),
            status.as_str(),
        )
        .await
        .ok_or(ApiError::Internal)?;

    let created_at = task.created_at;
    Ok(Json(TaskCreateResponse {
        message: "Task created successfully".to_string(),
        task,
        created_at,
    }))
}

/// get_task
///
/// [Authenticated Route] Retrieves a single task. Own-scoped readers asking for
/// someone else's task get a 404, not a 403 — the id space is not probeable.
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = Task),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Task>> {
    authorize(&state.policy, &auth.identity(), Permission::ReadTasks, None)?;

    let task = state.repo.get_task(id).await.ok_or(ApiError::NotFound("task"))?;

    if state.policy.task_read_scope(auth.role) == TaskScope::Own && task.user_id != auth.id {
        return Err(ApiError::NotFound("task"));
    }

    Ok(Json(task))
}

/// update_task
///
/// [Authenticated Route] Partial update of a task. The guard resolves the widest
/// update permission the caller's role holds: admins pass unscoped, teachers pass
/// through `update:all-tasks`, students must own the task (`update:own-tasks`).
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated", body = Task),
        (status = 403, description = "Denied"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let task = state.repo.get_task(id).await.ok_or(ApiError::NotFound("task"))?;

    authorize_task_mutation(
        &state.policy,
        &auth.identity(),
        UPDATE_TASK_CANDIDATES,
        task.user_id,
    )?;

    let status = payload
        .validate()
        .map_err(|msg| ApiError::Validation(msg.to_string()))?;

    let updated = state
        .repo
        .update_task(
            id,
            payload.title.as_deref(),
            payload.description.as_deref(),
            status.map(|s| s.as_str()),
        )
        .await
        .ok_or(ApiError::Internal)?;

    Ok(Json(updated))
}

/// update_task_status
///
/// [Authenticated Route] Status-only transition with an audit-friendly receipt
/// recording the old and new state. Same permission resolution as a full update.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}/status",
    params(("id" = i64, Path, description = "Task ID")),
    request_body = UpdateTaskStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = TaskStatusResponse),
        (status = 403, description = "Denied"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_task_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskStatusRequest>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let new_status = TaskStatus::parse(&payload.status).ok_or_else(|| {
        ApiError::Validation("status must be one of: pending, in_progress, completed".to_string())
    })?;

    let task = state.repo.get_task(id).await.ok_or(ApiError::NotFound("task"))?;

    authorize_task_mutation(
        &state.policy,
        &auth.identity(),
        UPDATE_TASK_CANDIDATES,
        task.user_id,
    )?;

    let updated = state
        .repo
        .set_task_status(id, new_status.as_str())
        .await
        .ok_or(ApiError::Internal)?;

    Ok(Json(TaskStatusResponse {
        message: "Task status updated successfully".to_string(),
        task_id: id,
        old_status: task.status,
        new_status: updated.status,
        updated_at: updated.updated_at,
    }))
}

/// delete_task
///
/// [Authenticated Route] Deletes a task after the delete-permission resolution
/// (admin unscoped, otherwise `delete:own-tasks` with the ownership rule).
/// Returns a deletion receipt rather than an empty 204, for audit trails.
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Deleted", body = TaskDeleteResponse),
        (status = 403, description = "Denied"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskDeleteResponse>> {
    let task = state.repo.get_task(id).await.ok_or(ApiError::NotFound("task"))?;

    authorize_task_mutation(
        &state.policy,
        &auth.identity(),
        DELETE_TASK_CANDIDATES,
        task.user_id,
    )?;

    if !state.repo.delete_task(id).await {
        return Err(ApiError::NotFound("task"));
    }

    Ok(Json(TaskDeleteResponse {
        message: "Task deleted successfully".to_string(),
        deleted_task_id: id,
        deleted_at: Utc::now(),
    }))
}

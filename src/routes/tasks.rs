use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

/// Task Router Module
///
/// Defines the task CRUD surface mounted under `/api/tasks`. The whole router sits
/// behind the authentication middleware layer applied in `create_router`, and every
/// handler additionally runs the authorization guard with the permission that
/// endpoint requires — middleware establishes *who*, the guard decides *whether*.
pub fn task_routes() -> Router<AppState> {
    Router::new()
        // GET /api/tasks
        // Lists tasks under read:tasks. The read scope decides whether the caller
        // sees only their own rows or every row (read:all-tasks / admin).
        .route("/", get(handlers::list_tasks))
        // POST /api/tasks
        // Creates a task owned by the caller, gated by create:tasks. Title,
        // description and status constraints are validated before the insert.
        .route("/", post(handlers::create_task))
        // GET /api/tasks/{id}
        // Single task retrieval. Own-scoped readers receive 404 for tasks they
        // do not own, keeping the id space unprobeable.
        .route("/{id}", get(handlers::get_task))
        // PUT /api/tasks/{id}
        // Partial update behind the update-permission resolution (unscoped admin,
        // all-scoped teacher, own-scoped student with the ownership rule).
        .route("/{id}", put(handlers::update_task))
        // PATCH /api/tasks/{id}/status
        // Status-only transition returning an old/new receipt for audit output.
        .route("/{id}/status", patch(handlers::update_task_status))
        // DELETE /api/tasks/{id}
        // Deletion behind the delete-permission resolution; returns a receipt
        // carrying the removed id and timestamp.
        .route("/{id}", delete(handlers::delete_task))
}

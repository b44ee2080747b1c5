use crate::models::{NewUser, Task, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// CreateUserError
///
/// Failure modes of user registration at the persistence layer. `Duplicate` is the
/// database's unique-index rejection: the index on username/email is the source of
/// truth for uniqueness, so two racing registrations can both pass any
/// application-level existence check but only one insert will land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateUserError {
    Duplicate,
    Database,
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. Handlers interact
/// with the data layer through this trait without knowing the concrete
/// implementation (Postgres in production, in-memory mocks in tests).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's asynchronous task
/// boundaries.
///
/// Task methods are ownership-agnostic: the caller performs the authorization
/// guard check before invoking any mutation here.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users / Credential Store ---

    /// Atomic check-and-insert: relies on the unique index rather than a prior
    /// SELECT, so concurrent duplicate registrations surface as `Duplicate`.
    async fn create_user(&self, new_user: NewUser) -> Result<User, CreateUserError>;
    async fn get_user_by_username(&self, username: &str) -> Option<User>;
    async fn get_user(&self, id: i64) -> Option<User>;
    async fn list_users(&self) -> Vec<User>;
    /// Stamps `last_login` after a successful password authentication.
    async fn touch_last_login(&self, id: i64) -> bool;

    // --- Roles projection ---

    /// Idempotently writes the role rows derived from the in-memory policy.
    /// The persisted table is display-only and never consulted at authorization
    /// time; this keeps it from drifting from the static map.
    async fn seed_roles(&self, rows: &[(String, String)]) -> bool;

    // --- Tasks ---

    async fn create_task(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
        status: &str,
    ) -> Option<Task>;
    async fn get_task(&self, id: i64) -> Option<Task>;
    /// Lists tasks, optionally filtered to a single owner. The caller decides the
    /// filter from the role's read scope.
    async fn list_tasks(&self, owner: Option<i64>) -> Vec<Task>;
    /// Partial update via COALESCE: only provided fields are written.
    async fn update_task(
        &self,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        status: Option<&str>,
    ) -> Option<Task>;
    async fn set_task_status(&self, id: i64, status: &str) -> Option<Task>;
    async fn delete_task(&self, id: i64) -> bool;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, last_login, created_at, updated_at";

const TASK_COLUMNS: &str = "id, title, description, status, user_id, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Single atomic insert. A unique-index violation on username or email maps to
    /// `Duplicate`; any other database failure is logged and reported generically.
    async fn create_user(&self, new_user: NewUser) -> Result<User, CreateUserError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW()) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false)
                {
                    CreateUserError::Duplicate
                } else {
                    tracing::error!("create_user error: {:?}", e);
                    CreateUserError::Database
                }
            })
    }

    async fn get_user_by_username(&self, username: &str) -> Option<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user_by_username error: {:?}", e);
                None
            })
    }

    async fn get_user(&self, id: i64) -> Option<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn list_users(&self) -> Vec<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_users error: {:?}", e);
                vec![]
            })
    }

    async fn touch_last_login(&self, id: i64) -> bool {
        let result = sqlx::query("UPDATE users SET last_login = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        match result {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("touch_last_login error: {:?}", e);
                false
            }
        }
    }

    /// seed_roles
    ///
    /// `ON CONFLICT DO NOTHING` keeps repeated seeding idempotent; existing rows
    /// are left untouched.
    async fn seed_roles(&self, rows: &[(String, String)]) -> bool {
        for (name, description) in rows {
            let result = sqlx::query(
                "INSERT INTO roles (name, description, created_at, updated_at) \
                 VALUES ($1, $2, NOW(), NOW()) ON CONFLICT (name) DO NOTHING",
            )
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await;
            if let Err(e) = result {
                tracing::error!("seed_roles error for {}: {:?}", name, e);
                return false;
            }
        }
        true
    }

    async fn create_task(
        &self,
        user_id: i64,
        title: &str,
        description: Option<&str>,
        status: &str,
    ) -> Option<Task> {
        let sql = format!(
            "INSERT INTO tasks (title, description, status, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) \
             RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(title)
            .bind(description)
            .bind(status)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("create_task error: {:?}", e);
                None
            })
    }

    async fn get_task(&self, id: i64) -> Option<Task> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_task error: {:?}", e);
                None
            })
    }

    async fn list_tasks(&self, owner: Option<i64>) -> Vec<Task> {
        let result = match owner {
            Some(user_id) => {
                let sql = format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, Task>(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC");
                sqlx::query_as::<_, Task>(&sql).fetch_all(&self.pool).await
            }
        };
        result.unwrap_or_else(|e| {
            tracing::error!("list_tasks error: {:?}", e);
            vec![]
        })
    }

    /// update_task
    ///
    /// Uses PostgreSQL `COALESCE` to only write the columns whose corresponding
    /// argument is `Some`, leaving the rest untouched.
    async fn update_task(
        &self,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        status: Option<&str>,
    ) -> Option<Task> {
        let sql = format!(
            "UPDATE tasks \
             SET title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 status = COALESCE($4, status), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(title)
            .bind(description)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("update_task error: {:?}", e);
                None
            })
    }

    async fn set_task_status(&self, id: i64, status: &str) -> Option<Task> {
        let sql = format!(
            "UPDATE tasks SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("set_task_status error: {:?}", e);
                None
            })
    }

    async fn delete_task(&self, id: i64) -> bool {
        match sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_task error: {:?}", e);
                false
            }
        }
    }
}

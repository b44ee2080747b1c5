use serde::{Deserialize, Serialize};

/// Role
///
/// The closed set of roles the system serves. Roles are a finite enumeration baked
/// into the permission policy; they are never created at runtime. The `roles` table
/// persists them for display and introspection only — this enum is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    /// Every role, in policy order. Used to render the full role → permission
    /// mapping and to regenerate the persisted `roles` projection.
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    /// Parses the wire/database representation. Returns `None` for anything outside
    /// the closed set, which callers surface as an `invalid_role` failure.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope
///
/// The ownership scope a permission carries. This is an explicit field of the
/// permission definition rather than a naming convention: guard logic must never
/// infer scoping by substring-matching permission names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// No ownership dimension (e.g. admin's unscoped task permissions, user admin).
    Any,
    /// Grants the action only on resources owned by the caller.
    Own,
    /// Grants the action on every matching resource, regardless of owner.
    All,
}

/// Permission
///
/// The fixed, closed catalog of capabilities. Each permission knows its wire name,
/// its ownership scope, and the route patterns it covers. The route patterns exist
/// for documentation and audit output only; enforcement happens through explicit
/// guard calls in each handler, never through pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadTasks,
    CreateTasks,
    UpdateOwnTasks,
    DeleteOwnTasks,
    UpdateAllTasks,
    ReadAllTasks,
    UpdateTasks,
    DeleteTasks,
    ReadUsers,
    CreateUsers,
    UpdateUsers,
    DeleteUsers,
}

impl Permission {
    /// The complete catalog, in a stable order.
    pub const ALL: [Permission; 12] = [
        Permission::ReadTasks,
        Permission::CreateTasks,
        Permission::UpdateOwnTasks,
        Permission::DeleteOwnTasks,
        Permission::UpdateAllTasks,
        Permission::ReadAllTasks,
        Permission::UpdateTasks,
        Permission::DeleteTasks,
        Permission::ReadUsers,
        Permission::CreateUsers,
        Permission::UpdateUsers,
        Permission::DeleteUsers,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Permission::ReadTasks => "read:tasks",
            Permission::CreateTasks => "create:tasks",
            Permission::UpdateOwnTasks => "update:own-tasks",
            Permission::DeleteOwnTasks => "delete:own-tasks",
            Permission::UpdateAllTasks => "update:all-tasks",
            Permission::ReadAllTasks => "read:all-tasks",
            Permission::UpdateTasks => "update:tasks",
            Permission::DeleteTasks => "delete:tasks",
            Permission::ReadUsers => "read:users",
            Permission::CreateUsers => "create:users",
            Permission::UpdateUsers => "update:users",
            Permission::DeleteUsers => "delete:users",
        }
    }

    /// The ownership scope of this permission. Only `Scope::Own` permissions
    /// trigger the resource-owner comparison in [`authorize`].
    pub fn scope(&self) -> Scope {
        match self {
            Permission::UpdateOwnTasks | Permission::DeleteOwnTasks => Scope::Own,
            Permission::UpdateAllTasks | Permission::ReadAllTasks => Scope::All,
            _ => Scope::Any,
        }
    }

    /// Route patterns this permission covers. Audit/documentation output only.
    pub fn routes(&self) -> &'static [&'static str] {
        match self {
            Permission::ReadTasks => &["GET /api/tasks", "GET /api/tasks/{id}"],
            Permission::CreateTasks => &["POST /api/tasks"],
            Permission::UpdateOwnTasks => {
                &["PUT /api/tasks/{id}", "PATCH /api/tasks/{id}/status"]
            }
            Permission::DeleteOwnTasks => &["DELETE /api/tasks/{id}"],
            Permission::UpdateAllTasks => {
                &["PUT /api/tasks/{id}", "PATCH /api/tasks/{id}/status"]
            }
            Permission::ReadAllTasks => &["GET /api/tasks"],
            Permission::UpdateTasks => &["PUT /api/tasks/{id}", "PATCH /api/tasks/{id}/status"],
            Permission::DeleteTasks => &["DELETE /api/tasks/{id}"],
            Permission::ReadUsers => &["GET /api/auth/users", "GET /api/auth/users/{id}"],
            Permission::CreateUsers => {
                &["POST /api/auth/register", "POST /api/auth/register-with-role"]
            }
            Permission::UpdateUsers => &["PUT /api/auth/users/{id}", "PATCH /api/auth/users/{id}"],
            Permission::DeleteUsers => &["DELETE /api/auth/users/{id}"],
        }
    }
}

// Role grants. Student and teacher hold own-scoped task permissions; the teacher
// additionally reaches every task through the all-scoped pair. Admin task and user
// permissions are unscoped.
const STUDENT_GRANTS: &[Permission] = &[
    Permission::ReadTasks,
    Permission::CreateTasks,
    Permission::UpdateOwnTasks,
    Permission::DeleteOwnTasks,
];

const TEACHER_GRANTS: &[Permission] = &[
    Permission::ReadTasks,
    Permission::CreateTasks,
    Permission::UpdateOwnTasks,
    Permission::DeleteOwnTasks,
    Permission::UpdateAllTasks,
    Permission::ReadAllTasks,
];

const ADMIN_GRANTS: &[Permission] = &[
    Permission::ReadTasks,
    Permission::CreateTasks,
    Permission::UpdateTasks,
    Permission::DeleteTasks,
    Permission::ReadUsers,
    Permission::CreateUsers,
    Permission::UpdateUsers,
    Permission::DeleteUsers,
];

/// PermissionPolicy
///
/// The static, read-only mapping from role to granted permissions. Constructed once
/// at process start, stored in the shared application state, and never mutated —
/// safe for unsynchronized concurrent reads from every request-handling task.
///
/// This in-memory map is the sole runtime authority for authorization. The persisted
/// `roles` table is a projection regenerated from it at startup (and by the setup
/// endpoint) and is never consulted when deciding a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionPolicy;

impl PermissionPolicy {
    pub fn new() -> Self {
        PermissionPolicy
    }

    /// The ordered permission set granted to a role.
    pub fn grants(&self, role: Role) -> &'static [Permission] {
        match role {
            Role::Student => STUDENT_GRANTS,
            Role::Teacher => TEACHER_GRANTS,
            Role::Admin => ADMIN_GRANTS,
        }
    }

    /// Membership test used by the guard.
    pub fn allows(&self, role: Role, permission: Permission) -> bool {
        self.grants(role).contains(&permission)
    }

    /// Wire names of a role's grants, for the permissions introspection endpoint.
    pub fn permission_names(&self, role: Role) -> Vec<&'static str> {
        self.grants(role).iter().map(Permission::name).collect()
    }

    /// Rows for the persisted `roles` projection: (name, description).
    pub fn role_rows(&self) -> Vec<(&'static str, String)> {
        Role::ALL
            .iter()
            .map(|r| {
                let mut description = r.as_str().to_string();
                if let Some(first) = description.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                description.push_str(" role");
                (r.as_str(), description)
            })
            .collect()
    }

    /// Visibility of the task list for a role. Roles holding `read:all-tasks`
    /// see every task; the admin set is unscoped and sees every task as well.
    /// Everyone else is limited to their own rows.
    pub fn task_read_scope(&self, role: Role) -> TaskScope {
        if self.allows(role, Permission::ReadAllTasks) || role == Role::Admin {
            TaskScope::All
        } else {
            TaskScope::Own
        }
    }
}

/// TaskScope
///
/// How wide a caller's view of the task collection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    Own,
    All,
}

/// Identity
///
/// The resolved caller the guard decides over: database id, username, role, and
/// the active flag. Built by handlers from the authenticated user record.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
}

/// Denied
///
/// The reasons an authorization decision can fail. Each carries a stable reason
/// code that is surfaced verbatim in the 403 response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    MissingPermission,
    NotOwner,
    InactiveAccount,
}

impl Denied {
    pub fn reason(&self) -> &'static str {
        match self {
            Denied::MissingPermission => "missing_permission",
            Denied::NotOwner => "not_owner",
            Denied::InactiveAccount => "inactive_account",
        }
    }
}

impl std::fmt::Display for Denied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// authorize
///
/// The authorization decision function: a pure computation over the passed-in
/// state, with no I/O and no side effects.
///
/// Decision order:
/// 1. An inactive identity always fails (`inactive_account`), before any lookup.
/// 2. The role must hold the permission (`missing_permission`).
/// 3. `Scope::Own` permissions additionally require the caller to own the target
///    resource (`not_owner`). Absent owner information counts as a mismatch.
///
/// `Scope::Any` and `Scope::All` permissions skip the ownership comparison.
pub fn authorize(
    policy: &PermissionPolicy,
    identity: &Identity,
    permission: Permission,
    resource_owner: Option<i64>,
) -> Result<(), Denied> {
    if !identity.is_active {
        return Err(Denied::InactiveAccount);
    }
    if !policy.allows(identity.role, permission) {
        return Err(Denied::MissingPermission);
    }
    if permission.scope() == Scope::Own {
        match resource_owner {
            Some(owner) if owner == identity.user_id => {}
            _ => return Err(Denied::NotOwner),
        }
    }
    Ok(())
}

/// Candidate permissions for mutating a task, broadest first. The guard settles on
/// the widest permission the role actually holds, so an admin never trips an
/// ownership check and a student is judged by `update:own-tasks` alone.
pub const UPDATE_TASK_CANDIDATES: &[Permission] = &[
    Permission::UpdateTasks,
    Permission::UpdateAllTasks,
    Permission::UpdateOwnTasks,
];

/// Candidate permissions for deleting a task, broadest first.
pub const DELETE_TASK_CANDIDATES: &[Permission] =
    &[Permission::DeleteTasks, Permission::DeleteOwnTasks];

/// authorize_task_mutation
///
/// Resolves which of the candidate permissions applies to this caller and runs the
/// ownership rule for it. A role holding an own-scoped candidate but not owning the
/// task is denied with `not_owner`; a role holding none of the candidates is denied
/// with `missing_permission`.
pub fn authorize_task_mutation(
    policy: &PermissionPolicy,
    identity: &Identity,
    candidates: &[Permission],
    task_owner: i64,
) -> Result<(), Denied> {
    if !identity.is_active {
        return Err(Denied::InactiveAccount);
    }
    for permission in candidates {
        if policy.allows(identity.role, *permission) {
            return authorize(policy, identity, *permission, Some(task_owner));
        }
    }
    Err(Denied::MissingPermission)
}

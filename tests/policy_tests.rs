use task_portal::policy::{
    DELETE_TASK_CANDIDATES, Denied, Identity, Permission, PermissionPolicy, Role, Scope,
    TaskScope, UPDATE_TASK_CANDIDATES, authorize, authorize_task_mutation,
};

// --- Helpers ---

fn identity(user_id: i64, role: Role, is_active: bool) -> Identity {
    Identity {
        user_id,
        username: format!("user_{user_id}"),
        role,
        is_active,
    }
}

fn expected_grants(role: Role) -> Vec<&'static str> {
    match role {
        Role::Student => vec![
            "read:tasks",
            "create:tasks",
            "update:own-tasks",
            "delete:own-tasks",
        ],
        Role::Teacher => vec![
            "read:tasks",
            "create:tasks",
            "update:own-tasks",
            "delete:own-tasks",
            "update:all-tasks",
            "read:all-tasks",
        ],
        Role::Admin => vec![
            "read:tasks",
            "create:tasks",
            "update:tasks",
            "delete:tasks",
            "read:users",
            "create:users",
            "update:users",
            "delete:users",
        ],
    }
}

// --- Policy map ---

#[test]
fn test_grant_sets_match_expected_catalog() {
    let policy = PermissionPolicy::new();
    for role in Role::ALL {
        assert_eq!(
            policy.permission_names(role),
            expected_grants(role),
            "grant set mismatch for {role}"
        );
    }
}

#[test]
fn test_permission_catalog_is_closed_and_distinct() {
    let names: Vec<&str> = Permission::ALL.iter().map(Permission::name).collect();
    assert_eq!(names.len(), 12);
    for (i, name) in names.iter().enumerate() {
        assert!(
            !names[i + 1..].contains(name),
            "duplicate permission name: {name}"
        );
    }
}

// Exhaustive decision matrix: for every role and every permission, an active
// identity is allowed iff the permission is in the role's grant set. Own-scoped
// permissions are exercised with the caller as resource owner so the ownership
// rule cannot interfere with the membership result.
#[test]
fn test_authorize_matches_policy_for_all_roles_and_permissions() {
    let policy = PermissionPolicy::new();
    for role in Role::ALL {
        let caller = identity(7, role, true);
        for permission in Permission::ALL {
            let owner = if permission.scope() == Scope::Own {
                Some(7)
            } else {
                None
            };
            let decision = authorize(&policy, &caller, permission, owner);
            if policy.allows(role, permission) {
                assert!(
                    decision.is_ok(),
                    "{role} should hold {}",
                    permission.name()
                );
            } else {
                assert_eq!(
                    decision,
                    Err(Denied::MissingPermission),
                    "{role} should not hold {}",
                    permission.name()
                );
            }
        }
    }
}

// --- Scoping is an explicit field, never a name convention ---

#[test]
fn test_ownership_scope_is_explicit() {
    assert_eq!(Permission::UpdateOwnTasks.scope(), Scope::Own);
    assert_eq!(Permission::DeleteOwnTasks.scope(), Scope::Own);
    assert_eq!(Permission::UpdateAllTasks.scope(), Scope::All);
    assert_eq!(Permission::ReadAllTasks.scope(), Scope::All);
    assert_eq!(Permission::ReadTasks.scope(), Scope::Any);
    assert_eq!(Permission::UpdateTasks.scope(), Scope::Any);
    assert_eq!(Permission::ReadUsers.scope(), Scope::Any);
}

// --- Ownership rule ---

#[test]
fn test_own_scoped_permission_requires_matching_owner() {
    let policy = PermissionPolicy::new();
    let student = identity(5, Role::Student, true);

    // Own task: allowed.
    assert!(authorize(&policy, &student, Permission::UpdateOwnTasks, Some(5)).is_ok());

    // Someone else's task: always denied with not_owner.
    assert_eq!(
        authorize(&policy, &student, Permission::UpdateOwnTasks, Some(6)),
        Err(Denied::NotOwner)
    );

    // Unknown owner counts as a mismatch, not a pass.
    assert_eq!(
        authorize(&policy, &student, Permission::UpdateOwnTasks, None),
        Err(Denied::NotOwner)
    );
}

#[test]
fn test_all_scoped_permission_skips_ownership() {
    let policy = PermissionPolicy::new();
    let teacher = identity(3, Role::Teacher, true);

    assert!(authorize(&policy, &teacher, Permission::UpdateAllTasks, Some(999)).is_ok());
    assert!(authorize(&policy, &teacher, Permission::UpdateAllTasks, None).is_ok());
}

// --- Inactive accounts ---

#[test]
fn test_inactive_identity_is_denied_before_permission_lookup() {
    let policy = PermissionPolicy::new();
    for role in Role::ALL {
        let caller = identity(1, role, false);
        for permission in Permission::ALL {
            assert_eq!(
                authorize(&policy, &caller, permission, Some(1)),
                Err(Denied::InactiveAccount),
                "inactive {role} must be denied {}",
                permission.name()
            );
        }
    }
}

#[test]
fn test_inactive_identity_is_denied_task_mutation() {
    let policy = PermissionPolicy::new();
    let admin = identity(1, Role::Admin, false);
    assert_eq!(
        authorize_task_mutation(&policy, &admin, UPDATE_TASK_CANDIDATES, 1),
        Err(Denied::InactiveAccount)
    );
}

// --- Task mutation resolution ---

#[test]
fn test_student_update_resolution() {
    let policy = PermissionPolicy::new();
    let student = identity(5, Role::Student, true);

    assert!(authorize_task_mutation(&policy, &student, UPDATE_TASK_CANDIDATES, 5).is_ok());
    assert_eq!(
        authorize_task_mutation(&policy, &student, UPDATE_TASK_CANDIDATES, 6),
        Err(Denied::NotOwner)
    );
}

#[test]
fn test_teacher_update_reaches_any_task_but_delete_stays_own() {
    let policy = PermissionPolicy::new();
    let teacher = identity(3, Role::Teacher, true);

    // update:all-tasks wins over update:own-tasks, so ownership is irrelevant.
    assert!(authorize_task_mutation(&policy, &teacher, UPDATE_TASK_CANDIDATES, 42).is_ok());

    // There is no delete:all-tasks; the teacher falls back to delete:own-tasks.
    assert!(authorize_task_mutation(&policy, &teacher, DELETE_TASK_CANDIDATES, 3).is_ok());
    assert_eq!(
        authorize_task_mutation(&policy, &teacher, DELETE_TASK_CANDIDATES, 42),
        Err(Denied::NotOwner)
    );
}

#[test]
fn test_admin_mutations_are_unscoped() {
    let policy = PermissionPolicy::new();
    let admin = identity(9, Role::Admin, true);

    assert!(authorize_task_mutation(&policy, &admin, UPDATE_TASK_CANDIDATES, 1).is_ok());
    assert!(authorize_task_mutation(&policy, &admin, DELETE_TASK_CANDIDATES, 1).is_ok());
}

#[test]
fn test_mutation_without_any_candidate_is_missing_permission() {
    let policy = PermissionPolicy::new();
    let student = identity(5, Role::Student, true);

    // Students hold no user-administration permission at all.
    assert_eq!(
        authorize_task_mutation(&policy, &student, &[Permission::DeleteUsers], 5),
        Err(Denied::MissingPermission)
    );
}

// --- Read scope ---

#[test]
fn test_task_read_scopes() {
    let policy = PermissionPolicy::new();
    assert_eq!(policy.task_read_scope(Role::Student), TaskScope::Own);
    assert_eq!(policy.task_read_scope(Role::Teacher), TaskScope::All);
    assert_eq!(policy.task_read_scope(Role::Admin), TaskScope::All);
}

// --- Role parsing and projection rows ---

#[test]
fn test_role_parse_round_trip() {
    for role in Role::ALL {
        assert_eq!(Role::parse(role.as_str()), Some(role));
    }
    assert_eq!(Role::parse("superuser"), None);
    assert_eq!(Role::parse("Student"), None);
    assert_eq!(Role::parse(""), None);
}

#[test]
fn test_role_projection_rows() {
    let policy = PermissionPolicy::new();
    let rows = policy.role_rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], ("student", "Student role".to_string()));
    assert_eq!(rows[1], ("teacher", "Teacher role".to_string()));
    assert_eq!(rows[2], ("admin", "Admin role".to_string()));
}

#[test]
fn test_denied_reason_codes_are_stable() {
    assert_eq!(Denied::MissingPermission.reason(), "missing_permission");
    assert_eq!(Denied::NotOwner.reason(), "not_owner");
    assert_eq!(Denied::InactiveAccount.reason(), "inactive_account");
}

#[test]
fn test_permission_routes_are_documented() {
    // Every permission documents at least one route pattern for audit output.
    for permission in Permission::ALL {
        assert!(
            !permission.routes().is_empty(),
            "{} has no documented routes",
            permission.name()
        );
    }
}

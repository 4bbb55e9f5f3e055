//! Role-based authorization.
//!
//! # Responsibilities
//! - Static role → permission mapping, never mutated at runtime
//! - Wildcard "all permissions" sentinel for administrators
//! - Per-role resource caps for registration-style actions
//!
//! # Design Decisions
//! - Roles and permissions are enums; a typo'd permission cannot silently
//!   no-op the way a string key can
//! - Permission checks are pure lookups with no allocation

use serde::{Deserialize, Serialize};

/// Role a principal holds for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
    Admin,
}

impl Role {
    /// Stable lowercase name used in audit records and config.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grantable capability.
///
/// `All` is the wildcard sentinel: a role whose grant contains it holds
/// every permission, including ones added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    All,
    ManageUsers,
    ManageVehicles,
    RegisterVehicle,
    UploadDocuments,
    ViewRecords,
    ViewReports,
}

impl Permission {
    /// Stable name used in audit records.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::All => "*",
            Permission::ManageUsers => "manage_users",
            Permission::ManageVehicles => "manage_vehicles",
            Permission::RegisterVehicle => "register_vehicle",
            Permission::UploadDocuments => "upload_documents",
            Permission::ViewRecords => "view_records",
            Permission::ViewReports => "view_reports",
        }
    }
}

/// Kinds of role-capped resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Vehicle,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Vehicle => "vehicle",
        }
    }

    /// The permission gating registration of this resource kind.
    pub fn permission(self) -> Permission {
        match self {
            ResourceKind::Vehicle => Permission::RegisterVehicle,
        }
    }
}

/// What a role is granted: its permission set and resource cap.
#[derive(Debug)]
pub struct RoleGrant {
    permissions: &'static [Permission],
    /// Maximum live resources per principal; -1 means unlimited.
    pub max_resources: i64,
}

static STUDENT_GRANT: RoleGrant = RoleGrant {
    permissions: &[
        Permission::RegisterVehicle,
        Permission::UploadDocuments,
        Permission::ViewRecords,
    ],
    max_resources: 1,
};

static STAFF_GRANT: RoleGrant = RoleGrant {
    permissions: &[
        Permission::RegisterVehicle,
        Permission::ManageVehicles,
        Permission::UploadDocuments,
        Permission::ViewRecords,
        Permission::ViewReports,
    ],
    max_resources: 3,
};

static ADMIN_GRANT: RoleGrant = RoleGrant {
    permissions: &[Permission::All],
    max_resources: -1,
};

/// Look up the static grant for a role.
pub fn grant_for(role: Role) -> &'static RoleGrant {
    match role {
        Role::Student => &STUDENT_GRANT,
        Role::Staff => &STAFF_GRANT,
        Role::Admin => &ADMIN_GRANT,
    }
}

/// Whether `role` holds `permission`.
///
/// Admin is granted unconditionally; other roles match their set, which may
/// itself contain the wildcard.
pub fn role_has_permission(role: Role, permission: Permission) -> bool {
    if role == Role::Admin {
        return true;
    }
    let grant = grant_for(role);
    grant
        .permissions
        .iter()
        .any(|p| *p == permission || *p == Permission::All)
}

/// Whether `role` may hold one more live resource given `live` existing ones.
pub fn within_resource_cap(role: Role, live: u64) -> bool {
    let max = grant_for(role).max_resources;
    if max < 0 {
        return true;
    }
    live < max as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_denied_manage_users() {
        assert!(!role_has_permission(Role::Student, Permission::ManageUsers));
        assert!(role_has_permission(Role::Student, Permission::RegisterVehicle));
    }

    #[test]
    fn test_admin_wildcard_grants_everything() {
        // Including permissions no explicit table entry lists.
        assert!(role_has_permission(Role::Admin, Permission::ManageUsers));
        assert!(role_has_permission(Role::Admin, Permission::ViewReports));
        assert!(role_has_permission(Role::Admin, Permission::RegisterVehicle));
    }

    #[test]
    fn test_staff_grant() {
        assert!(role_has_permission(Role::Staff, Permission::ViewReports));
        assert!(!role_has_permission(Role::Staff, Permission::ManageUsers));
    }

    #[test]
    fn test_resource_caps() {
        assert!(within_resource_cap(Role::Student, 0));
        assert!(!within_resource_cap(Role::Student, 1));
        assert!(within_resource_cap(Role::Staff, 2));
        assert!(!within_resource_cap(Role::Staff, 3));
        // -1 is unlimited.
        assert!(within_resource_cap(Role::Admin, 1_000_000));
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Student, Role::Staff, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }
}

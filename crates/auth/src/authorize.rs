use thiserror::Error;

use propledger_core::{TenantId, UserId};

use crate::{permissions_for, Permission, Role};

/// A principal's grants inside one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

impl Principal {
    /// Resolve permissions from roles with the static policy.
    pub fn from_roles(user_id: UserId, tenant_id: TenantId, roles: Vec<Role>) -> Self {
        let permissions = permissions_for(&roles);
        Self {
            user_id,
            active_tenant_id: tenant_id,
            membership: TenantMembership { tenant_id, roles, permissions },
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal within its active tenant context. Pure policy check.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        tracing::debug!(user_id = %principal.user_id, permission = %required, "permission denied");
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

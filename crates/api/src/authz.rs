//! API-side authorization guard.
//!
//! Handlers check the permission an operation needs before calling the ledger
//! service, which stays auth-agnostic.

use propledger_auth::{authorize, AuthzError, Permission, Principal};

use crate::context::{PrincipalContext, TenantContext};

/// Check that the request's principal holds `required` in the active tenant.
pub fn require_permission(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    required: &Permission,
) -> Result<(), AuthzError> {
    let principal = Principal::from_roles(principal.user_id(), tenant.tenant_id(), principal.roles().to_vec());
    authorize(&principal, required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use propledger_auth::Role;
    use propledger_core::{TenantId, UserId};

    fn check(roles: Vec<Role>, required: &Permission) -> Result<(), AuthzError> {
        let tenant = TenantContext::new(TenantId::new());
        let principal = PrincipalContext::new(UserId::new(), roles, None);
        require_permission(&tenant, &principal, required)
    }

    #[test]
    fn viewers_read_but_do_not_write() {
        assert!(check(vec![Role::VIEWER], &Permission::LEDGER_READ).is_ok());
        assert!(check(vec![Role::VIEWER], &Permission::LEDGER_WRITE).is_err());
    }

    #[test]
    fn accountants_cannot_restore_backups() {
        assert!(check(vec![Role::ACCOUNTANT], &Permission::LEDGER_WRITE).is_ok());
        assert!(matches!(
            check(vec![Role::ACCOUNTANT], &Permission::BACKUP_RESTORE),
            Err(AuthzError::Forbidden(_))
        ));
        assert!(check(vec![Role::ADMIN], &Permission::BACKUP_RESTORE).is_ok());
    }
}

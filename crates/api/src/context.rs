use propledger_auth::Role;
use propledger_core::{TenantId, UserId};
use propledger_ledger::Actor;

/// Tenant context for a request.
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Principal context for a request (authenticated identity, roles, origin).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    roles: Vec<Role>,
    ip_address: Option<String>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, roles: Vec<Role>, ip_address: Option<String>) -> Self {
        Self { user_id, roles, ip_address }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Who the audit log records for writes made by this request.
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.ip_address.clone())
    }
}

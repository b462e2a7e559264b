use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier carried in tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const ACCOUNTANT: Role = Role(Cow::Borrowed("accountant"));
    pub const VIEWER: Role = Role(Cow::Borrowed("viewer"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission policy.
///
/// `admin` holds the wildcard; `accountant` reads and writes bookkeeping data
/// but cannot touch settings or backups; `viewer` only reads. Unknown roles
/// grant nothing.
pub fn permissions_for(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == Role::ADMIN.as_str()) {
        return vec![Permission::WILDCARD];
    }

    let mut perms = Vec::new();
    for role in roles {
        let granted = match role.as_str() {
            "accountant" => vec![Permission::LEDGER_READ, Permission::LEDGER_WRITE, Permission::RECORDS_WRITE],
            "viewer" => vec![Permission::LEDGER_READ],
            _ => Vec::new(),
        };
        for p in granted {
            if !perms.contains(&p) {
                perms.push(p);
            }
        }
    }
    perms
}

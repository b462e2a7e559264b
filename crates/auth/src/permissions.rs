use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, e.g. `"ledger.write"`.
///
/// The wildcard `"*"` grants everything within the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    /// Read any tenant data except the full backup.
    pub const LEDGER_READ: Permission = Permission(Cow::Borrowed("ledger.read"));
    /// Vouchers, transfers, safes, contracts, installments and payments.
    pub const LEDGER_WRITE: Permission = Permission(Cow::Borrowed("ledger.write"));
    /// Customers, units, partners, brokers and their satellites.
    pub const RECORDS_WRITE: Permission = Permission(Cow::Borrowed("records.write"));
    pub const SETTINGS_WRITE: Permission = Permission(Cow::Borrowed("settings.write"));
    pub const BACKUP_EXPORT: Permission = Permission(Cow::Borrowed("backup.export"));
    pub const BACKUP_RESTORE: Permission = Permission(Cow::Borrowed("backup.restore"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

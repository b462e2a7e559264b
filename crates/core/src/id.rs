//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of a tenant (multi-tenant boundary).
    TenantId, "TenantId"
);
uuid_newtype!(
    /// Identifier of a user (actor identity recorded in the audit log).
    UserId, "UserId"
);
uuid_newtype!(SafeId, "SafeId");
uuid_newtype!(VoucherId, "VoucherId");
uuid_newtype!(TransferId, "TransferId");
uuid_newtype!(UnitId, "UnitId");
uuid_newtype!(CustomerId, "CustomerId");
uuid_newtype!(ContractId, "ContractId");
uuid_newtype!(InstallmentId, "InstallmentId");
uuid_newtype!(PartnerId, "PartnerId");
uuid_newtype!(PartnerGroupId, "PartnerGroupId");
uuid_newtype!(UnitPartnerId, "UnitPartnerId");
uuid_newtype!(BrokerId, "BrokerId");
uuid_newtype!(BrokerDueId, "BrokerDueId");
uuid_newtype!(PartnerDebtId, "PartnerDebtId");
uuid_newtype!(AuditEntryId, "AuditEntryId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reports_the_id_kind() {
        let err = "not-a-uuid".parse::<SafeId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("SafeId")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let id = VoucherId::new();
        let parsed: VoucherId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}

//! Entity trait: identity + continuity across state changes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every persisted record type, in the order backups list them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Unit,
    PartnerGroup,
    Partner,
    UnitPartner,
    Broker,
    Contract,
    BrokerDue,
    PartnerDebt,
    Installment,
    Safe,
    Transfer,
    Voucher,
}

impl EntityKind {
    pub const ALL: [EntityKind; 13] = [
        EntityKind::Customer,
        EntityKind::Unit,
        EntityKind::PartnerGroup,
        EntityKind::Partner,
        EntityKind::UnitPartner,
        EntityKind::Broker,
        EntityKind::Contract,
        EntityKind::BrokerDue,
        EntityKind::PartnerDebt,
        EntityKind::Installment,
        EntityKind::Safe,
        EntityKind::Transfer,
        EntityKind::Voucher,
    ];

    /// Storage table backing this kind.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Customer => "customers",
            EntityKind::Unit => "units",
            EntityKind::PartnerGroup => "partner_groups",
            EntityKind::Partner => "partners",
            EntityKind::UnitPartner => "unit_partners",
            EntityKind::Broker => "brokers",
            EntityKind::Contract => "contracts",
            EntityKind::BrokerDue => "broker_dues",
            EntityKind::PartnerDebt => "partner_debts",
            EntityKind::Installment => "installments",
            EntityKind::Safe => "safes",
            EntityKind::Transfer => "transfers",
            EntityKind::Voucher => "vouchers",
        }
    }

    /// Singular, human-readable name used in error messages and the audit log.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Customer => "customer",
            EntityKind::Unit => "unit",
            EntityKind::PartnerGroup => "partner_group",
            EntityKind::Partner => "partner",
            EntityKind::UnitPartner => "unit_partner",
            EntityKind::Broker => "broker",
            EntityKind::Contract => "contract",
            EntityKind::BrokerDue => "broker_due",
            EntityKind::PartnerDebt => "partner_debt",
            EntityKind::Installment => "installment",
            EntityKind::Safe => "safe",
            EntityKind::Transfer => "transfer",
            EntityKind::Voucher => "voucher",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A foreign key held by a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl Reference {
    pub fn new(kind: EntityKind, id: impl Into<Uuid>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// Entity marker + minimal interface.
///
/// Entities are serializable so stores can persist them without knowing their
/// shape; the kind decides which table they live in.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Strongly-typed entity identifier.
    type Id: Copy
        + Eq
        + core::hash::Hash
        + core::fmt::Debug
        + core::fmt::Display
        + Into<Uuid>
        + From<Uuid>
        + Send
        + Sync
        + 'static;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Foreign keys that must point at active rows when this record is written.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_kind_has_a_distinct_table() {
        let tables: HashSet<_> = EntityKind::ALL.iter().map(|k| k.table()).collect();
        assert_eq!(tables.len(), EntityKind::ALL.len());
    }
}

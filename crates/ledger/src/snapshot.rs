//! Whole-tenant backup document.
//!
//! A snapshot holds every active row plus the tenant settings. Restoring one
//! is only allowed when it is self-consistent: ids are unique, every reference
//! resolves to a row inside the snapshot, and each safe's balance reconciles
//! with the snapshot's own vouchers and transfers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use propledger_core::{DomainError, DomainResult, Entity, Reference};

use crate::installment::Installment;
use crate::parties::{Broker, BrokerDue, Customer, Partner, PartnerDebt, PartnerGroup, UnitPartner};
use crate::policy::unit_ownership;
use crate::property::{Contract, Unit};
use crate::reports::reconcile_safe;
use crate::safe::Safe;
use crate::settings::AppSettings;
use crate::transfer::Transfer;
use crate::validation::{validate, Validate};
use crate::voucher::Voucher;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: Option<DateTime<Utc>>,
    pub settings: AppSettings,
    pub customers: Vec<Customer>,
    pub units: Vec<Unit>,
    pub partner_groups: Vec<PartnerGroup>,
    pub partners: Vec<Partner>,
    pub unit_partners: Vec<UnitPartner>,
    pub brokers: Vec<Broker>,
    pub contracts: Vec<Contract>,
    pub broker_dues: Vec<BrokerDue>,
    pub partner_debts: Vec<PartnerDebt>,
    pub installments: Vec<Installment>,
    pub safes: Vec<Safe>,
    pub transfers: Vec<Transfer>,
    pub vouchers: Vec<Voucher>,
}

impl Snapshot {
    pub const VERSION: u32 = 1;

    pub fn row_count(&self) -> usize {
        self.customers.len()
            + self.units.len()
            + self.partner_groups.len()
            + self.partners.len()
            + self.unit_partners.len()
            + self.brokers.len()
            + self.contracts.len()
            + self.broker_dues.len()
            + self.partner_debts.len()
            + self.installments.len()
            + self.safes.len()
            + self.transfers.len()
            + self.vouchers.len()
    }

    /// Check that the snapshot can replace a tenant's data as-is.
    pub fn verify(&self) -> DomainResult<()> {
        if self.version != Self::VERSION {
            return Err(DomainError::validation(format!(
                "backup.version: unsupported version {}",
                self.version
            )));
        }
        self.settings.validate()?;

        let mut known = HashSet::new();
        let mut holders: Vec<(Reference, Vec<Reference>)> = Vec::with_capacity(self.row_count());
        register(&self.customers, &mut known, &mut holders)?;
        register(&self.units, &mut known, &mut holders)?;
        register(&self.partner_groups, &mut known, &mut holders)?;
        register(&self.partners, &mut known, &mut holders)?;
        register(&self.unit_partners, &mut known, &mut holders)?;
        register(&self.brokers, &mut known, &mut holders)?;
        register(&self.contracts, &mut known, &mut holders)?;
        register(&self.broker_dues, &mut known, &mut holders)?;
        register(&self.partner_debts, &mut known, &mut holders)?;
        register(&self.installments, &mut known, &mut holders)?;
        register(&self.safes, &mut known, &mut holders)?;
        register(&self.transfers, &mut known, &mut holders)?;
        register(&self.vouchers, &mut known, &mut holders)?;

        for (holder, refs) in &holders {
            if let Some(missing) = refs.iter().find(|r| !known.contains(*r)) {
                return Err(DomainError::validation(format!(
                    "backup: {} {} references missing {} {}",
                    holder.kind, holder.id, missing.kind, missing.id
                )));
            }
        }

        for share in &self.unit_partners {
            unit_ownership(share, &self.unit_partners)?;
        }

        for safe in &self.safes {
            let check = reconcile_safe(safe, &self.vouchers, &self.transfers);
            if !check.consistent {
                return Err(DomainError::invariant(format!(
                    "backup: safe {} balance {} does not reconcile (expected {})",
                    safe.id, check.recorded_balance, check.expected_balance
                )));
            }
        }

        Ok(())
    }
}

fn register<T: Entity + Validate>(
    rows: &[T],
    known: &mut HashSet<Reference>,
    holders: &mut Vec<(Reference, Vec<Reference>)>,
) -> DomainResult<()> {
    for row in rows {
        validate(row)?;
        let id: Uuid = row.id().into();
        let me = Reference::new(T::KIND, id);
        if !known.insert(me) {
            return Err(DomainError::validation(format!("backup: duplicate {} id {}", T::KIND, id)));
        }
        holders.push((me, row.references()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::SafeDraft;
    use crate::voucher::{VoucherDraft, VoucherKind};
    use chrono::NaiveDate;
    use propledger_core::{Money, SafeId, UnitId, VoucherId};

    fn with_safe() -> Snapshot {
        let safe = Safe::open(
            SafeId::new(),
            SafeDraft { name: "Main".into(), opening_balance: Money::from(1000), notes: None },
            Utc::now(),
        );
        Snapshot {
            version: Snapshot::VERSION,
            safes: vec![safe],
            ..Snapshot::default()
        }
    }

    fn receipt(safe_id: SafeId, unit_id: Option<UnitId>) -> Voucher {
        Voucher::record(
            VoucherId::new(),
            VoucherDraft {
                kind: VoucherKind::Receipt,
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                amount: Money::from(500),
                safe_id,
                description: "rent".into(),
                party_name: None,
                unit_id,
            },
            Utc::now(),
        )
    }

    #[test]
    fn consistent_snapshot_verifies() {
        let mut snap = with_safe();
        let v = receipt(snap.safes[0].id, None);
        snap.safes[0].apply(v.effect(), Utc::now());
        snap.vouchers.push(v);
        assert!(snap.verify().is_ok());
        assert_eq!(snap.row_count(), 2);
    }

    #[test]
    fn drifted_balance_is_rejected() {
        let mut snap = with_safe();
        let v = receipt(snap.safes[0].id, None);
        snap.vouchers.push(v);
        assert!(matches!(snap.verify(), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let mut snap = with_safe();
        let v = receipt(snap.safes[0].id, Some(UnitId::new()));
        snap.safes[0].apply(v.effect(), Utc::now());
        snap.vouchers.push(v);
        assert!(matches!(snap.verify(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut snap = with_safe();
        snap.safes.push(snap.safes[0].clone());
        assert!(snap.verify().is_err());
    }
}

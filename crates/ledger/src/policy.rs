//! Write-time policies that span several records.

use rust_decimal::Decimal;
use serde::Serialize;

use propledger_core::{
    BrokerDueId, DomainError, DomainResult, EntityKind, InstallmentId, Reference,
};

use crate::installment::Installment;
use crate::parties::{BrokerDue, BrokerDueStatus, UnitPartner};
use crate::property::Contract;
use crate::voucher::Voucher;

/// Rows soft-deleted together with a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractCascade {
    pub installments: Vec<InstallmentId>,
    pub broker_dues: Vec<BrokerDueId>,
}

/// Decide whether `contract` may be deleted and what goes with it.
///
/// Deletion is refused once money has moved for the unit: an active voucher
/// on the unit, or any installment with a paid amount. Otherwise the
/// contract's own installments and pending broker dues are removed with it.
pub fn contract_deletion(
    contract: &Contract,
    vouchers: &[Voucher],
    installments: &[Installment],
    broker_dues: &[BrokerDue],
) -> DomainResult<ContractCascade> {
    if let Some(v) = vouchers.iter().find(|v| v.unit_id == Some(contract.unit_id)) {
        return Err(DomainError::conflict(format!(
            "contract {} cannot be deleted: voucher {} is recorded on its unit",
            contract.id, v.id
        )));
    }

    let unit_installments = installments
        .iter()
        .filter(|i| i.unit_id == contract.unit_id || i.contract_id == Some(contract.id));
    if let Some(i) = unit_installments.clone().find(|i| !i.paid_amount.is_zero()) {
        return Err(DomainError::conflict(format!(
            "contract {} cannot be deleted: installment {} has payments",
            contract.id, i.id
        )));
    }

    if let Some(d) = broker_dues
        .iter()
        .find(|d| d.contract_id == Some(contract.id) && d.status == BrokerDueStatus::Paid)
    {
        return Err(DomainError::conflict(format!(
            "contract {} cannot be deleted: broker due {} is paid",
            contract.id, d.id
        )));
    }

    Ok(ContractCascade {
        installments: unit_installments
            .filter(|i| i.contract_id == Some(contract.id))
            .map(|i| i.id)
            .collect(),
        broker_dues: broker_dues
            .iter()
            .filter(|d| d.contract_id == Some(contract.id))
            .map(|d| d.id)
            .collect(),
    })
}

/// Active ownership shares of one unit may not exceed 100%.
pub fn unit_ownership(candidate: &UnitPartner, existing: &[UnitPartner]) -> DomainResult<()> {
    let others: Decimal = existing
        .iter()
        .filter(|p| p.unit_id == candidate.unit_id && p.id != candidate.id)
        .map(|p| p.percentage)
        .sum();

    if others + candidate.percentage > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(format!(
            "unit_partner.percentage: unit shares would total {}%",
            others + candidate.percentage
        )));
    }

    if existing
        .iter()
        .any(|p| p.unit_id == candidate.unit_id && p.partner_id == candidate.partner_id && p.id != candidate.id)
    {
        return Err(DomainError::conflict("partner already holds a share of this unit"));
    }

    Ok(())
}

/// Kinds whose rows may hold a foreign key to `kind`.
pub fn dependent_kinds(kind: EntityKind) -> &'static [EntityKind] {
    match kind {
        EntityKind::Customer => &[EntityKind::Contract],
        EntityKind::Unit => &[
            EntityKind::Contract,
            EntityKind::Installment,
            EntityKind::UnitPartner,
            EntityKind::Voucher,
        ],
        EntityKind::PartnerGroup => &[EntityKind::Partner],
        EntityKind::Partner => &[EntityKind::UnitPartner, EntityKind::PartnerDebt],
        EntityKind::Broker => &[EntityKind::Contract, EntityKind::BrokerDue],
        EntityKind::Contract => &[EntityKind::Installment, EntityKind::BrokerDue],
        EntityKind::Safe => &[EntityKind::Voucher, EntityKind::Transfer],
        EntityKind::UnitPartner
        | EntityKind::BrokerDue
        | EntityKind::PartnerDebt
        | EntityKind::Installment
        | EntityKind::Transfer
        | EntityKind::Voucher => &[],
    }
}

/// Refuse deletion when any active row still points at `target`.
pub fn ensure_unreferenced(target: Reference, holders: &[(Reference, Vec<Reference>)]) -> DomainResult<()> {
    match holders.iter().find(|(_, refs)| refs.contains(&target)) {
        Some((holder, _)) => Err(DomainError::conflict(format!(
            "{} {} is still referenced by {} {}",
            target.kind, target.id, holder.kind, holder.id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installment::InstallmentDraft;
    use crate::parties::UnitPartnerDraft;
    use crate::property::ContractDraft;
    use crate::record::Record;
    use crate::voucher::{VoucherDraft, VoucherKind};
    use chrono::{NaiveDate, Utc};
    use propledger_core::{
        ContractId, CustomerId, Money, PartnerId, SafeId, UnitId, UnitPartnerId, VoucherId,
    };

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn contract(unit_id: UnitId) -> Contract {
        Contract::sign(
            ContractId::new(),
            ContractDraft {
                unit_id,
                customer_id: CustomerId::new(),
                total_price: Money::from(500_000),
                discount_amount: Money::ZERO,
                broker_id: None,
                broker_name: None,
                broker_amount: Money::ZERO,
                start_date: day(),
                notes: None,
            },
            Utc::now(),
        )
    }

    fn installment(c: &Contract) -> Installment {
        Installment::create(
            InstallmentId::new(),
            InstallmentDraft {
                unit_id: c.unit_id,
                contract_id: Some(c.id),
                amount: Money::from(1000),
                due_date: day(),
                notes: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn unpaid_contract_cascades_its_installments() {
        let c = contract(UnitId::new());
        let i = installment(&c);
        let cascade = contract_deletion(&c, &[], &[i.clone()], &[]).unwrap();
        assert_eq!(cascade.installments, vec![i.id]);
    }

    #[test]
    fn paid_installment_blocks_deletion() {
        let c = contract(UnitId::new());
        let mut i = installment(&c);
        i.apply_payment(Money::from(10), Utc::now()).unwrap();
        assert!(matches!(
            contract_deletion(&c, &[], &[i], &[]),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn unit_voucher_blocks_deletion() {
        let c = contract(UnitId::new());
        let v = Voucher::record(
            VoucherId::new(),
            VoucherDraft {
                kind: VoucherKind::Receipt,
                date: day(),
                amount: Money::from(10),
                safe_id: SafeId::new(),
                description: String::new(),
                party_name: None,
                unit_id: Some(c.unit_id),
            },
            Utc::now(),
        );
        assert!(contract_deletion(&c, &[v], &[], &[]).is_err());
    }

    fn share(unit_id: UnitId, pct: i64) -> UnitPartner {
        UnitPartner::create(
            UnitPartnerId::new(),
            UnitPartnerDraft {
                unit_id,
                partner_id: PartnerId::new(),
                percentage: Decimal::from(pct),
            },
            Utc::now(),
        )
    }

    #[test]
    fn ownership_cannot_exceed_one_hundred_percent() {
        let unit = UnitId::new();
        let existing = vec![share(unit, 60), share(UnitId::new(), 90)];
        assert!(unit_ownership(&share(unit, 40), &existing).is_ok());
        assert!(unit_ownership(&share(unit, 41), &existing).is_err());

        // Updating an existing share does not count it twice.
        let mut edited = existing[0].clone();
        edited.percentage = Decimal::from(100);
        assert!(unit_ownership(&edited, &existing).is_ok());
    }

    #[test]
    fn referenced_rows_are_protected() {
        let unit = UnitId::new();
        let target = Reference::new(EntityKind::Unit, unit);
        let holder = Reference::new(EntityKind::Contract, ContractId::new());
        let holders = vec![(holder, vec![target])];
        assert!(ensure_unreferenced(target, &holders).is_err());
        assert!(ensure_unreferenced(Reference::new(EntityKind::Unit, UnitId::new()), &holders).is_ok());
    }
}

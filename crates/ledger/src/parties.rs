//! Customers, partners, brokers and the obligations attached to them.
//!
//! These are attribute records: they carry no balance logic of their own and
//! are written through the generic record path.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use propledger_core::{
    BrokerDueId, BrokerId, ContractId, CustomerId, DomainError, DomainResult, Entity, EntityKind,
    Money, PartnerDebtId,
    PartnerGroupId, PartnerId, Reference, UnitId, UnitPartnerId, VoucherId,
};

use crate::record::Record;
use crate::validation::{FieldValue, Validate};

// -------------------------
// Customer
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDraft {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Entity for Customer {
    const KIND: EntityKind = EntityKind::Customer;
    type Id = CustomerId;

    fn id(&self) -> CustomerId {
        self.id
    }
}

impl Validate for Customer {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("name", FieldValue::Text(&self.name)),
            ("phone", FieldValue::Text(&self.phone)),
            ("national_id", FieldValue::OptText(self.national_id.as_deref())),
            ("address", FieldValue::OptText(self.address.as_deref())),
        ]
    }
}

impl Record for Customer {
    type Draft = CustomerDraft;

    fn create(id: CustomerId, draft: CustomerDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            phone: draft.phone,
            national_id: draft.national_id,
            address: draft.address,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: CustomerDraft, now: DateTime<Utc>) {
        self.name = draft.name;
        self.phone = draft.phone;
        self.national_id = draft.national_id;
        self.address = draft.address;
        self.notes = draft.notes;
        self.updated_at = now;
    }
}

// -------------------------
// Partner groups and partners
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerGroup {
    pub id: PartnerGroupId,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartnerGroupDraft {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Entity for PartnerGroup {
    const KIND: EntityKind = EntityKind::PartnerGroup;
    type Id = PartnerGroupId;

    fn id(&self) -> PartnerGroupId {
        self.id
    }
}

impl Validate for PartnerGroup {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![("name", FieldValue::Text(&self.name))]
    }
}

impl Record for PartnerGroup {
    type Draft = PartnerGroupDraft;

    fn create(id: PartnerGroupId, draft: PartnerGroupDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: PartnerGroupDraft, now: DateTime<Utc>) {
        self.name = draft.name;
        self.notes = draft.notes;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub group_id: Option<PartnerGroupId>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartnerDraft {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub group_id: Option<PartnerGroupId>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Entity for Partner {
    const KIND: EntityKind = EntityKind::Partner;
    type Id = PartnerId;

    fn id(&self) -> PartnerId {
        self.id
    }

    fn references(&self) -> Vec<Reference> {
        self.group_id
            .map(|g| Reference::new(EntityKind::PartnerGroup, g))
            .into_iter()
            .collect()
    }
}

impl Validate for Partner {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("name", FieldValue::Text(&self.name)),
            ("phone", FieldValue::OptText(self.phone.as_deref())),
        ]
    }
}

impl Record for Partner {
    type Draft = PartnerDraft;

    fn create(id: PartnerId, draft: PartnerDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            phone: draft.phone,
            group_id: draft.group_id,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: PartnerDraft, now: DateTime<Utc>) {
        self.name = draft.name;
        self.phone = draft.phone;
        self.group_id = draft.group_id;
        self.notes = draft.notes;
        self.updated_at = now;
    }
}

/// A partner's ownership percentage of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPartner {
    pub id: UnitPartnerId,
    pub unit_id: UnitId,
    pub partner_id: PartnerId,
    pub percentage: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitPartnerDraft {
    pub unit_id: UnitId,
    pub partner_id: PartnerId,
    pub percentage: Decimal,
}

impl Entity for UnitPartner {
    const KIND: EntityKind = EntityKind::UnitPartner;
    type Id = UnitPartnerId;

    fn id(&self) -> UnitPartnerId {
        self.id
    }

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference::new(EntityKind::Unit, self.unit_id),
            Reference::new(EntityKind::Partner, self.partner_id),
        ]
    }
}

impl Validate for UnitPartner {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![("percentage", FieldValue::Number(self.percentage))]
    }
}

impl Record for UnitPartner {
    type Draft = UnitPartnerDraft;

    const CHECKS_SIBLINGS: bool = true;

    fn create(id: UnitPartnerId, draft: UnitPartnerDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            unit_id: draft.unit_id,
            partner_id: draft.partner_id,
            percentage: draft.percentage,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: UnitPartnerDraft, now: DateTime<Utc>) {
        self.unit_id = draft.unit_id;
        self.partner_id = draft.partner_id;
        self.percentage = draft.percentage;
        self.updated_at = now;
    }

    fn check_siblings(&self, siblings: &[Self]) -> DomainResult<()> {
        crate::policy::unit_ownership(self, siblings)
    }
}

// -------------------------
// Brokers
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerDraft {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Entity for Broker {
    const KIND: EntityKind = EntityKind::Broker;
    type Id = BrokerId;

    fn id(&self) -> BrokerId {
        self.id
    }
}

impl Validate for Broker {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("name", FieldValue::Text(&self.name)),
            ("phone", FieldValue::OptText(self.phone.as_deref())),
        ]
    }
}

impl Record for Broker {
    type Draft = BrokerDraft;

    fn create(id: BrokerId, draft: BrokerDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            phone: draft.phone,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: BrokerDraft, now: DateTime<Utc>) {
        self.name = draft.name;
        self.phone = draft.phone;
        self.notes = draft.notes;
        self.updated_at = now;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerDueStatus {
    Pending,
    Paid,
}

/// Commission owed to a broker, usually opened by a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerDue {
    pub id: BrokerDueId,
    pub broker_id: BrokerId,
    #[serde(default)]
    pub contract_id: Option<ContractId>,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: BrokerDueStatus,
    #[serde(default)]
    pub paid_voucher_id: Option<VoucherId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerDueDraft {
    pub broker_id: BrokerId,
    #[serde(default)]
    pub contract_id: Option<ContractId>,
    pub amount: Money,
    pub due_date: NaiveDate,
}

impl BrokerDue {
    pub fn mark_paid(&mut self, voucher_id: VoucherId, now: DateTime<Utc>) {
        self.status = BrokerDueStatus::Paid;
        self.paid_voucher_id = Some(voucher_id);
        self.updated_at = now;
    }

    pub fn reopen(&mut self, now: DateTime<Utc>) {
        self.status = BrokerDueStatus::Pending;
        self.paid_voucher_id = None;
        self.updated_at = now;
    }
}

impl Entity for BrokerDue {
    const KIND: EntityKind = EntityKind::BrokerDue;
    type Id = BrokerDueId;

    fn id(&self) -> BrokerDueId {
        self.id
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new(EntityKind::Broker, self.broker_id)];
        if let Some(contract_id) = self.contract_id {
            refs.push(Reference::new(EntityKind::Contract, contract_id));
        }
        refs
    }
}

impl Validate for BrokerDue {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![("amount", FieldValue::Amount(self.amount))]
    }
}

impl Record for BrokerDue {
    type Draft = BrokerDueDraft;

    fn create(id: BrokerDueId, draft: BrokerDueDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            broker_id: draft.broker_id,
            contract_id: draft.contract_id,
            amount: draft.amount,
            due_date: draft.due_date,
            status: BrokerDueStatus::Pending,
            paid_voucher_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: BrokerDueDraft, now: DateTime<Utc>) {
        self.broker_id = draft.broker_id;
        self.contract_id = draft.contract_id;
        self.amount = draft.amount;
        self.due_date = draft.due_date;
        self.updated_at = now;
    }

    /// A paid due mirrors its payment voucher and is frozen until that
    /// voucher is deleted.
    fn ensure_revisable(&self, _draft: &BrokerDueDraft) -> DomainResult<()> {
        if self.status == BrokerDueStatus::Paid {
            return Err(DomainError::conflict(format!(
                "broker due {} is paid; delete its payment voucher first",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_deletable(&self) -> DomainResult<()> {
        if self.status == BrokerDueStatus::Paid {
            return Err(DomainError::conflict(format!(
                "broker due {} is paid; delete its payment voucher first",
                self.id
            )));
        }
        Ok(())
    }
}

// -------------------------
// Partner debts
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerDebt {
    pub id: PartnerDebtId,
    pub partner_id: PartnerId,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub settled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartnerDebtDraft {
    pub partner_id: PartnerId,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub settled: bool,
}

impl Entity for PartnerDebt {
    const KIND: EntityKind = EntityKind::PartnerDebt;
    type Id = PartnerDebtId;

    fn id(&self) -> PartnerDebtId {
        self.id
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new(EntityKind::Partner, self.partner_id)]
    }
}

impl Validate for PartnerDebt {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("amount", FieldValue::Amount(self.amount)),
            ("description", FieldValue::Text(&self.description)),
        ]
    }
}

impl Record for PartnerDebt {
    type Draft = PartnerDebtDraft;

    fn create(id: PartnerDebtId, draft: PartnerDebtDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            partner_id: draft.partner_id,
            amount: draft.amount,
            date: draft.date,
            description: draft.description,
            settled: draft.settled,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: PartnerDebtDraft, now: DateTime<Utc>) {
        self.partner_id = draft.partner_id;
        self.amount = draft.amount;
        self.date = draft.date;
        self.description = draft.description;
        self.settled = draft.settled;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use propledger_core::DomainError;

    fn customer(phone: &str, national_id: Option<&str>) -> Customer {
        Customer::create(
            CustomerId::new(),
            CustomerDraft {
                name: "Mona Adel".to_string(),
                phone: phone.to_string(),
                national_id: national_id.map(str::to_string),
                address: None,
                notes: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn customer_rules_come_from_the_table() {
        assert!(validate(&customer("01001234567", Some("29801011234567"))).is_ok());

        match validate(&customer("", None)) {
            Err(DomainError::Validation(msg)) => assert_eq!(msg, "customer.phone: is required"),
            other => panic!("unexpected: {other:?}"),
        }

        match validate(&customer("01001234567", Some("123"))) {
            Err(DomainError::Validation(msg)) => assert!(msg.starts_with("customer.national_id")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn revise_keeps_identity_and_creation_time() {
        let mut c = customer("01001234567", None);
        let (id, created) = (c.id, c.created_at);
        c.revise(
            CustomerDraft {
                name: "Mona A.".to_string(),
                phone: "01009999999".to_string(),
                national_id: None,
                address: None,
                notes: None,
            },
            Utc::now(),
        );
        assert_eq!(c.id, id);
        assert_eq!(c.created_at, created);
        assert_eq!(c.name, "Mona A.");
    }

    #[test]
    fn unit_partner_percentage_bounds() {
        let up = UnitPartner::create(
            UnitPartnerId::new(),
            UnitPartnerDraft {
                unit_id: UnitId::new(),
                partner_id: PartnerId::new(),
                percentage: Decimal::from(120),
            },
            Utc::now(),
        );
        assert!(matches!(validate(&up), Err(DomainError::Validation(_))));
    }

    #[test]
    fn broker_due_pay_and_reopen() {
        let mut due = BrokerDue::create(
            BrokerDueId::new(),
            BrokerDueDraft {
                broker_id: BrokerId::new(),
                contract_id: None,
                amount: Money::from(5000),
                due_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            },
            Utc::now(),
        );
        let smaller = BrokerDueDraft {
            broker_id: due.broker_id,
            contract_id: None,
            amount: Money::from(1),
            due_date: due.due_date,
        };
        assert!(due.ensure_revisable(&smaller).is_ok());

        let voucher = VoucherId::new();
        due.mark_paid(voucher, Utc::now());
        assert_eq!(due.status, BrokerDueStatus::Paid);
        assert_eq!(due.paid_voucher_id, Some(voucher));
        assert!(matches!(due.ensure_revisable(&smaller), Err(DomainError::Conflict(_))));

        due.reopen(Utc::now());
        assert_eq!(due.status, BrokerDueStatus::Pending);
        assert!(due.ensure_revisable(&smaller).is_ok());
    }

    #[test]
    fn unit_partner_checks_its_siblings() {
        let unit = UnitId::new();
        let share = |percentage: i64| {
            UnitPartner::create(
                UnitPartnerId::new(),
                UnitPartnerDraft {
                    unit_id: unit,
                    partner_id: PartnerId::new(),
                    percentage: Decimal::from(percentage),
                },
                Utc::now(),
            )
        };
        assert!(UnitPartner::CHECKS_SIBLINGS);
        let existing = vec![share(70)];
        assert!(share(30).check_siblings(&existing).is_ok());
        assert!(matches!(share(31).check_siblings(&existing), Err(DomainError::Validation(_))));
    }
}

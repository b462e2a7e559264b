//! Units (sellable properties) and the sale contracts attached to them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use propledger_core::{
    BrokerId, ContractId, CustomerId, DomainError, DomainResult, Entity, EntityKind, Money,
    Reference, UnitId,
};

use crate::record::Record;
use crate::validation::{FieldValue, Validate};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Available,
    Reserved,
    Sold,
}

impl UnitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitStatus::Available => "available",
            UnitStatus::Reserved => "reserved",
            UnitStatus::Sold => "sold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub code: String,
    pub unit_type: String,
    pub area: Decimal,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub building: Option<String>,
    pub list_price: Money,
    pub status: UnitStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable unit attributes. Status is driven by contracts and reservations.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitDraft {
    pub code: String,
    pub unit_type: String,
    #[serde(default)]
    pub area: Decimal,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub list_price: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Unit {
    fn transition(&mut self, to: UnitStatus, now: DateTime<Utc>) {
        self.status = to;
        self.updated_at = now;
    }

    pub fn reserve(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            UnitStatus::Available => {
                self.transition(UnitStatus::Reserved, now);
                Ok(())
            }
            other => Err(DomainError::conflict(format!(
                "unit {} is {} and cannot be reserved",
                self.code,
                other.as_str()
            ))),
        }
    }

    pub fn release(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            UnitStatus::Reserved => {
                self.transition(UnitStatus::Available, now);
                Ok(())
            }
            other => Err(DomainError::conflict(format!(
                "unit {} is {} and cannot be released",
                self.code,
                other.as_str()
            ))),
        }
    }

    /// A contract was signed on this unit.
    pub fn sell(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            UnitStatus::Available | UnitStatus::Reserved => {
                self.transition(UnitStatus::Sold, now);
                Ok(())
            }
            UnitStatus::Sold => Err(DomainError::conflict(format!(
                "unit {} is already sold",
                self.code
            ))),
        }
    }

    /// The unit's contract was removed; it goes back on the market.
    pub fn make_available(&mut self, now: DateTime<Utc>) {
        self.transition(UnitStatus::Available, now);
    }
}

impl Entity for Unit {
    const KIND: EntityKind = EntityKind::Unit;
    type Id = UnitId;

    fn id(&self) -> UnitId {
        self.id
    }
}

impl Validate for Unit {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("code", FieldValue::Text(&self.code)),
            ("unit_type", FieldValue::Text(&self.unit_type)),
            ("area", FieldValue::Number(self.area)),
            ("list_price", FieldValue::Amount(self.list_price)),
            ("building", FieldValue::OptText(self.building.as_deref())),
        ]
    }
}

impl Record for Unit {
    type Draft = UnitDraft;

    fn create(id: UnitId, draft: UnitDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            code: draft.code,
            unit_type: draft.unit_type,
            area: draft.area,
            floor: draft.floor,
            building: draft.building,
            list_price: draft.list_price,
            status: UnitStatus::Available,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: UnitDraft, now: DateTime<Utc>) {
        self.code = draft.code;
        self.unit_type = draft.unit_type;
        self.area = draft.area;
        self.floor = draft.floor;
        self.building = draft.building;
        self.list_price = draft.list_price;
        self.notes = draft.notes;
        self.updated_at = now;
    }
}

/// Sale agreement linking one customer to one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub unit_id: UnitId,
    pub customer_id: CustomerId,
    pub total_price: Money,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub broker_id: Option<BrokerId>,
    #[serde(default)]
    pub broker_name: Option<String>,
    #[serde(default)]
    pub broker_amount: Money,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractDraft {
    pub unit_id: UnitId,
    pub customer_id: CustomerId,
    pub total_price: Money,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub broker_id: Option<BrokerId>,
    #[serde(default)]
    pub broker_name: Option<String>,
    #[serde(default)]
    pub broker_amount: Money,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Editable contract terms; unit, customer and broker are fixed at signing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractRevision {
    pub total_price: Money,
    #[serde(default)]
    pub discount_amount: Money,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Contract {
    pub fn sign(id: ContractId, draft: ContractDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            unit_id: draft.unit_id,
            customer_id: draft.customer_id,
            total_price: draft.total_price,
            discount_amount: draft.discount_amount,
            broker_id: draft.broker_id,
            broker_name: draft.broker_name,
            broker_amount: draft.broker_amount,
            start_date: draft.start_date,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn revise(&mut self, revision: ContractRevision, now: DateTime<Utc>) {
        self.total_price = revision.total_price;
        self.discount_amount = revision.discount_amount;
        self.start_date = revision.start_date;
        self.notes = revision.notes;
        self.updated_at = now;
    }

    /// Price after discount.
    pub fn net_price(&self) -> Money {
        self.total_price - self.discount_amount
    }
}

impl Entity for Contract {
    const KIND: EntityKind = EntityKind::Contract;
    type Id = ContractId;

    fn id(&self) -> ContractId {
        self.id
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![
            Reference::new(EntityKind::Unit, self.unit_id),
            Reference::new(EntityKind::Customer, self.customer_id),
        ];
        if let Some(broker_id) = self.broker_id {
            refs.push(Reference::new(EntityKind::Broker, broker_id));
        }
        refs
    }
}

impl Validate for Contract {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("total_price", FieldValue::Amount(self.total_price)),
            ("discount_amount", FieldValue::Amount(self.discount_amount)),
            ("broker_amount", FieldValue::Amount(self.broker_amount)),
            ("broker_name", FieldValue::OptText(self.broker_name.as_deref())),
        ]
    }

    fn check_invariants(&self) -> DomainResult<()> {
        if self.discount_amount > self.total_price {
            return Err(DomainError::validation(
                "contract.discount_amount: must not exceed total_price",
            ));
        }
        Ok(())
    }
}

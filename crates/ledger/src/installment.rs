use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use propledger_core::{
    ContractId, DomainError, DomainResult, Entity, EntityKind, InstallmentId, Money, Reference,
    UnitId,
};

use crate::record::Record;
use crate::validation::{FieldValue, Validate};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Pending,
    Partial,
    Paid,
}

impl InstallmentStatus {
    /// Status implied by how much of `amount` has been paid.
    pub fn for_payment(paid: Money, amount: Money) -> Self {
        if paid.is_zero() || paid.is_negative() {
            InstallmentStatus::Pending
        } else if paid < amount {
            InstallmentStatus::Partial
        } else {
            InstallmentStatus::Paid
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Partial => "partial",
            InstallmentStatus::Paid => "paid",
        }
    }
}

/// A scheduled payment obligation on a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub unit_id: UnitId,
    #[serde(default)]
    pub contract_id: Option<ContractId>,
    pub amount: Money,
    #[serde(default)]
    pub paid_amount: Money,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallmentDraft {
    pub unit_id: UnitId,
    #[serde(default)]
    pub contract_id: Option<ContractId>,
    pub amount: Money,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Installment {
    pub fn outstanding(&self) -> Money {
        self.amount - self.paid_amount
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today && self.status != InstallmentStatus::Paid
    }

    /// Record a payment against this installment.
    pub fn apply_payment(&mut self, amount: Money, now: DateTime<Utc>) -> DomainResult<()> {
        if !amount.is_positive() {
            return Err(DomainError::validation("payment amount must be greater than zero"));
        }
        if amount > self.outstanding() {
            return Err(DomainError::validation(format!(
                "payment {} exceeds outstanding {}",
                amount,
                self.outstanding()
            )));
        }
        self.paid_amount += amount;
        self.refresh_status(now);
        Ok(())
    }

    /// Undo a payment (its settlement voucher was deleted).
    pub fn revert_payment(&mut self, amount: Money, now: DateTime<Utc>) {
        self.paid_amount = (self.paid_amount - amount).max(Money::ZERO);
        self.refresh_status(now);
    }

    fn refresh_status(&mut self, now: DateTime<Utc>) {
        self.status = InstallmentStatus::for_payment(self.paid_amount, self.amount);
        self.updated_at = now;
    }
}

impl Entity for Installment {
    const KIND: EntityKind = EntityKind::Installment;
    type Id = InstallmentId;

    fn id(&self) -> InstallmentId {
        self.id
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new(EntityKind::Unit, self.unit_id)];
        if let Some(contract_id) = self.contract_id {
            refs.push(Reference::new(EntityKind::Contract, contract_id));
        }
        refs
    }
}

impl Validate for Installment {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("amount", FieldValue::Amount(self.amount)),
            ("paid_amount", FieldValue::Amount(self.paid_amount)),
        ]
    }

    fn check_invariants(&self) -> DomainResult<()> {
        if self.paid_amount > self.amount {
            return Err(DomainError::validation(
                "installment.amount: must not be less than the amount already paid",
            ));
        }
        Ok(())
    }
}

impl Record for Installment {
    type Draft = InstallmentDraft;

    fn create(id: InstallmentId, draft: InstallmentDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            unit_id: draft.unit_id,
            contract_id: draft.contract_id,
            amount: draft.amount,
            paid_amount: Money::ZERO,
            due_date: draft.due_date,
            status: InstallmentStatus::Pending,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn revise(&mut self, draft: InstallmentDraft, now: DateTime<Utc>) {
        self.unit_id = draft.unit_id;
        self.contract_id = draft.contract_id;
        self.amount = draft.amount;
        self.due_date = draft.due_date;
        self.notes = draft.notes;
        self.refresh_status(now);
    }

    /// Receipts already posted stay attached to the unit and contract they
    /// were recorded against.
    fn ensure_revisable(&self, draft: &InstallmentDraft) -> DomainResult<()> {
        if self.paid_amount.is_zero() {
            return Ok(());
        }
        if draft.unit_id != self.unit_id || draft.contract_id != self.contract_id {
            return Err(DomainError::conflict(format!(
                "installment {} has payments; its unit and contract cannot change",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_deletable(&self) -> DomainResult<()> {
        if !self.paid_amount.is_zero() {
            return Err(DomainError::conflict(format!(
                "installment {} has payments; delete its receipt vouchers first",
                self.id
            )));
        }
        Ok(())
    }
}

/// Status of an installment derived from the unit's receipts rather than
/// from the stored paid amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferredInstallment {
    pub installment_id: InstallmentId,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub covered: Money,
    pub status: InstallmentStatus,
}

/// Allocate `receipts` to installments in due-date order.
///
/// Earlier installments are covered first; whatever remains spills into the
/// next one, which then reads as partial.
pub fn infer_statuses(installments: &[Installment], receipts: Money) -> Vec<InferredInstallment> {
    let mut ordered: Vec<&Installment> = installments.iter().collect();
    ordered.sort_by_key(|i| (i.due_date, i.id));

    let mut remaining = receipts.max(Money::ZERO);
    ordered
        .into_iter()
        .map(|i| {
            let covered = remaining.min(i.amount);
            remaining -= covered;
            InferredInstallment {
                installment_id: i.id,
                due_date: i.due_date,
                amount: i.amount,
                covered,
                status: InstallmentStatus::for_payment(covered, i.amount),
            }
        })
        .collect()
}

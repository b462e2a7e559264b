use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use propledger_core::{
    DomainError, DomainResult, Entity, EntityKind, Money, Reference, SafeId, TransferId,
};

use crate::validation::{FieldValue, Validate};
use crate::voucher::BalanceAdjustment;

/// Movement of cash between two safes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub from_safe_id: SafeId,
    pub to_safe_id: SafeId,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferDraft {
    pub from_safe_id: SafeId,
    pub to_safe_id: SafeId,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
}

impl Transfer {
    pub fn record(id: TransferId, draft: TransferDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            from_safe_id: draft.from_safe_id,
            to_safe_id: draft.to_safe_id,
            amount: draft.amount,
            date: draft.date,
            description: draft.description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Debit the source, credit the destination.
    pub fn legs(&self) -> [BalanceAdjustment; 2] {
        [
            BalanceAdjustment {
                safe_id: self.from_safe_id,
                delta: -self.amount,
            },
            BalanceAdjustment {
                safe_id: self.to_safe_id,
                delta: self.amount,
            },
        ]
    }

    /// Legs that undo this transfer.
    pub fn reversal(&self) -> [BalanceAdjustment; 2] {
        self.legs().map(|leg| BalanceAdjustment {
            safe_id: leg.safe_id,
            delta: -leg.delta,
        })
    }

    /// Net effect on `safe_id` (zero when the safe is not involved).
    pub fn effect_on(&self, safe_id: SafeId) -> Money {
        self.legs()
            .iter()
            .filter(|leg| leg.safe_id == safe_id)
            .map(|leg| leg.delta)
            .sum()
    }
}

impl Entity for Transfer {
    const KIND: EntityKind = EntityKind::Transfer;
    type Id = TransferId;

    fn id(&self) -> TransferId {
        self.id
    }

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference::new(EntityKind::Safe, self.from_safe_id),
            Reference::new(EntityKind::Safe, self.to_safe_id),
        ]
    }
}

impl Validate for Transfer {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("amount", FieldValue::Amount(self.amount)),
            ("description", FieldValue::Text(&self.description)),
        ]
    }

    fn check_invariants(&self) -> DomainResult<()> {
        if self.from_safe_id == self.to_safe_id {
            return Err(DomainError::validation(
                "transfer: source and destination safe must differ",
            ));
        }
        Ok(())
    }
}

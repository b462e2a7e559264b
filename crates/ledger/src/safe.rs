use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use propledger_core::{Entity, EntityKind, Money, SafeId};

use crate::validation::{FieldValue, Validate};

/// A named cash account with a running balance.
///
/// `balance` moves only through vouchers and transfers; `opening_balance` is
/// the balance the safe was created with and anchors reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Safe {
    pub id: SafeId,
    pub name: String,
    pub opening_balance: Money,
    pub balance: Money,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafeDraft {
    pub name: String,
    #[serde(default)]
    pub opening_balance: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Editable safe attributes. The balance is never edited directly.
#[derive(Debug, Clone, Deserialize)]
pub struct SafeRevision {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Safe {
    pub fn open(id: SafeId, draft: SafeDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            opening_balance: draft.opening_balance,
            balance: draft.opening_balance,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn revise(&mut self, revision: SafeRevision, now: DateTime<Utc>) {
        self.name = revision.name;
        self.notes = revision.notes;
        self.updated_at = now;
    }

    /// Move the balance by a signed delta.
    pub fn apply(&mut self, delta: Money, now: DateTime<Utc>) {
        self.balance += delta;
        self.updated_at = now;
    }
}

impl Entity for Safe {
    const KIND: EntityKind = EntityKind::Safe;
    type Id = SafeId;

    fn id(&self) -> SafeId {
        self.id
    }
}

impl Validate for Safe {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("name", FieldValue::Text(&self.name)),
            ("opening_balance", FieldValue::Amount(self.opening_balance)),
        ]
    }
}

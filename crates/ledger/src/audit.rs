//! Append-only audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use propledger_core::{AuditEntryId, Entity, UserId};

/// Who performed a write, and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn new(user_id: UserId, ip_address: Option<String>) -> Self {
        Self { user_id, ip_address }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Import,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Import => "import",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub user_id: UserId,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        entity_type: impl Into<String>,
        entity_id: Option<Uuid>,
        old_values: Option<Value>,
        new_values: Option<Value>,
        actor: &Actor,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            action,
            entity_type: entity_type.into(),
            entity_id,
            old_values,
            new_values,
            user_id: actor.user_id,
            ip_address: actor.ip_address.clone(),
            timestamp,
        }
    }

    pub fn created<T: Entity>(record: &T, actor: &Actor, at: DateTime<Utc>) -> Self {
        Self::new(
            AuditAction::Create,
            T::KIND.as_str(),
            Some(record.id().into()),
            None,
            snapshot_of(record),
            actor,
            at,
        )
    }

    pub fn updated<T: Entity>(before: &T, after: &T, actor: &Actor, at: DateTime<Utc>) -> Self {
        Self::new(
            AuditAction::Update,
            T::KIND.as_str(),
            Some(after.id().into()),
            snapshot_of(before),
            snapshot_of(after),
            actor,
            at,
        )
    }

    pub fn deleted<T: Entity>(record: &T, actor: &Actor, at: DateTime<Utc>) -> Self {
        Self::new(
            AuditAction::Delete,
            T::KIND.as_str(),
            Some(record.id().into()),
            snapshot_of(record),
            None,
            actor,
            at,
        )
    }
}

fn snapshot_of<T: Serialize>(record: &T) -> Option<Value> {
    serde_json::to_value(record).ok()
}

/// Query for the audit list; newest entries first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 1000;

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.entity_type.as_deref().is_none_or(|t| t == entry.entity_type)
            && self.entity_id.is_none_or(|id| entry.entity_id == Some(id))
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    /// Apply the filter to entries stored oldest-first.
    pub fn select(&self, entries: &[AuditEntry]) -> Vec<AuditEntry> {
        entries
            .iter()
            .rev()
            .filter(|e| self.matches(e))
            .take(self.effective_limit())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::{Safe, SafeDraft};
    use propledger_core::{Money, SafeId};

    fn actor() -> Actor {
        Actor::new(UserId::new(), Some("10.0.0.1".into()))
    }

    #[test]
    fn update_entries_carry_both_images() {
        let before = Safe::open(
            SafeId::new(),
            SafeDraft { name: "Main".into(), opening_balance: Money::from(10), notes: None },
            Utc::now(),
        );
        let mut after = before.clone();
        after.name = "Main safe".into();

        let entry = AuditEntry::updated(&before, &after, &actor(), Utc::now());
        assert_eq!(entry.action, AuditAction::Update);
        assert_eq!(entry.entity_type, "safe");
        assert_eq!(entry.old_values.unwrap()["name"], "Main");
        assert_eq!(entry.new_values.unwrap()["name"], "Main safe");
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn filter_returns_newest_first_and_respects_limit() {
        let a = actor();
        let id = Uuid::now_v7();
        let entries: Vec<AuditEntry> = (0..5)
            .map(|n| {
                let kind = if n % 2 == 0 { "voucher" } else { "safe" };
                AuditEntry::new(AuditAction::Create, kind, Some(id), None, None, &a, Utc::now())
            })
            .collect();

        let filter = AuditFilter { entity_type: Some("voucher".into()), entity_id: None, limit: Some(2) };
        let selected = filter.select(&entries);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].id, entries[4].id);
        assert_eq!(selected[1].id, entries[2].id);
    }
}

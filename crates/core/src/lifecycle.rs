//! Soft-delete lifecycle.
//!
//! A record is either active or deleted; there is no way back. Stores only
//! hand out `Lifecycle<T>` from explicit "include deleted" reads, so default
//! reads can never accidentally aggregate a deleted row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle<T> {
    Active { record: T },
    Deleted { record: T, deleted_at: DateTime<Utc> },
}

impl<T> Lifecycle<T> {
    pub fn active(record: T) -> Self {
        Lifecycle::Active { record }
    }

    pub fn deleted(record: T, deleted_at: DateTime<Utc>) -> Self {
        Lifecycle::Deleted { record, deleted_at }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active { .. })
    }

    pub fn record(&self) -> &T {
        match self {
            Lifecycle::Active { record } | Lifecycle::Deleted { record, .. } => record,
        }
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Active { .. } => None,
            Lifecycle::Deleted { deleted_at, .. } => Some(*deleted_at),
        }
    }

    /// The record if it is still active.
    pub fn into_active(self) -> Option<T> {
        match self {
            Lifecycle::Active { record } => Some(record),
            Lifecycle::Deleted { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lifecycle<U> {
        match self {
            Lifecycle::Active { record } => Lifecycle::Active { record: f(record) },
            Lifecycle::Deleted { record, deleted_at } => Lifecycle::Deleted {
                record: f(record),
                deleted_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_records_are_not_active() {
        let now = Utc::now();
        let l = Lifecycle::deleted(5, now);
        assert!(!l.is_active());
        assert_eq!(l.deleted_at(), Some(now));
        assert_eq!(l.clone().into_active(), None);
        assert_eq!(*l.record(), 5);
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(Lifecycle::active("x")).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["record"], "x");
    }
}

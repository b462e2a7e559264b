//! Attribute records managed through the generic create/update/delete path.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use propledger_core::{DomainResult, Entity};

use crate::validation::Validate;

/// A record whose whole writable surface is described by a draft.
///
/// Ledger-bearing records (safes, vouchers, transfers, contracts) do not
/// implement this: their writes move balances or unit status and have
/// dedicated operations.
pub trait Record: Entity + Validate {
    /// Client-supplied attributes for create and update.
    type Draft: DeserializeOwned + Send + 'static;

    /// Whether writes must be checked against the other active rows of the
    /// same kind.
    const CHECKS_SIBLINGS: bool = false;

    fn create(id: Self::Id, draft: Self::Draft, now: DateTime<Utc>) -> Self;

    /// Replace the writable attributes, keeping identity and system fields.
    fn revise(&mut self, draft: Self::Draft, now: DateTime<Utc>);

    /// Refuse a revision based on the record's own state, before `revise`.
    fn ensure_revisable(&self, _draft: &Self::Draft) -> DomainResult<()> {
        Ok(())
    }

    /// Cross-row rule for writes; `siblings` holds every active row of the
    /// kind, possibly including `self` in its previous state.
    fn check_siblings(&self, _siblings: &[Self]) -> DomainResult<()> {
        Ok(())
    }

    /// Refuse soft deletion based on the record's own state.
    fn ensure_deletable(&self) -> DomainResult<()> {
        Ok(())
    }
}

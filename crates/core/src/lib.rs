//! `propledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the domain error model, the `Money` value type and the
//! soft-delete lifecycle every persisted record goes through.

pub mod entity;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod money;

pub use entity::{Entity, EntityKind, Reference};
pub use error::{DomainError, DomainResult};
pub use id::{
    AuditEntryId, BrokerDueId, BrokerId, ContractId, CustomerId, InstallmentId, PartnerDebtId,
    PartnerGroupId, PartnerId, SafeId, TenantId, TransferId, UnitId, UnitPartnerId, UserId,
    VoucherId,
};
pub use lifecycle::Lifecycle;
pub use money::Money;

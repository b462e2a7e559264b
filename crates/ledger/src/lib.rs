//! Real-estate bookkeeping domain (safes, vouchers, contracts, installments).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. The
//! infrastructure layer loads records, asks this crate what must change, and
//! writes the result back inside one unit of work.

pub mod audit;
pub mod installment;
pub mod parties;
pub mod policy;
pub mod property;
pub mod record;
pub mod reports;
pub mod safe;
pub mod settings;
pub mod snapshot;
pub mod transfer;
pub mod validation;
pub mod voucher;

pub use audit::{Actor, AuditAction, AuditEntry, AuditFilter};
pub use installment::{Installment, InstallmentDraft, InstallmentStatus, InferredInstallment};
pub use parties::{
    Broker, BrokerDraft, BrokerDue, BrokerDueDraft, BrokerDueStatus, Customer, CustomerDraft,
    Partner, PartnerDebt, PartnerDebtDraft, PartnerDraft, PartnerGroup, PartnerGroupDraft,
    UnitPartner, UnitPartnerDraft,
};
pub use property::{Contract, ContractDraft, ContractRevision, Unit, UnitDraft, UnitStatus};
pub use record::Record;
pub use reports::{DashboardSummary, PartnerShare, SafeReconciliation, UnitRemaining};
pub use safe::{Safe, SafeDraft, SafeRevision};
pub use settings::{AppSettings, Theme};
pub use snapshot::Snapshot;
pub use transfer::{Transfer, TransferDraft};
pub use validation::{validate, FieldValue, Rule, Validate};
pub use voucher::{BalanceAdjustment, Voucher, VoucherDraft, VoucherKind};

//! Infrastructure layer: storage backends, the ledger service, exports, config.

pub mod config;
pub mod export;
pub mod service;
pub mod store;

pub use config::ServiceConfig;
pub use export::Dataset;
pub use service::{
    BrokerDuePayment, BrokerDueSettlement, ContractRemoval, InstallmentPayment, InstallmentReceipt,
    LedgerError, LedgerResult, LedgerService, RestoreSummary,
};
pub use store::{AnyLedgerStore, InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError, UnitOfWork};

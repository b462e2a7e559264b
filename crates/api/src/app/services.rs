//! Service wiring: picks the store backend and builds the ledger service.

use propledger_infra::{AnyLedgerStore, LedgerService, ServiceConfig};

/// The service every handler talks to.
pub type AppServices = LedgerService<AnyLedgerStore>;

pub async fn build_services(config: &ServiceConfig) -> anyhow::Result<AppServices> {
    let store = config.connect_store().await?;
    Ok(LedgerService::new(store))
}

use axum::{routing::get, Router};

use propledger_ledger::{Broker, Customer, Partner, PartnerDebt, PartnerGroup, UnitPartner};

pub mod admin;
pub mod common;
pub mod contracts;
pub mod payments;
pub mod reports;
pub mod safes;
pub mod system;
pub mod transfers;
pub mod units;
pub mod vouchers;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/safes", safes::router())
        .nest("/vouchers", vouchers::router())
        .nest("/transfers", transfers::router())
        .nest("/contracts", contracts::router())
        .nest("/units", units::router())
        .nest("/installments", payments::installments_router())
        .nest("/broker-dues", payments::broker_dues_router())
        .nest("/customers", common::record_routes::<Customer>())
        .nest("/partner-groups", common::record_routes::<PartnerGroup>())
        .nest("/partners", common::record_routes::<Partner>())
        .nest("/unit-partners", common::record_routes::<UnitPartner>())
        .nest("/brokers", common::record_routes::<Broker>())
        .nest("/partner-debts", common::record_routes::<PartnerDebt>())
        .merge(reports::router())
        .merge(admin::router())
}

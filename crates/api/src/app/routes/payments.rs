//! Installments and broker dues: attribute CRUD plus settlement endpoints that
//! post the matching voucher.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::post,
    Router,
};

use propledger_auth::Permission;
use propledger_core::{BrokerDueId, InstallmentId};
use propledger_infra::{BrokerDuePayment, InstallmentPayment};
use propledger_ledger::{BrokerDue, Installment};

use crate::app::dto::{self, ApiJson};
use crate::app::errors;
use crate::app::routes::common::{guard, record_routes};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn installments_router() -> Router {
    record_routes::<Installment>().route("/:id/pay", post(pay_installment))
}

pub fn broker_dues_router() -> Router {
    record_routes::<BrokerDue>().route("/:id/pay", post(pay_broker_due))
}

/// POST /installments/:id/pay - receipt voucher plus paid-amount advance
pub async fn pay_installment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<InstallmentPayment>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: InstallmentId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.pay_installment(tenant.tenant_id(), &principal.actor(), id, body).await {
        Ok(receipt) => dto::ok(StatusCode::CREATED, receipt),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// POST /broker-dues/:id/pay - payment voucher, due marked paid
pub async fn pay_broker_due(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<BrokerDuePayment>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: BrokerDueId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.pay_broker_due(tenant.tenant_id(), &principal.actor(), id, body).await {
        Ok(settlement) => dto::ok(StatusCode::CREATED, settlement),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

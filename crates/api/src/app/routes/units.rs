//! Units: attribute CRUD plus the reservation lifecycle and per-unit reports.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};

use propledger_auth::Permission;
use propledger_core::UnitId;
use propledger_ledger::Unit;

use crate::app::dto;
use crate::app::errors;
use crate::app::routes::common::{guard, record_routes};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    record_routes::<Unit>()
        .route("/:id/reserve", post(reserve_unit))
        .route("/:id/release", post(release_unit))
        .route("/:id/remaining", get(unit_remaining))
        .route("/:id/installment-status", get(installment_statuses))
        .route("/:id/partner-shares", get(partner_shares))
}

pub async fn reserve_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: UnitId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.reserve_unit(tenant.tenant_id(), &principal.actor(), id).await {
        Ok(unit) => dto::ok(StatusCode::OK, unit),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn release_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: UnitId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.release_unit(tenant.tenant_id(), &principal.actor(), id).await {
        Ok(unit) => dto::ok(StatusCode::OK, unit),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /units/:id/remaining - contract price net of installments received
pub async fn unit_remaining(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    let id: UnitId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.unit_remaining(tenant.tenant_id(), id).await {
        Ok(remaining) => dto::ok(StatusCode::OK, remaining),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn installment_statuses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    let id: UnitId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.installment_statuses(tenant.tenant_id(), id).await {
        Ok(statuses) => dto::ok(StatusCode::OK, statuses),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn partner_shares(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    let id: UnitId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.partner_shares(tenant.tenant_id(), id).await {
        Ok(shares) => dto::ok(StatusCode::OK, shares),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

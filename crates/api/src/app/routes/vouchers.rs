use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use propledger_auth::Permission;
use propledger_core::VoucherId;
use propledger_ledger::{Voucher, VoucherDraft};

use crate::app::dto::{self, ApiJson, ApiQuery, ListQuery};
use crate::app::errors;
use crate::app::routes::common::{get_entity, guard, list_entities};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_vouchers).post(record_voucher))
        .route("/:id", get(get_voucher).put(update_voucher).delete(delete_voucher))
}

pub async fn record_voucher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<VoucherDraft>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    match services.record_voucher(tenant.tenant_id(), &principal.actor(), body).await {
        Ok(voucher) => dto::ok(StatusCode::CREATED, voucher),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_vouchers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    list_entities::<Voucher>(&services, tenant.tenant_id(), query).await
}

pub async fn get_voucher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    get_entity::<Voucher>(&services, tenant.tenant_id(), &id).await
}

pub async fn update_voucher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<VoucherDraft>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: VoucherId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.update_voucher(tenant.tenant_id(), &principal.actor(), id, body).await {
        Ok(voucher) => dto::ok(StatusCode::OK, voucher),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_voucher(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: VoucherId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_voucher(tenant.tenant_id(), &principal.actor(), id).await {
        Ok(voucher) => dto::ok_with_message(StatusCode::OK, voucher, "voucher deleted"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

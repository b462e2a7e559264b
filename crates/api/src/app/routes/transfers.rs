use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use propledger_auth::Permission;
use propledger_core::TransferId;
use propledger_ledger::{Transfer, TransferDraft};

use crate::app::dto::{self, ApiJson, ApiQuery, ListQuery};
use crate::app::errors;
use crate::app::routes::common::{get_entity, guard, list_entities};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transfers).post(record_transfer))
        .route("/:id", get(get_transfer).delete(delete_transfer))
}

pub async fn record_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<TransferDraft>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    match services.record_transfer(tenant.tenant_id(), &principal.actor(), body).await {
        Ok(transfer) => dto::ok(StatusCode::CREATED, transfer),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_transfers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    list_entities::<Transfer>(&services, tenant.tenant_id(), query).await
}

pub async fn get_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    get_entity::<Transfer>(&services, tenant.tenant_id(), &id).await
}

pub async fn delete_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: TransferId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_transfer(tenant.tenant_id(), &principal.actor(), id).await {
        Ok(transfer) => dto::ok_with_message(StatusCode::OK, transfer, "transfer reversed"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

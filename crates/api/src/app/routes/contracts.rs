use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use propledger_auth::Permission;
use propledger_core::ContractId;
use propledger_ledger::{Contract, ContractDraft, ContractRevision};

use crate::app::dto::{self, ApiJson, ApiQuery, ListQuery};
use crate::app::errors;
use crate::app::routes::common::{get_entity, guard, list_entities};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_contracts).post(create_contract))
        .route("/:id", get(get_contract).put(update_contract).delete(delete_contract))
}

/// POST /contracts - sign a contract and mark its unit sold
pub async fn create_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<ContractDraft>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    match services.create_contract(tenant.tenant_id(), &principal.actor(), body).await {
        Ok(contract) => dto::ok(StatusCode::CREATED, contract),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_contracts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    list_entities::<Contract>(&services, tenant.tenant_id(), query).await
}

pub async fn get_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    get_entity::<Contract>(&services, tenant.tenant_id(), &id).await
}

pub async fn update_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ContractRevision>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: ContractId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.update_contract(tenant.tenant_id(), &principal.actor(), id, body).await {
        Ok(contract) => dto::ok(StatusCode::OK, contract),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// DELETE /contracts/:id - cascades to installments and broker dues, frees the unit
pub async fn delete_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: ContractId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_contract(tenant.tenant_id(), &principal.actor(), id).await {
        Ok(removal) => dto::ok_with_message(StatusCode::OK, removal, "contract deleted"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

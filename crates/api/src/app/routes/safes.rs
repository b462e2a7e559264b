use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use propledger_auth::Permission;
use propledger_core::SafeId;
use propledger_ledger::{Safe, SafeDraft, SafeRevision};

use crate::app::dto::{self, ApiJson, ApiQuery, ListQuery};
use crate::app::errors;
use crate::app::routes::common::{get_entity, guard, list_entities};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_safes).post(create_safe))
        .route("/:id", get(get_safe).put(revise_safe).delete(delete_safe))
        .route("/:id/reconcile", get(reconcile_safe))
}

pub async fn create_safe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<SafeDraft>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    match services.create_safe(tenant.tenant_id(), &principal.actor(), body).await {
        Ok(safe) => dto::ok(StatusCode::CREATED, safe),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_safes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    list_entities::<Safe>(&services, tenant.tenant_id(), query).await
}

pub async fn get_safe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    get_entity::<Safe>(&services, tenant.tenant_id(), &id).await
}

pub async fn revise_safe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SafeRevision>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: SafeId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.revise_safe(tenant.tenant_id(), &principal.actor(), id, body).await {
        Ok(safe) => dto::ok(StatusCode::OK, safe),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_safe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }
    let id: SafeId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_safe(tenant.tenant_id(), &principal.actor(), id).await {
        Ok(safe) => dto::ok_with_message(StatusCode::OK, safe, "safe deleted"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn reconcile_safe(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    let id: SafeId = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.reconcile_safe(tenant.tenant_id(), id).await {
        Ok(check) => dto::ok(StatusCode::OK, check),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

//! Handler building blocks shared by every resource router.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};

use propledger_auth::Permission;
use propledger_core::{Entity, TenantId};
use propledger_ledger::Record;

use crate::app::dto::{self, ApiJson, ApiQuery, ListQuery};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

/// Permission check that short-circuits with a 403 envelope.
pub fn guard(tenant: &TenantContext, principal: &PrincipalContext, required: &Permission) -> Result<(), Response> {
    crate::authz::require_permission(tenant, principal, required).map_err(errors::forbidden)
}

/// Active rows, or every row tagged with its state when the query asks for it.
pub async fn list_entities<T: Entity>(services: &AppServices, tenant_id: TenantId, query: ListQuery) -> Response {
    let result = if query.include_deleted {
        services.list_any::<T>(tenant_id).await.map(|rows| dto::ok(StatusCode::OK, rows))
    } else {
        services.list::<T>(tenant_id).await.map(|rows| dto::ok(StatusCode::OK, rows))
    };
    result.unwrap_or_else(errors::ledger_error_to_response)
}

pub async fn get_entity<T: Entity>(services: &AppServices, tenant_id: TenantId, raw_id: &str) -> Response {
    let id: T::Id = match dto::parse_id(raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.get::<T>(tenant_id, id).await {
        Ok(record) => dto::ok(StatusCode::OK, record),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// CRUD routes for an attribute record: create, list, get, replace, delete.
pub fn record_routes<T: Record>() -> Router {
    Router::new()
        .route("/", post(create_record::<T>).get(list_records::<T>))
        .route(
            "/:id",
            get(get_record::<T>).put(update_record::<T>).delete(delete_record::<T>),
        )
}

async fn create_record<T: Record>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<T::Draft>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::RECORDS_WRITE) {
        return resp;
    }
    match services.create_record::<T>(tenant.tenant_id(), &principal.actor(), body).await {
        Ok(record) => dto::ok(StatusCode::CREATED, record),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

async fn list_records<T: Record>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    list_entities::<T>(&services, tenant.tenant_id(), query).await
}

async fn get_record<T: Record>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    get_entity::<T>(&services, tenant.tenant_id(), &id).await
}

async fn update_record<T: Record>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<T::Draft>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::RECORDS_WRITE) {
        return resp;
    }
    let id: T::Id = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.update_record::<T>(tenant.tenant_id(), &principal.actor(), id, body).await {
        Ok(record) => dto::ok(StatusCode::OK, record),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

async fn delete_record<T: Record>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::RECORDS_WRITE) {
        return resp;
    }
    let id: T::Id = match dto::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_record::<T>(tenant.tenant_id(), &principal.actor(), id).await {
        Ok(record) => dto::ok_with_message(StatusCode::OK, record, format!("{} deleted", T::KIND)),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

//! Tenant administration: settings and whole-tenant backup/restore.
//!
//! Restore replaces the tenant's data wholesale, so it carries its own
//! permission separate from taking a backup.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};

use propledger_auth::Permission;
use propledger_ledger::{AppSettings, Snapshot};

use crate::app::dto::{self, ApiJson};
use crate::app::errors;
use crate::app::routes::common::guard;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/backup", get(export_backup))
        .route("/backup/restore", post(restore_backup))
        .route("/settings", get(get_settings).put(save_settings))
}

/// GET /backup - snapshot of every active row plus settings
pub async fn export_backup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::BACKUP_EXPORT) {
        return resp;
    }
    match services.backup(tenant.tenant_id()).await {
        Ok(snapshot) => dto::ok(StatusCode::OK, snapshot),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// POST /backup/restore
pub async fn restore_backup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<Snapshot>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::BACKUP_RESTORE) {
        return resp;
    }
    match services.restore(tenant.tenant_id(), &principal.actor(), body).await {
        Ok(summary) => dto::ok_with_message(StatusCode::OK, summary, "backup restored"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    match services.settings(tenant.tenant_id()).await {
        Ok(settings) => dto::ok(StatusCode::OK, settings),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn save_settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<AppSettings>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::SETTINGS_WRITE) {
        return resp;
    }
    match services.save_settings(tenant.tenant_id(), &principal.actor(), body).await {
        Ok(settings) => dto::ok(StatusCode::OK, settings),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

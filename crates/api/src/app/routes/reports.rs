//! Read-only reporting: dashboard KPIs, the audit trail and CSV exports.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{NaiveDate, Utc};

use propledger_auth::Permission;
use propledger_infra::Dataset;
use propledger_ledger::AuditFilter;

use crate::app::dto::{self, ApiQuery, DashboardQuery};
use crate::app::errors;
use crate::app::routes::common::guard;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/audit-logs", get(audit_logs))
        .route("/export/:file", get(export_csv))
}

fn today(query: &DashboardQuery) -> NaiveDate {
    query.today.unwrap_or_else(|| Utc::now().date_naive())
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<DashboardQuery>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    match services.dashboard(tenant.tenant_id(), today(&query)).await {
        Ok(summary) => dto::ok(StatusCode::OK, summary),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /audit-logs?entity_type=&entity_id=&limit= - newest first
pub async fn audit_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(filter): ApiQuery<AuditFilter>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    match services.audit_log(tenant.tenant_id(), filter).await {
        Ok(entries) => dto::ok(StatusCode::OK, entries),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /export/:file - `vouchers.csv`, `contracts.csv`, `installments.csv`,
/// `safes.csv` or `dashboard.csv`
pub async fn export_csv(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(file): Path<String>,
    ApiQuery(query): ApiQuery<DashboardQuery>,
) -> Response {
    if let Err(resp) = guard(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }
    let dataset = match Dataset::from_str(&file) {
        Ok(dataset) => dataset,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.export_csv(tenant.tenant_id(), dataset, today(&query)).await {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", dataset.file_name()),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

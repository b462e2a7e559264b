use axum::{extract::Extension, http::StatusCode, response::Response};
use serde_json::json;

use propledger_auth::permissions_for;

use crate::app::dto;
use crate::context::{PrincipalContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    dto::ok(
        StatusCode::OK,
        json!({
            "tenant_id": tenant.tenant_id().to_string(),
            "user_id": principal.user_id().to_string(),
            "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            "permissions": permissions_for(principal.roles())
                .iter()
                .map(|p| p.as_str().to_string())
                .collect::<Vec<_>>(),
            "ip_address": principal.ip_address(),
        }),
    )
}

use anyhow::Context;

use propledger_infra::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    propledger_observability::init();

    let config = ServiceConfig::from_env();
    let app = propledger_api::app::build_app(&config)
        .await
        .context("failed to build application")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

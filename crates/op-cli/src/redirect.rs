//! Plain HTTP responder that sends every visitor to the project page.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router, extract::State, http::{StatusCode, header}, response::IntoResponse
};
use op_types::config::RedirectConfig;
use tokio::net::TcpListener;
use tracing::info;

/// Router answering every method and path with `302 Found` to `location`.
pub fn router(location: impl Into<Arc<str>>) -> Router {
    Router::new().fallback(redirect).with_state(location.into())
}

async fn redirect(State(location): State<Arc<str>>) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())])
}

pub async fn run_redirect_server(config: RedirectConfig) -> Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind http responder on {addr}"))?;
    info!(%addr, location = %config.location, "starting http redirect");
    serve(listener, config.location).await
}

pub async fn serve(listener: TcpListener, location: String) -> Result<()> {
    axum::serve(listener, router(location)).await?;
    Ok(())
}

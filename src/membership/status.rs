//! Read-only HTTP view of the registry table.

use super::service::RegistryService;
use super::types::{CategorySnapshot, MemberSnapshot};

use anyhow::Result;
use axum::{Extension, Json, Router, routing::get};
use std::sync::Arc;
use tokio::net::TcpListener;

pub fn router(registry: Arc<RegistryService>) -> Router {
    Router::new()
        .route("/members", get(handle_members))
        .route("/categories", get(handle_categories))
        .layer(Extension(registry))
}

pub async fn serve(registry: Arc<RegistryService>, listener: TcpListener) -> Result<()> {
    tracing::info!("Registry status endpoint on http://{}", listener.local_addr()?);
    axum::serve(listener, router(registry)).await?;
    Ok(())
}

async fn handle_members(
    Extension(registry): Extension<Arc<RegistryService>>,
) -> Json<Vec<MemberSnapshot>> {
    Json(registry.members().await)
}

async fn handle_categories(
    Extension(registry): Extension<Arc<RegistryService>>,
) -> Json<Vec<CategorySnapshot>> {
    Json(registry.category_summary().await)
}

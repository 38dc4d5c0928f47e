#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use platform_client::InMemorySessionRegistry;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    config::Config,
    labels::{
        reconciler::EventReconciler,
        service::LabelService,
        store::{memory_associations, memory_labels},
    },
    server::{AppState, build_router},
};

pub mod config;
pub mod labels;
pub mod server;

pub fn build_gateway_state(config: Config) -> AppState {
    let labels = memory_labels();
    let associations = memory_associations();
    let sessions = InMemorySessionRegistry::shared();
    let service = Arc::new(LabelService::new_with_policy(
        labels.clone(),
        associations.clone(),
        sessions.clone(),
        config.label_policy(),
    ));
    let reconciler = Arc::new(EventReconciler::new(labels, associations));
    AppState::new(config, service, reconciler, sessions)
}

pub fn build_app(config: Config) -> axum::Router {
    build_router(build_gateway_state(config))
}

pub async fn serve(config: Config) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        service = %config.service_name,
        bind_addr = %config.bind_addr,
        "labels gateway listening"
    );
    axum::serve(listener, build_app(config)).await?;
    Ok(())
}

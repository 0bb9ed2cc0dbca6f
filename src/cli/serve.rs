// src/cli/serve.rs — Wire the store, gateway, orchestrator and API together

use std::sync::Arc;
use std::time::Duration;

use crate::api::{self, ApiState};
use crate::cli::open_store;
use crate::infra::config::Config;
use crate::realtime::build_gateway;
use crate::session::{Reconciler, SessionOrchestrator};

/// Serve the HTTP API until ctrl-c, with the reconciler in the background.
pub async fn run_serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let (store, _store_task) = open_store(config)?;
    let store = Arc::new(store);
    let gateway = build_gateway(&config.realtime)?;
    tracing::info!("Realtime gateway: {}", gateway.id());

    let orchestrator = Arc::new(SessionOrchestrator::new(store.clone(), gateway.clone()));

    let reconciler_task = if config.reconciler.enabled {
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            gateway,
            config.reconciler.batch_size,
        ));
        let interval = Duration::from_secs(config.reconciler.interval_seconds);
        tracing::info!("Reconciler running every {}s", interval.as_secs());
        Some(reconciler.spawn(interval))
    } else {
        None
    };

    let mut server = config.server.clone();
    if let Some(port) = port {
        server.port = port;
    }

    let state = ApiState::new(orchestrator, store, &config.auth);
    let result = api::start_server(&server, state).await;

    if let Some(task) = reconciler_task {
        task.abort();
    }
    result
}

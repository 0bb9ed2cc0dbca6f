// src/cli/reconcile.rs — One-shot drift repair

use std::sync::Arc;

use crate::cli::open_store;
use crate::infra::config::Config;
use crate::realtime::build_gateway;
use crate::session::Reconciler;

/// Run a single reconcile pass and print what it did.
pub async fn run_reconcile(config: &Config) -> anyhow::Result<()> {
    let (store, _store_task) = open_store(config)?;
    let gateway = build_gateway(&config.realtime)?;
    let reconciler = Reconciler::new(Arc::new(store), gateway, config.reconciler.batch_size);

    let report = reconciler.run_once().await?;
    println!(
        "Scanned {} drifted session(s): {} repaired, {} deferred, {} failed.",
        report.scanned, report.repaired, report.deferred, report.failed
    );
    if report.failed > 0 {
        anyhow::bail!("{} session(s) still drifted", report.failed);
    }
    Ok(())
}

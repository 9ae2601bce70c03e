pub mod copier;
pub mod reconciler;

use std::collections::HashSet;

use anyhow::Result;

use crate::config::Config;
use crate::remote::{HttpFileServer, ModelRunService};
use crate::run_id::RunId;
use crate::store::LocalFileStore;

use copier::{DirectoryCopier, SyncTotals};

/// Top-level driver for one synchronisation pass.
///
/// Pulls the canonical model-run list from the web service, diffs it against
/// the local mirror and applies the result. Owner normalisation (blank or
/// unrecognized owners replaced by a fallback user) happens upstream in the
/// web application; reconciliation identity is the run id alone.
pub struct Synchroniser {
    config: Config,
    service: ModelRunService,
    file_server: HttpFileServer,
    store: LocalFileStore,
}

impl Synchroniser {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            service: ModelRunService::new(&config.service)?,
            file_server: HttpFileServer::new(&config.file_server)?,
            store: LocalFileStore::new(&config.local),
            config,
        })
    }

    /// Run one pass. Local and remote state are re-derived from scratch;
    /// nothing is cached between passes.
    pub fn run(&self) -> Result<SyncTotals> {
        let model_runs = self.service.fetch_model_runs()?;
        let remote_ids: HashSet<RunId> = model_runs.iter().map(|r| r.run_id).collect();
        tracing::info!(count = remote_ids.len(), "model runs known to the service");

        let local_ids = self.store.scan_run_ids()?;
        tracing::info!(count = local_ids.len(), "run directories present locally");

        let reconciliation = reconciler::reconcile(&local_ids, &remote_ids);
        if reconciliation.is_empty() {
            tracing::info!("mirror already in step with the service");
        } else {
            tracing::info!(
                new = reconciliation.new_runs.len(),
                deleted = reconciliation.deleted_runs.len(),
                "reconciliation computed"
            );
        }

        let copier = DirectoryCopier::new(&self.file_server, &self.store, &self.config.local)?;
        let mut totals = copier.synchronise_all(&reconciliation)?;

        // Configured extra directories are mirrored once, when absent.
        for extra in &self.config.local.extra_directories {
            if !self.store.root().join(extra).exists() {
                tracing::info!(directory = %extra, "copying extra directory");
                totals.created += copier.copy_tree(extra)?;
            }
        }

        tracing::info!(
            created = totals.created,
            updated = totals.updated,
            deleted = totals.deleted,
            "synchronisation pass complete"
        );
        Ok(totals)
    }
}

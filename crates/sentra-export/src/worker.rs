//! Single-consumer export worker.

use crate::generator::ExportGenerator;
use sentra_types::ExportJobId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Spawn the background worker that drains the export queue.
///
/// Exactly one worker consumes the queue, so at most one job is in
/// processing at any time. Each job runs on the blocking pool since
/// collection and serialization are synchronous. The worker keeps only a
/// weak reference to the generator: dropping the last generator handle
/// drops the queue sender, which closes the queue and stops the worker.
pub fn spawn_worker(
    generator: &Arc<ExportGenerator>,
    mut queue: mpsc::Receiver<ExportJobId>,
) -> JoinHandle<()> {
    let generator = Arc::downgrade(generator);
    tokio::spawn(async move {
        while let Some(job_id) = queue.recv().await {
            let Some(generator) = generator.upgrade() else {
                break;
            };
            match tokio::task::spawn_blocking(move || generator.process_job(job_id)).await {
                Ok(Ok(true)) => debug!(%job_id, "export job processed"),
                Ok(Ok(false)) => debug!(%job_id, "export job skipped or failed"),
                Ok(Err(e)) => error!(%job_id, "export job errored: {}", e),
                Err(e) => error!(%job_id, "export worker task panicked: {}", e),
            }
        }
        debug!("export queue closed, worker stopping");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::{CollectorRegistry, StaticCollector};
    use crate::generator::{ExportConfig, ProcessingMode};
    use crate::job::{ExportFormat, ExportJobStatus};
    use crate::pdf::UnavailablePdfRenderer;
    use crate::storage::{BlobStorage, MemoryBlobStorage};
    use sentra_audit::AuditTrail;
    use sentra_catalog::TypeCatalog;
    use sentra_store::Store;
    use sentra_types::{DataCategory, RequestContext, UserId};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_processes_queued_jobs() {
        let store = Store::open_in_memory().unwrap();
        let catalog = Arc::new(TypeCatalog::builtin());
        let trail = Arc::new(AuditTrail::new(store.connection(), Arc::clone(&catalog)));
        let mut collectors = CollectorRegistry::new();
        collectors.register(Box::new(StaticCollector::new(
            DataCategory::Profile,
            json!({"name": "Mira"}),
        )));

        let (tx, rx) = mpsc::channel(8);
        let generator = Arc::new(ExportGenerator::new(
            store.connection(),
            catalog,
            trail,
            collectors,
            Arc::new(MemoryBlobStorage::new()) as Arc<dyn BlobStorage>,
            Arc::new(UnavailablePdfRenderer),
            ProcessingMode::Queued(tx),
            ExportConfig::default(),
        ));
        let handle = spawn_worker(&generator, rx);

        let user = UserId::new();
        let token = generator
            .request_export(
                user,
                ExportFormat::Json,
                vec![DataCategory::Profile],
                &RequestContext::background(),
            )
            .unwrap();

        // The worker picks the job up out of band; poll until it lands.
        let mut status = ExportJobStatus::Pending;
        for _ in 0..100 {
            status = generator.job_by_token(&token).unwrap().status;
            if !status.is_in_flight() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, ExportJobStatus::Completed);

        let download = generator.stream_export(user, &token).unwrap();
        assert_eq!(download.content_type, "application/json");

        drop(generator);
        handle.await.unwrap();
    }
}

mod queries;
mod service;

pub use service::NftScamService;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

use crate::lock::LockOutcome;
use crate::lock::Locker;
use crate::monitor::JobReport;
use crate::monitor::MonitorMessage;

const WORKER_ID: &str = "scam";

const VALIDATE_ALL_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Daily full scam-info reconciliation over all collections.
pub struct ScamUpdater {
    locker: Arc<Locker>,
    service: Arc<NftScamService>,
    monitor_tx: Sender<MonitorMessage>,
}

impl ScamUpdater {
    pub fn new(
        locker: Arc<Locker>,
        service: Arc<NftScamService>,
        monitor_tx: Sender<MonitorMessage>,
    ) -> Self {
        Self {
            locker,
            service,
            monitor_tx,
        }
    }

    #[tracing::instrument(name = "scam", skip_all)]
    pub async fn start(&self) {
        let mut validate_tick = tokio::time::interval(VALIDATE_ALL_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("got a ctrl-c message");
                    return;
                },
                _ = validate_tick.tick() => {
                    self.handle_validate_all_scam_info().await;
                },
            }
        }
    }

    pub async fn handle_validate_all_scam_info(&self) {
        let outcome = self
            .locker
            .lock("updateAllNftsScamInfos", true, || async {
                self.service.validate_or_update_all().await
            })
            .await;
        match outcome {
            Ok(LockOutcome::Completed((processed, failed))) => {
                self.monitor_tx
                    .send(MonitorMessage::Job(JobReport::new(
                        "updateAllNftsScamInfos",
                        processed,
                        failed,
                    )))
                    .await
                    .unwrap();
            }
            Ok(LockOutcome::Skipped) => (),
            Err(e) => tracing::error!("[{WORKER_ID}] updateAllNftsScamInfos failed: {e}"),
        }
    }
}

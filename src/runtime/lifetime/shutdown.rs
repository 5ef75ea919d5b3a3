use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::postback::DispatchQueue;

/// 分发队列的关闭句柄
pub struct DispatchHandle {
    queue: Arc<DispatchQueue>,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
    grace: Duration,
}

impl DispatchHandle {
    pub fn new(
        queue: Arc<DispatchQueue>,
        shutdown_tx: watch::Sender<bool>,
        worker: JoinHandle<()>,
        grace: Duration,
    ) -> Self {
        Self {
            queue,
            shutdown_tx,
            worker,
            grace,
        }
    }

    /// 停止接收 → 通知分发器取消退避 → 在 grace 内等待队列排空
    pub async fn drain(self) {
        self.queue.stop_accepting();
        info!(
            "Stopping dispatch queue ({} pending, grace {:?})",
            self.queue.depth(),
            self.grace
        );

        if self.shutdown_tx.send(true).is_err() {
            debug!("Dispatch worker already stopped");
        }

        match timeout(self.grace, self.worker).await {
            Ok(Ok(())) => info!("Dispatch queue drained"),
            Ok(Err(e)) => error!("Dispatch worker failed during shutdown: {}", e),
            Err(_) => warn!(
                "Dispatch queue drain exceeded {:?}, {} postbacks abandoned",
                self.grace,
                self.queue.depth()
            ),
        }
    }
}

/// 等待 Ctrl+C
pub async fn listen_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, draining postbacks...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }
}

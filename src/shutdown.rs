//! Graceful shutdown coordination.
//!
//! Grounded on the teacher's `shutdown.rs`: a `CancellationToken` handed to
//! every spawned task, with the manager waiting on Ctrl-C and then joining
//! every registered handle under a timeout.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ShutdownManager {
    cancel_token: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            task_handles: Vec::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn register_task(&mut self, handle: JoinHandle<()>) {
        self.task_handles.push(handle);
    }

    /// Wait for Ctrl-C, then cancel every registered task and join them
    /// under a 10-second timeout.
    pub async fn wait_for_shutdown(mut self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {e}");
            return;
        }

        tracing::info!("shutdown signal received");
        self.cancel_token.cancel();

        let timeout = tokio::time::Duration::from_secs(10);
        let shutdown_tasks = std::pin::pin!(async {
            for handle in self.task_handles.drain(..) {
                let _ = handle.await;
            }
        });

        match tokio::time::timeout(timeout, shutdown_tasks).await {
            Ok(_) => tracing::info!("all tasks shut down gracefully"),
            Err(_) => tracing::warn!("shutdown timeout: some tasks did not complete"),
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

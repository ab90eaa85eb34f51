//! Cooperative stop signal for the probe loop.
//!
//! `main.rs` triggers it from Ctrl-C; tests trigger it directly.

use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Request shutdown and wake all waiters.
    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent `request` is not missed.
        notified.as_mut().enable();
        if self.is_requested() {
            return;
        }
        notified.await;
    }

    /// Requests shutdown once `signal` resolves, e.g. `tokio::signal::ctrl_c()`.
    /// A signal that fails to install is logged and leaves the loop running.
    pub fn trigger_on<F>(&self, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match signal.await {
                Ok(()) => {
                    info!("Shutdown signal received. Stopping probe loop...");
                    shutdown.request();
                }
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        })
    }
}

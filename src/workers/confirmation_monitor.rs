//! Chain confirmation monitor
//!
//! The settlement core owns no timer: a chain payment left PROCESSING is
//! re-checked whenever someone calls the confirm operation again. This worker
//! is that someone — a cancellable loop that picks up open chain payments
//! with a recorded transaction hash and drives the confirm step until they
//! reach a terminal state or leave the monitoring window.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::PaymentMethod;
use crate::services::PaymentLifecycle;

#[derive(Debug, Clone)]
pub struct ConfirmationMonitorConfig {
    /// How often the worker wakes up to poll the chain.
    pub poll_interval: Duration,
}

impl Default for ConfirmationMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
        }
    }
}

impl ConfirmationMonitorConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.poll_interval = Duration::from_secs(
            std::env::var("CONFIRMATION_POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.poll_interval.as_secs()),
        );
        cfg
    }
}

pub struct ConfirmationMonitorWorker {
    lifecycle: Arc<PaymentLifecycle>,
    config: ConfirmationMonitorConfig,
}

impl ConfirmationMonitorWorker {
    pub fn new(lifecycle: Arc<PaymentLifecycle>, config: ConfirmationMonitorConfig) -> Self {
        Self { lifecycle, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "chain confirmation monitor started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("chain confirmation monitor stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.run_cycle().await {
                        warn!(error = %e, "confirmation monitor cycle failed");
                    }
                }
            }
        }

        info!("chain confirmation monitor stopped");
    }

    /// One poll cycle. A single bad payment never aborts the cycle.
    async fn run_cycle(&self) -> anyhow::Result<()> {
        let pending = self.lifecycle.get_pending_payments().await?;

        let candidates: Vec<_> = pending
            .into_iter()
            .filter(|p| p.method() == PaymentMethod::Chain)
            .filter_map(|p| {
                let tx_hash = p.transaction_reference()?.to_string();
                Some((p.id().to_string(), tx_hash, p.status()))
            })
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }

        info!(count = candidates.len(), "re-checking unconfirmed chain payments");

        // Up to a few payments in flight at once; per-payment locks in the
        // coordinator keep each one serialized with foreground requests.
        let results: Vec<_> = stream::iter(candidates)
            .map(|(payment_id, tx_hash, previous_status)| {
                let lifecycle = self.lifecycle.clone();
                async move {
                    let result = lifecycle.confirm_chain(&payment_id, &tx_hash).await;
                    (payment_id, tx_hash, previous_status, result)
                }
            })
            .buffer_unordered(4)
            .collect()
            .await;

        for (payment_id, tx_hash, previous_status, result) in results {
            match result {
                Ok(updated) => {
                    if updated.status() != previous_status {
                        info!(
                            payment_id = %updated.id(),
                            status = %updated.status(),
                            "chain payment advanced"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        payment_id = %payment_id,
                        tx_hash = %tx_hash,
                        error = %e,
                        "confirmation re-check failed"
                    );
                }
            }
        }

        Ok(())
    }
}

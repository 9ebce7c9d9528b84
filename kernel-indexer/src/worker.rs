use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use eyre::{Context, Result};
use kernel_types::ChainId;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{error, info, warn};

use crate::{
    metrics::{Metrics, EVENTS_PROCESSED, EVENT_FAILURES, LAST_PROCESSED_BLOCK},
    ChainEvent, ProcessError,
};

pub trait EventHandler {
    /// Processes `event` atomically. Returns the number of writes applied.
    async fn handle(&self, event: &ChainEvent) -> Result<usize, ProcessError>;
}

/// Redelivery of a failed event.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Attempts per event before the chain halts. 0 retries forever
    #[serde(default)]
    pub max_attempts: usize,
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_attempts: 0,
        }
    }
}

/// Consumes one chain's events strictly in order. An event is redelivered
/// until it succeeds, so a later event never runs before an earlier one.
/// Returns once the channel closes, or with an error when an event exhausts
/// its attempts.
pub async fn run_chain_worker<H: EventHandler>(
    chain_id: ChainId,
    mut events: mpsc::Receiver<ChainEvent>,
    handler: H,
    retry: RetryConfig,
    metrics: Metrics,
) -> Result<()> {
    info!(chain_id, "chain worker started");

    while let Some(event) = events.recv().await {
        let num_writes = handle_with_retry(chain_id, &event, &handler, &retry, &metrics)
            .await
            .wrap_err_with(|| {
                format!(
                    "chain {chain_id} halted at {} in block {} log {}",
                    event.name(),
                    event.log().block_number,
                    event.log().log_index
                )
            })?;

        metrics.inc_chain_counter(EVENTS_PROCESSED, chain_id);
        metrics.chain_gauge(LAST_PROCESSED_BLOCK, chain_id, event.log().block_number);
        info!(
            chain_id,
            event = event.name(),
            block_number = event.log().block_number,
            log_index = event.log().log_index,
            num_writes,
            "event processed"
        );
    }

    info!(chain_id, "event stream closed, chain worker stopping");
    Ok(())
}

/// Delays between attempts at one event before jitter: `backoff_ms * 2^n`,
/// capped at `max_backoff_ms`.
fn backoff_schedule(retry: &RetryConfig) -> impl Iterator<Item = Duration> {
    let retries = match retry.max_attempts {
        0 => usize::MAX,
        n => n - 1,
    };
    ExponentialBackoff::from_millis(2)
        .factor(retry.backoff_ms)
        .max_delay(Duration::from_millis(retry.max_backoff_ms))
        .take(retries)
}

async fn handle_with_retry<H: EventHandler>(
    chain_id: ChainId,
    event: &ChainEvent,
    handler: &H,
    retry: &RetryConfig,
    metrics: &Metrics,
) -> Result<usize, ProcessError> {
    let strategy = backoff_schedule(retry).map(jitter);

    let attempts = AtomicUsize::new(0);
    RetryIf::spawn(
        strategy,
        || {
            attempts.fetch_add(1, Ordering::Relaxed);
            handler.handle(event)
        },
        |err: &ProcessError| {
            metrics.inc_chain_counter(EVENT_FAILURES, chain_id);
            let attempt = attempts.load(Ordering::Relaxed);
            if err.needs_operator() {
                error!(
                    chain_id,
                    event = event.name(),
                    block_number = event.log().block_number,
                    attempt,
                    ?err,
                    "event failed, needs operator attention"
                );
            } else {
                warn!(
                    chain_id,
                    event = event.name(),
                    block_number = event.log().block_number,
                    attempt,
                    ?err,
                    "event failed, redelivering"
                );
            }
            true
        },
    )
    .await
}

//! Polls `eth_getLogs` for the deployment's contracts and feeds the decoded
//! events, merged with the synthesized genesis events, into a chain's worker
//! in ascending position order. No reorg handling: `confirmations` keeps the
//! poller that many blocks behind the head.

use std::{collections::HashMap, time::Duration};

use alloy_primitives::U64;
use alloy_rpc_client::ReqwestClient;
use alloy_rpc_types_eth::{Filter, Log};
use eyre::{bail, Context, Result};
use kernel_chain_config::ChainDeployment;
use kernel_types::ChainId;
use serde::Deserialize;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    metrics::{Metrics, LOGS_FETCHED, SOURCE_HEAD_BLOCK},
    ChainEvent,
};

#[derive(Debug, Clone)]
pub struct LogSourceConfig {
    pub start_block: u64,
    pub batch_size: u64,
    pub confirmations: u64,
    pub poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: U64,
}

pub struct LogSource {
    client: ReqwestClient,
    deployment: &'static ChainDeployment,
    config: LogSourceConfig,
    metrics: Metrics,
}

impl LogSource {
    pub fn new(
        client: ReqwestClient,
        deployment: &'static ChainDeployment,
        config: LogSourceConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            client,
            deployment,
            config,
            metrics,
        }
    }

    fn chain_id(&self) -> ChainId {
        self.deployment.chain_id
    }

    /// Runs until the receiving worker goes away.
    pub async fn run(self, events: mpsc::Sender<ChainEvent>) -> Result<()> {
        let chain_id = self.chain_id();
        let mut genesis = ChainEvent::genesis(self.deployment);
        genesis.retain(|event| event.log().block_number >= self.config.start_block);
        let mut next_block = self.config.start_block;

        info!(chain_id, next_block, "log source started");
        loop {
            let head = match self.safe_head().await {
                Ok(head) => head,
                Err(err) => {
                    warn!(chain_id, ?err, "failed to query chain head");
                    sleep(self.config.poll_interval).await;
                    continue;
                }
            };
            self.metrics.chain_gauge(SOURCE_HEAD_BLOCK, chain_id, head);

            if head < next_block {
                debug!(chain_id, head, next_block, "nothing to fetch");
                sleep(self.config.poll_interval).await;
                continue;
            }

            let to_block = head.min(next_block + self.config.batch_size.max(1) - 1);
            let batch = match self.fetch_batch(next_block, to_block, &genesis).await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(
                        chain_id,
                        from_block = next_block,
                        to_block,
                        ?err,
                        "failed to fetch logs"
                    );
                    sleep(self.config.poll_interval).await;
                    continue;
                }
            };
            self.metrics
                .chain_counter(LOGS_FETCHED, chain_id, batch.len() as u64);

            genesis.retain(|event| event.log().block_number > to_block);

            for event in batch {
                if events.send(event).await.is_err() {
                    info!(chain_id, "worker gone, log source stopping");
                    return Ok(());
                }
            }
            next_block = to_block + 1;
        }
    }

    async fn safe_head(&self) -> Result<u64> {
        let head = self
            .client
            .request::<&[u8], U64>("eth_blockNumber", &[])
            .await
            .wrap_err("eth_blockNumber failed")?;
        Ok(head.to::<u64>().saturating_sub(self.config.confirmations))
    }

    /// Logs of `[from_block, to_block]` merged with the synthesized events
    /// that fall into the range.
    async fn fetch_batch(
        &self,
        from_block: u64,
        to_block: u64,
        genesis: &[ChainEvent],
    ) -> Result<Vec<ChainEvent>> {
        let mut due = Vec::new();
        for event in genesis {
            if event.log().block_number > to_block {
                continue;
            }
            let mut event = event.clone();
            // zero marks a deployment whose timestamp is not on record
            if event.log().timestamp == 0 {
                let timestamp = self.block_timestamp(event.log().block_number).await?;
                event.log_mut().timestamp = timestamp;
            }
            due.push(event);
        }
        let batch = self.fetch_range(from_block, to_block).await?;
        Ok(merge(due, batch))
    }

    /// Decoded events of `[from_block, to_block]` in position order.
    pub async fn fetch_range(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>> {
        let filter = Filter::new()
            .address(vec![
                self.deployment.kernel.address,
                self.deployment.roles.address,
                self.deployment.roles_admin.address,
            ])
            .from_block(from_block)
            .to_block(to_block);
        let logs: Vec<Log> = self
            .client
            .request("eth_getLogs", (filter,))
            .await
            .wrap_err_with(|| format!("eth_getLogs {from_block}..={to_block} failed"))?;
        debug!(
            chain_id = self.chain_id(),
            from_block,
            to_block,
            num_logs = logs.len(),
            "fetched logs"
        );

        let mut timestamps = HashMap::new();
        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            if log.removed {
                continue;
            }
            let Some(block_number) = log.block_number else {
                bail!("pending log in range {from_block}..={to_block}");
            };
            let cached = timestamps.get(&block_number).copied();
            let timestamp = match log.block_timestamp.or(cached) {
                Some(timestamp) => timestamp,
                None => {
                    let timestamp = self.block_timestamp(block_number).await?;
                    timestamps.insert(block_number, timestamp);
                    timestamp
                }
            };
            if let Some(event) = ChainEvent::from_log(self.deployment, log, timestamp)? {
                events.push(event);
            }
        }
        events.sort_by_key(ChainEvent::position);
        Ok(events)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        let header: BlockHeader = self
            .client
            .request("eth_getBlockByNumber", (format!("{block_number:#x}"), false))
            .await
            .wrap_err_with(|| format!("eth_getBlockByNumber {block_number} failed"))?;
        Ok(header.timestamp.to::<u64>())
    }
}

/// Interleaves synthesized events into a sorted batch. A synthesized event
/// goes first among events at the same position.
fn merge(synthesized: Vec<ChainEvent>, batch: Vec<ChainEvent>) -> Vec<ChainEvent> {
    let mut events = batch;
    events.extend(synthesized);
    events.sort_by_key(ChainEvent::sort_key);
    events
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;
    use crate::processor::testutil::log;

    #[test]
    fn test_merge_places_genesis_first_on_ties() {
        let genesis = ChainEvent::KernelGenesis {
            log: log(10, 0),
            kernel: Address::ZERO,
        };
        let same_position = ChainEvent::NewAdminPulled {
            log: log(10, 0),
            new_admin: Address::ZERO,
        };
        let earlier = ChainEvent::NewAdminPulled {
            log: log(9, 4),
            new_admin: Address::ZERO,
        };
        let later = ChainEvent::NewAdminPulled {
            log: log(10, 1),
            new_admin: Address::ZERO,
        };

        let merged = merge(
            vec![genesis.clone()],
            vec![earlier.clone(), same_position.clone(), later.clone()],
        );
        assert_eq!(merged, vec![earlier, genesis, same_position, later]);
    }
}

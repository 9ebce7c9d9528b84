#![allow(async_fn_in_trait)]

//! Indexes kernel actions, role changes and admin transfers of a
//! kernel/module/policy deployment into the governance view of
//! `kernel-store`. One worker per chain processes that chain's events in
//! order.

mod abi;
pub mod chain;
pub mod config;
pub mod error;
pub mod event;
pub mod log_source;
pub mod metrics;
pub mod processor;
pub mod worker;

pub use self::{
    chain::{ChainReadError, ChainReader, RpcChainReader},
    config::{CacheConfig, ChainConfig, IndexerConfig},
    error::ProcessError,
    event::{ChainEvent, DecodeError},
    log_source::{LogSource, LogSourceConfig},
    metrics::Metrics,
    processor::EventProcessor,
    worker::{run_chain_worker, EventHandler, RetryConfig},
};

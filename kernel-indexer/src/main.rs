use std::time::Duration;

use clap::Parser;
use eyre::{bail, Context, Result};
use kernel_chain_config::ChainDeployment;
use kernel_indexer::{
    run_chain_worker, ChainConfig, EventProcessor, IndexerConfig, LogSource, Metrics,
    RetryConfig, RpcChainReader,
};
use kernel_metadata::{
    CacheStorageErased, EtherscanClient, FsStorage, MemoryStorage, MetadataCache,
};
use kernel_store::{run_migrations, PgStore};
use tokio::{sync::mpsc, task::JoinSet};
use tracing::{info, Level};
use tracing_subscriber::{filter::Directive, EnvFilter};

mod cli;

type Cache = MetadataCache<CacheStorageErased, EtherscanClient>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Directive::from(Level::INFO))
                .from_env_lossy(),
        )
        .init();

    let args = cli::Cli::parse();
    let config = IndexerConfig::load(&args.config)?;
    info!(config = %args.config.display(), chains = ?config.chain_ids(), "starting kernel-indexer");

    let database_url = args.database_url.clone();
    tokio::task::spawn_blocking(move || run_migrations(&database_url))
        .await
        .wrap_err("migration task panicked")??;
    if args.migrate_only {
        return Ok(());
    }

    let metrics = Metrics::new(
        args.otel_endpoint.as_deref(),
        "kernel-indexer",
        Duration::from_secs(15),
    )?;
    let store = PgStore::connect(&args.database_url, config.database_pool_size).await?;

    let storage = match &config.cache.dir {
        Some(dir) => CacheStorageErased::from(FsStorage::new(dir.clone()).await?),
        None => CacheStorageErased::from(MemoryStorage::new()),
    };
    let explorer = EtherscanClient::new(&config.explorer, &config.chain_ids())?;
    let cache = MetadataCache::new(storage, explorer, config.cache.ttl());

    let mut tasks = JoinSet::new();
    for chain in &config.chains {
        spawn_chain(
            &mut tasks,
            chain,
            store.clone(),
            cache.clone(),
            config.retry.clone(),
            metrics.clone(),
        )?;
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(err) => bail!("chain task panicked: {err}"),
        }
    }
    Ok(())
}

fn spawn_chain(
    tasks: &mut JoinSet<Result<()>>,
    chain: &ChainConfig,
    store: PgStore,
    cache: Cache,
    retry: RetryConfig,
    metrics: Metrics,
) -> Result<()> {
    let chain_id = chain.chain_id;
    let deployment = ChainDeployment::for_chain(chain_id)?;
    let reader = RpcChainReader::new(&chain.rpc_url()?)
        .wrap_err_with(|| format!("rpc client for chain {chain_id}"))?;

    let source_config = chain.log_source_config(deployment);
    info!(
        chain_id,
        kernel = %deployment.kernel.address,
        start_block = source_config.start_block,
        "indexing chain"
    );

    let (tx, rx) = mpsc::channel(chain.channel_capacity.max(1));
    let source = LogSource::new(
        reader.client().clone(),
        deployment,
        source_config,
        metrics.clone(),
    );
    let processor = EventProcessor::new(store, reader, cache);

    tasks.spawn(source.run(tx));
    tasks.spawn(run_chain_worker(chain_id, rx, processor, retry, metrics));
    Ok(())
}

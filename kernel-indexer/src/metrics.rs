use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use eyre::Result;
use kernel_types::ChainId;
use opentelemetry::{
    metrics::{Counter, Gauge, Meter, MeterProvider},
    KeyValue,
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{SdkMeterProvider, Temporality};

pub const EVENTS_PROCESSED: &str = "kernel_indexer_events_processed";
pub const EVENT_FAILURES: &str = "kernel_indexer_event_failures";
pub const LAST_PROCESSED_BLOCK: &str = "kernel_indexer_last_processed_block";
pub const LOGS_FETCHED: &str = "kernel_indexer_logs_fetched";
pub const SOURCE_HEAD_BLOCK: &str = "kernel_indexer_source_head_block";

/// Cloneable metrics handle. [`Metrics::none`] records nothing.
#[derive(Clone)]
pub struct Metrics(Option<Arc<MetricsInner>>);

struct MetricsInner {
    gauges: DashMap<&'static str, Gauge<u64>>,
    counters: DashMap<&'static str, Counter<u64>>,
    _provider: SdkMeterProvider,
    meter: Meter,
}

impl Metrics {
    pub fn new(
        otel_endpoint: Option<impl AsRef<str>>,
        service_name: impl Into<String>,
        interval: Duration,
    ) -> Result<Metrics> {
        let provider = build_otel_meter_provider(otel_endpoint, service_name.into(), interval)?;
        let meter = provider.meter("opentelemetry");

        Ok(Metrics(Some(Arc::new(MetricsInner {
            gauges: DashMap::with_capacity(16),
            counters: DashMap::with_capacity(16),
            _provider: provider,
            meter,
        }))))
    }

    pub fn none() -> Metrics {
        Metrics(None)
    }

    pub fn inc_chain_counter(&self, metric: &'static str, chain_id: ChainId) {
        self.chain_counter(metric, chain_id, 1);
    }

    pub fn chain_counter(&self, metric: &'static str, chain_id: ChainId, val: u64) {
        self.counter_with_attrs(metric, val, &[chain_attr(chain_id)]);
    }

    pub fn chain_gauge(&self, metric: &'static str, chain_id: ChainId, value: u64) {
        self.gauge_with_attrs(metric, value, &[chain_attr(chain_id)]);
    }

    pub fn counter_with_attrs(&self, metric: &'static str, val: u64, attributes: &[KeyValue]) {
        if let Some(inner) = &self.0 {
            let counter = inner
                .counters
                .entry(metric)
                .or_insert_with(|| inner.meter.u64_counter(metric).build());

            counter.add(val, attributes)
        }
    }

    pub fn gauge_with_attrs(&self, metric: &'static str, value: u64, attributes: &[KeyValue]) {
        if let Some(inner) = &self.0 {
            let gauge = inner
                .gauges
                .entry(metric)
                .or_insert_with(|| inner.meter.u64_gauge(metric).build());
            gauge.record(value, attributes);
        }
    }
}

fn chain_attr(chain_id: ChainId) -> KeyValue {
    KeyValue::new("chain_id", chain_id as i64)
}

fn build_otel_meter_provider(
    otel_endpoint: Option<impl AsRef<str>>,
    service_name: String,
    interval: Duration,
) -> Result<SdkMeterProvider> {
    let mut provider_builder = SdkMeterProvider::builder().with_resource(
        opentelemetry_sdk::Resource::builder_empty()
            .with_attributes(vec![KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                service_name,
            )])
            .build(),
    );

    if let Some(otel_endpoint) = otel_endpoint {
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_temporality(Temporality::default())
            .with_timeout(interval * 2)
            .with_endpoint(otel_endpoint.as_ref())
            .build()?;

        let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
            .with_interval(interval / 2)
            .build();

        provider_builder = provider_builder.with_reader(reader)
    }

    Ok(provider_builder.build())
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capture helpers for asserting on emitted logs and metrics.

use std::io::Write;
use std::sync::Arc;

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, Metric, MetricData, ResourceMetrics, ScopeMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

/// Collects metrics into memory for inspection.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    pub(crate) fn new() -> Self {
        let in_memory = InMemoryMetricExporter::default();

        Self {
            exporter: in_memory.clone(),
            provider: SdkMeterProvider::builder().with_periodic_exporter(in_memory).build(),
        }
    }

    pub(crate) fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Returns `(metric name, attributes)` for every exported data point.
    pub(crate) fn collect(&self) -> Vec<(String, Vec<KeyValue>)> {
        self.provider.force_flush().unwrap();
        self.exporter
            .get_finished_metrics()
            .unwrap()
            .iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(ScopeMetrics::metrics)
            .flat_map(|metric| {
                let name = metric.name().to_string();
                data_point_attributes(metric).into_iter().map(move |attrs| (name.clone(), attrs))
            })
            .collect()
    }

    pub(crate) fn assert_attributes_contain(&self, metric_name: &str, key_values: &[KeyValue]) {
        let collected = self.collect();
        let matching = collected
            .iter()
            .filter(|(name, _)| name == metric_name)
            .any(|(_, attrs)| key_values.iter().all(|kv| attrs.contains(kv)));

        assert!(
            matching,
            "no data point of {metric_name} carries {key_values:?}, collected: {collected:?}"
        );
    }
}

fn data_point_attributes(metric: &Metric) -> Vec<Vec<KeyValue>> {
    macro_rules! points {
        ($data:expr) => {
            match $data {
                MetricData::Gauge(data) => data.data_points().map(|p| p.attributes().cloned().collect()).collect(),
                MetricData::Sum(data) => data.data_points().map(|p| p.attributes().cloned().collect()).collect(),
                MetricData::Histogram(data) => data.data_points().map(|p| p.attributes().cloned().collect()).collect(),
                MetricData::ExponentialHistogram(data) => data.data_points().map(|p| p.attributes().cloned().collect()).collect(),
            }
        };
    }

    match metric.data() {
        AggregatedMetrics::F64(data) => points!(data),
        AggregatedMetrics::U64(data) => points!(data),
        AggregatedMetrics::I64(data) => points!(data),
    }
}

/// Captures formatted `tracing` output.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).to_string()
    }

    pub(crate) fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + use<> {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_writer(self.clone())
                .with_ansi(false),
        )
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

pub(crate) struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

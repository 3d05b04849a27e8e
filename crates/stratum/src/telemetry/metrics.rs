// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::{
    InstrumentationScope,
    metrics::{Counter, Gauge, Histogram, Meter, MeterProvider},
};

const METER_NAME: &str = "stratum";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";
const LOOKUP_EVENT_COUNT_NAME: &str = "lookup.event.count";
const LOOKUP_OPERATION_DURATION_NAME: &str = "lookup.operation.duration";
const LOOKUP_LOCAL_SIZE_NAME: &str = "lookup.local.size";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

pub(crate) fn create_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter(LOOKUP_EVENT_COUNT_NAME)
        .with_description("Lookup events per tier")
        .with_unit("{event}")
        .build()
}

pub(crate) fn create_operation_duration_histogram(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram(LOOKUP_OPERATION_DURATION_NAME)
        .with_description("Duration of tier operations during a lookup")
        .with_unit("s")
        .build()
}

pub(crate) fn create_local_size_gauge(meter: &Meter) -> Gauge<u64> {
    meter
        .u64_gauge(LOOKUP_LOCAL_SIZE_NAME)
        .with_description("Number of entries in the local tier")
        .with_unit("{entry}")
        .build()
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lookup telemetry.
//!
//! Every tier outcome of a lookup is reported once: as a `tracing` event when logs are
//! enabled, and as OpenTelemetry measurements when the `metrics` feature is enabled and a
//! meter provider is configured.

use std::fmt;
use std::time::Duration;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Gauge, Histogram, MeterProvider},
};

use crate::ItemKey;

pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Telemetry sink for a [`CacheCoordinator`](crate::CacheCoordinator).
///
/// The default reports every tier outcome as a `tracing` event and records no metrics.
///
/// # Examples
///
/// ```
/// use stratum::LookupTelemetry;
///
/// let quiet = LookupTelemetry::new().with_logs(false);
/// # let _ = quiet;
/// ```
#[derive(Clone, Debug)]
pub struct LookupTelemetry {
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    event_counter: Option<Counter<u64>>,
    #[cfg(any(feature = "metrics", test))]
    operation_duration: Option<Histogram<f64>>,
    #[cfg(any(feature = "metrics", test))]
    local_size: Option<Gauge<u64>>,
}

impl Default for LookupTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupTelemetry {
    /// Creates telemetry with logs enabled and no metrics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            logs_enabled: true,
            #[cfg(any(feature = "metrics", test))]
            event_counter: None,
            #[cfg(any(feature = "metrics", test))]
            operation_duration: None,
            #[cfg(any(feature = "metrics", test))]
            local_size: None,
        }
    }

    /// Enables or disables `tracing` events.
    #[must_use]
    pub fn with_logs(mut self, enabled: bool) -> Self {
        self.logs_enabled = enabled;
        self
    }

    /// Records lookup metrics through meters obtained from `provider`.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn with_metrics(mut self, provider: &dyn MeterProvider) -> Self {
        let meter = metrics::create_meter(provider);
        self.event_counter = Some(metrics::create_event_counter(&meter));
        self.operation_duration = Some(metrics::create_operation_duration_histogram(&meter));
        self.local_size = Some(metrics::create_local_size_gauge(&meter));
        self
    }

    /// Returns `true` if `tracing` events are emitted.
    #[must_use]
    pub fn logs_enabled(&self) -> bool {
        self.logs_enabled
    }

    pub(crate) fn record(&self, tier: Tier, activity: Activity, key: &ItemKey, duration: Option<Duration>) {
        self.record_with(tier, activity, key, duration, None);
    }

    pub(crate) fn record_error(
        &self,
        tier: Tier,
        activity: Activity,
        key: &ItemKey,
        duration: Option<Duration>,
        error: &dyn fmt::Display,
    ) {
        self.record_with(tier, activity, key, duration, Some(error));
    }

    fn record_with(
        &self,
        tier: Tier,
        activity: Activity,
        key: &ItemKey,
        duration: Option<Duration>,
        error: Option<&dyn fmt::Display>,
    ) {
        #[cfg(any(feature = "metrics", test))]
        {
            let attrs = [
                KeyValue::new(attributes::LOOKUP_TIER_NAME, tier.as_str()),
                KeyValue::new(attributes::LOOKUP_ACTIVITY_NAME, activity.as_str()),
            ];

            if let Some(counter) = &self.event_counter {
                counter.add(1, &attrs);
            }

            if let (Some(duration), Some(histogram)) = (duration, &self.operation_duration) {
                histogram.record(duration.as_secs_f64(), &attrs);
            }
        }

        if self.logs_enabled {
            Self::emit(tier, activity, key, duration, error);
        }
    }

    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, reason = "size is only reported as a metric")
    )]
    pub(crate) fn record_local_size(&self, size: usize) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(gauge) = &self.local_size {
            gauge.record(size as u64, &[]);
        }
    }

    fn emit(tier: Tier, activity: Activity, key: &ItemKey, duration: Option<Duration>, error: Option<&dyn fmt::Display>) {
        let tier_name = tier.as_str();
        let activity_name = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());
        let error = error.map(tracing::field::display);

        // Tracing levels must be constant, so the level is selected by macro.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    lookup.tier = tier_name,
                    lookup.activity = activity_name,
                    item.key = %key,
                    lookup.duration_ns = ?duration_ns,
                    error = error,
                    "lookup.event"
                )
            };
        }

        match activity.severity(tier) {
            Severity::Error => emit_event!(error),
            Severity::Warn => emit_event!(warn),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}

/// The tier an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tier {
    Local,
    Distributed,
    Canonical,
}

impl Tier {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Distributed => "distributed",
            Self::Canonical => "canonical",
        }
    }
}

/// What happened at a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activity {
    Hit,
    Miss,
    Backfill,
    BackfillFailed,
    Malformed,
    TimedOut,
    Error,
    NotFound,
    Coalesced,
    Evicted,
    Invalidated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Activity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "lookup.hit",
            Self::Miss => "lookup.miss",
            Self::Backfill => "lookup.backfill",
            Self::BackfillFailed => "lookup.backfill_failed",
            Self::Malformed => "lookup.malformed",
            Self::TimedOut => "lookup.timed_out",
            Self::Error => "lookup.error",
            Self::NotFound => "lookup.not_found",
            Self::Coalesced => "lookup.coalesced",
            Self::Evicted => "lookup.evicted",
            Self::Invalidated => "lookup.invalidated",
        }
    }

    /// Canonical failures reach the caller and are errors; everywhere else a fault is absorbed.
    fn severity(self, tier: Tier) -> Severity {
        match self {
            Self::Hit | Self::Miss => Severity::Debug,
            Self::Backfill | Self::NotFound | Self::Coalesced | Self::Evicted | Self::Invalidated => Severity::Info,
            Self::TimedOut | Self::Error if tier == Tier::Canonical => Severity::Error,
            Self::BackfillFailed | Self::Malformed | Self::TimedOut | Self::Error => Severity::Warn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{LogCapture, MetricTester};
    use super::*;

    fn key() -> ItemKey {
        ItemKey::from(1)
    }

    #[test]
    fn tier_as_str() {
        assert_eq!(Tier::Local.as_str(), "local");
        assert_eq!(Tier::Distributed.as_str(), "distributed");
        assert_eq!(Tier::Canonical.as_str(), "canonical");
    }

    #[test]
    fn activity_as_str() {
        assert_eq!(Activity::Hit.as_str(), "lookup.hit");
        assert_eq!(Activity::Miss.as_str(), "lookup.miss");
        assert_eq!(Activity::Backfill.as_str(), "lookup.backfill");
        assert_eq!(Activity::BackfillFailed.as_str(), "lookup.backfill_failed");
        assert_eq!(Activity::Malformed.as_str(), "lookup.malformed");
        assert_eq!(Activity::TimedOut.as_str(), "lookup.timed_out");
        assert_eq!(Activity::Error.as_str(), "lookup.error");
        assert_eq!(Activity::NotFound.as_str(), "lookup.not_found");
        assert_eq!(Activity::Coalesced.as_str(), "lookup.coalesced");
        assert_eq!(Activity::Evicted.as_str(), "lookup.evicted");
        assert_eq!(Activity::Invalidated.as_str(), "lookup.invalidated");
    }

    #[test]
    fn severity_depends_on_tier_for_faults() {
        assert_eq!(Activity::Hit.severity(Tier::Local), Severity::Debug);
        assert_eq!(Activity::Miss.severity(Tier::Distributed), Severity::Debug);
        assert_eq!(Activity::Backfill.severity(Tier::Local), Severity::Info);
        assert_eq!(Activity::NotFound.severity(Tier::Canonical), Severity::Info);
        assert_eq!(Activity::Evicted.severity(Tier::Local), Severity::Info);
        assert_eq!(Activity::Error.severity(Tier::Distributed), Severity::Warn);
        assert_eq!(Activity::TimedOut.severity(Tier::Distributed), Severity::Warn);
        assert_eq!(Activity::Malformed.severity(Tier::Distributed), Severity::Warn);
        assert_eq!(Activity::BackfillFailed.severity(Tier::Distributed), Severity::Warn);
        assert_eq!(Activity::Error.severity(Tier::Canonical), Severity::Error);
        assert_eq!(Activity::TimedOut.severity(Tier::Canonical), Severity::Error);
    }

    #[test]
    fn logs_emit_contains_all_fields_and_values() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        LookupTelemetry::new().record(Tier::Distributed, Activity::Hit, &key(), Some(Duration::from_nanos(12_345)));

        capture.assert_contains(attributes::LOOKUP_TIER_NAME);
        capture.assert_contains(attributes::LOOKUP_ACTIVITY_NAME);
        capture.assert_contains(attributes::ITEM_KEY_NAME);
        capture.assert_contains(attributes::LOOKUP_DURATION_NAME);
        capture.assert_contains(attributes::LOOKUP_EVENT_NAME);

        capture.assert_contains("distributed");
        capture.assert_contains(Activity::Hit.as_str());
        capture.assert_contains("12345");
    }

    #[test]
    fn logs_emit_at_correct_severity_levels() {
        let telemetry = LookupTelemetry::new();

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        telemetry.record(Tier::Canonical, Activity::TimedOut, &key(), None);
        capture.assert_contains("ERROR");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        telemetry.record(Tier::Distributed, Activity::TimedOut, &key(), None);
        capture.assert_contains("WARN");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        telemetry.record(Tier::Local, Activity::Evicted, &key(), None);
        capture.assert_contains("INFO");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        telemetry.record(Tier::Local, Activity::Hit, &key(), None);
        capture.assert_contains("DEBUG");
    }

    #[test]
    fn error_detail_is_logged() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        LookupTelemetry::new().record_error(Tier::Distributed, Activity::Error, &key(), None, &"connection refused");

        capture.assert_contains("connection refused");
    }

    #[test]
    fn disabled_logs_emit_nothing() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let telemetry = LookupTelemetry::new().with_logs(false);
        assert!(!telemetry.logs_enabled());
        telemetry.record(Tier::Local, Activity::Hit, &key(), Some(Duration::from_secs(1)));

        assert!(capture.output().is_empty());
    }

    #[test]
    fn metrics_carry_tier_and_activity() {
        let tester = MetricTester::new();
        let telemetry = LookupTelemetry::new().with_logs(false).with_metrics(tester.meter_provider());

        telemetry.record(Tier::Canonical, Activity::NotFound, &key(), Some(Duration::from_millis(5)));

        let expected = [
            KeyValue::new(attributes::LOOKUP_TIER_NAME, "canonical"),
            KeyValue::new(attributes::LOOKUP_ACTIVITY_NAME, "lookup.not_found"),
        ];
        tester.assert_attributes_contain("lookup.event.count", &expected);
        tester.assert_attributes_contain("lookup.operation.duration", &expected);
    }

    #[test]
    fn local_size_is_recorded() {
        let tester = MetricTester::new();
        let telemetry = LookupTelemetry::new().with_metrics(tester.meter_provider());

        telemetry.record_local_size(3);

        let collected = tester.collect();
        assert!(collected.iter().any(|(name, _)| name == "lookup.local.size"), "{collected:?}");
    }
}

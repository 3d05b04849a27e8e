// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Field names must match the `tracing` fields in `LookupTelemetry::emit`.

#[cfg(any(feature = "metrics", test))]
pub(crate) const LOOKUP_TIER_NAME: &str = "lookup.tier";

#[cfg(any(feature = "metrics", test))]
pub(crate) const LOOKUP_ACTIVITY_NAME: &str = "lookup.activity";

#[cfg(test)]
pub(crate) const LOOKUP_EVENT_NAME: &str = "lookup.event";

#[cfg(test)]
pub(crate) const ITEM_KEY_NAME: &str = "item.key";

#[cfg(test)]
pub(crate) const LOOKUP_DURATION_NAME: &str = "lookup.duration_ns";

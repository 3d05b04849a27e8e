// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wire format of records held by the distributed tier.
//!
//! Records are stored as JSON objects with `id`, `name` and `price` fields.

use crate::ItemValue;

/// Serializes a record for the distributed tier.
///
/// # Errors
///
/// Returns an error if serialization fails, which does not happen for well-formed records.
pub fn encode(value: &ItemValue) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Deserializes a record read from the distributed tier.
///
/// # Errors
///
/// Returns an error if the payload is not a JSON record with a valid identifier.
pub fn decode(payload: &[u8]) -> Result<ItemValue, serde_json::Error> {
    serde_json::from_slice(payload)
}

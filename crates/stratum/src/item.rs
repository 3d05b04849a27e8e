// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Item identifiers and records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a string was rejected as an [`ItemKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidItemKey {
    /// The key was empty or only whitespace.
    #[error("item key is empty")]
    Empty,

    /// The key contained whitespace or control characters after trimming.
    #[error("item key {key:?} contains whitespace or control characters")]
    IllegalCharacter {
        /// The offending key, trimmed.
        key: String,
    },
}

/// The identifier of one record in the canonical store.
///
/// Keys are normalized on construction so that every spelling of the same identifier maps
/// to one cache slot: surrounding whitespace is trimmed and purely numeric identifiers lose
/// their leading zeros.
///
/// # Examples
///
/// ```
/// use stratum::ItemKey;
///
/// let a: ItemKey = " 007 ".parse()?;
/// let b = ItemKey::from(7u64);
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "7");
///
/// assert!("".parse::<ItemKey>().is_err());
/// assert!("lap top".parse::<ItemKey>().is_err());
/// # Ok::<(), stratum::InvalidItemKey>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawKey", into = "String")]
pub struct ItemKey(String);

impl ItemKey {
    /// Parses and normalizes a key.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidItemKey`] if the trimmed key is empty or contains whitespace or
    /// control characters.
    pub fn parse(raw: &str) -> Result<Self, InvalidItemKey> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidItemKey::Empty);
        }

        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(InvalidItemKey::IllegalCharacter { key: trimmed.to_owned() });
        }

        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let digits = trimmed.trim_start_matches('0');
            let canonical = if digits.is_empty() { "0" } else { digits };
            return Ok(Self(canonical.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the normalized key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ItemKey {
    type Err = InvalidItemKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ItemKey {
    type Error = InvalidItemKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ItemKey {
    type Error = InvalidItemKey;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<u64> for ItemKey {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<ItemKey> for String {
    fn from(value: ItemKey) -> Self {
        value.0
    }
}

/// Identifiers arrive either as JSON numbers or as JSON strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Number(u64),
    Text(String),
}

impl TryFrom<RawKey> for ItemKey {
    type Error = InvalidItemKey;

    fn try_from(value: RawKey) -> Result<Self, Self::Error> {
        match value {
            RawKey::Number(number) => Ok(Self::from(number)),
            RawKey::Text(text) => Self::parse(&text),
        }
    }
}

/// A record as held by the canonical store and cached by the faster tiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemValue {
    /// The record's identifier.
    pub id: ItemKey,
    /// The display name.
    pub name: String,
    /// The price in the smallest currency unit.
    pub price: u64,
}

impl ItemValue {
    /// Creates a record.
    #[must_use]
    pub fn new(id: impl Into<ItemKey>, name: impl Into<String>, price: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }
}

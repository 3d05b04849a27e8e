// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for tier operations.

use std::fmt;

/// The tier operation that raised an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operation {
    /// Opening a connection to the tier.
    Connect,
    /// [`CacheTier::get`](crate::CacheTier::get), or a canonical lookup.
    Get,
    /// [`CacheTier::insert`](crate::CacheTier::insert).
    Insert,
    /// [`CacheTier::invalidate`](crate::CacheTier::invalidate).
    Invalidate,
    /// [`CacheTier::clear`](crate::CacheTier::clear).
    Clear,
    /// [`CacheTier::remaining_ttl`](crate::CacheTier::remaining_ttl).
    RemainingTtl,
    /// The error was raised without naming an operation.
    Unspecified,
}

impl Operation {
    /// Returns the operation's name as it appears in error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Get => "get",
            Self::Insert => "insert",
            Self::Invalidate => "invalidate",
            Self::Clear => "clear",
            Self::RemainingTtl => "remaining_ttl",
            Self::Unspecified => "operation",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation and key an [`Error`] was raised for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    operation: Operation,
    key: Option<String>,
}

impl Context {
    /// Returns the failed operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the key the operation targeted, if it targeted one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl From<Operation> for Context {
    fn from(operation: Operation) -> Self {
        Self { operation, key: None }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} of {key}", self.operation),
            None => write!(f, "{}", self.operation),
        }
    }
}

/// An error from a tier operation.
///
/// The error names the operation that failed and, when there is one, the key it targeted.
/// The underlying cause (a refused connection, a protocol error, a failed canonical query)
/// is reachable through [`std::error::Error::source()`].
///
/// # Example
///
/// ```
/// use stratum_tier::error::{Error, Operation};
///
/// let error = Error::during(Operation::Get, "connection refused").for_key("item_1");
/// assert_eq!(error.operation(), Operation::Get);
/// assert_eq!(error.key(), Some("item_1"));
/// assert!(error.to_string().contains("get of item_1 failed"));
/// ```
#[ohno::error]
#[display("tier {context} failed")]
pub struct Error {
    context: Context,
}

impl Error {
    /// Creates an error for a failed `operation`.
    pub fn during(operation: Operation, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(Context::from(operation), cause)
    }

    /// Creates a new error from any type that can be converted to an error.
    ///
    /// The error does not name an operation; prefer [`Error::during`] inside a tier.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_tier::Error;
    ///
    /// let error = Error::from_message("operation failed");
    /// ```
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::during(Operation::Unspecified, cause)
    }

    /// Records the key the failed operation targeted.
    #[must_use]
    pub fn for_key(mut self, key: impl fmt::Display) -> Self {
        self.context.key = Some(key.to_string());
        self
    }

    /// Returns the operation and key the error was raised for.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the failed operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.context.operation
    }

    /// Returns the key the failed operation targeted, if it targeted one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.context.key()
    }
}

/// A specialized [`Result`] type for tier operations.
pub type Result<T> = std::result::Result<T, Error>;

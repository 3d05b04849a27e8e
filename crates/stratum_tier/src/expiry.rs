// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// What a tier knows about the remaining lifetime of a key.
///
/// Returned by [`CacheTier::remaining_ttl`](crate::CacheTier::remaining_ttl). A missing key
/// and a key without expiry are different answers: a copy of a missing key must not be
/// trusted at all, while a copy of a non-expiring key may be kept for as long as the
/// copier likes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// The tier holds no live entry for the key.
    Absent,
    /// The entry lives until it is removed.
    Never,
    /// The entry expires after the given duration.
    In(Duration),
    /// The tier does not track expiry.
    Unknown,
}

impl Expiry {
    /// Builds an answer from an optional remaining lifetime of a present entry.
    #[must_use]
    pub fn of_present(remaining: Option<Duration>) -> Self {
        remaining.map_or(Self::Never, Self::In)
    }

    /// Returns how long a copy of the entry may be trusted, capped at `limit`.
    ///
    /// Returns `None` when no copy may be kept: the entry is gone, has no time left, or the
    /// tier cannot tell.
    #[must_use]
    pub fn bound(self, limit: Duration) -> Option<Duration> {
        let ttl = match self {
            Self::Absent | Self::Unknown => return None,
            Self::Never => limit,
            Self::In(remaining) => remaining.min(limit),
        };
        (!ttl.is_zero()).then_some(ttl)
    }

    /// Returns `true` if the tier holds no live entry.
    #[must_use]
    pub fn is_absent(self) -> bool {
        self == Self::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn bound_clamps_to_remaining_lifetime() {
        assert_eq!(Expiry::In(Duration::from_secs(10)).bound(MINUTE), Some(Duration::from_secs(10)));
        assert_eq!(Expiry::In(Duration::from_secs(600)).bound(MINUTE), Some(MINUTE));
        assert_eq!(Expiry::Never.bound(MINUTE), Some(MINUTE));
    }

    #[test]
    fn bound_refuses_untrusted_copies() {
        assert_eq!(Expiry::Absent.bound(MINUTE), None);
        assert_eq!(Expiry::Unknown.bound(MINUTE), None);
        assert_eq!(Expiry::In(Duration::ZERO).bound(MINUTE), None);
    }

    #[test]
    fn of_present_distinguishes_no_expiry() {
        assert_eq!(Expiry::of_present(None), Expiry::Never);
        assert_eq!(Expiry::of_present(Some(MINUTE)), Expiry::In(MINUTE));
        assert!(Expiry::Absent.is_absent());
        assert!(!Expiry::Never.is_absent());
    }
}

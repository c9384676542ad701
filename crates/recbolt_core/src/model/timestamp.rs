//! Wall-clock timestamps with an explicit "unset" value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch. [`Timestamp::ZERO`] means "not set".
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The unset timestamp.
    pub const ZERO: Self = Self(0);

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos();
        Self(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Returns the current time, or one nanosecond past `previous` if the
    /// clock has not moved beyond it.
    #[must_use]
    pub fn now_after(previous: Self) -> Self {
        Self::now().max(Self(previous.0.saturating_add(1)))
    }

    /// Creates a timestamp from nanoseconds since the epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns nanoseconds since the epoch.
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Returns whether the timestamp is unset.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Converts to a `SystemTime`, or `None` if unset.
    #[must_use]
    pub fn to_system_time(&self) -> Option<SystemTime> {
        (!self.is_zero()).then(|| UNIX_EPOCH + Duration::from_nanos(self.0))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            f.write_str("Timestamp(zero)")
        } else {
            write!(f, "Timestamp({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_default_and_unset() {
        assert_eq!(Timestamp::default(), Timestamp::ZERO);
        assert!(Timestamp::ZERO.is_zero());
        assert!(Timestamp::ZERO.to_system_time().is_none());
        assert!(!Timestamp::now().is_zero());
    }

    #[test]
    fn now_after_is_strictly_later() {
        let far_future = Timestamp::from_nanos(u64::MAX - 10);
        assert_eq!(
            Timestamp::now_after(far_future),
            Timestamp::from_nanos(u64::MAX - 9)
        );

        let earlier = Timestamp::now();
        assert!(Timestamp::now_after(earlier) > earlier);
    }
}

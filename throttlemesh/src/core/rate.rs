//! Rate specification for the GCRA decision engine
//!
//! A [`Rate`] converts human-friendly specifications (e.g. "100 requests
//! per second") into the emission interval: the time cost of one unit of
//! quantity.

use std::time::Duration;

/// The rate at which capacity is replenished
///
/// A `Rate` encapsulates "N requests per time period" as the duration
/// between token emissions. One unit of quantity costs one period.
///
/// # Examples
///
/// ```
/// use throttlemesh::Rate;
/// use std::time::Duration;
///
/// // 10 requests per second
/// let rate = Rate::per_second(10);
/// assert_eq!(rate.period(), Duration::from_millis(100));
///
/// // 60 requests per minute (1 per second)
/// let rate = Rate::per_minute(60);
/// assert_eq!(rate.period(), Duration::from_secs(1));
///
/// // Custom rate: 1 request every 2.5 seconds
/// let rate = Rate::new(Duration::from_millis(2500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    period: Duration,
}

impl Rate {
    /// Creates a rate with a custom period between token emissions.
    ///
    /// `period` must be non-zero.
    pub fn new(period: Duration) -> Self {
        Rate { period }
    }

    /// Creates a rate of n requests per second. `n` must be non-zero.
    pub fn per_second(n: u32) -> Self {
        Rate {
            period: Duration::from_secs(1) / n,
        }
    }

    /// Creates a rate of n requests per minute. `n` must be non-zero.
    pub fn per_minute(n: u32) -> Self {
        Rate {
            period: Duration::from_secs(60) / n,
        }
    }

    /// Creates a rate of n requests per hour. `n` must be non-zero.
    pub fn per_hour(n: u32) -> Self {
        Rate {
            period: Duration::from_secs(3600) / n,
        }
    }

    /// Creates a rate of n requests per day. `n` must be non-zero.
    pub fn per_day(n: u32) -> Self {
        Rate {
            period: Duration::from_secs(86400) / n,
        }
    }

    /// Returns the emission interval of this rate: the duration one unit of
    /// quantity costs.
    pub fn period(&self) -> Duration {
        self.period
    }
}

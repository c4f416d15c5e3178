//! Utilization samples and the pure CPU-time arithmetic behind them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Cumulative CPU time consumed by the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTime {
    pub user: Duration,
    pub system: Duration,
}

impl CpuTime {
    pub fn new(user: Duration, system: Duration) -> Self {
        Self { user, system }
    }

    /// User plus system time.
    pub fn total(&self) -> Duration {
        self.user.saturating_add(self.system)
    }
}

/// CPU core-equivalents consumed per wall-clock second over one sampling window.
///
/// `1.0` means one hardware thread was busy for the whole window; multi-threaded
/// processes routinely report more. Negative or non-finite values mean the
/// measurement failed and are canonically represented by [`Self::UNAVAILABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtilizationSample(f64);

impl UtilizationSample {
    /// Sentinel published when a CPU-time query failed.
    pub const UNAVAILABLE: UtilizationSample = UtilizationSample(-1.0);

    pub fn new(cores: f64) -> Self {
        Self(cores)
    }

    /// Raw value, including the sentinel.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Measured core-equivalents, or `None` if the measurement failed.
    pub fn cores(self) -> Option<f64> {
        self.is_available().then_some(self.0)
    }

    pub fn is_available(self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }

    /// Whether this sample denies admission at `threshold`.
    ///
    /// An unavailable sample always exceeds: background work never runs on
    /// unreliable data.
    pub fn exceeds(self, threshold: f64) -> bool {
        match self.cores() {
            Some(cores) => cores > threshold,
            None => true,
        }
    }

    pub(crate) fn to_bits(self) -> u64 {
        self.0.to_bits()
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        Self(f64::from_bits(bits))
    }
}

impl From<f64> for UtilizationSample {
    fn from(cores: f64) -> Self {
        Self::new(cores)
    }
}

impl fmt::Display for UtilizationSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cores() {
            Some(cores) => write!(f, "{:.2}", cores),
            None => f.write_str("unavailable"),
        }
    }
}

/// Core-equivalents consumed between two CPU-time snapshots taken `wall` apart.
///
/// A counter that went backwards yields [`UtilizationSample::UNAVAILABLE`]; an
/// empty wall interval yields `0.0`.
pub fn utilization_between(before: CpuTime, after: CpuTime, wall: Duration) -> UtilizationSample {
    let Some(cpu) = after.total().checked_sub(before.total()) else {
        return UtilizationSample::UNAVAILABLE;
    };
    if wall.is_zero() {
        return UtilizationSample::new(0.0);
    }
    UtilizationSample::new(cpu.as_secs_f64() / wall.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_utilization_matches_cpu_over_wall() {
        let before = CpuTime::new(ms(1_000), ms(200));
        let after = CpuTime::new(ms(1_100), ms(250));
        let sample = utilization_between(before, after, ms(100));
        assert!((sample.value() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_utilization_counts_user_and_system() {
        let before = CpuTime::default();
        let after = CpuTime::new(ms(0), ms(40));
        let sample = utilization_between(before, after, ms(80));
        assert!((sample.value() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_utilization_zero_wall_is_idle() {
        let t = CpuTime::new(ms(5), ms(5));
        assert_eq!(utilization_between(t, t, Duration::ZERO).value(), 0.0);
    }

    #[test]
    fn test_utilization_backwards_counter_is_unavailable() {
        let before = CpuTime::new(ms(500), ms(0));
        let after = CpuTime::new(ms(400), ms(0));
        let sample = utilization_between(before, after, ms(100));
        assert!(!sample.is_available());
        assert_eq!(sample, UtilizationSample::UNAVAILABLE);
    }

    #[test]
    fn test_sample_exceeds_threshold() {
        assert!(UtilizationSample::new(2.0).exceeds(1.5));
        assert!(!UtilizationSample::new(1.5).exceeds(1.5));
        assert!(!UtilizationSample::new(0.0).exceeds(1.5));
    }

    #[test]
    fn test_unavailable_always_exceeds() {
        assert!(UtilizationSample::UNAVAILABLE.exceeds(f64::MAX));
        assert!(UtilizationSample::new(f64::NAN).exceeds(1.5));
        assert!(UtilizationSample::new(-0.5).exceeds(1.5));
        assert_eq!(UtilizationSample::new(f64::INFINITY).cores(), None);
    }

    #[test]
    fn test_sample_display() {
        assert_eq!(UtilizationSample::new(1.234).to_string(), "1.23");
        assert_eq!(UtilizationSample::UNAVAILABLE.to_string(), "unavailable");
    }

    #[test]
    fn test_sample_bits_preserve_value() {
        let s = UtilizationSample::new(0.75);
        assert_eq!(UtilizationSample::from_bits(s.to_bits()), s);
    }
}

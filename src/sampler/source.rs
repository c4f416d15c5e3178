//! Process CPU-time sources.

use super::sample::CpuTime;
use std::io;
use std::sync::Arc;

/// Read-only view of the process's cumulative CPU time.
///
/// Injected into [`CpuSampler`](super::CpuSampler) so tests can substitute a
/// deterministic clock.
pub trait CpuTimeSource: Send + Sync {
    fn cpu_time(&self) -> io::Result<CpuTime>;
}

impl<T: CpuTimeSource + ?Sized> CpuTimeSource for Arc<T> {
    fn cpu_time(&self) -> io::Result<CpuTime> {
        (**self).cpu_time()
    }
}

/// CPU time of the calling process as reported by `getrusage(RUSAGE_SELF)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusageCpuTime;

impl RusageCpuTime {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl CpuTimeSource for RusageCpuTime {
    fn cpu_time(&self) -> io::Result<CpuTime> {
        let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
        // SAFETY: `usage` is a valid, writable rusage; getrusage fills it on success.
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: zero-initialized and written by a successful getrusage call.
        let usage = unsafe { usage.assume_init() };
        Ok(CpuTime::new(
            timeval_to_duration(usage.ru_utime),
            timeval_to_duration(usage.ru_stime),
        ))
    }
}

#[cfg(not(unix))]
impl CpuTimeSource for RusageCpuTime {
    fn cpu_time(&self) -> io::Result<CpuTime> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process CPU time is only available on unix targets",
        ))
    }
}

#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> std::time::Duration {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec).unwrap_or(0);
    std::time::Duration::from_secs(secs) + std::time::Duration::from_micros(micros)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_rusage_reports_cpu_time() {
        let source = RusageCpuTime::new();
        assert!(source.cpu_time().is_ok());
    }

    #[test]
    fn test_rusage_is_monotonic_under_load() {
        let source = RusageCpuTime::new();
        let before = source.cpu_time().unwrap();

        let deadline = Instant::now() + Duration::from_millis(30);
        let mut acc: u64 = 0;
        while Instant::now() < deadline {
            acc = std::hint::black_box(acc.wrapping_mul(31).wrapping_add(7));
        }

        let after = source.cpu_time().unwrap();
        assert!(after.total() >= before.total());
    }

    #[test]
    fn test_timeval_conversion() {
        let tv = libc::timeval {
            tv_sec: 2,
            tv_usec: 500_000,
        };
        assert_eq!(timeval_to_duration(tv), Duration::from_millis(2_500));
    }

    #[test]
    fn test_arc_source_delegates() {
        let source: Arc<dyn CpuTimeSource> = Arc::new(RusageCpuTime);
        assert!(source.cpu_time().is_ok());
    }
}

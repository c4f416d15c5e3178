use super::sample::{utilization_between, UtilizationSample};
use super::slot::{self, Publish, SamplePublisher, SampleReceiver, TryRecvError};
use super::source::{CpuTimeSource, RusageCpuTime};
use super::UtilizationFeed;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SamplerSnapshot {
    pub period_ms: u64,
    pub samples_published: u64,
    /// Samples replaced in the slot before the consumer took them.
    pub samples_overwritten: u64,
    pub measurement_failures: u64,
    pub last_sample: Option<UtilizationSample>,
    pub stopped: bool,
}

#[derive(Debug)]
struct Stats {
    published: AtomicU64,
    overwritten: AtomicU64,
    failures: AtomicU64,
    last_bits: AtomicU64,
}

impl Stats {
    fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_bits: AtomicU64::new(UtilizationSample::UNAVAILABLE.to_bits()),
        }
    }
}

/// Cloneable, thread-safe handle that stops a [`CpuSampler`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Idempotent; safe from any task or thread.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Periodically measures the process's own CPU utilization on a background task.
///
/// Sampling starts on construction. Each period produces one
/// [`UtilizationSample`] into a single-slot output; an unconsumed sample is
/// replaced by the next one. Dropping the sampler stops it.
pub struct CpuSampler {
    period: Duration,
    receiver: SampleReceiver,
    token: CancellationToken,
    stats: Arc<Stats>,
    task: Option<JoinHandle<()>>,
}

impl CpuSampler {
    /// Start sampling the real process CPU clock.
    pub fn start(period: Duration) -> Result<Self> {
        Self::start_with_source(period, RusageCpuTime::new())
    }

    /// Start sampling with an injected CPU-time source.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_with_source<S>(period: Duration, source: S) -> Result<Self>
    where
        S: CpuTimeSource + 'static,
    {
        if period.is_zero() {
            return Err(Error::configuration_with_context(
                "sampling period must be greater than zero",
                ErrorContext::new()
                    .with_field_path("period")
                    .with_source("cpu_sampler"),
            ));
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::runtime_with_context(
                "cpu sampler must be started inside a tokio runtime",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("cpu_sampler"),
            )
        })?;

        let (publisher, receiver) = slot::channel();
        let token = CancellationToken::new();
        let stats = Arc::new(Stats::new());

        let task = handle.spawn(measure(
            period,
            source,
            publisher,
            token.clone(),
            Arc::clone(&stats),
        ));
        debug!(period_ms = period.as_millis() as u64, "cpu sampler started");

        Ok(Self {
            period,
            receiver,
            token,
            stats,
            task: Some(task),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop sampling. A second call is a no-op.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.token.clone(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the latest sample. `None` after the sampler stopped and the slot drained.
    pub async fn recv(&mut self) -> Option<UtilizationSample> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> std::result::Result<UtilizationSample, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Stop and wait for the sampling task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "cpu sampler task ended abnormally");
            }
        }
    }

    pub fn snapshot(&self) -> SamplerSnapshot {
        let published = self.stats.published.load(Ordering::Acquire);
        let last_sample = (published > 0).then(|| {
            UtilizationSample::from_bits(self.stats.last_bits.load(Ordering::Acquire))
        });
        SamplerSnapshot {
            period_ms: self.period.as_millis() as u64,
            samples_published: published,
            samples_overwritten: self.stats.overwritten.load(Ordering::Acquire),
            measurement_failures: self.stats.failures.load(Ordering::Acquire),
            last_sample,
            stopped: self.is_stopped(),
        }
    }
}

impl Drop for CpuSampler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for CpuSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuSampler")
            .field("period", &self.period)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[async_trait]
impl UtilizationFeed for CpuSampler {
    async fn recv(&mut self) -> Option<UtilizationSample> {
        CpuSampler::recv(self).await
    }

    fn try_recv(&mut self) -> std::result::Result<UtilizationSample, TryRecvError> {
        CpuSampler::try_recv(self)
    }
}

async fn measure<S: CpuTimeSource>(
    period: Duration,
    source: S,
    publisher: SamplePublisher,
    token: CancellationToken,
    stats: Arc<Stats>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        let started = Instant::now();
        let before = source.cpu_time();

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let after = source.cpu_time();
        let sample = match (before, after) {
            (Ok(before), Ok(after)) => utilization_between(before, after, started.elapsed()),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "cpu time query failed");
                UtilizationSample::UNAVAILABLE
            }
        };
        if !sample.is_available() {
            stats.failures.fetch_add(1, Ordering::Relaxed);
        }

        if token.is_cancelled() {
            break;
        }

        stats.last_bits.store(sample.to_bits(), Ordering::Release);
        match publisher.publish(sample) {
            Publish::Stored => {}
            Publish::Replaced => {
                stats.overwritten.fetch_add(1, Ordering::Relaxed);
            }
            Publish::Closed => break,
        }
        stats.published.fetch_add(1, Ordering::Release);
        debug!(cores = %sample, "utilization sample published");
    }

    publisher.close();
    debug!("cpu sampler stopped");
}

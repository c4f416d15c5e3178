//! CPU 利用率采样模块：周期性测量本进程的 CPU 消耗并发布最新样本。
//!
//! # Utilization Sampler
//!
//! Periodically measures how much CPU the calling process consumes and publishes
//! the result as *core-equivalents per wall-clock second* over the most recent
//! sampling window.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CpuSampler`] | Background sampling task plus its consumer handle |
//! | [`UtilizationSample`] | One measurement; carries a sentinel for failed reads |
//! | [`CpuTimeSource`] | Injected read-only view of cumulative process CPU time |
//! | [`RusageCpuTime`] | `getrusage(RUSAGE_SELF)` implementation |
//! | [`slot`] | Single-slot, latest-value-wins hand-off |
//! | [`UtilizationFeed`] | What the admission controller consumes |
//!
//! ## Example
//!
//! ```rust,no_run
//! use idle_gate::sampler::CpuSampler;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> idle_gate::Result<()> {
//! let mut sampler = CpuSampler::start(Duration::from_millis(100))?;
//! if let Some(sample) = sampler.recv().await {
//!     println!("process is using {} cores", sample);
//! }
//! sampler.stop();
//! # Ok(())
//! # }
//! ```

mod cpu_sampler;
mod sample;
pub mod slot;
mod source;

pub use cpu_sampler::{CpuSampler, SamplerSnapshot, StopHandle};
pub use sample::{utilization_between, CpuTime, UtilizationSample};
pub use slot::{Publish, SamplePublisher, SampleReceiver, TryRecvError};
pub use source::{CpuTimeSource, RusageCpuTime};

use async_trait::async_trait;

/// A stream of utilization samples with at most one pending value.
///
/// Consumers only ever see the latest sample; intermediate ones may be skipped.
#[async_trait]
pub trait UtilizationFeed: Send {
    /// Wait for the next sample. `None` means the feed has ended.
    async fn recv(&mut self) -> Option<UtilizationSample>;

    /// Take a pending sample without waiting.
    fn try_recv(&mut self) -> Result<UtilizationSample, TryRecvError>;
}

#[async_trait]
impl UtilizationFeed for SampleReceiver {
    async fn recv(&mut self) -> Option<UtilizationSample> {
        SampleReceiver::recv(self).await
    }

    fn try_recv(&mut self) -> Result<UtilizationSample, TryRecvError> {
        SampleReceiver::try_recv(self)
    }
}

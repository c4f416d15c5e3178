//! # idle-gate
//!
//! 基于 CPU 利用率的后台任务准入控制：仅在进程足够空闲时运行低优先级工作。
//!
//! CPU-utilization gated admission control for opportunistic background work.
//!
//! ## Overview
//!
//! Services often have maintenance to do (compaction, cache warming, prefetch,
//! garbage collection) that must never compete with latency-sensitive foreground
//! work. This crate measures how many CPU cores the process itself is consuming
//! and lets background work run only while that figure stays at or below a
//! threshold, pausing it as soon as a sample comes in above it.
//!
//! ## Key Features
//!
//! - **Self-measured**: [`CpuSampler`] reads the process's own cumulative CPU time
//!   once per period and publishes core-equivalents per wall second
//! - **Never blocks the producer**: samples go through a single latest-value-wins
//!   slot; a slow or absent consumer only ever misses stale values
//! - **Preemptible**: [`AdmissionController`] checks for a fresh sample between
//!   every unit of background work
//! - **Fail-safe**: a failed CPU-time read is published as
//!   [`UtilizationSample::UNAVAILABLE`] and treated as over threshold
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idle_gate::{AdmissionConfig, AdmissionController};
//!
//! #[tokio::main]
//! async fn main() -> idle_gate::Result<()> {
//!     let config = AdmissionConfig::default().with_env_overrides()?;
//!     let mut controller = AdmissionController::from_config(&config)?;
//!
//!     let mut warmed = 0u64;
//!     let summary = controller.run(&mut || { warmed += 1 }).await;
//!     println!("{:?}", summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`sampler`] | CPU-time sources, the sampling task and its single-slot output |
//! | [`controller`] | Threshold gate and the Idle/Active work loop |
//! | [`config`] | Threshold and period configuration (YAML + environment) |
//! | [`error`] | Error types |

pub mod config;
pub mod controller;
pub mod sampler;

// Re-export main types for convenience
pub use config::AdmissionConfig;
pub use controller::{
    AdmissionController, AdmissionGate, BackgroundWork, ControllerSnapshot, Mode, Transition,
};
pub use sampler::{
    CpuSampler, CpuTime, CpuTimeSource, RusageCpuTime, SamplerSnapshot, StopHandle,
    UtilizationFeed, UtilizationSample,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};

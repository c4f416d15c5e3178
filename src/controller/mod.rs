//! 准入控制模块：根据 CPU 利用率阈值启动或暂停后台任务。
//!
//! # Admission Controller
//!
//! Consumes a [`UtilizationFeed`](crate::sampler::UtilizationFeed) and decides,
//! sample by sample, whether opportunistic background work may run.
//!
//! ## States
//!
//! - **Idle**: work is paused; the loop waits for the next sample.
//! - **Active**: work runs one unit at a time; after each unit the loop checks
//!   for a fresh sample without waiting.
//!
//! | From | Sample | To |
//! |------|--------|----|
//! | Idle | `<= threshold` | Active |
//! | Idle | `> threshold` or unavailable | Idle |
//! | Active | `> threshold` or unavailable | Idle |
//! | Active | `<= threshold` | Active |
//!
//! ## Example
//!
//! ```rust,no_run
//! use idle_gate::config::AdmissionConfig;
//! use idle_gate::controller::AdmissionController;
//!
//! # #[tokio::main]
//! # async fn main() -> idle_gate::Result<()> {
//! let mut controller = AdmissionController::from_config(&AdmissionConfig::default())?;
//! let stop = controller.stop_handle();
//!
//! let mut compacted = 0u64;
//! let mut compact_one_segment = || compacted += 1;
//!
//! tokio::spawn(async move {
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     stop.stop();
//! });
//! let summary = controller.run(&mut compact_one_segment).await;
//! println!("ran {} units", summary.units_performed);
//! # Ok(())
//! # }
//! ```

mod admission;
mod gate;
mod work;

pub use admission::{AdmissionController, ControllerSnapshot};
pub use gate::{AdmissionGate, Mode, Transition};
pub use work::BackgroundWork;

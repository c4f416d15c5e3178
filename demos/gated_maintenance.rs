//! Gated Maintenance Example
//!
//! This example demonstrates running a cache-compaction style job only while
//! the process is otherwise quiet:
//! - Loading the admission config from the environment
//! - Implementing `BackgroundWork` for a stateful job
//! - Stopping the controller from another task
//!
//! Usage:
//!   cargo run --example gated_maintenance
//!   IDLE_GATE_THRESHOLD=0.5 cargo run --example gated_maintenance

use async_trait::async_trait;
use idle_gate::{AdmissionConfig, AdmissionController, BackgroundWork};
use std::collections::BTreeMap;
use std::time::Duration;

/// Evicts one expired entry per unit of work.
struct CacheCompactor {
    entries: BTreeMap<u64, u64>,
    evicted: usize,
}

impl CacheCompactor {
    fn new(size: u64) -> Self {
        Self {
            entries: (0..size).map(|k| (k, k % 7)).collect(),
            evicted: 0,
        }
    }
}

#[async_trait]
impl BackgroundWork for CacheCompactor {
    async fn perform(&mut self) {
        let expired = self
            .entries
            .iter()
            .find(|(_, ttl)| **ttl == 0)
            .map(|(k, _)| *k);
        if let Some(key) = expired {
            self.entries.remove(&key);
            self.evicted += 1;
        } else {
            for ttl in self.entries.values_mut() {
                *ttl = ttl.saturating_sub(1);
            }
        }
    }
}

#[tokio::main]
async fn main() -> idle_gate::Result<()> {
    println!("=== idle-gate: Gated Maintenance Demo ===\n");

    let config = AdmissionConfig::default().with_env_overrides()?;
    println!("Threshold: {:.2} cores", config.threshold);
    println!("Sampling period: {} ms\n", config.period_ms);

    let mut controller = AdmissionController::from_config(&config)?;
    let stop = controller.stop_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        stop.stop();
    });

    let mut compactor = CacheCompactor::new(50_000);
    let summary = controller.run(&mut compactor).await;

    println!("Samples observed: {}", summary.samples_observed);
    println!("Activations:      {}", summary.activations);
    println!("Deactivations:    {}", summary.deactivations);
    println!("Units performed:  {}", summary.units_performed);
    println!("Entries evicted:  {}", compactor.evicted);
    println!("Entries left:     {}", compactor.entries.len());

    Ok(())
}

use super::gate::{AdmissionGate, Mode, Transition};
use super::work::BackgroundWork;
use crate::config::AdmissionConfig;
use crate::sampler::{CpuSampler, StopHandle, TryRecvError, UtilizationFeed, UtilizationSample};
use crate::Result;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub mode: Mode,
    pub threshold: f64,
    pub samples_observed: u64,
    pub activations: u64,
    pub deactivations: u64,
    pub units_performed: u64,
}

/// Runs caller-supplied background work only while process CPU utilization is
/// at or below a threshold.
///
/// While idle the loop waits for the next sample. While active it performs one
/// unit of work at a time and polls for a fresh sample between units without
/// waiting, so an over-threshold sample stops work after at most one more unit.
#[derive(Debug)]
pub struct AdmissionController<F = CpuSampler> {
    feed: F,
    gate: AdmissionGate,
    samples_observed: u64,
    activations: u64,
    deactivations: u64,
    units_performed: u64,
}

impl AdmissionController<CpuSampler> {
    /// Start a real CPU sampler and wrap it in a controller.
    pub fn from_config(config: &AdmissionConfig) -> Result<Self> {
        config.validate()?;
        let sampler = CpuSampler::start(config.period())?;
        Self::new(sampler, config.threshold)
    }

    /// Stopping the sampler ends [`run`](Self::run) once the pending sample is drained.
    pub fn stop_handle(&self) -> StopHandle {
        self.feed.stop_handle()
    }

    pub fn stop(&self) {
        self.feed.stop();
    }
}

impl<F: UtilizationFeed> AdmissionController<F> {
    pub fn new(feed: F, threshold: f64) -> Result<Self> {
        Ok(Self {
            feed,
            gate: AdmissionGate::new(threshold)?,
            samples_observed: 0,
            activations: 0,
            deactivations: 0,
            units_performed: 0,
        })
    }

    pub fn mode(&self) -> Mode {
        self.gate.mode()
    }

    pub fn threshold(&self) -> f64 {
        self.gate.threshold()
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn into_feed(self) -> F {
        self.feed
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            mode: self.gate.mode(),
            threshold: self.gate.threshold(),
            samples_observed: self.samples_observed,
            activations: self.activations,
            deactivations: self.deactivations,
            units_performed: self.units_performed,
        }
    }

    /// Drive the admission loop until the feed ends.
    pub async fn run<W>(&mut self, work: &mut W) -> ControllerSnapshot
    where
        W: BackgroundWork + ?Sized,
    {
        loop {
            match self.gate.mode() {
                Mode::Idle => match self.feed.recv().await {
                    Some(sample) => self.observe(sample),
                    None => break,
                },
                Mode::Active => {
                    work.perform().await;
                    self.units_performed += 1;
                    match self.feed.try_recv() {
                        Ok(sample) => self.observe(sample),
                        // Never wait for a sample while admitted; just let other
                        // tasks (including the sampler) run.
                        Err(TryRecvError::Empty) => tokio::task::yield_now().await,
                        Err(TryRecvError::Closed) => break,
                    }
                }
            }
        }

        let snapshot = self.snapshot();
        info!(
            activations = snapshot.activations,
            deactivations = snapshot.deactivations,
            units = snapshot.units_performed,
            "admission loop finished"
        );
        snapshot
    }

    fn observe(&mut self, sample: UtilizationSample) {
        self.samples_observed += 1;
        let threshold = self.gate.threshold();
        match self.gate.observe(sample) {
            Some(Transition::Activated) => {
                self.activations += 1;
                info!(cores = %sample, threshold, "starting background work");
            }
            Some(Transition::Deactivated) => {
                self.deactivations += 1;
                info!(cores = %sample, threshold, "stopping background work");
            }
            None => {
                debug!(cores = %sample, mode = ?self.gate.mode(), "utilization sample");
            }
        }
    }
}

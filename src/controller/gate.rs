use crate::config::validate_threshold;
use crate::sampler::UtilizationSample;
use crate::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Background work is paused, waiting for an admitting sample.
    Idle,
    /// Background work is running.
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle -> Active.
    Activated,
    /// Active -> Idle.
    Deactivated,
}

/// Two-state threshold gate.
///
/// Enters `Active` on a sample at or below the threshold and leaves it on a
/// sample strictly above it. Unavailable samples count as above. There is no
/// hysteresis band.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    threshold: f64,
    mode: Mode,
}

impl AdmissionGate {
    pub fn new(threshold: f64) -> Result<Self> {
        validate_threshold(threshold)?;
        Ok(Self {
            threshold,
            mode: Mode::Idle,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn observe(&mut self, sample: UtilizationSample) -> Option<Transition> {
        let over = sample.exceeds(self.threshold);
        match (self.mode, over) {
            (Mode::Idle, false) => {
                self.mode = Mode::Active;
                Some(Transition::Activated)
            }
            (Mode::Active, true) => {
                self.mode = Mode::Idle;
                Some(Transition::Deactivated)
            }
            _ => None,
        }
    }
}

//! Admission controller configuration.
//!
//! Values come from defaults, an optional YAML file, and environment overrides,
//! in that order.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_THRESHOLD: f64 = 1.5;
pub const DEFAULT_PERIOD_MS: u64 = 100;

pub const THRESHOLD_ENV: &str = "IDLE_GATE_THRESHOLD";
pub const PERIOD_MS_ENV: &str = "IDLE_GATE_PERIOD_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Core-equivalents at or below which background work may run.
    pub threshold: f64,
    /// Sampling window in milliseconds.
    pub period_ms: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            period_ms: DEFAULT_PERIOD_MS,
        }
    }
}

impl AdmissionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_ms = period.as_millis() as u64;
        self
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Apply `IDLE_GATE_THRESHOLD` / `IDLE_GATE_PERIOD_MS` if set.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(THRESHOLD_ENV) {
            self.threshold = raw.trim().parse::<f64>().map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid threshold override '{}'", raw),
                    ErrorContext::new()
                        .with_field_path(THRESHOLD_ENV)
                        .with_details(e.to_string()),
                )
            })?;
        }
        if let Some(raw) = lookup(PERIOD_MS_ENV) {
            self.period_ms = raw.trim().parse::<u64>().map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid period override '{}'", raw),
                    ErrorContext::new()
                        .with_field_path(PERIOD_MS_ENV)
                        .with_details(e.to_string()),
                )
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        if self.period_ms == 0 {
            return Err(Error::configuration_with_context(
                "sampling period must be greater than zero",
                ErrorContext::new()
                    .with_field_path("period_ms")
                    .with_source("admission_config"),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(Error::configuration_with_context(
            "threshold must be a finite, non-negative number of cores",
            ErrorContext::new()
                .with_field_path("threshold")
                .with_details(format!("got {}", threshold))
                .with_source("admission_config"),
        ));
    }
    Ok(())
}

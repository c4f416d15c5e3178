//! idle-gate demo — 合成前台负载下演示后台任务的准入与抢占
//!
//! Usage:
//!   idle-gate-demo [--config <file>] [--threshold <cores>] [--period-ms <ms>]
//!                  [--duration-secs <s>] [--foreground <n>]
//!
//! Starts `n` foreground threads that alternate one second of busy CPU with one
//! second of sleep, plus one gated background workload, runs for a fixed
//! duration and then shuts everything down.

use anyhow::{bail, Context};
use idle_gate::{AdmissionConfig, AdmissionController, BackgroundWork};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FOREGROUND_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct DemoOptions {
    config_path: Option<String>,
    threshold: Option<f64>,
    period_ms: Option<u64>,
    duration: Duration,
    foreground: usize,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            threshold: None,
            period_ms: None,
            duration: Duration::from_secs(6),
            foreground: 2,
        }
    }
}

impl DemoOptions {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut opts = Self::default();
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .with_context(|| format!("missing value for {flag}"))
            };
            match flag.as_str() {
                "--config" => opts.config_path = Some(value()?.clone()),
                "--threshold" => {
                    opts.threshold = Some(value()?.parse().context("invalid --threshold")?)
                }
                "--period-ms" => {
                    opts.period_ms = Some(value()?.parse().context("invalid --period-ms")?)
                }
                "--duration-secs" => {
                    opts.duration =
                        Duration::from_secs(value()?.parse().context("invalid --duration-secs")?)
                }
                "--foreground" => {
                    opts.foreground = value()?.parse().context("invalid --foreground")?
                }
                other => bail!("unknown option: {other}"),
            }
        }
        Ok(opts)
    }

    fn admission_config(&self) -> anyhow::Result<AdmissionConfig> {
        let mut config = match &self.config_path {
            Some(path) => AdmissionConfig::from_file(path)
                .with_context(|| format!("loading config from {path}"))?,
            None => AdmissionConfig::default(),
        };
        config = config.with_env_overrides()?;
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        if let Some(period_ms) = self.period_ms {
            config.period_ms = period_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Stand-in for real maintenance: a small, fixed slice of CPU per unit.
#[derive(Default)]
struct MaintenanceWork {
    units: u64,
    checksum: u64,
}

#[async_trait::async_trait]
impl BackgroundWork for MaintenanceWork {
    async fn perform(&mut self) {
        let mut acc = self.checksum;
        for i in 0..10_000u64 {
            acc = acc.rotate_left(5) ^ i.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        }
        self.checksum = std::hint::black_box(acc);
        self.units += 1;
    }
}

fn spawn_foreground(
    id: usize,
    period: Duration,
    stop: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("foreground-{id}"))
        .spawn(move || {
            let mut acc: u64 = 0;
            while !stop.load(Ordering::Relaxed) {
                let busy_until = Instant::now() + period;
                while Instant::now() < busy_until && !stop.load(Ordering::Relaxed) {
                    acc = std::hint::black_box(acc.wrapping_add(1));
                }
                let idle_until = Instant::now() + period;
                while Instant::now() < idle_until && !stop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            }
        })
}

async fn run(opts: DemoOptions) -> anyhow::Result<()> {
    let config = opts.admission_config()?;
    info!(
        threshold = config.threshold,
        period_ms = config.period_ms,
        foreground = opts.foreground,
        duration_secs = opts.duration.as_secs(),
        "starting demo"
    );

    let mut controller = AdmissionController::from_config(&config)?;
    let stop = controller.stop_handle();

    let fg_stop = Arc::new(AtomicBool::new(false));
    let foreground = (0..opts.foreground)
        .map(|id| spawn_foreground(id, FOREGROUND_PERIOD, Arc::clone(&fg_stop)))
        .collect::<std::io::Result<Vec<_>>>()
        .context("spawning foreground workloads")?;

    let background = tokio::spawn(async move {
        let mut work = MaintenanceWork::default();
        let summary = controller.run(&mut work).await;
        (summary, work.units)
    });

    tokio::time::sleep(opts.duration).await;
    stop.stop();
    let (summary, units) = background.await.context("background task panicked")?;

    fg_stop.store(true, Ordering::Relaxed);
    for handle in foreground {
        if handle.join().is_err() {
            bail!("foreground thread panicked");
        }
    }

    info!(
        activations = summary.activations,
        deactivations = summary.deactivations,
        samples = summary.samples_observed,
        units,
        "demo finished"
    );
    Ok(())
}

fn print_usage() {
    println!(
        r#"idle-gate-demo — CPU-gated background work demo

USAGE:
    idle-gate-demo [OPTIONS]

OPTIONS:
    --config <file>          YAML config (threshold, period_ms)
    --threshold <cores>      Admit background work at or below this many cores
    --period-ms <ms>         Sampling period in milliseconds
    --duration-secs <s>      How long to run (default 6)
    --foreground <n>         Number of synthetic foreground workloads (default 2)
    help                     Show this help message
    version                  Show version information

ENVIRONMENT:
    IDLE_GATE_THRESHOLD      Threshold override
    IDLE_GATE_PERIOD_MS      Sampling period override
    RUST_LOG                 Log filter (default: info)"#
    );
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("help" | "--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some("version" | "--version" | "-V") => {
            println!("idle-gate-demo {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let opts = DemoOptions::parse(args.get(1..).unwrap_or_default())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(opts))
}

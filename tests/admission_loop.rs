//! End-to-end tests for the admission loop driven by a real sampler or a
//! hand-fed sample slot.

use idle_gate::sampler::slot;
use idle_gate::{
    AdmissionController, BackgroundWork, CpuSampler, CpuTime, CpuTimeSource, Mode,
    UtilizationSample,
};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Advances by a fixed amount of CPU time on every query.
struct SteadyCpu {
    per_query: Duration,
    queries: AtomicU32,
}

impl SteadyCpu {
    fn new(per_query: Duration) -> Self {
        Self {
            per_query,
            queries: AtomicU32::new(0),
        }
    }
}

impl CpuTimeSource for SteadyCpu {
    fn cpu_time(&self) -> io::Result<CpuTime> {
        let n = self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(CpuTime::new(Duration::ZERO, self.per_query * n))
    }
}

struct CountingWork {
    units: Arc<AtomicU32>,
}

#[async_trait::async_trait]
impl BackgroundWork for CountingWork {
    async fn perform(&mut self) {
        self.units.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_over_threshold_sample_preempts_within_one_unit() {
    let (tx, rx) = slot::channel();
    tx.publish(UtilizationSample::new(0.2));

    let mut controller = AdmissionController::new(rx, 1.5).unwrap();
    let mut tx = Some(tx);
    let mut units = 0u32;
    let mut work = || {
        units += 1;
        if units == 3 {
            // Foreground load shows up while unit 3 is in flight.
            if let Some(tx) = tx.take() {
                tx.publish(UtilizationSample::new(2.0));
            }
        }
    };

    let snap = controller.run(&mut work).await;
    assert_eq!(snap.units_performed, 3);
    assert_eq!(snap.activations, 1);
    assert_eq!(snap.deactivations, 1);
    assert_eq!(snap.mode, Mode::Idle);
}

#[tokio::test]
async fn test_unavailable_sample_preempts_like_overload() {
    let (tx, rx) = slot::channel();
    tx.publish(UtilizationSample::new(0.2));

    let mut controller = AdmissionController::new(rx, 1.5).unwrap();
    let mut tx = Some(tx);
    let mut units = 0u32;
    let mut work = || {
        units += 1;
        if let Some(tx) = tx.take() {
            tx.publish(UtilizationSample::UNAVAILABLE);
        }
    };

    let snap = controller.run(&mut work).await;
    assert_eq!(snap.units_performed, 1);
    assert_eq!(snap.deactivations, 1);
}

#[tokio::test]
async fn test_idle_controller_waits_for_admitting_sample() {
    let (tx, rx) = slot::channel();
    let units = Arc::new(AtomicU32::new(0));
    let mut work = CountingWork {
        units: Arc::clone(&units),
    };

    let handle = tokio::spawn(async move {
        let mut controller = AdmissionController::new(rx, 1.0).unwrap();
        controller.run(&mut work).await
    });

    tx.publish(UtilizationSample::new(1.8));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(units.load(Ordering::SeqCst), 0);

    tx.publish(UtilizationSample::new(0.4));
    while units.load(Ordering::SeqCst) < 10 {
        tokio::task::yield_now().await;
    }

    tx.publish(UtilizationSample::new(3.0));
    drop(tx);

    let snap = handle.await.unwrap();
    assert_eq!(snap.activations, 1);
    assert_eq!(snap.deactivations, 1);
    assert_eq!(snap.mode, Mode::Idle);
    assert_eq!(snap.units_performed, units.load(Ordering::SeqCst) as u64);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_process_runs_until_sampler_stops() {
    // 50ms of CPU per 100ms window: half a core.
    let sampler = CpuSampler::start_with_source(
        Duration::from_millis(100),
        SteadyCpu::new(Duration::from_millis(50)),
    )
    .unwrap();
    let mut controller = AdmissionController::new(sampler, 1.5).unwrap();
    let stop = controller.feed().stop_handle();

    let mut units = 0u32;
    let mut work = || {
        units += 1;
        if units == 3 {
            stop.stop();
        }
    };

    let snap = controller.run(&mut work).await;
    assert_eq!(snap.activations, 1);
    assert_eq!(snap.deactivations, 0);
    assert!(snap.units_performed >= 3);
    assert!(controller.feed().is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_busy_process_never_admits_work() {
    // 300ms of CPU per 100ms window: three cores busy.
    let sampler = CpuSampler::start_with_source(
        Duration::from_millis(100),
        SteadyCpu::new(Duration::from_millis(300)),
    )
    .unwrap();
    let stop = sampler.stop_handle();
    let mut controller = AdmissionController::new(sampler, 1.5).unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        stop.stop();
    });

    let units = Arc::new(AtomicU32::new(0));
    let mut work = CountingWork {
        units: Arc::clone(&units),
    };
    let snap = controller.run(&mut work).await;

    assert_eq!(units.load(Ordering::SeqCst), 0);
    assert_eq!(snap.activations, 0);
    assert_eq!(snap.samples_observed, 10);
    assert_eq!(snap.mode, Mode::Idle);
}

#[cfg(unix)]
#[tokio::test]
async fn test_from_config_uses_real_cpu_clock() {
    let config = idle_gate::AdmissionConfig::default()
        .with_threshold(64.0)
        .with_period(Duration::from_millis(10));
    let mut controller = AdmissionController::from_config(&config).unwrap();
    let stop = controller.stop_handle();

    let mut units = 0u32;
    let mut work = || {
        units += 1;
        if units == 100 {
            stop.stop();
        }
    };

    let snap = controller.run(&mut work).await;
    assert_eq!(snap.activations, 1);
    assert!(snap.units_performed >= 100);
}

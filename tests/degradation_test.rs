//! Window comparison and severity-dependent remediation

mod common;

use common::{metrics, Harness, MetricsBehaviour};
use perfwatch::monitoring::{DegradationCheck, MonitorEvent, Severity};
use perfwatch::MonitorConfig;
use std::time::Duration;

fn degradation_only(consecutive_checks: u32) -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.leak_detection.enabled = false;
    config.auto_optimization.enabled = false;
    config.degradation.window_size = 10;
    config.degradation.consecutive_checks = consecutive_checks;
    config
}

async fn feed(harness: &Harness, ticks: usize) -> Vec<Option<DegradationCheck>> {
    let mut checks = Vec::new();
    for _ in 0..ticks {
        harness.clock.advance_secs(30);
        checks.push(harness.monitor.run_degradation_check().await);
    }
    checks
}

#[tokio::test(start_paused = true)]
async fn test_no_evaluation_before_two_full_windows() {
    let harness = Harness::new(degradation_only(2));
    harness.metrics.push_many(19, metrics(100.0, 50.0, 0.1));

    let checks = feed(&harness, 19).await;
    for (i, check) in checks.into_iter().enumerate() {
        assert_eq!(
            check,
            Some(DegradationCheck::InsufficientData {
                collected: i + 1,
                required: 20
            })
        );
    }
    assert_eq!(harness.monitor.get_status().degradation.snapshots, 19);
}

#[tokio::test(start_paused = true)]
async fn test_large_regression_is_aggressive() {
    let harness = Harness::new(degradation_only(1));
    harness.metrics.push_many(10, metrics(100.0, 50.0, 0.1));
    harness.metrics.push_many(10, metrics(151.0, 50.0, 0.1));

    let checks = feed(&harness, 20).await;
    match checks.last() {
        Some(Some(DegradationCheck::Confirmed(report))) => {
            assert_eq!(report.severity, Severity::Aggressive);
            assert!(report.comparison.response_time_increase_pct > 50.0);
        }
        other => panic!("expected confirmed degradation, got {:?}", other),
    }

    assert_eq!(harness.gc.count(), 1);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(harness.gc.count(), 2);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.gc.count(), 3);

    let optimized: Vec<bool> = harness
        .events
        .all()
        .into_iter()
        .filter_map(|event| match event {
            MonitorEvent::PerformanceOptimized { aggressive, .. } => Some(aggressive),
            _ => None,
        })
        .collect();
    assert_eq!(optimized, vec![true]);
}

#[tokio::test(start_paused = true)]
async fn test_moderate_regression_is_standard() {
    let harness = Harness::new(degradation_only(1));
    harness.metrics.push_many(10, metrics(100.0, 50.0, 0.1));
    harness.metrics.push_many(10, metrics(125.0, 50.0, 0.1));

    let checks = feed(&harness, 20).await;
    match checks.last() {
        Some(Some(DegradationCheck::Confirmed(report))) => {
            assert_eq!(report.severity, Severity::Standard);
        }
        other => panic!("expected confirmed degradation, got {:?}", other),
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.gc.count(), 1);
    assert_eq!(harness.monitor.get_status().remediation.deferred_gc_scheduled, 0);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_needs_two_consecutive_regressions() {
    let harness = Harness::new(degradation_only(2));
    harness.metrics.push_many(10, metrics(100.0, 50.0, 0.1));
    harness.metrics.push_many(11, metrics(200.0, 50.0, 0.1));

    let checks = feed(&harness, 20).await;
    assert!(matches!(
        checks.last(),
        Some(Some(DegradationCheck::Degrading { consecutive: 1, .. }))
    ));
    assert_eq!(harness.events.count("performanceDegradation"), 0);

    let next = feed(&harness, 1).await;
    assert!(matches!(
        next.last(),
        Some(Some(DegradationCheck::Confirmed(_)))
    ));
    assert_eq!(harness.events.count("performanceDegradation"), 1);
    assert_eq!(
        harness.monitor.get_status().degradation.consecutive_decreases,
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_throughput_drop_counts_as_degradation() {
    let harness = Harness::new(degradation_only(1));
    harness.metrics.push_many(10, metrics(100.0, 100.0, 0.1));
    harness.metrics.push_many(10, metrics(100.0, 60.0, 0.1));

    let checks = feed(&harness, 20).await;
    match checks.last() {
        Some(Some(DegradationCheck::Confirmed(report))) => {
            assert!((report.comparison.throughput_decrease_pct - 40.0).abs() < 1e-9);
            assert_eq!(report.severity, Severity::Aggressive);
        }
        other => panic!("expected confirmed degradation, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_provider_failure_skips_tick() {
    let harness = Harness::new(degradation_only(2));
    harness.metrics.set_behaviour(MetricsBehaviour::Fail);

    assert_eq!(harness.monitor.run_degradation_check().await, None);
    let status = harness.monitor.get_status();
    assert_eq!(status.degradation.snapshots, 0);
    assert_eq!(status.detections.collection_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_provider_times_out() {
    let harness = Harness::new(degradation_only(2));
    harness.metrics.set_behaviour(MetricsBehaviour::Hang);

    let started = tokio::time::Instant::now();
    assert_eq!(harness.monitor.run_degradation_check().await, None);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(harness.monitor.get_status().detections.collection_failures, 1);
}

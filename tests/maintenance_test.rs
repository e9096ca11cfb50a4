//! Maintenance passes run through the monitor

mod common;

use common::{metrics, Harness};
use perfwatch::monitoring::MonitorEvent;
use perfwatch::optimization::MaintenanceTaskKind;
use perfwatch::MonitorConfig;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_pass_prunes_stale_performance_samples() {
    let harness = Harness::new(MonitorConfig::default());
    harness.metrics.push_many(4, metrics(90.0, 20.0, 0.0));

    for _ in 0..4 {
        harness.monitor.run_degradation_check().await;
    }
    harness.monitor.run_leak_check();
    assert_eq!(harness.monitor.get_status().degradation.snapshots, 4);

    harness.clock.advance_secs(2 * 3600);
    let report = harness.monitor.run_maintenance();

    assert!(report.is_success());
    assert_eq!(report.pruned_snapshots, 5);
    let status = harness.monitor.get_status();
    assert_eq!(status.degradation.snapshots, 0);
    assert_eq!(status.leak_detection.snapshots, 0);
    assert_eq!(status.maintenance.passes, 1);

    match harness.events.all().last() {
        Some(MonitorEvent::MaintenanceCompleted {
            tasks,
            pruned_snapshots,
            ..
        }) => {
            assert_eq!(*pruned_snapshots, 5);
            assert!(tasks.contains(&MaintenanceTaskKind::MetricPruning));
            assert!(!tasks.contains(&MaintenanceTaskKind::LogRotation));
        }
        other => panic!("expected maintenance completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pass_uses_collaborators() {
    let harness = Harness::new(MonitorConfig::default());
    harness.monitor.run_maintenance();

    assert_eq!(harness.gc.count(), 1);
    assert_eq!(harness.reclaimer.cache_clears.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.reclaimer.connection_cleanups.load(Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_recent_samples_survive_pruning() {
    let harness = Harness::new(MonitorConfig::default());
    harness.monitor.run_degradation_check().await;
    harness.clock.advance_secs(1800);
    harness.monitor.run_degradation_check().await;

    harness.clock.advance_secs(1900);
    let report = harness.monitor.run_maintenance();
    assert_eq!(report.pruned_snapshots, 1);
    assert_eq!(harness.monitor.get_status().degradation.snapshots, 1);
}

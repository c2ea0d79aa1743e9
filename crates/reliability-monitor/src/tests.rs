#[cfg(test)]
mod reliability_monitor_tests {
    use crate::{
        AlertSeverity, HealthProbe, MonitorConfig, MonitorThresholds, ProbeOptions, ProbeOutcome,
        ReliabilityMonitor,
    };
    use async_trait::async_trait;
    use fusion_core::{FusionError, HealthState, HealthView};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn small_window_monitor() -> ReliabilityMonitor {
        let mut config = MonitorConfig::default();
        config.thresholds.window_size = 4;
        config.thresholds.uptime_window = 4;
        ReliabilityMonitor::new(config).expect("valid config")
    }

    fn register_switchable(monitor: &ReliabilityMonitor, source: &str, up: Arc<AtomicBool>, critical: bool) {
        monitor.register_fn(
            source,
            move || {
                let ok = up.load(Ordering::SeqCst);
                async move {
                    if ok {
                        ProbeOutcome::ok().with_latency_ms(120.0)
                    } else {
                        ProbeOutcome::failed("HTTP 503")
                    }
                }
            },
            critical,
        );
    }

    struct PanickingProbe;

    #[async_trait]
    impl HealthProbe for PanickingProbe {
        async fn probe(&self) -> ProbeOutcome {
            panic!("provider client poisoned")
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl HealthProbe for HangingProbe {
        async fn probe(&self) -> ProbeOutcome {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ProbeOutcome::ok()
        }
    }

    #[tokio::test]
    async fn test_failures_then_recovery_emit_one_alert_each() {
        let monitor = ReliabilityMonitor::default();
        let up = Arc::new(AtomicBool::new(true));
        register_switchable(&monitor, "eastmoney", up.clone(), true);
        let mut rx = monitor.subscribe();

        for _ in 0..10 {
            monitor.run_once().await;
        }
        assert_eq!(monitor.health_state("eastmoney"), HealthState::Healthy);
        assert!(monitor.alerts_for("eastmoney").is_empty(), "unknown -> healthy is silent");

        up.store(false, Ordering::SeqCst);
        for _ in 0..2 {
            monitor.run_once().await;
            assert_eq!(monitor.health_state("eastmoney"), HealthState::Healthy);
        }
        monitor.run_once().await;
        let health = monitor.health("eastmoney").unwrap();
        assert_eq!(health.state, HealthState::Critical);
        assert_eq!(health.consecutive_failures, 3);

        up.store(true, Ordering::SeqCst);
        for _ in 0..2 {
            monitor.run_once().await;
            assert_eq!(monitor.health_state("eastmoney"), HealthState::Critical);
        }
        monitor.run_once().await;
        assert_eq!(monitor.health_state("eastmoney"), HealthState::Healthy);

        // Long recovery streak stays quiet.
        for _ in 0..50 {
            monitor.run_once().await;
        }
        assert_eq!(monitor.health_state("eastmoney"), HealthState::Healthy);

        let alerts = monitor.alerts_for("eastmoney");
        let critical = alerts.iter().filter(|a| a.severity == AlertSeverity::Critical).count();
        let info = alerts.iter().filter(|a| a.severity == AlertSeverity::Info).count();
        assert_eq!(critical, 1);
        assert_eq!(info, 1);
        assert_eq!(alerts.len(), 2);
        assert!(monitor.active_alerts().is_empty());

        let first = rx.try_recv().unwrap();
        assert_eq!((first.old_state, first.new_state), (HealthState::Healthy, HealthState::Critical));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.severity, AlertSeverity::Info);
        assert_eq!((second.old_state, second.new_state), (HealthState::Critical, HealthState::Healthy));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_alerts_follow_state_changes_only() {
        let monitor = small_window_monitor();
        let up = Arc::new(AtomicBool::new(true));
        register_switchable(&monitor, "sina", up.clone(), false);

        for round in 0..40 {
            up.store(round % 7 != 0, Ordering::SeqCst);
            monitor.run_once().await;
        }

        let alerts = monitor.alerts_for("sina");
        for pair in alerts.windows(2) {
            assert_ne!(pair[0].new_state, pair[1].new_state);
            assert_eq!(pair[0].new_state, pair[1].old_state);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_take_source_offline() {
        let monitor = ReliabilityMonitor::default();
        monitor.register_with(
            "tencent",
            HangingProbe,
            ProbeOptions::critical(true).with_timeout(Duration::from_millis(100)),
        );

        monitor.run_once().await;
        assert_ne!(monitor.health_state("tencent"), HealthState::Offline);
        monitor.run_once().await;

        let health = monitor.health("tencent").unwrap();
        assert_eq!(health.state, HealthState::Offline);
        assert!(health.last_error.unwrap().contains("timed out"));

        let report = monitor.report();
        assert_eq!(report.overall_status, HealthState::Critical);
        assert_eq!(report.counts.offline, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_does_not_stall_other_sources() {
        let monitor = ReliabilityMonitor::default();
        monitor.register_with(
            "tencent",
            HangingProbe,
            ProbeOptions::critical(false).with_timeout(Duration::from_secs(1)),
        );
        monitor.register_fn("eastmoney", || async { ProbeOutcome::ok() }, true);

        monitor.run_once().await;
        assert_eq!(monitor.health_state("eastmoney"), HealthState::Healthy);
        assert_eq!(monitor.report().overall_status, HealthState::Warning);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_a_failure() {
        let monitor = ReliabilityMonitor::default();
        monitor.register("akshare", PanickingProbe, false);
        monitor.run_once().await;

        let health = monitor.health("akshare").unwrap();
        assert_eq!(health.last_success, Some(false));
        assert_eq!(health.error_count, 1);
        assert!(health.last_error.unwrap().contains("poisoned"));
    }

    #[tokio::test]
    async fn test_blocking_probe_reports_quality() {
        let monitor = ReliabilityMonitor::default();
        monitor.register_blocking(
            "tushare",
            || {
                std::thread::sleep(Duration::from_millis(5));
                ProbeOutcome::ok().with_quality(0.95)
            },
            false,
        );
        monitor.run_once().await;

        let health = monitor.health("tushare").unwrap();
        assert_eq!(health.state, HealthState::Healthy);
        assert_eq!(health.data_quality, Some(0.95));
        assert!(monitor.reliability_score("tushare").unwrap() > 0.9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_lifecycle() {
        let monitor = ReliabilityMonitor::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        monitor.register_with(
            "xueqiu",
            crate::FnProbe::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { ProbeOutcome::ok() }
            }),
            ProbeOptions::critical(false).with_interval(Duration::from_secs(10)),
        );

        monitor.start().await;
        assert!(monitor.is_running());
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert!(calls.load(Ordering::SeqCst) >= 3);

        // Registering while running starts probing right away.
        let late_calls = Arc::new(AtomicUsize::new(0));
        let late_counter = late_calls.clone();
        monitor.register_fn(
            "sina",
            move || {
                late_counter.fetch_add(1, Ordering::SeqCst);
                async { ProbeOutcome::ok() }
            },
            false,
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(late_calls.load(Ordering::SeqCst) >= 1);

        monitor.stop().await;
        assert!(!monitor.is_running());
        let after_stop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);

        // Last known state survives stop.
        assert_eq!(monitor.health_state("xueqiu"), HealthState::Healthy);
    }

    #[tokio::test]
    async fn test_update_thresholds_validates() {
        let monitor = ReliabilityMonitor::default();

        let mut bad = MonitorThresholds::default();
        bad.success_rate_critical = 0.99;
        assert!(matches!(monitor.update_thresholds(bad), Err(FusionError::Configuration(_))));

        let mut good = MonitorThresholds::default();
        good.response_time_warning_ms = 2000.0;
        monitor.update_thresholds(good.clone()).unwrap();
        assert_eq!(monitor.thresholds(), good);
    }

    #[tokio::test]
    async fn test_monitor_as_health_view() {
        let monitor = ReliabilityMonitor::default();
        monitor.register_fn("eastmoney", || async { ProbeOutcome::ok().with_latency_ms(0.0) }, true);
        monitor.run_once().await;

        let view: Arc<dyn HealthView> = Arc::new(monitor.clone());
        assert_eq!(view.health_state("eastmoney"), HealthState::Healthy);
        assert!((view.reliability_score("eastmoney").unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(view.health_state("unregistered"), HealthState::Unknown);
        assert_eq!(view.reliability_score("unregistered"), None);
    }

    #[tokio::test]
    async fn test_report_summarizes_sources() {
        let monitor = ReliabilityMonitor::default();
        monitor.register_fn("fast", || async { ProbeOutcome::ok().with_latency_ms(100.0) }, false);
        monitor.register_fn("slow", || async { ProbeOutcome::ok().with_latency_ms(7000.0) }, false);
        monitor.run_once().await;

        let report = monitor.report();
        assert_eq!(report.counts.healthy, 1);
        assert_eq!(report.counts.warning, 1);
        assert_eq!(report.overall_status, HealthState::Warning);
        assert_eq!(report.performance_summary.best_source.as_deref(), Some("fast"));
        assert_eq!(report.performance_summary.worst_source.as_deref(), Some("slow"));
        assert!((report.performance_summary.avg_response_ms - 3550.0).abs() < 1e-9);
        assert_eq!(report.active_alerts.len(), 1);

        let id = report.active_alerts[0].id;
        assert!(monitor.acknowledge(id));
        assert!(monitor.active_alerts()[0].acknowledged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_in_flight_keeps_its_thresholds() {
        let monitor = ReliabilityMonitor::default();
        monitor.register_fn(
            "tencent",
            || async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                ProbeOutcome::ok().with_latency_ms(6000.0)
            },
            false,
        );

        let cycle = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run_once().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut relaxed = MonitorThresholds::default();
        relaxed.response_time_warning_ms = 7000.0;
        relaxed.response_time_critical_ms = 20000.0;
        monitor.update_thresholds(relaxed).unwrap();
        cycle.await.unwrap();

        // 6000 ms is slow under the thresholds the cycle started with.
        assert_eq!(monitor.health_state("tencent"), HealthState::Warning);

        monitor.run_once().await;
        assert_eq!(monitor.health_state("tencent"), HealthState::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_source_ignores_stale_cycle() {
        let monitor = ReliabilityMonitor::default();
        monitor.register_fn(
            "sina",
            || async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                ProbeOutcome::failed("HTTP 502")
            },
            true,
        );

        let cycle = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run_once().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        monitor.register_fn("sina", || async { ProbeOutcome::ok() }, true);
        cycle.await.unwrap();

        let health = monitor.health("sina").unwrap();
        assert_eq!(health.state, HealthState::Unknown);
        assert_eq!(health.total_probes, 0);
        assert!(monitor.alerts_for("sina").is_empty());

        monitor.run_once().await;
        assert_eq!(monitor.health_state("sina"), HealthState::Healthy);
    }
}

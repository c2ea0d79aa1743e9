#[cfg(test)]
mod quality_analyzer_tests {
    use crate::{QualityAnalyzer, QualityConfig, QualityHistory, QualityTrend};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use fusion_core::{DataType, Degradation, FusionError, HealthState, QualityGrade, RawObservation, StaticHealth};
    use serde_json::json;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn clean_quote(ts: DateTime<Utc>) -> RawObservation {
        RawObservation::from_value(json!({
            "name": "Ping An Bank",
            "current_price": 10.50,
            "open": 10.20,
            "high": 10.80,
            "low": 10.10,
            "prev_close": 10.00,
            "change_pct": 5.0,
            "volume": 1_000_000,
            "turnover": 10_400_000.0,
            "timestamp": ts.to_rfc3339()
        }))
    }

    #[test]
    fn test_clean_quote_scores_high() {
        let analyzer = QualityAnalyzer::default();
        let m = analyzer.analyze_at("eastmoney", &clean_quote(now()), DataType::Price, Some(10.50), now());

        assert!((m.completeness - 1.0).abs() < 1e-9);
        assert!((m.accuracy - 1.0).abs() < 1e-9);
        assert!((m.timeliness - 1.0).abs() < 1e-9);
        assert!((m.consistency - 1.0).abs() < 1e-9);
        assert!((m.validity - 1.0).abs() < 1e-9);
        assert!((m.reliability - 0.5).abs() < 1e-9);
        assert!((m.overall_score - 0.975).abs() < 1e-9);
        assert_eq!(m.grade, QualityGrade::Excellent);
        assert!(!m.is_degraded());
    }

    #[test]
    fn test_missing_required_field_degrades_completeness() {
        let mut raw = clean_quote(now());
        raw = raw.with("volume", serde_json::Value::Null);
        let m = QualityAnalyzer::default().analyze_at("sina", &raw, DataType::Price, None, now());

        // (1.0 + 0.9) / 2.7 of the required share plus the full optional share
        let expected = (1.9 / 2.7) * 0.7 + 0.3;
        assert!((m.completeness - expected).abs() < 1e-9);
        assert!(m.degradations.contains(&Degradation::MissingFields {
            fields: vec!["volume".to_string()]
        }));
    }

    #[test]
    fn test_timestamp_edge_cases() {
        let analyzer = QualityAnalyzer::default();

        let malformed = clean_quote(now()).with("timestamp", "not-a-date");
        let m = analyzer.analyze_at("tencent", &malformed, DataType::Price, None, now());
        assert_eq!(m.timeliness, 0.0);
        assert!(m
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::MalformedTimestamp { .. })));

        let mut missing = RawObservation::default();
        missing = missing.with("current_price", 10.5);
        let m = analyzer.analyze_at("tencent", &missing, DataType::Price, None, now());
        assert_eq!(m.timeliness, 0.5);
        assert!(m.degradations.contains(&Degradation::MissingTimestamp));

        let future = clean_quote(now() + Duration::minutes(5));
        let m = analyzer.analyze_at("tencent", &future, DataType::Price, None, now());
        assert_eq!(m.timeliness, 1.0);
    }

    #[test]
    fn test_timeliness_never_increases_with_age() {
        let analyzer = QualityAnalyzer::default();
        let mut previous = f64::INFINITY;
        for minutes in (0..=48 * 60).step_by(15) {
            let raw = clean_quote(now() - Duration::minutes(minutes));
            let m = analyzer.analyze_at("xueqiu", &raw, DataType::Price, None, now());
            assert!(m.timeliness <= previous, "age {}m rose to {}", minutes, m.timeliness);
            previous = m.timeliness;
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn test_stale_timestamp_reported() {
        let raw = clean_quote(now() - Duration::hours(3));
        let m = QualityAnalyzer::default().analyze_at("akshare", &raw, DataType::Price, None, now());
        assert!(m.timeliness < 1.0 && m.timeliness > 0.0);
        assert!(m.degradations.contains(&Degradation::StaleTimestamp { age_secs: 3 * 3600 }));
    }

    #[test]
    fn test_consistency_against_reference() {
        let analyzer = QualityAnalyzer::default();
        let raw = clean_quote(now()).with("current_price", 25.30);

        let close = analyzer.analyze_at("eastmoney", &raw, DataType::Price, Some(25.29), now());
        assert!(close.consistency > 0.99);

        let far = analyzer.analyze_at("eastmoney", &raw, DataType::Price, Some(20.0), now());
        assert_eq!(far.consistency, 0.0);

        let none = analyzer.analyze_at("eastmoney", &raw, DataType::Price, None, now());
        assert_eq!(none.consistency, 0.5);
    }

    #[test]
    fn test_out_of_range_fields_reported() {
        let raw = clean_quote(now()).with("volume", -5).with("change_pct", 75.0);
        let m = QualityAnalyzer::default().analyze_at("sina", &raw, DataType::Price, None, now());

        assert!((m.validity - 0.5).abs() < 1e-9);
        assert!(m.degradations.contains(&Degradation::OutOfRange {
            field: "volume".into(),
            value: -5.0
        }));
        assert!(m.degradations.contains(&Degradation::OutOfRange {
            field: "change_pct".into(),
            value: 75.0
        }));
        assert!(m.accuracy < 1.0);
    }

    #[test]
    fn test_reliability_comes_from_health_view() {
        let health = StaticHealth::new().with("eastmoney", HealthState::Healthy, Some(0.9));
        let analyzer = QualityAnalyzer::default().with_health(Arc::new(health));

        let known = analyzer.analyze_at("eastmoney", &clean_quote(now()), DataType::Price, None, now());
        assert!((known.reliability - 0.9).abs() < 1e-9);

        let unknown = analyzer.analyze_at("unlisted", &clean_quote(now()), DataType::Price, None, now());
        assert!((unknown.reliability - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_news_observation() {
        let raw = RawObservation::from_value(json!({
            "title": "Central bank trims reserve requirement ratio",
            "summary": "The cut releases long-term liquidity into the banking system.",
            "publish_time": now().to_rfc3339(),
            "source": "xinhua",
            "url": "https://news.example.com/rrr-cut",
            "relevance_score": 0.8
        }));
        let m = QualityAnalyzer::default().analyze_at("news_feed", &raw, DataType::News, Some(0.8), now());
        assert!((m.completeness - 1.0).abs() < 1e-9);
        assert!((m.validity - 1.0).abs() < 1e-9);
        assert!(m.grade >= QualityGrade::Good);
    }

    #[test]
    fn test_grade_never_drops_as_score_rises() {
        let config = QualityConfig::default();
        let mut previous = QualityGrade::Poor;
        for i in 0..=1000 {
            let grade = config.grade_thresholds.grade_for(i as f64 / 1000.0);
            assert!(grade >= previous);
            previous = grade;
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = QualityConfig::default();
        config.consistency_tolerance = 0.0;
        assert!(matches!(QualityAnalyzer::new(config), Err(FusionError::Configuration(_))));
    }

    #[test]
    fn test_history_trend_summary() {
        let analyzer = QualityAnalyzer::default();
        let history = QualityHistory::default();
        let base = analyzer.analyze_at("tushare", &clean_quote(now()), DataType::Price, None, now());

        for i in 0..20 {
            let mut m = base.clone();
            m.overall_score = if i < 10 { 0.5 } else { 0.8 };
            history.record(&m);
        }

        let summary = history.summary(Some("tushare"));
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].trend, QualityTrend::Improving);
        assert!((summary[0].change - 0.3).abs() < 1e-9);
        assert_eq!(summary[0].sample_count, 20);

        let recent = history.recent_average("tushare", DataType::Price, 5).unwrap();
        assert!((recent - 0.8).abs() < 1e-9);
        assert!(history.summary(Some("sina")).is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let history = QualityHistory::new(3);
        let m = QualityAnalyzer::default().analyze_at("sina", &clean_quote(now()), DataType::Price, None, now());
        for _ in 0..10 {
            history.record(&m);
        }
        assert_eq!(history.sample_count("sina", DataType::Price), 3);
    }
}

#[cfg(test)]
mod composite_scoring_tests {
    use crate::{AuxSignal, ScoreCategory, ScoringConfig, ScoringSystem, SourceObservation};
    use chrono::{DateTime, Duration, Utc};
    use fusion_core::{DataType, FusionAlgorithm, FusionError, RawObservation, SharedWeights};
    use fusion_engine::{FusionConfig, FusionEngine};
    use quality_analyzer::{QualityAnalyzer, QualityHistory};
    use serde_json::json;
    use std::sync::Arc;

    fn system() -> ScoringSystem {
        let engine = FusionEngine::new(FusionConfig::default(), SharedWeights::default()).unwrap();
        ScoringSystem::new(ScoringConfig::default(), QualityAnalyzer::default(), engine).unwrap()
    }

    fn quote(source: &str, price: f64, now: DateTime<Utc>) -> SourceObservation {
        let volume = 20_000_000.0;
        let raw = RawObservation::from_value(json!({
            "name": "Ping An Bank",
            "current_price": price,
            "open": 10.10,
            "high": 10.60,
            "low": 10.00,
            "prev_close": 10.00,
            "change_pct": (price - 10.0) / 10.0 * 100.0,
            "volume": volume,
            "turnover": volume * price,
            "timestamp": now.to_rfc3339(),
        }));
        SourceObservation::new(source, raw).with_confidence(0.9).with_latency_ms(120.0)
    }

    fn financials(now: DateTime<Utc>) -> SourceObservation {
        let raw = RawObservation::from_value(json!({
            "pe_ratio": 6.5,
            "pb_ratio": 0.7,
            "roe": 11.0,
            "profit_margin": 28.0,
            "revenue_growth": -2.0,
            "debt_to_equity": 1.1,
            "timestamp": now.to_rfc3339(),
        }));
        SourceObservation::new("tushare", raw).with_data_type(DataType::Fundamental)
    }

    fn news(now: DateTime<Utc>) -> Vec<AuxSignal> {
        vec![
            AuxSignal::new("cls", 0.6, 0.9, now - Duration::hours(2)).with_headline("Net interest margin beats"),
            AuxSignal::new("sina", 0.4, 0.7, now - Duration::hours(5)),
            AuxSignal::new("xueqiu", -0.2, 0.5, now - Duration::hours(30)),
        ]
    }

    #[test]
    fn test_full_score() {
        let now = Utc::now();
        let observations = vec![
            quote("eastmoney", 10.50, now),
            quote("sina", 10.51, now),
            quote("tencent", 10.49, now),
            financials(now),
        ];
        let result = system().score_at("000001", &observations, &news(now), now).unwrap();

        assert_eq!(result.symbol, "000001");
        assert_eq!(result.categories.len(), 5);
        assert_eq!(result.quality.len(), 4);
        assert!((0.0..=100.0).contains(&result.overall_score));
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!((result.metric("current_price").unwrap() - 10.50).abs() < 0.01);
        assert!(result.metric("pe_ratio").is_some());

        let weighted: f64 = result.categories.values().map(|c| c.weight * c.score).sum();
        assert!((result.overall_score - weighted).abs() < 1e-9);
        let weight_sum: f64 = result.categories.values().map(|c| c.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);

        let config = ScoringConfig::default();
        assert_eq!(result.grade, config.grades.lookup(result.overall_score));
        assert_eq!(result.recommendation, config.recommendations.lookup(result.overall_score));
        let risk = result.category(ScoreCategory::Risk).unwrap().score;
        assert_eq!(result.risk_level, config.risk_levels.lookup(risk));

        assert!(!result.key_factors.is_empty());
        assert!(result.key_factors.len() <= 5);
        assert!(result.key_factors[0].starts_with("Strength:"));
    }

    #[test]
    fn test_empty_observations_rejected() {
        let result = system().score("000001", &[], &[]);
        assert!(matches!(result, Err(FusionError::InvalidInput(_))));
    }

    #[test]
    fn test_no_news_gives_neutral_sentiment() {
        let now = Utc::now();
        let result = system()
            .score_at("000001", &[quote("eastmoney", 10.5, now)], &[], now)
            .unwrap();
        let sentiment = result.category(ScoreCategory::Sentiment).unwrap();
        assert_eq!(sentiment.score, 50.0);

        let fundamental = result.category(ScoreCategory::Fundamental).unwrap();
        assert_eq!(fundamental.score, 50.0);
        assert!(fundamental.confidence < 0.5);
    }

    #[test]
    fn test_outlier_quote_is_contained() {
        let now = Utc::now();
        let observations = vec![
            quote("eastmoney", 10.50, now),
            quote("sina", 10.52, now),
            quote("broken_feed", 99.0, now),
        ];
        let result = system().score_at("000001", &observations, &[], now).unwrap();

        let price = &result.fused_metrics["current_price"];
        assert_eq!(price.resolved_algorithm, FusionAlgorithm::MedianFusion);
        assert!((price.fused_value - 10.52).abs() < 1e-9);

        let score_of = |source: &str| {
            result
                .quality
                .iter()
                .find(|q| q.source == source)
                .map(|q| q.consistency)
                .unwrap()
        };
        assert!(score_of("broken_feed") < score_of("eastmoney"));
    }

    #[test]
    fn test_records_into_history() {
        let now = Utc::now();
        let history = Arc::new(QualityHistory::new(50));
        let system = system().with_history(history.clone());

        system
            .score_at("000001", &[quote("eastmoney", 10.5, now), financials(now)], &[], now)
            .unwrap();
        assert_eq!(history.sample_count("eastmoney", DataType::Price), 1);
        assert_eq!(history.sample_count("tushare", DataType::Fundamental), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ScoringConfig::default();
        config.category_weights.technical = 0.5;
        let engine = FusionEngine::new(FusionConfig::default(), SharedWeights::default()).unwrap();
        assert!(matches!(
            ScoringSystem::new(config, QualityAnalyzer::default(), engine),
            Err(FusionError::Configuration(_))
        ));
    }
}

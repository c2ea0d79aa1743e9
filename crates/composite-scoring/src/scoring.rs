use chrono::{DateTime, Utc};
use fusion_core::stats::median;
use fusion_core::{DataPoint, DataType, FusionError, QualityMetrics, Result, TimestampField};
use fusion_engine::FusionEngine;
use quality_analyzer::{QualityAnalyzer, QualityHistory};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::categories::{self, FusedMetrics};
use crate::config::ScoringConfig;
use crate::types::{AuxSignal, CategoryScore, ScoreCategory, ScoringResult, SourceObservation};

/// Metrics fused per symbol and the data type each one is fused under.
const METRICS: [(&str, DataType); 12] = [
    ("current_price", DataType::Price),
    ("change_pct", DataType::Price),
    ("high", DataType::Price),
    ("low", DataType::Price),
    ("volume", DataType::Volume),
    ("turnover", DataType::Volume),
    ("pe_ratio", DataType::Fundamental),
    ("pb_ratio", DataType::Fundamental),
    ("roe", DataType::Fundamental),
    ("profit_margin", DataType::Fundamental),
    ("revenue_growth", DataType::Fundamental),
    ("debt_to_equity", DataType::Fundamental),
];

const MAX_KEY_FACTORS: usize = 5;

/// Produces symbol-level scores from multi-source observations.
pub struct ScoringSystem {
    config: ScoringConfig,
    analyzer: QualityAnalyzer,
    engine: FusionEngine,
    history: Option<Arc<QualityHistory>>,
}

impl ScoringSystem {
    pub fn new(config: ScoringConfig, analyzer: QualityAnalyzer, engine: FusionEngine) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            analyzer,
            engine,
            history: None,
        })
    }

    /// Every analyzed record is also recorded into `history`.
    pub fn with_history(mut self, history: Arc<QualityHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, symbol: &str, observations: &[SourceObservation], aux: &[AuxSignal]) -> Result<ScoringResult> {
        self.score_at(symbol, observations, aux, Utc::now())
    }

    /// Same as [`score`](Self::score) with an explicit clock.
    pub fn score_at(
        &self,
        symbol: &str,
        observations: &[SourceObservation],
        aux: &[AuxSignal],
        now: DateTime<Utc>,
    ) -> Result<ScoringResult> {
        if observations.is_empty() {
            return Err(FusionError::invalid(format!("no observations to score for {}", symbol)));
        }

        let quality = self.analyze(observations, now);
        let fused_metrics = self.fuse_metrics(observations, &quality, now)?;

        let mut categories = BTreeMap::new();
        for mut score in [
            categories::technical(&fused_metrics),
            categories::fundamental(&fused_metrics),
            categories::sentiment(aux, self.config.sentiment_half_life_hours, now),
            categories::quality(&quality),
            categories::risk(&fused_metrics),
        ] {
            score.weight = self.config.category_weights.get(score.category);
            categories.insert(score.category, score);
        }

        let overall_score = categories
            .values()
            .map(|c| c.weight * c.score)
            .sum::<f64>()
            .clamp(0.0, 100.0);
        let confidence = categories.values().map(|c| c.confidence).sum::<f64>() / categories.len() as f64;
        let risk_score = categories
            .get(&ScoreCategory::Risk)
            .map(|c| c.score)
            .unwrap_or(50.0);

        let result = ScoringResult {
            symbol: symbol.to_string(),
            overall_score,
            grade: self.config.grades.lookup(overall_score),
            confidence,
            recommendation: self.config.recommendations.lookup(overall_score),
            risk_level: self.config.risk_levels.lookup(risk_score),
            key_factors: key_factors(&categories),
            categories,
            fused_metrics,
            quality,
            timestamp: now,
        };

        info!(
            symbol = %symbol,
            score = result.overall_score,
            grade = result.grade.to_label(),
            sources = observations.len(),
            "Composite score computed"
        );
        Ok(result)
    }

    /// Grades every record. Quotes are checked against the cross-source
    /// median price.
    fn analyze(&self, observations: &[SourceObservation], now: DateTime<Utc>) -> Vec<QualityMetrics> {
        let prices: Vec<f64> = observations
            .iter()
            .filter(|o| o.data_type == DataType::Price)
            .filter_map(|o| o.raw.number("current_price"))
            .filter(|p| p.is_finite())
            .collect();
        let reference = if prices.len() >= 2 { Some(median(&prices)) } else { None };

        observations
            .iter()
            .map(|o| {
                let reference = if o.data_type == DataType::Price { reference } else { None };
                let metrics = self.analyzer.analyze_at(&o.source, &o.raw, o.data_type, reference, now);
                if let Some(history) = &self.history {
                    history.record(&metrics);
                }
                metrics
            })
            .collect()
    }

    fn fuse_metrics(
        &self,
        observations: &[SourceObservation],
        quality: &[QualityMetrics],
        now: DateTime<Utc>,
    ) -> Result<FusedMetrics> {
        let mut fused = BTreeMap::new();
        for (name, data_type) in METRICS {
            let points: Vec<DataPoint> = observations
                .iter()
                .zip(quality)
                .filter_map(|(o, q)| {
                    let value = o.raw.number(name)?;
                    let timestamp = match o.raw.timestamp() {
                        TimestampField::Parsed(t) => t,
                        TimestampField::Missing | TimestampField::Malformed(_) => now,
                    };
                    Some(
                        DataPoint::new(o.source.clone(), data_type, value)
                            .with_quality(q.overall_score)
                            .with_confidence(o.confidence.unwrap_or(1.0))
                            .with_latency_ms(o.latency_ms.unwrap_or(0.0))
                            .with_timestamp(timestamp),
                    )
                })
                .collect();
            if points.is_empty() {
                continue;
            }

            match self.engine.fuse(&points, self.config.fusion_algorithm) {
                Ok(result) => {
                    debug!(metric = name, value = result.fused_value, "Metric fused");
                    fused.insert(name.to_string(), result);
                }
                // Every value non-finite; the metric is simply unavailable.
                Err(FusionError::InvalidInput(e)) => {
                    warn!(metric = name, error = %e, "Metric skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(fused)
    }
}

fn key_factors(categories: &BTreeMap<ScoreCategory, CategoryScore>) -> Vec<String> {
    let mut ranked: Vec<&CategoryScore> = categories.values().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut factors = Vec::new();
    if let Some(best) = ranked.first() {
        factors.push(format!("Strength: {} {:.1}", best.category.as_str(), best.score));
    }
    if ranked.len() > 1 {
        if let Some(worst) = ranked.last().filter(|c| c.score < 60.0) {
            factors.push(format!("Concern: {} {:.1}", worst.category.as_str(), worst.score));
        }
    }
    for c in ScoreCategory::ALL.iter().filter_map(|k| categories.get(k)) {
        factors.extend(c.factors.iter().take(2).cloned());
    }
    factors.truncate(MAX_KEY_FACTORS);
    factors
}

//! Category subscores on a 0 to 100 scale.
//!
//! Each function reads fused metrics (or signals) and returns the subscore
//! with its confidence, the components it averaged and short factor notes.

use chrono::{DateTime, Utc};
use fusion_core::stats::{linear_decay, mean};
use fusion_core::{FusionResult, QualityMetrics};
use std::collections::BTreeMap;

use crate::types::{AuxSignal, CategoryScore, ScoreCategory};

pub type FusedMetrics = BTreeMap<String, FusionResult>;

const TECHNICAL_METRICS: [&str; 6] = ["current_price", "change_pct", "volume", "turnover", "high", "low"];
const FUNDAMENTAL_METRICS: [&str; 6] = [
    "pe_ratio",
    "pb_ratio",
    "roe",
    "profit_margin",
    "revenue_growth",
    "debt_to_equity",
];
/// Polarity beyond which a signal counts as positive or negative.
const POLARITY_BAND: f64 = 0.1;

fn metric(metrics: &FusedMetrics, name: &str) -> Option<f64> {
    metrics.get(name).map(|r| r.fused_value).filter(|v| v.is_finite())
}

fn category(
    category: ScoreCategory,
    components: BTreeMap<String, f64>,
    confidence: f64,
    factors: Vec<String>,
) -> CategoryScore {
    let values: Vec<f64> = components.values().copied().collect();
    let score = if values.is_empty() { 50.0 } else { mean(&values) };
    CategoryScore {
        category,
        score: score.clamp(0.0, 100.0),
        confidence: confidence.clamp(0.0, 1.0),
        weight: 0.0,
        components,
        factors,
    }
}

/// Momentum, volume coherence and position in the day's range.
pub fn technical(metrics: &FusedMetrics) -> CategoryScore {
    let mut components = BTreeMap::new();
    let mut factors = Vec::new();

    let change = metric(metrics, "change_pct");
    let momentum = match change {
        Some(c) if c > 5.0 => 85.0,
        Some(c) if c > 2.0 => 75.0,
        Some(c) if c > 0.0 => 65.0,
        Some(c) if c > -2.0 => 55.0,
        Some(c) if c > -5.0 => 45.0,
        Some(_) => 30.0,
        None => 50.0,
    };
    components.insert("momentum".to_string(), momentum);
    if let Some(c) = change {
        factors.push(format!("Price momentum {:+.2}%", c));
    }

    let price = metric(metrics, "current_price");
    let volume_score = match (metric(metrics, "volume"), metric(metrics, "turnover"), price) {
        (Some(v), Some(t), Some(p)) if v > 0.0 && p > 0.0 => {
            let ratio = t / (v * p);
            if (0.8..=1.2).contains(&ratio) {
                80.0
            } else {
                60.0
            }
        }
        (Some(v), _, _) if v > 0.0 => 70.0,
        _ => 30.0,
    };
    components.insert("volume".to_string(), volume_score);

    let position = match (price, metric(metrics, "high"), metric(metrics, "low")) {
        (Some(p), Some(h), Some(l)) if h > l => {
            let pos = ((p - l) / (h - l)).clamp(0.0, 1.0);
            factors.push(format!("Price at {:.0}% of day range", pos * 100.0));
            match pos {
                x if x >= 0.8 => 85.0,
                x if x >= 0.6 => 75.0,
                x if x >= 0.4 => 65.0,
                x if x >= 0.2 => 45.0,
                _ => 35.0,
            }
        }
        _ => 50.0,
    };
    components.insert("position".to_string(), position);

    let present: Vec<&FusionResult> = TECHNICAL_METRICS.iter().filter_map(|m| metrics.get(*m)).collect();
    let coverage = present.len() as f64 / TECHNICAL_METRICS.len() as f64;
    let fused_confidence = mean(&present.iter().map(|r| r.confidence).collect::<Vec<_>>());
    category(ScoreCategory::Technical, components, coverage * fused_confidence, factors)
}

/// Signal list from financial ratios, netted by weight.
pub fn fundamental(metrics: &FusedMetrics) -> CategoryScore {
    let mut signals: Vec<(&str, u32, bool)> = Vec::new();
    let growth = metric(metrics, "revenue_growth");

    if let Some(pe) = metric(metrics, "pe_ratio").filter(|pe| *pe > 0.0) {
        let (low_pe, high_pe) = match growth {
            Some(g) if g > 25.0 => (25.0, 60.0),
            Some(g) if g > 10.0 => (18.0, 40.0),
            _ => (15.0, 30.0),
        };
        if pe < low_pe {
            signals.push(("Low P/E", 3, true));
        } else if pe > high_pe {
            signals.push(("High P/E", 2, false));
        }
    }
    if let Some(pb) = metric(metrics, "pb_ratio") {
        if pb > 0.0 && pb < 1.0 {
            signals.push(("Trading below book", 2, true));
        } else if pb > 5.0 {
            signals.push(("Rich price to book", 1, false));
        }
    }
    if let Some(roe) = metric(metrics, "roe") {
        if roe > 15.0 {
            signals.push(("Strong ROE", 3, true));
        } else if roe < 5.0 {
            signals.push(("Weak ROE", 2, false));
        }
    }
    if let Some(margin) = metric(metrics, "profit_margin") {
        if margin > 20.0 {
            signals.push(("High profit margin", 3, true));
        } else if margin < 5.0 {
            signals.push(("Low profit margin", 2, false));
        }
    }
    if let Some(g) = growth {
        if g > 10.0 {
            signals.push(("Strong revenue growth", 3, true));
        } else if g < -5.0 {
            signals.push(("Revenue decline", 3, false));
        }
    }
    if let Some(d2e) = metric(metrics, "debt_to_equity") {
        if d2e < 0.5 {
            signals.push(("Low debt", 2, true));
        } else if d2e > 2.0 {
            signals.push(("High debt", 3, false));
        }
    }

    let present = FUNDAMENTAL_METRICS.iter().filter(|m| metrics.contains_key(**m)).count();
    if present == 0 {
        return category(
            ScoreCategory::Fundamental,
            BTreeMap::from([("no_data".to_string(), 50.0)]),
            0.2,
            vec!["No financial ratios available".to_string()],
        );
    }

    let total: u32 = signals.iter().map(|(_, w, _)| w).sum();
    let net: i64 = signals
        .iter()
        .map(|(_, w, bullish)| if *bullish { *w as i64 } else { -(*w as i64) })
        .sum();
    let balance = if total > 0 { net as f64 / total as f64 } else { 0.0 };

    let signal_confidence = match signals.len() {
        n if n >= 5 => 0.8,
        n if n >= 3 => 0.6,
        _ => 0.4,
    };
    let completeness = present as f64 / FUNDAMENTAL_METRICS.len() as f64;
    let confidence = (signal_confidence * 0.6 + completeness * 0.4).min(0.95);

    let factors = signals.iter().map(|(name, _, _)| name.to_string()).collect();
    category(
        ScoreCategory::Fundamental,
        BTreeMap::from([("signal_balance".to_string(), 50.0 + 50.0 * balance)]),
        confidence,
        factors,
    )
}

/// Relevance- and recency-weighted polarity, coverage and distribution.
pub fn sentiment(signals: &[AuxSignal], half_life_hours: f64, now: DateTime<Utc>) -> CategoryScore {
    let usable: Vec<&AuxSignal> = signals
        .iter()
        .filter(|s| s.polarity.is_finite() && s.relevance.is_finite())
        .collect();
    if usable.is_empty() {
        return category(
            ScoreCategory::Sentiment,
            BTreeMap::from([("no_data".to_string(), 50.0)]),
            0.3,
            vec!["No news signals".to_string()],
        );
    }

    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for s in &usable {
        let age_hours = (now - s.timestamp).num_seconds() as f64 / 3600.0;
        let recency = if age_hours <= 0.0 {
            1.0
        } else {
            0.5_f64.powf(age_hours / half_life_hours)
        };
        let w = s.relevance.clamp(0.0, 1.0) * recency;
        weighted += s.polarity.clamp(-1.0, 1.0) * w;
        total_weight += w;
    }
    let polarity = if total_weight > f64::EPSILON {
        weighted / total_weight
    } else {
        0.0
    };

    let n = usable.len();
    let coverage = match n {
        n if n >= 20 => 85.0,
        n if n >= 10 => 75.0,
        n if n >= 5 => 65.0,
        _ => 50.0,
    };
    let positive = usable.iter().filter(|s| s.polarity > POLARITY_BAND).count() as f64 / n as f64;
    let negative = usable.iter().filter(|s| s.polarity < -POLARITY_BAND).count() as f64 / n as f64;
    let distribution = if positive > 0.6 {
        85.0
    } else if positive > 0.4 {
        70.0
    } else if negative > 0.6 {
        30.0
    } else {
        55.0
    };

    let components = BTreeMap::from([
        ("news_sentiment".to_string(), 50.0 + 50.0 * polarity),
        ("news_coverage".to_string(), coverage),
        ("sentiment_distribution".to_string(), distribution),
    ]);
    let factors = vec![
        format!("News polarity {:+.2} over {} items", polarity, n),
        format!("{:.0}% positive", positive * 100.0),
    ];
    let confidence = 0.3 + 0.5 * (n as f64 / 10.0).min(1.0);
    category(ScoreCategory::Sentiment, components, confidence, factors)
}

/// Mean analyzer score of the contributing records.
pub fn quality(metrics: &[QualityMetrics]) -> CategoryScore {
    let scores: Vec<f64> = metrics.iter().map(|m| m.overall_score * 100.0).collect();
    let mut sources: Vec<&str> = metrics.iter().map(|m| m.source.as_str()).collect();
    sources.sort_unstable();
    sources.dedup();

    let mut components = BTreeMap::new();
    if !scores.is_empty() {
        components.insert("data_quality".to_string(), mean(&scores));
    }
    let factors = metrics
        .iter()
        .map(|m| format!("{}: {}", m.source, m.grade.to_label()))
        .collect();
    let confidence = (sources.len() as f64 / 5.0).min(1.0);
    category(ScoreCategory::Quality, components, confidence, factors)
}

/// Higher is safer: agreement between sources, calm price action, liquidity.
pub fn risk(metrics: &FusedMetrics) -> CategoryScore {
    let mut components = BTreeMap::new();
    let mut factors = Vec::new();

    if let Some(price) = metrics.get("current_price") {
        let agreement = linear_decay(price.dispersion, 0.002, 0.05) * 100.0;
        components.insert("source_agreement".to_string(), agreement);
        factors.push(format!("Cross-source dispersion {:.4}", price.dispersion));
    }

    if let Some(change) = metric(metrics, "change_pct") {
        let abs = change.abs();
        let volatility = match abs {
            a if a > 10.0 => 30.0,
            a if a > 5.0 => 50.0,
            a if a > 2.0 => 70.0,
            _ => 85.0,
        };
        components.insert("volatility".to_string(), volatility);
        factors.push(format!("Daily move {:.2}%", abs));
    }

    if let (Some(p), Some(h), Some(l)) = (
        metric(metrics, "current_price"),
        metric(metrics, "high"),
        metric(metrics, "low"),
    ) {
        if p > 0.0 && h >= l {
            let range_pct = (h - l) / p * 100.0;
            let range_score = match range_pct {
                r if r > 10.0 => 30.0,
                r if r > 6.0 => 50.0,
                r if r > 3.0 => 70.0,
                _ => 85.0,
            };
            components.insert("intraday_range".to_string(), range_score);
        }
    }

    if let Some(volume) = metric(metrics, "volume") {
        let liquidity = match volume {
            v if v > 50_000_000.0 => 85.0,
            v if v > 10_000_000.0 => 70.0,
            v if v > 1_000_000.0 => 50.0,
            _ => 30.0,
        };
        components.insert("liquidity".to_string(), liquidity);
    }

    let confidence = if components.is_empty() { 0.3 } else { 0.7 };
    category(ScoreCategory::Risk, components, confidence, factors)
}

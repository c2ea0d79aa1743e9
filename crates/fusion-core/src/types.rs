use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::FusionError;

/// Kind of quantity a provider reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Price,
    Volume,
    Sentiment,
    News,
    Technical,
    Fundamental,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::Price,
        DataType::Volume,
        DataType::Sentiment,
        DataType::News,
        DataType::Technical,
        DataType::Fundamental,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Price => "price",
            DataType::Volume => "volume",
            DataType::Sentiment => "sentiment",
            DataType::News => "news",
            DataType::Technical => "technical",
            DataType::Fundamental => "fundamental",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider's observation of a quantity. Built once by the producer and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub source: String,
    pub data_type: DataType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub quality_score: f64, // 0.0 to 1.0
    pub confidence: f64,    // 0.0 to 1.0
    pub latency_ms: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl DataPoint {
    pub fn new(source: impl Into<String>, data_type: DataType, value: f64) -> Self {
        Self {
            source: source.into(),
            data_type,
            value,
            timestamp: Utc::now(),
            quality_score: 1.0,
            confidence: 1.0,
            latency_ms: 0.0,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = quality_score;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Quality bucket derived from an overall score. Ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityGrade {
    pub fn to_label(&self) -> &'static str {
        match self {
            QualityGrade::Poor => "Poor",
            QualityGrade::Fair => "Fair",
            QualityGrade::Good => "Good",
            QualityGrade::Excellent => "Excellent",
        }
    }
}

/// Non-fatal problem found in an observation. Carried in results instead of
/// failing the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    MissingFields { fields: Vec<String> },
    MissingTimestamp,
    MalformedTimestamp { raw: String },
    StaleTimestamp { age_secs: i64 },
    OutOfRange { field: String, value: f64 },
    NonFiniteValue { source: String },
    ClampedScore { source: String, field: String, value: f64 },
}

/// Per (source, data type) quality assessment of a single observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub source: String,
    pub data_type: DataType,
    pub completeness: f64,
    pub accuracy: f64,
    pub timeliness: f64,
    pub consistency: f64,
    pub validity: f64,
    pub reliability: f64,
    pub overall_score: f64,
    pub grade: QualityGrade,
    #[serde(default)]
    pub degradations: Vec<Degradation>,
    pub analyzed_at: DateTime<Utc>,
}

impl QualityMetrics {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Closed set of fusion strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionAlgorithm {
    WeightedAverage,
    MedianFusion,
    ConfidenceWeighted,
    QualityWeighted,
    AdaptiveFusion,
}

impl FusionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            FusionAlgorithm::WeightedAverage => "weighted_average",
            FusionAlgorithm::MedianFusion => "median_fusion",
            FusionAlgorithm::ConfidenceWeighted => "confidence_weighted",
            FusionAlgorithm::QualityWeighted => "quality_weighted",
            FusionAlgorithm::AdaptiveFusion => "adaptive_fusion",
        }
    }
}

impl fmt::Display for FusionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FusionAlgorithm {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted_average" => Ok(FusionAlgorithm::WeightedAverage),
            "median_fusion" | "median" => Ok(FusionAlgorithm::MedianFusion),
            "confidence_weighted" => Ok(FusionAlgorithm::ConfidenceWeighted),
            "quality_weighted" => Ok(FusionAlgorithm::QualityWeighted),
            "adaptive_fusion" | "adaptive" => Ok(FusionAlgorithm::AdaptiveFusion),
            other => Err(FusionError::invalid(format!("unknown fusion algorithm '{}'", other))),
        }
    }
}

/// Output of one fusion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub data_type: DataType,
    pub fused_value: f64,
    pub confidence: f64,
    pub quality_score: f64,
    /// Algorithm the caller asked for
    pub algorithm: FusionAlgorithm,
    /// Algorithm actually applied (only differs for adaptive fusion)
    pub resolved_algorithm: FusionAlgorithm,
    /// Coefficient of variation (or IQR spread near zero) of the inputs
    pub dispersion: f64,
    pub source_weights: BTreeMap<String, f64>,
    pub contributing_sources: Vec<String>,
    #[serde(default)]
    pub degradations: Vec<Degradation>,
    pub timestamp: DateTime<Utc>,
}

/// Categorical trust level of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown,
    Healthy,
    Warning,
    Critical,
    Offline,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Warning => "warning",
            HealthState::Critical => "critical",
            HealthState::Offline => "offline",
        }
    }

    /// Warning, Critical or Offline.
    pub fn is_degraded(&self) -> bool {
        matches!(self, HealthState::Warning | HealthState::Critical | HealthState::Offline)
    }

    /// Desirability contribution used by weight allocation.
    pub fn to_score(&self) -> f64 {
        match self {
            HealthState::Healthy => 1.0,
            HealthState::Warning => 0.7,
            HealthState::Unknown => 0.5,
            HealthState::Critical => 0.3,
            HealthState::Offline => 0.1,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health snapshot of one provider as maintained by the reliability monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub source: String,
    pub state: HealthState,
    pub critical: bool,
    pub last_latency_ms: Option<f64>,
    pub last_success: Option<bool>,
    pub consecutive_failures: u32,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub uptime: f64,
    pub data_quality: Option<f64>,
    pub total_probes: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl ProviderHealth {
    pub fn unknown(source: impl Into<String>, critical: bool) -> Self {
        Self {
            source: source.into(),
            state: HealthState::Unknown,
            critical,
            last_latency_ms: None,
            last_success: None,
            consecutive_failures: 0,
            success_rate: 0.0,
            avg_latency_ms: 0.0,
            uptime: 0.0,
            data_quality: None,
            total_probes: 0,
            error_count: 0,
            last_error: None,
            last_checked: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parsing_is_closed() {
        assert_eq!(
            "quality_weighted".parse::<FusionAlgorithm>().unwrap(),
            FusionAlgorithm::QualityWeighted
        );
        assert_eq!(
            " Adaptive ".parse::<FusionAlgorithm>().unwrap(),
            FusionAlgorithm::AdaptiveFusion
        );
        assert!(matches!(
            "mean_of_means".parse::<FusionAlgorithm>(),
            Err(FusionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_grade_ordering() {
        assert!(QualityGrade::Poor < QualityGrade::Fair);
        assert!(QualityGrade::Good < QualityGrade::Excellent);
    }

    #[test]
    fn test_degradation_serializes_with_kind_tag() {
        let d = Degradation::OutOfRange { field: "volume".into(), value: -1.0 };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "out_of_range");
        assert_eq!(json["field"], "volume");
    }
}

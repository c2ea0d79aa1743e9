use chrono::{DateTime, Utc};
use fusion_core::{DataType, FusionResult, QualityMetrics, RawObservation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One provider's raw record for the scored symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceObservation {
    pub source: String,
    pub raw: RawObservation,
    /// Rule table the record is graded against. Quotes by default.
    pub data_type: DataType,
    pub confidence: Option<f64>,
    pub latency_ms: Option<f64>,
}

impl SourceObservation {
    pub fn new(source: impl Into<String>, raw: RawObservation) -> Self {
        Self {
            source: source.into(),
            raw,
            data_type: DataType::Price,
            confidence: None,
            latency_ms: None,
        }
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// News or social item already reduced to a polarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxSignal {
    pub source: String,
    pub polarity: f64,  // -1.0 to 1.0
    pub relevance: f64, // 0.0 to 1.0
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub headline: String,
}

impl AuxSignal {
    pub fn new(source: impl Into<String>, polarity: f64, relevance: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            polarity,
            relevance,
            timestamp,
            headline: String::new(),
        }
    }

    pub fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = headline.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Technical,
    Fundamental,
    Sentiment,
    Quality,
    Risk,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 5] = [
        ScoreCategory::Technical,
        ScoreCategory::Fundamental,
        ScoreCategory::Sentiment,
        ScoreCategory::Quality,
        ScoreCategory::Risk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreCategory::Technical => "technical",
            ScoreCategory::Fundamental => "fundamental",
            ScoreCategory::Sentiment => "sentiment",
            ScoreCategory::Quality => "quality",
            ScoreCategory::Risk => "risk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: ScoreCategory,
    pub score: f64,      // 0 to 100
    pub confidence: f64, // 0.0 to 1.0
    pub weight: f64,
    pub components: BTreeMap<String, f64>,
    #[serde(default)]
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D")]
    D,
}

impl Grade {
    pub fn to_label(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::D => "D",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    CautiousBuy,
    Hold,
    Avoid,
}

impl Recommendation {
    pub fn to_label(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::CautiousBuy => "Cautious Buy",
            Recommendation::Hold => "Hold",
            Recommendation::Avoid => "Avoid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    MediumHigh,
    High,
}

/// Symbol-level score built from fused metrics, quality and sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub symbol: String,
    pub overall_score: f64, // 0 to 100
    pub grade: Grade,
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
    pub categories: BTreeMap<ScoreCategory, CategoryScore>,
    pub key_factors: Vec<String>,
    /// Fused value per metric name
    pub fused_metrics: BTreeMap<String, FusionResult>,
    pub quality: Vec<QualityMetrics>,
    pub timestamp: DateTime<Utc>,
}

impl ScoringResult {
    pub fn category(&self, category: ScoreCategory) -> Option<&CategoryScore> {
        self.categories.get(&category)
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.fused_metrics.get(name).map(|r| r.fused_value)
    }
}

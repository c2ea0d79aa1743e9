//! Static per-data-type rule tables: which fields matter, which cross-field
//! checks apply and which ranges are valid.

use fusion_core::{DataType, RawObservation};

/// A field and how much its absence hurts completeness.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub importance: f64,
}

const fn field(name: &'static str, importance: f64) -> FieldSpec {
    FieldSpec { name, importance }
}

/// Cross-field sanity check feeding the accuracy dimension.
#[derive(Debug, Clone, Copy)]
pub enum Check {
    Positive(&'static str),
    /// `low <= value <= high`
    Ordered {
        low: &'static str,
        value: &'static str,
        high: &'static str,
    },
    /// Reported change_pct agrees with the move from prev_close, in percentage points.
    ChangeMatchesPrevClose { tolerance_pct: f64 },
    /// turnover is close to volume * current_price.
    TurnoverMatchesVolume { min_ratio: f64 },
    MaxDecimals { field: &'static str, places: i32 },
    AbsAtMost { field: &'static str, limit: f64 },
    MinChars { field: &'static str, chars: usize },
}

/// Declared validity bound for one field.
#[derive(Debug, Clone, Copy)]
pub enum Bound {
    Range {
        field: &'static str,
        min: f64,
        max: f64,
        min_exclusive: bool,
    },
    HttpUrl(&'static str),
    MinChars { field: &'static str, chars: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundOutcome {
    NotApplicable,
    Satisfied,
    /// Text bounds report NaN as the offending value.
    Violated { field: &'static str, value: f64 },
}

#[derive(Debug)]
pub struct RuleSet {
    /// Field holding the observation's headline value.
    pub value_field: &'static str,
    pub required: &'static [FieldSpec],
    pub optional: &'static [FieldSpec],
    pub checks: &'static [Check],
    pub bounds: &'static [Bound],
}

const fn range(field: &'static str, min: f64, max: f64) -> Bound {
    Bound::Range { field, min, max, min_exclusive: false }
}

static PRICE_RULES: RuleSet = RuleSet {
    value_field: "current_price",
    required: &[field("current_price", 1.0), field("volume", 0.8), field("change_pct", 0.9)],
    optional: &[
        field("open", 0.7),
        field("high", 0.7),
        field("low", 0.7),
        field("prev_close", 0.6),
        field("turnover", 0.5),
        field("name", 0.3),
    ],
    checks: &[
        Check::Positive("current_price"),
        Check::Ordered { low: "low", value: "current_price", high: "high" },
        Check::Ordered { low: "low", value: "open", high: "high" },
        Check::ChangeMatchesPrevClose { tolerance_pct: 0.5 },
        Check::TurnoverMatchesVolume { min_ratio: 0.8 },
        Check::MaxDecimals { field: "current_price", places: 4 },
        Check::AbsAtMost { field: "change_pct", limit: 20.0 },
    ],
    bounds: &[
        Bound::Range { field: "current_price", min: 0.0, max: 1e6, min_exclusive: true },
        range("volume", 0.0, f64::INFINITY),
        range("turnover", 0.0, f64::INFINITY),
        range("change_pct", -50.0, 50.0),
    ],
};

static VOLUME_RULES: RuleSet = RuleSet {
    value_field: "volume",
    required: &[field("volume", 1.0)],
    optional: &[field("turnover", 0.5), field("current_price", 0.7)],
    checks: &[
        Check::TurnoverMatchesVolume { min_ratio: 0.8 },
        Check::MaxDecimals { field: "volume", places: 0 },
    ],
    bounds: &[range("volume", 0.0, f64::INFINITY), range("turnover", 0.0, f64::INFINITY)],
};

static SENTIMENT_RULES: RuleSet = RuleSet {
    value_field: "score",
    required: &[field("score", 1.0)],
    optional: &[field("confidence", 0.6), field("sample_size", 0.4)],
    checks: &[Check::Positive("sample_size")],
    bounds: &[
        range("score", -1.0, 1.0),
        range("confidence", 0.0, 1.0),
        range("sample_size", 0.0, f64::INFINITY),
    ],
};

static NEWS_RULES: RuleSet = RuleSet {
    value_field: "relevance_score",
    required: &[field("title", 1.0)],
    optional: &[
        field("summary", 0.8),
        field("publish_time", 0.8),
        field("source", 0.8),
        field("url", 0.5),
        field("relevance_score", 0.5),
    ],
    checks: &[
        Check::MinChars { field: "title", chars: 10 },
        Check::MinChars { field: "summary", chars: 20 },
    ],
    bounds: &[
        Bound::MinChars { field: "title", chars: 5 },
        Bound::HttpUrl("url"),
        range("relevance_score", 0.0, 1.0),
    ],
};

static TECHNICAL_RULES: RuleSet = RuleSet {
    value_field: "value",
    required: &[field("value", 1.0)],
    optional: &[field("indicator", 0.5), field("period", 0.3)],
    checks: &[
        Check::Ordered { low: "lower_band", value: "value", high: "upper_band" },
        Check::Positive("period"),
    ],
    bounds: &[range("rsi", 0.0, 100.0), range("period", 1.0, f64::INFINITY)],
};

static FUNDAMENTAL_RULES: RuleSet = RuleSet {
    value_field: "pe_ratio",
    required: &[field("pe_ratio", 1.0), field("roe", 0.9)],
    optional: &[
        field("pb_ratio", 0.7),
        field("profit_margin", 0.7),
        field("revenue_growth", 0.6),
        field("debt_to_equity", 0.6),
    ],
    checks: &[
        Check::Positive("pb_ratio"),
        Check::AbsAtMost { field: "profit_margin", limit: 100.0 },
        Check::AbsAtMost { field: "roe", limit: 100.0 },
    ],
    bounds: &[
        range("pb_ratio", 0.0, f64::INFINITY),
        range("debt_to_equity", 0.0, f64::INFINITY),
        range("profit_margin", -100.0, 100.0),
        range("roe", -100.0, 100.0),
    ],
};

pub fn rules_for(data_type: DataType) -> &'static RuleSet {
    match data_type {
        DataType::Price => &PRICE_RULES,
        DataType::Volume => &VOLUME_RULES,
        DataType::Sentiment => &SENTIMENT_RULES,
        DataType::News => &NEWS_RULES,
        DataType::Technical => &TECHNICAL_RULES,
        DataType::Fundamental => &FUNDAMENTAL_RULES,
    }
}

impl Check {
    /// `None` when an input field is missing.
    pub fn evaluate(&self, raw: &RawObservation) -> Option<bool> {
        match *self {
            Check::Positive(f) => raw.number(f).map(|v| v > 0.0),
            Check::Ordered { low, value, high } => {
                let (l, v, h) = (raw.number(low)?, raw.number(value)?, raw.number(high)?);
                Some(l <= v && v <= h)
            }
            Check::ChangeMatchesPrevClose { tolerance_pct } => {
                let current = raw.number("current_price")?;
                let prev = raw.number("prev_close").filter(|p| *p > 0.0)?;
                let reported = raw.number("change_pct")?;
                let computed = (current - prev) / prev * 100.0;
                Some((computed - reported).abs() <= tolerance_pct)
            }
            Check::TurnoverMatchesVolume { min_ratio } => {
                let volume = raw.number("volume").filter(|v| *v > 0.0)?;
                let price = raw.number("current_price").filter(|p| *p > 0.0)?;
                let turnover = raw.number("turnover").filter(|t| *t > 0.0)?;
                let estimated = volume * price;
                Some(estimated.min(turnover) / estimated.max(turnover) >= min_ratio)
            }
            Check::MaxDecimals { field, places } => raw.number(field).map(|v| {
                let scaled = v * 10f64.powi(places);
                (scaled - scaled.round()).abs() < 1e-6
            }),
            Check::AbsAtMost { field, limit } => raw.number(field).map(|v| v.abs() <= limit),
            Check::MinChars { field, chars } => {
                raw.text(field).map(|t| t.trim().chars().count() >= chars)
            }
        }
    }
}

impl Bound {
    pub fn field(&self) -> &'static str {
        match *self {
            Bound::Range { field, .. } | Bound::MinChars { field, .. } => field,
            Bound::HttpUrl(field) => field,
        }
    }

    pub fn evaluate(&self, raw: &RawObservation) -> BoundOutcome {
        let name = self.field();
        if !raw.is_present(name) {
            return BoundOutcome::NotApplicable;
        }
        let ok = match *self {
            Bound::Range { min, max, min_exclusive, .. } => match raw.number(name) {
                Some(v) => {
                    let above = if min_exclusive { v > min } else { v >= min };
                    if above && v <= max {
                        true
                    } else {
                        return BoundOutcome::Violated { field: name, value: v };
                    }
                }
                None => false,
            },
            Bound::HttpUrl(_) => raw
                .text(name)
                .map(|u| u.starts_with("http://") || u.starts_with("https://"))
                .unwrap_or(false),
            Bound::MinChars { chars, .. } => raw
                .text(name)
                .map(|t| t.trim().chars().count() >= chars)
                .unwrap_or(false),
        };
        if ok {
            BoundOutcome::Satisfied
        } else {
            BoundOutcome::Violated { field: name, value: f64::NAN }
        }
    }
}

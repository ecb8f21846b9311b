//! Summary statistics: wire shapes, the tagged flat/seasonal model and the
//! table presenter.

pub mod panel;
pub mod presenter;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use panel::{ShownSummary, SummaryPanel};
pub use presenter::{
    PairGroup, PairSplit, Placeholder, RenderedTables, SeasonSection, StatRow, StatTable,
    SummaryPresenter, TableBody, split_pairs,
};

use crate::error::{AppError, AppResult};

/// The four summary numbers of one trace. Absent or non-numeric values are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatValues {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mean: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub std: Option<f64>,
}

/// Accepts numbers, numeric strings (including `"NaN"`) and null.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Trace key -> statistics.
pub type StatBucket = BTreeMap<String, StatValues>;

/// Raw and ratio buckets for one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatPair {
    #[serde(default, rename = "raw_statistics")]
    pub raw: StatBucket,
    #[serde(default, rename = "ratio_statistics")]
    pub ratio: StatBucket,
}

impl StatPair {
    #[must_use]
    pub fn bucket(&self, target: StatsTarget) -> &StatBucket {
        match target {
            StatsTarget::Raw => &self.raw,
            StatsTarget::Ratio => &self.ratio,
        }
    }
}

/// Which bucket of a summary an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsTarget {
    Raw,
    Ratio,
}

impl StatsTarget {
    pub const ALL: [Self; 2] = [Self::Raw, Self::Ratio];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Ratio => "ratio",
        }
    }
}

impl fmt::Display for StatsTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatsTarget {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "ratio" => Ok(Self::Ratio),
            other => Err(AppError::InvalidOption {
                field: "statsTarget",
                value: other.to_string(),
            }),
        }
    }
}

/// A summary response with an explicit discriminant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SummaryStats {
    Flat {
        raw: StatBucket,
        ratio: StatBucket,
    },
    /// Season code -> buckets. A season without data maps to empty buckets.
    Seasonal {
        seasons: BTreeMap<String, StatPair>,
    },
}

impl SummaryStats {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Flat { .. } => "flat",
            Self::Seasonal { .. } => "seasonal",
        }
    }

    #[must_use]
    pub fn is_seasonal(&self) -> bool {
        matches!(self, Self::Seasonal { .. })
    }

    /// Whether any statistics exist for `target`.
    #[must_use]
    pub fn has_stats(&self, target: StatsTarget) -> bool {
        match self {
            Self::Flat { raw, ratio } => match target {
                StatsTarget::Raw => !raw.is_empty(),
                StatsTarget::Ratio => !ratio.is_empty(),
            },
            Self::Seasonal { seasons } => seasons.values().any(|s| !s.bucket(target).is_empty()),
        }
    }

    /// JSON sent as `summaryStats` when requesting an archive.
    ///
    /// Flat summaries send the target's bucket; seasonal ones send every season
    /// in its wire shape.
    #[must_use]
    pub fn payload(&self, target: StatsTarget) -> Value {
        let value = match self {
            Self::Flat { raw, ratio } => match target {
                StatsTarget::Raw => serde_json::to_value(raw),
                StatsTarget::Ratio => serde_json::to_value(ratio),
            },
            Self::Seasonal { seasons } => serde_json::to_value(seasons),
        };
        value.unwrap_or(Value::Null)
    }
}

/// Wire form of `/get_summary_stats`. Which keys are present decides the shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub raw_statistics: Option<StatBucket>,
    #[serde(default)]
    pub ratio_statistics: Option<StatBucket>,
    #[serde(default)]
    pub gseason_stats: Option<BTreeMap<String, StatPair>>,
}

impl SummaryResponse {
    /// # Errors
    ///
    /// Returns `AppError::Backend` for `{error}` bodies and for bodies carrying
    /// neither shape.
    pub fn into_stats(self) -> AppResult<SummaryStats> {
        if let Some(message) = self.error {
            return Err(AppError::Backend(message));
        }
        if let Some(seasons) = self.gseason_stats {
            return Ok(SummaryStats::Seasonal { seasons });
        }
        if self.raw_statistics.is_none() && self.ratio_statistics.is_none() {
            return Err(AppError::Backend(
                "summary response carries no statistics".to_string(),
            ));
        }
        Ok(SummaryStats::Flat {
            raw: self.raw_statistics.unwrap_or_default(),
            ratio: self.ratio_statistics.unwrap_or_default(),
        })
    }
}

/// Decoded trace key.
///
/// Full keys look like `VWC_1_raw_S1_T` or `VWC_1_ratio_S1_S2_T`; short ones
/// like `VWC_S1_S2_T` are accepted too. The last token is always the logger
/// location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceKey {
    pub variable: String,
    pub depth: Option<String>,
    pub kind: Option<StatsTarget>,
    pub strips: Vec<String>,
    pub logger: String,
}

impl TraceKey {
    #[must_use]
    pub fn parse(key: &str) -> Self {
        let tokens: Vec<&str> = key.split('_').collect();
        let logger = tokens.last().copied().unwrap_or_default().to_string();
        let body = &tokens[..tokens.len().saturating_sub(1)];

        let kind_at = body.iter().position(|t| *t == "raw" || *t == "ratio");
        let first_strip = body.iter().position(|t| is_strip_token(t));

        let strips: Vec<String> = first_strip
            .map(|at| {
                body[at..]
                    .iter()
                    .take_while(|t| is_strip_token(t))
                    .map(|t| (*t).to_string())
                    .collect()
            })
            .unwrap_or_default();

        let kind = match kind_at.map(|at| body[at]) {
            Some("raw") => Some(StatsTarget::Raw),
            Some("ratio") => Some(StatsTarget::Ratio),
            _ if strips.len() >= 2 => Some(StatsTarget::Ratio),
            _ if strips.len() == 1 => Some(StatsTarget::Raw),
            _ => None,
        };

        // Variable names may themselves contain underscores (temp_soil_5cm)
        let marker = kind_at.or(first_strip).unwrap_or(body.len().min(1));
        let (variable_end, depth) = match marker.checked_sub(1).map(|at| body[at]) {
            Some(token) if kind_at.is_some() && is_depth_token(token) => {
                (marker - 1, Some(token.to_string()))
            }
            _ => (marker, None),
        };
        let variable = if variable_end == 0 {
            tokens.first().copied().unwrap_or_default().to_string()
        } else {
            body[..variable_end].join("_")
        };

        Self {
            variable,
            depth,
            kind,
            strips,
            logger,
        }
    }

    /// `S1_S2`, `S3`, or `unknown` when the key names no strip.
    #[must_use]
    pub fn strips_label(&self) -> String {
        if self.strips.is_empty() {
            "unknown".to_string()
        } else {
            self.strips.join("_")
        }
    }
}

fn is_strip_token(token: &str) -> bool {
    token
        .strip_prefix('S')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn is_depth_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

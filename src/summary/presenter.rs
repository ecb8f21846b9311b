use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::{StatBucket, StatValues, StatsTarget, SummaryStats, TraceKey};
use crate::catalog::{
    Category, OptionCatalog, SEASON_GRANULARITY, is_temperature_variable, season_label_from_code,
};
use crate::coordinator::SummaryRequest;

/// Treated/untreated strip pairs that ratio statistics are reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PairGroup {
    #[serde(rename = "1/2")]
    S1S2,
    #[serde(rename = "3/4")]
    S3S4,
}

impl PairGroup {
    pub const ALL: [Self; 2] = [Self::S1S2, Self::S3S4];

    /// Substring a trace key must contain to belong to the group.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::S1S2 => "S1_S2",
            Self::S3S4 => "S3_S4",
        }
    }

    #[must_use]
    pub fn heading(self) -> &'static str {
        match self {
            Self::S1S2 => "Ratio S1/S2",
            Self::S3S4 => "Ratio S3/S4",
        }
    }

    /// The group a ratio trace key belongs to. `S1_S2` is checked first, so a
    /// key never lands in both.
    #[must_use]
    pub fn of(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| key.contains(g.marker()))
    }
}

/// Ratio entries partitioned by pair group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairSplit {
    pub s1_s2: StatBucket,
    pub s3_s4: StatBucket,
    pub unmatched: StatBucket,
}

impl PairSplit {
    #[must_use]
    pub fn group(&self, group: PairGroup) -> &StatBucket {
        match group {
            PairGroup::S1S2 => &self.s1_s2,
            PairGroup::S3S4 => &self.s3_s4,
        }
    }
}

#[must_use]
pub fn split_pairs(ratio: &StatBucket) -> PairSplit {
    let mut split = PairSplit::default();
    for (key, values) in ratio {
        let slot = match PairGroup::of(key) {
            Some(PairGroup::S1S2) => &mut split.s1_s2,
            Some(PairGroup::S3S4) => &mut split.s3_s4,
            None => &mut split.unmatched,
        };
        slot.insert(key.clone(), *values);
    }
    split
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Placeholder {
    NoData,
    RatioNotMeaningful,
}

impl Placeholder {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::NoData => "No data available",
            Self::RatioNotMeaningful => "Ratio not meaningful for temperature",
        }
    }
}

/// One formatted table row. Numbers are already rendered at fixed precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRow {
    pub key: String,
    pub label: String,
    pub min: String,
    pub mean: String,
    pub max: String,
    pub std: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TableBody {
    Rows(Vec<StatRow>),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatTable {
    pub heading: String,
    pub body: TableBody,
}

impl StatTable {
    #[must_use]
    pub fn rows(&self) -> &[StatRow] {
        match &self.body {
            TableBody::Rows(rows) => rows,
            TableBody::Placeholder(_) => &[],
        }
    }

    #[must_use]
    pub fn placeholder(&self) -> Option<Placeholder> {
        match self.body {
            TableBody::Placeholder(p) => Some(p),
            TableBody::Rows(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonSection {
    pub code: String,
    pub label: String,
    pub expanded: bool,
    pub tables: Vec<StatTable>,
}

/// Complete contents of the summary region.
///
/// Tables always come in the order raw, ratio 1/2, ratio 3/4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderedTables {
    Flat { tables: Vec<StatTable> },
    Seasonal { sections: Vec<SeasonSection> },
}

impl RenderedTables {
    /// Every table, flattening season sections in display order.
    #[must_use]
    pub fn tables(&self) -> Vec<&StatTable> {
        match self {
            Self::Flat { tables } => tables.iter().collect(),
            Self::Seasonal { sections } => sections.iter().flat_map(|s| &s.tables).collect(),
        }
    }
}

pub struct SummaryPresenter {
    catalog: Arc<OptionCatalog>,
    precision: usize,
}

impl SummaryPresenter {
    #[must_use]
    pub fn new(catalog: Arc<OptionCatalog>, precision: usize) -> Self {
        Self { catalog, precision }
    }

    #[must_use]
    pub fn present(&self, stats: &SummaryStats, variable: &str) -> RenderedTables {
        match stats {
            SummaryStats::Flat { raw, ratio } => RenderedTables::Flat {
                tables: self.tables(raw, ratio, variable),
            },
            SummaryStats::Seasonal { seasons } => {
                let mut codes: Vec<&String> = seasons.keys().collect();
                // Catalog order first; unknown codes after, in key order
                codes.sort_by_key(|code| self.catalog.season_position(code).unwrap_or(usize::MAX));

                let sections = codes
                    .into_iter()
                    .enumerate()
                    .map(|(i, code)| {
                        let pair = &seasons[code];
                        SeasonSection {
                            code: code.clone(),
                            label: self
                                .catalog
                                .season(code)
                                .map_or_else(|| season_label_from_code(code), |s| s.label.clone()),
                            expanded: i == 0,
                            tables: self.tables(&pair.raw, &pair.ratio, variable),
                        }
                    })
                    .collect();
                RenderedTables::Seasonal { sections }
            }
        }
    }

    /// `"{granularity} Summary for {axis label}, {strip}, {depth}, {year}"`
    #[must_use]
    pub fn title(&self, request: &SummaryRequest) -> String {
        let granularity = if request.granularity == SEASON_GRANULARITY {
            "Seasonal"
        } else {
            self.catalog
                .label(Category::Granularities, &request.granularity)
        };
        let depth = if self.catalog.contains(Category::Depths, &request.depth) {
            self.catalog
                .label(Category::Depths, &request.depth)
                .to_string()
        } else {
            format!("{} in", request.depth)
        };
        format!(
            "{granularity} Summary for {}, {}, {depth}, {}",
            self.catalog.axis_label(&request.variable),
            self.catalog.label(Category::Strips, &request.strip),
            request.year
        )
    }

    fn tables(&self, raw: &StatBucket, ratio: &StatBucket, variable: &str) -> Vec<StatTable> {
        let split = split_pairs(ratio);
        if !split.unmatched.is_empty() {
            tracing::debug!(
                count = split.unmatched.len(),
                "Ratio entries outside pair groups"
            );
        }

        let ratio_placeholder = if is_temperature_variable(variable) {
            Placeholder::RatioNotMeaningful
        } else {
            Placeholder::NoData
        };

        let mut tables = vec![self.table("Raw Data", raw, StatsTarget::Raw, Placeholder::NoData)];
        tables.extend(PairGroup::ALL.into_iter().map(|group| {
            self.table(
                group.heading(),
                split.group(group),
                StatsTarget::Ratio,
                ratio_placeholder,
            )
        }));
        tables
    }

    fn table(
        &self,
        heading: &str,
        bucket: &StatBucket,
        target: StatsTarget,
        empty: Placeholder,
    ) -> StatTable {
        let body = if bucket.is_empty() {
            TableBody::Placeholder(empty)
        } else {
            TableBody::Rows(
                bucket
                    .iter()
                    .map(|(key, values)| self.row(key, values, target))
                    .collect(),
            )
        };
        StatTable {
            heading: heading.to_string(),
            body,
        }
    }

    fn row(&self, key: &str, values: &StatValues, target: StatsTarget) -> StatRow {
        let trace = TraceKey::parse(key);
        let variable = self.catalog.label(Category::Variables, &trace.variable);
        let logger = self.catalog.label(Category::LoggerLocations, &trace.logger);
        let label = match target {
            StatsTarget::Raw => format!("{variable} ({logger})"),
            StatsTarget::Ratio if trace.strips.len() >= 2 => {
                format!("{variable} {} ({logger})", trace.strips.join("/"))
            }
            StatsTarget::Ratio => format!("{variable} ratio ({logger})"),
        };
        StatRow {
            key: key.to_string(),
            label,
            min: format_stat(values.min, self.precision),
            mean: format_stat(values.mean, self.precision),
            max: format_stat(values.max, self.precision),
            std: format_stat(values.std, self.precision),
        }
    }
}

/// Fixed-precision number, or `NA` when absent or not a number.
#[must_use]
pub fn format_stat(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{v:.precision$}"),
        _ => "NA".to_string(),
    }
}

impl fmt::Display for StatTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.heading)?;
        match &self.body {
            TableBody::Placeholder(p) => writeln!(f, "  {}", p.message()),
            TableBody::Rows(rows) => {
                let width = rows
                    .iter()
                    .map(|r| r.label.len())
                    .max()
                    .unwrap_or(0)
                    .max("Trace".len());
                writeln!(
                    f,
                    "  {:<width$}  {:>10}  {:>10}  {:>10}  {:>10}",
                    "Trace", "Min", "Mean", "Max", "Std"
                )?;
                for r in rows {
                    writeln!(
                        f,
                        "  {:<width$}  {:>10}  {:>10}  {:>10}  {:>10}",
                        r.label, r.min, r.mean, r.max, r.std
                    )?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for RenderedTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat { tables } => {
                for table in tables {
                    writeln!(f, "{table}")?;
                }
            }
            Self::Seasonal { sections } => {
                for section in sections {
                    let marker = if section.expanded { "[-]" } else { "[+]" };
                    writeln!(f, "{marker} {}", section.label)?;
                    if section.expanded {
                        for table in &section.tables {
                            writeln!(f, "{table}")?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::catalog::{Category, OptionCatalog, WATER_CONTENT_VARIABLE, is_temperature_variable};
use crate::selection::{Context, SelectionState, TraceGrouping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    Raw,
    Ratio,
}

impl PlotKind {
    pub const ALL: [Self; 2] = [Self::Raw, Self::Ratio];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Ratio => "ratio",
        }
    }

    /// DOM id of the chart container this kind renders into.
    #[must_use]
    pub fn container_id(self) -> &'static str {
        match self {
            Self::Raw => "raw-plot",
            Self::Ratio => "ratio-plot",
        }
    }

    /// The chart whose axes mirror this one.
    #[must_use]
    pub fn partner(self) -> Self {
        match self {
            Self::Raw => Self::Ratio,
            Self::Ratio => Self::Raw,
        }
    }

    /// Endpoint path; season granularity uses the bucketed variant.
    #[must_use]
    pub fn route(self, season: bool) -> &'static str {
        match (self, season) {
            (Self::Raw, false) => "plot_raw",
            (Self::Raw, true) => "plot_raw_gseason",
            (Self::Ratio, false) => "plot_ratio",
            (Self::Ratio, true) => "plot_ratio_gseason",
        }
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent request streams, each with its own sequence counter per context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Raw,
    Ratio,
    Summary,
}

impl Stream {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Ratio => "ratio",
            Self::Summary => "summary",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Raw => 0,
            Self::Ratio => 1,
            Self::Summary => 2,
        }
    }
}

impl From<PlotKind> for Stream {
    fn from(kind: PlotKind) -> Self {
        match kind {
            PlotKind::Raw => Self::Raw,
            PlotKind::Ratio => Self::Ratio,
        }
    }
}

/// Weather overlay switches. `None` means the flag is omitted from the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_temperature: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_rainfall: Option<bool>,
}

impl OverlayFlags {
    /// Air temperature accompanies temperature plots and rainfall accompanies
    /// water-content plots; season buckets get neither.
    #[must_use]
    pub fn for_selection(variable: &str, season: bool) -> Self {
        if season {
            return Self::default();
        }
        Self {
            include_temperature: is_temperature_variable(variable).then_some(true),
            include_rainfall: (variable == WATER_CONTENT_VARIABLE).then_some(true),
        }
    }
}

/// Immutable snapshot of a selection, addressed to one plot endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotRequest {
    #[serde(skip)]
    pub context: Context,
    #[serde(skip)]
    pub kind: PlotKind,
    #[serde(skip)]
    pub seq: u64,
    #[serde(skip)]
    pub season: bool,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub granularity: String,
    pub variable: String,
    pub strip: String,
    pub logger_location: String,
    pub depth: String,
    #[serde(rename = "traceOption")]
    pub trace_grouping: TraceGrouping,
    #[serde(flatten)]
    pub overlays: OverlayFlags,
}

impl PlotRequest {
    #[must_use]
    pub fn new(context: Context, kind: PlotKind, seq: u64, state: &SelectionState) -> Self {
        let season = state.is_season_granularity();
        let range = state.date_range();
        Self {
            context,
            kind,
            seq,
            season,
            year: state.year,
            start_date: range.map(|(start, _)| start),
            end_date: range.map(|(_, end)| end),
            granularity: state.granularity.clone(),
            variable: state.variable.clone(),
            strip: state.strip.clone(),
            logger_location: state.logger_location.clone(),
            depth: state.depth.clone(),
            trace_grouping: state.trace_grouping,
            overlays: OverlayFlags::for_selection(&state.variable, season),
        }
    }

    #[must_use]
    pub fn route(&self) -> &'static str {
        self.kind.route(self.season)
    }

    /// Chart title, e.g. `Daily Data Plot for Soil Moisture in Strip S1, 2024 (Top Logger)`.
    #[must_use]
    pub fn title(&self, catalog: &OptionCatalog) -> String {
        let granularity = if self.season {
            "Growing Season"
        } else {
            catalog.label(Category::Granularities, &self.granularity)
        };
        let variable = catalog.label(Category::Variables, &self.variable);
        let suffix = match self.trace_grouping {
            TraceGrouping::ByDepth => format!(
                "({} Logger)",
                catalog.label(Category::LoggerLocations, &self.logger_location)
            ),
            TraceGrouping::ByLocation => {
                format!("({} Depth)", catalog.label(Category::Depths, &self.depth))
            }
        };
        match self.kind {
            PlotKind::Raw => format!(
                "{granularity} Data Plot for {variable} in Strip {}, {} {suffix}",
                self.strip, self.year
            ),
            PlotKind::Ratio => format!(
                "{granularity} Ratio Data Plot for {variable}, {} {suffix}",
                self.year
            ),
        }
    }
}

/// Snapshot of a selection for `/get_summary_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    #[serde(skip)]
    pub context: Context,
    #[serde(skip)]
    pub seq: u64,
    pub year: i32,
    pub granularity: String,
    pub variable: String,
    pub strip: String,
    pub depth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl SummaryRequest {
    #[must_use]
    pub fn new(context: Context, seq: u64, state: &SelectionState) -> Self {
        let range = state.date_range();
        Self {
            context,
            seq,
            year: state.year,
            granularity: state.granularity.clone(),
            variable: state.variable.clone(),
            strip: state.strip.clone(),
            depth: state.depth.clone(),
            start_date: range.map(|(start, _)| start),
            end_date: range.map(|(_, end)| end),
        }
    }
}

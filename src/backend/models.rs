use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response from `/get_defaults_and_options`.
///
/// Categories arrive either as bare values (`[2024, 2025]`, `["S1", "S2"]`)
/// or as `{value, label}` records; labels for bare values come from the
/// matching `*Mapping` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    #[serde(default)]
    pub years: Vec<Value>,
    #[serde(default)]
    pub strips: Vec<Value>,
    #[serde(default)]
    pub variables: Vec<Value>,
    #[serde(default)]
    pub depths: Vec<Value>,
    #[serde(default)]
    pub logger_locations: Vec<Value>,
    #[serde(default)]
    pub granularities: Vec<Value>,
    #[serde(default)]
    pub defaults: Option<CatalogDefaultsWire>,
    /// Season code -> `[start, end]` or `{label, start, end}`; order is significant
    #[serde(default, alias = "gseasonPeriods")]
    pub season_periods: Map<String, Value>,
    #[serde(default, alias = "variableLabels")]
    pub variable_name_mapping: Map<String, Value>,
    /// Axis labels with units, e.g. "Volumetric Water Content (%)"
    #[serde(default)]
    pub label_name_mapping: Map<String, Value>,
    #[serde(default)]
    pub granularity_name_mapping: Map<String, Value>,
    #[serde(default)]
    pub strip_name_mapping: Map<String, Value>,
    #[serde(default)]
    pub logger_location_mapping: Map<String, Value>,
    #[serde(default)]
    pub depth_mapping: Map<String, Value>,
}

/// The `defaults` block. Values may be strings or numbers on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDefaultsWire {
    #[serde(default)]
    pub year: Value,
    #[serde(default)]
    pub variable: Value,
    #[serde(default)]
    pub strip: Value,
    #[serde(default)]
    pub granularity: Value,
    #[serde(default)]
    pub depth: Value,
    #[serde(default)]
    pub logger_location: Value,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Response from `/get_end_date?year=`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndDateResponse {
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Chart data/layout payload as produced by the plotting endpoints.
///
/// Opaque to the client apart from the x-axis range, which the chart
/// adapter rewrites when mirroring pan/zoom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub layout: Map<String, Value>,
}

impl Figure {
    /// Layout title text, whether sent as a bare string or as `{text: ...}`.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self.layout.get("title")? {
            Value::String(s) => Some(s),
            Value::Object(obj) => obj.get("text").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Names of the traces in drawing order.
    #[must_use]
    pub fn trace_names(&self) -> Vec<&str> {
        self.data
            .iter()
            .filter_map(|trace| trace.get("name").and_then(Value::as_str))
            .collect()
    }
}

/// Body of `/download_summary_data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDownloadRequest {
    pub summary_stats: Value,
    pub year: i32,
    pub variable: String,
    pub strip: String,
    pub depth: String,
    pub granularity: String,
    #[serde(rename = "type")]
    pub stats_type: String,
}

/// Query parameters of `/download_data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDownloadQuery {
    pub data_type: String,
    pub year: i32,
    pub variable: String,
    pub strip: String,
    pub granularity: String,
    pub logger_location: String,
    pub depth: String,
    pub trace_option: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Render a scalar JSON value (string or number) as the string form used
/// for option values. Anything else has no option value.
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

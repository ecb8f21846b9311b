//! Option catalog: the enumerated values every selector may take.
//!
//! Loaded once per session from `/get_defaults_and_options` and shared
//! read-only afterwards. Loading never touches selection state; callers build
//! fresh state from [`OptionCatalog::defaults`] only once a load succeeded.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::backend::Backend;
use crate::backend::models::{CatalogDefaultsWire, CatalogResponse, scalar_to_string};
use crate::error::{AppError, AppResult};

/// Granularity value that switches to season-bucketed statistics.
pub const SEASON_GRANULARITY: &str = "gseason";

/// Variables for which a treated/untreated ratio carries no meaning.
pub const TEMPERATURE_VARIABLES: [&str; 4] = ["T", "temp_air", "temp_soil_5cm", "temp_soil_15cm"];

/// Volumetric water content; gets the rainfall overlay.
pub const WATER_CONTENT_VARIABLE: &str = "VWC";

#[must_use]
pub fn is_temperature_variable(variable: &str) -> bool {
    TEMPERATURE_VARIABLES.contains(&variable)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Years,
    Strips,
    Variables,
    Depths,
    LoggerLocations,
    Granularities,
}

impl Category {
    pub const ALL: [Self; 6] = [
        Self::Years,
        Self::Strips,
        Self::Variables,
        Self::Depths,
        Self::LoggerLocations,
        Self::Granularities,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Years => "years",
            Self::Strips => "strips",
            Self::Variables => "variables",
            Self::Depths => "depths",
            Self::LoggerLocations => "loggerLocations",
            Self::Granularities => "granularities",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionEntry {
    pub value: String,
    pub label: String,
}

/// A month/day boundary of a growing season, independent of year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    /// Parse `"MM-DD"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (m, d) = s.trim().split_once('-')?;
        let month: u32 = m.parse().ok()?;
        let day: u32 = d.parse().ok()?;
        // 2000 is a leap year, so 02-29 is accepted here
        NaiveDate::from_ymd_opt(2000, month, day)?;
        Some(Self { month, day })
    }

    /// The concrete date in `year`, clamping Feb 29 to Feb 28 in non-leap years.
    #[must_use]
    pub fn in_year(self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .or_else(|| NaiveDate::from_ymd_opt(year, self.month, self.day.saturating_sub(1)))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonPeriod {
    pub code: String,
    pub label: String,
    pub start: MonthDay,
    pub end: MonthDay,
}

impl SeasonPeriod {
    /// Seasons whose start falls after their end (winter) begin in the
    /// previous calendar year.
    #[must_use]
    pub fn wraps_year(&self) -> bool {
        self.start > self.end
    }

    /// First and last day of this season for the trial `year`.
    #[must_use]
    pub fn bounds(&self, year: i32) -> (NaiveDate, NaiveDate) {
        let start_year = if self.wraps_year() { year - 1 } else { year };
        (self.start.in_year(start_year), self.end.in_year(year))
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate, year: i32) -> bool {
        let (start, end) = self.bounds(year);
        start <= date && date <= end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDefaults {
    pub year: i32,
    pub variable: String,
    pub strip: String,
    pub granularity: String,
    pub depth: String,
    pub logger_location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionCatalog {
    categories: HashMap<Category, Vec<OptionEntry>>,
    axis_labels: HashMap<String, String>,
    season_periods: Vec<SeasonPeriod>,
    defaults: CatalogDefaults,
}

impl OptionCatalog {
    /// Fetch and normalize the catalog.
    ///
    /// Safe to call repeatedly: each call builds a brand-new catalog and
    /// nothing else is touched, so a failed reload leaves the previous one
    /// (and every selection built from it) intact.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CatalogUnavailable` if the backend is unreachable or
    /// the response lacks usable `defaults`.
    pub async fn load<B: Backend>(backend: &B) -> AppResult<Self> {
        let response = backend.fetch_catalog().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load option catalog");
            match e {
                AppError::CatalogUnavailable(msg) => AppError::CatalogUnavailable(msg),
                other => AppError::CatalogUnavailable(other.to_string()),
            }
        })?;

        let catalog = Self::from_response(response)?;
        tracing::info!(
            years = catalog.options(Category::Years).len(),
            variables = catalog.options(Category::Variables).len(),
            seasons = catalog.season_periods.len(),
            "Option catalog loaded"
        );
        Ok(catalog)
    }

    /// Normalize a raw backend response.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CatalogUnavailable` when `defaults` is missing, a
    /// default is not a member of its category, or a season period is malformed.
    pub fn from_response(response: CatalogResponse) -> AppResult<Self> {
        let wire_defaults = response
            .defaults
            .clone()
            .ok_or_else(|| AppError::CatalogUnavailable("response has no defaults".to_string()))?;

        let mut categories = HashMap::new();
        categories.insert(Category::Years, entries(&response.years, &Map::new()));
        categories.insert(
            Category::Strips,
            entries(&response.strips, &response.strip_name_mapping),
        );
        categories.insert(
            Category::Variables,
            entries(&response.variables, &response.variable_name_mapping),
        );
        categories.insert(
            Category::Depths,
            entries(&response.depths, &response.depth_mapping),
        );
        categories.insert(
            Category::LoggerLocations,
            entries(&response.logger_locations, &response.logger_location_mapping),
        );
        categories.insert(
            Category::Granularities,
            entries(&response.granularities, &response.granularity_name_mapping),
        );

        let axis_labels = response
            .label_name_mapping
            .iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|label| (k.clone(), label)))
            .collect();

        let season_periods = response
            .season_periods
            .iter()
            .map(|(code, value)| parse_season(code, value))
            .collect::<AppResult<Vec<_>>>()?;

        let defaults = resolve_defaults(&categories, &wire_defaults)?;

        Ok(Self {
            categories,
            axis_labels,
            season_periods,
            defaults,
        })
    }

    #[must_use]
    pub fn options(&self, category: Category) -> &[OptionEntry] {
        self.categories.get(&category).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, category: Category, value: &str) -> bool {
        self.options(category).iter().any(|o| o.value == value)
    }

    /// Human-readable label, falling back to the raw value.
    #[must_use]
    pub fn label<'a>(&'a self, category: Category, value: &'a str) -> &'a str {
        self.options(category)
            .iter()
            .find(|o| o.value == value)
            .map_or(value, |o| o.label.as_str())
    }

    /// Axis label (with units) for a variable, falling back to its label.
    #[must_use]
    pub fn axis_label<'a>(&'a self, variable: &'a str) -> &'a str {
        self.axis_labels
            .get(variable)
            .map_or_else(|| self.label(Category::Variables, variable), String::as_str)
    }

    #[must_use]
    pub fn defaults(&self) -> &CatalogDefaults {
        &self.defaults
    }

    /// Seasons in catalog order.
    #[must_use]
    pub fn season_periods(&self) -> &[SeasonPeriod] {
        &self.season_periods
    }

    #[must_use]
    pub fn season(&self, code: &str) -> Option<&SeasonPeriod> {
        self.season_periods.iter().find(|s| s.code == code)
    }

    #[must_use]
    pub fn season_position(&self, code: &str) -> Option<usize> {
        self.season_periods.iter().position(|s| s.code == code)
    }
}

fn resolve_defaults(
    categories: &HashMap<Category, Vec<OptionEntry>>,
    wire: &CatalogDefaultsWire,
) -> AppResult<CatalogDefaults> {
    let member = |category: Category, field: &str, value: &Value| -> AppResult<String> {
        let value = scalar_to_string(value).ok_or_else(|| {
            AppError::CatalogUnavailable(format!("defaults.{field} is missing"))
        })?;
        let known = categories
            .get(&category)
            .is_some_and(|opts| opts.iter().any(|o| o.value == value));
        if known {
            Ok(value)
        } else {
            Err(AppError::CatalogUnavailable(format!(
                "defaults.{field} = {value} is not one of {category}"
            )))
        }
    };

    let year_str = member(Category::Years, "year", &wire.year)?;
    let year: i32 = year_str.parse().map_err(|_| {
        AppError::CatalogUnavailable(format!("defaults.year = {year_str} is not a year"))
    })?;

    let parse_date = |raw: &Option<String>| -> Option<NaiveDate> {
        raw.as_deref().and_then(|s| s.parse().ok())
    };
    let start_date = parse_date(&wire.start_date)
        .filter(|d: &NaiveDate| d.year() == year)
        .unwrap_or_else(|| year_start(year));
    let end_date = parse_date(&wire.end_date)
        .filter(|d: &NaiveDate| *d >= start_date)
        .unwrap_or_else(|| year_end(year));

    Ok(CatalogDefaults {
        year,
        variable: member(Category::Variables, "variable", &wire.variable)?,
        strip: member(Category::Strips, "strip", &wire.strip)?,
        granularity: member(Category::Granularities, "granularity", &wire.granularity)?,
        depth: member(Category::Depths, "depth", &wire.depth)?,
        logger_location: member(
            Category::LoggerLocations,
            "loggerLocation",
            &wire.logger_location,
        )?,
        start_date,
        end_date,
    })
}

#[must_use]
pub fn year_start(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn year_end(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn entries(values: &[Value], labels: &Map<String, Value>) -> Vec<OptionEntry> {
    values
        .iter()
        .filter_map(|raw| {
            // Either {value, label} or a bare scalar
            if let Value::Object(obj) = raw {
                let value = obj.get("value").and_then(scalar_to_string)?;
                let label = obj
                    .get("label")
                    .and_then(scalar_to_string)
                    .or_else(|| labels.get(&value).and_then(scalar_to_string))
                    .unwrap_or_else(|| value.clone());
                return Some(OptionEntry { value, label });
            }
            let value = scalar_to_string(raw)?;
            let label = labels
                .get(&value)
                .and_then(scalar_to_string)
                .unwrap_or_else(|| value.clone());
            Some(OptionEntry { value, label })
        })
        .collect()
}

fn parse_season(code: &str, value: &Value) -> AppResult<SeasonPeriod> {
    let malformed =
        || AppError::CatalogUnavailable(format!("season period {code} is malformed: {value}"));

    let (label, start, end) = match value {
        Value::Array(items) if items.len() == 2 => {
            (None, items[0].as_str(), items[1].as_str())
        }
        Value::Object(obj) => (
            obj.get("label").and_then(Value::as_str),
            obj.get("start").and_then(Value::as_str),
            obj.get("end").and_then(Value::as_str),
        ),
        _ => return Err(malformed()),
    };

    let start = start.and_then(MonthDay::parse).ok_or_else(malformed)?;
    let end = end.and_then(MonthDay::parse).ok_or_else(malformed)?;

    Ok(SeasonPeriod {
        code: code.to_string(),
        label: label.map_or_else(|| season_label_from_code(code), str::to_string),
        start,
        end,
    })
}

/// `Q2_Early_Growing` -> `Early Growing`
#[must_use]
pub fn season_label_from_code(code: &str) -> String {
    code.split_once('_')
        .map_or(code, |(_, rest)| rest)
        .replace('_', " ")
}

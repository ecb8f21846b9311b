//! Per-context selection state.
//!
//! The `main` and `summary` views each own an independent [`SelectionState`].
//! Every value is validated against the shared [`OptionCatalog`]; a handful of
//! derived-field rules run on write (year -> date range, granularity -> date
//! range enabled or ignored).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::{Category, OptionCatalog, SEASON_GRANULARITY, year_end, year_start};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Main,
    Summary,
}

impl Context {
    pub const ALL: [Self; 2] = [Self::Main, Self::Summary];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Summary => "summary",
        }
    }

    #[must_use]
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Summary => 1,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How raw traces are split: one per depth at the selected logger, or one per
/// logger at the selected depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceGrouping {
    #[default]
    #[serde(rename = "depths")]
    ByDepth,
    #[serde(rename = "loggers")]
    ByLocation,
}

impl TraceGrouping {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ByDepth => "depths",
            Self::ByLocation => "loggers",
        }
    }
}

impl FromStr for TraceGrouping {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "depths" | "byDepth" => Ok(Self::ByDepth),
            "loggers" | "byLocation" => Ok(Self::ByLocation),
            other => Err(AppError::InvalidOption {
                field: Field::TraceGrouping.name(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Year,
    StartDate,
    EndDate,
    Granularity,
    Variable,
    Strip,
    LoggerLocation,
    Depth,
    TraceGrouping,
}

impl Field {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::StartDate => "startDate",
            Self::EndDate => "endDate",
            Self::Granularity => "granularity",
            Self::Variable => "variable",
            Self::Strip => "strip",
            Self::LoggerLocation => "loggerLocation",
            Self::Depth => "depth",
            Self::TraceGrouping => "traceGrouping",
        }
    }

    /// Catalog category the value must belong to. Dates and trace grouping
    /// are validated by shape instead.
    #[must_use]
    pub fn category(self) -> Option<Category> {
        match self {
            Self::Year => Some(Category::Years),
            Self::Granularity => Some(Category::Granularities),
            Self::Variable => Some(Category::Variables),
            Self::Strip => Some(Category::Strips),
            Self::LoggerLocation => Some(Category::LoggerLocations),
            Self::Depth => Some(Category::Depths),
            Self::StartDate | Self::EndDate | Self::TraceGrouping => None,
        }
    }
}

impl FromStr for Field {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Year,
            Self::StartDate,
            Self::EndDate,
            Self::Granularity,
            Self::Variable,
            Self::Strip,
            Self::LoggerLocation,
            Self::Depth,
            Self::TraceGrouping,
        ]
        .into_iter()
        .find(|f| f.name() == s)
        .ok_or_else(|| AppError::InvalidOption {
            field: "field",
            value: s.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub granularity: String,
    pub variable: String,
    pub strip: String,
    pub logger_location: String,
    pub depth: String,
    pub trace_grouping: TraceGrouping,
}

impl SelectionState {
    #[must_use]
    pub fn from_defaults(catalog: &OptionCatalog) -> Self {
        let d = catalog.defaults();
        Self {
            year: d.year,
            start_date: d.start_date,
            end_date: d.end_date,
            granularity: d.granularity.clone(),
            variable: d.variable.clone(),
            strip: d.strip.clone(),
            logger_location: d.logger_location.clone(),
            depth: d.depth.clone(),
            trace_grouping: TraceGrouping::default(),
        }
    }

    #[must_use]
    pub fn is_season_granularity(&self) -> bool {
        self.granularity == SEASON_GRANULARITY
    }

    /// Date-range fields are kept but ignored while season buckets are shown.
    #[must_use]
    pub fn date_range_enabled(&self) -> bool {
        !self.is_season_granularity()
    }

    /// The effective date filter, `None` under season granularity.
    #[must_use]
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.date_range_enabled()
            .then_some((self.start_date, self.end_date))
    }
}

/// A pending authoritative end-date lookup triggered by a year change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndDateLookup {
    pub context: Context,
    pub year: i32,
    /// Date-range generation at issue time.
    pub generation: u64,
}

#[derive(Debug)]
struct Slot {
    state: SelectionState,
    /// Bumped by every write to `year`, `startDate` or `endDate`.
    date_generation: u64,
}

/// Selection state for both contexts.
///
/// Each context sits behind its own lock; no operation on one context ever
/// reads or writes the other.
#[derive(Debug)]
pub struct SelectionStore {
    catalog: Arc<OptionCatalog>,
    slots: [Mutex<Slot>; 2],
}

impl SelectionStore {
    #[must_use]
    pub fn new(catalog: Arc<OptionCatalog>) -> Self {
        let initial = SelectionState::from_defaults(&catalog);
        let slot = |state| {
            Mutex::new(Slot {
                state,
                date_generation: 0,
            })
        };
        Self {
            slots: [slot(initial.clone()), slot(initial)],
            catalog,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<OptionCatalog> {
        &self.catalog
    }

    fn lock(&self, context: Context) -> MutexGuard<'_, Slot> {
        self.slots[context.index()]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn get(&self, context: Context) -> SelectionState {
        self.lock(context).state.clone()
    }

    /// Apply a user selection.
    ///
    /// Setting `year` resets `startDate` to Jan 1, provisionally sets
    /// `endDate` to Dec 31 and returns the lookup the caller should run for
    /// the authoritative end date (see [`Self::apply_end_date`]).
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidOption` if `value` is not in the catalog for
    /// `field` (or not a `YYYY-MM-DD` date for date fields). State is left
    /// unchanged.
    pub fn set(&self, context: Context, field: Field, value: &str) -> AppResult<Option<EndDateLookup>> {
        let value = value.trim();
        let invalid = || AppError::InvalidOption {
            field: field.name(),
            value: value.to_string(),
        };

        if let Some(category) = field.category()
            && !self.catalog.contains(category, value)
        {
            tracing::warn!(%context, field = field.name(), value, "Invalid option");
            return Err(invalid());
        }

        let parse_date = || {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                tracing::warn!(%context, field = field.name(), value, "Invalid date");
                invalid()
            })
        };

        let mut slot = self.lock(context);
        let mut lookup = None;
        match field {
            Field::Year => {
                let year: i32 = value.parse().map_err(|_| invalid())?;
                slot.date_generation += 1;
                slot.state.year = year;
                slot.state.start_date = year_start(year);
                slot.state.end_date = year_end(year);
                lookup = Some(EndDateLookup {
                    context,
                    year,
                    generation: slot.date_generation,
                });
            }
            Field::StartDate => {
                slot.state.start_date = parse_date()?;
                slot.date_generation += 1;
            }
            Field::EndDate => {
                slot.state.end_date = parse_date()?;
                slot.date_generation += 1;
            }
            Field::Granularity => {
                // Dates are left untouched so that leaving season granularity
                // restores the previous range.
                slot.state.granularity = value.to_string();
            }
            Field::Variable => slot.state.variable = value.to_string(),
            Field::Strip => slot.state.strip = value.to_string(),
            Field::LoggerLocation => slot.state.logger_location = value.to_string(),
            Field::Depth => slot.state.depth = value.to_string(),
            Field::TraceGrouping => slot.state.trace_grouping = value.parse()?,
        }

        tracing::debug!(
            %context,
            field = field.name(),
            value,
            date_range_enabled = slot.state.date_range_enabled(),
            "Selection changed"
        );
        Ok(lookup)
    }

    /// Settle an end-date lookup. `None` means the lookup failed and the
    /// Dec 31 fallback stands.
    ///
    /// Ignored (returns `false`) when the year or either date has been written
    /// since the lookup was issued, so a slow lookup can never overwrite a
    /// newer selection.
    pub fn apply_end_date(&self, lookup: EndDateLookup, end_date: Option<NaiveDate>) -> bool {
        let mut slot = self.lock(lookup.context);
        if slot.date_generation != lookup.generation {
            tracing::debug!(
                context = %lookup.context,
                requested_year = lookup.year,
                current_year = slot.state.year,
                issued = lookup.generation,
                latest = slot.date_generation,
                "Stale end date lookup discarded"
            );
            return false;
        }
        let end = end_date
            .filter(|d| *d >= slot.state.start_date)
            .unwrap_or_else(|| year_end(lookup.year));
        slot.state.end_date = end;
        true
    }
}

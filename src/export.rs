//! Export adapter: filenames, payloads and the download side effects.
//!
//! Plots and trace data are exported from the `main` context; summary data
//! from whatever the summary panel currently shows.

use reqwest::Url;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::backend::Backend;
use crate::backend::models::{DataDownloadQuery, SummaryDownloadRequest};
use crate::catalog::OptionCatalog;
use crate::coordinator::{PlotKind, SummaryRequest};
use crate::error::{AppError, AppResult};
use crate::render::{ChartRenderer, ChartSurface, ImageFormat};
use crate::selection::{Context, SelectionState, SelectionStore};
use crate::summary::{StatBucket, StatsTarget, SummaryPanel, SummaryStats, TraceKey};

/// Which series `/download_data` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Raw,
    Ratio,
    All,
}

impl DataKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Ratio => "ratio",
            Self::All => "all",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "ratio" => Ok(Self::Ratio),
            "all" => Ok(Self::All),
            other => Err(AppError::InvalidOption {
                field: "dataType",
                value: other.to_string(),
            }),
        }
    }
}

impl From<PlotKind> for DataKind {
    fn from(kind: PlotKind) -> Self {
        match kind {
            PlotKind::Raw => Self::Raw,
            PlotKind::Ratio => Self::Ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFormat {
    Image(ImageFormat),
    Csv,
    Zip,
    Json,
}

impl DownloadFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Image(format) => format.extension(),
            Self::Csv => "csv",
            Self::Zip => "zip",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Rendered by the chart surface itself.
    ChartImage(PlotKind),
    /// Served by the backend; the sink navigates there.
    Url(Url),
    Bytes(Vec<u8>),
}

/// What an export produced. Derived fresh on every export.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSpec {
    pub filename: String,
    pub format: DownloadFormat,
    pub payload: Payload,
}

/// `raw_2024_VWC_S1_T_D1.png`
#[must_use]
pub fn plot_image_filename(kind: PlotKind, state: &SelectionState, format: ImageFormat) -> String {
    format!(
        "{kind}_{}_{}_{}_{}_D{}.{}",
        state.year,
        state.variable,
        state.strip,
        state.logger_location,
        state.depth,
        format.extension()
    )
}

/// `raw_data_2024_VWC_S1_daily.csv`
#[must_use]
pub fn trace_data_filename(kind: DataKind, state: &SelectionState) -> String {
    format!(
        "{kind}_data_{}_{}_{}_{}.csv",
        state.year, state.variable, state.strip, state.granularity
    )
}

/// Season archives are zipped by the backend; every other granularity
/// comes back as a single CSV.
#[must_use]
pub fn summary_archive_filename(request: &SummaryRequest, seasonal: bool) -> (String, DownloadFormat) {
    if seasonal {
        (
            format!(
                "summary_gseason_{}_{}_{}.zip",
                request.year, request.variable, request.strip
            ),
            DownloadFormat::Zip,
        )
    } else {
        (
            format!(
                "summary_data_{}_{}_{}_{}.csv",
                request.year, request.variable, request.strip, request.granularity
            ),
            DownloadFormat::Csv,
        )
    }
}

/// Serialize displayed statistics for `target` as CSV.
///
/// Seasonal summaries gain a leading `Season` column, with seasons in the
/// same order as the displayed sections. Missing values are written as `NA`.
///
/// # Errors
///
/// Returns `AppError::Export` if the CSV writer fails.
pub fn summary_csv(
    stats: &SummaryStats,
    target: StatsTarget,
    catalog: &OptionCatalog,
) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let seasonal = stats.is_seasonal();

    let mut header = vec![
        "Variable",
        "Type",
        "Strips",
        "Logger Location",
        "Min",
        "Mean",
        "Max",
        "Std",
    ];
    if seasonal {
        header.insert(0, "Season");
    }
    writer.write_record(&header).map_err(csv_error)?;

    match stats {
        SummaryStats::Flat { raw, ratio } => {
            let bucket = match target {
                StatsTarget::Raw => raw,
                StatsTarget::Ratio => ratio,
            };
            write_bucket(&mut writer, None, bucket, target)?;
        }
        SummaryStats::Seasonal { seasons } => {
            let mut ordered: Vec<_> = seasons.iter().collect();
            ordered.sort_by_key(|(code, _)| catalog.season_position(code).unwrap_or(usize::MAX));
            for (code, pair) in ordered {
                write_bucket(&mut writer, Some(code.as_str()), pair.bucket(target), target)?;
            }
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Export(format!("Failed to finish CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AppError::Export(format!("CSV is not UTF-8: {e}")))
}

fn write_bucket(
    writer: &mut csv::Writer<Vec<u8>>,
    season: Option<&str>,
    bucket: &StatBucket,
    target: StatsTarget,
) -> AppResult<()> {
    for (key, values) in bucket {
        let trace = TraceKey::parse(key);
        let kind = trace.kind.unwrap_or(target);
        let mut record: Vec<String> = season.map(str::to_string).into_iter().collect();
        record.extend([
            trace.variable.clone(),
            kind.as_str().to_string(),
            trace.strips_label(),
            trace.logger.clone(),
        ]);
        record.extend(
            [values.min, values.mean, values.max, values.std]
                .into_iter()
                .map(|v| match v {
                    Some(v) if !v.is_nan() => format!("{v:.4}"),
                    _ => "NA".to_string(),
                }),
        );
        writer.write_record(&record).map_err(csv_error)?;
    }
    Ok(())
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Export(format!("Failed to write CSV: {e}"))
}

/// Browser download mechanics.
pub trait DownloadSink: Send + Sync {
    /// Follow a backend download link.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Export` if the link cannot be followed.
    fn navigate(&self, url: &Url) -> AppResult<()>;

    /// Offer `bytes` for download under `filename`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Export` if the file cannot be stored.
    fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<()>;
}

/// Saves downloads into a local directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn navigate(&self, url: &Url) -> AppResult<()> {
        tracing::info!(url = %url, "Download link ready");
        Ok(())
    }

    fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<()> {
        // Only the last path component is used
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| AppError::Export(format!("Invalid filename: {filename}")))?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Export(format!("Failed to create {}: {e}", self.dir.display()))
        })?;
        let path = self.dir.join(name);
        fs::write(&path, bytes)
            .map_err(|e| AppError::Export(format!("Failed to write {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "Download saved");
        Ok(())
    }
}

pub struct ExportAdapter<B, D> {
    backend: Arc<B>,
    selections: Arc<SelectionStore>,
    sink: D,
}

impl<B: Backend, D: DownloadSink> ExportAdapter<B, D> {
    #[must_use]
    pub fn new(backend: Arc<B>, selections: Arc<SelectionStore>, sink: D) -> Self {
        Self {
            backend,
            selections,
            sink,
        }
    }

    #[must_use]
    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Export the chart of `kind` as an image.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Export` if nothing is rendered or the surface fails.
    pub fn export_plot<S: ChartSurface>(
        &self,
        renderer: &ChartRenderer<S>,
        kind: PlotKind,
        format: ImageFormat,
    ) -> AppResult<DownloadSpec> {
        let state = self.selections.get(Context::Main);
        let filename = plot_image_filename(kind, &state, format);
        renderer.export_image(kind, &filename, format)?;
        tracing::info!(stream = kind.as_str(), filename, "Plot exported");
        Ok(DownloadSpec {
            filename,
            format: DownloadFormat::Image(format),
            payload: Payload::ChartImage(kind),
        })
    }

    /// Save the figure of `kind` as JSON, for surfaces that cannot rasterize.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Export` if nothing is rendered or the file cannot be saved.
    pub fn export_figure<S: ChartSurface>(
        &self,
        renderer: &ChartRenderer<S>,
        kind: PlotKind,
    ) -> AppResult<DownloadSpec> {
        let shown = renderer
            .shown(kind)
            .ok_or_else(|| AppError::Export(format!("no {kind} plot has been rendered yet")))?;
        let state = self.selections.get(Context::Main);
        let stem = plot_image_filename(kind, &state, ImageFormat::Png);
        let filename = format!("{}.json", stem.trim_end_matches(".png"));

        let bytes = serde_json::to_vec_pretty(&shown.figure)
            .map_err(|e| AppError::Export(format!("Failed to serialize figure: {e}")))?;
        self.sink.save(&filename, &bytes)?;
        Ok(DownloadSpec {
            filename,
            format: DownloadFormat::Json,
            payload: Payload::Bytes(bytes),
        })
    }

    /// Point the sink at `/download_data` for the current `main` selection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the URL cannot be built, or the sink's
    /// error if navigation fails.
    pub fn export_trace_data(&self, kind: DataKind) -> AppResult<DownloadSpec> {
        let state = self.selections.get(Context::Main);
        let range = state.date_range();
        let query = DataDownloadQuery {
            data_type: kind.as_str().to_string(),
            year: state.year,
            variable: state.variable.clone(),
            strip: state.strip.clone(),
            granularity: state.granularity.clone(),
            logger_location: state.logger_location.clone(),
            depth: state.depth.clone(),
            trace_option: state.trace_grouping.as_str().to_string(),
            start_date: range.map(|(start, _)| start),
            end_date: range.map(|(_, end)| end),
        };
        let url = self.backend.data_download_url(&query)?;
        self.sink.navigate(&url)?;
        Ok(DownloadSpec {
            filename: trace_data_filename(kind, &state),
            format: DownloadFormat::Csv,
            payload: Payload::Url(url),
        })
    }

    /// Request a backend archive of the displayed statistics and save it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NoStatisticsAvailable` without any network call if
    /// no statistics for `target` are displayed; otherwise backend or sink
    /// errors.
    pub async fn export_summary_data(
        &self,
        panel: &SummaryPanel,
        target: StatsTarget,
    ) -> AppResult<DownloadSpec> {
        let result = panel
            .last_result()
            .filter(|r| r.stats.has_stats(target))
            .ok_or_else(|| {
                tracing::warn!(stats = target.as_str(), "No statistics to export");
                AppError::NoStatisticsAvailable(target.as_str().to_string())
            })?;

        let request = &result.request;
        let body = SummaryDownloadRequest {
            summary_stats: result.stats.payload(target),
            year: request.year,
            variable: request.variable.clone(),
            strip: request.strip.clone(),
            depth: request.depth.clone(),
            granularity: request.granularity.clone(),
            stats_type: target.as_str().to_string(),
        };

        let bytes = self.backend.download_summary(&body).await?;
        let (filename, format) = summary_archive_filename(request, result.stats.is_seasonal());
        self.sink.save(&filename, &bytes)?;
        Ok(DownloadSpec {
            filename,
            format,
            payload: Payload::Bytes(bytes),
        })
    }

    /// Write the displayed statistics as CSV locally, without the backend.
    ///
    /// # Errors
    ///
    /// Same availability rule as [`Self::export_summary_data`].
    pub fn export_summary_csv(
        &self,
        panel: &SummaryPanel,
        target: StatsTarget,
    ) -> AppResult<DownloadSpec> {
        let result = panel
            .last_result()
            .filter(|r| r.stats.has_stats(target))
            .ok_or_else(|| AppError::NoStatisticsAvailable(target.as_str().to_string()))?;

        let request = &result.request;
        let filename = format!(
            "summary_{target}_{}_{}_{}_{}.csv",
            request.year, request.variable, request.strip, request.granularity
        );
        let bytes = summary_csv(&result.stats, target, self.selections.catalog())?.into_bytes();
        self.sink.save(&filename, &bytes)?;
        Ok(DownloadSpec {
            filename,
            format: DownloadFormat::Csv,
            payload: Payload::Bytes(bytes),
        })
    }
}

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::Backend;
use crate::catalog::OptionCatalog;
use crate::config::Config;
use crate::coordinator::{PlotKind, PlotResult, RequestCoordinator, Settled, SummaryResult};
use crate::error::AppResult;
use crate::export::{DataKind, DownloadSink, DownloadSpec, ExportAdapter};
use crate::render::{AxisRange, ChartRenderer, ChartSurface, ImageFormat};
use crate::selection::{Context, Field, SelectionState, SelectionStore};
use crate::services::EndDateCache;
use crate::summary::{StatsTarget, SummaryPanel, SummaryPresenter};

/// Outcome of refreshing both charts.
#[derive(Debug)]
pub struct PlotRefresh {
    pub raw: AppResult<Settled<PlotResult>>,
    pub ratio: AppResult<Settled<PlotResult>>,
}

/// One explorer session: the catalog, both selection contexts and every
/// component that consumes them.
///
/// Created once the catalog has loaded; nothing outlives it.
pub struct Session<B, S, D> {
    config: Arc<Config>,
    backend: Arc<B>,
    selections: Arc<SelectionStore>,
    coordinator: RequestCoordinator<B>,
    renderer: ChartRenderer<S>,
    summary: SummaryPanel,
    exporter: ExportAdapter<B, D>,
    end_dates: EndDateCache,
}

impl<B: Backend, S: ChartSurface, D: DownloadSink> Session<B, S, D> {
    /// Load the catalog and build the session around it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CatalogUnavailable` (fatal) if the catalog cannot be
    /// loaded. No plot or summary is attempted in that case.
    pub async fn start(config: Config, backend: B, raw: S, ratio: S, sink: D) -> AppResult<Self> {
        let backend = Arc::new(backend);
        let catalog = Arc::new(OptionCatalog::load(backend.as_ref()).await?);
        let selections = Arc::new(SelectionStore::new(Arc::clone(&catalog)));

        let session = Self {
            coordinator: RequestCoordinator::new(Arc::clone(&backend), Arc::clone(&selections)),
            renderer: ChartRenderer::new(raw, ratio),
            summary: SummaryPanel::new(SummaryPresenter::new(
                Arc::clone(&catalog),
                config.summary_precision,
            )),
            exporter: ExportAdapter::new(Arc::clone(&backend), Arc::clone(&selections), sink),
            end_dates: EndDateCache::new(Duration::from_secs(config.end_date_cache_ttl_seconds)),
            config: Arc::new(config),
            backend,
            selections,
        };

        let defaults = catalog.defaults();
        tracing::info!(
            year = defaults.year,
            variable = %defaults.variable,
            granularity = %defaults.granularity,
            "Session started"
        );
        Ok(session)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<OptionCatalog> {
        self.selections.catalog()
    }

    #[must_use]
    pub fn selections(&self) -> &SelectionStore {
        &self.selections
    }

    #[must_use]
    pub fn selection(&self, context: Context) -> SelectionState {
        self.selections.get(context)
    }

    #[must_use]
    pub fn coordinator(&self) -> &RequestCoordinator<B> {
        &self.coordinator
    }

    #[must_use]
    pub fn renderer(&self) -> &ChartRenderer<S> {
        &self.renderer
    }

    #[must_use]
    pub fn summary_panel(&self) -> &SummaryPanel {
        &self.summary
    }

    #[must_use]
    pub fn exporter(&self) -> &ExportAdapter<B, D> {
        &self.exporter
    }

    /// Selector change handler.
    ///
    /// Invalid values are logged and ignored (returns `false`). A year change
    /// also resolves the authoritative end date; a failed lookup keeps the
    /// Dec 31 fallback and is not an error.
    pub async fn on_option_changed(&self, context: Context, field: Field, value: &str) -> bool {
        let lookup = match self.selections.set(context, field, value) {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::warn!(%context, field = field.name(), error = %e, "Ignoring option change");
                return false;
            }
        };

        if let Some(lookup) = lookup {
            let end = match self.end_dates.lookup(self.backend.as_ref(), lookup.year).await {
                Ok(end) => Some(end),
                Err(e) => {
                    tracing::warn!(
                        %context,
                        year = lookup.year,
                        error = %e,
                        "Failed to look up end date"
                    );
                    None
                }
            };
            self.selections.apply_end_date(lookup, end);
        }
        true
    }

    /// Fetch both charts for the `main` context concurrently.
    pub async fn refresh_plots(&self) -> PlotRefresh {
        let (raw, ratio) = futures::join!(
            self.coordinator
                .request_plot(Context::Main, PlotKind::Raw, &self.renderer),
            self.coordinator
                .request_plot(Context::Main, PlotKind::Ratio, &self.renderer),
        );
        PlotRefresh { raw, ratio }
    }

    /// Fetch the summary for the `summary` context.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SummaryFetchFailed` if the newest request fails; the
    /// previous tables stay on display.
    pub async fn refresh_summary(&self) -> AppResult<Settled<SummaryResult>> {
        self.coordinator
            .request_summary(Context::Summary, &self.summary)
            .await
    }

    /// Pan/zoom handler for either chart. Returns whether the partner changed.
    pub fn on_relayout(&self, source: PlotKind, event: &Map<String, Value>) -> bool {
        match AxisRange::from_relayout(event) {
            Some(range) => self.renderer.on_relayout(source, &range),
            None => false,
        }
    }

    /// # Errors
    ///
    /// See [`ExportAdapter::export_plot`].
    pub fn export_plot(&self, kind: PlotKind, format: ImageFormat) -> AppResult<DownloadSpec> {
        self.exporter.export_plot(&self.renderer, kind, format)
    }

    /// # Errors
    ///
    /// See [`ExportAdapter::export_figure`].
    pub fn export_figure(&self, kind: PlotKind) -> AppResult<DownloadSpec> {
        self.exporter.export_figure(&self.renderer, kind)
    }

    /// # Errors
    ///
    /// See [`ExportAdapter::export_trace_data`].
    pub fn export_trace_data(&self, kind: DataKind) -> AppResult<DownloadSpec> {
        self.exporter.export_trace_data(kind)
    }

    /// # Errors
    ///
    /// `AppError::NoStatisticsAvailable` when nothing is displayed for
    /// `target`; backend or sink errors otherwise.
    pub async fn export_summary_data(&self, target: StatsTarget) -> AppResult<DownloadSpec> {
        self.exporter
            .export_summary_data(&self.summary, target)
            .await
    }

    /// # Errors
    ///
    /// See [`ExportAdapter::export_summary_csv`].
    pub fn export_summary_csv(&self, target: StatsTarget) -> AppResult<DownloadSpec> {
        self.exporter.export_summary_csv(&self.summary, target)
    }
}

use std::sync::{Mutex, PoisonError};

use super::presenter::{RenderedTables, SummaryPresenter};
use crate::coordinator::{SummaryResult, SummarySink};

/// What the summary region currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ShownSummary {
    pub result: SummaryResult,
    pub title: String,
    pub tables: RenderedTables,
}

/// The summary display region. Each fresh result replaces the previous one
/// wholesale; the last one is kept for export.
pub struct SummaryPanel {
    presenter: SummaryPresenter,
    shown: Mutex<Option<ShownSummary>>,
}

impl SummaryPanel {
    #[must_use]
    pub fn new(presenter: SummaryPresenter) -> Self {
        Self {
            presenter,
            shown: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<ShownSummary> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The result behind the displayed tables, if any has been shown.
    #[must_use]
    pub fn last_result(&self) -> Option<SummaryResult> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.result.clone())
    }
}

impl SummarySink for SummaryPanel {
    fn show_summary(&self, result: &SummaryResult) {
        let tables = self
            .presenter
            .present(&result.stats, &result.request.variable);
        let title = self.presenter.title(&result.request);

        tracing::debug!(
            seq = result.seq,
            kind = result.stats.kind(),
            tables = tables.tables().len(),
            "Summary rendered"
        );

        *self.shown.lock().unwrap_or_else(PoisonError::into_inner) = Some(ShownSummary {
            result: result.clone(),
            title,
            tables,
        });
    }
}

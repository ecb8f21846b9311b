//! Request coordination with last-issued-wins ordering.
//!
//! Every call snapshots the selection, takes the next sequence number for its
//! `(context, stream)` and awaits the backend. On arrival the response is
//! applied only if no newer request was issued for the same pair in the
//! meantime; otherwise it is dropped without touching any sink.
//!
//! | Stream | Endpoint | Sink |
//! |--------|----------|------|
//! | `raw` | `plot_raw` / `plot_raw_gseason` | [`PlotSink`] |
//! | `ratio` | `plot_ratio` / `plot_ratio_gseason` | [`PlotSink`] |
//! | `summary` | `get_summary_stats` | [`SummarySink`] |
//!
//! Nothing is cancelled or retried. A failure leaves the sink untouched.

pub mod requests;
pub mod sequence;

use std::sync::Arc;

pub use requests::{OverlayFlags, PlotKind, PlotRequest, Stream, SummaryRequest};
pub use sequence::{SequenceGate, Ticket};

use crate::backend::Backend;
use crate::backend::models::Figure;
use crate::error::{AppError, AppResult};
use crate::selection::{Context, SelectionStore};
use crate::summary::SummaryStats;

/// Chart payload tagged with the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotResult {
    pub seq: u64,
    pub request: PlotRequest,
    pub figure: Figure,
}

/// Summary statistics tagged with the request that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryResult {
    pub seq: u64,
    pub request: SummaryRequest,
    pub stats: SummaryStats,
}

/// Where fresh plot results go.
pub trait PlotSink: Send + Sync {
    fn show_plot(&self, result: &PlotResult);
}

/// Where fresh summary results go.
pub trait SummarySink: Send + Sync {
    fn show_summary(&self, result: &SummaryResult);
}

/// Outcome of a request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    /// Newest for its pair; already handed to the sink.
    Fresh(T),
    /// A newer request was issued before this one settled.
    Superseded { seq: u64, latest: u64 },
}

impl<T> Settled<T> {
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    #[must_use]
    pub fn fresh(self) -> Option<T> {
        match self {
            Self::Fresh(value) => Some(value),
            Self::Superseded { .. } => None,
        }
    }
}

pub struct RequestCoordinator<B> {
    backend: Arc<B>,
    selections: Arc<SelectionStore>,
    gate: SequenceGate,
}

impl<B: Backend> RequestCoordinator<B> {
    #[must_use]
    pub fn new(backend: Arc<B>, selections: Arc<SelectionStore>) -> Self {
        Self {
            backend,
            selections,
            gate: SequenceGate::new(),
        }
    }

    /// Highest sequence number issued for a pair.
    #[must_use]
    pub fn latest_seq(&self, context: Context, stream: Stream) -> u64 {
        self.gate.latest(context, stream)
    }

    /// Fetch a plot for `context` and hand it to `sink` if still current.
    ///
    /// # Errors
    ///
    /// Returns `AppError::PlotFetchFailed` if the newest request for this pair
    /// fails. A failure of a request that was already superseded is reported
    /// as `Settled::Superseded` instead.
    pub async fn request_plot<S: PlotSink + ?Sized>(
        &self,
        context: Context,
        kind: PlotKind,
        sink: &S,
    ) -> AppResult<Settled<PlotResult>> {
        let state = self.selections.get(context);
        let ticket = self.gate.issue(context, kind.into());
        let request = PlotRequest::new(context, kind, ticket.seq, &state);

        tracing::debug!(
            %context,
            stream = kind.as_str(),
            seq = ticket.seq,
            route = request.route(),
            "Plot request issued"
        );

        let outcome = self.backend.fetch_plot(&request).await;

        let figure = match outcome {
            Ok(figure) => figure,
            Err(e) => {
                return self.fail(ticket, e, AppError::PlotFetchFailed);
            }
        };

        let result = PlotResult {
            seq: ticket.seq,
            request,
            figure,
        };
        Ok(self.deliver(ticket, result, |r| sink.show_plot(r)))
    }

    /// Fetch summary statistics for `context` and hand them to `sink` if
    /// still current.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SummaryFetchFailed` if the newest request for this
    /// context fails.
    pub async fn request_summary<S: SummarySink + ?Sized>(
        &self,
        context: Context,
        sink: &S,
    ) -> AppResult<Settled<SummaryResult>> {
        let state = self.selections.get(context);
        let ticket = self.gate.issue(context, Stream::Summary);
        let request = SummaryRequest::new(context, ticket.seq, &state);

        tracing::debug!(
            %context,
            stream = Stream::Summary.as_str(),
            seq = ticket.seq,
            granularity = %request.granularity,
            "Summary request issued"
        );

        let stats = match self.backend.fetch_summary(&request).await {
            Ok(stats) => stats,
            Err(e) => return self.fail(ticket, e, AppError::SummaryFetchFailed),
        };

        let result = SummaryResult {
            seq: ticket.seq,
            request,
            stats,
        };
        Ok(self.deliver(ticket, result, |r| sink.show_summary(r)))
    }

    fn deliver<T>(&self, ticket: Ticket, result: T, apply: impl FnOnce(&T)) -> Settled<T> {
        match self.gate.settle(ticket, || apply(&result)) {
            Ok(()) => {
                tracing::debug!(
                    context = %ticket.context,
                    stream = ticket.stream.as_str(),
                    seq = ticket.seq,
                    "Response applied"
                );
                Settled::Fresh(result)
            }
            Err(latest) => {
                tracing::debug!(
                    context = %ticket.context,
                    stream = ticket.stream.as_str(),
                    seq = ticket.seq,
                    latest,
                    "Stale response discarded"
                );
                Settled::Superseded {
                    seq: ticket.seq,
                    latest,
                }
            }
        }
    }

    fn fail<T>(
        &self,
        ticket: Ticket,
        error: AppError,
        wrap: fn(String) -> AppError,
    ) -> AppResult<Settled<T>> {
        let latest = self.gate.latest(ticket.context, ticket.stream);
        if latest != ticket.seq {
            tracing::debug!(
                context = %ticket.context,
                stream = ticket.stream.as_str(),
                seq = ticket.seq,
                latest,
                error = %error,
                "Stale failure discarded"
            );
            return Ok(Settled::Superseded {
                seq: ticket.seq,
                latest,
            });
        }

        tracing::warn!(
            context = %ticket.context,
            stream = ticket.stream.as_str(),
            seq = ticket.seq,
            error = %error,
            "Fetch failed"
        );
        Err(wrap(error.to_string()))
    }
}

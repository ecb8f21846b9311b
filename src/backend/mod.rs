pub mod client;
pub mod models;

use chrono::NaiveDate;
use reqwest::Url;
use std::future::Future;

pub use client::HttpBackend;

use crate::coordinator::{PlotRequest, SummaryRequest};
use crate::error::AppResult;
use crate::summary::SummaryStats;
use models::{CatalogResponse, DataDownloadQuery, Figure, SummaryDownloadRequest};

/// The data service the explorer talks to.
///
/// Every method is a single request/response; none retries. Implementations
/// report transport failures, non-success statuses and `{error}` bodies as
/// `Err`.
pub trait Backend: Send + Sync {
    /// `GET /get_defaults_and_options`
    fn fetch_catalog(&self) -> impl Future<Output = AppResult<CatalogResponse>> + Send;

    /// `GET /get_end_date?year=`
    fn fetch_end_date(&self, year: i32) -> impl Future<Output = AppResult<NaiveDate>> + Send;

    /// `POST /plot_raw`, `/plot_ratio` or their season variants, chosen by
    /// [`PlotRequest::route`].
    fn fetch_plot(&self, request: &PlotRequest) -> impl Future<Output = AppResult<Figure>> + Send;

    /// `POST /get_summary_stats`
    fn fetch_summary(
        &self,
        request: &SummaryRequest,
    ) -> impl Future<Output = AppResult<SummaryStats>> + Send;

    /// `POST /download_summary_data`, returning the archive bytes.
    fn download_summary(
        &self,
        request: &SummaryDownloadRequest,
    ) -> impl Future<Output = AppResult<Vec<u8>>> + Send;

    /// URL of `GET /download_data` for the given query. Pure; no request is made.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the URL cannot be built.
    fn data_download_url(&self, query: &DataDownloadQuery) -> AppResult<Url>;
}

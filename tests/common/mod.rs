//! Shared fixtures: a scripted in-memory backend and recording sinks.

#![allow(dead_code)]

use chrono::NaiveDate;
use reqwest::Url;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use biochar_explorer::backend::Backend;
use biochar_explorer::backend::models::{
    CatalogResponse, DataDownloadQuery, Figure, SummaryDownloadRequest,
};
use biochar_explorer::catalog::OptionCatalog;
use biochar_explorer::coordinator::{
    PlotRequest, PlotResult, PlotSink, SummaryRequest, SummaryResult, SummarySink,
};
use biochar_explorer::error::{AppError, AppResult};
use biochar_explorer::export::DownloadSink;
use biochar_explorer::render::{AxisRange, ChartSurface, ImageFormat};
use biochar_explorer::summary::{StatBucket, StatValues, SummaryStats};

/// Catalog as the backend sends it: bare values plus label mappings.
pub fn catalog_json() -> Value {
    json!({
        "years": [2023, 2024],
        "strips": ["S1", "S2", "S3", "S4"],
        "variables": ["VWC", "T", "EC"],
        "depths": [1, 2, 3],
        "loggerLocations": ["T", "M", "B"],
        "granularities": ["15min", "1hour", "daily", "monthly", "gseason"],
        "defaults": {
            "year": 2023,
            "variable": "VWC",
            "strip": "S1",
            "granularity": "daily",
            "depth": 1,
            "loggerLocation": "T"
        },
        "gseasonPeriods": {
            "Q1_Winter": ["11-01", "02-28"],
            "Q2_Early_Growing": ["03-01", "05-31"],
            "Q3_Peak_Harvest": ["06-01", "10-31"]
        },
        "variableNameMapping": {
            "VWC": "Soil Moisture",
            "T": "Soil Temperature",
            "EC": "Electrical Conductivity"
        },
        "labelNameMapping": {
            "VWC": "Volumetric Water Content (%)",
            "T": "Temperature (°C)"
        },
        "granularityNameMapping": {
            "15min": "15-Minute",
            "1hour": "Hourly",
            "daily": "Daily",
            "monthly": "Monthly",
            "gseason": "Growing Season"
        },
        "stripNameMapping": {
            "S1": "Strip 1 (Biochar)",
            "S2": "Strip 2 (Control)",
            "S3": "Strip 3 (Biochar)",
            "S4": "Strip 4 (Control)"
        },
        "loggerLocationMapping": {"T": "Top", "M": "Middle", "B": "Bottom"},
        "depthMapping": {"1": "6 in", "2": "12 in", "3": "18 in"}
    })
}

pub fn catalog() -> OptionCatalog {
    let response: CatalogResponse = serde_json::from_value(catalog_json()).unwrap();
    OptionCatalog::from_response(response).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn figure(title: &str) -> Figure {
    let mut layout = Map::new();
    layout.insert("title".to_string(), json!({ "text": title }));
    Figure {
        data: vec![json!({ "name": title, "x": [], "y": [] })],
        layout,
    }
}

pub fn stats(min: f64, mean: f64, max: f64, std: f64) -> StatValues {
    StatValues {
        min: Some(min),
        mean: Some(mean),
        max: Some(max),
        std: Some(std),
    }
}

pub fn bucket(keys: &[&str]) -> StatBucket {
    keys.iter()
        .enumerate()
        .map(|(i, k)| ((*k).to_string(), stats(i as f64, 1.5, 3.0, 0.25)))
        .collect()
}

pub fn flat_stats() -> SummaryStats {
    SummaryStats::Flat {
        raw: bucket(&["VWC_1_raw_S1_T", "VWC_1_raw_S1_M"]),
        ratio: bucket(&["VWC_1_ratio_S1_S2_T", "VWC_1_ratio_S3_S4_T"]),
    }
}

type Reply<T> = Option<oneshot::Sender<AppResult<T>>>;

/// Backend whose behaviour each test scripts.
///
/// In held mode every plot and summary call parks on a oneshot channel until
/// the test resolves it, so responses can be released in any order.
#[derive(Default)]
pub struct Script {
    pub catalog: Mutex<Option<Value>>,
    pub catalog_calls: AtomicUsize,
    pub end_dates: Mutex<HashMap<i32, NaiveDate>>,
    pub end_date_calls: Mutex<Vec<i32>>,
    hold: AtomicBool,
    plot_replies: Mutex<Vec<Reply<Figure>>>,
    pub plot_requests: Mutex<Vec<PlotRequest>>,
    plot_failure: Mutex<Option<String>>,
    summary_replies: Mutex<Vec<Reply<SummaryStats>>>,
    pub summary_requests: Mutex<Vec<SummaryRequest>>,
    summary: Mutex<Option<SummaryStats>>,
    pub downloads: Mutex<Vec<SummaryDownloadRequest>>,
}

#[derive(Clone)]
pub struct ScriptedBackend(Arc<Script>);

impl Deref for ScriptedBackend {
    type Target = Script;

    fn deref(&self) -> &Script {
        &self.0
    }
}

impl ScriptedBackend {
    /// Answers immediately: catalog fixture, end dates for 2023/2024, one
    /// figure per plot request and a flat summary.
    pub fn new() -> Self {
        let script = Script::default();
        *script.catalog.lock().unwrap() = Some(catalog_json());
        script
            .end_dates
            .lock()
            .unwrap()
            .extend([(2023, date(2023, 12, 15)), (2024, date(2024, 10, 1))]);
        *script.summary.lock().unwrap() = Some(flat_stats());
        Self(Arc::new(script))
    }

    /// Plot and summary calls wait until resolved by the test.
    pub fn held() -> Self {
        let backend = Self::new();
        backend.hold.store(true, Ordering::SeqCst);
        backend
    }

    pub fn fail_catalog(&self) {
        *self.catalog.lock().unwrap() = None;
    }

    pub fn fail_plots(&self, message: &str) {
        *self.plot_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_summary(&self, stats: SummaryStats) {
        *self.summary.lock().unwrap() = Some(stats);
    }

    pub fn fail_summary(&self) {
        *self.summary.lock().unwrap() = None;
    }

    pub fn pending_plots(&self) -> usize {
        self.plot_replies.lock().unwrap().len()
    }

    pub fn resolve_plot(&self, index: usize, reply: AppResult<Figure>) {
        let tx = self.plot_replies.lock().unwrap()[index].take().unwrap();
        let _ = tx.send(reply);
    }

    pub fn resolve_summary(&self, index: usize, reply: AppResult<SummaryStats>) {
        let tx = self.summary_replies.lock().unwrap()[index].take().unwrap();
        let _ = tx.send(reply);
    }

    pub fn plot_request(&self, index: usize) -> PlotRequest {
        self.plot_requests.lock().unwrap()[index].clone()
    }
}

impl Backend for ScriptedBackend {
    async fn fetch_catalog(&self) -> AppResult<CatalogResponse> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        let body = self.catalog.lock().unwrap().clone();
        let body = body.ok_or_else(|| AppError::Backend("connection refused".to_string()))?;
        serde_json::from_value(body).map_err(|e| AppError::Backend(e.to_string()))
    }

    async fn fetch_end_date(&self, year: i32) -> AppResult<NaiveDate> {
        self.end_date_calls.lock().unwrap().push(year);
        let end = self.end_dates.lock().unwrap().get(&year).copied();
        end.ok_or_else(|| AppError::Backend(format!("No data for {year}")))
    }

    async fn fetch_plot(&self, request: &PlotRequest) -> AppResult<Figure> {
        self.plot_requests.lock().unwrap().push(request.clone());
        if self.hold.load(Ordering::SeqCst) {
            let (tx, rx) = oneshot::channel();
            self.plot_replies.lock().unwrap().push(Some(tx));
            return rx
                .await
                .unwrap_or_else(|_| Err(AppError::Backend("reply dropped".to_string())));
        }
        let failure = self.plot_failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(AppError::Backend(message));
        }
        Ok(figure(&format!("{} #{}", request.kind, request.seq)))
    }

    async fn fetch_summary(&self, request: &SummaryRequest) -> AppResult<SummaryStats> {
        self.summary_requests.lock().unwrap().push(request.clone());
        if self.hold.load(Ordering::SeqCst) {
            let (tx, rx) = oneshot::channel();
            self.summary_replies.lock().unwrap().push(Some(tx));
            return rx
                .await
                .unwrap_or_else(|_| Err(AppError::Backend("reply dropped".to_string())));
        }
        let summary = self.summary.lock().unwrap().clone();
        summary.ok_or_else(|| AppError::Backend("No data found for the selected filters.".into()))
    }

    async fn download_summary(&self, request: &SummaryDownloadRequest) -> AppResult<Vec<u8>> {
        self.downloads.lock().unwrap().push(request.clone());
        Ok(b"PK\x03\x04archive".to_vec())
    }

    fn data_download_url(&self, query: &DataDownloadQuery) -> AppResult<Url> {
        let request = reqwest::Client::new()
            .get("http://backend.test/download_data")
            .query(query)
            .build()
            .unwrap();
        Ok(request.url().clone())
    }
}

#[derive(Default)]
pub struct RecordingPlots {
    pub shown: Mutex<Vec<PlotResult>>,
}

impl RecordingPlots {
    pub fn titles(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.figure.title().unwrap_or_default().to_string())
            .collect()
    }
}

impl PlotSink for RecordingPlots {
    fn show_plot(&self, result: &PlotResult) {
        self.shown.lock().unwrap().push(result.clone());
    }
}

#[derive(Default)]
pub struct RecordingSummaries {
    pub shown: Mutex<Vec<SummaryResult>>,
}

impl SummarySink for RecordingSummaries {
    fn show_summary(&self, result: &SummaryResult) {
        self.shown.lock().unwrap().push(result.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Update(Option<String>),
    Resize,
    ApplyRange(AxisRange),
    Export(String, ImageFormat),
}

/// Chart surface that records every call; clones share the log.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    pub calls: Arc<Mutex<Vec<SurfaceCall>>>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ChartSurface for RecordingSurface {
    fn update(&mut self, figure: &Figure) {
        let title = figure.title().map(str::to_string);
        self.calls.lock().unwrap().push(SurfaceCall::Update(title));
    }

    fn resize(&mut self) {
        self.calls.lock().unwrap().push(SurfaceCall::Resize);
    }

    fn apply_range(&mut self, range: &AxisRange) {
        self.calls
            .lock()
            .unwrap()
            .push(SurfaceCall::ApplyRange(range.clone()));
    }

    fn export_image(&self, filename: &str, format: ImageFormat) -> AppResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(SurfaceCall::Export(filename.to_string(), format));
        Ok(())
    }
}

/// Download sink that records navigations and saved files.
#[derive(Clone, Default)]
pub struct RecordingDownloads {
    pub navigations: Arc<Mutex<Vec<Url>>>,
    pub saved: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl RecordingDownloads {
    pub fn saved_names(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl DownloadSink for RecordingDownloads {
    fn navigate(&self, url: &Url) -> AppResult<()> {
        self.navigations.lock().unwrap().push(url.clone());
        Ok(())
    }

    fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<()> {
        self.saved
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes.to_vec()));
        Ok(())
    }
}

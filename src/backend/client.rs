use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use std::time::Duration;

use crate::backend::Backend;
use crate::backend::models::{
    CatalogResponse, DataDownloadQuery, EndDateResponse, Figure, SummaryDownloadRequest,
};
use crate::config::Config;
use crate::coordinator::{PlotRequest, SummaryRequest};
use crate::error::{AppError, AppResult};
use crate::summary::{SummaryResponse, SummaryStats};

pub struct HttpBackend {
    http_client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Build a client for the configured backend.
    ///
    /// No timeout is applied unless `BIOCHAR_REQUEST_TIMEOUT_SECONDS` is set;
    /// an unanswered request simply stays outstanding.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> AppResult<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| AppError::Backend(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.api_base_url.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Backend(format!("Invalid endpoint {path}: {e}")))
    }

    /// Send a request and reject non-success statuses.
    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::Backend("Rate limited (429)".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!(
                "HTTP {status}: {}",
                error_message(&body).unwrap_or(body)
            )));
        }

        Ok(response)
    }

    /// Parse a JSON body, treating `{"error": "..."}` as a failure even on 200.
    ///
    /// Bare `NaN` and `Infinity` tokens are read as `null`.
    async fn json<T: DeserializeOwned>(&self, response: Response, what: &str) -> AppResult<T> {
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to get response text: {e}")))?;

        let value: Value = serde_json::from_str(&null_non_finite(&text)).map_err(|e| {
            tracing::error!(
                error = %e,
                endpoint = what,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse response"
            );
            AppError::Backend(format!("Failed to parse response: {e}"))
        })?;

        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(AppError::Backend(message.to_string()));
        }

        serde_json::from_value(value)
            .map_err(|e| AppError::Backend(format!("Unexpected {what} response: {e}")))
    }
}

impl Backend for HttpBackend {
    async fn fetch_catalog(&self) -> AppResult<CatalogResponse> {
        let url = self.endpoint("get_defaults_and_options")?;
        let response = self.send(self.http_client.get(url)).await?;
        self.json(response, "catalog").await
    }

    async fn fetch_end_date(&self, year: i32) -> AppResult<NaiveDate> {
        let mut url = self.endpoint("get_end_date")?;
        url.query_pairs_mut().append_pair("year", &year.to_string());

        let response = self.send(self.http_client.get(url)).await?;
        let body: EndDateResponse = self.json(response, "end date").await?;
        body.end_date
            .ok_or_else(|| AppError::Backend(format!("No end date returned for {year}")))
    }

    async fn fetch_plot(&self, request: &PlotRequest) -> AppResult<Figure> {
        let url = self.endpoint(request.route())?;
        tracing::debug!(
            context = %request.context,
            stream = request.kind.as_str(),
            seq = request.seq,
            url = %url,
            "Sending plot request"
        );
        let response = self.send(self.http_client.post(url).json(request)).await?;
        self.json(response, "plot").await
    }

    async fn fetch_summary(&self, request: &SummaryRequest) -> AppResult<SummaryStats> {
        let url = self.endpoint("get_summary_stats")?;
        let response = self.send(self.http_client.post(url).json(request)).await?;
        let body: SummaryResponse = self.json(response, "summary").await?;
        body.into_stats()
    }

    async fn download_summary(&self, request: &SummaryDownloadRequest) -> AppResult<Vec<u8>> {
        let url = self.endpoint("download_summary_data")?;
        let response = self.send(self.http_client.post(url).json(request)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to read archive: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn data_download_url(&self, query: &DataDownloadQuery) -> AppResult<Url> {
        let url = self.endpoint("download_data")?;
        let request = self
            .http_client
            .get(url)
            .query(query)
            .build()
            .map_err(|e| AppError::Backend(format!("Invalid download query: {e}")))?;
        Ok(request.url().clone())
    }
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

/// Replace the non-standard `NaN`, `Infinity` and `-Infinity` literals that
/// Python's JSON encoder emits with `null`. String contents are left alone.
fn null_non_finite(text: &str) -> Cow<'_, str> {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

    if !TOKENS.iter().any(|t| text.contains(t)) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = TOKENS.iter().find(|t| rest.starts_with(**t)) {
            out.push_str("null");
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    Cow::Owned(out)
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Option catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Invalid option for {field}: {value}")]
    InvalidOption { field: &'static str, value: String },

    #[error("Plot fetch failed: {0}")]
    PlotFetchFailed(String),

    #[error("Summary fetch failed: {0}")]
    SummaryFetchFailed(String),

    #[error("No statistics available: {0}")]
    NoStatisticsAvailable(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Only a failed catalog load ends the session; everything else leaves
    /// the previous state on screen.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CatalogUnavailable(_))
    }

    /// Short message suitable for a user-facing banner or warning.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::CatalogUnavailable(_) => {
                "Unable to load the available options. Please reload the page.".to_string()
            }
            Self::NoStatisticsAvailable(target) => {
                format!("No {target} statistics have been loaded yet.")
            }
            Self::PlotFetchFailed(_) => "The plot could not be updated.".to_string(),
            Self::SummaryFetchFailed(_) => "The summary could not be updated.".to_string(),
            other => other.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

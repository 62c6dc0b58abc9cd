use thiserror::Error;

/// Errors from fetching or reading the LiveChart schedule.
#[derive(Debug, Error)]
pub enum LiveChartError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to fetch schedule, received a {0} status code")]
    Status(u16),

    #[error("Malformed schedule page: {0}")]
    Malformed(String),

    #[error("Rate limited by LiveChart (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },
}

pub type Result<T> = std::result::Result<T, LiveChartError>;

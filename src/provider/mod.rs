//! Data provider: fetches schedules and race results.
//!
//! Raw payloads are normalized into [`RaceResult`] rows here, so everything
//! downstream works on validated records. The on-disk cache and retry policy
//! are implementation details of [`ErgastProvider`].

pub mod cache;
pub mod ergast;
pub mod retry;
pub mod wire;

pub use cache::ResponseCache;
pub use ergast::{ErgastProvider, ProviderConfig};

use crate::models::{Event, RaceResult};
use thiserror::Error;

/// Errors raised while fetching data.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("cannot reach {url}: {message}")]
    Network { url: String, message: String },

    #[error("data provider returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("no data available for {what}")]
    NotFound { what: String },

    #[error("unreadable response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ProviderError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network { .. } => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::NotFound { .. } | ProviderError::Decode { .. } => false,
        }
    }
}

/// Source of schedules and results.
#[allow(async_fn_in_trait)]
pub trait DataProvider {
    /// All events of a season, in round order.
    async fn fetch_schedule(&self, season: i32) -> Result<Vec<Event>, ProviderError>;

    /// Result rows of a whole season, or of a single round.
    async fn fetch_results(
        &self,
        season: i32,
        round: Option<u32>,
    ) -> Result<Vec<RaceResult>, ProviderError>;
}

//! Errors produced by the aggregator.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// The requested season, round or driver is not in the supplied rows.
    #[error("no data found for {what}")]
    DataNotFound { what: String },

    /// A row is missing required fields. Only raised in strict mode.
    #[error("malformed result row #{index} ({driver} {race}): {reason}")]
    MalformedInput {
        index: usize,
        driver: String,
        race: String,
        reason: String,
    },
}

impl StatsError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StatsError::DataNotFound { what: what.into() }
    }
}

pub type StatsResult<T> = std::result::Result<T, StatsError>;

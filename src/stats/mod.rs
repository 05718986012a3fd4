//! Statistics over loaded race results.
//!
//! The aggregator never performs I/O; it works on rows the data provider
//! has already fetched and normalized.

pub mod aggregator;
pub mod error;

pub use aggregator::{AggregateOptions, InclusionPolicy, StatsAggregator};

//! Rendering and export of aggregated statistics.
//!
//! Console tables live in [`console`], CSV files in [`csv_export`]. JSON output
//! is a direct serialization of the typed results.

pub mod console;
pub mod csv_export;

use anyhow::Result;
use serde::Serialize;

/// Pretty-printed JSON for any result type.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

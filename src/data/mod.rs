//! Data ingestion and the in-memory time-series table.

pub mod loader;
pub mod series;

pub use loader::{list_entity_files, parse_timestamp, DataLoader, LoaderError};
pub use series::{SeriesColumn, SeriesError, TimeSeries};

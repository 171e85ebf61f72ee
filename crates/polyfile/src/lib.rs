//! Polyfile: a zip container caching boundary geometry projected to
//! Web-Mercator meters.
//!
//! Converting a Shapefile once lets every zoom level render from compact
//! integer coordinates without reparsing or reprojecting the source.

pub mod config;
pub mod converter;
pub mod error;
pub mod format;
pub mod reader;

pub use config::{digits_only, excluding, ConverterConfig};
pub use converter::{convert_records, project_point, ConvertSummary, Converter};
pub use error::{PolyfileError, PolyfileResult};
pub use reader::{Feature, FeatureIter, PolyfileReader};

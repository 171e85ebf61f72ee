//! ESRI Shapefile reader for polygon and polyline boundary data.
//!
//! Reads the `.shp` geometry stream, one id column from the `.dbf`
//! attribute table and, when present, the `.shx` record index. Records
//! can be filtered by an id predicate and a lon/lat select box.
//!
//! All multi-byte values are decoded with explicit byte order, so results
//! do not depend on the host.

pub mod dbf;
pub mod error;
pub mod id_filter;
pub mod index;
pub mod reader;
pub mod record;
pub mod selection;

pub use error::{ShapefileError, ShapefileResult};
pub use id_filter::{all_ids, digits_only, excluding, IdValidator};
pub use reader::ShapefileReader;
pub use record::{RecordHeader, ShapeRecord, ShapeType};
pub use selection::{EmptySelection, Selection};

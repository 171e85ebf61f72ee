//! Conversion settings.

use std::path::PathBuf;

use shapefile_parser::{all_ids, IdValidator};

pub use shapefile_parser::{digits_only, excluding};

/// Everything the converter needs to know about one theme.
#[derive(Clone)]
pub struct ConverterConfig {
    /// Source `.shp` (or its base name)
    pub in_file: PathBuf,

    /// Destination polyfile
    pub out_file: PathBuf,

    /// DBF column holding the feature id (e.g. `STUSPS`, `ZCTA`)
    pub id_field: String,

    /// Records whose id fails this predicate are not converted
    pub is_valid_id: IdValidator,
}

impl ConverterConfig {
    /// Config admitting every id.
    pub fn new(
        in_file: impl Into<PathBuf>,
        out_file: impl Into<PathBuf>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            in_file: in_file.into(),
            out_file: out_file.into(),
            id_field: id_field.into(),
            is_valid_id: all_ids(),
        }
    }

    pub fn with_validator(mut self, is_valid_id: IdValidator) -> Self {
        self.is_valid_id = is_valid_id;
        self
    }
}

impl std::fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("in_file", &self.in_file)
            .field("out_file", &self.out_file)
            .field("id_field", &self.id_field)
            .finish_non_exhaustive()
    }
}

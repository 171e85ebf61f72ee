//! Tiler configuration (themes.yaml).
//!
//! A config file lists the themes to tile: where each theme's Shapefile
//! lives, where its polyfile goes, which DBF column holds the feature ids
//! and which ids to keep. Relative paths are resolved against the config
//! file's directory. `${VAR}` and `${VAR:-default}` are expanded before
//! parsing.

use anyhow::{Context, Result};
use polyfile::ConverterConfig;
use projection::MAX_ZOOM;
use renderer::RenderConfig;
use serde::{Deserialize, Serialize};
use shapefile_parser::{all_ids, digits_only, excluding, IdValidator};
use std::collections::HashSet;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_output_dir() -> PathBuf {
    PathBuf::from("tiles")
}

fn default_min_zoom() -> u32 {
    3
}

fn default_max_zoom() -> u32 {
    15
}

fn default_writers() -> usize {
    2
}

/// Top-level tiler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilerConfig {
    /// Directory receiving rendered tiles
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Default zoom range for themes that do not set their own
    #[serde(default = "default_min_zoom")]
    pub min_zoom: u32,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u32,

    /// Number of threads writing tiles out of the render queue
    #[serde(default = "default_writers")]
    pub writers: usize,

    /// Leave tiles already present in the output directory untouched
    #[serde(default)]
    pub skip_existing: bool,

    #[serde(default)]
    pub render: RenderConfig,

    pub themes: Vec<ThemeConfig>,
}

/// Which ids a theme keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdFilter {
    /// Every id
    #[default]
    All,
    /// Non-empty all-digit ids (ZIP code tabulation areas)
    Digits,
}

/// One boundary theme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Theme name, used in tile names (`tile_<name>_<z>_<x>_<y>.png`)
    pub name: String,

    /// Source `.shp` file
    pub shapefile: PathBuf,

    /// Polyfile written by `convert` and read by `render`
    pub polyfile: PathBuf,

    /// DBF column holding the feature id
    pub id_field: String,

    #[serde(default)]
    pub id_filter: IdFilter,

    /// Ids dropped in addition to the filter
    #[serde(default)]
    pub exclude_ids: Vec<String>,

    pub min_zoom: Option<u32>,
    pub max_zoom: Option<u32>,
}

impl ThemeConfig {
    /// Predicate combining `id_filter` and `exclude_ids`.
    pub fn validator(&self) -> IdValidator {
        let base = match self.id_filter {
            IdFilter::All => all_ids(),
            IdFilter::Digits => digits_only(),
        };
        if self.exclude_ids.is_empty() {
            return base;
        }
        let excluded = excluding(self.exclude_ids.iter().cloned());
        Arc::new(move |id: &str| base(id) && excluded(id))
    }

    pub fn converter_config(&self) -> ConverterConfig {
        ConverterConfig::new(&self.shapefile, &self.polyfile, &self.id_field)
            .with_validator(self.validator())
    }

    /// Zoom levels to render, falling back to the global range.
    pub fn zoom_range(&self, config: &TilerConfig) -> RangeInclusive<u32> {
        self.min_zoom.unwrap_or(config.min_zoom)..=self.max_zoom.unwrap_or(config.max_zoom)
    }
}

impl TilerConfig {
    /// Load, expand, resolve and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read tiler config from {:?}", path))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml(&content, base)
            .with_context(|| format!("Invalid tiler config {:?}", path))
    }

    /// Parse config text; relative paths are resolved against `base`.
    pub fn from_yaml(content: &str, base: &Path) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let mut config: TilerConfig =
            serde_yaml::from_str(&expanded).context("Failed to parse tiler config YAML")?;

        config.output_dir = resolve(base, &config.output_dir);
        for theme in &mut config.themes {
            theme.shapefile = resolve(base, &theme.shapefile);
            theme.polyfile = resolve(base, &theme.polyfile);
        }
        config.render = config.render.with_env_overrides();

        validate(&config)?;
        Ok(config)
    }

    pub fn theme(&self, name: &str) -> Result<&ThemeConfig> {
        self.themes
            .iter()
            .find(|t| t.name == name)
            .with_context(|| {
                let known: Vec<&str> = self.themes.iter().map(|t| t.name.as_str()).collect();
                format!("Unknown theme {:?} (configured: {:?})", name, known)
            })
    }

    /// The named themes, or all of them when `names` is empty.
    pub fn select_themes(&self, names: &[String]) -> Result<Vec<&ThemeConfig>> {
        if names.is_empty() {
            return Ok(self.themes.iter().collect());
        }
        names.iter().map(|n| self.theme(n)).collect()
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` in config text.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }
            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate(config: &TilerConfig) -> Result<()> {
    anyhow::ensure!(!config.themes.is_empty(), "No themes configured");
    anyhow::ensure!(config.writers > 0, "writers must be at least 1");
    anyhow::ensure!(
        config.render.max_canvas_pixels > 0,
        "render.max_canvas_pixels must be positive"
    );

    let mut names = HashSet::new();
    for theme in &config.themes {
        anyhow::ensure!(!theme.name.is_empty(), "Theme name cannot be empty");
        anyhow::ensure!(
            !theme.name.contains(['/', '\\']),
            "Theme name {:?} cannot contain path separators",
            theme.name
        );
        anyhow::ensure!(
            names.insert(theme.name.as_str()),
            "Duplicate theme {:?}",
            theme.name
        );
        anyhow::ensure!(
            !theme.id_field.is_empty(),
            "Theme {:?} has an empty id_field",
            theme.name
        );

        let zooms = theme.zoom_range(config);
        anyhow::ensure!(
            zooms.start() <= zooms.end(),
            "Theme {:?}: min zoom {} exceeds max zoom {}",
            theme.name,
            zooms.start(),
            zooms.end()
        );
        anyhow::ensure!(
            *zooms.end() <= MAX_ZOOM,
            "Theme {:?}: max zoom {} exceeds {}",
            theme.name,
            zooms.end(),
            MAX_ZOOM
        );
    }
    Ok(())
}

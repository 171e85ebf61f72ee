//! Configuration for the tile rasterizer.

use serde::{Deserialize, Serialize};

use crate::png::Rgb;

/// Largest canvas (in pixels) a single leaf may allocate, by default.
///
/// Canvases are one byte per pixel, so this caps a leaf at 256 MiB.
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Configuration for the tile rasterizer.
///
/// Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas size limit per leaf; larger tile ranges are split before
    /// rendering. Leaves render concurrently, one per rayon thread, so peak
    /// memory is roughly this many bytes times the thread count.
    pub max_canvas_pixels: u64,

    /// Palette index 0; transparent in the encoded tiles.
    pub background: Rgb,

    /// Color of polygon outlines and polylines.
    pub outline: Rgb,

    /// Interior color for polygon themes; `None` draws outlines only.
    pub fill: Option<Rgb>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
            background: Rgb::WHITE,
            outline: Rgb::RED,
            fill: None,
        }
    }
}

impl RenderConfig {
    /// Load configuration from environment variables.
    ///
    /// `TILER_MAX_CANVAS_PIXELS` overrides the canvas limit; unparsable or
    /// zero values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of an existing configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("TILER_MAX_CANVAS_PIXELS") {
            match val.parse::<u64>() {
                Ok(pixels) if pixels > 0 => self.max_canvas_pixels = pixels,
                _ => tracing::warn!(value = %val, "Ignoring invalid TILER_MAX_CANVAS_PIXELS"),
            }
        }
        self
    }

    /// Palette for a leaf canvas: background, outline, then fill if set.
    pub fn palette(&self) -> Vec<Rgb> {
        let mut palette = vec![self.background, self.outline];
        palette.extend(self.fill);
        palette
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette() {
        let config = RenderConfig::default();
        assert_eq!(config.palette(), vec![Rgb::WHITE, Rgb::RED]);

        let filled = RenderConfig {
            fill: Some(Rgb::GREEN),
            ..RenderConfig::default()
        };
        assert_eq!(filled.palette(), vec![Rgb::WHITE, Rgb::RED, Rgb::GREEN]);
    }

    #[test]
    fn test_from_env_override() {
        std::env::set_var("TILER_MAX_CANVAS_PIXELS", "65536");
        assert_eq!(RenderConfig::from_env().max_canvas_pixels, 65536);
        std::env::set_var("TILER_MAX_CANVAS_PIXELS", "lots");
        assert_eq!(
            RenderConfig::from_env().max_canvas_pixels,
            DEFAULT_MAX_CANVAS_PIXELS
        );
        std::env::remove_var("TILER_MAX_CANVAS_PIXELS");
    }
}

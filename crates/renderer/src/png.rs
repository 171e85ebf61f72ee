//! PNG encoding for indexed-color tiles.
//!
//! Tiles are 8-bit palette images (color type 3). Palette index 0 is the
//! background and is written fully transparent through a one-entry `tRNS`
//! chunk; every other entry stays opaque.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Maximum colors for indexed PNG (PNG8)
pub const MAX_PALETTE_SIZE: usize = 256;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// An opaque palette color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Create an indexed PNG (color type 3) from palette and indices.
///
/// # Arguments
/// * `width`, `height` - Image size in pixels, both non-zero
/// * `palette` - 1 to 256 colors; entry 0 becomes transparent
/// * `indices` - One palette index per pixel, row-major
///
/// Mismatched inputs are caller defects and are reported as
/// [`RenderError::Encode`].
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[Rgb],
    indices: &[u8],
) -> RenderResult<Vec<u8>> {
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE {
        return Err(RenderError::Encode(format!(
            "palette must have 1..={} entries, got {}",
            MAX_PALETTE_SIZE,
            palette.len()
        )));
    }
    if width == 0 || height == 0 || width > u32::MAX as usize || height > u32::MAX as usize {
        return Err(RenderError::Encode(format!(
            "invalid image size {}x{}",
            width, height
        )));
    }
    if indices.len() != width * height {
        return Err(RenderError::Encode(format!(
            "{} indices for a {}x{} image",
            indices.len(),
            width,
            height
        )));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= palette.len()) {
        return Err(RenderError::Encode(format!(
            "index {} outside {} color palette",
            bad,
            palette.len()
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    // IHDR chunk
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth (8 bits per palette index)
    ihdr_data.push(3); // color type 3 = indexed
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    let plte_data: Vec<u8> = palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
    write_chunk(&mut png, b"PLTE", &plte_data);

    // background transparent, entries past the tRNS data default to opaque
    write_chunk(&mut png, b"tRNS", &[0]);

    let idat_data = deflate_idat_indexed(indices, width, height)
        .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Deflate indexed image data for the IDAT chunk.
fn deflate_idat_indexed(indices: &[u8], width: usize, height: usize) -> std::io::Result<Vec<u8>> {
    // each row is: filter_byte + width index bytes
    let mut uncompressed = Vec::with_capacity(height * (1 + width));
    for row in indices.chunks_exact(width) {
        uncompressed.push(0); // filter type: none
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}

/// Append a chunk: length, tag, data, CRC-32 over tag and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_tags(png: &[u8]) -> Vec<String> {
        let mut tags = Vec::new();
        let mut pos = 8;
        while pos + 8 <= png.len() {
            let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
            tags.push(String::from_utf8_lossy(&png[pos + 4..pos + 8]).to_string());
            pos += 12 + len;
        }
        tags
    }

    #[test]
    fn test_chunk_order() {
        let png = create_png_indexed(2, 2, &[Rgb::WHITE, Rgb::RED], &[0, 1, 1, 0]).unwrap();
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        assert_eq!(chunk_tags(&png), vec!["IHDR", "PLTE", "tRNS", "IDAT", "IEND"]);
    }

    #[test]
    fn test_chunk_crc() {
        let mut out = Vec::new();
        write_chunk(&mut out, b"IEND", &[]);
        // well-known CRC of an empty IEND chunk
        assert_eq!(&out[8..12], &[0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(create_png_indexed(1, 1, &[], &[0]).is_err());
        assert!(create_png_indexed(2, 2, &[Rgb::WHITE], &[0, 0, 0]).is_err());
        assert!(create_png_indexed(1, 1, &[Rgb::WHITE], &[1]).is_err());
        assert!(create_png_indexed(0, 1, &[Rgb::WHITE], &[]).is_err());
        assert!(create_png_indexed(1, 1, &[Rgb::WHITE; 257], &[0]).is_err());
    }
}

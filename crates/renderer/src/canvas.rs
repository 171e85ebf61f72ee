//! 8-bit indexed drawing surface.
//!
//! Pixels hold palette indices, row-major with row 0 at the top. Index 0 is
//! the background: new canvases are filled with it, and blank detection and
//! PNG transparency both key off it.

use crate::error::{RenderError, RenderResult};
use crate::png::{create_png_indexed, Rgb, MAX_PALETTE_SIZE};

/// Index of the background color in every canvas palette.
pub const BACKGROUND: u8 = 0;

/// Linear mapping from source coordinates to pixels, set by
/// [`Canvas::with_bounds`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct BoundsTransform {
    min_x: f64,
    min_y: f64,
    x_mul: f64,
    y_mul: f64,
}

/// A Bresenham walk along the major axis from `(ax, ay)`, `dx >= dy >= 0`.
///
/// With `e0 = dx / 2`, step `k` sits on minor offset
/// `n(k) = ceil((k*dy - e0) / dx)`, which lets a walk start at any step.
#[derive(Debug, Clone, Copy)]
struct BresenhamStep {
    ax: i64,
    ay: i64,
    dx: i64,
    dy: i64,
    ystep: i64,
}

impl BresenhamStep {
    /// Minor offset and error term on entering step `k`.
    fn state_at(&self, k: i64) -> (i64, i64) {
        if self.dx == 0 {
            return (0, self.dx / 2);
        }
        let (k, dx, dy) = (k as i128, self.dx as i128, self.dy as i128);
        let e0 = dx / 2;
        let n = -(-(k * dy - e0)).div_euclid(dx);
        (n as i64, (e0 - k * dy + n * dx) as i64)
    }

    /// First and last steps whose pixel lies on a `major` by `minor` canvas.
    fn visible(&self, major: i64, minor: i64) -> Option<(i64, i64)> {
        let (ax, ay, dx, dy) = (
            self.ax as i128,
            self.ay as i128,
            self.dx as i128,
            self.dy as i128,
        );
        let (major, minor) = (major as i128, minor as i128);

        let mut first = (-ax).max(0);
        let mut last = dx.min(major - 1 - ax);

        let (n_lo, n_hi) = if self.ystep > 0 {
            ((-ay).max(0), dy.min(minor - 1 - ay))
        } else {
            ((ay - (minor - 1)).max(0), dy.min(ay))
        };
        if n_lo > n_hi {
            return None;
        }
        if dy > 0 {
            let e0 = dx / 2;
            first = first.max(((n_lo - 1) * dx + e0).div_euclid(dy) + 1);
            last = last.min((n_hi * dx + e0).div_euclid(dy));
        }

        (first <= last).then_some((first as i64, last as i64))
    }
}

#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    palette: Vec<Rgb>,
    pixels: Vec<u8>,
    transform: Option<BoundsTransform>,
}

impl Canvas {
    /// Canvas with a white background and no other colors.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            palette: vec![Rgb::WHITE],
            pixels: vec![BACKGROUND; width * height],
            transform: None,
        }
    }

    /// Canvas with a fixed palette; `palette[0]` is the background.
    ///
    /// Entries are kept in order without deduplication so callers can rely
    /// on their positions.
    pub fn with_palette(width: usize, height: usize, palette: &[Rgb]) -> RenderResult<Self> {
        if palette.is_empty() {
            return Err(RenderError::Encode("canvas palette is empty".to_string()));
        }
        if palette.len() > MAX_PALETTE_SIZE {
            return Err(RenderError::PaletteFull(palette.len()));
        }
        let mut canvas = Self::new(width, height);
        canvas.palette = palette.to_vec();
        Ok(canvas)
    }

    /// Map `(min_x, min_y)` to pixel (0, 0) and `(max_x, max_y)` to
    /// (width, height) for [`polyline`](Self::polyline).
    ///
    /// `min_y > max_y` is allowed and flips the axis, e.g. north-up lat/lon.
    pub fn with_bounds(mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        self.transform = Some(BoundsTransform {
            min_x,
            min_y,
            x_mul: self.width as f64 / (max_x - min_x),
            y_mul: self.height as f64 / (max_y - min_y),
        });
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn palette(&self) -> &[Rgb] {
        &self.palette
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Palette index of a color, adding it if new.
    pub fn get_color(&mut self, r: u8, g: u8, b: u8) -> RenderResult<u8> {
        let color = Rgb::new(r, g, b);
        if let Some(i) = self.palette.iter().position(|&c| c == color) {
            return Ok(i as u8);
        }
        if self.palette.len() >= MAX_PALETTE_SIZE {
            return Err(RenderError::PaletteFull(self.palette.len()));
        }
        self.palette.push(color);
        Ok((self.palette.len() - 1) as u8)
    }

    /// Set one pixel; coordinates off the canvas are ignored.
    #[inline]
    pub fn plot(&mut self, x: i64, y: i64, color: u8) {
        if x >= 0 && y >= 0 && (x as u64) < self.width as u64 && (y as u64) < self.height as u64 {
            self.pixels[y as usize * self.width + x as usize] = color;
        }
    }

    /// Integer Bresenham line, both endpoints included.
    ///
    /// Only the steps that land on the canvas are walked, so the cost is
    /// bounded by the canvas size however far the endpoints reach.
    pub fn line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: u8) {
        let (w, h) = (self.width as i64, self.height as i64);
        // entirely on one side of the canvas: nothing to plot
        if (x0 < 0 && x1 < 0) || (y0 < 0 && y1 < 0) || (x0 >= w && x1 >= w) || (y0 >= h && y1 >= h) {
            return;
        }

        let steep = (y1 - y0).abs() > (x1 - x0).abs();
        let (mut ax, mut ay, mut bx, mut by) = (x0, y0, x1, y1);
        if steep {
            std::mem::swap(&mut ax, &mut ay);
            std::mem::swap(&mut bx, &mut by);
        }
        if ax > bx {
            std::mem::swap(&mut ax, &mut bx);
            std::mem::swap(&mut ay, &mut by);
        }

        let step = BresenhamStep {
            ax,
            ay,
            dx: bx - ax,
            dy: (by - ay).abs(),
            ystep: if ay < by { 1 } else { -1 },
        };
        let (major, minor) = if steep { (h, w) } else { (w, h) };
        let Some((first, last)) = step.visible(major, minor) else {
            return;
        };

        let (mut n, mut error) = step.state_at(first);
        for k in first..=last {
            let (x, y) = (ax + k, ay + step.ystep * n);
            if steep {
                self.plot(y, x, color);
            } else {
                self.plot(x, y, color);
            }
            error -= step.dy;
            if error < 0 {
                n += 1;
                error += step.dx;
            }
        }
    }

    /// Closed outline through `points`, last point joined back to the first.
    pub fn polygon(&mut self, points: &[(i64, i64)], color: u8) {
        match points {
            [] => {}
            [(x, y)] => self.plot(*x, *y, color),
            _ => {
                for pair in points.windows(2) {
                    self.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1, color);
                }
                let (first, last) = (points[0], points[points.len() - 1]);
                if first != last {
                    self.line(last.0, last.1, first.0, first.1, color);
                }
            }
        }
    }

    /// Open line string through source coordinates mapped by the bounds
    /// transform (identity when none was set), truncating to pixels.
    pub fn polyline(&mut self, coords: &[(f64, f64)], color: u8) {
        let t = self.transform.unwrap_or(BoundsTransform {
            min_x: 0.0,
            min_y: 0.0,
            x_mul: 1.0,
            y_mul: 1.0,
        });
        let points: Vec<(i64, i64)> = coords
            .iter()
            .map(|&(x, y)| {
                (
                    (t.x_mul * (x - t.min_x)) as i64,
                    (t.y_mul * (y - t.min_y)) as i64,
                )
            })
            .collect();
        match points.as_slice() {
            [] => {}
            [(x, y)] => self.plot(*x, *y, color),
            _ => {
                for pair in points.windows(2) {
                    self.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1, color);
                }
            }
        }
    }

    /// Fill the interior of a set of rings (even-odd rule), sampling at
    /// pixel centers. Coordinates are in pixels.
    pub fn fill_rings(&mut self, rings: &[Vec<(f64, f64)>], color: u8) {
        let h = self.height as i64;
        let mut crossings: Vec<Vec<f64>> = vec![Vec::new(); self.height];

        for ring in rings {
            let n = ring.len();
            if n < 3 {
                continue;
            }
            for i in 0..n {
                let (x0, y0) = ring[i];
                let (x1, y1) = ring[(i + 1) % n];
                if y0 == y1 {
                    continue;
                }
                let (lo, hi) = if y0 < y1 { (y0, y1) } else { (y1, y0) };
                // rows whose center c satisfies lo <= c < hi
                let first = ((lo - 0.5).ceil() as i64).max(0);
                let last = ((hi - 0.5).ceil() as i64 - 1).min(h - 1);
                for row in first..=last {
                    let c = row as f64 + 0.5;
                    crossings[row as usize].push(x0 + (c - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }

        let w = self.width as i64;
        for (row, xs) in crossings.iter_mut().enumerate() {
            if xs.len() < 2 {
                continue;
            }
            xs.sort_by(|a, b| a.total_cmp(b));
            for span in xs.chunks_exact(2) {
                let start = ((span[0] - 0.5).ceil() as i64).max(0);
                let end = ((span[1] - 0.5).ceil() as i64).min(w);
                if start < end {
                    let base = row * self.width;
                    self.pixels[base + start as usize..base + end as usize].fill(color);
                }
            }
        }
    }

    /// Copy of a rectangular region; parts off the canvas stay background.
    pub fn window(&self, x: usize, y: usize, width: usize, height: usize) -> Canvas {
        let mut out = Canvas {
            width,
            height,
            palette: self.palette.clone(),
            pixels: vec![BACKGROUND; width * height],
            transform: None,
        };
        let cols = width.min(self.width.saturating_sub(x));
        for row in 0..height.min(self.height.saturating_sub(y)) {
            let src = (y + row) * self.width + x;
            out.pixels[row * width..row * width + cols].copy_from_slice(&self.pixels[src..src + cols]);
        }
        out
    }

    /// True when every pixel of the region is background.
    pub fn is_window_blank(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        let cols = width.min(self.width.saturating_sub(x));
        (0..height.min(self.height.saturating_sub(y))).all(|row| {
            let src = (y + row) * self.width + x;
            self.pixels[src..src + cols].iter().all(|&p| p == BACKGROUND)
        })
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&p| p == BACKGROUND)
    }

    /// Encode as an indexed PNG with a transparent background.
    pub fn encode(&self) -> RenderResult<Vec<u8>> {
        create_png_indexed(self.width, self.height, &self.palette, &self.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(canvas: &Canvas) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for y in 0..canvas.height() {
            for x in 0..canvas.width() {
                if canvas.pixel(x, y) != Some(BACKGROUND) {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn test_get_color_dedups() {
        let mut canvas = Canvas::new(4, 4);
        assert_eq!(canvas.get_color(255, 255, 255).unwrap(), 0);
        let red = canvas.get_color(255, 0, 0).unwrap();
        assert_eq!(red, 1);
        assert_eq!(canvas.get_color(255, 0, 0).unwrap(), red);
        assert_eq!(canvas.palette().len(), 2);
    }

    #[test]
    fn test_palette_limit() {
        let mut canvas = Canvas::new(1, 1);
        for i in 1..256u32 {
            canvas.get_color(0, (i >> 8) as u8, i as u8).unwrap();
        }
        assert_eq!(canvas.palette().len(), 256);
        assert!(matches!(
            canvas.get_color(1, 2, 3),
            Err(RenderError::PaletteFull(256))
        ));
    }

    #[test]
    fn test_plot_ignores_off_canvas() {
        let mut canvas = Canvas::new(3, 3);
        canvas.plot(-1, 0, 1);
        canvas.plot(0, 3, 1);
        canvas.plot(3, 0, 1);
        assert!(canvas.is_blank());
        canvas.plot(2, 2, 1);
        assert_eq!(lit(&canvas), vec![(2, 2)]);
    }

    #[test]
    fn test_line_endpoints_and_shape() {
        let mut canvas = Canvas::new(8, 8);
        canvas.line(0, 0, 4, 2, 1);
        assert_eq!(lit(&canvas), vec![(0, 0), (1, 0), (2, 1), (3, 1), (4, 2)]);

        // steep and reversed
        let mut canvas = Canvas::new(8, 8);
        canvas.line(1, 5, 0, 0, 1);
        let pts = lit(&canvas);
        assert_eq!(pts.len(), 6);
        assert!(pts.contains(&(1, 5)));
        assert!(pts.contains(&(0, 0)));
    }

    #[test]
    fn test_line_off_canvas_is_skipped() {
        let mut canvas = Canvas::new(4, 4);
        canvas.line(-1_000_000_000, -5, 1_000_000_000, -5, 1);
        assert!(canvas.is_blank());
    }

    /// Every point of an unclipped Bresenham walk, both endpoints included.
    fn walk(x0: i64, y0: i64, x1: i64, y1: i64) -> Vec<(i64, i64)> {
        let steep = (y1 - y0).abs() > (x1 - x0).abs();
        let (mut ax, mut ay, mut bx, mut by) = (x0, y0, x1, y1);
        if steep {
            std::mem::swap(&mut ax, &mut ay);
            std::mem::swap(&mut bx, &mut by);
        }
        if ax > bx {
            std::mem::swap(&mut ax, &mut bx);
            std::mem::swap(&mut ay, &mut by);
        }
        let (dx, dy) = (bx - ax, (by - ay).abs());
        let ystep = if ay < by { 1 } else { -1 };
        let (mut error, mut y) = (dx / 2, ay);
        let mut out = Vec::new();
        for x in ax..bx {
            out.push(if steep { (y, x) } else { (x, y) });
            error -= dy;
            if error < 0 {
                y += ystep;
                error += dx;
            }
        }
        out.push(if steep { (by, bx) } else { (bx, by) });
        out
    }

    #[test]
    fn test_clipped_line_matches_full_walk() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let (w, h) = (rng.gen_range(1..24usize), rng.gen_range(1..24usize));
            let mut p = || (rng.gen_range(-60..80i64), rng.gen_range(-60..80i64));
            let ((x0, y0), (x1, y1)) = (p(), p());

            let mut canvas = Canvas::new(w, h);
            canvas.line(x0, y0, x1, y1, 1);

            let mut expected: Vec<(usize, usize)> = walk(x0, y0, x1, y1)
                .into_iter()
                .filter(|&(x, y)| x >= 0 && y >= 0 && x < w as i64 && y < h as i64)
                .map(|(x, y)| (x as usize, y as usize))
                .collect();
            expected.sort_by_key(|&(x, y)| (y, x));
            expected.dedup();
            assert_eq!(
                lit(&canvas),
                expected,
                "{}x{} line ({}, {}) -> ({}, {})",
                w,
                h,
                x0,
                y0,
                x1,
                y1
            );
        }
    }

    #[test]
    fn test_line_with_far_endpoints_crosses_canvas() {
        let mut canvas = Canvas::new(4, 4);
        canvas.line(-1_000_000_000_000, 2, 1_000_000_000_000, 2, 1);
        assert_eq!(lit(&canvas), vec![(0, 2), (1, 2), (2, 2), (3, 2)]);

        let mut canvas = Canvas::new(4, 4);
        canvas.line(-3_000_000_000_000, -3_000_000_000_000, 3_000_000_000_000, 3_000_000_000_000, 1);
        assert_eq!(lit(&canvas), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_polygon_closes_ring() {
        let mut canvas = Canvas::new(5, 5);
        canvas.polygon(&[(0, 0), (4, 0), (4, 4), (0, 4)], 1);
        let pts = lit(&canvas);
        assert_eq!(pts.len(), 16);
        assert!(pts.contains(&(0, 2)), "closing edge drawn");
        assert_eq!(canvas.pixel(2, 2), Some(BACKGROUND));
    }

    #[test]
    fn test_polyline_with_flipped_bounds() {
        // lon/lat box with north at row 0
        let mut canvas = Canvas::new(10, 10).with_bounds(-1.0, 1.0, 1.0, -1.0);
        canvas.polyline(&[(-1.0, 1.0), (0.0, 0.0)], 1);
        assert_eq!(canvas.pixel(0, 0), Some(1));
        assert_eq!(canvas.pixel(5, 5), Some(1));
        assert_eq!(canvas.pixel(9, 9), Some(BACKGROUND));
    }

    #[test]
    fn test_fill_rings_even_odd() {
        let mut canvas = Canvas::new(10, 10);
        let outer = vec![(1.0, 1.0), (9.0, 1.0), (9.0, 9.0), (1.0, 9.0)];
        let hole = vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0)];
        canvas.fill_rings(&[outer, hole], 2);
        assert_eq!(canvas.pixel(1, 1), Some(2));
        assert_eq!(canvas.pixel(8, 8), Some(2));
        assert_eq!(canvas.pixel(9, 9), Some(BACKGROUND));
        assert_eq!(canvas.pixel(4, 4), Some(BACKGROUND));
        assert_eq!(canvas.pixel(5, 5), Some(BACKGROUND));
        assert_eq!(canvas.pixel(0, 5), Some(BACKGROUND));
        assert_eq!(lit(&canvas).len(), 64 - 4);
    }

    #[test]
    fn test_window_and_blank() {
        let mut canvas = Canvas::new(8, 4);
        canvas.plot(5, 1, 1);
        assert!(canvas.is_window_blank(0, 0, 4, 4));
        assert!(!canvas.is_window_blank(4, 0, 4, 4));

        let right = canvas.window(4, 0, 4, 4);
        assert_eq!(right.width(), 4);
        assert_eq!(right.pixel(1, 1), Some(1));
        assert_eq!(lit(&right), vec![(1, 1)]);
    }
}

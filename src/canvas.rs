// ============================================================================
// PIXEL BUFFER — the document's single indexed-color raster
// ============================================================================

use image::{Rgba, RgbaImage};

/// A pixel color. `None` is an absent (fully transparent) pixel.
pub type Color = Option<Rgba<u8>>;

/// A canvas pixel addressed by column and row.
///
/// Converts to and from the flat `y * width + x` index used by the
/// history and the contour tracer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelIndex {
    pub x: u32,
    pub y: u32,
}

impl PixelIndex {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn flatten(self, width: u32) -> usize {
        self.y as usize * width as usize + self.x as usize
    }

    /// Inverse of [`flatten`](Self::flatten). `None` for a zero width or a
    /// row that does not fit in `u32`.
    pub fn from_flat(index: usize, width: u32) -> Option<Self> {
        if width == 0 {
            return None;
        }
        let w = width as usize;
        let y = u32::try_from(index / w).ok()?;
        Some(Self { x: (index % w) as u32, y })
    }

    pub fn in_bounds(self, width: u32, height: u32) -> bool {
        self.x < width && self.y < height
    }
}

/// Row-major pixel storage owned by a [`Project`](crate::project::Project).
///
/// The editing core only ever reads and writes single pixels by flat index;
/// whole-buffer replacement is reserved for structural actions.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self::new_filled(width, height, None)
    }

    pub fn new_filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Build from raw parts. Returns `None` when the pixel count does not
    /// match the dimensions.
    pub fn from_parts(width: u32, height: u32, pixels: Vec<Color>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    /// Import an RGBA image. Pixels with zero alpha become absent.
    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        let pixels = src
            .pixels()
            .map(|p| if p[3] == 0 { None } else { Some(*p) })
            .collect();
        Self {
            width: src.width(),
            height: src.height(),
            pixels,
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        for (dst, src) in out.pixels_mut().zip(self.pixels.iter()) {
            *dst = src.unwrap_or(Rgba([0, 0, 0, 0]));
        }
        out
    }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.pixels
    }

    /// Flat index of a signed coordinate, or `None` when it falls off the canvas.
    pub fn index_at(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let p = PixelIndex::new(x as u32, y as u32);
        p.in_bounds(self.width, self.height).then(|| p.flatten(self.width))
    }

    pub fn coords_of(&self, index: usize) -> Option<PixelIndex> {
        PixelIndex::from_flat(index, self.width).filter(|p| p.in_bounds(self.width, self.height))
    }

    /// Color at `index`. Out-of-range reads are absent.
    pub fn pixel(&self, index: usize) -> Color {
        self.pixels.get(index).copied().flatten()
    }

    /// Write `color` at `index`, returning the previous color, or `None`
    /// (outer) when the index is out of range.
    pub fn set_pixel(&mut self, index: usize, color: Color) -> Option<Color> {
        let slot = self.pixels.get_mut(index)?;
        Some(std::mem::replace(slot, color))
    }

    /// Replace dimensions and contents wholesale (snapshot restore, resize, rotate).
    pub(crate) fn replace(&mut self, width: u32, height: u32, pixels: Vec<Color>) {
        debug_assert_eq!(pixels.len(), width as usize * height as usize);
        self.width = width;
        self.height = height;
        self.pixels = pixels;
    }

    /// Flat indices of every pixel equal to `color`, ascending.
    pub fn cluster_of(&self, color: Color) -> Vec<usize> {
        self.pixels
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == color)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Color>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_index_round_trips_through_coordinates() {
        let p = PixelIndex::new(3, 2);
        assert_eq!(p.flatten(10), 23);
        assert_eq!(PixelIndex::from_flat(23, 10), Some(p));
        assert_eq!(PixelIndex::from_flat(5, 0), None);
    }

    #[test]
    fn index_at_rejects_off_canvas_coordinates() {
        let buf = PixelBuffer::new(4, 3);
        assert_eq!(buf.index_at(0, 0), Some(0));
        assert_eq!(buf.index_at(3, 2), Some(11));
        assert_eq!(buf.index_at(-1, 0), None);
        assert_eq!(buf.index_at(4, 0), None);
        assert_eq!(buf.index_at(0, 3), None);
        assert_eq!(buf.coords_of(12), None);
    }

    #[test]
    fn set_pixel_returns_previous_color() {
        let red = Some(Rgba([255, 0, 0, 255]));
        let mut buf = PixelBuffer::new(2, 2);
        assert_eq!(buf.set_pixel(1, red), Some(None));
        assert_eq!(buf.set_pixel(1, None), Some(red));
        assert_eq!(buf.set_pixel(4, red), None);
    }

    #[test]
    fn rgba_import_treats_zero_alpha_as_absent() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let buf = PixelBuffer::from_rgba_image(&img);
        assert_eq!(buf.pixel(0), None);
        assert_eq!(buf.pixel(1), Some(Rgba([10, 20, 30, 255])));
        assert_eq!(buf.to_rgba_image().get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn cluster_of_collects_matching_indices() {
        let ink = Some(Rgba([0, 0, 0, 255]));
        let mut buf = PixelBuffer::new(3, 1);
        buf.set_pixel(0, ink);
        buf.set_pixel(2, ink);
        assert_eq!(buf.cluster_of(ink), vec![0, 2]);
        assert_eq!(buf.cluster_of(None), vec![1]);
    }
}

// ============================================================================
// STRUCTURAL OPERATIONS — flip, rotate, resize, clear, bleach
// ============================================================================
//
// Each operation exists twice: as a plain function on a PixelBuffer and as a
// StructuralAction that the history can hand back for undo/redo.

use rayon::prelude::*;

use crate::canvas::{Color, PixelBuffer};
use crate::components::history::StructuralAction;

// ---------------------------------------------------------------------------
//  Whole-buffer transforms
// ---------------------------------------------------------------------------

/// Mirror left↔right.
pub fn flip_horizontal(canvas: &mut PixelBuffer) {
    let w = canvas.width() as usize;
    if w == 0 {
        return;
    }
    canvas.pixels_mut().par_chunks_mut(w).for_each(|row| row.reverse());
}

/// Mirror top↔bottom.
pub fn flip_vertical(canvas: &mut PixelBuffer) {
    let (w, h) = (canvas.width(), canvas.height());
    if w == 0 {
        return;
    }
    let flipped: Vec<Color> = canvas
        .pixels()
        .chunks(w as usize)
        .rev()
        .flatten()
        .copied()
        .collect();
    canvas.replace(w, h, flipped);
}

/// Rotate a quarter turn clockwise; width and height swap.
pub fn rotate_90cw(canvas: &mut PixelBuffer) {
    let (w, h) = (canvas.width() as usize, canvas.height() as usize);
    let src = canvas.pixels();
    // destination (nx, ny) in an h-wide image reads source (ny, h - 1 - nx)
    let rotated: Vec<Color> = (0..w * h)
        .into_par_iter()
        .map(|i| {
            let (nx, ny) = (i % h, i / h);
            src[(h - 1 - nx) * w + ny]
        })
        .collect();
    canvas.replace(h as u32, w as u32, rotated);
}

/// Rotate a quarter turn counter-clockwise; width and height swap.
pub fn rotate_90ccw(canvas: &mut PixelBuffer) {
    let (w, h) = (canvas.width() as usize, canvas.height() as usize);
    let src = canvas.pixels();
    // destination (nx, ny) in an h-wide image reads source (w - 1 - ny, nx)
    let rotated: Vec<Color> = (0..w * h)
        .into_par_iter()
        .map(|i| {
            let (nx, ny) = (i % h, i / h);
            src[nx * w + (w - 1 - ny)]
        })
        .collect();
    canvas.replace(h as u32, w as u32, rotated);
}

pub fn rotate_180(canvas: &mut PixelBuffer) {
    canvas.pixels_mut().reverse();
}

/// Change the canvas size keeping the top-left corner fixed. New area is
/// transparent; area outside the new bounds is cropped away.
pub fn resize_canvas(canvas: &mut PixelBuffer, new_w: u32, new_h: u32) {
    let (w, h) = (canvas.width() as usize, canvas.height() as usize);
    let (nw, nh) = (new_w as usize, new_h as usize);
    let src = canvas.pixels();
    let resized: Vec<Color> = (0..nw * nh)
        .into_par_iter()
        .map(|i| {
            let (x, y) = (i % nw, i / nw);
            if x < w && y < h { src[y * w + x] } else { None }
        })
        .collect();
    canvas.replace(new_w, new_h, resized);
}

pub fn clear(canvas: &mut PixelBuffer) {
    canvas.pixels_mut().par_iter_mut().for_each(|p| *p = None);
}

/// Replace every pixel of color `from` with `to`; returns the affected indices.
pub fn bleach(canvas: &mut PixelBuffer, from: Color, to: Color) -> Vec<usize> {
    let indices = canvas.cluster_of(from);
    for &i in &indices {
        canvas.set_pixel(i, to);
    }
    indices
}

// ---------------------------------------------------------------------------
//  Undoable actions
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Flips are their own inverse, so nothing is stored.
pub struct FlipAction {
    pub axis: FlipAxis,
}

impl FlipAction {
    fn apply(&self, canvas: &mut PixelBuffer) {
        match self.axis {
            FlipAxis::Horizontal => flip_horizontal(canvas),
            FlipAxis::Vertical => flip_vertical(canvas),
        }
    }
}

impl StructuralAction for FlipAction {
    fn label(&self) -> String {
        match self.axis {
            FlipAxis::Horizontal => "Flip Horizontal".to_string(),
            FlipAxis::Vertical => "Flip Vertical".to_string(),
        }
    }

    fn undo(&self, canvas: &mut PixelBuffer) {
        self.apply(canvas);
    }

    fn redo(&self, canvas: &mut PixelBuffer) {
        self.apply(canvas);
    }

    fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Clockwise90,
    CounterClockwise90,
    Half,
}

pub struct RotateAction {
    pub rotation: Rotation,
}

impl StructuralAction for RotateAction {
    fn label(&self) -> String {
        match self.rotation {
            Rotation::Clockwise90 => "Rotate 90° CW".to_string(),
            Rotation::CounterClockwise90 => "Rotate 90° CCW".to_string(),
            Rotation::Half => "Rotate 180°".to_string(),
        }
    }

    fn undo(&self, canvas: &mut PixelBuffer) {
        match self.rotation {
            Rotation::Clockwise90 => rotate_90ccw(canvas),
            Rotation::CounterClockwise90 => rotate_90cw(canvas),
            Rotation::Half => rotate_180(canvas),
        }
    }

    fn redo(&self, canvas: &mut PixelBuffer) {
        match self.rotation {
            Rotation::Clockwise90 => rotate_90cw(canvas),
            Rotation::CounterClockwise90 => rotate_90ccw(canvas),
            Rotation::Half => rotate_180(canvas),
        }
    }

    fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

/// Canvas resize. Cropping is lossy, so the whole buffer is kept for undo.
pub struct ResizeAction {
    before: PixelBuffer,
    new_width: u32,
    new_height: u32,
}

impl ResizeAction {
    /// Capture `canvas` BEFORE performing the resize.
    pub fn new(canvas: &PixelBuffer, new_width: u32, new_height: u32) -> Self {
        Self {
            before: canvas.clone(),
            new_width,
            new_height,
        }
    }
}

impl StructuralAction for ResizeAction {
    fn label(&self) -> String {
        format!(
            "Resize {}×{} → {}×{}",
            self.before.width(),
            self.before.height(),
            self.new_width,
            self.new_height
        )
    }

    fn undo(&self, canvas: &mut PixelBuffer) {
        *canvas = self.before.clone();
    }

    fn redo(&self, canvas: &mut PixelBuffer) {
        resize_canvas(canvas, self.new_width, self.new_height);
    }

    fn memory_size(&self) -> usize {
        self.before.memory_bytes()
    }
}

pub struct ClearAction {
    before: PixelBuffer,
}

impl ClearAction {
    /// Capture `canvas` BEFORE clearing it.
    pub fn new(canvas: &PixelBuffer) -> Self {
        Self { before: canvas.clone() }
    }
}

impl StructuralAction for ClearAction {
    fn label(&self) -> String {
        "Clear".to_string()
    }

    fn undo(&self, canvas: &mut PixelBuffer) {
        *canvas = self.before.clone();
    }

    fn redo(&self, canvas: &mut PixelBuffer) {
        clear(canvas);
    }

    fn memory_size(&self) -> usize {
        self.before.memory_bytes()
    }
}

/// Global recolor of one color to another. Only the affected indices are
/// stored since `from` alone restores them.
pub struct BleachAction {
    from: Color,
    to: Color,
    indices: Vec<usize>,
}

impl BleachAction {
    /// Capture the pixels of color `from` BEFORE recoloring.
    pub fn new(canvas: &PixelBuffer, from: Color, to: Color) -> Self {
        Self {
            from,
            to,
            indices: canvas.cluster_of(from),
        }
    }

    pub fn affected(&self) -> usize {
        self.indices.len()
    }
}

impl StructuralAction for BleachAction {
    fn label(&self) -> String {
        format!("Bleach ({} px)", self.indices.len())
    }

    fn undo(&self, canvas: &mut PixelBuffer) {
        for &i in &self.indices {
            canvas.set_pixel(i, self.from);
        }
    }

    fn redo(&self, canvas: &mut PixelBuffer) {
        for &i in &self.indices {
            canvas.set_pixel(i, self.to);
        }
    }

    fn memory_size(&self) -> usize {
        self.indices.len() * std::mem::size_of::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn c(v: u8) -> Color {
        Some(Rgba([v, v, v, 255]))
    }

    /// 3x2 buffer with distinct values 1..=6, row-major.
    fn sample() -> PixelBuffer {
        PixelBuffer::from_parts(3, 2, (1..=6).map(c).collect()).unwrap()
    }

    #[test]
    fn flips_mirror_rows_and_columns() {
        let mut buf = sample();
        flip_horizontal(&mut buf);
        assert_eq!(buf.pixels(), &[c(3), c(2), c(1), c(6), c(5), c(4)]);
        let mut buf = sample();
        flip_vertical(&mut buf);
        assert_eq!(buf.pixels(), &[c(4), c(5), c(6), c(1), c(2), c(3)]);
    }

    #[test]
    fn clockwise_rotation_swaps_dimensions() {
        let mut buf = sample();
        rotate_90cw(&mut buf);
        assert_eq!((buf.width(), buf.height()), (2, 3));
        // 1 2 3      4 1
        // 4 5 6  ->  5 2
        //            6 3
        assert_eq!(buf.pixels(), &[c(4), c(1), c(5), c(2), c(6), c(3)]);
    }

    #[test]
    fn counter_clockwise_undoes_clockwise() {
        let mut buf = sample();
        rotate_90cw(&mut buf);
        rotate_90ccw(&mut buf);
        assert_eq!(buf, sample());
        rotate_180(&mut buf);
        assert_eq!(buf.pixels(), &[c(6), c(5), c(4), c(3), c(2), c(1)]);
    }

    #[test]
    fn resize_crops_and_extends_from_top_left() {
        let mut buf = sample();
        resize_canvas(&mut buf, 2, 3);
        assert_eq!(buf.pixels(), &[c(1), c(2), c(4), c(5), None, None]);
    }

    #[test]
    fn resize_action_restores_cropped_pixels() {
        let mut buf = sample();
        let action = ResizeAction::new(&buf, 1, 1);
        action.redo(&mut buf);
        assert_eq!(buf.pixels(), &[c(1)]);
        action.undo(&mut buf);
        assert_eq!(buf, sample());
        assert_eq!(action.label(), "Resize 3×2 → 1×1");
    }

    #[test]
    fn rotate_and_flip_actions_invert() {
        for action in [
            Box::new(RotateAction { rotation: Rotation::Clockwise90 }) as Box<dyn StructuralAction>,
            Box::new(RotateAction { rotation: Rotation::CounterClockwise90 }),
            Box::new(RotateAction { rotation: Rotation::Half }),
            Box::new(FlipAction { axis: FlipAxis::Horizontal }),
            Box::new(FlipAction { axis: FlipAxis::Vertical }),
        ] {
            let mut buf = sample();
            action.redo(&mut buf);
            assert_ne!(buf, sample(), "{}", action.label());
            action.undo(&mut buf);
            assert_eq!(buf, sample(), "{}", action.label());
        }
    }

    #[test]
    fn clear_action_round_trips() {
        let mut buf = sample();
        let action = ClearAction::new(&buf);
        action.redo(&mut buf);
        assert!(buf.pixels().iter().all(Option::is_none));
        action.undo(&mut buf);
        assert_eq!(buf, sample());
    }

    #[test]
    fn bleach_recolors_only_matching_pixels() {
        let mut buf = PixelBuffer::from_parts(2, 2, vec![c(1), c(2), c(1), None]).unwrap();
        let action = BleachAction::new(&buf, c(1), c(9));
        assert_eq!(action.affected(), 2);
        action.redo(&mut buf);
        assert_eq!(buf.pixels(), &[c(9), c(2), c(9), None]);
        action.undo(&mut buf);
        assert_eq!(buf.pixels(), &[c(1), c(2), c(1), None]);

        assert_eq!(bleach(&mut buf, None, c(7)), vec![3]);
    }
}

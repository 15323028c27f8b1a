// ============================================================================
// DRAWING — brush stamps and strokes recorded into the edit history
// ============================================================================

use crate::canvas::{Color, PixelBuffer};
use crate::components::history::{HistoryManager, PixelChange};
use crate::ops::brush::{self, BrushShape, MAX_KERNEL_SIZE, MAX_SPAN_SIZE, Offset, Span};
use crate::ops::path::Point;

/// Tip and ink used for one stamp or stroke. `color: None` erases.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Brush {
    pub size: u32,
    pub shape: BrushShape,
    pub color: Color,
}

impl Brush {
    pub fn new(size: u32, shape: BrushShape, color: Color) -> Self {
        Self { size, shape, color }
    }

    pub fn eraser(size: u32, shape: BrushShape) -> Self {
        Self { size, shape, color: None }
    }

    pub fn is_eraser(&self) -> bool {
        self.color.is_none()
    }

    fn history_label(&self) -> &'static str {
        if self.is_eraser() { "Eraser" } else { "Brush" }
    }
}

/// Precomputed coverage for a brush: explicit offsets for small tips,
/// row spans for large ones.
enum Footprint {
    Kernel(Vec<Offset>),
    Spans(Vec<Span>),
}

impl Footprint {
    fn of(brush: &Brush) -> Self {
        if brush.size <= MAX_KERNEL_SIZE {
            Footprint::Kernel(brush::get_kernel(brush.size, brush.shape))
        } else {
            Footprint::Spans(brush::get_spans(brush.size, brush.shape))
        }
    }

    /// Write `color` under the footprint centred at `(cx, cy)`; returns the
    /// number of pixels that actually changed.
    fn apply(
        &self,
        canvas: &mut PixelBuffer,
        history: &mut HistoryManager,
        (cx, cy): (i32, i32),
        color: Color,
    ) -> usize {
        let mut changed = 0;
        match self {
            Footprint::Kernel(offsets) => {
                for o in offsets {
                    if let Some(index) = canvas.index_at(cx.saturating_add(o.x), cy.saturating_add(o.y))
                        && write_pixel(canvas, history, index, color)
                    {
                        changed += 1;
                    }
                }
            }
            Footprint::Spans(spans) => {
                let max_x = canvas.width() as i64 - 1;
                for span in spans {
                    let y = cy.saturating_add(span.y);
                    let x1 = (cx as i64 + span.x1 as i64).max(0);
                    let x2 = (cx as i64 + span.x2 as i64).min(max_x);
                    for x in x1..=x2 {
                        if let Some(index) = canvas.index_at(x as i32, y)
                            && write_pixel(canvas, history, index, color)
                        {
                            changed += 1;
                        }
                    }
                }
            }
        }
        changed
    }
}

/// Set one pixel and record the diff. Writes that would not change the
/// pixel are skipped and leave no history.
fn write_pixel(canvas: &mut PixelBuffer, history: &mut HistoryManager, index: usize, color: Color) -> bool {
    let old = canvas.pixel(index);
    if old == color {
        return false;
    }
    if canvas.set_pixel(index, color).is_none() {
        return false;
    }
    history.push(PixelChange::new(index, old, color).into());
    true
}

/// Integer points of the Bresenham line from `a` to `b`, both ends included.
pub fn line_points(a: (i32, i32), b: (i32, i32)) -> Vec<(i32, i32)> {
    let (mut x, mut y) = (a.0 as i64, a.1 as i64);
    let (x1, y1) = (b.0 as i64, b.1 as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut out = Vec::with_capacity((dx.max(-dy) + 1) as usize);
    loop {
        out.push((x as i32, y as i32));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    out
}

/// Cut the segment `a`..`b` to the canvas grown by the brush reach
/// (Liang-Barsky). `None` when nothing of it can touch the canvas.
/// Endpoints already inside are returned unchanged.
fn clip_segment(
    canvas: &PixelBuffer,
    brush: &Brush,
    a: (i32, i32),
    b: (i32, i32),
) -> Option<((i32, i32), (i32, i32))> {
    let reach = brush.size.clamp(1, MAX_SPAN_SIZE) as f64;
    let (min_x, min_y) = (-reach, -reach);
    let max_x = canvas.width() as f64 - 1.0 + reach;
    let max_y = canvas.height() as f64 - 1.0 + reach;

    let (ax, ay) = (a.0 as f64, a.1 as f64);
    let (dx, dy) = (b.0 as f64 - ax, b.1 as f64 - ay);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (p, q) in [(-dx, ax - min_x), (dx, max_x - ax), (-dy, ay - min_y), (dy, max_y - ay)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| ((ax + t * dx).round() as i32, (ay + t * dy).round() as i32);
    let start = if t0 > 0.0 { at(t0) } else { a };
    let end = if t1 < 1.0 { at(t1) } else { b };
    Some((start, end))
}

fn to_pixel(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

/// Stamp the brush once at `center` as a single undo step.
pub fn stamp(
    canvas: &mut PixelBuffer,
    history: &mut HistoryManager,
    center: (i32, i32),
    brush: &Brush,
) -> usize {
    history.begin_batch_labeled(brush.history_label());
    let changed = Footprint::of(brush).apply(canvas, history, center, brush.color);
    history.end_batch();
    changed
}

/// Stamp the brush along the straight line `from`..`to` as a single undo step.
pub fn draw_line(
    canvas: &mut PixelBuffer,
    history: &mut HistoryManager,
    from: (i32, i32),
    to: (i32, i32),
    brush: &Brush,
) -> usize {
    let Some((from, to)) = clip_segment(canvas, brush, from, to) else {
        return 0;
    };
    let footprint = Footprint::of(brush);
    history.begin_batch_labeled(brush.history_label());
    let changed = line_points(from, to)
        .into_iter()
        .map(|p| footprint.apply(canvas, history, p, brush.color))
        .sum();
    history.end_batch();
    changed
}

/// Rasterize a pointer trajectory: points are rounded to pixels, joined by
/// straight lines, and every touched pixel lands in one history batch.
pub fn draw_stroke(
    canvas: &mut PixelBuffer,
    history: &mut HistoryManager,
    points: &[Point],
    brush: &Brush,
) -> usize {
    let Some(&first) = points.first() else {
        return 0;
    };
    let footprint = Footprint::of(brush);

    history.begin_batch_labeled(brush.history_label());
    let mut changed = footprint.apply(canvas, history, to_pixel(first), brush.color);
    for pair in points.windows(2) {
        let (a, b) = (to_pixel(pair[0]), to_pixel(pair[1]));
        let Some((start, end)) = clip_segment(canvas, brush, a, b) else {
            continue;
        };
        // an unclipped start pixel was stamped by the previous segment
        let skip = usize::from(start == a);
        for p in line_points(start, end).into_iter().skip(skip) {
            changed += footprint.apply(canvas, history, p, brush.color);
        }
    }
    history.end_batch();
    changed
}

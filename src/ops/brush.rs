// ============================================================================
// BRUSH GEOMETRY — pixel coverage of square and circular brush tips
// ============================================================================
//
// Two output modes share one inclusion rule:
//   * kernels: explicit offsets, for the small interactive sizes 1..=5
//   * spans:   one horizontal run per row, for sizes up to 100
//
// Coordinates are measured in doubled units from the brush centre so that
// even sizes (whose centre sits on a pixel corner) stay in integer maths.
// A pixel at doubled offset (d2x, d2y) lies inside a circular tip when
//   d2x² + d2y² <= size² - size
// which is symmetric under every 90° rotation and reflection of the tip.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Largest size served by [`get_kernel`].
pub const MAX_KERNEL_SIZE: u32 = 5;
/// Largest size served by [`get_spans`].
pub const MAX_SPAN_SIZE: u32 = 100;

/// Brush tip outline. Size is always a diameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BrushShape {
    #[default]
    Square,
    Circle,
}

impl BrushShape {
    pub fn name(&self) -> &'static str {
        match self {
            BrushShape::Square => "square",
            BrushShape::Circle => "circle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "square" => Some(BrushShape::Square),
            "circle" | "round" => Some(BrushShape::Circle),
            _ => None,
        }
    }

    pub fn all() -> &'static [BrushShape] {
        &[BrushShape::Square, BrushShape::Circle]
    }
}

/// Integer offset from the brush centre pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Inclusive horizontal run `[x1, x2]` on row `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub y: i32,
    pub x1: i32,
    pub x2: i32,
}

impl Span {
    pub fn len(&self) -> u32 {
        (self.x2 - self.x1 + 1).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.x2 < self.x1
    }

    pub fn offsets(&self) -> impl Iterator<Item = Offset> + '_ {
        (self.x1..=self.x2).map(move |x| Offset::new(x, self.y))
    }
}

/// Inclusive offset range `lo..=hi` covered on each axis by a tip of `size`.
/// Even sizes extend one further toward negative offsets.
pub fn extent(size: u32) -> (i32, i32) {
    let size = size.max(1) as i32;
    let lo = -(size / 2);
    (lo, lo + size - 1)
}

/// Twice the tip centre coordinate (`lo + hi`).
fn doubled_centre(size: i32) -> i32 {
    2 * -(size / 2) + size - 1
}

fn circle_contains(size: i32, d2x: i32, d2y: i32) -> bool {
    d2x * d2x + d2y * d2y <= size * size - size
}

/// Largest doubled half-width covered on the row at doubled distance `d2y`.
/// The result keeps the parity of `size - 1` so it maps back onto pixel centres.
fn half_chord(size: i32, shape: BrushShape, d2y: i32) -> Option<i32> {
    match shape {
        BrushShape::Square => Some(size - 1),
        BrushShape::Circle => {
            let mut k = size - 1;
            while k >= 0 && !circle_contains(size, k, d2y) {
                k -= 2;
            }
            (k >= 0).then_some(k)
        }
    }
}

/// Offsets covered by a brush of `size` (clamped to `1..=5`), row-major.
pub fn get_kernel(size: u32, shape: BrushShape) -> Vec<Offset> {
    let size = size.clamp(1, MAX_KERNEL_SIZE);
    let (lo, hi) = extent(size);
    let s = size as i32;
    let c2 = doubled_centre(s);

    let mut out = Vec::with_capacity((size * size) as usize);
    for y in lo..=hi {
        for x in lo..=hi {
            let covered = match shape {
                BrushShape::Square => true,
                BrushShape::Circle => circle_contains(s, 2 * x - c2, 2 * y - c2),
            };
            if covered {
                out.push(Offset::new(x, y));
            }
        }
    }
    out
}

/// Row-compressed coverage of a brush of `size` (clamped to `1..=100`).
///
/// Rows are evaluated in parallel and collected in ascending `y`.
pub fn get_spans(size: u32, shape: BrushShape) -> Vec<Span> {
    let size = size.clamp(1, MAX_SPAN_SIZE);
    let (lo, hi) = extent(size);
    let s = size as i32;
    let c2 = doubled_centre(s);

    (lo..=hi)
        .into_par_iter()
        .filter_map(|y| {
            let k = half_chord(s, shape, 2 * y - c2)?;
            Some(Span {
                y,
                x1: (c2 - k) / 2,
                x2: (c2 + k) / 2,
            })
        })
        .collect()
}

/// Expand spans back into individual offsets, preserving row-major order.
pub fn expand_spans(spans: &[Span]) -> Vec<Offset> {
    spans.iter().flat_map(|s| s.offsets()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn as_set(offsets: &[Offset]) -> BTreeSet<(i32, i32)> {
        offsets.iter().map(|o| (o.x, o.y)).collect()
    }

    /// Rotate by 180° about the tip centre (doubled centre `c2` on both axes).
    fn rotate_180(offsets: &[Offset], size: u32) -> BTreeSet<(i32, i32)> {
        let c2 = doubled_centre(size as i32);
        offsets.iter().map(|o| (c2 - o.x, c2 - o.y)).collect()
    }

    #[test]
    fn size_one_is_a_single_pixel() {
        for &shape in BrushShape::all() {
            assert_eq!(get_kernel(1, shape), vec![Offset::new(0, 0)]);
            assert_eq!(get_spans(1, shape), vec![Span { y: 0, x1: 0, x2: 0 }]);
        }
    }

    #[test]
    fn even_square_is_biased_toward_negative_offsets() {
        let k = get_kernel(2, BrushShape::Square);
        assert_eq!(
            as_set(&k),
            [(-1, -1), (0, -1), (-1, 0), (0, 0)].into_iter().collect()
        );
        assert_eq!(extent(4), (-2, 1));
    }

    #[test]
    fn small_circles_have_expected_pixel_counts() {
        let counts: Vec<usize> = (1..=5).map(|s| get_kernel(s, BrushShape::Circle).len()).collect();
        // 1: dot, 2: 2x2, 3: plus, 4: 4x4 minus corners, 5: 5x5 minus corners
        assert_eq!(counts, vec![1, 4, 5, 12, 21]);
    }

    #[test]
    fn circle_three_is_a_plus() {
        let k = get_kernel(3, BrushShape::Circle);
        assert_eq!(
            as_set(&k),
            [(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1)].into_iter().collect()
        );
    }

    #[test]
    fn kernel_size_is_clamped() {
        assert_eq!(get_kernel(0, BrushShape::Square).len(), 1);
        assert_eq!(get_kernel(40, BrushShape::Square).len(), 25);
        assert_eq!(get_spans(0, BrushShape::Circle).len(), 1);
        assert_eq!(get_spans(500, BrushShape::Square).len(), 100);
    }

    #[test]
    fn large_square_spans_are_full_width() {
        let spans = get_spans(100, BrushShape::Square);
        assert_eq!(spans.len(), 100);
        assert!(spans.iter().all(|s| s.x1 == -50 && s.x2 == 49));
        assert_eq!(spans.first().map(|s| s.y), Some(-50));
        assert_eq!(spans.last().map(|s| s.y), Some(49));
    }

    #[test]
    fn large_circle_spans_widen_toward_the_middle() {
        let spans = get_spans(31, BrushShape::Circle);
        assert_eq!(spans.len(), 31);
        let mid = spans[15];
        assert_eq!((mid.x1, mid.x2), (-15, 15));
        for pair in spans[..16].windows(2) {
            assert!(pair[1].len() >= pair[0].len());
        }
    }

    #[test]
    fn circle_is_invariant_under_quarter_turn() {
        for size in 1..=40u32 {
            let set = as_set(&expand_spans(&get_spans(size, BrushShape::Circle)));
            let c2 = doubled_centre(size as i32);
            // (d2x, d2y) -> (-d2y, d2x), mapped back to pixel coordinates
            let turned: BTreeSet<(i32, i32)> = set
                .iter()
                .map(|&(x, y)| {
                    let (dx, dy) = (2 * x - c2, 2 * y - c2);
                    ((-dy + c2) / 2, (dx + c2) / 2)
                })
                .collect();
            assert_eq!(set, turned, "size {}", size);
        }
    }

    proptest! {
        #[test]
        fn kernel_and_spans_cover_the_same_pixels(size in 1u32..=5, circle in any::<bool>()) {
            let shape = if circle { BrushShape::Circle } else { BrushShape::Square };
            let kernel = as_set(&get_kernel(size, shape));
            let spans = as_set(&expand_spans(&get_spans(size, shape)));
            prop_assert_eq!(kernel, spans);
        }

        #[test]
        fn coverage_is_symmetric_under_half_turn(size in 1u32..=100, circle in any::<bool>()) {
            let shape = if circle { BrushShape::Circle } else { BrushShape::Square };
            let offsets = expand_spans(&get_spans(size, shape));
            prop_assert_eq!(as_set(&offsets), rotate_180(&offsets, size));
            if size <= MAX_KERNEL_SIZE {
                let kernel = get_kernel(size, shape);
                prop_assert_eq!(as_set(&kernel), rotate_180(&kernel, size));
            }
        }

        #[test]
        fn spans_stay_inside_the_extent(size in 1u32..=100, circle in any::<bool>()) {
            let shape = if circle { BrushShape::Circle } else { BrushShape::Square };
            let (lo, hi) = extent(size);
            for s in get_spans(size, shape) {
                prop_assert!(s.x1 >= lo && s.x2 <= hi && s.y >= lo && s.y <= hi);
                prop_assert!(!s.is_empty());
            }
        }
    }
}

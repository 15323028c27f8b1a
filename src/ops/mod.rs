// ============================================================================
// OPS — pixel and geometry operations behind the editing tools
// ============================================================================
//
//   brush.rs     — brush tip kernels and row spans
//   path.rs      — stroke simplification, smoothing, cluster tracing
//   draw.rs      — stamps and strokes recorded into the history
//   transform.rs — canvas-wide structural actions (resize, flip, rotate, ...)
// ============================================================================

pub mod brush;
pub mod draw;
pub mod path;
pub mod transform;

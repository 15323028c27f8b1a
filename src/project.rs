use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::canvas::{Color, PixelBuffer};
use crate::components::history::{HistoryEntry, HistoryManager, StructuralAction};
use crate::error::DocumentError;
use crate::io;
use crate::log_info;
use crate::ops::draw::{self, Brush};
use crate::ops::path::Point;
use crate::settings::EditorSettings;

/// Single open document: the pixel buffer plus its session-local history.
pub struct Project {
    pub id: Uuid,
    pub canvas: PixelBuffer,
    pub history: HistoryManager,
    /// `None` for unsaved/untitled documents.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32, settings: &EditorSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            canvas: PixelBuffer::new(width, height),
            history: settings.history_manager(),
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    pub fn from_file(path: PathBuf, canvas: PixelBuffer, settings: &EditorSettings) -> Self {
        let name = file_display_name(&path);

        Self {
            id: Uuid::new_v4(),
            canvas,
            history: settings.history_manager(),
            path: Some(path),
            is_dirty: false,
            name,
        }
    }

    /// Open an image or `.pxe` document with an empty history.
    pub fn open(path: &Path, settings: &EditorSettings) -> Result<Self, DocumentError> {
        let canvas = io::load_image(path)?;
        Ok(Self::from_file(path.to_path_buf(), canvas, settings))
    }

    /// Write the canvas to `path` (PNG for `.png`, otherwise a `.pxe`
    /// document) and adopt it as the project's file.
    pub fn save_as(&mut self, path: &Path) -> Result<(), DocumentError> {
        let is_png = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_png {
            io::save_png(&self.canvas, path)?;
        } else {
            io::save_document(&self.canvas, path)?;
        }
        self.name = file_display_name(path);
        self.path = Some(path.to_path_buf());
        self.mark_clean();
        Ok(())
    }

    /// Swap in a freshly loaded or created buffer. History does not survive.
    pub fn reset(&mut self, canvas: PixelBuffer) {
        self.canvas = canvas;
        self.history.clear();
        self.is_dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    // ------------------------------------------------------------------
    //  Edits
    // ------------------------------------------------------------------

    /// Paint a pointer trajectory as one undo step.
    pub fn stroke(&mut self, points: &[Point], brush: &Brush) -> usize {
        let changed = draw::draw_stroke(&mut self.canvas, &mut self.history, points, brush);
        if changed > 0 {
            self.mark_dirty();
        }
        changed
    }

    pub fn erase(&mut self, points: &[Point], size: u32, shape: crate::ops::brush::BrushShape) -> usize {
        self.stroke(points, &Brush::eraser(size, shape))
    }

    pub fn pixel(&self, x: i32, y: i32) -> Color {
        self.canvas
            .index_at(x, y)
            .map(|i| self.canvas.pixel(i))
            .unwrap_or(None)
    }

    /// Run a structural action and record it.
    pub fn perform(&mut self, action: Box<dyn StructuralAction>) {
        log_info!("{}: {}", self.name, action.label());
        action.redo(&mut self.canvas);
        self.history.push(HistoryEntry::Structural(action));
        self.mark_dirty();
    }

    /// Undo one step; returns its description.
    pub fn undo(&mut self) -> Option<String> {
        let entry = self.history.undo()?;
        entry.revert(&mut self.canvas);
        self.is_dirty = true;
        Some(entry.description())
    }

    /// Redo one step; returns its description.
    pub fn redo(&mut self) -> Option<String> {
        let entry = self.history.redo()?;
        entry.reapply(&mut self.canvas);
        self.is_dirty = true;
        Some(entry.description())
    }

    /// Undo `steps` entries (stops early when history runs out).
    pub fn undo_to(&mut self, steps: usize) -> usize {
        (0..steps).take_while(|_| self.undo().is_some()).count()
    }
}

fn file_display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::brush::BrushShape;
    use crate::ops::transform::{BleachAction, ResizeAction};
    use image::Rgba;

    const INK: Color = Some(Rgba([200, 30, 30, 255]));
    const PAPER: Color = Some(Rgba([250, 250, 240, 255]));

    fn project() -> Project {
        Project::new_untitled(1, 6, 4, &EditorSettings::default())
    }

    #[test]
    fn untitled_project_is_clean_and_named() {
        let p = project();
        assert_eq!(p.display_title(), "Untitled-1");
        assert_eq!((p.canvas.width(), p.canvas.height()), (6, 4));
        assert!(!p.history.can_undo());
    }

    #[test]
    fn stroke_undo_redo_round_trip() {
        let mut p = project();
        let pts = [Point::new(0.0, 1.0), Point::new(5.0, 1.0)];
        p.stroke(&pts, &Brush::new(1, BrushShape::Square, INK));
        assert_eq!(p.display_title(), "Untitled-1*");
        assert_eq!(p.pixel(3, 1), INK);

        assert_eq!(p.undo(), Some("Brush (6 px)".to_string()));
        assert_eq!(p.pixel(3, 1), None);
        assert_eq!(p.redo(), Some("Brush (6 px)".to_string()));
        assert_eq!(p.pixel(3, 1), INK);
    }

    #[test]
    fn structural_and_pixel_edits_interleave() {
        let mut p = project();
        p.stroke(&[Point::new(5.0, 3.0)], &Brush::new(1, BrushShape::Square, INK));
        p.perform(Box::new(ResizeAction::new(&p.canvas, 3, 3)));
        assert_eq!(p.canvas.width(), 3);
        p.perform(Box::new(BleachAction::new(&p.canvas, None, PAPER)));
        assert_eq!(p.pixel(0, 0), PAPER);

        assert_eq!(p.undo_to(10), 3);
        assert_eq!((p.canvas.width(), p.canvas.height()), (6, 4));
        assert!(p.canvas.pixels().iter().all(Option::is_none));
        assert_eq!(p.history.redo_count(), 3);
    }

    #[test]
    fn reset_forgets_history() {
        let mut p = project();
        p.erase(&[Point::new(0.0, 0.0)], 1, BrushShape::Square);
        p.stroke(&[Point::new(0.0, 0.0)], &Brush::new(3, BrushShape::Circle, INK));
        assert!(p.history.can_undo());
        p.reset(PixelBuffer::new(2, 2));
        assert!(!p.history.can_undo());
        assert!(!p.is_dirty);
    }

    #[test]
    fn save_as_then_open_round_trips_the_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sprite.pxe");
        let mut p = project();
        p.stroke(&[Point::new(1.0, 2.0), Point::new(4.0, 2.0)], &Brush::new(1, BrushShape::Square, INK));
        assert!(p.is_dirty);

        p.save_as(&path).unwrap();
        assert_eq!(p.display_title(), "sprite.pxe");
        assert_eq!(p.path.as_deref(), Some(path.as_path()));
        assert!(p.history.can_undo());

        let reopened = Project::open(&path, &EditorSettings::default()).unwrap();
        assert_eq!(reopened.canvas, p.canvas);
        assert_eq!(reopened.name, "sprite.pxe");
        assert!(!reopened.is_dirty);
        assert!(!reopened.history.can_undo());
        assert_ne!(reopened.id, p.id);
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Project::open(&dir.path().join("nope.png"), &EditorSettings::default()).is_err());
    }
}

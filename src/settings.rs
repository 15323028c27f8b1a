use std::path::{Path, PathBuf};

use crate::components::history::HistoryManager;
use crate::ops::brush::BrushShape;
use crate::{log_info, log_warn};

/// Largest accepted history memory cap (1 TiB).
const MAX_HISTORY_MEMORY_MB: usize = 1024 * 1024;

/// Editor settings that persist across sessions.
///
/// Stored as a plain `key=value` file. Unknown keys and malformed values are
/// ignored so an old or hand-edited file never prevents start-up.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Maximum number of undo steps
    pub max_undo_steps: usize,
    /// History memory cap in MiB (0 = unbounded)
    pub max_history_memory_mb: usize,
    pub brush_size: u32,
    pub brush_shape: BrushShape,
    /// Ramer-Douglas-Peucker tolerance applied to raw strokes, in pixels
    pub simplify_epsilon: f64,
    /// Moving-average window radius applied after simplification (0 = off)
    pub smooth_strength: usize,
    /// GIF palette size (2-256)
    pub gif_colors: u16,
    pub gif_fps: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: 50,
            max_history_memory_mb: 100,
            brush_size: 1,
            brush_shape: BrushShape::Square,
            simplify_epsilon: 1.0,
            smooth_strength: 0,
            gif_colors: 256,
            gif_fps: 10.0,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pixeledit/pixeledit_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PixelEdit\pixeledit_settings.cfg
    /// On macOS:   ~/Library/Application Support/PixelEdit/pixeledit_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("PixelEdit").join("pixeledit_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PixelEdit")
                    .join("pixeledit_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("pixeledit").join("pixeledit_settings.cfg"))
        }
    }

    /// Load from the default location (defaults if missing or unreadable).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                log_info!("Settings loaded from {}", path.display());
                Self::parse(&content)
            }
            Err(_) => Self::default(),
        }
    }

    /// Save to the default location.
    pub fn save(&self) -> std::io::Result<()> {
        match Self::settings_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_undo_steps={}\n\
             max_history_memory_mb={}\n\
             brush_size={}\n\
             brush_shape={}\n\
             simplify_epsilon={}\n\
             smooth_strength={}\n\
             gif_colors={}\n\
             gif_fps={}\n",
            self.max_undo_steps,
            self.max_history_memory_mb,
            self.brush_size,
            self.brush_shape.name(),
            self.simplify_epsilon,
            self.smooth_strength,
            self.gif_colors,
            self.gif_fps,
        )
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(s.max_undo_steps);
                }
                "max_history_memory_mb" => {
                    s.max_history_memory_mb = val
                        .parse::<usize>()
                        .map(|mb| mb.min(MAX_HISTORY_MEMORY_MB))
                        .unwrap_or(s.max_history_memory_mb);
                }
                "brush_size" => {
                    s.brush_size = val.parse().unwrap_or(s.brush_size);
                }
                "brush_shape" => {
                    s.brush_shape = BrushShape::from_name(val).unwrap_or(s.brush_shape);
                }
                "simplify_epsilon" => {
                    s.simplify_epsilon = val
                        .parse::<f64>()
                        .ok()
                        .filter(|e| e.is_finite() && *e >= 0.0)
                        .unwrap_or(s.simplify_epsilon);
                }
                "smooth_strength" => {
                    s.smooth_strength = val.parse().unwrap_or(s.smooth_strength);
                }
                "gif_colors" => {
                    s.gif_colors = val.parse::<u16>().map(|c| c.clamp(2, 256)).unwrap_or(s.gif_colors);
                }
                "gif_fps" => {
                    s.gif_fps = val
                        .parse::<f32>()
                        .ok()
                        .filter(|f| f.is_finite() && *f > 0.0)
                        .unwrap_or(s.gif_fps);
                }
                _ => {
                    log_warn!("Settings: ignoring unknown key '{}'", key);
                }
            }
        }
        s
    }

    /// A history manager configured with these limits.
    pub fn history_manager(&self) -> HistoryManager {
        // 0 and caps too large to express in bytes both mean unbounded.
        let cap = match self.max_history_memory_mb {
            0 => None,
            mb => mb.checked_mul(1024 * 1024),
        };
        HistoryManager::new(self.max_undo_steps).with_memory_limit(cap)
    }
}

// ============================================================================
// PixelEdit CLI — headless access to the editing core
// ============================================================================
//
// Usage examples:
//   pixeledit trace -i sprite.png -o sprite.svg
//   pixeledit trace -i sprite.png -o outline.svg --color 1a1c2cff
//   pixeledit brush --size 7 --shape circle --spans
//   pixeledit simplify -i stroke.txt --epsilon 0.5 --smooth 2
//   pixeledit gif -i "frames/*.png" -o walk.gif --fps 12 --colors 32
//
// Defaults for brush, simplification and animation flags come from the
// saved editor settings.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::canvas::PixelBuffer;
use crate::io::{encode_apng, encode_gif, load_image, svg_document_filtered};
use crate::ops::brush::{self, BrushShape, MAX_KERNEL_SIZE, MAX_SPAN_SIZE, Offset};
use crate::ops::path::{self, Point};
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelEdit headless tools.
#[derive(Parser, Debug)]
#[command(
    name = "pixeledit",
    about = "PixelEdit headless pixel-art tools",
    long_about = "Trace pixel art to SVG, preview brush tips, simplify pointer paths\n\
                  and assemble animations without opening an editor.\n\n\
                  Example:\n  \
                  pixeledit trace -i sprite.png -o sprite.svg\n  \
                  pixeledit gif -i \"frames/*.png\" -o walk.gif --fps 12"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Print per-step timing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Vectorize every color region of an image into an SVG document.
    Trace {
        /// Input image (PNG, GIF or .pxe document).
        #[arg(short, long, value_name = "IMAGE")]
        input: PathBuf,

        /// Output SVG path. Written to stdout when omitted.
        #[arg(short, long, value_name = "FILE.svg")]
        output: Option<PathBuf>,

        /// Only trace pixels of this color (RRGGBB or RRGGBBAA, `#` optional).
        #[arg(long, value_name = "RRGGBB[AA]")]
        color: Option<String>,
    },

    /// Print an ASCII preview of a brush tip.
    Brush {
        /// Tip diameter in pixels (1-100).
        #[arg(short, long)]
        size: Option<u32>,

        /// Tip outline: square or circle.
        #[arg(long)]
        shape: Option<String>,

        /// Also list the row spans of the tip.
        #[arg(long)]
        spans: bool,
    },

    /// Simplify and smooth a pointer path given as one `x,y` pair per line.
    Simplify {
        #[arg(short, long, value_name = "POINTS.txt")]
        input: PathBuf,

        /// Maximum deviation in pixels.
        #[arg(short, long)]
        epsilon: Option<f64>,

        /// Moving-average window radius (0 = off).
        #[arg(long)]
        smooth: Option<usize>,
    },

    /// Assemble frames into an animated GIF (or APNG for a .png output).
    Gif {
        /// Frame file(s). Glob patterns accepted (e.g. "frames/*.png").
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<String>,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[arg(long)]
        fps: Option<f32>,

        /// Palette size per frame (2-256). Ignored for APNG.
        #[arg(long)]
        colors: Option<u16>,
    },
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one subcommand and return an OS exit code.
/// `0` = success, `1` = failure.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = EditorSettings::load();
    run_with(args, &settings)
}

/// [`run`] with explicit settings instead of the saved ones.
pub fn run_with(args: CliArgs, settings: &EditorSettings) -> ExitCode {
    let start = Instant::now();
    let result = match args.command {
        CliCommand::Trace { input, output, color } => run_trace(&input, output.as_deref(), color.as_deref()),
        CliCommand::Brush { size, shape, spans } => run_brush(size, shape.as_deref(), spans, settings),
        CliCommand::Simplify { input, epsilon, smooth } => run_simplify(&input, epsilon, smooth, settings),
        CliCommand::Gif { input, output, fps, colors } => run_gif(&input, &output, fps, colors, settings),
    };

    match result {
        Ok(()) => {
            if args.verbose {
                eprintln!("done ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("CLI: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_trace(input: &Path, output: Option<&Path>, color: Option<&str>) -> Result<(), String> {
    let only = match color {
        Some(c) => Some(parse_color(c).ok_or_else(|| format!("invalid color '{}'", c))?),
        None => None,
    };
    let buffer = load_image(input).map_err(|e| format!("load failed: {}", e))?;
    let svg = svg_document_filtered(&buffer, only).map_err(|e| format!("trace failed: {}", e))?;

    match output {
        Some(path) => {
            std::fs::write(path, svg).map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
            log_info!("CLI: traced {} -> {}", input.display(), path.display());
        }
        None => print!("{}", svg),
    }
    Ok(())
}

fn run_brush(size: Option<u32>, shape: Option<&str>, spans: bool, settings: &EditorSettings) -> Result<(), String> {
    let size = size.unwrap_or(settings.brush_size);
    let shape = match shape {
        Some(s) => BrushShape::from_name(s).ok_or_else(|| format!("unknown brush shape '{}'", s))?,
        None => settings.brush_shape,
    };
    print!("{}", brush_preview(size, shape, spans));
    Ok(())
}

fn run_simplify(
    input: &Path,
    epsilon: Option<f64>,
    smooth: Option<usize>,
    settings: &EditorSettings,
) -> Result<(), String> {
    let text = std::fs::read_to_string(input)
        .map_err(|e| format!("could not read '{}': {}", input.display(), e))?;
    let points = parse_points(&text)?;

    let epsilon = epsilon.unwrap_or(settings.simplify_epsilon);
    let strength = smooth.unwrap_or(settings.smooth_strength);
    let result = path::smooth(&path::simplify(&points, epsilon), strength);

    log_info!("CLI: simplified {} points to {}", points.len(), result.len());
    for p in result {
        println!("{},{}", p.x, p.y);
    }
    Ok(())
}

fn run_gif(
    patterns: &[String],
    output: &Path,
    fps: Option<f32>,
    colors: Option<u16>,
    settings: &EditorSettings,
) -> Result<(), String> {
    let inputs = resolve_inputs(patterns);
    if inputs.is_empty() {
        return Err("no input files matched the given pattern(s)".to_string());
    }

    let frames = inputs
        .iter()
        .map(|p| load_image(p).map_err(|e| format!("load failed for '{}': {}", p.display(), e)))
        .collect::<Result<Vec<PixelBuffer>, String>>()?;

    let fps = fps.unwrap_or(settings.gif_fps);
    if !(fps.is_finite() && fps > 0.0) {
        return Err(format!("invalid frame rate {}", fps));
    }

    let is_apng = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png") || e.eq_ignore_ascii_case("apng"));
    let bytes = if is_apng {
        encode_apng(&frames, fps)
    } else {
        encode_gif(&frames, fps, colors.unwrap_or(settings.gif_colors))
    }
    .map_err(|e| format!("encode failed: {}", e))?;

    std::fs::write(output, bytes).map_err(|e| format!("could not write '{}': {}", output.display(), e))?;
    log_info!("CLI: wrote {} frames to {}", frames.len(), output.display());
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            // Literal path — use directly
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Parse `RRGGBB` or `RRGGBBAA` (leading `#` optional).
fn parse_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
    Some([byte(0)?, byte(2)?, byte(4)?, alpha])
}

/// One `x,y` pair per line; blank lines and `#` comments are skipped.
fn parse_points(text: &str) -> Result<Vec<Point>, String> {
    let mut points = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = line
            .split_once(',')
            .and_then(|(x, y)| Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?)))
            .filter(|p| p.x.is_finite() && p.y.is_finite());
        match parsed {
            Some(p) => points.push(p),
            None => return Err(format!("line {}: expected 'x,y', got '{}'", n + 1, line)),
        }
    }
    Ok(points)
}

/// ASCII rendering of a brush tip: `#` covered, `.` not. The origin pixel is
/// the one at offset (0, 0).
fn brush_preview(size: u32, shape: BrushShape, with_spans: bool) -> String {
    let size = size.clamp(1, MAX_SPAN_SIZE);
    let spans = brush::get_spans(size, shape);
    let covered: HashSet<Offset> = if size <= MAX_KERNEL_SIZE {
        brush::get_kernel(size, shape).into_iter().collect()
    } else {
        brush::expand_spans(&spans).into_iter().collect()
    };

    let (lo, hi) = brush::extent(size);
    let mut out = String::new();
    for y in lo..=hi {
        for x in lo..=hi {
            out.push(if covered.contains(&Offset::new(x, y)) { '#' } else { '.' });
        }
        out.push('\n');
    }

    if with_spans {
        for s in &spans {
            let _ = writeln!(out, "y={:>4}: {}..={}", s.y, s.x1, s.x2);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_color_accepts_both_lengths() {
        assert_eq!(parse_color("#1a1c2c"), Some([0x1a, 0x1c, 0x2c, 255]));
        assert_eq!(parse_color("ff000080"), Some([255, 0, 0, 128]));
        assert_eq!(parse_color("fff"), None);
        assert_eq!(parse_color("gg0000"), None);
    }

    #[test]
    fn parse_points_reports_the_bad_line() {
        let pts = parse_points("# stroke\n0,0\n\n 2.5 , -1 \n").unwrap();
        assert_eq!(pts, vec![Point::new(0.0, 0.0), Point::new(2.5, -1.0)]);
        let err = parse_points("0,0\n1;1\n").unwrap_err();
        assert!(err.starts_with("line 2"));
    }

    #[test]
    fn preview_of_small_circle_is_a_plus() {
        assert_eq!(brush_preview(3, BrushShape::Circle, false), ".#.\n###\n.#.\n");
        let with_spans = brush_preview(2, BrushShape::Square, true);
        assert!(with_spans.starts_with("##\n##\n"));
        assert!(with_spans.contains("y=  -1: -1..=0"));
    }

    #[test]
    fn resolve_inputs_expands_globs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
        let literal = dir.path().join("a.png").to_string_lossy().into_owned();
        let found = resolve_inputs(&[literal, pattern]);
        assert_eq!(found, vec![dir.path().join("a.png"), dir.path().join("b.png")]);
    }

    #[test]
    fn trace_command_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("dot.png");
        let svg = dir.path().join("dot.svg");
        let mut buffer = PixelBuffer::new(2, 2);
        buffer.set_pixel(3, Some(image::Rgba([10, 20, 30, 255])));
        crate::io::save_png(&buffer, &png).unwrap();

        let args = CliArgs::try_parse_from([
            "pixeledit",
            "trace",
            "-i",
            png.to_str().unwrap(),
            "-o",
            svg.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(run_with(args, &EditorSettings::default()), ExitCode::SUCCESS);
        let text = std::fs::read_to_string(&svg).unwrap();
        assert!(text.contains(r##"fill="#0a141e" fill-rule="evenodd" d="M1 1H2V2H1Z""##));
    }

    #[test]
    fn gif_command_fails_without_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
        let out = dir.path().join("out.gif");
        let args = CliArgs::try_parse_from(["pixeledit", "gif", "-i", &pattern, "-o", out.to_str().unwrap()]).unwrap();
        assert_eq!(run_with(args, &EditorSettings::default()), ExitCode::FAILURE);
        assert!(!out.exists());
    }

    #[test]
    fn gif_command_writes_animation() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["f0.png", "f1.png"].iter().enumerate() {
            let buffer = PixelBuffer::new_filled(2, 2, Some(image::Rgba([i as u8 * 100, 0, 0, 255])));
            crate::io::save_png(&buffer, &dir.path().join(name)).unwrap();
        }
        let pattern = dir.path().join("f*.png").to_string_lossy().into_owned();
        let out = dir.path().join("anim.gif");
        let args = CliArgs::try_parse_from(["pixeledit", "gif", "-i", &pattern, "-o", out.to_str().unwrap()]).unwrap();
        assert_eq!(run_with(args, &EditorSettings::default()), ExitCode::SUCCESS);
        assert_eq!(&std::fs::read(&out).unwrap()[..6], b"GIF89a");
    }
}

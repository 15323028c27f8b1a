use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use image::{ImageFormat, Rgba};
use serde::{Deserialize, Serialize};

use crate::canvas::PixelBuffer;
use crate::error::DocumentError;
use crate::ops::path::trace_cluster_bounded;
use crate::{log_info, log_warn};

/// Maximum supported canvas dimension in pixels (per axis).
/// Prevents memory exhaustion from crafted document files.
const MAX_CANVAS_DIM: u32 = 32_768;

// ============================================================================
// RASTER LOAD / SAVE
// ============================================================================

/// Load an image (or a `.pxe` document) into a pixel buffer.
/// Fully transparent pixels become absent pixels.
pub fn load_image(path: &Path) -> Result<PixelBuffer, DocumentError> {
    let is_document = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pxe"));
    if is_document {
        return load_document(path);
    }

    let img = image::open(path)?.into_rgba8();
    if img.width() > MAX_CANVAS_DIM || img.height() > MAX_CANVAS_DIM {
        return Err(DocumentError::InvalidFormat(format!(
            "{}x{} exceeds the {} pixel limit",
            img.width(),
            img.height(),
            MAX_CANVAS_DIM
        )));
    }
    log_info!("Loaded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(PixelBuffer::from_rgba_image(&img))
}

pub fn save_png(buffer: &PixelBuffer, path: &Path) -> Result<(), DocumentError> {
    buffer.to_rgba_image().save_with_format(path, ImageFormat::Png)?;
    log_info!("Saved PNG {}", path.display());
    Ok(())
}

// ============================================================================
// SVG EXPORT
// ============================================================================

/// Pixel indices grouped by color, in ascending index order.
/// Absent pixels are background and belong to no cluster.
pub fn clusters(buffer: &PixelBuffer) -> BTreeMap<[u8; 4], Vec<usize>> {
    let mut map: BTreeMap<[u8; 4], Vec<usize>> = BTreeMap::new();
    for (i, px) in buffer.pixels().iter().enumerate() {
        if let Some(Rgba(rgba)) = px {
            map.entry(*rgba).or_default().push(i);
        }
    }
    map
}

/// Vectorize every color cluster into one SVG document.
pub fn svg_document(buffer: &PixelBuffer) -> Result<String, DocumentError> {
    svg_document_filtered(buffer, None)
}

/// Like [`svg_document`], restricted to a single color when `only` is set.
pub fn svg_document_filtered(buffer: &PixelBuffer, only: Option<[u8; 4]>) -> Result<String, DocumentError> {
    let (w, h) = (buffer.width(), buffer.height());
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" shape-rendering="crispEdges">"#
    );
    for (rgba, indices) in clusters(buffer) {
        if only.is_some_and(|c| c != rgba) {
            continue;
        }
        let d = trace_cluster_bounded(&indices, w, h)?;
        let [r, g, b, a] = rgba;
        let _ = write!(out, r##"<path fill="#{r:02x}{g:02x}{b:02x}""##);
        if a < 255 {
            let _ = write!(out, r#" fill-opacity="{:.3}""#, a as f32 / 255.0);
        }
        let _ = writeln!(out, r#" fill-rule="evenodd" d="{d}"/>"#);
    }
    out.push_str("</svg>\n");
    Ok(out)
}

// ============================================================================
// ANIMATION ENCODING
// ============================================================================

/// Check that all frames share one non-empty size that GIF/APNG can hold.
fn frame_size(frames: &[PixelBuffer]) -> Result<(u32, u32), DocumentError> {
    let Some(first) = frames.first() else {
        return Err(DocumentError::InvalidFormat("No frames to encode".into()));
    };
    let (w, h) = (first.width(), first.height());
    if w == 0 || h == 0 {
        return Err(DocumentError::InvalidFormat("Frames have no pixels".into()));
    }
    if w > u16::MAX as u32 || h > u16::MAX as u32 {
        return Err(DocumentError::InvalidFormat(
            "Image dimensions exceed GIF maximum (65535×65535)".into(),
        ));
    }
    if let Some(bad) = frames.iter().position(|f| (f.width(), f.height()) != (w, h)) {
        return Err(DocumentError::InvalidFormat(format!(
            "Frame {} is {}x{}, expected {}x{}",
            bad,
            frames[bad].width(),
            frames[bad].height(),
            w,
            h
        )));
    }
    Ok((w, h))
}

/// Encode frames as an infinitely looping animated GIF.
/// `fps`: playback speed. `max_colors`: palette size per frame (2-256).
/// Absent pixels map to a reserved transparent palette entry.
pub fn encode_gif(frames: &[PixelBuffer], fps: f32, max_colors: u16) -> Result<Vec<u8>, DocumentError> {
    let (w, h) = frame_size(frames)?;
    let delay_cs = ((100.0 / fps).round() as u16).max(1); // centiseconds
    let colors = (max_colors as usize).clamp(2, 256);

    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, w as u16, h as u16, &[])?;
        encoder.set_repeat(gif::Repeat::Infinite)?;

        for buffer in frames {
            let quantized = quantize_frame(buffer, colors);
            let frame = gif::Frame {
                width: w as u16,
                height: h as u16,
                delay: delay_cs,
                dispose: gif::DisposalMethod::Background,
                transparent: quantized.transparent,
                palette: Some(quantized.palette),
                buffer: std::borrow::Cow::Owned(quantized.indices),
                ..Default::default()
            };
            encoder.write_frame(&frame)?;
        }
    }
    log_info!("Encoded GIF: {} frames, {}x{}, {} bytes", frames.len(), w, h, out.len());
    Ok(out)
}

/// Encode frames as an infinitely looping animated PNG (APNG).
pub fn encode_apng(frames: &[PixelBuffer], fps: f32) -> Result<Vec<u8>, DocumentError> {
    let (w, h) = frame_size(frames)?;
    let delay_ms = (1000.0 / fps).round().clamp(1.0, 65535.0) as u16;

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, w, h);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_animated(frames.len() as u32, 0)?; // 0 = infinite loop

        let mut writer = encoder.write_header()?;
        for buffer in frames {
            writer.set_frame_delay(delay_ms, 1000)?;
            writer.set_dispose_op(png::DisposeOp::Background)?;
            writer.write_image_data(buffer.to_rgba_image().as_raw())?;
        }
        writer.finish()?;
    }
    log_info!("Encoded APNG: {} frames, {}x{}, {} bytes", frames.len(), w, h, out.len());
    Ok(out)
}

struct QuantizedFrame {
    /// Flat `[R,G,B, R,G,B, ...]` as required by the gif crate.
    palette: Vec<u8>,
    indices: Vec<u8>,
    transparent: Option<u8>,
}

/// Quantize one frame with NeuQuant. When the frame has absent pixels, one
/// palette slot past the quantized colors is reserved for them.
fn quantize_frame(buffer: &PixelBuffer, max_colors: usize) -> QuantizedFrame {
    let opaque: Vec<u8> = buffer
        .pixels()
        .iter()
        .flatten()
        .flat_map(|p| [p[0], p[1], p[2], 255])
        .collect();
    let has_transparent = opaque.len() / 4 < buffer.len();

    if opaque.is_empty() {
        return QuantizedFrame {
            palette: vec![0, 0, 0, 0, 0, 0],
            indices: vec![0; buffer.len()],
            transparent: Some(0),
        };
    }

    let colors = if has_transparent { (max_colors - 1).max(2) } else { max_colors };

    // Pixel art usually fits the palette as-is; keep its colors exact.
    let mut distinct: Vec<[u8; 3]> = opaque.chunks_exact(4).map(|c| [c[0], c[1], c[2]]).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() <= colors {
        let slots = distinct.len().max(2);
        let mut palette: Vec<u8> = distinct.iter().flatten().copied().collect();
        palette.resize(slots * 3, 0);
        let transparent = has_transparent.then(|| {
            palette.extend_from_slice(&[0, 0, 0]);
            slots as u8
        });
        let indices = buffer
            .pixels()
            .iter()
            .map(|px| match px {
                Some(p) => distinct.binary_search(&[p[0], p[1], p[2]]).unwrap_or(0) as u8,
                None => transparent.unwrap_or(0),
            })
            .collect();
        return QuantizedFrame { palette, indices, transparent };
    }

    let nq = color_quant::NeuQuant::new(10, colors, &opaque);

    let mut palette = Vec::with_capacity((colors + 1) * 3);
    for i in 0..colors {
        match nq.lookup(i) {
            Some(c) => palette.extend_from_slice(&c[..3]),
            None => palette.extend_from_slice(&[0, 0, 0]),
        }
    }
    let transparent = has_transparent.then(|| {
        palette.extend_from_slice(&[0, 0, 0]);
        colors as u8
    });

    let indices = buffer
        .pixels()
        .iter()
        .map(|px| match px {
            Some(p) => nq.index_of(&[p[0], p[1], p[2], 255]) as u8,
            None => transparent.unwrap_or(0),
        })
        .collect();

    QuantizedFrame { palette, indices, transparent }
}

// ============================================================================
// PXE DOCUMENT FORMAT
// ============================================================================

const PXE_MAGIC: &str = "PXE1";

/// Serializable document. Edit history is session-local and never stored.
#[derive(Serialize, Deserialize)]
struct DocumentFile {
    magic: String,
    width: u32,
    height: u32,
    pixels: Vec<Option<[u8; 4]>>,
}

/// Save a pixel buffer as a `.pxe` document.
pub fn save_document(buffer: &PixelBuffer, path: &Path) -> Result<(), DocumentError> {
    let doc = DocumentFile {
        magic: PXE_MAGIC.to_string(),
        width: buffer.width(),
        height: buffer.height(),
        pixels: buffer.pixels().iter().map(|px| px.map(|p| p.0)).collect(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &doc)?;
    log_info!("Saved document {}", path.display());
    Ok(())
}

/// Load a `.pxe` document.
pub fn load_document(path: &Path) -> Result<PixelBuffer, DocumentError> {
    let mut raw = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut raw)?;
    if raw.len() < 12 {
        return Err(DocumentError::InvalidFormat("File too small".into()));
    }

    // bincode encodes a String as: 8-byte length prefix + UTF-8 data.
    // The magic is 4 chars, so bytes 8..12 hold it.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != PXE_MAGIC {
        return Err(DocumentError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }

    let doc: DocumentFile = bincode::deserialize(&raw)?;
    if doc.width > MAX_CANVAS_DIM || doc.height > MAX_CANVAS_DIM {
        return Err(DocumentError::InvalidFormat(format!(
            "Canvas {}x{} exceeds the {} pixel limit",
            doc.width, doc.height, MAX_CANVAS_DIM
        )));
    }
    let pixels = doc.pixels.into_iter().map(|px| px.map(Rgba)).collect();
    PixelBuffer::from_parts(doc.width, doc.height, pixels).ok_or_else(|| {
        log_warn!("Rejected document {}: pixel count mismatch", path.display());
        DocumentError::InvalidFormat("Pixel count does not match dimensions".into())
    })
}

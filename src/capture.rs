use std::io::Cursor;
use std::process::Command;

use anyhow::{bail, Context, Result};
use image::ImageFormat;
use tracing::{debug, warn};

use crate::browser::Session;
use crate::config::{Config, CropPolicy};

/// The document preview region captured by the `Region` policy.
pub const DOCUMENT_REGION: &str = "#documentWrap";

/// Words below this OCR confidence do not count as text.
const MIN_CONFIDENCE: f32 = 60.0;
/// Pixels kept below the lowest detected text line.
const CROP_BUFFER_PX: u32 = 40;

/// A detected text fragment with its vertical extent, as reported by the OCR
/// engine.
#[derive(Debug, Clone, Copy)]
pub struct TextLine {
    pub top: u32,
    pub height: u32,
    pub confidence: f32,
}

/// OCR capability consumed opaquely: PNG bytes in, detected lines out.
pub trait TextDetector {
    fn detect(&self, png: &[u8]) -> Result<Vec<TextLine>>;
}

/// Capture a screenshot of the current page per the configured crop policy.
/// The viewport is first stretched to the full scrollable height so nothing
/// is clipped.
pub async fn capture(session: &Session, cfg: &Config) -> Result<Vec<u8>> {
    let height = session.content_height().await?;
    session.set_viewport(cfg.viewport.0, height).await?;

    match cfg.crop {
        CropPolicy::Region => session.screenshot_element(DOCUMENT_REGION).await,
        CropPolicy::Full => session.screenshot_full_page().await,
        CropPolicy::TextBottom => {
            let raw = session.screenshot_full_page().await?;
            // OCR failure keeps the raw capture; the crop is an optimization.
            match crop_to_text_bottom(&raw, &TesseractCli, CROP_BUFFER_PX) {
                Ok(cropped) => Ok(cropped),
                Err(e) => {
                    warn!("OCR crop failed, keeping raw screenshot: {e:#}");
                    Ok(raw)
                }
            }
        }
    }
}

/// Crop the image below the lowest confident text line plus a pixel buffer.
/// When no line clears the confidence threshold the raw image is returned
/// unchanged.
pub fn crop_to_text_bottom(
    png: &[u8],
    detector: &dyn TextDetector,
    buffer_px: u32,
) -> Result<Vec<u8>> {
    let lines = detector.detect(png)?;
    let Some(bottom) = text_bottom(&lines, MIN_CONFIDENCE) else {
        debug!("No confident text detected, keeping raw screenshot");
        return Ok(png.to_vec());
    };
    crop_below(png, bottom.saturating_add(buffer_px))
}

fn text_bottom(lines: &[TextLine], min_confidence: f32) -> Option<u32> {
    lines
        .iter()
        .filter(|l| l.confidence >= min_confidence)
        .map(|l| l.top + l.height)
        .max()
}

fn crop_below(png: &[u8], bottom: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(png).context("failed to decode screenshot")?;
    let height = bottom.min(img.height());
    let cropped = img.crop_imm(0, 0, img.width(), height);
    let mut out = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .context("failed to encode cropped screenshot")?;
    Ok(out)
}

/// Default detector: shells out to the `tesseract` binary in TSV mode.
pub struct TesseractCli;

impl TextDetector for TesseractCli {
    fn detect(&self, png: &[u8]) -> Result<Vec<TextLine>> {
        let input = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .context("failed to create temp file for OCR")?;
        std::fs::write(input.path(), png)?;

        let output = Command::new("tesseract")
            .arg(input.path())
            .arg("stdout")
            .arg("tsv")
            .output()
            .context("failed to run tesseract")?;
        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse tesseract TSV output into word-level text lines. Non-word rows
/// carry a confidence of -1 and are dropped.
fn parse_tsv(tsv: &str) -> Vec<TextLine> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 || cols[11].trim().is_empty() {
                return None;
            }
            let top = cols[7].parse::<u32>().ok()?;
            let height = cols[9].parse::<u32>().ok()?;
            let confidence = cols[10].parse::<f32>().ok()?;
            if confidence < 0.0 {
                return None;
            }
            Some(TextLine { top, height, confidence })
        })
        .collect()
}

// ── Tests ──

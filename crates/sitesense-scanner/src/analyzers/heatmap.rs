//! Attention and click-likelihood heatmaps.
//!
//! Both overlays are computed from the screenshot already in the artifact.
//! The image work is CPU-bound and runs on the blocking pool. Any failure
//! yields an empty result instead of an error so the scan is unaffected.

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerOutput, DerivedArtifact};
use crate::error::AnalyzerError;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, GrayImage, Luma, RgbImage};
use serde::Serialize;
use serde_json::{json, Value};
use sitesense_core::{ClickableElement, FileType, ModuleName, Rect};
use std::io::Cursor;

/// Payload key for the attention overlay URL.
pub const ATTENTION_URL_KEY: &str = "attention_heatmap_url";
/// Payload key for the click overlay URL.
pub const CLICK_URL_KEY: &str = "click_heatmap_url";

const EDGE_THRESHOLD: f32 = 100.0;
const ATTENTION_SIGMA: f32 = 8.0;
const CLICK_SIGMA: f32 = 15.5;
const ORIGINAL_WEIGHT: f32 = 0.6;
const OVERLAY_WEIGHT: f32 = 0.4;
const JPEG_QUALITY: u8 = 90;
const MAX_TEXT_CHARS: usize = 50;

/// Click-likelihood score of one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementScore {
    /// Lower-cased tag name
    pub tag: String,
    /// Visible text, at most 50 characters
    pub text: String,
    /// 0.5 baseline, 0.8 form controls, 0.6 links
    pub score: f64,
    /// Bounding box in screenshot pixels
    pub rect: Rect,
}

/// Encoded overlays plus the per-element scores.
#[derive(Debug, Clone, Default)]
pub struct Heatmaps {
    /// JPEG attention overlay
    pub attention_jpeg: Vec<u8>,
    /// JPEG click overlay
    pub click_jpeg: Vec<u8>,
    /// Scored elements
    pub elements: Vec<ElementScore>,
}

/// Score an element by kind; a link target overrides the tag rule.
#[must_use]
pub fn element_score(element: &ClickableElement) -> f64 {
    let tag = element.tag.to_lowercase();
    let mut score = 0.5;
    if matches!(tag.as_str(), "button" | "input" | "select" | "textarea") {
        score = 0.8;
    }
    if element.href.as_deref().is_some_and(|href| !href.is_empty()) {
        score = 0.6;
    }
    score
}

/// Build both overlays from a screenshot.
///
/// # Errors
/// Returns `AnalyzerError::Image` if the screenshot cannot be decoded or an
/// overlay cannot be encoded.
pub fn generate_heatmaps(
    screenshot: &[u8],
    elements: &[ClickableElement],
) -> Result<Heatmaps, AnalyzerError> {
    let original = image::load_from_memory(screenshot)?.to_rgb8();
    let (width, height) = original.dimensions();
    if width == 0 || height == 0 {
        return Err(AnalyzerError::InvalidInput("screenshot is empty".to_string()));
    }

    let attention = attention_map(&original);
    let attention_jpeg = encode_jpeg(&overlay(&original, &attention))?;

    let (click, scored) = click_map(width, height, elements);
    let click_jpeg = encode_jpeg(&overlay(&original, &click))?;

    Ok(Heatmaps {
        attention_jpeg,
        click_jpeg,
        elements: scored,
    })
}

/// Edge density: Sobel magnitude, thresholded, blurred and scaled to 0..=1.
fn attention_map(original: &RgbImage) -> Vec<f32> {
    let gray = image::imageops::grayscale(original);
    let (width, height) = gray.dimensions();
    let mut edges = GrayImage::new(width, height);

    let px = |x: u32, y: u32| f32::from(gray.get_pixel(x, y)[0]);
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let gx = -px(x - 1, y - 1) - 2.0 * px(x - 1, y) - px(x - 1, y + 1)
                + px(x + 1, y - 1)
                + 2.0 * px(x + 1, y)
                + px(x + 1, y + 1);
            let gy = -px(x - 1, y - 1) - 2.0 * px(x, y - 1) - px(x + 1, y - 1)
                + px(x - 1, y + 1)
                + 2.0 * px(x, y + 1)
                + px(x + 1, y + 1);
            if gx.hypot(gy) >= EDGE_THRESHOLD {
                edges.put_pixel(x, y, Luma([255]));
            }
        }
    }

    image::imageops::blur(&edges, ATTENTION_SIGMA)
        .pixels()
        .map(|p| f32::from(p[0]) / 255.0)
        .collect()
}

/// Rasterise element boxes, blur, and normalise by the maximum.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn click_map(width: u32, height: u32, elements: &[ClickableElement]) -> (Vec<f32>, Vec<ElementScore>) {
    let mut canvas = GrayImage::new(width, height);
    let mut scored = Vec::new();
    let clamp = |v: f64, max: u32| (v as i64).clamp(0, i64::from(max) - 1) as u32;

    for element in elements {
        let Some(rect) = element.rect else {
            continue;
        };
        let score = element_score(element);

        // Negative extents flip the box rather than emptying it.
        let (left, right) = min_max(rect.x, rect.x + rect.width);
        let (top, bottom) = min_max(rect.y, rect.y + rect.height);
        let (x, x2) = (clamp(left, width), clamp(right, width));
        let (y, y2) = (clamp(top, height), clamp(bottom, height));
        let intensity = (score * 255.0).clamp(0.0, 255.0) as u8;
        for py in y..=y2 {
            for px in x..=x2 {
                canvas.put_pixel(px, py, Luma([intensity]));
            }
        }

        scored.push(ElementScore {
            tag: element.tag.to_lowercase(),
            text: element.text.chars().take(MAX_TEXT_CHARS).collect(),
            score,
            rect,
        });
    }

    let blurred = image::imageops::blur(&canvas, CLICK_SIGMA);
    let max = blurred.pixels().map(|p| p[0]).max().unwrap_or(0);
    let map = blurred
        .pixels()
        .map(|p| {
            if max > 0 {
                f32::from(p[0]) / f32::from(max)
            } else {
                0.0
            }
        })
        .collect();
    (map, scored)
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    (a.min(b), a.max(b))
}

/// JET colour map for `v` in 0..=1.
fn jet(v: f32) -> [f32; 3] {
    let channel = |offset: f32| (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0) * 255.0;
    [channel(3.0), channel(2.0), channel(1.0)]
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn overlay(original: &RgbImage, heat: &[f32]) -> RgbImage {
    let mut out = original.clone();
    for (pixel, &value) in out.pixels_mut().zip(heat) {
        let color = jet(value.clamp(0.0, 1.0));
        for (channel, overlay) in pixel.0.iter_mut().zip(color) {
            let blended = f32::from(*channel) * ORIGINAL_WEIGHT + overlay * OVERLAY_WEIGHT;
            *channel = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, AnalyzerError> {
    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8.into(),
    )?;
    Ok(out.into_inner())
}

/// Produces the two overlays and the per-element click scores.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeatmapAnalyzer;

impl HeatmapAnalyzer {
    fn empty_payload() -> Value {
        let mut payload = json!({ "elements": [] });
        payload[ATTENTION_URL_KEY] = Value::Null;
        payload[CLICK_URL_KEY] = Value::Null;
        payload
    }
}

#[async_trait]
impl Analyzer for HeatmapAnalyzer {
    fn module(&self) -> ModuleName {
        ModuleName::Heatmaps
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let artifact = ctx.artifact.clone();
        let generated = tokio::task::spawn_blocking(move || {
            generate_heatmaps(&artifact.screenshot, &artifact.clickable_elements)
        })
        .await;

        let heatmaps = match generated {
            Ok(Ok(heatmaps)) => heatmaps,
            Ok(Err(e)) => {
                tracing::warn!("Heatmap generation failed for {}: {}", ctx.url, e);
                return Ok(AnalyzerOutput::completed(Self::empty_payload()));
            }
            Err(e) => {
                tracing::warn!("Heatmap task for {} did not finish: {}", ctx.url, e);
                return Ok(AnalyzerOutput::completed(Self::empty_payload()));
            }
        };

        let mut payload = Self::empty_payload();
        payload["elements"] = serde_json::to_value(&heatmaps.elements)?;

        Ok(AnalyzerOutput::completed(payload)
            .with_artifact(DerivedArtifact {
                file_type: FileType::AttentionHeatmap,
                content_type: "image/jpeg",
                bytes: heatmaps.attention_jpeg,
                payload_key: ATTENTION_URL_KEY,
            })
            .with_artifact(DerivedArtifact {
                file_type: FileType::ClickHeatmap,
                content_type: "image/jpeg",
                bytes: heatmaps.click_jpeg,
                payload_key: CLICK_URL_KEY,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use sitesense_core::{PageArtifact, ScanId};
    use std::sync::Arc;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("encode png");
        out.into_inner()
    }

    fn element(tag: &str, href: Option<&str>, rect: Option<Rect>) -> ClickableElement {
        ClickableElement {
            tag: tag.to_string(),
            text: "x".repeat(80),
            href: href.map(str::to_string),
            rect,
        }
    }

    fn rect(x: f64, y: f64) -> Option<Rect> {
        Some(Rect {
            x,
            y,
            width: 20.0,
            height: 10.0,
        })
    }

    #[test]
    fn test_element_scores() {
        assert!((element_score(&element("DIV", None, None)) - 0.5).abs() < f64::EPSILON);
        assert!((element_score(&element("button", None, None)) - 0.8).abs() < f64::EPSILON);
        assert!((element_score(&element("a", Some("/x"), None)) - 0.6).abs() < f64::EPSILON);
        assert!((element_score(&element("input", Some("/x"), None)) - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_generate_heatmaps() {
        let elements = vec![
            element("button", None, rect(5.0, 5.0)),
            element("a", Some("/home"), rect(-10.0, 500.0)),
            element("span", None, None),
        ];

        let heatmaps = generate_heatmaps(&png(64, 48), &elements).expect("heatmaps");

        assert!(!heatmaps.attention_jpeg.is_empty());
        assert!(!heatmaps.click_jpeg.is_empty());
        assert_eq!(heatmaps.elements.len(), 2);
        assert_eq!(heatmaps.elements[0].text.chars().count(), 50);

        let decoded = image::load_from_memory(&heatmaps.click_jpeg).expect("decode jpeg");
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_click_map_normalised() {
        let (map, _) = click_map(40, 40, &[element("button", None, rect(10.0, 10.0))]);
        let max = map.iter().copied().fold(0.0_f32, f32::max);
        assert!((max - 1.0).abs() < f32::EPSILON);

        let (empty, scored) = click_map(40, 40, &[]);
        assert!(empty.iter().all(|v| *v == 0.0));
        assert!(scored.is_empty());
    }

    #[test]
    fn test_click_map_normalises_negative_extents() {
        let flipped = Some(Rect {
            x: 30.0,
            y: 30.0,
            width: -20.0,
            height: -10.0,
        });
        let (map, scored) = click_map(40, 40, &[element("a", Some("/x"), flipped)]);
        assert_eq!(scored.len(), 1);
        assert!(map[25 * 40 + 20] > 0.5);
        assert!(map[5 * 40 + 5] < map[25 * 40 + 20]);
    }

    #[test]
    fn test_undecodable_screenshot() {
        assert!(generate_heatmaps(b"not an image", &[]).is_err());
    }

    #[tokio::test]
    async fn test_analyzer_returns_empty_result_on_failure() {
        let ctx = AnalysisContext {
            scan_id: ScanId::generate(),
            url: "https://example.com".to_string(),
            artifact: Arc::new(PageArtifact {
                screenshot: b"garbage".to_vec(),
                ..PageArtifact::default()
            }),
        };

        let output = HeatmapAnalyzer.analyze(&ctx).await.expect("never errors");
        assert!(output.artifacts.is_empty());
        assert_eq!(output.payload[ATTENTION_URL_KEY], Value::Null);
        assert_eq!(output.payload["elements"], json!([]));
    }

    #[tokio::test]
    async fn test_analyzer_emits_two_artifacts() {
        let ctx = AnalysisContext {
            scan_id: ScanId::generate(),
            url: "https://example.com".to_string(),
            artifact: Arc::new(PageArtifact {
                screenshot: png(32, 32),
                clickable_elements: vec![element("button", None, rect(2.0, 2.0))],
                ..PageArtifact::default()
            }),
        };

        let output = HeatmapAnalyzer.analyze(&ctx).await.expect("analyze");
        let types: Vec<_> = output.artifacts.iter().map(|a| a.file_type).collect();
        assert_eq!(types, vec![FileType::AttentionHeatmap, FileType::ClickHeatmap]);
        assert_eq!(output.payload["elements"][0]["score"], 0.8);
    }
}

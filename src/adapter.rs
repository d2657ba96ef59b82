// src/adapter.rs

use crate::types::{DetectionRecord, LegacyMetadata, PixelBox, RawDetection};
use tracing::debug;

// ============================================================================
// SHAPE CLASSIFICATION
// ============================================================================

/// The recognized box encodings. Shape inspection happens exactly once, here;
/// everything downstream works with resolved pixel boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BoxShape {
    /// Corners normalized to `[0, 1]` of the image.
    NormalizedCorners { x1: f32, y1: f32, x2: f32, y2: f32 },
    /// Origin plus size, already in pixel space. Covers both the modern
    /// pixel records and legacy boxes (the `pixel_space` flag only marks
    /// provenance; the coordinates resolve identically).
    PixelBox { x: f32, y: f32, width: f32, height: f32 },
}

/// Determine which encoding a raw record uses. Corner fields are checked
/// first; a record carrying both encodings resolves as corners.
pub(crate) fn classify(raw: &RawDetection) -> Option<BoxShape> {
    if let (Some(x1), Some(y1), Some(x2), Some(y2)) = (raw.x1, raw.y1, raw.x2, raw.y2) {
        return Some(BoxShape::NormalizedCorners { x1, y1, x2, y2 });
    }
    if let (Some(x), Some(y), Some(width), Some(height)) = (raw.x, raw.y, raw.width, raw.height) {
        return Some(BoxShape::PixelBox {
            x,
            y,
            width,
            height,
        });
    }
    None
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize a batch of raw detections into pixel-space records.
///
/// Records with an unrecognized shape or a non-positive resolved box are
/// skipped, never aborting the batch. The sequence key is the record's
/// timestamp when present, else its input index.
pub fn normalize(
    source: &[RawDetection],
    image_width: f32,
    image_height: f32,
) -> Vec<DetectionRecord> {
    let mut records = Vec::with_capacity(source.len());
    for (index, raw) in source.iter().enumerate() {
        let bbox = match classify(raw) {
            Some(BoxShape::NormalizedCorners { x1, y1, x2, y2 }) => PixelBox::new(
                x1 * image_width,
                y1 * image_height,
                (x2 - x1) * image_width,
                (y2 - y1) * image_height,
            ),
            Some(BoxShape::PixelBox {
                x,
                y,
                width,
                height,
            }) => PixelBox::new(x, y, width, height),
            None => {
                debug!(index, "skipping detection with unrecognized box shape");
                continue;
            }
        };
        if !bbox.is_renderable() {
            debug!(index, ?bbox, "skipping detection with degenerate box");
            continue;
        }
        records.push(DetectionRecord {
            id: raw.id.clone(),
            label: raw.label.clone(),
            score: raw.score,
            bbox,
            sequence_key: raw.timestamp.unwrap_or(index as f64),
            frame_index: raw.frame_index,
        });
    }
    records
}

/// Lift legacy metadata into raw detections. A `detections` list passes
/// through untouched and wins over `boxes` when both are present.
pub fn raw_from_legacy(metadata: &LegacyMetadata) -> Vec<RawDetection> {
    if let Some(detections) = &metadata.detections {
        return detections.clone();
    }
    let Some(boxes) = &metadata.boxes else {
        return Vec::new();
    };
    boxes
        .iter()
        .map(|b| RawDetection {
            label: b.class.clone(),
            score: b.confidence,
            x: Some(b.x),
            y: Some(b.y),
            width: Some(b.width),
            height: Some(b.height),
            pixel_space: Some(true),
            ..Default::default()
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

// src/types.rs

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};

// ============================================================================
// RASTER / GEOMETRY PRIMITIVES
// ============================================================================

/// A decoded raster supplied by the caller. RGBA8, row-major, no padding.
///
/// The engine never fetches or decodes image bytes itself; whoever owns the
/// media service hands us the finished pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Build a frame from raw RGBA bytes, validating the buffer length.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            anyhow::bail!(
                "frame buffer is {} bytes, expected {} for {}x{} RGBA",
                data.len(),
                expected,
                width,
                height
            );
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned box in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Horizontal midpoint of the bottom edge — the ground-contact anchor
    /// used for trajectory points.
    pub fn bottom_mid(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height)
    }

    /// True when both dimensions are strictly positive (NaN fails too).
    pub fn is_renderable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// An RGBA color. Serialized as a `#RRGGBB` hex string to match the line
/// configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` (case-insensitive, leading `#` required).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::rgb(r, g, b))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid hex color {:?}", s)))
    }
}

// ============================================================================
// DETECTION INPUT SHAPES
// ============================================================================

/// One detection as it arrives from upstream. Sources disagree on schema, so
/// every field is optional; the adapter inspects the shape exactly once and
/// everything downstream consumes only [`DetectionRecord`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDetection {
    pub id: Option<String>,
    pub label: Option<String>,
    pub score: Option<f32>,
    // Shape 1: corners normalized to [0,1] of the image.
    pub x1: Option<f32>,
    pub y1: Option<f32>,
    pub x2: Option<f32>,
    pub y2: Option<f32>,
    // Shapes 2/3: a box already in pixel space. `pixel_space` marks legacy
    // records converted from the old `boxes` metadata.
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub pixel_space: Option<bool>,
    /// Relative ordering only; never shown as absolute time.
    pub timestamp: Option<f64>,
    pub frame_index: Option<u64>,
}

/// The canonical, post-normalization detection. Invariant: `bbox` has
/// strictly positive width and height (the adapter drops everything else).
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub id: Option<String>,
    pub label: Option<String>,
    pub score: Option<f32>,
    pub bbox: PixelBox,
    /// Timestamp when present, else the record's input index. Used purely
    /// for relative ordering within a trajectory.
    pub sequence_key: f64,
    pub frame_index: Option<u64>,
}

/// A legacy pixel-space box from the old `boxes` metadata list.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(alias = "label")]
    pub class: Option<String>,
    pub confidence: Option<f32>,
}

/// Legacy metadata payload: either a detection list or a plain box list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyMetadata {
    pub detections: Option<Vec<RawDetection>>,
    pub boxes: Option<Vec<LegacyBox>>,
}

// ============================================================================
// ANNOTATIONS PAYLOAD
// ============================================================================

/// The current annotations payload as served next to an alert snapshot.
/// Missing `data` or `data.detections` means "no detections", not an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnotationsPayload {
    pub data: Option<AnnotationsData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnotationsData {
    pub detections: Option<Vec<RawDetection>>,
    pub metadata: Option<AnnotationsMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnotationsMetadata {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// LINE ANNOTATIONS
// ============================================================================

/// A configured static polyline (e.g. a crossing line), independent of
/// detections. Point coordinates are authored against the configuration's
/// reference resolution and scaled at render time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineAnnotation {
    pub points: Vec<[f32; 2]>,
    pub color: Color,
    #[serde(default)]
    pub label: Option<String>,
    /// Explicit label anchor; when absent the polyline centroid is used.
    #[serde(default)]
    pub centroid: Option<[f32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineCrossingConfig {
    pub reference_width: f32,
    pub reference_height: f32,
    pub lines: Vec<LineAnnotation>,
}

// ============================================================================
// RENDER OPTIONS
// ============================================================================

/// Per-call render configuration. Unset filters pass everything.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Allowed labels, compared case-insensitively. Unlabeled records always pass.
    pub labels: Option<HashSet<String>>,
    /// Allowed identities. Anonymous records always pass.
    pub ids: Option<HashSet<String>>,
    pub show_boxes: bool,
    pub show_paths: bool,
    /// Drop records whose frame index exceeds this cutoff.
    pub max_frame_index: Option<u64>,
    /// Repaint annotation layers only, reusing the previous dimensions and
    /// base image.
    pub overlay_only: bool,
    pub line_crossings: Option<LineCrossingConfig>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            labels: None,
            ids: None,
            show_boxes: true,
            show_paths: true,
            max_frame_index: None,
            overlay_only: false,
            line_crossings: None,
        }
    }
}

// ============================================================================
// DETECTION STATISTICS
// ============================================================================

/// Summary statistics over a normalized detection set, as shown next to the
/// rendered snapshot in the alert viewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionStats {
    pub total: usize,
    pub label_counts: HashMap<String, usize>,
    pub unique_ids: usize,
    /// Mean confidence over records that carry a score.
    pub mean_score: Option<f32>,
}

impl DetectionStats {
    pub fn from_records(records: &[DetectionRecord]) -> Self {
        let mut label_counts: HashMap<String, usize> = HashMap::new();
        let mut ids: HashSet<&str> = HashSet::new();
        let mut score_sum = 0.0f32;
        let mut score_count = 0usize;

        for record in records {
            if let Some(label) = &record.label {
                *label_counts.entry(label.to_lowercase()).or_default() += 1;
            }
            if let Some(id) = &record.id {
                ids.insert(id);
            }
            if let Some(score) = record.score {
                score_sum += score;
                score_count += 1;
            }
        }

        Self {
            total: records.len(),
            label_counts,
            unique_ids: ids.len(),
            mean_score: (score_count > 0).then(|| score_sum / score_count as f32),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_roundtrip() {
        let c = Color::from_hex("#FF5722").unwrap();
        assert_eq!((c.r, c.g, c.b, c.a), (0xFF, 0x57, 0x22, 255));
        assert_eq!(c.to_hex(), "#FF5722");
        assert_eq!(Color::from_hex("#ff5722"), Some(c));
    }

    #[test]
    fn test_hex_color_rejects_malformed() {
        assert_eq!(Color::from_hex("FF5722"), None); // missing '#'
        assert_eq!(Color::from_hex("#FFF"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
        assert_eq!(Color::from_hex("#FF5722AA"), None);
    }

    #[test]
    fn test_frame_length_validation() {
        assert!(Frame::from_rgba(vec![0u8; 2 * 2 * 4], 2, 2).is_ok());
        assert!(Frame::from_rgba(vec![0u8; 15], 2, 2).is_err());
    }

    #[test]
    fn test_bottom_mid_anchor() {
        let anchor = PixelBox::new(100.0, 150.0, 100.0, 120.0).bottom_mid();
        assert_eq!(anchor, Point::new(150.0, 270.0));
    }

    #[test]
    fn test_zero_size_box_not_renderable() {
        assert!(!PixelBox::new(10.0, 10.0, 0.0, 20.0).is_renderable());
        assert!(!PixelBox::new(10.0, 10.0, 20.0, -1.0).is_renderable());
        assert!(!PixelBox::new(10.0, 10.0, f32::NAN, 20.0).is_renderable());
        assert!(PixelBox::new(10.0, 10.0, 1.0, 1.0).is_renderable());
    }

    #[test]
    fn test_annotations_payload_tolerates_missing_data() {
        let payload: AnnotationsPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.data.is_none());

        let payload: AnnotationsPayload =
            serde_json::from_str(r#"{"data": {"metadata": {"start_time": "t0"}}}"#).unwrap();
        let data = payload.data.unwrap();
        assert!(data.detections.is_none());
        assert_eq!(data.metadata.unwrap().start_time.as_deref(), Some("t0"));
    }

    #[test]
    fn test_detection_stats() {
        let rec = |label: Option<&str>, id: Option<&str>, score: Option<f32>| DetectionRecord {
            id: id.map(String::from),
            label: label.map(String::from),
            score,
            bbox: PixelBox::new(0.0, 0.0, 10.0, 10.0),
            sequence_key: 0.0,
            frame_index: None,
        };
        let records = vec![
            rec(Some("Person"), Some("a"), Some(0.8)),
            rec(Some("person"), Some("a"), Some(0.6)),
            rec(Some("car"), None, None),
            rec(None, Some("b"), None),
        ];
        let stats = DetectionStats::from_records(&records);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.label_counts.get("person"), Some(&2));
        assert_eq!(stats.label_counts.get("car"), Some(&1));
        assert_eq!(stats.unique_ids, 2);
        assert!((stats.mean_score.unwrap() - 0.7).abs() < 1e-6);
    }
}

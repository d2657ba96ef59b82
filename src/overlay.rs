// src/overlay.rs

use crate::adapter;
use crate::filter;
use crate::geom;
use crate::palette::{class_color, ColorRegistry};
use crate::surface::DrawSurface;
use crate::trajectory;
use crate::types::{
    AnnotationsPayload, Color, DetectionRecord, Frame, LegacyMetadata, LineCrossingConfig,
    PixelBox, Point, RenderOptions,
};
use anyhow::Result;
use tracing::{debug, warn};

/// Canvas dimensions used before any image has established real ones.
pub const DEFAULT_DIMS: (u32, u32) = (1280, 720);

const LABEL_TEXT_PX: f32 = 14.0;
const LABEL_PAD: f32 = 4.0;
const ACCENT_STRIP_W: f32 = 3.0;
const BOX_STROKE: u32 = 3;
const PATH_STROKE: f32 = 2.0;
const PATH_DASH: f32 = 8.0;
const PATH_GAP: f32 = 6.0;
const PATH_DISK_R: f32 = 3.0;
const PATH_MARKER: f32 = 7.0;
const LINE_STROKE: f32 = 3.0;
const LINE_ARROW: f32 = 12.0;

const LABEL_TAB_BG: Color = Color::rgba(20, 20, 20, 220);

// ============================================================================
// RENDERER
// ============================================================================

/// The overlay orchestrator. Owns the per-instance color registry and the
/// remembered canvas dimensions; carries no other state between calls.
///
/// `render` never raises. A failing stage is logged and skipped, later
/// stages still run, so a broken font or payload degrades the output
/// instead of losing the alert snapshot entirely.
pub struct OverlayRenderer {
    registry: ColorRegistry,
    tracked_label: String,
    last_dims: Option<(u32, u32)>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self {
            registry: ColorRegistry::new(),
            tracked_label: "person".to_string(),
            last_dims: None,
        }
    }

    /// Change which detection class gets movement paths.
    pub fn with_tracked_label(mut self, label: impl Into<String>) -> Self {
        self.tracked_label = label.into();
        self
    }

    /// The color remembered for an identity, if it has been drawn.
    pub fn color_of(&self, identity: &str) -> Option<Color> {
        self.registry.get(identity)
    }

    /// Forget all identity colors.
    pub fn clear_colors(&mut self) {
        self.registry.clear();
    }

    /// Render one snapshot onto the surface.
    ///
    /// Detection sources: the annotations payload wins over legacy metadata
    /// when both are supplied. Every input is optional; a missing one
    /// short-circuits only the stages that depend on it.
    pub fn render(
        &mut self,
        surface: &mut dyn DrawSurface,
        image: Option<&Frame>,
        legacy: Option<&LegacyMetadata>,
        annotations: Option<&AnnotationsPayload>,
        options: &RenderOptions,
    ) {
        let dims = self.resolve_dims(image, options);
        self.last_dims = Some(dims);

        if let Err(err) = surface.begin(dims.0, dims.1) {
            warn!(?err, width = dims.0, height = dims.1, "surface begin failed");
            return;
        }

        if !options.overlay_only {
            if let Some(frame) = image {
                if let Err(err) = surface.blit(frame) {
                    warn!(?err, "base image blit failed, continuing with overlay");
                }
            }
        }

        let records = self.resolve_records(legacy, annotations, dims, options);

        if options.show_paths && !records.is_empty() {
            if let Err(err) = self.draw_paths(surface, &records) {
                warn!(?err, "trajectory pass failed");
            }
        }

        if options.show_boxes && !records.is_empty() {
            if let Err(err) = self.draw_boxes(surface, &records) {
                warn!(?err, "box pass failed");
            }
        }

        if let Some(config) = &options.line_crossings {
            if let Err(err) = draw_line_annotations(surface, config, dims) {
                warn!(?err, "line annotation pass failed");
            }
        }
    }

    fn resolve_dims(&self, image: Option<&Frame>, options: &RenderOptions) -> (u32, u32) {
        if options.overlay_only {
            return self.last_dims.unwrap_or(DEFAULT_DIMS);
        }
        match image {
            Some(frame) => (frame.width, frame.height),
            None => self.last_dims.unwrap_or(DEFAULT_DIMS),
        }
    }

    fn resolve_records(
        &self,
        legacy: Option<&LegacyMetadata>,
        annotations: Option<&AnnotationsPayload>,
        dims: (u32, u32),
        options: &RenderOptions,
    ) -> Vec<DetectionRecord> {
        let payload_detections = annotations
            .and_then(|payload| payload.data.as_ref())
            .and_then(|data| data.detections.as_ref());

        let raw = match (payload_detections, legacy) {
            (Some(detections), _) => detections.clone(),
            (None, Some(metadata)) => adapter::raw_from_legacy(metadata),
            (None, None) => {
                debug!("no detection source supplied");
                return Vec::new();
            }
        };

        let records = adapter::normalize(&raw, dims.0 as f32, dims.1 as f32);
        filter::filter(&records, options)
    }

    // ------------------------------------------------------------------
    // trajectory pass
    // ------------------------------------------------------------------

    fn draw_paths(
        &mut self,
        surface: &mut dyn DrawSurface,
        records: &[DetectionRecord],
    ) -> Result<()> {
        let paths = trajectory::build_trajectories(records, &self.tracked_label);
        let preferred = class_color(&self.tracked_label);

        for (identity, points) in &paths {
            let color = self.registry.color_for(Some(identity.as_str()), 0, preferred);

            for dash in geom::dash_segments(points, PATH_DASH, PATH_GAP) {
                surface.stroke_polyline(&dash, color, PATH_STROKE)?;
            }
            for point in points {
                surface.fill_circle(*point, PATH_DISK_R, color)?;
            }
            for marker in geom::heading_markers(points, PATH_MARKER) {
                surface.fill_polygon(&marker, color)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // box + label pass
    // ------------------------------------------------------------------

    fn draw_boxes(
        &mut self,
        surface: &mut dyn DrawSurface,
        records: &[DetectionRecord],
    ) -> Result<()> {
        for (index, record) in records.iter().enumerate() {
            let preferred = record.label.as_deref().and_then(class_color);
            let color = self
                .registry
                .color_for(record.id.as_deref(), index, preferred);

            surface.stroke_rect(record.bbox, color, BOX_STROKE)?;

            let text = label_text(record);
            if text.is_empty() {
                continue;
            }

            let (tw, th) = surface.text_size(&text, LABEL_TEXT_PX);
            let tab_w = tw as f32 + LABEL_PAD * 2.0 + ACCENT_STRIP_W;
            let tab_h = th as f32 + LABEL_PAD * 2.0;
            // Tab sits above the box, clamped inside the canvas.
            let tab_y = (record.bbox.y - tab_h).max(0.0);
            let tab = PixelBox::new(record.bbox.x, tab_y, tab_w, tab_h);

            surface.fill_rect(tab, LABEL_TAB_BG)?;
            surface.fill_rect(
                PixelBox::new(record.bbox.x, tab_y, ACCENT_STRIP_W, tab_h),
                color,
            )?;
            surface.draw_text(
                &text,
                Point::new(record.bbox.x + ACCENT_STRIP_W + LABEL_PAD, tab_y + LABEL_PAD),
                LABEL_TEXT_PX,
                Color::WHITE,
            )?;
        }
        Ok(())
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

/// Compose the label tab text: class, rounded confidence percent, and the
/// identity's last four characters. All parts optional.
fn label_text(record: &DetectionRecord) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(label) = &record.label {
        parts.push(label.clone());
    }
    if let Some(score) = record.score {
        parts.push(format!("{}%", (score * 100.0).round() as i32));
    }
    if let Some(id) = &record.id {
        let tail: String = id
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        parts.push(format!("#{tail}"));
    }
    parts.join(" ")
}

/// Static configured polylines, scaled from the configuration's reference
/// resolution to the live canvas.
fn draw_line_annotations(
    surface: &mut dyn DrawSurface,
    config: &LineCrossingConfig,
    dims: (u32, u32),
) -> Result<()> {
    if config.reference_width <= 0.0 || config.reference_height <= 0.0 {
        debug!("line configuration has a degenerate reference resolution");
        return Ok(());
    }
    let sx = dims.0 as f32 / config.reference_width;
    let sy = dims.1 as f32 / config.reference_height;

    for line in &config.lines {
        let points: Vec<Point> = line
            .points
            .iter()
            .map(|[x, y]| Point::new(x * sx, y * sy))
            .collect();
        if points.len() < 2 {
            continue;
        }

        surface.stroke_polyline(&points, line.color, LINE_STROKE)?;

        // Direction arrow on the final segment. For a closed ring the
        // terminal vertex repeats the first, so step back one segment.
        let mut end = points.len() - 1;
        if end >= 2 && points[end] == points[0] {
            end -= 1;
        }
        if let Some(tri) = geom::arrow_head(points[end - 1], points[end], LINE_ARROW) {
            surface.fill_polygon(&tri, line.color)?;
        }

        if let Some(label) = &line.label {
            let anchor = match line.centroid {
                Some([x, y]) => Point::new(x * sx, y * sy),
                None => geom::polyline_centroid(&points),
            };
            draw_line_label(surface, label, anchor, line.color)?;
        }
    }
    Ok(())
}

/// Label in a filled rounded pill centered on the anchor.
fn draw_line_label(
    surface: &mut dyn DrawSurface,
    label: &str,
    anchor: Point,
    color: Color,
) -> Result<()> {
    let (tw, th) = surface.text_size(label, LABEL_TEXT_PX);
    let w = tw as f32 + LABEL_PAD * 2.0;
    let h = th as f32 + LABEL_PAD * 2.0;
    let x = anchor.x - w / 2.0;
    let y = (anchor.y - h / 2.0).max(0.0);

    surface.fill_rect(PixelBox::new(x, y, w, h), color)?;
    // Rounded end caps.
    surface.fill_circle(Point::new(x, y + h / 2.0), h / 2.0, color)?;
    surface.fill_circle(Point::new(x + w, y + h / 2.0), h / 2.0, color)?;
    surface.draw_text(
        label,
        Point::new(x + LABEL_PAD, y + LABEL_PAD),
        LABEL_TEXT_PX,
        Color::WHITE,
    )?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnnotationsData, LineAnnotation, RawDetection};
    use anyhow::anyhow;

    #[derive(Debug, PartialEq)]
    enum Op {
        Begin(u32, u32),
        Blit,
        StrokeRect(PixelBox, Color),
        FillRect(PixelBox, Color),
        Polygon(usize),
        Polyline(usize),
        Circle,
        Text(String),
    }

    /// Records every call instead of painting.
    #[derive(Default)]
    struct RecordingSurface {
        ops: Vec<Op>,
        dims: (u32, u32),
        fail_stroke_rect: bool,
    }

    impl DrawSurface for RecordingSurface {
        fn begin(&mut self, width: u32, height: u32) -> Result<()> {
            self.dims = (width, height);
            self.ops.push(Op::Begin(width, height));
            Ok(())
        }
        fn size(&self) -> (u32, u32) {
            self.dims
        }
        fn blit(&mut self, _frame: &Frame) -> Result<()> {
            self.ops.push(Op::Blit);
            Ok(())
        }
        fn stroke_rect(&mut self, bbox: PixelBox, color: Color, _thickness: u32) -> Result<()> {
            if self.fail_stroke_rect {
                return Err(anyhow!("stroke_rect unsupported"));
            }
            self.ops.push(Op::StrokeRect(bbox, color));
            Ok(())
        }
        fn fill_rect(&mut self, bbox: PixelBox, color: Color) -> Result<()> {
            self.ops.push(Op::FillRect(bbox, color));
            Ok(())
        }
        fn fill_polygon(&mut self, points: &[Point], _color: Color) -> Result<()> {
            self.ops.push(Op::Polygon(points.len()));
            Ok(())
        }
        fn stroke_polyline(&mut self, points: &[Point], _color: Color, _t: f32) -> Result<()> {
            self.ops.push(Op::Polyline(points.len()));
            Ok(())
        }
        fn fill_circle(&mut self, _center: Point, _radius: f32, _color: Color) -> Result<()> {
            self.ops.push(Op::Circle);
            Ok(())
        }
        fn text_size(&self, text: &str, px: f32) -> (u32, u32) {
            ((text.len() as f32 * px * 0.6) as u32, px as u32)
        }
        fn draw_text(&mut self, text: &str, _pos: Point, _px: f32, _color: Color) -> Result<()> {
            self.ops.push(Op::Text(text.to_string()));
            Ok(())
        }
    }

    fn frame(width: u32, height: u32) -> Frame {
        Frame::from_rgba(vec![0u8; (width * height * 4) as usize], width, height).unwrap()
    }

    fn payload_with(detections: Vec<RawDetection>) -> AnnotationsPayload {
        AnnotationsPayload {
            data: Some(AnnotationsData {
                detections: Some(detections),
                metadata: None,
            }),
        }
    }

    fn person_detection() -> RawDetection {
        RawDetection {
            id: Some("p1".to_string()),
            label: Some("person".to_string()),
            score: Some(0.87),
            x1: Some(0.25),
            y1: Some(0.5),
            x2: Some(0.5),
            y2: Some(0.9),
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_box_and_label() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RecordingSurface::default();
        let payload = payload_with(vec![person_detection()]);

        renderer.render(
            &mut surface,
            Some(&frame(400, 300)),
            None,
            Some(&payload),
            &RenderOptions::default(),
        );

        assert_eq!(surface.ops[0], Op::Begin(400, 300));
        assert_eq!(surface.ops[1], Op::Blit);

        let expected = PixelBox::new(100.0, 150.0, 100.0, 120.0);
        let stroke = surface
            .ops
            .iter()
            .find_map(|op| match op {
                Op::StrokeRect(bbox, color) => Some((*bbox, *color)),
                _ => None,
            })
            .unwrap();
        assert_eq!(stroke.0, expected);
        assert_eq!(stroke.1, class_color("person").unwrap());

        let text = surface
            .ops
            .iter()
            .find_map(|op| match op {
                Op::Text(t) => Some(t.clone()),
                _ => None,
            })
            .unwrap();
        assert!(text.contains("person"));
        assert!(text.contains("87%"));
        assert!(text.contains("#p1"));
    }

    #[test]
    fn test_identity_color_stable_across_renders() {
        let mut renderer = OverlayRenderer::new();
        let payload = payload_with(vec![person_detection()]);
        let mut colors = Vec::new();

        for _ in 0..3 {
            let mut surface = RecordingSurface::default();
            renderer.render(
                &mut surface,
                Some(&frame(400, 300)),
                None,
                Some(&payload),
                &RenderOptions::default(),
            );
            colors.push(renderer.color_of("p1").unwrap());
        }
        assert_eq!(colors[0], colors[1]);
        assert_eq!(colors[1], colors[2]);
    }

    #[test]
    fn test_overlay_only_reuses_dimensions_without_blit() {
        let mut renderer = OverlayRenderer::new();
        let payload = payload_with(vec![person_detection()]);

        let mut first = RecordingSurface::default();
        renderer.render(
            &mut first,
            Some(&frame(800, 600)),
            None,
            Some(&payload),
            &RenderOptions::default(),
        );
        assert_eq!(first.ops[0], Op::Begin(800, 600));

        let mut second = RecordingSurface::default();
        let options = RenderOptions {
            overlay_only: true,
            ..Default::default()
        };
        renderer.render(&mut second, None, None, Some(&payload), &options);
        assert_eq!(second.ops[0], Op::Begin(800, 600));
        assert!(!second.ops.contains(&Op::Blit));
        assert!(second
            .ops
            .iter()
            .any(|op| matches!(op, Op::StrokeRect(..))));
    }

    #[test]
    fn test_default_dims_without_image() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RecordingSurface::default();
        renderer.render(&mut surface, None, None, None, &RenderOptions::default());
        assert_eq!(surface.ops[0], Op::Begin(1280, 720));
    }

    #[test]
    fn test_annotations_payload_wins_over_legacy() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RecordingSurface::default();
        let legacy: LegacyMetadata = serde_json::from_str(
            r#"{"boxes": [{"x": 1, "y": 1, "width": 2, "height": 2, "class": "car"}]}"#,
        )
        .unwrap();
        let payload = payload_with(vec![person_detection()]);

        renderer.render(
            &mut surface,
            Some(&frame(400, 300)),
            Some(&legacy),
            Some(&payload),
            &RenderOptions::default(),
        );

        let boxes: Vec<_> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::StrokeRect(bbox, _) => Some(*bbox),
                _ => None,
            })
            .collect();
        assert_eq!(boxes, vec![PixelBox::new(100.0, 150.0, 100.0, 120.0)]);
    }

    #[test]
    fn test_trajectory_drawn_for_tracked_label() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RecordingSurface::default();
        let mut second = person_detection();
        second.x1 = Some(0.5);
        second.x2 = Some(0.75);
        second.timestamp = Some(1.0);
        let mut first = person_detection();
        first.timestamp = Some(0.0);
        let payload = payload_with(vec![first, second]);

        let options = RenderOptions {
            show_boxes: false,
            ..Default::default()
        };
        renderer.render(&mut surface, Some(&frame(400, 300)), None, Some(&payload), &options);

        assert!(surface.ops.iter().any(|op| matches!(op, Op::Polyline(2))));
        assert_eq!(
            surface.ops.iter().filter(|op| matches!(op, Op::Circle)).count(),
            2
        );
        assert!(surface.ops.iter().any(|op| matches!(op, Op::Polygon(3))));
        assert!(!surface.ops.iter().any(|op| matches!(op, Op::StrokeRect(..))));
    }

    #[test]
    fn test_line_annotations_draw_without_detections() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RecordingSurface::default();
        let options = RenderOptions {
            line_crossings: Some(LineCrossingConfig {
                reference_width: 1920.0,
                reference_height: 1080.0,
                lines: vec![LineAnnotation {
                    points: vec![[0.0, 540.0], [1920.0, 540.0]],
                    color: Color::rgb(255, 0, 0),
                    label: Some("entry".to_string()),
                    centroid: None,
                }],
            }),
            ..Default::default()
        };

        renderer.render(&mut surface, Some(&frame(960, 540)), None, None, &options);

        assert!(surface.ops.iter().any(|op| matches!(op, Op::Polyline(2))));
        assert!(surface
            .ops
            .iter()
            .any(|op| matches!(op, Op::Text(t) if t == "entry")));
    }

    #[test]
    fn test_stage_failure_does_not_abort_render() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RecordingSurface {
            fail_stroke_rect: true,
            ..Default::default()
        };
        let options = RenderOptions {
            line_crossings: Some(LineCrossingConfig {
                reference_width: 400.0,
                reference_height: 300.0,
                lines: vec![LineAnnotation {
                    points: vec![[0.0, 0.0], [400.0, 300.0]],
                    color: Color::rgb(0, 255, 0),
                    label: None,
                    centroid: None,
                }],
            }),
            ..Default::default()
        };
        let payload = payload_with(vec![person_detection()]);

        // Box pass fails; line pass must still run.
        renderer.render(&mut surface, Some(&frame(400, 300)), None, Some(&payload), &options);
        assert!(surface.ops.iter().any(|op| matches!(op, Op::Polyline(2))));
    }

    #[test]
    fn test_label_tab_clamped_to_canvas_top() {
        let mut renderer = OverlayRenderer::new();
        let mut surface = RecordingSurface::default();
        let mut near_top = person_detection();
        near_top.y1 = Some(0.0);
        near_top.y2 = Some(0.2);
        let payload = payload_with(vec![near_top]);

        renderer.render(
            &mut surface,
            Some(&frame(400, 300)),
            None,
            Some(&payload),
            &RenderOptions::default(),
        );

        let tab = surface
            .ops
            .iter()
            .find_map(|op| match op {
                Op::FillRect(bbox, color) if *color == LABEL_TAB_BG => Some(*bbox),
                _ => None,
            })
            .unwrap();
        assert_eq!(tab.y, 0.0);
    }
}

// src/geom.rs

use crate::types::Point;

// ============================================================================
// DASHED POLYLINES
// ============================================================================

/// Cut a polyline into dash segments by walking its arc length.
///
/// Dash phase carries across vertices, so a dash can bend around a corner
/// instead of restarting at every segment.
pub fn dash_segments(points: &[Point], dash: f32, gap: f32) -> Vec<[Point; 2]> {
    let mut out = Vec::new();
    if points.len() < 2 || dash <= 0.0 || gap < 0.0 {
        return out;
    }

    let period = dash + gap;
    // Distance already travelled within the current dash/gap period.
    let mut phase = 0.0f32;
    let mut dash_start: Option<Point> = None;

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = (dx * dx + dy * dy).sqrt();
        if len <= f32::EPSILON {
            continue;
        }
        let (ux, uy) = (dx / len, dy / len);
        let at = |t: f32| Point::new(a.x + ux * t, a.y + uy * t);

        let mut travelled = 0.0f32;
        while travelled < len {
            if phase < dash {
                // Inside a dash.
                let start = dash_start.unwrap_or_else(|| at(travelled));
                let remaining = (dash - phase).min(len - travelled);
                travelled += remaining;
                phase += remaining;
                if phase >= dash {
                    out.push([start, at(travelled)]);
                    dash_start = None;
                } else {
                    // Dash continues into the next segment.
                    dash_start = Some(start);
                }
            } else {
                // Inside a gap.
                let remaining = (period - phase).min(len - travelled);
                travelled += remaining;
                phase += remaining;
                if phase >= period {
                    phase = 0.0;
                }
            }
        }
    }
    // Flush a dash still open at the end of the line.
    if let Some(start) = dash_start {
        if let Some(end) = points.last() {
            out.push([start, *end]);
        }
    }
    out
}

// ============================================================================
// ARROWS AND HEADING MARKERS
// ============================================================================

/// A filled triangle at `to`, pointing from `from` toward `to`. Returns
/// `None` for a zero-length direction.
pub fn arrow_head(from: Point, to: Point, size: f32) -> Option<[Point; 3]> {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    let (ux, uy) = (dx / len, dy / len);
    // Perpendicular for the triangle base.
    let (px, py) = (-uy, ux);
    let half = size / 2.0;
    Some([
        Point::new(to.x, to.y),
        Point::new(to.x - ux * size + px * half, to.y - uy * size + py * half),
        Point::new(to.x - ux * size - px * half, to.y - uy * size - py * half),
    ])
}

/// One heading triangle per vertex, oriented along the local direction of
/// travel. Interior vertices point toward their successor; the final vertex
/// reuses the direction from its predecessor. Vertices with no usable
/// direction (coincident neighbors) are skipped.
pub fn heading_markers(points: &[Point], size: f32) -> Vec<[Point; 3]> {
    if points.len() < 2 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let dir_from = if i + 1 < points.len() {
            points[i]
        } else {
            points[i - 1]
        };
        let dir_to = if i + 1 < points.len() {
            points[i + 1]
        } else {
            points[i]
        };
        let (dx, dy) = (dir_to.x - dir_from.x, dir_to.y - dir_from.y);
        let len = (dx * dx + dy * dy).sqrt();
        if len <= f32::EPSILON {
            continue;
        }
        let tip = Point::new(p.x + dx / len * size, p.y + dy / len * size);
        if let Some(tri) = arrow_head(*p, tip, size) {
            out.push(tri);
        }
    }
    out
}

// ============================================================================
// CENTROID
// ============================================================================

/// Arithmetic mean of the polyline's vertices. Origin for an empty line.
pub fn polyline_centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    let n = points.len() as f32;
    Point::new(sx / n, sy / n)
}

// ============================================================================
// TESTS
// ============================================================================

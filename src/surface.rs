// src/surface.rs

use crate::types::{Color, Frame, PixelBox, Point};
use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::png::PngEncoder;
use image::{imageops, ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use imageproc::drawing;
use imageproc::rect::Rect;
use tracing::debug;

// ============================================================================
// DRAW SURFACE TRAIT
// ============================================================================

/// A host-supplied 2D canvas. The renderer only ever talks to this trait;
/// it has no opinion on whether pixels end up in a raster, a GPU texture,
/// or a test recording.
pub trait DrawSurface {
    /// Reset the surface to the given dimensions, dropping all annotations.
    /// Implementations may preserve a previously blitted base layer when the
    /// dimensions are unchanged.
    fn begin(&mut self, width: u32, height: u32) -> Result<()>;

    fn size(&self) -> (u32, u32);

    /// Paint the frame as the base layer, scaled to fill the surface.
    fn blit(&mut self, frame: &Frame) -> Result<()>;

    fn stroke_rect(&mut self, bbox: PixelBox, color: Color, thickness: u32) -> Result<()>;

    fn fill_rect(&mut self, bbox: PixelBox, color: Color) -> Result<()>;

    fn fill_polygon(&mut self, points: &[Point], color: Color) -> Result<()>;

    fn stroke_polyline(&mut self, points: &[Point], color: Color, thickness: f32) -> Result<()>;

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) -> Result<()>;

    /// Measured (width, height) of the text at the given pixel size.
    fn text_size(&self, text: &str, px: f32) -> (u32, u32);

    /// `pos` is the top-left corner of the text box.
    fn draw_text(&mut self, text: &str, pos: Point, px: f32, color: Color) -> Result<()>;
}

impl From<Color> for Rgba<u8> {
    fn from(c: Color) -> Self {
        Rgba([c.r, c.g, c.b, c.a])
    }
}

// ============================================================================
// RASTER SURFACE
// ============================================================================

/// CPU raster implementation of [`DrawSurface`] over an [`RgbaImage`].
///
/// Keeps a snapshot of the last blitted base layer: `begin` at unchanged
/// dimensions restores it instead of clearing to black, which is what makes
/// overlay-only redraws work without re-supplying the image.
pub struct RasterSurface {
    canvas: RgbaImage,
    base: Option<RgbaImage>,
    font: Option<FontArc>,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            canvas: RgbaImage::new(0, 0),
            base: None,
            font: None,
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }

    /// Encode the canvas as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(
                self.canvas.as_raw(),
                self.canvas.width(),
                self.canvas.height(),
                ExtendedColorType::Rgba8,
            )
            .context("encoding canvas as png")?;
        Ok(bytes)
    }

    /// Encode the canvas as a `data:image/png;base64,...` URL.
    pub fn to_data_url(&self) -> Result<String> {
        let png = self.to_png()?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a font usable by [`RasterSurface::with_font`] from raw TTF/OTF bytes.
pub fn load_font(bytes: Vec<u8>) -> Result<FontArc> {
    FontArc::try_from_vec(bytes).context("parsing font data")
}

impl DrawSurface for RasterSurface {
    fn begin(&mut self, width: u32, height: u32) -> Result<()> {
        match &self.base {
            Some(base) if base.width() == width && base.height() == height => {
                self.canvas = base.clone();
            }
            _ => {
                self.canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
                self.base = None;
            }
        }
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn blit(&mut self, frame: &Frame) -> Result<()> {
        let source = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .context("frame buffer does not match its dimensions")?;
        let (cw, ch) = self.canvas.dimensions();
        if (cw, ch) == (frame.width, frame.height) {
            self.canvas = source;
        } else {
            self.canvas = imageops::resize(&source, cw, ch, imageops::FilterType::Triangle);
        }
        self.base = Some(self.canvas.clone());
        Ok(())
    }

    fn stroke_rect(&mut self, bbox: PixelBox, color: Color, thickness: u32) -> Result<()> {
        let color: Rgba<u8> = color.into();
        // Concentric 1px rectangles, shrinking inward.
        for i in 0..thickness {
            let x = bbox.x as i32 + i as i32;
            let y = bbox.y as i32 + i as i32;
            let w = bbox.width as i64 - 2 * i as i64;
            let h = bbox.height as i64 - 2 * i as i64;
            if w < 1 || h < 1 {
                break;
            }
            let rect = Rect::at(x, y).of_size(w as u32, h as u32);
            drawing::draw_hollow_rect_mut(&mut self.canvas, rect, color);
        }
        Ok(())
    }

    fn fill_rect(&mut self, bbox: PixelBox, color: Color) -> Result<()> {
        if bbox.width < 1.0 || bbox.height < 1.0 {
            return Ok(());
        }
        let rect = Rect::at(bbox.x as i32, bbox.y as i32)
            .of_size(bbox.width as u32, bbox.height as u32);
        drawing::draw_filled_rect_mut(&mut self.canvas, rect, color.into());
        Ok(())
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) -> Result<()> {
        // draw_polygon_mut panics on an empty list or a closed ring.
        let mut verts: Vec<imageproc::point::Point<i32>> = points
            .iter()
            .map(|p| imageproc::point::Point::new(p.x as i32, p.y as i32))
            .collect();
        while verts.len() > 1 && verts.first() == verts.last() {
            verts.pop();
        }
        if verts.len() < 3 {
            return Ok(());
        }
        drawing::draw_polygon_mut(&mut self.canvas, &verts, color.into());
        Ok(())
    }

    fn stroke_polyline(&mut self, points: &[Point], color: Color, thickness: f32) -> Result<()> {
        let rgba: Rgba<u8> = color.into();
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if thickness <= 1.5 {
                drawing::draw_line_segment_mut(&mut self.canvas, (a.x, a.y), (b.x, b.y), rgba);
                continue;
            }
            // Thick segment as a filled quad around the centerline.
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let len = (dx * dx + dy * dy).sqrt();
            if len <= f32::EPSILON {
                continue;
            }
            let half = thickness / 2.0;
            let (px, py) = (-dy / len * half, dx / len * half);
            let quad = [
                Point::new(a.x + px, a.y + py),
                Point::new(b.x + px, b.y + py),
                Point::new(b.x - px, b.y - py),
                Point::new(a.x - px, a.y - py),
            ];
            self.fill_polygon(&quad, color)?;
        }
        Ok(())
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) -> Result<()> {
        if radius < 0.5 {
            return Ok(());
        }
        drawing::draw_filled_circle_mut(
            &mut self.canvas,
            (center.x as i32, center.y as i32),
            radius as i32,
            color.into(),
        );
        Ok(())
    }

    fn text_size(&self, text: &str, px: f32) -> (u32, u32) {
        match &self.font {
            Some(font) => {
                let (w, h) = drawing::text_size(PxScale::from(px), font, text);
                (w, h.max(px as u32))
            }
            // Rough monospace estimate keeps label tabs sized sanely
            // in font-less environments.
            None => ((text.len() as f32 * px * 0.6) as u32, px as u32),
        }
    }

    fn draw_text(&mut self, text: &str, pos: Point, px: f32, color: Color) -> Result<()> {
        let Some(font) = self.font.clone() else {
            debug!("no font loaded, skipping text {:?}", text);
            return Ok(());
        };
        drawing::draw_text_mut(
            &mut self.canvas,
            color.into(),
            pos.x as i32,
            pos.y as i32,
            PxScale::from(px),
            &font,
            text,
        );
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! tiny-skia backed render adapter.
//!
//! Three pixmaps: the persistent drawing layer, the cursor layer that is redrawn
//! on every move, and the composited frame. Text is laid out with `rusttype`
//! using fonts found through `fontdb`.

use crate::error::{Result, TurtleError};
use crate::geometry::turtle_to_raster;
use crate::motion::Segment;
use crate::render::RenderAdapter;
use crate::turtle::{FontSpec, Rgba};
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use glam::{DAffine2, DVec2};
use rusttype::{Font, OutlineBuilder, Scale, point as rt_point};
use std::collections::HashMap;
use std::sync::OnceLock;
use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};
use tracing::{debug, warn};

fn cursor_color() -> Color {
    Color::from_rgba8(0, 128, 0, 255)
}

fn paint_for(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.alpha_u8());
    paint.anti_alias = true;
    paint
}

fn to_skia(t: DAffine2) -> Transform {
    let m = t.matrix2;
    Transform::from_row(
        m.x_axis.x as f32,
        m.x_axis.y as f32,
        m.y_axis.x as f32,
        m.y_axis.y as f32,
        t.translation.x as f32,
        t.translation.y as f32,
    )
}

fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width, height).ok_or(TurtleError::InvalidDimensions { width, height })
}

fn encode(pixmap: &Pixmap) -> Result<Vec<u8>> {
    pixmap
        .encode_png()
        .map_err(|e| TurtleError::Export(e.to_string()))
}

fn font_db() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "loaded system fonts");
        db
    })
}

fn load_font(spec: &FontSpec) -> Option<Font<'static>> {
    let families = match spec.family.as_str() {
        "sans-serif" | "sans" => vec![Family::SansSerif],
        "serif" => vec![Family::Serif],
        "monospace" => vec![Family::Monospace],
        "cursive" => vec![Family::Cursive],
        "fantasy" => vec![Family::Fantasy],
        other => vec![Family::Name(other), Family::SansSerif],
    };
    let query = Query {
        families: &families,
        weight: if spec.bold { Weight::BOLD } else { Weight::NORMAL },
        stretch: Stretch::Normal,
        style: if spec.italic { Style::Italic } else { Style::Normal },
    };

    let db = font_db();
    let id = db.query(&query)?;
    db.with_face_data(id, |data, index| {
        Font::try_from_vec_and_index(data.to_vec(), index)
    })
    .flatten()
}

/// Collects a glyph outline into a tiny-skia path.
struct GlyphPath<'a>(&'a mut PathBuilder);

impl OutlineBuilder for GlyphPath<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Double-buffered raster surface.
pub struct PixmapSurface {
    drawing: Pixmap,
    cursor: Pixmap,
    frame: Pixmap,
    saved: Option<Pixmap>,
    fonts: HashMap<(String, bool, bool), Option<Font<'static>>>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            drawing: new_pixmap(width, height)?,
            cursor: new_pixmap(width, height)?,
            frame: new_pixmap(width, height)?,
            saved: None,
            fonts: HashMap::new(),
        })
    }

    /// Turtle-space to pixel transform for the current size.
    fn display(&self) -> DAffine2 {
        turtle_to_raster(self.drawing.width() as f64, self.drawing.height() as f64)
    }

    /// The persistent drawing layer.
    pub fn drawing(&self) -> &Pixmap {
        &self.drawing
    }

    /// The last composited frame.
    pub fn frame(&self) -> &Pixmap {
        &self.frame
    }

    fn font(&mut self, spec: &FontSpec) -> Option<&Font<'static>> {
        let key = (spec.family.clone(), spec.bold, spec.italic);
        self.fonts
            .entry(key)
            .or_insert_with(|| {
                let font = load_font(spec);
                if font.is_none() {
                    warn!(font = %spec, "no matching font installed, text will be skipped");
                }
                font
            })
            .as_ref()
    }
}

impl RenderAdapter for PixmapSurface {
    fn size(&self) -> (u32, u32) {
        (self.drawing.width(), self.drawing.height())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.drawing = new_pixmap(width, height)?;
        self.cursor = new_pixmap(width, height)?;
        self.frame = new_pixmap(width, height)?;
        self.saved = None;
        Ok(())
    }

    fn clear(&mut self) {
        self.drawing.fill(Color::TRANSPARENT);
    }

    fn stroke_segments(&mut self, segments: &[Segment], color: Rgba, width: f64) {
        let mut pb = PathBuilder::new();
        for segment in segments {
            pb.move_to(segment.start.x as f32, segment.start.y as f32);
            pb.line_to(segment.end.x as f32, segment.end.y as f32);
        }
        let Some(path) = pb.finish() else {
            return;
        };

        let stroke = Stroke {
            width: width as f32,
            ..Default::default()
        };
        let transform = to_skia(self.display());
        self.drawing
            .stroke_path(&path, &paint_for(color), &stroke, transform, None);
    }

    fn fill_text(
        &mut self,
        text: &str,
        font: &FontSpec,
        color: Rgba,
        anchor: DVec2,
        transform: DAffine2,
    ) {
        let transform = to_skia(self.display() * transform);
        let Some(face) = self.font(font) else {
            return;
        };

        let scale = Scale::uniform(font.size_px as f32);
        let metrics = face.v_metrics(scale);
        let advance: f32 = face
            .layout(text, scale, rt_point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);

        // Centered on the anchor both ways; glyph space has Y pointing down.
        let origin = rt_point(
            anchor.x as f32 - advance / 2.0,
            anchor.y as f32 + (metrics.ascent + metrics.descent) / 2.0,
        );

        let mut pb = PathBuilder::new();
        for glyph in face.layout(text, scale, origin) {
            glyph.build_outline(&mut GlyphPath(&mut pb));
        }
        let Some(path) = pb.finish() else {
            return;
        };

        self.drawing
            .fill_path(&path, &paint_for(color), FillRule::Winding, transform, None);
    }

    fn draw_cursor(&mut self, glyph: Option<[DVec2; 3]>) {
        self.cursor.fill(Color::TRANSPARENT);
        let Some([a, b, apex]) = glyph else {
            return;
        };

        let mut pb = PathBuilder::new();
        pb.move_to(a.x as f32, a.y as f32);
        pb.line_to(b.x as f32, b.y as f32);
        pb.line_to(apex.x as f32, apex.y as f32);
        pb.close();
        let Some(path) = pb.finish() else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(cursor_color());
        paint.anti_alias = true;
        let transform = to_skia(self.display());
        self.cursor
            .fill_path(&path, &paint, FillRule::Winding, transform, None);
    }

    fn present(&mut self) {
        self.frame.fill(Color::TRANSPARENT);
        let paint = PixmapPaint::default();
        self.frame.draw_pixmap(
            0,
            0,
            self.drawing.as_ref(),
            &paint,
            Transform::identity(),
            None,
        );
        // The cursor sits above the drawing.
        self.frame.draw_pixmap(
            0,
            0,
            self.cursor.as_ref(),
            &paint,
            Transform::identity(),
            None,
        );
    }

    fn export_png(&self) -> Result<Vec<u8>> {
        encode(&self.drawing)
    }

    fn export_frame_png(&self) -> Result<Vec<u8>> {
        encode(&self.frame)
    }

    fn offscreen(&self, width: u32, height: u32) -> Result<Self> {
        Self::new(width, height)
    }

    fn checkpoint(&mut self) {
        self.saved = Some(self.drawing.clone());
    }

    fn rollback(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.drawing = saved;
        }
    }
}

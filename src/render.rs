//! The render adapter contract and an in-memory recording implementation.
//!
//! The engine talks to the raster only through [`RenderAdapter`]. Every point it
//! hands over is in turtle-space (origin at the center, Y up); mapping onto a
//! top-left, Y-down backing store is the adapter's job.

use crate::error::Result;
use crate::motion::Segment;
use crate::raster::PixmapSurface;
use crate::turtle::{FontSpec, Rgba};
use glam::{DAffine2, DVec2};

/// Raster surface the turtle draws on.
///
/// Implementations keep a persistent drawing layer (strokes and text) separate from
/// the ephemeral cursor, and composite the two in [`present`](Self::present).
pub trait RenderAdapter {
    /// Current backing-store size in pixels.
    fn size(&self) -> (u32, u32);

    /// Reallocates the layers at a new size. Contents are discarded.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Erases the drawing layer.
    fn clear(&mut self);

    /// Strokes every segment of one forward move as a single atomic stroke.
    fn stroke_segments(&mut self, segments: &[Segment], color: Rgba, width: f64);

    /// Fills `text` centered on `anchor`. `transform` is applied in turtle-space
    /// before the adapter's own display mapping.
    fn fill_text(
        &mut self,
        text: &str,
        font: &FontSpec,
        color: Rgba,
        anchor: DVec2,
        transform: DAffine2,
    );

    /// Replaces the cursor layer: the triangle's vertices, or nothing when hidden.
    fn draw_cursor(&mut self, glyph: Option<[DVec2; 3]>);

    /// Composites cursor and drawing layers into the visible frame.
    fn present(&mut self);

    /// PNG of the drawing layer alone.
    fn export_png(&self) -> Result<Vec<u8>>;

    /// PNG of the last composited frame, cursor included.
    fn export_frame_png(&self) -> Result<Vec<u8>>;

    /// A blank adapter of the same kind, for off-screen replays.
    fn offscreen(&self, width: u32, height: u32) -> Result<Self>
    where
        Self: Sized;

    /// Remembers the drawing layer so a failed script can be undone.
    fn checkpoint(&mut self);

    /// Restores the drawing layer saved by the last [`checkpoint`](Self::checkpoint).
    fn rollback(&mut self);
}

/// One call received by a [`RecordingSurface`].
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceOp {
    Resize {
        width: u32,
        height: u32,
    },
    Clear,
    Stroke {
        segments: Vec<Segment>,
        color: Rgba,
        width: f64,
    },
    Text {
        text: String,
        font: FontSpec,
        color: Rgba,
        anchor: DVec2,
        transform: DAffine2,
    },
    Cursor(Option<[DVec2; 3]>),
    Present,
}

/// Headless adapter that records every call.
///
/// Used by tests and by batch runs that only need the call stream. PNG export
/// replays the recorded drawing onto a [`PixmapSurface`].
#[derive(Clone, Debug)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Vec<SurfaceOp>,
    saved: Option<usize>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
            saved: None,
        }
    }

    /// Every call since creation, oldest first.
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Calls that still affect the drawing layer (everything after the last clear or resize).
    pub fn drawing_ops(&self) -> &[SurfaceOp] {
        let start = self
            .ops
            .iter()
            .rposition(|op| matches!(op, SurfaceOp::Clear | SurfaceOp::Resize { .. }))
            .map_or(0, |i| i + 1);
        &self.ops[start..]
    }

    /// Segment lists of the strokes currently on the drawing layer.
    pub fn strokes(&self) -> Vec<&[Segment]> {
        self.drawing_ops()
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Stroke { segments, .. } => Some(segments.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// How many times the frame was recomposited.
    pub fn present_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Present))
            .count()
    }

    /// The most recent cursor layer contents, if any cursor call was made.
    pub fn last_cursor(&self) -> Option<Option<[DVec2; 3]>> {
        self.ops.iter().rev().find_map(|op| match op {
            SurfaceOp::Cursor(glyph) => Some(*glyph),
            _ => None,
        })
    }

    /// Replays the drawing layer (and optionally the cursor) onto a real raster.
    fn replay(&self, with_cursor: bool) -> Result<PixmapSurface> {
        let mut pixmap = PixmapSurface::new(self.width, self.height)?;
        for op in self.drawing_ops() {
            match op {
                SurfaceOp::Stroke {
                    segments,
                    color,
                    width,
                } => pixmap.stroke_segments(segments, *color, *width),
                SurfaceOp::Text {
                    text,
                    font,
                    color,
                    anchor,
                    transform,
                } => pixmap.fill_text(text, font, *color, *anchor, *transform),
                _ => {}
            }
        }
        if with_cursor {
            pixmap.draw_cursor(self.last_cursor().flatten());
        }
        pixmap.present();
        Ok(pixmap)
    }
}

impl RenderAdapter for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        self.saved = None;
        self.ops.push(SurfaceOp::Resize { width, height });
        Ok(())
    }

    fn clear(&mut self) {
        self.ops.push(SurfaceOp::Clear);
    }

    fn stroke_segments(&mut self, segments: &[Segment], color: Rgba, width: f64) {
        self.ops.push(SurfaceOp::Stroke {
            segments: segments.to_vec(),
            color,
            width,
        });
    }

    fn fill_text(
        &mut self,
        text: &str,
        font: &FontSpec,
        color: Rgba,
        anchor: DVec2,
        transform: DAffine2,
    ) {
        self.ops.push(SurfaceOp::Text {
            text: text.to_string(),
            font: font.clone(),
            color,
            anchor,
            transform,
        });
    }

    fn draw_cursor(&mut self, glyph: Option<[DVec2; 3]>) {
        self.ops.push(SurfaceOp::Cursor(glyph));
    }

    fn present(&mut self) {
        self.ops.push(SurfaceOp::Present);
    }

    fn export_png(&self) -> Result<Vec<u8>> {
        self.replay(false)?.export_png()
    }

    fn export_frame_png(&self) -> Result<Vec<u8>> {
        self.replay(true)?.export_frame_png()
    }

    fn offscreen(&self, width: u32, height: u32) -> Result<Self> {
        Ok(Self::new(width, height))
    }

    fn checkpoint(&mut self) {
        self.saved = Some(self.ops.len());
    }

    fn rollback(&mut self) {
        if let Some(len) = self.saved.take() {
            self.ops.truncate(len);
        }
    }
}

//! Geometry kernel: rectangle containment, segment/edge intersection and the
//! fixed transforms between turtle-space and raster space.
//!
//! Turtle-space has its origin at the center of the drawing area and its Y axis
//! pointing up. Raster space has its origin at the top-left corner and Y pointing
//! down. Nothing in this module holds state.

use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};

/// Intersections closer than this fraction to the start of the travel segment are
/// ignored, so a turtle sitting on an edge does not "cross" it again.
pub const MIN_ALONG: f64 = 0.01;

/// Intersections closer than this fraction to the end of the travel segment are ignored.
pub const MAX_ALONG: f64 = 0.99;

/// Width of the cursor triangle's base, in turtle units.
pub const CURSOR_WIDTH: f64 = 10.0;

/// Distance from the cursor's base to its apex, in turtle units.
pub const CURSOR_HEIGHT: f64 = 15.0;

/// Axis-aligned drawing area in turtle-space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    /// A `width` x `height` rectangle centered on the origin.
    pub fn centered(width: f64, height: f64) -> Self {
        let half = DVec2::new(width, height) / 2.0;
        Self {
            min: -half,
            max: half,
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// The two corners bounding `edge`.
    pub fn edge(&self, edge: Edge) -> (DVec2, DVec2) {
        let (min, max) = (self.min, self.max);
        match edge {
            Edge::Right => (DVec2::new(max.x, max.y), DVec2::new(max.x, min.y)),
            Edge::Left => (DVec2::new(min.x, max.y), DVec2::new(min.x, min.y)),
            Edge::Top => (DVec2::new(min.x, max.y), DVec2::new(max.x, max.y)),
            Edge::Bottom => (DVec2::new(min.x, min.y), DVec2::new(max.x, min.y)),
        }
    }

    pub fn contains(&self, p: DVec2) -> bool {
        point_in_rect(p, self)
    }
}

/// One side of the drawing area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Right,
    Left,
    Top,
    Bottom,
}

impl Edge {
    /// Order in which edges are tested for a crossing. Corner-adjacent moves
    /// resolve to the first edge in this list.
    pub const ALL: [Edge; 4] = [Edge::Right, Edge::Left, Edge::Top, Edge::Bottom];

    /// The edge a turtle re-enters from after leaving through `self`.
    pub fn opposite(self) -> Edge {
        match self {
            Edge::Right => Edge::Left,
            Edge::Left => Edge::Right,
            Edge::Top => Edge::Bottom,
            Edge::Bottom => Edge::Top,
        }
    }

    /// True for the left and right edges.
    pub fn is_vertical(self) -> bool {
        matches!(self, Edge::Right | Edge::Left)
    }
}

/// True iff `p` lies within the closed rectangle.
pub fn point_in_rect(p: DVec2, rect: &Bounds) -> bool {
    p.x >= rect.min.x && p.x <= rect.max.x && p.y >= rect.min.y && p.y <= rect.max.y
}

/// Intersection of segment `p1`-`p2` with segment `q1`-`q2`.
///
/// Returns `None` when the segments are parallel, when the crossing lies outside
/// `q1`-`q2`, or when it lies within [`MIN_ALONG`]/[`MAX_ALONG`] of either end of
/// `p1`-`p2`. Callers treat `None` as "try the next edge".
pub fn segment_intersect(p1: DVec2, p2: DVec2, q1: DVec2, q2: DVec2) -> Option<DVec2> {
    let d = (q2.y - q1.y) * (p2.x - p1.x) - (q2.x - q1.x) * (p2.y - p1.y);
    if d == 0.0 {
        return None;
    }

    let ua = ((q2.x - q1.x) * (p1.y - q1.y) - (q2.y - q1.y) * (p1.x - q1.x)) / d;
    let ub = ((p2.x - p1.x) * (p1.y - q1.y) - (p2.y - p1.y) * (p1.x - q1.x)) / d;

    // `contains` is false for NaN, which keeps garbage out of the result.
    if !(0.0..=1.0).contains(&ub) || !(MIN_ALONG..=MAX_ALONG).contains(&ua) {
        return None;
    }

    Some(p1 + (p2 - p1) * ua)
}

/// Mirror across the X axis.
fn flip_y() -> DAffine2 {
    DAffine2::from_scale(DVec2::new(1.0, -1.0))
}

/// Maps turtle-space onto a `width` x `height` raster (top-left origin, Y down).
pub fn turtle_to_raster(width: f64, height: f64) -> DAffine2 {
    DAffine2::from_translation(DVec2::new(width / 2.0, height / 2.0)) * flip_y()
}

/// Local transform for text anchored at `position`.
///
/// Undoes the display flip around the anchor so glyphs, which are laid out with Y
/// pointing down, come out upright. The heading is deliberately not an input.
pub fn upright_text_transform(position: DVec2) -> DAffine2 {
    DAffine2::from_translation(position) * flip_y() * DAffine2::from_translation(-position)
}

/// Unit vector of travel for a heading measured clockwise from "up": `(sin h, cos h)`.
pub fn heading_vector(heading: f64) -> DVec2 {
    let (sin, cos) = heading.sin_cos();
    DVec2::new(sin, cos)
}

/// Vertices of the cursor triangle: the two base corners, then the apex.
pub fn cursor_glyph(position: DVec2, heading: f64) -> [DVec2; 3] {
    let forward = heading_vector(heading);
    let across = forward.perp() * -(CURSOR_WIDTH / 2.0);
    [
        position - across,
        position + across,
        position + forward * CURSOR_HEIGHT,
    ]
}

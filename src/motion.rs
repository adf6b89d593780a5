//! Motion engine: splits one forward move into drawable segments, wrapping at the
//! drawing-area boundary when enabled.
//!
//! The work is a pure step function, [`try_advance`], driven in a loop by
//! [`trace_forward`]. Nothing here touches the renderer or turtle state; the engine
//! commits the returned end position and hands the segments over in one call.

use crate::error::{Result, TurtleError, ensure_finite};
use crate::geometry::{Bounds, Edge, heading_vector, segment_intersect};
use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Upper bound on loop iterations for a single forward move.
pub const MAX_WRAP_STEPS: usize = 100_000;

/// A straight stroke between two turtle-space points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: DVec2,
    pub end: DVec2,
}

impl Segment {
    pub fn new(start: DVec2, end: DVec2) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }
}

/// How a single step ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// The target was reachable directly (inside the area, or wrapping is off).
    Direct,
    /// The move left through this edge and continues from the opposite one.
    Wrapped(Edge),
    /// The target is outside but no edge reported a crossing; drawn directly.
    Fallback,
}

/// Result of one [`try_advance`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    /// The piece of the move drawn by this step.
    pub segment: Segment,
    /// Working position for the next step (re-entry point after a wrap).
    pub next: DVec2,
    /// Distance still to travel.
    pub remaining: f64,
    pub kind: StepKind,
}

/// Advances from `position` towards `remaining` units along `heading`, stopping at
/// the first boundary edge crossed (tested right, left, top, bottom).
pub fn try_advance(
    position: DVec2,
    heading: f64,
    remaining: f64,
    bounds: &Bounds,
    wrap: bool,
) -> Step {
    let direction = heading_vector(heading);
    let (sin, cos) = (direction.x, direction.y);
    let target = position + direction * remaining;
    let direct = |kind| Step {
        segment: Segment::new(position, target),
        next: target,
        remaining: 0.0,
        kind,
    };

    if !wrap || bounds.contains(target) {
        return direct(StepKind::Direct);
    }

    for edge in Edge::ALL {
        let (q1, q2) = bounds.edge(edge);
        if segment_intersect(position, target, q1, q2).is_none() {
            continue;
        }

        // The re-entry edge shares the transverse coordinate with the exit point.
        let (reentry, _) = bounds.edge(edge.opposite());
        let (cut, next, consumed) = if edge.is_vertical() {
            let consumed = ((q1.x - position.x) / sin).abs();
            let edge_y = cos * consumed + position.y;
            (
                DVec2::new(q1.x, edge_y),
                DVec2::new(reentry.x, edge_y),
                consumed,
            )
        } else {
            let consumed = ((q1.y - position.y) / cos).abs();
            let edge_x = sin * consumed + position.x;
            (
                DVec2::new(edge_x, q1.y),
                DVec2::new(edge_x, reentry.y),
                consumed,
            )
        };

        return Step {
            segment: Segment::new(position, cut),
            next,
            remaining: remaining - consumed,
            kind: StepKind::Wrapped(edge),
        };
    }

    direct(StepKind::Fallback)
}

/// Every segment produced by one forward move, plus where the turtle ends up.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TracedPath {
    pub segments: Vec<Segment>,
    pub end: DVec2,
}

impl TracedPath {
    /// Sum of all segment lengths.
    pub fn length(&self) -> f64 {
        self.segments.iter().map(Segment::length).sum()
    }
}

/// Traces a forward move of `distance` from `position`.
///
/// Non-positive distances produce no segments and leave the position unchanged.
/// Fails rather than returning a non-finite end position.
pub fn trace_forward(
    position: DVec2,
    heading: f64,
    distance: f64,
    bounds: &Bounds,
    wrap: bool,
) -> Result<TracedPath> {
    ensure_finite("distance", distance)?;
    ensure_finite("heading", heading)?;
    ensure_finite("position", position.x)?;
    ensure_finite("position", position.y)?;

    let mut segments = Vec::new();
    let mut current = position;
    let mut remaining = distance;

    while remaining > 0.0 {
        if segments.len() >= MAX_WRAP_STEPS {
            return Err(TurtleError::WrapLimitExceeded {
                steps: segments.len(),
            });
        }

        let step = try_advance(current, heading, remaining, bounds, wrap);
        ensure_finite("position", step.next.x)?;
        ensure_finite("position", step.next.y)?;
        ensure_finite("distance", step.remaining)?;
        trace!(?step.kind, from = ?current, to = ?step.segment.end, "advance");

        segments.push(step.segment);
        current = step.next;
        remaining = step.remaining;
    }

    Ok(TracedPath {
        segments,
        end: current,
    })
}

/// Re-centers `p` into `[min, max)` on both axes by Euclidean remainder.
pub fn wrap_position(p: DVec2, bounds: &Bounds) -> DVec2 {
    let wrap_axis = |v: f64, min: f64, extent: f64| {
        let r = (v - min).rem_euclid(extent);
        // rem_euclid can round up to `extent` for tiny negative inputs.
        if r >= extent { min } else { r + min }
    };
    DVec2::new(
        wrap_axis(p.x, bounds.min.x, bounds.width()),
        wrap_axis(p.y, bounds.min.y, bounds.height()),
    )
}

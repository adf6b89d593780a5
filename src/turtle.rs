//! Turtle state and the small value types it carries.

use crate::error::{Result, TurtleError};
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stroke color: 8-bit RGB channels plus an alpha in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 1.0,
    };

    /// Builds a color from unbounded script values, clamping every channel into range.
    pub fn clamped(r: f64, g: f64, b: f64, a: f64) -> Self {
        let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
            a: a.clamp(0.0, 1.0),
        }
    }

    /// Alpha as an 8-bit channel.
    pub fn alpha_u8(&self) -> u8 {
        (self.a * 255.0).round() as u8
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::BLACK
    }
}

/// A font request in the CSS shorthand the console accepts, e.g. `"bold 16px serif"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub size_px: f64,
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            size_px: 10.0,
            family: "sans-serif".to_string(),
            bold: false,
            italic: false,
        }
    }
}

impl FromStr for FontSpec {
    type Err = TurtleError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TurtleError::InvalidFont(s.to_string());
        let mut spec = FontSpec::default();
        let mut words = s.split_whitespace();
        let mut size = None;

        // Style keywords, then the size, then everything left is the family name.
        for word in words.by_ref() {
            match word {
                "bold" => spec.bold = true,
                "italic" | "oblique" => spec.italic = true,
                "normal" => {}
                _ => {
                    size = Some(word);
                    break;
                }
            }
        }

        let size = size.ok_or_else(invalid)?;
        let value = size.strip_suffix("px").unwrap_or(size);
        spec.size_px = value.parse::<f64>().map_err(|_| invalid())?;
        if !spec.size_px.is_finite() || spec.size_px <= 0.0 {
            return Err(invalid());
        }

        let family = words.collect::<Vec<_>>().join(" ");
        let family = family.trim_matches(|c| c == '"' || c == '\'');
        if family.is_empty() {
            return Err(invalid());
        }
        spec.family = family.to_string();
        Ok(spec)
    }
}

impl fmt::Display for FontSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bold {
            f.write_str("bold ")?;
        }
        if self.italic {
            f.write_str("italic ")?;
        }
        write!(f, "{}px {}", self.size_px, self.family)
    }
}

/// The state of the drawing turtle.
///
/// Position is in turtle-space (origin at the canvas center, Y up). Heading is in
/// radians, clockwise from "up", and is never normalized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurtleState {
    /// Current position of the pen tip.
    pub position: DVec2,

    /// Radians clockwise from the positive Y axis.
    pub heading: f64,

    /// Whether motion leaves a stroke.
    pub pen_down: bool,

    /// Line width as requested by the user.
    pub line_width: f64,

    /// `line_width` multiplied by the active render scale; this is what gets stroked.
    pub scaled_line_width: f64,

    /// Whether the cursor triangle is drawn.
    pub visible: bool,

    /// Recomposite after every command. Turn off for bulk drawing.
    pub redraw_on_move: bool,

    /// Toroidal wrapping at the drawing-area boundary.
    pub wrap: bool,

    pub stroke_color: Rgba,

    /// Font used by `write`.
    pub font: FontSpec,
}

impl Default for TurtleState {
    fn default() -> Self {
        Self {
            position: DVec2::ZERO,
            heading: 0.0,
            pen_down: true,
            line_width: 1.0,
            scaled_line_width: 1.0,
            visible: true,
            redraw_on_move: true,
            wrap: true,
            stroke_color: Rgba::BLACK,
            font: FontSpec::default(),
        }
    }
}

impl TurtleState {
    /// Default state for a canvas rendered at `scale`.
    pub fn with_scale(scale: f64) -> Self {
        Self {
            scaled_line_width: scale,
            ..Default::default()
        }
    }

    pub fn heading_degrees(&self) -> f64 {
        self.heading.to_degrees()
    }

    /// Rotates clockwise by `degrees` (negative turns left).
    pub fn turn(&mut self, degrees: f64) {
        self.heading += degrees.to_radians();
    }
}

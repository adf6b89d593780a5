//! # toroid-turtle
//!
//! An interactive turtle-graphics engine on a toroidal canvas. A turtle that walks
//! off one edge of the drawing area re-enters from the opposite edge and keeps
//! drawing, so every `forward` stroke is conserved in length however many times it
//! wraps.
//!
//! The engine is decoupled from pixels through [`RenderAdapter`]: [`PixmapSurface`]
//! rasterizes with tiny-skia, while [`RecordingSurface`] keeps a list of drawing
//! operations for tests and replay. On top of the engine sit a small console
//! language ([`Program`], [`ScriptInterpreter`]) and an interactive [`Session`]
//! that runs each submitted line in isolation.
//!
//! ```no_run
//! use toroid_turtle::{CanvasConfig, PixmapSurface, Session};
//!
//! let config = CanvasConfig::default();
//! let surface = PixmapSurface::new(config.width, config.height)?;
//! let mut session = Session::new(surface, config)?;
//! session.submit("repeat 36 [ forward 400 right 170 ]")?;
//! std::fs::write("star.png", session.export_png()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod motion;
pub mod raster;
pub mod render;
pub mod script;
pub mod turtle;

pub use config::*;
pub use console::*;
pub use engine::*;
pub use error::*;
pub use geometry::*;
pub use motion::*;
pub use raster::*;
pub use render::*;
pub use script::*;
pub use turtle::*;

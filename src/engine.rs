//! The command surface: every verb the console can issue, acting on one turtle.
//!
//! [`TurtleEngine`] owns the [`TurtleState`], the drawing [`Bounds`] and the
//! [`RenderAdapter`]. Commands run synchronously to completion; the only
//! re-entrant scheduling is [`TurtleEngine::animate`], driven by
//! [`TurtleEngine::tick`].

use crate::config::CanvasConfig;
use crate::error::{Result, TurtleError, ensure_finite};
use crate::geometry::{Bounds, cursor_glyph, upright_text_transform};
use crate::motion::{trace_forward, wrap_position};
use crate::render::RenderAdapter;
use crate::turtle::{FontSpec, Rgba, TurtleState};
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Backing-store size of a `width` x `height` drawing area at render `scale`.
pub(crate) fn scaled_size(width: u32, height: u32, scale: u32) -> Result<(u32, u32)> {
    match (width.checked_mul(scale), height.checked_mul(scale)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(TurtleError::InvalidScale(scale)),
    }
}

/// A periodic action registered with [`TurtleEngine::animate`].
pub type Action<R> = Box<dyn FnMut(&mut TurtleEngine<R>) -> Result<()>>;

/// Identifies a running animation so it can be cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimationHandle(pub u64);

struct Animation<R: RenderAdapter> {
    handle: AnimationHandle,
    interval: Duration,
    next_due: Instant,
    action: Action<R>,
}

/// What one [`TurtleEngine::tick`] did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Animations that ran successfully.
    pub ran: usize,
    /// Animations that failed; each was rolled back and cancelled.
    pub failed: Vec<(AnimationHandle, TurtleError)>,
}

/// State captured by [`TurtleEngine::checkpoint`].
struct Checkpoint {
    state: TurtleState,
    rng: StdRng,
    next_handle: u64,
}

/// A single turtle drawing onto a render adapter.
pub struct TurtleEngine<R: RenderAdapter> {
    state: TurtleState,
    surface: R,
    bounds: Bounds,
    width: u32,
    height: u32,
    scale: f64,
    default_font: FontSpec,
    seed: u64,
    rng: StdRng,
    animations: Vec<Animation<R>>,
    next_handle: u64,
    /// Handles taken out of `animations` while a tick runs them.
    ticking: Vec<AnimationHandle>,
    /// Handles cancelled while a tick was running them.
    cancelled: Vec<AnimationHandle>,
    saved: Option<Checkpoint>,
}

impl<R: RenderAdapter> TurtleEngine<R> {
    /// Creates an engine for the configured drawing area at render scale 1.
    pub fn new(surface: R, config: &CanvasConfig) -> Result<Self> {
        Self::with_scale(surface, config, 1)
    }

    /// Creates an engine whose backing store is `scale` times the configured size.
    ///
    /// The turtle still takes commands in unscaled units; distances, coordinates,
    /// widths and font sizes are multiplied on the way to the adapter.
    pub fn with_scale(mut surface: R, config: &CanvasConfig, scale: u32) -> Result<Self> {
        config.validate()?;
        if scale == 0 {
            return Err(TurtleError::InvalidScale(scale));
        }

        let (width, height) = scaled_size(config.width, config.height, scale)?;
        if surface.size() != (width, height) {
            surface.resize(width, height)?;
        }

        let seed = config.seed.unwrap_or_else(rand::random);
        let scale = scale as f64;
        let mut engine = Self {
            state: TurtleState::with_scale(scale),
            surface,
            bounds: Bounds::centered(width as f64, height as f64),
            width: config.width,
            height: config.height,
            scale,
            default_font: config.font_spec()?,
            seed,
            rng: StdRng::seed_from_u64(seed),
            animations: Vec::new(),
            next_handle: 1,
            ticking: Vec::new(),
            cancelled: Vec::new(),
            saved: None,
        };
        engine.reset();
        Ok(engine)
    }

    pub fn state(&self) -> &TurtleState {
        &self.state
    }

    /// Position in the units commands are given in (render scale removed).
    pub fn position(&self) -> DVec2 {
        self.state.position / self.scale
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn into_surface(self) -> R {
        self.surface
    }

    /// Drawing area in backing-store units.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Drawing area size as configured, before render scaling.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn render_scale(&self) -> f64 {
        self.scale
    }

    /// Seed the random generator is reset to.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    // --- motion ---

    /// Moves forward, drawing when the pen is down and wrapping when enabled.
    pub fn forward(&mut self, distance: f64) -> Result<()> {
        let distance = ensure_finite("distance", distance)? * self.scale;
        let path = trace_forward(
            self.state.position,
            self.state.heading,
            distance,
            &self.bounds,
            self.state.wrap,
        )?;
        debug!(
            distance,
            segments = path.segments.len(),
            end = ?path.end,
            "forward"
        );

        if self.state.pen_down && !path.segments.is_empty() {
            self.surface.stroke_segments(
                &path.segments,
                self.state.stroke_color,
                self.state.scaled_line_width,
            );
        }
        self.state.position = path.end;
        self.draw_if();
        Ok(())
    }

    /// Turns clockwise by `degrees`.
    pub fn turn_right(&mut self, degrees: f64) -> Result<()> {
        self.state.turn(ensure_finite("angle", degrees)?);
        self.draw_if();
        Ok(())
    }

    /// Turns counter-clockwise by `degrees`.
    pub fn turn_left(&mut self, degrees: f64) -> Result<()> {
        self.state.turn(-ensure_finite("angle", degrees)?);
        self.draw_if();
        Ok(())
    }

    /// Sets the heading in degrees clockwise from "up".
    pub fn set_heading(&mut self, degrees: f64) -> Result<()> {
        self.state.heading = ensure_finite("angle", degrees)?.to_radians();
        self.draw_if();
        Ok(())
    }

    /// Teleports without drawing. With wrapping on, the target is folded back into
    /// the drawing area.
    pub fn goto(&mut self, x: f64, y: f64) -> Result<()> {
        let target = DVec2::new(ensure_finite("x", x)?, ensure_finite("y", y)?) * self.scale;
        self.state.position = if self.state.wrap {
            wrap_position(target, &self.bounds)
        } else {
            target
        };
        self.draw_if();
        Ok(())
    }

    // --- pen and style ---

    pub fn pen_up(&mut self) {
        self.state.pen_down = false;
        self.draw_if();
    }

    pub fn pen_down(&mut self) {
        self.state.pen_down = true;
        self.draw_if();
    }

    pub fn set_width(&mut self, width: f64) -> Result<()> {
        if !width.is_finite() || width <= 0.0 {
            return Err(TurtleError::InvalidWidth(width));
        }
        self.state.line_width = width;
        self.state.scaled_line_width = width * self.scale;
        self.draw_if();
        Ok(())
    }

    /// Sets the stroke color; channels are clamped into `[0, 255]` and alpha into `[0, 1]`.
    pub fn set_color(&mut self, r: f64, g: f64, b: f64, a: f64) -> Result<()> {
        for (what, v) in [("red", r), ("green", g), ("blue", b), ("alpha", a)] {
            ensure_finite(what, v)?;
        }
        self.state.stroke_color = Rgba::clamped(r, g, b, a);
        self.draw_if();
        Ok(())
    }

    pub fn hide(&mut self) {
        self.state.visible = false;
        self.draw_if();
    }

    pub fn show(&mut self) {
        self.state.visible = true;
        self.draw_if();
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        self.state.wrap = wrap;
        self.draw_if();
    }

    /// Turning redraw back on immediately brings the display up to date.
    pub fn set_redraw_on_move(&mut self, redraw: bool) {
        self.state.redraw_on_move = redraw;
        self.draw_if();
    }

    // --- text ---

    /// Stamps `text` centered on the turtle, upright whatever the heading.
    pub fn write(&mut self, text: &str) {
        let mut font = self.state.font.clone();
        font.size_px *= self.scale;
        let anchor = self.state.position;
        self.surface.fill_text(
            text,
            &font,
            self.state.stroke_color,
            anchor,
            upright_text_transform(anchor),
        );
        self.draw_if();
    }

    /// Sets the font for `write` from CSS shorthand such as `"bold 16px serif"`.
    pub fn set_font(&mut self, spec: &str) -> Result<()> {
        self.state.font = spec.parse()?;
        self.draw_if();
        Ok(())
    }

    // --- whole-canvas operations ---

    /// Erases the drawing; the turtle stays where it is.
    pub fn clear_drawing(&mut self) {
        self.surface.clear();
        self.draw_if();
    }

    /// Restores every turtle default, reseeds `random` and clears the drawing.
    ///
    /// Running animations are left alone.
    pub fn reset(&mut self) {
        self.state = TurtleState {
            font: self.default_font.clone(),
            ..TurtleState::with_scale(self.scale)
        };
        self.rng = StdRng::seed_from_u64(self.seed);
        self.surface.clear();
        self.draw();
        info!(width = self.width, height = self.height, "turtle reset");
    }

    /// Changes the drawing-area size, which always resets the turtle.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(TurtleError::InvalidDimensions { width, height });
        }
        let (w, h) = scaled_size(width, height, self.scale as u32)?;
        self.surface.resize(w, h)?;
        self.bounds = Bounds::centered(w as f64, h as f64);
        self.width = width;
        self.height = height;
        self.saved = None;
        self.reset();
        Ok(())
    }

    /// Recomposites the display when redraw-on-move is enabled.
    fn draw_if(&mut self) {
        if self.state.redraw_on_move {
            self.draw();
        }
    }

    /// Redraws the cursor layer and recomposites.
    pub fn draw(&mut self) {
        let glyph = self
            .state
            .visible
            .then(|| cursor_glyph(self.state.position, self.state.heading));
        self.surface.draw_cursor(glyph);
        self.surface.present();
    }

    // --- combinators ---

    /// Runs `action` `times` times, stopping at the first error.
    pub fn repeat<F>(&mut self, times: usize, mut action: F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        for _ in 0..times {
            action(self)?;
        }
        Ok(())
    }

    /// Schedules `action` to run every `interval`, starting one interval from now.
    pub fn animate(&mut self, interval: Duration, action: Action<R>) -> AnimationHandle {
        let handle = AnimationHandle(self.next_handle);
        self.next_handle += 1;
        self.animations.push(Animation {
            handle,
            interval,
            next_due: Instant::now() + interval,
            action,
        });
        debug!(handle = handle.0, ?interval, "animation scheduled");
        handle
    }

    /// Stops an animation. Returns false if the handle is not running.
    pub fn cancel_animation(&mut self, handle: AnimationHandle) -> bool {
        let before = self.animations.len();
        self.animations.retain(|a| a.handle != handle);
        if self.animations.len() != before {
            return true;
        }
        if self.ticking.contains(&handle) && !self.cancelled.contains(&handle) {
            self.cancelled.push(handle);
            return true;
        }
        false
    }

    /// Stops every animation, including the one currently running.
    pub fn cancel_all_animations(&mut self) {
        self.animations.clear();
        self.cancelled.extend(self.ticking.iter().copied());
    }

    /// Handles of the animations still scheduled.
    pub fn animations(&self) -> Vec<AnimationHandle> {
        let mut handles: Vec<_> = self
            .animations
            .iter()
            .map(|a| a.handle)
            .chain(
                self.ticking
                    .iter()
                    .copied()
                    .filter(|h| !self.cancelled.contains(h)),
            )
            .collect();
        handles.sort();
        handles
    }

    /// Runs every animation that is due at `now`, each at most once.
    ///
    /// A failing animation has its effects rolled back and is cancelled; the
    /// others keep running.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let mut running = std::mem::take(&mut self.animations);
        self.ticking = running.iter().map(|a| a.handle).collect();

        for anim in &mut running {
            if now < anim.next_due || self.cancelled.contains(&anim.handle) {
                continue;
            }

            self.checkpoint();
            let outcome = (anim.action)(self);
            anim.next_due = now + anim.interval;
            match outcome {
                Ok(()) => report.ran += 1,
                Err(err) => {
                    self.rollback();
                    warn!(handle = anim.handle.0, %err, "animation failed and was stopped");
                    self.cancelled.push(anim.handle);
                    report.failed.push((anim.handle, err));
                }
            }
        }

        running.retain(|a| !self.cancelled.contains(&a.handle));
        // Animations started during this tick go after the existing ones.
        running.append(&mut self.animations);
        self.animations = running;
        self.ticking.clear();
        self.cancelled.clear();
        report
    }

    // --- misc ---

    /// Uniform integer in `[low, high]`; reversed bounds are swapped.
    pub fn random_int(&mut self, low: i64, high: i64) -> i64 {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        self.rng.gen_range(low..=high)
    }

    /// PNG of the drawing layer.
    pub fn export_png(&self) -> Result<Vec<u8>> {
        self.surface.export_png()
    }

    /// PNG of the composited frame, cursor included.
    pub fn export_frame_png(&self) -> Result<Vec<u8>> {
        self.surface.export_frame_png()
    }

    /// Remembers turtle state, drawing layer, random state and the animation set.
    pub fn checkpoint(&mut self) {
        self.saved = Some(Checkpoint {
            state: self.state.clone(),
            rng: self.rng.clone(),
            next_handle: self.next_handle,
        });
        self.surface.checkpoint();
    }

    /// Undoes everything since the last [`checkpoint`](Self::checkpoint).
    ///
    /// Animations started since then are cancelled.
    pub fn rollback(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        self.state = saved.state;
        self.rng = saved.rng;
        self.animations.retain(|a| a.handle.0 < saved.next_handle);
        self.surface.rollback();
        // The frame may still show what was just undone.
        self.draw();
    }
}

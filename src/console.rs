//! Console session: the definitions box, command submission, animation ticking and
//! replay-based export.
//!
//! Each submission is an isolated run. It is parsed in full first, then executed
//! under a checkpoint; if anything fails, turtle state, drawing, random state and
//! any animations it started are rolled back and the error is returned.

use crate::config::CanvasConfig;
use crate::engine::{AnimationHandle, TickReport, TurtleEngine, scaled_size};
use crate::error::{Result, TurtleError};
use crate::render::RenderAdapter;
use crate::script::{Program, ScriptInterpreter};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One interactive drawing session.
pub struct Session<R: RenderAdapter + 'static> {
    engine: TurtleEngine<R>,
    config: CanvasConfig,
    definitions: String,
    definitions_program: Program,
    /// Procedures defined by earlier command lines.
    interpreter: ScriptInterpreter,
    /// Command lines that ran successfully, in order. Replaying them after a
    /// reset reproduces the drawing.
    history: Vec<String>,
}

impl<R: RenderAdapter + 'static> Session<R> {
    pub fn new(surface: R, config: CanvasConfig) -> Result<Self> {
        let engine = TurtleEngine::new(surface, &config)?;
        // Pin the seed so replays draw the same random picture.
        let config = CanvasConfig {
            seed: Some(engine.seed()),
            ..config
        };
        Ok(Self {
            engine,
            config,
            definitions: String::new(),
            definitions_program: Program::default(),
            interpreter: ScriptInterpreter::new(),
            history: Vec::new(),
        })
    }

    pub fn engine(&self) -> &TurtleEngine<R> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TurtleEngine<R> {
        &mut self.engine
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn definitions(&self) -> &str {
        &self.definitions
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Replaces the definitions text. Invalid text is rejected and the old
    /// definitions stay in effect.
    pub fn set_definitions(&mut self, text: &str) -> Result<()> {
        self.definitions_program = Program::parse(text)?;
        self.definitions = text.to_string();
        debug!(
            procedures = self.definitions_program.procedures.len(),
            "definitions updated"
        );
        Ok(())
    }

    /// Runs the definitions, then `line`. Returns handles of animations started.
    pub fn submit(&mut self, line: &str) -> Result<Vec<AnimationHandle>> {
        let program = Program::parse(line)?;

        self.engine.checkpoint();
        let saved = self.interpreter.clone();
        match run_line(
            &mut self.engine,
            &mut self.interpreter,
            &self.definitions_program,
            &program,
        ) {
            Ok(started) => {
                if !program.is_empty() {
                    self.history.push(line.to_string());
                }
                Ok(started)
            }
            Err(err) => {
                self.engine.rollback();
                self.interpreter = saved;
                warn!(%err, "command failed, state rolled back");
                Err(err)
            }
        }
    }

    /// Drives animations; call this regularly from the event loop.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.engine.tick(now)
    }

    /// Resets the turtle and replays every recorded command on the live canvas.
    ///
    /// If a line fails, for instance because the definitions changed since it
    /// was submitted, the canvas, turtle and running animations are left as they
    /// were before the replay.
    pub fn replay(&mut self) -> Result<()> {
        let running = self.engine.animations();
        self.engine.checkpoint();
        let mut interpreter = ScriptInterpreter::new();
        self.engine.reset();

        let replayed = self.history.iter().try_for_each(|line| {
            let program = Program::parse(line)?;
            run_line(
                &mut self.engine,
                &mut interpreter,
                &self.definitions_program,
                &program,
            )
            .map(drop)
        });

        match replayed {
            Ok(()) => {
                for handle in running {
                    self.engine.cancel_animation(handle);
                }
                self.interpreter = interpreter;
                Ok(())
            }
            Err(err) => {
                self.engine.rollback();
                warn!(%err, "replay failed, canvas restored");
                Err(err)
            }
        }
    }

    /// PNG of the live drawing layer.
    pub fn export_png(&self) -> Result<Vec<u8>> {
        self.engine.export_png()
    }

    /// PNG of the live frame, cursor included.
    pub fn export_frame_png(&self) -> Result<Vec<u8>> {
        self.engine.export_frame_png()
    }

    /// Replays the session on an off-screen canvas `scale` times larger and
    /// exports that. The visible canvas is not touched.
    pub fn export_high_res(&self, scale: u32) -> Result<Vec<u8>> {
        if scale == 0 {
            return Err(TurtleError::InvalidScale(scale));
        }
        let (width, height) = self.engine.size();
        let (scaled_width, scaled_height) = scaled_size(width, height, scale)?;
        let surface = self
            .engine
            .surface()
            .offscreen(scaled_width, scaled_height)?;
        let config = CanvasConfig {
            width,
            height,
            ..self.config.clone()
        };
        let mut offscreen = TurtleEngine::with_scale(surface, &config, scale)?;
        offscreen.set_redraw_on_move(false);

        let mut interpreter = ScriptInterpreter::new();
        for line in &self.history {
            let program = Program::parse(line)?;
            run_line(
                &mut offscreen,
                &mut interpreter,
                &self.definitions_program,
                &program,
            )?;
        }
        info!(scale, lines = self.history.len(), "high resolution export");
        offscreen.export_png()
    }

    /// Changes the canvas size. This resets the turtle, stops all animations and
    /// forgets the history.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.engine.resize(width, height)?;
        self.engine.cancel_all_animations();
        self.config.width = width;
        self.config.height = height;
        self.history.clear();
        self.interpreter = ScriptInterpreter::new();
        Ok(())
    }
}

/// Runs the definitions program and then `program`.
fn run_line<R: RenderAdapter + 'static>(
    engine: &mut TurtleEngine<R>,
    interpreter: &mut ScriptInterpreter,
    definitions: &Program,
    program: &Program,
) -> Result<Vec<AnimationHandle>> {
    let mut started = interpreter.run(engine, definitions)?;
    started.extend(interpreter.run(engine, program)?);
    Ok(started)
}

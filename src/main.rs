//! Command-line front end.
//!
//! With `--script` the script runs once and the drawing is written to `--output`.
//! Without it, lines are read from stdin and submitted to a live session while
//! animations keep ticking; lines starting with `:` are console commands.

use anyhow::{Context, bail};
use clap::Parser;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use toroid_turtle::{CanvasConfig, PixmapSurface, Session};
use tracing::{error, info};

const TICK: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "toroid-turtle", version, about = "Turtle graphics on a wrapping canvas")]
struct Args {
    /// Canvas config file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Canvas width in pixels, overrides the config
    #[arg(long)]
    width: Option<u32>,

    /// Canvas height in pixels, overrides the config
    #[arg(long)]
    height: Option<u32>,

    /// Seed for `random`, overrides the config
    #[arg(long)]
    seed: Option<u64>,

    /// Multiplier for the high-resolution export
    #[arg(long)]
    scale: Option<u32>,

    /// Procedure definitions run before every command
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Run this script once instead of reading commands from stdin
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Where the drawing is written in script mode
    #[arg(short, long, default_value = "turtle.png")]
    output: PathBuf,

    /// Also write a high-resolution export in script mode
    #[arg(long)]
    hires: Option<PathBuf>,
}

fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the console, logs go to stderr.
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

fn load_config(args: &Args) -> anyhow::Result<CanvasConfig> {
    let mut config = match &args.config {
        Some(path) => CanvasConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CanvasConfig::default(),
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(scale) = args.scale {
        config.export_scale = scale;
    }
    config.validate()?;
    Ok(config)
}

fn write_png(path: &Path, png: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, png).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "image written");
    Ok(())
}

fn run_script(
    session: &mut Session<PixmapSurface>,
    script: &Path,
    args: &Args,
) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("reading script {}", script.display()))?;
    session.submit(&source)?;
    write_png(&args.output, &session.export_png()?)?;
    if let Some(hires) = &args.hires {
        let scale = session.config().export_scale;
        write_png(hires, &session.export_high_res(scale)?)?;
    }
    Ok(())
}

const HELP: &str = "\
Commands are turtle script, for example `repeat 4 [ forward 50 right 90 ]`.
Console commands:
  :defs FILE           load procedure definitions
  :export FILE         write the drawing as PNG
  :frame FILE          write the drawing with the cursor as PNG
  :hires FILE [SCALE]  write a high-resolution PNG
  :resize W H          resize the canvas (clears it)
  :replay              redraw from history
  :state               print the turtle state
  :help                this text
  :quit                leave";

/// Outcome of one console command.
enum Console {
    Continue,
    Quit,
}

fn console_command(session: &mut Session<PixmapSurface>, line: &str) -> anyhow::Result<Console> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(Console::Continue);
    };
    let rest: Vec<&str> = words.collect();
    let path = |i: usize| -> anyhow::Result<PathBuf> {
        rest.get(i)
            .map(PathBuf::from)
            .with_context(|| format!("{name} needs a file name"))
    };

    match name {
        ":defs" => {
            let file = path(0)?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            session.set_definitions(&text)?;
        }
        ":export" => write_png(&path(0)?, &session.export_png()?)?,
        ":frame" => write_png(&path(0)?, &session.export_frame_png()?)?,
        ":hires" => {
            let scale = match rest.get(1) {
                Some(s) => s.parse().context("scale must be a positive integer")?,
                None => session.config().export_scale,
            };
            write_png(&path(0)?, &session.export_high_res(scale)?)?;
        }
        ":resize" => {
            let (Some(w), Some(h)) = (rest.first(), rest.get(1)) else {
                bail!(":resize needs a width and a height");
            };
            session.resize(w.parse()?, h.parse()?)?;
        }
        ":replay" => session.replay()?,
        ":state" => {
            let state = session.engine().state();
            println!(
                "position {:.2} {:.2}  heading {:.2}  pen {}  wrap {}",
                session.engine().position().x,
                session.engine().position().y,
                state.heading_degrees(),
                if state.pen_down { "down" } else { "up" },
                if state.wrap { "on" } else { "off" },
            );
        }
        ":help" => println!("{HELP}"),
        ":quit" | ":q" => return Ok(Console::Quit),
        other => bail!("unknown console command {other}, try :help"),
    }
    Ok(Console::Continue)
}

fn interactive(session: &mut Session<PixmapSurface>) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("toroid-turtle, :help for commands");
    loop {
        match rx.recv_timeout(TICK) {
            Ok(line) => {
                let line = line.trim();
                if line.starts_with(':') {
                    match console_command(session, line) {
                        Ok(Console::Quit) => break,
                        Ok(Console::Continue) => {}
                        Err(e) => error!("{e:#}"),
                    }
                } else if !line.is_empty() {
                    match session.submit(line) {
                        Ok(started) => {
                            for handle in started {
                                println!("animation {}", handle.0);
                            }
                        }
                        Err(e) => error!("{e}"),
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        for (handle, err) in session.tick(Instant::now()).failed {
            error!(handle = handle.0, "animation stopped: {err}");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let args = Args::parse();
    let config = load_config(&args)?;

    let surface = PixmapSurface::new(config.width, config.height)?;
    let mut session = Session::new(surface, config)?;
    if let Some(path) = &args.definitions {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading definitions {}", path.display()))?;
        session.set_definitions(&text)?;
    }

    match &args.script {
        Some(script) => run_script(&mut session, script, &args),
        None => interactive(&mut session),
    }
}

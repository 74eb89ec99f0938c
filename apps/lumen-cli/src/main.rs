use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use glam::{Mat4, Vec2};
use lumen_common::log::CLIENT;
use lumen_input::{InputState, KeyCode, ManualClock};
use lumen_render::{Camera, CameraController, ControllerConfig};
use lumen_render_gl::{HeadlessGl, ShaderRegistry};

#[derive(Parser)]
#[command(name = "lumen-cli", about = "CLI tool for lumen camera and shader operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Fly the camera through a scripted sequence of frames
    Fly {
        /// Number of frames to simulate
        #[arg(short, long, default_value = "60")]
        frames: u32,
        /// Seconds between frames
        #[arg(long, default_value = "0.016")]
        dt: f64,
        /// Keys held for the whole flight, e.g. `w,a,space` or `KeyW,ShiftLeft`
        #[arg(short, long, value_delimiter = ',')]
        keys: Vec<String>,
        /// Cursor movement per frame while the look button is held, as `DX,DY`
        #[arg(long, value_parser = parse_vec2, allow_hyphen_values = true)]
        drag: Option<Vec2>,
        /// Controller tuning as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Compile a vertex/fragment pair on the headless driver
    CheckShader {
        #[arg(long)]
        vertex: PathBuf,
        #[arg(long)]
        fragment: PathBuf,
        /// Registry name for the program
        #[arg(short, long, default_value = "shader")]
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    lumen_common::log::init(cli.verbose);

    match cli.command {
        Commands::Info => {
            println!("lumen-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", lumen_common::crate_info());
            println!("input: {}", lumen_input::crate_info());
            println!("render: {}", lumen_render::crate_info());
            println!("render-gl: {}", lumen_render_gl::crate_info());
        }
        Commands::Fly {
            frames,
            dt,
            keys,
            drag,
            config,
        } => {
            let config = match config {
                Some(path) => ControllerConfig::load(&path)
                    .with_context(|| format!("loading controller config {}", path.display()))?,
                None => ControllerConfig::default(),
            };
            let keys = keys
                .iter()
                .map(|name| parse_key(name))
                .collect::<anyhow::Result<Vec<_>>>()?;
            fly(frames, dt, &keys, drag, config);
        }
        Commands::CheckShader {
            vertex,
            fragment,
            name,
        } => check_shader(&vertex, &fragment, &name)?,
    }

    Ok(())
}

fn fly(frames: u32, dt: f64, keys: &[KeyCode], drag: Option<Vec2>, config: ControllerConfig) {
    println!("Fly: frames={frames}, dt={dt}, keys={keys:?}, drag={drag:?}");

    let clock = ManualClock::new();
    let look_button = config.look_button;
    let mut controller = CameraController::with_clock(Camera::default(), config, &clock);

    let mut input = InputState::new();
    for key in keys {
        input.set_key(*key, true);
    }
    if drag.is_some() {
        input.set_mouse_button(look_button, true);
    }

    let mut cursor = Vec2::ZERO;
    let mut elapsed = 0.0;
    for frame in 0..frames {
        if frame > 0 {
            clock.advance(dt);
        }
        if let Some(step) = drag.filter(|_| frame > 0) {
            cursor += step;
        }
        input.set_cursor_position(cursor);
        elapsed += controller.on_update(&input);
    }
    tracing::info!(target: CLIENT, frames, elapsed, "flight finished");

    let camera = controller.camera();
    let position = camera.position();
    let forward = camera.forward();
    println!(
        "Position: ({:.3}, {:.3}, {:.3})",
        position.x, position.y, position.z
    );
    println!(
        "Forward: ({:.3}, {:.3}, {:.3})",
        forward.x, forward.y, forward.z
    );
    println!("Yaw: {:.3}, Pitch: {:.3}", camera.yaw(), camera.pitch());
    print_matrix("View", camera.view_matrix());
    print_matrix("Projection", camera.projection_matrix());
    print_matrix("ViewProjection", camera.view_projection_matrix());
}

fn check_shader(vertex: &Path, fragment: &Path, name: &str) -> anyhow::Result<()> {
    let gl = Rc::new(HeadlessGl::new());
    let mut registry = ShaderRegistry::new(gl.clone());

    let program = registry
        .create_shader(vertex, fragment, name)
        .with_context(|| format!("shader '{name}' failed to build"))?;

    println!("Shader '{name}': OK");
    let uniforms = gl.active_uniforms(program.handle());
    if uniforms.is_empty() {
        println!("No active uniforms");
    }
    for uniform in uniforms {
        match uniform.array_len {
            Some(len) => println!("  {} {}[{len}]", uniform.kind.glsl_name(), uniform.name),
            None => println!("  {} {}", uniform.kind.glsl_name(), uniform.name),
        }
    }
    Ok(())
}

fn print_matrix(label: &str, m: Mat4) {
    println!("{label}:");
    // Row-major for reading; glam stores columns.
    for row in 0..4 {
        let r = m.row(row);
        println!("  [{:9.4} {:9.4} {:9.4} {:9.4}]", r.x, r.y, r.z, r.w);
    }
}

/// Accept short names (`w`, `space`, `shift`, `up`) or winit key code names (`KeyW`).
fn parse_key(name: &str) -> anyhow::Result<KeyCode> {
    let lower = name.to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "space" => "Space".to_owned(),
        "shift" | "lshift" => "ShiftLeft".to_owned(),
        "rshift" => "ShiftRight".to_owned(),
        "ctrl" | "control" => "ControlLeft".to_owned(),
        "up" => "ArrowUp".to_owned(),
        "down" => "ArrowDown".to_owned(),
        "left" => "ArrowLeft".to_owned(),
        "right" => "ArrowRight".to_owned(),
        s if s.len() == 1 && s.chars().all(|c| c.is_ascii_alphabetic()) => {
            format!("Key{}", s.to_ascii_uppercase())
        }
        s if s.len() == 1 && s.chars().all(|c| c.is_ascii_digit()) => format!("Digit{s}"),
        _ => name.to_owned(),
    };
    match serde_json::from_value(serde_json::Value::String(canonical)) {
        Ok(key) => Ok(key),
        Err(_) => bail!("unknown key '{name}'"),
    }
}

fn parse_vec2(s: &str) -> Result<Vec2, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected DX,DY, got '{s}'"))?;
    let x = x.trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f32>().map_err(|e| e.to_string())?;
    Ok(Vec2::new(x, y))
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use editor::{Editor, EditorConfig, KeyframeState};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod script;

use script::{RunReport, Script};

#[derive(Parser, Debug)]
#[command(name = "flipbook-cli", version, about = "Headless driver for the flipbook editor")]
struct Cli {
    /// Editor settings (JSON). Overrides the script's own `config` block.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a script and print the resulting timeline as JSON.
    Run {
        script: PathBuf,
        /// Write one composited PNG per frame into this directory.
        #[arg(long, value_name = "DIR")]
        export_dir: Option<PathBuf>,
    },
    /// Replay a script, then play the timeline from the active frame.
    Play {
        script: PathBuf,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long = "loop")]
        looping: bool,
        /// Stop a looping run after this many milliseconds.
        #[arg(long, default_value_t = 2000)]
        duration_ms: u64,
    },
    /// Print the default editor settings.
    Defaults,
}

#[derive(Serialize)]
struct LayerSummary {
    name: String,
    level: usize,
    opacity: f32,
    hidden: bool,
    locked: bool,
    keyframes: Vec<KeyframeState>,
}

#[derive(Serialize)]
struct Summary {
    report: RunReport,
    timeline_length: usize,
    current_frame: usize,
    selected: String,
    undo_depth: usize,
    redo_depth: usize,
    layers: Vec<LayerSummary>,
}

fn summarize(editor: &Editor, report: RunReport) -> Summary {
    let mut layers: Vec<LayerSummary> = editor
        .layers()
        .iter()
        .map(|l| LayerSummary {
            name: l.name.clone(),
            level: l.level(),
            opacity: l.settings.opacity,
            hidden: l.settings.hidden,
            locked: l.settings.locked,
            keyframes: l.keyframes.iter().map(|k| k.state).collect(),
        })
        .collect();
    layers.sort_by_key(|l| l.level);
    let selected = editor.layer(editor.selected_layer()).map(|l| l.name.clone()).unwrap_or_default();
    Summary {
        report,
        timeline_length: editor.timeline_length(),
        current_frame: editor.current_frame(),
        selected,
        undo_depth: editor.history().undo_stack().len(),
        redo_depth: editor.history().redo_stack().len(),
        layers,
    }
}

fn load_session(script_path: &Path, config_path: Option<&Path>) -> Result<(Editor, RunReport)> {
    let text = std::fs::read_to_string(script_path).with_context(|| format!("reading script {}", script_path.display()))?;
    let script: Script = serde_json::from_str(&text).with_context(|| format!("parsing script {}", script_path.display()))?;
    let config = match config_path {
        Some(path) => EditorConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => script.config.clone().unwrap_or_default(),
    };
    let mut editor = Editor::new(config);
    for layer in editor.layers().iter().map(|l| l.id).collect::<Vec<_>>() {
        editor.create_surface(layer);
    }
    let report = script::run(&mut editor, &script.actions)?;
    if !editor.flush_classifications(Duration::from_secs(10)) {
        tracing::warn!("{} classifications still pending", editor.pending_classifications());
    }
    Ok((editor, report))
}

fn export_frames(editor: &mut Editor, dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let frames = editor.timeline_length();
    for frame in 0..frames {
        let path = dir.join(format!("frame_{frame:04}.png"));
        editor.composite(frame).save(&path).with_context(|| format!("writing {}", path.display()))?;
    }
    tracing::info!("exported {frames} frames to {}", dir.display());
    Ok(frames)
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { script, export_dir } => {
            let (mut editor, report) = load_session(&script, cli.config.as_deref())?;
            if let Some(dir) = export_dir {
                export_frames(&mut editor, &dir)?;
            }
            println!("{}", serde_json::to_string_pretty(&summarize(&editor, report))?);
        }
        Command::Play { script, fps, looping, duration_ms } => {
            let (mut editor, report) = load_session(&script, cli.config.as_deref())?;
            if let Some(fps) = fps {
                editor.set_frame_rate(fps);
            }
            editor.set_looping(looping);
            let limit = looping.then(|| Duration::from_millis(duration_ms));
            if !script::play_blocking(&mut editor, limit) {
                anyhow::bail!("playback could not start");
            }
            println!("{}", serde_json::to_string_pretty(&summarize(&editor, report))?);
        }
        Command::Defaults => {
            let config = match cli.config {
                Some(path) => EditorConfig::load(&path).with_context(|| format!("loading config {}", path.display()))?,
                None => EditorConfig::default(),
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

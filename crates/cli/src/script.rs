use std::time::Duration;

use anyhow::{anyhow, Result};
use editor::{Direction, Editor, EditorConfig, FrameFill, LayerId, Point, Shortcut, Tool};
use serde::{Deserialize, Serialize};

/// A scripted editing session: optional config overrides plus the actions to replay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub config: Option<EditorConfig>,
    pub actions: Vec<Action>,
}

/// One editor interaction. Layers are addressed by display name; omitted means the selected layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    NewLayer { name: Option<String> },
    DeleteLayer { layer: Option<String> },
    RenameLayer { layer: Option<String>, to: String },
    SelectLayer { layer: String },
    SetOpacity { layer: Option<String>, value: f32 },
    SetHidden { layer: Option<String>, hidden: bool },
    SetLocked { layer: Option<String>, locked: bool },
    Reorder { layer: Option<String>, direction: Direction },
    AppendFrame { layer: Option<String>, #[serde(default)] fill: FrameFill },
    SetFrame { frame: usize },
    Tool { tool: Option<Tool>, color: Option<String>, size: Option<u32> },
    /// Pointer-down at the first point, a move through each following point, then pointer-up
    /// (or pointer-leave when `leave` is set).
    Stroke { layer: Option<String>, points: Vec<[f32; 2]>, #[serde(default)] leave: bool },
    Undo,
    Redo,
    Key { shortcut: Shortcut },
    OnionSkin { enabled: bool },
    FrameRate { fps: u32 },
    Looping { enabled: bool },
    /// Plays from the active frame. Looping runs are stopped after `for_ms`.
    Play { for_ms: Option<u64> },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub applied: usize,
    pub rejected: usize,
}

fn resolve(editor: &Editor, layer: Option<&str>) -> Result<LayerId> {
    match layer {
        None => Ok(editor.selected_layer()),
        Some(name) => editor.layer_by_name(name).ok_or_else(|| anyhow!("no layer named '{name}'")),
    }
}

fn ensure_surface(editor: &mut Editor, layer: LayerId) {
    if editor.surfaces().get(layer).is_none() {
        editor.create_surface(layer);
    }
}

fn stroke(editor: &mut Editor, layer: LayerId, points: &[[f32; 2]], leave: bool) -> bool {
    let Some((first, rest)) = points.split_first() else { return false };
    ensure_surface(editor, layer);
    if !editor.pointer_down(layer, Point::new(first[0], first[1])) {
        return false;
    }
    for p in rest {
        editor.pointer_move(layer, Point::new(p[0], p[1]));
    }
    if leave { editor.pointer_leave(layer) } else { editor.pointer_up(layer) }
}

/// Plays and blocks until the run ends on its own or `limit` passes.
pub fn play_blocking(editor: &mut Editor, limit: Option<Duration>) -> bool {
    if !editor.play() {
        return false;
    }
    if let Some(limit) = limit {
        let deadline = std::time::Instant::now() + limit;
        while editor.is_playing() && std::time::Instant::now() < deadline {
            editor.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        editor.stop();
    }
    editor.wait_for_playback();
    true
}

pub fn apply(editor: &mut Editor, action: &Action) -> Result<bool> {
    let accepted = match action {
        Action::NewLayer { name } => {
            let id = match name {
                Some(name) => editor.add_layer(name),
                None => editor.new_layer(),
            };
            if let Some(id) = id {
                ensure_surface(editor, id);
            }
            id.is_some()
        }
        Action::DeleteLayer { layer } => {
            let id = resolve(editor, layer.as_deref())?;
            editor.delete_layer(id)
        }
        Action::RenameLayer { layer, to } => {
            let id = resolve(editor, layer.as_deref())?;
            editor.rename_layer(id, to)
        }
        Action::SelectLayer { layer } => {
            let id = resolve(editor, Some(layer))?;
            editor.select_layer(id)
        }
        Action::SetOpacity { layer, value } => {
            let id = resolve(editor, layer.as_deref())?;
            editor.set_opacity(id, *value)
        }
        Action::SetHidden { layer, hidden } => {
            let id = resolve(editor, layer.as_deref())?;
            editor.set_hidden(id, *hidden)
        }
        Action::SetLocked { layer, locked } => {
            let id = resolve(editor, layer.as_deref())?;
            editor.set_locked(id, *locked)
        }
        Action::Reorder { layer, direction } => {
            let id = resolve(editor, layer.as_deref())?;
            editor.reorder(id, *direction)
        }
        Action::AppendFrame { layer, fill } => {
            let id = resolve(editor, layer.as_deref())?;
            editor.append_frame(id, *fill).is_some()
        }
        Action::SetFrame { frame } => editor.set_current_frame(*frame) == *frame,
        Action::Tool { tool, color, size } => {
            if let Some(tool) = tool {
                editor.set_tool(*tool);
            }
            if let Some(size) = size {
                editor.set_brush_size(*size);
            }
            color.as_deref().map_or(true, |c| editor.set_color(c))
        }
        Action::Stroke { layer, points, leave } => {
            let id = resolve(editor, layer.as_deref())?;
            stroke(editor, id, points, *leave)
        }
        Action::Undo => editor.undo(),
        Action::Redo => editor.redo(),
        Action::Key { shortcut } => editor.handle_shortcut(*shortcut),
        Action::OnionSkin { enabled } => {
            editor.set_onion_skin(*enabled);
            true
        }
        Action::FrameRate { fps } => {
            editor.set_frame_rate(*fps);
            true
        }
        Action::Looping { enabled } => {
            editor.set_looping(*enabled);
            true
        }
        Action::Play { for_ms } => play_blocking(editor, for_ms.map(Duration::from_millis)),
    };
    Ok(accepted)
}

/// Replays every action in order. Rejected actions are counted, unknown layer names abort.
pub fn run(editor: &mut Editor, actions: &[Action]) -> Result<RunReport> {
    let mut report = RunReport::default();
    for (idx, action) in actions.iter().enumerate() {
        if apply(editor, action).map_err(|e| e.context(format!("action #{idx}")))? {
            report.applied += 1;
        } else {
            tracing::warn!("action #{idx} rejected: {action:?}");
            report.rejected += 1;
        }
        editor.poll();
    }
    Ok(report)
}

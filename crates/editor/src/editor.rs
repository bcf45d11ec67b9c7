use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jobs::{JobEvent, JobSpec, JobStatus, JobsHandle, JobsRuntime};
use parking_lot::Mutex;
use renderer::{BitmapCache, Point, RgbaImage, Surface};
use serde::{Deserialize, Serialize};
use timeline::{
    ActionKind, Bitmap, Direction, Frame, FrameFill, History, KeyframeId, KeyframeState, Layer, LayerId, TimelineError,
    TimelineStore,
};

use crate::drawing::{DrawingSession, GestureState};
use crate::playback::{PlayState, Playback, PlaybackEvent, PlaybackSettings};
use crate::{EditorConfig, SurfaceHandle, SurfaceRegistry, Tool, ToolSettings};

const ONION_SKIN_OPACITY: f32 = 0.3;

/// Global keyboard commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shortcut {
    NewBlankFrame,
    Undo,
    Redo,
    TogglePlayback,
}

/// Latest classification request per keyframe.
struct PendingClassification {
    job: String,
    bitmap: Bitmap,
}

pub struct Editor {
    config: EditorConfig,
    store: TimelineStore,
    history: History,
    surfaces: SurfaceRegistry,
    // surfaces of removed layers, re-registered if undo/redo brings the layer back
    parked: HashMap<LayerId, SurfaceHandle>,
    sessions: HashMap<LayerId, DrawingSession>,
    tools: ToolSettings,
    cache: BitmapCache,
    jobs: JobsHandle,
    pending: HashMap<KeyframeId, PendingClassification>,
    verdicts: HashMap<KeyframeId, (Bitmap, KeyframeState)>,
    playback: Playback,
    // set by play(), cleared only once the run's Stopped event is applied
    playing: bool,
    onion_skin: bool,
    // onion flag to restore once playback stops
    onion_restore: Option<bool>,
}

impl Default for Editor {
    fn default() -> Self { Self::new(EditorConfig::default()) }
}

fn rejected<T>(op: &str, result: Result<T, TimelineError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::debug!("{op} rejected: {err}");
            None
        }
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let store = TimelineStore::new();
        let history = History::new(store.capture(None));
        let settings = Arc::new(PlaybackSettings::new(config.frame_rate, config.looping));
        Self {
            tools: ToolSettings::new(&config.color, config.brush_size),
            cache: BitmapCache::new(config.cache_capacity),
            jobs: JobsRuntime::start(config.workers),
            playback: Playback::new(settings),
            playing: false,
            onion_skin: config.onion_skin,
            onion_restore: None,
            store,
            history,
            surfaces: SurfaceRegistry::new(),
            parked: HashMap::new(),
            sessions: HashMap::new(),
            pending: HashMap::new(),
            verdicts: HashMap::new(),
            config,
        }
    }

    // ---- read accessors ----

    pub fn config(&self) -> &EditorConfig { &self.config }
    pub fn store(&self) -> &TimelineStore { &self.store }
    pub fn history(&self) -> &History { &self.history }
    pub fn layers(&self) -> &[Arc<Layer>] { self.store.layers() }
    pub fn layer(&self, id: LayerId) -> Option<&Layer> { self.store.layer(id) }
    pub fn selected_layer(&self) -> LayerId { self.store.selected() }
    pub fn current_frame(&self) -> Frame { self.store.current_frame() }
    pub fn timeline_length(&self) -> usize { self.store.timeline_length() }
    pub fn play_state(&self) -> PlayState { self.playback.state() }
    /// True from a successful [`play`](Self::play) until its `Stopped` event has been applied.
    pub fn is_playing(&self) -> bool { self.playing }
    pub fn looping(&self) -> bool { self.playback.settings().looping() }
    pub fn frame_rate(&self) -> u32 { self.playback.settings().frame_rate() }
    pub fn onion_skin(&self) -> bool { self.onion_skin }
    pub fn tools(&self) -> &ToolSettings { &self.tools }
    pub fn surfaces(&self) -> &SurfaceRegistry { &self.surfaces }
    pub fn pending_classifications(&self) -> usize { self.pending.len() }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> { self.store.find_by_name(name).map(|l| l.id) }

    fn editable(&mut self, op: &str) -> bool {
        self.drain_playback();
        if self.playing {
            tracing::debug!("{op} rejected: playback is running");
            return false;
        }
        true
    }

    fn push_undo(&mut self, kind: ActionKind) {
        self.history.push(self.store.capture(Some(kind)));
        let history = &self.history;
        self.parked.retain(|id, _| history.undo_stack().iter().chain(history.redo_stack()).any(|s| s.layer(*id).is_some()));
    }

    // ---- surfaces ----

    /// Registers (or replaces) the surface for `layer` and paints the current frame into it.
    pub fn register_surface(&mut self, layer: LayerId, handle: SurfaceHandle) {
        self.surfaces.register(layer, handle);
        self.surfaces.sort_by_level(&self.store);
        self.redraw();
    }

    /// Creates a canvas-sized surface for `layer` and registers it.
    pub fn create_surface(&mut self, layer: LayerId) -> SurfaceHandle {
        let handle = Arc::new(Mutex::new(Surface::new(self.config.canvas_width, self.config.canvas_height)));
        self.register_surface(layer, handle.clone());
        handle
    }

    // ---- layers ----

    /// Adds `Layer_<n>` on top of the stack and selects it.
    pub fn new_layer(&mut self) -> Option<LayerId> {
        let name = self.store.next_layer_name();
        self.add_layer(&name)
    }

    pub fn add_layer(&mut self, name: &str) -> Option<LayerId> {
        if !self.editable("add layer") { return None; }
        let id = rejected("add layer", self.store.add_layer(name))?;
        rejected("select layer", self.store.select_layer(id))?;
        self.push_undo(ActionKind::NewLayer);
        tracing::debug!("layer '{name}' added");
        Some(id)
    }

    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        if !self.editable("delete layer") { return false; }
        if rejected("delete layer", self.store.delete_layer(id)).is_none() { return false; }
        if let Some(handle) = self.surfaces.unregister(id) { self.parked.insert(id, handle); }
        self.sessions.remove(&id);
        self.push_undo(ActionKind::DeleteLayer);
        self.redraw();
        self.reclassify_all();
        true
    }

    /// Renames a layer everywhere, history included. Not itself undoable.
    pub fn rename_layer(&mut self, id: LayerId, new_name: &str) -> bool {
        if !self.editable("rename layer") { return false; }
        if rejected("rename layer", self.store.rename_layer(id, new_name)).is_none() { return false; }
        let rewritten = self.history.rename_layer(id, new_name);
        tracing::debug!("layer {id} renamed to '{new_name}' ({rewritten} snapshots rewritten)");
        true
    }

    pub fn set_opacity(&mut self, id: LayerId, value: f32) -> bool {
        if !self.editable("set opacity") { return false; }
        if rejected("set opacity", self.store.set_opacity(id, value)).is_none() { return false; }
        self.push_undo(ActionKind::LayerEvent);
        true
    }

    pub fn set_hidden(&mut self, id: LayerId, hidden: bool) -> bool {
        if !self.editable("set hidden") { return false; }
        if rejected("set hidden", self.store.set_hidden(id, hidden)).is_none() { return false; }
        self.push_undo(ActionKind::LayerEvent);
        true
    }

    /// Stored only; drawing does not consult the lock.
    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> bool {
        if !self.editable("set locked") { return false; }
        if rejected("set locked", self.store.set_locked(id, locked)).is_none() { return false; }
        self.push_undo(ActionKind::LayerEvent);
        true
    }

    pub fn reorder(&mut self, id: LayerId, direction: Direction) -> bool {
        if !self.editable("reorder") { return false; }
        let Some((a, b)) = rejected("reorder", self.store.reorder(id, direction)) else { return false };
        self.surfaces.swap(a, b);
        self.push_undo(ActionKind::LayerEvent);
        true
    }

    pub fn select_layer(&mut self, id: LayerId) -> bool {
        if !self.editable("select layer") { return false; }
        rejected("select layer", self.store.select_layer(id)).is_some()
    }

    /// Scrubbing: moves the active frame (clamped) and repaints.
    pub fn set_current_frame(&mut self, frame: Frame) -> Frame {
        if !self.editable("set frame") { return self.store.current_frame(); }
        let set = self.store.set_current_frame(frame);
        self.redraw();
        set
    }

    /// Click on a keyframe cell: select its layer and jump to its frame.
    pub fn focus_keyframe(&mut self, layer: LayerId, frame: Frame) -> bool {
        if !self.select_layer(layer) { return false; }
        self.set_current_frame(frame) == frame
    }

    // ---- frames ----

    pub fn append_frame(&mut self, layer: LayerId, fill: FrameFill) -> Option<Frame> {
        if !self.editable("append frame") { return None; }
        let frame = rejected("append frame", self.store.append_frame(layer, fill))?;
        self.push_undo(ActionKind::NewKeyframe);
        self.redraw();
        Some(frame)
    }

    pub fn append_frame_to_selected(&mut self, fill: FrameFill) -> Option<Frame> {
        self.append_frame(self.store.selected(), fill)
    }

    // ---- history ----

    pub fn undo(&mut self) -> bool {
        if !self.editable("undo") { return false; }
        let Some(target) = self.history.undo().cloned() else { return false };
        tracing::info!("undo -> {:?} (frame {})", target.kind(), target.frame());
        self.apply_snapshot(&target);
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.editable("redo") { return false; }
        let Some(target) = self.history.redo().cloned() else { return false };
        tracing::info!("redo -> {:?} (frame {})", target.kind(), target.frame());
        self.apply_snapshot(&target);
        true
    }

    fn apply_snapshot(&mut self, snapshot: &timeline::Snapshot) {
        self.store.restore(snapshot);
        self.sessions.clear();
        self.reconcile_surfaces();
        self.redraw();
        self.reclassify_all();
    }

    /// Parks surfaces whose layer is gone and re-registers parked ones whose layer is back.
    fn reconcile_surfaces(&mut self) {
        for layer in self.surfaces.order() {
            if self.store.layer(layer).is_some() { continue; }
            if let Some(handle) = self.surfaces.unregister(layer) { self.parked.insert(layer, handle); }
        }
        let returning: Vec<LayerId> = self.parked.keys().copied().filter(|id| self.store.layer(*id).is_some()).collect();
        for layer in returning {
            if let Some(handle) = self.parked.remove(&layer) { self.surfaces.register(layer, handle); }
        }
        self.surfaces.sort_by_level(&self.store);
    }

    // ---- tools ----

    pub fn set_tool(&mut self, tool: Tool) { self.tools.tool = tool; }
    pub fn set_color(&mut self, color: &str) -> bool { self.tools.set_color(color) }
    pub fn set_brush_size(&mut self, size: u32) { self.tools.set_brush_size(size); }

    // ---- drawing ----

    /// Starts a gesture on `layer`'s surface at the active frame.
    pub fn pointer_down(&mut self, layer: LayerId, at: Point) -> bool {
        if !self.editable("pointer down") { return false; }
        if self.surfaces.get(layer).is_none() {
            tracing::debug!("pointer down ignored: layer {layer} has no surface");
            return false;
        }
        let Some(target) = self.store.layer(layer) else { return false };
        let brush = self.tools.brush();
        let frame = self.store.current_frame();
        self.sessions.entry(layer).or_insert_with(|| DrawingSession::new(layer)).begin(target, frame, brush, at)
    }

    pub fn pointer_move(&mut self, layer: LayerId, to: Point) -> bool {
        let Some(session) = self.sessions.get_mut(&layer) else { return false };
        let Some(handle) = self.surfaces.get(layer) else { return false };
        let mut surface = handle.lock();
        session.extend(&mut surface, to)
    }

    /// Ends the gesture and commits the surface. Returns whether a snapshot was pushed.
    pub fn pointer_up(&mut self, layer: LayerId) -> bool { self.end_gesture(layer, false) }

    /// Like [`pointer_up`](Self::pointer_up) but skips the commit when nothing changed.
    pub fn pointer_leave(&mut self, layer: LayerId) -> bool { self.end_gesture(layer, true) }

    fn end_gesture(&mut self, layer: LayerId, skip_unchanged: bool) -> bool {
        let Some(session) = self.sessions.get_mut(&layer) else { return false };
        let Some(handle) = self.surfaces.get(layer) else {
            session.cancel();
            return false;
        };
        let finished = {
            let surface = handle.lock();
            session.finish(&surface)
        };
        let Some(stroke) = finished else { return false };
        let bitmap = match stroke.bitmap {
            Ok(bitmap) => bitmap,
            Err(err) => {
                tracing::warn!("stroke on layer {layer} could not be serialised: {err}");
                return false;
            }
        };
        let unchanged = self
            .store
            .layer(layer)
            .and_then(|l| l.keyframes.iter().find(|k| k.id == stroke.keyframe))
            .is_some_and(|k| k.bitmap == bitmap);
        if skip_unchanged && (unchanged || !stroke.touched) {
            tracing::debug!("pointer leave on layer {layer} without changes");
            return false;
        }
        if rejected("commit stroke", self.store.update_keyframe_bitmap(layer, stroke.keyframe, bitmap)).is_none() { return false; }
        self.cache.invalidate(stroke.keyframe);
        self.push_undo(ActionKind::Draw);
        tracing::debug!("stroke committed to layer {layer} frame {}", stroke.frame);
        self.reclassify_all();
        true
    }

    // ---- classification ----

    /// Schedules classification of every keyframe whose payload has no known verdict.
    /// Results are applied by [`poll`](Self::poll).
    pub fn reclassify_all(&mut self) {
        let mut work: Vec<(LayerId, KeyframeId, Bitmap)> = Vec::new();
        let mut known: Vec<(LayerId, KeyframeId, Bitmap, KeyframeState)> = Vec::new();
        let mut live: HashSet<KeyframeId> = HashSet::new();
        for layer in self.store.layers() {
            for kf in &layer.keyframes {
                live.insert(kf.id);
                if kf.bitmap.is_blank() {
                    known.push((layer.id, kf.id, kf.bitmap.clone(), KeyframeState::Empty));
                    continue;
                }
                match self.verdicts.get(&kf.id) {
                    Some((bitmap, state)) if bitmap.same_payload(&kf.bitmap) => known.push((layer.id, kf.id, kf.bitmap.clone(), *state)),
                    _ => work.push((layer.id, kf.id, kf.bitmap.clone())),
                }
            }
        }
        self.verdicts.retain(|id, _| live.contains(id));
        let orphaned: Vec<KeyframeId> = self.pending.keys().filter(|id| !live.contains(*id)).copied().collect();
        for id in orphaned {
            if let Some(pending) = self.pending.remove(&id) { self.jobs.cancel_job(&pending.job); }
        }
        for (layer, keyframe, bitmap, state) in known {
            self.store.set_keyframe_state(layer, keyframe, &bitmap, state);
        }
        for (layer, keyframe, bitmap) in work {
            if let Some(pending) = self.pending.get(&keyframe) {
                if pending.bitmap.same_payload(&bitmap) { continue; }
                self.jobs.cancel_job(&pending.job);
            }
            match self.jobs.enqueue(JobSpec { layer, keyframe, bitmap: bitmap.clone() }) {
                Ok(job) => { self.pending.insert(keyframe, PendingClassification { job, bitmap }); }
                Err(err) => {
                    tracing::warn!("classification not scheduled: {err}");
                    self.pending.remove(&keyframe);
                }
            }
        }
    }

    /// Classifies everything on the calling thread.
    pub fn reclassify_all_blocking(&mut self) -> usize {
        self.pending.clear();
        self.store.reclassify_all(renderer::classify)
    }

    fn apply_job_event(&mut self, ev: JobEvent) {
        if !ev.status.is_terminal() { return; }
        let current = self.pending.get(&ev.keyframe).is_some_and(|p| p.job == ev.id);
        if current { self.pending.remove(&ev.keyframe); }
        let state = match ev.status {
            JobStatus::Done(state) => state,
            JobStatus::Failed(err) => {
                tracing::warn!("keyframe {} classified empty: {err}", ev.keyframe);
                KeyframeState::Empty
            }
            _ => return,
        };
        // keyframes removed since the job was queued
        if !self.store.layer(ev.layer).is_some_and(|l| l.keyframe_index(ev.keyframe).is_some()) { return; }
        self.verdicts.insert(ev.keyframe, (ev.bitmap.clone(), state));
        self.store.set_keyframe_state(ev.layer, ev.keyframe, &ev.bitmap, state);
    }

    /// Drains background results: classifications and playback progress.
    pub fn poll(&mut self) {
        while let Ok(ev) = self.jobs.rx_events.try_recv() { self.apply_job_event(ev); }
        self.drain_playback();
    }

    fn drain_playback(&mut self) {
        while let Ok(ev) = self.playback.rx_events.try_recv() { self.apply_playback_event(ev); }
    }

    /// Polls until every scheduled classification has landed or `timeout` passes.
    pub fn flush_classifications(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll();
        while !self.pending.is_empty() {
            let now = Instant::now();
            if now >= deadline { return false; }
            if let Ok(ev) = self.jobs.rx_events.recv_timeout(deadline - now) { self.apply_job_event(ev); }
        }
        true
    }

    // ---- playback ----

    pub fn set_frame_rate(&mut self, fps: u32) { self.playback.settings().set_frame_rate(fps); }
    pub fn set_looping(&mut self, looping: bool) { self.playback.settings().set_looping(looping); }

    pub fn set_onion_skin(&mut self, enabled: bool) {
        match self.onion_restore.as_mut() {
            Some(restore) => *restore = enabled,
            None => self.onion_skin = enabled,
        }
    }

    /// Snapshots the timeline and starts the playback thread from the active frame.
    pub fn play(&mut self) -> bool {
        self.poll();
        if self.playing { return false; }
        self.cancel_gestures();
        let started = self.playback.start(
            self.store.layers().to_vec(),
            self.store.current_frame(),
            self.store.timeline_length(),
            self.surfaces.clone(),
        );
        if started {
            self.playing = true;
            self.onion_restore = Some(self.onion_skin);
            self.onion_skin = false;
            tracing::info!("playback started at frame {} ({} fps)", self.current_frame(), self.frame_rate());
        }
        started
    }

    pub fn stop(&mut self) {
        if self.is_playing() { tracing::info!("playback stop requested"); }
        self.playback.stop();
    }

    pub fn toggle_playback(&mut self) -> bool {
        if self.is_playing() {
            self.stop();
            false
        } else {
            self.play()
        }
    }

    /// Blocks until the playback thread exits, then applies its events.
    pub fn wait_for_playback(&mut self) {
        self.playback.join();
        self.poll();
    }

    fn apply_playback_event(&mut self, ev: PlaybackEvent) {
        match ev {
            PlaybackEvent::Loaded => tracing::debug!("playback buffers ready"),
            PlaybackEvent::Frame(frame) => { self.store.set_current_frame(frame); }
            PlaybackEvent::Stopped => {
                self.playing = false;
                if let Some(restore) = self.onion_restore.take() { self.onion_skin = restore; }
                self.redraw();
            }
        }
    }

    // ---- keyboard ----

    pub fn handle_shortcut(&mut self, shortcut: Shortcut) -> bool {
        match shortcut {
            Shortcut::NewBlankFrame => self.append_frame_to_selected(FrameFill::Blank).is_some(),
            Shortcut::Undo => self.undo(),
            Shortcut::Redo => self.redo(),
            Shortcut::TogglePlayback => self.toggle_playback(),
        }
    }

    // ---- rendering ----

    /// Repaints every registered surface with its layer's keyframe at the active frame.
    /// Does nothing while playback owns the surfaces.
    pub fn redraw(&mut self) {
        if self.is_playing() { return; }
        self.cancel_gestures();
        let frame = self.store.current_frame();
        for (layer_id, handle) in self.surfaces.entries() {
            let image = self.store.layer(layer_id).and_then(|l| l.keyframe_at(frame)).and_then(|kf| self.cache.get(kf));
            let mut surface = handle.lock();
            surface.clear();
            if let Some(image) = image { surface.draw_image(&image, 1.0); }
        }
    }

    /// Drops in-flight gestures; their surfaces are about to show other pixels.
    fn cancel_gestures(&mut self) {
        for session in self.sessions.values_mut().filter(|s| s.state() == GestureState::Active) {
            tracing::debug!("gesture on layer {} canceled", session.layer());
            session.cancel();
        }
    }

    /// Flattens visible layers at `frame`, bottom to top, honouring layer opacity.
    pub fn composite(&mut self, frame: Frame) -> RgbaImage {
        let mut out = Surface::new(self.config.canvas_width, self.config.canvas_height);
        let layers: Vec<Arc<Layer>> = self.store.layers().to_vec();
        let mut ordered: Vec<&Arc<Layer>> = layers.iter().filter(|l| !l.settings.hidden).collect();
        ordered.sort_by_key(|l| l.level());
        for layer in ordered {
            let Some(kf) = layer.keyframe_at(frame) else { continue };
            if let Some(image) = self.cache.get(kf) { out.draw_image(&image, layer.settings.opacity); }
        }
        out.image().clone()
    }

    /// The previous frame's composite at reduced opacity, when onion skinning applies.
    pub fn onion_skin_image(&mut self) -> Option<RgbaImage> {
        let frame = self.store.current_frame();
        if !self.onion_skin || self.is_playing() || frame == 0 { return None; }
        let previous = self.composite(frame - 1);
        let mut out = Surface::new(self.config.canvas_width, self.config.canvas_height);
        out.draw_image(&previous, ONION_SKIN_OPACITY);
        Some(out.image().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Editor {
        Editor::new(EditorConfig { canvas_width: 32, canvas_height: 32, ..EditorConfig::default() })
    }

    fn stroke(editor: &mut Editor, layer: LayerId) -> bool {
        assert!(editor.pointer_down(layer, Point::new(4.0, 4.0)));
        editor.pointer_move(layer, Point::new(20.0, 20.0));
        editor.pointer_up(layer)
    }

    #[test]
    fn drawing_requires_a_registered_surface() {
        let mut editor = small();
        let layer = editor.selected_layer();
        assert!(!editor.pointer_down(layer, Point::new(1.0, 1.0)));
        editor.create_surface(layer);
        assert!(editor.pointer_down(layer, Point::new(1.0, 1.0)));
    }

    #[test]
    fn pointer_up_commits_and_pushes_one_snapshot() {
        let mut editor = small();
        let layer = editor.selected_layer();
        editor.create_surface(layer);
        assert!(stroke(&mut editor, layer));
        assert_eq!(editor.history().undo_stack().len(), 2);
        assert_eq!(editor.history().current().unwrap().kind(), Some(ActionKind::Draw));
        assert!(!editor.layer(layer).unwrap().keyframes[0].bitmap.is_blank());
    }

    #[test]
    fn pointer_leave_without_change_pushes_nothing() {
        let mut editor = small();
        let layer = editor.selected_layer();
        editor.create_surface(layer);
        assert!(editor.pointer_down(layer, Point::new(4.0, 4.0)));
        assert!(!editor.pointer_leave(layer));
        assert_eq!(editor.history().undo_stack().len(), 1);
    }

    #[test]
    fn pointer_leave_after_drawing_commits() {
        let mut editor = small();
        let layer = editor.selected_layer();
        editor.create_surface(layer);
        editor.pointer_down(layer, Point::new(4.0, 4.0));
        editor.pointer_move(layer, Point::new(10.0, 4.0));
        assert!(editor.pointer_leave(layer));
        assert_eq!(editor.history().undo_stack().len(), 2);
    }

    #[test]
    fn undo_repaints_surfaces() {
        let mut editor = small();
        let layer = editor.selected_layer();
        let surface = editor.create_surface(layer);
        stroke(&mut editor, layer);
        assert!(!surface.lock().is_transparent());
        assert!(editor.undo());
        assert!(surface.lock().is_transparent());
        assert!(editor.redo());
        assert!(!surface.lock().is_transparent());
    }

    #[test]
    fn new_blank_frame_shortcut_appends_to_selection() {
        let mut editor = small();
        assert!(editor.handle_shortcut(Shortcut::NewBlankFrame));
        assert_eq!(editor.timeline_length(), 2);
        assert_eq!(editor.current_frame(), 1);
        assert!(editor.handle_shortcut(Shortcut::Undo));
        assert_eq!(editor.timeline_length(), 1);
    }

    #[test]
    fn onion_skin_shows_previous_frame_faded() {
        let mut editor = small();
        let layer = editor.selected_layer();
        editor.create_surface(layer);
        stroke(&mut editor, layer);
        editor.append_frame(layer, FrameFill::Blank);
        assert!(editor.onion_skin_image().is_none());
        editor.set_onion_skin(true);
        let onion = editor.onion_skin_image().unwrap();
        let alpha = onion.get_pixel(12, 12)[3];
        assert!(alpha > 0 && alpha < 255, "alpha {alpha}");
    }

    #[test]
    fn verdicts_only_cover_live_keyframes() {
        let mut editor = small();
        let layer = editor.new_layer().unwrap();
        editor.create_surface(layer);
        stroke(&mut editor, layer);
        assert!(editor.flush_classifications(Duration::from_secs(5)));
        assert_eq!(editor.verdicts.len(), 1);
        assert!(editor.delete_layer(layer));
        assert!(editor.verdicts.is_empty());
        assert_eq!(editor.pending_classifications(), 0);
    }

    #[test]
    fn undoing_a_delete_brings_the_surface_back() {
        let mut editor = small();
        let layer = editor.new_layer().unwrap();
        let surface = editor.create_surface(layer);
        stroke(&mut editor, layer);
        assert!(editor.delete_layer(layer));
        assert!(editor.surfaces().get(layer).is_none());

        assert!(editor.undo());
        let restored = editor.surfaces().get(layer).unwrap();
        assert!(Arc::ptr_eq(&restored, &surface));
        assert!(!surface.lock().is_transparent());
        assert!(stroke(&mut editor, layer));
    }

    #[test]
    fn undoing_a_new_layer_unregisters_its_surface() {
        let mut editor = small();
        let layer = editor.new_layer().unwrap();
        editor.create_surface(layer);
        assert!(editor.undo());
        assert!(editor.surfaces().get(layer).is_none());
        assert_eq!(editor.surfaces().len(), 0);
        assert!(editor.redo());
        assert!(editor.surfaces().get(layer).is_some());
    }

    #[test]
    fn composite_skips_hidden_layers() {
        let mut editor = small();
        let layer = editor.selected_layer();
        editor.create_surface(layer);
        stroke(&mut editor, layer);
        assert_eq!(editor.composite(0).get_pixel(12, 12)[3], 255);
        editor.set_hidden(layer, true);
        assert_eq!(editor.composite(0).get_pixel(12, 12)[3], 0);
    }
}

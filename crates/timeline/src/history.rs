use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Frame, Layer, LayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Draw,
    NewLayer,
    NewKeyframe,
    LayerEvent,
    DeleteLayer,
}

/// Full editor state at one instant.
///
/// Layers are shared with the store that produced them; the store copies a
/// layer before mutating it, so a snapshot stays restorable no matter what
/// happens afterwards.
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: Uuid,
    kind: Option<ActionKind>,
    selected: LayerId,
    frame: Frame,
    layers: Vec<Arc<Layer>>,
}

impl Snapshot {
    pub fn new(kind: Option<ActionKind>, selected: LayerId, frame: Frame, layers: Vec<Arc<Layer>>) -> Self {
        Self { id: Uuid::new_v4(), kind, selected, frame, layers }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn kind(&self) -> Option<ActionKind> { self.kind }
    pub fn selected(&self) -> LayerId { self.selected }
    pub fn frame(&self) -> Frame { self.frame }
    pub fn layers(&self) -> &[Arc<Layer>] { &self.layers }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> { self.layers.iter().find(|l| l.id == id).map(|l| &**l) }

    fn rename_layer(&mut self, id: LayerId, name: &str) -> bool {
        match self.layers.iter_mut().find(|l| l.id == id) {
            Some(layer) if layer.name != name => {
                Arc::make_mut(layer).name = name.to_string();
                true
            }
            _ => false,
        }
    }
}

/// Snapshot-based undo/redo.
///
/// The undo stack is seeded with the initial state and never drops below one
/// entry. Undo pops the top and reveals the snapshot beneath it.
#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
}

impl History {
    pub fn new(initial: Snapshot) -> Self { Self { undo: vec![initial], redo: Vec::new() } }

    /// Records a new state. Any redo entries belong to an abandoned branch and are dropped.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.redo.clear();
        self.undo.push(snapshot);
    }

    /// Returns the snapshot to restore, or `None` when only the initial state is left.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.undo.len() < 2 { return None; }
        let top = self.undo.pop()?;
        self.redo.push(top);
        self.undo.last()
    }

    pub fn redo(&mut self) -> Option<&Snapshot> {
        let next = self.redo.pop()?;
        self.undo.push(next);
        self.undo.last()
    }

    pub fn can_undo(&self) -> bool { self.undo.len() >= 2 }
    pub fn can_redo(&self) -> bool { !self.redo.is_empty() }

    pub fn undo_stack(&self) -> &[Snapshot] { &self.undo }
    pub fn redo_stack(&self) -> &[Snapshot] { &self.redo }

    pub fn current(&self) -> Option<&Snapshot> { self.undo.last() }

    /// Rewrites the layer's display name in every stored snapshot. Returns how many changed.
    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> usize {
        self.undo.iter_mut().chain(self.redo.iter_mut()).map(|s| s.rename_layer(id, name)).filter(|changed| *changed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bitmap, FrameFill, TimelineStore};

    fn seeded() -> (TimelineStore, History) {
        let store = TimelineStore::new();
        let history = History::new(store.capture(None));
        (store, history)
    }

    #[test]
    fn undo_with_only_initial_snapshot_is_a_no_op() {
        let (_, mut history) = seeded();
        assert!(history.undo().is_none());
        assert_eq!(history.undo_stack().len(), 1);
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_reveals_previous_and_redo_returns_top() {
        let (mut store, mut history) = seeded();
        let layer = store.selected();
        store.append_frame(layer, FrameFill::Blank).unwrap();
        let pushed = store.capture(Some(ActionKind::NewKeyframe));
        let pushed_id = pushed.id();
        history.push(pushed);

        let target = history.undo().unwrap().clone();
        store.restore(&target);
        assert_eq!(store.timeline_length(), 1);
        assert_eq!(store.current_frame(), 0);
        assert_eq!(history.redo_stack().len(), 1);

        let again = history.redo().unwrap().clone();
        assert_eq!(again.id(), pushed_id);
        store.restore(&again);
        assert_eq!(store.timeline_length(), 2);
        assert_eq!(store.current_frame(), 1);
    }

    #[test]
    fn new_push_drops_redo_branch() {
        let (store, mut history) = seeded();
        history.push(store.capture(Some(ActionKind::Draw)));
        history.undo();
        assert!(history.can_redo());
        history.push(store.capture(Some(ActionKind::Draw)));
        assert!(!history.can_redo());
    }

    #[test]
    fn snapshots_are_unaffected_by_later_mutation() {
        let (mut store, history) = seeded();
        let layer = store.selected();
        let kf = store.selected_layer().keyframes[0].id;
        store.update_keyframe_bitmap(layer, kf, Bitmap::from("ink")).unwrap();
        let initial = &history.undo_stack()[0];
        assert!(initial.layer(layer).unwrap().keyframes[0].bitmap.is_blank());
    }

    #[test]
    fn rename_rewrites_every_snapshot() {
        let (mut store, mut history) = seeded();
        let layer = store.selected();
        for _ in 0..3 {
            store.append_frame(layer, FrameFill::Blank).unwrap();
            history.push(store.capture(Some(ActionKind::NewKeyframe)));
        }
        history.undo();
        assert_eq!(history.rename_layer(layer, "Ink"), 4);
        for snap in history.undo_stack().iter().chain(history.redo_stack()) {
            assert_eq!(snap.layer(layer).unwrap().name, "Ink");
        }
    }
}

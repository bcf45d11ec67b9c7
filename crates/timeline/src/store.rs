use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Bitmap, Frame, Keyframe, KeyframeId, KeyframeState, Layer, LayerId, Snapshot, TimelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards the top of the composite stack (higher level).
    Up,
    Down,
}

/// How missing frames are filled when a layer is extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFill {
    #[default]
    Blank,
    Clone,
}

/// Owns the layers, the selection and the active frame.
///
/// Layers sit behind `Arc` so a [`Snapshot`] is a vector of pointer copies;
/// every mutation goes through `Arc::make_mut` and only copies the layer it
/// touches.
#[derive(Debug, Clone)]
pub struct TimelineStore {
    layers: Vec<Arc<Layer>>,
    selected: LayerId,
    current_frame: Frame,
    timeline_length: usize,
}

impl Default for TimelineStore {
    fn default() -> Self { Self::new() }
}

impl TimelineStore {
    pub fn new() -> Self {
        let first = Layer::new("Layer_0", 0);
        let selected = first.id;
        Self { layers: vec![Arc::new(first)], selected, current_frame: 0, timeline_length: 1 }
    }

    pub fn layers(&self) -> &[Arc<Layer>] { &self.layers }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> { self.layers.iter().find(|l| l.id == id).map(|l| &**l) }

    /// Layers from the bottom of the composite stack to the top.
    pub fn layers_by_level(&self) -> Vec<&Layer> {
        let mut out: Vec<&Layer> = self.layers.iter().map(|l| &**l).collect();
        out.sort_by_key(|l| l.level());
        out
    }

    pub fn levels(&self) -> Vec<usize> { self.layers.iter().map(|l| l.level()).collect() }

    pub fn selected(&self) -> LayerId { self.selected }

    pub fn selected_layer(&self) -> &Layer {
        // selection always references a live layer
        self.layer(self.selected).unwrap_or(&self.layers[0])
    }

    pub fn current_frame(&self) -> Frame { self.current_frame }

    pub fn timeline_length(&self) -> usize { self.timeline_length }

    pub fn find_by_name(&self, name: &str) -> Option<&Layer> {
        let wanted = name.to_lowercase();
        self.layers.iter().find(|l| l.name.to_lowercase() == wanted).map(|l| &**l)
    }

    /// Smallest `Layer_<n>` that does not collide with a live layer.
    pub fn next_layer_name(&self) -> String {
        let mut n = self.layers.len();
        loop {
            let candidate = format!("Layer_{n}");
            if self.find_by_name(&candidate).is_none() { return candidate; }
            n += 1;
        }
    }

    fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer, TimelineError> {
        self.layers.iter_mut().find(|l| l.id == id).map(Arc::make_mut).ok_or(TimelineError::UnknownLayer(id))
    }

    fn check_name(&self, name: &str, except: Option<LayerId>) -> Result<(), TimelineError> {
        if name.trim().is_empty() { return Err(TimelineError::EmptyName); }
        match self.find_by_name(name) {
            Some(other) if Some(other.id) != except => Err(TimelineError::NameTaken(name.to_string())),
            _ => Ok(()),
        }
    }

    /// Adds a layer on top of the stack. The new layer is not selected.
    pub fn add_layer(&mut self, name: &str) -> Result<LayerId, TimelineError> {
        self.check_name(name, None)?;
        let layer = Layer::new(name, self.layers.len());
        let id = layer.id;
        self.layers.push(Arc::new(layer));
        self.recompute_timeline_length();
        Ok(id)
    }

    /// Removes a layer, closing the gap in the level sequence.
    pub fn delete_layer(&mut self, id: LayerId) -> Result<Arc<Layer>, TimelineError> {
        let idx = self.layers.iter().position(|l| l.id == id).ok_or(TimelineError::UnknownLayer(id))?;
        if self.layers.len() == 1 { return Err(TimelineError::LastLayer); }
        let removed = self.layers.remove(idx);
        let gap = removed.level();
        for layer in self.layers.iter_mut() {
            if layer.level() > gap { Arc::make_mut(layer).settings.level -= 1; }
        }
        if self.selected == id {
            let target = gap.min(self.layers.len() - 1);
            if let Some(next) = self.layers.iter().find(|l| l.level() == target) { self.selected = next.id; }
        }
        self.recompute_timeline_length();
        Ok(removed)
    }

    pub fn rename_layer(&mut self, id: LayerId, new_name: &str) -> Result<(), TimelineError> {
        self.check_name(new_name, Some(id))?;
        self.layer_mut(id)?.name = new_name.to_string();
        Ok(())
    }

    pub fn set_opacity(&mut self, id: LayerId, value: f32) -> Result<(), TimelineError> {
        if !(0.0..=1.0).contains(&value) { return Err(TimelineError::OpacityOutOfRange(value)); }
        self.layer_mut(id)?.settings.opacity = value;
        Ok(())
    }

    pub fn set_hidden(&mut self, id: LayerId, hidden: bool) -> Result<(), TimelineError> {
        self.layer_mut(id)?.settings.hidden = hidden;
        Ok(())
    }

    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> Result<(), TimelineError> {
        self.layer_mut(id)?.settings.locked = locked;
        Ok(())
    }

    /// Swaps the layer's level with its neighbour. Returns the pair that swapped.
    pub fn reorder(&mut self, id: LayerId, direction: Direction) -> Result<(LayerId, LayerId), TimelineError> {
        let level = self.layer(id).ok_or(TimelineError::UnknownLayer(id))?.level();
        let target = match direction {
            Direction::Up => level + 1,
            Direction::Down => level.checked_sub(1).ok_or(TimelineError::AtBoundary(direction))?,
        };
        let neighbour = self.layers.iter().find(|l| l.level() == target).map(|l| l.id).ok_or(TimelineError::AtBoundary(direction))?;
        self.layer_mut(id)?.settings.level = target;
        self.layer_mut(neighbour)?.settings.level = level;
        Ok((id, neighbour))
    }

    pub fn select_layer(&mut self, id: LayerId) -> Result<(), TimelineError> {
        if self.layer(id).is_none() { return Err(TimelineError::UnknownLayer(id)); }
        self.selected = id;
        Ok(())
    }

    /// Moves the active frame, clamped to the timeline. Returns the frame actually set.
    pub fn set_current_frame(&mut self, frame: Frame) -> Frame {
        self.current_frame = frame.min(self.timeline_length.saturating_sub(1));
        self.current_frame
    }

    /// Extends `layer` relative to the active frame and returns the frame the new keyframe landed on.
    ///
    /// When the active frame lies past the end of the layer, every missing
    /// index up to and including it is filled (`Blank` or a copy of the last
    /// keyframe) and the active frame stays put. Otherwise one blank keyframe
    /// is appended and the active frame moves onto it.
    pub fn append_frame(&mut self, layer: LayerId, fill: FrameFill) -> Result<Frame, TimelineError> {
        let current = self.current_frame;
        let target = self.layer_mut(layer)?;
        let len = target.keyframes.len();
        let landed = if current >= len {
            let template = match fill {
                FrameFill::Blank => Keyframe::blank(target.id),
                FrameFill::Clone => target.keyframes.last().cloned().unwrap_or_else(|| Keyframe::blank(target.id)),
            };
            target.keyframes.extend((len..=current).map(|_| template.duplicate()));
            current
        } else {
            target.keyframes.push(Keyframe::blank(target.id));
            len
        };
        self.recompute_timeline_length();
        self.current_frame = landed;
        Ok(landed)
    }

    /// Replaces a keyframe's payload. Classification is left to [`reclassify_all`](Self::reclassify_all).
    pub fn update_keyframe_bitmap(&mut self, layer: LayerId, keyframe: KeyframeId, bitmap: Bitmap) -> Result<(), TimelineError> {
        let target = self.layer_mut(layer)?;
        let kf = target.keyframes.iter_mut().find(|k| k.id == keyframe).ok_or(TimelineError::UnknownKeyframe(keyframe))?;
        kf.bitmap = bitmap;
        Ok(())
    }

    /// Applies a classification computed for `bitmap`; ignored if the keyframe has since changed.
    pub fn set_keyframe_state(&mut self, layer: LayerId, keyframe: KeyframeId, bitmap: &Bitmap, state: KeyframeState) -> bool {
        let current = self.layer(layer).and_then(|l| l.keyframes.iter().find(|k| k.id == keyframe));
        match current {
            Some(kf) if kf.bitmap.same_payload(bitmap) && kf.state != state => {}
            _ => return false,
        }
        if let Ok(target) = self.layer_mut(layer) {
            if let Some(kf) = target.keyframes.iter_mut().find(|k| k.id == keyframe) {
                kf.state = state;
                return true;
            }
        }
        false
    }

    /// Recomputes every keyframe's state. Layers whose states are already current are not copied.
    pub fn reclassify_all(&mut self, classify: impl Fn(&Bitmap) -> KeyframeState) -> usize {
        let mut changed = 0;
        for layer in self.layers.iter_mut() {
            let states: Vec<KeyframeState> = layer.keyframes.iter().map(|k| classify(&k.bitmap)).collect();
            if layer.keyframes.iter().zip(&states).all(|(k, s)| k.state == *s) { continue; }
            for (kf, state) in Arc::make_mut(layer).keyframes.iter_mut().zip(states) {
                if kf.state != state {
                    kf.state = state;
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn recompute_timeline_length(&mut self) -> usize {
        self.timeline_length = self.layers.iter().map(|l| l.keyframes.len()).max().unwrap_or(0).max(1);
        if self.current_frame >= self.timeline_length { self.current_frame = self.timeline_length - 1; }
        self.timeline_length
    }

    pub fn capture(&self, kind: Option<crate::ActionKind>) -> Snapshot {
        Snapshot::new(kind, self.selected, self.current_frame, self.layers.clone())
    }

    /// Replaces layers, selection and active frame with a snapshot's.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.layers = snapshot.layers().to_vec();
        self.selected = snapshot.selected();
        self.recompute_timeline_length();
        self.current_frame = snapshot.frame();
        self.set_current_frame(self.current_frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(s: &str) -> Bitmap { Bitmap::from(s) }

    fn is_permutation(levels: &[usize]) -> bool {
        let mut sorted = levels.to_vec();
        sorted.sort_unstable();
        sorted.iter().enumerate().all(|(i, l)| i == *l)
    }

    #[test]
    fn starts_with_single_selected_layer() {
        let store = TimelineStore::new();
        assert_eq!(store.layers().len(), 1);
        assert_eq!(store.selected_layer().name, "Layer_0");
        assert_eq!(store.timeline_length(), 1);
        assert_eq!(store.current_frame(), 0);
    }

    #[test]
    fn rename_rejects_empty_and_case_insensitive_collisions() {
        let mut store = TimelineStore::new();
        let second = store.add_layer("Sky").unwrap();
        assert_eq!(store.rename_layer(second, ""), Err(TimelineError::EmptyName));
        assert_eq!(store.rename_layer(second, "layer_0"), Err(TimelineError::NameTaken("layer_0".into())));
        assert_eq!(store.layer(second).unwrap().name, "Sky");
        // changing case of its own name is fine
        store.rename_layer(second, "SKY").unwrap();
        assert_eq!(store.layer(second).unwrap().name, "SKY");
        assert!(store.find_by_name("sky").is_some());
    }

    #[test]
    fn next_layer_name_skips_taken_names() {
        let mut store = TimelineStore::new();
        store.add_layer("Layer_1").unwrap();
        assert_eq!(store.next_layer_name(), "Layer_2");
    }

    #[test]
    fn opacity_outside_unit_range_is_rejected() {
        let mut store = TimelineStore::new();
        let id = store.selected();
        assert!(store.set_opacity(id, 1.5).is_err());
        assert!(store.set_opacity(id, -0.1).is_err());
        store.set_opacity(id, 0.25).unwrap();
        assert_eq!(store.layer(id).unwrap().settings.opacity, 0.25);
    }

    #[test]
    fn reorder_swaps_adjacent_levels_and_stops_at_boundaries() {
        let mut store = TimelineStore::new();
        let bottom = store.selected();
        let middle = store.add_layer("b").unwrap();
        let top = store.add_layer("c").unwrap();

        assert_eq!(store.reorder(top, Direction::Up), Err(TimelineError::AtBoundary(Direction::Up)));
        assert_eq!(store.reorder(bottom, Direction::Down), Err(TimelineError::AtBoundary(Direction::Down)));

        assert_eq!(store.reorder(bottom, Direction::Up).unwrap(), (bottom, middle));
        assert_eq!(store.layer(bottom).unwrap().level(), 1);
        assert_eq!(store.layer(middle).unwrap().level(), 0);
        assert!(is_permutation(&store.levels()));

        for dir in [Direction::Up, Direction::Up, Direction::Down, Direction::Up, Direction::Down] {
            let _ = store.reorder(top, dir);
            let _ = store.reorder(bottom, dir);
            assert!(is_permutation(&store.levels()));
        }
    }

    #[test]
    fn append_within_range_adds_one_blank_and_moves_playhead() {
        let mut store = TimelineStore::new();
        let id = store.selected();
        assert_eq!(store.append_frame(id, FrameFill::Blank).unwrap(), 1);
        assert_eq!(store.current_frame(), 1);
        assert_eq!(store.timeline_length(), 2);
        assert_eq!(store.append_frame(id, FrameFill::Clone).unwrap(), 2);
        assert!(store.layer(id).unwrap().keyframes[2].bitmap.is_blank());
    }

    #[test]
    fn clone_backfill_copies_last_keyframe_into_every_gap() {
        let mut store = TimelineStore::new();
        let long = store.selected();
        for _ in 0..4 { store.append_frame(long, FrameFill::Blank).unwrap(); }
        let short = store.add_layer("short").unwrap();
        let kf = store.layer(short).unwrap().keyframes[0].id;
        store.update_keyframe_bitmap(short, kf, filled("payload")).unwrap();

        store.set_current_frame(3);
        assert_eq!(store.append_frame(short, FrameFill::Clone).unwrap(), 3);
        let layer = store.layer(short).unwrap();
        assert_eq!(layer.keyframes.len(), 4);
        for added in &layer.keyframes[1..] {
            assert_eq!(added.bitmap.as_str(), "payload");
            assert_eq!(added.layer, short);
        }
        let mut ids: Vec<_> = layer.keyframes.iter().map(|k| k.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 4, "back-filled slots are independent keyframes");
        assert_eq!(store.current_frame(), 3);
    }

    #[test]
    fn timeline_length_tracks_longest_layer() {
        let mut store = TimelineStore::new();
        let a = store.selected();
        let b = store.add_layer("b").unwrap();
        for (layer, frame) in [(a, 0), (b, 0), (b, 1), (a, 5), (b, 0)] {
            store.set_current_frame(frame);
            store.append_frame(layer, FrameFill::Blank).unwrap();
            let expected = store.layers().iter().map(|l| l.keyframes.len()).max().unwrap();
            assert_eq!(store.timeline_length(), expected);
        }
    }

    #[test]
    fn delete_layer_keeps_levels_dense_and_selection_live() {
        let mut store = TimelineStore::new();
        let a = store.selected();
        let b = store.add_layer("b").unwrap();
        let c = store.add_layer("c").unwrap();
        store.select_layer(b).unwrap();
        store.delete_layer(b).unwrap();
        assert!(is_permutation(&store.levels()));
        assert_eq!(store.layer(c).unwrap().level(), 1);
        assert_eq!(store.selected(), c);
        store.delete_layer(c).unwrap();
        assert_eq!(store.selected(), a);
        assert_eq!(store.delete_layer(a).unwrap_err(), TimelineError::LastLayer);
    }

    #[test]
    fn stale_classification_is_dropped() {
        let mut store = TimelineStore::new();
        let layer = store.selected();
        let kf = store.selected_layer().keyframes[0].id;
        let first = filled("one");
        store.update_keyframe_bitmap(layer, kf, first.clone()).unwrap();
        store.update_keyframe_bitmap(layer, kf, filled("two")).unwrap();
        assert!(!store.set_keyframe_state(layer, kf, &first, KeyframeState::Filled));
        let current = store.selected_layer().keyframes[0].bitmap.clone();
        assert!(store.set_keyframe_state(layer, kf, &current, KeyframeState::Filled));
        assert_eq!(store.selected_layer().keyframes[0].state, KeyframeState::Filled);
    }

    #[test]
    fn reclassify_leaves_untouched_layers_shared() {
        let mut store = TimelineStore::new();
        let other = store.add_layer("b").unwrap();
        let before = store.capture(None);
        let kf = store.layer(other).unwrap().keyframes[0].id;
        store.update_keyframe_bitmap(other, kf, filled("x")).unwrap();
        let changed = store.reclassify_all(|b| if b.is_blank() { KeyframeState::Empty } else { KeyframeState::Filled });
        assert_eq!(changed, 1);
        assert!(Arc::ptr_eq(&store.layers()[0], &before.layers()[0]));
        assert_eq!(before.layers()[1].keyframes[0].state, KeyframeState::Empty);
    }
}

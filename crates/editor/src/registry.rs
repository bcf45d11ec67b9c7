use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use renderer::Surface;
use timeline::{LayerId, TimelineStore};

pub type SurfaceHandle = Arc<Mutex<Surface>>;

/// Layer -> rendering surface map shared between the editor and the playback thread.
///
/// Readers take a fresh [`entries`](Self::entries) copy each frame; reorder
/// swaps entries in place.
#[derive(Clone, Default)]
pub struct SurfaceRegistry {
    entries: Arc<RwLock<Vec<(LayerId, SurfaceHandle)>>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registers `handle` for `layer`, replacing any earlier handle.
    pub fn register(&self, layer: LayerId, handle: SurfaceHandle) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(id, _)| *id == layer) {
            Some(slot) => slot.1 = handle,
            None => entries.push((layer, handle)),
        }
    }

    pub fn unregister(&self, layer: LayerId) -> Option<SurfaceHandle> {
        let mut entries = self.entries.write();
        let idx = entries.iter().position(|(id, _)| *id == layer)?;
        Some(entries.remove(idx).1)
    }

    pub fn get(&self, layer: LayerId) -> Option<SurfaceHandle> {
        self.entries.read().iter().find(|(id, _)| *id == layer).map(|(_, h)| h.clone())
    }

    pub fn entries(&self) -> Vec<(LayerId, SurfaceHandle)> { self.entries.read().clone() }

    pub fn order(&self) -> Vec<LayerId> { self.entries.read().iter().map(|(id, _)| *id).collect() }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }

    pub fn swap(&self, a: LayerId, b: LayerId) {
        let mut entries = self.entries.write();
        let ia = entries.iter().position(|(id, _)| *id == a);
        let ib = entries.iter().position(|(id, _)| *id == b);
        if let (Some(ia), Some(ib)) = (ia, ib) { entries.swap(ia, ib); }
    }

    /// Re-sorts entries by layer level; unknown layers go last.
    pub fn sort_by_level(&self, store: &TimelineStore) {
        self.entries.write().sort_by_key(|(id, _)| store.layer(*id).map(|l| l.level()).unwrap_or(usize::MAX));
    }
}

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use image::RgbaImage;
use timeline::{Bitmap, Keyframe, KeyframeId};

use crate::codec;

struct CachedBitmap {
    bitmap: Bitmap,
    // None when the payload failed to decode; not retried until the payload changes
    image: Option<Arc<RgbaImage>>,
}

/// Decoded keyframe bitmaps, keyed by keyframe and validated by payload identity.
pub struct BitmapCache {
    capacity: usize,
    entries: HashMap<KeyframeId, CachedBitmap>,
    order: VecDeque<KeyframeId>,
    pub hits: u64,
    pub misses: u64,
}

impl BitmapCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: HashMap::new(), order: VecDeque::new(), hits: 0, misses: 0 }
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Pixels for `keyframe`, decoding on first use. `None` for blank or undecodable payloads.
    pub fn get(&mut self, keyframe: &Keyframe) -> Option<Arc<RgbaImage>> {
        if keyframe.bitmap.is_blank() { return None; }
        if let Some(entry) = self.entries.get(&keyframe.id) {
            if entry.bitmap.same_payload(&keyframe.bitmap) || entry.bitmap == keyframe.bitmap {
                self.hits += 1;
                let image = entry.image.clone();
                self.touch(keyframe.id);
                return image;
            }
        }
        self.misses += 1;
        let image = match codec::decode_bitmap(&keyframe.bitmap) {
            Ok(img) => Some(Arc::new(img)),
            Err(err) => {
                tracing::warn!("keyframe {} failed to decode: {err}", keyframe.id);
                None
            }
        };
        self.insert(keyframe.id, CachedBitmap { bitmap: keyframe.bitmap.clone(), image: image.clone() });
        image
    }

    pub fn invalidate(&mut self, id: KeyframeId) {
        self.entries.remove(&id);
        self.order.retain(|k| *k != id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn touch(&mut self, id: KeyframeId) {
        self.order.retain(|k| *k != id);
        self.order.push_back(id);
    }

    fn insert(&mut self, id: KeyframeId, entry: CachedBitmap) {
        self.entries.insert(id, entry);
        self.touch(id);
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            self.entries.remove(&oldest);
        }
    }
}

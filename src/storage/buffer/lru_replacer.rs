use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;

use crate::common::types::FrameId;

/// Tracks which frames may be evicted. A frame enters the queue when its
/// pin count drops to zero and leaves when it is pinned again; the victim is
/// the frame unpinned least recently. The linked hash map gives O(1)
/// removal by frame id on pin.
pub struct LruReplacer {
    inner: Mutex<LinkedHashMap<FrameId, ()>>,
    capacity: usize,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LinkedHashMap::with_capacity(capacity)),
            capacity,
        }
    }

    /// Make the frame a replacement candidate. No-op if already tracked or
    /// the replacer is at capacity.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut list = self.inner.lock();
        if list.len() >= self.capacity || list.contains_key(&frame_id) {
            return;
        }
        list.insert(frame_id, ());
    }

    /// A pinned frame is not a candidate.
    pub fn pin(&self, frame_id: FrameId) {
        self.inner.lock().remove(&frame_id);
    }

    /// Pop the least recently unpinned frame.
    pub fn victim(&self) -> Option<FrameId> {
        self.inner.lock().pop_front().map(|(frame_id, _)| frame_id)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_of_unpinned() {
        let replacer = LruReplacer::new(7);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_pin_removes_candidate() {
        let replacer = LruReplacer::new(7);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        replacer.pin(2);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_duplicate_unpin_kept_at_original_position() {
        let replacer = LruReplacer::new(7);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(1);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
    }

    #[test]
    fn test_capacity_bound() {
        let replacer = LruReplacer::new(2);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), None);
    }
}

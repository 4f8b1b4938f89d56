use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use log::debug;

use crate::event::EditorEvent;

/// Bounded per-page thumbnail store.
///
/// Entries are recomputed only after an explicit invalidation: content edits on the page,
/// page structure or rotation changes, layer changes. View changes never touch it. Every
/// invalidation bumps the page's generation so a render that started before it is
/// refused when it lands.
#[derive(Debug)]
pub struct ThumbnailCache {
    entries: HashMap<usize, Arc<RgbaImage>>,
    last_used: HashMap<usize, u64>,
    generations: HashMap<usize, u64>,
    clock: u64,
    /// Bumped by `invalidate_all`; part of every page's generation
    epoch: u64,
    capacity: usize,
}

impl ThumbnailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            last_used: HashMap::new(),
            generations: HashMap::new(),
            clock: 0,
            epoch: 0,
            capacity: capacity.max(1),
        }
    }

    /// Cached thumbnail of `page`, marking it recently used
    pub fn get(&mut self, page: usize) -> Option<Arc<RgbaImage>> {
        let image = self.entries.get(&page).cloned()?;
        self.clock += 1;
        self.last_used.insert(page, self.clock);
        Some(image)
    }

    pub fn contains(&self, page: usize) -> bool {
        self.entries.contains_key(&page)
    }

    /// Token to pass back to [`insert`](Self::insert) for a render started now
    pub fn generation(&self, page: usize) -> u64 {
        (self.epoch << 32) | self.generations.get(&page).copied().unwrap_or(0)
    }

    /// Store a finished render. Refused if `page` was invalidated after `generation`
    /// was taken.
    pub fn insert(&mut self, page: usize, generation: u64, image: Arc<RgbaImage>) -> bool {
        if generation != self.generation(page) {
            debug!("Dropping stale thumbnail of page {}", page);
            return false;
        }
        self.clock += 1;
        self.entries.insert(page, image);
        self.last_used.insert(page, self.clock);
        self.evict();
        true
    }

    pub fn invalidate(&mut self, page: usize) {
        *self.generations.entry(page).or_insert(0) += 1;
        self.entries.remove(&page);
        self.last_used.remove(&page);
    }

    pub fn invalidate_all(&mut self) {
        self.epoch += 1;
        self.generations.clear();
        self.entries.clear();
        self.last_used.clear();
    }

    /// Invalidate whatever `event` made stale
    pub fn on_event(&mut self, event: &EditorEvent) {
        if let Some(page) = event.affected_page() {
            self.invalidate(page);
            return;
        }
        match event {
            // Renumbering and rotation change page identity and shape
            EditorEvent::PagesChanged { .. } | EditorEvent::DocumentLoaded { .. } | EditorEvent::LayersChanged => {
                self.invalidate_all()
            }
            _ => {}
        }
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.last_used.iter().min_by_key(|(_, used)| **used).map(|(page, _)| *page) else {
                break;
            };
            debug!("Evicting thumbnail of page {}", oldest);
            self.entries.remove(&oldest);
            self.last_used.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ObjectId;

    fn thumb() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::new(2, 2))
    }

    fn fill(cache: &mut ThumbnailCache, page: usize) {
        let generation = cache.generation(page);
        assert!(cache.insert(page, generation, thumb()));
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let mut cache = ThumbnailCache::new(2);
        fill(&mut cache, 1);
        fill(&mut cache, 2);
        cache.get(1);
        fill(&mut cache, 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
    }

    #[test]
    fn test_view_events_do_not_invalidate() {
        let mut cache = ThumbnailCache::new(4);
        fill(&mut cache, 1);
        cache.on_event(&EditorEvent::ZoomChanged { zoom: 2.0 });
        cache.on_event(&EditorEvent::PageChanged { page: 1 });
        cache.on_event(&EditorEvent::SelectionChanged { selected: Vec::new() });
        assert!(cache.contains(1));
    }

    #[test]
    fn test_content_and_structure_events_invalidate() {
        let mut cache = ThumbnailCache::new(4);
        fill(&mut cache, 1);
        fill(&mut cache, 2);
        cache.on_event(&EditorEvent::ObjectUpdated { id: ObjectId::new(), page: 2 });
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        cache.on_event(&EditorEvent::PagesChanged { page_count: 3 });
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_render_is_refused() {
        let mut cache = ThumbnailCache::new(4);
        let started = cache.generation(1);
        cache.invalidate(1);
        assert!(!cache.insert(1, started, thumb()));

        let started = cache.generation(2);
        cache.invalidate_all();
        assert!(!cache.insert(2, started, thumb()));
        assert!(cache.is_empty());
    }
}

use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::document::Bookmark;
use crate::element::{DrawableObject, ObjectKind};
use crate::layer::Layer;
use crate::state::PageChange;

/// Explicit deep value copy for snapshotting.
///
/// Implementations copy every persistent field and leave out derived handles
/// (decoded images and the like), which are rebuilt on restore.
pub trait SnapshotCopy {
    fn snapshot_copy(&self) -> Self;
}

impl SnapshotCopy for DrawableObject {
    fn snapshot_copy(&self) -> Self {
        let kind = match &self.kind {
            ObjectKind::Image(image) => ObjectKind::Image(image.detached()),
            other => other.clone(),
        };
        Self {
            id: self.id,
            page: self.page,
            layer_id: self.layer_id,
            created_ms: self.created_ms,
            modified_ms: self.modified_ms,
            kind,
        }
    }
}

impl SnapshotCopy for Layer {
    fn snapshot_copy(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            visible: self.visible,
            locked: self.locked,
            opacity: self.opacity,
            blend: self.blend,
        }
    }
}

impl SnapshotCopy for Bookmark {
    fn snapshot_copy(&self) -> Self {
        Self {
            id: self.id,
            page: self.page,
            title: self.title.clone(),
        }
    }
}

impl<T: SnapshotCopy> SnapshotCopy for Vec<T> {
    fn snapshot_copy(&self) -> Self {
        self.iter().map(SnapshotCopy::snapshot_copy).collect()
    }
}

/// The undoable part of the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotContent {
    pub objects: Vec<DrawableObject>,
    pub layers: Vec<crate::layer::Layer>,
    pub bookmarks: Vec<Bookmark>,
    /// Background fill per page, indexed by page number - 1
    pub backgrounds: Vec<Option<Color32>>,
    pub current_page: usize,
}

impl SnapshotContent {
    /// Serialized form used to compare content, with edit timestamps left out so that
    /// an edit which puts everything back compares equal
    pub fn fingerprint(&self) -> Option<Vec<u8>> {
        let mut unstamped = self.clone();
        for object in &mut unstamped.objects {
            object.modified_ms = 0;
        }
        match serde_json::to_vec(&unstamped) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("Could not serialize snapshot content: {}", e);
                None
            }
        }
    }

    /// Carry the content across a page edit.
    ///
    /// Objects and bookmarks on a removed page are dropped. Backgrounds follow their pages
    /// and the current page is remapped the way the live view is.
    pub fn remap_pages(&mut self, change: PageChange, page_count: usize) {
        self.objects.retain_mut(|object| match change.remap(object.page) {
            Some(page) => {
                object.page = page;
                true
            }
            None => false,
        });
        self.bookmarks.retain_mut(|bookmark| match change.remap(bookmark.page) {
            Some(page) => {
                bookmark.page = page;
                true
            }
            None => false,
        });

        let mut backgrounds = vec![None; page_count];
        for (index, background) in self.backgrounds.iter().enumerate() {
            let page = index + 1;
            let mut targets = vec![change.remap(page)];
            if change == (PageChange::Duplicated { source: page }) {
                targets.push(Some(page + 1));
            }
            for target in targets.into_iter().flatten() {
                if let Some(slot) = target.checked_sub(1).and_then(|i| backgrounds.get_mut(i)) {
                    *slot = *background;
                }
            }
        }
        self.backgrounds = backgrounds;
        self.current_page = change.remap_current(self.current_page, page_count);
    }
}

impl SnapshotCopy for SnapshotContent {
    fn snapshot_copy(&self) -> Self {
        Self {
            objects: self.objects.snapshot_copy(),
            layers: self.layers.snapshot_copy(),
            bookmarks: self.bookmarks.snapshot_copy(),
            backgrounds: self.backgrounds.clone(),
            current_page: self.current_page,
        }
    }
}

/// An immutable history entry
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    content: SnapshotContent,
    label: String,
    timestamp_ms: i64,
}

impl HistorySnapshot {
    pub fn new(content: SnapshotContent, label: impl Into<String>) -> Self {
        Self {
            content,
            label: label.into(),
            timestamp_ms: crate::util::time::now_millis(),
        }
    }

    pub fn content(&self) -> &SnapshotContent {
        &self.content
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub(crate) fn remap_pages(&mut self, change: PageChange, page_count: usize) {
        self.content.remap_pages(change, page_count);
    }
}

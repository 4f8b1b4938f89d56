use egui::{Color32, Vec2};
use uuid::Uuid;

use crate::config::EditorConfig;
use crate::document::{Bookmark, Document, Page, PageInfo};
use crate::element::DrawableObject;
use crate::error::{EditorError, EditorResult};
use crate::event::EditorEvent;
use crate::geometry::Rotation;
use crate::layer::Layer;
use crate::state::scene::{BOOKMARKS_PATH, OBJECTS_PATH, PAGES_PATH, ROOT_PATH, VIEW_PATH};
use crate::state::SceneState;

/// A structural page edit performed by the rasterization collaborator.
/// Page numbers are 1-based and refer to the document before the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageChange {
    /// A blank page was inserted so that it becomes page `at`
    Inserted { at: usize },
    /// A copy of `source` was inserted right after it
    Duplicated { source: usize },
    Deleted { page: usize },
    Moved { from: usize, to: usize },
    Rotated { page: usize },
}

impl PageChange {
    /// Number an existing page has after the edit, `None` if it was removed
    pub fn remap(&self, page: usize) -> Option<usize> {
        match *self {
            Self::Inserted { at } => Some(if page >= at { page + 1 } else { page }),
            Self::Duplicated { source } => Some(if page > source { page + 1 } else { page }),
            Self::Deleted { page: deleted } => {
                if page == deleted {
                    None
                } else if page > deleted {
                    Some(page - 1)
                } else {
                    Some(page)
                }
            }
            Self::Moved { from, to } => Some(if page == from {
                to
            } else if from < to && page > from && page <= to {
                page - 1
            } else if from > to && page >= to && page < from {
                page + 1
            } else {
                page
            }),
            Self::Rotated { .. } => Some(page),
        }
    }

    /// History label for the edit
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "Add page",
            Self::Duplicated { .. } => "Duplicate page",
            Self::Deleted { .. } => "Delete page",
            Self::Moved { .. } => "Move page",
            Self::Rotated { .. } => "Rotate page",
        }
    }

    /// Page to show after the edit when `page` was showing. Deleting the shown page
    /// keeps the same number, which now holds its successor.
    pub fn remap_current(&self, page: usize, page_count: usize) -> usize {
        let page = match *self {
            Self::Deleted { page: deleted } if deleted == page => page,
            _ => self.remap(page).unwrap_or(page),
        };
        page.clamp(1, page_count.max(1))
    }

    fn expected_count(&self, before: usize) -> usize {
        match self {
            Self::Inserted { .. } | Self::Duplicated { .. } => before + 1,
            Self::Deleted { .. } => before.saturating_sub(1),
            Self::Moved { .. } | Self::Rotated { .. } => before,
        }
    }
}

impl SceneState {
    /// Start over with a freshly loaded document: one empty layer, no objects, page 1
    pub fn replace_document(&mut self, document: Document) {
        let layer = Layer::new("Layer 1");
        self.data.active_layer = Some(layer.id);
        self.data.layers = vec![layer];
        self.data.objects.clear();
        self.data.bookmarks.clear();
        self.data.view.page = 1;
        self.data.view.pan = Vec2::ZERO;
        self.selection.clear();
        self.clipboard = Default::default();

        log::info!("Loaded '{}' with {} pages", document.name, document.page_count());
        self.push_event(EditorEvent::DocumentLoaded {
            name: document.name.clone(),
            page_count: document.page_count(),
        });
        self.data.document = document;
        self.push_event(EditorEvent::LayersChanged);
        self.push_event(EditorEvent::PageChanged { page: 1 });
        self.commit(ROOT_PATH);
    }

    /// Re-derive pages, object and bookmark bindings after a page edit.
    ///
    /// `infos` is the collaborator's page list after the edit.
    pub fn apply_page_change(&mut self, change: PageChange, infos: &[PageInfo]) {
        let before = self.data.document.page_count();
        if infos.len() != change.expected_count(before) {
            log::warn!(
                "{:?} on {} pages reported {} pages; trusting the collaborator",
                change,
                before,
                infos.len()
            );
        }

        let mut pages: Vec<Page> = infos.iter().map(|info| Page::from_info(*info)).collect();
        for (index, old) in self.data.document.pages.iter().enumerate() {
            let Some(number) = change.remap(index + 1) else {
                continue;
            };
            if let Some(page) = number.checked_sub(1).and_then(|i| pages.get_mut(i)) {
                page.background = old.background;
            }
            if let PageChange::Duplicated { source } = change {
                if source == index + 1 {
                    if let Some(copy) = pages.get_mut(source) {
                        copy.background = old.background;
                    }
                }
            }
        }
        let previous_page = self.data.view.page;

        self.batch(|scene| {
            scene.data.document.pages = pages;
            scene.remap_objects(change);
            scene.data.bookmarks = std::mem::take(&mut scene.data.bookmarks)
                .into_iter()
                .filter_map(|mut b| {
                    b.page = change.remap(b.page)?;
                    Some(b)
                })
                .collect();

            scene.data.view.page = change.remap_current(previous_page, scene.data.document.page_count());
            let dropped = scene.enforce_bindings();
            if dropped > 0 {
                log::warn!("Dropped {} objects after {:?}", dropped, change);
            }
            scene.prune_selection();

            let page_count = scene.data.document.page_count();
            scene.push_event(EditorEvent::PagesChanged { page_count });
            if scene.data.view.page != previous_page {
                scene.push_event(EditorEvent::PageChanged {
                    page: scene.data.view.page,
                });
            }
            scene.notify(BOOKMARKS_PATH);
            scene.commit(PAGES_PATH);
        });
    }

    fn remap_objects(&mut self, change: PageChange) {
        let mut kept = Vec::with_capacity(self.data.objects.len());
        let mut copies = Vec::new();
        for mut object in std::mem::take(&mut self.data.objects) {
            if let PageChange::Duplicated { source } = change {
                if object.page == source {
                    copies.push(object.duplicate_to(source + 1, object.layer_id));
                }
            }
            match change.remap(object.page) {
                None => self.push_event(EditorEvent::ObjectDeleted {
                    id: object.id,
                    page: object.page,
                }),
                Some(page) => {
                    if page != object.page {
                        object.page = page;
                        object.touch();
                        self.push_event(EditorEvent::ObjectUpdated { id: object.id, page });
                    }
                    kept.push(object);
                }
            }
        }
        for copy in &copies {
            self.push_event(EditorEvent::ObjectAdded {
                id: copy.id,
                page: copy.page,
            });
        }
        kept.extend(copies);
        self.data.objects = kept;
        self.commit(OBJECTS_PATH);
    }

    pub fn set_page_background(&mut self, page: usize, color: Option<Color32>) -> EditorResult<()> {
        let target = self.data.document.page_mut(page).ok_or(EditorError::NoSuchPage(page))?;
        if target.background == color {
            return Ok(());
        }
        target.background = color;
        self.push_event(EditorEvent::BackgroundChanged { page });
        self.commit(PAGES_PATH);
        Ok(())
    }

    pub fn page_background(&self, page: usize) -> Option<Color32> {
        self.data.document.page(page).and_then(|p| p.background)
    }

    // ---- Bookmarks --------------------------------------------------------------------

    pub fn add_bookmark(&mut self, page: usize, title: &str) -> EditorResult<Uuid> {
        if !self.data.document.has_page(page) {
            return Err(EditorError::NoSuchPage(page));
        }
        let bookmark = Bookmark::new(page, title);
        let id = bookmark.id;
        self.data.bookmarks.push(bookmark);
        self.commit(BOOKMARKS_PATH);
        Ok(id)
    }

    pub fn rename_bookmark(&mut self, id: Uuid, title: &str) -> bool {
        let Some(bookmark) = self.data.bookmarks.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        bookmark.title = title.to_owned();
        self.commit(BOOKMARKS_PATH);
        true
    }

    pub fn remove_bookmark(&mut self, id: Uuid) -> bool {
        let before = self.data.bookmarks.len();
        self.data.bookmarks.retain(|b| b.id != id);
        if self.data.bookmarks.len() == before {
            return false;
        }
        self.commit(BOOKMARKS_PATH);
        true
    }

    // ---- View -------------------------------------------------------------------------

    /// Navigate to a page, clamped to the document. Returns the page now shown.
    pub fn go_to_page(&mut self, page: usize) -> usize {
        let page = self.data.document.clamp_page(page);
        if page != self.data.view.page {
            self.data.view.page = page;
            self.clear_selection();
            self.push_event(EditorEvent::PageChanged { page });
            self.notify(VIEW_PATH);
        }
        page
    }

    pub fn next_page(&mut self) -> usize {
        self.go_to_page(self.data.view.page + 1)
    }

    pub fn previous_page(&mut self) -> usize {
        self.go_to_page(self.data.view.page.saturating_sub(1))
    }

    /// Set the zoom, clamped to the configured limits. Returns the zoom now in effect.
    pub fn set_zoom(&mut self, zoom: f32, config: &EditorConfig) -> f32 {
        let zoom = config.clamp_zoom(zoom);
        if zoom != self.data.view.zoom {
            self.data.view.zoom = zoom;
            self.push_event(EditorEvent::ZoomChanged { zoom });
            self.notify(VIEW_PATH);
        }
        zoom
    }

    pub fn set_view_rotation(&mut self, rotation: Rotation) {
        if rotation != self.data.view.rotation {
            self.data.view.rotation = rotation;
            self.notify(VIEW_PATH);
        }
    }

    pub fn rotate_view(&mut self, clockwise: bool) {
        let rotation = if clockwise {
            self.data.view.rotation.clockwise()
        } else {
            self.data.view.rotation.counter_clockwise()
        };
        self.set_view_rotation(rotation);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        if delta != Vec2::ZERO {
            self.data.view.pan += delta;
            self.notify(VIEW_PATH);
        }
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        if pan != self.data.view.pan {
            self.data.view.pan = pan;
            self.notify(VIEW_PATH);
        }
    }

    /// Objects grouped by page, in paint order, for exporters
    pub fn objects_by_page(&self) -> Vec<(usize, Vec<&DrawableObject>)> {
        (1..=self.data.document.page_count())
            .map(|page| (page, self.paint_order(page)))
            .collect()
    }

    /// Background fill per page, indexed by page number - 1
    pub fn page_backgrounds(&self) -> Vec<Option<Color32>> {
        self.data.document.pages.iter().map(|p| p.background).collect()
    }
}

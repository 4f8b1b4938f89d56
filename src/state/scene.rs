use egui::Pos2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Bookmark, Document};
use crate::element::{DrawableObject, ObjectId, ObjectKind};
use crate::error::SceneError;
use crate::event::EditorEvent;
use crate::geometry::{PageView, ViewState};
use crate::history::{SnapshotContent, SnapshotCopy};
use crate::layer::{Layer, LayerId};
use crate::state::ToolDefaults;
use crate::util::time;

/// Subscribers to this path hear about every change
pub const ROOT_PATH: &str = "root";

/// Pseudo path notified when the selection changes. Not addressable through `get`/`set`.
pub const SELECTION_PATH: &str = "selection";

pub(crate) const OBJECTS_PATH: &str = "objects";
pub(crate) const LAYERS_PATH: &str = "layers";
pub(crate) const BOOKMARKS_PATH: &str = "bookmarks";
pub(crate) const PAGES_PATH: &str = "document.pages";
pub(crate) const VIEW_PATH: &str = "view";

/// The persistent, path-addressable part of the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SceneData {
    pub document: Document,
    /// Bottom-most layer first
    pub layers: Vec<Layer>,
    pub active_layer: Option<LayerId>,
    /// Paint order within a layer follows this order
    pub objects: Vec<DrawableObject>,
    pub bookmarks: Vec<Bookmark>,
    pub tool_defaults: ToolDefaults,
    pub view: ViewState,
}

/// Handle returned by [`SceneState::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneSubscription(u64);

struct Subscriber {
    id: SceneSubscription,
    path: String,
    callback: Box<dyn FnMut(&str)>,
}

/// Objects copied from the scene, unbound from page and layer
#[derive(Debug, Clone, Default)]
pub(crate) struct Clipboard {
    pub(crate) items: Vec<ObjectKind>,
    /// Pastes since the last copy; each one is offset a step further
    pub(crate) pastes: u32,
}

/// The authoritative editable document.
///
/// All mutation goes through methods on this type so that every committed change bumps
/// the revision, refreshes the document's modified timestamp and notifies path subscribers.
/// Bus events describing the change are collected in an outbox the session drains.
pub struct SceneState {
    pub(crate) data: SceneData,
    pub(crate) selection: Vec<ObjectId>,
    pub(crate) clipboard: Clipboard,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    batch_depth: usize,
    deferred: Vec<String>,
    outbox: Vec<EditorEvent>,
    revision: u64,
    dirty: bool,
}

impl std::fmt::Debug for SceneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneState")
            .field("document", &self.data.document.name)
            .field("pages", &self.data.document.page_count())
            .field("layers", &self.data.layers.len())
            .field("objects", &self.data.objects.len())
            .field("selection", &self.selection)
            .field("subscribers", &format!("<{} subscribers>", self.subscribers.len()))
            .field("revision", &self.revision)
            .finish()
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneState {
    /// An empty scene with a single default layer
    pub fn new() -> Self {
        let layer = Layer::new("Layer 1");
        let data = SceneData {
            active_layer: Some(layer.id),
            layers: vec![layer],
            ..SceneData::default()
        };
        Self::from_data(data)
    }

    pub fn from_data(data: SceneData) -> Self {
        let mut scene = Self {
            data,
            selection: Vec::new(),
            clipboard: Clipboard::default(),
            subscribers: Vec::new(),
            next_subscription: 1,
            batch_depth: 0,
            deferred: Vec::new(),
            outbox: Vec::new(),
            revision: 0,
            dirty: false,
        };
        for object in &mut scene.data.objects {
            object.rehydrate();
        }
        scene.enforce_bindings();
        scene
    }

    pub fn data(&self) -> &SceneData {
        &self.data
    }

    pub fn document(&self) -> &Document {
        &self.data.document
    }

    pub fn layers(&self) -> &[Layer] {
        &self.data.layers
    }

    pub fn objects(&self) -> &[DrawableObject] {
        &self.data.objects
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.data.bookmarks
    }

    pub fn tool_defaults(&self) -> &ToolDefaults {
        &self.data.tool_defaults
    }

    pub fn view(&self) -> &ViewState {
        &self.data.view
    }

    /// 1-based number of the page being edited
    pub fn current_page(&self) -> usize {
        self.data.view.page
    }

    /// Transform for the current page, or `None` without a document
    pub fn current_page_view(&self) -> Option<PageView> {
        self.page_view(self.data.view.page)
    }

    pub fn page_view(&self, page: usize) -> Option<PageView> {
        let info = self.data.document.page(page)?;
        Some(PageView::new(&self.data.view, info.size(), info.rotation))
    }

    /// Incremented by every committed mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True once a checkpoint has been recorded since load or the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn object(&self, id: ObjectId) -> Option<&DrawableObject> {
        self.data.objects.iter().find(|o| o.id == id)
    }

    pub fn object_index(&self, id: ObjectId) -> Option<usize> {
        self.data.objects.iter().position(|o| o.id == id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.data.layers.iter().find(|l| l.id == id)
    }

    pub fn objects_on_page(&self, page: usize) -> impl Iterator<Item = &DrawableObject> {
        self.data.objects.iter().filter(move |o| o.page == page)
    }

    /// Whether the object exists and sits on a visible, unlocked layer
    pub fn is_editable(&self, id: ObjectId) -> bool {
        self.object(id)
            .and_then(|o| self.layer(o.layer_id))
            .is_some_and(Layer::is_editable)
    }

    /// Objects of `page` on visible layers, bottom-most first
    pub fn paint_order(&self, page: usize) -> Vec<&DrawableObject> {
        let mut ordered = Vec::new();
        for layer in self.data.layers.iter().filter(|l| l.visible) {
            ordered.extend(
                self.data
                    .objects
                    .iter()
                    .filter(|o| o.page == page && o.layer_id == layer.id),
            );
        }
        ordered
    }

    /// Topmost editable object under `pos` (document space)
    pub fn topmost_at(&self, page: usize, pos: Pos2, slop: f32) -> Option<ObjectId> {
        self.paint_order(page)
            .into_iter()
            .rev()
            .filter(|o| self.layer(o.layer_id).is_some_and(Layer::is_editable))
            .find(|o| o.hit_test(pos, slop))
            .map(|o| o.id)
    }

    // ---- Path-addressed access --------------------------------------------------------

    /// Read a value by dotted path, e.g. `tool_defaults.stroke_width` or `objects.0.page`
    pub fn get(&self, path: &str) -> Result<Value, SceneError> {
        let root = serde_json::to_value(&self.data)?;
        if path == ROOT_PATH {
            return Ok(root);
        }
        root.pointer(&json_pointer(path))
            .cloned()
            .ok_or_else(|| SceneError::UnknownPath(path.to_owned()))
    }

    /// Write a value by dotted path and notify subscribers of that path.
    ///
    /// The value must deserialize into the slot's type; on failure the scene is unchanged.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), SceneError> {
        let mut root = serde_json::to_value(&self.data)?;
        if path == ROOT_PATH {
            root = value;
        } else {
            let slot = root
                .pointer_mut(&json_pointer(path))
                .ok_or_else(|| SceneError::UnknownPath(path.to_owned()))?;
            *slot = value;
        }

        let mut data: SceneData = serde_json::from_value(root).map_err(|source| SceneError::InvalidValue {
            path: path.to_owned(),
            source,
        })?;

        if path == ROOT_PATH || is_within(OBJECTS_PATH, path) {
            for object in &mut data.objects {
                object.rehydrate();
            }
        } else {
            // Untouched objects keep their decoded image handles
            data.objects = std::mem::take(&mut self.data.objects);
        }
        self.data = data;
        self.enforce_bindings();
        self.prune_selection();

        if is_content_path(path) {
            self.commit(path);
        } else {
            self.notify(path);
        }
        Ok(())
    }

    /// Subscribe to changes at `path`, its ancestors or descendants; `"root"` hears everything
    pub fn subscribe(&mut self, path: &str, callback: impl FnMut(&str) + 'static) -> SceneSubscription {
        let id = SceneSubscription(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            id,
            path: path.to_owned(),
            callback: Box::new(callback),
        });
        id
    }

    pub fn unsubscribe(&mut self, subscription: SceneSubscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != subscription);
        self.subscribers.len() != before
    }

    // ---- Batching ---------------------------------------------------------------------

    /// Run `f` with notifications deferred; each changed path is announced once afterwards
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch();
        let result = f(self);
        self.end_batch();
        result
    }

    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            log::warn!("end_batch called without a matching begin_batch");
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            let deferred = std::mem::take(&mut self.deferred);
            for path in deferred {
                self.deliver(&path);
            }
        }
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    // ---- Mutation plumbing ------------------------------------------------------------

    /// Record a committed mutation at `path`
    pub(crate) fn commit(&mut self, path: &str) {
        self.revision += 1;
        self.data.document.modified_ms = time::now_millis();
        self.notify(path);
    }

    /// Announce a change without committing it (view, defaults, selection)
    pub(crate) fn notify(&mut self, path: &str) {
        if self.batch_depth > 0 {
            if !self.deferred.iter().any(|p| p == path) {
                self.deferred.push(path.to_owned());
            }
            return;
        }
        self.deliver(path);
    }

    fn deliver(&mut self, path: &str) {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        for subscriber in subscribers.iter_mut() {
            if path_matches(&subscriber.path, path) {
                (subscriber.callback)(path);
            }
        }
        subscribers.append(&mut self.subscribers);
        self.subscribers = subscribers;
    }

    pub(crate) fn push_event(&mut self, event: EditorEvent) {
        self.outbox.push(event);
    }

    /// Bus events produced since the last call, in mutation order
    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Keep `page`/`layer_id` references valid. Returns how many objects were dropped.
    pub(crate) fn enforce_bindings(&mut self) -> usize {
        if self.data.layers.is_empty() {
            self.data.layers.push(Layer::new("Layer 1"));
        }
        let active_valid = self
            .data
            .active_layer
            .is_some_and(|id| self.data.layers.iter().any(|l| l.id == id));
        if !active_valid {
            self.data.active_layer = self.data.layers.last().map(|l| l.id);
        }

        let document = &self.data.document;
        let layers = &self.data.layers;
        let before = self.data.objects.len();
        self.data.objects.retain(|o| {
            let keep = document.has_page(o.page) && layers.iter().any(|l| l.id == o.layer_id);
            if !keep {
                log::warn!("Dropping object {} bound to page {} / layer {}", o.id, o.page, o.layer_id);
            }
            keep
        });
        self.data.bookmarks.retain(|b| document.has_page(b.page));
        self.data.view.page = document.clamp_page(self.data.view.page);
        before - self.data.objects.len()
    }

    pub(crate) fn prune_selection(&mut self) {
        let objects = &self.data.objects;
        self.selection.retain(|id| objects.iter().any(|o| o.id == *id));
    }

    // ---- History support --------------------------------------------------------------

    /// Value copy of everything undo covers
    pub fn capture_content(&self) -> SnapshotContent {
        SnapshotContent {
            objects: self.data.objects.snapshot_copy(),
            layers: self.data.layers.snapshot_copy(),
            bookmarks: self.data.bookmarks.snapshot_copy(),
            backgrounds: self.data.document.pages.iter().map(|p| p.background).collect(),
            current_page: self.data.view.page,
        }
    }

    /// Replace undoable state with a copy of `content`.
    ///
    /// Page geometry is not part of history: backgrounds beyond the current page count are
    /// ignored, the current page is clamped and objects on missing pages are dropped.
    pub fn apply_content(&mut self, content: &SnapshotContent) {
        let content = content.snapshot_copy();
        let previous_page = self.data.view.page;
        let had_selection = !self.selection.is_empty();

        self.data.objects = content.objects;
        for object in &mut self.data.objects {
            object.rehydrate();
        }
        self.data.layers = content.layers;
        self.data.bookmarks = content.bookmarks;
        for (page, background) in self.data.document.pages.iter_mut().zip(content.backgrounds) {
            page.background = background;
        }
        if content.current_page != self.data.document.clamp_page(content.current_page) {
            log::warn!("Restored page {} is out of range; clamping", content.current_page);
        }
        self.data.view.page = content.current_page;
        let dropped = self.enforce_bindings();
        if dropped > 0 {
            log::warn!("Dropped {} restored objects referencing missing pages or layers", dropped);
        }
        self.selection.clear();

        if had_selection {
            self.push_event(EditorEvent::SelectionChanged { selected: Vec::new() });
        }
        self.push_event(EditorEvent::LayersChanged);
        if self.data.view.page != previous_page {
            self.push_event(EditorEvent::PageChanged { page: self.data.view.page });
        }
        self.commit(ROOT_PATH);
    }
}

/// Dotted path to JSON pointer
fn json_pointer(path: &str) -> String {
    path.split('.')
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

/// `path` equals `ancestor` or lies beneath it
fn is_within(ancestor: &str, path: &str) -> bool {
    path == ancestor
        || (path.len() > ancestor.len() && path.starts_with(ancestor) && path.as_bytes()[ancestor.len()] == b'.')
}

fn path_matches(subscribed: &str, changed: &str) -> bool {
    subscribed == ROOT_PATH || changed == ROOT_PATH || is_within(subscribed, changed) || is_within(changed, subscribed)
}

/// Paths whose changes are document content rather than view or tool settings
pub fn is_content_path(path: &str) -> bool {
    !(is_within(VIEW_PATH, path) || is_within("tool_defaults", path) || is_within(SELECTION_PATH, path))
}

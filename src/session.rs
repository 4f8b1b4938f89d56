//! The editing session: owns the scene and everything that acts on it.
//!
//! Input is routed to the active tool, the resulting checkpoints are recorded, and scene
//! events are forwarded to the bus after every operation. Collaborator work (page edits,
//! text extraction, OCR, thumbnails, export) is started here and handed back to the
//! caller as a future; whatever drives it passes the [`Completion`] back to
//! [`EditorSession::complete`].

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use egui::{Key, Modifiers, Pos2, Rect, Vec2};
use futures::future::{self, LocalBoxFuture};
use image::RgbaImage;
use log::{debug, info, warn};

use crate::collaborator::{CollaboratorResult, Ocr, Rasterizer, RenderViewport, TextRun};
use crate::config::EditorConfig;
use crate::document::{Document, Page, PageInfo};
use crate::element::{DrawableObject, PendingImage};
use crate::error::{CollaboratorError, EditorError, EditorResult};
use crate::event::{EditorEvent, EventBus, EventHandler, NotificationLevel, Subscription};
use crate::geometry::{PageView, Rotation};
use crate::history::HistoryEngine;
use crate::input::InputEvent;
use crate::renderer::{Compositor, Frame, RedrawOutcome, ThumbnailCache, raster};
use crate::state::{PageChange, PersistenceResult, SceneState};
use crate::tools::{DispatchOutcome, KeyEvent, PointerInput, ToolDispatcher, ToolKind};

/// Scale at which pages are rendered for text recognition
const OCR_SCALE: f32 = 2.0;

/// A future the host must drive to completion and hand back
pub type PendingWork = LocalBoxFuture<'static, Completion>;

/// Which collaborator produced a batch of text runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Extracted,
    Recognized,
}

/// Result of collaborator work started by the session
#[derive(Debug)]
pub enum Completion {
    Pages {
        change: PageChange,
        result: CollaboratorResult<Vec<PageInfo>>,
    },
    Text {
        page: usize,
        source: TextSource,
        result: CollaboratorResult<Vec<TextRun>>,
    },
    Thumbnail {
        page: usize,
        generation: u64,
        result: EditorResult<RgbaImage>,
    },
}

/// Reject documents by name and size before anything is mutated
pub fn validate_upload(name: &str, byte_size: u64, config: &EditorConfig) -> EditorResult<()> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !config.accepted_extensions.iter().any(|accepted| *accepted == extension) {
        return Err(EditorError::UnsupportedFileType(name.to_owned()));
    }
    if byte_size > config.max_file_bytes {
        return Err(EditorError::FileTooLarge {
            size: byte_size,
            limit: config.max_file_bytes,
        });
    }
    Ok(())
}

/// Identity of a base raster: anything that changes its pixels
#[derive(Debug, Clone, Copy, PartialEq)]
struct RasterKey {
    page: usize,
    page_size: Vec2,
    scale: f32,
    rotation: Rotation,
}

impl RasterKey {
    fn viewport(&self) -> RenderViewport {
        RenderViewport {
            region: Rect::from_min_size(Pos2::ZERO, self.page_size),
            scale: self.scale,
            rotation: self.rotation,
        }
    }
}

/// The current page's raster, shared with in-flight redraw passes
#[derive(Debug, Default)]
struct BaseRaster {
    wanted: Option<RasterKey>,
    current: Option<(RasterKey, Arc<RgbaImage>)>,
    /// Bumped whenever `current` is replaced
    version: u64,
    /// Key whose rasterization failed; not retried until the key changes
    failed: Option<RasterKey>,
    errors: Vec<CollaboratorError>,
}

impl BaseRaster {
    fn is_satisfied(&self) -> bool {
        match self.wanted {
            None => true,
            Some(key) => self.current.as_ref().is_some_and(|(k, _)| *k == key) || self.failed == Some(key),
        }
    }
}

pub struct EditorSession {
    scene: SceneState,
    history: HistoryEngine,
    dispatcher: ToolDispatcher,
    config: EditorConfig,
    bus: EventBus,
    rasterizer: Rc<dyn Rasterizer>,
    ocr: Rc<dyn Ocr>,
    compositor: Compositor,
    base: Rc<RefCell<BaseRaster>>,
    thumbnails: ThumbnailCache,
    processing: bool,
    pixels_per_point: f32,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("scene", &self.scene)
            .field("history", &self.history.len())
            .field("tool", &self.dispatcher.active_kind())
            .field("processing", &self.processing)
            .finish()
    }
}

impl EditorSession {
    pub fn new(rasterizer: Rc<dyn Rasterizer>, ocr: Rc<dyn Ocr>, config: EditorConfig) -> Self {
        Self {
            scene: SceneState::new(),
            history: HistoryEngine::new(config.history_capacity),
            dispatcher: ToolDispatcher::new(),
            thumbnails: ThumbnailCache::new(config.thumbnail_capacity),
            config,
            bus: EventBus::new(),
            rasterizer,
            ocr,
            compositor: Compositor::new(),
            base: Rc::new(RefCell::new(BaseRaster::default())),
            processing: false,
            pixels_per_point: 1.0,
        }
    }

    // ---- Accessors --------------------------------------------------------------------

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn active_tool(&self) -> ToolKind {
        self.dispatcher.active_kind()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn subscribe(&self, handler: impl EventHandler + 'static) -> Subscription {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.bus.unsubscribe(subscription)
    }

    // ---- Event plumbing ---------------------------------------------------------------

    /// Forward scene events to the bus, keeping render caches in step
    fn flush(&mut self) {
        for event in self.scene.take_events() {
            self.thumbnails.on_event(&event);
            self.bus.emit(event);
        }
        let errors = std::mem::take(&mut self.base.borrow_mut().errors);
        for error in errors {
            self.report(&EditorError::Collaborator(error));
        }
        self.sync_base_key();
    }

    /// Surface a failure to the user. Nothing is mutated.
    fn report(&self, error: &EditorError) {
        let level = match error {
            EditorError::Collaborator(_) | EditorError::ImageDecode(_) => NotificationLevel::Error,
            EditorError::Busy => NotificationLevel::Info,
            _ => NotificationLevel::Warning,
        };
        warn!("{}", error);
        self.bus.emit(EditorEvent::Notification {
            level,
            message: error.to_string(),
        });
    }

    fn checkpoint(&mut self, label: &str) {
        if self.history.checkpoint(&mut self.scene, label) {
            self.bus.emit(self.history.status_event());
        }
    }

    fn apply_outcome(&mut self, outcome: DispatchOutcome) -> bool {
        for label in &outcome.checkpoints {
            self.checkpoint(label);
        }
        self.flush();
        outcome.consumed
    }

    fn set_processing(&mut self, processing: bool) {
        if self.processing != processing {
            self.processing = processing;
            self.bus.emit(EditorEvent::ProcessingChanged { processing });
        }
    }

    // ---- Document ---------------------------------------------------------------------

    /// Open the document currently held by the rasterizer.
    ///
    /// Validation happens before anything changes; on success history restarts from
    /// the freshly loaded state.
    pub fn load_document(&mut self, name: &str, byte_size: u64) -> EditorResult<()> {
        if let Err(e) = validate_upload(name, byte_size, &self.config) {
            self.report(&e);
            return Err(e);
        }
        let pages: Vec<Page> = self.rasterizer.pages().into_iter().map(Page::from_info).collect();
        if pages.is_empty() {
            let e = EditorError::NoDocument;
            self.report(&e);
            return Err(e);
        }

        let _ = self.dispatcher.set_active(&mut self.scene, &self.config, ToolKind::Select);
        self.scene.replace_document(Document::new(name, byte_size, pages));
        self.history.reset(&mut self.scene, "Open document");
        self.thumbnails.invalidate_all();
        self.flush();
        self.bus.emit(self.history.status_event());
        Ok(())
    }

    pub fn has_document(&self) -> bool {
        self.scene.document().page_count() > 0
    }

    /// Serialized scene for external storage
    pub fn save_state(&mut self) -> PersistenceResult<String> {
        let json = self.scene.serialize()?;
        self.scene.mark_saved();
        self.bus.emit(EditorEvent::DocumentSaved {
            name: self.scene.document().name.clone(),
        });
        Ok(json)
    }

    /// Replace the scene with a stored one; history restarts from it
    pub fn restore_state(&mut self, json: &str) -> PersistenceResult<()> {
        self.scene.restore_serialized(json)?;
        self.history.reset(&mut self.scene, "Restore session");
        self.thumbnails.invalidate_all();
        self.flush();
        Ok(())
    }

    // ---- Input ------------------------------------------------------------------------

    /// Route one input event. Returns whether it was consumed.
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        if !self.has_document() {
            return false;
        }
        let outcome = match event {
            InputEvent::PointerDown {
                location,
                button,
                modifiers,
                pressure,
                time_ms,
            } => {
                if !location.in_canvas {
                    return false;
                }
                let input = PointerInput {
                    pos: location.position,
                    modifiers,
                    pressure,
                    time_ms,
                    button,
                };
                self.dispatcher.pointer_down(&mut self.scene, &self.config, input)
            }
            InputEvent::PointerMove {
                location,
                modifiers,
                pressure,
                time_ms,
            } => {
                let input = PointerInput {
                    pos: location.position,
                    modifiers,
                    pressure,
                    time_ms,
                    button: egui::PointerButton::Primary,
                };
                self.dispatcher.pointer_move(&mut self.scene, &self.config, input)
            }
            InputEvent::PointerUp {
                location,
                button,
                modifiers,
                time_ms,
            } => {
                let input = PointerInput {
                    pos: location.position,
                    modifiers,
                    pressure: None,
                    time_ms,
                    button,
                };
                self.dispatcher.pointer_up(&mut self.scene, &self.config, input)
            }
            InputEvent::DoubleClick { location, modifiers } => {
                if !location.in_canvas {
                    return false;
                }
                self.dispatcher.double_click(&mut self.scene, &self.config, location.position, modifiers)
            }
            InputEvent::PointerLeave {
                last_known_location,
                time_ms,
            } => self.dispatcher.pointer_leave(&mut self.scene, &self.config, last_known_location.position, time_ms),
            InputEvent::KeyDown { key, modifiers } => {
                if self.shortcut(key, modifiers) {
                    return true;
                }
                let key = KeyEvent { key, modifiers };
                self.dispatcher.key_down(&mut self.scene, &self.config, &key)
            }
            InputEvent::KeyUp { key, modifiers } => {
                let key = KeyEvent { key, modifiers };
                self.dispatcher.key_up(&mut self.scene, &self.config, &key)
            }
            InputEvent::Text(text) => self.dispatcher.text(&mut self.scene, &self.config, &text),
            InputEvent::Zoom { factor } => {
                let zoom = self.scene.view().zoom * factor;
                self.set_zoom(zoom);
                return true;
            }
        };
        self.apply_outcome(outcome)
    }

    /// Session-wide command shortcuts, seen before the active tool
    fn shortcut(&mut self, key: Key, modifiers: Modifiers) -> bool {
        if !modifiers.command {
            return false;
        }
        if self.dispatcher.in_pointer_session() {
            debug!("Ignoring shortcut {:?} during a pointer gesture", key);
            return true;
        }
        // Text editing keeps its own clipboard and select-all
        if self.dispatcher.active_kind() == ToolKind::Text && self.dispatcher.is_tool_busy() {
            return false;
        }
        match key {
            Key::Z if modifiers.shift => {
                self.redo();
            }
            Key::Z => {
                self.undo();
            }
            Key::Y => {
                self.redo();
            }
            Key::C => {
                self.copy();
            }
            Key::X => {
                self.cut();
            }
            Key::V => {
                self.paste();
            }
            Key::D => {
                self.duplicate();
            }
            Key::A => self.select_all(),
            _ => return false,
        }
        true
    }

    // ---- Tools ------------------------------------------------------------------------

    pub fn set_tool(&mut self, kind: ToolKind) {
        let outcome = self.dispatcher.set_active(&mut self.scene, &self.config, kind);
        self.apply_outcome(outcome);
    }

    /// Decode an image and arm the image (or signature) tool with it
    pub fn place_image(&mut self, bytes: Vec<u8>, signature: bool) -> EditorResult<()> {
        let image = match PendingImage::decode(bytes, signature) {
            Ok(image) => image,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };
        let outcome = self.dispatcher.set_pending_image(&mut self.scene, &self.config, image);
        self.apply_outcome(outcome);
        Ok(())
    }

    /// Change a tool default (or any other path-addressed setting)
    pub fn set_setting(&mut self, path: &str, value: serde_json::Value) -> Result<(), crate::error::SceneError> {
        let result = self.scene.set(path, value);
        self.flush();
        result
    }

    // ---- History ----------------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo(&mut self.scene);
        if undone {
            self.bus.emit(self.history.status_event());
        }
        self.flush();
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.history.redo(&mut self.scene);
        if redone {
            self.bus.emit(self.history.status_event());
        }
        self.flush();
        redone
    }

    // ---- Scene edits ------------------------------------------------------------------

    /// Run a scene mutation and record it as one undo step
    pub fn edit<R>(&mut self, label: &str, f: impl FnOnce(&mut SceneState) -> R) -> R {
        let result = f(&mut self.scene);
        self.checkpoint(label);
        self.flush();
        result
    }

    /// Fallible variant of [`edit`](Self::edit); a rejected edit is reported, not recorded
    pub fn try_edit<R>(&mut self, label: &str, f: impl FnOnce(&mut SceneState) -> EditorResult<R>) -> EditorResult<R> {
        match f(&mut self.scene) {
            Ok(value) => {
                self.checkpoint(label);
                self.flush();
                Ok(value)
            }
            Err(e) => {
                self.flush();
                self.report(&e);
                Err(e)
            }
        }
    }

    /// A view-only change: no checkpoint
    fn view_edit<R>(&mut self, f: impl FnOnce(&mut SceneState, &EditorConfig) -> R) -> R {
        let result = f(&mut self.scene, &self.config);
        self.flush();
        result
    }

    pub fn copy(&mut self) -> usize {
        self.view_edit(|scene, _| scene.copy_selection())
    }

    pub fn cut(&mut self) -> usize {
        self.edit("Cut", SceneState::cut_selection)
    }

    pub fn paste(&mut self) -> usize {
        let offset = self.config.paste_offset;
        self.edit("Paste", |scene| scene.paste(offset)).len()
    }

    pub fn duplicate(&mut self) -> usize {
        let offset = self.config.paste_offset;
        self.edit("Duplicate", |scene| scene.duplicate_selection(offset)).len()
    }

    pub fn delete_selection(&mut self) -> usize {
        self.edit("Delete", SceneState::delete_selection)
    }

    pub fn select_all(&mut self) {
        self.view_edit(|scene, _| scene.select_all());
    }

    pub fn align_selection(&mut self, alignment: crate::state::Alignment) -> bool {
        self.edit("Align", |scene| scene.align_selection(alignment))
    }

    pub fn distribute_selection(&mut self, axis: crate::state::Axis) -> bool {
        self.edit("Distribute", |scene| scene.distribute_selection(axis))
    }

    pub fn delete_layer(&mut self, id: crate::layer::LayerId) -> EditorResult<usize> {
        self.try_edit("Delete layer", |scene| scene.delete_layer(id))
    }

    // ---- View -------------------------------------------------------------------------

    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.view_edit(|scene, _| scene.go_to_page(page))
    }

    pub fn next_page(&mut self) -> usize {
        self.view_edit(|scene, _| scene.next_page())
    }

    pub fn previous_page(&mut self) -> usize {
        self.view_edit(|scene, _| scene.previous_page())
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.view_edit(|scene, config| scene.set_zoom(zoom, config))
    }

    pub fn rotate_view(&mut self, clockwise: bool) {
        self.view_edit(|scene, _| scene.rotate_view(clockwise));
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.view_edit(|scene, _| scene.pan_by(delta));
    }

    // ---- Page management --------------------------------------------------------------

    fn check_page(&self, page: usize) -> EditorResult<()> {
        if !self.has_document() {
            return Err(EditorError::NoDocument);
        }
        if !self.scene.document().has_page(page) {
            return Err(EditorError::NoSuchPage(page));
        }
        Ok(())
    }

    /// Start a structural page edit. Rejected while another one is in flight.
    fn begin_page_op(
        &mut self,
        change: PageChange,
        validate: impl FnOnce(&Self) -> EditorResult<()>,
        start: impl FnOnce(&dyn Rasterizer) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>>,
    ) -> EditorResult<PendingWork> {
        let checked = if self.processing {
            Err(EditorError::Busy)
        } else {
            validate(self)
        };
        if let Err(e) = checked {
            self.report(&e);
            return Err(e);
        }

        // Pending edits on the old numbering are settled first
        let outcome = self.dispatcher.settle(&mut self.scene, &self.config);
        self.apply_outcome(outcome);

        info!("Starting page operation {:?}", change);
        self.set_processing(true);
        let request = start(self.rasterizer.as_ref());
        Ok(Box::pin(async move {
            let result = request.await;
            Completion::Pages { change, result }
        }))
    }

    /// Insert a blank page so that it becomes page `at`
    pub fn add_page(&mut self, at: usize) -> EditorResult<PendingWork> {
        self.begin_page_op(
            PageChange::Inserted { at },
            |session| {
                let count = session.scene.document().page_count();
                if !session.has_document() {
                    Err(EditorError::NoDocument)
                } else if at == 0 || at > count + 1 {
                    Err(EditorError::NoSuchPage(at))
                } else {
                    Ok(())
                }
            },
            |rasterizer| rasterizer.add_page(at),
        )
    }

    pub fn duplicate_page(&mut self, page: usize) -> EditorResult<PendingWork> {
        self.begin_page_op(
            PageChange::Duplicated { source: page },
            |session| session.check_page(page),
            |rasterizer| rasterizer.duplicate_page(page),
        )
    }

    /// Delete a page; its objects and bookmarks go with it. The last page is kept.
    pub fn delete_page(&mut self, page: usize) -> EditorResult<PendingWork> {
        self.begin_page_op(
            PageChange::Deleted { page },
            |session| {
                session.check_page(page)?;
                if session.scene.document().page_count() <= 1 {
                    return Err(EditorError::LastPage);
                }
                Ok(())
            },
            |rasterizer| rasterizer.delete_page(page),
        )
    }

    pub fn reorder_pages(&mut self, from: usize, to: usize) -> EditorResult<PendingWork> {
        self.begin_page_op(
            PageChange::Moved { from, to },
            |session| {
                session.check_page(from)?;
                session.check_page(to)
            },
            |rasterizer| rasterizer.reorder_pages(from, to),
        )
    }

    /// Turn a page a quarter clockwise or counter-clockwise
    pub fn rotate_page(&mut self, page: usize, clockwise: bool) -> EditorResult<PendingWork> {
        let current = self.scene.document().page(page).map(|p| p.rotation).unwrap_or_default();
        let rotation = if clockwise { current.clockwise() } else { current.counter_clockwise() };
        self.begin_page_op(
            PageChange::Rotated { page },
            |session| session.check_page(page),
            |rasterizer| rasterizer.rotate_page(page, rotation),
        )
    }

    // ---- Text -------------------------------------------------------------------------

    fn begin_text_op(&mut self, page: usize, source: TextSource) -> EditorResult<PendingWork> {
        let checked = if self.processing {
            Err(EditorError::Busy)
        } else {
            self.check_page(page)
        };
        if let Err(e) = checked {
            self.report(&e);
            return Err(e);
        }
        self.set_processing(true);

        let rasterizer = Rc::clone(&self.rasterizer);
        let ocr = Rc::clone(&self.ocr);
        let page_size = self.scene.document().page(page).map(Page::size).unwrap_or_default();
        Ok(Box::pin(async move {
            let result = match source {
                TextSource::Extracted => rasterizer.extract_page_text(page).await,
                TextSource::Recognized => {
                    let viewport = RenderViewport {
                        region: Rect::from_min_size(Pos2::ZERO, page_size),
                        scale: OCR_SCALE,
                        rotation: Rotation::Deg0,
                    };
                    match rasterizer.render_page_region(page, viewport).await {
                        // Recognizer positions are in raster pixels
                        Ok(pixels) => ocr.recognize(pixels, "eng").await.map(|runs| {
                            runs.into_iter()
                                .map(|run| TextRun {
                                    origin: (run.origin.to_vec2() / OCR_SCALE).to_pos2(),
                                    font_size: run.font_size / OCR_SCALE,
                                    ..run
                                })
                                .collect()
                        }),
                        Err(e) => Err(e),
                    }
                }
            };
            Completion::Text { page, source, result }
        }))
    }

    /// Place the page's embedded text as editable text objects
    pub fn extract_text(&mut self, page: usize) -> EditorResult<PendingWork> {
        self.begin_text_op(page, TextSource::Extracted)
    }

    /// Run OCR over the page and place what it finds as text objects
    pub fn recognize_text(&mut self, page: usize) -> EditorResult<PendingWork> {
        self.begin_text_op(page, TextSource::Recognized)
    }

    // ---- Completions ------------------------------------------------------------------

    /// Apply the result of work started earlier
    pub fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Pages { change, result } => {
                self.set_processing(false);
                match result {
                    Ok(infos) => {
                        self.scene.apply_page_change(change, &infos);
                        self.history.remap_pages(&mut self.scene, change, change.label());
                        self.scene.mark_dirty();
                        self.bus.emit(self.history.status_event());
                        self.flush();
                    }
                    Err(e) => self.report(&EditorError::Collaborator(e)),
                }
            }
            Completion::Text { page, source, result } => {
                self.set_processing(false);
                match result {
                    Ok(runs) => {
                        let label = match source {
                            TextSource::Extracted => "Extract text",
                            TextSource::Recognized => "Recognize text",
                        };
                        if !self.scene.document().has_page(page) {
                            warn!("Page {} disappeared before its text arrived", page);
                            return;
                        }
                        let placed = self.edit(label, |scene| {
                            scene.batch(|scene| {
                                runs.iter()
                                    .filter(|run| !run.text.trim().is_empty())
                                    .filter_map(|run| scene.add_text_run(page, run.origin, &run.text, Some(run.font_size)).ok())
                                    .count()
                            })
                        });
                        info!("Placed {} text runs on page {}", placed, page);
                    }
                    Err(e) => self.report(&EditorError::Collaborator(e)),
                }
            }
            Completion::Thumbnail {
                page,
                generation,
                result,
            } => match result {
                Ok(image) => {
                    self.thumbnails.insert(page, generation, Arc::new(image));
                }
                Err(e) => warn!("Thumbnail of page {} failed: {}", page, e),
            },
        }
    }

    // ---- Rendering --------------------------------------------------------------------

    pub fn set_pixels_per_point(&mut self, pixels_per_point: f32) {
        if pixels_per_point.is_finite() && pixels_per_point > 0.0 {
            self.pixels_per_point = pixels_per_point;
            self.sync_base_key();
        }
    }

    pub fn current_view(&self) -> Option<PageView> {
        self.scene.current_page_view()
    }

    fn sync_base_key(&mut self) {
        let wanted = self.scene.current_page_view().map(|view| RasterKey {
            page: self.scene.current_page(),
            page_size: view.page_size,
            scale: view.zoom() * self.pixels_per_point,
            rotation: view.view.rotation,
        });
        self.base.borrow_mut().wanted = wanted;
    }

    /// Whether the base raster lags behind the view
    pub fn needs_redraw(&self) -> bool {
        !self.base.borrow().is_satisfied()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Bring the base raster up to date with the view. Pans never trigger a new raster.
    pub fn request_redraw(&mut self) -> LocalBoxFuture<'static, RedrawOutcome> {
        self.sync_base_key();
        let rasterizer = Rc::clone(&self.rasterizer);
        let base = Rc::clone(&self.base);
        self.compositor.redraw(move || {
            let rasterizer = Rc::clone(&rasterizer);
            let base = Rc::clone(&base);
            Box::pin(async move {
                let key = {
                    let state = base.borrow();
                    match state.wanted {
                        Some(key) if !state.is_satisfied() => key,
                        _ => return,
                    }
                };
                debug!("Rasterizing page {} at {:.2}", key.page, key.scale);
                let result = rasterizer.render_page_region(key.page, key.viewport()).await;
                let mut state = base.borrow_mut();
                match result {
                    Ok(image) => {
                        state.current = Some((key, image));
                        state.version += 1;
                        state.failed = None;
                    }
                    Err(e) => {
                        state.failed = Some(key);
                        state.errors.push(e);
                    }
                }
            })
        })
    }

    /// Report failures of finished redraw passes
    pub fn finish_redraw(&mut self) {
        self.flush();
    }

    /// Version of the raster [`frame`](Self::frame) carries, for texture caching
    pub fn base_version(&self) -> u64 {
        self.base.borrow().version
    }

    /// Display list of the current page, overlay included. A raster rendered for another
    /// zoom is reused (stretched) until the new one lands.
    pub fn frame(&self) -> Option<Frame> {
        let page = self.scene.current_page();
        let raster = self
            .base
            .borrow()
            .current
            .as_ref()
            .filter(|(key, _)| key.page == page)
            .map(|(_, image)| Arc::clone(image));
        Frame::build(&self.scene, page, raster, self.dispatcher.overlay(&self.scene))
    }

    /// Changes whenever the thumbnail of `page` goes stale
    pub fn thumbnail_generation(&self, page: usize) -> u64 {
        self.thumbnails.generation(page)
    }

    /// Cached thumbnail of `page`, if one is current
    pub fn thumbnail(&mut self, page: usize) -> Option<Arc<RgbaImage>> {
        self.thumbnails.get(page)
    }

    /// Render a thumbnail; stored on completion unless the page changed meanwhile
    pub fn request_thumbnail(&self, page: usize) -> EditorResult<PendingWork> {
        let info = self.scene.document().page(page).ok_or(EditorError::NoSuchPage(page))?;
        let longest = info.width.max(info.height);
        let scale = if longest > 0.0 {
            self.config.thumbnail_size as f32 / longest
        } else {
            1.0
        };
        let generation = self.thumbnails.generation(page);
        let flatten = self.flatten_page(page, scale)?;
        Ok(Box::pin(async move {
            Completion::Thumbnail {
                page,
                generation,
                result: flatten.await,
            }
        }))
    }

    // ---- Export -----------------------------------------------------------------------

    /// Objects grouped by page, in paint order
    pub fn objects_by_page(&self) -> Vec<(usize, Vec<&DrawableObject>)> {
        self.scene.objects_by_page()
    }

    pub fn page_backgrounds(&self) -> Vec<Option<egui::Color32>> {
        self.scene.page_backgrounds()
    }

    /// Flatten a page (base raster and visible layers, no overlays) at `scale` pixels per
    /// document unit
    pub fn flatten_page(&self, page: usize, scale: f32) -> EditorResult<LocalBoxFuture<'static, EditorResult<RgbaImage>>> {
        let mut frame = Frame::build(&self.scene, page, None, Vec::new()).ok_or(EditorError::NoSuchPage(page))?;
        if !(scale.is_finite() && scale > 0.0) {
            return Ok(Box::pin(future::ready(Err(EditorError::Collaborator(
                CollaboratorError::Rasterization(format!("invalid scale {}", scale)),
            )))));
        }
        let viewport = RenderViewport {
            region: Rect::from_min_size(Pos2::ZERO, frame.page_size),
            scale,
            rotation: frame.rotation,
        };
        let request = self.rasterizer.render_page_region(page, viewport);
        Ok(Box::pin(async move {
            frame.base.raster = Some(request.await?);
            Ok(raster::flatten(&frame, scale))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{BlankPages, NoOcr};
    use futures::executor::block_on;

    fn session(pages: usize) -> EditorSession {
        let mut session = EditorSession::new(Rc::new(BlankPages::letter(pages)), Rc::new(NoOcr), EditorConfig::default());
        session.load_document("doc.pdf", 1024).unwrap();
        session
    }

    #[test]
    fn test_upload_validation() {
        let config = EditorConfig::default();
        assert!(validate_upload("Report.PDF", 10, &config).is_ok());
        assert_eq!(
            validate_upload("notes.txt", 10, &config),
            Err(EditorError::UnsupportedFileType("notes.txt".to_owned()))
        );
        assert!(matches!(
            validate_upload("big.pdf", config.max_file_bytes + 1, &config),
            Err(EditorError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_rejected_upload_leaves_scene_untouched() {
        let mut session = session(2);
        let revision = session.scene().revision();
        let notes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&notes);
        session.subscribe(move |e: &EditorEvent| {
            if let EditorEvent::Notification { message, .. } = e {
                sink.borrow_mut().push(message.clone());
            }
        });
        assert!(session.load_document("virus.exe", 10).is_err());
        assert_eq!(session.scene().revision(), revision);
        assert_eq!(notes.borrow().len(), 1);
    }

    #[test]
    fn test_page_operations_are_exclusive() {
        let mut session = session(3);
        let work = session.delete_page(2).unwrap();
        assert!(session.is_processing());
        assert_eq!(session.add_page(1).err(), Some(EditorError::Busy));

        let completion = block_on(work);
        session.complete(completion);
        assert!(!session.is_processing());
        assert_eq!(session.scene().document().page_count(), 2);
    }

    #[test]
    fn test_last_page_cannot_be_deleted() {
        let mut session = session(1);
        assert_eq!(session.delete_page(1).err(), Some(EditorError::LastPage));
        assert!(!session.is_processing());
    }

    #[test]
    fn test_failed_collaborator_keeps_state() {
        let mut session = session(2);
        let revision = session.scene().revision();
        session.complete(Completion::Pages {
            change: PageChange::Deleted { page: 1 },
            result: Err(CollaboratorError::Rasterization("boom".to_owned())),
        });
        assert_eq!(session.scene().revision(), revision);
        assert_eq!(session.scene().document().page_count(), 2);
    }

    #[test]
    fn test_redraw_rasterizes_once_per_zoom() {
        let mut session = session(1);
        assert!(session.needs_redraw());
        assert_eq!(block_on(session.request_redraw()), RedrawOutcome::Rendered { passes: 1 });
        assert!(!session.needs_redraw());
        let version = session.base_version();

        session.pan_by(egui::vec2(30.0, 0.0));
        assert!(!session.needs_redraw());
        session.set_zoom(2.0);
        assert!(session.needs_redraw());
        block_on(session.request_redraw());
        assert_eq!(session.base_version(), version + 1);
        assert!(session.frame().unwrap().base.raster.is_some());
    }

    #[test]
    fn test_thumbnail_round_trip() {
        let mut session = session(2);
        let work = session.request_thumbnail(2).unwrap();
        let completion = block_on(work);
        session.complete(completion);
        let thumb = session.thumbnail(2).unwrap();
        assert_eq!(thumb.height(), session.config().thumbnail_size);

        session.set_zoom(3.0);
        assert!(session.thumbnail(2).is_some());
    }

    #[test]
    fn test_ocr_failure_is_reported() {
        let mut session = session(1);
        let work = session.recognize_text(1).unwrap();
        let completion = block_on(work);
        let revision = session.scene().revision();
        session.complete(completion);
        assert!(!session.is_processing());
        assert_eq!(session.scene().revision(), revision);
    }
}

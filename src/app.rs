use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use egui::{Color32, RichText, Sense, vec2};
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use log::{error, info};

use crate::collaborator::{Ocr, Rasterizer};
use crate::config::EditorConfig;
use crate::event::{EditorEvent, NotificationLevel};
use crate::input::InputHandler;
use crate::renderer::egui_backend::CanvasPainter;
use crate::renderer::{TextureCache, TextureKey};
use crate::session::{Completion, EditorSession, PendingWork};
use crate::tools::ToolKind;

const MAX_NOTIFICATIONS: usize = 4;
const TEXTURE_CAPACITY: usize = 64;

/// What survives a restart. The scene is stored as its own JSON document.
#[derive(serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(default)] // if we add new fields, give them default values when deserializing old state
struct PersistedSession {
    document: String,
    page_count: usize,
    scene: String,
}

/// Desktop and web host for one [`EditorSession`]
pub struct AnnotatorApp {
    session: EditorSession,
    /// Drives collaborator futures on the UI thread
    pool: LocalPool,
    completions: Rc<RefCell<Vec<Completion>>>,
    redraw_done: Rc<Cell<bool>>,
    notifications: Rc<RefCell<VecDeque<(NotificationLevel, String)>>>,
    input: InputHandler,
    textures: TextureCache,
    /// Thumbnail generation each page was last requested at
    thumbnail_requests: HashMap<usize, u64>,
}

impl AnnotatorApp {
    /// Called once before the first frame.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        rasterizer: Rc<dyn Rasterizer>,
        ocr: Rc<dyn Ocr>,
        config: EditorConfig,
        document_name: &str,
        byte_size: u64,
    ) -> Self {
        let page_count = rasterizer.page_count();
        let mut session = EditorSession::new(rasterizer, ocr, config);

        let notifications = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&notifications);
        session.subscribe(move |event: &EditorEvent| {
            if let EditorEvent::Notification { level, message } = event {
                let mut queue = sink.borrow_mut();
                queue.push_back((*level, message.clone()));
                while queue.len() > MAX_NOTIFICATIONS {
                    queue.pop_front();
                }
            }
        });

        if session.load_document(document_name, byte_size).is_ok() {
            let saved = cc
                .storage
                .and_then(|storage| eframe::get_value::<PersistedSession>(storage, eframe::APP_KEY));
            if let Some(saved) = saved.filter(|s| s.document == document_name && s.page_count == page_count) {
                match session.restore_state(&saved.scene) {
                    Ok(()) => info!("Restored previous session of {}", document_name),
                    Err(e) => error!("Could not restore previous session: {}", e),
                }
            }
        }

        Self {
            session,
            pool: LocalPool::new(),
            completions: Rc::new(RefCell::new(Vec::new())),
            redraw_done: Rc::new(Cell::new(false)),
            notifications,
            input: InputHandler::new(),
            textures: TextureCache::new(TEXTURE_CAPACITY),
            thumbnail_requests: HashMap::new(),
        }
    }

    fn spawn(&self, work: PendingWork) {
        let sink = Rc::clone(&self.completions);
        let spawned = self.pool.spawner().spawn_local(async move {
            let completion = work.await;
            sink.borrow_mut().push(completion);
        });
        if let Err(e) = spawned {
            error!("Could not schedule collaborator work: {}", e);
        }
    }

    fn spawn_result(&self, work: crate::error::EditorResult<PendingWork>) {
        // Failures were already reported as notifications
        if let Ok(work) = work {
            self.spawn(work);
        }
    }

    /// Run ready futures and apply what they produced
    fn pump(&mut self, ctx: &egui::Context) {
        self.pool.run_until_stalled();
        let finished: Vec<Completion> = self.completions.borrow_mut().drain(..).collect();
        for completion in finished {
            self.session.complete(completion);
        }
        if self.redraw_done.replace(false) {
            self.session.finish_redraw();
        }

        self.session.set_pixels_per_point(ctx.pixels_per_point());
        if self.session.needs_redraw() && !self.session.compositor().is_rendering() {
            let pass = self.session.request_redraw();
            let done = Rc::clone(&self.redraw_done);
            let spawned = self.pool.spawner().spawn_local(async move {
                pass.await;
                done.set(true);
            });
            if let Err(e) = spawned {
                error!("Could not schedule redraw: {}", e);
            }
        }
        self.pool.run_until_stalled();

        if self.session.is_processing() || self.session.compositor().is_rendering() || self.redraw_done.get() {
            ctx.request_repaint();
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for kind in ToolKind::ALL {
                if ui.selectable_label(self.session.active_tool() == kind, kind.label()).clicked() {
                    self.session.set_tool(kind);
                }
            }
            ui.separator();

            let history = self.session.history();
            let (can_undo, can_redo) = (history.can_undo(), history.can_redo());
            if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
                self.session.undo();
            }
            if ui.add_enabled(can_redo, egui::Button::new("Redo")).clicked() {
                self.session.redo();
            }
            ui.separator();

            let zoom = self.session.scene().view().zoom;
            if ui.button("-").clicked() {
                self.session.set_zoom(zoom / 1.25);
            }
            ui.label(format!("{:.0}%", zoom * 100.0));
            if ui.button("+").clicked() {
                self.session.set_zoom(zoom * 1.25);
            }
            if ui.button("⟲").clicked() {
                self.session.rotate_view(false);
            }
            if ui.button("⟳").clicked() {
                self.session.rotate_view(true);
            }
        });

        ui.horizontal(|ui| {
            let page = self.session.scene().current_page();
            let count = self.session.scene().document().page_count();
            if ui.button("◀").clicked() {
                self.session.previous_page();
            }
            ui.label(format!("Page {} / {}", page, count));
            if ui.button("▶").clicked() {
                self.session.next_page();
            }
            ui.separator();

            ui.add_enabled_ui(!self.session.is_processing(), |ui| {
                if ui.button("Add page").clicked() {
                    let work = self.session.add_page(page + 1);
                    self.spawn_result(work);
                }
                if ui.button("Duplicate page").clicked() {
                    let work = self.session.duplicate_page(page);
                    self.spawn_result(work);
                }
                if ui.button("Delete page").clicked() {
                    let work = self.session.delete_page(page);
                    self.spawn_result(work);
                }
                if ui.button("Rotate page").clicked() {
                    let work = self.session.rotate_page(page, true);
                    self.spawn_result(work);
                }
                if ui.button("Extract text").clicked() {
                    let work = self.session.extract_text(page);
                    self.spawn_result(work);
                }
                if ui.button("OCR").clicked() {
                    let work = self.session.recognize_text(page);
                    self.spawn_result(work);
                }
            });
            if self.session.is_processing() {
                ui.spinner();
            }
        });
    }

    fn layers_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layers");
        let active = self.session.scene().active_layer_id();
        let layers: Vec<_> = self
            .session
            .scene()
            .layers()
            .iter()
            .map(|layer| (layer.id, layer.name.clone(), layer.visible))
            .collect();
        for (id, name, visible) in layers.into_iter().rev() {
            ui.horizontal(|ui| {
                let mut shown = visible;
                if ui.checkbox(&mut shown, "").changed() {
                    let _ = self.session.try_edit("Layer visibility", |scene| scene.set_layer_visible(id, shown));
                }
                if ui.selectable_label(id == active, name).clicked() {
                    let _ = self.session.try_edit("Select layer", |scene| scene.set_active_layer(id));
                }
                if ui.small_button("🗑").clicked() {
                    let _ = self.session.delete_layer(id);
                }
            });
        }
        if ui.button("Add layer").clicked() {
            let name = format!("Layer {}", self.session.scene().layers().len() + 1);
            self.session.edit("Add layer", |scene| scene.add_layer(&name));
        }
    }

    fn pages_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Pages");
        let count = self.session.scene().document().page_count();
        let current = self.session.scene().current_page();
        let size = self.session.config().thumbnail_size as f32;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for page in 1..=count {
                let generation = self.session.thumbnail_generation(page);
                let texture = self.session.thumbnail(page).and_then(|image| {
                    let key = TextureKey::Thumbnail { page, version: generation };
                    self.textures.get_or_upload(ui.ctx(), key, Some(&image)).ok()
                });
                if texture.is_none() && self.thumbnail_requests.get(&page) != Some(&generation) {
                    self.thumbnail_requests.insert(page, generation);
                    let work = self.session.request_thumbnail(page);
                    self.spawn_result(work);
                }

                let clicked = match texture {
                    Some(id) => ui
                        .add(egui::ImageButton::new((id, vec2(size, size) * 0.6)).selected(page == current))
                        .clicked(),
                    None => ui.selectable_label(page == current, format!("Page {}", page)).clicked(),
                };
                if clicked {
                    self.session.go_to_page(page);
                }
            }
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        painter.rect_filled(rect, 0.0, Color32::from_gray(90));

        for event in self.input.process_input(ui.ctx(), rect) {
            self.session.handle_input(event);
        }

        let (Some(view), Some(frame)) = (self.session.current_view(), self.session.frame()) else {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No document",
                egui::FontId::proportional(18.0),
                Color32::WHITE,
            );
            return;
        };
        let canvas = CanvasPainter::new(&painter, view, rect.min);
        canvas.paint_content(&frame, &mut self.textures, self.session.base_version());
        canvas.paint_overlay(&frame.overlay, self.session.config().handle_radius_px);
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let scene = self.session.scene();
            let dirty = if scene.is_dirty() { " (modified)" } else { "" };
            ui.label(format!("{}{}", scene.document().name, dirty));
            ui.separator();
            ui.label(format!("{} selected", scene.selection().len()));
            if let Some((level, message)) = self.notifications.borrow().back() {
                ui.separator();
                let color = match level {
                    NotificationLevel::Info => Color32::LIGHT_BLUE,
                    NotificationLevel::Warning => Color32::YELLOW,
                    NotificationLevel::Error => Color32::LIGHT_RED,
                };
                ui.label(RichText::new(message).color(color));
            }
        });
    }

    fn accept_dropped_images(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|input| input.raw.dropped_files.clone());
        for file in dropped {
            let Some(bytes) = file.bytes else {
                continue;
            };
            let signature = file.name.to_ascii_lowercase().contains("signature");
            let _ = self.session.place_image(bytes.to_vec(), signature);
        }
    }
}

impl eframe::App for AnnotatorApp {
    /// Called by the frame work to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match self.session.save_state() {
            Ok(scene) => {
                let saved = PersistedSession {
                    document: self.session.scene().document().name.clone(),
                    page_count: self.session.scene().document().page_count(),
                    scene,
                };
                eframe::set_value(storage, eframe::APP_KEY, &saved);
            }
            Err(e) => error!("Could not save session: {}", e),
        }
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.textures.begin_frame();
        self.pump(ctx);
        self.accept_dropped_images(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        egui::SidePanel::left("pages").resizable(true).show(ctx, |ui| self.pages_panel(ui));
        egui::SidePanel::right("layers").show(ctx, |ui| self.layers_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));
    }
}

use egui::{PointerButton, Pos2, Rect};
use log::{debug, info};

use crate::element::{DrawableObject, ObjectKind, PendingImage};
use crate::error::EditorError;
use crate::event::{EditorEvent, NotificationLevel};
use crate::renderer::OverlayItem;
use crate::state::SceneState;
use crate::tools::{Tool, ToolContext, ToolEvent, ToolKind};

/// Places a decoded raster image: natural size (clamped) on click, or sized by drag.
///
/// The same tool serves signatures; placed objects carry the flag so exporters can
/// treat them differently.
#[derive(Debug)]
pub struct ImageTool {
    signature: bool,
    pending: Option<PendingImage>,
    drag: Option<(Pos2, Pos2)>,
}

impl ImageTool {
    pub fn new(signature: bool) -> Self {
        Self {
            signature,
            pending: None,
            drag: None,
        }
    }

    /// Queue an image for the next placement, replacing any earlier one
    pub fn set_pending(&mut self, mut image: PendingImage) {
        image.signature = self.signature;
        info!(
            "{} ready to place ({}x{})",
            if self.signature { "Signature" } else { "Image" },
            image.pixels.width(),
            image.pixels.height()
        );
        self.pending = Some(image);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn drag_rect(&self, current: Pos2, keep_aspect: bool) -> Option<Rect> {
        let (anchor, _) = self.drag?;
        let rect = Rect::from_two_pos(anchor, current);
        if !keep_aspect {
            return Some(rect);
        }
        let pending = self.pending.as_ref()?;
        let natural = pending.placement_size(f32::INFINITY);
        let scale = (rect.width() / natural.x).max(rect.height() / natural.y);
        let size = natural * scale;
        let dir = current - anchor;
        let corner = anchor + egui::vec2(size.x * dir.x.signum(), size.y * dir.y.signum());
        Some(Rect::from_two_pos(anchor, corner))
    }
}

impl Tool for ImageTool {
    fn kind(&self) -> ToolKind {
        if self.signature {
            ToolKind::Signature
        } else {
            ToolKind::Image
        }
    }

    fn deactivate(&mut self, _ctx: &mut ToolContext<'_>) {
        self.drag = None;
    }

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if event.button != PointerButton::Primary {
            return;
        }
        if self.pending.is_none() {
            ctx.scene.push_event(EditorEvent::Notification {
                level: NotificationLevel::Info,
                message: EditorError::NoPendingImage.to_string(),
            });
            return;
        }
        self.drag = Some((event.doc_pos, event.doc_pos));
    }

    fn on_pointer_move(&mut self, _ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if let Some((_, current)) = &mut self.drag {
            *current = event.doc_pos;
        }
    }

    fn on_pointer_up(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        let Some((anchor, _)) = self.drag else {
            return;
        };
        let Some(rect) = self.drag_rect(event.doc_pos, event.modifiers.shift) else {
            return;
        };
        self.drag = None;
        let Some(pending) = self.pending.take() else {
            return;
        };

        let dragged = ctx.view.rect_to_view(rect).size();
        let threshold = ctx.config.click_threshold_px;
        let rect = if dragged.x < threshold && dragged.y < threshold {
            Rect::from_min_size(anchor, pending.placement_size(ctx.config.max_placed_image_size))
        } else {
            rect
        };

        let layer = ctx.scene.active_layer_id();
        let object = DrawableObject::new(ctx.page(), layer, ObjectKind::Image(pending.to_object(rect)));
        match ctx.scene.add_object(object) {
            Ok(id) => {
                debug!("Placed image {} at {:?}", id, rect);
                ctx.scene.select(&[id]);
            }
            Err(e) => {
                log::warn!("Could not place image: {}", e);
                self.pending = Some(pending);
            }
        }
    }

    fn overlay(&self, _scene: &SceneState) -> Vec<OverlayItem> {
        self.drag
            .and_then(|(_, current)| self.drag_rect(current, false))
            .map(|rect| vec![OverlayItem::PlacementPreview(rect)])
            .unwrap_or_default()
    }

    fn is_busy(&self) -> bool {
        self.drag.is_some()
    }
}

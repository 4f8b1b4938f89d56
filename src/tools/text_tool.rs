use egui::{Key, PointerButton, Rect, Vec2};
use log::debug;

use crate::element::{DrawableObject, ObjectId, ObjectKind, TextObject};
use crate::renderer::OverlayItem;
use crate::state::SceneState;
use crate::tools::{KeyEvent, Tool, ToolContext, ToolEvent, ToolKind, ToolRequest};

const EDIT_LABEL: &str = "Edit text";

/// Free text boxes.
///
/// A click on empty space creates a box and starts editing it; a click on an existing
/// text object edits that one. Editing ends with Escape, a click elsewhere or a tool
/// switch, which records one checkpoint. A box left empty is removed.
#[derive(Debug, Default)]
pub struct TextTool {
    editing: Option<ObjectId>,
}

impl TextTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn editing(&self) -> Option<ObjectId> {
        self.editing
    }

    /// Open an existing text object for editing
    pub fn begin_editing(&mut self, ctx: &mut ToolContext<'_>, id: ObjectId) -> bool {
        let is_text = ctx
            .scene
            .object(id)
            .is_some_and(|o| matches!(o.kind, ObjectKind::Text(_)));
        if !is_text || !ctx.scene.is_editable(id) {
            return false;
        }
        if self.editing != Some(id) {
            self.finish(ctx);
            debug!("Editing text {}", id);
            self.editing = Some(id);
            ctx.scene.select(&[id]);
        }
        true
    }

    /// Close the edit session
    fn finish(&mut self, ctx: &mut ToolContext<'_>) {
        let Some(id) = self.editing.take() else {
            return;
        };
        let empty = ctx
            .scene
            .object(id)
            .is_some_and(|o| matches!(&o.kind, ObjectKind::Text(t) if t.text.trim().is_empty()));
        if empty {
            debug!("Removing empty text {}", id);
            ctx.scene.remove_object(id);
        }
        ctx.request(ToolRequest::Checkpoint(EDIT_LABEL.to_owned()));
    }

    fn edit(&self, ctx: &mut ToolContext<'_>, f: impl FnOnce(&mut TextObject)) -> bool {
        let Some(id) = self.editing else {
            return false;
        };
        ctx.scene.update_object(id, |o| {
            if let ObjectKind::Text(text) = &mut o.kind {
                f(text);
                text.fit_to_text();
            }
        })
    }

    fn create_at(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        let layer = ctx.scene.active_layer_id();
        if !ctx.scene.layer(layer).is_some_and(|l| l.is_editable()) {
            return;
        }
        let defaults = ctx.scene.tool_defaults();
        let mut text = TextObject::new(
            Rect::from_min_size(event.doc_pos, Vec2::ZERO),
            "",
            defaults.font_size,
            defaults.text_color,
        );
        text.font_family = defaults.font_family.clone();
        text.opacity = defaults.opacity;
        text.fit_to_text();

        let object = DrawableObject::new(ctx.page(), layer, ObjectKind::Text(text));
        match ctx.scene.add_object(object) {
            Ok(id) => {
                self.editing = Some(id);
                ctx.scene.select(&[id]);
            }
            Err(e) => log::warn!("Could not create text box: {}", e),
        }
    }
}

impl Tool for TextTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Text
    }

    fn deactivate(&mut self, ctx: &mut ToolContext<'_>) {
        self.finish(ctx);
    }

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if event.button != PointerButton::Primary {
            return;
        }
        let hit = ctx
            .scene
            .topmost_at(ctx.page(), event.doc_pos, ctx.hit_slop())
            .filter(|id| ctx.scene.object(*id).is_some_and(|o| matches!(o.kind, ObjectKind::Text(_))));

        match hit {
            Some(id) if Some(id) == self.editing => {}
            Some(id) => {
                self.begin_editing(ctx, id);
            }
            None => {
                self.finish(ctx);
                self.create_at(ctx, event);
            }
        }
    }

    fn on_pointer_move(&mut self, _ctx: &mut ToolContext<'_>, _event: &ToolEvent) {}

    fn on_pointer_up(&mut self, _ctx: &mut ToolContext<'_>, _event: &ToolEvent) {}

    fn on_key_down(&mut self, ctx: &mut ToolContext<'_>, key: &KeyEvent) -> bool {
        if self.editing.is_none() {
            return false;
        }
        match key.key {
            Key::Backspace => {
                self.edit(ctx, |t| {
                    t.text.pop();
                });
                true
            }
            Key::Enter => {
                self.edit(ctx, |t| t.text.push('\n'));
                true
            }
            Key::Escape => {
                self.finish(ctx);
                true
            }
            // Everything else arrives as text or belongs to the session
            _ => false,
        }
    }

    fn on_text(&mut self, ctx: &mut ToolContext<'_>, text: &str) -> bool {
        if self.editing.is_none() || text.is_empty() {
            return false;
        }
        self.edit(ctx, |t| t.text.push_str(text))
    }

    fn overlay(&self, scene: &SceneState) -> Vec<OverlayItem> {
        let Some(object) = self.editing.and_then(|id| scene.object(id)) else {
            return Vec::new();
        };
        match &object.kind {
            ObjectKind::Text(text) => {
                let (top, height) = text.caret();
                vec![
                    OverlayItem::SelectionBox(object.geometry_rect()),
                    OverlayItem::TextCaret { top, height },
                ]
            }
            _ => Vec::new(),
        }
    }

    fn is_busy(&self) -> bool {
        self.editing.is_some()
    }
}

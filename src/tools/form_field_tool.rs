use egui::{PointerButton, Pos2, Rect, Vec2};
use log::debug;

use crate::element::{DrawableObject, FormFieldObject, ObjectKind};
use crate::renderer::OverlayItem;
use crate::state::SceneState;
use crate::tools::{Tool, ToolContext, ToolEvent, ToolKind};

#[derive(Debug, Clone, Copy)]
struct Placement {
    anchor: Pos2,
    current: Pos2,
    centered: bool,
}

impl Placement {
    fn rect(&self) -> Rect {
        if self.centered {
            let half = (self.current - self.anchor).abs();
            Rect::from_center_size(self.anchor, half * 2.0)
        } else {
            Rect::from_two_pos(self.anchor, self.current)
        }
    }
}

/// Places interactive form fields.
///
/// A click drops a field of the configured default size at the pointer; a drag sizes
/// it with a live outline. Holding alt grows the field from its center.
#[derive(Debug)]
pub struct FormFieldTool {
    placement: Option<Placement>,
}

impl FormFieldTool {
    pub fn new() -> Self {
        Self { placement: None }
    }

    fn next_name(scene: &SceneState) -> String {
        let count = scene
            .objects()
            .iter()
            .filter(|o| matches!(o.kind, ObjectKind::FormField(_)))
            .count();
        format!("field_{}", count + 1)
    }
}

impl Default for FormFieldTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for FormFieldTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Form
    }

    fn deactivate(&mut self, _ctx: &mut ToolContext<'_>) {
        self.placement = None;
    }

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if event.button != PointerButton::Primary {
            return;
        }
        let layer = ctx.scene.active_layer_id();
        if !ctx.scene.layer(layer).is_some_and(|l| l.is_editable()) {
            return;
        }
        self.placement = Some(Placement {
            anchor: event.doc_pos,
            current: event.doc_pos,
            centered: event.modifiers.alt,
        });
    }

    fn on_pointer_move(&mut self, _ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if let Some(placement) = &mut self.placement {
            placement.current = event.doc_pos;
            placement.centered = event.modifiers.alt;
        }
    }

    fn on_pointer_up(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        let Some(mut placement) = self.placement.take() else {
            return;
        };
        placement.current = event.doc_pos;
        placement.centered = event.modifiers.alt;

        let dragged = ctx.view.rect_to_view(placement.rect()).size();
        let threshold = ctx.config.click_threshold_px;
        let rect = if dragged.x < threshold && dragged.y < threshold {
            let [w, h] = ctx.config.default_form_field_size;
            let size = Vec2::new(w, h);
            if placement.centered {
                Rect::from_center_size(placement.anchor, size)
            } else {
                Rect::from_min_size(placement.anchor, size)
            }
        } else {
            placement.rect()
        };

        let kind = ctx.scene.tool_defaults().form_field_kind;
        let name = Self::next_name(ctx.scene);
        debug!("Placing {} form field {}", kind.label(), name);
        let field = FormFieldObject::new(rect, kind, name);
        let object = DrawableObject::new(ctx.page(), ctx.scene.active_layer_id(), ObjectKind::FormField(field));
        if let Err(e) = ctx.scene.add_object(object) {
            log::warn!("Could not place form field: {}", e);
        }
    }

    fn overlay(&self, _scene: &SceneState) -> Vec<OverlayItem> {
        self.placement
            .map(|p| vec![OverlayItem::PlacementPreview(p.rect())])
            .unwrap_or_default()
    }

    fn is_busy(&self) -> bool {
        self.placement.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::state::test_support::scene_with_pages;
    use crate::tools::test_support::{event_at, with_modifiers};
    use egui::{Modifiers, pos2, vec2};

    fn field_rect(scene: &SceneState) -> Rect {
        match &scene.objects()[0].kind {
            ObjectKind::FormField(f) => f.rect,
            other => panic!("unexpected {}", other.type_name()),
        }
    }

    #[test]
    fn test_click_places_default_size() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = FormFieldTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);
        tool.on_pointer_down(&mut ctx, &event_at(pos2(20.0, 30.0), 0.0));
        tool.on_pointer_up(&mut ctx, &event_at(pos2(21.0, 30.0), 5.0));

        let [w, h] = config.default_form_field_size;
        assert_eq!(field_rect(&scene), Rect::from_min_size(pos2(20.0, 30.0), vec2(w, h)));
        let ObjectKind::FormField(field) = &scene.objects()[0].kind else {
            unreachable!()
        };
        assert_eq!(field.name, "field_1");
    }

    #[test]
    fn test_alt_drag_grows_from_center() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = FormFieldTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);
        let alt = Modifiers::ALT;
        tool.on_pointer_down(&mut ctx, &with_modifiers(event_at(pos2(100.0, 100.0), 0.0), alt));
        tool.on_pointer_move(&mut ctx, &with_modifiers(event_at(pos2(150.0, 110.0), 5.0), alt));
        assert_eq!(
            tool.overlay(ctx.scene),
            vec![OverlayItem::PlacementPreview(Rect::from_min_max(pos2(50.0, 90.0), pos2(150.0, 110.0)))]
        );
        tool.on_pointer_up(&mut ctx, &with_modifiers(event_at(pos2(150.0, 110.0), 10.0), alt));
        assert_eq!(field_rect(&scene), Rect::from_min_max(pos2(50.0, 90.0), pos2(150.0, 110.0)));
    }
}

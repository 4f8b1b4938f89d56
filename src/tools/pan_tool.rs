use egui::{PointerButton, Pos2};

use crate::tools::{Tool, ToolContext, ToolEvent, ToolKind};

/// Drags the view. Never touches document content.
#[derive(Debug, Default)]
pub struct PanTool {
    last: Option<Pos2>,
}

impl PanTool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tool for PanTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Pan
    }

    fn deactivate(&mut self, _ctx: &mut ToolContext<'_>) {
        self.last = None;
    }

    fn on_pointer_down(&mut self, _ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if matches!(event.button, PointerButton::Primary | PointerButton::Middle) {
            self.last = Some(event.view_pos);
        }
    }

    fn on_pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        // View positions: the document point under the pointer moves as we pan
        let Some(last) = self.last else {
            return;
        };
        let delta = event.view_pos - last;
        if delta != egui::Vec2::ZERO {
            ctx.scene.pan_by(delta);
        }
        self.last = Some(event.view_pos);
    }

    fn on_pointer_up(&mut self, _ctx: &mut ToolContext<'_>, _event: &ToolEvent) {
        self.last = None;
    }

    fn is_busy(&self) -> bool {
        self.last.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::state::test_support::scene_with_pages;
    use crate::tools::test_support::event_at;
    use egui::{pos2, vec2};

    #[test]
    fn test_drag_pans_without_touching_content() {
        let mut scene = scene_with_pages(1);
        let revision = scene.revision();
        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = PanTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);
        tool.on_pointer_down(&mut ctx, &event_at(pos2(10.0, 10.0), 0.0));
        tool.on_pointer_move(&mut ctx, &event_at(pos2(40.0, 30.0), 5.0));
        tool.on_pointer_move(&mut ctx, &event_at(pos2(50.0, 30.0), 10.0));
        tool.on_pointer_up(&mut ctx, &event_at(pos2(50.0, 30.0), 15.0));

        assert_eq!(scene.view().pan, vec2(40.0, 20.0));
        assert_eq!(scene.revision(), revision);
    }
}

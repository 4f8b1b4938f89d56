use egui::{PointerButton, Pos2, Rect, Vec2};
use log::debug;

use crate::element::{
    DrawableObject, HighlightObject, LineObject, ObjectId, ObjectKind, ShapeKind, ShapeObject,
};
use crate::geometry::hit_testing;
use crate::state::SceneState;
use crate::tools::{Tool, ToolContext, ToolEvent, ToolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeMode {
    Shapes,
    Highlight,
}

#[derive(Debug, Clone)]
struct Sizing {
    id: ObjectId,
    anchor: Pos2,
}

/// Rectangles, ovals, lines and highlight boxes sized by dragging.
///
/// A zero-size object is appended on pointer down and resized live, so the object
/// pass draws it with its layer. Releasing before the drag covers the click
/// threshold on either axis discards it.
#[derive(Debug)]
pub struct ShapeTool {
    mode: ShapeMode,
    sizing: Option<Sizing>,
}

impl ShapeTool {
    pub fn shapes() -> Self {
        Self {
            mode: ShapeMode::Shapes,
            sizing: None,
        }
    }

    pub fn highlight() -> Self {
        Self {
            mode: ShapeMode::Highlight,
            sizing: None,
        }
    }

    fn new_kind(&self, scene: &SceneState, at: Pos2) -> ObjectKind {
        let defaults = scene.tool_defaults();
        let rect = Rect::from_min_max(at, at);
        match (self.mode, defaults.shape) {
            (ShapeMode::Highlight, _) => ObjectKind::Highlight(HighlightObject::new(
                rect,
                defaults.highlight_color,
                defaults.highlight_opacity,
            )),
            (ShapeMode::Shapes, ShapeKind::Line) => {
                let mut line = LineObject::new(at, at, defaults.stroke_color, defaults.stroke_width);
                line.opacity = defaults.opacity;
                ObjectKind::Line(line)
            }
            (ShapeMode::Shapes, kind) => {
                let mut shape = ShapeObject::new(rect, defaults.stroke_color, defaults.fill_color, defaults.stroke_width);
                shape.opacity = defaults.opacity;
                if kind == ShapeKind::Oval {
                    ObjectKind::Oval(shape)
                } else {
                    ObjectKind::Rectangle(shape)
                }
            }
        }
    }

    /// Apply the drag from `anchor` to `pos`. Shift keeps squares square and lines at
    /// multiples of 45 degrees.
    fn resize(kind: &mut ObjectKind, anchor: Pos2, pos: Pos2, constrain: bool) {
        let mut delta = pos - anchor;
        match kind {
            ObjectKind::Line(line) => {
                if constrain {
                    delta = snap_to_45(delta);
                }
                line.start = anchor;
                line.end = anchor + delta;
            }
            ObjectKind::Rectangle(s) | ObjectKind::Oval(s) => {
                if constrain {
                    let side = delta.x.abs().max(delta.y.abs());
                    delta = Vec2::new(side * delta.x.signum(), side * delta.y.signum());
                }
                // Kept unnormalized while sizing; normalized on release
                s.rect = Rect { min: anchor, max: anchor + delta };
            }
            ObjectKind::Highlight(h) => h.rect = Rect { min: anchor, max: pos },
            _ => {}
        }
    }

    fn finish(&mut self, ctx: &mut ToolContext<'_>, pos: Pos2, constrain: bool) {
        let Some(sizing) = self.sizing.take() else {
            return;
        };
        let Some(object) = ctx.scene.object(sizing.id) else {
            return;
        };

        let mut kind = object.kind.clone();
        Self::resize(&mut kind, sizing.anchor, pos, constrain);
        let view_size = match &kind {
            ObjectKind::Line(l) => {
                let d = ctx.view.to_view(l.end) - ctx.view.to_view(l.start);
                Vec2::new(d.x.abs(), d.y.abs())
            }
            other => ctx.view.rect_to_view(other.geometry_rect()).size(),
        };

        let threshold = ctx.config.click_threshold_px;
        if view_size.x < threshold && view_size.y < threshold {
            debug!("Discarding {} smaller than the click threshold", kind.type_name());
            ctx.scene.remove_object(sizing.id);
            return;
        }

        ctx.scene.update_object(sizing.id, |o| {
            match &mut kind {
                ObjectKind::Rectangle(s) | ObjectKind::Oval(s) => s.rect = hit_testing::normalize(s.rect),
                ObjectKind::Highlight(h) => h.rect = hit_testing::normalize(h.rect),
                _ => {}
            }
            o.kind = kind;
        });
    }
}

/// Round a direction to the nearest multiple of 45 degrees, keeping its length
fn snap_to_45(delta: Vec2) -> Vec2 {
    let len = delta.length();
    if len <= f32::EPSILON {
        return delta;
    }
    let step = std::f32::consts::FRAC_PI_4;
    let angle = (delta.y.atan2(delta.x) / step).round() * step;
    Vec2::angled(angle) * len
}

impl Tool for ShapeTool {
    fn kind(&self) -> ToolKind {
        match self.mode {
            ShapeMode::Shapes => ToolKind::Shapes,
            ShapeMode::Highlight => ToolKind::Highlight,
        }
    }

    fn deactivate(&mut self, ctx: &mut ToolContext<'_>) {
        if let Some(sizing) = self.sizing.take() {
            debug!("Discarding unfinished shape {}", sizing.id);
            ctx.scene.remove_object(sizing.id);
        }
    }

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if event.button != PointerButton::Primary || self.sizing.is_some() {
            return;
        }
        let layer = ctx.scene.active_layer_id();
        if !ctx.scene.layer(layer).is_some_and(|l| l.is_editable()) {
            debug!("Active layer is hidden or locked; not drawing");
            return;
        }
        let kind = self.new_kind(ctx.scene, event.doc_pos);
        let object = DrawableObject::new(ctx.page(), layer, kind);
        match ctx.scene.add_object(object) {
            Ok(id) => {
                self.sizing = Some(Sizing {
                    id,
                    anchor: event.doc_pos,
                })
            }
            Err(e) => log::warn!("Could not start shape: {}", e),
        }
    }

    fn on_pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        let Some(sizing) = &self.sizing else {
            return;
        };
        let anchor = sizing.anchor;
        let constrain = event.modifiers.shift;
        ctx.scene
            .update_object(sizing.id, |o| Self::resize(&mut o.kind, anchor, event.doc_pos, constrain));
    }

    fn on_pointer_up(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        self.finish(ctx, event.doc_pos, event.modifiers.shift);
    }

    fn is_busy(&self) -> bool {
        self.sizing.is_some()
    }
}

use egui::{Key, PointerButton, Pos2, Rect, Vec2, pos2};
use log::{debug, info};

use crate::element::{ObjectId, ObjectKind};
use crate::geometry::{Handle, hit_testing};
use crate::renderer::OverlayItem;
use crate::state::SceneState;
use crate::tools::{KeyEvent, Tool, ToolContext, ToolEvent, ToolKind, ToolRequest};

/// Document units per arrow-key press; shift multiplies by ten
const NUDGE_STEP: f32 = 1.0;

#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    Idle,
    /// Dragging the selection. Positions derive from the captured originals plus
    /// the cumulative pointer delta, so rounding never accumulates.
    Moving {
        start: Pos2,
        originals: Vec<(ObjectId, ObjectKind)>,
    },
    Resizing {
        id: ObjectId,
        handle: Handle,
        original: ObjectKind,
        original_rect: Rect,
    },
    Marquee {
        start: Pos2,
        current: Pos2,
        extend: bool,
    },
}

/// Selection, move and resize.
///
/// Pointer down picks, in order: a resize handle of the single selected object, the
/// topmost object under the pointer, or empty space for a rubber band.
#[derive(Debug, Default)]
pub struct SelectTool {
    gesture: Gesture,
}

impl SelectTool {
    pub fn new() -> Self {
        Self::default()
    }

    fn single_selected(scene: &SceneState) -> Option<(ObjectId, Rect)> {
        match scene.editable_selection().as_slice() {
            [id] => scene.object(*id).map(|o| (*id, o.geometry_rect())),
            _ => None,
        }
    }

    fn begin_move(ctx: &ToolContext<'_>, start: Pos2) -> Gesture {
        let originals = ctx
            .scene
            .editable_selection()
            .into_iter()
            .filter_map(|id| ctx.scene.object(id).map(|o| (id, o.kind.clone())))
            .collect();
        Gesture::Moving { start, originals }
    }

    /// Restore whatever the current gesture changed
    fn cancel(&mut self, ctx: &mut ToolContext<'_>) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Moving { originals, .. } => {
                ctx.scene.batch(|scene| {
                    for (id, kind) in originals {
                        scene.update_object(id, |o| o.kind = kind);
                    }
                });
            }
            Gesture::Resizing { id, original, .. } => {
                ctx.scene.update_object(id, |o| o.kind = original);
            }
            Gesture::Marquee { .. } | Gesture::Idle => {}
        }
    }
}

/// The box produced by dragging `handle` of `original` to `pos`.
///
/// The opposite handle stays put unless `centered`, in which case the center does.
/// `keep_aspect` applies to corner handles only.
pub(crate) fn resized_rect(
    original: Rect,
    handle: Handle,
    pos: Pos2,
    min_size: f32,
    keep_aspect: bool,
    centered: bool,
) -> Rect {
    let anchor = if centered {
        original.center()
    } else {
        handle.opposite().position(original)
    };
    let handle_pos = handle.position(original);

    // Signed extents from the anchor, falling back to the original direction at zero
    let extent = |moving: bool, delta: f32, original_delta: f32, original_len: f32| -> f32 {
        if !moving {
            return original_len;
        }
        let direction = if delta != 0.0 { delta.signum() } else { original_delta.signum() };
        let min = if centered { min_size / 2.0 } else { min_size };
        direction * delta.abs().max(min)
    };
    let half_or_full = |len: f32| if centered { len / 2.0 } else { len };

    let mut w = extent(
        handle.moves_x(),
        pos.x - anchor.x,
        handle_pos.x - anchor.x,
        half_or_full(original.width()),
    );
    let mut h = extent(
        handle.moves_y(),
        pos.y - anchor.y,
        handle_pos.y - anchor.y,
        half_or_full(original.height()),
    );

    if keep_aspect && handle.is_corner() && original.width() > 0.0 && original.height() > 0.0 {
        let scale = (w.abs() / half_or_full(original.width())).max(h.abs() / half_or_full(original.height()));
        w = w.signum() * half_or_full(original.width()) * scale;
        h = h.signum() * half_or_full(original.height()) * scale;
    }

    if centered {
        return Rect::from_center_size(anchor, Vec2::new(w.abs(), h.abs()) * 2.0);
    }
    let x = if handle.moves_x() { (anchor.x, anchor.x + w) } else { (original.min.x, original.max.x) };
    let y = if handle.moves_y() { (anchor.y, anchor.y + h) } else { (original.min.y, original.max.y) };
    Rect::from_two_pos(pos2(x.0, y.0), pos2(x.1, y.1))
}

impl Tool for SelectTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Select
    }

    fn deactivate(&mut self, _ctx: &mut ToolContext<'_>) {
        self.gesture = Gesture::Idle;
    }

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if event.button != PointerButton::Primary {
            return;
        }
        let pos = event.doc_pos;

        if let Some((id, rect)) = Self::single_selected(ctx.scene) {
            if let Some(handle) = hit_testing::handle_at(rect, pos, ctx.handle_radius()) {
                if let Some(object) = ctx.scene.object(id) {
                    debug!("Resizing {} from {:?}", id, handle);
                    self.gesture = Gesture::Resizing {
                        id,
                        handle,
                        original: object.kind.clone(),
                        original_rect: rect,
                    };
                    return;
                }
            }
        }

        let shift = event.modifiers.shift;
        match ctx.scene.topmost_at(ctx.page(), pos, ctx.hit_slop()) {
            Some(id) => {
                if shift {
                    ctx.scene.toggle_selected(id);
                } else if !ctx.scene.is_selected(id) {
                    ctx.scene.select(&[id]);
                }
                self.gesture = if ctx.scene.is_selected(id) {
                    Self::begin_move(ctx, pos)
                } else {
                    Gesture::Idle
                };
            }
            None => {
                if !shift {
                    ctx.scene.clear_selection();
                }
                self.gesture = Gesture::Marquee {
                    start: pos,
                    current: pos,
                    extend: shift,
                };
            }
        }
    }

    fn on_pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        let pos = event.doc_pos;
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Moving { start, originals } => {
                let delta = pos - *start;
                let originals = originals.clone();
                ctx.scene.batch(|scene| {
                    for (id, kind) in originals {
                        scene.update_object(id, |o| {
                            o.kind = kind;
                            o.kind.translate(delta);
                        });
                    }
                });
            }
            Gesture::Resizing {
                id,
                handle,
                original,
                original_rect,
            } => {
                let rect = resized_rect(
                    *original_rect,
                    *handle,
                    pos,
                    ctx.config.min_object_size,
                    event.modifiers.shift,
                    event.modifiers.alt,
                );
                let mut kind = original.clone();
                kind.set_geometry_rect(rect);
                ctx.scene.update_object(*id, |o| o.kind = kind);
            }
            Gesture::Marquee { current, .. } => *current = pos,
        }
    }

    fn on_pointer_up(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if let Gesture::Marquee { start, extend, .. } = std::mem::take(&mut self.gesture) {
            let rect = Rect::from_two_pos(start, event.doc_pos);
            let size = ctx.view.rect_to_view(rect).size();
            let threshold = ctx.config.click_threshold_px;
            if size.x >= threshold || size.y >= threshold {
                ctx.scene.select_in_rect(rect, extend);
            }
        }
    }

    fn on_double_click(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        let Some(id) = ctx.scene.topmost_at(ctx.page(), event.doc_pos, ctx.hit_slop()) else {
            return;
        };
        if ctx.scene.object(id).is_some_and(|o| matches!(o.kind, ObjectKind::Text(_))) {
            info!("Opening text {} for editing", id);
            ctx.request(ToolRequest::Switch {
                tool: ToolKind::Text,
                edit: Some(id),
            });
        }
    }

    fn on_key_down(&mut self, ctx: &mut ToolContext<'_>, key: &KeyEvent) -> bool {
        let step = if key.modifiers.shift { NUDGE_STEP * 10.0 } else { NUDGE_STEP };
        let nudge = match key.key {
            Key::ArrowLeft => Vec2::new(-step, 0.0),
            Key::ArrowRight => Vec2::new(step, 0.0),
            Key::ArrowUp => Vec2::new(0.0, -step),
            Key::ArrowDown => Vec2::new(0.0, step),
            Key::Delete | Key::Backspace => {
                return ctx.scene.delete_selection() > 0;
            }
            Key::Escape => {
                if matches!(self.gesture, Gesture::Idle) {
                    ctx.scene.clear_selection();
                } else {
                    self.cancel(ctx);
                }
                return true;
            }
            _ => return false,
        };
        ctx.scene.nudge_selection(nudge) > 0
    }

    fn overlay(&self, scene: &SceneState) -> Vec<OverlayItem> {
        let mut items = Vec::new();
        if let Some(bounds) = scene.selection_bounds() {
            items.push(OverlayItem::SelectionBox(bounds));
        }
        if let Some((_, rect)) = Self::single_selected(scene) {
            items.push(OverlayItem::Handles(rect));
        }
        if let Gesture::Marquee { start, current, .. } = &self.gesture {
            items.push(OverlayItem::Marquee(Rect::from_two_pos(*start, *current)));
        }
        items
    }

    fn is_busy(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }
}

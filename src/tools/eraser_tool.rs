use egui::{PointerButton, Pos2};
use log::debug;

use crate::element::{DrawableObject, ObjectId, ObjectKind, PathObject};
use crate::geometry::hit_testing;
use crate::renderer::OverlayItem;
use crate::state::{EraserMode, SceneState};
use crate::tools::{Tool, ToolContext, ToolEvent, ToolKind};

/// Removes ink.
///
/// Stroke mode cuts the erased stretch out of freehand paths, keeping the surviving runs
/// as separate paths at the original stacking position. Lines touched in stroke mode and
/// any object touched in object mode are deleted whole.
#[derive(Debug)]
pub struct EraserTool {
    erasing: bool,
    /// Last pointer position and document-space radius, for the cursor preview
    cursor: Option<(Pos2, f32)>,
}

impl EraserTool {
    pub fn new() -> Self {
        Self {
            erasing: false,
            cursor: None,
        }
    }

    fn erase_at(&mut self, ctx: &mut ToolContext<'_>, center: Pos2) {
        let radius = ctx.view.len_to_doc(ctx.scene.tool_defaults().eraser_radius);
        self.cursor = Some((center, radius));
        let mode = ctx.scene.tool_defaults().eraser_mode;

        let touched: Vec<ObjectId> = ctx
            .scene
            .objects_on_page(ctx.page())
            .filter(|o| o.kind.intersects_circle(center, radius))
            .map(|o| o.id)
            .filter(|id| ctx.scene.is_editable(*id))
            .collect();
        if touched.is_empty() {
            return;
        }

        ctx.scene.batch(|scene| {
            for id in touched {
                erase_object(scene, id, center, radius, mode);
            }
        });
    }
}

impl Default for EraserTool {
    fn default() -> Self {
        Self::new()
    }
}

fn erase_object(scene: &mut SceneState, id: ObjectId, center: Pos2, radius: f32, mode: EraserMode) {
    let Some(index) = scene.object_index(id) else {
        return;
    };
    let object = &scene.objects()[index];
    match (&object.kind, mode) {
        (ObjectKind::Path(path), EraserMode::Stroke) => {
            // Nothing within reach of the stroke
            let Some(runs) = split_path(path, center, radius) else {
                return;
            };
            let (page, layer) = (object.page, object.layer_id);
            debug!("Erasing through path {}: {} run(s) remain", id, runs.len());
            scene.remove_object(id);
            for (offset, run) in runs.into_iter().enumerate() {
                let piece = DrawableObject::new(page, layer, ObjectKind::Path(run));
                if let Err(e) = scene.insert_object_at(index + offset, piece) {
                    log::warn!("Could not keep erased path segment: {}", e);
                }
            }
        }
        (ObjectKind::Path(_) | ObjectKind::Line(_), _) | (_, EraserMode::Object) => {
            debug!("Erasing {} {}", object.kind.type_name(), id);
            scene.remove_object(id);
        }
        _ => {}
    }
}

/// Split a path around an eraser circle, or `None` when the circle misses it.
///
/// Samples within reach are discarded. A segment whose ends both survive but which passes
/// through the circle is cut at its entry and exit points. Runs with fewer than two points
/// are dropped.
fn split_path(path: &PathObject, center: Pos2, radius: f32) -> Option<Vec<PathObject>> {
    let reach = radius + path.max_width() / 2.0;
    let per_point_widths = path.widths.len() == path.points.len();
    let empty_run = || PathObject {
        points: Vec::new(),
        widths: Vec::new(),
        ..path.clone()
    };

    let mut runs = Vec::new();
    let mut current = empty_run();
    let mut changed = false;
    let finish = |current: &mut PathObject, runs: &mut Vec<PathObject>| {
        let finished = std::mem::replace(current, empty_run());
        if finished.points.len() >= 2 {
            runs.push(finished);
        }
    };

    for (i, point) in path.points.iter().enumerate() {
        if point.distance(center) <= reach {
            changed = true;
            finish(&mut current, &mut runs);
            continue;
        }
        if let Some(prev) = i.checked_sub(1) {
            let start = path.points[prev];
            let cut = if start.distance(center) > reach {
                hit_testing::segment_circle_crossings(start, *point, center, reach)
            } else {
                None
            };
            if let Some((t_enter, t_exit)) = cut {
                changed = true;
                let width_at = |t: f32| path.widths[prev] + (path.widths[i] - path.widths[prev]) * t;
                current.points.push(start.lerp(*point, t_enter));
                if per_point_widths {
                    current.widths.push(width_at(t_enter));
                }
                finish(&mut current, &mut runs);
                current.points.push(start.lerp(*point, t_exit));
                if per_point_widths {
                    current.widths.push(width_at(t_exit));
                }
            }
        }
        current.points.push(*point);
        if per_point_widths {
            current.widths.push(path.widths[i]);
        }
    }
    finish(&mut current, &mut runs);
    changed.then_some(runs)
}

impl Tool for EraserTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Eraser
    }

    fn deactivate(&mut self, _ctx: &mut ToolContext<'_>) {
        self.erasing = false;
        self.cursor = None;
    }

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if event.button != PointerButton::Primary {
            return;
        }
        self.erasing = true;
        self.erase_at(ctx, event.doc_pos);
    }

    fn on_pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if self.erasing {
            self.erase_at(ctx, event.doc_pos);
        } else {
            let radius = ctx.view.len_to_doc(ctx.scene.tool_defaults().eraser_radius);
            self.cursor = Some((event.doc_pos, radius));
        }
    }

    fn on_pointer_up(&mut self, _ctx: &mut ToolContext<'_>, _event: &ToolEvent) {
        self.erasing = false;
    }

    fn overlay(&self, _scene: &SceneState) -> Vec<OverlayItem> {
        self.cursor
            .map(|(center, radius)| vec![OverlayItem::EraserCursor { center, radius }])
            .unwrap_or_default()
    }

    fn is_busy(&self) -> bool {
        self.erasing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::element::factory;
    use crate::state::test_support::scene_with_pages;
    use crate::tools::test_support::event_at;
    use egui::{Color32, pos2};

    fn eight_point_path(scene: &mut SceneState) -> ObjectId {
        let points = (0..8).map(|i| pos2(i as f32 * 10.0, 50.0)).collect();
        let object = factory::path(1, scene.active_layer_id(), points, 2.0, Color32::BLACK);
        scene.add_object(object).unwrap()
    }

    #[test]
    fn test_stroke_mode_splits_path_in_place() {
        let mut scene = scene_with_pages(1);
        let below = scene
            .add_object(factory::rectangle(1, scene.active_layer_id(), crate::state::test_support::rect_at(200.0, 200.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap();
        let original = eight_point_path(&mut scene);
        let above = scene
            .add_object(factory::rectangle(1, scene.active_layer_id(), crate::state::test_support::rect_at(300.0, 300.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap();

        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = EraserTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);
        scene_radius(&mut ctx, 3.0);
        tool.on_pointer_down(&mut ctx, &event_at(pos2(30.0, 50.0), 0.0));
        tool.on_pointer_up(&mut ctx, &event_at(pos2(30.0, 50.0), 10.0));

        let objects = scene.objects();
        assert_eq!(objects.len(), 4);
        assert_eq!(objects[0].id, below);
        assert_eq!(objects[3].id, above);
        assert!(scene.object(original).is_none());
        let lens: Vec<usize> = objects[1..3]
            .iter()
            .map(|o| match &o.kind {
                ObjectKind::Path(p) => p.points.len(),
                _ => 0,
            })
            .collect();
        assert_eq!(lens, vec![3, 4]);
    }

    #[test]
    fn test_short_runs_are_dropped() {
        let mut scene = scene_with_pages(1);
        eight_point_path(&mut scene);
        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = EraserTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);
        scene_radius(&mut ctx, 3.0);
        // Removes point 1, leaving a single point before the gap
        tool.on_pointer_down(&mut ctx, &event_at(pos2(10.0, 50.0), 0.0));
        tool.on_pointer_up(&mut ctx, &event_at(pos2(10.0, 50.0), 10.0));

        assert_eq!(scene.objects().len(), 1);
        let ObjectKind::Path(path) = &scene.objects()[0].kind else {
            panic!("expected a path");
        };
        assert_eq!(path.points.len(), 6);
    }

    #[test]
    fn test_stroke_mode_cuts_through_a_long_segment() {
        let mut path = PathObject::new(vec![pos2(0.0, 0.0), pos2(100.0, 0.0)], Color32::BLACK, 2.0);
        path.widths = vec![2.0, 4.0];

        let runs = split_path(&path, pos2(50.0, 0.0), 8.0).unwrap();
        assert_eq!(runs.len(), 2);
        // Reach is the radius plus half the widest width
        assert_eq!(runs[0].points.len(), 2);
        assert_eq!(runs[1].points.len(), 2);
        assert_eq!(runs[0].points[0], pos2(0.0, 0.0));
        assert!(runs[0].points[1].distance(pos2(40.0, 0.0)) < 1e-3);
        assert!(runs[1].points[0].distance(pos2(60.0, 0.0)) < 1e-3);
        assert_eq!(runs[1].points[1], pos2(100.0, 0.0));
        assert!((runs[0].widths[1] - 2.8).abs() < 1e-4);
        assert!((runs[1].widths[0] - 3.2).abs() < 1e-4);

        assert!(split_path(&path, pos2(50.0, 30.0), 8.0).is_none());
    }

    #[test]
    fn test_object_mode_deletes_whole_objects() {
        let mut scene = scene_with_pages(1);
        eight_point_path(&mut scene);
        scene.set("tool_defaults.eraser_mode", serde_json::json!("object")).unwrap();
        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = EraserTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);
        tool.on_pointer_down(&mut ctx, &event_at(pos2(30.0, 50.0), 0.0));
        assert!(tool.is_busy());
        tool.on_pointer_up(&mut ctx, &event_at(pos2(30.0, 50.0), 10.0));
        assert!(scene.objects().is_empty());
    }

    fn scene_radius(ctx: &mut ToolContext<'_>, radius: f32) {
        ctx.scene
            .set("tool_defaults.eraser_radius", serde_json::json!(radius))
            .unwrap();
    }
}

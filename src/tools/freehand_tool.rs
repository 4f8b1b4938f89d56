use egui::{PointerButton, Pos2};
use log::debug;

use crate::element::{DrawableObject, ObjectId, ObjectKind, PathObject};
use crate::geometry::hit_testing;
use crate::tools::smoothing::{RecencySmoother, dynamic_width};
use crate::tools::{Tool, ToolContext, ToolEvent, ToolKind};

const SMOOTHING_WINDOW: usize = 4;
/// How far each new sample pulls the displayed width toward its target
const WIDTH_EASING: f32 = 0.35;

#[derive(Debug, Clone)]
struct Stroke {
    /// Set once the stroke has two distinct samples and lives in the scene
    id: Option<ObjectId>,
    raw: Vec<Pos2>,
    widths: Vec<f32>,
    smoothed: Vec<Pos2>,
    smoother: RecencySmoother,
    last_time_ms: f64,
}

impl Stroke {
    fn distinct_samples(&self) -> usize {
        let mut count = 0;
        let mut last: Option<Pos2> = None;
        for p in &self.raw {
            if last != Some(*p) {
                count += 1;
                last = Some(*p);
            }
        }
        count
    }
}

/// Freehand ink.
///
/// While drawing, the path shows smoothed samples with speed- and pressure-dependent
/// widths. On release the path is replaced by a Douglas-Peucker simplification of the
/// raw samples.
#[derive(Debug)]
pub struct FreehandTool {
    stroke: Option<Stroke>,
}

impl FreehandTool {
    pub fn new() -> Self {
        Self { stroke: None }
    }

    fn add_sample(stroke: &mut Stroke, ctx: &ToolContext<'_>, event: &ToolEvent) -> bool {
        let pos = event.doc_pos;
        let Some(&last) = stroke.raw.last() else {
            return false;
        };
        if last == pos {
            return false;
        }

        let defaults = ctx.scene.tool_defaults();
        let dt = (event.time_ms - stroke.last_time_ms).max(0.0) as f32;
        let view_distance = ctx.view.len_to_view(last.distance(pos));
        let velocity = if dt > 0.0 { view_distance / dt } else { 0.0 };
        let target = dynamic_width(defaults.stroke_width, velocity, event.pressure, defaults.pressure_sensitive);
        let previous = stroke.widths.last().copied().unwrap_or(target);
        let width = previous + (target - previous) * WIDTH_EASING;

        stroke.raw.push(pos);
        stroke.widths.push(width);
        let smoothed = stroke.smoother.push(pos);
        stroke.smoothed.push(smoothed);
        stroke.last_time_ms = event.time_ms;
        true
    }
}

impl Default for FreehandTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for FreehandTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Draw
    }

    fn deactivate(&mut self, ctx: &mut ToolContext<'_>) {
        if let Some(id) = self.stroke.take().and_then(|s| s.id) {
            debug!("Discarding unfinished stroke {}", id);
            ctx.scene.remove_object(id);
        }
    }

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        if event.button != PointerButton::Primary || self.stroke.is_some() {
            return;
        }
        let layer = ctx.scene.active_layer_id();
        if !ctx.scene.layer(layer).is_some_and(|l| l.is_editable()) {
            debug!("Active layer is hidden or locked; not drawing");
            return;
        }
        let defaults = ctx.scene.tool_defaults();
        let width = dynamic_width(defaults.stroke_width, 0.0, event.pressure, defaults.pressure_sensitive);
        let mut smoother = RecencySmoother::new(SMOOTHING_WINDOW);
        let first = smoother.push(event.doc_pos);
        self.stroke = Some(Stroke {
            id: None,
            raw: vec![event.doc_pos],
            widths: vec![width],
            smoothed: vec![first],
            smoother,
            last_time_ms: event.time_ms,
        });
    }

    fn on_pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        let Some(stroke) = &mut self.stroke else {
            return;
        };
        if !Self::add_sample(stroke, ctx, event) {
            return;
        }

        let points = stroke.smoothed.clone();
        let widths = stroke.widths.clone();
        match stroke.id {
            Some(id) => {
                ctx.scene.update_object(id, |o| {
                    if let ObjectKind::Path(path) = &mut o.kind {
                        path.points = points;
                        path.widths = widths;
                    }
                });
            }
            None => {
                let defaults = ctx.scene.tool_defaults();
                let mut path = PathObject::new(points, defaults.stroke_color, defaults.stroke_width);
                path.widths = widths;
                path.opacity = defaults.opacity;
                let object = DrawableObject::new(ctx.page(), ctx.scene.active_layer_id(), ObjectKind::Path(path));
                match ctx.scene.add_object(object) {
                    Ok(id) => stroke.id = Some(id),
                    Err(e) => log::warn!("Could not start stroke: {}", e),
                }
            }
        }
    }

    fn on_pointer_up(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        let Some(mut stroke) = self.stroke.take() else {
            return;
        };
        Self::add_sample(&mut stroke, ctx, event);

        if stroke.distinct_samples() < 2 {
            if let Some(id) = stroke.id {
                ctx.scene.remove_object(id);
            }
            debug!("Discarding stroke with fewer than two samples");
            return;
        }

        let keep = hit_testing::simplify_douglas_peucker(&stroke.raw, ctx.config.simplify_tolerance);
        let points: Vec<Pos2> = keep.iter().map(|&i| stroke.raw[i]).collect();
        let widths: Vec<f32> = keep.iter().map(|&i| stroke.widths[i]).collect();
        debug!("Simplified stroke from {} to {} points", stroke.raw.len(), points.len());

        match stroke.id {
            Some(id) => {
                ctx.scene.update_object(id, |o| {
                    if let ObjectKind::Path(path) = &mut o.kind {
                        path.points = points;
                        path.widths = widths;
                    }
                });
            }
            None => {
                // Down and up arrived without moves in between
                let defaults = ctx.scene.tool_defaults();
                let mut path = PathObject::new(points, defaults.stroke_color, defaults.stroke_width);
                path.widths = widths;
                path.opacity = defaults.opacity;
                let object = DrawableObject::new(ctx.page(), ctx.scene.active_layer_id(), ObjectKind::Path(path));
                if let Err(e) = ctx.scene.add_object(object) {
                    log::warn!("Could not add stroke: {}", e);
                }
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.stroke.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::state::test_support::scene_with_pages;
    use crate::tools::test_support::event_at;
    use egui::pos2;

    #[test]
    fn test_stroke_is_simplified_on_release() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = FreehandTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);

        tool.on_pointer_down(&mut ctx, &event_at(pos2(0.0, 0.0), 0.0));
        for i in 1..=20 {
            tool.on_pointer_move(&mut ctx, &event_at(pos2(i as f32 * 5.0, 0.0), i as f64 * 16.0));
        }
        tool.on_pointer_up(&mut ctx, &event_at(pos2(100.0, 0.0), 400.0));

        let ObjectKind::Path(path) = &scene.objects()[0].kind else {
            panic!("expected a path");
        };
        assert_eq!(path.points, vec![pos2(0.0, 0.0), pos2(100.0, 0.0)]);
        assert_eq!(path.widths.len(), 2);
    }

    #[test]
    fn test_click_without_movement_draws_nothing() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = FreehandTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);

        tool.on_pointer_down(&mut ctx, &event_at(pos2(10.0, 10.0), 0.0));
        tool.on_pointer_up(&mut ctx, &event_at(pos2(10.0, 10.0), 50.0));
        assert!(scene.objects().is_empty());
    }

    #[test]
    fn test_live_stroke_is_in_the_scene() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let view = scene.current_page_view().unwrap();
        let mut tool = FreehandTool::new();
        let mut ctx = ToolContext::new(&mut scene, view, &config);

        tool.on_pointer_down(&mut ctx, &event_at(pos2(0.0, 0.0), 0.0));
        tool.on_pointer_move(&mut ctx, &event_at(pos2(10.0, 10.0), 16.0));
        assert_eq!(ctx.scene.objects().len(), 1);
        tool.deactivate(&mut ctx);
        assert!(scene.objects().is_empty());
    }

    #[test]
    fn test_distinct_samples_ignores_repeats() {
        let stroke = Stroke {
            id: None,
            raw: vec![pos2(0.0, 0.0), pos2(0.0, 0.0), pos2(1.0, 0.0)],
            widths: vec![1.0; 3],
            smoothed: Vec::new(),
            smoother: RecencySmoother::new(2),
            last_time_ms: 0.0,
        };
        assert_eq!(stroke.distinct_samples(), 2);
    }
}

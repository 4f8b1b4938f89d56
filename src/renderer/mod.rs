//! Layered compositing.
//!
//! A redraw is three ordered passes over one page: the base content (the collaborator's
//! page raster under an optional background fill), the annotation layers in order, and the
//! tool overlay. [`Frame`] is the backend-neutral result; [`egui_backend`] paints it on the
//! interactive canvas and [`raster`] flattens it into pixels for export and thumbnails.

mod compositor;
pub mod egui_backend;
mod overlay;
pub mod raster;
mod textures;
mod thumbnails;

use std::sync::Arc;

use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use image::RgbaImage;

pub use compositor::{Compositor, RedrawOutcome};
pub use overlay::OverlayItem;
pub use textures::{TextureCache, TextureError, TextureKey};
pub use thumbnails::ThumbnailCache;

use crate::element::{DrawableObject, ObjectId, ObjectKind, TextAlign, with_opacity};
use crate::geometry::Rotation;
use crate::layer::{BlendMode, LayerId};
use crate::state::SceneState;

/// One primitive in document space. Colors already carry the object's own opacity.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Open polyline; `widths` has one entry per point
    Polyline {
        points: Vec<Pos2>,
        widths: Vec<f32>,
        color: Color32,
    },
    Rect {
        rect: Rect,
        fill: Option<Color32>,
        stroke: Option<Stroke>,
    },
    Ellipse {
        rect: Rect,
        fill: Option<Color32>,
        stroke: Option<Stroke>,
    },
    Image {
        id: ObjectId,
        rect: Rect,
        pixels: Option<Arc<RgbaImage>>,
        opacity: f32,
    },
    Text {
        rect: Rect,
        text: String,
        font_size: f32,
        color: Color32,
        align: TextAlign,
    },
}

impl DrawOp {
    fn uniform_polyline(points: Vec<Pos2>, width: f32, color: Color32) -> Self {
        let widths = vec![width; points.len()];
        Self::Polyline { points, widths, color }
    }
}

/// Translate one object into draw ops
pub fn object_ops(object: &DrawableObject) -> Vec<DrawOp> {
    match &object.kind {
        ObjectKind::Path(path) => {
            let widths = (0..path.points.len()).map(|i| path.width_at(i)).collect();
            vec![DrawOp::Polyline {
                points: path.points.clone(),
                widths,
                color: with_opacity(path.color, path.opacity),
            }]
        }
        ObjectKind::Line(line) => {
            let color = with_opacity(line.color, line.opacity);
            let mut ops = vec![DrawOp::uniform_polyline(vec![line.start, line.end], line.width, color)];
            if let Some(head) = line.arrow_head_points() {
                ops.push(DrawOp::uniform_polyline(head.to_vec(), line.width, color));
            }
            ops
        }
        ObjectKind::Rectangle(shape) | ObjectKind::Oval(shape) => {
            let rect = object.geometry_rect();
            let fill = shape.fill.map(|c| with_opacity(c, shape.opacity));
            let stroke = (shape.stroke_width > 0.0)
                .then(|| Stroke::new(shape.stroke_width, with_opacity(shape.stroke, shape.opacity)));
            if matches!(object.kind, ObjectKind::Oval(_)) {
                vec![DrawOp::Ellipse { rect, fill, stroke }]
            } else {
                vec![DrawOp::Rect { rect, fill, stroke }]
            }
        }
        ObjectKind::Highlight(highlight) => vec![DrawOp::Rect {
            rect: object.geometry_rect(),
            fill: Some(with_opacity(highlight.color, highlight.opacity)),
            stroke: None,
        }],
        ObjectKind::Image(image) => vec![DrawOp::Image {
            id: object.id,
            rect: object.geometry_rect(),
            pixels: image.pixels().cloned(),
            opacity: image.opacity,
        }],
        ObjectKind::Text(text) => vec![DrawOp::Text {
            rect: object.geometry_rect(),
            text: text.text.clone(),
            font_size: text.font_size,
            color: with_opacity(text.color, text.opacity),
            align: text.align,
        }],
        ObjectKind::FormField(field) => {
            let rect = object.geometry_rect();
            let label = if field.value.is_empty() { &field.name } else { &field.value };
            vec![
                DrawOp::Rect {
                    rect,
                    fill: Some(Color32::from_rgba_unmultiplied(225, 235, 255, 140)),
                    stroke: Some(Stroke::new(1.0, field.border)),
                },
                DrawOp::Text {
                    rect: rect.shrink(2.0),
                    text: label.clone(),
                    font_size: field.font_size,
                    color: Color32::from_gray(90),
                    align: TextAlign::Left,
                },
            ]
        }
    }
}

/// Page raster plus background fill, drawn under everything
#[derive(Debug, Clone, Default)]
pub struct BaseContent {
    pub raster: Option<Arc<RgbaImage>>,
    pub background: Option<Color32>,
}

/// The ops of one visible layer on one page
#[derive(Debug, Clone)]
pub struct LayerPass {
    pub layer: LayerId,
    pub blend: BlendMode,
    pub opacity: f32,
    pub ops: Vec<DrawOp>,
}

/// Everything needed to draw one page, independent of the backend
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based page number
    pub page: usize,
    pub page_size: Vec2,
    /// The page's own rotation
    pub rotation: Rotation,
    pub base: BaseContent,
    pub layers: Vec<LayerPass>,
    pub overlay: Vec<OverlayItem>,
}

impl Frame {
    /// Compose `page` from the scene. Hidden layers and layers with nothing on this page
    /// produce no pass. `None` if the page does not exist.
    pub fn build(
        scene: &SceneState,
        page: usize,
        raster: Option<Arc<RgbaImage>>,
        overlay: Vec<OverlayItem>,
    ) -> Option<Self> {
        let info = scene.document().page(page)?;
        let layers = scene
            .layers()
            .iter()
            .filter(|layer| layer.visible)
            .filter_map(|layer| {
                let ops: Vec<DrawOp> = scene
                    .objects_on_page(page)
                    .filter(|o| o.layer_id == layer.id)
                    .flat_map(object_ops)
                    .collect();
                (!ops.is_empty()).then(|| LayerPass {
                    layer: layer.id,
                    blend: layer.blend,
                    opacity: layer.opacity,
                    ops,
                })
            })
            .collect();

        Some(Self {
            page,
            page_size: info.size(),
            rotation: info.rotation,
            base: BaseContent {
                raster,
                background: info.background,
            },
            layers,
            overlay,
        })
    }

    pub fn op_count(&self) -> usize {
        self.layers.iter().map(|l| l.ops.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::factory;
    use crate::state::test_support::{rect_at, scene_with_pages};
    use egui::pos2;

    #[test]
    fn test_frame_skips_hidden_layers_and_other_pages() {
        let mut scene = scene_with_pages(2);
        let ink = scene.active_layer_id();
        let hidden = scene.add_layer("Hidden");
        scene.set_layer_visible(hidden, false).unwrap();

        scene.add_object(factory::rectangle(1, ink, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0)).unwrap();
        scene.add_object(factory::rectangle(1, hidden, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0)).unwrap();
        scene.add_object(factory::rectangle(2, ink, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0)).unwrap();

        let frame = Frame::build(&scene, 1, None, Vec::new()).unwrap();
        assert_eq!(frame.layers.len(), 1);
        assert_eq!(frame.layers[0].layer, ink);
        assert_eq!(frame.op_count(), 1);
        assert!(Frame::build(&scene, 3, None, Vec::new()).is_none());
    }

    #[test]
    fn test_layer_order_and_blend_are_carried() {
        let mut scene = scene_with_pages(1);
        let bottom = scene.active_layer_id();
        let top = scene.add_layer("Top");
        scene.set_layer_blend(top, BlendMode::Multiply).unwrap();
        scene.set_layer_opacity(top, 0.5).unwrap();
        scene.add_object(factory::highlight(1, top, rect_at(0.0, 0.0, 5.0, 5.0), Color32::YELLOW, 0.4)).unwrap();
        scene.add_object(factory::line(1, bottom, pos2(0.0, 0.0), pos2(5.0, 5.0), 1.0, Color32::BLACK)).unwrap();

        let frame = Frame::build(&scene, 1, None, Vec::new()).unwrap();
        let order: Vec<LayerId> = frame.layers.iter().map(|l| l.layer).collect();
        assert_eq!(order, vec![bottom, top]);
        assert_eq!(frame.layers[1].blend, BlendMode::Multiply);
        assert_eq!(frame.layers[1].opacity, 0.5);
    }

    #[test]
    fn test_object_opacity_is_folded_into_colors() {
        let mut path = factory::path(1, LayerId::new(), vec![pos2(0.0, 0.0), pos2(4.0, 0.0)], 3.0, Color32::BLACK);
        if let ObjectKind::Path(p) = &mut path.kind {
            p.opacity = 0.5;
            p.widths = vec![1.0, 2.0];
        }
        let ops = object_ops(&path);
        let DrawOp::Polyline { widths, color, .. } = &ops[0] else {
            panic!("expected a polyline");
        };
        assert_eq!(widths, &vec![1.0, 2.0]);
        assert!(color.a() < 255);
    }

    #[test]
    fn test_arrow_line_adds_head() {
        let mut line = factory::line(1, LayerId::new(), pos2(0.0, 0.0), pos2(40.0, 0.0), 2.0, Color32::BLACK);
        if let ObjectKind::Line(l) = &mut line.kind {
            l.arrow_head = true;
        }
        assert_eq!(object_ops(&line).len(), 2);
    }
}

//! Interactive backend: paints a [`Frame`] with an [`egui::Painter`].
//!
//! egui composites in plain source-over, so layer blend modes other than `Normal` are
//! drawn as `Normal` here; layer opacity is applied to every color. The software backend
//! in [`super::raster`] honors blend modes exactly.

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke, pos2, vec2};
use log::warn;

use crate::element::TextAlign;
use crate::geometry::PageView;
use crate::geometry::hit_testing::handle_positions;
use crate::renderer::{DrawOp, Frame, OverlayItem, TextureCache, TextureKey};

const SELECTION_COLOR: Color32 = Color32::from_rgb(30, 120, 230);
const ERASER_COLOR: Color32 = Color32::from_rgb(200, 60, 60);
const PAPER: Color32 = Color32::WHITE;

/// Paints frames for one canvas. `origin` is where view space (0, 0) sits on screen.
pub struct CanvasPainter<'a> {
    painter: &'a Painter,
    view: PageView,
    origin: Pos2,
}

impl<'a> CanvasPainter<'a> {
    pub fn new(painter: &'a Painter, view: PageView, origin: Pos2) -> Self {
        Self { painter, view, origin }
    }

    fn to_screen(&self, doc: Pos2) -> Pos2 {
        self.origin + self.view.to_view(doc).to_vec2()
    }

    fn rect_to_screen(&self, doc: Rect) -> Rect {
        self.view.rect_to_view(doc).translate(self.origin.to_vec2())
    }

    fn scaled(&self, stroke: Stroke, opacity: f32) -> Stroke {
        Stroke::new(self.view.len_to_view(stroke.width), stroke.color.gamma_multiply(opacity))
    }

    /// Base content then every layer pass. `base_version` identifies the raster in `frame`.
    pub fn paint_content(&self, frame: &Frame, textures: &mut TextureCache, base_version: u64) {
        let page_rect = self.rect_to_screen(Rect::from_min_size(Pos2::ZERO, frame.page_size));
        self.painter
            .rect_filled(page_rect, 0.0, frame.base.background.unwrap_or(PAPER));

        if let Some(raster) = &frame.base.raster {
            let key = TextureKey::Page {
                page: frame.page,
                version: base_version,
            };
            match textures.get_or_upload(self.painter.ctx(), key, Some(raster)) {
                Ok(texture) => {
                    self.painter.image(texture, page_rect, full_uv(), Color32::WHITE);
                }
                Err(e) => warn!("Could not upload raster of page {}: {}", frame.page, e),
            }
        }

        for pass in &frame.layers {
            for op in &pass.ops {
                self.paint_op(op, pass.opacity, textures);
            }
        }
    }

    fn paint_op(&self, op: &DrawOp, opacity: f32, textures: &mut TextureCache) {
        match op {
            DrawOp::Polyline { points, widths, color } => {
                let color = color.gamma_multiply(opacity);
                let screen: Vec<Pos2> = points.iter().map(|p| self.to_screen(*p)).collect();
                let width = |i: usize| self.view.len_to_view(widths.get(i).copied().unwrap_or(1.0));
                match screen.as_slice() {
                    [] => {}
                    [single] => {
                        self.painter.circle_filled(*single, width(0) / 2.0, color);
                    }
                    _ if widths.windows(2).all(|w| w[0] == w[1]) => {
                        self.painter.add(Shape::line(screen, Stroke::new(width(0), color)));
                    }
                    _ => {
                        // Variable width: one segment per pair, mean width
                        for (i, pair) in screen.windows(2).enumerate() {
                            let w = (width(i) + width(i + 1)) / 2.0;
                            self.painter.line_segment([pair[0], pair[1]], Stroke::new(w, color));
                        }
                    }
                }
            }
            DrawOp::Rect { rect, fill, stroke } => {
                let screen = self.rect_to_screen(*rect);
                let fill = fill.map(|c| c.gamma_multiply(opacity)).unwrap_or(Color32::TRANSPARENT);
                let stroke = stroke.map(|s| self.scaled(s, opacity)).unwrap_or(Stroke::NONE);
                self.painter.rect(screen, 0.0, fill, stroke);
            }
            DrawOp::Ellipse { rect, fill, stroke } => {
                let center = self.to_screen(rect.center());
                let radius = self.view.radii_to_view(rect.size() / 2.0);
                if let Some(fill) = fill {
                    self.painter
                        .add(Shape::ellipse_filled(center, radius, fill.gamma_multiply(opacity)));
                }
                if let Some(stroke) = stroke {
                    self.painter
                        .add(Shape::ellipse_stroke(center, radius, self.scaled(*stroke, opacity)));
                }
            }
            DrawOp::Image {
                id,
                rect,
                pixels,
                opacity: own,
            } => match textures.get_or_upload(self.painter.ctx(), TextureKey::Image(*id), pixels.as_deref()) {
                Ok(texture) => {
                    let tint = Color32::WHITE.gamma_multiply(own * opacity);
                    self.painter.image(texture, self.rect_to_screen(*rect), full_uv(), tint);
                }
                Err(e) => warn!("Could not upload image {}: {}", id, e),
            },
            DrawOp::Text {
                rect,
                text,
                font_size,
                color,
                align,
            } => {
                let screen = self.rect_to_screen(*rect);
                let (anchor, pos) = match align {
                    TextAlign::Left => (Align2::LEFT_TOP, screen.left_top()),
                    TextAlign::Center => (Align2::CENTER_TOP, screen.center_top()),
                    TextAlign::Right => (Align2::RIGHT_TOP, screen.right_top()),
                };
                let font = FontId::proportional(self.view.len_to_view(*font_size).max(1.0));
                self.painter.text(pos, anchor, text, font, color.gamma_multiply(opacity));
            }
        }
    }

    /// Tool previews; `handle_radius` is in view pixels
    pub fn paint_overlay(&self, items: &[OverlayItem], handle_radius: f32) {
        let outline = Stroke::new(1.0, SELECTION_COLOR);
        for item in items {
            match item {
                OverlayItem::SelectionBox(rect) => {
                    self.painter.rect_stroke(self.rect_to_screen(*rect), 0.0, outline);
                }
                OverlayItem::Handles(rect) => {
                    for (_, pos) in handle_positions(*rect) {
                        let square = Rect::from_center_size(self.to_screen(pos), vec2(handle_radius, handle_radius) * 2.0);
                        self.painter.rect(square, 1.0, Color32::WHITE, outline);
                    }
                }
                OverlayItem::Marquee(rect) => {
                    let fill = SELECTION_COLOR.gamma_multiply(0.12);
                    self.painter.rect(self.rect_to_screen(*rect), 0.0, fill, outline);
                }
                OverlayItem::PlacementPreview(rect) => {
                    let r = self.rect_to_screen(*rect);
                    let corners = [r.left_top(), r.right_top(), r.right_bottom(), r.left_bottom(), r.left_top()];
                    self.painter.extend(Shape::dashed_line(&corners, outline, 6.0, 4.0));
                }
                OverlayItem::EraserCursor { center, radius } => {
                    let radius = self.view.len_to_view(*radius);
                    self.painter
                        .circle_stroke(self.to_screen(*center), radius, Stroke::new(1.0, ERASER_COLOR));
                }
                OverlayItem::TextCaret { top, height } => {
                    let start = self.to_screen(*top);
                    let end = self.to_screen(*top + vec2(0.0, *height));
                    self.painter.line_segment([start, end], Stroke::new(1.5, Color32::BLACK));
                }
            }
        }
    }
}

fn full_uv() -> Rect {
    Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use egui::{Context, LayerId, RawInput};
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::element::factory;
    use crate::state::test_support::scene_with_pages;

    #[test]
    fn test_paints_page_raster_and_single_point_stroke() {
        let mut scene = scene_with_pages(1);
        let layer = scene.active_layer_id();
        scene
            .add_object(factory::path(1, layer, vec![pos2(20.0, 20.0)], 3.0, Color32::BLACK))
            .unwrap();
        let raster = Arc::new(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])));
        let frame = Frame::build(&scene, 1, Some(raster), Vec::new()).unwrap();
        let view = scene.current_page_view().unwrap();
        let mut textures = TextureCache::new(4);

        let ctx = Context::default();
        let output = ctx.run(RawInput::default(), |ctx| {
            let painter = ctx.layer_painter(LayerId::background());
            CanvasPainter::new(&painter, view, Pos2::ZERO).paint_content(&frame, &mut textures, 1);
        });

        assert!(output.shapes.iter().any(|c| matches!(c.shape, Shape::Mesh(_))));
        assert!(output.shapes.iter().any(|c| matches!(c.shape, Shape::Circle(_))));
    }
}

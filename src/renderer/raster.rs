//! Software backend: flattens a [`Frame`] into pixels for export and thumbnails.
//!
//! Coverage is sampled once per pixel center in document space, so rotation and scale
//! come for free from [`PageView`]. Overlays are never drawn. Text is left to the vector
//! exporter, which gets it from the scene's object list.

use egui::{Color32, Pos2, Rect, Vec2, pos2};
use image::{Rgba, RgbaImage};

use crate::geometry::hit_testing::{bounds_of, point_in_ellipse};
use crate::geometry::transform::rotated_size;
use crate::geometry::{PageView, Rotation};
use crate::layer::BlendMode;
use crate::renderer::{DrawOp, Frame};

/// Scale that fits the rotated page's longest edge into `max_edge` pixels
pub fn fit_scale(page_size: Vec2, max_edge: u32) -> f32 {
    let longest = page_size.x.max(page_size.y);
    if longest <= 0.0 {
        1.0
    } else {
        max_edge as f32 / longest
    }
}

/// Pixel size of `page_size` under `rotation` at `scale`
pub fn output_size(page_size: Vec2, rotation: Rotation, scale: f32) -> (u32, u32) {
    let size = rotated_size(page_size, rotation) * scale;
    (size.x.round().max(1.0) as u32, size.y.round().max(1.0) as u32)
}

/// Render base content and every layer pass of `frame` at `scale` pixels per unit
pub fn flatten(frame: &Frame, scale: f32) -> RgbaImage {
    let view = PageView::at_scale(frame.page_size, frame.rotation, scale);
    let (width, height) = output_size(frame.page_size, frame.rotation, scale);
    let mut canvas = RgbaImage::new(width, height);

    if let Some(background) = frame.base.background {
        let fill = Rgba(background.to_srgba_unmultiplied());
        for pixel in canvas.pixels_mut() {
            *pixel = fill;
        }
    }
    if let Some(raster) = &frame.base.raster {
        draw_base(&mut canvas, raster);
    }

    for pass in &frame.layers {
        let mut layer = RgbaImage::new(width, height);
        for op in &pass.ops {
            draw_op(&mut layer, &view, op);
        }
        composite(&mut canvas, &layer, pass.blend, pass.opacity);
    }
    canvas
}

/// Nearest-neighbour copy of the page raster, whatever its resolution
fn draw_base(canvas: &mut RgbaImage, raster: &RgbaImage) {
    let (cw, ch) = canvas.dimensions();
    let (rw, rh) = raster.dimensions();
    if rw == 0 || rh == 0 {
        return;
    }
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let sx = ((x as u64 * rw as u64) / cw as u64).min(rw as u64 - 1) as u32;
        let sy = ((y as u64 * rh as u64) / ch as u64).min(rh as u64 - 1) as u32;
        let src = raster.get_pixel(sx, sy);
        blend_pixel(pixel, to_unit(src.0), 1.0, BlendMode::Normal);
    }
}

fn composite(canvas: &mut RgbaImage, layer: &RgbaImage, blend: BlendMode, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }
    for (dst, src) in canvas.pixels_mut().zip(layer.pixels()) {
        if src.0[3] > 0 {
            blend_pixel(dst, to_unit(src.0), opacity, blend);
        }
    }
}

fn to_unit(rgba: [u8; 4]) -> [f32; 4] {
    rgba.map(|c| c as f32 / 255.0)
}

/// Separable blend then source-over, all channels unpremultiplied
fn blend_pixel(dst: &mut Rgba<u8>, src: [f32; 4], opacity: f32, blend: BlendMode) {
    let d = to_unit(dst.0);
    let src_alpha = src[3] * opacity;
    let dst_alpha = d[3];
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        let mixed = (1.0 - dst_alpha) * src[i] + dst_alpha * blend.blend_channel(src[i], d[i]);
        let c = (src_alpha * mixed + dst_alpha * (1.0 - src_alpha) * d[i]) / out_alpha;
        out[i] = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    out[3] = (out_alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    *dst = Rgba(out);
}

fn draw_op(target: &mut RgbaImage, view: &PageView, op: &DrawOp) {
    match op {
        DrawOp::Polyline { points, widths, color } => {
            let width_at = |i: usize| widths.get(i).copied().unwrap_or(1.0);
            let max_width = widths.iter().copied().fold(0.0, f32::max);
            let bounds = bounds_of(points, max_width / 2.0);
            // At least half a pixel so hairlines survive downscaling
            let min_half = 0.5 / view.zoom();
            fill_covered(target, view, bounds, *color, |p| {
                if points.len() == 1 {
                    return p.distance(points[0]) <= (width_at(0) / 2.0).max(min_half);
                }
                points.windows(2).enumerate().any(|(i, w)| {
                    let (distance, t) = segment_distance(p, w[0], w[1]);
                    let half = (width_at(i) + (width_at(i + 1) - width_at(i)) * t) / 2.0;
                    distance <= half.max(min_half)
                })
            });
        }
        DrawOp::Rect { rect, fill, stroke } => {
            if let Some(fill) = fill {
                fill_covered(target, view, *rect, *fill, |p| rect.contains(p));
            }
            if let Some(stroke) = stroke.filter(|s| s.width > 0.0) {
                let outer = rect.expand(stroke.width / 2.0);
                let inner = rect.shrink(stroke.width / 2.0);
                fill_covered(target, view, outer, stroke.color, |p| {
                    outer.contains(p) && !(inner.is_positive() && inner.contains(p))
                });
            }
        }
        DrawOp::Ellipse { rect, fill, stroke } => {
            if let Some(fill) = fill {
                fill_covered(target, view, *rect, *fill, |p| point_in_ellipse(p, *rect));
            }
            if let Some(stroke) = stroke.filter(|s| s.width > 0.0) {
                let outer = rect.expand(stroke.width / 2.0);
                let inner = rect.shrink(stroke.width / 2.0);
                fill_covered(target, view, outer, stroke.color, |p| {
                    point_in_ellipse(p, outer) && !(inner.is_positive() && point_in_ellipse(p, inner))
                });
            }
        }
        DrawOp::Image { rect, pixels, opacity, .. } => {
            let Some(pixels) = pixels else {
                return;
            };
            let (iw, ih) = pixels.dimensions();
            if iw == 0 || ih == 0 || !rect.is_positive() {
                return;
            }
            for_each_pixel(target, view, *rect, |p, pixel| {
                if !rect.contains(p) {
                    return;
                }
                let u = ((p.x - rect.min.x) / rect.width() * iw as f32) as u32;
                let v = ((p.y - rect.min.y) / rect.height() * ih as f32) as u32;
                let src = pixels.get_pixel(u.min(iw - 1), v.min(ih - 1));
                blend_pixel(pixel, to_unit(src.0), *opacity, BlendMode::Normal);
            });
        }
        DrawOp::Text { .. } => {}
    }
}

fn fill_covered(target: &mut RgbaImage, view: &PageView, bounds: Rect, color: Color32, covers: impl Fn(Pos2) -> bool) {
    let src = to_unit(color.to_srgba_unmultiplied());
    if src[3] <= 0.0 {
        return;
    }
    for_each_pixel(target, view, bounds, |p, pixel| {
        if covers(p) {
            blend_pixel(pixel, src, 1.0, BlendMode::Normal);
        }
    });
}

/// Visit the target pixels whose centers may fall in `bounds`, with the document-space
/// position of each center
fn for_each_pixel(target: &mut RgbaImage, view: &PageView, bounds: Rect, mut f: impl FnMut(Pos2, &mut Rgba<u8>)) {
    let (width, height) = target.dimensions();
    let area = view.rect_to_view(bounds).expand(1.0);
    let x0 = area.min.x.floor().max(0.0) as u32;
    let y0 = area.min.y.floor().max(0.0) as u32;
    let x1 = (area.max.x.ceil().max(0.0) as u32).min(width);
    let y1 = (area.max.y.ceil().max(0.0) as u32).min(height);
    for y in y0..y1 {
        for x in x0..x1 {
            let doc = view.to_doc(pos2(x as f32 + 0.5, y as f32 + 0.5));
            f(doc, target.get_pixel_mut(x, y));
        }
    }
}

/// Distance from `p` to segment `ab`, and the clamped parameter of the closest point
fn segment_distance(p: Pos2, a: Pos2, b: Pos2) -> (f32, f32) {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return (p.distance(a), 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p.distance(a + ab * t), t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerId;
    use crate::renderer::{BaseContent, LayerPass, OverlayItem};
    use egui::{Stroke, vec2};
    use std::sync::Arc;

    fn frame(rotation: Rotation, layers: Vec<LayerPass>) -> Frame {
        Frame {
            page: 1,
            page_size: vec2(20.0, 10.0),
            rotation,
            base: BaseContent {
                raster: Some(Arc::new(RgbaImage::from_pixel(20, 10, Rgba([255, 255, 255, 255])))),
                background: None,
            },
            layers,
            overlay: Vec::new(),
        }
    }

    fn pass(blend: BlendMode, opacity: f32, ops: Vec<DrawOp>) -> LayerPass {
        LayerPass {
            layer: LayerId::new(),
            blend,
            opacity,
            ops,
        }
    }

    fn square(color: Color32) -> DrawOp {
        DrawOp::Rect {
            rect: Rect::from_min_size(Pos2::ZERO, vec2(4.0, 4.0)),
            fill: Some(color),
            stroke: None,
        }
    }

    #[test]
    fn test_layer_opacity_mixes_with_base() {
        let image = flatten(&frame(Rotation::Deg0, vec![pass(BlendMode::Normal, 0.5, vec![square(Color32::BLACK)])]), 1.0);
        let Rgba([r, _, _, a]) = *image.get_pixel(1, 1);
        assert!((126..=129).contains(&r), "got {r}");
        assert_eq!(a, 255);
        assert_eq!(*image.get_pixel(10, 5), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_multiply_darkens_only_where_drawn() {
        let red = Color32::from_rgb(255, 0, 0);
        let blue = Color32::from_rgb(0, 0, 255);
        let image = flatten(
            &frame(
                Rotation::Deg0,
                vec![
                    pass(BlendMode::Normal, 1.0, vec![square(red)]),
                    pass(BlendMode::Multiply, 1.0, vec![square(blue)]),
                ],
            ),
            1.0,
        );
        // red x blue is black; blue over white stays blue outside the red square
        assert_eq!(*image.get_pixel(1, 1), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_rotation_moves_content() {
        let image = flatten(&frame(Rotation::Deg90, vec![pass(BlendMode::Normal, 1.0, vec![square(Color32::BLACK)])]), 1.0);
        assert_eq!(image.dimensions(), (10, 20));
        // Document top-left lands at the top-right after a quarter turn
        assert_eq!(image.get_pixel(8, 1).0[0], 0);
        assert_eq!(image.get_pixel(1, 1).0[0], 255);
    }

    #[test]
    fn test_overlay_is_never_flattened() {
        let mut with_overlay = frame(Rotation::Deg0, Vec::new());
        with_overlay.overlay = vec![OverlayItem::Marquee(Rect::from_min_size(Pos2::ZERO, vec2(20.0, 10.0)))];
        assert_eq!(flatten(&with_overlay, 1.0), flatten(&frame(Rotation::Deg0, Vec::new()), 1.0));
    }

    #[test]
    fn test_polyline_and_outline_coverage() {
        let line = DrawOp::Polyline {
            points: vec![pos2(0.0, 8.0), pos2(10.0, 8.0)],
            widths: vec![2.0, 2.0],
            color: Color32::BLACK,
        };
        let outline = DrawOp::Rect {
            rect: Rect::from_min_size(pos2(12.0, 1.0), vec2(6.0, 4.0)),
            fill: None,
            stroke: Some(Stroke::new(2.0, Color32::BLACK)),
        };
        let image = flatten(&frame(Rotation::Deg0, vec![pass(BlendMode::Normal, 1.0, vec![line, outline])]), 1.0);
        assert_eq!(image.get_pixel(3, 7).0[0], 0);
        assert_eq!(image.get_pixel(3, 4).0[0], 255);
        assert_eq!(image.get_pixel(11, 0).0[0], 0);
        assert_eq!(image.get_pixel(15, 3).0[0], 255);
    }

    #[test]
    fn test_fit_scale() {
        assert_eq!(fit_scale(vec2(200.0, 100.0), 50), 0.25);
        assert_eq!(output_size(vec2(200.0, 100.0), Rotation::Deg270, 0.25), (25, 50));
    }
}

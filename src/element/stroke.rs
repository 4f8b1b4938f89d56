use egui::{Color32, Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::geometry::hit_testing;

/// Freehand ink: a polyline with optional per-point widths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathObject {
    pub points: Vec<Pos2>,
    /// Per-point stroke widths; empty means every point uses `width`
    #[serde(default)]
    pub widths: Vec<f32>,
    pub color: Color32,
    pub width: f32,
    pub opacity: f32,
}

impl PathObject {
    pub fn new(points: Vec<Pos2>, color: Color32, width: f32) -> Self {
        Self {
            points,
            widths: Vec::new(),
            color,
            width,
            opacity: 1.0,
        }
    }

    /// Stroke width at point `index`
    pub fn width_at(&self, index: usize) -> f32 {
        self.widths.get(index).copied().unwrap_or(self.width)
    }

    /// Widest point, used for bounds padding and hit tolerance
    pub fn max_width(&self) -> f32 {
        self.widths.iter().copied().fold(self.width, f32::max)
    }

    /// Box through the sample points, without stroke padding
    pub fn geometry_rect(&self) -> Rect {
        hit_testing::bounds_of(&self.points, 0.0)
    }

    pub fn bounds(&self) -> Rect {
        hit_testing::bounds_of(&self.points, self.max_width() / 2.0)
    }

    pub fn translate(&mut self, delta: Vec2) {
        hit_testing::translate_points(&mut self.points, delta);
    }

    /// Stretch the points from their current box into `new_rect`
    pub fn fit_to(&mut self, new_rect: Rect) {
        let old = self.geometry_rect();
        if old == Rect::NOTHING {
            return;
        }
        let scale = ((new_rect.width() / old.width().max(f32::EPSILON))
            + (new_rect.height() / old.height().max(f32::EPSILON)))
            / 2.0;
        for point in &mut self.points {
            *point = hit_testing::remap_point(*point, old, new_rect);
        }
        // Degenerate axes (a horizontal line) would otherwise blow the width up
        if scale.is_finite() && old.width() > f32::EPSILON && old.height() > f32::EPSILON {
            self.width *= scale;
            for w in &mut self.widths {
                *w *= scale;
            }
        }
    }
}

/// Straight segment. Start and end are kept as drawn: the direction is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineObject {
    pub start: Pos2,
    pub end: Pos2,
    pub color: Color32,
    pub width: f32,
    pub opacity: f32,
    #[serde(default)]
    pub arrow_head: bool,
}

impl LineObject {
    pub fn new(start: Pos2, end: Pos2, color: Color32, width: f32) -> Self {
        Self {
            start,
            end,
            color,
            width,
            opacity: 1.0,
            arrow_head: false,
        }
    }

    pub fn geometry_rect(&self) -> Rect {
        Rect::from_two_pos(self.start, self.end)
    }

    pub fn bounds(&self) -> Rect {
        hit_testing::bounds_of(&[self.start, self.end], self.width / 2.0)
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.start += delta;
        self.end += delta;
    }

    pub fn fit_to(&mut self, new_rect: Rect) {
        let old = self.geometry_rect();
        self.start = hit_testing::remap_point(self.start, old, new_rect);
        self.end = hit_testing::remap_point(self.end, old, new_rect);
    }

    /// Two short strokes forming an arrow head at `end`
    pub fn arrow_head_points(&self) -> Option<[Pos2; 3]> {
        let dir = self.end - self.start;
        let len = dir.length();
        if !self.arrow_head || len <= f32::EPSILON {
            return None;
        }
        let unit = dir / len;
        let size = (self.width * 4.0).max(8.0).min(len);
        let back = self.end - unit * size;
        let normal = egui::vec2(-unit.y, unit.x) * size * 0.5;
        Some([back + normal, self.end, back - normal])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    #[test]
    fn test_fit_to_scales_points_and_width() {
        let mut path = PathObject::new(
            vec![pos2(0.0, 0.0), pos2(10.0, 10.0)],
            Color32::BLACK,
            2.0,
        );
        path.fit_to(Rect::from_min_max(pos2(0.0, 0.0), pos2(20.0, 20.0)));
        assert_eq!(path.points[1], pos2(20.0, 20.0));
        assert_eq!(path.width, 4.0);
    }

    #[test]
    fn test_line_keeps_direction_when_fitted() {
        let mut line = LineObject::new(pos2(10.0, 10.0), pos2(0.0, 0.0), Color32::BLACK, 1.0);
        line.fit_to(Rect::from_min_max(pos2(0.0, 0.0), pos2(20.0, 20.0)));
        assert_eq!(line.start, pos2(20.0, 20.0));
        assert_eq!(line.end, pos2(0.0, 0.0));
    }
}

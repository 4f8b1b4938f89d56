//! Pure hit-testing primitives shared by tools and the renderer.

use egui::{Pos2, Rect, Vec2, pos2};

/// One of the eight resize handles around a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Self::TopLeft,
        Self::Top,
        Self::TopRight,
        Self::Right,
        Self::BottomRight,
        Self::Bottom,
        Self::BottomLeft,
        Self::Left,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Self::TopLeft => Self::BottomRight,
            Self::Top => Self::Bottom,
            Self::TopRight => Self::BottomLeft,
            Self::Right => Self::Left,
            Self::BottomRight => Self::TopLeft,
            Self::Bottom => Self::Top,
            Self::BottomLeft => Self::TopRight,
            Self::Left => Self::Right,
        }
    }

    /// Whether dragging this handle changes the width
    pub fn moves_x(self) -> bool {
        !matches!(self, Self::Top | Self::Bottom)
    }

    /// Whether dragging this handle changes the height
    pub fn moves_y(self) -> bool {
        !matches!(self, Self::Left | Self::Right)
    }

    pub fn is_corner(self) -> bool {
        self.moves_x() && self.moves_y()
    }

    /// Position of this handle on `rect`
    pub fn position(self, rect: Rect) -> Pos2 {
        let c = rect.center();
        match self {
            Self::TopLeft => rect.left_top(),
            Self::Top => pos2(c.x, rect.min.y),
            Self::TopRight => rect.right_top(),
            Self::Right => pos2(rect.max.x, c.y),
            Self::BottomRight => rect.right_bottom(),
            Self::Bottom => pos2(c.x, rect.max.y),
            Self::BottomLeft => rect.left_bottom(),
            Self::Left => pos2(rect.min.x, c.y),
        }
    }
}

/// Eight resize-anchor positions, clockwise from the top-left corner
pub fn handle_positions(rect: Rect) -> [(Handle, Pos2); 8] {
    Handle::ALL.map(|handle| (handle, handle.position(rect)))
}

/// The handle within `radius` of `pos`, nearest first
pub fn handle_at(rect: Rect, pos: Pos2, radius: f32) -> Option<Handle> {
    handle_positions(rect)
        .into_iter()
        .map(|(handle, at)| (handle, at.distance(pos)))
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(handle, _)| handle)
}

/// Axis-aligned bounding box of a point list, grown by `padding` on every side
pub fn bounds_of(points: &[Pos2], padding: f32) -> Rect {
    if points.is_empty() {
        return Rect::NOTHING;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for point in points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    Rect::from_min_max(
        pos2(min_x - padding, min_y - padding),
        pos2(max_x + padding, max_y + padding),
    )
}

/// Distance from `point` to the segment `a`..`b`
pub fn distance_to_segment(point: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// Inclusive rectangle containment
pub fn point_in_rect(point: Pos2, rect: Rect) -> bool {
    let rect = normalize(rect);
    point.x >= rect.min.x && point.x <= rect.max.x && point.y >= rect.min.y && point.y <= rect.max.y
}

/// Containment in the ellipse inscribed in `rect`
pub fn point_in_ellipse(point: Pos2, rect: Rect) -> bool {
    let rect = normalize(rect);
    let radii = rect.size() / 2.0;
    if radii.x <= 0.0 || radii.y <= 0.0 {
        return false;
    }
    let d = point - rect.center();
    (d.x / radii.x).powi(2) + (d.y / radii.y).powi(2) <= 1.0
}

pub fn circle_intersects_rect(center: Pos2, radius: f32, rect: Rect) -> bool {
    let rect = normalize(rect);
    let nearest = pos2(
        center.x.clamp(rect.min.x, rect.max.x),
        center.y.clamp(rect.min.y, rect.max.y),
    );
    nearest.distance(center) <= radius
}

/// Approximates the Minkowski sum by growing the ellipse's box
pub fn circle_intersects_ellipse(center: Pos2, radius: f32, rect: Rect) -> bool {
    point_in_ellipse(center, normalize(rect).expand(radius))
}

pub fn circle_intersects_polyline(center: Pos2, radius: f32, points: &[Pos2]) -> bool {
    match points {
        [] => false,
        [only] => only.distance(center) <= radius,
        _ => points
            .windows(2)
            .any(|w| distance_to_segment(center, w[0], w[1]) <= radius),
    }
}

/// Parameters `(t_enter, t_exit)` along `a`..`b` where the segment crosses the circle,
/// when both crossings lie strictly inside the segment
pub fn segment_circle_crossings(a: Pos2, b: Pos2, center: Pos2, radius: f32) -> Option<(f32, f32)> {
    let d = b - a;
    let f = a - center;
    let qa = d.length_sq();
    if qa == 0.0 {
        return None;
    }
    let qb = 2.0 * f.dot(d);
    let qc = f.length_sq() - radius * radius;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc <= 0.0 {
        return None;
    }
    let root = disc.sqrt();
    let t_enter = (-qb - root) / (2.0 * qa);
    let t_exit = (-qb + root) / (2.0 * qa);
    (t_enter > 0.0 && t_exit < 1.0).then_some((t_enter, t_exit))
}

/// A positive-width, positive-height rectangle anchored at its top-left
pub fn normalize(rect: Rect) -> Rect {
    Rect::from_two_pos(rect.min, rect.max)
}

/// Hit tolerance for stroked geometry: half the stroke plus a zoom-independent slop
pub fn stroke_tolerance(stroke_width: f32, slop_px: f32, zoom: f32) -> f32 {
    let zoom = if zoom > 0.0 { zoom } else { 1.0 };
    stroke_width / 2.0 + slop_px / zoom
}

/// Ramer–Douglas–Peucker simplification. Returns the indices of the points to keep,
/// always including the first and last.
pub fn simplify_douglas_peucker(points: &[Pos2], tolerance: f32) -> Vec<usize> {
    if points.len() <= 2 {
        return (0..points.len()).collect();
    }

    let last = points.len() - 1;
    let mut keep = vec![0];
    simplify_step(points, 0, last, tolerance * tolerance, &mut keep);
    keep.push(last);
    keep
}

fn simplify_step(points: &[Pos2], first: usize, last: usize, sq_tolerance: f32, keep: &mut Vec<usize>) {
    let mut max_sq_dist = sq_tolerance;
    let mut index = 0;

    for i in first + 1..last {
        let d = distance_to_segment(points[i], points[first], points[last]);
        let sq = d * d;
        if sq > max_sq_dist {
            index = i;
            max_sq_dist = sq;
        }
    }

    if max_sq_dist > sq_tolerance {
        if index - first > 1 {
            simplify_step(points, first, index, sq_tolerance, keep);
        }
        keep.push(index);
        if last - index > 1 {
            simplify_step(points, index, last, sq_tolerance, keep);
        }
    }
}

/// Scale a point from one box into another, preserving its relative position
pub fn remap_point(point: Pos2, from: Rect, to: Rect) -> Pos2 {
    let rel = |v: f32, min: f32, len: f32| if len.abs() > f32::EPSILON { (v - min) / len } else { 0.0 };
    let rx = rel(point.x, from.min.x, from.width());
    let ry = rel(point.y, from.min.y, from.height());
    pos2(to.min.x + rx * to.width(), to.min.y + ry * to.height())
}

/// Uniform translation helper that keeps call sites terse
pub fn translate_points(points: &mut [Pos2], delta: Vec2) {
    for point in points {
        *point += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_segment() {
        let a = pos2(0.0, 0.0);
        let b = pos2(10.0, 0.0);
        assert_eq!(distance_to_segment(pos2(5.0, 3.0), a, b), 3.0);
        assert_eq!(distance_to_segment(pos2(-4.0, 3.0), a, b), 5.0);
        assert_eq!(distance_to_segment(pos2(1.0, 1.0), a, a), 2.0_f32.sqrt());
    }

    #[test]
    fn test_segment_circle_crossings() {
        let a = pos2(0.0, 0.0);
        let b = pos2(100.0, 0.0);
        let (enter, exit) = segment_circle_crossings(a, b, pos2(50.0, 0.0), 10.0).unwrap();
        assert!((enter - 0.4).abs() < 1e-5);
        assert!((exit - 0.6).abs() < 1e-5);
        // An endpoint inside the circle is not a clean pass-through
        assert_eq!(segment_circle_crossings(a, b, pos2(95.0, 0.0), 10.0), None);
        assert_eq!(segment_circle_crossings(a, b, pos2(50.0, 20.0), 10.0), None);
    }

    #[test]
    fn test_handles_and_opposites() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(10.0, 20.0));
        let positions = handle_positions(rect);
        assert_eq!(positions[1].1, pos2(5.0, 0.0));
        assert_eq!(positions[3].1, pos2(10.0, 10.0));
        for handle in Handle::ALL {
            assert_eq!(handle.opposite().opposite(), handle);
        }
        assert_eq!(handle_at(rect, pos2(9.0, 19.0), 3.0), Some(Handle::BottomRight));
        assert_eq!(handle_at(rect, pos2(5.0, 10.0), 3.0), None);
    }

    #[test]
    fn test_ellipse_and_rect_containment() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(20.0, 10.0));
        assert!(point_in_ellipse(pos2(10.0, 5.0), rect));
        assert!(!point_in_ellipse(pos2(1.0, 1.0), rect));
        assert!(point_in_rect(pos2(1.0, 1.0), rect));
        assert!(point_in_rect(pos2(20.0, 10.0), rect));
        // Inverted boxes behave like their normalized form
        let inverted = Rect::from_min_max(pos2(20.0, 10.0), pos2(0.0, 0.0));
        assert!(point_in_rect(pos2(5.0, 5.0), inverted));
    }

    #[test]
    fn test_circle_intersections() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(10.0, 10.0));
        assert!(circle_intersects_rect(pos2(12.0, 5.0), 2.5, rect));
        assert!(!circle_intersects_rect(pos2(14.0, 5.0), 2.5, rect));
        let line = [pos2(0.0, 0.0), pos2(10.0, 0.0)];
        assert!(circle_intersects_polyline(pos2(5.0, 1.0), 1.5, &line));
        assert!(!circle_intersects_polyline(pos2(5.0, 4.0), 1.5, &line));
    }

    #[test]
    fn test_douglas_peucker_keeps_corners() {
        let points: Vec<Pos2> = (0..=10)
            .map(|i| pos2(i as f32, 0.0))
            .chain((1..=10).map(|i| pos2(10.0, i as f32)))
            .collect();
        let kept = simplify_douglas_peucker(&points, 0.5);
        assert_eq!(kept, vec![0, 10, 20]);
    }

    #[test]
    fn test_bounds_of() {
        let rect = bounds_of(&[pos2(1.0, 5.0), pos2(-2.0, 3.0)], 1.0);
        assert_eq!(rect, Rect::from_min_max(pos2(-3.0, 2.0), pos2(2.0, 6.0)));
        assert_eq!(bounds_of(&[], 0.0), Rect::NOTHING);
    }
}

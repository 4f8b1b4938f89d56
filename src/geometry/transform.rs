//! Mapping between document space and view space.
//!
//! Document space is the page's intrinsic coordinate system (origin top-left, y down,
//! unrotated). View space is logical on-screen pixels after rotation, zoom and pan.
//! Device pixel ratio never enters these functions; it is applied by the backend that
//! finally rasterizes (see [`to_device`]).

use egui::{Pos2, Rect, Vec2, pos2, vec2};
use serde::{Deserialize, Serialize};

/// Quarter-turn rotation applied to a page or to the whole view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Self::Deg0, Self::Deg90, Self::Deg180, Self::Deg270];

    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Snap an arbitrary angle to the nearest quarter turn
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    /// Compose two rotations (clockwise)
    pub fn rotated_by(self, other: Rotation) -> Self {
        Self::from_degrees(self.degrees() + other.degrees())
    }

    pub fn clockwise(self) -> Self {
        self.rotated_by(Self::Deg90)
    }

    pub fn counter_clockwise(self) -> Self {
        self.rotated_by(Self::Deg270)
    }

    /// True when width and height trade places
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Where the user is looking. Not part of undo history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// 1-based current page number
    pub page: usize,
    pub zoom: f32,
    pub rotation: Rotation,
    /// Offset of the page origin in view pixels
    pub pan: Vec2,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page: 1,
            zoom: 1.0,
            rotation: Rotation::Deg0,
            pan: Vec2::ZERO,
        }
    }
}

impl ViewState {
    fn safe_zoom(&self) -> f32 {
        if self.zoom.is_finite() && self.zoom > 0.0 {
            self.zoom
        } else {
            1.0
        }
    }
}

fn rotate_into(p: Pos2, rotation: Rotation, page_size: Vec2) -> Pos2 {
    match rotation {
        Rotation::Deg0 => p,
        Rotation::Deg90 => pos2(page_size.y - p.y, p.x),
        Rotation::Deg180 => pos2(page_size.x - p.x, page_size.y - p.y),
        Rotation::Deg270 => pos2(p.y, page_size.x - p.x),
    }
}

fn rotate_out(q: Pos2, rotation: Rotation, page_size: Vec2) -> Pos2 {
    match rotation {
        Rotation::Deg0 => q,
        Rotation::Deg90 => pos2(q.y, page_size.y - q.x),
        Rotation::Deg180 => pos2(page_size.x - q.x, page_size.y - q.y),
        Rotation::Deg270 => pos2(page_size.x - q.y, q.x),
    }
}

/// Map a document-space point to view space
pub fn to_view(doc: Pos2, view: &ViewState, page_size: Vec2) -> Pos2 {
    let zoom = view.safe_zoom();
    let rotated = rotate_into(doc, view.rotation, page_size);
    pos2(rotated.x * zoom + view.pan.x, rotated.y * zoom + view.pan.y)
}

/// Map a view-space point back to document space. Inverse of [`to_view`].
pub fn to_doc(point: Pos2, view: &ViewState, page_size: Vec2) -> Pos2 {
    let zoom = view.safe_zoom();
    let unscaled = pos2((point.x - view.pan.x) / zoom, (point.y - view.pan.y) / zoom);
    rotate_out(unscaled, view.rotation, page_size)
}

/// Size of the page box after rotation, in document units
pub fn rotated_size(page_size: Vec2, rotation: Rotation) -> Vec2 {
    if rotation.swaps_axes() {
        vec2(page_size.y, page_size.x)
    } else {
        page_size
    }
}

/// Final rasterization step: logical view pixels to device pixels
pub fn to_device(point: Pos2, pixels_per_point: f32) -> Pos2 {
    pos2(point.x * pixels_per_point, point.y * pixels_per_point)
}

/// A view state bound to one page's geometry.
///
/// `view.rotation` here is the effective rotation: the page's own rotation composed
/// with the view rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageView {
    pub view: ViewState,
    pub page_size: Vec2,
}

impl PageView {
    pub fn new(view: &ViewState, page_size: Vec2, page_rotation: Rotation) -> Self {
        let mut effective = *view;
        effective.rotation = page_rotation.rotated_by(view.rotation);
        Self {
            view: effective,
            page_size,
        }
    }

    /// Unrotated, unpanned view used for export and thumbnails
    pub fn at_scale(page_size: Vec2, rotation: Rotation, scale: f32) -> Self {
        Self {
            view: ViewState {
                page: 1,
                zoom: scale,
                rotation,
                pan: Vec2::ZERO,
            },
            page_size,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.view.safe_zoom()
    }

    pub fn to_view(&self, doc: Pos2) -> Pos2 {
        to_view(doc, &self.view, self.page_size)
    }

    pub fn to_doc(&self, point: Pos2) -> Pos2 {
        to_doc(point, &self.view, self.page_size)
    }

    /// Axis-aligned boxes stay axis-aligned under quarter turns
    pub fn rect_to_view(&self, rect: Rect) -> Rect {
        Rect::from_two_pos(self.to_view(rect.min), self.to_view(rect.max))
    }

    /// Convert a view-pixel length to document units
    pub fn len_to_doc(&self, len: f32) -> f32 {
        len / self.zoom()
    }

    pub fn len_to_view(&self, len: f32) -> f32 {
        len * self.zoom()
    }

    /// Extent of the page on screen
    pub fn page_rect(&self) -> Rect {
        self.rect_to_view(Rect::from_min_size(Pos2::ZERO, self.page_size))
    }

    /// Half-axes of an ellipse after rotation (document units scaled to view)
    pub fn radii_to_view(&self, radii: Vec2) -> Vec2 {
        let swapped = if self.view.rotation.swaps_axes() {
            vec2(radii.y, radii.x)
        } else {
            radii
        };
        swapped * self.zoom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Pos2, b: Pos2) {
        assert!(
            (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn test_round_trip_all_rotations_and_zooms() {
        let page = vec2(612.0, 792.0);
        let points = [
            pos2(0.0, 0.0),
            pos2(612.0, 792.0),
            pos2(100.5, 33.25),
            pos2(-20.0, 900.0),
            pos2(306.0, 396.0),
        ];
        for rotation in Rotation::ALL {
            for zoom in [0.25, 0.5, 1.0, 1.75, 3.0, 5.0] {
                let view = ViewState {
                    page: 1,
                    zoom,
                    rotation,
                    pan: vec2(37.0, -12.5),
                };
                for p in points {
                    assert_close(to_doc(to_view(p, &view, page), &view, page), p);
                }
            }
        }
    }

    #[test]
    fn test_rotation_maps_page_corners() {
        let page = vec2(100.0, 200.0);
        let view = ViewState {
            rotation: Rotation::Deg90,
            ..Default::default()
        };
        // Top-left of the page ends up at the top-right of the rotated box
        assert_close(to_view(pos2(0.0, 0.0), &view, page), pos2(200.0, 0.0));
        assert_close(to_view(pos2(100.0, 200.0), &view, page), pos2(0.0, 100.0));
        assert_eq!(rotated_size(page, Rotation::Deg90), vec2(200.0, 100.0));
    }

    #[test]
    fn test_rotation_composition() {
        assert_eq!(Rotation::Deg270.clockwise(), Rotation::Deg0);
        assert_eq!(Rotation::Deg0.counter_clockwise(), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(-90), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(440), Rotation::Deg90);
    }

    #[test]
    fn test_page_view_combines_rotations() {
        let view = ViewState {
            rotation: Rotation::Deg90,
            ..Default::default()
        };
        let page_view = PageView::new(&view, vec2(10.0, 20.0), Rotation::Deg180);
        assert_eq!(page_view.view.rotation, Rotation::Deg270);
    }

    #[test]
    fn test_device_scaling_is_separate() {
        let view = ViewState {
            zoom: 2.0,
            ..Default::default()
        };
        let p = to_view(pos2(10.0, 10.0), &view, vec2(100.0, 100.0));
        assert_eq!(p, pos2(20.0, 20.0));
        assert_eq!(to_device(p, 2.0), pos2(40.0, 40.0));
    }
}

use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod common;
pub mod form_field;
pub mod image;
pub mod shape;
pub mod stroke;
pub mod text;

pub use common::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, MIN_OBJECT_SIZE, with_opacity};
pub use form_field::{FormFieldKind, FormFieldObject};
pub use image::{ImageObject, PendingImage};
pub use shape::{HighlightObject, ShapeKind, ShapeObject};
pub use stroke::{LineObject, PathObject};
pub use text::{TextAlign, TextObject};

use crate::geometry::hit_testing;
use crate::layer::LayerId;
use crate::util::time;

/// Unique identifier of a drawable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variant payloads. Rendering, export and hit-testing match on this exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    Text(TextObject),
    Path(PathObject),
    Rectangle(ShapeObject),
    Oval(ShapeObject),
    Line(LineObject),
    Image(ImageObject),
    Highlight(HighlightObject),
    FormField(FormFieldObject),
}

impl ObjectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Path(_) => "path",
            Self::Rectangle(_) => "rectangle",
            Self::Oval(_) => "oval",
            Self::Line(_) => "line",
            Self::Image(_) => "image",
            Self::Highlight(_) => "highlight",
            Self::FormField(_) => "form_field",
        }
    }

    /// The box a user manipulates: no stroke padding, always normalized
    pub fn geometry_rect(&self) -> Rect {
        match self {
            Self::Text(t) => common::normalized(t.rect),
            Self::Rectangle(s) | Self::Oval(s) => common::normalized(s.rect),
            Self::Image(i) => common::normalized(i.rect),
            Self::Highlight(h) => common::normalized(h.rect),
            Self::FormField(f) => common::normalized(f.rect),
            Self::Path(p) => p.geometry_rect(),
            Self::Line(l) => l.geometry_rect(),
        }
    }

    /// Visual extent including stroke width
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Rectangle(s) | Self::Oval(s) => common::normalized(s.rect).expand(s.stroke_width / 2.0),
            Self::Path(p) => p.bounds(),
            Self::Line(l) => l.bounds(),
            _ => self.geometry_rect(),
        }
    }

    pub fn opacity(&self) -> f32 {
        match self {
            Self::Text(t) => t.opacity,
            Self::Path(p) => p.opacity,
            Self::Rectangle(s) | Self::Oval(s) => s.opacity,
            Self::Line(l) => l.opacity,
            Self::Image(i) => i.opacity,
            Self::Highlight(h) => h.opacity,
            Self::FormField(_) => 1.0,
        }
    }

    /// Hit test in document space. `slop` is the zoom-adjusted grab distance.
    pub fn hit_test(&self, pos: Pos2, slop: f32) -> bool {
        match self {
            Self::Path(p) => {
                if p.points.len() == 1 {
                    return p.points[0].distance(pos) <= p.max_width() / 2.0 + slop;
                }
                p.points.windows(2).enumerate().any(|(i, w)| {
                    let tolerance = p.width_at(i).max(p.width_at(i + 1)) / 2.0 + slop;
                    hit_testing::distance_to_segment(pos, w[0], w[1]) <= tolerance
                })
            }
            Self::Line(l) => hit_testing::distance_to_segment(pos, l.start, l.end) <= l.width / 2.0 + slop,
            Self::Oval(s) => hit_testing::point_in_ellipse(pos, self.geometry_rect().expand(s.stroke_width / 2.0 + slop)),
            Self::Rectangle(s) => hit_testing::point_in_rect(pos, self.geometry_rect().expand(s.stroke_width / 2.0 + slop)),
            Self::Text(_) | Self::Image(_) | Self::Highlight(_) | Self::FormField(_) => {
                hit_testing::point_in_rect(pos, self.geometry_rect())
            }
        }
    }

    /// Whether an eraser circle touches this object's geometry
    pub fn intersects_circle(&self, center: Pos2, radius: f32) -> bool {
        match self {
            Self::Path(p) => {
                hit_testing::circle_intersects_polyline(center, radius + p.max_width() / 2.0, &p.points)
            }
            Self::Line(l) => {
                hit_testing::circle_intersects_polyline(center, radius + l.width / 2.0, &[l.start, l.end])
            }
            Self::Oval(_) => hit_testing::circle_intersects_ellipse(center, radius, self.geometry_rect()),
            Self::Rectangle(_) | Self::Text(_) | Self::Image(_) | Self::Highlight(_) | Self::FormField(_) => {
                hit_testing::circle_intersects_rect(center, radius, self.bounds())
            }
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Self::Text(t) => t.rect = t.rect.translate(delta),
            Self::Rectangle(s) | Self::Oval(s) => s.rect = s.rect.translate(delta),
            Self::Image(i) => i.rect = i.rect.translate(delta),
            Self::Highlight(h) => h.rect = h.rect.translate(delta),
            Self::FormField(f) => f.rect = f.rect.translate(delta),
            Self::Path(p) => p.translate(delta),
            Self::Line(l) => l.translate(delta),
        }
    }

    /// Replace the geometry box, stretching point-based geometry to fit
    pub fn set_geometry_rect(&mut self, rect: Rect) {
        match self {
            Self::Text(t) => t.rect = rect,
            Self::Rectangle(s) | Self::Oval(s) => s.rect = rect,
            Self::Image(i) => i.rect = rect,
            Self::Highlight(h) => h.rect = rect,
            Self::FormField(f) => f.rect = rect,
            Self::Path(p) => p.fit_to(rect),
            Self::Line(l) => l.fit_to(rect),
        }
    }

    /// Validate a prospective resize target
    pub fn validate_resize(rect: &Rect) -> Result<(), String> {
        common::validate_rect(rect)
    }
}

/// A single annotation on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawableObject {
    pub id: ObjectId,
    /// 1-based page number
    pub page: usize,
    pub layer_id: LayerId,
    pub created_ms: i64,
    pub modified_ms: i64,
    #[serde(flatten)]
    pub kind: ObjectKind,
}

impl DrawableObject {
    pub fn new(page: usize, layer_id: LayerId, kind: ObjectKind) -> Self {
        let now = time::now_millis();
        Self {
            id: ObjectId::new(),
            page,
            layer_id,
            created_ms: now,
            modified_ms: now,
            kind,
        }
    }

    pub fn touch(&mut self) {
        self.modified_ms = time::now_millis();
    }

    pub fn bounds(&self) -> Rect {
        self.kind.bounds()
    }

    pub fn geometry_rect(&self) -> Rect {
        self.kind.geometry_rect()
    }

    pub fn hit_test(&self, pos: Pos2, slop: f32) -> bool {
        self.kind.hit_test(pos, slop)
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.kind.translate(delta);
    }

    /// Same content under a fresh id, bound to `page`/`layer_id`
    pub fn duplicate_to(&self, page: usize, layer_id: LayerId) -> Self {
        Self::new(page, layer_id, self.kind.clone())
    }

    /// Rebuild derived, non-serialized handles after deserialization or restore
    pub fn rehydrate(&mut self) {
        if let ObjectKind::Image(image) = &mut self.kind {
            image.rehydrate();
        }
    }
}

/// Factory functions for creating objects
pub mod factory {
    use super::*;
    use egui::Color32;

    pub fn text(page: usize, layer: LayerId, rect: Rect, content: &str, font_size: f32, color: Color32) -> DrawableObject {
        let mut text = TextObject::new(rect, content, font_size, color);
        text.fit_to_text();
        DrawableObject::new(page, layer, ObjectKind::Text(text))
    }

    pub fn path(page: usize, layer: LayerId, points: Vec<Pos2>, width: f32, color: Color32) -> DrawableObject {
        DrawableObject::new(page, layer, ObjectKind::Path(PathObject::new(points, color, width)))
    }

    pub fn rectangle(page: usize, layer: LayerId, rect: Rect, stroke: Color32, width: f32) -> DrawableObject {
        DrawableObject::new(page, layer, ObjectKind::Rectangle(ShapeObject::new(rect, stroke, None, width)))
    }

    pub fn oval(page: usize, layer: LayerId, rect: Rect, stroke: Color32, width: f32) -> DrawableObject {
        DrawableObject::new(page, layer, ObjectKind::Oval(ShapeObject::new(rect, stroke, None, width)))
    }

    pub fn line(page: usize, layer: LayerId, start: Pos2, end: Pos2, width: f32, color: Color32) -> DrawableObject {
        DrawableObject::new(page, layer, ObjectKind::Line(LineObject::new(start, end, color, width)))
    }

    pub fn highlight(page: usize, layer: LayerId, rect: Rect, color: Color32, opacity: f32) -> DrawableObject {
        DrawableObject::new(page, layer, ObjectKind::Highlight(HighlightObject::new(rect, color, opacity)))
    }

    pub fn form_field(page: usize, layer: LayerId, rect: Rect, kind: FormFieldKind, name: &str) -> DrawableObject {
        DrawableObject::new(page, layer, ObjectKind::FormField(FormFieldObject::new(rect, kind, name)))
    }
}

use egui::{Color32, Rect};
use serde::{Deserialize, Serialize};

/// Geometry kinds produced by the shapes tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Oval,
    Line,
}

/// Payload shared by rectangles and ovals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeObject {
    pub rect: Rect,
    pub stroke: Color32,
    pub fill: Option<Color32>,
    pub stroke_width: f32,
    pub opacity: f32,
}

impl ShapeObject {
    pub fn new(rect: Rect, stroke: Color32, fill: Option<Color32>, stroke_width: f32) -> Self {
        Self {
            rect,
            stroke,
            fill,
            stroke_width,
            opacity: 1.0,
        }
    }
}

/// Translucent marker box over page content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightObject {
    pub rect: Rect,
    pub color: Color32,
    pub opacity: f32,
}

impl HighlightObject {
    pub fn new(rect: Rect, color: Color32, opacity: f32) -> Self {
        Self { rect, color, opacity }
    }
}

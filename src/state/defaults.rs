use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::element::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, FormFieldKind, ShapeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraserMode {
    /// Cut the parts of freehand paths under the eraser
    #[default]
    Stroke,
    /// Delete any object the eraser touches
    Object,
}

/// Per-tool settings the chrome edits and the tools read when creating objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDefaults {
    pub stroke_color: Color32,
    pub stroke_width: f32,
    pub fill_color: Option<Color32>,
    pub opacity: f32,
    pub font_family: String,
    pub font_size: f32,
    pub text_color: Color32,
    pub highlight_color: Color32,
    pub highlight_opacity: f32,
    pub shape: ShapeKind,
    pub eraser_mode: EraserMode,
    /// Eraser radius in view pixels
    pub eraser_radius: f32,
    pub form_field_kind: FormFieldKind,
    /// Scale freehand width by stylus pressure
    pub pressure_sensitive: bool,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            stroke_color: Color32::BLACK,
            stroke_width: 2.0,
            fill_color: None,
            opacity: 1.0,
            font_family: DEFAULT_FONT_FAMILY.to_owned(),
            font_size: DEFAULT_FONT_SIZE,
            text_color: Color32::BLACK,
            highlight_color: Color32::from_rgb(255, 235, 59),
            highlight_opacity: 0.35,
            shape: ShapeKind::Rectangle,
            eraser_mode: EraserMode::Stroke,
            eraser_radius: 10.0,
            form_field_kind: FormFieldKind::Text,
            pressure_sensitive: true,
        }
    }
}

use egui::{Color32, Rect};

use crate::geometry::hit_testing;

// Common constants for all object types
pub const MIN_OBJECT_SIZE: f32 = 2.0;
pub const DEFAULT_FONT_SIZE: f32 = 14.0;
pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";

/// Average glyph advance relative to font size, used to size text boxes without a font engine
pub const GLYPH_ADVANCE: f32 = 0.55;
pub const LINE_HEIGHT: f32 = 1.2;

/// Multiply a color's alpha by an opacity in 0..=1
pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    color.gamma_multiply(opacity.clamp(0.0, 1.0))
}

/// Rectangle payloads are stored as given while sizing; this returns the usable form
pub(crate) fn normalized(rect: Rect) -> Rect {
    hit_testing::normalize(rect)
}

/// Validates that a rectangle has minimum dimensions
pub(crate) fn validate_rect(rect: &Rect) -> Result<(), String> {
    let rect = normalized(*rect);
    if rect.width() < MIN_OBJECT_SIZE || rect.height() < MIN_OBJECT_SIZE {
        Err(format!(
            "Object dimensions too small (min: {}). Width: {}, Height: {}",
            MIN_OBJECT_SIZE,
            rect.width(),
            rect.height()
        ))
    } else {
        Ok(())
    }
}

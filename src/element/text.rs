use egui::{Color32, Rect, vec2};
use serde::{Deserialize, Serialize};

use super::common::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, GLYPH_ADVANCE, LINE_HEIGHT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// A free text box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextObject {
    pub rect: Rect,
    pub text: String,
    pub font_family: String,
    pub font_size: f32,
    pub color: Color32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub align: TextAlign,
    pub opacity: f32,
}

impl TextObject {
    pub fn new(rect: Rect, text: impl Into<String>, font_size: f32, color: Color32) -> Self {
        Self {
            rect,
            text: text.into(),
            font_family: DEFAULT_FONT_FAMILY.to_owned(),
            font_size: if font_size > 0.0 { font_size } else { DEFAULT_FONT_SIZE },
            color,
            bold: false,
            italic: false,
            align: TextAlign::Left,
            opacity: 1.0,
        }
    }

    /// Estimated extent of the text, without a font engine
    pub fn estimated_size(&self) -> egui::Vec2 {
        let lines = self.text.split('\n').collect::<Vec<_>>();
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
        vec2(
            longest as f32 * self.font_size * GLYPH_ADVANCE,
            lines.len().max(1) as f32 * self.font_size * LINE_HEIGHT,
        )
    }

    /// Grow the box so the text fits; never shrinks a box the user sized
    pub fn fit_to_text(&mut self) {
        let size = self.estimated_size();
        let rect = Rect::from_two_pos(self.rect.min, self.rect.max);
        self.rect = Rect::from_min_size(
            rect.min,
            vec2(rect.width().max(size.x), rect.height().max(size.y)),
        );
    }

    /// Top of the insertion point after the last character, and the line height
    pub fn caret(&self) -> (egui::Pos2, f32) {
        let line_height = self.font_size * LINE_HEIGHT;
        let lines: Vec<&str> = self.text.split('\n').collect();
        let last = lines.last().map(|l| l.chars().count()).unwrap_or(0);
        let origin = Rect::from_two_pos(self.rect.min, self.rect.max).min;
        let top = origin + vec2(
            last as f32 * self.font_size * GLYPH_ADVANCE,
            (lines.len().max(1) - 1) as f32 * line_height,
        );
        (top, line_height)
    }
}

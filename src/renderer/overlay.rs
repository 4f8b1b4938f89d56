use egui::{Pos2, Rect};

/// Transient previews drawn above every layer.
///
/// Geometry is in document space; sizes that must stay constant on screen (handles,
/// dashes) are resolved by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayItem {
    /// Bounding box of the current selection
    SelectionBox(Rect),
    /// The eight resize handles of a single selected object
    Handles(Rect),
    /// Rubber-band selection in progress
    Marquee(Rect),
    /// Outline of an object being placed (form fields, images)
    PlacementPreview(Rect),
    /// Footprint of the eraser at the pointer
    EraserCursor { center: Pos2, radius: f32 },
    /// Insertion point of the text being edited
    TextCaret { top: Pos2, height: f32 },
}

impl OverlayItem {
    /// Document-space extent, used to decide which page region needs repainting
    pub fn bounds(&self) -> Rect {
        match self {
            Self::SelectionBox(rect) | Self::Handles(rect) | Self::Marquee(rect) | Self::PlacementPreview(rect) => *rect,
            Self::EraserCursor { center, radius } => Rect::from_center_size(*center, egui::Vec2::splat(radius * 2.0)),
            Self::TextCaret { top, height } => Rect::from_min_size(*top, egui::vec2(0.0, *height)),
        }
    }
}

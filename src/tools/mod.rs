use egui::{Key, Modifiers, PointerButton, Pos2};

use crate::config::EditorConfig;
use crate::element::ObjectId;
use crate::geometry::PageView;
use crate::renderer::OverlayItem;
use crate::state::SceneState;

mod dispatch;
mod eraser_tool;
mod form_field_tool;
mod freehand_tool;
mod image_tool;
mod pan_tool;
mod select_tool;
mod shape_tool;
mod smoothing;
mod text_tool;

pub use dispatch::{DispatchOutcome, PointerInput, ToolDispatcher};
pub use eraser_tool::EraserTool;
pub use form_field_tool::FormFieldTool;
pub use freehand_tool::FreehandTool;
pub use image_tool::ImageTool;
pub use pan_tool::PanTool;
pub use select_tool::SelectTool;
pub use shape_tool::ShapeTool;
pub use text_tool::TextTool;

/// Names of the interchangeable editing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    Select,
    Draw,
    Shapes,
    Highlight,
    Eraser,
    Form,
    Image,
    Signature,
    Text,
    Pan,
}

impl ToolKind {
    pub const ALL: [ToolKind; 10] = [
        Self::Select,
        Self::Draw,
        Self::Shapes,
        Self::Highlight,
        Self::Eraser,
        Self::Form,
        Self::Image,
        Self::Signature,
        Self::Text,
        Self::Pan,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Select => "Select",
            Self::Draw => "Draw",
            Self::Shapes => "Shapes",
            Self::Highlight => "Highlight",
            Self::Eraser => "Eraser",
            Self::Form => "Form field",
            Self::Image => "Image",
            Self::Signature => "Signature",
            Self::Text => "Text",
            Self::Pan => "Pan",
        }
    }

    /// Tools whose pointer sessions end in exactly one checkpoint when they mutated the scene
    pub fn checkpoints_on_release(self) -> bool {
        !matches!(self, Self::Text | Self::Pan)
    }
}

/// A pointer event as a tool sees it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolEvent {
    /// Canvas position in view pixels
    pub view_pos: Pos2,
    /// The same position in the current page's document space
    pub doc_pos: Pos2,
    pub modifiers: Modifiers,
    /// Stylus pressure in 0..=1; 1.0 for devices without pressure
    pub pressure: f32,
    pub time_ms: f64,
    pub button: PointerButton,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

/// Something a tool asks the dispatcher to do once the current call returns
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    /// Record a history checkpoint
    Checkpoint(String),
    /// Switch to another tool, optionally opening an object for editing
    Switch { tool: ToolKind, edit: Option<ObjectId> },
}

/// Everything a tool may read or mutate during one callback
pub struct ToolContext<'a> {
    pub scene: &'a mut SceneState,
    /// Transform of the current page
    pub view: PageView,
    pub config: &'a EditorConfig,
    requests: Vec<ToolRequest>,
}

impl<'a> ToolContext<'a> {
    pub fn new(scene: &'a mut SceneState, view: PageView, config: &'a EditorConfig) -> Self {
        Self {
            scene,
            view,
            config,
            requests: Vec::new(),
        }
    }

    pub fn page(&self) -> usize {
        self.scene.current_page()
    }

    /// Hit-test grab distance in document units at the current zoom
    pub fn hit_slop(&self) -> f32 {
        self.view.len_to_doc(self.config.hit_slop_px)
    }

    pub fn handle_radius(&self) -> f32 {
        self.view.len_to_doc(self.config.handle_radius_px)
    }

    pub fn request(&mut self, request: ToolRequest) {
        self.requests.push(request);
    }

    pub fn take_requests(&mut self) -> Vec<ToolRequest> {
        std::mem::take(&mut self.requests)
    }
}

/// Tool trait defines the interface for all editing modes
pub trait Tool {
    fn kind(&self) -> ToolKind;

    /// Called when the tool becomes the active one
    fn activate(&mut self, _ctx: &mut ToolContext<'_>) {}

    /// Called when another tool takes over. Cancels any gesture in progress and
    /// discards objects that were not committed.
    fn deactivate(&mut self, ctx: &mut ToolContext<'_>);

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent);

    fn on_pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent);

    fn on_pointer_up(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent);

    fn on_double_click(&mut self, _ctx: &mut ToolContext<'_>, _event: &ToolEvent) {}

    /// Returns true when the key was consumed
    fn on_key_down(&mut self, _ctx: &mut ToolContext<'_>, _key: &KeyEvent) -> bool {
        false
    }

    fn on_key_up(&mut self, _ctx: &mut ToolContext<'_>, _key: &KeyEvent) -> bool {
        false
    }

    /// Typed text; returns true when consumed
    fn on_text(&mut self, _ctx: &mut ToolContext<'_>, _text: &str) -> bool {
        false
    }

    /// Previews drawn in the overlay pass, in document space
    fn overlay(&self, _scene: &SceneState) -> Vec<OverlayItem> {
        Vec::new()
    }

    /// Whether the tool is in the middle of a gesture or edit
    fn is_busy(&self) -> bool {
        false
    }
}

/// Enum representing all available tools.
/// This allows us to avoid using Box<dyn Tool> and keeps the registry inspectable.
#[derive(Debug)]
pub enum ToolType {
    Select(SelectTool),
    Draw(FreehandTool),
    Shapes(ShapeTool),
    Eraser(EraserTool),
    Form(FormFieldTool),
    Image(ImageTool),
    Text(TextTool),
    Pan(PanTool),
}

macro_rules! each_tool {
    ($value:expr, $tool:ident => $body:expr) => {
        match $value {
            ToolType::Select($tool) => $body,
            ToolType::Draw($tool) => $body,
            ToolType::Shapes($tool) => $body,
            ToolType::Eraser($tool) => $body,
            ToolType::Form($tool) => $body,
            ToolType::Image($tool) => $body,
            ToolType::Text($tool) => $body,
            ToolType::Pan($tool) => $body,
        }
    };
}

impl Tool for ToolType {
    fn kind(&self) -> ToolKind {
        each_tool!(self, tool => tool.kind())
    }

    fn activate(&mut self, ctx: &mut ToolContext<'_>) {
        each_tool!(self, tool => tool.activate(ctx))
    }

    fn deactivate(&mut self, ctx: &mut ToolContext<'_>) {
        each_tool!(self, tool => tool.deactivate(ctx))
    }

    fn on_pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        each_tool!(self, tool => tool.on_pointer_down(ctx, event))
    }

    fn on_pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        each_tool!(self, tool => tool.on_pointer_move(ctx, event))
    }

    fn on_pointer_up(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        each_tool!(self, tool => tool.on_pointer_up(ctx, event))
    }

    fn on_double_click(&mut self, ctx: &mut ToolContext<'_>, event: &ToolEvent) {
        each_tool!(self, tool => tool.on_double_click(ctx, event))
    }

    fn on_key_down(&mut self, ctx: &mut ToolContext<'_>, key: &KeyEvent) -> bool {
        each_tool!(self, tool => tool.on_key_down(ctx, key))
    }

    fn on_key_up(&mut self, ctx: &mut ToolContext<'_>, key: &KeyEvent) -> bool {
        each_tool!(self, tool => tool.on_key_up(ctx, key))
    }

    fn on_text(&mut self, ctx: &mut ToolContext<'_>, text: &str) -> bool {
        each_tool!(self, tool => tool.on_text(ctx, text))
    }

    fn overlay(&self, scene: &SceneState) -> Vec<OverlayItem> {
        each_tool!(self, tool => tool.overlay(scene))
    }

    fn is_busy(&self) -> bool {
        each_tool!(self, tool => tool.is_busy())
    }
}

/// Factory function to create a tool by kind
pub fn new_tool(kind: ToolKind) -> ToolType {
    match kind {
        ToolKind::Select => ToolType::Select(SelectTool::new()),
        ToolKind::Draw => ToolType::Draw(FreehandTool::new()),
        ToolKind::Shapes => ToolType::Shapes(ShapeTool::shapes()),
        ToolKind::Highlight => ToolType::Shapes(ShapeTool::highlight()),
        ToolKind::Eraser => ToolType::Eraser(EraserTool::new()),
        ToolKind::Form => ToolType::Form(FormFieldTool::new()),
        ToolKind::Image => ToolType::Image(ImageTool::new(false)),
        ToolKind::Signature => ToolType::Image(ImageTool::new(true)),
        ToolKind::Text => ToolType::Text(TextTool::new()),
        ToolKind::Pan => ToolType::Pan(PanTool::new()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use egui::{Modifiers, PointerButton, Pos2};

    use super::ToolEvent;

    /// A primary-button event at the same position in view and document space (zoom 1)
    pub(crate) fn event_at(pos: Pos2, time_ms: f64) -> ToolEvent {
        ToolEvent {
            view_pos: pos,
            doc_pos: pos,
            modifiers: Modifiers::NONE,
            pressure: 1.0,
            time_ms,
            button: PointerButton::Primary,
        }
    }

    pub(crate) fn with_modifiers(mut event: ToolEvent, modifiers: Modifiers) -> ToolEvent {
        event.modifiers = modifiers;
        event
    }
}

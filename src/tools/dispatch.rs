use std::collections::BTreeMap;

use egui::{Key, Modifiers, PointerButton, Pos2, Vec2};
use log::{debug, info, warn};

use crate::config::EditorConfig;
use crate::element::{ObjectId, PendingImage};
use crate::event::EditorEvent;
use crate::geometry::{PageView, Rotation};
use crate::renderer::OverlayItem;
use crate::state::SceneState;
use crate::tools::{KeyEvent, Tool, ToolContext, ToolEvent, ToolKind, ToolRequest, ToolType, new_tool};

/// A pointer sample in canvas-local view pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub pos: Pos2,
    pub modifiers: Modifiers,
    /// Stylus pressure when the device reports one
    pub pressure: Option<f32>,
    pub time_ms: f64,
    pub button: PointerButton,
}

impl PointerInput {
    pub fn primary(pos: Pos2, time_ms: f64) -> Self {
        Self {
            pos,
            modifiers: Modifiers::NONE,
            pressure: None,
            time_ms,
            button: PointerButton::Primary,
        }
    }
}

/// What the caller must do after an event was routed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// History checkpoints to record, in order
    pub checkpoints: Vec<String>,
    /// Whether the active tool consumed a key or text event
    pub consumed: bool,
}

impl DispatchOutcome {
    fn merge(&mut self, other: DispatchOutcome) {
        self.checkpoints.extend(other.checkpoints);
        self.consumed |= other.consumed;
    }
}

#[derive(Debug, Clone, Copy)]
struct PointerSession {
    tool: ToolKind,
    start_revision: u64,
    /// Revision and time of the last intermediate checkpoint
    checkpoint_revision: u64,
    last_checkpoint_ms: f64,
    last_pos: Pos2,
}

/// Label recorded when a pointer session of `kind` changed the document
fn session_label(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Select => "Transform",
        ToolKind::Draw => "Draw",
        ToolKind::Shapes => "Shape",
        ToolKind::Highlight => "Highlight",
        ToolKind::Eraser => "Erase",
        ToolKind::Form => "Add form field",
        ToolKind::Image => "Place image",
        ToolKind::Signature => "Place signature",
        ToolKind::Text => "Edit text",
        ToolKind::Pan => "Pan",
    }
}

fn key_label(key: Key, kind: ToolKind) -> &'static str {
    match key {
        Key::Delete | Key::Backspace => "Delete",
        Key::ArrowLeft | Key::ArrowRight | Key::ArrowUp | Key::ArrowDown => "Nudge",
        _ => session_label(kind),
    }
}

/// Routes input to exactly one active tool and groups what it does into checkpoints.
///
/// The dispatcher never touches history itself: every outcome lists the checkpoints
/// the owner should record.
#[derive(Debug)]
pub struct ToolDispatcher {
    tools: BTreeMap<ToolKind, ToolType>,
    active: ToolKind,
    session: Option<PointerSession>,
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolDispatcher {
    pub fn new() -> Self {
        let tools = ToolKind::ALL.into_iter().map(|kind| (kind, new_tool(kind))).collect();
        Self {
            tools,
            active: ToolKind::Select,
            session: None,
        }
    }

    pub fn active_kind(&self) -> ToolKind {
        self.active
    }

    pub fn active_tool(&self) -> Option<&ToolType> {
        self.tools.get(&self.active)
    }

    pub fn in_pointer_session(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the active tool has a gesture or edit open
    pub fn is_tool_busy(&self) -> bool {
        self.active_tool().is_some_and(|tool| tool.is_busy())
    }

    /// Previews of the active tool, in document space
    pub fn overlay(&self, scene: &SceneState) -> Vec<OverlayItem> {
        self.active_tool().map(|tool| tool.overlay(scene)).unwrap_or_default()
    }

    /// Fallback transform for callbacks that do not need a real page
    fn view_for(scene: &SceneState) -> PageView {
        scene
            .current_page_view()
            .unwrap_or_else(|| PageView::new(scene.view(), Vec2::ZERO, Rotation::Deg0))
    }

    /// Run `f` against the tool of `kind`, returning its result and requests
    fn call<R>(
        &mut self,
        kind: ToolKind,
        scene: &mut SceneState,
        config: &EditorConfig,
        view: PageView,
        f: impl FnOnce(&mut ToolType, &mut ToolContext<'_>) -> R,
    ) -> (R, Vec<ToolRequest>) {
        let tool = self.tools.entry(kind).or_insert_with(|| new_tool(kind));
        let mut ctx = ToolContext::new(scene, view, config);
        let result = f(tool, &mut ctx);
        (result, ctx.take_requests())
    }

    fn tool_event(view: &PageView, input: &PointerInput) -> ToolEvent {
        ToolEvent {
            view_pos: input.pos,
            doc_pos: view.to_doc(input.pos),
            modifiers: input.modifiers,
            pressure: input.pressure.unwrap_or(1.0).clamp(0.0, 1.0),
            time_ms: input.time_ms,
            button: input.button,
        }
    }

    fn apply_requests(
        &mut self,
        scene: &mut SceneState,
        config: &EditorConfig,
        requests: Vec<ToolRequest>,
        outcome: &mut DispatchOutcome,
    ) {
        for request in requests {
            match request {
                ToolRequest::Checkpoint(label) => outcome.checkpoints.push(label),
                ToolRequest::Switch { tool, edit } => {
                    let switched = self.set_active(scene, config, tool);
                    outcome.merge(switched);
                    if let Some(id) = edit {
                        let nested = self.begin_editing(scene, config, id);
                        outcome.merge(nested);
                    }
                }
            }
        }
    }

    /// Open an object in the text tool, which must be active
    fn begin_editing(&mut self, scene: &mut SceneState, config: &EditorConfig, id: ObjectId) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        if self.active != ToolKind::Text {
            return outcome;
        }
        let view = Self::view_for(scene);
        let (opened, requests) = self.call(ToolKind::Text, scene, config, view, |tool, ctx| match tool {
            ToolType::Text(text) => text.begin_editing(ctx, id),
            _ => false,
        });
        if !opened {
            warn!("Object {} cannot be edited as text", id);
        }
        self.apply_requests(scene, config, requests, &mut outcome);
        outcome
    }

    /// Make `kind` the active tool.
    ///
    /// The outgoing tool is deactivated first, which cancels its gesture and drops
    /// anything it had not committed. If that left the document changed, one
    /// checkpoint is issued for it.
    pub fn set_active(&mut self, scene: &mut SceneState, config: &EditorConfig, kind: ToolKind) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let old = self.active;
        if old == kind {
            return outcome;
        }

        let before = self.session.take().map(|s| s.start_revision).unwrap_or(scene.revision());
        let view = Self::view_for(scene);
        let ((), requests) = self.call(old, scene, config, view, |tool, ctx| tool.deactivate(ctx));
        if scene.revision() != before && old.checkpoints_on_release() {
            outcome.checkpoints.push(session_label(old).to_owned());
        }

        self.active = kind;
        let ((), activate_requests) = self.call(kind, scene, config, view, |tool, ctx| tool.activate(ctx));
        info!("Tool changed: {} -> {}", old.label(), kind.label());
        scene.push_event(EditorEvent::ToolChanged { old, new: kind });

        self.apply_requests(scene, config, requests, &mut outcome);
        self.apply_requests(scene, config, activate_requests, &mut outcome);
        outcome
    }

    /// End whatever the active tool has in progress, keeping it active.
    ///
    /// Used before edits that renumber pages under the tool's feet.
    pub fn settle(&mut self, scene: &mut SceneState, config: &EditorConfig) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let kind = self.active;
        let busy = self.session.is_some() || self.is_tool_busy();
        if !busy {
            return outcome;
        }

        let before = self.session.take().map(|s| s.start_revision).unwrap_or(scene.revision());
        let view = Self::view_for(scene);
        let ((), requests) = self.call(kind, scene, config, view, |tool, ctx| tool.deactivate(ctx));
        if scene.revision() != before && kind.checkpoints_on_release() {
            outcome.checkpoints.push(session_label(kind).to_owned());
        }
        let ((), activate_requests) = self.call(kind, scene, config, view, |tool, ctx| tool.activate(ctx));
        debug!("Settled {} tool", kind.label());

        self.apply_requests(scene, config, requests, &mut outcome);
        self.apply_requests(scene, config, activate_requests, &mut outcome);
        outcome
    }

    /// Hand a decoded image to the image or signature tool and activate it
    pub fn set_pending_image(&mut self, scene: &mut SceneState, config: &EditorConfig, image: PendingImage) -> DispatchOutcome {
        let kind = if image.signature { ToolKind::Signature } else { ToolKind::Image };
        if let ToolType::Image(tool) = self.tools.entry(kind).or_insert_with(|| new_tool(kind)) {
            tool.set_pending(image);
        }
        self.set_active(scene, config, kind)
    }

    pub fn pointer_down(&mut self, scene: &mut SceneState, config: &EditorConfig, input: PointerInput) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        // A missed release still closes the previous session
        if let Some(session) = self.session {
            let up = PointerInput {
                pos: session.last_pos,
                ..input
            };
            outcome.merge(self.pointer_up(scene, config, up));
        }

        let Some(view) = scene.current_page_view() else {
            debug!("Pointer down without a page");
            return outcome;
        };
        let kind = self.active;
        let event = Self::tool_event(&view, &input);
        self.session = Some(PointerSession {
            tool: kind,
            start_revision: scene.revision(),
            checkpoint_revision: scene.revision(),
            last_checkpoint_ms: input.time_ms,
            last_pos: input.pos,
        });
        let ((), requests) = self.call(kind, scene, config, view, |tool, ctx| tool.on_pointer_down(ctx, &event));
        self.apply_requests(scene, config, requests, &mut outcome);
        outcome
    }

    pub fn pointer_move(&mut self, scene: &mut SceneState, config: &EditorConfig, input: PointerInput) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let Some(view) = scene.current_page_view() else {
            return outcome;
        };
        let kind = self.active;
        let event = Self::tool_event(&view, &input);
        let ((), requests) = self.call(kind, scene, config, view, |tool, ctx| tool.on_pointer_move(ctx, &event));

        if let Some(session) = &mut self.session {
            session.last_pos = input.pos;
            // Long freehand gestures are split into several undo steps
            let due = input.time_ms - session.last_checkpoint_ms >= config.freehand_checkpoint_ms;
            if session.tool == ToolKind::Draw && due && scene.revision() != session.checkpoint_revision {
                debug!("Intermediate checkpoint during freehand stroke");
                outcome.checkpoints.push(session_label(ToolKind::Draw).to_owned());
                session.last_checkpoint_ms = input.time_ms;
                session.checkpoint_revision = scene.revision();
            }
        }
        self.apply_requests(scene, config, requests, &mut outcome);
        outcome
    }

    pub fn pointer_up(&mut self, scene: &mut SceneState, config: &EditorConfig, input: PointerInput) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let session = self.session.take();
        let view = Self::view_for(scene);
        let kind = self.active;
        let event = Self::tool_event(&view, &input);
        let ((), requests) = self.call(kind, scene, config, view, |tool, ctx| tool.on_pointer_up(ctx, &event));

        if let Some(session) = session {
            if session.tool == kind && kind.checkpoints_on_release() && scene.revision() != session.start_revision {
                outcome.checkpoints.push(session_label(kind).to_owned());
            }
        }
        self.apply_requests(scene, config, requests, &mut outcome);
        outcome
    }

    /// The pointer left the canvas; ends any session at the last known position
    pub fn pointer_leave(&mut self, scene: &mut SceneState, config: &EditorConfig, last_pos: Pos2, time_ms: f64) -> DispatchOutcome {
        if self.session.is_none() {
            return DispatchOutcome::default();
        }
        debug!("Pointer left the canvas mid-gesture");
        self.pointer_up(scene, config, PointerInput::primary(last_pos, time_ms))
    }

    pub fn double_click(&mut self, scene: &mut SceneState, config: &EditorConfig, pos: Pos2, modifiers: Modifiers) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let Some(view) = scene.current_page_view() else {
            return outcome;
        };
        let input = PointerInput {
            modifiers,
            ..PointerInput::primary(pos, 0.0)
        };
        let event = Self::tool_event(&view, &input);
        let kind = self.active;
        let ((), requests) = self.call(kind, scene, config, view, |tool, ctx| tool.on_double_click(ctx, &event));
        self.apply_requests(scene, config, requests, &mut outcome);
        outcome
    }

    pub fn key_down(&mut self, scene: &mut SceneState, config: &EditorConfig, key: &KeyEvent) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let kind = self.active;
        let before = scene.revision();
        let view = Self::view_for(scene);
        let (consumed, requests) = self.call(kind, scene, config, view, |tool, ctx| tool.on_key_down(ctx, key));
        outcome.consumed = consumed;
        // Keys inside a pointer session are folded into its checkpoint
        if consumed && self.session.is_none() && kind.checkpoints_on_release() && scene.revision() != before {
            outcome.checkpoints.push(key_label(key.key, kind).to_owned());
        }
        self.apply_requests(scene, config, requests, &mut outcome);
        outcome
    }

    pub fn key_up(&mut self, scene: &mut SceneState, config: &EditorConfig, key: &KeyEvent) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let kind = self.active;
        let view = Self::view_for(scene);
        let (consumed, requests) = self.call(kind, scene, config, view, |tool, ctx| tool.on_key_up(ctx, key));
        outcome.consumed = consumed;
        self.apply_requests(scene, config, requests, &mut outcome);
        outcome
    }

    pub fn text(&mut self, scene: &mut SceneState, config: &EditorConfig, text: &str) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let kind = self.active;
        let view = Self::view_for(scene);
        let (consumed, requests) = self.call(kind, scene, config, view, |tool, ctx| tool.on_text(ctx, text));
        outcome.consumed = consumed;
        self.apply_requests(scene, config, requests, &mut outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ObjectKind, factory};
    use crate::history::HistoryEngine;
    use crate::state::test_support::{rect_at, scene_with_pages};
    use egui::{Color32, pos2};

    fn drag(
        dispatcher: &mut ToolDispatcher,
        scene: &mut SceneState,
        config: &EditorConfig,
        from: Pos2,
        to: Pos2,
    ) -> Vec<String> {
        let mut checkpoints = Vec::new();
        checkpoints.extend(dispatcher.pointer_down(scene, config, PointerInput::primary(from, 0.0)).checkpoints);
        for i in 1..=10 {
            let t = i as f32 / 10.0;
            let pos = from + (to - from) * t;
            checkpoints.extend(dispatcher.pointer_move(scene, config, PointerInput::primary(pos, i as f64 * 16.0)).checkpoints);
        }
        checkpoints.extend(dispatcher.pointer_up(scene, config, PointerInput::primary(to, 200.0)).checkpoints);
        checkpoints
    }

    #[test]
    fn test_one_checkpoint_per_mutating_session() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.set_active(&mut scene, &config, ToolKind::Shapes);

        let mut history = HistoryEngine::new(config.history_capacity);
        history.reset(&mut scene, "Load");

        let checkpoints = drag(&mut dispatcher, &mut scene, &config, pos2(10.0, 10.0), pos2(110.0, 60.0));
        assert_eq!(checkpoints, vec!["Shape".to_owned()]);
        for label in &checkpoints {
            history.checkpoint(&mut scene, label);
        }
        assert_eq!(scene.objects().len(), 1);
        assert_eq!(history.len(), 2);

        // A click-sized drag leaves the document as it was: the checkpoint is a no-op
        let checkpoints = drag(&mut dispatcher, &mut scene, &config, pos2(200.0, 200.0), pos2(202.0, 201.0));
        for label in &checkpoints {
            assert!(!history.checkpoint(&mut scene, label));
        }
        assert_eq!(scene.objects().len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_pan_and_empty_select_record_nothing() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let mut dispatcher = ToolDispatcher::new();
        assert!(drag(&mut dispatcher, &mut scene, &config, pos2(10.0, 10.0), pos2(50.0, 50.0)).is_empty());
        dispatcher.set_active(&mut scene, &config, ToolKind::Pan);
        assert!(drag(&mut dispatcher, &mut scene, &config, pos2(10.0, 10.0), pos2(50.0, 50.0)).is_empty());
        assert!((scene.view().pan - Vec2::new(40.0, 40.0)).length() < 1e-3);
    }

    #[test]
    fn test_long_freehand_gesture_checkpoints_periodically() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.set_active(&mut scene, &config, ToolKind::Draw);

        let mut checkpoints = dispatcher.pointer_down(&mut scene, &config, PointerInput::primary(pos2(0.0, 0.0), 0.0)).checkpoints;
        for i in 1..=60 {
            let input = PointerInput::primary(pos2(i as f32 * 3.0, (i % 7) as f32), i as f64 * 20.0);
            checkpoints.extend(dispatcher.pointer_move(&mut scene, &config, input).checkpoints);
        }
        checkpoints.extend(dispatcher.pointer_up(&mut scene, &config, PointerInput::primary(pos2(180.0, 4.0), 1210.0)).checkpoints);

        // 1200 ms of drawing: intermediate checkpoints at 400, 800 and 1200 ms plus the release
        assert_eq!(checkpoints.len(), 4);
        assert!(checkpoints.iter().all(|label| label == "Draw"));
    }

    #[test]
    fn test_switching_mid_gesture_discards_uncommitted_object() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.set_active(&mut scene, &config, ToolKind::Shapes);
        scene.take_events();

        dispatcher.pointer_down(&mut scene, &config, PointerInput::primary(pos2(10.0, 10.0), 0.0));
        dispatcher.pointer_move(&mut scene, &config, PointerInput::primary(pos2(90.0, 90.0), 10.0));
        assert_eq!(scene.objects().len(), 1);
        let outcome = dispatcher.set_active(&mut scene, &config, ToolKind::Select);

        assert!(scene.objects().is_empty());
        assert!(!dispatcher.in_pointer_session());
        assert_eq!(outcome.checkpoints, vec!["Shape".to_owned()]);
        assert!(scene.take_events().contains(&EditorEvent::ToolChanged {
            old: ToolKind::Shapes,
            new: ToolKind::Select
        }));
    }

    #[test]
    fn test_pointer_leave_ends_session() {
        let mut scene = scene_with_pages(1);
        let config = EditorConfig::default();
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.set_active(&mut scene, &config, ToolKind::Highlight);
        dispatcher.pointer_down(&mut scene, &config, PointerInput::primary(pos2(10.0, 10.0), 0.0));
        dispatcher.pointer_move(&mut scene, &config, PointerInput::primary(pos2(60.0, 30.0), 10.0));
        let outcome = dispatcher.pointer_leave(&mut scene, &config, pos2(60.0, 30.0), 20.0);
        assert_eq!(outcome.checkpoints, vec!["Highlight".to_owned()]);
        assert!(!dispatcher.in_pointer_session());
    }

    #[test]
    fn test_double_click_switches_to_text_editing() {
        let mut scene = scene_with_pages(1);
        let text = factory::text(1, scene.active_layer_id(), rect_at(10.0, 10.0, 80.0, 20.0), "Memo", 12.0, Color32::BLACK);
        let id = scene.add_object(text).unwrap();
        let config = EditorConfig::default();
        let mut dispatcher = ToolDispatcher::new();

        dispatcher.double_click(&mut scene, &config, pos2(20.0, 15.0), Modifiers::NONE);
        assert_eq!(dispatcher.active_kind(), ToolKind::Text);
        let outcome = dispatcher.text(&mut scene, &config, "!");
        assert!(outcome.consumed);
        let ObjectKind::Text(t) = &scene.object(id).unwrap().kind else {
            panic!("expected text");
        };
        assert_eq!(t.text, "Memo!");

        let escape = KeyEvent {
            key: Key::Escape,
            modifiers: Modifiers::NONE,
        };
        let outcome = dispatcher.key_down(&mut scene, &config, &escape);
        assert_eq!(outcome.checkpoints, vec!["Edit text".to_owned()]);
    }

    #[test]
    fn test_consumed_keys_checkpoint_when_content_changed() {
        let mut scene = scene_with_pages(1);
        let object = factory::rectangle(1, scene.active_layer_id(), rect_at(10.0, 10.0, 20.0, 20.0), Color32::RED, 1.0);
        let id = scene.add_object(object).unwrap();
        scene.select(&[id]);
        let config = EditorConfig::default();
        let mut dispatcher = ToolDispatcher::new();

        let right = KeyEvent {
            key: Key::ArrowRight,
            modifiers: Modifiers::NONE,
        };
        assert_eq!(dispatcher.key_down(&mut scene, &config, &right).checkpoints, vec!["Nudge".to_owned()]);
        let other = KeyEvent {
            key: Key::Q,
            modifiers: Modifiers::NONE,
        };
        let outcome = dispatcher.key_down(&mut scene, &config, &other);
        assert!(!outcome.consumed);
        assert!(outcome.checkpoints.is_empty());
    }
}

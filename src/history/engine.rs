use std::cell::Cell;
use std::rc::Rc;

use crate::event::EditorEvent;
use crate::history::HistorySnapshot;
use crate::state::{PageChange, SceneState};

/// Clears the shared restoring flag when a restore finishes, however it exits
struct RestoreGuard(Rc<Cell<bool>>);

impl RestoreGuard {
    fn hold(flag: &Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self(Rc::clone(flag))
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Linear checkpoint history over the scene's undoable content.
///
/// Recording a checkpoint after an undo discards the redo branch. Consecutive
/// checkpoints with identical content collapse into one.
#[derive(Debug)]
pub struct HistoryEngine {
    snapshots: Vec<HistorySnapshot>,
    /// Position of the snapshot matching the scene; meaningless while empty
    index: usize,
    capacity: usize,
    /// Fingerprint of the content the scene held at the last checkpoint or restore
    last_fingerprint: Option<Vec<u8>>,
    restoring: Rc<Cell<bool>>,
}

impl HistoryEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            index: 0,
            capacity: capacity.max(1),
            last_fingerprint: None,
            restoring: Rc::new(Cell::new(false)),
        }
    }

    /// Flag set for the duration of a restore. Scene observers check it to avoid
    /// requesting checkpoints for changes the restore itself makes.
    pub fn restoring_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.restoring)
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring.get()
    }

    /// Record the scene's current content under `label`.
    ///
    /// Returns false when nothing was recorded: the content equals the last recorded
    /// snapshot, or a restore is in progress.
    pub fn checkpoint(&mut self, scene: &mut SceneState, label: &str) -> bool {
        if self.restoring.get() {
            log::debug!("Ignoring checkpoint '{}' during restore", label);
            return false;
        }

        let content = scene.capture_content();
        let fingerprint = content.fingerprint();
        if fingerprint.is_some() && fingerprint == self.last_fingerprint {
            log::debug!("Checkpoint '{}' matches the current snapshot; skipped", label);
            return false;
        }

        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.index + 1);
        }
        self.snapshots.push(HistorySnapshot::new(content, label));
        self.index = self.snapshots.len() - 1;

        while self.snapshots.len() > self.capacity {
            self.snapshots.remove(0);
            self.index -= 1;
        }

        self.last_fingerprint = fingerprint;
        scene.mark_dirty();
        log::debug!("Checkpoint '{}' ({} of {})", label, self.index + 1, self.snapshots.len());
        true
    }

    /// Drop all history and record the scene as the new base snapshot
    pub fn reset(&mut self, scene: &mut SceneState, label: &str) {
        self.snapshots.clear();
        self.index = 0;
        self.last_fingerprint = None;
        self.checkpoint(scene, label);
        scene.mark_saved();
    }

    /// Carry every snapshot across a page edit the scene has already applied, then
    /// record the scene under `label` if it differs from the carried-over current entry.
    ///
    /// Returns whether an entry was recorded.
    pub fn remap_pages(&mut self, scene: &mut SceneState, change: PageChange, label: &str) -> bool {
        let page_count = scene.document().page_count();
        for snapshot in &mut self.snapshots {
            snapshot.remap_pages(change, page_count);
        }
        self.last_fingerprint = self.current().and_then(|s| s.content().fingerprint());
        log::debug!("Carried {} snapshots across {:?}", self.snapshots.len(), change);
        self.checkpoint(scene, label)
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty() && self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.snapshots.is_empty() && self.index + 1 < self.snapshots.len()
    }

    pub fn undo(&mut self, scene: &mut SceneState) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.index -= 1;
        self.restore_current(scene);
        true
    }

    pub fn redo(&mut self, scene: &mut SceneState) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.index += 1;
        self.restore_current(scene);
        true
    }

    fn restore_current(&mut self, scene: &mut SceneState) {
        let Some(snapshot) = self.snapshots.get(self.index) else {
            return;
        };
        log::debug!("Restoring '{}'", snapshot.label());
        let _guard = RestoreGuard::hold(&self.restoring);
        scene.apply_content(snapshot.content());
        // Restore may clamp or drop content; track what the scene actually holds
        self.last_fingerprint = scene.capture_content().fingerprint();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Position of the current snapshot, `None` when empty
    pub fn index(&self) -> Option<usize> {
        (!self.snapshots.is_empty()).then_some(self.index)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn labels(&self) -> Vec<&str> {
        self.snapshots.iter().map(HistorySnapshot::label).collect()
    }

    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.snapshots.get(self.index)
    }

    /// Bus event describing the current undo/redo availability
    pub fn status_event(&self) -> EditorEvent {
        EditorEvent::HistoryChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            label: self.current().map(|s| s.label().to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageInfo;
    use crate::element::factory;
    use crate::state::test_support::{rect_at, scene_with_pages};
    use crate::state::ROOT_PATH;
    use egui::{Color32, vec2};

    fn add_rect(scene: &mut SceneState, x: f32) -> crate::element::ObjectId {
        let layer = scene.active_layer_id();
        scene
            .add_object(factory::rectangle(1, layer, rect_at(x, 0.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap()
    }

    #[test]
    fn test_identical_checkpoints_are_deduplicated() {
        let mut scene = scene_with_pages(1);
        let mut history = HistoryEngine::new(50);
        history.reset(&mut scene, "load");
        add_rect(&mut scene, 0.0);

        assert!(history.checkpoint(&mut scene, "A"));
        assert!(!history.checkpoint(&mut scene, "A"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.index(), Some(1));
    }

    #[test]
    fn test_checkpoint_after_undo_truncates_redo_branch() {
        let mut scene = scene_with_pages(1);
        let mut history = HistoryEngine::new(50);
        history.reset(&mut scene, "load");
        add_rect(&mut scene, 0.0);
        history.checkpoint(&mut scene, "A");
        add_rect(&mut scene, 20.0);
        history.checkpoint(&mut scene, "B");

        assert!(history.undo(&mut scene));
        add_rect(&mut scene, 40.0);
        assert!(history.checkpoint(&mut scene, "C"));
        assert_eq!(history.labels(), vec!["load", "A", "C"]);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_redo_restores_identical_content() {
        let mut scene = scene_with_pages(1);
        let mut history = HistoryEngine::new(50);
        history.reset(&mut scene, "load");
        let id = add_rect(&mut scene, 0.0);
        history.checkpoint(&mut scene, "add");
        let before = serde_json::to_vec(&scene.capture_content()).unwrap();

        scene.update_object(id, |o| o.translate(vec2(30.0, 0.0)));
        history.checkpoint(&mut scene, "move");

        assert!(history.undo(&mut scene));
        assert_eq!(serde_json::to_vec(&scene.capture_content()).unwrap(), before);
        assert!(history.redo(&mut scene));
        assert!(history.undo(&mut scene));
        assert_eq!(serde_json::to_vec(&scene.capture_content()).unwrap(), before);
    }

    #[test]
    fn test_edit_that_puts_everything_back_is_not_recorded() {
        let mut scene = scene_with_pages(1);
        let mut history = HistoryEngine::new(50);
        history.reset(&mut scene, "load");
        let id = add_rect(&mut scene, 0.0);
        history.checkpoint(&mut scene, "add");

        scene.update_object(id, |o| o.translate(vec2(30.0, 0.0)));
        scene.update_object(id, |o| o.translate(vec2(-30.0, 0.0)));
        assert!(!history.checkpoint(&mut scene, "move"));
        assert_eq!(history.labels(), vec!["load", "add"]);
    }

    #[test]
    fn test_history_survives_page_insertion() {
        let mut scene = scene_with_pages(2);
        let mut history = HistoryEngine::new(50);
        history.reset(&mut scene, "load");
        let on_second = scene
            .add_object(factory::rectangle(2, scene.active_layer_id(), rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap();
        history.checkpoint(&mut scene, "add");

        let change = PageChange::Inserted { at: 1 };
        scene.apply_page_change(change, &vec![PageInfo::new(600.0, 800.0); 3]);
        assert!(!history.remap_pages(&mut scene, change, "Insert page"));
        assert_eq!(history.labels(), vec!["load", "add"]);

        assert!(history.undo(&mut scene));
        assert!(scene.objects().is_empty());
        assert!(history.redo(&mut scene));
        assert_eq!(scene.object(on_second).map(|o| o.page), Some(3));
    }

    #[test]
    fn test_page_deletion_drops_its_objects_from_every_snapshot() {
        let mut scene = scene_with_pages(3);
        let mut history = HistoryEngine::new(50);
        history.reset(&mut scene, "load");
        scene.set_page_background(3, Some(Color32::LIGHT_BLUE)).unwrap();
        let layer = scene.active_layer_id();
        let doomed = scene
            .add_object(factory::rectangle(2, layer, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap();
        history.checkpoint(&mut scene, "add on 2");
        let kept = scene
            .add_object(factory::rectangle(3, layer, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap();
        history.checkpoint(&mut scene, "add on 3");

        let change = PageChange::Deleted { page: 2 };
        scene.apply_page_change(change, &vec![PageInfo::new(600.0, 800.0); 2]);
        history.remap_pages(&mut scene, change, "Delete page");

        assert!(history.undo(&mut scene));
        assert!(scene.object(doomed).is_none());
        assert!(scene.object(kept).is_none());
        assert_eq!(scene.page_backgrounds(), vec![None, Some(Color32::LIGHT_BLUE)]);
        assert!(history.redo(&mut scene));
        assert_eq!(scene.object(kept).map(|o| o.page), Some(2));
    }

    #[test]
    fn test_undo_and_redo_at_the_ends_report_false() {
        let mut scene = scene_with_pages(1);
        let mut history = HistoryEngine::new(50);
        assert!(!history.undo(&mut scene));
        history.reset(&mut scene, "load");
        assert!(!history.undo(&mut scene));
        assert!(!history.redo(&mut scene));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut scene = scene_with_pages(1);
        let mut history = HistoryEngine::new(3);
        history.reset(&mut scene, "load");
        for i in 0..5 {
            add_rect(&mut scene, i as f32 * 20.0);
            history.checkpoint(&mut scene, &format!("add {i}"));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.index(), Some(2));
        assert_eq!(history.labels(), vec!["add 2", "add 3", "add 4"]);
    }

    #[test]
    fn test_restore_holds_the_guard() {
        let mut scene = scene_with_pages(1);
        let mut history = HistoryEngine::new(50);
        history.reset(&mut scene, "load");
        add_rect(&mut scene, 0.0);
        history.checkpoint(&mut scene, "add");

        let flag = history.restoring_flag();
        let seen = Rc::new(Cell::new((0, 0)));
        let sink = Rc::clone(&seen);
        scene.subscribe(ROOT_PATH, move |_| {
            let (during, outside) = sink.get();
            if flag.get() {
                sink.set((during + 1, outside));
            } else {
                sink.set((during, outside + 1));
            }
        });

        assert!(history.undo(&mut scene));
        assert!(!history.is_restoring());
        let (during, outside) = seen.get();
        assert!(during > 0);
        assert_eq!(outside, 0);
        assert!(scene.objects().is_empty());
    }

    #[test]
    fn test_checkpoint_marks_dirty_and_reset_clears() {
        let mut scene = scene_with_pages(1);
        let mut history = HistoryEngine::new(50);
        history.reset(&mut scene, "load");
        assert!(!scene.is_dirty());
        add_rect(&mut scene, 0.0);
        history.checkpoint(&mut scene, "add");
        assert!(scene.is_dirty());
    }
}

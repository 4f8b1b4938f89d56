use egui::{Pos2, Rect, Vec2};

use crate::element::{DrawableObject, ObjectId, factory};
use crate::error::{EditorError, EditorResult};
use crate::event::EditorEvent;
use crate::layer::LayerId;
use crate::state::scene::OBJECTS_PATH;
use crate::state::SceneState;

impl SceneState {
    /// The layer new objects go to
    pub fn active_layer_id(&self) -> LayerId {
        match self.data.active_layer {
            Some(id) => id,
            // enforce_bindings keeps at least one layer around
            None => self.data.layers.last().map(|l| l.id).unwrap_or_default(),
        }
    }

    fn check_binding(&self, object: &DrawableObject) -> EditorResult<()> {
        if !self.data.document.has_page(object.page) {
            return Err(EditorError::NoSuchPage(object.page));
        }
        if self.layer(object.layer_id).is_none() {
            return Err(EditorError::NoSuchLayer(object.layer_id.to_string()));
        }
        Ok(())
    }

    /// Append an object on top of its layer
    pub fn add_object(&mut self, object: DrawableObject) -> EditorResult<ObjectId> {
        let index = self.data.objects.len();
        self.insert_object_at(index, object)
    }

    /// Insert an object at a z-index (clamped to the object count)
    pub fn insert_object_at(&mut self, index: usize, object: DrawableObject) -> EditorResult<ObjectId> {
        self.check_binding(&object)?;
        let id = object.id;
        let page = object.page;
        log::debug!("Adding {} object {} on page {}", object.kind.type_name(), id, page);
        let index = index.min(self.data.objects.len());
        self.data.objects.insert(index, object);
        self.push_event(EditorEvent::ObjectAdded { id, page });
        self.commit(OBJECTS_PATH);
        Ok(id)
    }

    /// Mutate one object in place. Returns false if it does not exist.
    pub fn update_object(&mut self, id: ObjectId, f: impl FnOnce(&mut DrawableObject)) -> bool {
        let Some(object) = self.data.objects.iter_mut().find(|o| o.id == id) else {
            return false;
        };
        f(object);
        object.touch();
        let page = object.page;
        self.push_event(EditorEvent::ObjectUpdated { id, page });
        self.commit(OBJECTS_PATH);
        true
    }

    /// Mutate several objects as one batch
    pub fn update_objects(&mut self, ids: &[ObjectId], mut f: impl FnMut(&mut DrawableObject)) -> usize {
        self.batch(|scene| ids.iter().filter(|id| scene.update_object(**id, &mut f)).count())
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<DrawableObject> {
        let index = self.object_index(id)?;
        let object = self.data.objects.remove(index);
        log::debug!("Removed {} object {}", object.kind.type_name(), id);
        self.push_event(EditorEvent::ObjectDeleted { id, page: object.page });
        if self.selection.contains(&id) {
            self.selection.retain(|s| *s != id);
            self.announce_selection();
        }
        self.commit(OBJECTS_PATH);
        Some(object)
    }

    pub fn remove_objects(&mut self, ids: &[ObjectId]) -> Vec<DrawableObject> {
        self.batch(|scene| ids.iter().filter_map(|id| scene.remove_object(*id)).collect())
    }

    /// Move objects to the top of the paint order, keeping their relative order
    pub fn bring_to_front(&mut self, ids: &[ObjectId]) -> bool {
        self.restack(ids, true)
    }

    pub fn send_to_back(&mut self, ids: &[ObjectId]) -> bool {
        self.restack(ids, false)
    }

    fn restack(&mut self, ids: &[ObjectId], to_front: bool) -> bool {
        let (mut moved, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.data.objects).into_iter().partition(|o| ids.contains(&o.id));
        if moved.is_empty() {
            self.data.objects = rest;
            return false;
        }
        let now = crate::util::time::now_millis();
        for object in &mut moved {
            object.modified_ms = now;
            self.push_event(EditorEvent::ObjectUpdated {
                id: object.id,
                page: object.page,
            });
        }
        self.data.objects = if to_front {
            rest.into_iter().chain(moved).collect()
        } else {
            moved.into_iter().chain(rest).collect()
        };
        self.commit(OBJECTS_PATH);
        true
    }

    /// Translate the current selection by a document-space delta
    pub fn nudge_selection(&mut self, delta: Vec2) -> usize {
        let ids = self.editable_selection();
        if ids.is_empty() || delta == Vec2::ZERO {
            return 0;
        }
        self.update_objects(&ids, |o| o.translate(delta))
    }

    /// Place recognized or extracted text on a page as a regular text object
    pub fn add_text_run(&mut self, page: usize, origin: Pos2, text: &str, font_size: Option<f32>) -> EditorResult<ObjectId> {
        let defaults = &self.data.tool_defaults;
        let size = font_size.unwrap_or(defaults.font_size);
        let mut object = factory::text(
            page,
            self.active_layer_id(),
            Rect::from_min_size(origin, Vec2::ZERO),
            text,
            size,
            defaults.text_color,
        );
        if let crate::element::ObjectKind::Text(t) = &mut object.kind {
            t.font_family = defaults.font_family.clone();
        }
        self.add_object(object)
    }
}

#[cfg(test)]
mod tests {
    use crate::element::factory;
    use crate::event::EditorEvent;
    use crate::state::test_support::{rect_at, scene_with_pages};
    use egui::{Color32, pos2, vec2};

    #[test]
    fn test_add_rejects_unknown_page() {
        let mut scene = scene_with_pages(2);
        let layer = scene.active_layer_id();
        let object = factory::rectangle(5, layer, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0);
        assert!(scene.add_object(object).is_err());
        assert!(scene.objects().is_empty());
        assert_eq!(scene.revision(), 0);
    }

    #[test]
    fn test_add_update_remove_emit_events() {
        let mut scene = scene_with_pages(1);
        let layer = scene.active_layer_id();
        let id = scene
            .add_object(factory::rectangle(1, layer, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap();
        assert!(scene.update_object(id, |o| o.translate(vec2(3.0, 0.0))));
        assert!(scene.remove_object(id).is_some());

        let events = scene.take_events();
        assert_eq!(
            events,
            vec![
                EditorEvent::ObjectAdded { id, page: 1 },
                EditorEvent::ObjectUpdated { id, page: 1 },
                EditorEvent::ObjectDeleted { id, page: 1 },
            ]
        );
        assert!(scene.take_events().is_empty());
    }

    #[test]
    fn test_bring_to_front_and_send_to_back() {
        let mut scene = scene_with_pages(1);
        let layer = scene.active_layer_id();
        let ids: Vec<_> = (0..3)
            .map(|i| {
                scene
                    .add_object(factory::rectangle(1, layer, rect_at(i as f32, 0.0, 5.0, 5.0), Color32::RED, 1.0))
                    .unwrap()
            })
            .collect();

        assert!(scene.bring_to_front(&[ids[0]]));
        let order: Vec<_> = scene.objects().iter().map(|o| o.id).collect();
        assert_eq!(order, vec![ids[1], ids[2], ids[0]]);

        assert!(scene.send_to_back(&[ids[2]]));
        let order: Vec<_> = scene.objects().iter().map(|o| o.id).collect();
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_add_text_run_uses_defaults() {
        let mut scene = scene_with_pages(1);
        let id = scene.add_text_run(1, pos2(10.0, 10.0), "Hello", None).unwrap();
        let object = scene.object(id).unwrap();
        assert_eq!(object.kind.type_name(), "text");
        assert!(object.geometry_rect().width() > 0.0);
    }
}

use crate::error::{EditorError, EditorResult};
use crate::event::EditorEvent;
use crate::layer::{BlendMode, Layer, LayerId};
use crate::state::scene::LAYERS_PATH;
use crate::state::SceneState;

impl SceneState {
    fn layer_index(&self, id: LayerId) -> EditorResult<usize> {
        self.data
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| EditorError::NoSuchLayer(id.to_string()))
    }

    fn edit_layer(&mut self, id: LayerId, f: impl FnOnce(&mut Layer)) -> EditorResult<()> {
        let index = self.layer_index(id)?;
        f(&mut self.data.layers[index]);
        self.push_event(EditorEvent::LayersChanged);
        self.commit(LAYERS_PATH);
        Ok(())
    }

    /// Add a layer on top of the stack and make it active
    pub fn add_layer(&mut self, name: &str) -> LayerId {
        let layer = Layer::new(name);
        let id = layer.id;
        log::info!("Adding layer '{}'", name);
        self.data.layers.push(layer);
        self.data.active_layer = Some(id);
        self.push_event(EditorEvent::LayersChanged);
        self.commit(LAYERS_PATH);
        id
    }

    /// Delete a layer and every object on it. The last layer cannot be deleted.
    pub fn delete_layer(&mut self, id: LayerId) -> EditorResult<usize> {
        let index = self.layer_index(id)?;
        if self.data.layers.len() <= 1 {
            return Err(EditorError::LastLayer);
        }

        let doomed: Vec<_> = self.data.objects.iter().filter(|o| o.layer_id == id).map(|o| o.id).collect();
        let removed = self.batch(|scene| {
            let removed = scene.remove_objects(&doomed).len();
            scene.data.layers.remove(index);
            if scene.data.active_layer == Some(id) {
                let fallback = index.min(scene.data.layers.len() - 1);
                scene.data.active_layer = Some(scene.data.layers[fallback].id);
            }
            scene.push_event(EditorEvent::LayersChanged);
            scene.commit(LAYERS_PATH);
            removed
        });
        log::info!("Deleted layer {} with {} objects", id, removed);
        Ok(removed)
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> EditorResult<()> {
        self.edit_layer(id, |l| l.set_name(name.to_owned()))
    }

    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> EditorResult<()> {
        self.edit_layer(id, |l| l.visible = visible)?;
        if !visible {
            self.prune_hidden_selection();
        }
        Ok(())
    }

    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool) -> EditorResult<()> {
        self.edit_layer(id, |l| l.locked = locked)?;
        if locked {
            self.prune_hidden_selection();
        }
        Ok(())
    }

    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f32) -> EditorResult<()> {
        self.edit_layer(id, |l| l.set_opacity(opacity))
    }

    pub fn set_layer_blend(&mut self, id: LayerId, blend: BlendMode) -> EditorResult<()> {
        self.edit_layer(id, |l| l.blend = blend)
    }

    /// Move a layer to `new_index` in the stack (0 = bottom)
    pub fn move_layer(&mut self, id: LayerId, new_index: usize) -> EditorResult<()> {
        let index = self.layer_index(id)?;
        let new_index = new_index.min(self.data.layers.len() - 1);
        if index == new_index {
            return Ok(());
        }
        let layer = self.data.layers.remove(index);
        self.data.layers.insert(new_index, layer);
        self.push_event(EditorEvent::LayersChanged);
        self.commit(LAYERS_PATH);
        Ok(())
    }

    /// Choosing the target layer is not an edit and does not commit
    pub fn set_active_layer(&mut self, id: LayerId) -> EditorResult<()> {
        self.layer_index(id)?;
        if self.data.active_layer != Some(id) {
            self.data.active_layer = Some(id);
            self.push_event(EditorEvent::LayersChanged);
            self.notify("active_layer");
        }
        Ok(())
    }

    /// Objects on hidden or locked layers cannot stay selected
    fn prune_hidden_selection(&mut self) {
        let before = self.selection.len();
        let keep: Vec<_> = self.selection.iter().copied().filter(|id| self.is_editable(*id)).collect();
        if keep.len() != before {
            self.selection = keep;
            self.announce_selection();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::element::factory;
    use crate::error::EditorError;
    use crate::state::test_support::{rect_at, scene_with_pages};
    use egui::Color32;

    #[test]
    fn test_delete_layer_cascades_to_objects() {
        let mut scene = scene_with_pages(2);
        let base = scene.active_layer_id();
        let ink = scene.add_layer("Ink");
        for page in [1, 2] {
            scene
                .add_object(factory::rectangle(page, ink, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0))
                .unwrap();
        }
        let keep = scene
            .add_object(factory::rectangle(1, base, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap();

        assert_eq!(scene.delete_layer(ink), Ok(2));
        assert!(scene.objects().iter().all(|o| o.layer_id != ink));
        assert_eq!(scene.objects().len(), 1);
        assert_eq!(scene.objects()[0].id, keep);
        assert_eq!(scene.active_layer_id(), base);
    }

    #[test]
    fn test_last_layer_cannot_be_deleted() {
        let mut scene = scene_with_pages(1);
        let only = scene.active_layer_id();
        let revision = scene.revision();
        assert_eq!(scene.delete_layer(only), Err(EditorError::LastLayer));
        assert_eq!(scene.layers().len(), 1);
        assert_eq!(scene.revision(), revision);
    }

    #[test]
    fn test_move_layer_reorders() {
        let mut scene = scene_with_pages(1);
        let bottom = scene.active_layer_id();
        let top = scene.add_layer("Top");
        scene.move_layer(top, 0).unwrap();
        assert_eq!(scene.layers()[0].id, top);
        assert_eq!(scene.layers()[1].id, bottom);
    }

    #[test]
    fn test_locking_drops_selection() {
        let mut scene = scene_with_pages(1);
        let layer = scene.active_layer_id();
        let id = scene
            .add_object(factory::rectangle(1, layer, rect_at(0.0, 0.0, 10.0, 10.0), Color32::RED, 1.0))
            .unwrap();
        scene.select(&[id]);
        scene.set_layer_locked(layer, true).unwrap();
        assert!(scene.selection().is_empty());
    }
}

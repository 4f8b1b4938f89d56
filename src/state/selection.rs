use egui::{Rect, Vec2, vec2};

use crate::element::{DrawableObject, ObjectId};
use crate::event::EditorEvent;
use crate::state::scene::SELECTION_PATH;
use crate::state::SceneState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
    Top,
    Bottom,
    /// Align horizontal centers
    CenterHorizontal,
    /// Align vertical centers
    CenterVertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl SceneState {
    /// Selected ids that live on the current page, in selection order
    pub fn selection(&self) -> Vec<ObjectId> {
        let page = self.current_page();
        self.selection
            .iter()
            .copied()
            .filter(|id| self.object(*id).is_some_and(|o| o.page == page))
            .collect()
    }

    /// Selected ids on the current page whose layer allows editing
    pub fn editable_selection(&self) -> Vec<ObjectId> {
        self.selection().into_iter().filter(|id| self.is_editable(*id)).collect()
    }

    pub fn is_selected(&self, id: ObjectId) -> bool {
        self.selection.contains(&id)
    }

    /// Union of the selected objects' geometry boxes
    pub fn selection_bounds(&self) -> Option<Rect> {
        self.selection()
            .iter()
            .filter_map(|id| self.object(*id))
            .map(DrawableObject::geometry_rect)
            .reduce(|a, b| a.union(b))
    }

    pub(crate) fn announce_selection(&mut self) {
        let selected = self.selection();
        self.push_event(EditorEvent::SelectionChanged { selected });
        self.notify(SELECTION_PATH);
    }

    /// Replace the selection
    pub fn select(&mut self, ids: &[ObjectId]) {
        let mut next: Vec<ObjectId> = Vec::with_capacity(ids.len());
        for id in ids {
            if self.object(*id).is_some() && !next.contains(id) {
                next.push(*id);
            }
        }
        if next != self.selection {
            self.selection = next;
            self.announce_selection();
        }
    }

    pub fn toggle_selected(&mut self, id: ObjectId) {
        if self.selection.contains(&id) {
            self.selection.retain(|s| *s != id);
        } else if self.object(id).is_some() {
            self.selection.push(id);
        } else {
            return;
        }
        self.announce_selection();
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.announce_selection();
        }
    }

    /// Select every editable object on the current page
    pub fn select_all(&mut self) {
        let page = self.current_page();
        let ids: Vec<_> = self
            .paint_order(page)
            .into_iter()
            .filter(|o| self.layer(o.layer_id).is_some_and(|l| l.is_editable()))
            .map(|o| o.id)
            .collect();
        self.select(&ids);
    }

    /// Select editable objects on the current page whose bounds intersect `rect`
    pub fn select_in_rect(&mut self, rect: Rect, extend: bool) {
        let page = self.current_page();
        let mut ids: Vec<_> = if extend { self.selection() } else { Vec::new() };
        for object in self.paint_order(page) {
            let editable = self.layer(object.layer_id).is_some_and(|l| l.is_editable());
            if editable && object.bounds().intersects(rect) && !ids.contains(&object.id) {
                ids.push(object.id);
            }
        }
        self.select(&ids);
    }

    // ---- Clipboard ------------------------------------------------------------------

    /// Copy the selection to the clipboard. Returns how many objects were copied.
    pub fn copy_selection(&mut self) -> usize {
        let items: Vec<_> = self
            .selection()
            .iter()
            .filter_map(|id| self.object(*id))
            .map(|o| o.kind.clone())
            .collect();
        if items.is_empty() {
            return 0;
        }
        log::debug!("Copied {} objects", items.len());
        self.clipboard.items = items;
        self.clipboard.pastes = 0;
        self.clipboard.items.len()
    }

    pub fn cut_selection(&mut self) -> usize {
        let copied = self.copy_selection();
        if copied > 0 {
            self.delete_selection();
        }
        copied
    }

    pub fn has_clipboard(&self) -> bool {
        !self.clipboard.items.is_empty()
    }

    /// Paste onto the current page and active layer, offset from the source position.
    /// The pasted objects become the selection.
    pub fn paste(&mut self, offset: f32) -> Vec<ObjectId> {
        if self.clipboard.items.is_empty() || !self.document().has_page(self.current_page()) {
            return Vec::new();
        }
        self.clipboard.pastes += 1;
        let delta = Vec2::splat(offset * self.clipboard.pastes as f32);
        let page = self.current_page();
        let layer = self.active_layer_id();
        let items = self.clipboard.items.clone();

        let ids = self.batch(|scene| {
            items
                .into_iter()
                .filter_map(|mut kind| {
                    kind.translate(delta);
                    scene.add_object(DrawableObject::new(page, layer, kind)).ok()
                })
                .collect::<Vec<_>>()
        });
        self.select(&ids);
        ids
    }

    /// Copy the selection in place with an offset, selecting the copies
    pub fn duplicate_selection(&mut self, offset: f32) -> Vec<ObjectId> {
        let page = self.current_page();
        let sources: Vec<_> = self
            .editable_selection()
            .iter()
            .filter_map(|id| self.object(*id))
            .map(|o| {
                let mut copy = o.duplicate_to(page, o.layer_id);
                copy.translate(Vec2::splat(offset));
                copy
            })
            .collect();
        if sources.is_empty() {
            return Vec::new();
        }
        let ids = self.batch(|scene| sources.into_iter().filter_map(|o| scene.add_object(o).ok()).collect::<Vec<_>>());
        self.select(&ids);
        ids
    }

    /// Delete every editable selected object
    pub fn delete_selection(&mut self) -> usize {
        let ids = self.editable_selection();
        self.remove_objects(&ids).len()
    }

    // ---- Arrangement ----------------------------------------------------------------

    /// Align the selection's boxes. Needs at least two objects.
    pub fn align_selection(&mut self, alignment: Alignment) -> bool {
        let ids = self.editable_selection();
        let boxes: Vec<(ObjectId, Rect)> = ids
            .iter()
            .filter_map(|id| self.object(*id).map(|o| (*id, o.geometry_rect())))
            .collect();
        if boxes.len() < 2 {
            return false;
        }

        let union = boxes.iter().map(|(_, r)| *r).reduce(|a, b| a.union(b)).unwrap_or(Rect::NOTHING);
        let deltas: Vec<(ObjectId, Vec2)> = boxes
            .iter()
            .map(|(id, r)| {
                let delta = match alignment {
                    Alignment::Left => vec2(union.min.x - r.min.x, 0.0),
                    Alignment::Right => vec2(union.max.x - r.max.x, 0.0),
                    Alignment::Top => vec2(0.0, union.min.y - r.min.y),
                    Alignment::Bottom => vec2(0.0, union.max.y - r.max.y),
                    Alignment::CenterHorizontal => vec2(union.center().x - r.center().x, 0.0),
                    Alignment::CenterVertical => vec2(0.0, union.center().y - r.center().y),
                };
                (*id, delta)
            })
            .collect();
        self.apply_deltas(&deltas);
        true
    }

    /// Space the selection evenly between its outermost objects. Needs at least three.
    pub fn distribute_selection(&mut self, axis: Axis) -> bool {
        let ids = self.editable_selection();
        let mut boxes: Vec<(ObjectId, Rect)> = ids
            .iter()
            .filter_map(|id| self.object(*id).map(|o| (*id, o.geometry_rect())))
            .collect();
        if boxes.len() < 3 {
            return false;
        }

        let center = |r: &Rect| match axis {
            Axis::Horizontal => r.center().x,
            Axis::Vertical => r.center().y,
        };
        boxes.sort_by(|a, b| center(&a.1).total_cmp(&center(&b.1)));
        let first = center(&boxes[0].1);
        let last = center(&boxes[boxes.len() - 1].1);
        let step = (last - first) / (boxes.len() - 1) as f32;

        let deltas: Vec<(ObjectId, Vec2)> = boxes
            .iter()
            .enumerate()
            .map(|(i, (id, r))| {
                let shift = first + step * i as f32 - center(r);
                let delta = match axis {
                    Axis::Horizontal => vec2(shift, 0.0),
                    Axis::Vertical => vec2(0.0, shift),
                };
                (*id, delta)
            })
            .collect();
        self.apply_deltas(&deltas);
        true
    }

    fn apply_deltas(&mut self, deltas: &[(ObjectId, Vec2)]) {
        self.batch(|scene| {
            for (id, delta) in deltas {
                if *delta != Vec2::ZERO {
                    scene.update_object(*id, |o| o.translate(*delta));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::factory;
    use crate::state::test_support::{rect_at, scene_with_pages};
    use egui::{Color32, pos2};

    fn add_rect(scene: &mut SceneState, page: usize, rect: Rect) -> ObjectId {
        let layer = scene.active_layer_id();
        scene.add_object(factory::rectangle(page, layer, rect, Color32::RED, 1.0)).unwrap()
    }

    #[test]
    fn test_align_left() {
        let mut scene = scene_with_pages(1);
        let a = add_rect(&mut scene, 1, rect_at(10.0, 10.0, 20.0, 20.0));
        let b = add_rect(&mut scene, 1, rect_at(40.0, 60.0, 30.0, 10.0));
        scene.select(&[a, b]);

        assert!(scene.align_selection(Alignment::Left));
        assert_eq!(scene.object(a).unwrap().geometry_rect().min, pos2(10.0, 10.0));
        assert_eq!(scene.object(b).unwrap().geometry_rect().min, pos2(10.0, 60.0));
    }

    #[test]
    fn test_align_needs_two_objects() {
        let mut scene = scene_with_pages(1);
        let a = add_rect(&mut scene, 1, rect_at(10.0, 10.0, 20.0, 20.0));
        scene.select(&[a]);
        assert!(!scene.align_selection(Alignment::Right));
    }

    #[test]
    fn test_distribute_horizontally() {
        let mut scene = scene_with_pages(1);
        let a = add_rect(&mut scene, 1, rect_at(0.0, 0.0, 10.0, 10.0));
        let b = add_rect(&mut scene, 1, rect_at(15.0, 0.0, 10.0, 10.0));
        let c = add_rect(&mut scene, 1, rect_at(100.0, 0.0, 10.0, 10.0));
        scene.select(&[c, a, b]);

        assert!(scene.distribute_selection(Axis::Horizontal));
        assert_eq!(scene.object(b).unwrap().geometry_rect().center().x, 55.0);
        assert_eq!(scene.object(a).unwrap().geometry_rect().min.x, 0.0);
    }

    #[test]
    fn test_selection_is_filtered_to_current_page() {
        let mut scene = scene_with_pages(2);
        let a = add_rect(&mut scene, 1, rect_at(0.0, 0.0, 10.0, 10.0));
        let b = add_rect(&mut scene, 2, rect_at(0.0, 0.0, 10.0, 10.0));
        scene.select(&[a, b]);
        assert_eq!(scene.selection(), vec![a]);
    }

    #[test]
    fn test_copy_paste_rebinds_and_offsets() {
        let mut scene = scene_with_pages(2);
        let a = add_rect(&mut scene, 1, rect_at(0.0, 0.0, 10.0, 10.0));
        scene.select(&[a]);
        assert_eq!(scene.copy_selection(), 1);

        scene.go_to_page(2);
        let pasted = scene.paste(10.0);
        assert_eq!(pasted.len(), 1);
        let copy = scene.object(pasted[0]).unwrap();
        assert_eq!(copy.page, 2);
        assert_ne!(copy.id, a);
        assert_eq!(copy.geometry_rect().min, pos2(10.0, 10.0));
        assert_eq!(scene.selection(), pasted);

        let again = scene.paste(10.0);
        assert_eq!(scene.object(again[0]).unwrap().geometry_rect().min, pos2(20.0, 20.0));
    }

    #[test]
    fn test_cut_removes_selection() {
        let mut scene = scene_with_pages(1);
        let a = add_rect(&mut scene, 1, rect_at(0.0, 0.0, 10.0, 10.0));
        scene.select(&[a]);
        assert_eq!(scene.cut_selection(), 1);
        assert!(scene.objects().is_empty());
        assert!(scene.selection().is_empty());
        assert!(scene.has_clipboard());
    }

    #[test]
    fn test_select_in_rect() {
        let mut scene = scene_with_pages(1);
        let a = add_rect(&mut scene, 1, rect_at(0.0, 0.0, 10.0, 10.0));
        let _far = add_rect(&mut scene, 1, rect_at(200.0, 200.0, 10.0, 10.0));
        scene.select_in_rect(rect_at(-5.0, -5.0, 20.0, 20.0), false);
        assert_eq!(scene.selection(), vec![a]);
    }
}

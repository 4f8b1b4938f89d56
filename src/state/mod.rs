mod defaults;
mod layers;
mod objects;
mod pages;
mod persistence;
pub(crate) mod scene;
mod selection;

pub use defaults::{EraserMode, ToolDefaults};
pub use pages::PageChange;
pub use persistence::{PersistenceError, PersistenceResult, SceneSnapshot};
pub use scene::{ROOT_PATH, SELECTION_PATH, SceneData, SceneState, SceneSubscription, is_content_path};
pub use selection::{Alignment, Axis};

#[cfg(test)]
pub(crate) mod test_support {
    use egui::{Rect, pos2, vec2};

    use super::SceneState;
    use crate::document::{Document, Page, PageInfo};

    /// A scene over a document of `count` 600x800 pages
    pub(crate) fn scene_with_pages(count: usize) -> SceneState {
        let mut scene = SceneState::new();
        let pages = (0..count).map(|_| Page::from_info(PageInfo::new(600.0, 800.0))).collect();
        scene.data.document = Document::new("test.pdf", 1024, pages);
        scene
    }

    pub(crate) fn rect_at(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::from_min_size(pos2(x, y), vec2(w, h))
    }
}

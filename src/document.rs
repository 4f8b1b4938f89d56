use egui::{Color32, Vec2, vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Rotation;

/// Page geometry reported by the rasterization collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub width: f32,
    pub height: f32,
    pub rotation: Rotation,
}

impl PageInfo {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            rotation: Rotation::Deg0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Intrinsic width in document units
    pub width: f32,
    pub height: f32,
    pub rotation: Rotation,
    /// Flat fill drawn under the page raster
    pub background: Option<Color32>,
}

impl Page {
    pub fn from_info(info: PageInfo) -> Self {
        Self {
            width: info.width,
            height: info.height,
            rotation: info.rotation,
            background: None,
        }
    }

    pub fn size(&self) -> Vec2 {
        vec2(self.width, self.height)
    }

    /// Take geometry from fresh collaborator metadata, keeping local state
    pub fn update_from(&mut self, info: PageInfo) {
        self.width = info.width;
        self.height = info.height;
        self.rotation = info.rotation;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Uuid,
    /// 1-based page number
    pub page: usize,
    pub title: String,
}

impl Bookmark {
    pub fn new(page: usize, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            page,
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    pub name: String,
    pub byte_size: u64,
    pub pages: Vec<Page>,
    /// Updated on every committed mutation
    pub modified_ms: i64,
}

impl Document {
    pub fn new(name: impl Into<String>, byte_size: u64, pages: Vec<Page>) -> Self {
        Self {
            name: name.into(),
            byte_size,
            pages,
            modified_ms: crate::util::time::now_millis(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Look up a 1-based page number
    pub fn page(&self, number: usize) -> Option<&Page> {
        number.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    pub fn page_mut(&mut self, number: usize) -> Option<&mut Page> {
        number.checked_sub(1).and_then(|i| self.pages.get_mut(i))
    }

    pub fn has_page(&self, number: usize) -> bool {
        number >= 1 && number <= self.pages.len()
    }

    /// Clamp a page number into the valid range; 1 for an empty document
    pub fn clamp_page(&self, number: usize) -> usize {
        number.clamp(1, self.pages.len().max(1))
    }

    /// Replace page geometry with collaborator metadata, preserving backgrounds where the
    /// page order is unchanged
    pub fn sync_pages(&mut self, infos: &[PageInfo]) {
        let mut pages = Vec::with_capacity(infos.len());
        for (i, info) in infos.iter().enumerate() {
            let mut page = Page::from_info(*info);
            if let Some(old) = self.pages.get(i) {
                page.background = old.background;
            }
            pages.push(page);
        }
        self.pages = pages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_numbers_are_one_based() {
        let doc = Document::new("a.pdf", 10, vec![Page::from_info(PageInfo::new(10.0, 20.0))]);
        assert!(doc.page(0).is_none());
        assert_eq!(doc.page(1).map(|p| p.size()), Some(vec2(10.0, 20.0)));
        assert_eq!(doc.clamp_page(7), 1);
        assert!(!doc.has_page(2));
    }
}

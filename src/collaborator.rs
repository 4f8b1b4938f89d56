//! Interfaces to the external document and OCR engines.
//!
//! The editor never parses or rasterizes documents itself. Everything it needs is
//! requested through these traits and awaited without blocking the UI thread.

use std::cell::RefCell;
use std::sync::Arc;

use egui::{Color32, Pos2, Rect, Vec2};
use futures::future::{self, LocalBoxFuture};
use image::RgbaImage;

use crate::document::PageInfo;
use crate::error::CollaboratorError;
use crate::geometry::Rotation;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Region of a page to rasterize, in document units, at a pixel scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderViewport {
    pub region: Rect,
    /// Device pixels per document unit
    pub scale: f32,
    pub rotation: Rotation,
}

/// A run of text found on a page, positioned in document space
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub origin: Pos2,
    pub font_size: f32,
}

/// The document engine: page metadata, rasterization and structural page edits.
///
/// Structural edits resolve with the full page list after the edit.
pub trait Rasterizer {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> CollaboratorResult<Vec2>;

    /// Metadata for every page, in order
    fn pages(&self) -> Vec<PageInfo>;

    fn render_page_region(&self, page: usize, viewport: RenderViewport) -> LocalBoxFuture<'static, CollaboratorResult<Arc<RgbaImage>>>;

    fn extract_page_text(&self, page: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<TextRun>>>;

    /// Insert a blank page so that it becomes page `at`
    fn add_page(&self, at: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>>;

    fn duplicate_page(&self, page: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>>;

    fn delete_page(&self, page: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>>;

    fn reorder_pages(&self, from: usize, to: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>>;

    fn rotate_page(&self, page: usize, rotation: Rotation) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>>;
}

/// Optical character recognition over rendered pixels
pub trait Ocr {
    fn recognize(&self, pixels: Arc<RgbaImage>, language: &str) -> LocalBoxFuture<'static, CollaboratorResult<Vec<TextRun>>>;
}

/// A document of plain white pages, used by the demo host and tests
#[derive(Debug, Clone)]
pub struct BlankPages {
    pages: RefCell<Vec<PageInfo>>,
    paper: Color32,
}

impl BlankPages {
    pub fn new(pages: Vec<PageInfo>) -> Self {
        Self {
            pages: RefCell::new(pages),
            paper: Color32::WHITE,
        }
    }

    /// `count` US Letter pages
    pub fn letter(count: usize) -> Self {
        Self::new(vec![PageInfo::new(612.0, 792.0); count])
    }

    fn check(&self, page: usize) -> CollaboratorResult<usize> {
        let count = self.pages.borrow().len();
        if page >= 1 && page <= count {
            Ok(page - 1)
        } else {
            Err(CollaboratorError::PageOutOfRange(page))
        }
    }

    fn edit(&self, f: impl FnOnce(&mut Vec<PageInfo>)) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>> {
        let mut pages = self.pages.borrow_mut();
        f(&mut pages);
        Box::pin(future::ready(Ok(pages.clone())))
    }

    fn fail<T: 'static>(error: CollaboratorError) -> LocalBoxFuture<'static, CollaboratorResult<T>> {
        Box::pin(future::ready(Err(error)))
    }
}

impl Rasterizer for BlankPages {
    fn page_count(&self) -> usize {
        self.pages.borrow().len()
    }

    fn page_size(&self, page: usize) -> CollaboratorResult<Vec2> {
        let index = self.check(page)?;
        let info = self.pages.borrow()[index];
        Ok(Vec2::new(info.width, info.height))
    }

    fn pages(&self) -> Vec<PageInfo> {
        self.pages.borrow().clone()
    }

    fn render_page_region(&self, page: usize, viewport: RenderViewport) -> LocalBoxFuture<'static, CollaboratorResult<Arc<RgbaImage>>> {
        if let Err(e) = self.check(page) {
            return Self::fail(e);
        }
        let size = viewport.region.size() * viewport.scale;
        let (mut width, mut height) = (size.x.round().max(1.0) as u32, size.y.round().max(1.0) as u32);
        if viewport.rotation.swaps_axes() {
            std::mem::swap(&mut width, &mut height);
        }
        let paper = image::Rgba(self.paper.to_array());
        Box::pin(future::ready(Ok(Arc::new(RgbaImage::from_pixel(width, height, paper)))))
    }

    fn extract_page_text(&self, page: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<TextRun>>> {
        match self.check(page) {
            Ok(_) => Box::pin(future::ready(Ok(Vec::new()))),
            Err(e) => Self::fail(e),
        }
    }

    fn add_page(&self, at: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>> {
        let count = self.page_count();
        if at == 0 || at > count + 1 {
            return Self::fail(CollaboratorError::PageOutOfRange(at));
        }
        let template = self.pages.borrow().get(at.saturating_sub(2)).copied().unwrap_or(PageInfo::new(612.0, 792.0));
        self.edit(|pages| pages.insert(at - 1, PageInfo { rotation: Rotation::Deg0, ..template }))
    }

    fn duplicate_page(&self, page: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>> {
        match self.check(page) {
            Ok(index) => self.edit(|pages| {
                let copy = pages[index];
                pages.insert(index + 1, copy);
            }),
            Err(e) => Self::fail(e),
        }
    }

    fn delete_page(&self, page: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>> {
        match self.check(page) {
            Ok(index) => self.edit(|pages| {
                pages.remove(index);
            }),
            Err(e) => Self::fail(e),
        }
    }

    fn reorder_pages(&self, from: usize, to: usize) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>> {
        let (from_index, to_index) = match (self.check(from), self.check(to)) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => return Self::fail(e),
        };
        self.edit(|pages| {
            let page = pages.remove(from_index);
            pages.insert(to_index, page);
        })
    }

    fn rotate_page(&self, page: usize, rotation: Rotation) -> LocalBoxFuture<'static, CollaboratorResult<Vec<PageInfo>>> {
        match self.check(page) {
            Ok(index) => self.edit(|pages| pages[index].rotation = rotation),
            Err(e) => Self::fail(e),
        }
    }
}

/// Recognizer that finds nothing, for hosts without an OCR engine
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcr;

impl Ocr for NoOcr {
    fn recognize(&self, _pixels: Arc<RgbaImage>, _language: &str) -> LocalBoxFuture<'static, CollaboratorResult<Vec<TextRun>>> {
        Box::pin(future::ready(Err(CollaboratorError::Unavailable)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_blank_pages_edits() {
        let doc = BlankPages::letter(2);
        let pages = block_on(doc.add_page(3)).unwrap();
        assert_eq!(pages.len(), 3);
        let pages = block_on(doc.rotate_page(1, Rotation::Deg90)).unwrap();
        assert_eq!(pages[0].rotation, Rotation::Deg90);
        let pages = block_on(doc.reorder_pages(1, 3)).unwrap();
        assert_eq!(pages[2].rotation, Rotation::Deg90);
        assert_eq!(block_on(doc.delete_page(9)), Err(CollaboratorError::PageOutOfRange(9)));
        assert_eq!(doc.page_count(), 3);
    }

    #[test]
    fn test_render_region_size() {
        let doc = BlankPages::letter(1);
        let viewport = RenderViewport {
            region: Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 50.0)),
            scale: 2.0,
            rotation: Rotation::Deg90,
        };
        let raster = block_on(doc.render_page_region(1, viewport)).unwrap();
        assert_eq!(raster.dimensions(), (100, 200));
    }
}

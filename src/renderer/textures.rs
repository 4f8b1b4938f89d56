use std::collections::HashMap;

use egui::{ColorImage, Context, TextureHandle, TextureId, TextureOptions};
use image::RgbaImage;
use thiserror::Error;

use crate::element::ObjectId;

/// Errors that can occur while uploading a texture
#[derive(Error, Debug, PartialEq)]
pub enum TextureError {
    #[error("Image data is not available")]
    MissingPixels,
    #[error("Invalid texture dimensions {0}x{1}")]
    InvalidDimensions(u32, u32),
}

/// What a cached texture shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKey {
    /// Base raster of a page; `version` changes whenever the raster is replaced
    Page { page: usize, version: u64 },
    /// Decoded pixels of a placed image object
    Image(ObjectId),
    Thumbnail { page: usize, version: u64 },
}

/// GPU textures for page rasters and placed images, evicted least recently used first
pub struct TextureCache {
    textures: HashMap<TextureKey, TextureHandle>,
    last_used: HashMap<TextureKey, u64>,
    current_frame: u64,
    max_size: usize,
}

impl std::fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("textures", &self.textures.len())
            .field("current_frame", &self.current_frame)
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl TextureCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            textures: HashMap::new(),
            last_used: HashMap::new(),
            current_frame: 0,
            max_size: max_size.max(1),
        }
    }

    /// Call once at the start of each frame
    pub fn begin_frame(&mut self) {
        self.current_frame += 1;
    }

    /// Texture for `key`, uploading `pixels` on a miss
    pub fn get_or_upload(
        &mut self,
        ctx: &Context,
        key: TextureKey,
        pixels: Option<&RgbaImage>,
    ) -> Result<TextureId, TextureError> {
        if let Some(handle) = self.textures.get(&key) {
            self.last_used.insert(key, self.current_frame);
            return Ok(handle.id());
        }

        let pixels = pixels.ok_or(TextureError::MissingPixels)?;
        let image = color_image(pixels)?;

        let handle = ctx.load_texture(format!("{:?}", key), image, TextureOptions::LINEAR);
        let id = handle.id();
        self.textures.insert(key, handle);
        self.last_used.insert(key, self.current_frame);
        self.prune();
        Ok(id)
    }

    /// Drop every texture of `page`, whatever its version
    pub fn invalidate_page(&mut self, page: usize) {
        self.retain(|key| !matches!(key, TextureKey::Page { page: p, .. } | TextureKey::Thumbnail { page: p, .. } if *p == page));
    }

    pub fn invalidate_image(&mut self, id: ObjectId) {
        self.retain(|key| *key != TextureKey::Image(id));
    }

    fn retain(&mut self, keep: impl Fn(&TextureKey) -> bool) {
        self.textures.retain(|key, _| keep(key));
        self.last_used.retain(|key, _| keep(key));
    }

    fn prune(&mut self) {
        if self.textures.len() <= self.max_size {
            return;
        }
        let mut entries: Vec<(TextureKey, u64)> = self.last_used.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by_key(|(_, frame)| *frame);

        let to_remove = entries.len() - self.max_size;
        for (key, _) in entries.into_iter().take(to_remove) {
            self.textures.remove(&key);
            self.last_used.remove(&key);
        }
    }

    pub fn clear(&mut self) {
        self.textures.clear();
        self.last_used.clear();
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn contains(&self, key: TextureKey) -> bool {
        self.textures.contains_key(&key)
    }
}

fn color_image(pixels: &RgbaImage) -> Result<ColorImage, TextureError> {
    let (w, h) = pixels.dimensions();
    if w == 0 || h == 0 {
        return Err(TextureError::InvalidDimensions(w, h));
    }
    Ok(ColorImage::from_rgba_unmultiplied([w as usize, h as usize], pixels.as_raw()))
}

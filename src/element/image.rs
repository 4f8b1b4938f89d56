use std::sync::Arc;

use egui::{Rect, Vec2, vec2};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::EditorError;

/// Raster image placed on a page.
///
/// `bytes` holds the encoded source and is what gets serialized and snapshotted.
/// The decoded pixels are a derived handle: never serialized, never compared, and
/// rebuilt from `bytes` on demand.
#[derive(Clone, Serialize, Deserialize)]
pub struct ImageObject {
    pub rect: Rect,
    pub bytes: Vec<u8>,
    /// Pixel dimensions of the source image
    pub natural_size: [u32; 2],
    pub opacity: f32,
    /// Placed by the signature tool
    #[serde(default)]
    pub signature: bool,
    #[serde(skip)]
    decoded: Option<Arc<image::RgbaImage>>,
}

// Custom Debug implementation since the encoded bytes are not worth printing
impl std::fmt::Debug for ImageObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageObject")
            .field("rect", &self.rect)
            .field("data_len", &self.bytes.len())
            .field("natural_size", &self.natural_size)
            .field("opacity", &self.opacity)
            .field("signature", &self.signature)
            .field("decoded", &self.decoded.is_some())
            .finish()
    }
}

impl PartialEq for ImageObject {
    fn eq(&self, other: &Self) -> bool {
        self.rect == other.rect
            && self.natural_size == other.natural_size
            && self.opacity == other.opacity
            && self.signature == other.signature
            && self.bytes == other.bytes
    }
}

/// An encoded image decoded once and waiting to be placed
#[derive(Clone)]
pub struct PendingImage {
    pub bytes: Vec<u8>,
    pub pixels: Arc<image::RgbaImage>,
    pub signature: bool,
}

impl std::fmt::Debug for PendingImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingImage")
            .field("data_len", &self.bytes.len())
            .field("size", &self.pixels.dimensions())
            .field("signature", &self.signature)
            .finish()
    }
}

impl PendingImage {
    pub fn decode(bytes: Vec<u8>, signature: bool) -> Result<Self, EditorError> {
        let pixels = image::load_from_memory(&bytes)
            .map_err(|e| EditorError::ImageDecode(e.to_string()))?
            .to_rgba8();
        debug!("Decoded pending image {}x{}", pixels.width(), pixels.height());
        Ok(Self {
            bytes,
            pixels: Arc::new(pixels),
            signature,
        })
    }

    /// Natural size scaled down so the longest edge fits `max_edge`
    pub fn placement_size(&self, max_edge: f32) -> Vec2 {
        let (w, h) = self.pixels.dimensions();
        let natural = vec2(w.max(1) as f32, h.max(1) as f32);
        let longest = natural.x.max(natural.y);
        if longest > max_edge && max_edge > 0.0 {
            natural * (max_edge / longest)
        } else {
            natural
        }
    }

    pub fn to_object(&self, rect: Rect) -> ImageObject {
        let (w, h) = self.pixels.dimensions();
        ImageObject {
            rect,
            bytes: self.bytes.clone(),
            natural_size: [w, h],
            opacity: 1.0,
            signature: self.signature,
            decoded: Some(Arc::clone(&self.pixels)),
        }
    }
}

impl ImageObject {
    /// Decoded pixels, if available
    pub fn pixels(&self) -> Option<&Arc<image::RgbaImage>> {
        self.decoded.as_ref()
    }

    /// Copy without the decoded handle
    pub fn detached(&self) -> Self {
        Self {
            rect: self.rect,
            bytes: self.bytes.clone(),
            natural_size: self.natural_size,
            opacity: self.opacity,
            signature: self.signature,
            decoded: None,
        }
    }

    /// Rebuild the decoded handle from the encoded bytes
    pub fn rehydrate(&mut self) {
        if self.decoded.is_some() {
            return;
        }
        match image::load_from_memory(&self.bytes) {
            Ok(img) => self.decoded = Some(Arc::new(img.to_rgba8())),
            Err(e) => warn!("Could not decode image data ({} bytes): {}", self.bytes.len(), e),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Encode a small solid PNG for tests
    pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }
}

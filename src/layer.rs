use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How a layer's pixels combine with what is beneath it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

impl BlendMode {
    /// Blend one channel (0..=1, unpremultiplied) of `src` over `dst`
    pub fn blend_channel(self, src: f32, dst: f32) -> f32 {
        match self {
            Self::Normal => src,
            Self::Multiply => src * dst,
            Self::Screen => src + dst - src * dst,
            Self::Overlay => {
                if dst <= 0.5 {
                    2.0 * src * dst
                } else {
                    1.0 - 2.0 * (1.0 - src) * (1.0 - dst)
                }
            }
            Self::Darken => src.min(dst),
            Self::Lighten => src.max(dst),
        }
    }
}

/// A unique identifier for a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, ordered group of objects shared by all pages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    /// Unique identifier for the layer
    pub id: LayerId,
    /// Display name of the layer
    pub name: String,
    /// Whether the layer is currently visible
    pub visible: bool,
    /// Locked layers render but cannot be hit or edited
    pub locked: bool,
    /// 0.0 = transparent, 1.0 = opaque
    pub opacity: f32,
    pub blend: BlendMode,
}

impl Layer {
    pub fn new(name: &str) -> Self {
        Self {
            id: LayerId::new(),
            name: name.to_string(),
            visible: true,
            locked: false,
            opacity: 1.0,
            blend: BlendMode::Normal,
        }
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
    }

    /// Visible and unlocked: objects on it can be picked and modified
    pub fn is_editable(&self) -> bool {
        self.visible && !self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opacity_is_clamped() {
        let mut layer = Layer::new("Ink");
        layer.set_opacity(1.5);
        assert_eq!(layer.opacity, 1.0);
        layer.set_opacity(-1.0);
        assert_eq!(layer.opacity, 0.0);
    }

    #[test]
    fn test_blend_channels() {
        assert_eq!(BlendMode::Multiply.blend_channel(0.5, 0.5), 0.25);
        assert_eq!(BlendMode::Screen.blend_channel(0.5, 0.5), 0.75);
        assert_eq!(BlendMode::Darken.blend_channel(0.2, 0.7), 0.2);
        assert_eq!(BlendMode::Lighten.blend_channel(0.2, 0.7), 0.7);
    }
}

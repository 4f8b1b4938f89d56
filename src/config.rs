use serde::{Deserialize, Serialize};

/// Editor-wide tunables.
///
/// Loaded from JSON; any missing field keeps its default so older config files stay valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of history snapshots kept before the oldest is evicted
    pub history_capacity: usize,
    /// Maximum number of cached page thumbnails
    pub thumbnail_capacity: usize,
    /// Longest thumbnail edge in pixels
    pub thumbnail_size: u32,
    /// Shapes smaller than this (in view pixels, both axes) are treated as clicks
    pub click_threshold_px: f32,
    /// Interval between intermediate checkpoints during long freehand gestures
    pub freehand_checkpoint_ms: f64,
    /// Extra grab distance in view pixels for hit-testing thin geometry
    pub hit_slop_px: f32,
    /// Radius of resize handles in view pixels
    pub handle_radius_px: f32,
    /// Smallest width/height (document units) a resize may produce
    pub min_object_size: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Largest accepted document in bytes
    pub max_file_bytes: u64,
    /// Accepted document extensions, lowercase without the dot
    pub accepted_extensions: Vec<String>,
    /// Offset applied to pasted and duplicated objects (document units)
    pub paste_offset: f32,
    /// Size of a form field placed by a plain click (document units)
    pub default_form_field_size: [f32; 2],
    /// Longest edge of an image placed by a plain click (document units)
    pub max_placed_image_size: f32,
    /// Tolerance for freehand simplification (document units)
    pub simplify_tolerance: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            thumbnail_capacity: 20,
            thumbnail_size: 160,
            click_threshold_px: 5.0,
            freehand_checkpoint_ms: 400.0,
            hit_slop_px: 6.0,
            handle_radius_px: 6.0,
            min_object_size: 5.0,
            min_zoom: 0.25,
            max_zoom: 5.0,
            max_file_bytes: 100 * 1024 * 1024,
            accepted_extensions: vec!["pdf".to_owned()],
            paste_offset: 10.0,
            default_form_field_size: [160.0, 24.0],
            max_placed_image_size: 300.0,
            simplify_tolerance: 0.75,
        }
    }
}

impl EditorConfig {
    /// Parse a config from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        if zoom.is_finite() {
            zoom.clamp(self.min_zoom, self.max_zoom)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{ "history_capacity": 5 }"#).unwrap();
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.thumbnail_capacity, EditorConfig::default().thumbnail_capacity);
    }

    #[test]
    fn test_zoom_clamp() {
        let config = EditorConfig::default();
        assert_eq!(config.clamp_zoom(10.0), 5.0);
        assert_eq!(config.clamp_zoom(0.1), 0.25);
        assert_eq!(config.clamp_zoom(f32::NAN), 1.0);
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{SceneData, SceneState};
use crate::event::EditorEvent;
use crate::state::scene::ROOT_PATH;
use crate::util::time;

/// Errors that can occur while saving or restoring a scene
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to serialize scene: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid scene data: {0}")]
    InvalidState(String),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Serialized form handed to an external autosave or storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub scene: SceneData,
    /// Milliseconds since the Unix epoch
    pub saved_ms: i64,
    /// Version of the crate that wrote the snapshot
    pub version: String,
}

impl SceneSnapshot {
    pub fn new(scene: &SceneState) -> Self {
        Self {
            scene: scene.data().clone(),
            saved_ms: time::now_millis(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl SceneState {
    /// Serialize the scene (document, layers, objects, bookmarks, settings, view) to JSON
    pub fn serialize(&self) -> PersistenceResult<String> {
        Ok(serde_json::to_string(&SceneSnapshot::new(self))?)
    }

    /// Replace the scene with a previously serialized one.
    ///
    /// Subscribers are kept. Selection and clipboard are cleared.
    pub fn restore_serialized(&mut self, json: &str) -> PersistenceResult<()> {
        let snapshot: SceneSnapshot = serde_json::from_str(json)?;
        if snapshot.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Scene snapshot version {} differs from current version {}",
                snapshot.version,
                env!("CARGO_PKG_VERSION")
            );
        }
        if snapshot.scene.layers.is_empty() && !snapshot.scene.objects.is_empty() {
            return Err(PersistenceError::InvalidState("objects without any layer".to_owned()));
        }

        self.data = snapshot.scene;
        for object in &mut self.data.objects {
            object.rehydrate();
        }
        let dropped = self.enforce_bindings();
        if dropped > 0 {
            log::warn!("Dropped {} objects with dangling page or layer references", dropped);
        }
        self.selection.clear();
        self.clipboard = Default::default();

        self.push_event(EditorEvent::DocumentLoaded {
            name: self.data.document.name.clone(),
            page_count: self.data.document.page_count(),
        });
        self.push_event(EditorEvent::LayersChanged);
        self.commit(ROOT_PATH);
        Ok(())
    }
}

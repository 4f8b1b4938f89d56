use thiserror::Error;

/// Failures reported by the rasterization or OCR collaborators
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    #[error("Page {0} does not exist")]
    PageOutOfRange(usize),

    #[error("Rasterization failed: {0}")]
    Rasterization(String),

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("Collaborator is unavailable")]
    Unavailable,
}

/// Errors surfaced by editor operations.
///
/// Every variant is reported to the user through a notification on the event bus.
/// None of them leave the scene partially mutated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EditorError {
    /// The input was rejected before any mutation was attempted
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File is too large ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// A collaborator call failed; the scene was left unchanged
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// The operation would break a document invariant
    #[error("Cannot delete the last page of a document")]
    LastPage,

    #[error("Cannot delete the last layer")]
    LastLayer,

    #[error("Page {0} does not exist")]
    NoSuchPage(usize),

    #[error("Layer {0} does not exist")]
    NoSuchLayer(String),

    #[error("No document is loaded")]
    NoDocument,

    #[error("No image is pending placement")]
    NoPendingImage,

    #[error("Could not decode image: {0}")]
    ImageDecode(String),

    /// A page operation is already in flight
    #[error("Another page operation is still processing")]
    Busy,
}

/// Errors from path-addressed scene access
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Unknown scene path: {0}")]
    UnknownPath(String),

    #[error("Value at {path} has the wrong shape: {source}")]
    InvalidValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize scene: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type EditorResult<T> = Result<T, EditorError>;

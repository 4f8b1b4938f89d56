#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod collaborator;
pub mod config;
pub mod document;
pub mod element;
pub mod error;
pub mod event;
pub mod geometry;
pub mod history;
pub mod input;
pub mod layer;
pub mod renderer;
pub mod session;
pub mod state;
pub mod tools;
pub mod util;

pub use app::AnnotatorApp;
pub use collaborator::{Ocr, Rasterizer};
pub use config::EditorConfig;
pub use document::Document;
pub use error::{EditorError, EditorResult};
pub use event::{EditorEvent, EventBus};
pub use history::HistoryEngine;
pub use input::{InputEvent, InputLocation};
pub use session::{Completion, EditorSession};
pub use state::SceneState;
pub use tools::{Tool, ToolKind};

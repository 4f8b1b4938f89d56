use egui::{Color32, Rect};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormFieldKind {
    #[default]
    Text,
    Checkbox,
    Radio,
    Dropdown,
    Signature,
}

impl FormFieldKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Dropdown => "dropdown",
            Self::Signature => "signature",
        }
    }
}

/// Interactive field exported as a form widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFieldObject {
    pub rect: Rect,
    pub kind: FormFieldKind,
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    pub border: Color32,
    pub font_size: f32,
}

impl FormFieldObject {
    pub fn new(rect: Rect, kind: FormFieldKind, name: impl Into<String>) -> Self {
        Self {
            rect,
            kind,
            name: name.into(),
            value: String::new(),
            options: Vec::new(),
            required: false,
            border: Color32::from_rgb(40, 90, 200),
            font_size: 12.0,
        }
    }
}

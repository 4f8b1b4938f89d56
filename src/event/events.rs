use crate::element::ObjectId;
use crate::tools::ToolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Every topic observable by UI chrome
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    DocumentLoaded {
        name: String,
        page_count: usize,
    },
    DocumentSaved {
        name: String,
    },
    PageChanged {
        page: usize,
    },
    PagesChanged {
        page_count: usize,
    },
    ZoomChanged {
        zoom: f32,
    },
    SelectionChanged {
        selected: Vec<ObjectId>,
    },
    ObjectAdded {
        id: ObjectId,
        page: usize,
    },
    ObjectUpdated {
        id: ObjectId,
        page: usize,
    },
    ObjectDeleted {
        id: ObjectId,
        page: usize,
    },
    /// A page's background fill changed
    BackgroundChanged {
        page: usize,
    },
    LayersChanged,
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
        label: Option<String>,
    },
    ToolChanged {
        old: ToolKind,
        new: ToolKind,
    },
    ProcessingChanged {
        processing: bool,
    },
    /// User-visible report of a rejected or failed operation
    Notification {
        level: NotificationLevel,
        message: String,
    },
}

impl EditorEvent {
    /// Page whose rendered content this event changed, if any
    pub fn affected_page(&self) -> Option<usize> {
        match self {
            Self::ObjectAdded { page, .. }
            | Self::ObjectUpdated { page, .. }
            | Self::ObjectDeleted { page, .. }
            | Self::BackgroundChanged { page } => Some(*page),
            _ => None,
        }
    }
}

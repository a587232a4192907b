use serde::{Deserialize, Serialize};

use crate::field::field_model::FieldDetail;
use crate::table::span::GroupLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Form,
    Section,
    Frame,
    FieldName,
    Reason,
    Identifier,
    Visible,
    Part,
    Confidence,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Form,
        Column::Section,
        Column::Frame,
        Column::FieldName,
        Column::Reason,
        Column::Identifier,
        Column::Visible,
        Column::Part,
        Column::Confidence,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::Form => "Form",
            Column::Section => "Section",
            Column::Frame => "Frame",
            Column::FieldName => "FieldName",
            Column::Reason => "Reason",
            Column::Identifier => "Id/Name",
            Column::Visible => "Visible",
            Column::Part => "Part",
            Column::Confidence => "Confidence",
        }
    }

    /// DOM id used by the HTML rendering
    pub fn id(&self) -> &'static str {
        match self {
            Column::Form => "col-form",
            Column::Section => "col-section",
            Column::Frame => "col-frame",
            Column::FieldName => "col-fieldName",
            Column::Reason => "col-reason",
            Column::Identifier => "col-identifier",
            Column::Visible => "col-isVisible",
            Column::Part => "col-part",
            Column::Confidence => "col-confidence",
        }
    }

    pub fn group_level(&self) -> Option<GroupLevel> {
        match self {
            Column::Form => Some(GroupLevel::Form),
            Column::Section => Some(GroupLevel::Section),
            Column::Frame => Some(GroupLevel::Frame),
            _ => None,
        }
    }

    pub fn value(&self, field: &FieldDetail) -> String {
        match self {
            Column::Form => field.form_index.map(|i| i.to_string()).unwrap_or_default(),
            Column::Section => field.section_index.map(|i| i.to_string()).unwrap_or_default(),
            Column::Frame => field.frame.clone().unwrap_or_default(),
            Column::FieldName => field.field_name.clone(),
            Column::Reason => field.reason.clone(),
            Column::Identifier => field.identifier.clone().unwrap_or_default(),
            Column::Visible => field.is_visible.to_string(),
            Column::Part => field.part.map(|p| p.to_string()).unwrap_or_default(),
            Column::Confidence => field.confidence.map(|c| format!("{:.2}", c)).unwrap_or_default(),
        }
    }
}

/// Handle of a rendered row. Only valid for the render that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionIcon {
    Address,
    CreditCard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub column: Column,
    pub text: String,
    pub row_span: usize,

    /// Field name differs from the edit-session baseline
    pub changed: bool,
    pub invisible: bool,
    pub icon: Option<SectionIcon>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowView {
    Display,
    Editing { options: Vec<String>, selected: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub inspect_id: String,
    pub cells: Vec<Cell>,

    pub invisible: bool,
    pub unknown: bool,
    /// Every second section gets an alternate stripe
    pub alternate_section: bool,
    pub selected: bool,
    pub view: RowView,
}

impl Row {
    pub fn cell(&self, column: Column) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column == column)
    }

    pub(crate) fn cell_mut(&mut self, column: Column) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.column == column)
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.view, RowView::Editing { .. })
    }
}

/// Overlay kind drawn on the page. Hover overlays follow the pointer; select
/// overlays stay until the row is clicked again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Hover,
    Select,
}

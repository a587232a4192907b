use serde::{Deserialize, Serialize};

use crate::field::field_model::{FieldDetail, FieldOverride, lenient_field_details};
use crate::table::table_model::HighlightKind;

/// Request sent from the panel to the background context (one JSON object,
/// discriminated by `msg`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "kebab-case")]
pub enum PanelRequest {
    /// Tag every inspectable element of the tab; answered by `tag-complete`
    #[serde(rename_all = "camelCase")]
    TagElements { tab_id: u64, cycle: u64 },

    /// Run the classifier; answered by `inspect-complete` or `inspect-failed`
    #[serde(rename_all = "camelCase")]
    Inspect {
        tab_id: u64,
        changes: Vec<FieldOverride>,
        cycle: u64,
    },

    #[serde(rename_all = "camelCase")]
    Highlight {
        tab_id: u64,
        #[serde(rename = "type")]
        kind: HighlightKind,
        field_details: Vec<FieldDetail>,
    },

    #[serde(rename_all = "camelCase")]
    RemoveHighlight {
        tab_id: u64,
        #[serde(rename = "type")]
        kind: HighlightKind,
        field_details: Vec<FieldDetail>,
    },

    #[serde(rename_all = "camelCase")]
    ScrollTo { tab_id: u64, field_detail: FieldDetail },

    #[serde(rename_all = "camelCase")]
    SetTestRecords {
        tab_id: u64,
        address: bool,
        creditcard: bool,
    },

    #[serde(rename_all = "camelCase")]
    DownloadPage {
        tab_id: u64,
        field_details: Vec<FieldDetail>,
    },

    #[serde(rename_all = "camelCase")]
    GenerateReport {
        tab_id: u64,
        panel_data_url: String,
        field_details: Vec<FieldDetail>,
    },

    #[serde(rename_all = "camelCase")]
    ExportInspect { tab_id: u64, panel_data_url: String },
}

impl PanelRequest {
    pub fn tab_id(&self) -> u64 {
        match self {
            PanelRequest::TagElements { tab_id, .. }
            | PanelRequest::Inspect { tab_id, .. }
            | PanelRequest::Highlight { tab_id, .. }
            | PanelRequest::RemoveHighlight { tab_id, .. }
            | PanelRequest::ScrollTo { tab_id, .. }
            | PanelRequest::SetTestRecords { tab_id, .. }
            | PanelRequest::DownloadPage { tab_id, .. }
            | PanelRequest::GenerateReport { tab_id, .. }
            | PanelRequest::ExportInspect { tab_id, .. } => *tab_id,
        }
    }

    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            PanelRequest::TagElements { .. } => "tag-elements",
            PanelRequest::Inspect { .. } => "inspect",
            PanelRequest::Highlight { .. } => "highlight",
            PanelRequest::RemoveHighlight { .. } => "remove-highlight",
            PanelRequest::ScrollTo { .. } => "scroll-to",
            PanelRequest::SetTestRecords { .. } => "set-test-records",
            PanelRequest::DownloadPage { .. } => "download-page",
            PanelRequest::GenerateReport { .. } => "generate-report",
            PanelRequest::ExportInspect { .. } => "export-inspect",
        }
    }
}

/// Message sent from the background context to the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "kebab-case")]
pub enum BackgroundMessage {
    #[serde(rename_all = "camelCase")]
    TagComplete { tab_id: u64, cycle: u64, tagged: usize },

    #[serde(rename_all = "camelCase")]
    InspectComplete {
        tab_id: u64,
        cycle: u64,
        #[serde(deserialize_with = "lenient_field_details")]
        data: Vec<FieldDetail>,
    },

    #[serde(rename_all = "camelCase")]
    InspectFailed { tab_id: u64, cycle: u64, error: String },

    #[serde(rename_all = "camelCase")]
    NotifyProgress { tab_id: u64, progress: String },
}

impl BackgroundMessage {
    pub fn tab_id(&self) -> u64 {
        match self {
            BackgroundMessage::TagComplete { tab_id, .. }
            | BackgroundMessage::InspectComplete { tab_id, .. }
            | BackgroundMessage::InspectFailed { tab_id, .. }
            | BackgroundMessage::NotifyProgress { tab_id, .. } => *tab_id,
        }
    }

    pub fn progress(tab_id: u64, progress: impl ToString) -> Self {
        BackgroundMessage::NotifyProgress {
            tab_id,
            progress: progress.to_string(),
        }
    }
}

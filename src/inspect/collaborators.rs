use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::InspectorError;
use crate::field::field_model::{FieldDetail, FieldOverride};
use crate::table::table_model::HighlightKind;
use crate::tagger::identity::TagSelector;

/// A document frame of a tab, as the navigation layer reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    pub frame_id: i64,
    /// -1 for the main frame
    pub parent_frame_id: i64,
    pub url: String,
}

impl FrameInfo {
    pub fn is_main(&self) -> bool {
        self.parent_frame_id < 0
    }
}

/// The field classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify every tagged field of the tab, applying `changes` as forced
    /// field names. The result is ordered so that fields of one form, section
    /// and frame are contiguous.
    async fn inspect(
        &self,
        tab_id: u64,
        changes: &[FieldOverride],
    ) -> Result<Vec<FieldDetail>, InspectorError>;

    /// Make the given address and credit card records available to autofill
    /// in the tab.
    async fn set_test_records(&self, tab_id: u64, records: &[Value]) -> Result<(), InspectorError> {
        debug!(tab_id, count = records.len(), "classifier ignores test records");
        Ok(())
    }
}

/// Page-side operations the background performs on behalf of the panel.
#[async_trait]
pub trait PageAgent: Send + Sync {
    async fn frames(&self, tab_id: u64) -> Result<Vec<FrameInfo>, InspectorError>;

    /// Host name of the tab's top-level document.
    async fn host(&self, tab_id: u64) -> Result<String, InspectorError>;

    /// Give every element matching `selector` an inspect id, in all frames.
    /// Returns how many elements were newly tagged.
    async fn tag_elements(&self, tab_id: u64, selector: &TagSelector) -> Result<usize, InspectorError>;

    async fn add_highlight(
        &self,
        tab_id: u64,
        frame_id: i64,
        kind: HighlightKind,
        inspect_ids: &[String],
    ) -> Result<(), InspectorError>;

    async fn remove_highlight(
        &self,
        tab_id: u64,
        frame_id: i64,
        kind: HighlightKind,
        inspect_ids: &[String],
    ) -> Result<(), InspectorError>;

    async fn remove_all_highlights(&self, tab_id: u64) -> Result<(), InspectorError>;

    /// Scroll the element into view, unless it is already inside the viewport.
    async fn scroll_into_view(&self, tab_id: u64, frame_id: i64, inspect_id: &str) -> Result<(), InspectorError>;

    /// Record each field's type on its element (`data-moz-autofill-type`)
    /// before the frame is frozen.
    async fn annotate_field_types(
        &self,
        tab_id: u64,
        frame_id: i64,
        fields: &[(String, String)],
    ) -> Result<(), InspectorError>;

    /// Serialize the frame into self-contained HTML.
    async fn freeze_frame(&self, tab_id: u64, frame: &FrameInfo) -> Result<String, InspectorError>;

    /// Full-page capture, as a data URL.
    async fn capture_screenshot(&self, tab_id: u64) -> Result<String, InspectorError>;
}

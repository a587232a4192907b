use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An element of an inspected document, reduced to what tagging and
/// classification need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageElement {
    pub local_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Index of the owning form in document order, if any
    #[serde(default)]
    pub form: Option<usize>,
}

impl PageElement {
    pub fn new(local_name: &str) -> Self {
        Self {
            local_name: local_name.to_string(),
            attributes: BTreeMap::new(),
            visible: true,
            form: None,
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn in_form(mut self, form: usize) -> Self {
        self.form = Some(form);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// One document of a tab: the main frame or an iframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDocument {
    pub frame_id: i64,
    /// -1 for the main frame
    pub parent_frame_id: i64,
    pub browsing_context_id: u64,
    pub url: String,
    #[serde(default)]
    pub elements: Vec<PageElement>,
}

impl FrameDocument {
    pub fn is_main(&self) -> bool {
        self.parent_frame_id < 0
    }
}

fn default_true() -> bool {
    true
}

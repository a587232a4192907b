use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tagger::page_model::FrameDocument;

/// Attribute carrying the synthetic element identity. The classifier reports
/// this value back as `inspectId`.
pub const INSPECT_ATTRIBUTE: &str = "data-moz-autofill-inspect-id";

/// Which elements get an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSelector {
    #[serde(default = "default_true")]
    pub include_iframes: bool,
    #[serde(default)]
    pub include_textareas: bool,
}

impl Default for TagSelector {
    fn default() -> Self {
        Self {
            include_iframes: true,
            include_textareas: false,
        }
    }
}

impl TagSelector {
    pub fn matches(&self, local_name: &str) -> bool {
        match local_name {
            "input" | "select" => true,
            "iframe" => self.include_iframes,
            "textarea" => self.include_textareas,
            _ => false,
        }
    }

    /// The CSS selector the page side runs with.
    pub fn css(&self) -> String {
        let mut parts = vec!["input", "select"];
        if self.include_iframes {
            parts.push("iframe");
        }
        if self.include_textareas {
            parts.push("textarea");
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityTagger {
    pub selector: TagSelector,
}

impl IdentityTagger {
    pub fn new(selector: TagSelector) -> Self {
        Self { selector }
    }

    /// Give every matching element without an identity a fresh one.
    /// Elements that already carry one keep it. Returns how many were tagged.
    pub fn ensure_tagged(&self, frames: &mut [FrameDocument]) -> usize {
        let mut tagged = 0;
        for frame in frames.iter_mut() {
            for element in frame.elements.iter_mut() {
                if !self.selector.matches(&element.local_name) {
                    continue;
                }
                let has_identity = element
                    .attribute(INSPECT_ATTRIBUTE)
                    .is_some_and(|v| !v.is_empty());
                if has_identity {
                    continue;
                }
                element
                    .attributes
                    .insert(INSPECT_ATTRIBUTE.to_string(), Uuid::new_v4().to_string());
                tagged += 1;
            }
        }
        tagged
    }
}

/// CSS selector locating the element with the given identity.
pub fn element_selector(inspect_id: &str) -> String {
    format!("[{}=\"{}\"]", INSPECT_ATTRIBUTE, inspect_id)
}

fn default_true() -> bool {
    true
}

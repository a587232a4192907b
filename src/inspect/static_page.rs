use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::InspectorError;
use crate::field::field_model::{FieldDetail, FieldOverride};
use crate::field::vocabulary::is_known_field_name;
use crate::inspect::collaborators::{Classifier, FrameInfo, PageAgent};
use crate::table::html::escape_html;
use crate::table::table_model::HighlightKind;
use crate::tagger::identity::{INSPECT_ATTRIBUTE, IdentityTagger, TagSelector};
use crate::tagger::page_model::{FrameDocument, PageElement};

/// Attribute carrying the classified type in frozen pages.
pub const FIELD_TYPE_ATTRIBUTE: &str = "data-moz-autofill-type";

/// 1x1 transparent PNG.
const BLANK_SCREENSHOT: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub kind: HighlightKind,
    pub frame_id: i64,
    pub inspect_id: String,
}

/// An in-memory tab: a list of frame documents plus the overlays, scrolls and
/// test records applied to it. Used by the fixture-driven CLI and in tests.
pub struct StaticPage {
    tab_id: u64,
    frames: Mutex<Vec<FrameDocument>>,
    overlays: Mutex<Vec<Overlay>>,
    scrolled: Mutex<Vec<String>>,
    test_records: Mutex<Vec<Value>>,
}

impl StaticPage {
    pub fn new(tab_id: u64, frames: Vec<FrameDocument>) -> Self {
        Self {
            tab_id,
            frames: Mutex::new(frames),
            overlays: Mutex::new(Vec::new()),
            scrolled: Mutex::new(Vec::new()),
            test_records: Mutex::new(Vec::new()),
        }
    }

    /// Load the frame documents from a JSON file (an array of frames).
    pub fn from_file(tab_id: u64, path: &str) -> Result<Self, InspectorError> {
        let content = std::fs::read_to_string(path).map_err(|e| InspectorError::Io {
            context: format!("reading page '{}'", path),
            source: e,
        })?;
        let frames: Vec<FrameDocument> =
            serde_json::from_str(&content).map_err(|e| InspectorError::JsonParse {
                context: path.to_string(),
                source: e,
            })?;
        Ok(Self::new(tab_id, frames))
    }

    pub fn tab_id(&self) -> u64 {
        self.tab_id
    }

    pub fn documents(&self) -> Result<Vec<FrameDocument>, InspectorError> {
        Ok(lock(&self.frames)?.clone())
    }

    pub fn overlays(&self) -> Result<Vec<Overlay>, InspectorError> {
        Ok(lock(&self.overlays)?.clone())
    }

    pub fn scrolled(&self) -> Result<Vec<String>, InspectorError> {
        Ok(lock(&self.scrolled)?.clone())
    }

    pub fn test_records(&self) -> Result<Vec<Value>, InspectorError> {
        Ok(lock(&self.test_records)?.clone())
    }

    pub fn set_test_records(&self, records: &[Value]) -> Result<(), InspectorError> {
        *lock(&self.test_records)? = records.to_vec();
        Ok(())
    }

    fn check_tab(&self, tab_id: u64) -> Result<(), InspectorError> {
        if tab_id == self.tab_id {
            Ok(())
        } else {
            Err(InspectorError::PageAgent(format!("no such tab: {}", tab_id)))
        }
    }

    fn main_url(&self) -> Result<Url, InspectorError> {
        let frames = lock(&self.frames)?;
        let main = frames
            .iter()
            .find(|f| f.is_main())
            .ok_or_else(|| InspectorError::PageAgent("page has no main frame".into()))?;
        Url::parse(&main.url)
            .map_err(|e| InspectorError::PageAgent(format!("invalid url '{}': {}", main.url, e)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, InspectorError> {
    mutex
        .lock()
        .map_err(|e| InspectorError::PageAgent(format!("page state poisoned: {}", e)))
}

#[async_trait]
impl PageAgent for StaticPage {
    async fn frames(&self, tab_id: u64) -> Result<Vec<FrameInfo>, InspectorError> {
        self.check_tab(tab_id)?;
        Ok(lock(&self.frames)?
            .iter()
            .map(|f| FrameInfo {
                frame_id: f.frame_id,
                parent_frame_id: f.parent_frame_id,
                url: f.url.clone(),
            })
            .collect())
    }

    async fn host(&self, tab_id: u64) -> Result<String, InspectorError> {
        self.check_tab(tab_id)?;
        let url = self.main_url()?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| InspectorError::PageAgent(format!("url '{}' has no host", url)))
    }

    async fn tag_elements(&self, tab_id: u64, selector: &TagSelector) -> Result<usize, InspectorError> {
        self.check_tab(tab_id)?;
        let mut frames = lock(&self.frames)?;
        let tagged = IdentityTagger::new(*selector).ensure_tagged(&mut frames);
        debug!(tab_id, tagged, "tagged elements");
        Ok(tagged)
    }

    async fn add_highlight(
        &self,
        tab_id: u64,
        frame_id: i64,
        kind: HighlightKind,
        inspect_ids: &[String],
    ) -> Result<(), InspectorError> {
        self.check_tab(tab_id)?;
        let mut overlays = lock(&self.overlays)?;
        for id in inspect_ids {
            let overlay = Overlay {
                kind,
                frame_id,
                inspect_id: id.clone(),
            };
            if !overlays.contains(&overlay) {
                overlays.push(overlay);
            }
        }
        Ok(())
    }

    async fn remove_highlight(
        &self,
        tab_id: u64,
        frame_id: i64,
        kind: HighlightKind,
        inspect_ids: &[String],
    ) -> Result<(), InspectorError> {
        self.check_tab(tab_id)?;
        lock(&self.overlays)?.retain(|o| {
            !(o.kind == kind && o.frame_id == frame_id && inspect_ids.contains(&o.inspect_id))
        });
        Ok(())
    }

    async fn remove_all_highlights(&self, tab_id: u64) -> Result<(), InspectorError> {
        self.check_tab(tab_id)?;
        lock(&self.overlays)?.clear();
        Ok(())
    }

    async fn scroll_into_view(&self, tab_id: u64, frame_id: i64, inspect_id: &str) -> Result<(), InspectorError> {
        self.check_tab(tab_id)?;
        let found = lock(&self.frames)?
            .iter()
            .filter(|f| f.frame_id == frame_id)
            .flat_map(|f| &f.elements)
            .any(|e| e.attribute(INSPECT_ATTRIBUTE) == Some(inspect_id));
        // A stale id is not an error: the element may have gone away.
        if found {
            lock(&self.scrolled)?.push(inspect_id.to_string());
        }
        Ok(())
    }

    async fn annotate_field_types(
        &self,
        tab_id: u64,
        frame_id: i64,
        fields: &[(String, String)],
    ) -> Result<(), InspectorError> {
        self.check_tab(tab_id)?;
        let mut frames = lock(&self.frames)?;
        for frame in frames.iter_mut().filter(|f| f.frame_id == frame_id) {
            for element in frame.elements.iter_mut() {
                let Some(id) = element.attribute(INSPECT_ATTRIBUTE) else {
                    continue;
                };
                if let Some((_, field_name)) = fields.iter().find(|(inspect_id, _)| inspect_id == id) {
                    element
                        .attributes
                        .insert(FIELD_TYPE_ATTRIBUTE.to_string(), field_name.clone());
                }
            }
        }
        Ok(())
    }

    async fn freeze_frame(&self, tab_id: u64, frame: &FrameInfo) -> Result<String, InspectorError> {
        self.check_tab(tab_id)?;
        let frames = lock(&self.frames)?;
        let document = frames
            .iter()
            .find(|f| f.frame_id == frame.frame_id)
            .ok_or_else(|| InspectorError::PageAgent(format!("no such frame: {}", frame.frame_id)))?;
        Ok(serialize_document(document))
    }

    async fn capture_screenshot(&self, tab_id: u64) -> Result<String, InspectorError> {
        self.check_tab(tab_id)?;
        Ok(BLANK_SCREENSHOT.to_string())
    }
}

fn serialize_document(document: &FrameDocument) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta http-equiv=\"Content-Security-Policy\" content=\"frame-src https:\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&document.url)));
    html.push_str("</head>\n<body>\n");
    for element in &document.elements {
        html.push_str(&serialize_element(element));
        html.push('\n');
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn serialize_element(element: &PageElement) -> String {
    let mut tag = format!("<{}", element.local_name);
    for (name, value) in &element.attributes {
        tag.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
    }
    if !element.visible {
        tag.push_str(" hidden");
    }
    tag.push('>');
    if element.local_name != "input" {
        tag.push_str(&format!("</{}>", element.local_name));
    }
    tag
}

// ============================================================================
// Autocomplete classifier
// ============================================================================

/// Classifies the fields of a [`StaticPage`] from their `autocomplete`
/// attribute. Only tagged elements are reported.
pub struct AutocompleteClassifier {
    page: Arc<StaticPage>,
}

impl AutocompleteClassifier {
    pub fn new(page: Arc<StaticPage>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl Classifier for AutocompleteClassifier {
    async fn inspect(
        &self,
        tab_id: u64,
        changes: &[FieldOverride],
    ) -> Result<Vec<FieldDetail>, InspectorError> {
        self.page
            .check_tab(tab_id)
            .map_err(|e| InspectorError::Classifier(e.to_string()))?;

        let main_url = self.page.main_url()?;
        let documents = self.page.documents()?;

        // Form indices run across the whole tab, frame by frame.
        let mut result = Vec::new();
        let mut form_offset = 0;
        for document in documents.iter() {
            let label = frame_label(document, &main_url);
            let (mut fields, forms) = classify_document(document, form_offset, &label, changes);
            assign_sections(&mut fields);
            form_offset += forms;
            result.extend(fields);
        }

        debug!(tab_id, fields = result.len(), overrides = changes.len(), "classified page");
        Ok(result)
    }

    async fn set_test_records(&self, tab_id: u64, records: &[Value]) -> Result<(), InspectorError> {
        self.page
            .check_tab(tab_id)
            .map_err(|e| InspectorError::Classifier(e.to_string()))?;
        self.page.set_test_records(records)
    }
}

/// `(M) host` for the main frame, `(S) host` for a same-origin iframe,
/// `(C) host` for a cross-origin one.
pub fn frame_label(document: &FrameDocument, main_url: &Url) -> String {
    let url = Url::parse(&document.url).ok();
    let host = url
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or_default()
        .to_string();

    if document.is_main() {
        format!("(M) {}", host)
    } else if url.is_some_and(|u| u.origin() == main_url.origin()) {
        format!("(S) {}", host)
    } else {
        format!("(C) {}", host)
    }
}

/// Classify the tagged inputs of one frame. Returns the fields and the
/// number of forms they occupy, numbered from `form_offset`.
fn classify_document(
    document: &FrameDocument,
    form_offset: usize,
    label: &str,
    changes: &[FieldOverride],
) -> (Vec<FieldDetail>, usize) {
    // Formless fields share one pseudo form after the real ones.
    let formless = document
        .elements
        .iter()
        .filter_map(|e| e.form)
        .max()
        .map_or(0, |max| max + 1);

    let mut fields: Vec<FieldDetail> = document
        .elements
        .iter()
        .filter(|e| e.local_name != "iframe")
        .filter_map(|element| {
            let inspect_id = element.attribute(INSPECT_ATTRIBUTE)?;
            let forced = changes.iter().find(|c| c.inspect_id == inspect_id);
            let autocomplete = element
                .attribute("autocomplete")
                .filter(|v| is_known_field_name(v));

            let (field_name, reason) = match (forced, autocomplete) {
                (Some(change), _) => (change.field_name.clone(), "update-heuristic"),
                (None, Some(name)) => (name.to_string(), "autocomplete"),
                (None, None) => (String::new(), ""),
            };

            let mut field = FieldDetail::new(inspect_id, &field_name)
                .in_frame(document.frame_id, document.browsing_context_id);
            field.form_index = Some(element.form.unwrap_or(formless));
            field.reason = reason.to_string();
            field.is_visible = element.visible;
            field.frame = Some(label.to_string());
            field.identifier = element
                .attribute("id")
                .or_else(|| element.attribute("name"))
                .map(str::to_string);
            field.local_name = Some(element.local_name.clone());
            Some(field)
        })
        .collect();

    // Stable: document order is kept inside each form.
    fields.sort_by_key(|f| f.form_index);

    let mut forms = 0;
    let mut previous = None;
    for field in fields.iter_mut() {
        if previous != field.form_index {
            previous = field.form_index;
            forms += 1;
        }
        field.form_index = Some(form_offset + forms - 1);
    }
    (fields, forms)
}

// A new section starts inside a form whenever the field category switches
// between credit card and address. Unknown fields stay in the current section.
fn assign_sections(fields: &mut [FieldDetail]) {
    let mut sections: BTreeMap<Option<usize>, (usize, Option<bool>)> = BTreeMap::new();
    for field in fields.iter_mut() {
        let entry = sections.entry(field.form_index).or_insert((0, None));
        if !field.is_unknown() {
            let category = field.is_credit_card();
            match entry.1 {
                Some(previous) if previous != category => {
                    entry.0 += 1;
                    entry.1 = Some(category);
                }
                None => entry.1 = Some(category),
                _ => {}
            }
        }
        field.section_index = Some(entry.0);
    }
}

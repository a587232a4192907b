#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use autofill_inspector::error::InspectorError;
use autofill_inspector::field::field_model::FieldDetail;
use autofill_inspector::inspect::background::Background;
use autofill_inspector::inspect::panel::Panel;
use autofill_inspector::inspect::static_page::{AutocompleteClassifier, StaticPage};
use autofill_inspector::messaging::channel::{Messenger, message_channel, request_channel};
use autofill_inspector::messaging::protocol::{BackgroundMessage, PanelRequest};
use autofill_inspector::tagger::page_model::{FrameDocument, PageElement};
use tokio::sync::mpsc;

pub const TAB: u64 = 7;

/// A field in the main frame of browsing context 1.
pub fn field(id: &str, name: &str, form: usize, section: usize) -> FieldDetail {
    FieldDetail::new(id, name).in_group(form, section).in_frame(0, 1)
}

/// Address section, then a credit card section of the same form, then a
/// second form.
pub fn sample_fields() -> Vec<FieldDetail> {
    vec![
        field("a1", "given-name", 0, 0),
        field("a2", "family-name", 0, 0),
        field("a3", "email", 0, 0),
        field("c1", "cc-number", 0, 1),
        field("c2", "cc-exp", 0, 1),
        field("b1", "tel", 1, 0),
    ]
}

/// Messenger that only records what was sent.
#[derive(Clone, Default)]
pub struct RecordingMessenger {
    sent: Arc<Mutex<Vec<PanelRequest>>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<PanelRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.sent().iter().filter(|r| r.name() == name).count()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Messenger for RecordingMessenger {
    fn send(&self, request: PanelRequest) -> Result<(), InspectorError> {
        self.sent.lock().unwrap().push(request);
        Ok(())
    }
}

/// Checkout page: a main frame with a contact form and a cross-origin payment
/// iframe holding the card fields.
pub fn checkout_frames() -> Vec<FrameDocument> {
    vec![
        FrameDocument {
            frame_id: 0,
            parent_frame_id: -1,
            browsing_context_id: 1,
            url: "https://shop.example.com/checkout".into(),
            elements: vec![
                PageElement::new("input")
                    .with_attribute("id", "first")
                    .with_attribute("autocomplete", "given-name")
                    .in_form(0),
                PageElement::new("input")
                    .with_attribute("id", "last")
                    .with_attribute("autocomplete", "family-name")
                    .in_form(0),
                PageElement::new("input")
                    .with_attribute("name", "mail")
                    .with_attribute("autocomplete", "email")
                    .in_form(0),
                PageElement::new("input").with_attribute("name", "coupon").in_form(0),
                PageElement::new("iframe").with_attribute("src", "https://pay.example.net/card"),
            ],
        },
        FrameDocument {
            frame_id: 5,
            parent_frame_id: 0,
            browsing_context_id: 2,
            url: "https://pay.example.net/card".into(),
            elements: vec![
                PageElement::new("input")
                    .with_attribute("id", "number")
                    .with_attribute("autocomplete", "cc-number")
                    .in_form(0),
                PageElement::new("input")
                    .with_attribute("id", "exp")
                    .with_attribute("autocomplete", "cc-exp")
                    .in_form(0),
            ],
        },
    ]
}

pub struct Harness {
    pub panel: Panel,
    pub incoming: mpsc::UnboundedReceiver<BackgroundMessage>,
    pub page: Arc<StaticPage>,
}

/// Panel wired to an in-process background serving `frames`.
pub fn harness(frames: Vec<FrameDocument>, output_dir: &std::path::Path) -> Harness {
    let page = Arc::new(StaticPage::new(TAB, frames));
    let classifier = Arc::new(AutocompleteClassifier::new(page.clone()));

    let (messenger, requests) = request_channel();
    let (message_tx, incoming) = message_channel();
    let background = Background::new(classifier, page.clone(), message_tx)
        .with_output_dir(output_dir)
        .with_records_dir(output_dir);
    tokio::spawn(background.run(requests));

    Harness {
        panel: Panel::new(TAB, Box::new(messenger)),
        incoming,
        page,
    }
}

impl Harness {
    /// Handle messages until no inspect cycle is outstanding.
    pub async fn settle(&mut self) {
        while self.panel.orchestrator().is_pending() {
            let open = self.panel.pump(&mut self.incoming).await.unwrap();
            assert!(open, "background hung up during an inspect cycle");
        }
    }
}

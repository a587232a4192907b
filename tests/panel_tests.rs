use std::time::Duration;

use autofill_inspector::inspect::panel::Panel;
use autofill_inspector::inspect::static_page::{FIELD_TYPE_ATTRIBUTE, Overlay};
use autofill_inspector::messaging::protocol::BackgroundMessage;
use autofill_inspector::table::filter::FilterOptions;
use autofill_inspector::table::renderer::EditToggle;
use autofill_inspector::table::table_model::{Column, HighlightKind, RowId};
use autofill_inspector::tagger::identity::INSPECT_ATTRIBUTE;
use autofill_inspector::tagger::page_model::{FrameDocument, PageElement};

use crate::common::{Harness, RecordingMessenger, TAB, checkout_frames, harness, sample_fields};

mod common;

const PANEL_PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

fn id_of(panel: &Panel, identifier: &str) -> String {
    panel
        .store()
        .fields()
        .iter()
        .find(|f| f.identifier.as_deref() == Some(identifier))
        .map(|f| f.inspect_id.clone())
        .unwrap_or_else(|| panic!("no field '{}'", identifier))
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}

async fn wait_for_saved(h: &mut Harness) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !h.panel.progress().is_some_and(|p| p.starts_with("saved")) {
            assert!(h.panel.pump(&mut h.incoming).await.unwrap());
        }
    })
    .await
    .expect("background never reported a saved export");
}

async fn inspected(dir: &std::path::Path) -> Harness {
    let mut h = harness(checkout_frames(), dir);
    h.panel.inspect().unwrap();
    h.settle().await;
    h
}

// ============================================================================
// Inspect cycle
// ============================================================================

#[tokio::test]
async fn inspect_renders_classified_fields() {
    let dir = tempfile::tempdir().unwrap();
    let h = inspected(dir.path()).await;

    assert_eq!(h.panel.store().fields().len(), 6);
    assert_eq!(h.panel.status(), None);
    assert!(h.panel.orchestrator().is_fresh());

    // The unclassified coupon field is hidden by default
    let names: Vec<&str> = h
        .panel
        .table()
        .rows()
        .iter()
        .map(|r| r.cell(Column::FieldName).unwrap().text.as_str())
        .collect();
    assert_eq!(names, vec!["given-name", "family-name", "email", "cc-number", "cc-exp"]);

    let rows = h.panel.table().rows();
    assert_eq!(rows[0].cell(Column::Frame).unwrap().text, "(M) shop.example.com");
    assert_eq!(rows[0].cell(Column::Frame).unwrap().row_span, 3);
    assert_eq!(rows[3].cell(Column::Frame).unwrap().text, "(C) pay.example.net");
    assert_eq!(rows[0].cell(Column::Reason).unwrap().text, "autocomplete");
    assert_eq!(rows[2].cell(Column::Identifier).unwrap().text, "mail");

    // Forms are numbered across the tab, so the iframe form is its own group
    assert_eq!(rows[0].cell(Column::Form).unwrap().text, "0");
    assert_eq!(rows[0].cell(Column::Form).unwrap().row_span, 3);
    assert_eq!(rows[3].cell(Column::Form).unwrap().text, "1");
    assert_eq!(rows[3].cell(Column::Form).unwrap().row_span, 2);
}

#[tokio::test]
async fn every_inspectable_element_gets_tagged() {
    let dir = tempfile::tempdir().unwrap();
    let h = inspected(dir.path()).await;

    for frame in h.page.documents().unwrap() {
        for element in frame.elements {
            assert!(
                element.attribute(INSPECT_ATTRIBUTE).is_some(),
                "{} in frame {} was not tagged",
                element.local_name,
                frame.frame_id
            );
        }
    }
}

#[tokio::test]
async fn showing_unknown_fields_rerenders() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = inspected(dir.path()).await;

    h.panel.set_filter(FilterOptions {
        show_invisible: false,
        show_unknown: true,
    });
    assert_eq!(h.panel.table().rows().len(), 6);
    assert!(h.panel.table().rows()[3].unknown);
}

#[tokio::test]
async fn classifier_failure_sets_status() {
    let dir = tempfile::tempdir().unwrap();
    // No main frame: tagging works, classification does not
    let frames = vec![FrameDocument {
        frame_id: 3,
        parent_frame_id: 0,
        browsing_context_id: 3,
        url: "https://orphan.example.com/".into(),
        elements: vec![PageElement::new("input")],
    }];
    let mut h = harness(frames, dir.path());

    h.panel.inspect().unwrap();
    h.settle().await;

    assert_eq!(h.panel.status(), Some("inspection failed"));
    assert!(h.panel.table().rows().is_empty());
    assert!(!h.panel.orchestrator().is_fresh());
}

#[tokio::test]
async fn ensure_result_inspects_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(checkout_frames(), dir.path());

    h.panel.ensure_result(&mut h.incoming).await.unwrap();
    assert_eq!(h.panel.store().fields().len(), 6);

    // Already fresh: resolves without another cycle
    let cycle = h.panel.orchestrator().current_cycle();
    h.panel.ensure_result(&mut h.incoming).await.unwrap();
    assert_eq!(h.panel.orchestrator().current_cycle(), cycle);
}

#[test]
fn messages_for_other_tabs_are_ignored() {
    let messenger = RecordingMessenger::default();
    let mut panel = Panel::new(TAB, Box::new(messenger.clone()));
    let cycle = panel.inspect().unwrap();

    panel
        .handle_message(BackgroundMessage::TagComplete {
            tab_id: TAB + 1,
            cycle,
            tagged: 3,
        })
        .unwrap();
    panel
        .handle_message(BackgroundMessage::InspectComplete {
            tab_id: TAB + 1,
            cycle,
            data: sample_fields(),
        })
        .unwrap();

    assert_eq!(messenger.count("inspect"), 0);
    assert!(panel.store().is_empty());
    assert!(panel.orchestrator().is_pending());

    panel
        .handle_message(BackgroundMessage::progress(TAB, "freezing page"))
        .unwrap();
    assert_eq!(panel.progress(), Some("freezing page"));
}

// ============================================================================
// Highlights and selection
// ============================================================================

#[tokio::test]
async fn hover_highlights_the_frame_run_and_scrolls() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = inspected(dir.path()).await;
    let number = id_of(&h.panel, "number");
    let exp = id_of(&h.panel, "exp");

    h.panel.hover_enter(RowId(3), Column::Frame);
    let page = h.page.clone();
    eventually(|| page.overlays().unwrap().len() == 2).await;

    let overlays = h.page.overlays().unwrap();
    assert!(overlays.contains(&Overlay {
        kind: HighlightKind::Hover,
        frame_id: 5,
        inspect_id: number.clone(),
    }));
    assert!(overlays.contains(&Overlay {
        kind: HighlightKind::Hover,
        frame_id: 5,
        inspect_id: exp,
    }));
    assert_eq!(h.page.scrolled().unwrap(), vec![number]);

    h.panel.hover_leave(RowId(3), Column::Frame);
    eventually(|| page.overlays().unwrap().is_empty()).await;
}

#[tokio::test]
async fn click_selects_and_exposes_element_selector() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = inspected(dir.path()).await;
    let first = id_of(&h.panel, "first");

    h.panel.click(RowId(0), Column::FieldName);
    let page = h.page.clone();
    eventually(|| page.overlays().unwrap().len() == 1).await;
    assert_eq!(h.page.overlays().unwrap()[0].kind, HighlightKind::Select);

    assert_eq!(
        h.panel.inspect_element_selector(),
        Some(format!("[{}=\"{}\"]", INSPECT_ATTRIBUTE, first))
    );

    h.panel.click(RowId(0), Column::FieldName);
    eventually(|| page.overlays().unwrap().is_empty()).await;
    assert_eq!(h.panel.inspect_element_selector(), None);
}

#[tokio::test]
async fn reinspect_clears_page_highlights() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = inspected(dir.path()).await;

    h.panel.click(RowId(0), Column::Form);
    let page = h.page.clone();
    eventually(|| page.overlays().unwrap().len() == 3).await;

    h.panel.inspect().unwrap();
    h.settle().await;
    assert!(h.page.overlays().unwrap().is_empty());
}

// ============================================================================
// Editing
// ============================================================================

#[tokio::test]
async fn edits_are_applied_by_an_incremental_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = inspected(dir.path()).await;
    let mail = id_of(&h.panel, "mail");

    assert_eq!(
        h.panel.toggle_edit_mode(&mut h.incoming).await.unwrap(),
        EditToggle::Entered
    );
    assert!(h.panel.select_field_name(RowId(2), "tel"));
    assert_eq!(
        h.panel.toggle_edit_mode(&mut h.incoming).await.unwrap(),
        EditToggle::Exited { reinspect: true }
    );
    assert!(h.panel.orchestrator().is_pending());

    h.settle().await;

    let field = h.panel.store().field(&mail).unwrap();
    assert_eq!(field.field_name, "tel");
    assert_eq!(field.reason, "update-heuristic");
    assert_eq!(h.panel.store().overrides().len(), 1, "incremental inspect keeps edits");

    let cell = h.panel.table().rows()[2].cell(Column::FieldName).unwrap().clone();
    assert_eq!(cell.text, "tel");
    assert!(cell.changed);
}

#[tokio::test]
async fn manual_inspect_after_edits_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = inspected(dir.path()).await;

    h.panel.toggle_edit_mode(&mut h.incoming).await.unwrap();
    h.panel.select_field_name(RowId(0), "name");
    h.panel.toggle_edit_mode(&mut h.incoming).await.unwrap();
    h.settle().await;

    h.panel.inspect().unwrap();
    h.settle().await;

    assert!(h.panel.store().overrides().is_empty());
    let cell = h.panel.table().rows()[0].cell(Column::FieldName).unwrap().clone();
    assert_eq!(cell.text, "given-name");
    assert!(!cell.changed);
}

#[tokio::test]
async fn reverted_edit_does_not_reinspect() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = inspected(dir.path()).await;

    h.panel.toggle_edit_mode(&mut h.incoming).await.unwrap();
    h.panel.select_field_name(RowId(1), "name");
    h.panel.select_field_name(RowId(1), "family-name");
    let toggle = h.panel.toggle_edit_mode(&mut h.incoming).await.unwrap();

    assert_eq!(toggle, EditToggle::Exited { reinspect: false });
    assert!(!h.panel.orchestrator().is_pending());
}

// ============================================================================
// Test records and exports
// ============================================================================

#[tokio::test]
async fn test_records_reach_the_classifier() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("test-addresses.json"),
        r#"[{"given-name": "Jane", "family-name": "Doe"}]"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("test-credit-cards.json"),
        r#"[{"cc-number": "4111111111111111"}]"#,
    )
    .unwrap();

    let h = harness(checkout_frames(), dir.path());
    h.panel.set_test_records(true, true).unwrap();

    let page = h.page.clone();
    eventually(|| page.test_records().unwrap().len() == 2).await;
    let records = h.page.test_records().unwrap();
    assert_eq!(records[0]["given-name"], "Jane");
    assert_eq!(records[1]["cc-number"], "4111111111111111");
}

#[tokio::test]
async fn screenshot_writes_page_and_panel_images() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(checkout_frames(), dir.path());

    h.panel.screenshot(PANEL_PNG, &mut h.incoming).await.unwrap();
    wait_for_saved(&mut h).await;

    let screenshot = std::fs::read(dir.path().join("screenshot-shop.example.com.png")).unwrap();
    assert!(screenshot.starts_with(b"\x89PNG"));
    let panel = std::fs::read(dir.path().join("inspect-shop.example.com.png")).unwrap();
    assert_eq!(panel, b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn download_page_freezes_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = inspected(dir.path()).await;

    h.panel.download_page(&mut h.incoming).await.unwrap();
    wait_for_saved(&mut h).await;

    let bundle = dir.path().join("page-shop.example.com");
    let main = std::fs::read_to_string(bundle.join("shop.example.com.html")).unwrap();
    assert!(main.contains(r#"<iframe src="pay.example.net/0.html">"#), "got: {}", main);
    assert!(main.contains("frame-src 'self'"));
    assert!(!main.contains(INSPECT_ATTRIBUTE));
    assert!(main.contains(&format!("{}=\"given-name\"", FIELD_TYPE_ATTRIBUTE)));

    let card = std::fs::read_to_string(bundle.join("pay.example.net").join("0.html")).unwrap();
    assert!(card.contains(&format!("{}=\"cc-number\"", FIELD_TYPE_ATTRIBUTE)));
}

#[tokio::test]
async fn generate_report_writes_the_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(checkout_frames(), dir.path());

    h.panel.generate_report(PANEL_PNG, &mut h.incoming).await.unwrap();
    wait_for_saved(&mut h).await;

    let bundle = dir.path().join("report-shop.example.com");
    for file in [
        "screenshot-shop.example.com.png",
        "inspect-shop.example.com.png",
        "page/shop.example.com.html",
        "page/pay.example.net/0.html",
        "test/shop.example.com.json",
        "test/browser_shop.example.com.js",
    ] {
        assert!(bundle.join(file).is_file(), "missing {}", file);
    }

    let expected: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(bundle.join("test/shop.example.com.json")).unwrap(),
    )
    .unwrap();
    let fields = expected[0]["fields"].as_array().unwrap();
    assert_eq!(fields[0]["fieldName"], "given-name");
    assert_eq!(fields[0]["reason"], "autocomplete");
    assert!(fields.iter().all(|f| f["fieldName"] != ""), "unknown fields are skipped");

    let test = std::fs::read_to_string(bundle.join("test/browser_shop.example.com.js")).unwrap();
    assert!(test.contains("fixturePath: \"shop.example.com.html\""));
}

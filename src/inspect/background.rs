use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::InspectorError;
use crate::export::bundle::{ExportBundle, ExportFile, write_files};
use crate::export::freeze::{
    field_types_for_frame, frozen_page_filename, post_process_main_frame_html,
    select_frames_for_freeze,
};
use crate::export::test_fixture::create_test_files;
use crate::field::field_model::FieldDetail;
use crate::inspect::collaborators::{Classifier, PageAgent};
use crate::messaging::protocol::{BackgroundMessage, PanelRequest};
use crate::tagger::identity::TagSelector;

pub const TEST_ADDRESSES_FILE: &str = "test-addresses.json";
pub const TEST_CREDIT_CARDS_FILE: &str = "test-credit-cards.json";

/// The background side of the inspector: serves panel requests against a
/// classifier and a page agent, and answers on the message channel.
pub struct Background {
    classifier: Arc<dyn Classifier>,
    page: Arc<dyn PageAgent>,
    selector: TagSelector,
    records_dir: PathBuf,
    output_dir: PathBuf,
    outgoing: mpsc::UnboundedSender<BackgroundMessage>,
}

impl Background {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        page: Arc<dyn PageAgent>,
        outgoing: mpsc::UnboundedSender<BackgroundMessage>,
    ) -> Self {
        Self {
            classifier,
            page,
            selector: TagSelector::default(),
            records_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("."),
            outgoing,
        }
    }

    pub fn with_selector(mut self, selector: TagSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_records_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.records_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Serve requests until the panel side hangs up. A failing request is
    /// logged and does not stop the loop.
    pub async fn run(self, mut incoming: mpsc::UnboundedReceiver<PanelRequest>) {
        while let Some(request) = incoming.recv().await {
            let name = request.name();
            if let Err(e) = self.handle(request).await {
                warn!("{} request failed: {}", name, e);
            }
        }
        debug!("panel request channel closed");
    }

    pub async fn handle(&self, request: PanelRequest) -> Result<(), InspectorError> {
        match request {
            PanelRequest::TagElements { tab_id, cycle } => {
                match self.page.tag_elements(tab_id, &self.selector).await {
                    Ok(tagged) => {
                        self.post(BackgroundMessage::TagComplete {
                            tab_id,
                            cycle,
                            tagged,
                        });
                        Ok(())
                    }
                    Err(e) => {
                        self.post(BackgroundMessage::InspectFailed {
                            tab_id,
                            cycle,
                            error: e.to_string(),
                        });
                        Err(e)
                    }
                }
            }

            PanelRequest::Inspect {
                tab_id,
                changes,
                cycle,
            } => {
                if let Err(e) = self.page.remove_all_highlights(tab_id).await {
                    warn!("Failed to clear highlights before inspect: {}", e);
                }
                match self.classifier.inspect(tab_id, &changes).await {
                    Ok(data) => {
                        info!(tab_id, cycle, fields = data.len(), "inspect complete");
                        self.post(BackgroundMessage::InspectComplete { tab_id, cycle, data });
                        Ok(())
                    }
                    Err(e) => {
                        self.post(BackgroundMessage::InspectFailed {
                            tab_id,
                            cycle,
                            error: e.to_string(),
                        });
                        Err(e)
                    }
                }
            }

            PanelRequest::Highlight {
                tab_id,
                kind,
                field_details,
            } => {
                for (frame_id, ids) in ids_by_frame(&field_details) {
                    self.page.add_highlight(tab_id, frame_id, kind, &ids).await?;
                }
                Ok(())
            }

            PanelRequest::RemoveHighlight {
                tab_id,
                kind,
                field_details,
            } => {
                for (frame_id, ids) in ids_by_frame(&field_details) {
                    self.page.remove_highlight(tab_id, frame_id, kind, &ids).await?;
                }
                Ok(())
            }

            PanelRequest::ScrollTo {
                tab_id,
                field_detail,
            } => {
                self.page
                    .scroll_into_view(tab_id, field_detail.frame_id, &field_detail.inspect_id)
                    .await
            }

            PanelRequest::SetTestRecords {
                tab_id,
                address,
                creditcard,
            } => {
                let records = self.load_test_records(address, creditcard)?;
                self.classifier.set_test_records(tab_id, &records).await
            }

            PanelRequest::DownloadPage {
                tab_id,
                field_details,
            } => {
                let host = self.page.host(tab_id).await?;
                let mut bundle = ExportBundle::new("page", &host);
                bundle.extend(self.freeze_page(tab_id, &field_details).await?);
                self.write_bundle(tab_id, &bundle)
            }

            PanelRequest::GenerateReport {
                tab_id,
                panel_data_url,
                field_details,
            } => {
                let host = self.page.host(tab_id).await?;
                let mut bundle = ExportBundle::new("report", &host);
                bundle.push(self.screenshot(tab_id, &host).await?);
                bundle.push(self.export_inspect(tab_id, &host, &panel_data_url)?);

                let pages = self.freeze_page(tab_id, &field_details).await?;
                bundle.extend(pages.into_iter().map(|p| p.in_dir("page")));

                let tests = create_test_files(&host, &field_details)?;
                bundle.extend(tests.into_iter().map(|t| t.in_dir("test")));

                self.write_bundle(tab_id, &bundle)
            }

            PanelRequest::ExportInspect {
                tab_id,
                panel_data_url,
            } => {
                let host = self.page.host(tab_id).await?;
                let files = vec![
                    self.screenshot(tab_id, &host).await?,
                    self.export_inspect(tab_id, &host, &panel_data_url)?,
                ];
                let written = write_files(&self.output_dir, &files)?;
                self.notify(tab_id, format!("saved {} files", written.len()));
                Ok(())
            }
        }
    }

    fn post(&self, message: BackgroundMessage) {
        if self.outgoing.send(message).is_err() {
            debug!("panel is gone, dropping message");
        }
    }

    fn notify(&self, tab_id: u64, progress: impl ToString) {
        self.post(BackgroundMessage::progress(tab_id, progress));
    }

    fn write_bundle(&self, tab_id: u64, bundle: &ExportBundle) -> Result<(), InspectorError> {
        let path = bundle.write_to_dir(&self.output_dir)?;
        self.notify(tab_id, format!("saved {}", path.display()));
        Ok(())
    }

    fn load_test_records(&self, address: bool, creditcard: bool) -> Result<Vec<Value>, InspectorError> {
        let mut records = Vec::new();
        if address {
            records.extend(read_records(&self.records_dir.join(TEST_ADDRESSES_FILE))?);
        }
        if creditcard {
            records.extend(read_records(&self.records_dir.join(TEST_CREDIT_CARDS_FILE))?);
        }
        Ok(records)
    }

    /// Freeze the main frame and its direct subframes. A frame that fails to
    /// freeze is reported as progress and saved empty.
    async fn freeze_page(
        &self,
        tab_id: u64,
        fields: &[FieldDetail],
    ) -> Result<Vec<ExportFile>, InspectorError> {
        let all_frames = self.page.frames(tab_id).await?;
        let frames = select_frames_for_freeze(&all_frames)?;

        self.notify(tab_id, "freezing page - setting data attributes");
        for frame in &all_frames {
            let types = field_types_for_frame(fields, frame.frame_id);
            if !types.is_empty() {
                self.page
                    .annotate_field_types(tab_id, frame.frame_id, &types)
                    .await?;
            }
        }

        let count = frames.len();
        let mut pages = Vec::with_capacity(count);
        let mut url_to_path = Vec::new();

        for (index, frame) in frames.iter().enumerate() {
            self.notify(
                tab_id,
                format!("freezing frame ({}/{}) - {}", index + 1, count, frame.url),
            );
            let html = match self.page.freeze_frame(tab_id, frame).await {
                Ok(html) => html,
                Err(e) => {
                    self.notify(
                        tab_id,
                        format!(
                            "Error freezing frame ({}/{}) - {} : {}",
                            index + 1,
                            count,
                            frame.url,
                            e
                        ),
                    );
                    String::new()
                }
            };

            let filename = frozen_page_filename(&frame.url, index, count)?;
            let html = if index + 1 == count {
                post_process_main_frame_html(&html, &url_to_path)
            } else {
                url_to_path.push((frame.url.clone(), filename.clone()));
                html
            };
            pages.push(ExportFile::text(filename, &html));
        }
        Ok(pages)
    }

    async fn screenshot(&self, tab_id: u64, host: &str) -> Result<ExportFile, InspectorError> {
        self.notify(tab_id, "screenshoting page");
        let data_url = self.page.capture_screenshot(tab_id).await?;
        ExportFile::image(format!("screenshot-{}.png", host), &data_url)
    }

    fn export_inspect(
        &self,
        tab_id: u64,
        host: &str,
        panel_data_url: &str,
    ) -> Result<ExportFile, InspectorError> {
        self.notify(tab_id, "exporting inspect result");
        ExportFile::image(format!("inspect-{}.png", host), panel_data_url)
    }
}

/// Inspect ids grouped by frame, in ascending frame id order.
fn ids_by_frame(fields: &[FieldDetail]) -> BTreeMap<i64, Vec<String>> {
    let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for field in fields {
        grouped
            .entry(field.frame_id)
            .or_default()
            .push(field.inspect_id.clone());
    }
    grouped
}

fn read_records(path: &Path) -> Result<Vec<Value>, InspectorError> {
    let content = std::fs::read_to_string(path).map_err(|e| InspectorError::Io {
        context: format!("reading test records '{}'", path.display()),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| InspectorError::JsonParse {
        context: path.display().to_string(),
        source: e,
    })
}

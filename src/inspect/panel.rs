use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::InspectorError;
use crate::field::store::FieldDetailStore;
use crate::inspect::orchestrator::{InspectWait, Orchestrator};
use crate::messaging::channel::Messenger;
use crate::messaging::protocol::{BackgroundMessage, PanelRequest};
use crate::table::filter::FilterOptions;
use crate::table::renderer::{EditToggle, FieldTable, TableEffect};
use crate::table::table_model::{Column, RowId};
use crate::tagger::identity::element_selector;

/// The inspector panel of one tab: owns the result store, the rendered table
/// and the inspect cycle, and talks to the background through a messenger.
pub struct Panel {
    tab_id: u64,
    store: FieldDetailStore,
    table: FieldTable,
    orchestrator: Orchestrator,
    filter: FilterOptions,
    messenger: Box<dyn Messenger>,
    progress: Option<String>,
}

impl Panel {
    pub fn new(tab_id: u64, messenger: Box<dyn Messenger>) -> Self {
        Self {
            tab_id,
            store: FieldDetailStore::new(),
            table: FieldTable::new(),
            orchestrator: Orchestrator::new(tab_id),
            filter: FilterOptions::default(),
            messenger,
            progress: None,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_filter(mut self, filter: FilterOptions) -> Self {
        self.filter = filter;
        self
    }

    pub fn tab_id(&self) -> u64 {
        self.tab_id
    }

    pub fn store(&self) -> &FieldDetailStore {
        &self.store
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn filter(&self) -> FilterOptions {
        self.filter
    }

    /// Last progress text reported by the background.
    pub fn progress(&self) -> Option<&str> {
        self.progress.as_deref()
    }

    /// Error status of the last inspect cycle, if it failed.
    pub fn status(&self) -> Option<&str> {
        self.orchestrator.status()
    }

    // ========================================================================
    // Inspect cycle
    // ========================================================================

    /// The inspect button: a fresh session, discarding all edits.
    pub fn inspect(&mut self) -> Result<u64, InspectorError> {
        self.orchestrator
            .trigger_inspect(true, &mut self.store, self.messenger.as_ref())
    }

    pub fn wait_for_inspect(&mut self) -> Result<InspectWait, InspectorError> {
        self.orchestrator
            .await_result_or_trigger(&mut self.store, self.messenger.as_ref())
    }

    pub fn handle_message(&mut self, message: BackgroundMessage) -> Result<(), InspectorError> {
        if message.tab_id() != self.tab_id {
            debug!(tab = message.tab_id(), "ignoring message for another tab");
            return Ok(());
        }

        match message {
            BackgroundMessage::TagComplete { cycle, tagged, .. } => {
                debug!(cycle, tagged, "tagging complete");
                self.orchestrator
                    .on_tag_complete(cycle, &self.store, self.messenger.as_ref())?;
            }
            BackgroundMessage::InspectComplete { cycle, data, .. } => {
                if self
                    .orchestrator
                    .on_inspect_complete(cycle, &data, &mut self.store)
                {
                    self.table.render(&self.store, &self.filter);
                    self.orchestrator
                        .finish_render(&mut self.store, self.messenger.as_ref())?;
                }
            }
            BackgroundMessage::InspectFailed { cycle, error, .. } => {
                self.orchestrator.on_inspect_failed(cycle, &error);
            }
            BackgroundMessage::NotifyProgress { progress, .. } => {
                self.progress = Some(progress);
            }
        }
        Ok(())
    }

    /// Fail the outstanding cycle if it ran past its deadline.
    pub fn expire_overdue(&mut self) -> bool {
        self.orchestrator.expire_overdue(Instant::now())
    }

    /// Handle the next background message, or the inspect deadline if it
    /// comes first. Returns false once the message channel is closed.
    pub async fn pump(
        &mut self,
        incoming: &mut mpsc::UnboundedReceiver<BackgroundMessage>,
    ) -> Result<bool, InspectorError> {
        let message = match self.orchestrator.next_deadline() {
            Some(deadline) => tokio::select! {
                message = incoming.recv() => message,
                _ = tokio::time::sleep_until(deadline) => {
                    self.expire_overdue();
                    return Ok(true);
                }
            },
            None => incoming.recv().await,
        };

        match message {
            Some(message) => {
                self.handle_message(message)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Make sure a fresh result is displayed, inspecting if needed, while
    /// handling background messages.
    pub async fn ensure_result(
        &mut self,
        incoming: &mut mpsc::UnboundedReceiver<BackgroundMessage>,
    ) -> Result<(), InspectorError> {
        let mut wait = self.wait_for_inspect()?;
        loop {
            if let Some(result) = wait.try_result() {
                return result.map_err(InspectorError::from);
            }
            if !self.pump(incoming).await? {
                return Err(InspectorError::ChannelClosed("background messages".into()));
            }
        }
    }

    // ========================================================================
    // Table interaction
    // ========================================================================

    pub fn set_filter(&mut self, filter: FilterOptions) {
        self.filter = filter;
        self.table.render(&self.store, &self.filter);
    }

    pub fn hover_enter(&mut self, row: RowId, column: Column) {
        let effects = self.table.hover_enter(&self.store, row, column);
        self.dispatch(effects);
    }

    pub fn hover_leave(&mut self, row: RowId, column: Column) {
        let effects = self.table.hover_leave(&self.store, row, column);
        self.dispatch(effects);
    }

    pub fn click(&mut self, row: RowId, column: Column) {
        let effects = self.table.click(&self.store, row, column);
        self.dispatch(effects);
    }

    /// Highlight and scroll requests are fire-and-forget; a failed send is
    /// only logged.
    fn dispatch(&self, effects: Vec<TableEffect>) {
        for effect in effects {
            let request = match effect {
                TableEffect::ScrollTo(field_detail) => PanelRequest::ScrollTo {
                    tab_id: self.tab_id,
                    field_detail,
                },
                TableEffect::AddHighlight { kind, fields } => PanelRequest::Highlight {
                    tab_id: self.tab_id,
                    kind,
                    field_details: fields,
                },
                TableEffect::RemoveHighlight { kind, fields } => PanelRequest::RemoveHighlight {
                    tab_id: self.tab_id,
                    kind,
                    field_details: fields,
                },
            };
            if let Err(e) = self.messenger.send(request) {
                warn!("Failed to send highlight request: {}", e);
            }
        }
    }

    /// The edit button. Entering edit mode needs a fresh result; leaving it
    /// runs one incremental inspect if the edits changed anything.
    pub async fn toggle_edit_mode(
        &mut self,
        incoming: &mut mpsc::UnboundedReceiver<BackgroundMessage>,
    ) -> Result<EditToggle, InspectorError> {
        if !self.table.is_editing() {
            self.ensure_result(incoming).await?;
        }

        let toggle = self.table.toggle_edit_mode(&self.store);
        if matches!(toggle, EditToggle::Exited { reinspect: true }) {
            self.orchestrator
                .trigger_inspect(false, &mut self.store, self.messenger.as_ref())?;
        }
        Ok(toggle)
    }

    pub fn select_field_name(&mut self, row: RowId, value: &str) -> bool {
        self.table.select_field_name(&mut self.store, row, value)
    }

    /// Selector of the first selected row's element, for the devtools
    /// element inspector.
    pub fn inspect_element_selector(&self) -> Option<String> {
        self.table
            .first_selected()
            .map(|row| element_selector(&row.inspect_id))
    }

    // ========================================================================
    // Test records and exports
    // ========================================================================

    pub fn set_test_records(&self, address: bool, creditcard: bool) -> Result<(), InspectorError> {
        self.messenger.send(PanelRequest::SetTestRecords {
            tab_id: self.tab_id,
            address,
            creditcard,
        })
    }

    /// Save a page screenshot and the given capture of the panel.
    pub async fn screenshot(
        &mut self,
        panel_data_url: &str,
        incoming: &mut mpsc::UnboundedReceiver<BackgroundMessage>,
    ) -> Result<(), InspectorError> {
        self.progress = Some("exporting inspect result".into());
        self.ensure_result(incoming).await?;
        self.messenger.send(PanelRequest::ExportInspect {
            tab_id: self.tab_id,
            panel_data_url: panel_data_url.to_string(),
        })
    }

    pub async fn download_page(
        &mut self,
        incoming: &mut mpsc::UnboundedReceiver<BackgroundMessage>,
    ) -> Result<(), InspectorError> {
        self.progress = Some("downloading page".into());
        self.ensure_result(incoming).await?;
        self.messenger.send(PanelRequest::DownloadPage {
            tab_id: self.tab_id,
            field_details: self.store.fields().to_vec(),
        })
    }

    pub async fn generate_report(
        &mut self,
        panel_data_url: &str,
        incoming: &mut mpsc::UnboundedReceiver<BackgroundMessage>,
    ) -> Result<(), InspectorError> {
        self.progress = Some("generating report".into());
        self.ensure_result(incoming).await?;
        self.messenger.send(PanelRequest::GenerateReport {
            tab_id: self.tab_id,
            panel_data_url: panel_data_url.to_string(),
            field_details: self.store.fields().to_vec(),
        })
    }
}

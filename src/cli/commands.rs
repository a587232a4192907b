use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::config::{AppConfig, TargetArgs};
use crate::error::{InspectError, InspectorError};
use crate::export::bundle::write_files;
use crate::export::test_fixture::create_test_files;
use crate::field::store::FieldDetailStore;
use crate::inspect::background::Background;
use crate::inspect::collaborators::Classifier;
use crate::inspect::orchestrator::Orchestrator;
use crate::inspect::panel::Panel;
use crate::inspect::remote_classifier::RemoteClassifier;
use crate::inspect::static_page::{AutocompleteClassifier, StaticPage};
use crate::load_field_details;
use crate::messaging::channel::{Messenger, message_channel, request_channel};
use crate::messaging::protocol::BackgroundMessage;
use crate::messaging::session::BackgroundSession;
use crate::table::console::format_console_table;
use crate::table::filter::FilterOptions;
use crate::table::html::generate_html_table;
use crate::table::renderer::FieldTable;
use crate::trace::logger::TraceLogger;

// ============================================================================
// render subcommand
// ============================================================================

pub fn cmd_render(
    input: &str,
    filter: FilterOptions,
    format: &str,
    output: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let fields = load_field_details(input)?;
    let mut store = FieldDetailStore::new();
    store.reconcile(&fields);

    let mut table = FieldTable::new();
    table.render(&store, &filter);

    write_table(&table, format, output, input)
}

// ============================================================================
// fixture subcommand
// ============================================================================

pub fn cmd_fixture(
    input: &str,
    host: &str,
    output_dir: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let fields = load_field_details(input)?;
    let files = create_test_files(host, &fields)?;
    for path in write_files(Path::new(output_dir), &files)? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

// ============================================================================
// inspect / report subcommands
// ============================================================================

/// Inspect once, optionally after loading test records, and print the table.
pub async fn cmd_inspect(
    target: &TargetArgs,
    config: &AppConfig,
    classifier_endpoint: Option<&str>,
    records: (bool, bool),
    format: &str,
    output: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut connection = connect(target, config, classifier_endpoint).await?;

    let (address, creditcard) = records;
    if address || creditcard {
        connection.panel.set_test_records(address, creditcard)?;
    }

    connection.panel.inspect()?;
    connection.run_cycle().await?;

    let label = format!("tab {}", target.tab);
    write_table(connection.panel.table(), format, output, &label)?;

    connection.close().await;
    Ok(())
}

/// Inspect and write the `report-<host>` bundle: screenshot, panel capture,
/// frozen pages and the generated test.
pub async fn cmd_report(
    target: &TargetArgs,
    config: &AppConfig,
    classifier_endpoint: Option<&str>,
    panel_image: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = std::fs::read(panel_image).map_err(|e| InspectorError::Io {
        context: format!("reading panel image '{}'", panel_image),
        source: e,
    })?;
    let panel_data_url = format!("data:image/png;base64,{}", STANDARD.encode(image));

    let mut connection = connect(target, config, classifier_endpoint).await?;
    connection
        .panel
        .generate_report(&panel_data_url, &mut connection.incoming)
        .await?;

    let progress = connection.close().await;
    for line in progress {
        println!("{}", line);
    }
    Ok(())
}

enum Backend {
    InProcess(JoinHandle<()>),
    Session(BackgroundSession),
}

struct Connection {
    panel: Panel,
    incoming: mpsc::UnboundedReceiver<BackgroundMessage>,
    backend: Backend,
}

impl Connection {
    /// Handle messages until the outstanding cycle resolves.
    async fn run_cycle(&mut self) -> Result<(), InspectorError> {
        while self.panel.orchestrator().is_pending() {
            if !self.panel.pump(&mut self.incoming).await? {
                return Err(InspectorError::ChannelClosed("background messages".into()));
            }
        }
        match self.panel.status() {
            Some(status) => Err(InspectError::Failed(status.to_string()).into()),
            None => Ok(()),
        }
    }

    /// Hang up and wait for the background to finish the queued requests.
    /// Returns the progress reported in the meantime.
    async fn close(self) -> Vec<String> {
        let Connection {
            panel,
            mut incoming,
            backend,
        } = self;
        drop(panel);

        match backend {
            Backend::InProcess(handle) => {
                if let Err(e) = handle.await {
                    warn!("Background task failed: {}", e);
                }
            }
            Backend::Session(session) => {
                if let Err(e) = session.quit().await {
                    warn!("Failed to stop background session: {}", e);
                }
            }
        }

        let mut progress = Vec::new();
        while let Ok(message) = incoming.try_recv() {
            if let BackgroundMessage::NotifyProgress { progress: text, .. } = message {
                progress.push(text);
            }
        }
        progress
    }
}

async fn connect(
    target: &TargetArgs,
    config: &AppConfig,
    classifier_endpoint: Option<&str>,
) -> Result<Connection, InspectorError> {
    let tracer = match &config.trace.path {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };
    let orchestrator = Orchestrator::new(target.tab)
        .with_timeout(config.inspect.timeout())
        .with_tracer(tracer);

    let (messenger, incoming, backend) = match (&target.server, &target.page) {
        (Some(script), _) => {
            let (session, incoming) = BackgroundSession::launch(script).await?;
            (Box::new(session.messenger()) as Box<dyn Messenger>, incoming, Backend::Session(session))
        }
        (None, Some(page_path)) => {
            let page = Arc::new(StaticPage::from_file(target.tab, page_path)?);
            let classifier: Arc<dyn Classifier> = match classifier_endpoint {
                Some(endpoint) => Arc::new(RemoteClassifier::new(endpoint)),
                None => Arc::new(AutocompleteClassifier::new(page.clone())),
            };

            let (messenger, requests) = request_channel();
            let (message_tx, incoming) = message_channel();
            let background = Background::new(classifier, page, message_tx)
                .with_selector(config.inspect.selector())
                .with_records_dir(&config.export.records_dir)
                .with_output_dir(&config.export.output_dir);
            let handle = tokio::spawn(background.run(requests));
            (Box::new(messenger) as Box<dyn Messenger>, incoming, Backend::InProcess(handle))
        }
        (None, None) => {
            return Err(InspectorError::SessionProtocol {
                command: "connect".into(),
                error: "either --page or --server is required".into(),
            });
        }
    };

    info!(tab = target.tab, "panel connected");
    let panel = Panel::new(target.tab, messenger)
        .with_orchestrator(orchestrator)
        .with_filter(config.display.filter(false, false));

    Ok(Connection {
        panel,
        incoming,
        backend,
    })
}

fn write_table(
    table: &FieldTable,
    format: &str,
    output: Option<&str>,
    title: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = match format {
        "console" => format_console_table(table),
        "html" => generate_html_table(table, title),
        other => return Err(format!("Unknown format: {} (expected console or html)", other).into()),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &content)?;
            println!("Table written to {}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

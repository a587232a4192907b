use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;

use crate::trace::trace::InspectEvent;

/// Appends inspect-cycle events to a JSONL file, one event per line.
///
/// A logger without a file drops events. Trace problems are reported with
/// `warn!` and never fail the orchestrator.
#[derive(Default)]
pub struct TraceLogger {
    sink: Option<Mutex<File>>,
}

impl TraceLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                sink: Some(Mutex::new(file)),
            },
            Err(e) => {
                warn!("Could not open trace file '{}': {}", path.display(), e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn log(&self, event: &InspectEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(cycle = event.cycle, "Failed to serialize trace event: {}", e);
                return;
            }
        };

        let written = sink
            .lock()
            .map_err(|e| e.to_string())
            .and_then(|mut file| writeln!(file, "{}", line).map_err(|e| e.to_string()));
        if let Err(e) = written {
            warn!(cycle = event.cycle, "Failed to write trace event: {}", e);
        }
    }
}

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectorError {
    /// Node.js subprocess failed to spawn (the background script)
    #[error("Failed to spawn {script} (is Node.js installed?): {source}")]
    SubprocessSpawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the background process failed
    #[error("Background session I/O error: {0}")]
    SessionIo(String),

    /// The background process answered something we did not expect
    #[error("Background session protocol error ({command}): {error}")]
    SessionProtocol { command: String, error: String },

    /// JSON parsing failed (wire payload or fixture file)
    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization failed (outgoing request or export)
    #[error("JSON serialize error ({context}): {source}")]
    JsonSerialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The messaging channel to the other side is gone
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// The external classifier rejected the inspect call
    #[error("Classifier failed: {0}")]
    Classifier(String),

    /// A page-side operation (tagging, highlight, freeze, capture) failed
    #[error("Page operation failed: {0}")]
    PageAgent(String),

    /// An export action ran without a fresh inspection result
    #[error("No fresh inspection result available")]
    StaleResult,

    #[error("Invalid data URL: {0}")]
    DataUrl(String),

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Inspect(#[from] InspectError),
}

/// Why a caller waiting on an inspection cycle was released without a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    #[error("inspection timed out after {0:?}")]
    TimedOut(Duration),

    #[error("inspection failed: {0}")]
    Failed(String),

    /// The pending slot was dropped without ever being resolved
    #[error("inspection abandoned before a result arrived")]
    Abandoned,
}

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::table::filter::FilterOptions;
use crate::tagger::identity::TagSelector;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "autofill-inspector",
    version,
    about = "Inspect, correct and export form autofill field classifications"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Remote classifier endpoint (default: classify from autocomplete attributes)
    #[arg(long, global = true)]
    pub classifier_endpoint: Option<String>,

    /// Path to config file (default: autofill-inspector.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a saved inspection result as a table
    Render {
        /// JSON file with an array of field details
        #[arg(long)]
        input: String,

        /// Show fields that are not visible on the page
        #[arg(long)]
        show_invisible: bool,

        /// Show fields without a field name
        #[arg(long)]
        show_unknown: bool,

        /// Output format: console, html
        #[arg(long, default_value = "console")]
        format: String,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Generate the heuristic test fixture for a saved inspection result
    Fixture {
        /// JSON file with an array of field details
        #[arg(long)]
        input: String,

        /// Host name the fixture is named after
        #[arg(long)]
        host: String,

        /// Output directory for `<host>.json` and `browser_<host>.js`
        #[arg(short, long)]
        output_dir: Option<String>,
    },

    /// Inspect a tab once and render the result
    Inspect {
        #[command(flatten)]
        target: TargetArgs,

        /// Load the test addresses before inspecting
        #[arg(long)]
        address_records: bool,

        /// Load the test credit cards before inspecting
        #[arg(long)]
        credit_card_records: bool,

        /// Output format: console, html
        #[arg(long, default_value = "console")]
        format: String,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Inspect a tab and write the full report bundle
    Report {
        #[command(flatten)]
        target: TargetArgs,

        /// PNG capture of the inspector panel to include
        #[arg(long)]
        panel_image: String,

        /// Directory the `report-<host>` bundle is written to
        #[arg(short, long)]
        output_dir: Option<String>,
    },
}

/// Where the inspected tab lives: a page description served in-process, or a
/// background script speaking NDJSON on stdio.
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Tab id to inspect
    #[arg(long, default_value_t = 1)]
    pub tab: u64,

    /// JSON file describing the page frames
    #[arg(long, conflicts_with = "server", required_unless_present = "server")]
    pub page: Option<String>,

    /// Background script run with node
    #[arg(long)]
    pub server: Option<String>,
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `autofill-inspector.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub inspect: InspectConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub include_iframes: bool,

    #[serde(default)]
    pub include_textareas: bool,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            include_iframes: true,
            include_textareas: false,
        }
    }
}

impl InspectConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn selector(&self) -> TagSelector {
        TagSelector {
            include_iframes: self.include_iframes,
            include_textareas: self.include_textareas,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub show_invisible: bool,
    #[serde(default)]
    pub show_unknown: bool,
}

impl DisplayConfig {
    /// A flag turned on either on the command line or in the config wins.
    pub fn filter(&self, show_invisible: bool, show_unknown: bool) -> FilterOptions {
        FilterOptions {
            show_invisible: show_invisible || self.show_invisible,
            show_unknown: show_unknown || self.show_unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Directory holding test-addresses.json and test-credit-cards.json
    #[serde(default = "default_records_dir")]
    pub records_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            records_dir: default_records_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    /// JSONL file receiving one event per inspect state change
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: Option<String>,
}

// Serde default helpers
fn default_timeout_ms() -> u64 { 30_000 }
fn default_true() -> bool { true }
fn default_output_dir() -> String { ".".to_string() }
fn default_records_dir() -> String { "data".to_string() }

// ============================================================================
// Config File Loading
// ============================================================================

pub const DEFAULT_CONFIG_FILE: &str = "autofill-inspector.yaml";

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring malformed config '{}': {}", config_path, e);
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

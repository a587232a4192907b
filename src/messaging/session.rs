use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::InspectorError;
use crate::messaging::channel::{ChannelMessenger, message_channel};
use crate::messaging::protocol::{BackgroundMessage, PanelRequest};

/// First line printed by the background script once it is ready.
#[derive(Debug, Deserialize)]
struct ReadySignal {
    ok: bool,
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

/// A background context running in a Node.js child process.
///
/// Panel requests are written as NDJSON to the child's stdin; every line the
/// child prints on stdout is parsed as a `BackgroundMessage` and forwarded to
/// the receiver returned by `launch`.
pub struct BackgroundSession {
    child: Child,
    outgoing: mpsc::UnboundedSender<PanelRequest>,
}

impl BackgroundSession {
    /// Spawn the background script and wait for its ready signal.
    pub async fn launch(
        script: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<BackgroundMessage>), InspectorError> {
        let mut child = Command::new("node")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InspectorError::SubprocessSpawn {
                script: script.to_string(),
                source: e,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            InspectorError::SessionIo(format!("Failed to capture stdin of {}", script))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            InspectorError::SessionIo(format!("Failed to capture stdout of {}", script))
        })?;

        let mut lines = BufReader::new(stdout).lines();

        let line = lines
            .next_line()
            .await
            .map_err(|e| InspectorError::SessionIo(format!("Failed to read ready signal: {}", e)))?
            .ok_or_else(|| {
                InspectorError::SessionIo(format!("{} exited before signalling ready", script))
            })?;

        let ready: ReadySignal =
            serde_json::from_str(line.trim()).map_err(|e| InspectorError::JsonParse {
                context: format!("{} ready signal", script),
                source: e,
            })?;

        if !ready.ok || ready.ready != Some(true) {
            return Err(InspectorError::SessionProtocol {
                command: "launch".into(),
                error: ready
                    .error
                    .unwrap_or_else(|| format!("Did not receive ready signal from {}", script)),
            });
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[background] {}", line);
                }
            });
        }

        let (message_tx, message_rx) = message_channel();
        tokio::spawn(read_messages(lines, message_tx));

        let (outgoing, request_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_requests(stdin, request_rx));

        info!(script, "background session ready");
        Ok((BackgroundSession { child, outgoing }, message_rx))
    }

    /// A messenger writing to the child's stdin. The child sees end of input
    /// once the session and every messenger are dropped.
    pub fn messenger(&self) -> ChannelMessenger {
        ChannelMessenger::new(self.outgoing.clone())
    }

    /// Close the request stream and wait briefly for the child to exit.
    pub async fn quit(self) -> Result<(), InspectorError> {
        let BackgroundSession { mut child, outgoing } = self;
        drop(outgoing);

        match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "background session exited"),
            Ok(Err(e)) => warn!("Failed to wait for background session: {}", e),
            Err(_) => {
                // Best-effort: the process ignored stdin closing
                let _ = child.kill().await;
            }
        }
        Ok(())
    }
}

/// First 200 characters of a session line, for log messages.
fn preview(line: &str) -> String {
    line.chars().take(200).collect()
}

async fn read_messages<R: AsyncBufRead + Unpin>(
    mut lines: Lines<R>,
    tx: mpsc::UnboundedSender<BackgroundMessage>,
) {
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read from background session: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<BackgroundMessage>(line.trim()) {
            Ok(message) => {
                if tx.send(message).is_err() {
                    break;
                }
            }
            Err(e) => warn!(
                "Invalid JSON from background session: {} (line: {})",
                e,
                preview(&line)
            ),
        }
    }
    debug!("background session output closed");
}

async fn write_requests(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<PanelRequest>) {
    while let Some(request) = rx.recv().await {
        let json = match serde_json::to_string(&request) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize {} request: {}", request.name(), e);
                continue;
            }
        };

        let written = async {
            stdin.write_all(json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;

        if let Err(e) = written {
            warn!("Failed to write to background session: {}", e);
            break;
        }
    }
}

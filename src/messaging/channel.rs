use tokio::sync::mpsc;

use crate::error::InspectorError;
use crate::messaging::protocol::{BackgroundMessage, PanelRequest};

/// Fire-and-forget request sink towards the background context. Answers, if
/// any, come back later as `BackgroundMessage`s.
pub trait Messenger: Send + Sync {
    fn send(&self, request: PanelRequest) -> Result<(), InspectorError>;
}

/// In-process messenger backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelMessenger {
    tx: mpsc::UnboundedSender<PanelRequest>,
}

impl ChannelMessenger {
    pub fn new(tx: mpsc::UnboundedSender<PanelRequest>) -> Self {
        Self { tx }
    }
}

impl Messenger for ChannelMessenger {
    fn send(&self, request: PanelRequest) -> Result<(), InspectorError> {
        let name = request.name();
        self.tx
            .send(request)
            .map_err(|_| InspectorError::ChannelClosed(format!("panel request '{}'", name)))
    }
}

/// Panel-to-background request channel.
pub fn request_channel() -> (ChannelMessenger, mpsc::UnboundedReceiver<PanelRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelMessenger::new(tx), rx)
}

/// Background-to-panel message channel.
pub fn message_channel() -> (
    mpsc::UnboundedSender<BackgroundMessage>,
    mpsc::UnboundedReceiver<BackgroundMessage>,
) {
    mpsc::unbounded_channel()
}

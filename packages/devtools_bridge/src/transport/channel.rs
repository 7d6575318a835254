//! In-process transport backed by unbounded tokio channels.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::trace;

use crate::protocol::{InboundEnvelope, IncomingCommand, OutboundEnvelope, RelayMessage};
use crate::transport::Transport;

pub type InboundReceiver = mpsc::UnboundedReceiver<InboundEnvelope>;

/// Bridge side of an in-process channel.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<OutboundEnvelope>,
}

impl ChannelTransport {
    pub fn new(outbound: mpsc::UnboundedSender<OutboundEnvelope>) -> Self {
        Self { outbound }
    }
}

impl Transport for ChannelTransport {
    fn post(&self, envelope: OutboundEnvelope) {
        if self.outbound.send(envelope).is_err() {
            trace!("remote end closed, dropping message");
        }
    }
}

/// The remote client's side of an in-process channel.
#[derive(Debug)]
pub struct RemoteEnd {
    outbound: mpsc::UnboundedReceiver<OutboundEnvelope>,
    inbound: mpsc::UnboundedSender<InboundEnvelope>,
}

impl RemoteEnd {
    /// Send a command the way the remote client emits it.
    pub fn emit(&self, command: &IncomingCommand) -> Result<()> {
        self.send(InboundEnvelope::emit(command)?)
    }

    pub fn send(&self, envelope: InboundEnvelope) -> Result<()> {
        self.inbound
            .send(envelope)
            .map_err(|_| anyhow::anyhow!("Bridge inbound channel is closed"))
    }

    /// Next relayed message; `None` once the bridge side is dropped.
    pub async fn recv(&mut self) -> Option<RelayMessage> {
        self.outbound.recv().await.map(|envelope| envelope.content)
    }

    /// Everything relayed so far, without waiting.
    pub fn drain(&mut self) -> Vec<RelayMessage> {
        let mut messages = Vec::new();
        while let Ok(envelope) = self.outbound.try_recv() {
            messages.push(envelope.content);
        }
        messages
    }
}

/// Create a connected transport, inbound receiver and remote end.
pub fn channel() -> (ChannelTransport, InboundReceiver, RemoteEnd) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport::new(out_tx),
        in_rx,
        RemoteEnd {
            outbound: out_rx,
            inbound: in_tx,
        },
    )
}

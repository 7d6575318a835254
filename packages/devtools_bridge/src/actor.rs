//! Actor that owns a wired store and serializes everything that touches it.

use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::action::{Action, LiftedAction};
use crate::error::StoreError;
use crate::instrument::InstrumentedStore;
use crate::lifted::LiftedState;
use crate::monitor::{ActionTracker, ChangeKind};
use crate::session::DevtoolsStore;
use crate::transport::InboundReceiver;

/// Default interval of the liveness heartbeat.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(222);

/// Requests a [`BridgeHandle`] sends to the actor.
#[derive(Debug)]
pub enum BridgeCommand {
    Dispatch {
        action: Action,
        respond_to: oneshot::Sender<Result<ChangeKind, StoreError>>,
    },
    DispatchLifted {
        action: LiftedAction,
        respond_to: oneshot::Sender<Result<ChangeKind, StoreError>>,
    },
    GetState {
        respond_to: oneshot::Sender<Value>,
    },
    GetLiftedState {
        respond_to: oneshot::Sender<LiftedState>,
    },
    Shutdown,
}

/// Handle to communicate with a bridge actor
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    sender: mpsc::Sender<BridgeCommand>,
}

impl BridgeHandle {
    pub async fn dispatch(&self, action: Action) -> Result<ChangeKind> {
        let (tx, rx) = oneshot::channel();
        self.send(BridgeCommand::Dispatch {
            action,
            respond_to: tx,
        })
        .await?;
        Ok(rx
            .await
            .map_err(|_| anyhow::anyhow!("Bridge actor didn't respond"))??)
    }

    pub async fn dispatch_lifted(&self, action: LiftedAction) -> Result<ChangeKind> {
        let (tx, rx) = oneshot::channel();
        self.send(BridgeCommand::DispatchLifted {
            action,
            respond_to: tx,
        })
        .await?;
        Ok(rx
            .await
            .map_err(|_| anyhow::anyhow!("Bridge actor didn't respond"))??)
    }

    pub async fn state(&self) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.send(BridgeCommand::GetState { respond_to: tx }).await?;
        rx.await
            .map_err(|_| anyhow::anyhow!("Bridge actor didn't respond"))
    }

    pub async fn lifted_state(&self) -> Result<LiftedState> {
        let (tx, rx) = oneshot::channel();
        self.send(BridgeCommand::GetLiftedState { respond_to: tx })
            .await?;
        rx.await
            .map_err(|_| anyhow::anyhow!("Bridge actor didn't respond"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(BridgeCommand::Shutdown).await
    }

    async fn send(&self, command: BridgeCommand) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Bridge actor is gone"))
    }
}

pub struct BridgeActor<S> {
    store: DevtoolsStore<S>,
    receiver: mpsc::Receiver<BridgeCommand>,
    inbound: InboundReceiver,
    heartbeat: Duration,
}

impl<S> BridgeActor<S>
where
    S: InstrumentedStore<Monitor = ActionTracker> + Send + 'static,
{
    /// Spawn the actor. The join handle yields the store back once the actor
    /// stops: on shutdown, or when every handle is dropped.
    pub fn spawn(
        store: DevtoolsStore<S>,
        inbound: InboundReceiver,
        heartbeat: Duration,
    ) -> (BridgeHandle, JoinHandle<DevtoolsStore<S>>) {
        let (sender, receiver) = mpsc::channel(32);
        let actor = BridgeActor {
            store,
            receiver,
            inbound,
            heartbeat,
        };
        let task = tokio::spawn(actor.run());
        (BridgeHandle { sender }, task)
    }

    async fn run(mut self) -> DevtoolsStore<S> {
        self.store.start();
        let session = self.store.session().id();
        debug!(%session, "bridge actor started");

        if self.heartbeat.is_zero() {
            warn!(%session, "zero heartbeat interval, using the default");
            self.heartbeat = DEFAULT_HEARTBEAT;
        }
        let mut ticker = tokio::time::interval(self.heartbeat);
        let mut inbound_open = true;

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(BridgeCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                envelope = self.inbound.recv(), if inbound_open => match envelope {
                    Some(envelope) => self.store.handle_inbound(&envelope),
                    None => {
                        debug!(%session, "remote inbound channel closed");
                        inbound_open = false;
                    }
                },
                _ = ticker.tick() => {
                    trace!(%session, "heartbeat");
                }
            }
        }

        debug!(%session, "bridge actor stopped");
        self.store
    }

    fn handle(&mut self, cmd: BridgeCommand) {
        match cmd {
            BridgeCommand::Dispatch { action, respond_to } => {
                let _ = respond_to.send(self.store.dispatch(action));
            }
            BridgeCommand::DispatchLifted { action, respond_to } => {
                let _ = respond_to.send(self.store.dispatch_lifted(action));
            }
            BridgeCommand::GetState { respond_to } => {
                let _ = respond_to.send(self.store.get_state().clone());
            }
            BridgeCommand::GetLiftedState { respond_to } => {
                let _ = respond_to.send(self.store.lifted_state().clone());
            }
            BridgeCommand::Shutdown => {}
        }
    }
}

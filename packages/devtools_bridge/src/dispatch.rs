//! Inbound command handling.

use tracing::{debug, warn};

use crate::action::LiftedAction;
use crate::creators::eval_action;
use crate::error::{CodecError, EvalError, StoreError};
use crate::instrument::InstrumentedStore;
use crate::lifted::LiftedState;
use crate::monitor::ActionTracker;
use crate::protocol::{ActionSpec, InboundEnvelope, IncomingCommand};
use crate::session::DevtoolsStore;

/// Why a remote ACTION could not be applied. Reported back as an ERROR relay.
#[derive(Debug, thiserror::Error)]
enum RemoteActionError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
enum ImportError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("invalid lifted state: {0}")]
    Shape(serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl<S> DevtoolsStore<S>
where
    S: InstrumentedStore<Monitor = ActionTracker>,
{
    /// Route one raw envelope from the remote client.
    pub fn handle_inbound(&mut self, envelope: &InboundEnvelope) {
        if let Some(command) = envelope.command() {
            self.handle_command(command);
        }
    }

    pub fn handle_command(&mut self, command: IncomingCommand) {
        match command {
            IncomingCommand::Import { state } => match self.import(&state) {
                Ok(()) => {
                    debug!(
                        staged = self.store.lifted_state().staged_action_ids.len(),
                        "imported lifted state"
                    );
                    self.session.relay_state(self.store.lifted_state(), None);
                }
                Err(e) => {
                    warn!(error = %e, "import failed");
                    self.session.relay_error(&e.to_string());
                }
            },
            IncomingCommand::Update => {
                self.session.relay_state(self.store.lifted_state(), None);
            }
            IncomingCommand::Action { action } => {
                if let Err(e) = self.remote_action(&action) {
                    debug!(error = %e, "remote action rejected");
                    self.session.relay_error(&e.to_string());
                }
            }
            IncomingCommand::Dispatch { action } => {
                let kind = action.kind();
                if let Err(e) = self.dispatch_lifted(action) {
                    warn!(action = %kind, error = %e, "lifted dispatch failed");
                }
            }
            IncomingCommand::Unknown => {
                debug!("ignoring unknown devtools command");
            }
        }
    }

    /// Replace the lifted history without a change notification; the caller
    /// relays the result exactly once.
    fn import(&mut self, serialized: &str) -> Result<(), ImportError> {
        let value = self.session.codec.parse(serialized)?;
        let next: LiftedState = serde_json::from_value(value).map_err(ImportError::Shape)?;
        self.store.dispatch_lifted(LiftedAction::ImportState {
            next_lifted_state: Box::new(next),
        })?;
        Ok(())
    }

    fn remote_action(&mut self, spec: &ActionSpec) -> Result<(), RemoteActionError> {
        let action = eval_action(spec, self.session.action_creators())?;
        self.dispatch(action)?;
        Ok(())
    }
}

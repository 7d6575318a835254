//! Wire types exchanged with the remote devtools client.
//!
//! Outbound: `{ "__IS_REDUX_NATIVE_MESSAGE__": true, "content": RelayMessage }`
//!
//! Inbound: `{ "method": "emitReduxMessage", "content": IncomingCommand }`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::action::{Action, LiftedAction};

/// Fixed channel identifier carried by every outbound message.
pub const CHANNEL_ID: &str = "redux-native-devtools";

/// Inbound envelope method that carries devtools commands.
pub const EMIT_METHOD: &str = "emitReduxMessage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Init,
    State,
    Action,
    Error,
}

/// Message sent to the remote client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_excess: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action_id: Option<u64>,
}

impl RelayMessage {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            id: CHANNEL_ID.to_string(),
            payload: None,
            action: None,
            is_excess: None,
            next_action_id: None,
        }
    }
}

/// What actually goes on the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    #[serde(rename = "__IS_REDUX_NATIVE_MESSAGE__")]
    pub is_native_message: bool,
    pub content: RelayMessage,
}

impl From<RelayMessage> for OutboundEnvelope {
    fn from(content: RelayMessage) -> Self {
        Self {
            is_native_message: true,
            content,
        }
    }
}

/// A remote action specification, evaluated against the action-creator registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionSpec {
    /// Object-literal source text, e.g. `{type: 'INCREMENT'}`.
    Expression(String),
    /// Invocation of a registered action creator.
    Call(CreatorCall),
    /// An already-concrete action object.
    Literal(Action),
    /// Anything else, including a missing payload. Evaluates to an error.
    Unsupported(Value),
}

impl Default for ActionSpec {
    fn default() -> Self {
        ActionSpec::Unsupported(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorCall {
    /// Index into the resolved registry.
    pub selected: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument source texts.
    #[serde(default)]
    pub args: Vec<String>,
    /// Source text of an array spread after `args`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<String>,
}

/// Commands issued by the remote client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum IncomingCommand {
    /// Replace the lifted state with a serialized one.
    Import { state: String },
    /// Ask for a fresh filtered snapshot.
    Update,
    Action {
        #[serde(default)]
        action: ActionSpec,
    },
    /// Dispatch a control action straight on the lifted store.
    Dispatch { action: LiftedAction },
    #[serde(other)]
    Unknown,
}

/// Raw inbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub method: String,
    #[serde(default)]
    pub content: Value,
}

impl InboundEnvelope {
    /// Wrap a command the way the remote client does.
    pub fn emit(command: &IncomingCommand) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: EMIT_METHOD.to_string(),
            content: serde_json::to_value(command)?,
        })
    }

    /// Decode the carried command.
    ///
    /// Envelopes for other methods, and contents that do not decode, yield
    /// `None`.
    pub fn command(&self) -> Option<IncomingCommand> {
        if self.method != EMIT_METHOD {
            debug!(method = %self.method, "ignoring envelope for another method");
            return None;
        }
        match serde_json::from_value::<IncomingCommand>(self.content.clone()) {
            Ok(command) => Some(command),
            Err(e) => {
                warn!(error = %e, "malformed devtools command, skipping");
                None
            }
        }
    }
}

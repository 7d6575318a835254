//! Outbound message encoding.
//!
//! Every relay is a single fire-and-forget post on the session's transport.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::action::{ActionRecord, now_millis};
use crate::creators::CreatorDescriptor;
use crate::error::CodecError;
use crate::filter::is_filtered;
use crate::lifted::LiftedState;
use crate::projection::project;
use crate::protocol::{MessageType, OutboundEnvelope, RelayMessage};
use crate::session::Session;

/// Extra value carried in the `action` field of a relay.
#[derive(Debug, Clone)]
pub enum Attachment<'a> {
    /// A recorded action; subject to filtering.
    Record(&'a ActionRecord),
    Value(Value),
}

impl Session {
    /// Build and post one message.
    ///
    /// Nothing is sent when filters are configured and the attachment is a
    /// filtered record. Messages that fail to encode are dropped.
    pub fn relay<S>(
        &self,
        kind: MessageType,
        state: Option<&S>,
        attachment: Option<Attachment<'_>>,
        next_action_id: Option<u64>,
    ) where
        S: Serialize + ?Sized,
    {
        if let (Some(filters), Some(Attachment::Record(record))) = (&self.filters, &attachment) {
            if is_filtered(Some(*record), filters) {
                debug!(action_type = ?record.action_type(), "filtered action not relayed");
                return;
            }
        }

        match self.encode(kind, state, attachment, next_action_id) {
            Ok(message) => self.transport.post(OutboundEnvelope::from(message)),
            Err(e) => warn!(kind = ?kind, error = %e, "failed to encode relay message, dropping"),
        }
    }

    fn encode<S>(
        &self,
        kind: MessageType,
        state: Option<&S>,
        attachment: Option<Attachment<'_>>,
        next_action_id: Option<u64>,
    ) -> Result<RelayMessage, CodecError>
    where
        S: Serialize + ?Sized,
    {
        let mut message = RelayMessage::new(kind);

        if let Some(state) = state {
            let value = serde_json::to_value(state).map_err(CodecError::Serialize)?;
            message.payload = Some(match (kind, value) {
                (MessageType::Error, Value::String(raw)) => raw,
                (MessageType::Error, other) => other.to_string(),
                (_, value) => self.codec.stringify(&value)?,
            });
        }

        let attached = match attachment {
            Some(Attachment::Record(record)) => {
                Some(serde_json::to_value(record).map_err(CodecError::Serialize)?)
            }
            Some(Attachment::Value(value)) => Some(value),
            None => None,
        };

        if kind == MessageType::Action {
            message.action = attached.map(|a| self.codec.stringify(&a)).transpose()?;
            message.is_excess = Some(self.is_excess);
            message.next_action_id = next_action_id;
        } else if let Some(attached) = attached {
            message.action = Some(self.codec.stringify(&attached)?);
        }

        Ok(message)
    }

    /// Initial state notification, stamped with the current time.
    pub fn relay_init(&self, state: &Value) {
        self.relay(
            MessageType::Init,
            Some(state),
            Some(Attachment::Value(json!({ "timestamp": now_millis() }))),
            None,
        );
    }

    /// Full filtered snapshot, optionally advertising the action creators.
    pub fn relay_state(&self, lifted: &LiftedState, creators: Option<&[CreatorDescriptor]>) {
        let projected = project(lifted, self.filters.as_ref());
        let attachment = match creators.map(serde_json::to_value).transpose() {
            Ok(value) => value.map(Attachment::Value),
            Err(e) => {
                warn!(error = %e, "failed to encode action creators");
                None
            }
        };
        self.relay(MessageType::State, Some(projected.as_ref()), attachment, None);
    }

    pub fn relay_action(&self, state: &Value, record: &ActionRecord, next_action_id: u64) {
        self.relay(
            MessageType::Action,
            Some(state),
            Some(Attachment::Record(record)),
            Some(next_action_id),
        );
    }

    pub fn relay_error(&self, message: &str) {
        self.relay(MessageType::Error, Some(message), None, None);
    }
}

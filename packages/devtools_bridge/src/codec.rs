//! Serialization codec for payloads carried inside relay messages.

use serde_json::Value;

use crate::error::CodecError;

/// Turns values into the string payloads the remote client expects, and back.
pub trait Codec: Send + Sync {
    fn stringify(&self, value: &Value) -> Result<String, CodecError>;
    fn parse(&self, text: &str) -> Result<Value, CodecError>;
}

/// Plain JSON text.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn stringify(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::Serialize)
    }

    fn parse(&self, text: &str) -> Result<Value, CodecError> {
        serde_json::from_str(text).map_err(CodecError::Parse)
    }
}

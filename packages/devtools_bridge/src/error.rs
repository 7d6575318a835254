//! Error types for the bridge and its collaborators.

/// Failures reported by an instrumented store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Mirrors the container's own guard: every dispatched action needs a type.
    #[error("Actions may not have an undefined \"type\" property")]
    MissingActionType,

    #[error("invalid lifted state: {0}")]
    InvalidLiftedState(String),
}

/// Failures while turning a remote action specification into a concrete action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("no action creators registered")]
    NoActionCreators,

    #[error("no action creator at index {0}")]
    UnknownCreator(usize),

    #[error("{0} is not a function")]
    NotAFunction(String),

    #[error("invalid argument `{arg}`: {reason}")]
    InvalidArgument { arg: String, reason: String },

    #[error("rest must be an array")]
    RestNotArray,

    #[error("invalid action expression: {0}")]
    InvalidExpression(String),

    /// The payload is neither an expression, a creator call nor an action object.
    #[error("unsupported action payload: {0}")]
    UnsupportedPayload(String),

    /// Raised by the creator itself; the message is relayed verbatim.
    #[error("{0}")]
    Creator(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to serialize: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to parse: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Configuration problems detected while building a session.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid {list} pattern: {source}")]
    InvalidFilter {
        list: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

//! Bridge between an instrumented state container and a remote devtools
//! client.
//!
//! [`enhance`] wraps a store creator: the resulting [`DevtoolsStore`] relays
//! every change to the remote client as INIT, ACTION or STATE messages, and
//! applies the client's IMPORT, UPDATE, ACTION and DISPATCH commands.
//! Filters and a `max_age` bound shape what the client sees.
//!
//! ```no_run
//! use devtools_bridge::{Action, BridgeOptions, Instrument, enhance, transport};
//! use serde_json::{Value, json};
//!
//! let (transport, _inbound, _remote) = transport::channel();
//! let mut store = enhance(
//!     BridgeOptions::default(),
//!     transport,
//!     Instrument::creator(|state: &Value, _action: &Action| Ok(state.clone()), json!(0)),
//! )
//! .unwrap();
//! store.dispatch(Action::new("PING")).unwrap();
//! ```

pub mod action;
pub mod actor;
pub mod codec;
pub mod config;
pub mod creators;
mod dispatch;
pub mod error;
pub mod filter;
pub mod instrument;
pub mod lifted;
pub mod monitor;
pub mod projection;
pub mod protocol;
mod relay;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use action::{Action, ActionRecord, LiftedAction, LiftedActionKind};
pub use actor::{BridgeActor, BridgeHandle};
pub use codec::{Codec, JsonCodec};
pub use config::BridgeFileConfig;
pub use creators::{ActionCreator, ActionCreatorSource, CreatorTree, get_actions_array};
pub use error::{BridgeError, CodecError, EvalError, StoreError};
pub use filter::{FilterConfig, Filters, is_filtered};
pub use instrument::{Instrument, InstrumentOptions, InstrumentedStore};
pub use lifted::{ComputedState, LiftedState};
pub use monitor::{ActionTracker, ChangeKind};
pub use projection::project;
pub use protocol::{IncomingCommand, MessageType, RelayMessage};
pub use relay::Attachment;
pub use session::{BridgeOptions, DevtoolsStore, Session, StoreCreator, enhance};
pub use transport::Transport;

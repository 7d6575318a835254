//! Shared fixtures for unit tests.

use serde_json::Value;

use crate::action::Action;
use crate::creators::CreatorTree;
use crate::instrument::Instrument;
use crate::monitor::ActionTracker;
use crate::session::{BridgeOptions, DevtoolsStore, Session, enhance};
use crate::transport::{InboundReceiver, RemoteEnd, channel};

/// Integer counter. `amount` defaults to 1; `EXPLODE` fails.
pub fn counter_reducer(state: &Value, action: &Action) -> Result<Value, String> {
    let count = state.as_i64().unwrap_or(0);
    let amount = action
        .get("amount")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(1);
    match action.action_type() {
        Some("INCREMENT") => Ok(Value::from(count + amount)),
        Some("DECREMENT") => Ok(Value::from(count - amount)),
        Some("RESET") => Ok(Value::from(0)),
        Some("EXPLODE") => Err("boom".to_string()),
        _ => Ok(state.clone()),
    }
}

pub fn counter_creators() -> CreatorTree {
    CreatorTree::new()
        .creator("decrement", &[], |_| Ok(Action::new("DECREMENT")))
        .creator("increment", &["amount"], |args| {
            let mut action = Action::new("INCREMENT");
            if let Some(amount) = args.first() {
                action = action.with("amount", amount.clone());
            }
            Ok(action)
        })
        .creator("reset", &[], |_| Ok(Action::new("RESET")))
}

pub fn session_with(options: BridgeOptions) -> (Session, RemoteEnd) {
    let (transport, _inbound, remote) = channel();
    let session = Session::configure(options, transport).unwrap();
    (session, remote)
}

/// A counter store started behind an in-process channel.
pub fn wired(
    options: BridgeOptions,
) -> (DevtoolsStore<Instrument<ActionTracker>>, InboundReceiver, RemoteEnd) {
    let (transport, inbound, remote) = channel();
    let store = enhance(
        options,
        transport,
        Instrument::creator(counter_reducer, Value::from(0)),
    )
    .unwrap();
    (store, inbound, remote)
}

//! Session state and the store enhancer.
//!
//! [`enhance`] builds the instrumented store around an [`ActionTracker`],
//! configures a [`Session`] and starts it. The returned [`DevtoolsStore`]
//! runs the change monitor after every dispatch, so relays go out in the
//! order the store observed the changes.

use std::borrow::Cow;

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::action::{Action, LiftedAction};
use crate::codec::{Codec, JsonCodec};
use crate::creators::{ActionCreator, ActionCreatorSource, ActionCreators, CreatorDescriptor};
use crate::error::{BridgeError, StoreError};
use crate::filter::{FilterConfig, Filters};
use crate::instrument::{InstrumentOptions, InstrumentedStore};
use crate::lifted::LiftedState;
use crate::monitor::{ActionTracker, ChangeKind};
use crate::projection::project;
use crate::transport::Transport;

/// Staged actions kept when no `max_age` is configured.
pub const DEFAULT_MAX_AGE: usize = 30;

/// Options accepted by [`enhance`].
#[derive(Default)]
pub struct BridgeOptions {
    /// Falls back to [`DEFAULT_MAX_AGE`] when unset or zero.
    pub max_age: Option<usize>,
    pub filters: Option<FilterConfig>,
    pub action_creators: Option<ActionCreatorSource>,
    /// Defaults to [`JsonCodec`].
    pub codec: Option<Box<dyn Codec>>,
}

impl BridgeOptions {
    pub fn max_age(&self) -> usize {
        self.max_age
            .filter(|age| *age > 0)
            .unwrap_or(DEFAULT_MAX_AGE)
    }
}

/// Per-store devtools session.
pub struct Session {
    pub(crate) id: Uuid,
    pub(crate) filters: Option<Filters>,
    pub(crate) is_excess: bool,
    pub(crate) started: bool,
    pub(crate) action_creators: Option<ActionCreators>,
    pub(crate) max_age: usize,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) codec: Box<dyn Codec>,
}

impl Session {
    pub fn configure<T>(options: BridgeOptions, transport: T) -> Result<Self, BridgeError>
    where
        T: Transport + 'static,
    {
        let max_age = options.max_age();
        let filters = options.filters.as_ref().map(FilterConfig::compile).transpose()?;
        Ok(Self {
            id: Uuid::new_v4(),
            filters,
            is_excess: false,
            started: false,
            action_creators: options.action_creators.map(ActionCreators::new),
            max_age,
            transport: Box::new(transport),
            codec: options.codec.unwrap_or_else(|| Box::new(JsonCodec)),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_excess(&self) -> bool {
        self.is_excess
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn max_age(&self) -> usize {
        self.max_age
    }

    pub fn filters(&self) -> Option<&Filters> {
        self.filters.as_ref()
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// The flattened registry, resolving a deferred source on first use.
    pub fn action_creators(&mut self) -> Option<&[ActionCreator]> {
        self.action_creators.as_mut().map(ActionCreators::resolve)
    }
}

/// Creates the instrumented store the session wraps.
pub trait StoreCreator {
    type Store: InstrumentedStore<Monitor = ActionTracker>;

    fn create(self, monitor: ActionTracker, options: InstrumentOptions) -> Self::Store;
}

impl<F, S> StoreCreator for F
where
    F: FnOnce(ActionTracker, InstrumentOptions) -> S,
    S: InstrumentedStore<Monitor = ActionTracker>,
{
    type Store = S;

    fn create(self, monitor: ActionTracker, options: InstrumentOptions) -> S {
        self(monitor, options)
    }
}

/// An instrumented store wired to a devtools session.
pub struct DevtoolsStore<S> {
    pub(crate) store: S,
    pub(crate) session: Session,
}

impl<S> DevtoolsStore<S>
where
    S: InstrumentedStore<Monitor = ActionTracker>,
{
    pub fn new(store: S, session: Session) -> Self {
        Self { store, session }
    }

    /// Send the first snapshot. Returns `false` if the session was already
    /// started.
    pub fn start(&mut self) -> bool {
        if self.session.started {
            return false;
        }
        self.session.started = true;

        let creators: Option<Vec<CreatorDescriptor>> = self
            .session
            .action_creators()
            .map(|registry| registry.iter().map(ActionCreator::descriptor).collect());
        self.session
            .relay_state(self.store.lifted_state(), creators.as_deref());

        info!(
            session = %self.session.id,
            max_age = self.session.max_age,
            filtered = self.session.filters.is_some(),
            "devtools session started"
        );
        true
    }

    pub fn get_state(&self) -> &Value {
        self.store.get_state()
    }

    pub fn lifted_state(&self) -> &LiftedState {
        self.store.lifted_state()
    }

    /// The lifted state as the remote client sees it.
    pub fn filtered_lifted_state(&self) -> Cow<'_, LiftedState> {
        project(self.store.lifted_state(), self.session.filters.as_ref())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatch(&mut self, action: Action) -> Result<ChangeKind, StoreError> {
        self.store.dispatch(action)?;
        Ok(self.notify())
    }

    pub fn dispatch_lifted(&mut self, action: LiftedAction) -> Result<ChangeKind, StoreError> {
        self.store.dispatch_lifted(action)?;
        Ok(self.notify())
    }

    fn notify(&mut self) -> ChangeKind {
        let store = &self.store;
        self.session.handle_change(
            store.get_state(),
            store.lifted_state(),
            store.monitor_state().last_action(),
        )
    }
}

/// Build the instrumented store through `next`, start the session and
/// return the wired store.
pub fn enhance<C, T>(options: BridgeOptions, transport: T, next: C) -> Result<DevtoolsStore<C::Store>, BridgeError>
where
    C: StoreCreator,
    T: Transport + 'static,
{
    let max_age = options.max_age();
    let session = Session::configure(options, transport)?;
    let store = next.create(ActionTracker::default(), InstrumentOptions { max_age });
    let mut devtools = DevtoolsStore::new(store, session);
    devtools.start();
    Ok(devtools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creators::{ActionCreatorSource, CreatorTree};
    use crate::protocol::MessageType;
    use crate::test_helpers::{counter_creators, wired};
    use serde_json::json;

    #[test]
    fn max_age_defaults_to_thirty() {
        assert_eq!(BridgeOptions::default().max_age(), 30);
        let zero = BridgeOptions {
            max_age: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.max_age(), 30);
        let five = BridgeOptions {
            max_age: Some(5),
            ..Default::default()
        };
        assert_eq!(five.max_age(), 5);
    }

    #[test]
    fn enhance_sends_one_initial_snapshot() {
        let (mut store, _inbound, mut remote) = wired(BridgeOptions::default());
        assert!(store.session().is_started());

        let messages = remote.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageType::State);
        let sent: LiftedState = serde_json::from_str(messages[0].payload.as_deref().unwrap()).unwrap();
        assert_eq!(&sent, store.lifted_state());

        assert!(!store.start());
        assert!(remote.drain().is_empty());
    }

    #[test]
    fn initial_snapshot_advertises_action_creators() {
        let (store, _inbound, mut remote) = wired(BridgeOptions {
            action_creators: Some(ActionCreatorSource::deferred(counter_creators)),
            ..Default::default()
        });
        assert!(
            store
                .session()
                .action_creators
                .as_ref()
                .is_some_and(ActionCreators::is_resolved)
        );

        let msg = remote.drain().remove(0);
        let creators: Vec<CreatorDescriptor> =
            serde_json::from_str(msg.action.as_deref().unwrap()).unwrap();
        let names: Vec<_> = creators.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["decrement", "increment", "reset"]);
        assert_eq!(creators[1].args, vec!["amount"]);
    }

    #[test]
    fn invalid_filters_fail_configuration() {
        let (transport, _inbound, _remote) = crate::transport::channel();
        let result = Session::configure(
            BridgeOptions {
                filters: Some(FilterConfig::whitelist(["[unclosed"])),
                ..Default::default()
            },
            transport,
        );
        assert!(matches!(result, Err(BridgeError::InvalidFilter { .. })));
    }

    #[test]
    fn local_dispatch_is_relayed_as_action() {
        let (mut store, _inbound, mut remote) = wired(BridgeOptions::default());
        remote.drain();

        let kind = store.dispatch(Action::new("INCREMENT")).unwrap();
        assert_eq!(kind, ChangeKind::Action);
        assert_eq!(store.get_state(), &json!(1));

        let msg = remote.drain().remove(0);
        assert_eq!(msg.kind, MessageType::Action);
        assert_eq!(msg.payload.as_deref(), Some("1"));
        assert_eq!(msg.next_action_id, Some(2));
    }

    #[test]
    fn empty_creator_tree_advertises_empty_list() {
        let (_store, _inbound, mut remote) = wired(BridgeOptions {
            action_creators: Some(CreatorTree::new().into()),
            ..Default::default()
        });
        let msg = remote.drain().remove(0);
        assert_eq!(msg.action.as_deref(), Some("[]"));
    }
}

//! Change monitor: decides what each store change means for the remote client.

use serde_json::Value;
use tracing::{debug, warn};

use crate::action::{LiftedAction, LiftedActionKind};
use crate::instrument::MonitorReducer;
use crate::lifted::LiftedState;
use crate::session::Session;

/// Monitor reducer that remembers the kind of the last lifted action,
/// whether or not that action ends up relayed.
#[derive(Clone, Debug, Default)]
pub struct ActionTracker {
    last: Option<LiftedActionKind>,
}

impl ActionTracker {
    pub fn last_action(&self) -> Option<LiftedActionKind> {
        self.last
    }
}

impl MonitorReducer for ActionTracker {
    fn reduce(&mut self, action: &LiftedAction) {
        self.last = Some(action.kind());
    }
}

/// Outcome of one change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// History is back at the init record; relayed as INIT.
    Init,
    /// Ordinary action; relayed as ACTION.
    Action,
    /// Time-travel navigation; nothing relayed.
    Navigation,
    /// Administrative change; relayed as a full STATE snapshot.
    Resync,
    /// The newest action id has no record.
    Missing,
}

impl Session {
    /// Classify a change and relay accordingly.
    ///
    /// After an ACTION relay the excess flag latches once the staged history
    /// reaches `max_age`; it is never cleared.
    pub fn handle_change(
        &mut self,
        state: &Value,
        lifted: &LiftedState,
        last: Option<LiftedActionKind>,
    ) -> ChangeKind {
        let next_action_id = lifted.next_action_id;
        let Some(record) = lifted.last_record() else {
            warn!(next_action_id, "latest action has no record, skipping relay");
            return ChangeKind::Missing;
        };

        if record.action.is_init() {
            self.relay_init(state);
            return ChangeKind::Init;
        }

        if last.is_some_and(LiftedActionKind::is_monitor_internal) {
            self.relay_state(lifted, None);
            return ChangeKind::Resync;
        }

        if last.is_some_and(LiftedActionKind::is_local_navigation) {
            return ChangeKind::Navigation;
        }

        self.relay_action(state, record, next_action_id);
        if !self.is_excess && self.max_age > 0 {
            self.is_excess = lifted.staged_action_ids.len() >= self.max_age;
            if self.is_excess {
                debug!(
                    staged = lifted.staged_action_ids.len(),
                    max_age = self.max_age,
                    "action history reached max age"
                );
            }
        }
        ChangeKind::Action
    }
}

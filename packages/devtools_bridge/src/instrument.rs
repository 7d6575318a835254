//! Instrumented store: keeps every dispatched action and the state computed
//! after it, and accepts time-travel control actions.
//!
//! The bridge only talks to the [`InstrumentedStore`] trait; [`Instrument`]
//! is the in-process engine used by hosts that do not bring their own.

use serde_json::Value;
use tracing::debug;

use crate::action::{Action, ActionRecord, LiftedAction, now_millis};
use crate::error::StoreError;
use crate::lifted::{ComputedState, LiftedState};

/// Application reducer. An `Err` is recorded on the computed state instead of
/// aborting the dispatch.
pub type Reducer = Box<dyn Fn(&Value, &Action) -> Result<Value, String> + Send + Sync>;

const INTERRUPTED: &str = "Interrupted by an error up the chain";

static NULL: Value = Value::Null;

/// Observes every lifted action the store processes.
pub trait MonitorReducer {
    fn reduce(&mut self, action: &LiftedAction);
}

pub trait InstrumentedStore {
    type Monitor: MonitorReducer;

    /// Application state at the current history position.
    fn get_state(&self) -> &Value;
    fn lifted_state(&self) -> &LiftedState;
    fn monitor_state(&self) -> &Self::Monitor;
    fn dispatch(&mut self, action: Action) -> Result<(), StoreError>;
    fn dispatch_lifted(&mut self, action: LiftedAction) -> Result<(), StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstrumentOptions {
    /// Staged actions kept before the oldest are committed; 0 keeps everything.
    pub max_age: usize,
}

pub struct Instrument<M> {
    reducer: Reducer,
    initial_committed_state: Value,
    lifted: LiftedState,
    monitor: M,
    max_age: usize,
}

impl<M: MonitorReducer> Instrument<M> {
    pub fn new<R>(reducer: R, preloaded_state: Value, mut monitor: M, options: InstrumentOptions) -> Self
    where
        R: Fn(&Value, &Action) -> Result<Value, String> + Send + Sync + 'static,
    {
        let reducer: Reducer = Box::new(reducer);
        monitor.reduce(&LiftedAction::Init);
        let init = compute(&reducer, &ComputedState::ok(preloaded_state.clone()), &Action::init());
        let lifted = LiftedState::initial(preloaded_state.clone(), init, now_millis());
        Self {
            reducer,
            initial_committed_state: preloaded_state,
            lifted,
            monitor,
            max_age: options.max_age,
        }
    }

    /// Store creator closure for [`crate::enhance`].
    pub fn creator<R>(reducer: R, preloaded_state: Value) -> impl FnOnce(M, InstrumentOptions) -> Self
    where
        R: Fn(&Value, &Action) -> Result<Value, String> + Send + Sync + 'static,
    {
        move |monitor, options| Self::new(reducer, preloaded_state, monitor, options)
    }

    fn check(&self, action: &LiftedAction) -> Result<(), StoreError> {
        match action {
            LiftedAction::PerformAction { action, .. } if action.action_type().is_none() => {
                Err(StoreError::MissingActionType)
            }
            LiftedAction::ImportState { next_lifted_state } => next_lifted_state.validate(),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, action: LiftedAction) {
        match action {
            LiftedAction::PerformAction { action, timestamp } => self.perform(action, timestamp),
            LiftedAction::Reset => self.restart(self.initial_committed_state.clone()),
            LiftedAction::Commit => {
                let committed = self.get_state().clone();
                self.restart(committed);
            }
            LiftedAction::Rollback => self.restart(self.lifted.committed_state.clone()),
            LiftedAction::ToggleAction { id } => {
                if id == 0 {
                    return;
                }
                let Some(index) = self.position(id) else {
                    return;
                };
                let skipped = &mut self.lifted.skipped_action_ids;
                if let Some(pos) = skipped.iter().position(|s| *s == id) {
                    skipped.remove(pos);
                } else {
                    skipped.push(id);
                }
                self.recompute(index);
            }
            LiftedAction::SetActionsActive { start, end, active } => {
                let ids: Vec<u64> = self
                    .lifted
                    .staged_action_ids
                    .iter()
                    .copied()
                    .filter(|id| *id != 0 && (start..end).contains(id))
                    .collect();
                let Some(index) = ids.first().and_then(|id| self.position(*id)) else {
                    return;
                };
                let skipped = &mut self.lifted.skipped_action_ids;
                skipped.retain(|id| !ids.contains(id));
                if !active {
                    skipped.extend(ids);
                }
                self.recompute(index);
            }
            LiftedAction::Sweep => {
                let lifted = &mut self.lifted;
                let base = lifted.staged_action_ids.first().copied();
                let skipped: Vec<u64> = std::mem::take(&mut lifted.skipped_action_ids)
                    .into_iter()
                    .filter(|id| Some(*id) != base)
                    .collect();
                lifted.staged_action_ids.retain(|id| !skipped.contains(id));
                for id in &skipped {
                    lifted.actions_by_id.remove(id);
                }
                lifted.current_state_index = lifted
                    .current_state_index
                    .min(lifted.staged_action_ids.len().saturating_sub(1));
                self.recompute(0);
            }
            LiftedAction::JumpToState { index } => self.jump(index),
            LiftedAction::JumpToAction { action_id } => {
                if let Some(index) = self.position(action_id) {
                    self.jump(index);
                }
            }
            LiftedAction::ImportState { next_lifted_state } => {
                debug!(
                    staged = next_lifted_state.staged_action_ids.len(),
                    "importing lifted state"
                );
                self.lifted = *next_lifted_state;
            }
            LiftedAction::Init => {}
        }
    }

    fn perform(&mut self, action: Action, timestamp: i64) {
        let lifted = &mut self.lifted;
        let following = lifted.current_state_index + 1 == lifted.staged_action_ids.len();
        let id = lifted.next_action_id;
        lifted.next_action_id += 1;
        lifted.actions_by_id.insert(
            id,
            ActionRecord {
                id,
                action,
                timestamp,
            },
        );
        lifted.staged_action_ids.push(id);
        let index = lifted.staged_action_ids.len() - 1;
        if following {
            lifted.current_state_index = index;
        }
        self.recompute(index);

        let staged = self.lifted.staged_action_ids.len();
        if self.max_age > 0 && staged > self.max_age {
            self.commit_excess(staged - self.max_age);
        }
    }

    /// Fold the `excess` oldest actions after the init record into the
    /// committed state.
    fn commit_excess(&mut self, excess: usize) {
        let lifted = &mut self.lifted;
        let excess = excess.min(lifted.staged_action_ids.len() - 1);
        if excess == 0 {
            return;
        }
        let removed: Vec<u64> = lifted.staged_action_ids.drain(1..=excess).collect();
        for id in &removed {
            lifted.actions_by_id.remove(id);
        }
        lifted.skipped_action_ids.retain(|id| !removed.contains(id));
        lifted.committed_state = lifted.computed_states[excess].state.clone();
        lifted.computed_states.drain(..excess);
        lifted.current_state_index = lifted.current_state_index.saturating_sub(excess);
        debug!(excess, "committed actions beyond max age");
    }

    fn restart(&mut self, committed_state: Value) {
        let init = compute(&self.reducer, &ComputedState::ok(committed_state.clone()), &Action::init());
        self.lifted = LiftedState::initial(committed_state, init, now_millis());
    }

    fn jump(&mut self, index: usize) {
        if index < self.lifted.staged_action_ids.len() {
            self.lifted.current_state_index = index;
        } else {
            debug!(index, "jump target outside history, ignoring");
        }
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.lifted.staged_action_ids.iter().position(|s| *s == id)
    }

    /// Recompute computed states from `from` to the end of the history.
    fn recompute(&mut self, from: usize) {
        let lifted = &mut self.lifted;
        lifted.computed_states.truncate(from);
        for index in from..lifted.staged_action_ids.len() {
            let id = lifted.staged_action_ids[index];
            let previous = match index {
                0 => ComputedState::ok(lifted.committed_state.clone()),
                _ => lifted.computed_states[index - 1].clone(),
            };
            let next = match lifted.actions_by_id.get(&id) {
                Some(record) if !lifted.skipped_action_ids.contains(&id) => {
                    compute(&self.reducer, &previous, &record.action)
                }
                _ => previous,
            };
            lifted.computed_states.push(next);
        }
    }
}

fn compute(reducer: &Reducer, previous: &ComputedState, action: &Action) -> ComputedState {
    if previous.error.is_some() {
        return ComputedState {
            state: previous.state.clone(),
            error: Some(INTERRUPTED.to_string()),
        };
    }
    match reducer(&previous.state, action) {
        Ok(state) => ComputedState::ok(state),
        Err(error) => ComputedState {
            state: previous.state.clone(),
            error: Some(error),
        },
    }
}

impl<M: MonitorReducer> InstrumentedStore for Instrument<M> {
    type Monitor = M;

    fn get_state(&self) -> &Value {
        self.lifted.current_state().unwrap_or(&NULL)
    }

    fn lifted_state(&self) -> &LiftedState {
        &self.lifted
    }

    fn monitor_state(&self) -> &M {
        &self.monitor
    }

    fn dispatch(&mut self, action: Action) -> Result<(), StoreError> {
        self.dispatch_lifted(LiftedAction::perform(action))
    }

    fn dispatch_lifted(&mut self, action: LiftedAction) -> Result<(), StoreError> {
        self.check(&action)?;
        self.monitor.reduce(&action);
        self.apply(action);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::LiftedActionKind;
    use crate::test_helpers::counter_reducer;
    use serde_json::json;

    #[derive(Default)]
    struct Seen(Vec<LiftedActionKind>);

    impl MonitorReducer for Seen {
        fn reduce(&mut self, action: &LiftedAction) {
            self.0.push(action.kind());
        }
    }

    fn store(max_age: usize) -> Instrument<Seen> {
        Instrument::new(counter_reducer, json!(0), Seen::default(), InstrumentOptions { max_age })
    }

    fn inc(store: &mut Instrument<Seen>) {
        store.dispatch(Action::new("INCREMENT")).unwrap();
    }

    #[test]
    fn records_actions_and_states() {
        let mut s = store(0);
        inc(&mut s);
        inc(&mut s);
        assert_eq!(s.get_state(), &json!(2));
        let lifted = s.lifted_state();
        assert_eq!(lifted.staged_action_ids, vec![0, 1, 2]);
        assert_eq!(lifted.next_action_id, 3);
        lifted.validate().unwrap();
        assert_eq!(
            s.monitor_state().0,
            vec![
                LiftedActionKind::Init,
                LiftedActionKind::PerformAction,
                LiftedActionKind::PerformAction
            ]
        );
    }

    #[test]
    fn rejects_untyped_actions_without_touching_history() {
        let mut s = store(0);
        assert_eq!(s.dispatch(Action::default()), Err(StoreError::MissingActionType));
        assert_eq!(s.lifted_state().next_action_id, 1);
        assert_eq!(s.monitor_state().0.len(), 1);
    }

    #[test]
    fn max_age_commits_oldest_actions() {
        let mut s = store(3);
        for _ in 0..5 {
            inc(&mut s);
        }
        let lifted = s.lifted_state();
        assert_eq!(lifted.staged_action_ids, vec![0, 4, 5]);
        assert_eq!(lifted.committed_state, json!(3));
        assert_eq!(s.get_state(), &json!(5));
        lifted.validate().unwrap();
    }

    #[test]
    fn toggle_and_sweep() {
        let mut s = store(0);
        inc(&mut s);
        inc(&mut s);
        s.dispatch_lifted(LiftedAction::ToggleAction { id: 1 }).unwrap();
        assert_eq!(s.get_state(), &json!(1));

        s.dispatch_lifted(LiftedAction::Sweep).unwrap();
        assert_eq!(s.lifted_state().staged_action_ids, vec![0, 2]);
        assert_eq!(s.get_state(), &json!(1));
        s.lifted_state().validate().unwrap();
    }

    #[test]
    fn set_actions_active_skips_a_range() {
        let mut s = store(0);
        for _ in 0..3 {
            inc(&mut s);
        }
        s.dispatch_lifted(LiftedAction::SetActionsActive {
            start: 1,
            end: 3,
            active: false,
        })
        .unwrap();
        assert_eq!(s.lifted_state().skipped_action_ids, vec![1, 2]);
        assert_eq!(s.get_state(), &json!(1));
    }

    #[test]
    fn jump_moves_current_index_only() {
        let mut s = store(0);
        inc(&mut s);
        inc(&mut s);
        s.dispatch_lifted(LiftedAction::JumpToState { index: 1 }).unwrap();
        assert_eq!(s.get_state(), &json!(1));
        assert_eq!(s.lifted_state().staged_action_ids.len(), 3);

        s.dispatch_lifted(LiftedAction::JumpToState { index: 10 }).unwrap();
        assert_eq!(s.get_state(), &json!(1));

        // New actions while in the past do not move the cursor.
        inc(&mut s);
        assert_eq!(s.get_state(), &json!(1));
    }

    #[test]
    fn commit_and_reset() {
        let mut s = store(0);
        inc(&mut s);
        inc(&mut s);
        s.dispatch_lifted(LiftedAction::Commit).unwrap();
        assert_eq!(s.lifted_state().staged_action_ids, vec![0]);
        assert_eq!(s.get_state(), &json!(2));

        inc(&mut s);
        s.dispatch_lifted(LiftedAction::Rollback).unwrap();
        assert_eq!(s.get_state(), &json!(2));

        s.dispatch_lifted(LiftedAction::Reset).unwrap();
        assert_eq!(s.get_state(), &json!(0));
    }

    #[test]
    fn reducer_errors_interrupt_later_states() {
        let mut s = store(0);
        s.dispatch(Action::new("EXPLODE")).unwrap();
        inc(&mut s);
        let computed = &s.lifted_state().computed_states;
        assert_eq!(computed[1].error.as_deref(), Some("boom"));
        assert_eq!(computed[2].error.as_deref(), Some(INTERRUPTED));
        assert_eq!(s.get_state(), &json!(0));
    }

    #[test]
    fn import_replaces_history_after_validation() {
        let mut source = store(0);
        for _ in 0..4 {
            inc(&mut source);
        }
        let exported = source.lifted_state().clone();

        let mut s = store(0);
        s.dispatch_lifted(LiftedAction::ImportState {
            next_lifted_state: Box::new(exported.clone()),
        })
        .unwrap();
        assert_eq!(s.lifted_state(), &exported);

        let mut broken = exported;
        broken.computed_states.pop();
        let err = s
            .dispatch_lifted(LiftedAction::ImportState {
                next_lifted_state: Box::new(broken),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidLiftedState(_)));
    }
}

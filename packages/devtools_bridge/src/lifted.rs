//! Lifted state: the full action history plus every computed state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{Action, ActionRecord};
use crate::error::StoreError;

/// Application state computed after one staged action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedState {
    pub state: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComputedState {
    pub fn ok(state: Value) -> Self {
        Self { state, error: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftedState {
    pub actions_by_id: BTreeMap<u64, ActionRecord>,
    /// History order.
    pub staged_action_ids: Vec<u64>,
    #[serde(default)]
    pub skipped_action_ids: Vec<u64>,
    #[serde(default)]
    pub committed_state: Value,
    #[serde(default)]
    pub current_state_index: usize,
    /// Index-aligned with `staged_action_ids`.
    pub computed_states: Vec<ComputedState>,
    pub next_action_id: u64,
}

impl LiftedState {
    /// History holding only the init record, computed from `committed_state`.
    pub fn initial(committed_state: Value, init_state: ComputedState, timestamp: i64) -> Self {
        let mut actions_by_id = BTreeMap::new();
        actions_by_id.insert(
            0,
            ActionRecord {
                id: 0,
                action: Action::init(),
                timestamp,
            },
        );
        Self {
            actions_by_id,
            staged_action_ids: vec![0],
            skipped_action_ids: Vec::new(),
            committed_state,
            current_state_index: 0,
            computed_states: vec![init_state],
            next_action_id: 1,
        }
    }

    /// Record for the most recently assigned id (`next_action_id - 1`).
    pub fn last_record(&self) -> Option<&ActionRecord> {
        self.next_action_id
            .checked_sub(1)
            .and_then(|id| self.actions_by_id.get(&id))
    }

    pub fn current_state(&self) -> Option<&Value> {
        self.computed_states
            .get(self.current_state_index)
            .map(|c| &c.state)
    }

    pub fn is_skipped(&self, id: u64) -> bool {
        self.skipped_action_ids.contains(&id)
    }

    /// Check the structural invariants every lifted state must hold.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.staged_action_ids.len() != self.computed_states.len() {
            return Err(StoreError::InvalidLiftedState(format!(
                "{} staged actions but {} computed states",
                self.staged_action_ids.len(),
                self.computed_states.len()
            )));
        }
        if self.staged_action_ids.is_empty() {
            return Err(StoreError::InvalidLiftedState(
                "history is empty".to_string(),
            ));
        }
        for id in &self.staged_action_ids {
            if *id >= self.next_action_id {
                return Err(StoreError::InvalidLiftedState(format!(
                    "staged id {} is not below nextActionId {}",
                    id, self.next_action_id
                )));
            }
            if !self.actions_by_id.contains_key(id) {
                return Err(StoreError::InvalidLiftedState(format!(
                    "staged id {} has no recorded action",
                    id
                )));
            }
        }
        if self.current_state_index >= self.staged_action_ids.len() {
            return Err(StoreError::InvalidLiftedState(format!(
                "currentStateIndex {} out of range",
                self.current_state_index
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> LiftedState {
        LiftedState::initial(json!(0), ComputedState::ok(json!(0)), 0)
    }

    #[test]
    fn initial_state_is_valid() {
        let lifted = sample();
        lifted.validate().unwrap();
        assert_eq!(lifted.last_record().unwrap().action.action_type(), Some("@@INIT"));
        assert_eq!(lifted.current_state(), Some(&json!(0)));
    }

    #[test]
    fn wire_shape_uses_camel_case_and_string_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["nextActionId"], json!(1));
        assert_eq!(value["stagedActionIds"], json!([0]));
        assert_eq!(value["actionsById"]["0"]["action"]["type"], json!("@@INIT"));

        let back: LiftedState = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn validate_rejects_misaligned_history() {
        let mut lifted = sample();
        lifted.computed_states.push(ComputedState::ok(json!(1)));
        assert!(matches!(
            lifted.validate(),
            Err(StoreError::InvalidLiftedState(_))
        ));
    }

    #[test]
    fn validate_rejects_ids_at_or_above_next_id() {
        let mut lifted = sample();
        lifted.next_action_id = 0;
        assert!(lifted.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_staged_id() {
        let mut lifted = sample();
        lifted.staged_action_ids = vec![0, 4];
        lifted.computed_states.push(ComputedState::ok(json!(1)));
        lifted.next_action_id = 5;
        assert!(lifted.validate().is_err());
    }
}

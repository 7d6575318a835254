//! Actions, recorded actions and the closed set of lifted control actions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lifted::LiftedState;

/// Type of the synthetic action the instrumented store records at index 0.
pub const INIT_ACTION_TYPE: &str = "@@INIT";

/// An application action: `{ "type": ..., ...payload }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            payload: Map::new(),
        }
    }

    /// Builder-style payload field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn init() -> Self {
        Self::new(INIT_ACTION_TYPE)
    }

    /// The action type, treating an empty string the same as a missing one.
    pub fn action_type(&self) -> Option<&str> {
        self.kind.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_init(&self) -> bool {
        self.action_type() == Some(INIT_ACTION_TYPE)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// An action as recorded in the lifted history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: u64,
    pub action: Action,
    #[serde(default)]
    pub timestamp: i64,
}

impl ActionRecord {
    pub fn action_type(&self) -> Option<&str> {
        self.action.action_type()
    }
}

/// Control actions understood by the instrumented store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum LiftedAction {
    PerformAction {
        action: Action,
        #[serde(default)]
        timestamp: i64,
    },
    Reset,
    Rollback,
    Commit,
    Sweep,
    ToggleAction {
        id: u64,
    },
    SetActionsActive {
        start: u64,
        end: u64,
        #[serde(default = "default_active")]
        active: bool,
    },
    JumpToState {
        index: usize,
    },
    JumpToAction {
        action_id: u64,
    },
    ImportState {
        next_lifted_state: Box<LiftedState>,
    },
    #[serde(rename = "@@redux/INIT")]
    Init,
}

fn default_active() -> bool {
    true
}

impl LiftedAction {
    pub fn perform(action: Action) -> Self {
        LiftedAction::PerformAction {
            action,
            timestamp: now_millis(),
        }
    }

    pub fn kind(&self) -> LiftedActionKind {
        match self {
            LiftedAction::PerformAction { .. } => LiftedActionKind::PerformAction,
            LiftedAction::Reset => LiftedActionKind::Reset,
            LiftedAction::Rollback => LiftedActionKind::Rollback,
            LiftedAction::Commit => LiftedActionKind::Commit,
            LiftedAction::Sweep => LiftedActionKind::Sweep,
            LiftedAction::ToggleAction { .. } => LiftedActionKind::ToggleAction,
            LiftedAction::SetActionsActive { .. } => LiftedActionKind::SetActionsActive,
            LiftedAction::JumpToState { .. } => LiftedActionKind::JumpToState,
            LiftedAction::JumpToAction { .. } => LiftedActionKind::JumpToAction,
            LiftedAction::ImportState { .. } => LiftedActionKind::ImportState,
            LiftedAction::Init => LiftedActionKind::Init,
        }
    }
}

/// Field-less mirror of [`LiftedAction`], tracked by the monitor reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiftedActionKind {
    PerformAction,
    Reset,
    Rollback,
    Commit,
    Sweep,
    ToggleAction,
    SetActionsActive,
    JumpToState,
    JumpToAction,
    ImportState,
    Init,
}

impl LiftedActionKind {
    /// Bulk or administrative changes: the remote needs a full resync rather
    /// than an incremental action.
    pub fn is_monitor_internal(self) -> bool {
        matches!(
            self,
            LiftedActionKind::Init
                | LiftedActionKind::ToggleAction
                | LiftedActionKind::Sweep
                | LiftedActionKind::ImportState
                | LiftedActionKind::SetActionsActive
        )
    }

    /// Time-travel navigation that stays local and is never relayed.
    pub fn is_local_navigation(self) -> bool {
        matches!(
            self,
            LiftedActionKind::JumpToState | LiftedActionKind::JumpToAction
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LiftedActionKind::PerformAction => "PERFORM_ACTION",
            LiftedActionKind::Reset => "RESET",
            LiftedActionKind::Rollback => "ROLLBACK",
            LiftedActionKind::Commit => "COMMIT",
            LiftedActionKind::Sweep => "SWEEP",
            LiftedActionKind::ToggleAction => "TOGGLE_ACTION",
            LiftedActionKind::SetActionsActive => "SET_ACTIONS_ACTIVE",
            LiftedActionKind::JumpToState => "JUMP_TO_STATE",
            LiftedActionKind::JumpToAction => "JUMP_TO_ACTION",
            LiftedActionKind::ImportState => "IMPORT_STATE",
            LiftedActionKind::Init => "@@redux/INIT",
        }
    }
}

impl std::fmt::Display for LiftedActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

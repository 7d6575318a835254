//! Filtered view of the lifted state for transport.

use std::borrow::Cow;

use crate::filter::{Filters, is_filtered};
use crate::lifted::{ComputedState, LiftedState};

/// Drop filtered actions from the staged history, keeping `computed_states`
/// index-aligned. Without filters the input is returned as-is.
pub fn project<'a>(lifted: &'a LiftedState, filters: Option<&Filters>) -> Cow<'a, LiftedState> {
    let Some(filters) = filters else {
        return Cow::Borrowed(lifted);
    };

    let (staged_action_ids, computed_states): (Vec<u64>, Vec<ComputedState>) = lifted
        .staged_action_ids
        .iter()
        .zip(&lifted.computed_states)
        .filter(|(id, _)| !is_filtered(lifted.actions_by_id.get(*id), filters))
        .map(|(id, computed)| (*id, computed.clone()))
        .unzip();

    Cow::Owned(LiftedState {
        staged_action_ids,
        computed_states,
        ..lifted.clone()
    })
}

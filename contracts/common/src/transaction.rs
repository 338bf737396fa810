//! All-or-nothing state transitions
//!
//! Operations mutate a draft copy of the state; the draft replaces the live
//! state only when the operation returns `Ok`. A failing operation leaves no
//! trace, whichever step it failed at.

use crate::errors::YieldmillResult;

/// Run `op` against a draft of `state` and commit the draft on success
pub fn atomically<S, T, F>(state: &mut S, op: F) -> YieldmillResult<T>
where
    S: Clone,
    F: FnOnce(&mut S) -> YieldmillResult<T>,
{
    let mut draft = state.clone();
    let value = op(&mut draft)?;
    *state = draft;
    Ok(value)
}

//! Phase transition application and schedule cascading.
//!
//! Transitions are functional: the caller's phase set is never touched.
//! [`apply`] returns a fully-formed copy with the target phase transitioned
//! and every downstream phase's *planned* schedule shifted by how early or
//! late the transition actually happened. Actual timestamps of downstream
//! phases are untouched until they themselves transition.

use chrono::{DateTime, Duration, Utc};

use crate::model::{Operation, PhaseInstance};

/// The result of applying a transition.
#[derive(Debug, Clone)]
pub struct AppliedTransition {
    /// The updated copy of the whole phase set.
    pub phases: Vec<PhaseInstance>,
    /// Scheduled-minus-actual for the transition timestamp. Zero when the
    /// phase had no scheduled date to compare against.
    pub delta: Duration,
    /// Number of downstream phases whose schedule was shifted.
    pub shifted: usize,
}

/// Applies `operation` to the phase at `target_index` and cascades the
/// resulting schedule delta down the predecessor chain.
///
/// - `open`: marks the phase open, stamps `actual_start_date = now`, and
///   replans `scheduled_end_date = now + duration`.
/// - `close`: marks the phase closed and stamps `actual_end_date = now`.
///
/// The cascade shifts `scheduled_start_date` and `scheduled_end_date` of
/// every phase strictly downstream of the target by `actual - scheduled`,
/// following successor links until the chain ends. The walk is bounded by
/// the phase count, so a malformed cyclic chain cannot loop forever.
///
/// # Panics
///
/// Panics if `target_index` is out of bounds; the orchestrator resolves the
/// index before calling.
#[must_use]
pub fn apply(
    phases: &[PhaseInstance],
    target_index: usize,
    operation: Operation,
    now: DateTime<Utc>,
) -> AppliedTransition {
    let mut updated = phases.to_vec();

    let delta = {
        let phase = &mut updated[target_index];
        match operation {
            Operation::Open => {
                let original_start = phase.scheduled_start_date;
                phase.is_open = true;
                phase.actual_start_date = Some(now);
                phase.scheduled_end_date = Some(now + Duration::seconds(phase.duration));
                original_start.map_or_else(Duration::zero, |start| start - now)
            }
            Operation::Close => {
                let original_end = phase.scheduled_end_date;
                phase.is_open = false;
                phase.actual_end_date = Some(now);
                original_end.map_or_else(Duration::zero, |end| end - now)
            }
        }
    };

    let shift = -delta;
    let mut shifted = 0;
    if !shift.is_zero() {
        let mut current = updated[target_index].phase_id.clone();
        for _ in 0..updated.len() {
            let Some(next) = updated
                .iter()
                .position(|p| p.predecessor_id.as_ref() == Some(&current))
            else {
                break;
            };
            let phase = &mut updated[next];
            phase.scheduled_start_date = phase.scheduled_start_date.map(|d| d + shift);
            phase.scheduled_end_date = phase.scheduled_end_date.map(|d| d + shift);
            shifted += 1;
            current = phase.phase_id.clone();
        }
    }

    AppliedTransition {
        phases: updated,
        delta,
        shifted,
    }
}

//! Status helpers shared by the reconciler.
//!
//! Writing the owner's status bumps its resourceVersion and wakes the
//! watcher, so a status is only written when something in it changed.

use chrono::{DateTime, Utc};
use crds::{DistributionPhase, ServerDistributionStatus};

/// Check whether the status needs updating.
///
/// `lastTransitionTime` is not compared: it follows the phase.
pub fn status_needs_update(
    current_status: Option<&ServerDistributionStatus>,
    desired_phase: DistributionPhase,
    desired_message: Option<&str>,
    desired_generation: Option<i64>,
) -> bool {
    match current_status {
        None => true,
        Some(status) => {
            status.phase != desired_phase
                || status.message.as_deref() != desired_message
                || status.observed_generation != desired_generation
        }
    }
}

/// Builds the next status. The transition time moves only when the phase does.
pub fn next_status(
    current_status: Option<&ServerDistributionStatus>,
    phase: DistributionPhase,
    message: Option<String>,
    observed_generation: Option<i64>,
    now: DateTime<Utc>,
) -> ServerDistributionStatus {
    let last_transition_time = match current_status {
        Some(status) if status.phase == phase && status.last_transition_time.is_some() => {
            status.last_transition_time
        }
        _ => Some(now),
    };
    ServerDistributionStatus {
        phase,
        message,
        observed_generation,
        last_transition_time,
    }
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod reconcile_helpers_test;

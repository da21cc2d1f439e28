//! Unit tests for reconcile_helpers module

use super::*;
use chrono::TimeZone;

fn ready(generation: i64) -> ServerDistributionStatus {
    ServerDistributionStatus {
        phase: DistributionPhase::Ready,
        message: None,
        observed_generation: Some(generation),
        last_transition_time: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
    }
}

#[test]
fn test_status_needs_update_no_status() {
    assert!(status_needs_update(None, DistributionPhase::Ready, None, Some(1)));
}

#[test]
fn test_status_needs_update_all_match() {
    let status = ready(3);
    assert!(!status_needs_update(Some(&status), DistributionPhase::Ready, None, Some(3)));
}

#[test]
fn test_status_needs_update_on_each_field() {
    let status = ready(3);
    assert!(status_needs_update(Some(&status), DistributionPhase::Failed, None, Some(3)));
    assert!(status_needs_update(Some(&status), DistributionPhase::Ready, Some("boom"), Some(3)));
    assert!(status_needs_update(Some(&status), DistributionPhase::Ready, None, Some(4)));
}

#[test]
fn test_transition_time_kept_while_phase_unchanged() {
    let status = ready(3);
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

    let same = next_status(Some(&status), DistributionPhase::Ready, None, Some(4), now);
    assert_eq!(same.last_transition_time, status.last_transition_time);
    assert_eq!(same.observed_generation, Some(4));

    let failed = next_status(Some(&status), DistributionPhase::Failed, Some("x".to_string()), Some(4), now);
    assert_eq!(failed.last_transition_time, Some(now));

    let first = next_status(None, DistributionPhase::Ready, None, Some(1), now);
    assert_eq!(first.last_transition_time, Some(now));
}

//! Tests for schedule state mutations and snapshots

use super::*;
use crate::roster::WorkerProfile;

const A: WorkerId = WorkerId(1);
const B: WorkerId = WorkerId(2);
const C: WorkerId = WorkerId(3);

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

// 2025-03-03 is a Monday; 7 days, 2 posts.
fn small_state() -> ScheduleState {
    let calendar = Calendar::new(d(3), d(9)).unwrap();
    let roster = Roster::new(vec![
        WorkerProfile::new(A, 3).with_mandatory_days([d(3)]),
        WorkerProfile::new(B, 3),
        WorkerProfile::new(C, 3),
    ])
    .unwrap();
    let rows = vec![
        vec![Some(A), Some(B)],
        vec![Some(C), None],
        vec![Some(A), Some(C)],
        vec![None, Some(B)],
        vec![Some(A), None],
        vec![Some(B), Some(C)],
        vec![None, None],
    ];
    ScheduleState::from_rows(calendar, roster, rows).unwrap()
}

#[test]
fn test_from_rows_derives_assignments() {
    let state = small_state();
    assert_eq!(state.assigned_days(A).collect::<Vec<_>>(), vec![0, 2, 4]);
    assert_eq!(state.assigned_count(B), 3);
    assert_eq!(state.count_empty(), 4);
    assert!(state.verify_consistency().is_ok());
    assert_eq!(state.generation(), 0);
}

#[test]
fn test_mandatory_day_is_locked() {
    let state = small_state();
    assert!(state.is_locked(A, 0));
    assert!(!state.is_locked(A, 2));
    assert_eq!(state.locked_count(A), 1);
    assert_eq!(state.non_mandatory_count(A), 2);
    assert_eq!(state.deviation(A).unwrap(), -1);
}

#[test]
fn test_weekend_counters() {
    let state = small_state();
    // Day 4 is Friday, day 5 Saturday
    assert_eq!(state.weekend_count(A), 1);
    assert_eq!(state.weekend_count(B), 1);
    assert_eq!(state.sat_sun_count(B), 1);
    assert_eq!(state.counters(C).unwrap().weekend, 1);
}

#[test]
fn test_reassign_moves_assignment() {
    let mut state = small_state();
    let from = state.reassign(2, 0, B).unwrap();
    assert_eq!(from, A);
    assert!(state.is_assigned(B, 2));
    assert!(!state.is_assigned(A, 2));
    assert_eq!(state.post_of(B, 2), Some(0));
    assert!(state.verify_consistency().is_ok());
    assert_eq!(state.generation(), 1);
}

#[test]
fn test_reassign_locked_is_rejected_without_change() {
    let mut state = small_state();
    let before = state.snapshot();
    let err = state.reassign(0, 0, C).unwrap_err();
    assert!(matches!(err, RosterError::ConstraintViolation(_)));
    assert!(state.is_unchanged_since(&before));
    assert!(state.is_assigned(A, 0));
}

#[test]
fn test_reassign_to_busy_worker_is_rejected() {
    let mut state = small_state();
    // C already works on day 2
    let err = state.reassign(2, 0, C).unwrap_err();
    assert!(matches!(err, RosterError::ConstraintViolation(_)));
}

#[test]
fn test_reassign_unknown_worker() {
    let mut state = small_state();
    let err = state.reassign(2, 0, WorkerId(99)).unwrap_err();
    assert_eq!(err, RosterError::WorkerNotFound(WorkerId(99)));
}

#[test]
fn test_assign_and_unassign() {
    let mut state = small_state();
    state.assign(B, 1, 1).unwrap();
    assert!(state.is_assigned(B, 1));
    assert!(state.assign(C, 1, 1).is_err());

    let removed = state.unassign(1, 1).unwrap();
    assert_eq!(removed, B);
    assert!(!state.is_assigned(B, 1));
    assert!(matches!(
        state.unassign(1, 1),
        Err(RosterError::InvalidTransfer(_))
    ));
    assert!(state.verify_consistency().is_ok());
}

#[test]
fn test_swap_posts_updates_post_counters() {
    let mut state = small_state();
    let before_b = state.counters(B).unwrap().posts.clone();
    state.swap_posts(5, 0, 1).unwrap();
    assert_eq!(state.post_of(B, 5), Some(1));
    assert_eq!(state.post_of(C, 5), Some(0));
    let after_b = &state.counters(B).unwrap().posts;
    assert_eq!(after_b[0], before_b[0] - 1);
    assert_eq!(after_b[1], before_b[1] + 1);

    // Day 0 holds a locked assignment
    assert!(state.swap_posts(0, 0, 1).is_err());
}

#[test]
fn test_snapshot_shares_storage_until_write() {
    let mut state = small_state();
    let snap = state.snapshot();
    assert!(state.grid().shares_storage_with(snap.grid()));

    state.reassign(2, 0, B).unwrap();
    assert!(!state.grid().shares_storage_with(snap.grid()));
    assert_eq!(snap.grid().get(2, 0).unwrap(), Some(A));
    assert_eq!(snap.assigned_count(A), 3);
}

#[test]
fn test_restore_roundtrips_state() {
    let mut state = small_state();
    let snap = state.snapshot();
    state.reassign(2, 0, B).unwrap();
    state.unassign(5, 1).unwrap();

    state.restore(&snap).unwrap();
    assert_eq!(state.occupant(2, 0).unwrap(), Some(A));
    assert_eq!(state.occupant(5, 1).unwrap(), Some(C));
    assert_eq!(state.assigned_count(B), 3);
    assert!(state.verify_consistency().is_ok());
    assert!(state.generation() > snap.generation());
}

#[test]
fn test_restore_rejects_foreign_shape() {
    let mut state = small_state();
    let calendar = Calendar::new(d(3), d(4)).unwrap();
    let roster = Roster::new(vec![WorkerProfile::new(A, 1)]).unwrap();
    let other = ScheduleState::new(calendar, roster, 2);

    let before = state.generation();
    let err = state.restore(&other.snapshot()).unwrap_err();
    assert!(matches!(err, RosterError::RestoreFailed(_)));
    assert_eq!(state.generation(), before);
}

#[test]
fn test_from_rows_rejects_double_booking() {
    let calendar = Calendar::new(d(3), d(3)).unwrap();
    let roster = Roster::new(vec![WorkerProfile::new(A, 1)]).unwrap();
    let result = ScheduleState::from_rows(calendar, roster, vec![vec![Some(A), Some(A)]]);
    assert!(matches!(result, Err(RosterError::ConstraintViolation(_))));
}

#[test]
fn test_lock_requires_assignment() {
    let mut state = small_state();
    assert!(state.lock(B, 1).is_err());
    state.lock(B, 0).unwrap();
    assert!(state.is_locked(B, 0));
    assert!(state.reassign(0, 1, C).is_err());
}

use chrono::{TimeZone, Utc};
use datacollect_types::{EventTimestamp, MonotonicClock, UserId};

// ── Construction ─────────────────────────────────────────────────

#[test]
fn now_is_close_to_wall_clock() {
    let before = Utc::now();
    let ts = EventTimestamp::now();
    let after = Utc::now();
    assert!(ts.as_datetime() >= before && ts.as_datetime() <= after);
}

#[test]
fn new_wraps_given_datetime() {
    let dt = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let ts = EventTimestamp::new(dt);
    assert_eq!(ts.as_datetime(), dt);
}

#[test]
fn default_is_now() {
    let before = Utc::now();
    let ts = EventTimestamp::default();
    assert!(ts.as_datetime() >= before);
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn ordering_by_instant() {
    let a = EventTimestamp::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    let b = EventTimestamp::new(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());
    assert!(a < b);
}

#[test]
fn equal_timestamps() {
    let dt = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let a = EventTimestamp::new(dt);
    let b = EventTimestamp::new(dt);
    assert_eq!(a, b);
}

// ── Parse / Display ──────────────────────────────────────────────

#[test]
fn parse_and_to_rfc3339_roundtrip() {
    let ts = EventTimestamp::new(Utc.with_ymd_and_hms(2025, 6, 15, 12, 30, 0).unwrap());
    let rendered = ts.to_rfc3339();
    let parsed = EventTimestamp::parse(&rendered).unwrap();
    assert_eq!(ts, parsed);
}

#[test]
fn parse_rejects_garbage() {
    assert!(EventTimestamp::parse("not-a-timestamp").is_err());
}

#[test]
fn display_matches_to_rfc3339() {
    let ts = EventTimestamp::now();
    assert_eq!(ts.to_string(), ts.to_rfc3339());
}

// ── next_millis ──────────────────────────────────────────────────

#[test]
fn next_millis_is_strictly_greater() {
    let ts = EventTimestamp::now();
    let next = ts.next_millis();
    assert!(next > ts);
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn serialization_roundtrip() {
    let ts = EventTimestamp::new(Utc.with_ymd_and_hms(2025, 3, 3, 3, 3, 3).unwrap());
    let json = serde_json::to_string(&ts).unwrap();
    let parsed: EventTimestamp = serde_json::from_str(&json).unwrap();
    assert_eq!(ts, parsed);
}

// ── MonotonicClock ───────────────────────────────────────────────

#[test]
fn clock_admits_a_fresh_candidate_unchanged() {
    let clock = MonotonicClock::new();
    let user = UserId::new();
    let candidate = EventTimestamp::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    let admitted = clock.admit(user, candidate);
    assert_eq!(admitted, candidate);
    assert_eq!(clock.last_for(&user), Some(candidate));
}

#[test]
fn clock_bumps_non_increasing_candidate_forward() {
    let clock = MonotonicClock::new();
    let user = UserId::new();
    let dt = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let first = clock.admit(user, EventTimestamp::new(dt));
    // second submission arrives with an identical (or earlier) timestamp
    let second = clock.admit(user, EventTimestamp::new(dt));
    assert!(second > first);
    let third = clock.admit(user, EventTimestamp::new(dt - chrono::Duration::days(1)));
    assert!(third > second);
}

#[test]
fn clock_tracks_users_independently() {
    let clock = MonotonicClock::new();
    let alice = UserId::new();
    let bob = UserId::new();
    let dt = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let a1 = clock.admit(alice, EventTimestamp::new(dt));
    let b1 = clock.admit(bob, EventTimestamp::new(dt));
    assert_eq!(a1, b1);
    assert_eq!(clock.last_for(&alice), Some(a1));
    assert_eq!(clock.last_for(&bob), Some(b1));
}

#[test]
fn clock_last_for_unknown_user_is_none() {
    let clock = MonotonicClock::new();
    assert_eq!(clock.last_for(&UserId::new()), None);
}

// ── Hash ─────────────────────────────────────────────────────────

#[test]
fn hash_consistent_with_eq() {
    use std::collections::HashSet;
    let ts = EventTimestamp::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    let mut set = HashSet::new();
    set.insert(ts);
    set.insert(ts);
    assert_eq!(set.len(), 1);
}

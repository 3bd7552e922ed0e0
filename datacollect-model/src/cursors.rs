use serde::{Deserialize, Serialize};

use datacollect_types::EventTimestamp;

/// Process-wide sync progress markers for one tenant.
///
/// Each cursor is the timestamp boundary of already-synchronized work in
/// one direction; `None` means that direction has never completed a
/// successful phase. Cursors only ever advance — a failed phase must not
/// move one backward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursors {
    pub last_local_sync: Option<EventTimestamp>,
    pub last_remote_sync: Option<EventTimestamp>,
    pub last_push_external_sync: Option<EventTimestamp>,
    pub last_pull_external_sync: Option<EventTimestamp>,
}

impl SyncCursors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances `last_local_sync` to `ts` if `ts` is later than the
    /// current value (or the cursor is unset). No-op otherwise.
    pub fn advance_local(&mut self, ts: EventTimestamp) {
        advance(&mut self.last_local_sync, ts);
    }

    pub fn advance_remote(&mut self, ts: EventTimestamp) {
        advance(&mut self.last_remote_sync, ts);
    }

    pub fn advance_push_external(&mut self, ts: EventTimestamp) {
        advance(&mut self.last_push_external_sync, ts);
    }

    pub fn advance_pull_external(&mut self, ts: EventTimestamp) {
        advance(&mut self.last_pull_external_sync, ts);
    }
}

fn advance(cursor: &mut Option<EventTimestamp>, ts: EventTimestamp) {
    match cursor {
        Some(current) if *current >= ts => {}
        _ => *cursor = Some(ts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(day: u32) -> EventTimestamp {
        EventTimestamp::new(Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap())
    }

    #[test]
    fn new_cursors_are_all_unset() {
        let cursors = SyncCursors::new();
        assert_eq!(cursors.last_local_sync, None);
        assert_eq!(cursors.last_remote_sync, None);
    }

    #[test]
    fn advance_sets_an_unset_cursor() {
        let mut cursors = SyncCursors::new();
        cursors.advance_remote(ts(5));
        assert_eq!(cursors.last_remote_sync, Some(ts(5)));
    }

    #[test]
    fn advance_never_moves_a_cursor_backward() {
        let mut cursors = SyncCursors::new();
        cursors.advance_local(ts(10));
        cursors.advance_local(ts(3));
        assert_eq!(cursors.last_local_sync, Some(ts(10)));
    }

    #[test]
    fn advance_moves_forward_when_later() {
        let mut cursors = SyncCursors::new();
        cursors.advance_push_external(ts(1));
        cursors.advance_push_external(ts(2));
        assert_eq!(cursors.last_push_external_sync, Some(ts(2)));
    }
}

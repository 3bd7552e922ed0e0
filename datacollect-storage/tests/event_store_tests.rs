use datacollect_storage::{cursor_names, EventStore};
use datacollect_types::{EntityGuid, Event, EventTimestamp, KnownEventType, SyncLevel, UserId};

fn make_event(ts: EventTimestamp) -> Event {
    Event::new(EntityGuid::new(), UserId::new(), KnownEventType::CreateIndividual, serde_json::json!({"name": "A"}), ts)
}

#[test]
fn save_event_appends_a_merkle_leaf_and_an_audit_entry() {
    let store = EventStore::open_in_memory(Default::default()).unwrap();
    let event = make_event(EventTimestamp::now());
    store.save_event(&event).unwrap();

    assert!(store.event_exists(event.guid).unwrap());
    assert!(!store.merkle_root().is_empty());

    let audit = store.get_audit_trail_by_entity_guid(event.entity_guid).unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].event_guid, event.guid);
    assert!(audit[0].verify_signature());
}

#[test]
fn saving_the_same_event_twice_is_idempotent() {
    let store = EventStore::open_in_memory(Default::default()).unwrap();
    let event = make_event(EventTimestamp::now());
    store.save_event(&event).unwrap();
    let root_once = store.merkle_root();
    store.save_event(&event).unwrap();

    assert_eq!(store.get_all_events().unwrap().len(), 1);
    assert_eq!(store.get_audit_trail_by_entity_guid(event.entity_guid).unwrap().len(), 1);
    assert_eq!(store.merkle_root(), root_once);
}

#[test]
fn merkle_proof_verifies_against_the_current_root() {
    let store = EventStore::open_in_memory(Default::default()).unwrap();
    let base = EventTimestamp::now();
    let mut ts = base;
    let mut guids = Vec::new();
    for _ in 0..4 {
        ts = ts.next_millis();
        let event = make_event(ts);
        guids.push(event.guid);
        store.save_event(&event).unwrap();
    }

    let root = store.merkle_root();
    for guid in guids {
        let proof = store.merkle_proof(guid).unwrap();
        assert!(store.verify_event(guid, &proof, &root));
    }
}

#[test]
fn rebuilding_the_store_from_disk_reproduces_the_merkle_root() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.duckdb");
    let tenant = datacollect_types::TenantId::default();

    let root_after_writes = {
        let adapter = datacollect_storage::DuckDbEventStore::open(&path, tenant.clone()).unwrap();
        let store = EventStore::new(Box::new(adapter)).unwrap();
        let base = EventTimestamp::now();
        let mut ts = base;
        for _ in 0..3 {
            ts = ts.next_millis();
            store.save_event(&make_event(ts)).unwrap();
        }
        store.merkle_root()
    };

    let adapter = datacollect_storage::DuckDbEventStore::open(&path, tenant).unwrap();
    let reopened = EventStore::new(Box::new(adapter)).unwrap();
    assert_eq!(reopened.merkle_root(), root_after_writes);
}

#[test]
fn pagination_walks_the_full_log_via_cursor() {
    let store = EventStore::open_in_memory(Default::default()).unwrap();
    let base = EventTimestamp::now();
    let mut ts = base;
    for _ in 0..7 {
        ts = ts.next_millis();
        store.save_event(&make_event(ts)).unwrap();
    }

    let mut cursor = base;
    let mut seen = 0;
    loop {
        let (page, next) = store.get_events_since_pagination(cursor, 3).unwrap();
        if page.is_empty() {
            break;
        }
        seen += page.len();
        cursor = next.unwrap();
    }
    assert_eq!(seen, 7);
}

#[test]
fn sync_level_advances_and_never_regresses() {
    let store = EventStore::open_in_memory(Default::default()).unwrap();
    let event = make_event(EventTimestamp::now());
    store.save_event(&event).unwrap();

    store.update_sync_level_from_events(&[event.guid], SyncLevel::External).unwrap();
    store.update_sync_level_from_events(&[event.guid], SyncLevel::Remote).unwrap();

    let all = store.get_all_events().unwrap();
    assert_eq!(all[0].sync_level, SyncLevel::External);
}

#[test]
fn sync_cursors_round_trip_under_their_named_keys() {
    let store = EventStore::open_in_memory(Default::default()).unwrap();
    assert!(store.get_cursor(cursor_names::LAST_REMOTE_SYNC).unwrap().is_none());

    let ts = EventTimestamp::now();
    store.set_cursor(cursor_names::LAST_REMOTE_SYNC, ts).unwrap();
    assert_eq!(store.get_cursor(cursor_names::LAST_REMOTE_SYNC).unwrap(), Some(ts));
    assert!(store.get_cursor(cursor_names::LAST_LOCAL_SYNC).unwrap().is_none());
}

#[test]
fn clear_resets_both_the_log_and_the_merkle_tree() {
    let store = EventStore::open_in_memory(Default::default()).unwrap();
    store.save_event(&make_event(EventTimestamp::now())).unwrap();
    assert!(!store.merkle_root().is_empty());

    store.clear().unwrap();
    assert!(store.get_all_events().unwrap().is_empty());
    assert_eq!(store.merkle_root(), "");
}

use datacollect_types::{EntityGuid, Event, EventGuid, EventTimestamp, EventType, KnownEventType, SyncLevel, UserId};

// ── EventType ─────────────────────────────────────────────────────

#[test]
fn event_type_known_roundtrips_through_string() {
    for known in KnownEventType::ALL {
        let et: EventType = known.into();
        let wire = String::from(et.clone());
        let parsed = EventType::from(wire.clone());
        assert_eq!(parsed, et);
        assert_eq!(parsed.as_str(), known.as_str());
    }
}

#[test]
fn event_type_unknown_string_becomes_custom() {
    let et = EventType::from("site-visit".to_string());
    assert_eq!(et, EventType::Custom("site-visit".to_string()));
}

#[test]
fn event_type_serde_uses_plain_string() {
    let et: EventType = KnownEventType::AddMember.into();
    let json = serde_json::to_string(&et).unwrap();
    assert_eq!(json, "\"add-member\"");
    let parsed: EventType = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, et);
}

// ── SyncLevel ─────────────────────────────────────────────────────

#[test]
fn sync_level_orders_local_remote_external() {
    assert!(SyncLevel::Local < SyncLevel::Remote);
    assert!(SyncLevel::Remote < SyncLevel::External);
}

#[test]
fn sync_level_default_is_local() {
    assert_eq!(SyncLevel::default(), SyncLevel::Local);
}

#[test]
fn sync_level_serde_uses_uppercase() {
    let json = serde_json::to_string(&SyncLevel::Remote).unwrap();
    assert_eq!(json, "\"REMOTE\"");
}

// ── Event construction ───────────────────────────────────────────

#[test]
fn event_new_defaults_to_local_sync_level() {
    let event = Event::new(
        EntityGuid::new(),
        UserId::new(),
        KnownEventType::CreateIndividual,
        serde_json::json!({"firstName": "Jane"}),
        EventTimestamp::now(),
    );
    assert_eq!(event.sync_level, SyncLevel::Local);
    assert_eq!(event.event_type, EventType::Known(KnownEventType::CreateIndividual));
}

#[test]
fn event_accepts_custom_event_type() {
    let event = Event::new(
        EntityGuid::new(),
        UserId::new(),
        "household-visit",
        serde_json::json!({}),
        EventTimestamp::now(),
    );
    assert_eq!(event.event_type, EventType::Custom("household-visit".to_string()));
}

#[test]
fn event_guid_and_entity_guid_are_distinct_and_unique() {
    let guid = EntityGuid::new();
    let e1 = Event::new(guid, UserId::new(), KnownEventType::UpdateIndividual, serde_json::json!({}), EventTimestamp::now());
    let e2 = Event::new(guid, UserId::new(), KnownEventType::UpdateIndividual, serde_json::json!({}), EventTimestamp::now());
    assert_eq!(e1.entity_guid, e2.entity_guid);
    assert_ne!(e1.guid, e2.guid);
}

// ── Payload well-formedness ──────────────────────────────────────

#[test]
fn well_formed_payload_accepts_object() {
    let event = Event::new(
        EntityGuid::new(),
        UserId::new(),
        KnownEventType::CreateGroup,
        serde_json::json!({"name": "Household A"}),
        EventTimestamp::now(),
    );
    assert!(event.has_well_formed_payload());
}

#[test]
fn well_formed_payload_accepts_null() {
    let event = Event::new(
        EntityGuid::new(),
        UserId::new(),
        KnownEventType::DeleteEntity,
        serde_json::Value::Null,
        EventTimestamp::now(),
    );
    assert!(event.has_well_formed_payload());
}

#[test]
fn well_formed_payload_rejects_array() {
    let event = Event::new(
        EntityGuid::new(),
        UserId::new(),
        KnownEventType::AddMember,
        serde_json::json!([1, 2, 3]),
        EventTimestamp::now(),
    );
    assert!(!event.has_well_formed_payload());
}

// ── Serde roundtrip ──────────────────────────────────────────────

#[test]
fn event_full_serde_roundtrip() {
    let event = Event::new(
        EntityGuid::new(),
        UserId::new(),
        KnownEventType::ResolveDuplicate,
        serde_json::json!({"keep": "a", "discard": "b"}),
        EventTimestamp::now(),
    );

    let json = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();

    assert_eq!(event.guid, parsed.guid);
    assert_eq!(event.entity_guid, parsed.entity_guid);
    assert_eq!(event.event_type, parsed.event_type);
    assert_eq!(event.data, parsed.data);
    assert_eq!(event.timestamp, parsed.timestamp);
    assert_eq!(event.user_id, parsed.user_id);
    assert_eq!(event.sync_level, parsed.sync_level);
}

#[test]
fn event_deserialize_without_sync_level_field_defaults_local() {
    let event = Event::new(
        EntityGuid::new(),
        UserId::new(),
        KnownEventType::CreateIndividual,
        serde_json::json!({}),
        EventTimestamp::now(),
    );
    let mut json: serde_json::Value = serde_json::to_value(&event).unwrap();
    json.as_object_mut().unwrap().remove("syncLevel");
    let parsed: Event = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.sync_level, SyncLevel::Local);
}

#[test]
fn event_wire_type_field_uses_type_key() {
    let event = Event::new(
        EntityGuid::new(),
        UserId::new(),
        KnownEventType::RemoveMember,
        serde_json::json!({}),
        EventTimestamp::now(),
    );
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json.get("type").unwrap(), "remove-member");
    assert!(json.get("eventType").is_none());
}

//! Identity map entries live exactly as long as some strong holder

use statejournal::engine::{DirtySet, IdentityMap, ObjectCell};
use statejournal::prelude::*;
use std::collections::BTreeMap;

fn cell(id: u64) -> ObjectCell {
    ObjectCell::new(DurableDict::from_committed(ObjectId::new(id), BTreeMap::new()))
}

#[test]
fn identity_only_entry_vanishes() {
    let mut identity = IdentityMap::new();
    let object = cell(16);
    identity.add(&object).unwrap();
    assert!(identity.try_get(ObjectId::new(16)).is_some());

    drop(object);
    assert!(identity.try_get(ObjectId::new(16)).is_none());
    assert_eq!(identity.len(), 1);
    assert_eq!(identity.cleanup(), 1);
    assert!(identity.is_empty());
}

#[test]
fn dirty_set_keeps_entry_alive_until_removed() {
    let mut identity = IdentityMap::new();
    let mut dirty = DirtySet::new();
    let object = cell(16);
    identity.add(&object).unwrap();
    dirty.add(object);

    assert!(identity.try_get(ObjectId::new(16)).is_some());
    assert_eq!(identity.cleanup(), 0);

    assert!(dirty.remove(ObjectId::new(16)));
    assert!(identity.try_get(ObjectId::new(16)).is_none());
}

#[test]
fn workspace_releases_objects_after_commit() {
    let ws = Workspace::new();
    let dict = ws.create_object::<DurableDict>().unwrap();
    dict.write().set(1, 1).unwrap();
    let id = dict.read().object_id();
    drop(dict);

    // Still dirty, so still resolvable
    let again = ws.load_object::<DurableDict>(id).unwrap();
    drop(again);

    ws.commit().unwrap();
    assert_eq!(ws.cleanup(), 1);
    assert!(ws.load_object::<DurableDict>(id).unwrap_err().is_not_found());
}

#[test]
fn held_object_survives_commit() {
    let ws = Workspace::new();
    let dict = ws.create_object::<DurableDict>().unwrap();
    dict.write().set(1, 1).unwrap();
    let id = dict.read().object_id();
    ws.commit().unwrap();

    assert_eq!(ws.cleanup(), 0);
    let again = ws.load_object::<DurableDict>(id).unwrap();
    assert!(std::sync::Arc::ptr_eq(&again, &dict));
}

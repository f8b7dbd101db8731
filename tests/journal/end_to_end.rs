//! Commit cycles through the public API

use crate::common::*;
use statejournal::prelude::*;

#[test]
fn commit_then_modify_then_commit() {
    init_tracing();
    let ws = Workspace::new();
    let dict = ws.create_object::<DurableDict>().unwrap();
    dict.write().set(10, 100).unwrap();
    dict.write().set(20, 200).unwrap();

    let ctx = ws.commit().unwrap();
    assert_eq!(ctx.epoch_seq, 1);
    assert_eq!(ws.dirty_count(), 0);
    assert_eq!(dict.read().state(), DurableObjectState::Clean);
    assert_eq!(dict.read().get(10).unwrap(), Some(&Value::Int(100)));
    assert_eq!(dict.read().get(20).unwrap(), Some(&Value::Int(200)));

    dict.write().set(10, 999).unwrap();
    assert_eq!(dict.read().state(), DurableObjectState::PersistentDirty);
    assert_eq!(ws.dirty_count(), 1);

    ws.commit().unwrap();
    assert_eq!(ws.epoch_seq(), 2);
    assert_eq!(dict.read().get(10).unwrap(), Some(&Value::Int(999)));
    assert_eq!(dict.read().state(), DurableObjectState::Clean);
}

#[test]
fn watermarks_advance_together() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    let dict = committed_dict(&ws, &[(1, 1)]);
    let first_tail = ws.data_tail();
    let first_index = ws.version_index_ptr();
    assert_eq!(first_tail, data.lock().len());
    assert!(first_index > 0 && first_index < first_tail);

    // Nothing dirty: the epoch moves, the log positions do not
    ws.commit().unwrap();
    assert_eq!(ws.epoch_seq(), 2);
    assert_eq!(ws.data_tail(), first_tail);
    assert_eq!(ws.version_index_ptr(), first_index);

    dict.write().set(2, 2).unwrap();
    ws.commit().unwrap();
    assert!(ws.data_tail() > first_tail);
    assert!(ws.version_index_ptr() > first_index);
    assert_eq!(meta.lock().frames().count(), 3);
}

#[test]
fn tombstones_and_nulls_survive_commit() {
    let ws = Workspace::new();
    let dict = committed_dict(&ws, &[(1, 1), (2, 2)]);

    {
        let mut guard = dict.write();
        assert!(guard.remove(1).unwrap());
        assert!(!guard.remove(7).unwrap());
        guard.set_null(2).unwrap();
    }
    ws.commit().unwrap();

    let guard = dict.read();
    assert_eq!(guard.get(1).unwrap(), None);
    assert_eq!(guard.get(2).unwrap(), Some(&Value::Null));
    assert_eq!(guard.len().unwrap(), 1);
}

#[test]
fn discarded_new_object_never_reaches_the_log() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    let dict = ws.create_object::<DurableDict>().unwrap();
    dict.write().set(1, 1).unwrap();
    dict.write().discard_changes();
    assert_eq!(dict.read().state(), DurableObjectState::Detached);
    assert!(dict.read().get(1).unwrap_err().is_detached());

    let ctx = ws.commit().unwrap();
    assert!(ctx.written_records.is_empty());
    assert_eq!(data.lock().len(), statejournal::storage::LOG_HEADER_SIZE);
}

#[test]
fn object_references_round_trip() {
    let ws = Workspace::new();
    let child = committed_dict(&ws, &[(1, 1)]);
    let child_id = child.read().object_id();

    let parent = ws.create_object::<DurableDict>().unwrap();
    parent.write().set(0, child_id).unwrap();
    ws.commit().unwrap();

    let target = parent.read().get(0).unwrap().and_then(Value::as_obj_ref);
    assert_eq!(target, Some(child_id));
    let resolved = ws.load_object::<DurableDict>(child_id).unwrap();
    assert!(std::sync::Arc::ptr_eq(&resolved, &child));
}

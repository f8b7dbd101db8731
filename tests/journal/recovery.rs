//! Reopening a journal from its logs

use crate::common::*;
use statejournal::durability::recover_logs;
use statejournal::prelude::*;

#[test]
fn reopen_restores_objects_and_watermarks() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    let a = committed_dict(&ws, &[(1, 100), (2, 200)]);
    let b = committed_dict(&ws, &[(7, -7)]);
    a.write().set(1, 999).unwrap();
    a.write().remove(2).unwrap();
    ws.set_root(a.read().object_id());
    ws.commit().unwrap();

    let reopened = Workspace::open_logs(data, meta).unwrap();
    assert_eq!(reopened.epoch_seq(), 3);
    assert_eq!(reopened.data_tail(), ws.data_tail());
    assert_eq!(reopened.version_index_ptr(), ws.version_index_ptr());
    assert_eq!(reopened.next_object_id(), ObjectId::new(18));
    assert_eq!(reopened.root_object_id(), Some(ObjectId::new(16)));

    let a2 = reopened.load_object::<DurableDict>(ObjectId::new(16)).unwrap();
    assert_eq!(a2.read().state(), DurableObjectState::Clean);
    assert_eq!(a2.read().get(1).unwrap(), Some(&Value::Int(999)));
    assert_eq!(a2.read().get(2).unwrap(), None);

    let b2 = reopened.load_object::<DurableDict>(b.read().object_id()).unwrap();
    assert_eq!(b2.read().get(7).unwrap(), Some(&Value::Int(-7)));
}

#[test]
fn reopened_journal_keeps_committing() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    committed_dict(&ws, &[(1, 1)]);

    let second = Workspace::open_logs(data.clone(), meta.clone()).unwrap();
    let dict = second.load_object::<DurableDict>(ObjectId::new(16)).unwrap();
    dict.write().set(2, 2).unwrap();
    assert!(second.is_dirty(ObjectId::new(16)));
    let created = second.create_object::<DurableDict>().unwrap();
    assert_eq!(created.read().object_id(), ObjectId::new(17));
    created.write().set(5, 5).unwrap();
    second.commit().unwrap();

    let third = Workspace::open_logs(data, meta).unwrap();
    assert_eq!(third.epoch_seq(), 2);
    let dict = third.load_object::<DurableDict>(ObjectId::new(16)).unwrap();
    assert_eq!(dict.read().len().unwrap(), 2);
    let created = third.load_object::<DurableDict>(ObjectId::new(17)).unwrap();
    assert_eq!(created.read().get(5).unwrap(), Some(&Value::Int(5)));
}

#[test]
fn torn_meta_tail_is_discarded() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    committed_dict(&ws, &[(1, 1)]);
    let valid_len = meta.lock().len();
    meta.lock().append_raw(&[0x02, 0x00, 0x00, 0x00, 0x40]);

    let reopened = Workspace::open_logs(data, meta.clone()).unwrap();
    assert_eq!(reopened.epoch_seq(), 1);
    assert_eq!(meta.lock().len(), valid_len);
}

#[test]
fn uncommitted_data_is_truncated() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    let dict = committed_dict(&ws, &[(1, 1)]);
    let committed_tail = ws.data_tail();

    // Phase one only: frames reach the data log, no meta record follows
    dict.write().set(1, 2).unwrap();
    let ctx = ws.prepare_commit().unwrap();
    assert!(ctx.data_tail > committed_tail);
    assert_eq!(data.lock().len(), ctx.data_tail);

    let info = recover_logs(&mut meta.lock(), &mut data.lock()).unwrap();
    assert!(info.was_truncated);
    assert_eq!(info.data_tail, committed_tail);
    assert_eq!(data.lock().len(), committed_tail);

    let reopened = Workspace::open(data, &info).unwrap();
    let dict = reopened.load_object::<DurableDict>(ObjectId::new(16)).unwrap();
    assert_eq!(dict.read().get(1).unwrap(), Some(&Value::Int(1)));
}

#[test]
fn empty_logs_open_as_fresh_journal() {
    let (data, meta) = fresh_logs();
    let ws = Workspace::open_logs(data, meta).unwrap();
    assert_eq!(ws.epoch_seq(), 0);
    assert_eq!(ws.next_object_id(), ObjectId::new(16));
    assert!(ws
        .load_object::<DurableDict>(ObjectId::new(16))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn open_rejects_log_shorter_than_recovered_tail() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    committed_dict(&ws, &[(1, 1)]);
    let info = recover_logs(&mut meta.lock(), &mut data.lock()).unwrap();

    let short = MemoryLog::shared();
    assert!(matches!(
        Workspace::open(short, &info),
        Err(Error::InvalidArgument(_) | Error::FrameCorrupt { .. })
    ));
}

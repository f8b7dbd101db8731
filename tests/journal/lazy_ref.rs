//! Lazy references resolved through a reopened journal

use crate::common::*;
use statejournal::prelude::*;
use std::sync::Arc;

#[test]
fn lazy_ref_loads_from_log_once() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    let dict = committed_dict(&ws, &[(1, 10), (2, 20)]);
    let id = dict.read().object_id();
    drop(dict);

    let reopened = Workspace::open_logs(data, meta).unwrap();
    assert_eq!(reopened.cached_count(), 0);

    let a = LazyRef::<DurableDict>::new(id, &reopened);
    let b = LazyRef::<DurableDict>::new(id, &reopened);
    assert!(!a.is_loaded());

    let va = a.value().unwrap();
    let vb = b.value().unwrap();
    assert!(Arc::ptr_eq(&va, &vb));
    assert!(Arc::ptr_eq(&va, &a.value().unwrap()));
    assert_eq!(reopened.cached_count(), 1);
    assert_eq!(va.read().get(2).unwrap(), Some(&Value::Int(20)));
}

#[test]
fn lazy_ref_to_missing_object() {
    let (data, meta) = fresh_logs();
    let ws = journal(&data, &meta);
    let lazy = LazyRef::<DurableDict>::new(ObjectId::new(500), &ws);

    let err = lazy.value().unwrap_err();
    assert!(matches!(err, Error::LazyLoad { object_id, .. } if object_id == ObjectId::new(500)));
    assert!(lazy.try_get_value().unwrap_err().is_not_found());
}

#[test]
fn lazy_ref_sees_uncommitted_resident_state() {
    let ws = Workspace::new();
    let dict = ws.create_object::<DurableDict>().unwrap();
    dict.write().set(3, 30).unwrap();

    let lazy = LazyRef::<DurableDict>::new(dict.read().object_id(), &ws);
    let resolved = lazy.value().unwrap();
    assert_eq!(
        resolved.read().state(),
        DurableObjectState::TransientDirty
    );
    assert_eq!(resolved.read().get(3).unwrap(), Some(&Value::Int(30)));
}

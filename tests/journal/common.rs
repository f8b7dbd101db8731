//! Shared helpers for journal integration tests

use statejournal::prelude::*;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Route tracing output to the test harness
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Fresh data and meta logs
pub fn fresh_logs() -> (SharedLog, SharedLog) {
    (MemoryLog::shared(), MemoryLog::shared())
}

/// Workspace writing to both logs
pub fn journal(data: &SharedLog, meta: &SharedLog) -> Workspace {
    init_tracing();
    Workspace::builder()
        .log(data.clone())
        .meta_log(meta.clone())
        .build()
        .unwrap()
}

/// Dict with the given entries, committed
pub fn committed_dict(ws: &Workspace, entries: &[(u64, i64)]) -> Shared<DurableDict> {
    let dict = ws.create_object::<DurableDict>().unwrap();
    {
        let mut guard = dict.write();
        for (key, value) in entries {
            guard.set(*key, *value).unwrap();
        }
    }
    ws.commit().unwrap();
    dict
}

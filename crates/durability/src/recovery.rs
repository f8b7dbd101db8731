//! Crash recovery from the meta and data logs
//!
//! A commit appends its object frames to the data log first and its
//! [`MetaCommitRecord`] to the meta log last. A crash can therefore leave:
//!
//! - a data log longer than the newest record's `data_tail` (data of a commit
//!   whose meta record never made it), or
//! - meta records whose `data_tail` points past the end of the data log (meta
//!   written, data lost)
//!
//! ## Recovery Sequence
//!
//! 1. Scan the meta log, stopping at the first torn frame
//! 2. Walk the records newest to oldest, taking the first one whose
//!    `data_tail` fits inside the data log
//! 3. Report whether the data log must be cut back to that `data_tail`
//!
//! ## Key Principle
//!
//! After recovery the workspace corresponds to a **prefix of the committed
//! epochs**. No partially written commit is visible.

use serde::{Deserialize, Serialize};
use statejournal_core::{Error, ObjectId, Result};
use statejournal_storage::format::frame::RecordType;
use statejournal_storage::{MemoryLog, MetaCommitRecord, LOG_HEADER_SIZE};
use tracing::{debug, info, warn};

// ============================================================================
// Recovery Info
// ============================================================================

/// State a workspace is restored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryInfo {
    /// Last committed epoch, 0 for a fresh journal
    pub epoch_seq: u64,
    /// Next id to allocate
    pub next_object_id: ObjectId,
    /// Position of the last committed version index, 0 if none
    pub version_index_ptr: u64,
    /// Length of the data log at the last commit
    pub data_tail: u64,
    /// Root object recorded by the last commit
    pub root_object_id: Option<ObjectId>,
    /// Whether the data log is longer than `data_tail` and must be cut back
    pub was_truncated: bool,
    /// Data log length before truncation (0 when nothing is cut)
    pub original_data_size: u64,
}

impl RecoveryInfo {
    /// State of a journal with no usable commit
    pub const fn empty() -> Self {
        Self {
            epoch_seq: 0,
            next_object_id: ObjectId::FIRST_USER,
            version_index_ptr: 0,
            data_tail: 0,
            root_object_id: None,
            was_truncated: false,
            original_data_size: 0,
        }
    }

    /// True if no commit was recovered
    pub fn is_empty(&self) -> bool {
        self.epoch_seq == 0
    }

    /// Restore from a chosen record
    fn from_record(record: &MetaCommitRecord, actual_data_size: u64) -> Self {
        let was_truncated = actual_data_size > record.data_tail;
        Self {
            epoch_seq: record.epoch_seq,
            next_object_id: record.next_object_id,
            version_index_ptr: record.version_index_ptr,
            data_tail: record.data_tail,
            root_object_id: record.root_object_id,
            was_truncated,
            original_data_size: if was_truncated { actual_data_size } else { 0 },
        }
    }

    /// Human-readable summary
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no committed epoch (fresh journal)".to_string();
        }
        let truncation = if self.was_truncated {
            format!(", data log cut from {} to {}", self.original_data_size, self.data_tail)
        } else {
            String::new()
        };
        format!(
            "epoch {} (next id {}, version index at {}, data tail {}{})",
            self.epoch_seq, self.next_object_id, self.version_index_ptr, self.data_tail, truncation
        )
    }
}

impl Default for RecoveryInfo {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Record selection
// ============================================================================

/// A record is usable if all of its data is inside the data log
pub fn is_record_valid(record: &MetaCommitRecord, actual_data_size: u64) -> bool {
    record.data_tail <= actual_data_size
}

/// Index of the newest usable record
fn select(records: &[MetaCommitRecord], actual_data_size: u64) -> Option<usize> {
    records
        .iter()
        .rposition(|record| is_record_valid(record, actual_data_size))
}

/// Choose the state to restore from `records` (oldest first)
pub fn recover(records: &[MetaCommitRecord], actual_data_size: u64) -> RecoveryInfo {
    let Some(index) = select(records, actual_data_size) else {
        if !records.is_empty() {
            warn!(
                records = records.len(),
                actual_data_size, "No meta record fits inside the data log, starting empty"
            );
        }
        return RecoveryInfo::empty();
    };

    let skipped = records.len() - 1 - index;
    if skipped > 0 {
        warn!(
            skipped,
            epoch_seq = records[index].epoch_seq,
            "Meta log ahead of data log, backtracking"
        );
    }

    let info = RecoveryInfo::from_record(&records[index], actual_data_size);
    if info.was_truncated {
        warn!(
            data_tail = info.data_tail,
            original_data_size = info.original_data_size,
            "Data log has bytes past the last commit"
        );
    }
    info
}

// ============================================================================
// Log scanning
// ============================================================================

/// Meta records found in a meta log
#[derive(Debug, Clone, Default)]
pub struct MetaScan {
    /// Records in log order
    pub records: Vec<MetaCommitRecord>,
    /// End position of each record's frame
    pub ends: Vec<u64>,
    /// Length of the readable prefix of the log
    pub valid_len: u64,
}

/// Read all meta records up to the first torn frame
///
/// A frame that decodes but is not a meta commit, or whose body does not
/// parse, is corruption rather than a torn write and fails the scan.
pub fn scan_meta_log(meta: &MemoryLog) -> Result<MetaScan> {
    let mut scan = MetaScan {
        valid_len: LOG_HEADER_SIZE,
        ..MetaScan::default()
    };
    for frame in meta.frames() {
        let (position, frame) = match frame {
            Ok(f) => f,
            Err(e) => {
                warn!(position = scan.valid_len, error = %e, "Torn frame at end of meta log");
                break;
            }
        };
        if frame.tag.record_type() != RecordType::MetaCommit {
            return Err(Error::FrameCorrupt {
                position,
                reason: format!("unexpected frame tag {} in meta log", frame.tag),
            });
        }
        scan.records.push(MetaCommitRecord::parse(frame.payload)?);
        scan.valid_len = position + frame.encoded_len() as u64;
        scan.ends.push(scan.valid_len);
    }
    debug!(records = scan.records.len(), valid_len = scan.valid_len, "Scanned meta log");
    Ok(scan)
}

/// Recover both logs in place
///
/// Cuts the meta log back to the chosen record and the data log back to its
/// `data_tail`, then returns the state to open a workspace with.
pub fn recover_logs(meta: &mut MemoryLog, data: &mut MemoryLog) -> Result<RecoveryInfo> {
    let scan = scan_meta_log(meta)?;
    let data_size = data.len();
    let info = recover(&scan.records, data_size);

    let meta_len = select(&scan.records, data_size)
        .map(|i| scan.ends[i])
        .unwrap_or(LOG_HEADER_SIZE);
    if meta_len < meta.len() {
        meta.truncate(meta_len)?;
    }
    let data_len = info.data_tail.max(LOG_HEADER_SIZE);
    if data.len() > data_len {
        data.truncate(data_len)?;
    }

    info!("Recovered {}", info.summary());
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statejournal_storage::{FrameTag, LogSink};

    fn record(epoch: u64, next: u64, tail: u64, vip: u64) -> MetaCommitRecord {
        MetaCommitRecord {
            epoch_seq: epoch,
            root_object_id: None,
            version_index_ptr: vip,
            data_tail: tail,
            next_object_id: ObjectId::new(next),
        }
    }

    #[test]
    fn test_no_records_is_empty() {
        let info = recover(&[], 0);
        assert!(info.is_empty());
        assert_eq!(info.next_object_id, ObjectId::new(16));
        assert_eq!(info.data_tail, 0);
        assert!(!info.was_truncated);

        assert!(recover(&[], 100).is_empty());
    }

    #[test]
    fn test_latest_valid_record_wins() {
        let records = [record(1, 17, 100, 50), record(2, 18, 200, 150)];
        let info = recover(&records, 200);
        assert_eq!(info.epoch_seq, 2);
        assert_eq!(info.next_object_id, ObjectId::new(18));
        assert_eq!(info.version_index_ptr, 150);
        assert!(!info.was_truncated);
        assert!(!info.is_empty());
    }

    #[test]
    fn test_data_longer_than_tail_marks_truncation() {
        let info = recover(&[record(1, 17, 100, 50)], 150);
        assert!(info.was_truncated);
        assert_eq!(info.original_data_size, 150);
        assert_eq!(info.data_tail, 100);

        let exact = recover(&[record(3, 50, 500, 250)], 500);
        assert!(!exact.was_truncated);
        assert_eq!(exact.original_data_size, 0);
    }

    #[test]
    fn test_meta_ahead_of_data_backtracks() {
        let records = [
            record(1, 17, 100, 50),
            record(2, 18, 200, 150),
            record(3, 19, 300, 250),
            record(4, 20, 400, 350),
        ];
        let info = recover(&records, 200);
        assert_eq!(info.epoch_seq, 2);
        assert!(!info.was_truncated);

        let info = recover(&records, 150);
        assert_eq!(info.epoch_seq, 1);
        assert_eq!(info.next_object_id, ObjectId::new(17));
        assert!(info.was_truncated);
        assert_eq!(info.original_data_size, 150);
    }

    #[test]
    fn test_all_records_ahead_is_empty() {
        let records = [record(1, 17, 100, 50), record(2, 18, 200, 150)];
        assert!(recover(&records, 50).is_empty());
        assert!(recover(&records[..1], 0).is_empty());
    }

    #[test]
    fn test_is_record_valid_boundaries() {
        let r = record(1, 17, 100, 0);
        assert!(is_record_valid(&r, 100));
        assert!(is_record_valid(&r, 150));
        assert!(!is_record_valid(&r, 50));
    }

    #[test]
    fn test_empty_defaults() {
        let empty = RecoveryInfo::empty();
        assert_eq!(empty, RecoveryInfo::default());
        assert!(empty.is_empty());
        assert_eq!(empty.version_index_ptr, 0);
        assert_eq!(empty.original_data_size, 0);
        assert!(!RecoveryInfo {
            epoch_seq: 1,
            ..empty
        }
        .is_empty());
    }

    #[test]
    fn test_info_serializes() {
        let info = recover(&[record(1, 17, 100, 50)], 150);
        let json = serde_json::to_string(&info).unwrap();
        let back: RecoveryInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
        assert!(info.summary().contains("cut from 150"));
    }

    #[test]
    fn test_scan_stops_at_torn_frame() {
        let mut meta = MemoryLog::new();
        meta.append(FrameTag::META_COMMIT, &record(1, 17, 100, 50).encode().unwrap())
            .unwrap();
        let end = meta.len();
        meta.append_raw(&[0x02, 0x00, 0x00, 0x00, 0x30]);

        let scan = scan_meta_log(&meta).unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.valid_len, end);
        assert_eq!(scan.ends, vec![end]);
    }

    #[test]
    fn test_scan_rejects_foreign_frames() {
        let mut meta = MemoryLog::new();
        meta.append(FrameTag::DICT_VERSION, &[0]).unwrap();
        assert!(matches!(
            scan_meta_log(&meta),
            Err(Error::FrameCorrupt { .. })
        ));
    }

    #[test]
    fn test_recover_logs_cuts_both_logs() {
        let mut data = MemoryLog::new();
        data.append(FrameTag::DICT_VERSION, &[0; 10]).unwrap();
        let committed_tail = data.len();
        data.append(FrameTag::DICT_VERSION, &[0; 10]).unwrap();

        let mut meta = MemoryLog::new();
        meta.append(FrameTag::META_COMMIT, &record(1, 17, committed_tail, 8).encode().unwrap())
            .unwrap();
        let meta_end = meta.len();
        // Meta record of a commit whose data never landed
        meta.append(FrameTag::META_COMMIT, &record(2, 18, 10_000, 9).encode().unwrap())
            .unwrap();

        let info = recover_logs(&mut meta, &mut data).unwrap();
        assert_eq!(info.epoch_seq, 1);
        assert!(info.was_truncated);
        assert_eq!(data.len(), committed_tail);
        assert_eq!(meta.len(), meta_end);
    }

    #[test]
    fn test_recover_logs_without_commits_empties_data_log() {
        let mut data = MemoryLog::new();
        data.append(FrameTag::DICT_VERSION, &[0; 10]).unwrap();
        let mut meta = MemoryLog::new();

        let info = recover_logs(&mut meta, &mut data).unwrap();
        assert!(info.is_empty());
        assert_eq!(data.len(), LOG_HEADER_SIZE);
        assert_eq!(meta.len(), LOG_HEADER_SIZE);
    }
}

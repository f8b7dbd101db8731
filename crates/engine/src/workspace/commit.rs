//! Commit context: the captured outcome of phase one
//!
//! `Workspace::prepare_commit` writes every changed object to the data log
//! and records what it wrote here. `Workspace::finalize_commit` applies
//! exactly this context; it never re-inspects the dirty set.
//!
//! # Commit Sequence
//!
//! 1. Collect the dirty set
//! 2. For each object with changes: write an object-version frame
//!    (previous version pointer from the version index, then its diff)
//! 3. Stage the new positions in the version index and write its diff as a
//!    frame of its own; that frame becomes the new VersionIndexPtr
//! 4. Append the meta commit record (when a meta log is configured)
//! 5. Finalize: objects fold exactly the diffs written in step 2, watermarks
//!    advance. Edits made after step 2 stay pending.

use crate::object::ObjectCell;
use statejournal_core::{ObjectId, Result};
use statejournal_storage::{FrameTag, LogSink, MetaCommitRecord, ObjectVersionRecord};

/// One frame written during prepare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    /// Object the frame belongs to
    pub object_id: ObjectId,
    /// Tag the frame was written with
    pub frame_tag: FrameTag,
    /// Log position of the frame
    pub position: u64,
    /// Diff payload carried by the frame
    pub diff_payload: Vec<u8>,
}

/// An object captured from the dirty set by prepare
#[derive(Debug)]
pub(crate) struct CapturedObject {
    pub(crate) cell: ObjectCell,
    /// Index into `written_records` of the version written for this object
    pub(crate) written: Option<usize>,
}

/// Result of `prepare_commit`, input of `finalize_commit`
#[derive(Debug)]
pub struct CommitContext {
    /// Epoch this commit will close
    pub epoch_seq: u64,
    /// Data log length after this commit's frames
    pub data_tail: u64,
    /// Position of the version index written by this commit
    pub version_index_ptr: u64,
    /// Root object recorded by this commit
    pub root_object_id: Option<ObjectId>,
    /// Frames written, in log order
    pub written_records: Vec<WrittenRecord>,
    /// Objects captured by prepare; drained by finalize
    pub(crate) captured: Vec<CapturedObject>,
}

impl CommitContext {
    /// Context for `epoch_seq` starting from the current watermarks
    pub fn new(
        epoch_seq: u64,
        data_tail: u64,
        version_index_ptr: u64,
        root_object_id: Option<ObjectId>,
    ) -> Self {
        Self {
            epoch_seq,
            data_tail,
            version_index_ptr,
            root_object_id,
            written_records: Vec::new(),
            captured: Vec::new(),
        }
    }

    /// Append an object version frame and record it
    ///
    /// Advances `data_tail` to the log tail and returns the frame position.
    pub fn write_object_version<L: LogSink + ?Sized>(
        &mut self,
        log: &mut L,
        object_id: ObjectId,
        prev_version_ptr: u64,
        diff_payload: &[u8],
        frame_tag: FrameTag,
    ) -> Result<u64> {
        let body = ObjectVersionRecord::encode(prev_version_ptr, diff_payload);
        let position = log.append(frame_tag, &body)?;
        self.written_records.push(WrittenRecord {
            object_id,
            frame_tag,
            position,
            diff_payload: diff_payload.to_vec(),
        });
        self.data_tail = log.tail();
        Ok(position)
    }

    /// Meta commit record closing this epoch
    pub fn build_meta_commit_record(&self, next_object_id: ObjectId) -> MetaCommitRecord {
        MetaCommitRecord {
            epoch_seq: self.epoch_seq,
            root_object_id: self.root_object_id,
            version_index_ptr: self.version_index_ptr,
            data_tail: self.data_tail,
            next_object_id,
        }
    }

    /// Number of objects prepare captured that finalize has not yet applied
    pub fn pending_objects(&self) -> usize {
        self.captured.len()
    }
}

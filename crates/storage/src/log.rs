//! Append-only frame logs
//!
//! A journal uses two logs:
//!
//! - the data log, holding object-version frames (every changed object plus
//!   the version index of each commit)
//! - the meta log, holding one meta-commit frame per commit
//!
//! Both speak [`LogSink`] for writing and [`LogSource`] for reading.
//! [`MemoryLog`] is the in-memory implementation; a log shared between a
//! workspace and its loader is wrapped as [`SharedLog`].
//!
//! Positions are absolute byte offsets. Every log starts with an 8-byte
//! header, so no frame ever sits at position 0 and 0 can serve as the
//! "no previous version" pointer.

use crate::format::frame::{read_frame, write_frame, Frame, FrameTag};
use parking_lot::Mutex;
use statejournal_core::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Magic bytes at the start of every log
pub const LOG_MAGIC: [u8; 4] = *b"SJNL";

/// Log format revision
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Size of the log header (magic + version)
pub const LOG_HEADER_SIZE: u64 = 8;

/// Write side of a log
pub trait LogSink: Send {
    /// Position the next frame will be written at
    fn tail(&self) -> u64;

    /// Append a frame, returning its start position
    fn append(&mut self, tag: FrameTag, payload: &[u8]) -> Result<u64>;
}

/// Read side of a log
pub trait LogSource: Send + Sync {
    /// Read the frame at `position`, copying its payload
    fn read_frame_owned(&self, position: u64) -> Result<(FrameTag, Vec<u8>)>;

    /// Current length of the log in bytes
    fn len(&self) -> u64;

    /// True if the log holds no frames
    fn is_empty(&self) -> bool {
        self.len() <= LOG_HEADER_SIZE
    }
}

/// A log that is appended to and read back
///
/// Implemented for every type that is both a [`LogSink`] and a
/// [`LogSource`].
pub trait Log: LogSink + LogSource {
    /// Read side of this log
    fn as_source(&self) -> &dyn LogSource;
}

impl<T: LogSink + LogSource> Log for T {
    fn as_source(&self) -> &dyn LogSource {
        self
    }
}

/// A log shared between writers and readers
pub type SharedLog = Arc<Mutex<MemoryLog>>;

/// In-memory log
#[derive(Debug, Clone)]
pub struct MemoryLog {
    bytes: Vec<u8>,
}

impl MemoryLog {
    /// Create an empty log (header only)
    pub fn new() -> Self {
        let mut bytes = Vec::with_capacity(4096);
        bytes.extend_from_slice(&LOG_MAGIC);
        bytes.extend_from_slice(&LOG_FORMAT_VERSION.to_le_bytes());
        Self { bytes }
    }

    /// Create an empty log wrapped for sharing
    pub fn shared() -> SharedLog {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Adopt previously persisted log bytes
    ///
    /// Only the header is validated; torn frames at the end are found by
    /// [`frames`](Self::frames) and handled by recovery.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < LOG_HEADER_SIZE as usize {
            return Err(Error::FrameCorrupt {
                position: 0,
                reason: format!("log header needs {} bytes, got {}", LOG_HEADER_SIZE, bytes.len()),
            });
        }
        if bytes[..4] != LOG_MAGIC {
            return Err(Error::FrameCorrupt {
                position: 0,
                reason: "bad log magic".to_string(),
            });
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != LOG_FORMAT_VERSION {
            return Err(Error::FrameCorrupt {
                position: 4,
                reason: format!("unsupported log format version {}", version),
            });
        }
        Ok(Self { bytes })
    }

    /// Raw log bytes, header included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read the frame starting at `position`
    pub fn read_frame(&self, position: u64) -> Result<Frame<'_>> {
        if position < LOG_HEADER_SIZE || position >= self.len() {
            return Err(Error::FrameCorrupt {
                position,
                reason: format!("position outside log (length {})", self.len()),
            });
        }
        read_frame(&self.bytes[position as usize..], position)
    }

    /// Iterate over frames from the start of the log
    ///
    /// Stops after the first frame that fails to decode, yielding its error.
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            log: self,
            position: LOG_HEADER_SIZE,
            done: false,
        }
    }

    /// Cut the log back to `len` bytes
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        if len < LOG_HEADER_SIZE {
            return Err(Error::InvalidArgument(format!(
                "cannot truncate log below its {}-byte header",
                LOG_HEADER_SIZE
            )));
        }
        if len > self.len() {
            return Err(Error::InvalidArgument(format!(
                "cannot truncate log of {} bytes to {}",
                self.len(),
                len
            )));
        }
        if len < self.len() {
            debug!(from = self.len(), to = len, "Truncating log");
        }
        self.bytes.truncate(len as usize);
        Ok(())
    }

    /// Append raw bytes without framing (simulates a torn write)
    pub fn append_raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Current length in bytes
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// True if the log holds no frames
    pub fn is_empty(&self) -> bool {
        self.len() <= LOG_HEADER_SIZE
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemoryLog {
    fn tail(&self) -> u64 {
        self.len()
    }

    fn append(&mut self, tag: FrameTag, payload: &[u8]) -> Result<u64> {
        let position = self.len();
        write_frame(&mut self.bytes, tag, payload)?;
        Ok(position)
    }
}

impl LogSource for MemoryLog {
    fn read_frame_owned(&self, position: u64) -> Result<(FrameTag, Vec<u8>)> {
        let frame = self.read_frame(position)?;
        Ok((frame.tag, frame.payload.to_vec()))
    }

    fn len(&self) -> u64 {
        MemoryLog::len(self)
    }
}

impl<L: LogSink> LogSink for Arc<Mutex<L>> {
    fn tail(&self) -> u64 {
        self.lock().tail()
    }

    fn append(&mut self, tag: FrameTag, payload: &[u8]) -> Result<u64> {
        self.lock().append(tag, payload)
    }
}

impl<L: LogSource> LogSource for Arc<Mutex<L>> {
    fn read_frame_owned(&self, position: u64) -> Result<(FrameTag, Vec<u8>)> {
        self.lock().read_frame_owned(position)
    }

    fn len(&self) -> u64 {
        self.lock().len()
    }
}

/// Iterator over `(position, frame)` pairs of a [`MemoryLog`]
pub struct Frames<'a> {
    log: &'a MemoryLog,
    position: u64,
    done: bool,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<(u64, Frame<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.position >= self.log.len() {
            return None;
        }
        match self.log.read_frame(self.position) {
            Ok(frame) => {
                let position = self.position;
                self.position += frame.encoded_len() as u64;
                Some(Ok((position, frame)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

//! Append-only event journal
//!
//! Binary format, one entry per event:
//!
//! ```text
//! [body_len: u32]
//! [sequence:  u64]
//! [timestamp: i64]
//! [payload_len: u32][payload: bincode(EngineEvent)]
//! [checksum: u32]   CRC32C over sequence ++ timestamp ++ payload
//! ```
//!
//! All integers little-endian. Files rotate at a size threshold and are
//! named `journal-NNNNNN.bin` so readers can replay them in order.

use crc32c::crc32c;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;
use types::now_nanos;

use crate::events::EngineEvent;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Sequence error: expected {expected}, got {got}")]
    Sequence { expected: u64, got: u64 },
}

/// One persisted event in its framed form
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub sequence: u64,
    /// Unix nanos at append time
    pub timestamp: i64,
    /// Bincode-encoded `EngineEvent`
    pub payload: Vec<u8>,
    pub checksum: u32,
}

impl JournalEntry {
    pub fn new(sequence: u64, timestamp: i64, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp, &payload);
        Self {
            sequence,
            timestamp,
            payload,
            checksum,
        }
    }

    pub fn compute_checksum(sequence: u64, timestamp: i64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, &self.payload)
    }

    /// Decode the payload back into its event
    pub fn event(&self) -> Result<EngineEvent, JournalError> {
        EngineEvent::decode(&self.payload).map_err(|e| JournalError::Encoding(e.to_string()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len = self.payload.len() as u32;
        // seq + ts + payload_len field + payload + crc
        let body_len: u32 = 8 + 8 + 4 + payload_len + 4;

        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parse one entry from the front of `data`
    ///
    /// Returns `(entry, bytes_consumed)`. Never panics on malformed input:
    /// short or implausible frames come back as `Encoding` errors so the
    /// reader can treat a damaged tail as end-of-log.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        const MIN_BODY: usize = 8 + 8 + 4 + 4;

        if data.len() < 4 {
            return Err(JournalError::Encoding("short length prefix".into()));
        }
        let body_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if body_len < MIN_BODY || body_len > 64 * 1024 * 1024 {
            return Err(JournalError::Encoding(format!(
                "implausible body length {body_len}"
            )));
        }
        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Encoding(format!(
                "truncated entry: need {total} bytes, have {}",
                data.len()
            )));
        }

        let body = &data[4..total];
        let sequence = u64::from_le_bytes(body[0..8].try_into().expect("sized slice"));
        let timestamp = i64::from_le_bytes(body[8..16].try_into().expect("sized slice"));
        let payload_len = u32::from_le_bytes(body[16..20].try_into().expect("sized slice")) as usize;

        if 20 + payload_len + 4 != body.len() {
            return Err(JournalError::Encoding(format!(
                "payload length {payload_len} inconsistent with body {}",
                body.len()
            )));
        }
        let payload = body[20..20 + payload_len].to_vec();
        let checksum =
            u32::from_le_bytes(body[20 + payload_len..].try_into().expect("sized slice"));

        Ok((
            Self {
                sequence,
                timestamp,
                payload,
                checksum,
            },
            total,
        ))
    }
}

/// Journal writer configuration
#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub dir: PathBuf,
    /// Rotate to a new file once the current one reaches this size
    pub max_file_size: u64,
    /// Fsync after every append; tests turn this off for speed
    pub sync_on_append: bool,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
            sync_on_append: true,
        }
    }
}

/// Append-only writer with sequence validation and rotation
pub struct JournalWriter {
    config: JournalConfig,
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_file_size: u64,
    next_sequence: u64,
    file_index: u64,
}

impl JournalWriter {
    /// Open for appending, creating the directory if needed
    ///
    /// Picks up the highest-numbered existing journal file so a restart
    /// continues the same series.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;

        let file_index = Self::latest_index(&config.dir);
        let current_file = Self::journal_path(&config.dir, file_index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_file)?;
        let current_file_size = file.metadata()?.len();

        Ok(Self {
            config,
            writer: BufWriter::new(file),
            current_file,
            current_file_size,
            next_sequence: 1,
            file_index,
        })
    }

    /// Set the next expected sequence (after recovery)
    pub fn set_next_sequence(&mut self, seq: u64) {
        self.next_sequence = seq;
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn current_file_path(&self) -> &Path {
        &self.current_file
    }

    /// Append an event, assigning it the next sequence number
    pub fn append_event(&mut self, event: &EngineEvent) -> Result<JournalEntry, JournalError> {
        let payload = event
            .encode()
            .map_err(|e| JournalError::Encoding(e.to_string()))?;
        let entry = JournalEntry::new(self.next_sequence, now_nanos(), payload);
        self.append(&entry)?;
        debug!(
            sequence = entry.sequence,
            event_type = event.event_type(),
            "event journaled"
        );
        Ok(entry)
    }

    /// Append a pre-built entry; sequence must be the next expected
    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if entry.sequence != self.next_sequence {
            return Err(JournalError::Sequence {
                expected: self.next_sequence,
                got: entry.sequence,
            });
        }
        if self.current_file_size >= self.config.max_file_size {
            self.rotate()?;
        }

        let bytes = entry.to_bytes();
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        if self.config.sync_on_append {
            self.writer.get_ref().sync_all()?;
        }

        self.current_file_size += bytes.len() as u64;
        self.next_sequence = entry.sequence + 1;
        Ok(())
    }

    /// Flush and fsync; called before shutdown
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;
        self.file_index += 1;
        self.current_file = Self::journal_path(&self.config.dir, self.file_index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_file)?;
        self.writer = BufWriter::new(file);
        self.current_file_size = 0;
        Ok(())
    }

    pub(crate) fn journal_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(format!("journal-{index:06}.bin"))
    }

    pub(crate) fn parse_index(name: &str) -> Option<u64> {
        name.strip_prefix("journal-")?
            .strip_suffix(".bin")?
            .parse()
            .ok()
    }

    fn latest_index(dir: &Path) -> u64 {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| Self::parse_index(&e.file_name().to_string_lossy()))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

/// Shared, mutex-guarded journal handle for the request path
///
/// Handlers append through this after each successful mutation; the mutex
/// makes sequence assignment atomic across concurrent requests.
pub struct EventLog {
    writer: Mutex<JournalWriter>,
}

impl EventLog {
    pub fn new(writer: JournalWriter) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        Ok(Self::new(JournalWriter::open(config)?))
    }

    /// Append one event; returns its assigned sequence number
    pub fn append(&self, event: &EngineEvent) -> Result<u64, JournalError> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let entry = writer.append_event(event)?;
        Ok(entry.sequence)
    }

    /// Set the next sequence after journal replay
    pub fn set_next_sequence(&self, seq: u64) {
        self.writer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_next_sequence(seq);
    }

    pub fn sync(&self) -> Result<(), JournalError> {
        self.writer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sync()
    }
}

//! Journal reader
//!
//! Replays journal files in index order, verifying every entry's CRC32C
//! checksum. A truncated or unparsable tail in the newest file is the
//! normal result of a crash mid-append and ends the read cleanly; a
//! checksum mismatch in the middle of the log is real corruption and
//! fails the replay.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::events::EngineEvent;
use crate::journal::{JournalEntry, JournalError, JournalWriter};

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Checksum mismatch at byte offset {offset}, sequence {sequence}")]
    ChecksumMismatch { offset: u64, sequence: u64 },

    #[error("Sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },
}

/// Sequential reader over every journal file in a directory
pub struct JournalReader {
    files: Vec<PathBuf>,
    current_file_idx: usize,
    data: Vec<u8>,
    pos: usize,
    global_offset: u64,
    last_sequence: Option<u64>,
}

impl JournalReader {
    pub fn open(dir: &Path) -> Result<Self, ReaderError> {
        let files = Self::discover_files(dir)?;
        let mut reader = Self {
            files,
            current_file_idx: 0,
            data: Vec::new(),
            pos: 0,
            global_offset: 0,
            last_sequence: None,
        };
        reader.load_current_file()?;
        Ok(reader)
    }

    /// Next checksum-verified entry, or `None` at end of log
    ///
    /// An unparsable tail stops the read: everything before it is the
    /// durable prefix.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        loop {
            if self.pos >= self.data.len() {
                if !self.advance_file()? {
                    return Ok(None);
                }
            }

            let offset = self.global_offset;
            match JournalEntry::from_bytes(&self.data[self.pos..]) {
                Ok((entry, consumed)) => {
                    self.pos += consumed;
                    self.global_offset += consumed as u64;
                    if !entry.verify_checksum() {
                        return Err(ReaderError::ChecksumMismatch {
                            offset,
                            sequence: entry.sequence,
                        });
                    }
                    self.last_sequence = Some(entry.sequence);
                    return Ok(Some(entry));
                }
                Err(_) => {
                    let remaining = self.data.len() - self.pos;
                    let last_file = self.current_file_idx + 1 == self.files.len();
                    if last_file {
                        // Interrupted final append; the prefix is the log
                        warn!(
                            offset,
                            remaining, "truncated journal tail; treating as end of log"
                        );
                        self.pos = self.data.len();
                        return Ok(None);
                    }
                    // Damage in a rotated (sealed) file is never benign
                    return Err(ReaderError::Journal(JournalError::Encoding(format!(
                        "unparsable entry at offset {offset} in sealed journal file"
                    ))));
                }
            }
        }
    }

    /// Read every entry, enforcing gapless monotonic sequences
    pub fn read_all(&mut self) -> Result<Vec<JournalEntry>, ReaderError> {
        let mut entries = Vec::new();
        let mut expected: Option<u64> = None;

        while let Some(entry) = self.next_entry()? {
            if let Some(exp) = expected {
                if entry.sequence != exp {
                    return Err(ReaderError::SequenceGap {
                        expected: exp,
                        got: entry.sequence,
                    });
                }
            }
            expected = Some(entry.sequence + 1);
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Read and decode every event in order
    pub fn read_events(&mut self) -> Result<Vec<EngineEvent>, ReaderError> {
        self.read_all()?
            .iter()
            .map(|e| e.event().map_err(ReaderError::from))
            .collect()
    }

    /// Sequence of the last successfully read entry
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, ReaderError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                JournalWriter::parse_index(&e.file_name().to_string_lossy())
                    .map(|idx| (idx, e.path()))
            })
            .collect();
        files.sort_by_key(|(idx, _)| *idx);
        Ok(files.into_iter().map(|(_, p)| p).collect())
    }

    fn load_current_file(&mut self) -> Result<(), ReaderError> {
        self.data.clear();
        self.pos = 0;
        if self.current_file_idx < self.files.len() {
            let mut file = File::open(&self.files[self.current_file_idx])?;
            file.read_to_end(&mut self.data)?;
        }
        Ok(())
    }

    fn advance_file(&mut self) -> Result<bool, ReaderError> {
        self.current_file_idx += 1;
        if self.current_file_idx < self.files.len() {
            self.load_current_file()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalConfig;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use types::escrow::AssetKind;
    use types::ids::OwnerId;

    fn test_config(dir: &Path) -> JournalConfig {
        JournalConfig {
            sync_on_append: false,
            ..JournalConfig::new(dir)
        }
    }

    fn write_events(dir: &Path, count: u32) {
        let mut writer = JournalWriter::open(test_config(dir)).unwrap();
        for i in 1..=count {
            writer
                .append_event(&EngineEvent::BalanceDeposited {
                    owner_id: OwnerId::new(),
                    asset: AssetKind::CurrencyToken,
                    amount: Decimal::from(i),
                })
                .unwrap();
        }
        writer.sync().unwrap();
    }

    fn journal_file(dir: &Path) -> PathBuf {
        JournalWriter::journal_path(dir, 0)
    }

    #[test]
    fn test_read_back_in_order() {
        let tmp = TempDir::new().unwrap();
        write_events(tmp.path(), 20);

        let mut reader = JournalReader::open(tmp.path()).unwrap();
        let events = reader.read_events().unwrap();
        assert_eq!(events.len(), 20);
        assert_eq!(reader.last_sequence(), Some(20));
        match &events[4] {
            EngineEvent::BalanceDeposited { amount, .. } => {
                assert_eq!(*amount, Decimal::from(5));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let mut reader = JournalReader::open(tmp.path()).unwrap();
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let mut reader = JournalReader::open(&tmp.path().join("nope")).unwrap();
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_tail_is_clean_end() {
        let tmp = TempDir::new().unwrap();
        write_events(tmp.path(), 5);

        // Chop bytes off the last entry, as an interrupted append would
        let path = journal_file(tmp.path());
        let data = fs::read(&path).unwrap();
        fs::write(&path, &data[..data.len() - 7]).unwrap();

        let mut reader = JournalReader::open(tmp.path()).unwrap();
        let entries = reader.read_all().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(reader.last_sequence(), Some(4));
    }

    #[test]
    fn test_checksum_mismatch_fails_replay() {
        let tmp = TempDir::new().unwrap();
        write_events(tmp.path(), 5);

        // Flip a payload byte inside the first entry, past the 4-byte
        // length prefix and 20-byte header
        let path = journal_file(tmp.path());
        let mut data = fs::read(&path).unwrap();
        data[30] ^= 0xFF;
        fs::write(&path, &data).unwrap();

        let mut reader = JournalReader::open(tmp.path()).unwrap();
        let err = reader.read_all().unwrap_err();
        assert!(matches!(err, ReaderError::ChecksumMismatch { sequence: 1, .. }));
    }

    #[test]
    fn test_multi_file_replay() {
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            max_file_size: 64,
            ..test_config(tmp.path())
        };
        let mut writer = JournalWriter::open(config).unwrap();
        for i in 1..=30u32 {
            writer
                .append_event(&EngineEvent::BalanceDeposited {
                    owner_id: OwnerId::new(),
                    asset: AssetKind::EnergyToken,
                    amount: Decimal::from(i),
                })
                .unwrap();
        }
        writer.sync().unwrap();

        let mut reader = JournalReader::open(tmp.path()).unwrap();
        let entries = reader.read_all().unwrap();
        assert_eq!(entries.len(), 30);
        assert_eq!(entries.last().unwrap().sequence, 30);
    }

    proptest! {
        // Arbitrary bytes must never panic the frame parser.
        #[test]
        fn prop_from_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = JournalEntry::from_bytes(&data);
        }
    }
}

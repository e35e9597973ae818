//! Append-only write-ahead log.
//!
//! Each entry is framed as `[u8 tag][u32 BE key_len][key]` plus, for Set,
//! `[u32 BE value_len][value]` (tag 1 = Set, 2 = Delete). Appends flush and
//! fsync before returning, so an acknowledged mutation survives a crash.
//!
//! Replay tolerates a torn final record: a short read, unknown tag,
//! implausible length, or non-UTF-8 key stops replay at the last fully
//! readable entry. The truncated tail is discarded silently — it was never
//! acknowledged — and entries are never skipped out of order.

use crate::config::MAX_WAL_FIELD_BYTES;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

const TAG_SET: u8 = 1;
const TAG_DELETE: u8 = 2;

/// One durable mutation record, appended in commit order.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Set { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// Receiver for replayed entries, invoked in commit order.
pub trait WalApplier {
    fn apply_set(&mut self, key: String, value: Vec<u8>);
    fn apply_delete(&mut self, key: &str);
}

/// Diagnostic outcome of a replay pass.
#[derive(Debug, Default)]
pub struct ReplayStats {
    /// Entries fully read and applied.
    pub applied: usize,
    /// Whether replay stopped at a torn or malformed tail.
    pub truncated: bool,
}

/// Synchronous append-only log. Thread-safe via `parking_lot::Mutex`.
pub struct WriteAheadLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl WriteAheadLog {
    /// Open or create the log file in append mode.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Durably record one entry: write, flush, fsync.
    pub fn append(&self, entry: &LogEntry) -> io::Result<()> {
        match entry {
            LogEntry::Set { key, value } => self.append_set(key, value),
            LogEntry::Delete { key } => self.append_delete(key),
        }
    }

    /// Durably record a Set without taking ownership of the value.
    pub fn append_set(&self, key: &str, value: &[u8]) -> io::Result<()> {
        check_field_len("key", key.len())?;
        check_field_len("value", value.len())?;
        let mut frame = Vec::with_capacity(9 + key.len() + value.len());
        frame.push(TAG_SET);
        frame.extend_from_slice(&(key.len() as u32).to_be_bytes());
        frame.extend_from_slice(key.as_bytes());
        frame.extend_from_slice(&(value.len() as u32).to_be_bytes());
        frame.extend_from_slice(value);
        self.write_frame(&frame)
    }

    /// Durably record a Delete.
    pub fn append_delete(&self, key: &str) -> io::Result<()> {
        check_field_len("key", key.len())?;
        let mut frame = Vec::with_capacity(5 + key.len());
        frame.push(TAG_DELETE);
        frame.extend_from_slice(&(key.len() as u32).to_be_bytes());
        frame.extend_from_slice(key.as_bytes());
        self.write_frame(&frame)
    }

    fn write_frame(&self, frame: &[u8]) -> io::Result<()> {
        let mut w = self.writer.lock();
        w.write_all(frame)?;
        w.flush()?;
        w.get_mut().sync_all()
    }

    /// Read entries from the beginning in commit order, feeding `applier`.
    ///
    /// Only hard I/O errors propagate; a corrupt tail is absorbed and
    /// reported through [`ReplayStats::truncated`].
    pub fn replay(&self, applier: &mut impl WalApplier) -> io::Result<ReplayStats> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut stats = ReplayStats::default();

        loop {
            let mut tag = [0u8; 1];
            match reader.read_exact(&mut tag) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            if tag[0] != TAG_SET && tag[0] != TAG_DELETE {
                tracing::warn!("unknown WAL tag {}, discarding tail", tag[0]);
                stats.truncated = true;
                break;
            }

            let Some(key_bytes) = read_field(&mut reader)? else {
                stats.truncated = true;
                break;
            };
            let Ok(key) = String::from_utf8(key_bytes) else {
                tracing::warn!("non-UTF-8 WAL key, discarding tail");
                stats.truncated = true;
                break;
            };

            if tag[0] == TAG_SET {
                let Some(value) = read_field(&mut reader)? else {
                    stats.truncated = true;
                    break;
                };
                applier.apply_set(key, value);
            } else {
                applier.apply_delete(&key);
            }
            stats.applied += 1;
        }

        if stats.truncated {
            tracing::warn!(
                "WAL replay stopped at a torn record after {} entries",
                stats.applied
            );
        }
        Ok(stats)
    }

    /// Atomically empty the log. Only called after a snapshot has durably
    /// captured everything the log represents.
    pub fn reset(&self) -> io::Result<()> {
        let mut writer = self.writer.lock();
        let truncated = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        truncated.sync_all()?;
        *writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        );
        Ok(())
    }

    /// Flush and fsync any buffered bytes.
    pub fn sync(&self) -> io::Result<()> {
        let mut w = self.writer.lock();
        w.flush()?;
        w.get_mut().sync_all()
    }
}

/// Reject a field the replay guard would refuse to read back. Appends and
/// replay must agree on the cap, or an acknowledged entry could later be
/// reclassified as a corrupt tail and dropped along with everything after it.
fn check_field_len(what: &str, len: usize) -> io::Result<()> {
    if len > MAX_WAL_FIELD_BYTES as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} of {len} bytes exceeds the WAL field limit"),
        ));
    }
    Ok(())
}

/// Read one `[u32 BE len][bytes]` field. `Ok(None)` means the tail is torn
/// (short read or implausible length); hard errors propagate.
fn read_field(reader: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_WAL_FIELD_BYTES {
        tracing::warn!("implausible WAL field length {len}, discarding tail");
        return Ok(None);
    }
    let mut buf = vec![0u8; len as usize];
    match reader.read_exact(&mut buf) {
        Ok(()) => Ok(Some(buf)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingApplier {
        ops: Vec<LogEntry>,
    }

    impl WalApplier for RecordingApplier {
        fn apply_set(&mut self, key: String, value: Vec<u8>) {
            self.ops.push(LogEntry::Set { key, value });
        }
        fn apply_delete(&mut self, key: &str) {
            self.ops.push(LogEntry::Delete {
                key: key.to_string(),
            });
        }
    }

    fn open_wal(dir: &TempDir) -> WriteAheadLog {
        WriteAheadLog::open(dir.path().join("test.wal")).unwrap()
    }

    #[test]
    fn append_and_replay_in_commit_order() {
        let dir = TempDir::new().unwrap();
        let wal = open_wal(&dir);
        wal.append_set("a", b"one").unwrap();
        wal.append_delete("a").unwrap();
        wal.append_set("b", b"").unwrap();

        let mut applier = RecordingApplier::default();
        let stats = wal.replay(&mut applier).unwrap();
        assert_eq!(stats.applied, 3);
        assert!(!stats.truncated);
        assert_eq!(
            applier.ops,
            vec![
                LogEntry::Set {
                    key: "a".into(),
                    value: b"one".to_vec()
                },
                LogEntry::Delete { key: "a".into() },
                LogEntry::Set {
                    key: "b".into(),
                    value: Vec::new()
                },
            ]
        );
    }

    #[test]
    fn torn_tail_is_discarded_silently() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.wal");
        {
            let wal = WriteAheadLog::open(&path).unwrap();
            wal.append_set("good", b"value").unwrap();
        }
        // Half a frame: valid tag, truncated key length.
        let mut raw = std::fs::read(&path).unwrap();
        raw.extend_from_slice(&[1, 0, 0]);
        std::fs::write(&path, &raw).unwrap();

        let wal = WriteAheadLog::open(&path).unwrap();
        let mut applier = RecordingApplier::default();
        let stats = wal.replay(&mut applier).unwrap();
        assert_eq!(stats.applied, 1);
        assert!(stats.truncated);
    }

    #[test]
    fn unknown_tag_stops_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.wal");
        {
            let wal = WriteAheadLog::open(&path).unwrap();
            wal.append_delete("k").unwrap();
        }
        let mut raw = std::fs::read(&path).unwrap();
        raw.extend_from_slice(&[9, 9, 9, 9]);
        std::fs::write(&path, &raw).unwrap();

        let wal = WriteAheadLog::open(&path).unwrap();
        let mut applier = RecordingApplier::default();
        let stats = wal.replay(&mut applier).unwrap();
        assert_eq!(stats.applied, 1);
        assert!(stats.truncated);
    }

    #[test]
    fn implausible_length_is_treated_as_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.wal");
        {
            let wal = WriteAheadLog::open(&path).unwrap();
            wal.append_set("k", b"v").unwrap();
        }
        let mut raw = std::fs::read(&path).unwrap();
        raw.push(TAG_SET);
        raw.extend_from_slice(&u32::MAX.to_be_bytes());
        std::fs::write(&path, &raw).unwrap();

        let wal = WriteAheadLog::open(&path).unwrap();
        let mut applier = RecordingApplier::default();
        let stats = wal.replay(&mut applier).unwrap();
        assert_eq!(stats.applied, 1);
        assert!(stats.truncated);
    }

    #[test]
    fn oversized_fields_are_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let wal = open_wal(&dir);
        wal.append_set("before", b"ok").unwrap();

        // An append the replay guard would refuse to read back must fail up
        // front instead of being acknowledged and lost on recovery.
        let huge = vec![0u8; MAX_WAL_FIELD_BYTES as usize + 1];
        let err = wal.append_set("big", &huge).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let long_key = "k".repeat(MAX_WAL_FIELD_BYTES as usize + 1);
        assert!(wal.append_delete(&long_key).is_err());

        wal.append_set("after", b"kept").unwrap();
        let mut applier = RecordingApplier::default();
        let stats = wal.replay(&mut applier).unwrap();
        assert_eq!(stats.applied, 2, "rejected append must leave no frame");
        assert!(!stats.truncated);
        assert_eq!(
            applier.ops,
            vec![
                LogEntry::Set {
                    key: "before".into(),
                    value: b"ok".to_vec()
                },
                LogEntry::Set {
                    key: "after".into(),
                    value: b"kept".to_vec()
                },
            ]
        );
    }

    #[test]
    fn field_at_the_cap_roundtrips() {
        // The cap itself is writable; only lengths beyond it are refused,
        // matching what replay accepts.
        assert!(check_field_len("value", MAX_WAL_FIELD_BYTES as usize).is_ok());
        assert!(check_field_len("value", MAX_WAL_FIELD_BYTES as usize + 1).is_err());
    }

    #[test]
    fn reset_empties_the_log_and_allows_new_appends() {
        let dir = TempDir::new().unwrap();
        let wal = open_wal(&dir);
        wal.append_set("old", b"gone").unwrap();
        wal.reset().unwrap();

        let mut applier = RecordingApplier::default();
        assert_eq!(wal.replay(&mut applier).unwrap().applied, 0);

        wal.append_set("new", b"kept").unwrap();
        let mut applier = RecordingApplier::default();
        let stats = wal.replay(&mut applier).unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(
            applier.ops[0],
            LogEntry::Set {
                key: "new".into(),
                value: b"kept".to_vec()
            }
        );
    }

    #[test]
    fn empty_log_replays_cleanly() {
        let dir = TempDir::new().unwrap();
        let wal = open_wal(&dir);
        let mut applier = RecordingApplier::default();
        let stats = wal.replay(&mut applier).unwrap();
        assert_eq!(stats.applied, 0);
        assert!(!stats.truncated);
    }
}

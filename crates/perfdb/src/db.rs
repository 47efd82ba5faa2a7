//! File-backed store of tuning records.
//!
//! One record per line. Every mutating operation takes the exclusive lock,
//! re-reads the file, applies its change in memory, and atomically replaces
//! the file, so concurrent writers interleave without losing each other's
//! updates. Lines that fail to parse are kept verbatim across rewrites.

use crate::lockfile::LockFile;
use crate::record::Record;
use crate::serialize::{serialize_values, TuningFields};
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

enum Line {
    Parsed(Record),
    Raw(String),
}

/// A handle to one performance database file.
///
/// Handles are cheap and carry no file state between operations; open one
/// wherever a database is needed. All handles for a path, across threads
/// and processes, serialize through the `<path>.lock` sidecar.
pub struct PerfDb {
    path: PathBuf,
    lock: Arc<LockFile>,
}

impl PerfDb {
    /// Opens a database at `path`. The file itself is not touched until the
    /// first operation; a missing file reads as an empty database.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock = LockFile::get(&lock_file_path(&path))?;
        Ok(Self { path, lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the record stored under `key`, if any.
    pub fn find_record<K: TuningFields + Clone>(&self, key: &K) -> Result<Option<Record>> {
        let key_text = serialize_values(key);
        let _guard = self.lock.shared()?;
        Ok(self.read_lines().into_iter().find_map(|line| match line {
            Line::Parsed(record) if record.key_text() == key_text => Some(record),
            _ => None,
        }))
    }

    /// Replaces whatever is stored under the record's key. An empty record
    /// prunes the key from the file.
    pub fn store_record(&self, record: &Record) -> Result<()> {
        let _guard = self.lock.exclusive()?;
        let mut lines = self.read_lines();
        remove_key(&mut lines, record.key_text());
        if !record.is_empty() {
            lines.push(Line::Parsed(record.clone()));
        }
        self.write_lines(&lines)
    }

    /// Merges `record` into the stored state: its ids overwrite, ids only
    /// present on disk are kept. `record` absorbs the merged contents, so
    /// the caller observes the post-merge state without re-reading.
    pub fn update_record(&self, record: &mut Record) -> Result<()> {
        let _guard = self.lock.exclusive()?;
        let mut lines = self.read_lines();
        if let Some(existing) = take_key(&mut lines, record.key_text()) {
            record.absorb_missing(&existing);
        }
        if !record.is_empty() {
            lines.push(Line::Parsed(record.clone()));
        }
        self.write_lines(&lines)
    }

    /// Removes the whole record under `key`; true iff one was removed.
    pub fn remove_record<K: TuningFields + Clone>(&self, key: &K) -> Result<bool> {
        let key_text = serialize_values(key);
        let _guard = self.lock.exclusive()?;
        let mut lines = self.read_lines();
        if !remove_key(&mut lines, &key_text) {
            return Ok(false);
        }
        self.write_lines(&lines)?;
        Ok(true)
    }

    /// Loads the value stored under `(key, id)` into `out`. False when the
    /// key or id is absent; `out` is untouched in that case.
    pub fn load<K, V>(&self, key: &K, id: &str, out: &mut V) -> Result<bool>
    where
        K: TuningFields + Clone,
        V: TuningFields + Clone,
    {
        Ok(match self.find_record(key)? {
            Some(record) => record.get_values(id, out),
            None => false,
        })
    }

    /// Merges one `(key, id, value)` triple. Skips the rewrite when the
    /// encoded value is already stored. False when `id` breaks the grammar.
    pub fn update<K, V>(&self, key: &K, id: &str, value: &V) -> Result<bool>
    where
        K: TuningFields + Clone,
        V: TuningFields + Clone,
    {
        let key_text = serialize_values(key);
        let payload = serialize_values(value);

        let _guard = self.lock.exclusive()?;
        let mut lines = self.read_lines();
        let index = match position_of_key(&lines, &key_text) {
            Some(index) => index,
            None => {
                lines.push(Line::Parsed(Record::with_key_text(&key_text)));
                lines.len() - 1
            }
        };
        let Line::Parsed(record) = &mut lines[index] else {
            unreachable!()
        };
        if record.payload(id) == Some(payload.as_str()) {
            return Ok(true);
        }
        if !record.set_payload(id, payload) {
            return Ok(false);
        }
        self.write_lines(&lines)?;
        Ok(true)
    }

    /// Removes one id from the record under `key`, dropping the record when
    /// it empties. False when the id was absent.
    pub fn remove<K: TuningFields + Clone>(&self, key: &K, id: &str) -> Result<bool> {
        let key_text = serialize_values(key);
        let _guard = self.lock.exclusive()?;
        let mut lines = self.read_lines();
        let Some(record) = find_key_mut(&mut lines, &key_text) else {
            return Ok(false);
        };
        if !record.remove_id(id) {
            return Ok(false);
        }
        if record.is_empty() {
            remove_key(&mut lines, &key_text);
        }
        self.write_lines(&lines)?;
        Ok(true)
    }

    fn read_lines(&self) -> Vec<Line> {
        // Read failures, including a missing file, mean an empty database.
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };
        text.lines()
            .map(|line| match Record::parse_line(line) {
                Some(record) => Line::Parsed(record),
                None => {
                    tracing::warn!(path = %self.path.display(), line, "unreadable line kept verbatim");
                    Line::Raw(line.to_owned())
                }
            })
            .collect()
    }

    fn write_lines(&self, lines: &[Line]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to stage rewrite of {}", self.path.display()))?;
        for line in lines {
            let rendered = match line {
                Line::Parsed(record) => record.serialize_line(),
                Line::Raw(raw) => raw.clone(),
            };
            writeln!(temp, "{rendered}")
                .with_context(|| format!("failed to stage rewrite of {}", self.path.display()))?;
        }
        temp.persist(&self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn lock_file_path(db_path: &Path) -> PathBuf {
    let mut os: OsString = db_path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

fn remove_key(lines: &mut Vec<Line>, key_text: &str) -> bool {
    let before = lines.len();
    lines.retain(|line| !matches!(line, Line::Parsed(record) if record.key_text() == key_text));
    lines.len() != before
}

fn position_of_key(lines: &[Line], key_text: &str) -> Option<usize> {
    lines
        .iter()
        .position(|line| matches!(line, Line::Parsed(record) if record.key_text() == key_text))
}

fn take_key(lines: &mut Vec<Line>, key_text: &str) -> Option<Record> {
    let index = position_of_key(lines, key_text)?;
    match lines.remove(index) {
        Line::Parsed(record) => Some(record),
        Line::Raw(_) => unreachable!(),
    }
}

fn find_key_mut<'a>(lines: &'a mut [Line], key_text: &str) -> Option<&'a mut Record> {
    lines.iter_mut().find_map(|line| match line {
        Line::Parsed(record) if record.key_text() == key_text => Some(record),
        _ => None,
    })
}

//! One database record: a problem key and the values stored under it.

use crate::serialize::{deserialize_values, is_clean_text, serialize_values, TuningFields};
use std::collections::BTreeMap;

/// Keys and payloads are comma-joined field lists, so only the structural
/// delimiters are forbidden in them.
fn is_clean_segment(text: &str) -> bool {
    !text.contains([';', '=', ':'])
}

/// A record binds a serialized problem key to per-solver payloads.
///
/// Ids are kept sorted so serialization is canonical, but readers accept
/// any order. A record with no ids is representable in memory ("key seen,
/// nothing useful") and is never written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    key: String,
    values: BTreeMap<String, String>,
}

impl Record {
    pub fn new<K: TuningFields + Clone>(key: &K) -> Self {
        Self::with_key_text(serialize_values(key))
    }

    pub fn with_key_text(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn key_text(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Stores `value` under `id`, replacing any previous payload. Returns
    /// false when `id` would break the line grammar.
    pub fn set_values<V: TuningFields + Clone>(&mut self, id: &str, value: &V) -> bool {
        self.set_payload(id, serialize_values(value))
    }

    /// Raw-payload variant of [`set_values`](Self::set_values).
    pub fn set_payload(&mut self, id: &str, payload: impl Into<String>) -> bool {
        let payload = payload.into();
        if id.is_empty() || !is_clean_text(id) || !is_clean_segment(&payload) {
            return false;
        }
        self.values.insert(id.to_owned(), payload);
        true
    }

    /// Decodes the payload stored under `id` into `out`. Returns false,
    /// leaving `out` untouched, when the id is absent or malformed.
    pub fn get_values<V: TuningFields + Clone>(&self, id: &str, out: &mut V) -> bool {
        match self.values.get(id) {
            Some(payload) => deserialize_values(out, payload),
            None => false,
        }
    }

    pub fn payload(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }

    /// Removes `id`; true iff it was present.
    pub fn remove_id(&mut self, id: &str) -> bool {
        self.values.remove(id).is_some()
    }

    /// Adopts every id of `other` that this record does not carry yet.
    /// Ids already present keep their payloads.
    pub fn absorb_missing(&mut self, other: &Record) {
        for (id, payload) in &other.values {
            self.values
                .entry(id.clone())
                .or_insert_with(|| payload.clone());
        }
    }

    /// Renders the record as one database line.
    pub fn serialize_line(&self) -> String {
        let mut line = String::with_capacity(self.key.len() + 16 * self.values.len());
        line.push_str(&self.key);
        line.push('=');
        for (i, (id, payload)) in self.values.iter().enumerate() {
            if i > 0 {
                line.push(';');
            }
            line.push_str(id);
            line.push(':');
            line.push_str(payload);
        }
        line
    }

    /// Parses one database line. Returns None on any grammar violation;
    /// callers keep such lines verbatim.
    pub fn parse_line(line: &str) -> Option<Record> {
        let (key, rest) = line.split_once('=')?;
        if key.is_empty() || !is_clean_segment(key) {
            return None;
        }
        let mut record = Record::with_key_text(key);
        for entry in rest.split(';') {
            let (id, payload) = entry.split_once(':')?;
            if id.is_empty() || !is_clean_text(id) || !is_clean_segment(payload) {
                return None;
            }
            record.values.insert(id.to_owned(), payload.to_owned());
        }
        Some(record)
    }
}

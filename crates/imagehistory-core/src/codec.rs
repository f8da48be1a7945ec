//! Textual form of a [`DImageHistory`].
//!
//! The history is stored as a JSON document `{"entries": [...]}`. Encoding is
//! deterministic: parameters keep their insertion order and empty fields are
//! omitted, so `to_text(from_text(to_text(h))) == to_text(h)`.
//!
//! Decoding never fails. Entries are pushed into the result as they are read,
//! so a truncated or damaged document yields the entries before the damage.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserializer, Serialize};

use crate::error::CoreError;
use crate::history::{DImageHistory, HistoryEntry};

#[derive(Serialize)]
struct HistoryDocument<'a> {
    entries: &'a [HistoryEntry],
}

impl DImageHistory {
    /// Encodes the history as pretty-printed JSON.
    pub fn to_text(&self) -> Result<String, CoreError> {
        for action in self.actions() {
            if let Some((name, _)) = action.params.iter().find(|(_, v)| !v.is_finite()) {
                return Err(CoreError::NonFiniteParameter {
                    action: action.identifier.clone(),
                    name: name.clone(),
                });
            }
        }
        let document = HistoryDocument {
            entries: self.entries(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Decodes a history, keeping the longest valid prefix of entries.
    ///
    /// Callers treat an empty result as "no provenance known".
    pub fn from_text(text: &str) -> DImageHistory {
        let mut entries = Vec::new();
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let seed = DocumentSeed {
            entries: &mut entries,
        };
        if let Err(err) = seed.deserialize(&mut deserializer) {
            tracing::warn!(kept = entries.len(), "damaged history text: {err}");
        }
        for entry in &mut entries {
            let before = entry.referred_images.len();
            entry.referred_images.retain(|id| id.is_valid());
            if entry.referred_images.len() != before {
                tracing::warn!(
                    dropped = before - entry.referred_images.len(),
                    "dropping invalid referred images"
                );
            }
        }
        DImageHistory::from_entries(entries)
    }

    /// Reads and decodes a history file.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<DImageHistory, CoreError> {
        let text = fs::read_to_string(path)?;
        Ok(DImageHistory::from_text(&text))
    }

    /// Encodes the history and writes it to a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let text = self.to_text()?;
        fs::write(path, text)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Prefix-preserving decoding
// ---------------------------------------------------------------------------

/// Visits the top-level object and forwards the `entries` array to
/// [`EntriesSeed`]. Unknown keys are skipped.
struct DocumentSeed<'a> {
    entries: &'a mut Vec<HistoryEntry>,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a history document")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let entries = self.entries;
        while let Some(key) = map.next_key::<String>()? {
            if key == "entries" {
                map.next_value_seed(EntriesSeed {
                    entries: &mut *entries,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

/// Pushes each entry into the sink as soon as it has been read.
struct EntriesSeed<'a> {
    entries: &'a mut Vec<HistoryEntry>,
}

impl<'de> DeserializeSeed<'de> for EntriesSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for EntriesSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of history entries")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(entry) = seq.next_element::<HistoryEntry>()? {
            self.entries.push(entry);
        }
        Ok(())
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        Ok(())
    }
}

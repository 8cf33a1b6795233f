//! Dataset parsing and the emotion index.
//!
//! A dataset is a list of multi-turn dialogues where every turn carries its own
//! emotion label. The index groups utterances by label once at load time and is
//! read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Human-readable names for the DailyDialog emotion codes.
const CLASS_NAMES: [(&str, &str); 7] = [
    ("0", "no emotion"),
    ("1", "anger"),
    ("2", "disgust"),
    ("3", "fear"),
    ("4", "happiness"),
    ("5", "sadness"),
    ("6", "surprise"),
];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("malformed dataset document: {0}")]
    Document(#[source] serde_json::Error),
    #[error("malformed dataset record on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Dataset label identifier (`"0"`..`"6"` for DailyDialog).
///
/// Labels may arrive as JSON integers or strings; both normalize to the same
/// string code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "LabelValue", into = "String")]
pub struct EmotionClass(String);

impl EmotionClass {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The neutral class, used whenever no expression can be resolved.
    pub fn neutral() -> Self {
        Self::new("0")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Descriptive name of a known DailyDialog code.
    pub fn name(&self) -> Option<&'static str> {
        CLASS_NAMES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for EmotionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmotionClass {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<EmotionClass> for String {
    fn from(class: EmotionClass) -> Self {
        class.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelValue {
    Int(i64),
    Text(String),
}

impl From<LabelValue> for EmotionClass {
    fn from(value: LabelValue) -> Self {
        match value {
            LabelValue::Int(n) => Self(n.to_string()),
            LabelValue::Text(s) => Self(s.trim().to_string()),
        }
    }
}

/// One dialogue: parallel per-turn utterances and labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueRecord {
    pub dialog: Vec<String>,
    /// A `null` label, or a missing trailing label, leaves that turn unlabeled.
    #[serde(default)]
    pub emotion: Vec<Option<EmotionClass>>,
}

/// A single utterance with its label, borrowed from a [`DialogueRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledTurn<'a> {
    pub utterance: &'a str,
    pub class: &'a EmotionClass,
}

impl DialogueRecord {
    /// Turns that have a label at their index. Unlabeled turns are skipped.
    pub fn turns(&self) -> impl Iterator<Item = LabeledTurn<'_>> {
        self.dialog.iter().enumerate().filter_map(|(i, utterance)| {
            let class = self.emotion.get(i)?.as_ref()?;
            Some(LabeledTurn { utterance, class })
        })
    }
}

/// Hugging Face datasets-server export wraps each record in `{"row": ...}`.
#[derive(Deserialize)]
struct RowEnvelope {
    row: DialogueRecord,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetDocument {
    Rows { rows: Vec<RowEnvelope> },
    Records(Vec<DialogueRecord>),
}

/// Parse a dataset document.
///
/// Accepts the datasets-server export (`{"rows": [{"row": {...}}]}`), a bare
/// JSON array of records, or JSON Lines with one record per line.
pub fn parse_dataset(bytes: &[u8]) -> Result<Vec<DialogueRecord>, DatasetError> {
    let text = std::str::from_utf8(bytes)?;

    let document_err = match serde_json::from_str::<DatasetDocument>(text) {
        Ok(DatasetDocument::Rows { rows }) => {
            return Ok(rows.into_iter().map(|r| r.row).collect());
        }
        Ok(DatasetDocument::Records(records)) => return Ok(records),
        Err(e) => e,
    };

    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DialogueRecord>(line) {
            Ok(record) => records.push(record),
            // Nothing parsed yet: this was never JSON Lines.
            Err(_) if records.is_empty() => return Err(DatasetError::Document(document_err)),
            Err(source) => return Err(DatasetError::Line { line: i + 1, source }),
        }
    }

    if records.is_empty() {
        return Err(DatasetError::Document(document_err));
    }
    Ok(records)
}

/// Utterances grouped by emotion class.
///
/// Only classes with at least one utterance have an entry; every other class
/// reads as "no data".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionIndex {
    pools: BTreeMap<EmotionClass, Vec<String>>,
    skipped_turns: usize,
}

impl EmotionIndex {
    /// Utterances for `class`, or `None` when the class has no data.
    pub fn pool(&self, class: &EmotionClass) -> Option<&[String]> {
        self.pools.get(class).map(Vec::as_slice)
    }

    pub fn classes(&self) -> impl Iterator<Item = &EmotionClass> {
        self.pools.keys()
    }

    pub fn class_count(&self) -> usize {
        self.pools.len()
    }

    pub fn total_lines(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    /// Turns dropped because they had no label at their index.
    pub fn skipped_turns(&self) -> usize {
        self.skipped_turns
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// Group every labeled turn of `records` into per-class pools, in input order.
pub fn build_index<'a, I>(records: I) -> EmotionIndex
where
    I: IntoIterator<Item = &'a DialogueRecord>,
{
    let mut index = EmotionIndex::default();

    for record in records {
        let mut labeled = 0usize;
        for turn in record.turns() {
            index
                .pools
                .entry(turn.class.clone())
                .or_default()
                .push(turn.utterance.to_string());
            labeled += 1;
        }
        index.skipped_turns += record.dialog.len() - labeled;
    }

    index
}

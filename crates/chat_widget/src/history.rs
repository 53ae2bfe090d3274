//! Input history - raw submissions with up/down recall
//!
//! The cursor counts backwards from the newest submission: `Some(0)` is the
//! most recent entry, `None` means the user is not navigating.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What the input field should do after a recall step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recall<'a> {
    Fill(&'a str),
    Clear,
    Unchanged,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct InputHistory {
    entries: Vec<String>,
    #[serde(skip)]
    cursor: Option<usize>,
}

impl InputHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored entries are taken as-is.
    pub fn from_entries(entries: Vec<String>) -> Self {
        Self {
            entries,
            cursor: None,
        }
    }

    /// Record a submission. Returns `false` when it repeats the previous entry.
    pub fn push(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.cursor = None;
        if self.entries.last() == Some(&text) {
            return false;
        }
        self.entries.push(text);
        true
    }

    pub fn recall_older(&mut self) -> Recall<'_> {
        if self.entries.is_empty() {
            return Recall::Unchanged;
        }
        let next = match self.cursor {
            None => 0,
            Some(i) if i + 1 < self.entries.len() => i + 1,
            Some(_) => return Recall::Unchanged,
        };
        self.cursor = Some(next);
        Recall::Fill(self.entry_at(next))
    }

    pub fn recall_newer(&mut self) -> Recall<'_> {
        match self.cursor {
            None => Recall::Unchanged,
            Some(0) => {
                self.cursor = None;
                Recall::Clear
            }
            Some(i) => {
                self.cursor = Some(i - 1);
                Recall::Fill(self.entry_at(i - 1))
            }
        }
    }

    fn entry_at(&self, cursor: usize) -> &str {
        &self.entries[self.entries.len() - 1 - cursor]
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

//! Session storage trait and implementations

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::history::InputHistory;
use crate::message::Transcript;

pub const CHAT_HISTORY_KEY: &str = "chatHistory";
pub const MESSAGE_HISTORY_KEY: &str = "messageHistory";

/// Key/value storage scoped to one browsing session.
pub trait SessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

/// In-process store; lives exactly as long as the host session.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    items: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }
}

impl SessionStore for MemorySessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// File-based store: one `<key>.json` document per key.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_path: PathBuf,
}

impl FileSessionStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

impl SessionStore for FileSessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.item_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.base_path)?;
        std::fs::write(self.item_path(key), value)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        let path = self.item_path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Missing or unreadable data yields an empty transcript.
pub fn load_transcript<S: SessionStore + ?Sized>(store: &S) -> Transcript {
    match store.get_item(CHAT_HISTORY_KEY) {
        Ok(Some(json)) => Transcript::from_json(&json).unwrap_or_else(|e| {
            tracing::warn!("Discarding malformed {}: {}", CHAT_HISTORY_KEY, e);
            Transcript::new()
        }),
        Ok(None) => Transcript::new(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", CHAT_HISTORY_KEY, e);
            Transcript::new()
        }
    }
}

/// Missing or unreadable data yields an empty history.
pub fn load_input_history<S: SessionStore + ?Sized>(store: &S) -> InputHistory {
    match store.get_item(MESSAGE_HISTORY_KEY) {
        Ok(Some(json)) => InputHistory::from_json(&json).unwrap_or_else(|e| {
            tracing::warn!("Discarding malformed {}: {}", MESSAGE_HISTORY_KEY, e);
            InputHistory::new()
        }),
        Ok(None) => InputHistory::new(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", MESSAGE_HISTORY_KEY, e);
            InputHistory::new()
        }
    }
}

pub fn save_transcript<S: SessionStore + ?Sized>(
    store: &mut S,
    transcript: &Transcript,
) -> Result<()> {
    store.set_item(CHAT_HISTORY_KEY, &transcript.to_json()?)
}

pub fn save_input_history<S: SessionStore + ?Sized>(
    store: &mut S,
    history: &InputHistory,
) -> Result<()> {
    store.set_item(MESSAGE_HISTORY_KEY, &history.to_json()?)
}

/// Page-unload equivalent: forget both histories.
pub fn clear_session<S: SessionStore + ?Sized>(store: &mut S) -> Result<()> {
    store.remove_item(CHAT_HISTORY_KEY)?;
    store.remove_item(MESSAGE_HISTORY_KEY)
}

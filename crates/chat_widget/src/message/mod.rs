//! Message module - transcript types

mod transcript;

pub use transcript::{Sender, Transcript, TranscriptEntry};

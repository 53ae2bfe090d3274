//! chat_widget - Chat widget controller for a conversational webhook
//!
//! This crate provides everything the widget needs apart from the host page:
//! - `message` - Sender, TranscriptEntry, Transcript
//! - `history` - InputHistory with keyboard recall
//! - `linkify` - URL and markdown-link post-processing
//! - `surface` - RenderSurface trait (the DOM contract) and HeadlessSurface
//! - `storage` - SessionStore trait and session-scoped stores
//! - `webhook` - WebhookClient trait and the REST client
//! - `widget` - ChatWidget, the controller tying it all together

pub mod config;
pub mod error;
pub mod history;
pub mod linkify;
pub mod message;
pub mod storage;
pub mod surface;
pub mod webhook;
pub mod widget;

// Re-export commonly used types
pub use config::WidgetConfig;
pub use error::{Result, WidgetError};
pub use history::{InputHistory, Recall};
pub use linkify::{linkify, Segment};
pub use message::{Sender, Transcript, TranscriptEntry};
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore};
pub use surface::{
    Alignment, ClickDisposition, ClickTarget, HeadlessSurface, MessageNode, MessageStyle,
    RenderSurface,
};
pub use webhook::{RestWebhookClient, WebhookClient, WebhookReply, WebhookRequest};
pub use widget::{ChatWidget, CompletedReply, Key, KeyOutcome, PendingReply};

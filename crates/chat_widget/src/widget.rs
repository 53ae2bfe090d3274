//! Chat widget controller
//!
//! Owns the transcript, the input history and the panel epoch, and drives a
//! [`RenderSurface`] and a [`SessionStore`] in response to host events.
//!
//! Submitting returns a [`PendingReply`] that carries everything needed for
//! the network call, so the host can await it elsewhere and keep delivering
//! events. The outcome comes back through [`ChatWidget::complete`]. Every
//! open, close and reset advances the panel epoch; a reply issued under an
//! older epoch is dropped without touching the surface or storage.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::WidgetConfig;
use crate::error::Result;
use crate::history::{InputHistory, Recall};
use crate::message::{Sender, Transcript, TranscriptEntry};
use crate::storage::{self, SessionStore};
use crate::surface::{ClickDisposition, ClickTarget, MessageNode, RenderSurface};
use crate::webhook::{WebhookClient, WebhookReply, WebhookRequest};

/// Keys the input field reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    Enter,
    Other,
}

#[derive(Debug)]
pub enum KeyOutcome {
    /// History recall ran; the field's caret movement must be suppressed.
    Recalled,
    /// Enter was pressed. `None` when the input was blank.
    Submitted(Option<PendingReply>),
    Unhandled,
}

impl KeyOutcome {
    pub fn prevents_default(&self) -> bool {
        matches!(self, KeyOutcome::Recalled)
    }
}

/// An outstanding webhook call, tagged with the epoch it was issued under.
pub struct PendingReply {
    epoch: u64,
    request: WebhookRequest,
    client: Arc<dyn WebhookClient>,
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("epoch", &self.epoch)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl PendingReply {
    pub fn request(&self) -> &WebhookRequest {
        &self.request
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub async fn resolve(self) -> CompletedReply {
        let result = self.client.send(&self.request).await;
        CompletedReply {
            epoch: self.epoch,
            result,
        }
    }
}

#[derive(Debug)]
pub struct CompletedReply {
    pub epoch: u64,
    pub result: Result<Vec<WebhookReply>>,
}

pub struct ChatWidget<R: RenderSurface, S: SessionStore> {
    surface: R,
    store: S,
    client: Arc<dyn WebhookClient>,
    config: WidgetConfig,
    transcript: Transcript,
    input_history: InputHistory,
    epoch: u64,
    in_flight: usize,
}

impl<R: RenderSurface, S: SessionStore> ChatWidget<R, S> {
    /// Build a widget, loading both histories from `store`.
    pub fn new(
        surface: R,
        store: S,
        client: Arc<dyn WebhookClient>,
        config: WidgetConfig,
    ) -> Self {
        let transcript = storage::load_transcript(&store);
        let input_history = storage::load_input_history(&store);
        debug!(
            "Chat widget initialised with {} messages and {} inputs",
            transcript.len(),
            input_history.len()
        );
        Self {
            surface,
            store,
            client,
            config,
            transcript,
            input_history,
            epoch: 0,
            in_flight: 0,
        }
    }

    pub fn toggle(&mut self) {
        if self.surface.is_panel_visible() {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn open(&mut self) {
        self.advance_epoch();
        self.surface.set_panel_visible(true);
        if self.transcript.is_empty() {
            return;
        }
        self.surface.clear_messages();
        let entries = self.transcript.entries().to_vec();
        for entry in entries {
            self.render_message(entry.sender, &entry.text, false);
        }
    }

    pub fn close(&mut self) {
        self.advance_epoch();
        self.surface.set_panel_visible(false);
        let snapshot = self.snapshot();
        self.transcript.replace_with(snapshot);
        self.persist_transcript();
        self.persist_input_history();
    }

    /// Transcript as currently rendered, independent of the in-memory list.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.surface
            .messages()
            .iter()
            .map(MessageNode::to_entry)
            .collect()
    }

    /// Read the input field and start a round trip. Blank input is ignored.
    pub fn submit(&mut self) -> Option<PendingReply> {
        let raw = self.surface.input_value();
        let message = raw.trim();
        if message.is_empty() {
            return None;
        }
        let message = message.to_string();

        self.render_message(Sender::User, &message, true);
        if self.input_history.push(message.as_str()) {
            self.persist_input_history();
        }
        self.input_history.reset_cursor();
        self.surface.set_input_value("");
        self.surface.set_typing_indicator(true);
        self.in_flight += 1;

        Some(PendingReply {
            epoch: self.epoch,
            request: WebhookRequest::new(&self.config.sender_prefix, message),
            client: Arc::clone(&self.client),
        })
    }

    /// Apply a finished round trip.
    pub fn complete(&mut self, reply: CompletedReply) {
        if reply.epoch != self.epoch {
            debug!(
                "Dropping reply from panel epoch {} (current {})",
                reply.epoch, self.epoch
            );
            if self.in_flight == 0 {
                self.surface.set_typing_indicator(false);
            }
            return;
        }

        self.in_flight = self.in_flight.saturating_sub(1);
        self.surface.set_typing_indicator(false);
        match reply.result {
            Ok(replies) => {
                for text in replies.iter().filter_map(WebhookReply::display_text) {
                    self.render_message(Sender::Bot, text, true);
                }
            }
            Err(e) => {
                error!("Webhook request failed: {}", e);
                let fallback = self.config.fallback_message.clone();
                self.render_message(Sender::Bot, &fallback, true);
            }
        }
    }

    /// Submit and wait for the reply in one go.
    pub async fn send_message(&mut self) {
        if let Some(pending) = self.submit() {
            let reply = pending.resolve().await;
            self.complete(reply);
        }
    }

    pub fn render_message(&mut self, sender: Sender, text: &str, add_to_history: bool) {
        self.surface.append_message(MessageNode::new(sender, text));
        self.surface.scroll_to_latest();
        if add_to_history {
            self.transcript.push(TranscriptEntry::new(sender, text));
        }
    }

    pub fn handle_key(&mut self, key: Key) -> KeyOutcome {
        match key {
            Key::ArrowUp => {
                let recall = self.input_history.recall_older();
                apply_recall(&mut self.surface, recall);
                KeyOutcome::Recalled
            }
            Key::ArrowDown => {
                let recall = self.input_history.recall_newer();
                apply_recall(&mut self.surface, recall);
                KeyOutcome::Recalled
            }
            Key::Enter => KeyOutcome::Submitted(self.submit()),
            Key::Other => KeyOutcome::Unhandled,
        }
    }

    pub fn click_disposition(&self, target: ClickTarget) -> ClickDisposition {
        target.disposition()
    }

    /// Page-unload equivalent: both stored histories are deleted.
    pub fn teardown(&mut self) {
        if let Err(e) = storage::clear_session(&mut self.store) {
            warn!("Failed to clear session storage: {}", e);
        }
    }

    /// Back to an empty widget. Storage is left alone.
    pub fn reset(&mut self) {
        self.advance_epoch();
        self.transcript.clear();
        self.input_history.clear();
        self.surface.clear_messages();
        self.surface.set_input_value("");
    }

    /// Requests from earlier epochs no longer count; the indicator goes too.
    fn advance_epoch(&mut self) {
        self.epoch += 1;
        self.in_flight = 0;
        self.surface.set_typing_indicator(false);
    }

    fn persist_transcript(&mut self) {
        if let Err(e) = storage::save_transcript(&mut self.store, &self.transcript) {
            warn!("Failed to save transcript: {}", e);
        }
    }

    fn persist_input_history(&mut self) {
        if let Err(e) = storage::save_input_history(&mut self.store, &self.input_history) {
            warn!("Failed to save input history: {}", e);
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn input_history(&self) -> &InputHistory {
        &self.input_history
    }

    pub fn history_cursor(&self) -> Option<usize> {
        self.input_history.cursor()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Requests of the current panel epoch still waiting for a reply.
    pub fn awaiting_replies(&self) -> usize {
        self.in_flight
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (R, S) {
        (self.surface, self.store)
    }
}

fn apply_recall<R: RenderSurface>(surface: &mut R, recall: Recall<'_>) {
    match recall {
        Recall::Fill(text) => surface.set_input_value(text),
        Recall::Clear => surface.set_input_value(""),
        Recall::Unchanged => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WidgetError;
    use crate::storage::{MemorySessionStore, CHAT_HISTORY_KEY, MESSAGE_HISTORY_KEY};
    use crate::surface::HeadlessSurface;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with a fixed script and counts calls.
    struct ScriptedClient {
        replies: Option<Vec<WebhookReply>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn replying(texts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Some(texts.iter().map(|t| WebhookReply::text(*t)).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                replies: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WebhookClient for ScriptedClient {
        async fn send(&self, _request: &WebhookRequest) -> Result<Vec<WebhookReply>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies.clone().ok_or(WidgetError::Status(502))
        }
    }

    type TestWidget = ChatWidget<HeadlessSurface, MemorySessionStore>;

    fn widget_with(client: Arc<ScriptedClient>) -> TestWidget {
        ChatWidget::new(
            HeadlessSurface::new(),
            MemorySessionStore::new(),
            client,
            WidgetConfig::default(),
        )
    }

    fn type_and_submit(widget: &mut TestWidget, text: &str) -> Option<PendingReply> {
        widget.surface_mut().set_input_value(text);
        widget.submit()
    }

    fn rendered(widget: &TestWidget) -> Vec<(Sender, String)> {
        widget
            .surface()
            .messages()
            .iter()
            .map(|node| (node.sender(), node.text_content()))
            .collect()
    }

    #[test]
    fn test_blank_input_is_noop() {
        let client = ScriptedClient::replying(&["hi"]);
        let mut widget = widget_with(client.clone());

        for blank in ["", "   ", "\t\n"] {
            assert!(type_and_submit(&mut widget, blank).is_none());
        }
        assert!(widget.transcript().is_empty());
        assert!(widget.input_history().is_empty());
        assert!(!widget.surface().typing_indicator_visible());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_submit_renders_and_resets_field() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        let pending = type_and_submit(&mut widget, "  When is the deadline?  ").unwrap();

        assert_eq!(pending.request().message, "When is the deadline?");
        assert!(pending.request().sender.starts_with("user_"));
        assert_eq!(widget.surface().input_value(), "");
        assert!(widget.surface().typing_indicator_visible());
        assert!(widget.surface().is_scrolled_to_latest());
        assert_eq!(
            rendered(&widget),
            [(Sender::User, "When is the deadline?".to_string())]
        );
        assert_eq!(widget.input_history().entries(), ["When is the deadline?"]);
        assert_eq!(
            widget.store().get_item(MESSAGE_HISTORY_KEY).unwrap().as_deref(),
            Some(r#"["When is the deadline?"]"#)
        );
    }

    #[test]
    fn test_input_history_dedup() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        type_and_submit(&mut widget, "fees");
        type_and_submit(&mut widget, "fees");
        assert_eq!(widget.input_history().len(), 1);

        type_and_submit(&mut widget, "courses");
        type_and_submit(&mut widget, "fees");
        assert_eq!(widget.input_history().entries(), ["fees", "courses", "fees"]);
        // Both submissions still render.
        assert_eq!(widget.transcript().len(), 4);
    }

    #[test]
    fn test_arrow_navigation() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        for text in ["one", "two", "three"] {
            type_and_submit(&mut widget, text);
        }

        for expected in ["three", "two", "one"] {
            assert!(widget.handle_key(Key::ArrowUp).prevents_default());
            assert_eq!(widget.surface().input_value(), expected);
        }
        widget.handle_key(Key::ArrowUp);
        assert_eq!(widget.surface().input_value(), "one");

        for expected in ["two", "three", ""] {
            assert!(widget.handle_key(Key::ArrowDown).prevents_default());
            assert_eq!(widget.surface().input_value(), expected);
        }
        assert_eq!(widget.history_cursor(), None);
    }

    #[test]
    fn test_arrows_on_empty_history_still_suppress_default() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        widget.surface_mut().set_input_value("draft");
        assert!(widget.handle_key(Key::ArrowUp).prevents_default());
        assert!(widget.handle_key(Key::ArrowDown).prevents_default());
        assert_eq!(widget.surface().input_value(), "draft");
        assert!(!widget.handle_key(Key::Other).prevents_default());
    }

    #[test]
    fn test_enter_submits() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        widget.surface_mut().set_input_value("hello");
        match widget.handle_key(Key::Enter) {
            KeyOutcome::Submitted(Some(pending)) => assert_eq!(pending.request().message, "hello"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        widget.surface_mut().set_input_value(" ");
        assert!(matches!(widget.handle_key(Key::Enter), KeyOutcome::Submitted(None)));
    }

    #[tokio::test]
    async fn test_bot_replies_render_in_order() {
        let mut widget = widget_with(ScriptedClient::replying(&["A", "B"]));
        widget.open();
        widget.surface_mut().set_input_value("hi");
        widget.send_message().await;

        assert!(!widget.surface().typing_indicator_visible());
        assert_eq!(
            rendered(&widget),
            [
                (Sender::User, "hi".to_string()),
                (Sender::Bot, "A".to_string()),
                (Sender::Bot, "B".to_string()),
            ]
        );
        assert_eq!(widget.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_replies_without_text_render_nothing() {
        let client = Arc::new(ScriptedClient {
            replies: Some(vec![WebhookReply::default()]),
            calls: AtomicUsize::new(0),
        });
        let mut widget = widget_with(client);
        widget.surface_mut().set_input_value("hi");
        widget.send_message().await;
        assert_eq!(widget.transcript().len(), 1);
        assert!(!widget.surface().typing_indicator_visible());
    }

    #[tokio::test]
    async fn test_failure_renders_single_apology() {
        let mut widget = widget_with(ScriptedClient::failing());
        widget.surface_mut().set_input_value("hi");
        widget.send_message().await;

        assert!(!widget.surface().typing_indicator_visible());
        assert_eq!(
            widget.transcript().entries(),
            [
                TranscriptEntry::user("hi"),
                TranscriptEntry::bot(crate::config::DEFAULT_FALLBACK_MESSAGE),
            ]
        );
    }

    #[tokio::test]
    async fn test_reply_after_close_is_dropped() {
        let mut widget = widget_with(ScriptedClient::replying(&["late"]));
        widget.open();
        let pending = type_and_submit(&mut widget, "hi").unwrap();
        widget.close();

        let reply = pending.resolve().await;
        widget.complete(reply);

        assert_eq!(widget.transcript().entries(), [TranscriptEntry::user("hi")]);
        assert_eq!(widget.surface().message_count(), 1);
        assert!(!widget.surface().typing_indicator_visible());
        assert_eq!(
            widget.store().get_item(CHAT_HISTORY_KEY).unwrap().as_deref(),
            Some(r#"[{"sender":"user","text":"hi"}]"#)
        );
    }

    #[tokio::test]
    async fn test_reopen_hides_indicator_of_abandoned_request() {
        let mut widget = widget_with(ScriptedClient::replying(&["late"]));
        widget.open();
        let pending = type_and_submit(&mut widget, "hi").unwrap();
        assert!(widget.surface().typing_indicator_visible());
        assert_eq!(widget.awaiting_replies(), 1);

        widget.close();
        widget.open();
        assert!(!widget.surface().typing_indicator_visible());
        assert_eq!(widget.awaiting_replies(), 0);

        let reply = pending.resolve().await;
        widget.complete(reply);
        assert!(!widget.surface().typing_indicator_visible());
        assert_eq!(rendered(&widget), [(Sender::User, "hi".to_string())]);
    }

    #[tokio::test]
    async fn test_stale_reply_keeps_indicator_for_newer_request() {
        let mut widget = widget_with(ScriptedClient::replying(&["ok"]));
        widget.open();
        let stale = type_and_submit(&mut widget, "first").unwrap();
        widget.close();
        widget.open();
        let fresh = type_and_submit(&mut widget, "second").unwrap();

        widget.complete(stale.resolve().await);
        assert!(widget.surface().typing_indicator_visible());

        widget.complete(fresh.resolve().await);
        assert!(!widget.surface().typing_indicator_visible());
        let texts: Vec<_> = widget.transcript().iter().map(|e| e.text.clone()).collect();
        assert_eq!(texts, ["first", "second", "ok"]);
    }

    #[test]
    fn test_close_snapshots_rendered_nodes() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        widget.open();
        widget.render_message(Sender::User, "keep", true);
        widget.render_message(Sender::Bot, "drop me", true);
        widget.render_message(Sender::Bot, "keep too", true);

        widget.surface_mut().remove_message(1);
        widget.close();

        assert!(!widget.surface().is_panel_visible());
        assert_eq!(
            widget.transcript().entries(),
            [TranscriptEntry::user("keep"), TranscriptEntry::bot("keep too")]
        );
        assert_eq!(
            widget.store().get_item(CHAT_HISTORY_KEY).unwrap().as_deref(),
            Some(r#"[{"sender":"user","text":"keep"},{"sender":"bot","text":"keep too"}]"#)
        );
    }

    #[test]
    fn test_reopen_rerenders_without_duplicating() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        widget.toggle();
        assert!(widget.surface().is_panel_visible());
        widget.render_message(Sender::User, "a", true);
        widget.render_message(Sender::Bot, "b", true);

        widget.toggle();
        widget.toggle();
        assert!(widget.surface().is_panel_visible());
        assert_eq!(widget.surface().message_count(), 2);
        assert_eq!(widget.transcript().len(), 2);
    }

    #[test]
    fn test_open_with_empty_transcript_keeps_nodes() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        widget
            .surface_mut()
            .append_message(MessageNode::new(Sender::Bot, "welcome"));
        widget.open();
        assert_eq!(widget.surface().message_count(), 1);
    }

    #[test]
    fn test_teardown_then_reinit_starts_empty() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        widget.open();
        type_and_submit(&mut widget, "hello");
        widget.close();
        assert!(widget.store().contains_key(CHAT_HISTORY_KEY));

        widget.teardown();
        let (_, store) = widget.into_parts();
        assert!(!store.contains_key(CHAT_HISTORY_KEY));
        assert!(!store.contains_key(MESSAGE_HISTORY_KEY));

        let fresh = ChatWidget::new(
            HeadlessSurface::new(),
            store,
            ScriptedClient::replying(&[]),
            WidgetConfig::default(),
        );
        assert!(fresh.transcript().is_empty());
        assert!(fresh.input_history().is_empty());
    }

    #[test]
    fn test_reset_clears_state_and_bumps_epoch() {
        let mut widget = widget_with(ScriptedClient::replying(&[]));
        widget.open();
        type_and_submit(&mut widget, "hello");
        let epoch = widget.epoch();

        widget.reset();
        assert!(widget.epoch() > epoch);
        assert!(widget.transcript().is_empty());
        assert!(widget.input_history().is_empty());
        assert_eq!(widget.surface().message_count(), 0);
        assert!(!widget.surface().typing_indicator_visible());
        // Storage is not part of a reset.
        assert!(widget.store().contains_key(MESSAGE_HISTORY_KEY));
    }

    #[test]
    fn test_link_click_does_not_reach_panel() {
        let widget = widget_with(ScriptedClient::replying(&[]));
        assert_eq!(
            widget.click_disposition(ClickTarget::message_link()),
            ClickDisposition::StopPropagation
        );
    }
}

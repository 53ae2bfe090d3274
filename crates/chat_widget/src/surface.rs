//! Render surface - the host page contract
//!
//! The host supplies a panel container, a message list, an input field and
//! a typing indicator. The controller only ever talks to these through
//! [`RenderSurface`], so a browser DOM, a terminal or a test double can all
//! host the widget.

use crate::linkify::{self, Segment};
use crate::message::{Sender, TranscriptEntry};

/// Horizontal placement of a message bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Start,
    End,
}

/// Presentation attributes of a message node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStyle {
    pub alignment: Alignment,
    pub background: &'static str,
    pub max_width_percent: u8,
}

impl MessageStyle {
    pub fn for_sender(sender: Sender) -> Self {
        match sender {
            Sender::User => Self {
                alignment: Alignment::End,
                background: "#001a33",
                max_width_percent: 80,
            },
            Sender::Bot => Self {
                alignment: Alignment::Start,
                background: "#f1f1f1",
                max_width_percent: 80,
            },
        }
    }

    fn css(&self) -> String {
        let align = match self.alignment {
            Alignment::Start => "flex-start",
            Alignment::End => "flex-end",
        };
        format!(
            "margin: 5px; padding: 8px; border-radius: 5px; max-width: {}%; \
             word-wrap: break-word; background-color: {}; align-self: {};",
            self.max_width_percent, self.background, align
        )
    }
}

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNode {
    pub style: MessageStyle,
    pub segments: Vec<Segment>,
}

impl MessageNode {
    pub fn new(sender: Sender, text: &str) -> Self {
        Self {
            style: MessageStyle::for_sender(sender),
            segments: linkify::linkify(text),
        }
    }

    /// Read back from the alignment attribute, not from any stored state.
    pub fn sender(&self) -> Sender {
        match self.style.alignment {
            Alignment::End => Sender::User,
            Alignment::Start => Sender::Bot,
        }
    }

    pub fn text_content(&self) -> String {
        linkify::text_content(&self.segments)
    }

    pub fn to_entry(&self) -> TranscriptEntry {
        TranscriptEntry::new(self.sender(), self.text_content())
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<div style="{}">{}</div>"#,
            self.style.css(),
            linkify::to_html(&self.segments)
        )
    }
}

/// What a click inside the widget is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDisposition {
    Propagate,
    StopPropagation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickTarget {
    pub is_anchor: bool,
    pub inside_message_list: bool,
}

impl ClickTarget {
    pub fn message_link() -> Self {
        Self {
            is_anchor: true,
            inside_message_list: true,
        }
    }

    pub fn disposition(&self) -> ClickDisposition {
        if self.is_anchor && self.inside_message_list {
            ClickDisposition::StopPropagation
        } else {
            ClickDisposition::Propagate
        }
    }
}

pub trait RenderSurface {
    fn is_panel_visible(&self) -> bool;
    fn set_panel_visible(&mut self, visible: bool);

    fn append_message(&mut self, node: MessageNode);
    fn clear_messages(&mut self);
    /// Current rendered nodes, in display order.
    fn messages(&self) -> Vec<MessageNode>;
    fn scroll_to_latest(&mut self);

    fn input_value(&self) -> String;
    fn set_input_value(&mut self, value: &str);

    fn set_typing_indicator(&mut self, visible: bool);
}

/// In-memory surface.
#[derive(Debug, Default, Clone)]
pub struct HeadlessSurface {
    panel_visible: bool,
    messages: Vec<MessageNode>,
    input: String,
    typing: bool,
    scrolled_to: Option<usize>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typing_indicator_visible(&self) -> bool {
        self.typing
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn message(&self, index: usize) -> Option<&MessageNode> {
        self.messages.get(index)
    }

    /// Simulates a direct edit of the message list by the host page.
    pub fn remove_message(&mut self, index: usize) -> Option<MessageNode> {
        (index < self.messages.len()).then(|| self.messages.remove(index))
    }

    pub fn is_scrolled_to_latest(&self) -> bool {
        match self.scrolled_to {
            Some(index) => index + 1 == self.messages.len(),
            None => self.messages.is_empty(),
        }
    }
}

impl RenderSurface for HeadlessSurface {
    fn is_panel_visible(&self) -> bool {
        self.panel_visible
    }

    fn set_panel_visible(&mut self, visible: bool) {
        self.panel_visible = visible;
    }

    fn append_message(&mut self, node: MessageNode) {
        self.messages.push(node);
    }

    fn clear_messages(&mut self) {
        self.messages.clear();
        self.scrolled_to = None;
    }

    fn messages(&self) -> Vec<MessageNode> {
        self.messages.clone()
    }

    fn scroll_to_latest(&mut self) {
        self.scrolled_to = self.messages.len().checked_sub(1);
    }

    fn input_value(&self) -> String {
        self.input.clone()
    }

    fn set_input_value(&mut self, value: &str) {
        self.input = value.to_string();
    }

    fn set_typing_indicator(&mut self, visible: bool) {
        self.typing = visible;
    }
}

//! Terminal render surface
//!
//! Prints messages as they are appended instead of keeping a scrollable
//! list, but still tracks the nodes so the widget can snapshot them.

use chat_widget::{MessageNode, RenderSurface, Segment, Sender};
use colored::Colorize;

#[derive(Debug, Default)]
pub struct TerminalSurface {
    panel_visible: bool,
    messages: Vec<MessageNode>,
    input: String,
    typing: bool,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    fn print_node(node: &MessageNode) {
        let body: String = node
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.clone(),
                Segment::Link { href, label } if same_url(href, label) => {
                    href.underline().to_string()
                }
                Segment::Link { href, label } => {
                    format!("{} <{}>", label, href.underline())
                }
            })
            .collect();
        match node.sender() {
            Sender::User => println!("{} {}", "you >".cyan().bold(), body),
            Sender::Bot => println!("{} {}", "bot >".green().bold(), body),
        }
    }
}

/// Bare links show only the URL.
fn same_url(href: &str, label: &str) -> bool {
    href == label
}

impl RenderSurface for TerminalSurface {
    fn is_panel_visible(&self) -> bool {
        self.panel_visible
    }

    fn set_panel_visible(&mut self, visible: bool) {
        if visible != self.panel_visible {
            let state = if visible { "opened" } else { "closed" };
            println!("{}", format!("[chat {}]", state).dimmed());
        }
        self.panel_visible = visible;
    }

    fn append_message(&mut self, node: MessageNode) {
        if self.panel_visible {
            Self::print_node(&node);
        }
        self.messages.push(node);
    }

    fn clear_messages(&mut self) {
        self.messages.clear();
    }

    fn messages(&self) -> Vec<MessageNode> {
        self.messages.clone()
    }

    fn scroll_to_latest(&mut self) {}

    fn input_value(&self) -> String {
        self.input.clone()
    }

    fn set_input_value(&mut self, value: &str) {
        self.input = value.to_string();
    }

    fn set_typing_indicator(&mut self, visible: bool) {
        if visible && !self.typing {
            println!("{}", "bot is typing...".dimmed().italic());
        }
        self.typing = visible;
    }
}

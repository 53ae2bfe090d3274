use std::path::PathBuf;
use std::sync::Arc;

use chat_widget::{
    ChatWidget, CompletedReply, FileSessionStore, Key, KeyOutcome, MemorySessionStore,
    RenderSurface, RestWebhookClient, SessionStore, WidgetConfig,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod terminal;

use terminal::TerminalSurface;

#[derive(Parser)]
#[command(name = "chat-widget")]
#[command(about = "Terminal host for the chat widget")]
#[command(version)]
struct Cli {
    /// Webhook endpoint (overrides chat_widget.toml and CHAT_WIDGET_WEBHOOK_URL)
    #[arg(long)]
    webhook_url: Option<String>,

    /// Request timeout in seconds; no timeout when omitted
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Keep session storage in this directory instead of in memory
    #[arg(long)]
    session_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat
    Chat,
    /// Send a single message and print the replies
    Send {
        /// Message content
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(false),
        )
        .init();

    let mut config = WidgetConfig::new();
    if let Some(url) = cli.webhook_url {
        config.webhook_url = url;
    }
    if cli.timeout_secs.is_some() {
        config.request_timeout_secs = cli.timeout_secs;
    }
    tracing::debug!("Using webhook {}", config.webhook_url);

    let client = Arc::new(RestWebhookClient::new(&config)?);
    match cli.session_dir {
        Some(dir) => {
            let widget = ChatWidget::new(
                TerminalSurface::new(),
                FileSessionStore::new(dir),
                client,
                config,
            );
            run(widget, cli.command).await
        }
        None => {
            let widget = ChatWidget::new(
                TerminalSurface::new(),
                MemorySessionStore::new(),
                client,
                config,
            );
            run(widget, cli.command).await
        }
    }
}

async fn run<S: SessionStore>(
    mut widget: ChatWidget<TerminalSurface, S>,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Chat => run_interactive_chat(&mut widget).await?,
        Commands::Send { message } => {
            widget.open();
            widget.surface_mut().set_input_value(&message);
            widget.send_message().await;
        }
    }
    widget.teardown();
    Ok(())
}

const HELP: &str = "/up /down recall history, empty line sends the recalled text, \
                    /toggle /open /close /history /reset /quit";

async fn run_interactive_chat<S: SessionStore>(
    widget: &mut ChatWidget<TerminalSurface, S>,
) -> anyhow::Result<()> {
    println!("{}", HELP.dimmed());
    widget.open();
    chat_loop(widget, BufReader::new(tokio::io::stdin())).await
}

/// Feeds input lines to the widget until `/quit` or end of input. At end of
/// input the loop keeps applying replies until none are awaited.
async fn chat_loop<S, I>(
    widget: &mut ChatWidget<TerminalSurface, S>,
    input: I,
) -> anyhow::Result<()>
where
    S: SessionStore,
    I: AsyncBufRead + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<CompletedReply>(16);
    let mut lines = input.lines();
    let mut input_open = true;

    loop {
        if !input_open && widget.awaiting_replies() == 0 {
            break;
        }
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) => {
                        if !handle_line(widget, &line, &tx) {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!(
                            "End of input, waiting for {} replies",
                            widget.awaiting_replies()
                        );
                        input_open = false;
                    }
                }
            }
            Some(reply) = rx.recv() => {
                widget.complete(reply);
            }
        }
    }
    Ok(())
}

/// Returns `false` when the user asked to quit.
fn handle_line<S: SessionStore>(
    widget: &mut ChatWidget<TerminalSurface, S>,
    line: &str,
    tx: &mpsc::Sender<CompletedReply>,
) -> bool {
    let key = match line.trim() {
        "/quit" | "/exit" => return false,
        "/up" => Key::ArrowUp,
        "/down" => Key::ArrowDown,
        "/toggle" => {
            widget.toggle();
            return true;
        }
        "/open" => {
            widget.open();
            return true;
        }
        "/close" => {
            widget.close();
            return true;
        }
        "/reset" => {
            widget.reset();
            return true;
        }
        "/history" => {
            for (i, entry) in widget.input_history().entries().iter().enumerate() {
                println!("{}", format!("{:>3}  {}", i + 1, entry).dimmed());
            }
            return true;
        }
        "" => Key::Enter,
        _ => {
            widget.surface_mut().set_input_value(line);
            Key::Enter
        }
    };

    match widget.handle_key(key) {
        KeyOutcome::Recalled => {
            let recalled = widget.surface().input();
            if !recalled.is_empty() {
                println!("{} {}", "recall:".dimmed(), recalled);
            }
        }
        KeyOutcome::Submitted(Some(pending)) => {
            let tx = tx.clone();
            tokio::spawn(async move {
                let reply = pending.resolve().await;
                if tx.send(reply).await.is_err() {
                    tracing::debug!("Reply arrived after the chat loop ended");
                }
            });
        }
        KeyOutcome::Submitted(None) | KeyOutcome::Unhandled => {}
    }
    true
}

//! kulti-watch - watch an AI agent build in public from the terminal

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

mod actions;
mod app;
mod config;
mod error;
mod logging;
mod stream;
mod supabase;
mod ui;
mod view;

use actions::Action;
use app::App;
use config::{validate_agent_id, Config};
use stream::StreamClient;
use supabase::{RealtimeFeed, RestClient, Session};

/// Watch an AI agent write code and narrate its reasoning
#[derive(Parser, Debug)]
#[command(name = "kulti-watch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Agent to watch
    agent_id: String,

    /// Connect to the local stream server
    #[arg(long)]
    dev: bool,

    /// Stream server base URL (overrides --dev)
    #[arg(long)]
    ws_url: Option<String>,

    /// Maximum number of thoughts kept on screen
    #[arg(long)]
    thought_cap: Option<usize>,

    /// Config file path
    #[arg(long, env = "KULTI_WATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let agent_id = validate_agent_id(&cli.agent_id)?.to_string();

    let _log_guard = logging::init_logging()?;

    let mut config = Config::load(cli.config.as_deref());
    if let Some(cap) = cli.thought_cap {
        config.view.thought_cap = cap;
    }
    let ws_url = config.stream_url(cli.dev, cli.ws_url.as_deref());
    info!(agent = %agent_id, url = %ws_url, "starting viewer");

    // Create event channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Action>();

    // Initialize terminal
    let mut terminal = ratatui::init();

    // Input handler
    let input_tx = tx.clone();
    std::thread::spawn(move || loop {
        if event::poll(Duration::from_millis(100)).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind == KeyEventKind::Press && input_tx.send(Action::KeyPress(key)).is_err()
                {
                    break;
                }
            }
        }
        if input_tx.is_closed() {
            break;
        }
    });

    // Animation clock
    let tick_tx = tx.clone();
    let frame_interval = config.frame_interval();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(frame_interval);
        loop {
            interval.tick().await;
            if tick_tx.send(Action::Tick(Instant::now())).is_err() {
                break;
            }
        }
    });

    let mut app = App::new(&agent_id, config.view_config(), &config.landing_url);
    let watcher = tokio::spawn(watch(agent_id, config, ws_url, tx));

    // Main event loop
    let result = loop {
        if app.take_dirty() {
            if let Err(e) = terminal.draw(|f| ui::render(&app, f)) {
                break Err(e.into());
            }
        }

        for pending_action in app.take_pending_actions() {
            if let Action::CopyActiveFile = pending_action {
                let message = match copy_active_file(&app) {
                    Ok(name) => format!("copied {} to clipboard", name),
                    Err(e) => format!("Clipboard error: {}", e),
                };
                app.set_message(message);
            }
        }

        match rx.recv().await {
            Some(action) => match app.handle_action(action) {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(e) => break Err(e),
            },
            None => break Ok(()),
        }
    };

    // Tear down
    watcher.abort();
    ticker.abort();
    app.view.teardown();
    ratatui::restore();
    info!("viewer closed");
    result
}

/// Load the session and history, then follow the realtime feed and the
/// stream socket until aborted
async fn watch(agent_id: String, config: Config, ws_url: String, tx: mpsc::UnboundedSender<Action>) {
    let policy = config.reconnect_policy();

    let realtime = match config.require_supabase() {
        Ok(supabase) => {
            let rest = RestClient::new(&supabase);
            let session = match rest.fetch_session(&agent_id).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(agent = %agent_id, error = %e, "session lookup failed");
                    let _ = tx.send(Action::SessionMissing(agent_id));
                    return;
                }
            };

            let events = rest
                .fetch_recent_events(&session.id, config.supabase.history_limit)
                .await
                .unwrap_or_else(|e| {
                    warn!(session = %session.id, error = %e, "history fetch failed");
                    Vec::new()
                });
            info!(session = %session.id, events = events.len(), "history loaded");

            let feed = RealtimeFeed::new(&supabase, &session.id, policy);
            let _ = tx.send(Action::SessionLoaded { session, events });
            Some(feed)
        }
        Err(e) => {
            info!(agent = %agent_id, reason = %e, "streaming only");
            let _ = tx.send(Action::SessionLoaded {
                session: Session::placeholder(&agent_id),
                events: Vec::new(),
            });
            None
        }
    };

    let client = StreamClient::new(&ws_url, &agent_id, policy);
    match realtime {
        Some(feed) => {
            tokio::join!(feed.run(tx.clone()), client.run(tx));
        }
        None => client.run(tx).await,
    }
}

fn copy_active_file(app: &App) -> Result<String> {
    let file = app
        .view
        .active()
        .ok_or_else(|| anyhow::anyhow!("no active file"))?;
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(file.content.as_str())?;
    Ok(file.filename.clone())
}

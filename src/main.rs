use anyhow::Result;
use tokio::sync::mpsc;

mod app;
mod config;
mod conversation;
mod exec;
mod extract;
mod handler;
mod markdown;
mod ollama;
mod stream;
mod tui;
mod ui;

use app::App;
use config::Config;
use stream::StreamEvent;
use tui::{AppEvent, EventHandler};

/// The next thing the controller should react to: terminal input or a
/// stream event from the in-flight request.
enum Next {
    Input(Option<AppEvent>),
    Stream(Option<StreamEvent>),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A broken config file falls back to defaults rather than refusing to start
    let config = Config::load().unwrap_or_default();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, App::new(config)).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, mut app: App) -> Result<()> {
    let mut events = EventHandler::new();

    loop {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if app.should_quit {
            break;
        }

        // Await whichever arrives first; stream events are delivered in
        // arrival order, so the transcript only ever grows.
        let next = {
            let stream_rx = &mut app.stream_rx;
            tokio::select! {
                event = events.next() => Next::Input(event),
                event = recv_stream(stream_rx) => Next::Stream(event),
            }
        };

        match next {
            Next::Input(Some(event)) => handler::handle_event(&mut app, event),
            Next::Input(None) => break,
            Next::Stream(Some(event)) => app.on_stream_event(event),
            Next::Stream(None) => app.on_stream_closed(),
        }
    }

    Ok(())
}

/// Receive from the active stream, or park forever when no request is in
/// flight so the select only wakes for terminal input.
async fn recv_stream(
    rx: &mut Option<mpsc::UnboundedReceiver<StreamEvent>>,
) -> Option<StreamEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

use anyhow::Result;

mod app;
mod gemini;
mod handler;
mod tui;
mod ui;

use app::App;
use gemini::{ApiError, GeminiClient, DEFAULT_BASE_URL};

#[tokio::main]
async fn main() -> Result<()> {
    tui::install_panic_hook();

    let gemini = GeminiClient::new(DEFAULT_BASE_URL);
    let mut app = App::new(gemini);

    // A key in the environment skips the entry screen; nothing is persisted
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        app.set_api_key(&key);
    }

    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event);
        }

        poll_completion(app).await;
    }
    Ok(())
}

/// Route a finished request back into the session state. The tick timer
/// guarantees the loop wakes up to observe completion even when the user
/// is idle. A panicked or cancelled task is reported like any other
/// transport failure so the busy flag is always released.
async fn poll_completion(app: &mut App) {
    let finished = app
        .completion_task
        .as_ref()
        .is_some_and(|task| task.is_finished());
    if !finished {
        return;
    }

    if let Some(task) = app.completion_task.take() {
        match task.await {
            Ok(Ok(text)) => app.on_completion_success(text),
            Ok(Err(err)) => app.on_completion_failure(&err),
            Err(err) => app.on_completion_failure(&ApiError::Network(err.to_string())),
        }
    }
}

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, InputMode, Screen, SettingsField};
use crate::tui::AppEvent;

const SLIDER_STEP: f64 = 0.05;
const SLIDER_FINE_STEP: f64 = 0.01;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => app.scroll_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.screen() {
        Screen::ApiKey => handle_api_key_screen(app, key),
        Screen::Chat => {
            if app.show_settings {
                handle_settings_panel(app, key);
            } else {
                match app.input_mode {
                    InputMode::Normal => handle_chat_normal(app, key),
                    InputMode::Editing => handle_chat_editing(app, key),
                }
            }
        }
    }
}

fn handle_api_key_screen(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => {
            let value = app.api_key_input.clone();
            if app.set_api_key(&value) {
                app.api_key_input.clear();
                app.api_key_cursor = 0;
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Backspace => {
            if app.api_key_cursor > 0 {
                app.api_key_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_cursor);
                app.api_key_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.api_key_input.chars().count();
            if app.api_key_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_cursor);
                app.api_key_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.api_key_cursor = app.api_key_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.api_key_input.chars().count();
            app.api_key_cursor = (app.api_key_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.api_key_cursor = 0,
        KeyCode::End => app.api_key_cursor = app.api_key_input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_cursor);
            app.api_key_input.insert(byte_pos, c);
            app.api_key_cursor += 1;
        }
        _ => {}
    }
}

fn handle_settings_panel(app: &mut App, key: KeyEvent) {
    // System prompt editing captures all typing until Enter/Esc
    if app.input_mode == InputMode::Editing {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                app.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => {
                app.settings.system_prompt.pop();
            }
            KeyCode::Char(c) => {
                app.settings.system_prompt.push(c);
            }
            _ => {}
        }
        return;
    }

    let fine = key.modifiers.contains(KeyModifiers::SHIFT);
    let step = if fine { SLIDER_FINE_STEP } else { SLIDER_STEP };

    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.show_settings = false;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => {
            app.settings_field = app.settings_field.next();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.settings_field = app.settings_field.prev();
        }
        KeyCode::Left | KeyCode::Char('h') => match app.settings_field {
            SettingsField::Model => app.cycle_model_prev(),
            SettingsField::Temperature => app.adjust_temperature(-step),
            SettingsField::TopP => app.adjust_top_p(-step),
            SettingsField::SystemPrompt => {}
        },
        KeyCode::Right | KeyCode::Char('l') => match app.settings_field {
            SettingsField::Model => app.cycle_model_next(),
            SettingsField::Temperature => app.adjust_temperature(step),
            SettingsField::TopP => app.adjust_top_p(step),
            SettingsField::SystemPrompt => {}
        },
        KeyCode::Enter => match app.settings_field {
            SettingsField::SystemPrompt => app.input_mode = InputMode::Editing,
            SettingsField::Model => app.cycle_model_next(),
            _ => {}
        },
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char('s') => open_settings(app),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height / 2);
        }
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_to_bottom(),
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
        open_settings(app);
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if app.submit_user_message() {
                spawn_completion(app);
            }
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => app.cursor = 0,
        KeyCode::End => app.cursor = app.input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn open_settings(app: &mut App) {
    app.show_settings = true;
    app.settings_field = SettingsField::SystemPrompt;
    app.input_mode = InputMode::Normal;
}

/// Spawn the single in-flight request. The settings and credential are
/// snapshotted here, so later edits only affect the next request.
fn spawn_completion(app: &mut App) {
    let history = app.build_api_history();
    let prompt = app
        .current_prompt()
        .unwrap_or_default()
        .to_string();
    let settings = app.settings.clone();
    let api_key = app.api_key.clone();
    let gemini = app.gemini.clone();

    app.completion_task = Some(tokio::spawn(async move {
        gemini.complete(history, &prompt, &settings, &api_key).await
    }));
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen() != Screen::Chat || app.show_settings {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ChatRole;
    use crate::gemini::{GeminiClient, GeminiModel, DEFAULT_BASE_URL};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn chat_app() -> App {
        // Loopback base URL so a spawned request can never leave the host
        let mut app = App::new(GeminiClient::new("http://127.0.0.1:9"));
        app.api_key = "test-key".to_string();
        app
    }

    #[test]
    fn test_api_key_screen_typing_and_submit() {
        let mut app = App::new(GeminiClient::new(DEFAULT_BASE_URL));
        for c in "abc".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        assert_eq!(app.api_key_input, "abc");

        handle_key(&mut app, key(KeyCode::Enter));
        assert_eq!(app.api_key, "abc");
        assert_eq!(app.screen(), Screen::Chat);
        assert!(app.api_key_input.is_empty());
    }

    #[test]
    fn test_api_key_screen_enter_on_empty_is_noop() {
        let mut app = App::new(GeminiClient::new(DEFAULT_BASE_URL));
        handle_key(&mut app, key(KeyCode::Enter));
        assert_eq!(app.screen(), Screen::ApiKey);
    }

    #[test]
    fn test_chat_typing_inserts_at_cursor() {
        let mut app = chat_app();
        for c in "hèllo".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        handle_key(&mut app, key(KeyCode::Left));
        handle_key(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.input, "hèlo");
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn test_enter_submits_and_spawns_request() {
        // tokio::spawn inside spawn_completion needs a runtime
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();

        let mut app = chat_app();
        for c in "hi".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        handle_key(&mut app, key(KeyCode::Enter));

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].role, ChatRole::User);
        assert!(app.loading);
        assert!(app.completion_task.is_some());

        // Second Enter while busy is rejected: no extra turn, no new task
        for c in "again".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        handle_key(&mut app, key(KeyCode::Enter));
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.input, "again");
    }

    #[test]
    fn test_settings_panel_model_and_sliders() {
        let mut app = chat_app();
        handle_key(&mut app, key(KeyCode::Esc)); // leave editing
        handle_key(&mut app, key(KeyCode::Char('s')));
        assert!(app.show_settings);

        handle_key(&mut app, key(KeyCode::Char('j'))); // Model
        handle_key(&mut app, key(KeyCode::Right));
        assert_eq!(app.settings.model, GeminiModel::Pro);

        handle_key(&mut app, key(KeyCode::Char('j'))); // Temperature
        handle_key(&mut app, key(KeyCode::Right));
        assert!((app.settings.temperature - 0.75).abs() < 1e-9);

        handle_key(&mut app, key(KeyCode::Char('j'))); // TopP
        handle_key(&mut app, key(KeyCode::Left));
        assert!((app.settings.top_p - 0.95).abs() < 1e-9);

        handle_key(&mut app, key(KeyCode::Esc));
        assert!(!app.show_settings);
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn test_settings_system_prompt_editing() {
        let mut app = chat_app();
        handle_key(&mut app, key(KeyCode::Esc));
        handle_key(&mut app, key(KeyCode::Char('s')));
        handle_key(&mut app, key(KeyCode::Enter)); // edit system prompt
        assert_eq!(app.input_mode, InputMode::Editing);

        let before = app.settings.system_prompt.len();
        handle_key(&mut app, key(KeyCode::Char('!')));
        assert_eq!(app.settings.system_prompt.len(), before + 1);

        handle_key(&mut app, key(KeyCode::Enter));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.show_settings);
    }

    #[test]
    fn test_char_to_byte_index() {
        let s = "héllo";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 2), 3);
        assert_eq!(char_to_byte_index(s, 99), s.len());
    }
}

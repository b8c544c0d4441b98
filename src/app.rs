use tokio::task::JoinHandle;

use crate::gemini::{ApiError, Content, GeminiClient, GenerationSettings};

pub const INVALID_KEY_NOTICE: &str =
    "Your API key is invalid. Please enter a valid one and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    ApiKey,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
    Error,
}

/// Fields of the settings panel, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    SystemPrompt,
    Model,
    Temperature,
    TopP,
}

impl SettingsField {
    pub fn next(&self) -> SettingsField {
        match self {
            SettingsField::SystemPrompt => SettingsField::Model,
            SettingsField::Model => SettingsField::Temperature,
            SettingsField::Temperature => SettingsField::TopP,
            SettingsField::TopP => SettingsField::SystemPrompt,
        }
    }

    pub fn prev(&self) -> SettingsField {
        match self {
            SettingsField::SystemPrompt => SettingsField::TopP,
            SettingsField::Model => SettingsField::SystemPrompt,
            SettingsField::Temperature => SettingsField::Model,
            SettingsField::TopP => SettingsField::Temperature,
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Credential state
    pub api_key: String,
    pub api_key_input: String,
    pub api_key_cursor: usize,
    pub api_key_error: Option<String>,

    // Conversation state
    pub messages: Vec<ChatMessage>,
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars
    pub loading: bool,
    pub last_error: Option<String>,

    // Generation settings (take effect on the next request only)
    pub settings: GenerationSettings,
    pub show_settings: bool,
    pub settings_field: SettingsField,

    // Chat viewport (updated during render)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // In-flight request; at most one outstanding
    pub completion_task: Option<JoinHandle<Result<String, ApiError>>>,

    pub gemini: GeminiClient,
}

impl App {
    pub fn new(gemini: GeminiClient) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            api_key: String::new(),
            api_key_input: String::new(),
            api_key_cursor: 0,
            api_key_error: None,

            messages: Vec::new(),
            input: String::new(),
            cursor: 0,
            loading: false,
            last_error: None,

            settings: GenerationSettings::default(),
            show_settings: false,
            settings_field: SettingsField::SystemPrompt,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            completion_task: None,

            gemini,
        }
    }

    /// Which screen to show. The credential drives the view: an empty key
    /// means the entry screen, anything else means the chat.
    pub fn screen(&self) -> Screen {
        if self.api_key.is_empty() {
            Screen::ApiKey
        } else {
            Screen::Chat
        }
    }

    pub fn is_busy(&self) -> bool {
        self.loading || self.completion_task.is_some()
    }

    /// Stores the credential typed on the entry screen. Blank input is
    /// rejected; a stored key clears any prior invalidity notice.
    pub fn set_api_key(&mut self, value: &str) -> bool {
        if value.trim().is_empty() {
            return false;
        }
        self.api_key = value.to_string();
        self.api_key_error = None;
        true
    }

    /// Appends the typed prompt as a user turn and marks the session busy.
    /// Returns true when the caller should issue the request. Blank input
    /// and sends while a request is in flight are rejected outright.
    pub fn submit_user_message(&mut self) -> bool {
        if self.input.trim().is_empty() || self.is_busy() {
            return false;
        }

        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: self.input.clone(),
        });
        self.input.clear();
        self.cursor = 0;
        self.loading = true;
        self.last_error = None;
        self.scroll_to_bottom();
        true
    }

    /// The conversational context for the outbound request: every turn in
    /// order, minus error turns (a presentation artifact) and minus the
    /// just-appended user turn, which the client sends separately as the
    /// new prompt. Dropping it here avoids duplicating it on the wire.
    pub fn build_api_history(&self) -> Vec<Content> {
        let mut history: Vec<Content> = self
            .messages
            .iter()
            .filter(|msg| msg.role != ChatRole::Error)
            .map(|msg| {
                let role = match msg.role {
                    ChatRole::Model => "model",
                    _ => "user",
                };
                Content::new(role, &msg.content)
            })
            .collect();
        history.pop();
        history
    }

    /// Text of the most recent user turn, i.e. the active prompt.
    pub fn current_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|msg| msg.role == ChatRole::User)
            .map(|msg| msg.content.as_str())
    }

    pub fn on_completion_success(&mut self, text: String) {
        self.messages.push(ChatMessage {
            role: ChatRole::Model,
            content: text,
        });
        self.loading = false;
        self.scroll_to_bottom();
    }

    pub fn on_completion_failure(&mut self, error: &ApiError) {
        if error.is_invalid_api_key() {
            // Terminal for the session: back to the entry screen with the
            // invalidity notice, transcript discarded.
            self.api_key.clear();
            self.api_key_input.clear();
            self.api_key_cursor = 0;
            self.api_key_error = Some(INVALID_KEY_NOTICE.to_string());
            self.messages.clear();
            self.last_error = None;
            self.show_settings = false;
            self.chat_scroll = 0;
            self.input_mode = InputMode::Editing;
        } else {
            let message = error.to_string();
            self.last_error = Some(message.clone());
            self.messages.push(ChatMessage {
                role: ChatRole::Error,
                content: format!("Error: {}", message),
            });
            self.scroll_to_bottom();
        }
        self.loading = false;
    }

    // Settings mutations

    pub fn adjust_temperature(&mut self, delta: f64) {
        self.settings.temperature = (self.settings.temperature + delta).clamp(0.0, 1.0);
    }

    pub fn adjust_top_p(&mut self, delta: f64) {
        self.settings.top_p = (self.settings.top_p + delta).clamp(0.0, 1.0);
    }

    pub fn cycle_model_next(&mut self) {
        self.settings.model = self.settings.model.next();
    }

    pub fn cycle_model_prev(&mut self) {
        self.settings.model = self.settings.model.prev();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self
            .transcript_line_count()
            .saturating_sub(self.chat_height);
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
    }

    /// Scroll so the latest message (or the thinking indicator) is visible.
    pub fn scroll_to_bottom(&mut self) {
        let total = self.transcript_line_count();
        let visible = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.chat_scroll = total.saturating_sub(visible);
    }

    /// Rendered line count of the transcript at the current chat width,
    /// counting wrapped lines the same way the renderer does.
    fn transcript_line_count(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for msg in &self.messages {
            total += 1; // Role line
            for line in msg.content.lines() {
                // Character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total += 1;
                } else {
                    total += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total += 1; // Blank line after message
        }

        if self.loading {
            total += 2; // Role line + "Thinking..."
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::DEFAULT_BASE_URL;

    fn test_app() -> App {
        let mut app = App::new(GeminiClient::new(DEFAULT_BASE_URL));
        app.api_key = "test-key".to_string();
        app
    }

    fn push(app: &mut App, role: ChatRole, content: &str) {
        app.messages.push(ChatMessage {
            role,
            content: content.to_string(),
        });
    }

    #[test]
    fn test_submit_appends_user_turn_and_sets_busy() {
        let mut app = test_app();
        app.input = "hello".to_string();

        assert!(app.submit_user_message());
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].role, ChatRole::User);
        assert_eq!(app.messages[0].content, "hello");
        assert!(app.loading);
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn test_submit_blank_is_noop() {
        let mut app = test_app();
        app.input = "   ".to_string();

        assert!(!app.submit_user_message());
        assert!(app.messages.is_empty());
        assert!(!app.loading);
    }

    #[test]
    fn test_submit_while_busy_is_noop() {
        let mut app = test_app();
        app.input = "first".to_string();
        assert!(app.submit_user_message());

        app.input = "second".to_string();
        assert!(!app.submit_user_message());
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.input, "second");
    }

    #[test]
    fn test_build_api_history_excludes_errors_and_final_user_turn() {
        let mut app = test_app();
        push(&mut app, ChatRole::User, "hi");
        push(&mut app, ChatRole::Model, "hello");
        push(&mut app, ChatRole::Error, "Error: Internal Server Error");
        push(&mut app, ChatRole::User, "how are you");

        let history = app.build_api_history();
        assert_eq!(
            history,
            vec![Content::new("user", "hi"), Content::new("model", "hello")]
        );
        assert_eq!(app.current_prompt(), Some("how are you"));
    }

    #[test]
    fn test_build_api_history_single_turn_is_empty() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit_user_message();

        assert!(app.build_api_history().is_empty());
        assert_eq!(app.current_prompt(), Some("hi"));
    }

    #[test]
    fn test_success_appends_model_turn() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit_user_message();

        app.on_completion_success("Hello there".to_string());
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[1].role, ChatRole::Model);
        assert_eq!(app.messages[1].content, "Hello there");
        assert!(!app.loading);
    }

    #[test]
    fn test_invalid_key_failure_resets_session() {
        let mut app = test_app();
        push(&mut app, ChatRole::User, "hi");
        push(&mut app, ChatRole::Model, "hello");
        app.loading = true;

        let err = ApiError::Api {
            status: 400,
            message: "API key not valid. Please pass a valid API key.".to_string(),
        };
        app.on_completion_failure(&err);

        assert!(app.api_key.is_empty());
        assert!(app.messages.is_empty());
        assert_eq!(app.api_key_error.as_deref(), Some(INVALID_KEY_NOTICE));
        assert_eq!(app.screen(), Screen::ApiKey);
        assert!(!app.loading);
    }

    #[test]
    fn test_other_failure_appends_error_turn() {
        let mut app = test_app();
        push(&mut app, ChatRole::User, "hi");
        app.loading = true;

        let err = ApiError::Api {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        app.on_completion_failure(&err);

        assert_eq!(app.api_key, "test-key");
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[1].role, ChatRole::Error);
        assert_eq!(app.messages[1].content, "Error: Internal Server Error");
        assert_eq!(app.last_error.as_deref(), Some("Internal Server Error"));
        assert!(!app.loading);
    }

    #[test]
    fn test_empty_response_failure_is_recoverable() {
        let mut app = test_app();
        push(&mut app, ChatRole::User, "hi");
        app.loading = true;

        app.on_completion_failure(&ApiError::EmptyResponse);

        assert_eq!(app.api_key, "test-key");
        assert_eq!(app.messages[1].role, ChatRole::Error);
        assert_eq!(
            app.messages[1].content,
            "Error: Received an empty response from the API."
        );
        assert!(!app.loading);
    }

    #[test]
    fn test_set_api_key_rejects_blank() {
        let mut app = App::new(GeminiClient::new(DEFAULT_BASE_URL));
        assert!(!app.set_api_key("  "));
        assert_eq!(app.screen(), Screen::ApiKey);

        app.api_key_error = Some(INVALID_KEY_NOTICE.to_string());
        assert!(app.set_api_key("some-key"));
        assert_eq!(app.screen(), Screen::Chat);
        assert!(app.api_key_error.is_none());
    }

    #[test]
    fn test_settings_adjustment_clamps() {
        let mut app = test_app();
        app.settings.temperature = 0.95;
        app.adjust_temperature(0.1);
        assert_eq!(app.settings.temperature, 1.0);

        app.settings.top_p = 0.02;
        app.adjust_top_p(-0.05);
        assert_eq!(app.settings.top_p, 0.0);
    }

    #[test]
    fn test_settings_field_cycle() {
        let mut field = SettingsField::SystemPrompt;
        for _ in 0..4 {
            field = field.next();
        }
        assert_eq!(field, SettingsField::SystemPrompt);
        assert_eq!(SettingsField::SystemPrompt.prev(), SettingsField::TopP);
    }
}

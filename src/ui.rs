use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
    Frame,
};

use crate::app::{App, ChatRole, InputMode, Screen, SettingsField};
use crate::gemini::GeminiModel;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut current_text = String::new();

    while let Some((_, c)) = chars.next() {
        if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
            chars.next(); // consume the second *

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some((_, c)) = chars.next() {
                if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen() {
        Screen::ApiKey => render_api_key_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.show_settings {
        render_settings_panel(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let model_indicator = if app.screen() == Screen::Chat {
        format!(" [{}]", app.settings.model.display_name())
    } else {
        String::new()
    };

    let title = Line::from(vec![
        Span::styled(
            " EduBot Playground ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(model_indicator, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = if app.screen() == Screen::ApiKey {
        " API KEY "
    } else if app.show_settings {
        " SETTINGS "
    } else {
        " CHAT "
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<Span> = if app.screen() == Screen::ApiKey {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" start chatting ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ]
    } else if app.show_settings {
        if app.input_mode == InputMode::Editing {
            vec![
                Span::styled(" Enter/Esc ", key_style),
                Span::styled(" done ", label_style),
            ]
        } else {
            vec![
                Span::styled(" j/k ", key_style),
                Span::styled(" field ", label_style),
                Span::styled(" \u{2190}/\u{2192} ", key_style),
                Span::styled(" adjust ", label_style),
                Span::styled(" Enter ", key_style),
                Span::styled(" edit prompt ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" close ", label_style),
            ]
        }
    } else if app.input_mode == InputMode::Editing {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Ctrl+S ", key_style),
            Span::styled(" settings ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ]
    } else {
        vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" s ", key_style),
            Span::styled(" settings ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ]
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_api_key_screen(app: &App, frame: &mut Frame, area: Rect) {
    // Centered entry card
    let card_width = 60.min(area.width.saturating_sub(4));
    let card_height = 9.min(area.height.saturating_sub(2));
    let card_x = area.x + (area.width.saturating_sub(card_width)) / 2;
    let card_y = area.y + (area.height.saturating_sub(card_height)) / 2;
    let card_area = Rect::new(card_x, card_y, card_width, card_height);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" EduBot Playground ");

    let inner = block.inner(card_area);
    frame.render_widget(block, card_area);

    let mut lines: Vec<Line> = Vec::new();
    if let Some(error) = &app.api_key_error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.push(Line::default());
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Please enter your Gemini API key to begin.",
        Style::default().fg(Color::DarkGray),
    )));

    let intro = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });
    let intro_area = Rect::new(inner.x, inner.y, inner.width, inner.height.saturating_sub(3));
    frame.render_widget(intro, intro_area);

    // Masked input field
    let input_area = Rect::new(
        inner.x,
        inner.y + inner.height.saturating_sub(2),
        inner.width,
        1,
    );
    let masked = "*".repeat(app.api_key_input.chars().count().min(input_area.width as usize));
    let input = Paragraph::new(masked).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    let cursor_x = app.api_key_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", app.settings.model.as_str()));

    let chat_text = if app.messages.is_empty() && !app.loading {
        Text::from(Span::styled(
            "Type your message...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.messages {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                    lines.push(Line::default());
                }
                ChatRole::Model => {
                    lines.push(Line::from(Span::styled(
                        "Gemini:",
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                    lines.push(Line::default());
                }
                ChatRole::Error => {
                    lines.push(Line::from(Span::styled(
                        "Error:",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(Span::styled(
                            line.to_string(),
                            Style::default().fg(Color::Red),
                        )));
                    }
                    lines.push(Line::default());
                }
            }
        }

        if app.loading {
            lines.push(Line::from(Span::styled(
                "Gemini:",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let total_lines = chat_text.lines.len() as u16;

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    if total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_lines as usize).position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            chat_area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && !app.show_settings;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.is_busy() {
        " Message (waiting for response) "
    } else {
        " Message "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible in a single-line view
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn slider_line(label: &str, value: f64, selected: bool) -> Line<'static> {
    const WIDTH: usize = 20;
    let filled = ((value * WIDTH as f64).round() as usize).min(WIDTH);

    let label_style = if selected {
        Style::default().fg(Color::Cyan).bold()
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::styled(format!("{:<14}", label), label_style),
        Span::styled(
            "\u{2593}".repeat(filled),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            "\u{2591}".repeat(WIDTH - filled),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(format!(" {:.2}", value)),
    ])
}

fn render_settings_panel(app: &App, frame: &mut Frame, area: Rect) {
    let popup_width = 56.min(area.width.saturating_sub(4));
    let popup_height = 14.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Settings ");

    let prompt_selected = app.settings_field == SettingsField::SystemPrompt;
    let prompt_editing = prompt_selected && app.input_mode == InputMode::Editing;

    let prompt_label_style = if prompt_editing {
        Style::default().fg(Color::Yellow).bold()
    } else if prompt_selected {
        Style::default().fg(Color::Cyan).bold()
    } else {
        Style::default()
    };

    let model_selected = app.settings_field == SettingsField::Model;
    let model_style = if model_selected {
        Style::default().fg(Color::Cyan).bold()
    } else {
        Style::default()
    };

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            if prompt_editing {
                "System Prompt (typing)"
            } else {
                "System Prompt"
            },
            prompt_label_style,
        )),
        Line::from(app.settings.system_prompt.clone()),
        Line::default(),
        Line::from(vec![
            Span::styled(format!("{:<14}", "Model"), model_style),
            Span::raw("\u{2190} "),
            Span::styled(
                app.settings.model.display_name(),
                Style::default().fg(Color::Green),
            ),
            Span::raw(" \u{2192}"),
        ]),
    ];

    // Show the other choices dimmed below the selector
    for model in GeminiModel::all() {
        if model != app.settings.model {
            lines.push(Line::from(Span::styled(
                format!("{:<14}{}", "", model.display_name()),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    lines.push(Line::default());
    lines.push(slider_line(
        "Temperature",
        app.settings.temperature,
        app.settings_field == SettingsField::Temperature,
    ));
    lines.push(slider_line(
        "Top P",
        app.settings.top_p,
        app.settings_field == SettingsField::TopP,
    ));

    let panel = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(panel, popup_area);
}

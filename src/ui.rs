use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

use sitechat::markdown;
use sitechat::store::SUGGESTIONS;
use crate::app::{App, FocusPane, InputMode, Popup};

const SPINNER: [&str; 3] = ["◐", "◓", "◑"];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let [sidebar_area, main_area] = Layout::horizontal([
        Constraint::Percentage(30),
        Constraint::Percentage(70),
    ])
    .areas(body_area);

    let [transcript_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(main_area);

    render_header(app, frame, header_area);
    render_history(app, frame, sidebar_area);
    render_transcript(app, frame, transcript_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    match app.popup.clone() {
        Some(Popup::ConfirmClear) => render_confirm_clear(frame, area),
        Some(Popup::Notice(message)) => render_notice(frame, area, &message),
        None => {}
    }
}

fn border_color(focused: bool) -> Color {
    if focused { Color::Cyan } else { Color::DarkGray }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Site Visit Data Chatbot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.api_url), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect) {
    app.history_area = Some(area);

    let state = app.store.state();
    let focused = app.focus == FocusPane::History;
    let title = if state.is_clearing {
        format!(" Chat History {} ", SPINNER[app.animation_frame as usize % SPINNER.len()])
    } else {
        " Chat History ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(focused)))
        .title(title);

    if state.is_history_loading {
        let spinner = SPINNER[app.animation_frame as usize % SPINNER.len()];
        let loading = Paragraph::new(format!("{} Loading...", spinner))
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(loading, area);
        return;
    }

    if state.history.is_empty() {
        let empty = Paragraph::new("No chat history yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = state
        .history
        .iter()
        .map(|entry| ListItem::new(entry.question.clone()))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(if focused { Color::Cyan } else { Color::DarkGray })
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.history_state);
}

fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let state = app.store.state();
    let mut lines: Vec<Line<'static>> = Vec::new();

    if state.messages.is_empty() && !state.is_sending {
        lines.push(Line::from(Span::styled(
            "Ask anything about site visits...",
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Try asking:", Style::default().fg(Color::DarkGray))));
        for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!(" {} ", i + 1), Style::default().bg(Color::DarkGray).fg(Color::White)),
                Span::raw(format!(" {}", suggestion)),
            ]));
        }
        return lines;
    }

    for msg in &state.messages {
        if msg.is_user {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.extend(msg.content.lines().map(|line| Line::from(line.to_string())));
        } else {
            lines.push(Line::from(Span::styled(
                "Bot:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.extend(markdown::render(&msg.content).lines);
        }
        lines.push(Line::default());
    }

    if state.is_sending {
        lines.push(Line::from(Span::styled(
            "Bot:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Rows `paragraph` occupies once word-wrapped to `width` columns
fn wrapped_height(paragraph: &Paragraph, width: u16) -> u16 {
    u16::try_from(paragraph.line_count(width)).unwrap_or(u16::MAX)
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.transcript_area = Some(area);

    let transcript = Paragraph::new(Text::from(transcript_lines(app))).wrap(Wrap { trim: false });

    // Inner size minus borders
    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);
    let total = wrapped_height(&transcript, inner_width);

    app.transcript_height = inner_height;
    app.transcript_max_scroll = total.saturating_sub(inner_height);
    if app.follow_transcript {
        app.transcript_scroll = app.transcript_max_scroll;
    } else {
        app.transcript_scroll = app.transcript_scroll.min(app.transcript_max_scroll);
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app.focus == FocusPane::Transcript)))
        .title(" Conversation ");

    let transcript = transcript.block(block).scroll((app.transcript_scroll, 0));

    frame.render_widget(transcript, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if editing {
        Color::Yellow
    } else {
        border_color(app.focus == FocusPane::Input)
    };

    let title = if app.store.state().is_sending {
        " Ask Anything... (waiting for answer) "
    } else {
        " Ask Anything... "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = input_viewport(app.draft(), app.draft_cursor, inner_width);

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if editing && app.popup.is_none() {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Horizontal scrolling for the single-line input. Returns the visible slice
/// of `draft` and the cursor column, both measured in terminal cells so wide
/// characters keep the cursor inside the box.
fn input_viewport(draft: &str, cursor: usize, width: usize) -> (String, u16) {
    let chars: Vec<char> = draft.chars().collect();
    let cursor = cursor.min(chars.len());
    let columns = |slice: &[char]| slice.iter().map(|c| c.width().unwrap_or(0)).sum::<usize>();

    // The cursor cell itself needs one column
    let mut start = 0;
    while start < cursor && columns(&chars[start..cursor]) + 1 > width {
        start += 1;
    }

    let mut used = 0;
    let visible: String = chars[start..]
        .iter()
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= width
        })
        .collect();

    let cursor_x = u16::try_from(columns(&chars[start..cursor])).unwrap_or(u16::MAX);
    (visible, cursor_x)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let mut hints: Vec<Span> = Vec::new();
    match app.input_mode {
        InputMode::Editing => {
            hints.extend(hint(" Enter ", " send "));
            hints.extend(hint(" Esc ", " stop typing "));
            hints.extend(hint(" Tab ", " focus "));
        }
        InputMode::Normal => {
            match app.focus {
                FocusPane::History => {
                    hints.extend(hint(" j/k ", " nav "));
                    hints.extend(hint(" Enter ", " use question "));
                }
                FocusPane::Transcript => {
                    hints.extend(hint(" j/k ", " scroll "));
                    hints.extend(hint(" g/G ", " top/bottom "));
                }
                FocusPane::Input => {
                    hints.extend(hint(" i ", " type "));
                }
            }
            if app.store.state().messages.is_empty() {
                hints.extend(hint(" 1-3 ", " suggestion "));
            }
            hints.extend(hint(" Tab ", " focus "));
            hints.extend(hint(" r ", " refresh "));
            if !app.store.state().history.is_empty() {
                hints.extend(hint(" D ", " clear "));
            }
            hints.extend(hint(" q ", " quit "));
        }
    }

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

/// Centered popup area, clipped to `area`
fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_confirm_clear(frame: &mut Frame, area: Rect) {
    let popup_area = popup_rect(area, 52, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Clear History ");

    let text = Text::from(vec![
        Line::from("Are you sure you want to clear chat history?"),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" yes   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" no"),
        ]),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), popup_area);
}

fn render_notice(frame: &mut Frame, area: Rect, message: &str) {
    let popup_area = popup_rect(area, 44, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error ");

    let text = Text::from(vec![
        Line::from(Span::styled(message.to_string(), Style::default().fg(Color::Red))),
        Line::default(),
        Line::from(Span::styled("Press any key to continue", Style::default().fg(Color::DarkGray))),
    ]);

    frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        popup_area,
    );
}

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use property_chat::format::{ListingStatus, PropertyCard, SUGGESTIONS};
use property_chat::{ChatRole, LogEntry, Turn, TurnBody};

use crate::app::App;

/// Split on `**` and alternate between plain and bold spans. An unmatched
/// trailing `**` is kept as literal text.
fn markdown_line(text: &str, base: Style) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    let closed = parts.len() % 2 == 1;

    let mut spans = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;
        if i % 2 == 1 && !(is_last && !closed) {
            if !part.is_empty() {
                spans.push(Span::styled(part.to_string(), base.add_modifier(Modifier::BOLD)));
            }
        } else if i % 2 == 1 {
            spans.push(Span::styled(format!("**{}", part), base));
        } else if !part.is_empty() {
            spans.push(Span::styled(part.to_string(), base));
        }
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Property Search Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" Queries: {} ", app.log().query_count()),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!(" {} ", app.session.user_id()),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn role_line(role: ChatRole) -> Line<'static> {
    let color = match role {
        ChatRole::User => Color::Cyan,
        ChatRole::Assistant => Color::Yellow,
    };
    Line::from(Span::styled(
        format!("{}:", role.label()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn welcome_lines() -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome! Ask me about apartments, villas and other properties in Dubai.",
            Style::default().fg(Color::White).bold(),
        )),
        Line::default(),
        Line::from(Span::styled("Try one of these:", dim)),
    ];

    for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!(" F{} ", i + 1), Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" "),
            Span::styled(suggestion.to_string(), Style::default().fg(Color::Cyan)),
        ]));
    }

    lines
}

fn card_lines(card: &PropertyCard) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let badge = match card.status {
        ListingStatus::ForSale => Style::default().bg(Color::Green).fg(Color::Black),
        ListingStatus::ForRent => Style::default().bg(Color::Blue).fg(Color::White),
        ListingStatus::Unknown => Style::default().bg(Color::DarkGray).fg(Color::White),
    };

    let mut lines = vec![
        Line::from(Span::styled(
            format!("┃ {}", card.title),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("┃ Location: ", label),
            Span::raw(card.location.clone()),
        ]),
        Line::from(vec![Span::styled("┃ ", label), Span::raw(card.details())]),
        Line::from(vec![
            Span::styled("┃ Area: ", label),
            Span::raw(format!("{} sqm", card.area)),
        ]),
        Line::from(vec![
            Span::styled("┃ ", label),
            Span::styled(card.price.clone(), Style::default().fg(Color::Green).bold()),
            Span::raw("  "),
            Span::styled(format!(" {} ", card.status.label()), badge),
        ]),
    ];

    if let Some(link) = &card.link {
        lines.push(Line::from(vec![
            Span::styled("┃ View Details → ", label),
            Span::styled(
                link.clone(),
                Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            ),
        ]));
    }

    lines
}

fn turn_lines(turn: &Turn) -> Vec<Line<'static>> {
    let mut lines = vec![role_line(turn.role)];

    match &turn.body {
        TurnBody::Text(text) => {
            lines.extend(text.lines().map(|line| markdown_line(line, Style::default())));
        }
        TurnBody::Listings { header, cards } => {
            lines.push(markdown_line(header, Style::default()));
            for card in cards {
                lines.push(Line::default());
                lines.extend(card_lines(card));
            }
        }
        TurnBody::Error(text) => {
            lines.push(Line::from(Span::styled(
                text.clone(),
                Style::default().fg(Color::Red),
            )));
        }
    }

    lines.push(Line::default());
    lines
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    if app.log().is_welcome_visible() {
        return welcome_lines();
    }

    let mut lines = Vec::new();
    for entry in app.log().entries() {
        match entry {
            LogEntry::Turn(turn) => lines.extend(turn_lines(turn)),
            LogEntry::TypingIndicator => {
                lines.push(role_line(ChatRole::Assistant));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Typing{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
        }
    }
    lines
}

/// Rows the paragraph occupies once word-wrapped to `width` columns,
/// counted by ratatui's own wrapper so scrolling matches what is drawn
fn wrapped_height(paragraph: &Paragraph, width: u16) -> u16 {
    u16::try_from(paragraph.line_count(width)).unwrap_or(u16::MAX)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    // Measured before the block is attached, so borders are not counted
    let chat = Paragraph::new(Text::from(chat_lines(app))).wrap(Wrap { trim: false });
    app.chat_total_lines = wrapped_height(&chat, app.chat_width);

    if app.log_mut().take_scroll_request() {
        app.follow_tail = true;
    }
    if app.follow_tail {
        app.chat_scroll = app.max_scroll();
    } else {
        app.chat_scroll = app.chat_scroll.min(app.max_scroll());
    }

    let title = if app.follow_tail {
        " Conversation ".to_string()
    } else {
        format!(" Conversation (scrolled, {} more below) ", app.max_scroll() - app.chat_scroll)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);

    let chat = chat.block(block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input = &app.log().input;

    let (title, border_color, text_color) = if input.is_enabled() {
        (" Ask (Enter to send) ", Color::Yellow, Color::Cyan)
    } else {
        (" Waiting for a response... ", Color::DarkGray, Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let visible_text: String = input
        .text()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(block);
    frame.render_widget(paragraph, area);

    if input.is_enabled() && input.is_focused() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = if app.session.is_processing() {
        (" SENDING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" READY ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" ↑/↓ PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
    ];
    if app.log().is_welcome_visible() {
        hints.extend(vec![
            Span::styled(" F1-F4 ", key_style),
            Span::styled(" suggestions ", label_style),
        ]);
    }
    hints.extend(vec![
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    let footer = Paragraph::new(Line::from(hints)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use property_chat::{
        ApiError, ChatLog, ChatSession, ChatView, QueryRequest, QueryResponse, QueryTransport,
        UserId,
    };
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn span_texts(line: &Line) -> Vec<(String, bool)> {
        line.spans
            .iter()
            .map(|s| (s.content.to_string(), s.style.add_modifier.contains(Modifier::BOLD)))
            .collect()
    }

    #[test]
    fn test_markdown_bold_spans() {
        let line = markdown_line("Found **2 properties** matching", Style::default());
        assert_eq!(
            span_texts(&line),
            vec![
                ("Found ".to_string(), false),
                ("2 properties".to_string(), true),
                (" matching".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_markdown_unclosed_marker_is_literal() {
        let line = markdown_line("price **AED", Style::default());
        assert_eq!(
            span_texts(&line),
            vec![("price ".to_string(), false), ("**AED".to_string(), false)]
        );
    }

    #[test]
    fn test_wrapped_height_counts_word_wrap() {
        // 20 columns of text, but words cannot be split across rows at width 10
        let paragraph = Paragraph::new("aaaaaa bbbbbb cccccc").wrap(Wrap { trim: false });
        assert_eq!(wrapped_height(&paragraph, 10), 3);

        let paragraph = Paragraph::new(Text::from(vec![Line::from("abc"), Line::default()]))
            .wrap(Wrap { trim: false });
        assert_eq!(wrapped_height(&paragraph, 20), 2);
    }

    struct SilentTransport;

    #[async_trait]
    impl QueryTransport for SilentTransport {
        async fn query(&self, _request: &QueryRequest) -> Result<QueryResponse, ApiError> {
            Err(ApiError::Aborted("not used".to_string()))
        }
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_newest_turn_visible_when_lines_word_wrap() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(UserId::generate(), ChatLog::new());
        let mut app = App::new(session, Arc::new(SilentTransport), tx);

        for _ in 0..4 {
            app.log_mut()
                .append_turn(Turn::user("aaaaaa bbbbbb cccccc dddddd eeeeee ffffff"));
        }
        app.log_mut()
            .append_turn(Turn::assistant(TurnBody::Text("ZZEND".to_string())));

        let mut terminal = Terminal::new(TestBackend::new(12, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(app.follow_tail);
        assert_eq!(app.chat_scroll, app.max_scroll());
        assert!(buffer_text(&terminal).contains("ZZEND"));
    }

    #[test]
    fn test_card_lines_include_link_only_when_present() {
        let mut card = PropertyCard {
            title: "Marina Heights".to_string(),
            location: "Dubai Marina, Dubai".to_string(),
            property_type: "Apartment".to_string(),
            bedrooms: "2".to_string(),
            bathrooms: "2".to_string(),
            area: "120".to_string(),
            price: "AED 1,850,000".to_string(),
            status: ListingStatus::ForSale,
            link: None,
        };
        assert_eq!(card_lines(&card).len(), 5);

        card.link = Some("https://example.com/1".to_string());
        assert_eq!(card_lines(&card).len(), 6);
    }
}

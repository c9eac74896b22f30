use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use crate::app::{App, Entry, StreamState};
use crate::markdown;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" mini llama ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("({})", app.config.model),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let chat_text = if app.entries.is_empty() && !app.in_flight() {
        Text::from(Span::styled(
            "Ask the model anything...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for entry in &app.entries {
            match entry {
                Entry::User(text) => {
                    lines.push(role_line("You:", Color::Cyan));
                    for line in text.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                    lines.push(Line::default());
                }
                Entry::Assistant(text) => {
                    lines.push(role_line("AI:", Color::Yellow));
                    lines.extend(markdown::render(text));
                    lines.push(Line::default());
                }
                Entry::Notice(text) => {
                    lines.push(Line::from(Span::styled(
                        format!("— {} —", text),
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::ITALIC),
                    )));
                    lines.push(Line::default());
                }
                Entry::CodeOutput(text) => {
                    lines.push(role_line("Code Output:", Color::Magenta));
                    for line in text.lines() {
                        lines.push(Line::from(Span::styled(
                            line.to_string(),
                            Style::default().fg(Color::Green),
                        )));
                    }
                    lines.push(Line::default());
                }
            }
        }

        if let StreamState::Streaming(partial) = &app.stream {
            lines.push(role_line("AI:", Color::Yellow));
            if partial.is_empty() {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            } else {
                lines.extend(markdown::render(partial));
            }
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let (border_color, title) = if app.in_flight() {
        (Color::DarkGray, " waiting for reply... ")
    } else if app.gate.is_armed() {
        (Color::Magenta, " type run to execute the armed code ")
    } else {
        (Color::Cyan, " type here... ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let input = Paragraph::new(app.input.as_str()).block(input_block);
    frame.render_widget(input, area);

    if !app.in_flight() {
        // Cursor inside the borders, at the edit position
        let x = area.x + 1 + app.cursor as u16;
        let y = area.y + 1;
        frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(2)), y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(
        " Enter: send | Up/Down: scroll | Ctrl+C: quit",
        Style::default().fg(Color::DarkGray),
    )];
    if app.gate.is_armed() {
        spans.push(Span::styled(
            "  [code armed]",
            Style::default().fg(Color::Magenta).bold(),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn role_line(label: &'static str, color: Color) -> Line<'static> {
    Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

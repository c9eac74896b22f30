use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Render markdown-formatted text into styled transcript lines.
///
/// Pure: the same text always renders the same lines. Handles fenced code
/// blocks, headings, bullets and `**bold**`; everything else passes through
/// as plain text.
pub fn render(text: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_fence = false;

    for raw in text.lines() {
        if raw.trim_start().starts_with("```") {
            in_fence = !in_fence;
            lines.push(Line::from(Span::styled(
                raw.to_string(),
                Style::default().fg(Color::DarkGray),
            )));
            continue;
        }

        if in_fence {
            lines.push(Line::from(Span::styled(
                raw.to_string(),
                Style::default().fg(Color::Green),
            )));
        } else if let Some(heading) = raw.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim_start();
            lines.push(Line::from(Span::styled(
                heading.to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
        } else if let Some(item) = raw.strip_prefix("- ") {
            let mut spans = vec![Span::raw("• ")];
            spans.extend(parse_inline(item));
            lines.push(Line::from(spans));
        } else {
            lines.push(Line::from(parse_inline(raw)));
        }
    }

    lines
}

/// Convert **bold** runs in a line to styled spans; a lone or unclosed
/// marker stays literal.
fn parse_inline(text: &str) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut current_text = String::new();

    while let Some((_, c)) = chars.next() {
        if c == '*' {
            if chars.peek().map(|(_, c)| *c) == Some('*') {
                chars.next();

                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }

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
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn bold_runs_become_styled_spans() {
        let spans = parse_inline("a **bold** word");
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[1].content, "bold");
        assert!(spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn unclosed_bold_stays_literal() {
        let spans = parse_inline("a **dangling marker");
        let text: String = spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "a **dangling marker");
    }

    #[test]
    fn fenced_code_keeps_its_text() {
        let lines = render("before\n```python\nprint(\"hi\")\n```\nafter");
        assert_eq!(lines.len(), 5);
        assert_eq!(line_text(&lines[2]), "print(\"hi\")");
        assert_eq!(lines[2].spans[0].style.fg, Some(Color::Green));
    }

    #[test]
    fn headings_and_bullets_render() {
        let lines = render("## Plan\n- first\n- second");
        assert_eq!(line_text(&lines[0]), "Plan");
        assert_eq!(line_text(&lines[1]), "• first");
        assert_eq!(line_text(&lines[2]), "• second");
    }

    #[test]
    fn rendering_is_pure() {
        let text = "# Title\nsome **bold** text";
        assert_eq!(render(text), render(text));
    }
}

use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph, Wrap},
};

use console_session::controller::STATUS_CLASS;
use console_session::input_line::INPUT_CLASS;
use console_session::markup::{self, Row, Segment};
use console_session::{ConnectionState, InputCapture, Phase, SessionController};

/// Terminal style for a server style class. Unknown classes are unstyled.
pub fn class_style(class: &str) -> Style {
    match class {
        "prompt" => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        "username" => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        "hostname" => Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        "command" => Style::default().fg(Color::White),
        "ascii-art" => Style::default().fg(Color::Cyan),
        "welcome-line" => Style::default().fg(Color::Yellow),
        "error" => Style::default().fg(Color::Red),
        STATUS_CLASS => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
        INPUT_CLASS => Style::default().add_modifier(Modifier::BOLD),
        _ => Style::default(),
    }
}

fn segment_style(segment: &Segment) -> Style {
    let style = segment
        .classes
        .iter()
        .fold(Style::default(), |style, class| style.patch(class_style(class)));
    match segment.color {
        Some(markup::Rgb(r, g, b)) => style.fg(Color::Rgb(r, g, b)),
        None => style,
    }
}

fn row_spans(row: Row) -> Vec<Span<'static>> {
    row.into_iter()
        .map(|segment| {
            let style = segment_style(&segment);
            Span::styled(segment.text, style)
        })
        .collect()
}

/// The editable field: typed (or masked) value with the cursor cell reversed.
fn field_spans(capture: &InputCapture, mask_char: char) -> Vec<Span<'static>> {
    let shown: Vec<char> = capture.display_value(mask_char).chars().collect();
    let col = capture.cursor_column().min(shown.len());

    let before: String = shown[..col].iter().collect();
    let (cursor_ch, after) = match shown.get(col) {
        Some(c) => (c.to_string(), shown[col + 1..].iter().collect::<String>()),
        None => (" ".to_string(), String::new()),
    };

    let edit_style = class_style(INPUT_CLASS);
    let cursor_style = edit_style.add_modifier(Modifier::REVERSED);
    vec![
        Span::styled(before, edit_style),
        Span::styled(cursor_ch, cursor_style),
        Span::styled(after, edit_style),
    ]
}

/// Rows with the prompt's field appended to the last one.
fn prompt_lines(rows: Vec<Row>, capture: &InputCapture, mask_char: char) -> Vec<Line<'static>> {
    let last = rows.len().saturating_sub(1);
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut spans = row_spans(row);
            if i == last {
                spans.extend(field_spans(capture, mask_char));
            }
            Line::from(spans)
        })
        .collect()
}

/// Everything on the surface, plus the pending field.
pub fn session_lines(ctl: &SessionController) -> Vec<Line<'static>> {
    let surface = ctl.surface();
    let pending = ctl.pending();
    let pending_at = pending.and_then(|p| surface.index_of(p.line()));
    let mask_char = ctl.mask_char();

    let mut lines = Vec::new();
    for (i, line) in surface.lines().iter().enumerate() {
        let rows = markup::parse(&line.content, &line.class_name);
        match pending {
            Some(capture) if pending_at == Some(i) => {
                lines.extend(prompt_lines(rows, capture, mask_char));
            }
            _ => lines.extend(rows.into_iter().map(|row| Line::from(row_spans(row)))),
        }
    }

    // The prompt line was cleared away but the prompt is still open.
    if let Some(capture) = pending.filter(|_| pending_at.is_none()) {
        let rows = markup::parse(capture.prompt(), console_session::protocol::DEFAULT_CLASS_NAME);
        lines.extend(prompt_lines(rows, capture, mask_char));
    }

    lines
}

fn status_bar(ctl: &SessionController) -> Line<'static> {
    let (text, style) = match (ctl.phase(), ctl.connection_state()) {
        (Phase::Stopped, _) => (" stopped ".to_string(), Style::default().fg(Color::DarkGray)),
        (_, ConnectionState::Open) => (
            match ctl.connection() {
                Some(conn) => format!(" connected ({}) ", conn),
                None => " connected ".to_string(),
            },
            Style::default().fg(Color::Green),
        ),
        (_, ConnectionState::Connecting) => (
            format!(" connecting (attempt {}) ", ctl.attempt()),
            Style::default().fg(Color::Yellow),
        ),
        (_, ConnectionState::Closed) => (
            match ctl.retry_in() {
                Some(delay) => format!(" disconnected, retrying in {:.1}s ", delay.as_secs_f32()),
                None => " disconnected ".to_string(),
            },
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        (_, ConnectionState::Disconnected) => {
            (" disconnected ".to_string(), Style::default().fg(Color::Red))
        }
    };

    let hints = if ctl.pending().is_some() {
        "enter submit · pgup/pgdn scroll · ctrl-c quit "
    } else {
        "pgup/pgdn scroll · ctrl-c quit "
    };

    let mut spans = vec![Span::styled(text, style), Span::raw("· "), Span::raw(hints)];
    let back = ctl.surface().scroll_back();
    if back > 0 {
        spans.push(Span::styled(
            format!("[{} rows back] ", back),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }
    Line::from(spans)
}

/// Draw the session. Returns how many rows the content can be scrolled back.
pub fn draw(frame: &mut Frame, ctl: &SessionController, title: &str) -> usize {
    let area = frame.area();
    let block = Block::default()
        .title(" console ")
        .title(
            Line::styled(
                format!(" {} ", title),
                Style::default().add_modifier(Modifier::DIM),
            )
            .alignment(Alignment::Right),
        )
        .title_bottom(status_bar(ctl))
        .borders(Borders::ALL)
        .padding(Padding::horizontal(1));
    let inner: Rect = block.inner(area);

    let paragraph = Paragraph::new(session_lines(ctl)).wrap(Wrap { trim: false });
    let total = paragraph.line_count(inner.width);
    let max_scroll = total.saturating_sub(inner.height as usize);
    let offset = max_scroll - ctl.surface().scroll_back().min(max_scroll);
    let offset = u16::try_from(offset).unwrap_or(u16::MAX);

    frame.render_widget(paragraph.scroll((offset, 0)).block(block), area);
    max_scroll
}

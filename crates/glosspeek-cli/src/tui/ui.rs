//! UI rendering for the TUI

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use glosspeek_core::provider::catalog;

use super::app::{App, FormField, Overlay, Screen, Selection};

/// Rows between the selection and the tooltip.
const TOOLTIP_OFFSET: u16 = 1;

/// Inner text width of the tooltip.
const TOOLTIP_WIDTH: u16 = 40;

/// Draw the entire UI
pub fn draw(frame: &mut Frame, app: &mut App) {
    match app.screen {
        Screen::Reader => draw_reader_screen(frame, app),
        Screen::Settings => draw_settings_screen(frame, app),
    }
}

// ----- reader ------------------------------------------------------------

fn draw_reader_screen(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());

    app.reader_area = chunks[0];
    app.doc.scroll_to_cursor(chunks[0].height as usize);
    draw_document(frame, app, chunks[0]);
    draw_status_bar(frame, app, chunks[1]);

    app.tooltip_area = None;
    draw_tooltip(frame, app);
}

fn draw_document(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width as usize;
    let top = app.doc.scroll;
    let lines: Vec<Line> = (top..top + area.height as usize)
        .map(|idx| match app.doc.lines.get(idx) {
            Some(line) => doc_line(app, idx, line, width),
            None => Line::default(),
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

/// Style one document line: active selection, result highlight, cursor.
fn doc_line(app: &App, line_idx: usize, line: &str, width: usize) -> Line<'static> {
    let select_style = Style::default().add_modifier(Modifier::REVERSED);
    let highlight_style = Style::default().bg(Color::Yellow).fg(Color::Black);

    let selected = span_on_line(app.selection.as_ref(), line_idx, line);
    let highlighted = span_on_line(app.highlight.as_ref(), line_idx, line);
    let cursor = (app.doc.cursor.0 == line_idx).then_some(app.doc.cursor.1);

    let mut spans: Vec<Span> = Vec::new();
    let mut run = String::new();
    let mut run_style = Style::default();
    for (col, c) in line.chars().take(width).enumerate() {
        let mut style = Style::default();
        if in_span(highlighted, col) {
            style = highlight_style;
        }
        if in_span(selected, col) {
            style = select_style;
        }
        if cursor == Some(col) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        if style != run_style && !run.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut run), run_style));
        }
        run_style = style;
        run.push(c);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, run_style));
    }
    if line.is_empty() && cursor == Some(0) {
        spans.push(Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)));
    }
    Line::from(spans)
}

/// The inclusive column range a selection covers on a given line.
fn span_on_line(
    selection: Option<&Selection>,
    line_idx: usize,
    line: &str,
) -> Option<(usize, usize)> {
    let ((start_line, start_col), (end_line, end_col)) = selection?.normalized();
    if line_idx < start_line || line_idx > end_line {
        return None;
    }
    let last = line.chars().count().saturating_sub(1);
    let from = if line_idx == start_line { start_col } else { 0 };
    let to = if line_idx == end_line { end_col } else { last };
    Some((from, to))
}

fn in_span(span: Option<(usize, usize)>, col: usize) -> bool {
    span.is_some_and(|(from, to)| col >= from && col <= to)
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let badge = if app.enabled {
        Span::styled(
            format!(" {} · {} ", app.settings.target_language, app.settings.model),
            Style::default().fg(Color::Green),
        )
    } else {
        Span::styled(" OFF ", Style::default().fg(Color::White).bg(Color::DarkGray))
    };

    let left = match &app.status_flash {
        Some((message, _)) => Span::styled(
            format!(" {message}"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        None => Span::styled(
            format!(
                " {} — v select · s settings · ctrl+t toggle · q quit",
                app.title
            ),
            Style::default().fg(Color::DarkGray),
        ),
    };

    let badge_width = badge.content.width() as u16;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(badge_width)])
        .split(area);
    frame.render_widget(Paragraph::new(Line::from(left)), chunks[0]);
    frame.render_widget(Paragraph::new(Line::from(badge)), chunks[1]);
}

// ----- tooltip -----------------------------------------------------------

fn draw_tooltip(frame: &mut Frame, app: &mut App) {
    let (title, body) = match &app.overlay {
        Overlay::Idle | Overlay::Awaiting { .. } => return,
        Overlay::Result { result, pinned } => {
            let mut lines: Vec<Line> = vec![
                Line::from(Span::styled(
                    result.translation.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    result.part_of_speech.clone(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
                )),
                Line::from(result.example.clone()),
                Line::from(Span::styled(
                    format!("Using model: {}", result.model),
                    Style::default().fg(Color::DarkGray),
                )),
            ];
            let actions = if *pinned {
                "pinned · esc close"
            } else {
                "p pin · esc close"
            };
            lines.push(Line::from(Span::styled(
                actions,
                Style::default().fg(Color::DarkGray),
            )));
            (truncate_width(&result.original_text, TOOLTIP_WIDTH as usize), lines)
        }
        Overlay::Error(message) => {
            let lines = vec![
                Line::from(Span::styled(
                    message.clone(),
                    Style::default().fg(Color::Red),
                )),
                Line::from(Span::styled(
                    "esc close",
                    Style::default().fg(Color::DarkGray),
                )),
            ];
            ("Error".to_string(), lines)
        }
    };

    let viewport = app.reader_area;
    if viewport.width < 10 || viewport.height < 4 {
        return;
    }
    let width = TOOLTIP_WIDTH.min(viewport.width.saturating_sub(2)) + 2;
    let inner_width = (width - 2) as usize;
    let height = (wrapped_height(&body, inner_width) + 2).min(viewport.height);

    let anchor = selection_anchor(app);
    let tooltip = place_tooltip(anchor, width, height, viewport);

    frame.render_widget(Clear, tooltip);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", title));
    frame.render_widget(
        Paragraph::new(body).wrap(Wrap { trim: false }).block(block),
        tooltip,
    );
    app.tooltip_area = Some(tooltip);
}

/// Screen rect of the span the tooltip anchors to.
fn selection_anchor(app: &App) -> Rect {
    let area = app.reader_area;
    let span = app.highlight.as_ref().or(app.selection.as_ref());
    let Some(span) = span else {
        // No span to anchor to (e.g. an inline error): use the cursor cell
        let (line, col) = app.doc.cursor;
        return cell_rect(area, app.doc.scroll, line, col, 1);
    };
    let ((start_line, start_col), (end_line, end_col)) = span.normalized();
    let width = if start_line == end_line {
        (end_col - start_col + 1) as u16
    } else {
        area.width.saturating_sub(start_col as u16).max(1)
    };
    let mut rect = cell_rect(area, app.doc.scroll, start_line, start_col, width);
    rect.height = ((end_line - start_line) as u16 + 1).min(area.height.saturating_sub(rect.y - area.y));
    rect
}

fn cell_rect(area: Rect, scroll: usize, line: usize, col: usize, width: u16) -> Rect {
    let y = area.y + (line.saturating_sub(scroll) as u16).min(area.height.saturating_sub(1));
    let x = (area.x + col as u16).min(area.x + area.width.saturating_sub(1));
    let width = width.min(area.x + area.width - x).max(1);
    Rect {
        x,
        y,
        width,
        height: 1,
    }
}

/// Position the tooltip below the anchored span; shift left when it would
/// overflow the right edge, flip above when it would overflow the bottom.
fn place_tooltip(anchor: Rect, width: u16, height: u16, viewport: Rect) -> Rect {
    let width = width.min(viewport.width);
    let height = height.min(viewport.height);

    let mut x = anchor.x;
    if x + width > viewport.x + viewport.width {
        x = (anchor.x + anchor.width)
            .saturating_sub(width)
            .max(viewport.x);
    }

    let mut y = anchor.y + anchor.height + TOOLTIP_OFFSET;
    if y + height > viewport.y + viewport.height {
        y = anchor
            .y
            .saturating_sub(height + TOOLTIP_OFFSET)
            .max(viewport.y);
    }

    // Last-resort clamp for tiny viewports
    if x + width > viewport.x + viewport.width {
        x = viewport.x + viewport.width - width;
    }
    if y + height > viewport.y + viewport.height {
        y = viewport.y + viewport.height - height;
    }

    Rect {
        x,
        y,
        width,
        height,
    }
}

/// Rows `lines` occupy when wrapped to `width` columns.
fn wrapped_height(lines: &[Line], width: usize) -> u16 {
    lines
        .iter()
        .map(|line| (line.width().max(1)).div_ceil(width.max(1)) as u16)
        .sum()
}

// ----- settings ----------------------------------------------------------

fn draw_settings_screen(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Length(1), // provider
            Constraint::Length(1), // base url
            Constraint::Length(1), // api key
            Constraint::Length(1), // language
            Constraint::Length(1), // custom model
            Constraint::Min(4),    // model list
            Constraint::Length(7), // pins
            Constraint::Length(1), // hints
        ])
        .split(frame.area());

    let state = if app.enabled { "On" } else { "Off" };
    let header = match &app.status_flash {
        Some((message, _)) => Line::from(Span::styled(
            format!(" {message}"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        None => Line::from(Span::styled(
            format!(" Settings — Glosspeek is {state}"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    };
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let form = &app.form;
    let providers = catalog::all();
    let provider_name = providers
        .get(form.provider_idx)
        .map(|p| p.name.as_str())
        .unwrap_or("Custom");

    frame.render_widget(
        field_line("Provider", provider_name, form.focus == FormField::Provider, false),
        chunks[1],
    );
    frame.render_widget(
        field_line("Base URL", form.base_url.value(), form.focus == FormField::BaseUrl, true),
        chunks[2],
    );
    frame.render_widget(
        field_line("API key", form.api_key.value(), form.focus == FormField::ApiKey, true),
        chunks[3],
    );
    frame.render_widget(
        field_line("Language", form.language.value(), form.focus == FormField::Language, true),
        chunks[4],
    );
    frame.render_widget(
        field_line(
            "Custom model",
            form.custom_model.value(),
            form.focus == FormField::CustomModel,
            true,
        ),
        chunks[5],
    );

    draw_model_list(frame, app, chunks[6]);
    draw_pins(frame, app, chunks[7]);

    let hints = Line::from(Span::styled(
        " tab field · ↑↓ change · enter save · d remove pin · esc back",
        Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(Paragraph::new(hints), chunks[8]);
}

fn field_line(label: &str, value: &str, focused: bool, editable: bool) -> Paragraph<'static> {
    let label_style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mut spans = vec![
        Span::styled(format!(" {label:<13}"), label_style),
        Span::raw(value.to_string()),
    ];
    if focused && editable {
        spans.push(Span::styled("▏", Style::default().fg(Color::Cyan)));
    }
    Paragraph::new(Line::from(spans))
}

fn draw_model_list(frame: &mut Frame, app: &App, area: Rect) {
    let form = &app.form;
    let title = if form.models_loading {
        " Model (loading…) "
    } else {
        " Model "
    };
    let focused = form.focus == FormField::Model;
    let block = Block::default().borders(Borders::ALL).title(title).border_style(
        if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        },
    );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // models plus the trailing virtual custom entry
    let total = form.models.len() + 1;
    let visible = inner.height as usize;
    let top = form
        .model_idx
        .saturating_sub(visible.saturating_sub(1))
        .min(total.saturating_sub(visible));

    let lines: Vec<Line> = (top..(top + visible).min(total))
        .map(|idx| {
            let label = if idx < form.models.len() {
                form.models[idx].name.clone()
            } else {
                "Custom Model".to_string()
            };
            let selected = idx == form.model_idx;
            let marker = if selected { "> " } else { "  " };
            let style = if selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(Span::styled(
                format!("{marker}{}", truncate_width(&label, inner.width as usize)),
                style,
            ))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_pins(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.form.focus == FormField::Pins;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Pinned translations ")
        .border_style(if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        });
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.pins.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "No pinned translations yet",
                Style::default().fg(Color::DarkGray),
            ))),
            inner,
        );
        return;
    }

    let visible = inner.height as usize;
    let top = app
        .form
        .pin_idx
        .saturating_sub(visible.saturating_sub(1))
        .min(app.pins.len().saturating_sub(visible));
    let lines: Vec<Line> = app
        .pins
        .iter()
        .enumerate()
        .skip(top)
        .take(visible)
        .map(|(idx, pin)| {
            let selected = idx == app.form.pin_idx;
            let marker = if selected { "> " } else { "  " };
            let date = pin.pinned_at.format("%Y-%m-%d");
            let text = format!(
                "{marker}{} → {}  ({})  {date}",
                pin.text, pin.translation, pin.context
            );
            let style = if selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(Span::styled(
                truncate_width(&text, inner.width as usize),
                style,
            ))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Truncate a string to a display width, appending an ellipsis when cut.
fn truncate_width(s: &str, max: usize) -> String {
    use unicode_width::UnicodeWidthChar;
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tooltip_sits_below_the_selection() {
        let viewport = Rect::new(0, 0, 80, 24);
        let anchor = Rect::new(10, 5, 6, 1);
        let rect = place_tooltip(anchor, 20, 5, viewport);
        assert_eq!(rect.x, 10);
        assert_eq!(rect.y, 5 + 1 + TOOLTIP_OFFSET);
    }

    #[test]
    fn test_tooltip_shifts_left_at_right_edge() {
        let viewport = Rect::new(0, 0, 80, 24);
        let anchor = Rect::new(70, 5, 6, 1);
        let rect = place_tooltip(anchor, 20, 5, viewport);
        // Aligned with the selection's right edge
        assert_eq!(rect.x + rect.width, anchor.x + anchor.width);
        assert!(rect.x + rect.width <= 80);
    }

    #[test]
    fn test_tooltip_flips_above_at_bottom_edge() {
        let viewport = Rect::new(0, 0, 80, 24);
        let anchor = Rect::new(10, 22, 6, 1);
        let rect = place_tooltip(anchor, 20, 5, viewport);
        assert_eq!(rect.y + rect.height + TOOLTIP_OFFSET, anchor.y);
    }

    #[test]
    fn test_tooltip_never_leaves_the_viewport() {
        let viewport = Rect::new(0, 0, 30, 10);
        let anchor = Rect::new(29, 0, 1, 1);
        let rect = place_tooltip(anchor, 28, 8, viewport);
        assert!(rect.x + rect.width <= 30);
        assert!(rect.y + rect.height <= 10);
    }

    #[test]
    fn test_truncate_width() {
        assert_eq!(truncate_width("short", 10), "short");
        let cut = truncate_width("a rather long label", 8);
        assert!(cut.ends_with('…'));
        assert!(cut.width() <= 8);
    }
}

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, ImageField, InputMode, Mode, Phase};
use crate::state::{Message, Sender};

/// Convert `**bold**` markers to styled spans; everything else renders raw.
/// The assistant is instructed to answer in markdown, and bold is the only
/// decoration worth reproducing in a terminal transcript.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let pieces: Vec<&str> = text.split("**").collect();
    if pieces.len() % 2 == 0 {
        // Unbalanced markers, render the line untouched
        return Line::from(Span::raw(text.to_string()));
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    for (i, piece) in pieces.iter().enumerate() {
        if piece.is_empty() {
            continue;
        }
        if i % 2 == 1 {
            spans.push(Span::styled(
                (*piece).to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::raw((*piece).to_string()));
        }
    }
    Line::from(spans)
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

    match app.mode {
        Mode::Chat => render_chat_screen(app, frame, body_area),
        Mode::Image => render_image_screen(app, frame, body_area),
        Mode::Complex => render_complex_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " Asistente Experto Sony FX2 ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::raw(" "),
    ];

    for (i, mode) in Mode::all().into_iter().enumerate() {
        let label = format!(" [{}] {} ", i + 1, mode.title());
        let style = if mode == app.mode {
            Style::default().fg(Color::Black).bg(Color::Blue).bold()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = match app.input_mode {
        InputMode::Normal => {
            "Tab: cambiar modo │ i/Enter: escribir │ j/k: desplazar │ C: nueva conversación │ q: salir"
        }
        InputMode::Editing => {
            if app.mode == Mode::Image {
                "Enter: cargar/enviar │ Tab: cambiar campo │ Esc: terminar edición"
            } else {
                "Enter: enviar │ Esc: terminar edición"
            }
        }
    };

    let mut spans = vec![Span::styled(
        format!(" {hints}"),
        Style::default().fg(Color::DarkGray),
    )];
    if app.is_busy() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            busy_label(app.mode, app.animation_frame),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn busy_label(mode: Mode, frame: u8) -> String {
    let dots = ".".repeat(frame as usize + 1);
    match mode {
        Mode::Chat => format!("Pensando{dots}"),
        Mode::Image => format!("Analizando{dots}"),
        Mode::Complex => format!("Pensando{dots} esto puede tardar un momento."),
    }
}

// --- Chat -----------------------------------------------------------------

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [transcript_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Remember the drawn size for scroll-to-bottom calculations
    app.chat.area_height = transcript_area.height.saturating_sub(2);
    app.chat.area_width = transcript_area.width.saturating_sub(2);

    let mut lines: Vec<Line> = Vec::new();
    for message in app.chat.conversation.messages() {
        lines.extend(message_lines(message));
        lines.push(Line::default());
    }

    if app.chat.phase == Phase::Sending {
        lines.push(Line::from(Span::styled(
            "FX2:",
            Style::default().fg(Color::Blue).bold(),
        )));
        lines.push(Line::from(Span::styled(
            busy_label(Mode::Chat, app.animation_frame),
            Style::default().fg(Color::DarkGray),
        )));
    }

    if let Some(error) = &app.chat.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    let transcript = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Conversación "))
        .wrap(Wrap { trim: false })
        .scroll((app.chat.scroll, 0));
    frame.render_widget(transcript, transcript_area);

    render_input_line(
        frame,
        input_area,
        &app.chat.input,
        app.chat.cursor,
        "Pregunta sobre tu Sony FX2...",
        app.input_mode == InputMode::Editing,
    );
}

fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, style) = match message.sender {
        Sender::User => ("Tú:", Style::default().fg(Color::Cyan).bold()),
        Sender::Assistant => ("FX2:", Style::default().fg(Color::Blue).bold()),
    };
    lines.push(Line::from(Span::styled(label, style)));

    for line in message.text.lines() {
        lines.push(parse_markdown_line(line));
    }

    if !message.sources.is_empty() {
        lines.push(Line::from(Span::styled(
            "Fuentes:",
            Style::default().fg(Color::DarkGray).bold(),
        )));
        for (i, source) in message.sources.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  [{}] {} ", i + 1, source.title),
                    Style::default().fg(Color::Blue),
                ),
                Span::styled(source.uri.clone(), Style::default().fg(Color::DarkGray)),
            ]));
        }
    }

    lines
}

// --- Image ----------------------------------------------------------------

fn render_image_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [left_area, right_area] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);

    let [path_area, question_area, attachment_area, error_area, hint_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(2),
        Constraint::Min(0),
    ])
    .areas(left_area);

    let editing = app.input_mode == InputMode::Editing;
    render_titled_input(
        frame,
        path_area,
        " Ruta de la imagen ",
        &app.image.path_input,
        app.image.path_cursor,
        "Escribe la ruta y pulsa Enter",
        editing && app.image.field == ImageField::Path,
    );
    render_titled_input(
        frame,
        question_area,
        " Pregunta ",
        &app.image.question_input,
        app.image.question_cursor,
        "¿Qué ajuste está resaltado en esta pantalla de menú?",
        editing && app.image.field == ImageField::Question,
    );

    let attachment_line = match &app.image.attachment {
        Some(attachment) => Line::from(Span::styled(
            format!(
                "✔ {} ({}, {})",
                attachment.file_name,
                attachment.mime_type,
                attachment.size_label()
            ),
            Style::default().fg(Color::Green),
        )),
        None => Line::from(Span::styled(
            "Sube una imagen",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(
        Paragraph::new(attachment_line)
            .block(Block::default().borders(Borders::ALL).title(" Imagen ")),
        attachment_area,
    );

    if let Some(error) = &app.image.error {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )))
            .wrap(Wrap { trim: false }),
            error_area,
        );
    }

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "PNG, JPG, WEBP hasta 4MB",
            Style::default().fg(Color::DarkGray),
        ))),
        hint_area,
    );

    let body: Vec<Line> = if app.image.phase == Phase::Sending {
        vec![Line::from(Span::styled(
            busy_label(Mode::Image, app.animation_frame),
            Style::default().fg(Color::DarkGray),
        ))]
    } else if let Some(response) = &app.image.response {
        response.lines().map(parse_markdown_line).collect()
    } else {
        vec![Line::from(Span::styled(
            "Los resultados del análisis aparecerán aquí.",
            Style::default().fg(Color::DarkGray),
        ))]
    };

    let analysis = Paragraph::new(body)
        .block(Block::default().borders(Borders::ALL).title(" Análisis "))
        .wrap(Wrap { trim: false })
        .scroll((app.image.scroll, 0));
    frame.render_widget(analysis, right_area);
}

// --- Complex --------------------------------------------------------------

fn render_complex_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [intro_area, input_area, error_area, response_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(area);

    let intro = Paragraph::new(vec![
        Line::from(Span::styled(
            "Modo de Pensamiento Pro",
            Style::default().fg(Color::Blue).bold(),
        )),
        Line::from(Span::styled(
            "Para tus preguntas más complejas. Pide configuraciones completas de escenas, consejos de flujo de trabajo o comparaciones creativas.",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .wrap(Wrap { trim: false });
    frame.render_widget(intro, intro_area);

    render_titled_input(
        frame,
        input_area,
        " Consulta ",
        &app.complex.input,
        app.complex.cursor,
        "Describe un escenario complejo...",
        app.input_mode == InputMode::Editing,
    );

    if let Some(error) = &app.complex.error {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            ))),
            error_area,
        );
    }

    let body: Vec<Line> = if app.complex.phase == Phase::Sending {
        vec![Line::from(Span::styled(
            busy_label(Mode::Complex, app.animation_frame),
            Style::default().fg(Color::DarkGray),
        ))]
    } else if let Some(response) = &app.complex.response {
        response.lines().map(parse_markdown_line).collect()
    } else {
        vec![Line::from(Span::styled(
            "Tu respuesta detallada aparecerá aquí.",
            Style::default().fg(Color::DarkGray),
        ))]
    };

    let response = Paragraph::new(body)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Respuesta del Experto "),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.complex.scroll, 0));
    frame.render_widget(response, response_area);
}

// --- Shared input rendering ----------------------------------------------

fn render_input_line(
    frame: &mut Frame,
    area: Rect,
    input: &str,
    cursor: usize,
    placeholder: &str,
    focused: bool,
) {
    render_titled_input(frame, area, " Mensaje ", input, cursor, placeholder, focused);
}

fn render_titled_input(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    input: &str,
    cursor: usize,
    placeholder: &str,
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Blue)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let content = if input.is_empty() && !focused {
        Line::from(Span::styled(
            placeholder.to_string(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(Span::raw(input.to_string()))
    };

    frame.render_widget(
        Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        ),
        area,
    );

    if focused {
        let inner_width = area.width.saturating_sub(2) as usize;
        let cursor_x = area.x + 1 + cursor.min(inner_width) as u16;
        frame.set_cursor_position((cursor_x, area.y + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_markers_become_bold_spans() {
        let line = parse_markdown_line("Pulsa **MENU** y entra");
        assert_eq!(line.spans.len(), 3);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[1].content, "MENU");
    }

    #[test]
    fn unbalanced_markers_render_raw() {
        let line = parse_markdown_line("Pulsa **MENU");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "Pulsa **MENU");
    }
}

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, ImageField, InputMode, Mode};
use crate::tui::AppEvent;

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
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Mode switching
        KeyCode::Tab => app.mode = app.mode.next(),
        KeyCode::Char('1') => app.mode = Mode::Chat,
        KeyCode::Char('2') => app.mode = Mode::Image,
        KeyCode::Char('3') => app.mode = Mode::Complex,

        // Focus the input
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            match app.mode {
                Mode::Chat => app.chat.cursor = app.chat.input.chars().count(),
                Mode::Image => match app.image.field {
                    ImageField::Path => {
                        app.image.path_cursor = app.image.path_input.chars().count();
                    }
                    ImageField::Question => {
                        app.image.question_cursor = app.image.question_input.chars().count();
                    }
                },
                Mode::Complex => app.complex.cursor = app.complex.input.chars().count(),
            }
        }

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => match app.mode {
            Mode::Chat => app.chat.scroll = app.chat.scroll.saturating_add(1),
            Mode::Image => app.image.scroll = app.image.scroll.saturating_add(1),
            Mode::Complex => app.complex.scroll = app.complex.scroll.saturating_add(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.mode {
            Mode::Chat => app.chat.scroll = app.chat.scroll.saturating_sub(1),
            Mode::Image => app.image.scroll = app.image.scroll.saturating_sub(1),
            Mode::Complex => app.complex.scroll = app.complex.scroll.saturating_sub(1),
        },
        KeyCode::Char('g') => match app.mode {
            Mode::Chat => app.chat.scroll = 0,
            Mode::Image => app.image.scroll = 0,
            Mode::Complex => app.complex.scroll = 0,
        },
        KeyCode::Char('G') => {
            if app.mode == Mode::Chat {
                app.scroll_chat_to_bottom();
            }
        }

        // Start the conversation over (chat only)
        KeyCode::Char('C') => {
            if app.mode == Mode::Chat && app.chat.phase == crate::app::Phase::Idle {
                app.chat.conversation.clear();
                app.chat.conversation.push_assistant(crate::app::GREETING, Vec::new());
                app.chat.scroll = 0;
                app.chat.error = None;
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }

        // In image mode, Tab moves between the path and question fields
        KeyCode::Tab => {
            if app.mode == Mode::Image {
                app.image.field = match app.image.field {
                    ImageField::Path => ImageField::Question,
                    ImageField::Question => ImageField::Path,
                };
            }
        }

        KeyCode::Enter => match app.mode {
            Mode::Chat => app.submit_chat(),
            Mode::Image => match app.image.field {
                ImageField::Path => app.load_image(),
                ImageField::Question => app.submit_image(),
            },
            Mode::Complex => app.submit_complex(),
        },

        KeyCode::Backspace => {
            let (input, cursor) = active_input(app);
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let (input, cursor) = active_input(app);
            let char_count = input.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            let (_, cursor) = active_input(app);
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let (input, cursor) = active_input(app);
            let char_count = input.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            let (_, cursor) = active_input(app);
            *cursor = 0;
        }
        KeyCode::End => {
            let (input, cursor) = active_input(app);
            *cursor = input.chars().count();
        }
        KeyCode::Char(c) => {
            let (input, cursor) = active_input(app);
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

/// The input field the current mode (and image-mode field) is editing.
fn active_input(app: &mut App) -> (&mut String, &mut usize) {
    match app.mode {
        Mode::Chat => (&mut app.chat.input, &mut app.chat.cursor),
        Mode::Image => match app.image.field {
            ImageField::Path => (&mut app.image.path_input, &mut app.image.path_cursor),
            ImageField::Question => (
                &mut app.image.question_input,
                &mut app.image.question_cursor,
            ),
        },
        Mode::Complex => (&mut app.complex.input, &mut app.complex.cursor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Phase;
    use crate::config::Config;
    use crate::gemini::{RawResponse, Request, Transport, TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct HangingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for HangingTransport {
        async fn send(&self, _request: &Request) -> Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> (App, Arc<HangingTransport>) {
        let transport = Arc::new(HangingTransport {
            calls: AtomicUsize::new(0),
        });
        (App::new(&Config::default(), transport.clone()), transport)
    }

    #[tokio::test]
    async fn typing_goes_into_the_active_input() {
        let (mut app, _) = app();

        handle_key(&mut app, key(KeyCode::Enter)); // focus input
        for c in "¿S-Log3?".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }

        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.chat.input, "¿S-Log3?");
        assert_eq!(app.chat.cursor, 8);
    }

    #[tokio::test]
    async fn rapid_enter_presses_submit_exactly_once() {
        let (mut app, transport) = app();

        handle_key(&mut app, key(KeyCode::Enter));
        for c in "hola".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        for _ in 0..5 {
            handle_key(&mut app, key(KeyCode::Enter));
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(app.chat.phase, Phase::Sending);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tab_cycles_modes_in_normal_mode() {
        let (mut app, _) = app();

        assert_eq!(app.mode, Mode::Chat);
        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.mode, Mode::Image);
        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.mode, Mode::Complex);
        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.mode, Mode::Chat);
    }

    #[tokio::test]
    async fn tab_switches_image_fields_while_editing() {
        let (mut app, _) = app();

        app.mode = Mode::Image;
        handle_key(&mut app, key(KeyCode::Enter)); // focus input
        assert_eq!(app.image.field, ImageField::Path);
        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.image.field, ImageField::Question);
    }

    #[tokio::test]
    async fn clearing_the_conversation_restores_the_greeting() {
        let (mut app, _) = app();

        app.chat.conversation.push_user("hola");
        handle_key(&mut app, key(KeyCode::Char('C')));

        assert_eq!(app.chat.conversation.messages().len(), 1);
        assert_eq!(app.chat.conversation.messages()[0].text, crate::app::GREETING);
    }
}

use anyhow::Result;
use ratatui::{
    DefaultTerminal,
    crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
};
use tracing::{debug, info};

use console_session::{Focus, Session, SessionController};

use crate::config::Settings;
use crate::terminal::InputReader;
use crate::view;

const PAGE_ROWS: usize = 10;

/// What the event loop should do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Ignored,
    Redraw,
    Submit,
    Quit,
}

/// Route one key press.
///
/// While a prompt is pending every printable key goes to its field; nothing
/// takes focus away from it. Scrolling works in both states.
pub fn handle_key(ctl: &mut SessionController, key: KeyEvent) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::Ignored;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => return KeyAction::Quit,
        KeyCode::PageUp => {
            ctl.surface_mut().scroll_up(PAGE_ROWS);
            return KeyAction::Redraw;
        }
        KeyCode::PageDown => {
            ctl.surface_mut().scroll_down(PAGE_ROWS);
            return KeyAction::Redraw;
        }
        KeyCode::Up if shift => {
            ctl.surface_mut().scroll_up(1);
            return KeyAction::Redraw;
        }
        KeyCode::Down if shift => {
            ctl.surface_mut().scroll_down(1);
            return KeyAction::Redraw;
        }
        KeyCode::End if ctrl => {
            ctl.surface_mut().scroll_to_bottom();
            return KeyAction::Redraw;
        }
        KeyCode::Esc | KeyCode::Tab | KeyCode::BackTab => {
            if !ctl.focus_surface() {
                debug!("focus change refused, prompt pending");
            }
            return KeyAction::Ignored;
        }
        _ => {}
    }

    if ctl.focus() != Focus::Input {
        return KeyAction::Ignored;
    }
    let Some(capture) = ctl.pending_mut() else {
        return KeyAction::Ignored;
    };

    match key.code {
        KeyCode::Enter => return KeyAction::Submit,
        KeyCode::Char('u') if ctrl => {
            capture.move_home();
            while !capture.is_empty() {
                capture.delete();
            }
        }
        KeyCode::Char('a') if ctrl => capture.move_home(),
        KeyCode::Char('e') if ctrl => capture.move_end(),
        KeyCode::Char(_) if ctrl => return KeyAction::Ignored,
        KeyCode::Char(c) => capture.insert_char(c),
        KeyCode::Backspace => capture.backspace(),
        KeyCode::Delete => capture.delete(),
        KeyCode::Left => capture.move_left(),
        KeyCode::Right => capture.move_right(),
        KeyCode::Home => capture.move_home(),
        KeyCode::End => capture.move_end(),
        _ => return KeyAction::Ignored,
    }
    KeyAction::Redraw
}

/// Insert pasted text into the pending field.
///
/// The field is a single line: only the text before the first line break is
/// taken, and a paste never submits.
pub fn handle_paste(ctl: &mut SessionController, text: &str) -> KeyAction {
    let Some(capture) = ctl.pending_mut() else {
        return KeyAction::Ignored;
    };
    let line = text.split(['\r', '\n']).next().unwrap_or_default();
    if line.is_empty() {
        return KeyAction::Ignored;
    }
    capture.insert_str(line);
    KeyAction::Redraw
}

/// Full-screen session. Returns when the operator quits or the transport
/// shuts down.
pub async fn run(terminal: &mut DefaultTerminal, mut session: Session, settings: &Settings) -> Result<()> {
    let mut input = InputReader::spawn();
    let mut tick = tokio::time::interval(settings.tick);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut dirty = true;
    let mut drawn_revision = None;

    loop {
        let revision = session.controller().surface().revision();
        if dirty || drawn_revision != Some(revision) {
            let mut max_scroll = 0;
            terminal.draw(|frame| {
                max_scroll = view::draw(frame, session.controller(), &settings.url);
            })?;
            session.controller_mut().surface_mut().clamp_scroll(max_scroll);
            drawn_revision = Some(revision);
            dirty = false;
        }

        tokio::select! {
            event = session.recv() => {
                match event {
                    Some(event) => {
                        session.apply(event);
                        dirty = true;
                    }
                    None => {
                        info!("transport ended");
                        break;
                    }
                }
            }

            Some(event) = input.recv() => {
                match event {
                    Event::Key(key) => match handle_key(session.controller_mut(), key) {
                        KeyAction::Ignored => {}
                        KeyAction::Redraw => dirty = true,
                        KeyAction::Submit => {
                            session.submit();
                            dirty = true;
                        }
                        KeyAction::Quit => {
                            info!("operator quit");
                            break;
                        }
                    },
                    Event::Paste(text) => {
                        if handle_paste(session.controller_mut(), &text) == KeyAction::Redraw {
                            dirty = true;
                        }
                    }
                    Event::Resize(..) => dirty = true,
                    _ => {}
                }
            }

            // Periodic redraw keeps the status bar current
            _ = tick.tick() => dirty = true,
        }
    }

    drop(input);
    session.stop().await;
    Ok(())
}

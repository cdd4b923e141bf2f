//! Line mode for pipes and scripts.
//!
//! Session output goes to stdout as plain text, one line per surface line.
//! Each prompt is answered with the next line read from stdin; once stdin is
//! exhausted the next prompt ends the session.

use anyhow::Result;
use std::collections::VecDeque;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use console_session::input_line::INPUT_CLASS;
use console_session::markup;
use console_session::{Session, SessionController};

/// A prompt written without a trailing newline, waiting for its answer.
#[derive(Debug)]
enum OpenPrompt {
    /// Written at its own surface line, which is the next one to print.
    Inline,
    /// Its line was cleared away; written after the surface content.
    Detached { prompt: String },
}

/// Tracks how much of the surface has been written out.
#[derive(Debug, Default)]
pub struct PlainPrinter {
    generation: u64,
    next: usize,
    prompt: Option<OpenPrompt>,
}

impl PlainPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write every surface line not written yet.
    ///
    /// Lines are held back from the pending prompt onwards so that the
    /// prompt can be shown inline, and its echo is not repeated once the
    /// answer is in. A prompt whose line was cleared is written after the
    /// content and written again below any output that arrives meanwhile.
    pub fn flush(&mut self, ctl: &SessionController, out: &mut impl Write) -> std::io::Result<()> {
        let surface = ctl.surface();

        if surface.generation() != self.generation {
            self.generation = surface.generation();
            self.next = 0;
            if self.prompt.take().is_some() {
                writeln!(out)?;
            }
        }

        let pending = ctl.pending();
        let pending_at = pending.and_then(|p| surface.index_of(p.line()));

        if let Some(OpenPrompt::Detached { prompt }) = &self.prompt {
            if pending.is_none() || self.next < surface.len() {
                writeln!(out)?;
                if surface
                    .lines()
                    .get(self.next)
                    .is_some_and(|line| is_echo_of(&line.content, prompt))
                {
                    self.next += 1;
                }
                self.prompt = None;
            }
        }

        let limit = pending_at.unwrap_or(surface.len());
        while self.next < limit {
            if matches!(self.prompt, Some(OpenPrompt::Inline)) {
                // The prompt line itself, already on screen
                writeln!(out)?;
                self.prompt = None;
            } else {
                let line = &surface.lines()[self.next];
                writeln!(out, "{}", markup::plain_text(&line.content))?;
            }
            self.next += 1;
        }

        if let Some(capture) = pending {
            if self.prompt.is_none() {
                write!(out, "{}", markup::plain_text(capture.prompt()))?;
                self.prompt = Some(match pending_at {
                    Some(_) => OpenPrompt::Inline,
                    None => OpenPrompt::Detached {
                        prompt: capture.prompt().to_string(),
                    },
                });
            }
        }

        out.flush()
    }
}

fn is_echo_of(content: &str, prompt: &str) -> bool {
    content
        .strip_prefix(prompt)
        .is_some_and(|rest| rest.starts_with(&format!("<span class=\"{}\">", INPUT_CLASS)))
}

pub async fn run(mut session: Session) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut answers: VecDeque<String> = VecDeque::new();
    let mut stdin_open = true;
    let mut printer = PlainPrinter::new();
    let mut stdout = std::io::stdout();

    loop {
        // Answer whatever is pending from queued input
        if session.controller().pending().is_some() {
            if let Some(answer) = answers.pop_front() {
                if let Some(capture) = session.controller_mut().pending_mut() {
                    capture.insert_str(&answer);
                }
                session.submit();
            } else if !stdin_open {
                info!("prompt with no input left, ending session");
                printer.flush(session.controller(), &mut stdout)?;
                writeln!(stdout)?;
                break;
            }
        }
        printer.flush(session.controller(), &mut stdout)?;

        tokio::select! {
            event = session.recv() => {
                match event {
                    Some(event) => session.apply(event),
                    None => {
                        info!("transport ended");
                        break;
                    }
                }
            }

            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => answers.push_back(line),
                    Ok(None) => {
                        debug!("stdin closed");
                        stdin_open = false;
                    }
                    Err(e) => {
                        debug!(error = %e, "stdin read failed");
                        stdin_open = false;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    session.stop().await;
    Ok(())
}

//! Input Capture Line
//!
//! A transient editor bound to one prompt line on the render surface. It owns
//! input focus for as long as it exists and resolves exactly once: `submit`
//! consumes the capture, so a second resolution cannot be expressed.

use crate::markup;
use crate::surface::{LineHandle, RenderSurface};

/// Character shown in place of each character of a masked value.
pub const DEFAULT_MASK_CHAR: char = '*';

/// Class of the span wrapping the operator's value in an echo line.
pub const INPUT_CLASS: &str = "input";

/// Who receives operator keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Nothing is being asked; keys only scroll or quit.
    Surface,
    /// A prompt is outstanding and traps focus until answered.
    Input,
}

/// An outstanding prompt and the value being typed for it.
#[derive(Debug)]
pub struct InputCapture {
    prompt: String,
    is_password: bool,
    buffer: String,
    /// Byte offset into `buffer`, always on a char boundary.
    cursor: usize,
    line: LineHandle,
}

impl InputCapture {
    /// Render `prompt` as a new surface line and start capturing.
    pub fn request(surface: &mut RenderSurface, prompt: impl Into<String>, is_password: bool) -> Self {
        let prompt = prompt.into();
        let line = surface.append(prompt.clone(), crate::protocol::DEFAULT_CLASS_NAME);
        Self {
            prompt,
            is_password,
            buffer: String::new(),
            cursor: 0,
            line,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn is_password(&self) -> bool {
        self.is_password
    }

    /// The surface line this capture is drawn on.
    pub fn line(&self) -> LineHandle {
        self.line
    }

    /// What the editable field shows. Never the plaintext of a password.
    pub fn display_value(&self, mask_char: char) -> String {
        if self.is_password {
            mask(&self.buffer, mask_char)
        } else {
            self.buffer.clone()
        }
    }

    /// Cursor position in characters from the start of the field.
    pub fn cursor_column(&self) -> usize {
        self.buffer[..self.cursor].chars().count()
    }

    /// Length of the typed value in characters.
    pub fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn insert_char(&mut self, c: char) {
        self.buffer.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn insert_str(&mut self, s: &str) {
        self.buffer.insert_str(self.cursor, s);
        self.cursor += s.len();
    }

    pub fn backspace(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.buffer.replace_range(prev..self.cursor, "");
            self.cursor = prev;
        }
    }

    pub fn delete(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.buffer.replace_range(self.cursor..next, "");
        }
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.cursor = next;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.buffer.len();
    }

    /// Resolve the capture.
    ///
    /// The prompt line is replaced in place by a static echo; when that line
    /// is gone (the surface was cleared meanwhile) the echo is appended
    /// instead. Returns the value exactly as typed, unmasked and untrimmed.
    pub fn submit(self, surface: &mut RenderSurface, mask_char: char) -> String {
        let shown = self.display_value(mask_char);
        let echo = echo_markup(&self.prompt, &shown);
        if !surface.replace(self.line, echo.clone()) {
            surface.append(echo, crate::protocol::DEFAULT_CLASS_NAME);
        }
        self.buffer
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.buffer[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.buffer[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
    }
}

/// A run of `mask_char` as long (in characters) as `value`.
pub fn mask(value: &str, mask_char: char) -> String {
    std::iter::repeat_n(mask_char, value.chars().count()).collect()
}

/// The static line left behind by an answered prompt.
pub fn echo_markup(prompt: &str, shown: &str) -> String {
    format!(
        "{}<span class=\"{}\">{}</span>",
        prompt,
        INPUT_CLASS,
        markup::escape(shown)
    )
}

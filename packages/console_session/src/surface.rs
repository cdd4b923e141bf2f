//! Render Surface
//!
//! An append-only, clearable sequence of display lines. The surface stores
//! server markup verbatim; turning it into something drawable is the job of
//! [`crate::markup`] and the presenter.

use crate::protocol::DEFAULT_CLASS_NAME;

/// One line of session output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub content: String,
    pub class_name: String,
}

/// Names a line returned by [`RenderSurface::append`].
///
/// Handles are tied to the surface generation they were issued in: after a
/// [`RenderSurface::clear`] every older handle is stale and is rejected
/// instead of silently pointing at a new line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineHandle {
    index: usize,
    generation: u64,
}

/// Scrollable display region.
#[derive(Debug, Default)]
pub struct RenderSurface {
    lines: Vec<DisplayLine>,
    /// Bumped on every clear.
    generation: u64,
    /// Rows scrolled back from the newest content; 0 follows the tail.
    scroll_back: usize,
    /// Bumped on every content mutation.
    revision: u64,
}

impl RenderSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and return its handle.
    pub fn append(&mut self, content: impl Into<String>, class_name: impl Into<String>) -> LineHandle {
        let mut class_name = class_name.into();
        if class_name.is_empty() {
            class_name = DEFAULT_CLASS_NAME.to_string();
        }
        self.lines.push(DisplayLine {
            content: content.into(),
            class_name,
        });
        self.touched();
        LineHandle {
            index: self.lines.len() - 1,
            generation: self.generation,
        }
    }

    /// Replace the content of an existing line, keeping its position and
    /// class. Returns `false` (and changes nothing) for a stale handle.
    pub fn replace(&mut self, handle: LineHandle, content: impl Into<String>) -> bool {
        if handle.generation != self.generation {
            return false;
        }
        let Some(line) = self.lines.get_mut(handle.index) else {
            return false;
        };
        line.content = content.into();
        self.touched();
        true
    }

    /// Unconditionally remove all content.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.generation += 1;
        self.touched();
    }

    pub fn lines(&self) -> &[DisplayLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up a line; `None` if the handle is stale.
    pub fn get(&self, handle: LineHandle) -> Option<&DisplayLine> {
        if handle.generation != self.generation {
            return None;
        }
        self.lines.get(handle.index)
    }

    /// Position of a live handle in [`Self::lines`].
    pub fn index_of(&self, handle: LineHandle) -> Option<usize> {
        self.get(handle).map(|_| handle.index)
    }

    /// Number of clears performed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll_back = self.scroll_back.saturating_add(rows);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(rows);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_back = 0;
    }

    /// Cap the scrollback at what the presenter can actually show.
    pub fn clamp_scroll(&mut self, max_rows: usize) {
        self.scroll_back = self.scroll_back.min(max_rows);
    }

    fn touched(&mut self) {
        self.scroll_back = 0;
        self.revision += 1;
    }
}

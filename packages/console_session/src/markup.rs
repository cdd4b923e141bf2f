//! Markup presenter
//!
//! Server content is a small HTML dialect: `<span class="..">`,
//! `<div class="..">`, `<br>`, inline `style="color: #rrggbb"`, and
//! character entities. Content is trusted as sent; this module only decides
//! how it looks. Tags never execute anything, unknown tags are dropped, and C0
//! control characters (other than tab and newline) are removed so that no
//! escape sequence ever reaches the operator's terminal.

/// 24-bit colour taken from an inline `color:` declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// Outermost first; the line's own class is always the first entry.
    pub classes: Vec<String>,
    pub color: Option<Rgb>,
}

impl Segment {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// One visual row. `<br>`, block elements and newlines start a new row.
pub type Row = Vec<Segment>;

const TAB: &str = "    ";

struct Scope {
    tag: String,
    classes: Vec<String>,
    color: Option<Rgb>,
}

struct Builder {
    rows: Vec<Row>,
    current: Row,
    text: String,
    stack: Vec<Scope>,
    base_class: String,
    /// A block element closed; break before any further text.
    pending_break: bool,
}

impl Builder {
    fn new(base_class: &str) -> Self {
        Self {
            rows: Vec::new(),
            current: Vec::new(),
            text: String::new(),
            stack: Vec::new(),
            base_class: base_class.to_string(),
            pending_break: false,
        }
    }

    fn push_char(&mut self, c: char) {
        if c == '\n' {
            self.pending_break = false;
            self.break_row();
            return;
        }
        if self.pending_break {
            self.pending_break = false;
            self.break_row();
        }
        match c {
            '\t' => self.text.push_str(TAB),
            c if c.is_control() => {}
            c => self.text.push(c),
        }
    }

    fn flush(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        let mut classes = vec![self.base_class.clone()];
        classes.extend(self.stack.iter().flat_map(|s| s.classes.iter().cloned()));
        let color = self.stack.iter().rev().find_map(|s| s.color);

        if let Some(last) = self.current.last_mut() {
            if last.classes == classes && last.color == color {
                last.text.push_str(&text);
                return;
            }
        }
        self.current.push(Segment {
            text,
            classes,
            color,
        });
    }

    fn break_row(&mut self) {
        self.flush();
        self.rows.push(std::mem::take(&mut self.current));
    }

    fn open(&mut self, tag: &str, attrs: &str) {
        self.flush();
        if is_block(tag) && !self.current.is_empty() {
            self.pending_break = false;
            self.break_row();
        }
        let mut classes = Vec::new();
        let mut color = None;
        for (name, value) in attributes(attrs) {
            match name.as_str() {
                "class" => classes.extend(value.split_whitespace().map(str::to_string)),
                "style" => color = style_color(&value),
                _ => {}
            }
        }
        self.stack.push(Scope {
            tag: tag.to_string(),
            classes,
            color,
        });
    }

    fn close(&mut self, tag: &str) {
        let Some(pos) = self.stack.iter().rposition(|s| s.tag == tag) else {
            return;
        };
        self.flush();
        self.stack.truncate(pos);
        if is_block(tag) {
            self.pending_break = true;
        }
    }

    fn finish(mut self) -> Vec<Row> {
        self.flush();
        self.rows.push(self.current);
        self.rows
    }
}

fn is_block(tag: &str) -> bool {
    matches!(tag, "div" | "p")
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "br" | "hr" | "img" | "input" | "meta" | "link" | "wbr")
}

/// Parse one line of markup into visual rows.
pub fn parse(markup: &str, base_class: &str) -> Vec<Row> {
    let mut out = Builder::new(base_class);
    let mut rest = markup;

    while let Some(c) = rest.chars().next() {
        match c {
            '<' => match rest.find('>') {
                Some(end) => {
                    handle_tag(&mut out, &rest[1..end]);
                    rest = &rest[end + 1..];
                }
                None => {
                    out.push_char('<');
                    rest = &rest[1..];
                }
            },
            '&' => match decode_entity(rest) {
                Some((decoded, used)) => {
                    out.push_char(decoded);
                    rest = &rest[used..];
                }
                None => {
                    out.push_char('&');
                    rest = &rest[1..];
                }
            },
            c => {
                out.push_char(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    out.finish()
}

fn handle_tag(out: &mut Builder, body: &str) {
    let body = body.trim();
    if body.starts_with('!') || body.starts_with('?') {
        return;
    }
    if let Some(name) = body.strip_prefix('/') {
        out.close(&name.trim().to_ascii_lowercase());
        return;
    }

    let self_closing = body.ends_with('/');
    let body = body.trim_end_matches('/');
    let (name, attrs) = match body.find(char::is_whitespace) {
        Some(split) => (&body[..split], &body[split..]),
        None => (body, ""),
    };
    let name = name.to_ascii_lowercase();
    if name.is_empty() {
        return;
    }

    if name == "br" {
        out.break_row();
    } else if !self_closing && !is_void(&name) {
        out.open(&name, attrs);
    }
}

/// `name="value"`, `name='value'`, `name=value` and bare `name` attributes.
fn attributes(attrs: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = attrs.trim_start();

    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let mut value = String::new();
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let inner = &after_eq[1..];
                    let close = inner.find(q).unwrap_or(inner.len());
                    value = inner[..close].to_string();
                    rest = inner.get(close + 1..).unwrap_or("");
                }
                _ => {
                    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                    value = after_eq[..end].to_string();
                    rest = &after_eq[end..];
                }
            }
        }

        if !name.is_empty() {
            out.push((name, value));
        }
        rest = rest.trim_start();
    }
    out
}

fn style_color(style: &str) -> Option<Rgb> {
    style.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("color") {
            parse_hex_color(value.trim())
        } else {
            None
        }
    })
}

fn parse_hex_color(value: &str) -> Option<Rgb> {
    let hex = value.strip_prefix('#')?;
    let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    match hex.len() {
        3 => Some(Rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
        6 => {
            let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
            Some(Rgb(byte(0)?, byte(2)?, byte(4)?))
        }
        _ => None,
    }
}

/// Decode an entity at the start of `s`; returns the char and bytes consumed.
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let window = s.char_indices().nth(12).map_or(s.len(), |(i, _)| i);
    let end = s[..window].find(';')?;
    let name = &s[1..end];
    let decoded = match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" | "#39" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some((decoded, end + 1))
}

/// The text an operator would see, rows joined with `\n`.
pub fn plain_text(markup: &str) -> String {
    parse(markup, "")
        .iter()
        .map(|row| row.iter().map(|s| s.text.as_str()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape operator-supplied text so it can be embedded in markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

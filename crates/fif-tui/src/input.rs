//! Single-line text input with emacs-style editing

use crossterm::event::{KeyCode, KeyModifiers};

/// What a key did to the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// The text changed
    Changed,
    /// Handled, text unchanged
    Consumed,
    /// The key isn't an editing key
    Ignored,
}

/// Text plus a cursor, kept as a byte offset on a char boundary
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextInput {
    text: String,
    cursor: usize,
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the text and put the cursor at the end
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
    }

    /// Text before the cursor, the char under it, and the rest
    pub fn split_at_cursor(&self) -> (&str, Option<char>, &str) {
        let (before, after) = self.text.split_at(self.cursor);
        let mut chars = after.chars();
        let at = chars.next();
        (before, at, chars.as_str())
    }

    /// Display width up to the cursor
    pub fn cursor_column(&self) -> usize {
        unicode_width::UnicodeWidthStr::width(&self.text[..self.cursor])
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn delete_char_before(&mut self) -> bool {
        let prev = self.prev_boundary();
        if prev == self.cursor {
            return false;
        }
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
        true
    }

    pub fn delete_char_at(&mut self) -> bool {
        let next = self.next_boundary();
        if next == self.cursor {
            return false;
        }
        self.text.drain(self.cursor..next);
        true
    }

    pub fn delete_word_before(&mut self) -> bool {
        let start = self.word_start();
        if start == self.cursor {
            return false;
        }
        self.text.drain(start..self.cursor);
        self.cursor = start;
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.text.is_empty() {
            return false;
        }
        self.text.clear();
        self.cursor = 0;
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.prev_boundary();
    }

    pub fn move_right(&mut self) {
        self.cursor = self.next_boundary();
    }

    pub fn move_word_left(&mut self) {
        self.cursor = self.word_start();
    }

    pub fn move_word_right(&mut self) {
        let rest = &self.text[self.cursor..];
        let skipped = rest.len() - rest.trim_start_matches(is_word_boundary).len();
        let word = rest[skipped..]
            .find(is_word_boundary)
            .unwrap_or(rest.len() - skipped);
        self.cursor += skipped + word;
    }

    /// Apply a key. Navigation keys of the surrounding screen (Up/Down,
    /// Enter, Tab, Ctrl+J/K) are the caller's and must be handled first.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Edit {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        // macOS Option may report as SUPER
        let word = modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER);

        let changed = match code {
            KeyCode::Char('u') if ctrl => self.clear(),
            KeyCode::Char('w') if ctrl => self.delete_word_before(),
            KeyCode::Char('h') if ctrl => self.delete_char_before(),
            KeyCode::Char('d') if ctrl => self.delete_char_at(),
            KeyCode::Backspace if word => self.delete_word_before(),
            KeyCode::Backspace => self.delete_char_before(),
            KeyCode::Delete => self.delete_char_at(),
            KeyCode::Char(c) if !ctrl && !word => {
                self.insert_char(c);
                true
            }
            _ => {
                return if self.move_cursor(code, ctrl, word) {
                    Edit::Consumed
                } else {
                    Edit::Ignored
                };
            }
        };
        if changed { Edit::Changed } else { Edit::Consumed }
    }

    fn move_cursor(&mut self, code: KeyCode, ctrl: bool, word: bool) -> bool {
        match code {
            KeyCode::Char('a') if ctrl => self.cursor = 0,
            KeyCode::Char('e') if ctrl => self.cursor = self.text.len(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.text.len(),
            KeyCode::Char('b') if word => self.move_word_left(),
            KeyCode::Char('f') if word => self.move_word_right(),
            KeyCode::Left if word || ctrl => self.move_word_left(),
            KeyCode::Right if word || ctrl => self.move_word_right(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            _ => return false,
        }
        true
    }

    fn prev_boundary(&self) -> usize {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map_or(0, |(i, _)| i)
    }

    fn next_boundary(&self) -> usize {
        self.text[self.cursor..]
            .chars()
            .next()
            .map_or(self.cursor, |c| self.cursor + c.len_utf8())
    }

    /// Start of the word before the cursor, skipping trailing separators
    fn word_start(&self) -> usize {
        let before = self.text[..self.cursor].trim_end_matches(is_word_boundary);
        before
            .rfind(is_word_boundary)
            .map_or(0, |i| i + before[i..].chars().next().map_or(1, char::len_utf8))
    }
}

/// Whitespace and path separators split words
fn is_word_boundary(c: char) -> bool {
    c.is_whitespace() || c == '/'
}

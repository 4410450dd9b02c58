use crate::session::ChatView;
use crate::state::Turn;

/// One node of the visible conversation
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Turn(Turn),
    /// Animated placeholder shown while a reply is pending
    TypingIndicator,
}

/// The text box the user types queries into
#[derive(Debug, Clone)]
pub struct InputField {
    text: String,
    cursor: usize, // in chars, not bytes
    enabled: bool,
    focused: bool,
}

impl Default for InputField {
    fn default() -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            enabled: true,
            focused: true,
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl InputField {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Replace the contents programmatically (suggestions). Works even when
    /// disabled, like assigning a disabled input's value.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    // Editing is ignored while the field is disabled

    pub fn insert(&mut self, c: char) {
        if !self.enabled {
            return;
        }
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if !self.enabled || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if !self.enabled || self.cursor >= self.text.chars().count() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(byte_pos);
    }

    pub fn move_left(&mut self) {
        if self.enabled {
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    pub fn move_right(&mut self) {
        if self.enabled {
            self.cursor = (self.cursor + 1).min(self.text.chars().count());
        }
    }

    pub fn move_home(&mut self) {
        if self.enabled {
            self.cursor = 0;
        }
    }

    pub fn move_end(&mut self) {
        if self.enabled {
            self.cursor = self.text.chars().count();
        }
    }
}

/// In-memory conversation view: the model the terminal UI draws from and
/// the view the one-shot CLI and tests read back.
#[derive(Debug, Clone)]
pub struct ChatLog {
    entries: Vec<LogEntry>,
    welcome_visible: bool,
    query_count: u64,
    scroll_requested: bool,
    pub input: InputField,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            welcome_visible: true,
            query_count: 0,
            scroll_requested: false,
            input: InputField::default(),
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.entries.iter().filter_map(|entry| match entry {
            LogEntry::Turn(turn) => Some(turn),
            LogEntry::TypingIndicator => None,
        })
    }

    pub fn is_welcome_visible(&self) -> bool {
        self.welcome_visible
    }

    pub fn has_typing_indicator(&self) -> bool {
        self.entries.contains(&LogEntry::TypingIndicator)
    }

    pub fn query_count(&self) -> u64 {
        self.query_count
    }

    /// Returns true once after each append, telling the renderer to jump to
    /// the newest entry.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    fn push(&mut self, entry: LogEntry) {
        self.welcome_visible = false;
        self.entries.push(entry);
        self.scroll_requested = true;
    }
}

impl ChatView for ChatLog {
    fn append_turn(&mut self, turn: Turn) {
        self.push(LogEntry::Turn(turn));
    }

    fn show_typing_indicator(&mut self) {
        if !self.has_typing_indicator() {
            self.entries.push(LogEntry::TypingIndicator);
            self.scroll_requested = true;
        }
    }

    fn remove_typing_indicator(&mut self) {
        self.entries.retain(|entry| *entry != LogEntry::TypingIndicator);
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.input.enabled = enabled;
    }

    fn clear_input(&mut self) {
        self.input.clear();
    }

    fn focus_input(&mut self) {
        self.input.focused = true;
    }

    fn set_query_count(&mut self, count: u64) {
        self.query_count = count;
    }
}

//! Character-level SQL script lexer.
//!
//! # Responsibility
//! - Track quoting and comment context one character at a time.
//! - Tell the caller what to do with each character: keep it, replace it
//!   with a separator, drop it, or end the current statement.
//!
//! # Invariants
//! - Characters inside quotes are always kept verbatim.
//! - Characters inside comments are never kept.
//! - Block comments do not nest; the first `*/` closes.
//!
//! The lexer targets simple sequential DDL/DML scripts. It has no notion of
//! trigger or procedure bodies, so a `;` inside `BEGIN ... END` ends a
//! statement.

/// Lexer context for the character being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    Normal,
    DoubleQuote,
    SingleQuote,
    BlockComment,
    LineComment,
}

/// What the caller should do with one scanned character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexAction {
    /// Keep the character. `quoted` is true inside a literal or identifier.
    Keep { ch: char, quoted: bool },
    /// Insert a single separator space, unless the output already ends in
    /// whitespace.
    Separator,
    /// A comment just opened: drop the previously kept character (the `/` or
    /// `-` that started it).
    Retract,
    /// Discard the character.
    Skip,
    /// Unquoted `;`: the current statement is complete.
    Terminate,
}

/// Five-state scanner with one character of lookback, shared by statement
/// splitting and placeholder counting.
#[derive(Debug, Clone)]
pub struct Lexer {
    state: LexState,
    previous: Option<char>,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexer {
    /// Starts in [`LexState::Normal`] with no lookback character.
    pub fn new() -> Self {
        Self {
            state: LexState::Normal,
            previous: None,
        }
    }

    /// Context the next character will be scanned in.
    pub fn state(&self) -> LexState {
        self.state
    }

    /// Advances the lexer by one character.
    pub fn feed(&mut self, ch: char) -> LexAction {
        let previous = self.previous.replace(ch);
        match self.state {
            LexState::Normal => self.feed_normal(ch, previous),
            LexState::DoubleQuote => {
                if ch == '"' {
                    self.state = LexState::Normal;
                }
                LexAction::Keep { ch, quoted: true }
            }
            // A doubled quote closes here and the second quote reopens from
            // Normal, so no character of `'it''s'` is ever scanned unquoted.
            LexState::SingleQuote => {
                if ch == '\'' {
                    self.state = LexState::Normal;
                }
                LexAction::Keep { ch, quoted: true }
            }
            LexState::BlockComment => {
                if ch == '/' && previous == Some('*') {
                    self.state = LexState::Normal;
                    self.previous = None;
                    return LexAction::Separator;
                }
                LexAction::Skip
            }
            LexState::LineComment => {
                if matches!(ch, '\n' | '\r') {
                    self.state = LexState::Normal;
                    return LexAction::Separator;
                }
                LexAction::Skip
            }
        }
    }

    fn feed_normal(&mut self, ch: char, previous: Option<char>) -> LexAction {
        match ch {
            '"' => {
                self.state = LexState::DoubleQuote;
                LexAction::Keep { ch, quoted: true }
            }
            '\'' => {
                self.state = LexState::SingleQuote;
                LexAction::Keep { ch, quoted: true }
            }
            '*' if previous == Some('/') => {
                self.state = LexState::BlockComment;
                // `/*/` must not read as open-then-close.
                self.previous = None;
                LexAction::Retract
            }
            '-' if previous == Some('-') => {
                self.state = LexState::LineComment;
                LexAction::Retract
            }
            ';' => LexAction::Terminate,
            ch if is_line_whitespace(ch) => LexAction::Separator,
            ch => LexAction::Keep { ch, quoted: false },
        }
    }
}

/// Newlines, carriage returns and tabs; collapsed to one space in Normal state.
fn is_line_whitespace(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\t')
}

//! Greedy longest-match tokenizer
//!
//! The tokenizer pulls code points from a [`CharReader`], matches them
//! against the runtime-mutable [`TokenTrie`], and shapes everything between
//! token matches into `Data` tokens according to the active
//! [`WhitespaceMode`].
//!
//! Break handling (`Trim`/`Collapse` only): newline runs are buffered and
//! collapsed into exactly one of `Newline` (one break), `Paragraph` (two
//! breaks separated only by whitespace) or `Section` (three or more), emitted
//! lazily when content resumes. The new line's leading whitespace is then
//! compared against the indentation stack, producing `Indent` or one `Dedent`
//! per closed level. In `Preserve` mode no special tokens are produced and
//! line breaks are plain data.
//!
//! A backslash escapes the next code point into literal data. With command
//! recognition enabled (the OSML surface turns it on), a backslash followed
//! by an identifier character or an annotation marker instead yields a
//! command-intro token and leaves the name in the stream for the surface to
//! read directly.

use crate::tokens::trie::TokenTrie;
use crate::tokens::{
    Token, TokenId, WhitespaceMode, TOKEN_COMMAND_INTRO, TOKEN_DATA, TOKEN_DEDENT, TOKEN_INDENT,
    TOKEN_NEWLINE, TOKEN_PARAGRAPH, TOKEN_SECTION,
};
use osml_core::source::{CharReader, SourceRange};
use std::collections::VecDeque;

/// Accumulates a run of data characters, applying a whitespace mode while
/// keeping the covered byte range exact.
#[derive(Debug)]
pub struct DataAccumulator {
    mode: WhitespaceMode,
    content: String,
    /// Whitespace seen after content, not yet committed (dropped if trailing).
    held_ws: String,
    held_ws_end: usize,
    start: Option<usize>,
    end: usize,
}

impl DataAccumulator {
    pub fn new(mode: WhitespaceMode) -> Self {
        DataAccumulator {
            mode,
            content: String::new(),
            held_ws: String::new(),
            held_ws_end: 0,
            start: None,
            end: 0,
        }
    }

    pub fn mode(&self) -> WhitespaceMode {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Add one code point covering `[char_start, char_end)`.
    pub fn append(&mut self, c: char, char_start: usize, char_end: usize) {
        match self.mode {
            WhitespaceMode::Preserve => {
                if self.start.is_none() {
                    self.start = Some(char_start);
                }
                self.content.push(c);
                self.end = char_end;
            }
            WhitespaceMode::Trim | WhitespaceMode::Collapse => {
                if c.is_whitespace() {
                    // Leading whitespace never starts a run.
                    if !self.content.is_empty() {
                        self.held_ws.push(c);
                        self.held_ws_end = char_end;
                    }
                } else {
                    if self.start.is_none() {
                        self.start = Some(char_start);
                    }
                    if !self.held_ws.is_empty() {
                        match self.mode {
                            WhitespaceMode::Trim => self.content.push_str(&self.held_ws),
                            _ => self.content.push(' '),
                        }
                        self.held_ws.clear();
                    }
                    self.content.push(c);
                    self.end = char_end;
                }
            }
        }
    }

    /// Take the accumulated run as a `Data` token, if any content survived
    /// the whitespace mode.
    pub fn flush(&mut self) -> Option<Token> {
        self.held_ws.clear();
        let start = self.start.take()?;
        if self.content.is_empty() {
            return None;
        }
        let content = std::mem::take(&mut self.content);
        Some(Token::new(TOKEN_DATA, content, (start..self.end).into()))
    }
}

pub struct Tokenizer<'a> {
    reader: CharReader<'a>,
    trie: TokenTrie,
    data: DataAccumulator,
    pending: VecDeque<Token>,
    recognize_commands: bool,

    // Break-run bookkeeping, used outside Preserve mode.
    content_seen: bool,
    newline_count: usize,
    break_start: Option<usize>,
    break_end: usize,
    line_ws: usize,
    line_ws_start: usize,
    indent_levels: Vec<usize>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(reader: CharReader<'a>) -> Self {
        Self::with_mode(reader, WhitespaceMode::default())
    }

    pub fn with_mode(reader: CharReader<'a>, mode: WhitespaceMode) -> Self {
        Tokenizer {
            reader,
            trie: TokenTrie::new(),
            data: DataAccumulator::new(mode),
            pending: VecDeque::new(),
            recognize_commands: false,
            content_seen: false,
            newline_count: 0,
            break_start: None,
            break_end: 0,
            line_ws: 0,
            line_ws_start: 0,
            indent_levels: Vec::new(),
        }
    }

    /// Recognize `\name`, `\<` and `\>` as command intros instead of escapes.
    pub fn set_command_recognition(&mut self, on: bool) {
        self.recognize_commands = on;
    }

    pub fn whitespace_mode(&self) -> WhitespaceMode {
        self.data.mode()
    }

    /// Switch the whitespace mode; the current data run is cut at the field
    /// boundary and delivered under the old mode.
    pub fn set_whitespace_mode(&mut self, mode: WhitespaceMode) {
        self.flush_data();
        self.data = DataAccumulator::new(mode);
    }

    pub fn register_token(&mut self, token: &str, id: TokenId) -> bool {
        self.trie.register_token(token, id)
    }

    pub fn unregister_token(&mut self, token: &str) -> bool {
        self.trie.unregister_token(token)
    }

    pub fn has_token(&self, token: &str) -> TokenId {
        self.trie.has_token(token)
    }

    /// Direct access to the underlying reader, for surfaces that read
    /// character-level syntax (command names, argument lists) themselves.
    pub fn reader_mut(&mut self) -> &mut CharReader<'a> {
        &mut self.reader
    }

    pub fn at_end(&self) -> bool {
        self.reader.at_end() && self.pending.is_empty() && self.data.is_empty()
    }

    /// Hand back a token for re-delivery on the next call.
    pub fn push_front(&mut self, token: Token) {
        self.pending.push_front(token);
    }

    fn flush_data(&mut self) {
        if let Some(t) = self.data.flush() {
            self.pending.push_back(t);
        }
    }

    fn structural(&self) -> bool {
        self.data.mode() != WhitespaceMode::Preserve
    }

    /// Emit the buffered break token and indentation changes; called when
    /// content resumes after a newline run (or at first content).
    fn resume_content(&mut self, content_off: usize) {
        if self.content_seen {
            if self.newline_count > 0 {
                let id = match self.newline_count {
                    1 => TOKEN_NEWLINE,
                    2 => TOKEN_PARAGRAPH,
                    _ => TOKEN_SECTION,
                };
                let start = self.break_start.unwrap_or(content_off);
                self.pending
                    .push_back(Token::new(id, "", (start..self.break_end).into()));
                let top = self.indent_levels.last().copied().unwrap_or(0);
                if self.line_ws > top {
                    self.indent_levels.push(self.line_ws);
                    self.pending.push_back(Token::new(
                        TOKEN_INDENT,
                        "",
                        (self.line_ws_start..content_off).into(),
                    ));
                } else {
                    while self.indent_levels.len() > 1
                        && self
                            .indent_levels
                            .last()
                            .is_some_and(|top| *top > self.line_ws)
                    {
                        self.indent_levels.pop();
                        self.pending.push_back(Token::new(
                            TOKEN_DEDENT,
                            "",
                            SourceRange::at(content_off),
                        ));
                    }
                }
            }
        } else {
            self.content_seen = true;
            self.indent_levels = vec![self.line_ws];
        }
        self.newline_count = 0;
        self.break_start = None;
    }

    /// Longest match against the trie at the current position. Consumes the
    /// matched characters only on success.
    fn match_token(&mut self) -> Option<Token> {
        let start = self.reader.offset();
        self.reader.reset_peek();
        let mut cursor = self.trie.cursor();
        let mut text = String::new();
        let mut chars = 0usize;
        let mut best: Option<(TokenId, usize, usize, String)> = None;
        while let Some(c) = self.reader.peek() {
            if !cursor.step(c) {
                break;
            }
            text.push(c);
            chars += 1;
            if let Some(id) = cursor.terminal() {
                best = Some((id, chars, self.reader.peek_offset(), text.clone()));
            }
        }
        self.reader.reset_peek();
        let (id, chars, end, text) = best?;
        self.reader.consume(chars);
        Some(Token::new(id, text, (start..end).into()))
    }

    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            if let Some(t) = self.pending.pop_front() {
                return Some(t);
            }
            let start = self.reader.offset();
            self.reader.reset_peek();
            let Some(c) = self.reader.peek() else {
                self.reader.reset_peek();
                self.flush_data();
                match self.pending.pop_front() {
                    Some(t) => return Some(t),
                    None => return None,
                }
            };
            self.reader.reset_peek();

            let structural = self.structural();
            if structural && c == '\n' {
                self.flush_data();
                self.reader.read();
                if self.break_start.is_none() {
                    self.break_start = Some(start);
                }
                self.newline_count += 1;
                self.break_end = self.reader.offset();
                self.line_ws = 0;
                self.line_ws_start = self.reader.offset();
                continue;
            }
            let in_break = self.newline_count > 0 || !self.content_seen;
            if structural && in_break && c.is_whitespace() {
                self.reader.read();
                self.line_ws += 1;
                continue;
            }
            if structural && in_break {
                // Content resumes; deliver break and indent tokens first,
                // then reconsider this character.
                self.resume_content(start);
                continue;
            }

            if c == '\\' {
                if self.recognize_commands && self.peek_second().is_some_and(is_command_start) {
                    self.flush_data();
                    self.reader.read();
                    self.pending.push_back(Token::new(
                        TOKEN_COMMAND_INTRO,
                        "\\",
                        (start..self.reader.offset()).into(),
                    ));
                    continue;
                }
                self.reader.read();
                if let Some(esc) = self.reader.read() {
                    // Escaped code point is literal data; its range covers
                    // the backslash as well.
                    self.data.append(esc, start, self.reader.offset());
                } else {
                    self.data.append('\\', start, self.reader.offset());
                }
                continue;
            }

            if self.trie.starts_token(c) {
                if let Some(t) = self.match_token() {
                    self.flush_data();
                    self.pending.push_back(t);
                    continue;
                }
            }

            self.reader.read();
            self.data.append(c, start, self.reader.offset());
        }
    }

    fn peek_second(&mut self) -> Option<char> {
        self.reader.reset_peek();
        self.reader.peek();
        let second = self.reader.peek();
        self.reader.reset_peek();
        second
    }
}

fn is_command_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '<' || c == '>'
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

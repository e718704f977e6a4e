//! The OSXML surface syntax
//!
//! An XML subset carrying the same structure as OSML: elements become
//! commands, attributes become the argument map, text becomes data. The
//! `a:start:` / `a:end:` element prefixes express annotation endpoints, and
//! a top-level `<ousia>` element is transparent so a file can hold several
//! roots while staying well-formed XML.
//!
//! Supported beyond plain elements: the `<?xml ...?>` declaration, comments,
//! CDATA sections and the five predefined entities plus numeric character
//! references. Anything else out of XML is rejected with a diagnostic and
//! the parser resynchronizes at the next `<`.

use crate::stack::ParserStack;
use crate::surface::{Parser, ParserEnv, TokenizerCallbacks};
use crate::tokens::{DataAccumulator, Token, TokenRegistry, Tokenizer, WhitespaceMode, TOKEN_DATA};
use osml_core::diagnostics::Logger;
use osml_core::managed::Rooted;
use osml_core::source::{CharReader, SourceRange};
use osml_core::variant::{Variant, VariantMap};

const ANNOTATION_START_PREFIX: &str = "a:start:";
const ANNOTATION_END_PREFIX: &str = "a:end:";
const TRANSPARENT_ROOT: &str = "ousia";

#[derive(Default)]
pub struct OsxmlParser;

impl OsxmlParser {
    pub fn new() -> Self {
        OsxmlParser
    }
}

impl Parser for OsxmlParser {
    fn parse(&self, source: &str, env: &ParserEnv) -> Vec<Rooted> {
        let mut run = OsxmlRun::new(source, env);
        run.run();
        run.stack.take_roots()
    }
}

enum TagKind {
    Open,
    SelfClosing,
}

struct OsxmlRun<'src> {
    reader: CharReader<'src>,
    /// Dummy tokenizer backing the [`TokenizerCallbacks`] handlers expect;
    /// OSXML has no user tokens, so it never produces anything.
    tokenizer: Tokenizer<'src>,
    registry: TokenRegistry,
    stack: ParserStack,
    logger: Logger,
    text: DataAccumulator,
    /// Open elements: tag name and whether a parser frame was opened for it
    /// (the transparent root and misused annotation elements have none).
    open_tags: Vec<(String, bool)>,
    source_len: usize,
}

impl<'src> OsxmlRun<'src> {
    fn new(source: &'src str, env: &ParserEnv) -> Self {
        OsxmlRun {
            reader: CharReader::new(source),
            tokenizer: Tokenizer::with_mode(CharReader::new(""), WhitespaceMode::Collapse),
            registry: TokenRegistry::new(),
            stack: ParserStack::new(env.states.clone(), env.manager.clone(), env.logger.clone()),
            logger: env.logger.clone(),
            text: DataAccumulator::new(WhitespaceMode::Collapse),
            open_tags: Vec::new(),
            source_len: source.len(),
        }
    }

    fn run(&mut self) {
        loop {
            let at = self.reader.offset();
            match self.reader.read() {
                None => break,
                Some('<') => {
                    self.flush_text();
                    self.tag(at);
                }
                Some('&') => {
                    match self.entity(at) {
                        Some(c) => {
                            let end = self.reader.offset();
                            self.text.append(c, at, end);
                        }
                        None => self.resync(),
                    }
                }
                Some(c) => {
                    self.text.append(c, at, self.reader.offset());
                }
            }
        }
        self.flush_text();
        // Frameless open elements have no stack frame for finalize to flag.
        for (name, has_frame) in std::mem::take(&mut self.open_tags) {
            if !has_frame {
                self.logger.error(
                    format!("element \"{}\" was never closed", name),
                    Some(SourceRange::at(self.source_len)),
                );
            }
        }
        let end = SourceRange::at(self.source_len);
        let mut cb = TokenizerCallbacks {
            tokenizer: &mut self.tokenizer,
            registry: &mut self.registry,
        };
        self.stack.finalize(&mut cb, end);
    }

    fn flush_text(&mut self) {
        if let Some(token) = self.text.flush() {
            let mut cb = TokenizerCallbacks {
                tokenizer: &mut self.tokenizer,
                registry: &mut self.registry,
            };
            self.stack.data(&mut cb, &token);
        }
    }

    /// Dispatch on what follows a `<`. `at` is the offset of the `<` itself.
    fn tag(&mut self, at: usize) {
        self.reader.reset_peek();
        match self.reader.peek() {
            Some('?') => {
                self.reader.consume_peek();
                self.declaration(at);
            }
            Some('!') => {
                self.reader.consume_peek();
                self.markup(at);
            }
            Some('/') => {
                self.reader.consume_peek();
                self.close_tag(at);
            }
            Some(c) if is_name_start(c) => {
                self.reader.reset_peek();
                self.open_tag(at);
            }
            _ => {
                self.reader.reset_peek();
                self.logger
                    .error("malformed tag", Some(SourceRange::at(at)));
                self.resync();
            }
        }
    }

    /// `<?xml ...?>` is accepted and skipped; any other target is an error.
    fn declaration(&mut self, at: usize) {
        let name = self.read_name();
        if name != "xml" {
            self.logger.error(
                format!("unsupported processing instruction \"{}\"", name),
                Some(SourceRange::at(at)),
            );
        }
        loop {
            match self.reader.read() {
                Some('?') => {
                    self.reader.reset_peek();
                    if self.reader.peek() == Some('>') {
                        self.reader.consume_peek();
                        return;
                    }
                    self.reader.reset_peek();
                }
                Some(_) => {}
                None => {
                    self.logger.error(
                        "unterminated processing instruction",
                        Some(SourceRange::at(at)),
                    );
                    return;
                }
            }
        }
    }

    /// `<!--` comments and `<![CDATA[` sections; the `!` is already consumed.
    fn markup(&mut self, at: usize) {
        if self.try_consume("--") {
            self.comment(at);
        } else if self.try_consume("[CDATA[") {
            self.cdata(at);
        } else {
            self.logger
                .error("unsupported markup declaration", Some(SourceRange::at(at)));
            self.resync();
        }
    }

    fn comment(&mut self, at: usize) {
        loop {
            match self.reader.read() {
                Some('-') if self.try_consume("->") => return,
                Some(_) => {}
                None => {
                    self.logger
                        .error("unterminated comment", Some(SourceRange::at(at)));
                    return;
                }
            }
        }
    }

    /// CDATA content bypasses entity handling and whitespace collapsing.
    fn cdata(&mut self, at: usize) {
        let start = self.reader.offset();
        let mut content = String::new();
        loop {
            let end = self.reader.offset();
            match self.reader.read() {
                Some(']') if self.try_consume("]>") => {
                    if !content.is_empty() {
                        self.flush_text();
                        let token = Token::new(TOKEN_DATA, content, (start..end).into());
                        let mut cb = TokenizerCallbacks {
                            tokenizer: &mut self.tokenizer,
                            registry: &mut self.registry,
                        };
                        self.stack.data(&mut cb, &token);
                    }
                    return;
                }
                Some(c) => content.push(c),
                None => {
                    self.logger
                        .error("unterminated CDATA section", Some(SourceRange::at(at)));
                    return;
                }
            }
        }
    }

    fn close_tag(&mut self, at: usize) {
        let name = self.read_name();
        self.skip_spaces();
        if self.reader.read() != Some('>') {
            self.logger
                .error("malformed closing tag", Some(SourceRange::at(at)));
            self.resync();
            return;
        }
        let range: SourceRange = (at..self.reader.offset()).into();
        match self.open_tags.pop() {
            Some((open, has_frame)) if open == name => {
                if has_frame {
                    let mut cb = TokenizerCallbacks {
                        tokenizer: &mut self.tokenizer,
                        registry: &mut self.registry,
                    };
                    self.stack.range_end(&mut cb, range);
                }
            }
            Some((open, _)) => {
                self.logger.error(
                    format!("expected \"</{}>\", found \"</{}>\"", open, name),
                    Some(range),
                );
            }
            None => {
                self.logger.error(
                    format!("\"</{}>\" without a matching opening tag", name),
                    Some(range),
                );
            }
        }
    }

    fn open_tag(&mut self, at: usize) {
        let name = self.read_name();
        let mut args = VariantMap::new();
        let kind = match self.attributes(at, &mut args) {
            Some(kind) => kind,
            None => {
                self.resync();
                return;
            }
        };
        let range: SourceRange = (at..self.reader.offset()).into();

        if let Some(rest) = name.strip_prefix(ANNOTATION_START_PREFIX) {
            let mut cb = TokenizerCallbacks {
                tokenizer: &mut self.tokenizer,
                registry: &mut self.registry,
            };
            self.stack.annotation_start(&mut cb, rest, &args, range);
            if matches!(kind, TagKind::Open) {
                self.open_tags.push((name.clone(), false));
                self.logger.warning(
                    "annotation elements should be self-closing",
                    Some(range),
                );
            }
            return;
        }
        if let Some(rest) = name.strip_prefix(ANNOTATION_END_PREFIX) {
            let mut cb = TokenizerCallbacks {
                tokenizer: &mut self.tokenizer,
                registry: &mut self.registry,
            };
            self.stack.annotation_end(&mut cb, rest, &args, range);
            if matches!(kind, TagKind::Open) {
                self.open_tags.push((name.clone(), false));
                self.logger.warning(
                    "annotation elements should be self-closing",
                    Some(range),
                );
            }
            return;
        }

        if name == TRANSPARENT_ROOT && self.open_tags.is_empty() {
            if !args.is_empty() {
                self.logger.warning(
                    "attributes on the transparent root are ignored",
                    Some(range),
                );
            }
            if matches!(kind, TagKind::Open) {
                self.open_tags.push((name, false));
            }
            return;
        }

        let mut cb = TokenizerCallbacks {
            tokenizer: &mut self.tokenizer,
            registry: &mut self.registry,
        };
        self.stack.command_start(&mut cb, &name, &args, range);
        match kind {
            TagKind::Open => self.open_tags.push((name, true)),
            TagKind::SelfClosing => self.stack.range_end(&mut cb, range),
        }
    }

    /// Consume `pattern` if it is next in the stream; no effect otherwise.
    fn try_consume(&mut self, pattern: &str) -> bool {
        self.reader.reset_peek();
        for expected in pattern.chars() {
            if self.reader.peek() != Some(expected) {
                self.reader.reset_peek();
                return false;
            }
        }
        self.reader.consume_peek();
        true
    }

    /// Read `name="value"` pairs up to `>` or `/>`. Returns `None` on a
    /// malformed tag (after logging).
    fn attributes(&mut self, at: usize, args: &mut VariantMap) -> Option<TagKind> {
        loop {
            self.skip_spaces();
            self.reader.reset_peek();
            match self.reader.peek() {
                Some('>') => {
                    self.reader.consume_peek();
                    return Some(TagKind::Open);
                }
                Some('/') => {
                    self.reader.consume_peek();
                    if self.reader.read() == Some('>') {
                        return Some(TagKind::SelfClosing);
                    }
                    self.logger
                        .error("malformed tag", Some(SourceRange::at(at)));
                    return None;
                }
                Some(c) if is_name_start(c) => {
                    self.reader.reset_peek();
                    let key = self.read_name();
                    self.skip_spaces();
                    if self.reader.read() != Some('=') {
                        self.logger.error(
                            format!("expected \"=\" after attribute \"{}\"", key),
                            Some(SourceRange::at(self.reader.offset())),
                        );
                        return None;
                    }
                    self.skip_spaces();
                    let value = self.attribute_value()?;
                    if args
                        .insert(key.clone(), Variant::from(value))
                        .is_some()
                    {
                        self.logger.error(
                            format!("attribute \"{}\" given twice", key),
                            Some(SourceRange::at(self.reader.offset())),
                        );
                        return None;
                    }
                }
                _ => {
                    self.reader.reset_peek();
                    self.logger
                        .error("malformed tag", Some(SourceRange::at(at)));
                    return None;
                }
            }
        }
    }

    fn attribute_value(&mut self) -> Option<String> {
        let quote = match self.reader.read() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                self.logger.error(
                    "attribute values must be quoted",
                    Some(SourceRange::at(self.reader.offset())),
                );
                return None;
            }
        };
        let mut value = String::new();
        loop {
            let at = self.reader.offset();
            match self.reader.read() {
                Some(c) if c == quote => return Some(value),
                Some('&') => {
                    let c = self.entity(at)?;
                    value.push(c);
                }
                Some('<') => {
                    self.logger
                        .error("\"<\" in attribute value", Some(SourceRange::at(at)));
                    return None;
                }
                Some(c) => value.push(c),
                None => {
                    self.logger.error(
                        "unterminated attribute value",
                        Some(SourceRange::at(at)),
                    );
                    return None;
                }
            }
        }
    }

    /// Decode an entity whose `&` at offset `at` is already consumed.
    fn entity(&mut self, at: usize) -> Option<char> {
        let mut name = String::new();
        loop {
            match self.reader.read() {
                Some(';') => break,
                Some(c) if c.is_ascii_alphanumeric() || c == '#' => name.push(c),
                _ => {
                    self.logger
                        .error("malformed entity", Some(SourceRange::at(at)));
                    return None;
                }
            }
            if name.len() > 8 {
                self.logger
                    .error("malformed entity", Some(SourceRange::at(at)));
                return None;
            }
        }
        let decoded = match name.as_str() {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => name
                .strip_prefix('#')
                .and_then(|digits| {
                    if let Some(hex) = digits.strip_prefix('x') {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        digits.parse::<u32>().ok()
                    }
                })
                .and_then(char::from_u32),
        };
        if decoded.is_none() {
            self.logger.error(
                format!("unknown entity \"&{};\"", name),
                Some(SourceRange::at(at)),
            );
        }
        decoded
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        loop {
            self.reader.reset_peek();
            match self.reader.peek() {
                Some(c) if is_name_char(c) => {
                    name.push(c);
                    self.reader.consume_peek();
                }
                _ => {
                    self.reader.reset_peek();
                    return name;
                }
            }
        }
    }

    fn skip_spaces(&mut self) {
        loop {
            self.reader.reset_peek();
            match self.reader.peek() {
                Some(c) if c.is_whitespace() => self.reader.consume_peek(),
                _ => {
                    self.reader.reset_peek();
                    return;
                }
            }
        }
    }

    /// After an error: drop everything up to the next `<`.
    fn resync(&mut self) {
        loop {
            self.reader.reset_peek();
            match self.reader.peek() {
                Some('<') | None => {
                    self.reader.reset_peek();
                    return;
                }
                Some(_) => self.reader.consume_peek(),
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;
    use osml_core::managed::Manager;

    fn parse(input: &str) -> (Vec<Rooted>, Manager, Logger) {
        let manager = Manager::new();
        let logger = Logger::default();
        let env = ParserEnv::new(manager.clone(), logger.clone());
        let roots = OsxmlParser::new().parse(input, &env);
        (roots, manager, logger)
    }

    fn texts(node: &Rooted, mgr: &Manager) -> Vec<String> {
        node.children()
            .iter()
            .filter_map(|id| mgr.rooted(*id))
            .filter_map(|n| n.read_data("text").and_then(|v| v.to_string_value().ok()))
            .collect()
    }

    #[test]
    fn test_empty_transparent_root() {
        let (roots, _mgr, logger) = parse("<ousia/>");
        assert!(!logger.has_error());
        assert!(roots.is_empty());
    }

    #[test]
    fn test_transparent_root_with_declaration() {
        let (roots, _mgr, logger) =
            parse("<?xml version=\"1.0\"?>\n<ousia>\n</ousia>");
        assert!(!logger.has_error());
        assert!(roots.is_empty());
    }

    #[test]
    fn test_simple_document() {
        let (roots, mgr, logger) = parse("<document>hello world</document>");
        assert!(!logger.has_error());
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].rtti().name(), "document");
        assert_eq!(texts(&roots[0], &mgr), vec!["hello world"]);
    }

    #[test]
    fn test_nested_elements() {
        let (roots, mgr, logger) =
            parse("<document><chapter>one</chapter><chapter>two</chapter></document>");
        assert!(!logger.has_error());
        let names: Vec<String> = roots[0]
            .children()
            .iter()
            .filter_map(|id| mgr.rooted(*id))
            .map(|n| n.name())
            .collect();
        assert_eq!(names, vec!["chapter", "chapter"]);
    }

    #[test]
    fn test_attributes_become_arguments() {
        let (roots, _mgr, logger) =
            parse("<figure src=\"a.png\" title='A &amp; B'/>");
        assert!(!logger.has_error());
        let figure = &roots[0];
        assert_eq!(
            figure.read_data("src"),
            Some(Variant::from("a.png".to_owned()))
        );
        assert_eq!(
            figure.read_data("title"),
            Some(Variant::from("A & B".to_owned()))
        );
    }

    #[test]
    fn test_name_attribute_sets_node_name() {
        let (roots, _mgr, logger) = parse("<chapter name=\"intro\"/>");
        assert!(!logger.has_error());
        assert_eq!(roots[0].name(), "intro");
    }

    #[test]
    fn test_duplicate_attribute_is_error() {
        let (_roots, _mgr, logger) = parse("<figure src=\"a\" src=\"b\"/>");
        assert!(logger.has_error());
    }

    #[test]
    fn test_entities_in_text() {
        let (roots, mgr, logger) = parse("<document>1 &lt; 2 &#x41;</document>");
        assert!(!logger.has_error());
        assert_eq!(texts(&roots[0], &mgr), vec!["1 < 2 A"]);
    }

    #[test]
    fn test_unknown_entity_is_error() {
        let (_roots, _mgr, logger) = parse("<document>&nosuch;</document>");
        assert!(logger.has_error());
    }

    #[test]
    fn test_cdata_preserved_verbatim() {
        let (roots, mgr, logger) =
            parse("<document><![CDATA[  a < b & c  ]]></document>");
        assert!(!logger.has_error());
        assert_eq!(texts(&roots[0], &mgr), vec!["  a < b & c  "]);
    }

    #[test]
    fn test_comment_skipped() {
        let (roots, mgr, logger) = parse("<document><!-- note -->text</document>");
        assert!(!logger.has_error());
        assert_eq!(texts(&roots[0], &mgr), vec!["text"]);
    }

    #[test]
    fn test_annotation_prefixes() {
        let (roots, mgr, logger) = parse(
            "<document><a:start:em/>word<a:end:em/></document>",
        );
        assert!(!logger.has_error());
        let kinds: Vec<(String, String)> = roots[0]
            .children()
            .iter()
            .filter_map(|id| mgr.rooted(*id))
            .map(|n| {
                let role = n
                    .read_data("role")
                    .and_then(|v| v.to_string_value().ok())
                    .unwrap_or_default();
                (n.name(), role)
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("em".to_owned(), "start".to_owned()),
                ("".to_owned(), String::new()),
                ("em".to_owned(), "end".to_owned()),
            ]
        );
    }

    #[test]
    fn test_mismatched_closing_tag_is_error() {
        let (_roots, _mgr, logger) = parse("<document><chapter></document>");
        assert!(logger.has_error());
    }

    #[test]
    fn test_unclosed_element_is_error() {
        let (_roots, _mgr, logger) = parse("<document>abc");
        assert!(logger.has_error());
    }

    #[test]
    fn test_unsupported_pi_is_error() {
        let (_roots, _mgr, logger) = parse("<?php echo ?><document/>");
        assert!(logger.has_error());
    }

    #[test]
    fn test_malformed_tag_resyncs() {
        let (roots, _mgr, logger) = parse("<123 <document/>");
        assert!(logger.has_error());
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].rtti().name(), "document");
    }

    #[test]
    fn test_whitespace_between_elements_collapsed() {
        let (roots, mgr, logger) =
            parse("<document>\n    a\n    b\n</document>");
        assert!(!logger.has_error());
        assert_eq!(texts(&roots[0], &mgr), vec!["a b"]);
    }
}

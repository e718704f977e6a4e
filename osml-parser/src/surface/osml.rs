//! The OSML surface syntax
//!
//! Backslash commands with optional class, argument map and fields:
//!
//! ```text
//! \figure[wide]{src=img.png}{
//!     A caption with \<em emphasis \>em inside.
//! }
//! % a line comment
//! %{ a block comment, %{ nestable }% }%
//! ```
//!
//! `\<name` opens an annotation, `\>name` closes it. Command names,
//! classes and argument maps are read at character level directly behind
//! the tokenizer; everything else flows through the token stream.
//!
//! Ontology-supplied token syntax ([`SyntaxSpec`]) registers user tokens
//! that open, close or instantiate classes without backslash commands.

use crate::stack::ParserStack;
use crate::surface::{Parser, ParserEnv, TokenizerCallbacks};
use crate::tokens::{
    Token, TokenId, TokenRegistry, TokenStack, TokenSyntaxDescriptor, Tokenizer, WhitespaceMode,
    TOKEN_COMMAND_INTRO, TOKEN_DATA, TOKEN_DEDENT, TOKEN_INDENT, TOKEN_NEWLINE, TOKEN_PARAGRAPH,
    TOKEN_SECTION,
};
use osml_core::diagnostics::Logger;
use osml_core::managed::Rooted;
use osml_core::source::{CharReader, SourceRange};
use osml_core::variant::{parse_int, Variant, VariantMap};

/// Token syntax of one class, as emitted by an ontology.
#[derive(Debug, Clone, Default)]
pub struct SyntaxSpec {
    pub name: String,
    pub open: Option<String>,
    pub close: Option<String>,
    pub short: Option<String>,
    pub whitespace_mode: WhitespaceMode,
    pub precedence: i32,
}

#[derive(Default)]
pub struct OsmlParser {
    syntax: Vec<SyntaxSpec>,
}

impl OsmlParser {
    pub fn new() -> Self {
        OsmlParser::default()
    }

    pub fn with_syntax(syntax: Vec<SyntaxSpec>) -> Self {
        OsmlParser { syntax }
    }
}

impl Parser for OsmlParser {
    fn parse(&self, source: &str, env: &ParserEnv) -> Vec<Rooted> {
        let mut run = OsmlRun::new(self, source, env);
        run.run();
        run.stack.take_roots()
    }
}

enum CommandKind {
    Command,
    AnnotationStart,
    AnnotationEnd,
}

struct OsmlRun<'src> {
    tokenizer: Tokenizer<'src>,
    registry: TokenRegistry,
    token_stack: TokenStack,
    stack: ParserStack,
    logger: Logger,
    source_len: usize,
    /// Open field count per brace-opened command frame.
    fields: Vec<usize>,
    /// Commands opened by user tokens: (class name, mode to restore).
    token_open: Vec<(String, WhitespaceMode)>,
    t_field_open: TokenId,
    t_field_close: TokenId,
    t_comment: TokenId,
    t_block_comment: TokenId,
}

impl<'src> OsmlRun<'src> {
    fn new(parser: &OsmlParser, source: &'src str, env: &ParserEnv) -> Self {
        let mut tokenizer =
            Tokenizer::with_mode(CharReader::new(source), WhitespaceMode::Collapse);
        tokenizer.set_command_recognition(true);
        let mut registry = TokenRegistry::new();
        let t_field_open = registry.acquire("{");
        let t_field_close = registry.acquire("}");
        let t_comment = registry.acquire("%");
        let t_block_comment = registry.acquire("%{");
        for (text, id) in [
            ("{", t_field_open),
            ("}", t_field_close),
            ("%", t_comment),
            ("%{", t_block_comment),
        ] {
            tokenizer.register_token(text, id);
        }

        let mut frame = Vec::new();
        for spec in &parser.syntax {
            let mut descriptor = TokenSyntaxDescriptor::new(&spec.name)
                .whitespace(spec.whitespace_mode)
                .precedence(spec.precedence);
            for (text, slot) in [
                (&spec.open, 0usize),
                (&spec.close, 1),
                (&spec.short, 2),
            ] {
                if let Some(text) = text {
                    let id = registry.acquire(text);
                    tokenizer.register_token(text, id);
                    descriptor = match slot {
                        0 => descriptor.open(id),
                        1 => descriptor.close(id),
                        _ => descriptor.short(id),
                    };
                }
            }
            frame.push(descriptor);
        }
        let mut token_stack = TokenStack::new();
        token_stack.push_frame(frame);

        OsmlRun {
            tokenizer,
            registry,
            token_stack,
            stack: ParserStack::new(env.states.clone(), env.manager.clone(), env.logger.clone()),
            logger: env.logger.clone(),
            source_len: source.len(),
            fields: Vec::new(),
            token_open: Vec::new(),
            t_field_open,
            t_field_close,
            t_comment,
            t_block_comment,
        }
    }

    fn run(&mut self) {
        while let Some(token) = self.tokenizer.next_token() {
            if token.id == self.t_block_comment {
                self.skip_block_comment(token.range);
            } else if token.id == self.t_comment {
                self.skip_line_comment();
            } else if token.id == self.t_field_open {
                // Count it so the mirroring "}" stays inside this field.
                if let Some(depth) = self.fields.last_mut() {
                    *depth += 1;
                }
                self.stray_brace(&token, "{");
            } else if token.id == self.t_field_close {
                self.close_field(&token);
            } else {
                match token.id {
                    TOKEN_COMMAND_INTRO => self.read_command(token.range),
                    TOKEN_DATA => self.dispatch_data(&token),
                    TOKEN_NEWLINE | TOKEN_PARAGRAPH | TOKEN_SECTION | TOKEN_INDENT
                    | TOKEN_DEDENT => {}
                    _ => self.user_token(&token),
                }
            }
        }
        let end = SourceRange::at(self.source_len);
        let mut cb = TokenizerCallbacks {
            tokenizer: &mut self.tokenizer,
            registry: &mut self.registry,
        };
        self.stack.finalize(&mut cb, end);
    }

    fn dispatch_data(&mut self, token: &Token) {
        let mut cb = TokenizerCallbacks {
            tokenizer: &mut self.tokenizer,
            registry: &mut self.registry,
        };
        self.stack.data(&mut cb, token);
    }

    fn stray_brace(&mut self, token: &Token, text: &str) {
        self.logger.warning(
            format!("unexpected \"{}\" treated as text", text),
            Some(token.range),
        );
        self.dispatch_data(&Token::new(TOKEN_DATA, text, token.range));
    }

    fn close_field(&mut self, token: &Token) {
        match self.fields.last_mut() {
            // Pairs with a brace that degraded to text; mirror it.
            Some(depth) if *depth > 1 => {
                *depth -= 1;
                self.stray_brace(token, "}");
            }
            Some(depth) => {
                *depth -= 1;
                // A directly following brace opens the next field of the
                // same command.
                let reader = self.tokenizer.reader_mut();
                reader.reset_peek();
                if reader.peek() == Some('{') {
                    reader.consume_peek();
                    if let Some(depth) = self.fields.last_mut() {
                        *depth = 1;
                    }
                    self.skip_field_name();
                } else {
                    reader.reset_peek();
                    self.fields.pop();
                    let mut cb = TokenizerCallbacks {
                        tokenizer: &mut self.tokenizer,
                        registry: &mut self.registry,
                    };
                    self.stack.range_end(&mut cb, token.range);
                }
            }
            None => self.stray_brace(token, "}"),
        }
    }

    /// Named fields open as `{name=`; the name only selects the field and
    /// carries no content of its own.
    fn skip_field_name(&mut self) {
        let reader = self.tokenizer.reader_mut();
        let mut probe = reader.fork();
        let mut chars = 0usize;
        loop {
            match probe.read() {
                Some('=') => {
                    reader.consume(chars + 1);
                    return;
                }
                Some(c) if c.is_alphanumeric() || c == '_' || c == '-' => chars += 1,
                _ => return,
            }
        }
    }

    fn read_command(&mut self, intro: SourceRange) {
        let reader = self.tokenizer.reader_mut();
        reader.reset_peek();
        let kind = match reader.peek() {
            Some('<') => {
                reader.consume_peek();
                CommandKind::AnnotationStart
            }
            Some('>') => {
                reader.consume_peek();
                CommandKind::AnnotationEnd
            }
            _ => {
                reader.reset_peek();
                CommandKind::Command
            }
        };
        let name = read_name(reader);
        if name.is_empty() {
            self.logger
                .error("expected a command name", Some(intro));
            return;
        }
        let mut args = VariantMap::new();
        read_arguments(reader, &self.logger, &mut args);
        let end = reader.offset();
        let range: SourceRange = (intro.start..end).into();

        match kind {
            CommandKind::AnnotationStart => {
                let mut cb = TokenizerCallbacks {
                    tokenizer: &mut self.tokenizer,
                    registry: &mut self.registry,
                };
                self.stack.annotation_start(&mut cb, &name, &args, range);
            }
            CommandKind::AnnotationEnd => {
                let mut cb = TokenizerCallbacks {
                    tokenizer: &mut self.tokenizer,
                    registry: &mut self.registry,
                };
                self.stack.annotation_end(&mut cb, &name, &args, range);
            }
            CommandKind::Command => {
                {
                    let mut cb = TokenizerCallbacks {
                        tokenizer: &mut self.tokenizer,
                        registry: &mut self.registry,
                    };
                    self.stack.command_start(&mut cb, &name, &args, range);
                }
                let reader = self.tokenizer.reader_mut();
                reader.reset_peek();
                if reader.peek() == Some('{') {
                    reader.consume_peek();
                    self.fields.push(1);
                    self.skip_field_name();
                } else {
                    reader.reset_peek();
                    let mut cb = TokenizerCallbacks {
                        tokenizer: &mut self.tokenizer,
                        registry: &mut self.registry,
                    };
                    self.stack.range_end(&mut cb, SourceRange::at(end));
                }
            }
        }
    }

    /// A user-registered token: close the innermost token-opened command,
    /// instantiate a short form, or open a class instance.
    fn user_token(&mut self, token: &Token) {
        let lookup = self.token_stack.lookup(token.id);
        let closes = lookup
            .close
            .iter()
            .any(|d| self.token_open.last().is_some_and(|(name, _)| *name == d.name));
        let short = lookup.short.first().map(|d| d.name.clone());
        let open = lookup
            .open
            .first()
            .map(|d| (d.name.clone(), d.whitespace_mode));
        let only_close = !lookup.close.is_empty();
        drop(lookup);

        let mut cb = TokenizerCallbacks {
            tokenizer: &mut self.tokenizer,
            registry: &mut self.registry,
        };
        if closes {
            self.stack.range_end(&mut cb, token.range);
            if let Some((_, restore)) = self.token_open.pop() {
                self.tokenizer.set_whitespace_mode(restore);
            }
        } else if let Some(name) = short {
            self.stack
                .command_start(&mut cb, &name, &VariantMap::new(), token.range);
            self.stack.range_end(&mut cb, token.range);
        } else if let Some((name, mode)) = open {
            self.stack
                .command_start(&mut cb, &name, &VariantMap::new(), token.range);
            let previous = self.tokenizer.whitespace_mode();
            self.tokenizer.set_whitespace_mode(mode);
            self.token_open.push((name, previous));
        } else if only_close {
            self.logger.error(
                format!("unexpected closing token \"{}\"", token.content),
                Some(token.range),
            );
        } else {
            // Registered by a handler without a syntax role: plain data.
            self.stack.data(&mut cb, token);
        }
    }

    fn skip_line_comment(&mut self) {
        let reader = self.tokenizer.reader_mut();
        loop {
            reader.reset_peek();
            match reader.peek() {
                Some('\n') | None => {
                    reader.reset_peek();
                    return;
                }
                Some(_) => reader.consume_peek(),
            }
        }
    }

    fn skip_block_comment(&mut self, open: SourceRange) {
        let reader = self.tokenizer.reader_mut();
        let mut depth = 1usize;
        loop {
            match reader.read() {
                None => {
                    self.logger
                        .error("unterminated block comment", Some(open));
                    return;
                }
                Some('%') => {
                    reader.reset_peek();
                    if reader.peek() == Some('{') {
                        reader.consume_peek();
                        depth += 1;
                    } else {
                        reader.reset_peek();
                    }
                }
                Some('}') => {
                    reader.reset_peek();
                    if reader.peek() == Some('%') {
                        reader.consume_peek();
                        depth -= 1;
                        if depth == 0 {
                            return;
                        }
                    } else {
                        reader.reset_peek();
                    }
                }
                Some(_) => {}
            }
        }
    }
}

fn read_name(reader: &mut CharReader<'_>) -> String {
    let mut name = String::new();
    loop {
        reader.reset_peek();
        match reader.peek() {
            Some(c) if c.is_alphanumeric() || c == '_' || c == '-' => {
                name.push(c);
                reader.consume_peek();
            }
            _ => {
                reader.reset_peek();
                return name;
            }
        }
    }
}

/// Reads `[class]` and `{key=value, ...}` argument constructs. A brace that
/// does not look like an argument map (no `=` before a delimiter) is left in
/// the stream as a field opener.
fn read_arguments(reader: &mut CharReader<'_>, logger: &Logger, args: &mut VariantMap) {
    reader.reset_peek();
    if reader.peek() == Some('[') {
        reader.consume_peek();
        let mut class = String::new();
        loop {
            match reader.read() {
                Some(']') => break,
                Some('\n') | None => {
                    logger.error(
                        "unterminated class argument",
                        Some(SourceRange::at(reader.offset())),
                    );
                    break;
                }
                Some(c) => class.push(c),
            }
        }
        args.insert(
            "class".to_owned(),
            Variant::from(class.trim().to_owned()),
        );
    } else {
        reader.reset_peek();
    }

    reader.reset_peek();
    let brace = reader.peek() == Some('{');
    reader.reset_peek();
    if brace && brace_is_args(reader) {
        reader.read();
        read_arg_map(reader, logger, args);
    }
}

/// Lookahead: `{` starts an argument map iff an `=` appears before any
/// delimiter. The probe is capped so document-sized bodies stay cheap.
fn brace_is_args(reader: &CharReader<'_>) -> bool {
    let mut probe = reader.fork();
    probe.read();
    for _ in 0..64 {
        match probe.read() {
            Some('=') => return true,
            Some(',') | Some('}') | Some('{') | Some('\n') | Some('"') | None => return false,
            Some(_) => {}
        }
    }
    false
}

fn read_arg_map(reader: &mut CharReader<'_>, logger: &Logger, args: &mut VariantMap) {
    loop {
        skip_spaces(reader);
        let key = read_name(reader);
        if key.is_empty() {
            logger.error(
                "expected an argument name",
                Some(SourceRange::at(reader.offset())),
            );
            skip_to_map_end(reader);
            return;
        }
        skip_spaces(reader);
        reader.reset_peek();
        if reader.peek() != Some('=') {
            reader.reset_peek();
            logger.error(
                format!("expected \"=\" after argument \"{}\"", key),
                Some(SourceRange::at(reader.offset())),
            );
            skip_to_map_end(reader);
            return;
        }
        reader.consume_peek();
        skip_spaces(reader);
        let value = read_arg_value(reader, logger);
        if args.insert(key.clone(), value).is_some() {
            logger.warning(
                format!("argument \"{}\" given twice, last value wins", key),
                Some(SourceRange::at(reader.offset())),
            );
        }
        skip_spaces(reader);
        match reader.read() {
            Some(',') => {}
            Some('}') => return,
            _ => {
                logger.error(
                    "unterminated argument map",
                    Some(SourceRange::at(reader.offset())),
                );
                return;
            }
        }
    }
}

fn read_arg_value(reader: &mut CharReader<'_>, logger: &Logger) -> Variant {
    reader.reset_peek();
    if reader.peek() == Some('"') {
        reader.consume_peek();
        let mut value = String::new();
        loop {
            match reader.read() {
                Some('"') => return Variant::from(value),
                Some('\\') => {
                    if let Some(esc) = reader.read() {
                        value.push(esc);
                    }
                }
                Some(c) => value.push(c),
                None => {
                    logger.error(
                        "unterminated string value",
                        Some(SourceRange::at(reader.offset())),
                    );
                    return Variant::from(value);
                }
            }
        }
    }
    reader.reset_peek();
    let mut raw = String::new();
    loop {
        reader.reset_peek();
        match reader.peek() {
            Some(',') | Some('}') | Some('\n') | None => {
                reader.reset_peek();
                break;
            }
            Some(c) => {
                raw.push(c);
                reader.consume_peek();
            }
        }
    }
    typed_value(raw.trim())
}

/// Bare argument values get the obvious scalar type.
fn typed_value(raw: &str) -> Variant {
    match raw {
        "true" => return Variant::Bool(true),
        "false" => return Variant::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Variant::Int(i);
    }
    if raw.starts_with("0x") || raw.starts_with("0X") {
        if let Some(i) = parse_int(raw) {
            return Variant::Int(i);
        }
    }
    if let Ok(d) = raw.parse::<f64>() {
        return Variant::Double(d);
    }
    Variant::from(raw.to_owned())
}

fn skip_spaces(reader: &mut CharReader<'_>) {
    loop {
        reader.reset_peek();
        match reader.peek() {
            Some(c) if c.is_whitespace() && c != '\n' => reader.consume_peek(),
            _ => {
                reader.reset_peek();
                return;
            }
        }
    }
}

fn skip_to_map_end(reader: &mut CharReader<'_>) {
    loop {
        match reader.read() {
            Some('}') | None => return,
            Some(_) => {}
        }
    }
}

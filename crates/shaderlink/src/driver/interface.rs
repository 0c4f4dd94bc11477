//! Placement of top-level `in`, `out`, and `uniform` declarations.
//!
//! A GL implementation assigns locations to varyings declared without
//! `layout(location = N)` and matches them across stages by name. naga puts
//! every such variable at location 0, and it refuses plain uniforms that have
//! no `layout(binding = N)`. [`place`] pins each of those declarations to a
//! free slot on the line it was written on, and records which names were
//! placed so the linker can fall back to matching them by name.

use std::borrow::Cow;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Storage {
    Input,
    Output,
    Uniform,
}

impl Storage {
    fn qualifier(self) -> &'static str {
        match self {
            Storage::Input | Storage::Output => "location",
            Storage::Uniform => "binding",
        }
    }
}

/// One declared variable after placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub storage: Storage,
    pub name: String,
    /// First location (or binding) the variable occupies.
    pub slot: u32,
    pub slots: u32,
    /// `false` when the slot was assigned here rather than written in the source.
    pub explicit: bool,
    /// 1-based line of the variable name.
    pub line: usize,
}

#[derive(Debug)]
pub(crate) struct Placed<'a> {
    pub source: Cow<'a, str>,
    pub declarations: Vec<Declaration>,
}

impl Placed<'_> {
    pub fn is_implicit(&self, storage: Storage, name: &str) -> bool {
        self.declarations
            .iter()
            .any(|decl| decl.storage == storage && decl.name == name && !decl.explicit)
    }

    /// Line of the last declaration covering `slot`, which is the one a
    /// collision is reported against.
    pub fn line_of_slot(&self, storage: Storage, slot: u32) -> Option<usize> {
        self.declarations
            .iter()
            .rev()
            .find(|decl| {
                let covered = decl.slot..decl.slot.saturating_add(decl.slots);
                decl.storage == storage && covered.contains(&slot)
            })
            .map(|decl| decl.line)
    }
}

const QUALIFIERS: &[&str] = &[
    "centroid",
    "flat",
    "highp",
    "invariant",
    "lowp",
    "mediump",
    "noperspective",
    "precise",
    "sample",
    "smooth",
];

#[derive(Debug, Clone, Copy)]
struct Token {
    start: usize,
    end: usize,
}

#[derive(Debug)]
struct Declarator {
    name: Token,
    slots: u32,
}

#[derive(Debug)]
struct Statement {
    storage: Storage,
    explicit: Option<u32>,
    /// Byte range from the first token up to and including the `;`.
    span: Range<usize>,
    declarators: Vec<Declarator>,
}

pub(crate) fn place(source: &str) -> Placed<'_> {
    let masked = mask(source);
    let statements: Vec<Statement> = top_level_statements(&masked)
        .into_iter()
        .filter_map(|(range, tokens)| parse_statement(&masked, range, &tokens))
        .collect();

    let mut occupied: Vec<(Storage, Range<u32>)> = Vec::new();
    for statement in &statements {
        if let Some(first) = statement.explicit {
            let slots: u32 = statement.declarators.iter().map(|d| d.slots).sum();
            occupied.push((statement.storage, first..first.saturating_add(slots)));
        }
    }

    let mut declarations = Vec::new();
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    for statement in &statements {
        match statement.explicit {
            Some(first) => {
                let mut slot = first;
                for declarator in &statement.declarators {
                    declarations.push(declaration(
                        &masked,
                        statement.storage,
                        declarator,
                        slot,
                        true,
                    ));
                    slot = slot.saturating_add(declarator.slots);
                }
            }
            None => {
                let mut pieces = Vec::new();
                for declarator in &statement.declarators {
                    let slot = free_slot(&occupied, statement.storage, declarator.slots);
                    let taken = slot..slot.saturating_add(declarator.slots);
                    occupied.push((statement.storage, taken));
                    pieces.push((slot, declarator));
                    declarations.push(declaration(
                        &masked,
                        statement.storage,
                        declarator,
                        slot,
                        false,
                    ));
                }
                edits.push(rewrite(&masked, statement, &pieces));
            }
        }
    }

    if edits.is_empty() {
        return Placed {
            source: Cow::Borrowed(source),
            declarations,
        };
    }

    let mut rewritten = String::with_capacity(source.len() + edits.len() * 24);
    let mut cursor = 0;
    for (range, replacement) in edits {
        rewritten.push_str(&source[cursor..range.start]);
        rewritten.push_str(&replacement);
        cursor = range.end;
    }
    rewritten.push_str(&source[cursor..]);
    Placed {
        source: Cow::Owned(rewritten),
        declarations,
    }
}

fn declaration(
    masked: &str,
    storage: Storage,
    declarator: &Declarator,
    slot: u32,
    explicit: bool,
) -> Declaration {
    Declaration {
        storage,
        name: masked[declarator.name.start..declarator.name.end].to_owned(),
        slot,
        slots: declarator.slots,
        explicit,
        line: masked.as_bytes()[..declarator.name.start]
            .iter()
            .filter(|byte| **byte == b'\n')
            .count()
            + 1,
    }
}

fn free_slot(occupied: &[(Storage, Range<u32>)], storage: Storage, slots: u32) -> u32 {
    let mut candidate = 0u32;
    loop {
        let wanted = candidate..candidate.saturating_add(slots);
        let clash = occupied.iter().find(|(kind, range)| {
            *kind == storage && range.start < wanted.end && wanted.start < range.end
        });
        match clash {
            Some((_, range)) => candidate = range.end,
            None => return candidate,
        }
    }
}

/// Emits one `layout(...)` declaration per declarator. Everything stays on the
/// statement's first line and any newlines the statement spanned are kept at
/// its end, so later line numbers do not move.
fn rewrite(
    masked: &str,
    statement: &Statement,
    pieces: &[(u32, &Declarator)],
) -> (Range<usize>, String) {
    let qualifier = statement.storage.qualifier();
    let first_name = pieces.first().map_or(statement.span.end, |(_, d)| d.name.start);
    let head = collapse(&masked[statement.span.start..first_name]);

    let mut declarations = Vec::with_capacity(pieces.len());
    for (index, (slot, declarator)) in pieces.iter().enumerate() {
        let end = pieces
            .get(index + 1)
            .map_or(statement.span.end, |(_, next)| next.name.start);
        let body = collapse(&masked[declarator.name.start..end]);
        let body = body.trim_end_matches([',', ';']).trim_end();
        declarations.push(format!("layout({qualifier} = {slot}) {head} {body};"));
    }

    let mut replacement = declarations.join(" ");
    let newlines = masked[statement.span.clone()].matches('\n').count();
    replacement.extend(std::iter::repeat('\n').take(newlines));
    (statement.span.clone(), replacement)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Blanks comments, preprocessor lines, and non-ASCII bytes while keeping
/// every byte offset and newline in place.
fn mask(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    let mut line_start = true;

    while index < bytes.len() {
        let byte = bytes[index];
        if byte == b'\n' {
            out.push(b'\n');
            line_start = true;
            index += 1;
            continue;
        }
        if line_start && byte == b'#' {
            while index < bytes.len() && bytes[index] != b'\n' {
                out.push(b' ');
                index += 1;
            }
            continue;
        }
        if byte == b'/' && bytes.get(index + 1) == Some(&b'/') {
            while index < bytes.len() && bytes[index] != b'\n' {
                out.push(b' ');
                index += 1;
            }
            continue;
        }
        if byte == b'/' && bytes.get(index + 1) == Some(&b'*') {
            out.extend_from_slice(b"  ");
            index += 2;
            while index < bytes.len() && !bytes[index..].starts_with(b"*/") {
                out.push(if bytes[index] == b'\n' { b'\n' } else { b' ' });
                index += 1;
            }
            let closing = (bytes.len() - index).min(2);
            out.extend(std::iter::repeat(b' ').take(closing));
            index += closing;
            line_start = false;
            continue;
        }
        if !byte.is_ascii_whitespace() {
            line_start = false;
        }
        out.push(if byte.is_ascii() { byte } else { b' ' });
        index += 1;
    }

    out.into_iter().map(char::from).collect()
}

/// Statements at brace depth zero that end in `;` and contain no braces.
fn top_level_statements(masked: &str) -> Vec<(Range<usize>, Vec<Token>)> {
    let bytes = masked.as_bytes();
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut braced = false;

    for (index, byte) in bytes.iter().enumerate() {
        match byte {
            b'{' => {
                if depth == 0 {
                    braced = true;
                }
                depth += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    start = index + 1;
                    braced = false;
                }
            }
            b';' if depth == 0 => {
                if !braced {
                    let tokens = tokenize(masked, start..index);
                    if let Some(first) = tokens.first() {
                        statements.push((first.start..index + 1, tokens));
                    }
                }
                start = index + 1;
                braced = false;
            }
            _ => {}
        }
    }
    statements
}

fn tokenize(masked: &str, range: Range<usize>) -> Vec<Token> {
    let bytes = masked.as_bytes();
    let mut tokens = Vec::new();
    let mut index = range.start;
    while index < range.end {
        let byte = bytes[index];
        if byte.is_ascii_whitespace() {
            index += 1;
        } else if is_word_byte(byte) {
            let start = index;
            while index < range.end && is_word_byte(bytes[index]) {
                index += 1;
            }
            tokens.push(Token { start, end: index });
        } else {
            tokens.push(Token {
                start: index,
                end: index + 1,
            });
            index += 1;
        }
    }
    tokens
}

fn parse_statement(masked: &str, span: Range<usize>, tokens: &[Token]) -> Option<Statement> {
    let text = |token: &Token| &masked[token.start..token.end];
    let mut storage = None;
    let mut explicit = None;
    let mut index = 0;

    while let Some(token) = tokens.get(index) {
        match text(token) {
            "layout" => {
                let (next, slots) = parse_layout(masked, tokens, index + 1)?;
                index = next;
                for (key, value) in slots {
                    if matches!(key, "location" | "binding") {
                        explicit = Some(value);
                    }
                }
            }
            "in" => {
                storage = Some(Storage::Input);
                index += 1;
            }
            "out" => {
                storage = Some(Storage::Output);
                index += 1;
            }
            "uniform" => {
                storage = Some(Storage::Uniform);
                index += 1;
            }
            word if QUALIFIERS.contains(&word) => index += 1,
            _ => break,
        }
    }

    let storage = storage?;
    let type_token = tokens.get(index)?;
    if !is_identifier(text(type_token)) {
        return None;
    }
    index += 1;

    let mut declarators = Vec::new();
    loop {
        let name = *tokens.get(index)?;
        if !is_identifier(text(&name)) {
            return None;
        }
        index += 1;
        let mut slots = 1;
        if tokens.get(index).map(text) == Some("[") {
            slots = tokens.get(index + 1).map(text)?.parse().ok()?;
            if tokens.get(index + 2).map(text) != Some("]") {
                return None;
            }
            index += 3;
        }
        declarators.push(Declarator { name, slots });
        match tokens.get(index).map(text) {
            None => break,
            Some(",") => index += 1,
            Some(_) => return None,
        }
    }

    Some(Statement {
        storage,
        explicit,
        span,
        declarators,
    })
}

/// Parses `( key = value, key, ... )` starting at the opening parenthesis and
/// returns the index after the closing one plus every integer-valued key.
fn parse_layout<'a>(
    masked: &'a str,
    tokens: &[Token],
    open: usize,
) -> Option<(usize, Vec<(&'a str, u32)>)> {
    let text = |index: usize| tokens.get(index).map(|t| &masked[t.start..t.end]);
    if text(open)? != "(" {
        return None;
    }
    let mut values = Vec::new();
    let mut index = open + 1;
    loop {
        match text(index)? {
            ")" => return Some((index + 1, values)),
            "," => index += 1,
            key => {
                if text(index + 1) == Some("=") {
                    if let Some(value) = text(index + 2).and_then(|v| v.parse().ok()) {
                        values.push((key, value));
                    }
                    index += 3;
                } else {
                    index += 1;
                }
            }
        }
    }
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn is_identifier(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

//! Indentation-aware tokenizer.
//!
//! Produces a flat token stream with synthetic `Indent`/`Dedent`/`Newline`
//! tokens, the standard trick that lets a recursive-descent parser treat
//! block structure like braces. Blank and comment-only lines produce no
//! tokens, logical lines continue across brackets and backslash
//! continuations, and string literals arrive with their prefix already
//! applied (escapes decoded for plain strings, verbatim text for f-strings).

use crate::ParseError;

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    /// Identifier or keyword; the parser tells them apart.
    Name(String),
    /// Numeric literal, lexeme as written.
    Number(String),
    /// String literal, classified by prefix.
    Str { value: String, kind: StrKind },
    /// Operator or delimiter.
    Op(String),
    /// Logical end of line.
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

/// How a string token's `value` should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrKind {
    /// Decoded text content.
    Plain,
    /// Inner text as written, undecoded.
    Bytes,
    /// Whole literal verbatim, prefix and quotes included.
    FString,
}

/// A token with the 1-based line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub tok: Tok,
    pub line: u32,
}

/// Tokenizes a whole source file.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Tokenizer::new(source).run()
}

const TAB_SIZE: usize = 8;

struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    indents: Vec<usize>,
    depth: usize,
    tokens: Vec<Token>,
    at_line_start: bool,
}

impl Tokenizer {
    fn new(source: &str) -> Self {
        Tokenizer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            indents: vec![0],
            depth: 0,
            tokens: Vec::new(),
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                if !self.handle_line_start()? {
                    break;
                }
            }
            self.skip_spaces();
            let Some(ch) = self.peek() else { break };
            match ch {
                '#' => self.skip_comment(),
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        self.push(Tok::Newline);
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '\'' | '"' => self.lex_string(String::new())?,
                c if c.is_ascii_digit() => self.lex_number(),
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_number(),
                c if is_name_start(c) => self.lex_name_or_prefixed_string()?,
                _ => self.lex_operator()?,
            }
        }
        // A file can end without a trailing newline.
        if !self.at_line_start
            && !matches!(self.tokens.last(), None | Some(Token { tok: Tok::Newline, .. }))
        {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::EndMarker);
        Ok(self.tokens)
    }

    /// Measures indentation and emits `Indent`/`Dedent` tokens. Skips blank
    /// and comment-only lines entirely. Returns false at end of input.
    fn handle_line_start(&mut self) -> Result<bool, ParseError> {
        loop {
            let mut width = 0;
            loop {
                match self.peek() {
                    Some(' ') => {
                        width += 1;
                        self.pos += 1;
                    }
                    Some('\t') => {
                        width = (width / TAB_SIZE + 1) * TAB_SIZE;
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
            match self.peek() {
                None => return Ok(false),
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {
                    let current = *self.indents.last().unwrap_or(&0);
                    if width > current {
                        self.indents.push(width);
                        self.push(Tok::Indent);
                    } else if width < current {
                        while self.indents.len() > 1 && *self.indents.last().unwrap_or(&0) > width {
                            self.indents.pop();
                            self.push(Tok::Dedent);
                        }
                        if *self.indents.last().unwrap_or(&0) != width {
                            return Err(self
                                .error("unindent does not match any outer indentation level"));
                        }
                    }
                    self.at_line_start = false;
                    return Ok(true);
                }
            }
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn lex_name_or_prefixed_string(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(is_name_continue) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if name.len() <= 2
            && matches!(self.peek(), Some('\'') | Some('"'))
            && is_string_prefix(&name)
        {
            return self.lex_string_from(start, name);
        }
        self.push(Tok::Name(name));
        Ok(())
    }

    fn lex_string(&mut self, prefix: String) -> Result<(), ParseError> {
        let start = self.pos;
        self.lex_string_from(start, prefix)
    }

    /// Lexes a string literal. `start` is the offset of the prefix (for
    /// f-string verbatim capture) and `prefix` the already-consumed prefix.
    fn lex_string_from(&mut self, start: usize, prefix: String) -> Result<(), ParseError> {
        let lower = prefix.to_ascii_lowercase();
        let is_raw = lower.contains('r');
        let is_bytes = lower.contains('b');
        let is_fstring = lower.contains('f');
        let start_line = self.line;

        let quote = self.bump().unwrap_or('\'');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut value = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(ParseError::Syntax {
                    line: start_line,
                    message: "unterminated string literal".to_string(),
                });
            };
            if ch == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.pos += 2;
                    break;
                }
                value.push(ch);
            } else if ch == '\n' {
                if !triple {
                    return Err(ParseError::Syntax {
                        line: start_line,
                        message: "unterminated string literal".to_string(),
                    });
                }
                self.line += 1;
                value.push(ch);
            } else if ch == '\\' {
                let Some(next) = self.bump() else {
                    return Err(ParseError::Syntax {
                        line: start_line,
                        message: "unterminated string literal".to_string(),
                    });
                };
                if next == '\n' {
                    self.line += 1;
                }
                if is_raw || is_bytes || is_fstring {
                    value.push(ch);
                    value.push(next);
                } else {
                    push_escaped(&mut value, next, &mut self.pos, &self.chars);
                }
            } else {
                value.push(ch);
            }
        }

        let (kind, value) = if is_fstring {
            let verbatim: String = self.chars[start..self.pos].iter().collect();
            (StrKind::FString, verbatim)
        } else if is_bytes {
            (StrKind::Bytes, value)
        } else {
            (StrKind::Plain, value)
        };
        self.tokens.push(Token {
            tok: Tok::Str { value, kind },
            line: start_line,
        });
        Ok(())
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        if self.peek() == Some('0')
            && matches!(
                self.peek_at(1),
                Some('x') | Some('X') | Some('o') | Some('O') | Some('b') | Some('B')
            )
        {
            self.pos += 2;
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                self.pos += 1;
            }
        } else {
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.pos += 1;
            }
            if self.peek() == Some('.') && self.peek_at(1).is_none_or(|c| c != '.') {
                self.pos += 1;
                while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(), Some('e') | Some('E'))
                && (self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                    || (matches!(self.peek_at(1), Some('+') | Some('-'))
                        && self.peek_at(2).is_some_and(|c| c.is_ascii_digit())))
            {
                self.pos += 2;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(), Some('j') | Some('J')) {
                self.pos += 1;
            }
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        self.push(Tok::Number(raw));
    }

    fn lex_operator(&mut self) -> Result<(), ParseError> {
        const THREE: [&str; 5] = ["**=", "//=", ">>=", "<<=", "..."];
        const TWO: [&str; 19] = [
            "**", "//", ">>", "<<", "<=", ">=", "==", "!=", "->", ":=", "+=", "-=", "*=", "/=",
            "%=", "@=", "&=", "|=", "^=",
        ];
        let remaining = self.chars.len() - self.pos;
        if remaining >= 3 {
            let three: String = self.chars[self.pos..self.pos + 3].iter().collect();
            if THREE.contains(&three.as_str()) {
                self.pos += 3;
                self.track_depth(&three);
                self.push(Tok::Op(three));
                return Ok(());
            }
        }
        if remaining >= 2 {
            let two: String = self.chars[self.pos..self.pos + 2].iter().collect();
            if TWO.contains(&two.as_str()) {
                self.pos += 2;
                self.push(Tok::Op(two));
                return Ok(());
            }
        }
        let ch = self.bump().unwrap_or('\0');
        if !"+-*/%@&|^~<>()[]{},:.;=".contains(ch) {
            return Err(self.error(format!("unexpected character {ch:?}")));
        }
        let op = ch.to_string();
        self.track_depth(&op);
        self.push(Tok::Op(op));
        Ok(())
    }

    fn track_depth(&mut self, op: &str) {
        match op {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
    }
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_name_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_string_prefix(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "r" | "b" | "u" | "f" | "rb" | "br" | "fr" | "rf"
    )
}

/// Decodes one escape sequence into `out`. `pos` is past the escaped char;
/// multi-character escapes advance it further.
fn push_escaped(out: &mut String, escaped: char, pos: &mut usize, chars: &[char]) {
    match escaped {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        '\\' => out.push('\\'),
        '\'' => out.push('\''),
        '"' => out.push('"'),
        '0' => out.push('\0'),
        '\n' => {}
        'x' => {
            let hex: String = chars[*pos..chars.len().min(*pos + 2)].iter().collect();
            if hex.len() == 2 {
                if let Ok(code) = u32::from_str_radix(&hex, 16) {
                    if let Some(ch) = char::from_u32(code) {
                        out.push(ch);
                        *pos += 2;
                        return;
                    }
                }
            }
            out.push('\\');
            out.push('x');
        }
        other => {
            // Unknown escapes keep the backslash, as the reference
            // tokenizer does.
            out.push('\\');
            out.push(other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        let mut toks: Vec<Tok> = tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|t| t.tok)
            .collect();
        assert_eq!(toks.pop(), Some(Tok::EndMarker));
        toks
    }

    fn name(n: &str) -> Tok {
        Tok::Name(n.to_string())
    }

    fn op(o: &str) -> Tok {
        Tok::Op(o.to_string())
    }

    fn plain(s: &str) -> Tok {
        Tok::Str {
            value: s.to_string(),
            kind: StrKind::Plain,
        }
    }

    #[test]
    fn names_and_numbers() {
        assert_eq!(
            kinds("x = 10\n"),
            vec![name("x"), op("="), Tok::Number("10".to_string()), Tok::Newline]
        );
        assert_eq!(
            kinds("y = 1.5e3\n"),
            vec![name("y"), op("="), Tok::Number("1.5e3".to_string()), Tok::Newline]
        );
    }

    #[test]
    fn indent_dedent_pairs() {
        assert_eq!(
            kinds("if x:\n    pass\n"),
            vec![
                name("if"),
                name("x"),
                op(":"),
                Tok::Newline,
                Tok::Indent,
                name("pass"),
                Tok::Newline,
                Tok::Dedent,
            ]
        );
    }

    #[test]
    fn blank_and_comment_lines_are_invisible() {
        assert_eq!(
            kinds("a = 1\n\n# comment\n   # indented comment\nb = 2\n"),
            vec![
                name("a"),
                op("="),
                Tok::Number("1".to_string()),
                Tok::Newline,
                name("b"),
                op("="),
                Tok::Number("2".to_string()),
                Tok::Newline,
            ]
        );
    }

    #[test]
    fn brackets_join_lines() {
        assert_eq!(
            kinds("x = [1,\n     2]\n"),
            vec![
                name("x"),
                op("="),
                op("["),
                Tok::Number("1".to_string()),
                op(","),
                Tok::Number("2".to_string()),
                op("]"),
                Tok::Newline,
            ]
        );
    }

    #[test]
    fn string_variants() {
        assert_eq!(kinds("'abc'\n"), vec![plain("abc"), Tok::Newline]);
        assert_eq!(kinds("\"a\\nb\"\n"), vec![plain("a\nb"), Tok::Newline]);
        assert_eq!(
            kinds("r'a\\nb'\n"),
            vec![plain("a\\nb"), Tok::Newline],
            "raw strings keep backslashes"
        );
        assert_eq!(
            kinds("b'oct'\n"),
            vec![
                Tok::Str {
                    value: "oct".to_string(),
                    kind: StrKind::Bytes
                },
                Tok::Newline
            ]
        );
        assert_eq!(
            kinds("f'{x}'\n"),
            vec![
                Tok::Str {
                    value: "f'{x}'".to_string(),
                    kind: StrKind::FString
                },
                Tok::Newline
            ]
        );
    }

    #[test]
    fn triple_quoted_strings_span_lines() {
        let toks = tokenize("'''one\ntwo'''\nx = 1\n").expect("tokenize");
        assert_eq!(toks[0].tok, plain("one\ntwo"));
        assert_eq!(toks[0].line, 1);
        // The statement after the string starts on line 3.
        assert_eq!(toks[2].tok, name("x"));
        assert_eq!(toks[2].line, 3);
    }

    #[test]
    fn backslash_continuation() {
        assert_eq!(
            kinds("x = 1 + \\\n    2\n"),
            vec![
                name("x"),
                op("="),
                Tok::Number("1".to_string()),
                op("+"),
                Tok::Number("2".to_string()),
                Tok::Newline,
            ]
        );
    }

    #[test]
    fn dedent_must_match() {
        let err = tokenize("if x:\n        pass\n  pass\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 3, .. }));
    }

    #[test]
    fn missing_trailing_newline() {
        assert_eq!(
            kinds("x = 1"),
            vec![name("x"), op("="), Tok::Number("1".to_string()), Tok::Newline]
        );
    }

    #[test]
    fn operators_longest_match() {
        assert_eq!(
            kinds("a **= 2\n"),
            vec![name("a"), op("**="), Tok::Number("2".to_string()), Tok::Newline]
        );
        assert_eq!(kinds("...\n"), vec![op("..."), Tok::Newline]);
    }
}

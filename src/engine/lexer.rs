//! Tokenizer
//!
//! Turns source text into tokens, including the `Newline`/`Indent`/`Dedent`
//! tokens that carry block structure. Newlines inside brackets are ignored.

use super::error::{EvalError, EvalResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    /// Body of an f-string, escapes already processed.
    FStr(String),
    Name(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

const OPERATORS: &[&str] = &[
    "**=", "//=", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "**", "//", "->", "+", "-",
    "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";",
];

const TAB_SIZE: usize = 8;

pub fn tokenize(src: &str) -> EvalResult<Vec<Token>> {
    Lexer::new(src).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    at_line_start: bool,
    indents: Vec<usize>,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            depth: 0,
            at_line_start: true,
            indents: vec![0],
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::syntax(message, self.line)
    }

    fn run(mut self) -> EvalResult<Vec<Token>> {
        loop {
            if self.at_line_start && self.depth == 0 {
                if !self.indentation()? {
                    break;
                }
                continue;
            }

            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\x0c' | '\r' => self.pos += 1,
                '#' => self.skip_comment(),
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.end_logical_line();
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '\\' if self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n') => {
                    self.pos += 3;
                    self.line += 1;
                }
                '"' | '\'' => self.string(false, false)?,
                c if c.is_ascii_digit() => self.number()?,
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.name()?,
                _ => self.operator()?,
            }
        }

        self.end_logical_line();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(self.tokens)
    }

    fn end_logical_line(&mut self) {
        if matches!(self.tokens.last(), Some(t) if t.tok != Tok::Newline) {
            self.push(Tok::Newline);
        }
    }

    /// Measure indentation at the start of a line and emit block tokens.
    /// Returns `false` at end of input.
    fn indentation(&mut self) -> EvalResult<bool> {
        let mut col = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => col += 1,
                '\t' => col = (col / TAB_SIZE + 1) * TAB_SIZE,
                '\x0c' => col = 0,
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek() {
            None => return Ok(false),
            Some('#') => {
                self.skip_comment();
                return Ok(true);
            }
            Some('\r') => {
                self.pos += 1;
                return Ok(true);
            }
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                return Ok(true);
            }
            _ => {}
        }

        self.at_line_start = false;
        let current = self.indents.last().copied().unwrap_or(0);
        if col > current {
            if self.tokens.is_empty() {
                return Err(self.error("unexpected indent"));
            }
            self.indents.push(col);
            self.push(Tok::Indent);
        } else if col < current {
            while self.indents.last().is_some_and(|&level| col < level) {
                self.indents.pop();
                self.push(Tok::Dedent);
            }
            if self.indents.last().copied() != Some(col) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(true)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn name(&mut self) -> EvalResult<()> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let ident: String = self.chars[start..self.pos].iter().collect();

        if matches!(self.peek(), Some('"') | Some('\'')) {
            match ident.to_ascii_lowercase().as_str() {
                "f" => return self.string(false, true),
                "r" => return self.string(true, false),
                "rf" | "fr" => return self.string(true, true),
                _ => {}
            }
        }

        self.push(Tok::Name(ident));
        Ok(())
    }

    fn number(&mut self) -> EvalResult<()> {
        let start = self.pos;

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| c.is_digit(radix) || c == '_')
                {
                    self.pos += 1;
                }
                let digits: String = self.chars[digits_start..self.pos]
                    .iter()
                    .filter(|c| **c != '_')
                    .collect();
                let value = i64::from_str_radix(&digits, radix)
                    .map_err(|_| self.error("invalid integer literal"))?;
                self.check_literal_end()?;
                self.push(Tok::Int(value));
                return Ok(());
            }
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') {
            is_float = true;
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+') | Some('-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                self.digits();
            }
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        self.check_literal_end()?;

        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error("invalid decimal literal"))?;
            self.push(Tok::Float(value));
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| self.error("integer literal too large"))?;
            self.push(Tok::Int(value));
        }
        Ok(())
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
    }

    fn check_literal_end(&self) -> EvalResult<()> {
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(self.error("invalid decimal literal"));
        }
        Ok(())
    }

    fn string(&mut self, raw: bool, formatted: bool) -> EvalResult<()> {
        let start_line = self.line;
        let quote = self.peek().unwrap_or('"');
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                let message = if triple {
                    format!(
                        "unterminated triple-quoted string literal (detected at line {})",
                        self.line
                    )
                } else {
                    format!("unterminated string literal (detected at line {})", self.line)
                };
                return Err(EvalError::syntax(message, start_line));
            };

            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }

            match c {
                '\n' if !triple => {
                    return Err(EvalError::syntax(
                        format!("unterminated string literal (detected at line {})", self.line),
                        start_line,
                    ));
                }
                '\n' => {
                    value.push('\n');
                    self.line += 1;
                    self.pos += 1;
                }
                '\\' => self.escape(raw, &mut value),
                _ => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }

        let tok = if formatted {
            Tok::FStr(value)
        } else {
            Tok::Str(value)
        };
        self.tokens.push(Token {
            tok,
            line: start_line,
        });
        Ok(())
    }

    /// Handle a backslash inside a string literal.
    fn escape(&mut self, raw: bool, value: &mut String) {
        let next = self.peek_at(1);
        if raw {
            value.push('\\');
            if let Some(n) = next {
                value.push(n);
                if n == '\n' {
                    self.line += 1;
                }
                self.pos += 2;
            } else {
                self.pos += 1;
            }
            return;
        }

        let Some(n) = next else {
            value.push('\\');
            self.pos += 1;
            return;
        };
        self.pos += 2;
        match n {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '0' => value.push('\0'),
            '\\' => value.push('\\'),
            '\'' => value.push('\''),
            '"' => value.push('"'),
            '\n' => self.line += 1,
            'x' | 'u' => {
                let len = if n == 'x' { 2 } else { 4 };
                let hex: String = self.chars[self.pos..].iter().take(len).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) if hex.len() == len => {
                        value.push(ch);
                        self.pos += len;
                    }
                    _ => {
                        value.push('\\');
                        value.push(n);
                    }
                }
            }
            other => {
                value.push('\\');
                value.push(other);
            }
        }
    }

    fn operator(&mut self) -> EvalResult<()> {
        for op in OPERATORS {
            let len = op.chars().count();
            let matches = op
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if !matches {
                continue;
            }

            match *op {
                "(" | "[" | "{" => self.depth += 1,
                ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            self.pos += len;
            self.push(Tok::Op(op));
            return Ok(());
        }

        let c = self.peek().unwrap_or('\0');
        Err(self.error(format!("invalid character '{}' (U+{:04X})", c, c as u32)))
    }
}

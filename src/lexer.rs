//! Tokenizer for the assembler dialect
//!
//! The lexer scans left to right and produces one token per call. Most of
//! it is a plain character-class scanner; the exception is `+` and `-`,
//! which are context-sensitive (macro call, anonymous label, or operator)
//! and need a small lookbehind within the current line. That decision is
//! concentrated in [`Lexer::lex_plus`] and [`Lexer::lex_minus`].

use crate::assembler::AsmError;

/// A span of text in the source, in byte offsets. Used to slice raw
/// argument text back out of a line and to underline errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenSpan {
    start: usize,
    end: usize,
}

impl TokenSpan {
    /// Create a new token span
    pub fn new(start: usize, end: usize) -> TokenSpan {
        TokenSpan { start, end }
    }

    /// Get the start offset of the token span
    pub fn start(&self) -> usize {
        self.start
    }

    /// Get the end offset of the token span
    pub fn end(&self) -> usize {
        self.end
    }
}

/// What a single token is, with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    Eol,
    /// Numeric literal, 32-bit signed ($ hex, % binary, decimal)
    Number(i32),
    /// String literal payload, owned bytes with escapes applied
    Str(Vec<u8>),
    /// Character literal, a single byte with escapes applied
    Char(u8),
    Ident(String),
    /// Identifier starting with `.`; the dot is part of the token text
    LocalIdent(String),
    /// Directive name without the leading `!`
    Directive(String),
    /// Macro invocation `+name`; the name is part of the token
    MacroCall(String),
    /// A run of `+` characters naming a forward anonymous label
    AnonForward(usize),
    /// A run of `-` characters naming a backward anonymous label
    AnonBackward(usize),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pipe,
    Caret,
    Amp,
    Tilde,
    Bang,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    NotEq,
    Shl,
    Shr,
    Equals,
    Hash,
    Comma,
    LParen,
    RParen,
    Colon,
}

/// A token with its source location
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TokenSpan,
    /// 1-based source line
    pub line: usize,
    /// 1-based column of the first character
    pub column: usize,
}

/// Human-readable shape of a token, for error messages
pub fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Eol => "end of line".to_string(),
        TokenKind::Number(value) => format!("number {}", value),
        TokenKind::Str(_) => "string".to_string(),
        TokenKind::Char(value) => format!("character '{}'", *value as char),
        TokenKind::Ident(name) => format!("\"{}\"", name),
        TokenKind::LocalIdent(name) => format!("\"{}\"", name),
        TokenKind::Directive(name) => format!("\"!{}\"", name),
        TokenKind::MacroCall(name) => format!("\"+{}\"", name),
        TokenKind::AnonForward(count) => "+".repeat(*count),
        TokenKind::AnonBackward(count) => "-".repeat(*count),
        TokenKind::Plus => "\"+\"".to_string(),
        TokenKind::Minus => "\"-\"".to_string(),
        TokenKind::Star => "\"*\"".to_string(),
        TokenKind::Slash => "\"/\"".to_string(),
        TokenKind::Percent => "\"%\"".to_string(),
        TokenKind::Pipe => "\"|\"".to_string(),
        TokenKind::Caret => "\"^\"".to_string(),
        TokenKind::Amp => "\"&\"".to_string(),
        TokenKind::Tilde => "\"~\"".to_string(),
        TokenKind::Bang => "\"!\"".to_string(),
        TokenKind::Less => "\"<\"".to_string(),
        TokenKind::Greater => "\">\"".to_string(),
        TokenKind::LessEq => "\"<=\"".to_string(),
        TokenKind::GreaterEq => "\">=\"".to_string(),
        TokenKind::NotEq => "\"<>\"".to_string(),
        TokenKind::Shl => "\"<<\"".to_string(),
        TokenKind::Shr => "\">>\"".to_string(),
        TokenKind::Equals => "\"=\"".to_string(),
        TokenKind::Hash => "\"#\"".to_string(),
        TokenKind::Comma => "\",\"".to_string(),
        TokenKind::LParen => "\"(\"".to_string(),
        TokenKind::RParen => "\")\"".to_string(),
        TokenKind::Colon => "\":\"".to_string(),
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Decode a character following a backslash. `\n` and `\r` both map to
/// 0x0D, the PETSCII newline.
fn escape_byte(escape: u8) -> Option<u8> {
    match escape {
        b'n' => Some(0x0d),
        b'r' => Some(0x0d),
        b't' => Some(0x09),
        b'\\' => Some(0x5c),
        b'\'' => Some(0x27),
        b'"' => Some(0x22),
        b'0' => Some(0x00),
        _ => None,
    }
}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Lexer<'a> {
        Lexer {
            source: text.as_bytes(),
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn skip_blanks_and_comments(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' | b'\r' => {
                    self.pos += 1;
                }
                b';' => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: TokenSpan::new(start, self.pos),
            line: self.line,
            column: start - self.line_start + 1,
        }
    }

    /// Produce the next token. Errors are lexical (unterminated literal,
    /// numeric overflow, unexpected character).
    pub fn next_token(&mut self) -> Result<Token, AsmError> {
        self.skip_blanks_and_comments();
        let start = self.pos;
        let byte = match self.peek() {
            None => return Ok(self.token(TokenKind::Eof, start)),
            Some(byte) => byte,
        };

        match byte {
            b'\n' => {
                self.pos += 1;
                let token = Token {
                    kind: TokenKind::Eol,
                    span: TokenSpan::new(start, self.pos),
                    line: self.line,
                    column: start - self.line_start + 1,
                };
                self.line += 1;
                self.line_start = self.pos;
                Ok(token)
            }
            b'0'..=b'9' => self.lex_decimal(start),
            b'$' => self.lex_hex(start),
            b'%' => match self.peek_at(1) {
                Some(b'0') | Some(b'1') => self.lex_binary(start),
                _ => {
                    self.pos += 1;
                    Ok(self.token(TokenKind::Percent, start))
                }
            },
            b'\'' => self.lex_char(start),
            b'"' => self.lex_string(start),
            b'.' => {
                if self.peek_at(1).is_some_and(is_ident_start) {
                    self.pos += 1;
                    let name = self.lex_ident_text();
                    Ok(self.token(TokenKind::LocalIdent(format!(".{}", name)), start))
                } else {
                    Err(AsmError::UnexpectedCharacter { character: '.' })
                }
            }
            b'!' => self.lex_bang(start),
            b'+' => self.lex_plus(start),
            b'-' => self.lex_minus(start),
            b'*' => self.single(TokenKind::Star, start),
            b'/' => self.single(TokenKind::Slash, start),
            b'|' => self.single(TokenKind::Pipe, start),
            b'^' => self.single(TokenKind::Caret, start),
            b'&' => self.single(TokenKind::Amp, start),
            b'~' => self.single(TokenKind::Tilde, start),
            b'=' => self.single(TokenKind::Equals, start),
            b'#' => self.single(TokenKind::Hash, start),
            b',' => self.single(TokenKind::Comma, start),
            b'(' => self.single(TokenKind::LParen, start),
            b')' => self.single(TokenKind::RParen, start),
            b':' => self.single(TokenKind::Colon, start),
            b'<' => {
                self.pos += 1;
                let kind = match self.peek() {
                    Some(b'<') => {
                        self.pos += 1;
                        TokenKind::Shl
                    }
                    Some(b'=') => {
                        self.pos += 1;
                        TokenKind::LessEq
                    }
                    Some(b'>') => {
                        self.pos += 1;
                        TokenKind::NotEq
                    }
                    _ => TokenKind::Less,
                };
                Ok(self.token(kind, start))
            }
            b'>' => {
                self.pos += 1;
                let kind = match self.peek() {
                    Some(b'>') => {
                        self.pos += 1;
                        TokenKind::Shr
                    }
                    Some(b'=') => {
                        self.pos += 1;
                        TokenKind::GreaterEq
                    }
                    _ => TokenKind::Greater,
                };
                Ok(self.token(kind, start))
            }
            _ => {
                if is_ident_start(byte) {
                    let name = self.lex_ident_text();
                    Ok(self.token(TokenKind::Ident(name), start))
                } else {
                    Err(AsmError::UnexpectedCharacter {
                        character: byte as char,
                    })
                }
            }
        }
    }

    fn single(&mut self, kind: TokenKind, start: usize) -> Result<Token, AsmError> {
        self.pos += 1;
        Ok(self.token(kind, start))
    }

    fn lex_ident_text(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }

    fn lex_decimal(&mut self, start: usize) -> Result<Token, AsmError> {
        let digits_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap_or("");
        let value: i64 = text.parse().map_err(|_| AsmError::NumberOverflow)?;
        if value > i32::MAX as i64 {
            return Err(AsmError::NumberOverflow);
        }
        Ok(self.token(TokenKind::Number(value as i32), start))
    }

    fn lex_hex(&mut self, start: usize) -> Result<Token, AsmError> {
        self.pos += 1;
        let digits_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        let digits = self.pos - digits_start;
        if digits == 0 || digits > 8 {
            return Err(AsmError::NumberOverflow);
        }
        let text = std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap_or("");
        let value = u32::from_str_radix(text, 16).map_err(|_| AsmError::NumberOverflow)?;
        Ok(self.token(TokenKind::Number(value as i32), start))
    }

    fn lex_binary(&mut self, start: usize) -> Result<Token, AsmError> {
        self.pos += 1;
        let mut bits = 0usize;
        let mut value = 0u32;
        while let Some(byte) = self.peek() {
            match byte {
                b'0' | b'1' => {
                    bits += 1;
                    if bits > 32 {
                        return Err(AsmError::NumberOverflow);
                    }
                    value = (value << 1) | (byte - b'0') as u32;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        Ok(self.token(TokenKind::Number(value as i32), start))
    }

    fn lex_char(&mut self, start: usize) -> Result<Token, AsmError> {
        self.pos += 1;
        let value = match self.bump() {
            None | Some(b'\n') => return Err(AsmError::UnterminatedChar),
            Some(b'\\') => {
                let escape = self.bump().ok_or(AsmError::UnterminatedChar)?;
                escape_byte(escape).ok_or(AsmError::UnknownEscape {
                    escape: escape as char,
                })?
            }
            Some(byte) => byte,
        };
        match self.bump() {
            Some(b'\'') => Ok(self.token(TokenKind::Char(value), start)),
            _ => Err(AsmError::UnterminatedChar),
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, AsmError> {
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => return Err(AsmError::UnterminatedString),
                Some(b'"') => break,
                Some(b'\\') => {
                    let escape = self.bump().ok_or(AsmError::UnterminatedString)?;
                    bytes.push(escape_byte(escape).ok_or(AsmError::UnknownEscape {
                        escape: escape as char,
                    })?);
                }
                Some(byte) => bytes.push(byte),
            }
        }
        Ok(self.token(TokenKind::Str(bytes), start))
    }

    /// `!` followed by a letter, or by exactly the two digits 08/16/24/32,
    /// is a directive; a bare `!` is the logical-not operator.
    fn lex_bang(&mut self, start: usize) -> Result<Token, AsmError> {
        match self.peek_at(1) {
            Some(byte) if byte.is_ascii_alphabetic() => {
                self.pos += 1;
                let name = self.lex_ident_text();
                Ok(self.token(TokenKind::Directive(name), start))
            }
            Some(b'0') | Some(b'1') | Some(b'2') | Some(b'3') => {
                let pair = (self.peek_at(1), self.peek_at(2));
                let two_digits = matches!(
                    pair,
                    (Some(b'0'), Some(b'8'))
                        | (Some(b'1'), Some(b'6'))
                        | (Some(b'2'), Some(b'4'))
                        | (Some(b'3'), Some(b'2'))
                );
                if two_digits && !self.peek_at(3).is_some_and(is_ident_continue) {
                    self.pos += 1;
                    let name = format!(
                        "{}{}",
                        self.bump().unwrap_or(b'0') as char,
                        self.bump().unwrap_or(b'0') as char
                    );
                    Ok(self.token(TokenKind::Directive(name), start))
                } else {
                    self.single(TokenKind::Bang, start)
                }
            }
            _ => self.single(TokenKind::Bang, start),
        }
    }

    /// True when everything to the left of `start` on the current line is
    /// blank, or the nearest non-blank character is `:` (a label
    /// terminator). In both cases a `+` run opens a statement.
    fn at_statement_start(&self, start: usize) -> bool {
        let mut index = start;
        while index > self.line_start {
            index -= 1;
            match self.source[index] {
                b' ' | b'\t' => continue,
                b':' => return true,
                _ => return false,
            }
        }
        true
    }

    /// Disambiguate a run of `+` characters:
    /// - statement position, run of 1, identifier follows: macro call
    /// - expression position, identifier follows: the `+` operator
    /// - run of 1 before a non-identifier primary starter: `+` operator
    /// - anything else: forward anonymous label of the run's length
    fn lex_plus(&mut self, start: usize) -> Result<Token, AsmError> {
        let mut run = 0usize;
        while self.peek() == Some(b'+') {
            self.pos += 1;
            run += 1;
        }
        let next = self.peek();
        if next.is_some_and(is_ident_start) {
            if self.at_statement_start(start) {
                if run == 1 {
                    let name = self.lex_ident_text();
                    return Ok(self.token(TokenKind::MacroCall(name), start));
                }
                return Ok(self.token(TokenKind::AnonForward(run), start));
            }
            // inside an expression the whole run is the + operator and
            // the identifier is the next token
            return Ok(self.token(TokenKind::Plus, start));
        }
        let primary_starter = matches!(
            next,
            Some(b'0'..=b'9')
                | Some(b'$')
                | Some(b'%')
                | Some(b'(')
                | Some(b'\'')
                | Some(b'*')
                | Some(b'<')
                | Some(b'>')
                | Some(b'-')
                | Some(b'~')
                | Some(b'!')
        );
        if run == 1 && primary_starter {
            Ok(self.token(TokenKind::Plus, start))
        } else {
            Ok(self.token(TokenKind::AnonForward(run), start))
        }
    }

    /// Disambiguate a run of `-` characters: a run of 1 before a primary
    /// starter is the `-` operator, anything else is a backward anonymous
    /// label of the run's length.
    fn lex_minus(&mut self, start: usize) -> Result<Token, AsmError> {
        let mut run = 0usize;
        while self.peek() == Some(b'-') {
            self.pos += 1;
            run += 1;
        }
        let next = self.peek();
        let primary_starter = matches!(
            next,
            Some(b'0'..=b'9') | Some(b'$') | Some(b'%') | Some(b'(')
        ) || next.is_some_and(is_ident_start);
        if run == 1 && primary_starter {
            Ok(self.token(TokenKind::Minus, start))
        } else {
            Ok(self.token(TokenKind::AnonBackward(run), start))
        }
    }
}

/// A one-token-lookahead cursor over a [`Lexer`]. The expression parser
/// needs to peek one token past the current one (to decide whether an
/// anonymous-label token plays an operator role) and to split an
/// anonymous run into an operator plus a shorter run.
pub struct TokenCursor<'a> {
    lexer: Lexer<'a>,
    current: Token,
    lookahead: Option<Token>,
}

impl<'a> TokenCursor<'a> {
    pub fn new(text: &'a str) -> Result<TokenCursor<'a>, AsmError> {
        let mut lexer = Lexer::new(text);
        let current = lexer.next_token()?;
        Ok(TokenCursor {
            lexer,
            current,
            lookahead: None,
        })
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn kind(&self) -> &TokenKind {
        &self.current.kind
    }

    /// Advance, returning the token that was current
    pub fn bump(&mut self) -> Result<Token, AsmError> {
        let next = match self.lookahead.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };
        Ok(std::mem::replace(&mut self.current, next))
    }

    /// Look one token past the current one without advancing
    pub fn peek_next(&mut self) -> Result<&Token, AsmError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(self.lookahead.as_ref().unwrap())
    }

    /// Rewrite the current token in place. Used to peel one `+`/`-` off an
    /// anonymous-label run when it takes an operator role.
    pub fn replace_kind(&mut self, kind: TokenKind) {
        self.current.kind = kind;
    }

    pub fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eol | TokenKind::Eof)
    }
}

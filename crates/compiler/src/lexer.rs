//! Single-pass lexer for Nano source text.
//!
//! Skips spaces, carriage returns, tabs and `#` comments. Emits an `Eol`
//! token for every newline (including the one ending a comment) and a
//! terminating `Eof`. Keywords are case-insensitive and only match when not
//! followed by an identifier character, so `andy` lexes as one identifier
//! rather than `and` + `y`.

use nano_core::LineInfo;

use crate::errors::{self, Result};
use crate::token::{Token, TokenKind, TokenStream};

/// Keyword spellings; no keyword is a prefix of another, so match order is
/// free.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("and", TokenKind::And),
    ("const", TokenKind::Const),
    ("end", TokenKind::End),
    ("else", TokenKind::Else),
    ("function", TokenKind::Func),
    ("for", TokenKind::For),
    ("if", TokenKind::If),
    ("import", TokenKind::Import),
    ("not", TokenKind::Not),
    ("none", TokenKind::None),
    ("or", TokenKind::Or),
    ("return", TokenKind::Return),
    ("to", TokenKind::To),
    ("var", TokenKind::Var),
    ("while", TokenKind::While),
];

pub struct Lexer {
    stream: TokenStream,
}

impl Lexer {
    pub fn new() -> Self {
        Lexer {
            stream: TokenStream::new(),
        }
    }

    pub fn stream(&mut self) -> &mut TokenStream {
        &mut self.stream
    }

    pub fn into_stream(self) -> TokenStream {
        self.stream
    }

    pub fn reset(&mut self) {
        self.stream.reset();
    }

    /// Lex one source file into the token stream.
    pub fn lex(&mut self, source: &str, file_no: i32) -> Result<()> {
        let bytes = source.as_bytes();
        let mut pos = 0usize;
        let mut line = LineInfo::new(file_no, 1);

        while pos < bytes.len() {
            let ch = bytes[pos];

            match ch {
                b' ' | b'\r' | b'\t' => {
                    pos += 1;
                    continue;
                }
                b'\n' => {
                    self.push(TokenKind::Eol, line);
                    line.line += 1;
                    pos += 1;
                    continue;
                }
                b'#' => {
                    while pos < bytes.len() && bytes[pos] != b'\n' {
                        pos += 1;
                    }
                    self.push(TokenKind::Eol, line);
                    line.line += 1;
                    pos += 1;
                    continue;
                }
                b'"' => {
                    let start = pos + 1;
                    let mut end = start;
                    loop {
                        if end >= bytes.len() || bytes[end] == b'\n' {
                            return Err(errors::string_quote_mismatch(line));
                        }
                        if bytes[end] == b'"' {
                            break;
                        }
                        end += 1;
                    }
                    let text = &source[start..end];
                    self.stream
                        .push(Token::with_text(TokenKind::String, text, line));
                    pos = end + 1;
                    continue;
                }
                b'(' => {
                    self.push(TokenKind::LParen, line);
                    pos += 1;
                    continue;
                }
                b')' => {
                    self.push(TokenKind::RParen, line);
                    pos += 1;
                    continue;
                }
                b'[' => {
                    self.push(TokenKind::LBracket, line);
                    pos += 1;
                    continue;
                }
                b']' => {
                    self.push(TokenKind::RBracket, line);
                    pos += 1;
                    continue;
                }
                b',' => {
                    self.push(TokenKind::Comma, line);
                    pos += 1;
                    continue;
                }
                b'+' => {
                    self.push(TokenKind::Add, line);
                    pos += 1;
                    continue;
                }
                b'-' => {
                    self.push(TokenKind::Sub, line);
                    pos += 1;
                    continue;
                }
                b'*' => {
                    self.push(TokenKind::Mul, line);
                    pos += 1;
                    continue;
                }
                b'/' => {
                    self.push(TokenKind::Div, line);
                    pos += 1;
                    continue;
                }
                b'%' => {
                    self.push(TokenKind::Mod, line);
                    pos += 1;
                    continue;
                }
                b'=' => {
                    if bytes.get(pos + 1) == Some(&b'=') {
                        self.push(TokenKind::Eq, line);
                        pos += 2;
                    } else {
                        self.push(TokenKind::Assign, line);
                        pos += 1;
                    }
                    continue;
                }
                b'<' => {
                    if bytes.get(pos + 1) == Some(&b'=') {
                        self.push(TokenKind::Leq, line);
                        pos += 2;
                    } else {
                        self.push(TokenKind::Lt, line);
                        pos += 1;
                    }
                    continue;
                }
                b'>' => {
                    if bytes.get(pos + 1) == Some(&b'=') {
                        self.push(TokenKind::Geq, line);
                        pos += 2;
                    } else {
                        self.push(TokenKind::Gt, line);
                        pos += 1;
                    }
                    continue;
                }
                _ => {}
            }

            if is_numeric(ch) {
                pos = self.lex_number(source, pos, line);
                continue;
            }

            if is_alpha(ch) {
                if let Some((len, kind)) = munch_keyword(&bytes[pos..]) {
                    self.push(kind, line);
                    pos += len;
                    continue;
                }
                let start = pos;
                while pos < bytes.len() && is_alpha_numeric(bytes[pos]) {
                    pos += 1;
                }
                self.stream
                    .push(Token::with_text(TokenKind::Ident, &source[start..pos], line));
                continue;
            }

            return Err(errors::unexpected_character(line, ch as char));
        }

        self.push(TokenKind::Eof, line);
        Ok(())
    }

    /// Scan digits with at most one decimal point; returns the new position.
    fn lex_number(&mut self, source: &str, start: usize, line: LineInfo) -> usize {
        let bytes = source.as_bytes();
        let mut pos = start;
        while pos < bytes.len() && is_numeric(bytes[pos]) {
            pos += 1;
        }
        let mut is_float = false;
        if bytes.get(pos) == Some(&b'.') {
            is_float = true;
            pos += 1;
            while pos < bytes.len() && is_numeric(bytes[pos]) {
                pos += 1;
            }
        }
        let text = &source[start..pos];
        if is_float {
            let value: f32 = text.parse().unwrap_or(0.0);
            self.stream.push(Token::float(value, line));
        } else {
            // decimal accumulate with wrap, mirroring 32-bit overflow
            let mut value: i32 = 0;
            for b in text.bytes() {
                value = value.wrapping_mul(10).wrapping_add((b - b'0') as i32);
            }
            self.stream.push(Token::int(value, line));
        }
        pos
    }

    fn push(&mut self, kind: TokenKind, line: LineInfo) {
        self.stream.push(Token::plain(kind, line));
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Lexer::new()
    }
}

fn is_alpha(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_numeric(b: u8) -> bool {
    b.is_ascii_digit()
}

fn is_alpha_numeric(b: u8) -> bool {
    is_alpha(b) || is_numeric(b)
}

/// Try to match a keyword at the head of `rest`, case-insensitively.
///
/// A match is refused when the keyword is followed by another identifier
/// character so identifiers like `andy` or `iffy` stay whole.
fn munch_keyword(rest: &[u8]) -> Option<(usize, TokenKind)> {
    for (word, kind) in KEYWORDS {
        let w = word.as_bytes();
        if rest.len() < w.len() {
            continue;
        }
        if !rest[..w.len()].eq_ignore_ascii_case(w) {
            continue;
        }
        if rest.get(w.len()).copied().map(is_alpha_numeric) == Some(true) {
            continue;
        }
        return Some((w.len(), *kind));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new();
        lexer.lex(source, 0).unwrap();
        let mut out = Vec::new();
        loop {
            let tok = lexer.stream().pop();
            out.push(tok.kind);
            if tok.kind == TokenKind::Eof {
                break;
            }
        }
        out
    }

    #[test]
    fn keywords_do_not_split_identifiers() {
        use TokenKind::*;
        assert_eq!(lex_kinds("and andy"), vec![And, Ident, Eof]);
        assert_eq!(lex_kinds("or order"), vec![Or, Ident, Eof]);
        assert_eq!(lex_kinds("not nothing"), vec![Not, Ident, Eof]);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        use TokenKind::*;
        assert_eq!(lex_kinds("FUNCTION If WHILE"), vec![Func, If, While, Eof]);
    }

    #[test]
    fn two_char_operators_win() {
        use TokenKind::*;
        assert_eq!(lex_kinds("<= >= == = < >"), vec![Leq, Geq, Eq, Assign, Lt, Gt, Eof]);
    }

    #[test]
    fn numbers_and_floats() {
        let mut lexer = Lexer::new();
        lexer.lex("42 3.5", 0).unwrap();
        let a = lexer.stream().pop();
        assert_eq!(a.kind, TokenKind::Int);
        assert_eq!(a.int_value, 42);
        let b = lexer.stream().pop();
        assert_eq!(b.kind, TokenKind::Float);
        assert!((b.float_value - 3.5).abs() < 1e-6);
    }

    #[test]
    fn strings_capture_text() {
        let mut lexer = Lexer::new();
        lexer.lex("\"hello world\"", 0).unwrap();
        let tok = lexer.stream().pop();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.text, "hello world");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lexer = Lexer::new();
        let err = lexer.lex("\"oops\n", 0).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::StringQuoteMismatch);
    }

    #[test]
    fn comments_end_the_line() {
        use TokenKind::*;
        assert_eq!(lex_kinds("var x # trailing\nend"), vec![Var, Ident, Eol, End, Eof]);
    }

    #[test]
    fn line_numbers_advance_on_newline() {
        let mut lexer = Lexer::new();
        lexer.lex("var\nreturn", 3).unwrap();
        let a = lexer.stream().pop();
        assert_eq!(a.line, LineInfo::new(3, 1));
        let _eol = lexer.stream().pop();
        let b = lexer.stream().pop();
        assert_eq!(b.line, LineInfo::new(3, 2));
    }

    #[test]
    fn unexpected_character_reports_position() {
        let mut lexer = Lexer::new();
        let err = lexer.lex("var $", 0).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::UnexpectedCharacter);
        assert!(err.message.contains('$'));
    }
}

use crate::parser::ParseError;
use crate::span::Span;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Package,
    Import,
    Func,
    Type,
    Struct,
    Var,
    Const,
    Return,
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier {s:?}"),
            TokenKind::Int(n) => format!("integer {n}"),
            TokenKind::Float(x) => format!("float {x}"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("{other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tokenize a whole source file. Line comments (`//`) are skipped; build
/// constraints are extracted from raw source lines by the directory scanner,
/// not from the token stream.
pub fn tokenize(path: &Path, src: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(path, src).run()
}

struct Lexer<'a> {
    path: &'a Path,
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(path: &'a Path, src: &'a str) -> Self {
        Self {
            path,
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(start, start, line, column),
                });
                return Ok(tokens);
            };
            let kind = match c {
                b'(' => self.punct(TokenKind::LParen),
                b')' => self.punct(TokenKind::RParen),
                b'{' => self.punct(TokenKind::LBrace),
                b'}' => self.punct(TokenKind::RBrace),
                b'[' => self.punct(TokenKind::LBracket),
                b']' => self.punct(TokenKind::RBracket),
                b',' => self.punct(TokenKind::Comma),
                b'.' => self.punct(TokenKind::Dot),
                b'+' => self.punct(TokenKind::Plus),
                b'-' => self.punct(TokenKind::Minus),
                b'*' => self.punct(TokenKind::Star),
                b'/' => self.punct(TokenKind::Slash),
                b'=' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::EqEq
                    } else {
                        TokenKind::Assign
                    }
                }
                b'!' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::NotEq
                    } else {
                        return Err(self.error("unexpected character '!'", start, line, column));
                    }
                }
                b'<' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                b'>' => {
                    self.bump();
                    if self.peek() == Some(b'=') {
                        self.bump();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                b'"' => self.string(start, line, column)?,
                b'0'..=b'9' => self.number(start, line, column)?,
                c if c == b'_' || c.is_ascii_alphabetic() => self.ident(start),
                c => {
                    return Err(self.error(
                        &format!("unexpected character {:?}", c as char),
                        start,
                        line,
                        column,
                    ))
                }
            };
            tokens.push(Token {
                kind,
                span: Span::new(start, self.pos, line, column),
            });
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => self.bump(),
                Some(b'/') if self.src.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }

    fn ident(&mut self, start: usize) -> TokenKind {
        while let Some(c) = self.peek() {
            if c == b'_' || c.is_ascii_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        match text {
            "package" => TokenKind::Package,
            "import" => TokenKind::Import,
            "func" => TokenKind::Func,
            "type" => TokenKind::Type,
            "struct" => TokenKind::Struct,
            "var" => TokenKind::Var,
            "const" => TokenKind::Const,
            "return" => TokenKind::Return,
            _ => TokenKind::Ident(text.to_string()),
        }
    }

    fn number(&mut self, start: usize, line: u32, column: u32) -> Result<TokenKind, ParseError> {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.src.get(self.pos + 1), Some(b'0'..=b'9')) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error("malformed float literal", start, line, column))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error("integer literal out of range", start, line, column))
        }
    }

    fn string(&mut self, start: usize, line: u32, column: u32) -> Result<TokenKind, ParseError> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(self.error("unterminated string literal", start, line, column))
                }
                Some(b'"') => {
                    self.bump();
                    return Ok(TokenKind::Str(value));
                }
                Some(b'\\') => {
                    self.bump();
                    let esc = self
                        .peek()
                        .ok_or_else(|| self.error("unterminated escape", start, line, column))?;
                    value.push(match esc {
                        b'n' => '\n',
                        b't' => '\t',
                        b'\\' => '\\',
                        b'"' => '"',
                        c => {
                            return Err(self.error(
                                &format!("unknown escape '\\{}'", c as char),
                                start,
                                line,
                                column,
                            ))
                        }
                    });
                    self.bump();
                }
                Some(_) => {
                    // Multi-byte UTF-8 sequences pass through unmodified.
                    let ch_start = self.pos;
                    self.bump();
                    while self.peek().is_some_and(|b| b & 0xC0 == 0x80) {
                        self.bump();
                    }
                    match std::str::from_utf8(&self.src[ch_start..self.pos]) {
                        Ok(s) => value.push_str(s),
                        Err(_) => {
                            return Err(self.error("invalid UTF-8 in string", start, line, column))
                        }
                    }
                }
            }
        }
    }

    fn error(&self, message: &str, start: usize, line: u32, column: u32) -> ParseError {
        ParseError::new(
            message,
            self.path.to_path_buf(),
            Span::new(start, self.pos.max(start + 1), line, column),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(&PathBuf::from("test.sl"), src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_package_clause() {
        assert_eq!(
            kinds("package main"),
            vec![
                TokenKind::Package,
                TokenKind::Ident("main".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn skips_comments_and_tracks_lines() {
        let toks = tokenize(&PathBuf::from("t.sl"), "// header\npackage a\n").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Package);
        assert_eq!(toks[0].span.line, 2);
        assert_eq!(toks[0].span.column, 1);
    }

    #[test]
    fn lexes_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![TokenKind::Str("a\"b\n".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(tokenize(&PathBuf::from("t.sl"), "\"abc").is_err());
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("== != <= >="),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Eof
            ]
        );
    }
}

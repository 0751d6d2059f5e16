use std::iter::FusedIterator;

use log::debug;
use phf::phf_map;

use crate::error::LoxError;
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and" => TokenType::AND,
    b"or" => TokenType::OR,
    b"class" => TokenType::CLASS,
    b"if" => TokenType::IF,
    b"then" => TokenType::THEN,
    b"end" => TokenType::END,
    b"else" => TokenType::ELSE,
    b"elif" => TokenType::ELIF,
    b"not" => TokenType::NOT,
    b"while" => TokenType::WHILE,
    b"for" => TokenType::FOR,
    b"do" => TokenType::DO,
    b"func" => TokenType::FUNC,
    b"null" => TokenType::NULL,
    b"print" => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"base" => TokenType::BASE,
    b"me" => TokenType::ME,
    b"true" => TokenType::TRUE,
    b"false" => TokenType::FALSE,
    b"var" => TokenType::VAR,
};

/// Byte-oriented lexer.  Yields one `Ok(Token)` or `Err(LoxError::Lex)` per
/// step and a single trailing EOF token; errors never stop the scan.
#[derive(Debug, Clone)]
pub struct Scanner {
    source: Vec<u8>,
    token_start: usize,
    pos: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: Vec<u8>) -> Self {
        debug!("lexing {} bytes of source", source.len());
        Self {
            source,
            token_start: 0,
            pos: 0,
            line: 1,
        }
    }

    /// Scan one lexeme.  `Ok(None)` means whitespace or a comment was
    /// consumed and no token came of it.
    fn scan_token(&mut self) -> Result<Option<TokenType>, LoxError> {
        let kind = match self.bump() {
            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b';' => TokenType::SEMICOLON,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b'*' => TokenType::STAR,

            b'.' => self.either(b'.', TokenType::DOT_DOT, TokenType::DOT),
            b'!' => self.either(b'=', TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.either(b'=', TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.either(b'=', TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.either(b'=', TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'/' => {
                if self.eat(b'/') {
                    while self.lookahead(0).is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                    debug!("dropped comment on line {}", self.line);
                    return Ok(None);
                }
                TokenType::SLASH
            }

            b'"' => self.string_literal()?,

            b'0'..=b'9' => self.number_literal()?,

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier_or_keyword(),

            other => {
                return Err(LoxError::lex(
                    self.line,
                    format!("unexpected character: {}", other as char),
                ));
            }
        };

        Ok(Some(kind))
    }

    fn string_literal(&mut self) -> Result<TokenType, LoxError> {
        loop {
            match self.lookahead(0) {
                None => return Err(LoxError::lex(self.line, "unterminated string")),

                Some(b'"') => break,

                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }

                Some(_) => self.pos += 1,
            }
        }

        // Step over the closing quote; the literal is the raw text between
        // the quotes, with no escape processing.
        self.pos += 1;
        let literal = self.text(self.token_start + 1, self.pos - 1);

        Ok(TokenType::STRING(literal))
    }

    fn number_literal(&mut self) -> Result<TokenType, LoxError> {
        self.digits();

        // A fraction only when a digit follows the dot, so `1.foo` and
        // `1..2` leave the dot(s) alone.
        if self.lookahead(0) == Some(b'.')
            && self.lookahead(1).is_some_and(|b| b.is_ascii_digit())
        {
            self.pos += 1;
            self.digits();
        }

        let text = self.text(self.token_start, self.pos);
        match text.parse::<f64>() {
            Ok(value) => Ok(TokenType::NUMBER(value)),

            Err(_) => Err(LoxError::lex(
                self.line,
                format!("internal error: bad number literal '{}'", text),
            )),
        }
    }

    fn digits(&mut self) {
        while self.lookahead(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenType {
        while self
            .lookahead(0)
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }

        let word = &self.source[self.token_start..self.pos];

        match KEYWORDS.get(word) {
            Some(kind) => kind.clone(),
            None => TokenType::IDENTIFIER,
        }
    }

    /// Byte `offset` positions past the cursor, if any.
    #[inline]
    fn lookahead(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    /// Consume and return the byte under the cursor.
    #[inline]
    fn bump(&mut self) -> u8 {
        let byte = self.source[self.pos];
        self.pos += 1;
        byte
    }

    /// Consume the next byte only if it is `want`.
    #[inline]
    fn eat(&mut self, want: u8) -> bool {
        if self.lookahead(0) == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// The two-character operator when `follow` comes next, else the
    /// one-character form.
    #[inline]
    fn either(&mut self, follow: u8, two: TokenType, one: TokenType) -> TokenType {
        if self.eat(follow) {
            two
        } else {
            one
        }
    }

    fn text(&self, from: usize, to: usize) -> String {
        String::from_utf8_lossy(&self.source[from..to]).into_owned()
    }

    fn token(&self, kind: TokenType) -> Token {
        Token::new(kind, self.text(self.token_start, self.pos), self.line)
    }
}

impl Iterator for Scanner {
    type Item = Result<Token, LoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.source.len() {
                // One trailing EOF, then the iterator stays exhausted.
                if self.pos > self.source.len() {
                    return None;
                }

                self.pos += 1;
                return Some(Ok(Token::new(TokenType::EOF, String::new(), self.line)));
            }

            self.token_start = self.pos;

            match self.scan_token() {
                Ok(Some(kind)) => {
                    let token = self.token(kind);
                    debug!("lexed {}", token);
                    return Some(Ok(token));
                }

                Ok(None) => continue,

                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl FusedIterator for Scanner {}

use std::fmt::Display;

use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
#[error("unterminated string starting at {row}:{col}")]
#[diagnostic(help("add a closing `\"` before the end of the line"))]
pub struct UnterminatedString {
    #[source_code]
    src: NamedSource<String>,

    #[label("this string literal is never closed")]
    bad_bit: SourceSpan,

    pub col: usize,
    pub row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    pub col: usize,
    pub row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Illegal,
    Ident,
    Number,
    String,
    Comma,
    Colon,
    LParen,
    RParen,
    LSquiggly,
    RSquiggly,
    Plus,
    Minus,
    Asterisk,
    Slash,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Not,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TokenKind::Eof => "EOF",
            TokenKind::Illegal => "ILLEGAL",
            TokenKind::Ident => "IDENT",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LSquiggly => "{",
            TokenKind::RSquiggly => "}",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::LessThan => "<",
            TokenKind::GreaterThan => ">",
            TokenKind::LessThanEqual => "<=",
            TokenKind::GreaterThanEqual => ">=",
            TokenKind::Equal => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Not => "!",
        })
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' {}:{}",
            self.kind, self.literal, self.row, self.col
        )
    }
}

fn is_letter(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_')
}

/// Forward-only lexer over borrowed source text. `col` counts characters
/// consumed on the current line; `row` starts at 1 and `\n` resets `col`.
pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    byte: usize,
    col: usize,
    row: usize,
    done: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(input: &'de str) -> Self {
        Lexer {
            filename: None,
            whole: input,
            rest: input,
            byte: 0,
            col: 0,
            row: 1,
            done: false,
        }
    }

    pub fn with_filename(filename: &'de str, input: &'de str) -> Self {
        Lexer {
            filename: Some(filename),
            ..Lexer::new(input)
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn read_char(&mut self) -> Option<char> {
        let mut chars = self.rest.chars();
        let c = chars.next()?;
        self.rest = chars.as_str();
        self.byte += c.len_utf8();
        self.col += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !matches!(c, ' ' | '\t' | '\n' | '\r') {
                break;
            }
            self.read_char();
            if c == '\n' {
                self.row += 1;
                self.col = 0;
            }
        }
    }

    /// Produces the next token. Once the input is exhausted every further
    /// call yields the terminal EOF token again.
    pub fn next_token(&mut self) -> Result<Token<'de>, Error> {
        self.skip_whitespace();

        let start = self.byte;
        let Some(c) = self.read_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                literal: "",
                col: self.col,
                row: self.row,
            });
        };
        let col = self.col;
        let row = self.row;

        if is_letter(c) {
            while self.peek_char().is_some_and(is_letter) {
                self.read_char();
            }
            return Ok(Token {
                kind: TokenKind::Ident,
                literal: &self.whole[start..self.byte],
                col,
                row,
            });
        }

        if c.is_ascii_digit() {
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.read_char();
            }
            return Ok(Token {
                kind: TokenKind::Number,
                literal: &self.whole[start..self.byte],
                col,
                row,
            });
        }

        enum Start {
            String,
            // two-character operator when the next char matches, otherwise
            // the fallback kind (Illegal when there is no one-char form)
            IfNextElse(char, TokenKind, Option<TokenKind>),
        }

        let literal = &self.whole[start..self.byte];

        let started = match c {
            ',' => return Ok(Token { kind: TokenKind::Comma, literal, col, row }),
            ':' => return Ok(Token { kind: TokenKind::Colon, literal, col, row }),
            '(' => return Ok(Token { kind: TokenKind::LParen, literal, col, row }),
            ')' => return Ok(Token { kind: TokenKind::RParen, literal, col, row }),
            '{' => return Ok(Token { kind: TokenKind::LSquiggly, literal, col, row }),
            '}' => return Ok(Token { kind: TokenKind::RSquiggly, literal, col, row }),
            '+' => return Ok(Token { kind: TokenKind::Plus, literal, col, row }),
            '-' => return Ok(Token { kind: TokenKind::Minus, literal, col, row }),
            '*' => return Ok(Token { kind: TokenKind::Asterisk, literal, col, row }),
            '/' => return Ok(Token { kind: TokenKind::Slash, literal, col, row }),
            '!' => Start::IfNextElse('=', TokenKind::NotEqual, Some(TokenKind::Not)),
            '<' => Start::IfNextElse('=', TokenKind::LessThanEqual, Some(TokenKind::LessThan)),
            '>' => Start::IfNextElse('=', TokenKind::GreaterThanEqual, Some(TokenKind::GreaterThan)),
            '=' => Start::IfNextElse('=', TokenKind::Equal, None),
            '&' => Start::IfNextElse('&', TokenKind::And, None),
            '|' => Start::IfNextElse('|', TokenKind::Or, None),
            '"' => Start::String,
            _ => return Ok(Token { kind: TokenKind::Illegal, literal, col, row }),
        };

        match started {
            Start::IfNextElse(next, yes, no) => {
                if self.peek_char() == Some(next) {
                    self.read_char();
                    return Ok(Token {
                        kind: yes,
                        literal: &self.whole[start..self.byte],
                        col,
                        row,
                    });
                }
                Ok(Token {
                    kind: no.unwrap_or(TokenKind::Illegal),
                    literal,
                    col,
                    row,
                })
            }
            Start::String => {
                let content = self.byte;
                loop {
                    match self.read_char() {
                        Some('"') => {
                            return Ok(Token {
                                kind: TokenKind::String,
                                literal: &self.whole[content..self.byte - 1],
                                col,
                                row,
                            });
                        }
                        Some('\n') | None => {
                            return Err(UnterminatedString {
                                src: NamedSource::new(
                                    self.filename.unwrap_or("<input>"),
                                    self.whole.to_string(),
                                ),
                                bad_bit: SourceSpan::from(start..self.whole.len()),
                                col,
                                row,
                            }
                            .into());
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        match &token {
            Ok(token) if token.kind == TokenKind::Eof => self.done = true,
            // the lexer is not restartable past a failure
            Err(_) => self.done = true,
            Ok(_) => {}
        }
        Some(token)
    }
}

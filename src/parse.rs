use miette::{Diagnostic, Error};
use thiserror::Error;

use crate::{
    ast::{BinopKind, Node, TableItem},
    builtins,
    lex::{Lexer, Token, TokenKind},
};

/// Raised when the current token cannot begin an expression. Table and
/// function literals rely on catching this to find their own closing
/// delimiter, so it must stay cheap to build and to identify.
#[derive(Error, Debug, Diagnostic)]
#[error("invalid token: token '{literal}' at pos '{row}:{col}'")]
pub struct InvalidToken {
    pub literal: String,
    pub col: usize,
    pub row: usize,
}

#[derive(Error, Debug, Diagnostic)]
#[error("invalid conversion: converting '{literal}' as number at pos '{row}:{col}'")]
pub struct InvalidConversion {
    pub literal: String,
    pub col: usize,
    pub row: usize,
}

enum TokenSource<'de> {
    Lexer(Lexer<'de>),
    Tokens(std::vec::IntoIter<Token<'de>>),
}

impl<'de> TokenSource<'de> {
    fn next_token(&mut self) -> Result<Token<'de>, Error> {
        match self {
            TokenSource::Lexer(lexer) => lexer.next_token(),
            TokenSource::Tokens(tokens) => Ok(tokens.next().unwrap_or(Token {
                kind: TokenKind::Eof,
                literal: "",
                col: 0,
                row: 0,
            })),
        }
    }
}

/// Recursive-descent parser with a two-token lookahead window.
pub struct Parser<'de> {
    source: TokenSource<'de>,
    curr: Token<'de>,
    peek: Token<'de>,
}

fn is_invalid_token(err: &Error) -> bool {
    err.downcast_ref::<InvalidToken>().is_some()
}

impl<'de> Parser<'de> {
    pub fn new(lexer: Lexer<'de>) -> Result<Self, Error> {
        Self::with_source(TokenSource::Lexer(lexer))
    }

    /// Builds a parser over an explicit token sequence; once the sequence
    /// is exhausted the window refills with EOF tokens.
    pub fn from_tokens(tokens: Vec<Token<'de>>) -> Result<Self, Error> {
        Self::with_source(TokenSource::Tokens(tokens.into_iter()))
    }

    fn with_source(mut source: TokenSource<'de>) -> Result<Self, Error> {
        let curr = source.next_token()?;
        let peek = source.next_token()?;
        Ok(Parser { source, curr, peek })
    }

    fn read_token(&mut self) -> Result<(), Error> {
        self.curr = std::mem::replace(&mut self.peek, self.source.next_token()?);
        Ok(())
    }

    pub fn parse(mut self) -> Result<Vec<Node<'de>>, Error> {
        let mut program = Vec::new();
        while self.curr.kind != TokenKind::Eof {
            program.push(self.parse_expression()?);
        }
        Ok(program)
    }

    pub fn parse_expression(&mut self) -> Result<Node<'de>, Error> {
        match self.curr.kind {
            TokenKind::Number => self.parse_number(),
            TokenKind::String => self.parse_string(),
            TokenKind::LSquiggly => self.parse_table(),
            TokenKind::LParen => self.parse_fn(),
            TokenKind::Ident => self.parse_ident(),
            kind => match BinopKind::from_token(kind) {
                Some(op) => {
                    let tok = self.curr;
                    self.read_token()?;
                    Ok(Node::Binop {
                        kind: op,
                        col: tok.col,
                        row: tok.row,
                    })
                }
                None => Err(InvalidToken {
                    literal: self.curr.literal.to_string(),
                    col: self.curr.col,
                    row: self.curr.row,
                }
                .into()),
            },
        }
    }

    fn parse_number(&mut self) -> Result<Node<'de>, Error> {
        let tok = self.curr;
        let value: f64 = tok.literal.parse().map_err(|_| InvalidConversion {
            literal: tok.literal.to_string(),
            col: tok.col,
            row: tok.row,
        })?;
        self.read_token()?;
        Ok(Node::Number {
            value,
            col: tok.col,
            row: tok.row,
        })
    }

    fn parse_string(&mut self) -> Result<Node<'de>, Error> {
        let tok = self.curr;
        self.read_token()?;
        Ok(Node::String {
            value: tok.literal,
            col: tok.col,
            row: tok.row,
        })
    }

    fn parse_ident(&mut self) -> Result<Node<'de>, Error> {
        let tok = self.curr;
        self.read_token()?;
        let node = match tok.literal {
            "true" => Node::Boolean {
                value: true,
                col: tok.col,
                row: tok.row,
            },
            "false" => Node::Boolean {
                value: false,
                col: tok.col,
                row: tok.row,
            },
            name if builtins::is_builtin(name) => Node::FnCall {
                name,
                col: tok.col,
                row: tok.row,
            },
            name => Node::Ident {
                name,
                col: tok.col,
                row: tok.row,
            },
        };
        Ok(node)
    }

    fn parse_table(&mut self) -> Result<Node<'de>, Error> {
        let col = self.curr.col;
        let row = self.curr.row;
        self.read_token()?;

        let mut items = Vec::new();
        let mut item = TableItem::default();

        loop {
            if item.key.is_none() && item.value.is_empty() {
                let keyish = matches!(self.curr.kind, TokenKind::String | TokenKind::Ident);
                if keyish && self.peek.kind == TokenKind::Colon {
                    item.key = Some(self.curr.literal);
                    self.read_token()?;
                    self.read_token()?;
                    continue;
                }
            }

            match self.parse_expression() {
                Ok(node) => item.value.push(node),
                Err(e) if is_invalid_token(&e) => match self.curr.kind {
                    TokenKind::Comma => {
                        items.push(item);
                        item = TableItem::default();
                        self.read_token()?;
                    }
                    TokenKind::RSquiggly => {
                        items.push(item);
                        self.read_token()?;
                        break;
                    }
                    _ => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }

        Ok(Node::Table { items, col, row })
    }

    fn parse_fn(&mut self) -> Result<Node<'de>, Error> {
        let col = self.curr.col;
        let row = self.curr.row;
        self.read_token()?;

        let mut program = Vec::new();
        loop {
            match self.parse_expression() {
                Ok(node) => program.push(node),
                Err(e) if is_invalid_token(&e) => {
                    if self.curr.kind != TokenKind::RParen {
                        return Err(e);
                    }
                    self.read_token()?;
                    return Ok(Node::Fn { program, col, row });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<Node<'_>> {
        Parser::new(Lexer::new(input))
            .and_then(Parser::parse)
            .expect("parsing should succeed")
    }

    #[test]
    fn table_literal_splits_items_on_commas() {
        let program = parse("{1,2,3 3 *}");
        assert_eq!(program.len(), 1);
        let Node::Table { items, col, row } = &program[0] else {
            panic!("expected a table, got {}", program[0]);
        };
        assert_eq!((*col, *row), (1, 1));
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| !item.is_kvp()));
        assert_eq!(items[0].value.len(), 1);
        assert_eq!(items[1].value.len(), 1);
        assert_eq!(
            items[2].value,
            vec![
                Node::Number { value: 3.0, col: 6, row: 1 },
                Node::Number { value: 3.0, col: 8, row: 1 },
                Node::Binop { kind: BinopKind::Multiplication, col: 10, row: 1 },
            ]
        );
    }

    #[test]
    fn table_keys_come_from_idents_or_strings_followed_by_colons() {
        for input in ["{key: \"value\"}", "{\"key\": \"value\"}"] {
            let program = parse(input);
            let Node::Table { items, .. } = &program[0] else {
                panic!("expected a table, got {}", program[0]);
            };
            assert_eq!(items.len(), 1, "input {input:?}");
            assert!(items[0].is_kvp());
            assert_eq!(items[0].key, Some("key"));
            assert_eq!(items[0].value.len(), 1);
            assert!(matches!(items[0].value[0], Node::String { value: "value", .. }));
        }
    }

    #[test]
    fn empty_table_holds_a_single_empty_item() {
        let program = parse("{}");
        let Node::Table { items, .. } = &program[0] else {
            panic!("expected a table, got {}", program[0]);
        };
        assert_eq!(items.len(), 1);
        assert!(items[0].value.is_empty());
    }

    #[test]
    fn full_programs_parse_in_order() {
        let program = parse("\"hello\" {1, 2, 3 3 *} (1 +) map (+) 0 reduce {{1}, {2}}");
        let rendered: Vec<String> = program.iter().map(Node::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "String(hello)".to_string(),
                "Table([\nNumber(1.000000),\nNumber(2.000000),\nNumber(3.000000) Number(3.000000) Binop(Multiplication)\n])".to_string(),
                "Fn(Number(1.000000), Binop(Addition))".to_string(),
                "FnCall(map)".to_string(),
                "Fn(Binop(Addition))".to_string(),
                "Number(0.000000)".to_string(),
                "FnCall(reduce)".to_string(),
                "Table([\nTable([\nNumber(1.000000)\n]),\nTable([\nNumber(2.000000)\n])\n])".to_string(),
            ]
        );
        assert_eq!(program[0].coords(), (1, 1));
        assert_eq!(program[2].coords(), (23, 1));
    }

    #[test]
    fn idents_resolve_to_booleans_builtins_or_bare_names() {
        let program = parse("true false map frobnicate");
        assert!(matches!(program[0], Node::Boolean { value: true, .. }));
        assert!(matches!(program[1], Node::Boolean { value: false, .. }));
        assert!(matches!(program[2], Node::FnCall { name: "map", .. }));
        assert!(matches!(program[3], Node::Ident { name: "frobnicate", .. }));
    }

    #[test]
    fn every_builtin_name_parses_to_a_fn_call() {
        for builtin in builtins::BUILTINS {
            let program = parse(builtin.name);
            assert!(
                matches!(program[0], Node::FnCall { name, .. } if name == builtin.name),
                "{} should parse as a builtin call",
                builtin.name
            );
        }
    }

    #[test]
    fn expression_outside_any_literal_cannot_start_with_a_terminator() {
        for input in ["}", ")", ":", "="] {
            let err = Parser::new(Lexer::new(input))
                .and_then(Parser::parse)
                .expect_err("should not parse");
            let invalid = err
                .downcast_ref::<InvalidToken>()
                .expect("should be an InvalidToken");
            assert_eq!(invalid.literal, input);
            assert_eq!((invalid.row, invalid.col), (1, 1));
        }
    }

    #[test]
    fn stray_colon_inside_a_table_is_an_invalid_token() {
        let err = Parser::new(Lexer::new("{1: 2}"))
            .and_then(Parser::parse)
            .expect_err("a number cannot be a key");
        assert!(err.downcast_ref::<InvalidToken>().is_some());
    }

    #[test]
    fn unterminated_fn_literal_is_an_invalid_token() {
        let err = Parser::new(Lexer::new("(1 +"))
            .and_then(Parser::parse)
            .expect_err("the fn literal never closes");
        assert!(err.downcast_ref::<InvalidToken>().is_some());
    }

    #[test]
    fn unparseable_number_literals_are_invalid_conversions() {
        let tokens = vec![Token {
            kind: TokenKind::Number,
            literal: "1.2.3",
            col: 4,
            row: 2,
        }];
        let err = Parser::from_tokens(tokens)
            .and_then(Parser::parse)
            .expect_err("the literal is not a float");
        let conversion = err
            .downcast_ref::<InvalidConversion>()
            .expect("should be an InvalidConversion");
        assert_eq!(conversion.literal, "1.2.3");
        assert_eq!((conversion.row, conversion.col), (2, 4));
    }
}

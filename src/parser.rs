//! Recursive-descent parser for the filter language.
//!
//! Precedence, lowest to highest: sequence (`,`) < pipe (`|`) < logical
//! (`and`/`or`) < default (`//`) < comparison < sum (`+`/`-`) < product
//! (`*`/`/`/`%`) < chain (postfix `.field`, `[...]`, `?`) < primary.
//!
//! The tricky part of this grammar is that `[` means three different
//! things depending on where it appears: array construction at an
//! expression position, or index/slice/iteration as a postfix on a chain.
//! That split is resolved structurally — `parse_primary` only ever builds
//! `ArrayConstruction`, and `parse_chain`'s postfix loop is the only place
//! that builds `IndexAccess`/`Slice`/`ArrayIteration`/string-keyed
//! `PropertyAccess` — so no lookahead hacks are needed to disambiguate.
use crate::ast::{Node, ObjectField, ObjectKey};
use crate::error::ParseError;
use crate::lexer::{self, Token, TokenKind};
use crate::value::Value;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    eof_pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, eof_pos: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            eof_pos,
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn cur_pos(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.position)
            .unwrap_or(self.eof_pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        match self.advance() {
            Some(tok) if &tok.kind == kind => Ok(()),
            Some(tok) => Err(ParseError::new(
                tok.position,
                format!("expected {kind:?}, found {:?}", tok.kind),
            )),
            None => Err(ParseError::new(
                self.eof_pos,
                format!("expected {kind:?}, found end of input"),
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Ident(s),
                ..
            }) => Ok(s),
            Some(tok) => Err(ParseError::new(
                tok.position,
                format!("expected identifier, found {:?}", tok.kind),
            )),
            None => Err(ParseError::new(self.eof_pos, "expected identifier, found end of input")),
        }
    }

    // expression := pipe (',' pipe)*
    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        let first = self.parse_pipe()?;
        if self.peek() != Some(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.peek() == Some(&TokenKind::Comma) {
            self.advance();
            exprs.push(self.parse_pipe()?);
        }
        Ok(Node::Sequence { exprs, pos })
    }

    // pipe := logical ('|' pipe)?
    fn parse_pipe(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        let left = self.parse_logical()?;
        if self.peek() == Some(&TokenKind::Pipe) {
            self.advance();
            let right = self.parse_pipe()?;
            return Ok(Node::Pipe {
                left: Box::new(left),
                right: Box::new(right),
                pos,
            });
        }
        Ok(left)
    }

    // logical := default (('and'|'or') default)*
    fn parse_logical(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        let mut left = self.parse_default()?;
        loop {
            match self.peek() {
                Some(TokenKind::And) => {
                    self.advance();
                    let r = self.parse_default()?;
                    left = Node::And {
                        l: Box::new(left),
                        r: Box::new(r),
                        pos,
                    };
                }
                Some(TokenKind::Or) => {
                    self.advance();
                    let r = self.parse_default()?;
                    left = Node::Or {
                        l: Box::new(left),
                        r: Box::new(r),
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // default := comparison ('//' comparison)*
    fn parse_default(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&TokenKind::SlashSlash) {
            self.advance();
            let r = self.parse_comparison()?;
            left = Node::Default {
                l: Box::new(left),
                r: Box::new(r),
                pos,
            };
        }
        Ok(left)
    }

    // comparison := sum (cmp sum)*
    fn parse_comparison(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        let mut left = self.parse_sum()?;
        loop {
            let build: fn(Box<Node>, Box<Node>, usize) -> Node = match self.peek() {
                Some(TokenKind::EqEq) => |l, r, pos| Node::Equal { l, r, pos },
                Some(TokenKind::NotEq) => |l, r, pos| Node::NotEqual { l, r, pos },
                Some(TokenKind::Lt) => |l, r, pos| Node::LessThan { l, r, pos },
                Some(TokenKind::Le) => |l, r, pos| Node::LessThanOrEqual { l, r, pos },
                Some(TokenKind::Gt) => |l, r, pos| Node::GreaterThan { l, r, pos },
                Some(TokenKind::Ge) => |l, r, pos| Node::GreaterThanOrEqual { l, r, pos },
                _ => break,
            };
            self.advance();
            let r = self.parse_sum()?;
            left = build(Box::new(left), Box::new(r), pos);
        }
        Ok(left)
    }

    // sum := product (('+'|'-') product)*
    fn parse_sum(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        let mut left = self.parse_product()?;
        loop {
            match self.peek() {
                Some(TokenKind::Plus) => {
                    self.advance();
                    let r = self.parse_product()?;
                    left = Node::Sum {
                        left: Box::new(left),
                        right: Box::new(r),
                        pos,
                    };
                }
                Some(TokenKind::Minus) => {
                    self.advance();
                    let r = self.parse_product()?;
                    left = Node::Difference {
                        left: Box::new(left),
                        right: Box::new(r),
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // product := chain (('*'|'/'|'%') chain)*
    fn parse_product(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        let mut left = self.parse_chain()?;
        loop {
            match self.peek() {
                Some(TokenKind::Star) => {
                    self.advance();
                    let r = self.parse_chain()?;
                    left = Node::Multiply {
                        left: Box::new(left),
                        right: Box::new(r),
                        pos,
                    };
                }
                Some(TokenKind::Slash) => {
                    self.advance();
                    let r = self.parse_chain()?;
                    left = Node::Divide {
                        left: Box::new(left),
                        right: Box::new(r),
                        pos,
                    };
                }
                Some(TokenKind::Percent) => {
                    self.advance();
                    let r = self.parse_chain()?;
                    left = Node::Modulo {
                        left: Box::new(left),
                        right: Box::new(r),
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // chain := primary ( '?' | bracketSuffix | '.' ident (bracketSuffix)* )*
    fn parse_chain(&mut self) -> Result<Node, ParseError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(TokenKind::Question) => {
                    let pos = self.cur_pos();
                    self.advance();
                    node = Node::Optional {
                        expr: Box::new(node),
                        pos,
                    };
                }
                Some(TokenKind::ArrayIter) => {
                    let pos = self.cur_pos();
                    self.advance();
                    node = Node::ArrayIteration {
                        input: Some(Box::new(node)),
                        pos,
                    };
                }
                Some(TokenKind::LBracket) => {
                    node = self.parse_bracket_suffix(node)?;
                }
                Some(TokenKind::Dot) if matches!(self.peek_at(1), Some(TokenKind::Ident(_))) => {
                    let pos = self.cur_pos();
                    self.advance();
                    let name = self.expect_ident()?;
                    node = Node::PropertyAccess {
                        property: name,
                        string_key: false,
                        input: Some(Box::new(node)),
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// Parses the signed-number sub-grammar `NUM | '-' NUM` used by index
    /// and slice bounds.
    fn parse_signed_num(&mut self) -> Result<f64, ParseError> {
        let neg = if self.peek() == Some(&TokenKind::Minus) {
            self.advance();
            true
        } else {
            false
        };
        match self.advance() {
            Some(Token {
                kind: TokenKind::Num(n),
                ..
            }) => Ok(if neg { -n } else { n }),
            Some(tok) => Err(ParseError::new(
                tok.position,
                format!("expected number, found {:?}", tok.kind),
            )),
            None => Err(ParseError::new(self.eof_pos, "expected number, found end of input")),
        }
    }

    /// Parses the contents of `[...]` after `[` was peeked, given the
    /// already-parsed chain expression it applies to.
    fn parse_bracket_suffix(&mut self, input: Node) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        self.expect(&TokenKind::LBracket)?;
        let input = Some(Box::new(input));

        if self.peek() == Some(&TokenKind::Colon) {
            self.advance();
            let end = if self.peek() == Some(&TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(Node::Literal {
                    value: Value::Number(self.parse_signed_num()?),
                    pos,
                }))
            };
            self.expect(&TokenKind::RBracket)?;
            return Ok(Node::Slice {
                start: None,
                end,
                input,
                pos,
            });
        }

        if let Some(TokenKind::Str(_)) = self.peek() {
            let s = match self.advance().unwrap().kind {
                TokenKind::Str(s) => s,
                _ => unreachable!(),
            };
            self.expect(&TokenKind::RBracket)?;
            return Ok(Node::PropertyAccess {
                property: s,
                string_key: true,
                input,
                pos,
            });
        }

        let first = self.parse_signed_num()?;

        match self.peek() {
            Some(TokenKind::Comma) => {
                let mut indices = vec![first];
                while self.peek() == Some(&TokenKind::Comma) {
                    self.advance();
                    indices.push(self.parse_signed_num()?);
                }
                self.expect(&TokenKind::RBracket)?;
                let exprs = indices
                    .into_iter()
                    .map(|n| Node::IndexAccess {
                        index: Box::new(Node::Literal {
                            value: Value::Number(n),
                            pos,
                        }),
                        input: input.clone(),
                        pos,
                    })
                    .collect();
                Ok(Node::Sequence { exprs, pos })
            }
            Some(TokenKind::Colon) => {
                self.advance();
                let end = if self.peek() == Some(&TokenKind::RBracket) {
                    None
                } else {
                    Some(Box::new(Node::Literal {
                        value: Value::Number(self.parse_signed_num()?),
                        pos,
                    }))
                };
                self.expect(&TokenKind::RBracket)?;
                Ok(Node::Slice {
                    start: Some(Box::new(Node::Literal {
                        value: Value::Number(first),
                        pos,
                    })),
                    end,
                    input,
                    pos,
                })
            }
            _ => {
                self.expect(&TokenKind::RBracket)?;
                Ok(Node::IndexAccess {
                    index: Box::new(Node::Literal {
                        value: Value::Number(first),
                        pos,
                    }),
                    input,
                    pos,
                })
            }
        }
    }

    // primary := '.' IDENT? | '..' | literal | '(' expression ')'
    //          | '[' expression? ']' | '{' fields? '}' | keywordForm
    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        match self.peek() {
            Some(TokenKind::Dot) => {
                self.advance();
                if let Some(TokenKind::Ident(_)) = self.peek() {
                    let name = self.expect_ident()?;
                    Ok(Node::PropertyAccess {
                        property: name,
                        string_key: false,
                        input: None,
                        pos,
                    })
                } else {
                    Ok(Node::Identity { pos })
                }
            }
            Some(TokenKind::DotDot) => {
                self.advance();
                Ok(Node::RecursiveDescent { pos })
            }
            Some(TokenKind::ArrayIter) => {
                // `[]` at expression position is an empty array literal.
                self.advance();
                Ok(Node::ArrayConstruction { elements: None, pos })
            }
            Some(TokenKind::LBracket) => {
                self.advance();
                let elements = self.parse_expression()?;
                self.expect(&TokenKind::RBracket)?;
                Ok(Node::ArrayConstruction {
                    elements: Some(Box::new(elements)),
                    pos,
                })
            }
            Some(TokenKind::LBrace) => self.parse_object_construction(),
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            Some(TokenKind::Num(_)) => {
                let n = match self.advance().unwrap().kind {
                    TokenKind::Num(n) => n,
                    _ => unreachable!(),
                };
                Ok(Node::Literal {
                    value: Value::Number(n),
                    pos,
                })
            }
            Some(TokenKind::Str(_)) => {
                let s = match self.advance().unwrap().kind {
                    TokenKind::Str(s) => s,
                    _ => unreachable!(),
                };
                Ok(Node::Literal {
                    value: Value::string(s),
                    pos,
                })
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Node::Literal {
                    value: Value::Bool(true),
                    pos,
                })
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Node::Literal {
                    value: Value::Bool(false),
                    pos,
                })
            }
            Some(TokenKind::Null) => {
                self.advance();
                Ok(Node::Literal {
                    value: Value::Null,
                    pos,
                })
            }
            Some(TokenKind::Empty) => {
                self.advance();
                Ok(Node::Empty { pos })
            }
            Some(TokenKind::Not) => {
                self.advance();
                Ok(Node::Not {
                    expr: Box::new(Node::Identity { pos }),
                    pos,
                })
            }
            Some(TokenKind::Keys) => {
                self.advance();
                Ok(Node::Keys { pos })
            }
            Some(TokenKind::KeysUnsorted) => {
                self.advance();
                Ok(Node::KeysUnsorted { pos })
            }
            Some(TokenKind::Tostring) => {
                self.advance();
                Ok(Node::Tostring { pos })
            }
            Some(TokenKind::Tonumber) => {
                self.advance();
                Ok(Node::Tonumber { pos })
            }
            Some(TokenKind::Length) => {
                self.advance();
                Ok(Node::Length { pos })
            }
            Some(TokenKind::Sort) => {
                self.advance();
                Ok(Node::Sort { pos })
            }
            Some(TokenKind::SortBy) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let mut paths = vec![self.parse_pipe()?];
                while self.peek() == Some(&TokenKind::Comma) {
                    self.advance();
                    paths.push(self.parse_pipe()?);
                }
                self.expect(&TokenKind::RParen)?;
                Ok(Node::SortBy { paths, pos })
            }
            Some(TokenKind::Has) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let key = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Node::HasKey {
                    key: Box::new(key),
                    pos,
                })
            }
            Some(TokenKind::Map) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let filter = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Node::MapFilter {
                    filter: Box::new(filter),
                    pos,
                })
            }
            Some(TokenKind::MapValues) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let filter = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Node::MapValuesFilter {
                    filter: Box::new(filter),
                    pos,
                })
            }
            Some(TokenKind::Select) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Node::SelectFilter {
                    condition: Box::new(condition),
                    pos,
                })
            }
            Some(TokenKind::If) => {
                self.advance();
                self.parse_if_chain(pos)
            }
            Some(tok) => Err(ParseError::new(pos, format!("unexpected token {tok:?}"))),
            None => Err(ParseError::new(self.eof_pos, "unexpected end of filter expression")),
        }
    }

    /// Parses an `if`/`elif`/`else`/`end` chain after `if` has been
    /// consumed, desugaring `elif` into a nested `Conditional`. A missing
    /// `else` branch defaults to `Identity`.
    fn parse_if_chain(&mut self, pos: usize) -> Result<Node, ParseError> {
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::Then)?;
        let then_branch = self.parse_expression()?;
        let else_branch = match self.peek() {
            Some(TokenKind::Elif) => {
                let elif_pos = self.cur_pos();
                self.advance();
                self.parse_if_chain(elif_pos)?
            }
            Some(TokenKind::Else) => {
                self.advance();
                let e = self.parse_expression()?;
                self.expect(&TokenKind::End)?;
                e
            }
            _ => {
                self.expect(&TokenKind::End)?;
                Node::Identity { pos }
            }
        };
        Ok(Node::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            pos,
        })
    }

    fn parse_object_construction(&mut self) -> Result<Node, ParseError> {
        let pos = self.cur_pos();
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        if self.peek() != Some(&TokenKind::RBrace) {
            fields.push(self.parse_object_field()?);
            while self.peek() == Some(&TokenKind::Comma) {
                self.advance();
                fields.push(self.parse_object_field()?);
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Node::ObjectConstruction { fields, pos })
    }

    fn parse_object_field(&mut self) -> Result<ObjectField, ParseError> {
        let pos = self.cur_pos();
        let (key, is_dynamic) = match self.peek() {
            Some(TokenKind::Ident(_)) => {
                let name = self.expect_ident()?;
                (ObjectKey::Name(name), false)
            }
            // Keywords are valid bareword object keys, e.g. `{length: .x}`.
            Some(kind) if keyword_as_field_name(kind).is_some() => {
                let name = keyword_as_field_name(self.peek().unwrap()).unwrap().to_string();
                self.advance();
                (ObjectKey::Name(name), false)
            }
            Some(TokenKind::Str(_)) => {
                let s = match self.advance().unwrap().kind {
                    TokenKind::Str(s) => s,
                    _ => unreachable!(),
                };
                (ObjectKey::Name(s), false)
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                (ObjectKey::Expr(Box::new(expr)), true)
            }
            Some(tok) => {
                return Err(ParseError::new(pos, format!("expected object key, found {tok:?}")));
            }
            None => return Err(ParseError::new(self.eof_pos, "expected object key, found end of input")),
        };

        if self.peek() != Some(&TokenKind::Colon) {
            // Shorthand `{name}` desugars to `{name: .name}`.
            let name = match &key {
                ObjectKey::Name(n) => n.clone(),
                ObjectKey::Expr(_) => {
                    return Err(ParseError::new(pos, "computed key requires a value expression"));
                }
            };
            let value = Box::new(Node::PropertyAccess {
                property: name,
                string_key: false,
                input: None,
                pos,
            });
            return Ok(ObjectField {
                key,
                value,
                is_dynamic,
            });
        }
        self.advance();
        // Field values parse at pipe level — a bare comma here separates
        // object fields, not a Sequence.
        let value = Box::new(self.parse_pipe()?);
        Ok(ObjectField {
            key,
            value,
            is_dynamic,
        })
    }
}

/// Keywords that double as bareword object keys (`{length: .x}`,
/// `{not: 1}`) — the shorthand form isn't meaningful for these since
/// there's no corresponding field name, but the `key: value` form is.
fn keyword_as_field_name(kind: &TokenKind) -> Option<&'static str> {
    Some(match kind {
        TokenKind::Map => "map",
        TokenKind::MapValues => "map_values",
        TokenKind::Select => "select",
        TokenKind::Sort => "sort",
        TokenKind::SortBy => "sort_by",
        TokenKind::Keys => "keys",
        TokenKind::KeysUnsorted => "keys_unsorted",
        TokenKind::Empty => "empty",
        TokenKind::Tostring => "tostring",
        TokenKind::Tonumber => "tonumber",
        TokenKind::Has => "has",
        TokenKind::Length => "length",
        TokenKind::And => "and",
        TokenKind::Or => "or",
        TokenKind::Not => "not",
        TokenKind::If => "if",
        TokenKind::Then => "then",
        TokenKind::Else => "else",
        TokenKind::End => "end",
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        _ => return None,
    })
}

/// Parses a token stream into an AST, failing if tokens remain unconsumed.
pub fn parse_tokens(tokens: Vec<Token>, source_len: usize) -> Result<Node, ParseError> {
    let mut parser = Parser::new(tokens, source_len);
    let node = parser.parse_expression()?;
    if parser.pos < parser.tokens.len() {
        let tok = &parser.tokens[parser.pos];
        return Err(ParseError::new(
            tok.position,
            format!("unexpected token after filter: {:?}", tok.kind),
        ));
    }
    Ok(node)
}

/// Lexes and parses a filter source string into an AST.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    let tokens = lexer::lex(source)?;
    parse_tokens(tokens, source.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(src: &str) -> Node {
        parse(src).unwrap_or_else(|e| panic!("failed to parse {src:?}: {e}"))
    }

    #[test]
    fn parse_identity() {
        assert_eq!(p("."), Node::Identity { pos: 0 });
    }

    #[test]
    fn parse_field() {
        assert_eq!(
            p(".name"),
            Node::PropertyAccess {
                property: "name".into(),
                string_key: false,
                input: None,
                pos: 0,
            }
        );
    }

    #[test]
    fn parse_nested_field_builds_chain_not_pipe() {
        let n = p(".a.b");
        match n {
            Node::PropertyAccess {
                property, input, ..
            } => {
                assert_eq!(property, "b");
                assert!(matches!(
                    input.as_deref(),
                    Some(Node::PropertyAccess { property, .. }) if property == "a"
                ));
            }
            other => panic!("expected PropertyAccess, got {other:?}"),
        }
    }

    #[test]
    fn parse_array_iteration() {
        assert_eq!(
            p(".[]"),
            Node::ArrayIteration {
                input: Some(Box::new(Node::Identity { pos: 0 })),
                pos: 1,
            }
        );
    }

    #[test]
    fn parse_empty_array_literal() {
        assert_eq!(p("[]"), Node::ArrayConstruction { elements: None, pos: 0 });
    }

    #[test]
    fn parse_index_access() {
        assert_eq!(
            p(".[0]"),
            Node::IndexAccess {
                index: Box::new(Node::Literal {
                    value: Value::Number(0.0),
                    pos: 1,
                }),
                input: Some(Box::new(Node::Identity { pos: 0 })),
                pos: 1,
            }
        );
    }

    #[test]
    fn parse_negative_index() {
        let n = p(".[-1]");
        match n {
            Node::IndexAccess { index, .. } => {
                assert_eq!(*index, Node::Literal { value: Value::Number(-1.0), pos: 1 });
            }
            other => panic!("expected IndexAccess, got {other:?}"),
        }
    }

    #[test]
    fn parse_multi_index() {
        let n = p(".[1,3,5]");
        match n {
            Node::Sequence { exprs, .. } => {
                assert_eq!(exprs.len(), 3);
                for (e, expect) in exprs.iter().zip([1.0, 3.0, 5.0]) {
                    match e {
                        Node::IndexAccess { index, .. } => {
                            assert_eq!(**index, Node::Literal { value: Value::Number(expect), pos: e.pos() });
                        }
                        other => panic!("expected IndexAccess, got {other:?}"),
                    }
                }
            }
            other => panic!("expected Sequence, got {other:?}"),
        }
    }

    #[test]
    fn parse_slice_both_bounds() {
        let n = p(".[1:3]");
        assert!(matches!(n, Node::Slice { start: Some(_), end: Some(_), .. }));
    }

    #[test]
    fn parse_slice_open_start() {
        let n = p(".[:3]");
        assert!(matches!(n, Node::Slice { start: None, end: Some(_), .. }));
    }

    #[test]
    fn parse_slice_open_end() {
        let n = p(".[-2:]");
        assert!(matches!(n, Node::Slice { start: Some(_), end: None, .. }));
    }

    #[test]
    fn parse_string_key_access() {
        let n = p(r#".["x-user-id"]"#);
        match n {
            Node::PropertyAccess {
                property,
                string_key,
                ..
            } => {
                assert_eq!(property, "x-user-id");
                assert!(string_key);
            }
            other => panic!("expected PropertyAccess, got {other:?}"),
        }
    }

    #[test]
    fn parse_postfix_string_key_after_ident_chain() {
        let n = p(r#".headers["x-user-id"]"#);
        match n {
            Node::PropertyAccess {
                property,
                string_key,
                input,
                ..
            } => {
                assert_eq!(property, "x-user-id");
                assert!(string_key);
                assert!(matches!(
                    input.as_deref(),
                    Some(Node::PropertyAccess { property, .. }) if property == "headers"
                ));
            }
            other => panic!("expected PropertyAccess, got {other:?}"),
        }
    }

    #[test]
    fn parse_optional() {
        assert!(matches!(p(".foo?"), Node::Optional { .. }));
    }

    #[test]
    fn parse_pipe_right_assoc() {
        let n = p("a | b | c".replace('a', ".a").replace('b', ".b").replace('c', ".c").as_str());
        match n {
            Node::Pipe { right, .. } => assert!(matches!(*right, Node::Pipe { .. })),
            other => panic!("expected Pipe, got {other:?}"),
        }
    }

    #[test]
    fn parse_sequence() {
        match p(".a, .b") {
            Node::Sequence { exprs, .. } => assert_eq!(exprs.len(), 2),
            other => panic!("expected Sequence, got {other:?}"),
        }
    }

    #[test]
    fn parse_operator_precedence() {
        // 1 + 2 * 3 => Sum(1, Multiply(2, 3))
        match p("1 + 2 * 3") {
            Node::Sum { right, .. } => assert!(matches!(*right, Node::Multiply { .. })),
            other => panic!("expected Sum, got {other:?}"),
        }
    }

    #[test]
    fn parse_object_shorthand() {
        match p("{name, age}") {
            Node::ObjectConstruction { fields, .. } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].key, ObjectKey::Name("name".into()));
                assert!(!fields[0].is_dynamic);
            }
            other => panic!("expected ObjectConstruction, got {other:?}"),
        }
    }

    #[test]
    fn parse_object_dynamic_key() {
        match p("{(.k): .v}") {
            Node::ObjectConstruction { fields, .. } => {
                assert!(fields[0].is_dynamic);
                assert!(matches!(fields[0].key, ObjectKey::Expr(_)));
            }
            other => panic!("expected ObjectConstruction, got {other:?}"),
        }
    }

    #[test]
    fn parse_if_elif_else_desugars() {
        match p("if .a then 1 elif .b then 2 else 3 end") {
            Node::Conditional { else_branch, .. } => {
                assert!(matches!(*else_branch, Node::Conditional { .. }));
            }
            other => panic!("expected Conditional, got {other:?}"),
        }
    }

    #[test]
    fn parse_if_without_else_defaults_identity() {
        match p("if .a then 1 end") {
            Node::Conditional { else_branch, .. } => {
                assert!(matches!(*else_branch, Node::Identity { .. }));
            }
            other => panic!("expected Conditional, got {other:?}"),
        }
    }

    #[test]
    fn parse_not_yields_not_identity() {
        match p("not") {
            Node::Not { expr, .. } => assert!(matches!(*expr, Node::Identity { .. })),
            other => panic!("expected Not, got {other:?}"),
        }
    }

    #[test]
    fn parse_map_and_select() {
        assert!(matches!(p("map(.x)"), Node::MapFilter { .. }));
        assert!(matches!(p("select(.x)"), Node::SelectFilter { .. }));
    }

    #[test]
    fn parse_sort_by_multiple_paths() {
        match p("sort_by(.name, .age)") {
            Node::SortBy { paths, .. } => assert_eq!(paths.len(), 2),
            other => panic!("expected SortBy, got {other:?}"),
        }
    }

    #[test]
    fn parse_unexpected_trailing_token_errors() {
        let err = parse(". .").unwrap_err();
        assert!(err.message.contains("unexpected"));
    }

    #[test]
    fn parse_unterminated_paren_errors() {
        assert!(parse("(.a").is_err());
    }

    #[test]
    fn parse_complex_pipeline() {
        let n = p(".users[] | select(.age > 18) | {name, age}");
        assert!(matches!(n, Node::Pipe { .. }));
    }
}

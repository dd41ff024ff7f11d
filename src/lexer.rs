//! Tokenizer for the filter language.
//!
//! Scanning is greedy, left-to-right, with one-character lookahead plus a
//! handful of two-character probes (`<=`, `>=`, `==`, `!=`, `//`). The
//! lexer is stateful — it tracks a byte offset into the source — and
//! exposes `checkpoint`/`restore` so callers that want to peek ahead
//! without re-scanning can roll back.
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Dot,
    DotDot,
    LBracket,
    RBracket,
    ArrayIter, // `[]`
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Colon,
    Question,
    Pipe,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    SlashSlash,
    Num(f64),
    Str(String),
    Ident(String),
    Map,
    MapValues,
    Select,
    If,
    Then,
    Elif,
    Else,
    End,
    And,
    Or,
    Not,
    Sort,
    SortBy,
    Keys,
    KeysUnsorted,
    Empty,
    Tostring,
    Tonumber,
    Has,
    Length,
    True,
    False,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: usize,
}

/// A stateful byte-offset cursor over the source. `checkpoint`/`restore`
/// let a caller try a scan and roll back without re-lexing from scratch.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

pub type Checkpoint = usize;

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.pos
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint;
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// True if `tok` is a token that produces a value, used to disambiguate
    /// a following `-` as subtraction (binary) rather than a negative
    /// numeric literal.
    fn is_value_token(tok: Option<&TokenKind>) -> bool {
        matches!(
            tok,
            Some(
                TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::ArrayIter
                    | TokenKind::RBrace
                    | TokenKind::Ident(_)
                    | TokenKind::Num(_)
                    | TokenKind::Str(_)
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::Null
                    | TokenKind::Dot
            )
        )
    }

    /// Scan the next token, or `None` at end of input.
    pub fn next_token(&mut self, prev: Option<&TokenKind>) -> Result<Option<Token>, ParseError> {
        self.skip_whitespace();
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let start = self.pos;
        let b = self.bytes[self.pos];

        macro_rules! single {
            ($kind:expr, $len:expr) => {{
                self.pos += $len;
                Ok(Some(Token {
                    kind: $kind,
                    lexeme: self.source[start..self.pos].to_string(),
                    position: start,
                }))
            }};
        }

        match b {
            b'(' => return single!(TokenKind::LParen, 1),
            b')' => return single!(TokenKind::RParen, 1),
            b'{' => return single!(TokenKind::LBrace, 1),
            b'}' => return single!(TokenKind::RBrace, 1),
            b'|' => return single!(TokenKind::Pipe, 1),
            b',' => return single!(TokenKind::Comma, 1),
            b':' => return single!(TokenKind::Colon, 1),
            b'?' => return single!(TokenKind::Question, 1),
            b'+' => return single!(TokenKind::Plus, 1),
            b'*' => return single!(TokenKind::Star, 1),
            b'%' => return single!(TokenKind::Percent, 1),
            _ => {}
        }

        if b == b'[' {
            // `[` followed only by whitespace then `]` is a single `[]` token.
            let mut i = self.pos + 1;
            while i < self.bytes.len() && self.bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < self.bytes.len() && self.bytes[i] == b']' {
                self.pos = i + 1;
                return Ok(Some(Token {
                    kind: TokenKind::ArrayIter,
                    lexeme: self.source[start..self.pos].to_string(),
                    position: start,
                }));
            }
            self.pos += 1;
            return Ok(Some(Token {
                kind: TokenKind::LBracket,
                lexeme: self.source[start..self.pos].to_string(),
                position: start,
            }));
        }
        if b == b']' {
            return single!(TokenKind::RBracket, 1);
        }

        if b == b'-' {
            if self.pos + 1 < self.bytes.len()
                && self.bytes[self.pos + 1].is_ascii_digit()
                && !Self::is_value_token(prev)
            {
                return self.lex_number(start).map(Some);
            }
            self.pos += 1;
            return Ok(Some(Token {
                kind: TokenKind::Minus,
                lexeme: "-".to_string(),
                position: start,
            }));
        }

        // Two-character operators, probed before their single-char fallbacks.
        if self.pos + 1 < self.bytes.len() {
            let two = match (self.bytes[self.pos], self.bytes[self.pos + 1]) {
                (b'<', b'=') => Some(TokenKind::Le),
                (b'>', b'=') => Some(TokenKind::Ge),
                (b'=', b'=') => Some(TokenKind::EqEq),
                (b'!', b'=') => Some(TokenKind::NotEq),
                (b'/', b'/') => Some(TokenKind::SlashSlash),
                _ => None,
            };
            if let Some(kind) = two {
                self.pos += 2;
                return Ok(Some(Token {
                    kind,
                    lexeme: self.source[start..self.pos].to_string(),
                    position: start,
                }));
            }
        }

        match b {
            b'<' => return single!(TokenKind::Lt, 1),
            b'>' => return single!(TokenKind::Gt, 1),
            b'/' => return single!(TokenKind::Slash, 1),
            _ => {}
        }

        if b == b'.' {
            if self.pos + 1 < self.bytes.len() && self.bytes[self.pos + 1] == b'.' {
                self.pos += 2;
                return Ok(Some(Token {
                    kind: TokenKind::DotDot,
                    lexeme: "..".to_string(),
                    position: start,
                }));
            }
            self.pos += 1;
            return Ok(Some(Token {
                kind: TokenKind::Dot,
                lexeme: ".".to_string(),
                position: start,
            }));
        }

        if b == b'"' || b == b'\'' {
            return self.lex_string(start).map(Some);
        }

        if b.is_ascii_digit() {
            return self.lex_number(start).map(Some);
        }

        if b.is_ascii_alphabetic() || b == b'_' {
            let mut i = self.pos;
            while i < self.bytes.len()
                && (self.bytes[i].is_ascii_alphanumeric() || self.bytes[i] == b'_')
            {
                i += 1;
            }
            let word = &self.source[self.pos..i];
            self.pos = i;
            let kind = match word {
                "map" => TokenKind::Map,
                "map_values" => TokenKind::MapValues,
                "select" => TokenKind::Select,
                "if" => TokenKind::If,
                "then" => TokenKind::Then,
                "elif" => TokenKind::Elif,
                "else" => TokenKind::Else,
                "end" => TokenKind::End,
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                "sort" => TokenKind::Sort,
                "sort_by" => TokenKind::SortBy,
                "keys" => TokenKind::Keys,
                "keys_unsorted" => TokenKind::KeysUnsorted,
                "empty" => TokenKind::Empty,
                "tostring" => TokenKind::Tostring,
                "tonumber" => TokenKind::Tonumber,
                "has" => TokenKind::Has,
                "length" => TokenKind::Length,
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "null" => TokenKind::Null,
                _ => TokenKind::Ident(word.to_string()),
            };
            return Ok(Some(Token {
                kind,
                lexeme: word.to_string(),
                position: start,
            }));
        }

        Err(ParseError::new(
            start,
            format!("unexpected character '{}'", b as char),
        ))
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut i = self.pos;
        if self.bytes[i] == b'-' {
            i += 1;
        }
        while i < self.bytes.len() && self.bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i < self.bytes.len()
            && self.bytes[i] == b'.'
            && i + 1 < self.bytes.len()
            && self.bytes[i + 1].is_ascii_digit()
        {
            i += 1;
            while i < self.bytes.len() && self.bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        let text = &self.source[start..i];
        self.pos = i;
        let n: f64 = text
            .parse()
            .map_err(|_| ParseError::new(start, format!("invalid number literal '{text}'")))?;
        Ok(Token {
            kind: TokenKind::Num(n),
            lexeme: text.to_string(),
            position: start,
        })
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, ParseError> {
        let quote = self.bytes[start];
        let mut i = start + 1;
        let mut s = String::new();
        loop {
            if i >= self.bytes.len() {
                return Err(ParseError::new(start, "unterminated string literal"));
            }
            let c = self.bytes[i];
            if c == quote {
                i += 1;
                break;
            }
            if c == b'\\' {
                i += 1;
                if i >= self.bytes.len() {
                    return Err(ParseError::new(start, "unterminated string literal"));
                }
                let esc = self.bytes[i];
                s.push(match esc {
                    b'n' => '\n',
                    b't' => '\t',
                    b'r' => '\r',
                    b'\\' => '\\',
                    b'"' => '"',
                    b'\'' => '\'',
                    other => other as char,
                });
                i += 1;
                continue;
            }
            // Fast path: copy a run of plain bytes in one go.
            let chunk_start = i;
            while i < self.bytes.len() && self.bytes[i] != quote && self.bytes[i] != b'\\' {
                i += 1;
            }
            s.push_str(&self.source[chunk_start..i]);
        }
        self.pos = i;
        Ok(Token {
            kind: TokenKind::Str(s),
            lexeme: self.source[start..i].to_string(),
            position: start,
        })
    }
}

/// Tokenize the full source, eagerly collecting every token.
pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token(tokens.last().map(|t: &Token| &t.kind))? {
        tokens.push(tok);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_identity() {
        assert_eq!(kinds("."), vec![TokenKind::Dot]);
    }

    #[test]
    fn lex_recursive_descent() {
        assert_eq!(kinds(".."), vec![TokenKind::DotDot]);
    }

    #[test]
    fn lex_field_access() {
        assert_eq!(
            kinds(".foo"),
            vec![TokenKind::Dot, TokenKind::Ident("foo".into())]
        );
    }

    #[test]
    fn lex_array_iteration_token() {
        assert_eq!(
            kinds(".[ ]"),
            vec![TokenKind::Dot, TokenKind::ArrayIter]
        );
        assert_eq!(kinds(".[]"), vec![TokenKind::Dot, TokenKind::ArrayIter]);
    }

    #[test]
    fn lex_bracket_index_not_iteration() {
        assert_eq!(
            kinds(".[0]"),
            vec![
                TokenKind::Dot,
                TokenKind::LBracket,
                TokenKind::Num(0.0),
                TokenKind::RBracket
            ]
        );
    }

    #[test]
    fn lex_two_char_operators() {
        assert_eq!(kinds("<="), vec![TokenKind::Le]);
        assert_eq!(kinds(">="), vec![TokenKind::Ge]);
        assert_eq!(kinds("=="), vec![TokenKind::EqEq]);
        assert_eq!(kinds("!="), vec![TokenKind::NotEq]);
        assert_eq!(kinds("//"), vec![TokenKind::SlashSlash]);
    }

    #[test]
    fn lex_negative_number_literal() {
        assert_eq!(kinds("-42"), vec![TokenKind::Num(-42.0)]);
    }

    #[test]
    fn lex_subtraction_not_merged() {
        assert_eq!(
            kinds("1 - 2"),
            vec![TokenKind::Num(1.0), TokenKind::Minus, TokenKind::Num(2.0)]
        );
    }

    #[test]
    fn lex_negative_index() {
        assert_eq!(
            kinds(".[-1]"),
            vec![
                TokenKind::Dot,
                TokenKind::LBracket,
                TokenKind::Num(-1.0),
                TokenKind::RBracket
            ]
        );
    }

    #[test]
    fn lex_string_with_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![TokenKind::Str("a\nb".to_string())]
        );
    }

    #[test]
    fn lex_string_unknown_escape_is_literal() {
        assert_eq!(kinds(r#""a\qb""#), vec![TokenKind::Str("aqb".to_string())]);
    }

    #[test]
    fn lex_unterminated_string_errors_at_open_quote() {
        let err = lex(r#""abc"#).unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn lex_keywords() {
        assert_eq!(
            kinds("if . then 1 else 2 end"),
            vec![
                TokenKind::If,
                TokenKind::Dot,
                TokenKind::Then,
                TokenKind::Num(1.0),
                TokenKind::Else,
                TokenKind::Num(2.0),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn lex_unexpected_character_reports_position() {
        let err = lex(".a @ .b").unwrap_err();
        assert_eq!(err.position, 3);
    }

    #[test]
    fn checkpoint_restore_rewinds() {
        let mut lexer = Lexer::new(".foo.bar");
        let cp = lexer.checkpoint();
        let first = lexer.next_token(None).unwrap().unwrap();
        assert_eq!(first.kind, TokenKind::Dot);
        lexer.restore(cp);
        let again = lexer.next_token(None).unwrap().unwrap();
        assert_eq!(again.kind, TokenKind::Dot);
        assert_eq!(again.position, 0);
    }
}

use std::sync::Arc;

use anyhow::Result;
use lazy_static::lazy_static;

use crate::{
    error::LexError,
    token::{SourceInfo, Token, TokenKind},
};

lazy_static! {
    /// Operators and punctuation, longest spellings first so that the first prefix match is the
    /// longest one.
    static ref OPERATORS: Vec<(&'static str, TokenKind)> = vec![
        (">>>=", TokenKind::UnsignedShiftRightAssign),
        ("===", TokenKind::StrictEq),
        ("!==", TokenKind::StrictNotEq),
        ("**=", TokenKind::ExponentAssign),
        ("<<=", TokenKind::ShiftLeftAssign),
        (">>=", TokenKind::ShiftRightAssign),
        ("&&=", TokenKind::AndAssign),
        ("||=", TokenKind::OrAssign),
        ("??=", TokenKind::NullishAssign),
        (">>>", TokenKind::UnsignedShiftRight),
        ("...", TokenKind::Ellipsis),
        ("==", TokenKind::Eq),
        ("!=", TokenKind::NotEq),
        ("<=", TokenKind::LtEq),
        (">=", TokenKind::GtEq),
        ("=>", TokenKind::Arrow),
        ("&&", TokenKind::And),
        ("||", TokenKind::Or),
        ("??", TokenKind::Nullish),
        ("++", TokenKind::Increment),
        ("--", TokenKind::Decrement),
        ("**", TokenKind::Exponent),
        ("<<", TokenKind::ShiftLeft),
        (">>", TokenKind::ShiftRight),
        ("+=", TokenKind::PlusAssign),
        ("-=", TokenKind::MinusAssign),
        ("*=", TokenKind::AsteriskAssign),
        ("/=", TokenKind::SlashAssign),
        ("%=", TokenKind::PercentAssign),
        ("&=", TokenKind::AmpersandAssign),
        ("|=", TokenKind::PipeAssign),
        ("^=", TokenKind::CaretAssign),
        ("=", TokenKind::Assign),
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("*", TokenKind::Asterisk),
        ("/", TokenKind::Slash),
        ("%", TokenKind::Percent),
        ("!", TokenKind::Bang),
        ("~", TokenKind::Tilde),
        ("&", TokenKind::Ampersand),
        ("|", TokenKind::Pipe),
        ("^", TokenKind::Caret),
        ("<", TokenKind::Lt),
        (">", TokenKind::Gt),
        ("(", TokenKind::Lparen),
        (")", TokenKind::Rparen),
        ("{", TokenKind::Lbrace),
        ("}", TokenKind::Rbrace),
        ("[", TokenKind::Lbracket),
        ("]", TokenKind::Rbracket),
        (";", TokenKind::Semicolon),
        (",", TokenKind::Comma),
        (".", TokenKind::Dot),
        (":", TokenKind::Colon),
        ("?", TokenKind::Question),
    ];
}

const RECENT_TOKEN_COUNT: usize = 5;

pub fn tokenize(input: &str, filename: &str) -> Result<Vec<Token>> {
    Lexer::new(input, filename).tokenize()
}

pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    filename: Arc<str>,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str, filename: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            filename: Arc::from(filename),
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        while let Some(token) = self.next_token()? {
            self.tokens.push(token);
        }
        log::debug!("lexed {} tokens from {}", self.tokens.len(), self.filename);
        Ok(self.tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace_and_comments()?;

        let char = match self.char() {
            Some(char) => char,
            None => return Ok(None),
        };
        let source = self.source_info();

        let kind = match char {
            '"' | '\'' => self.read_string(char)?,
            '0'..='9' => self.read_number()?,
            '.' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number()?,
            '/' if self.regex_allowed() => self.read_regular_expression()?,
            _ if is_identifier_start(char) => {
                let word = self.read_while(is_identifier_part);
                TokenKind::keyword(&word).unwrap_or(TokenKind::Identifier(word))
            }
            _ => self.read_operator()?,
        };

        Ok(Some(Token::new(kind, source)))
    }

    fn char(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn read_char(&mut self) -> Option<char> {
        let char = self.char()?;
        self.position += 1;
        if char == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(char)
    }

    fn read_while(&mut self, condition: impl Fn(char) -> bool) -> String {
        let mut literal = String::new();
        while let Some(char) = self.char() {
            if !condition(char) {
                break;
            }
            literal.push(char);
            self.read_char();
        }
        literal
    }

    fn source_info(&self) -> SourceInfo {
        SourceInfo::new(self.line, self.column, self.filename.clone())
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            match (self.char(), self.peek_char(1)) {
                (Some(char), _) if char.is_whitespace() => {
                    self.read_char();
                }
                (Some('/'), Some('/')) => {
                    self.read_while(|char| char != '\n');
                }
                (Some('/'), Some('*')) => {
                    let source = self.source_info();
                    self.read_char();
                    self.read_char();
                    loop {
                        match (self.char(), self.peek_char(1)) {
                            (Some('*'), Some('/')) => {
                                self.read_char();
                                self.read_char();
                                break;
                            }
                            (Some(_), _) => {
                                self.read_char();
                            }
                            (None, _) => {
                                return Err(self.error_at("unterminated block comment", source))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            Some(token) => !token.kind.ends_operand(),
            None => true,
        }
    }

    fn read_operator(&mut self) -> Result<TokenKind> {
        let rest: String = self.chars[self.position..].iter().take(4).collect();
        let matched = OPERATORS
            .iter()
            .find(|(spelling, _)| rest.starts_with(spelling));
        match matched {
            Some((spelling, kind)) => {
                for _ in 0..spelling.len() {
                    self.read_char();
                }
                Ok(kind.clone())
            }
            None => {
                let char = rest.chars().next().unwrap_or_default();
                Err(self.error(&format!("unexpected character '{}'", char)))
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind> {
        let source = self.source_info();
        self.read_char();
        let mut literal = String::new();
        loop {
            let char = match self.read_char() {
                Some(char) => char,
                None => return Err(self.error_at("unterminated string literal", source)),
            };
            match char {
                _ if char == quote => break,
                '\n' => return Err(self.error_at("unterminated string literal", source)),
                '\\' => {
                    if let Some(escaped) = self.read_escape()? {
                        literal.push(escaped);
                    }
                }
                _ => literal.push(char),
            }
        }
        Ok(TokenKind::String(literal))
    }

    fn read_escape(&mut self) -> Result<Option<char>> {
        let char = match self.read_char() {
            Some(char) => char,
            None => return Err(self.error("unterminated escape sequence")),
        };
        let escaped = match char {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            '\n' => return Ok(None),
            'x' => {
                let digits: String = (0..2).filter_map(|_| self.read_char()).collect();
                self.code_point(&digits)?
            }
            'u' if self.char() == Some('{') => {
                self.read_char();
                let digits = self.read_while(|char| char != '}');
                self.read_char();
                self.code_point(&digits)?
            }
            'u' => {
                let digits: String = (0..4).filter_map(|_| self.read_char()).collect();
                self.code_point(&digits)?
            }
            other => other,
        };
        Ok(Some(escaped))
    }

    fn code_point(&self, digits: &str) -> Result<char> {
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(&format!("invalid escape sequence '{}'", digits)))
    }

    fn read_number(&mut self) -> Result<TokenKind> {
        if self.char() == Some('0') {
            let radix = match self.peek_char(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.read_char();
                self.read_char();
                let digits = self.read_while(|char| char.is_digit(radix) || char == '_');
                let digits = digits.replace('_', "");
                return u64::from_str_radix(&digits, radix)
                    .map(|value| TokenKind::Number(value as f64))
                    .map_err(|_| self.error(&format!("invalid base {} literal", radix)));
            }
        }

        let mut literal = self.read_while(|char| char.is_ascii_digit() || char == '_');
        if self.char() == Some('.') {
            self.read_char();
            literal.push('.');
            literal.push_str(&self.read_while(|char| char.is_ascii_digit() || char == '_'));
        }
        if matches!(self.char(), Some('e' | 'E'))
            && (self.peek_char(1).is_some_and(|char| char.is_ascii_digit())
                || (matches!(self.peek_char(1), Some('+' | '-'))
                    && self.peek_char(2).is_some_and(|char| char.is_ascii_digit())))
        {
            literal.push('e');
            self.read_char();
            if let Some(sign @ ('+' | '-')) = self.char() {
                literal.push(sign);
                self.read_char();
            }
            literal.push_str(&self.read_while(|char| char.is_ascii_digit()));
        }
        let literal = literal.replace('_', "");
        literal
            .parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|err| self.error(&format!("invalid number literal {}: {}", literal, err)))
    }

    fn read_regular_expression(&mut self) -> Result<TokenKind> {
        let source = self.source_info();
        self.read_char();
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            let char = match self.read_char() {
                Some('\n') | None => {
                    return Err(self.error_at("unterminated regular expression", source))
                }
                Some(char) => char,
            };
            match char {
                '/' if !in_class => break,
                '[' => in_class = true,
                ']' => in_class = false,
                '\\' => {
                    pattern.push(char);
                    match self.read_char() {
                        Some('\n') | None => {
                            return Err(self.error_at("unterminated regular expression", source))
                        }
                        Some(escaped) => pattern.push(escaped),
                    }
                    continue;
                }
                _ => {}
            }
            pattern.push(char);
        }
        let flags = self.read_while(|char| char.is_ascii_alphabetic());
        Ok(TokenKind::RegularExpression { pattern, flags })
    }

    fn error(&self, message: &str) -> anyhow::Error {
        self.error_at(message, self.source_info())
    }

    fn error_at(&self, message: &str, location: SourceInfo) -> anyhow::Error {
        let recent_tokens = self
            .tokens
            .iter()
            .rev()
            .take(RECENT_TOKEN_COUNT)
            .rev()
            .map(|token| token.to_string())
            .collect();
        LexError {
            message: message.to_string(),
            preview: self.preview(&location),
            location,
            recent_tokens,
        }
        .into()
    }

    /// The offending source line with a caret under the error column.
    fn preview(&self, location: &SourceInfo) -> String {
        let source: String = self.chars.iter().collect();
        let line = source
            .lines()
            .nth(location.line.saturating_sub(1))
            .unwrap_or_default();
        let caret = " ".repeat(location.column.saturating_sub(1));
        format!("{:>4} | {}\n     | {}^", location.line, line, caret)
    }
}

fn is_identifier_start(char: char) -> bool {
    char.is_alphabetic() || char == '_' || char == '$'
}

fn is_identifier_part(char: char) -> bool {
    char.is_alphanumeric() || char == '_' || char == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input, "test.js")
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_lexer() {
        let input = r#"
            let five = 5;
            const add = function(x, y) {
                return x + y;
            };
            // a comment
            /* a block
               comment */
            x === 'single' !== "double";
            a >>>= 2; b **= 3; c => c ?? null;
            d ||= e &&= f ??= g;
        "#;

        let expected = vec![
            TokenKind::Let,
            TokenKind::Identifier("five".to_string()),
            TokenKind::Assign,
            TokenKind::Number(5.0),
            TokenKind::Semicolon,
            TokenKind::Const,
            TokenKind::Identifier("add".to_string()),
            TokenKind::Assign,
            TokenKind::Function,
            TokenKind::Lparen,
            TokenKind::Identifier("x".to_string()),
            TokenKind::Comma,
            TokenKind::Identifier("y".to_string()),
            TokenKind::Rparen,
            TokenKind::Lbrace,
            TokenKind::Return,
            TokenKind::Identifier("x".to_string()),
            TokenKind::Plus,
            TokenKind::Identifier("y".to_string()),
            TokenKind::Semicolon,
            TokenKind::Rbrace,
            TokenKind::Semicolon,
            TokenKind::Identifier("x".to_string()),
            TokenKind::StrictEq,
            TokenKind::String("single".to_string()),
            TokenKind::StrictNotEq,
            TokenKind::String("double".to_string()),
            TokenKind::Semicolon,
            TokenKind::Identifier("a".to_string()),
            TokenKind::UnsignedShiftRightAssign,
            TokenKind::Number(2.0),
            TokenKind::Semicolon,
            TokenKind::Identifier("b".to_string()),
            TokenKind::ExponentAssign,
            TokenKind::Number(3.0),
            TokenKind::Semicolon,
            TokenKind::Identifier("c".to_string()),
            TokenKind::Arrow,
            TokenKind::Identifier("c".to_string()),
            TokenKind::Nullish,
            TokenKind::Null,
            TokenKind::Semicolon,
            TokenKind::Identifier("d".to_string()),
            TokenKind::OrAssign,
            TokenKind::Identifier("e".to_string()),
            TokenKind::AndAssign,
            TokenKind::Identifier("f".to_string()),
            TokenKind::NullishAssign,
            TokenKind::Identifier("g".to_string()),
            TokenKind::Semicolon,
        ];

        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn test_numeric_literals() {
        let tests = vec![
            ("42", 42.0),
            ("3.25", 3.25),
            (".5", 0.5),
            ("0x1F", 31.0),
            ("0o17", 15.0),
            ("0b101", 5.0),
            ("1e3", 1000.0),
            ("2.5e-1", 0.25),
        ];

        for (input, expected) in tests {
            assert_eq!(kinds(input), vec![TokenKind::Number(expected)], "{}", input);
        }
    }

    #[test]
    fn test_string_escapes() {
        let tests = vec![
            (r#""a\"b""#, "a\"b"),
            (r#"'it\'s'"#, "it's"),
            (r#""line\nbreak""#, "line\nbreak"),
            (r#""A\x42""#, "AB"),
            (r#""tab\there""#, "tab\there"),
        ];

        for (input, expected) in tests {
            assert_eq!(kinds(input), vec![TokenKind::String(expected.to_string())]);
        }
    }

    #[test]
    fn test_regular_expression_versus_division() {
        assert_eq!(
            kinds("a / b / c"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Slash,
                TokenKind::Identifier("b".to_string()),
                TokenKind::Slash,
                TokenKind::Identifier("c".to_string()),
            ]
        );
        assert_eq!(
            kinds("x = /a[/]b\\//gi"),
            vec![
                TokenKind::Identifier("x".to_string()),
                TokenKind::Assign,
                TokenKind::RegularExpression {
                    pattern: "a[/]b\\/".to_string(),
                    flags: "gi".to_string(),
                },
            ]
        );
        assert_eq!(
            kinds("(1) / 2"),
            vec![
                TokenKind::Lparen,
                TokenKind::Number(1.0),
                TokenKind::Rparen,
                TokenKind::Slash,
                TokenKind::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_source_positions() {
        let tokens = tokenize("let a\n  = 1;", "pos.js").unwrap();
        let positions: Vec<(usize, usize)> = tokens
            .iter()
            .map(|token| (token.source.line, token.source.column))
            .collect();
        assert_eq!(positions, vec![(1, 1), (1, 5), (2, 3), (2, 5), (2, 6)]);
        assert_eq!(&*tokens[0].source.filename, "pos.js");
    }

    #[test]
    fn test_relexing_reconstructed_source() {
        let input = r#"
            function f(a, b) { return a >>> 1 === b ? "q\"uote" : /re+/g; }
            for (let i = 0x10; i <= 1.5e3; i++) { obj["k"] += -i; }
        "#;
        let tokens = tokenize(input, "a.js").unwrap();
        let reconstructed = tokens
            .iter()
            .map(|token| token.to_string())
            .collect::<Vec<String>>()
            .join(" ");
        let relexed = tokenize(&reconstructed, "a.js").unwrap();
        let original: Vec<TokenKind> = tokens.into_iter().map(|token| token.kind).collect();
        let again: Vec<TokenKind> = relexed.into_iter().map(|token| token.kind).collect();
        assert_eq!(original, again);
    }

    #[test]
    fn test_lex_errors() {
        let error = tokenize("let a = 1;\nlet b = #;", "bad.js").unwrap_err();
        let lex_error = error.downcast_ref::<LexError>().unwrap();
        assert_eq!(lex_error.location.line, 2);
        assert_eq!(lex_error.location.column, 9);
        assert_eq!(
            lex_error.recent_tokens,
            vec!["1", ";", "let", "b", "="]
        );
        assert!(lex_error.preview.contains("let b = #;"));

        assert!(tokenize("'unterminated", "bad.js").is_err());
        assert!(tokenize("/* never closed", "bad.js").is_err());
    }
}

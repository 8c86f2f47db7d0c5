use std::{fmt, sync::Arc};

use crate::value::number_to_string;

#[derive(Debug, PartialEq, Clone)]
pub struct SourceInfo {
    pub line: usize,
    pub column: usize,
    pub filename: Arc<str>,
}

impl SourceInfo {
    pub fn new(line: usize, column: usize, filename: Arc<str>) -> Self {
        Self {
            line,
            column,
            filename,
        }
    }
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self::new(1, 1, Arc::from("<script>"))
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub source: SourceInfo,
}

impl Token {
    pub fn new(kind: TokenKind, source: SourceInfo) -> Self {
        Self { kind, source }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    Identifier(String),
    Number(f64),
    String(String),
    Boolean(bool),
    Undefined,
    Null,
    RegularExpression { pattern: String, flags: String },

    Lparen,
    Rparen,
    Lbrace,
    Rbrace,
    Lbracket,
    Rbracket,
    Semicolon,
    Comma,
    Dot,
    Ellipsis,
    Colon,
    Question,
    Arrow,

    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Exponent,
    Increment,
    Decrement,
    Bang,
    Tilde,
    Ampersand,
    Pipe,
    Caret,
    And,
    Or,
    Nullish,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,

    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,

    Assign,
    PlusAssign,
    MinusAssign,
    AsteriskAssign,
    SlashAssign,
    PercentAssign,
    ExponentAssign,
    AmpersandAssign,
    PipeAssign,
    CaretAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
    UnsignedShiftRightAssign,
    AndAssign,
    OrAssign,
    NullishAssign,

    Function,
    If,
    Else,
    While,
    Do,
    For,
    Return,
    Break,
    Continue,
    Let,
    Const,
    Var,
    New,
    Delete,
    Try,
    Catch,
    Finally,
    Throw,
    Typeof,
    In,
    Instanceof,
    Void,
    Switch,
    Case,
    Default,
    This,
    Class,
    Extends,
    Super,
}

impl TokenKind {
    pub fn variant_eq(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "new" => TokenKind::New,
            "delete" => TokenKind::Delete,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "throw" => TokenKind::Throw,
            "typeof" => TokenKind::Typeof,
            "in" => TokenKind::In,
            "instanceof" => TokenKind::Instanceof,
            "void" => TokenKind::Void,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "this" => TokenKind::This,
            "class" => TokenKind::Class,
            "extends" => TokenKind::Extends,
            "super" => TokenKind::Super,
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "undefined" => TokenKind::Undefined,
            "null" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }

    /// Keywords may still be used as property names after `.` and as object literal keys.
    pub fn property_name(&self) -> Option<String> {
        match self {
            TokenKind::Identifier(name) => Some(name.clone()),
            TokenKind::Boolean(_) | TokenKind::Undefined | TokenKind::Null => Some(self.to_string()),
            kind if kind.is_keyword() => Some(kind.to_string()),
            _ => None,
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Function
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::Var
                | TokenKind::New
                | TokenKind::Delete
                | TokenKind::Try
                | TokenKind::Catch
                | TokenKind::Finally
                | TokenKind::Throw
                | TokenKind::Typeof
                | TokenKind::In
                | TokenKind::Instanceof
                | TokenKind::Void
                | TokenKind::Switch
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::This
                | TokenKind::Class
                | TokenKind::Extends
                | TokenKind::Super
        )
    }

    /// Whether a `/` following this token is a division rather than the start of a regular
    /// expression literal.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_)
                | TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Boolean(_)
                | TokenKind::Undefined
                | TokenKind::Null
                | TokenKind::RegularExpression { .. }
                | TokenKind::Rparen
                | TokenKind::Rbracket
                | TokenKind::Increment
                | TokenKind::Decrement
                | TokenKind::This
                | TokenKind::Super
        )
    }
}

fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for char in value.chars() {
        match char {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(char),
        }
    }
    escaped
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Number(value) => write!(f, "{}", number_to_string(*value)),
            TokenKind::String(value) => write!(f, "\"{}\"", escape_string(value)),
            TokenKind::Boolean(value) => write!(f, "{}", value),
            TokenKind::Undefined => write!(f, "undefined"),
            TokenKind::Null => write!(f, "null"),
            TokenKind::RegularExpression { pattern, flags } => write!(f, "/{}/{}", pattern, flags),

            TokenKind::Lparen => write!(f, "("),
            TokenKind::Rparen => write!(f, ")"),
            TokenKind::Lbrace => write!(f, "{{"),
            TokenKind::Rbrace => write!(f, "}}"),
            TokenKind::Lbracket => write!(f, "["),
            TokenKind::Rbracket => write!(f, "]"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Ellipsis => write!(f, "..."),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::Arrow => write!(f, "=>"),

            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Exponent => write!(f, "**"),
            TokenKind::Increment => write!(f, "++"),
            TokenKind::Decrement => write!(f, "--"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Tilde => write!(f, "~"),
            TokenKind::Ampersand => write!(f, "&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::And => write!(f, "&&"),
            TokenKind::Or => write!(f, "||"),
            TokenKind::Nullish => write!(f, "??"),
            TokenKind::ShiftLeft => write!(f, "<<"),
            TokenKind::ShiftRight => write!(f, ">>"),
            TokenKind::UnsignedShiftRight => write!(f, ">>>"),

            TokenKind::Lt => write!(f, "<"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::Eq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::StrictEq => write!(f, "==="),
            TokenKind::StrictNotEq => write!(f, "!=="),

            TokenKind::Assign => write!(f, "="),
            TokenKind::PlusAssign => write!(f, "+="),
            TokenKind::MinusAssign => write!(f, "-="),
            TokenKind::AsteriskAssign => write!(f, "*="),
            TokenKind::SlashAssign => write!(f, "/="),
            TokenKind::PercentAssign => write!(f, "%="),
            TokenKind::ExponentAssign => write!(f, "**="),
            TokenKind::AmpersandAssign => write!(f, "&="),
            TokenKind::PipeAssign => write!(f, "|="),
            TokenKind::CaretAssign => write!(f, "^="),
            TokenKind::ShiftLeftAssign => write!(f, "<<="),
            TokenKind::ShiftRightAssign => write!(f, ">>="),
            TokenKind::UnsignedShiftRightAssign => write!(f, ">>>="),
            TokenKind::AndAssign => write!(f, "&&="),
            TokenKind::OrAssign => write!(f, "||="),
            TokenKind::NullishAssign => write!(f, "??="),

            TokenKind::Function => write!(f, "function"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::While => write!(f, "while"),
            TokenKind::Do => write!(f, "do"),
            TokenKind::For => write!(f, "for"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::Break => write!(f, "break"),
            TokenKind::Continue => write!(f, "continue"),
            TokenKind::Let => write!(f, "let"),
            TokenKind::Const => write!(f, "const"),
            TokenKind::Var => write!(f, "var"),
            TokenKind::New => write!(f, "new"),
            TokenKind::Delete => write!(f, "delete"),
            TokenKind::Try => write!(f, "try"),
            TokenKind::Catch => write!(f, "catch"),
            TokenKind::Finally => write!(f, "finally"),
            TokenKind::Throw => write!(f, "throw"),
            TokenKind::Typeof => write!(f, "typeof"),
            TokenKind::In => write!(f, "in"),
            TokenKind::Instanceof => write!(f, "instanceof"),
            TokenKind::Void => write!(f, "void"),
            TokenKind::Switch => write!(f, "switch"),
            TokenKind::Case => write!(f, "case"),
            TokenKind::Default => write!(f, "default"),
            TokenKind::This => write!(f, "this"),
            TokenKind::Class => write!(f, "class"),
            TokenKind::Extends => write!(f, "extends"),
            TokenKind::Super => write!(f, "super"),
        }
    }
}

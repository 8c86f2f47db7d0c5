use std::{fmt, rc::Rc};

use crate::token::SourceInfo;

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub source: SourceInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expression>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SwitchCase {
    /// `None` for the `default` clause.
    pub test: Option<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ForInit {
    Declaration(Box<Statement>),
    Expression(Expression),
}

/// The binding target of a `for-in`/`for-of` loop.
#[derive(Debug, PartialEq, Clone)]
pub enum ForBinding {
    Declaration { kind: DeclarationKind, name: String },
    Target(Expression),
}

#[derive(Debug, PartialEq, Clone)]
pub enum StatementKind {
    Expression(Expression),
    Block(Vec<Statement>),
    Empty,
    Declaration {
        kind: DeclarationKind,
        declarations: Vec<Declarator>,
    },
    Function(Rc<FunctionLiteral>),
    Class(Rc<ClassLiteral>),
    Return(Option<Expression>),
    If {
        condition: Expression,
        consequence: Box<Statement>,
        alternative: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    For {
        init: Option<ForInit>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    ForIn {
        binding: ForBinding,
        object: Expression,
        body: Box<Statement>,
    },
    ForOf {
        binding: ForBinding,
        iterable: Expression,
        body: Box<Statement>,
    },
    Switch {
        discriminant: Expression,
        cases: Vec<SwitchCase>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Expression),
    Try {
        block: Vec<Statement>,
        parameter: Option<String>,
        handler: Option<Vec<Statement>>,
        finalizer: Option<Vec<Statement>>,
    },
    Labeled {
        label: String,
        body: Box<Statement>,
    },
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub source: SourceInfo,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, PartialEq, Clone)]
pub enum PropertyKey {
    Static(String),
    Computed(Box<Expression>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyDefinition {
    pub key: PropertyKey,
    pub value: Expression,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expression>,
    pub rest: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    Expression(Box<Expression>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionLiteral {
    pub name: Option<String>,
    pub parameters: Vec<Parameter>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub source: SourceInfo,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ClassMethod {
    pub name: String,
    pub function: Rc<FunctionLiteral>,
    pub is_static: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ClassLiteral {
    pub name: Option<String>,
    pub superclass: Option<Expression>,
    pub constructor: Option<Rc<FunctionLiteral>>,
    pub methods: Vec<ClassMethod>,
    pub source: SourceInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
    BitwiseNot,
    Typeof,
    Void,
    Delete,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Exponent,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    LogicalAnd,
    LogicalOr,
    Nullish,
    In,
    Instanceof,
}

impl BinaryOperator {
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr | BinaryOperator::Nullish
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ExpressionKind {
    Literal(Literal),
    RegularExpression {
        pattern: String,
        flags: String,
    },
    Identifier(String),
    This,
    Array(Vec<Expression>),
    Object(Vec<PropertyDefinition>),
    Function(Rc<FunctionLiteral>),
    Class(Rc<ClassLiteral>),
    Spread(Box<Expression>),
    Dot {
        object: Box<Expression>,
        property: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    SuperDot(String),
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    SuperCall(Vec<Expression>),
    New {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
        prefix: bool,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `operator` is `None` for plain `=`.
    Assign {
        operator: Option<BinaryOperator>,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Ternary {
        condition: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Sequence(Vec<Expression>),
}

impl Expression {
    /// Whether the expression can appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Identifier(_)
                | ExpressionKind::Dot { .. }
                | ExpressionKind::Index { .. }
                | ExpressionKind::SuperDot(_)
        )
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.kind)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.kind)
    }
}

use std::rc::Rc;

use anyhow::Result;

use crate::{
    ast::{
        BinaryOperator, ClassLiteral, ClassMethod, DeclarationKind, Declarator, Expression,
        ExpressionKind, ForBinding, ForInit, FunctionBody, FunctionLiteral, Literal, Parameter,
        Program, PropertyDefinition, PropertyKey, Statement, StatementKind, SwitchCase,
        UnaryOperator,
    },
    error::ParseError,
    lexer,
    token::{SourceInfo, Token, TokenKind},
    value::number_to_string,
};

/// Binding power of the binary operators, loosest first. `**` is the only right-associative
/// one.
fn binary_operator(kind: &TokenKind) -> Option<(u8, BinaryOperator)> {
    let operator = match kind {
        TokenKind::Nullish => (1, BinaryOperator::Nullish),
        TokenKind::Or => (2, BinaryOperator::LogicalOr),
        TokenKind::And => (3, BinaryOperator::LogicalAnd),
        TokenKind::Pipe => (4, BinaryOperator::BitwiseOr),
        TokenKind::Caret => (5, BinaryOperator::BitwiseXor),
        TokenKind::Ampersand => (6, BinaryOperator::BitwiseAnd),
        TokenKind::Eq => (7, BinaryOperator::Equal),
        TokenKind::NotEq => (7, BinaryOperator::NotEqual),
        TokenKind::StrictEq => (7, BinaryOperator::StrictEqual),
        TokenKind::StrictNotEq => (7, BinaryOperator::StrictNotEqual),
        TokenKind::Lt => (8, BinaryOperator::LessThan),
        TokenKind::LtEq => (8, BinaryOperator::LessThanOrEqual),
        TokenKind::Gt => (8, BinaryOperator::GreaterThan),
        TokenKind::GtEq => (8, BinaryOperator::GreaterThanOrEqual),
        TokenKind::Instanceof => (8, BinaryOperator::Instanceof),
        TokenKind::In => (8, BinaryOperator::In),
        TokenKind::ShiftLeft => (9, BinaryOperator::ShiftLeft),
        TokenKind::ShiftRight => (9, BinaryOperator::ShiftRight),
        TokenKind::UnsignedShiftRight => (9, BinaryOperator::UnsignedShiftRight),
        TokenKind::Plus => (10, BinaryOperator::Add),
        TokenKind::Minus => (10, BinaryOperator::Subtract),
        TokenKind::Asterisk => (11, BinaryOperator::Multiply),
        TokenKind::Slash => (11, BinaryOperator::Divide),
        TokenKind::Percent => (11, BinaryOperator::Remainder),
        TokenKind::Exponent => (12, BinaryOperator::Exponent),
        _ => return None,
    };
    Some(operator)
}

/// `None` inside the result means plain `=`.
fn assignment_operator(kind: &TokenKind) -> Option<Option<BinaryOperator>> {
    let operator = match kind {
        TokenKind::Assign => None,
        TokenKind::PlusAssign => Some(BinaryOperator::Add),
        TokenKind::MinusAssign => Some(BinaryOperator::Subtract),
        TokenKind::AsteriskAssign => Some(BinaryOperator::Multiply),
        TokenKind::SlashAssign => Some(BinaryOperator::Divide),
        TokenKind::PercentAssign => Some(BinaryOperator::Remainder),
        TokenKind::ExponentAssign => Some(BinaryOperator::Exponent),
        TokenKind::AmpersandAssign => Some(BinaryOperator::BitwiseAnd),
        TokenKind::PipeAssign => Some(BinaryOperator::BitwiseOr),
        TokenKind::CaretAssign => Some(BinaryOperator::BitwiseXor),
        TokenKind::ShiftLeftAssign => Some(BinaryOperator::ShiftLeft),
        TokenKind::ShiftRightAssign => Some(BinaryOperator::ShiftRight),
        TokenKind::UnsignedShiftRightAssign => Some(BinaryOperator::UnsignedShiftRight),
        TokenKind::AndAssign => Some(BinaryOperator::LogicalAnd),
        TokenKind::OrAssign => Some(BinaryOperator::LogicalOr),
        TokenKind::NullishAssign => Some(BinaryOperator::Nullish),
        _ => return None,
    };
    Some(operator)
}

/// Statements and expressions nested deeper than this are rejected.
const MAX_NESTING_DEPTH: usize = 1000;
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// What the statement being parsed sits inside, for the early `return`, `break` and
/// `continue` checks.
#[derive(Debug, Default)]
struct Context {
    in_function: bool,
    loops: usize,
    breakables: usize,
    labels: Vec<String>,
}

/// `let`, `const` and `class` names may be declared once per block, and not next to a `var`
/// or function of the same name.
fn check_redeclarations<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> Result<()> {
    let mut lexical: Vec<&str> = Vec::new();
    let mut other: Vec<&str> = Vec::new();
    for statement in statements {
        let (names, is_lexical): (Vec<&str>, bool) = match &statement.kind {
            StatementKind::Declaration { kind, declarations } => (
                declarations
                    .iter()
                    .map(|declarator| declarator.name.as_str())
                    .collect(),
                *kind != DeclarationKind::Var,
            ),
            StatementKind::Class(class) => (class.name.iter().map(String::as_str).collect(), true),
            StatementKind::Function(function) => {
                (function.name.iter().map(String::as_str).collect(), false)
            }
            _ => continue,
        };
        for name in names {
            if lexical.contains(&name) || (is_lexical && other.contains(&name)) {
                return Err(ParseError::Invalid {
                    message: format!("Identifier '{}' has already been declared", name),
                    location: statement.source.clone(),
                }
                .into());
            }
            if is_lexical {
                lexical.push(name);
            } else {
                other.push(name);
            }
        }
    }
    Ok(())
}

pub fn parse(tokens: Vec<Token>) -> Result<Program> {
    Parser::new(tokens).parse_program()
}

/// Lexes and parses `input` in one step.
pub fn parse_source(input: &str, filename: &str) -> Result<Program> {
    parse(lexer::tokenize(input, filename)?)
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// Set while parsing a `for` initializer, where `in` ends the expression.
    no_in: bool,
    depth: usize,
    context: Context,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            no_in: false,
            depth: 0,
            context: Context::default(),
        }
    }

    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements: Vec<Statement> = Vec::new();
        while self.peek().is_some() {
            statements.push(self.parse_statement()?);
        }
        check_redeclarations(&statements)?;
        log::debug!("parsed {} top-level statements", statements.len());
        Ok(Program { statements })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens
            .get(self.position + offset)
            .map(|token| &token.kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind().is_some_and(|peeked| peeked.variant_eq(kind))
    }

    fn check_identifier(&self, name: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Identifier(ident)) if ident == name)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Result<Token> {
        match self.tokens.get(self.position) {
            Some(token) => {
                self.position += 1;
                Ok(token.clone())
            }
            None => Err(self.unexpected_end("expected more input")),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        match self.peek() {
            Some(token) if token.kind.variant_eq(&kind) => self.advance(),
            Some(token) => Err(unexpected(token, &format!("expected '{}'", kind))),
            None => Err(self.unexpected_end(&format!("expected '{}'", kind))),
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                ..
            }) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            Some(token) => Err(unexpected(token, "expected identifier")),
            None => Err(self.unexpected_end("expected identifier")),
        }
    }

    fn expect_property_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(token) => match token.kind.property_name() {
                Some(name) => {
                    self.position += 1;
                    Ok(name)
                }
                None => Err(unexpected(token, "expected property name")),
            },
            None => Err(self.unexpected_end("expected property name")),
        }
    }

    fn current_source(&self) -> SourceInfo {
        match self.peek().or_else(|| self.tokens.last()) {
            Some(token) => token.source.clone(),
            None => SourceInfo::default(),
        }
    }

    /// Whether the next token starts on a later line than the previous one.
    fn newline_before(&self) -> bool {
        match (self.position.checked_sub(1), self.peek()) {
            (Some(previous), Some(next)) => self.tokens[previous].source.line < next.source.line,
            _ => true,
        }
    }

    fn unexpected_end(&self, message: &str) -> anyhow::Error {
        ParseError::UnexpectedEnd {
            message: message.to_string(),
        }
        .into()
    }

    fn consume_semicolon(&mut self) -> Result<()> {
        if self.eat(&TokenKind::Semicolon) {
            return Ok(());
        }
        match self.peek() {
            None => Ok(()),
            Some(token) if token.kind == TokenKind::Rbrace => Ok(()),
            Some(_) if self.newline_before() => Ok(()),
            Some(token) => Err(unexpected(token, "expected ';'")),
        }
    }

    fn with_in_allowed<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let no_in = std::mem::replace(&mut self.no_in, false);
        let result = parse(self);
        self.no_in = no_in;
        result
    }

    /// Runs `parse` one level deeper, growing the stack when it runs low and failing once
    /// input nests past `MAX_NESTING_DEPTH`.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::Invalid {
                message: "nesting is too deep".to_string(),
                location: self.current_source(),
            }
            .into());
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || parse(self));
        self.depth -= 1;
        result
    }

    /// Parses a function body, where `return` is allowed and enclosing loops and labels are
    /// out of reach.
    fn function_body<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let function_context = Context {
            in_function: true,
            ..Context::default()
        };
        let outer = std::mem::replace(&mut self.context, function_context);
        let result = self.with_in_allowed(parse);
        self.context = outer;
        result
    }

    fn loop_body(&mut self) -> Result<Box<Statement>> {
        self.context.loops += 1;
        self.context.breakables += 1;
        let body = self.parse_statement();
        self.context.loops -= 1;
        self.context.breakables -= 1;
        Ok(Box::new(body?))
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> Result<Statement> {
        let source = self.current_source();
        let kind = match self.peek_kind() {
            Some(TokenKind::Lbrace) => StatementKind::Block(self.parse_block()?),
            Some(TokenKind::Semicolon) => {
                self.advance()?;
                StatementKind::Empty
            }
            Some(TokenKind::Let | TokenKind::Const | TokenKind::Var) => {
                let declaration = self.parse_declaration()?;
                self.consume_semicolon()?;
                declaration
            }
            Some(TokenKind::Function) => {
                let function = self.parse_function_literal()?;
                if function.name.is_none() {
                    return Err(ParseError::Invalid {
                        message: "function statements require a function name".to_string(),
                        location: source,
                    }
                    .into());
                }
                StatementKind::Function(function)
            }
            Some(TokenKind::Class) => StatementKind::Class(self.parse_class_literal(true)?),
            Some(TokenKind::Return) => {
                if !self.context.in_function {
                    return Err(invalid("Illegal return statement", source));
                }
                self.parse_return_statement()?
            }
            Some(TokenKind::If) => self.parse_if_statement()?,
            Some(TokenKind::While) => self.parse_while_statement()?,
            Some(TokenKind::Do) => self.parse_do_while_statement()?,
            Some(TokenKind::For) => self.parse_for_statement()?,
            Some(TokenKind::Switch) => self.parse_switch_statement()?,
            Some(TokenKind::Try) => self.parse_try_statement()?,
            Some(TokenKind::Throw) => {
                self.advance()?;
                if self.newline_before() {
                    return Err(ParseError::Invalid {
                        message: "illegal newline after throw".to_string(),
                        location: source,
                    }
                    .into());
                }
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                StatementKind::Throw(value)
            }
            Some(TokenKind::Break | TokenKind::Continue) => {
                let keyword = self.advance()?;
                let label = match self.peek_kind() {
                    Some(TokenKind::Identifier(_)) if !self.newline_before() => {
                        Some(self.expect_identifier()?)
                    }
                    _ => None,
                };
                self.consume_semicolon()?;
                let is_break = keyword.kind == TokenKind::Break;
                let message = match &label {
                    Some(label) if !self.context.labels.contains(label) => {
                        Some(format!("Undefined label '{}'", label))
                    }
                    None if is_break && self.context.breakables == 0 => {
                        Some("Illegal break statement".to_string())
                    }
                    None if !is_break && self.context.loops == 0 => Some(
                        "Illegal continue statement: no surrounding iteration statement"
                            .to_string(),
                    ),
                    _ => None,
                };
                if let Some(message) = message {
                    return Err(invalid(&message, source));
                }
                if is_break {
                    StatementKind::Break(label)
                } else {
                    StatementKind::Continue(label)
                }
            }
            Some(TokenKind::Identifier(_))
                if self.peek_kind_at(1).is_some_and(|kind| *kind == TokenKind::Colon) =>
            {
                let label = self.expect_identifier()?;
                self.advance()?;
                self.context.labels.push(label.clone());
                let body = self.parse_statement();
                self.context.labels.pop();
                StatementKind::Labeled {
                    label,
                    body: Box::new(body?),
                }
            }
            _ => {
                let expression = self.parse_expression()?;
                self.consume_semicolon()?;
                StatementKind::Expression(expression)
            }
        };
        Ok(Statement { kind, source })
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>> {
        self.expect(TokenKind::Lbrace)?;
        let mut statements: Vec<Statement> = Vec::new();
        while !self.check(&TokenKind::Rbrace) {
            if self.peek().is_none() {
                return Err(self.unexpected_end("expected '}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::Rbrace)?;
        check_redeclarations(&statements)?;
        Ok(statements)
    }

    fn parse_declaration(&mut self) -> Result<StatementKind> {
        let keyword = self.advance()?;
        let kind = match keyword.kind {
            TokenKind::Let => DeclarationKind::Let,
            TokenKind::Const => DeclarationKind::Const,
            _ => DeclarationKind::Var,
        };
        let mut declarations = Vec::new();
        loop {
            let source = self.current_source();
            let name = self.expect_identifier()?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if kind == DeclarationKind::Const && init.is_none() {
                return Err(ParseError::Invalid {
                    message: format!("missing initializer in const declaration '{}'", name),
                    location: source,
                }
                .into());
            }
            declarations.push(Declarator { name, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(StatementKind::Declaration { kind, declarations })
    }

    fn parse_return_statement(&mut self) -> Result<StatementKind> {
        self.expect(TokenKind::Return)?;
        let value = match self.peek_kind() {
            None | Some(TokenKind::Semicolon | TokenKind::Rbrace) => None,
            Some(_) if self.newline_before() => None,
            Some(_) => Some(self.parse_expression()?),
        };
        self.consume_semicolon()?;
        Ok(StatementKind::Return(value))
    }

    fn parse_parenthesized(&mut self) -> Result<Expression> {
        self.expect(TokenKind::Lparen)?;
        let expression = self.with_in_allowed(|parser| parser.parse_expression())?;
        self.expect(TokenKind::Rparen)?;
        Ok(expression)
    }

    fn parse_if_statement(&mut self) -> Result<StatementKind> {
        self.expect(TokenKind::If)?;
        let condition = self.parse_parenthesized()?;
        let consequence = Box::new(self.parse_statement()?);
        let alternative = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StatementKind::If {
            condition,
            consequence,
            alternative,
        })
    }

    fn parse_while_statement(&mut self) -> Result<StatementKind> {
        self.expect(TokenKind::While)?;
        let condition = self.parse_parenthesized()?;
        let body = self.loop_body()?;
        Ok(StatementKind::While { condition, body })
    }

    fn parse_do_while_statement(&mut self) -> Result<StatementKind> {
        self.expect(TokenKind::Do)?;
        let body = self.loop_body()?;
        self.expect(TokenKind::While)?;
        let condition = self.parse_parenthesized()?;
        self.eat(&TokenKind::Semicolon);
        Ok(StatementKind::DoWhile { body, condition })
    }

    fn parse_for_statement(&mut self) -> Result<StatementKind> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::Lparen)?;

        let declaration_kind = match self.peek_kind() {
            Some(TokenKind::Let) => Some(DeclarationKind::Let),
            Some(TokenKind::Const) => Some(DeclarationKind::Const),
            Some(TokenKind::Var) => Some(DeclarationKind::Var),
            _ => None,
        };

        let init = match declaration_kind {
            Some(kind) => {
                let is_binding = matches!(self.peek_kind_at(1), Some(TokenKind::Identifier(_)))
                    && match self.peek_kind_at(2) {
                        Some(TokenKind::In) => true,
                        Some(TokenKind::Identifier(word)) => word == "of",
                        _ => false,
                    };
                if is_binding {
                    self.advance()?;
                    let name = self.expect_identifier()?;
                    return self.parse_for_in_rest(ForBinding::Declaration { kind, name });
                }
                let source = self.current_source();
                self.no_in = true;
                let declaration = self.parse_declaration();
                self.no_in = false;
                Some(ForInit::Declaration(Box::new(Statement {
                    kind: declaration?,
                    source,
                })))
            }
            None if self.check(&TokenKind::Semicolon) => None,
            None => {
                self.no_in = true;
                let expression = self.parse_expression();
                self.no_in = false;
                let expression = expression?;
                if self.check(&TokenKind::In) || self.check_identifier("of") {
                    return self.parse_for_in_rest(ForBinding::Target(expression));
                }
                Some(ForInit::Expression(expression))
            }
        };

        self.expect(TokenKind::Semicolon)?;
        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::Rparen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Rparen)?;
        let body = self.loop_body()?;

        Ok(StatementKind::For {
            init,
            condition,
            update,
            body,
        })
    }

    /// Parses `in expr) body` or `of expr) body` after the loop binding.
    fn parse_for_in_rest(&mut self, binding: ForBinding) -> Result<StatementKind> {
        let is_of = self.check_identifier("of");
        self.advance()?;
        let target = if is_of {
            self.parse_assignment()?
        } else {
            self.parse_expression()?
        };
        self.expect(TokenKind::Rparen)?;
        let body = self.loop_body()?;
        if is_of {
            Ok(StatementKind::ForOf {
                binding,
                iterable: target,
                body,
            })
        } else {
            Ok(StatementKind::ForIn {
                binding,
                object: target,
                body,
            })
        }
    }

    fn parse_switch_statement(&mut self) -> Result<StatementKind> {
        self.expect(TokenKind::Switch)?;
        let discriminant = self.parse_parenthesized()?;
        self.expect(TokenKind::Lbrace)?;
        self.context.breakables += 1;
        let cases = self.parse_switch_cases();
        self.context.breakables -= 1;
        let cases = cases?;
        check_redeclarations(cases.iter().flat_map(|case| case.body.iter()))?;
        Ok(StatementKind::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        while !self.eat(&TokenKind::Rbrace) {
            let token = self.advance()?;
            let test = match token.kind {
                TokenKind::Case => Some(self.parse_expression()?),
                TokenKind::Default => None,
                _ => return Err(unexpected(&token, "expected 'case' or 'default'")),
            };
            self.expect(TokenKind::Colon)?;
            let mut body = Vec::new();
            while !matches!(
                self.peek_kind(),
                Some(TokenKind::Case | TokenKind::Default | TokenKind::Rbrace) | None
            ) {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(cases)
    }

    fn parse_try_statement(&mut self) -> Result<StatementKind> {
        let try_token = self.expect(TokenKind::Try)?;
        let block = self.parse_block()?;

        let mut parameter = None;
        let handler = if self.eat(&TokenKind::Catch) {
            if self.eat(&TokenKind::Lparen) {
                parameter = Some(self.expect_identifier()?);
                self.expect(TokenKind::Rparen)?;
            }
            Some(self.parse_block()?)
        } else {
            None
        };

        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(unexpected(&try_token, "missing catch or finally after try"));
        }

        Ok(StatementKind::Try {
            block,
            parameter,
            handler,
            finalizer,
        })
    }

    pub fn parse_expression(&mut self) -> Result<Expression> {
        let source = self.current_source();
        let first = self.parse_assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat(&TokenKind::Comma) {
            expressions.push(self.parse_assignment()?);
        }
        Ok(Expression {
            kind: ExpressionKind::Sequence(expressions),
            source,
        })
    }

    fn parse_assignment(&mut self) -> Result<Expression> {
        self.nested(Self::parse_assignment_expression)
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression> {
        if self.arrow_function_ahead() {
            return self.parse_arrow_function();
        }

        let source = self.current_source();
        let target = self.parse_conditional()?;

        let operator = match self.peek_kind().and_then(assignment_operator) {
            Some(operator) => operator,
            None => return Ok(target),
        };
        self.advance()?;
        let value = self.parse_assignment()?;
        Ok(Expression {
            kind: ExpressionKind::Assign {
                operator,
                target: Box::new(target),
                value: Box::new(value),
            },
            source,
        })
    }

    fn arrow_function_ahead(&self) -> bool {
        match self.peek_kind() {
            Some(TokenKind::Identifier(_)) => {
                matches!(self.peek_kind_at(1), Some(TokenKind::Arrow))
            }
            Some(TokenKind::Lparen) => {
                let mut depth = 0usize;
                let mut offset = 0;
                while let Some(kind) = self.peek_kind_at(offset) {
                    match kind {
                        TokenKind::Lparen | TokenKind::Lbracket | TokenKind::Lbrace => depth += 1,
                        TokenKind::Rparen | TokenKind::Rbracket | TokenKind::Rbrace => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(
                                    self.peek_kind_at(offset + 1),
                                    Some(TokenKind::Arrow)
                                );
                            }
                        }
                        _ => {}
                    }
                    offset += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> Result<Expression> {
        let source = self.current_source();
        let parameters = if self.check(&TokenKind::Lparen) {
            self.parse_parameters()?
        } else {
            vec![Parameter {
                name: self.expect_identifier()?,
                default: None,
                rest: false,
            }]
        };
        self.expect(TokenKind::Arrow)?;
        let body = if self.check(&TokenKind::Lbrace) {
            FunctionBody::Block(self.function_body(|parser| parser.parse_block())?)
        } else {
            FunctionBody::Expression(Box::new(self.parse_assignment()?))
        };
        let function = FunctionLiteral {
            name: None,
            parameters,
            body,
            is_arrow: true,
            source: source.clone(),
        };
        Ok(Expression {
            kind: ExpressionKind::Function(Rc::new(function)),
            source,
        })
    }

    fn parse_conditional(&mut self) -> Result<Expression> {
        let source = self.current_source();
        let condition = self.parse_binary(1)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let consequent = self.with_in_allowed(|parser| parser.parse_assignment())?;
        self.expect(TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expression {
            kind: ExpressionKind::Ternary {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            source,
        })
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expression> {
        let source = self.current_source();
        let mut left = self.parse_unary()?;
        loop {
            let (precedence, operator) = match self.peek_kind().and_then(binary_operator) {
                Some((_, BinaryOperator::In)) if self.no_in => break,
                Some((precedence, operator)) if precedence >= min_precedence => {
                    (precedence, operator)
                }
                _ => break,
            };
            self.advance()?;
            let right = if operator == BinaryOperator::Exponent {
                self.nested(|parser| parser.parse_binary(precedence))?
            } else {
                self.parse_binary(precedence + 1)?
            };
            left = Expression {
                kind: ExpressionKind::Binary {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                source: source.clone(),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let source = self.current_source();
        let operator = match self.peek_kind() {
            Some(TokenKind::Bang) => UnaryOperator::Not,
            Some(TokenKind::Minus) => UnaryOperator::Negate,
            Some(TokenKind::Plus) => UnaryOperator::Plus,
            Some(TokenKind::Tilde) => UnaryOperator::BitwiseNot,
            Some(TokenKind::Typeof) => UnaryOperator::Typeof,
            Some(TokenKind::Void) => UnaryOperator::Void,
            Some(TokenKind::Delete) => UnaryOperator::Delete,
            Some(TokenKind::Increment) => UnaryOperator::Increment,
            Some(TokenKind::Decrement) => UnaryOperator::Decrement,
            _ => return self.parse_postfix(),
        };
        self.advance()?;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expression {
            kind: ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
                prefix: true,
            },
            source,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let source = self.current_source();
        let operand = self.parse_call_member()?;
        let operator = match self.peek_kind() {
            Some(TokenKind::Increment) if !self.newline_before() => UnaryOperator::Increment,
            Some(TokenKind::Decrement) if !self.newline_before() => UnaryOperator::Decrement,
            _ => return Ok(operand),
        };
        self.advance()?;
        Ok(Expression {
            kind: ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
                prefix: false,
            },
            source,
        })
    }

    fn parse_call_member(&mut self) -> Result<Expression> {
        let mut expression = match self.peek_kind() {
            Some(TokenKind::New) => self.parse_new()?,
            Some(TokenKind::Super) => self.parse_super()?,
            _ => self.parse_primary()?,
        };
        loop {
            let source = self.current_source();
            expression = match self.peek_kind() {
                Some(TokenKind::Dot | TokenKind::Lbracket) => self.parse_member(expression)?,
                Some(TokenKind::Lparen) => {
                    let arguments = self.parse_arguments()?;
                    Expression {
                        kind: ExpressionKind::Call {
                            callee: Box::new(expression),
                            arguments,
                        },
                        source,
                    }
                }
                _ => return Ok(expression),
            };
        }
    }

    fn parse_member(&mut self, object: Expression) -> Result<Expression> {
        let source = self.current_source();
        let kind = if self.eat(&TokenKind::Dot) {
            ExpressionKind::Dot {
                object: Box::new(object),
                property: self.expect_property_name()?,
            }
        } else {
            self.expect(TokenKind::Lbracket)?;
            let index = self.with_in_allowed(|parser| parser.parse_expression())?;
            self.expect(TokenKind::Rbracket)?;
            ExpressionKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            }
        };
        Ok(Expression { kind, source })
    }

    fn parse_new(&mut self) -> Result<Expression> {
        let source = self.current_source();
        self.expect(TokenKind::New)?;
        let mut callee = if self.check(&TokenKind::New) {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };
        while matches!(self.peek_kind(), Some(TokenKind::Dot | TokenKind::Lbracket)) {
            callee = self.parse_member(callee)?;
        }
        let arguments = if self.check(&TokenKind::Lparen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression {
            kind: ExpressionKind::New {
                callee: Box::new(callee),
                arguments,
            },
            source,
        })
    }

    fn parse_super(&mut self) -> Result<Expression> {
        let source = self.current_source();
        let token = self.expect(TokenKind::Super)?;
        let kind = match self.peek_kind() {
            Some(TokenKind::Lparen) => ExpressionKind::SuperCall(self.parse_arguments()?),
            Some(TokenKind::Dot) => {
                self.advance()?;
                ExpressionKind::SuperDot(self.expect_property_name()?)
            }
            _ => return Err(unexpected(&token, "'super' must be called or accessed")),
        };
        Ok(Expression { kind, source })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>> {
        self.expect(TokenKind::Lparen)?;
        self.with_in_allowed(|parser| parser.parse_element_list(TokenKind::Rparen, false))
    }

    /// Comma separated expressions (spread allowed) up to `end`, which is consumed. Array
    /// literals may contain holes.
    fn parse_element_list(&mut self, end: TokenKind, allow_holes: bool) -> Result<Vec<Expression>> {
        let mut elements = Vec::new();
        loop {
            if self.eat(&end) {
                return Ok(elements);
            }
            let source = self.current_source();
            if allow_holes && self.check(&TokenKind::Comma) {
                self.advance()?;
                elements.push(Expression {
                    kind: ExpressionKind::Literal(Literal::Undefined),
                    source,
                });
                continue;
            }
            let element = if self.eat(&TokenKind::Ellipsis) {
                Expression {
                    kind: ExpressionKind::Spread(Box::new(self.parse_assignment()?)),
                    source,
                }
            } else {
                self.parse_assignment()?
            };
            elements.push(element);
            if !self.eat(&TokenKind::Comma) {
                self.expect(end)?;
                return Ok(elements);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let source = self.current_source();
        let token = self.advance()?;
        let kind = match token.kind {
            TokenKind::Number(value) => ExpressionKind::Literal(Literal::Number(value)),
            TokenKind::String(value) => ExpressionKind::Literal(Literal::String(value)),
            TokenKind::Boolean(value) => ExpressionKind::Literal(Literal::Boolean(value)),
            TokenKind::Null => ExpressionKind::Literal(Literal::Null),
            TokenKind::Undefined => ExpressionKind::Literal(Literal::Undefined),
            TokenKind::RegularExpression { pattern, flags } => {
                ExpressionKind::RegularExpression { pattern, flags }
            }
            TokenKind::Identifier(name) => ExpressionKind::Identifier(name),
            TokenKind::This => ExpressionKind::This,
            TokenKind::Lparen => {
                let expression = self.with_in_allowed(|parser| parser.parse_expression())?;
                self.expect(TokenKind::Rparen)?;
                return Ok(expression);
            }
            TokenKind::Lbracket => ExpressionKind::Array(
                self.with_in_allowed(|parser| parser.parse_element_list(TokenKind::Rbracket, true))?,
            ),
            TokenKind::Lbrace => {
                ExpressionKind::Object(self.with_in_allowed(|parser| parser.parse_object_literal())?)
            }
            TokenKind::Function => {
                self.position -= 1;
                ExpressionKind::Function(self.parse_function_literal()?)
            }
            TokenKind::Class => {
                self.position -= 1;
                ExpressionKind::Class(self.parse_class_literal(false)?)
            }
            _ => return Err(unexpected(&token, "expected an expression")),
        };
        Ok(Expression { kind, source })
    }

    fn parse_object_literal(&mut self) -> Result<Vec<PropertyDefinition>> {
        let mut properties = Vec::new();
        while !self.eat(&TokenKind::Rbrace) {
            let source = self.current_source();
            let token = self.advance()?;

            let key = match &token.kind {
                TokenKind::Lbracket => {
                    let key = self.parse_assignment()?;
                    self.expect(TokenKind::Rbracket)?;
                    PropertyKey::Computed(Box::new(key))
                }
                TokenKind::String(value) => PropertyKey::Static(value.clone()),
                TokenKind::Number(value) => PropertyKey::Static(number_to_string(*value)),
                kind => match kind.property_name() {
                    Some(name) => PropertyKey::Static(name),
                    None => return Err(unexpected(&token, "expected property name")),
                },
            };

            let accessor = matches!(&token.kind, TokenKind::Identifier(name) if name == "get" || name == "set");
            let value = match self.peek_kind() {
                Some(TokenKind::Colon) => {
                    self.advance()?;
                    self.parse_assignment()?
                }
                Some(TokenKind::Lparen) => {
                    let name = match &key {
                        PropertyKey::Static(name) => Some(name.clone()),
                        PropertyKey::Computed(_) => None,
                    };
                    self.parse_method(name, source.clone())?
                }
                Some(TokenKind::Comma | TokenKind::Rbrace) => match &token.kind {
                    TokenKind::Identifier(name) => Expression {
                        kind: ExpressionKind::Identifier(name.clone()),
                        source: source.clone(),
                    },
                    _ => return Err(unexpected(&token, "expected ':' after property name")),
                },
                Some(_) if accessor => {
                    return Err(ParseError::Invalid {
                        message: "getter/setter properties are not supported".to_string(),
                        location: source,
                    }
                    .into())
                }
                Some(_) => {
                    let next = self.advance()?;
                    return Err(unexpected(&next, "expected ':' after property name"));
                }
                None => return Err(self.unexpected_end("expected '}'")),
            };

            properties.push(PropertyDefinition { key, value });
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::Rbrace)?;
                break;
            }
        }
        Ok(properties)
    }

    /// Parses `(params) { body }` of a method definition into a function expression.
    fn parse_method(&mut self, name: Option<String>, source: SourceInfo) -> Result<Expression> {
        let function = self.parse_function_rest(name, source.clone())?;
        Ok(Expression {
            kind: ExpressionKind::Function(function),
            source,
        })
    }

    fn parse_function_literal(&mut self) -> Result<Rc<FunctionLiteral>> {
        let source = self.current_source();
        self.expect(TokenKind::Function)?;
        let name = match self.peek_kind() {
            Some(TokenKind::Identifier(_)) => Some(self.expect_identifier()?),
            _ => None,
        };
        self.parse_function_rest(name, source)
    }

    fn parse_function_rest(
        &mut self,
        name: Option<String>,
        source: SourceInfo,
    ) -> Result<Rc<FunctionLiteral>> {
        let parameters = self.parse_parameters()?;
        let body = self.function_body(|parser| parser.parse_block())?;
        Ok(Rc::new(FunctionLiteral {
            name,
            parameters,
            body: FunctionBody::Block(body),
            is_arrow: false,
            source,
        }))
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>> {
        self.expect(TokenKind::Lparen)?;
        let mut parameters = Vec::new();
        while !self.eat(&TokenKind::Rparen) {
            let rest = self.eat(&TokenKind::Ellipsis);
            let name = self.expect_identifier()?;
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.with_in_allowed(|parser| parser.parse_assignment())?)
            } else {
                None
            };
            parameters.push(Parameter {
                name,
                default,
                rest,
            });
            if rest || !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::Rparen)?;
                break;
            }
        }
        Ok(parameters)
    }

    fn parse_class_literal(&mut self, require_name: bool) -> Result<Rc<ClassLiteral>> {
        let source = self.current_source();
        let class_token = self.expect(TokenKind::Class)?;
        let name = match self.peek_kind() {
            Some(TokenKind::Identifier(_)) => Some(self.expect_identifier()?),
            _ if require_name => return Err(unexpected(&class_token, "class name expected")),
            _ => None,
        };
        let superclass = if self.eat(&TokenKind::Extends) {
            Some(self.parse_call_member()?)
        } else {
            None
        };

        self.expect(TokenKind::Lbrace)?;
        let mut constructor = None;
        let mut methods = Vec::new();
        while !self.eat(&TokenKind::Rbrace) {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            let member_source = self.current_source();
            let is_static = self.check_identifier("static")
                && !matches!(self.peek_kind_at(1), Some(TokenKind::Lparen));
            if is_static {
                self.advance()?;
            }
            let name = match self.peek() {
                Some(Token {
                    kind: TokenKind::String(value),
                    ..
                }) => {
                    let value = value.clone();
                    self.advance()?;
                    value
                }
                _ => self.expect_property_name()?,
            };
            if (name == "get" || name == "set")
                && !matches!(self.peek_kind(), Some(TokenKind::Lparen))
            {
                return Err(ParseError::Invalid {
                    message: "getter/setter properties are not supported".to_string(),
                    location: member_source,
                }
                .into());
            }
            let function = self.parse_function_rest(Some(name.clone()), member_source)?;
            if name == "constructor" && !is_static {
                constructor = Some(function);
            } else {
                methods.push(ClassMethod {
                    name,
                    function,
                    is_static,
                });
            }
        }

        Ok(Rc::new(ClassLiteral {
            name,
            superclass,
            constructor,
            methods,
            source,
        }))
    }
}

fn invalid(message: &str, location: SourceInfo) -> anyhow::Error {
    ParseError::Invalid {
        message: message.to_string(),
        location,
    }
    .into()
}

fn unexpected(token: &Token, message: &str) -> anyhow::Error {
    ParseError::UnexpectedToken {
        token: token.clone(),
        message: message.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_statements(input: &str) -> Vec<StatementKind> {
        parse_source(input, "test.js")
            .unwrap()
            .statements
            .into_iter()
            .map(|statement| statement.kind)
            .collect()
    }

    fn parse_single_expression(input: &str) -> ExpressionKind {
        match parse_statements(input).into_iter().next() {
            Some(StatementKind::Expression(expression)) => expression.kind,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    /// Renders an expression with explicit parentheses so precedence is visible.
    fn render(expression: &Expression) -> String {
        match &expression.kind {
            ExpressionKind::Literal(Literal::Number(value)) => number_to_string(*value),
            ExpressionKind::Literal(Literal::String(value)) => format!("{:?}", value),
            ExpressionKind::Identifier(name) => name.clone(),
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => format!("({} {:?} {})", render(left), operator, render(right)),
            ExpressionKind::Unary {
                operator,
                operand,
                prefix: true,
            } => format!("({:?} {})", operator, render(operand)),
            ExpressionKind::Unary {
                operator,
                operand,
                prefix: false,
            } => format!("({} {:?})", render(operand), operator),
            ExpressionKind::Assign {
                operator,
                target,
                value,
            } => format!("({} ={:?} {})", render(target), operator, render(value)),
            ExpressionKind::Ternary {
                condition,
                consequent,
                alternate,
            } => format!(
                "({} ? {} : {})",
                render(condition),
                render(consequent),
                render(alternate)
            ),
            ExpressionKind::Dot { object, property } => format!("{}.{}", render(object), property),
            ExpressionKind::Index { object, index } => {
                format!("{}[{}]", render(object), render(index))
            }
            ExpressionKind::Call { callee, arguments } => format!(
                "{}({})",
                render(callee),
                arguments.iter().map(render).collect::<Vec<_>>().join(", ")
            ),
            other => format!("{:?}", other),
        }
    }

    fn render_source(input: &str) -> String {
        match parse_statements(input).into_iter().next() {
            Some(StatementKind::Expression(expression)) => render(&expression),
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_operator_precedence() {
        let tests = vec![
            ("1 + 2 * 3", "(1 Add (2 Multiply 3))"),
            ("1 - 2 - 3", "((1 Subtract 2) Subtract 3)"),
            ("2 ** 3 ** 2", "(2 Exponent (3 Exponent 2))"),
            ("a || b && c", "(a LogicalOr (b LogicalAnd c))"),
            ("a == b < c", "(a Equal (b LessThan c))"),
            ("a & b | c ^ d", "((a BitwiseAnd b) BitwiseOr (c BitwiseXor d))"),
            ("1 << 2 + 3", "(1 ShiftLeft (2 Add 3))"),
            ("-a * b", "((Negate a) Multiply b)"),
            ("!a.b(c)[d]", "(Not a.b(c)[d])"),
            ("a = b = c", "(a =None (b =None c))"),
            ("a += b ? c : d", "(a =Some(Add) (b ? c : d))"),
            ("a ? b : c ? d : e", "(a ? b : (c ? d : e))"),
            ("x++ + ++y", "((x Increment) Add (Increment y))"),
            ("typeof a === 'string'", "((Typeof a) StrictEqual \"string\")"),
            ("a ?? b", "(a Nullish b)"),
            ("a in b instanceof c", "((a In b) Instanceof c)"),
        ];

        for (input, expected) in tests {
            assert_eq!(render_source(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_declarations() {
        let statements = parse_statements("let a = 1, b; const c = 2; var d;");
        assert_eq!(statements.len(), 3);
        match &statements[0] {
            StatementKind::Declaration { kind, declarations } => {
                assert_eq!(*kind, DeclarationKind::Let);
                assert_eq!(declarations.len(), 2);
                assert_eq!(declarations[0].name, "a");
                assert!(declarations[1].init.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_source("const x;", "test.js").is_err());
    }

    #[test]
    fn test_for_loop_disambiguation() {
        let statements = parse_statements(
            r#"
            for (let i = 0; i < 10; i++) {}
            for (let key in object) {}
            for (key in object) {}
            for (const item of items) {}
            for (;;) { break; }
            for (var i = 0, j = ("a" in b); i < j; i++, j--) {}
            "#,
        );
        assert!(matches!(statements[0], StatementKind::For { .. }));
        assert!(matches!(
            &statements[1],
            StatementKind::ForIn {
                binding: ForBinding::Declaration { kind: DeclarationKind::Let, name },
                ..
            } if name == "key"
        ));
        assert!(matches!(
            &statements[2],
            StatementKind::ForIn {
                binding: ForBinding::Target(_),
                ..
            }
        ));
        assert!(matches!(&statements[3], StatementKind::ForOf { .. }));
        assert!(matches!(
            &statements[4],
            StatementKind::For {
                init: None,
                condition: None,
                update: None,
                ..
            }
        ));
        assert!(matches!(
            &statements[5],
            StatementKind::For {
                init: Some(ForInit::Declaration(_)),
                update: Some(Expression {
                    kind: ExpressionKind::Sequence(_),
                    ..
                }),
                ..
            }
        ));
    }

    #[test]
    fn test_functions_and_arrows() {
        match parse_single_expression("(a, b = 2, ...rest) => a + b") {
            ExpressionKind::Function(function) => {
                assert!(function.is_arrow);
                assert_eq!(function.parameters.len(), 3);
                assert!(function.parameters[1].default.is_some());
                assert!(function.parameters[2].rest);
                assert!(matches!(function.body, FunctionBody::Expression(_)));
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse_single_expression("x => { return x; }") {
            ExpressionKind::Function(function) => {
                assert!(function.is_arrow);
                assert!(matches!(function.body, FunctionBody::Block(_)));
            }
            other => panic!("unexpected {:?}", other),
        }

        match &parse_statements("function add(x, y) { return x + y; }")[0] {
            StatementKind::Function(function) => {
                assert_eq!(function.name.as_deref(), Some("add"));
                assert!(!function.is_arrow);
            }
            other => panic!("unexpected {:?}", other),
        }

        // A parenthesized expression is not mistaken for an arrow parameter list.
        assert_eq!(render_source("(a + b) * c"), "((a Add b) Multiply c)");
    }

    #[test]
    fn test_object_literals() {
        match parse_single_expression("({ a: 1, 'b': 2, 3: c, [d]: 4, e, f() { return 1; }, if: 5 })")
        {
            ExpressionKind::Object(properties) => {
                let keys: Vec<String> = properties
                    .iter()
                    .map(|property| match &property.key {
                        PropertyKey::Static(name) => name.clone(),
                        PropertyKey::Computed(_) => "[computed]".to_string(),
                    })
                    .collect();
                assert_eq!(keys, vec!["a", "b", "3", "[computed]", "e", "f", "if"]);
                assert!(matches!(properties[5].value.kind, ExpressionKind::Function(_)));
            }
            other => panic!("unexpected {:?}", other),
        }

        let error = parse_source("({ get x() { return 1; } })", "test.js").unwrap_err();
        assert!(error.to_string().contains("getter/setter"));
    }

    #[test]
    fn test_try_catch_finally() {
        match &parse_statements("try { a(); } catch (e) { b(); } finally { c(); }")[0] {
            StatementKind::Try {
                block,
                parameter,
                handler,
                finalizer,
            } => {
                assert_eq!(block.len(), 1);
                assert_eq!(parameter.as_deref(), Some("e"));
                assert!(handler.is_some());
                assert!(finalizer.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_source("try { a(); }", "test.js").is_err());
    }

    #[test]
    fn test_classes() {
        let statements = parse_statements(
            r#"
            class Dog extends Animal {
                constructor(name) { super(name); }
                speak() { return super.speak() + "!"; }
                static create() { return new Dog("rex"); }
            }
            "#,
        );
        match &statements[0] {
            StatementKind::Class(class) => {
                assert_eq!(class.name.as_deref(), Some("Dog"));
                assert!(class.superclass.is_some());
                assert!(class.constructor.is_some());
                assert_eq!(class.methods.len(), 2);
                assert!(class.methods[1].is_static);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_and_member_chains() {
        match parse_single_expression("new a.B(1).c") {
            ExpressionKind::Dot { object, property } => {
                assert_eq!(property, "c");
                match object.kind {
                    ExpressionKind::New { callee, arguments } => {
                        assert_eq!(render(&callee), "a.B");
                        assert_eq!(arguments.len(), 1);
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse_single_expression("new Foo") {
            ExpressionKind::New { arguments, .. } => assert!(arguments.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_return_and_semicolon_insertion() {
        let statements = parse_statements("function f() {\n return\n 1 }\nlet a = 1\nlet b = 2");
        match &statements[0] {
            StatementKind::Function(function) => match &function.body {
                FunctionBody::Block(body) => {
                    assert_eq!(body[0].kind, StatementKind::Return(None));
                    assert_eq!(body.len(), 2);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(statements.len(), 3);

        assert!(parse_source("let a = 1 let b = 2", "test.js").is_err());
    }

    #[test]
    fn test_labels_and_switch() {
        let statements = parse_statements(
            "outer: for (;;) { break outer; }\nswitch (x) { case 1: a(); case 2: break; default: b(); }",
        );
        assert!(matches!(&statements[0], StatementKind::Labeled { label, .. } if label == "outer"));
        match &statements[1] {
            StatementKind::Switch { cases, .. } => {
                assert_eq!(cases.len(), 3);
                assert!(cases[2].test.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        let tests = vec![
            ("let = 5;", "expected identifier"),
            ("if (x { }", "expected ')'"),
            ("foo(1, 2", "unexpected end of input"),
            ("a + ;", "expected an expression"),
        ];

        for (input, expected) in tests {
            let error = parse_source(input, "test.js").unwrap_err();
            assert!(
                error.to_string().contains(expected),
                "{}: {}",
                input,
                error
            );
        }

        let error = parse_source("let x = )", "test.js").unwrap_err();
        match error.downcast_ref::<ParseError>() {
            Some(ParseError::UnexpectedToken { token, .. }) => {
                assert_eq!(token.kind, TokenKind::Rparen);
                assert_eq!((token.source.line, token.source.column), (1, 9));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_early_errors() {
        let tests = vec![
            ("console.log('side'); return 1;", "Illegal return statement"),
            ("if (x) { break; }", "Illegal break statement"),
            ("switch (x) { case 1: continue; }", "Illegal continue statement"),
            ("for (;;) { function f() { break; } }", "Illegal break statement"),
            ("a: { continue b; }", "Undefined label 'b'"),
            ("let l = 1; let l = 2;", "Identifier 'l' has already been declared"),
            ("{ const c = 1; var c; }", "Identifier 'c' has already been declared"),
            ("function f() {} class f {}", "Identifier 'f' has already been declared"),
            ("switch (x) { case 1: let y; break; case 2: let y; }", "Identifier 'y' has already been declared"),
        ];
        for (input, expected) in tests {
            let error = parse_source(input, "test.js").unwrap_err();
            assert!(
                error.to_string().contains(expected),
                "{}: {}",
                input,
                error
            );
        }

        let accepted = vec![
            "function f() { return 1; }",
            "for (;;) { if (x) break; else continue; }",
            "switch (x) { case 1: break; }",
            "outer: for (;;) { for (;;) { continue outer; } }",
            "let a = 1; { let a = 2; }",
            "var v = 1; var v = 2; function g() {} function g() {}",
            "const h = () => { return 1; };",
        ];
        for input in accepted {
            assert!(parse_source(input, "test.js").is_ok(), "{}", input);
        }
    }

    #[test]
    fn test_nesting_limit() {
        let nested = format!("{}1{}", "(".repeat(20000), ")".repeat(20000));
        let error = parse_source(&nested, "test.js").unwrap_err();
        assert!(
            matches!(error.downcast_ref::<ParseError>(), Some(ParseError::Invalid { message, .. }) if message == "nesting is too deep")
        );

        let negations = format!("{}x", "!".repeat(5000));
        assert!(parse_source(&negations, "test.js").is_err());

        let arrays = format!("{}{}", "[".repeat(200), "]".repeat(200));
        assert!(parse_source(&arrays, "test.js").is_ok());
    }
}

use anyhow::anyhow;

use super::{Completion, Eval, Interpreter, Interruption, Reference, STACK_GROWTH, STACK_RED_ZONE};
use crate::{
    ast::{
        DeclarationKind, Expression, ForBinding, ForInit, Program, Statement, StatementKind,
        SwitchCase,
    },
    environment::{Scope, ScopeKind, ScopeRef},
    value::Value,
};

/// What a loop does after its body completes.
enum Flow {
    Next,
    Exit,
    Abrupt(Completion),
}

fn loop_flow(completion: Completion, labels: &[String]) -> Flow {
    match completion {
        Completion::Normal(_) | Completion::Continue(None) => Flow::Next,
        Completion::Continue(Some(label)) if labels.contains(&label) => Flow::Next,
        Completion::Break(None) => Flow::Exit,
        Completion::Break(Some(label)) if labels.contains(&label) => Flow::Exit,
        other => Flow::Abrupt(other),
    }
}

/// Statements that see the labels attached to them.
fn takes_labels(statement: &Statement) -> bool {
    matches!(
        statement.kind,
        StatementKind::While { .. }
            | StatementKind::DoWhile { .. }
            | StatementKind::For { .. }
            | StatementKind::ForIn { .. }
            | StatementKind::ForOf { .. }
            | StatementKind::Labeled { .. }
    )
}

/// Declarations leave the completion value of a statement list alone.
fn produces_value(statement: &Statement) -> bool {
    !matches!(
        statement.kind,
        StatementKind::Declaration { .. }
            | StatementKind::Function(_)
            | StatementKind::Class(_)
            | StatementKind::Empty
    )
}

/// `var` names declared anywhere in `statements`, not descending into nested functions.
fn collect_var_names(statements: &[Statement], names: &mut Vec<String>) {
    for statement in statements {
        collect_statement_var_names(statement, names);
    }
}

fn collect_statement_var_names(statement: &Statement, names: &mut Vec<String>) {
    match &statement.kind {
        StatementKind::Declaration {
            kind: DeclarationKind::Var,
            declarations,
        } => names.extend(declarations.iter().map(|declarator| declarator.name.clone())),
        StatementKind::Block(statements) => collect_var_names(statements, names),
        StatementKind::If {
            consequence,
            alternative,
            ..
        } => {
            collect_statement_var_names(consequence, names);
            if let Some(alternative) = alternative {
                collect_statement_var_names(alternative, names);
            }
        }
        StatementKind::While { body, .. }
        | StatementKind::DoWhile { body, .. }
        | StatementKind::Labeled { body, .. } => collect_statement_var_names(body, names),
        StatementKind::For { init, body, .. } => {
            if let Some(ForInit::Declaration(declaration)) = init {
                collect_statement_var_names(declaration, names);
            }
            collect_statement_var_names(body, names);
        }
        StatementKind::ForIn { binding, body, .. } | StatementKind::ForOf { binding, body, .. } => {
            if let ForBinding::Declaration {
                kind: DeclarationKind::Var,
                name,
            } = binding
            {
                names.push(name.clone());
            }
            collect_statement_var_names(body, names);
        }
        StatementKind::Switch { cases, .. } => {
            for case in cases {
                collect_var_names(&case.body, names);
            }
        }
        StatementKind::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            collect_var_names(block, names);
            if let Some(handler) = handler {
                collect_var_names(handler, names);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, names);
            }
        }
        _ => {}
    }
}

impl Interpreter {
    pub(crate) fn execute_program(&mut self, program: &Program) -> Eval<Value> {
        log::debug!("executing {} statements", program.statements.len());
        let scope = self.global_scope.clone();
        self.hoist_declarations(&program.statements, &scope)?;
        match self.execute_statements(&program.statements)? {
            Completion::Normal(value) => Ok(value),
            Completion::Return(_) => Err(anyhow!("SyntaxError: Illegal return statement").into()),
            Completion::Break(_) | Completion::Continue(_) => {
                Err(anyhow!("SyntaxError: Illegal break or continue statement").into())
            }
        }
    }

    /// Declares the `var` names and function declarations of a function or script body
    /// before any of it runs. At the top level both become global object properties.
    pub(crate) fn hoist_declarations(
        &mut self,
        statements: &[Statement],
        scope: &ScopeRef,
    ) -> Eval<()> {
        let is_global = scope.borrow().kind() == ScopeKind::Global;
        let mut names = Vec::new();
        collect_var_names(statements, &mut names);
        for name in names {
            if is_global {
                let mut global = self.global_object.borrow_mut();
                if !global.has_own_property(&name) {
                    global.set(&name, Value::Undefined);
                }
            } else if !scope.borrow().has_own(&name) {
                scope.borrow_mut().declare(&name, Value::Undefined, true);
            }
        }
        self.declare_functions(statements, scope);
        Ok(())
    }

    fn declare_functions(&mut self, statements: &[Statement], scope: &ScopeRef) {
        let is_global = scope.borrow().kind() == ScopeKind::Global;
        for statement in statements {
            if let StatementKind::Function(function) = &statement.kind {
                let name = function.name.clone().unwrap_or_default();
                let closure = self.create_closure(function, scope.clone(), None, false, None);
                if is_global {
                    self.global_object
                        .borrow_mut()
                        .set(&name, Value::Object(closure));
                } else {
                    scope
                        .borrow_mut()
                        .declare(&name, Value::Object(closure), true);
                }
            }
        }
    }

    /// Runs statements in order, stopping at the first abrupt completion. A normal
    /// completion carries the value of the last statement.
    pub(crate) fn execute_statements(&mut self, statements: &[Statement]) -> Eval<Completion> {
        let mut last = Value::Undefined;
        for statement in statements {
            match self.execute(statement)? {
                Completion::Normal(value) if produces_value(statement) => last = value,
                Completion::Normal(_) => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    /// Runs statements in a fresh block scope.
    pub(crate) fn execute_block(&mut self, statements: &[Statement]) -> Eval<Completion> {
        let scope = Scope::new_block(self.current_scope());
        self.declare_functions(statements, &scope);
        self.with_scope(scope, |interpreter| interpreter.execute_statements(statements))
    }

    pub(crate) fn execute(&mut self, statement: &Statement) -> Eval<Completion> {
        self.execute_labeled(statement, &[])
    }

    fn execute_labeled(&mut self, statement: &Statement, labels: &[String]) -> Eval<Completion> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.execute_statement(statement, labels)
        })
    }

    fn execute_statement(&mut self, statement: &Statement, labels: &[String]) -> Eval<Completion> {
        if let Some(frame) = self.call_stack.last_mut() {
            frame.source = statement.source.clone();
        }

        let completion = match &statement.kind {
            StatementKind::Expression(expression) => Completion::Normal(self.evaluate(expression)?),
            StatementKind::Block(statements) => self.execute_block(statements)?,
            StatementKind::Empty | StatementKind::Function(_) => Completion::Normal(Value::Undefined),
            StatementKind::Declaration { kind, declarations } => {
                for declarator in declarations {
                    let value = match &declarator.init {
                        Some(init) => self.evaluate_named(init, &declarator.name)?,
                        None if *kind == DeclarationKind::Var => continue,
                        None => Value::Undefined,
                    };
                    match kind {
                        DeclarationKind::Var => self.assign_variable(&declarator.name, value)?,
                        DeclarationKind::Let | DeclarationKind::Const => self
                            .current_scope()
                            .borrow_mut()
                            .declare(&declarator.name, value, *kind == DeclarationKind::Let),
                    }
                }
                Completion::Normal(Value::Undefined)
            }
            StatementKind::Class(class) => {
                let constructor = self.create_class(class, None)?;
                let name = class.name.clone().unwrap_or_default();
                self.current_scope()
                    .borrow_mut()
                    .declare(&name, constructor, true);
                Completion::Normal(Value::Undefined)
            }
            StatementKind::Return(value) => {
                let value = match value {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Undefined,
                };
                Completion::Return(value)
            }
            StatementKind::If {
                condition,
                consequence,
                alternative,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(consequence)?
                } else if let Some(alternative) = alternative {
                    self.execute(alternative)?
                } else {
                    Completion::Normal(Value::Undefined)
                }
            }
            StatementKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match loop_flow(self.execute(body)?, labels) {
                        Flow::Next => {}
                        Flow::Exit => break,
                        Flow::Abrupt(completion) => return Ok(completion),
                    }
                }
                Completion::Normal(Value::Undefined)
            }
            StatementKind::DoWhile { body, condition } => {
                loop {
                    match loop_flow(self.execute(body)?, labels) {
                        Flow::Next => {}
                        Flow::Exit => break,
                        Flow::Abrupt(completion) => return Ok(completion),
                    }
                    if !self.evaluate(condition)?.is_truthy() {
                        break;
                    }
                }
                Completion::Normal(Value::Undefined)
            }
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => self.execute_for(init, condition, update, body, labels)?,
            StatementKind::ForIn {
                binding,
                object,
                body,
            } => {
                let object = self.evaluate(object)?;
                let keys = self.for_in_keys(&object);
                let values = keys.into_iter().map(Value::from).collect();
                self.execute_for_each(binding, values, body, labels)?
            }
            StatementKind::ForOf {
                binding,
                iterable,
                body,
            } => {
                let iterable = self.evaluate(iterable)?;
                let values = self.iterable_to_vec(&iterable)?;
                self.execute_for_each(binding, values, body, labels)?
            }
            StatementKind::Switch {
                discriminant,
                cases,
            } => self.execute_switch(discriminant, cases, labels)?,
            StatementKind::Break(label) => Completion::Break(label.clone()),
            StatementKind::Continue(label) => Completion::Continue(label.clone()),
            StatementKind::Throw(expression) => {
                let value = self.evaluate(expression)?;
                return self.throw_value(value);
            }
            StatementKind::Try {
                block,
                parameter,
                handler,
                finalizer,
            } => self.execute_try(
                block,
                parameter.as_deref(),
                handler.as_deref(),
                finalizer.as_deref(),
            )?,
            StatementKind::Labeled { label, body } => {
                let mut labels = labels.to_vec();
                labels.push(label.clone());
                let completion = if takes_labels(body) {
                    self.execute_labeled(body, &labels)?
                } else {
                    self.execute(body)?
                };
                match completion {
                    Completion::Break(Some(target)) if target == *label => {
                        Completion::Normal(Value::Undefined)
                    }
                    other => other,
                }
            }
        };
        Ok(completion)
    }

    fn execute_for(
        &mut self,
        init: &Option<ForInit>,
        condition: &Option<Expression>,
        update: &Option<Expression>,
        body: &Statement,
        labels: &[String],
    ) -> Eval<Completion> {
        let per_iteration = matches!(
            init,
            Some(ForInit::Declaration(declaration)) if matches!(
                declaration.kind,
                StatementKind::Declaration { kind: DeclarationKind::Let | DeclarationKind::Const, .. }
            )
        );

        let scope = Scope::new_block(self.current_scope());
        self.with_scope(scope, |interpreter| {
            match init {
                Some(ForInit::Declaration(declaration)) => {
                    interpreter.execute(declaration)?;
                }
                Some(ForInit::Expression(expression)) => {
                    interpreter.evaluate(expression)?;
                }
                None => {}
            }

            loop {
                if let Some(condition) = condition {
                    if !interpreter.evaluate(condition)?.is_truthy() {
                        break;
                    }
                }
                match loop_flow(interpreter.execute(body)?, labels) {
                    Flow::Next => {}
                    Flow::Exit => break,
                    Flow::Abrupt(completion) => return Ok(completion),
                }
                if per_iteration {
                    let copy = Scope::copy_block(&interpreter.current_scope());
                    interpreter.replace_scope(copy);
                }
                if let Some(update) = update {
                    interpreter.evaluate(update)?;
                }
            }
            Ok(Completion::Normal(Value::Undefined))
        })
    }

    /// Shared body of `for-in` and `for-of`: binds each value in turn and runs `body`.
    fn execute_for_each(
        &mut self,
        binding: &ForBinding,
        values: Vec<Value>,
        body: &Statement,
        labels: &[String],
    ) -> Eval<Completion> {
        for value in values {
            let completion = match binding {
                ForBinding::Declaration { kind, name } if *kind != DeclarationKind::Var => {
                    let scope = Scope::new_block(self.current_scope());
                    scope
                        .borrow_mut()
                        .declare(name, value, *kind == DeclarationKind::Let);
                    self.with_scope(scope, |interpreter| interpreter.execute(body))?
                }
                ForBinding::Declaration { name, .. } => {
                    self.assign_variable(name, value)?;
                    self.execute(body)?
                }
                ForBinding::Target(target) => {
                    let reference = self.evaluate_assignment_target(target)?;
                    self.put_value(&reference, value)?;
                    self.execute(body)?
                }
            };
            match loop_flow(completion, labels) {
                Flow::Next => {}
                Flow::Exit => break,
                Flow::Abrupt(completion) => return Ok(completion),
            }
        }
        Ok(Completion::Normal(Value::Undefined))
    }

    /// Keys visited by `for-in`: own enumerable keys first, then inherited enumerable keys
    /// that are not shadowed.
    pub(crate) fn for_in_keys(&self, value: &Value) -> Vec<String> {
        let object = match value {
            Value::Object(object) => object.clone(),
            Value::String(string) => {
                return (0..string.chars().count()).map(|i| i.to_string()).collect()
            }
            _ => return Vec::new(),
        };

        let object = object.borrow();
        let mut keys = object.enumerable_keys();
        let mut seen: Vec<String> = object.own_keys();
        for prototype in object.prototype_chain() {
            let prototype = prototype.borrow();
            for key in prototype.enumerable_keys() {
                if !seen.contains(&key) {
                    keys.push(key);
                }
            }
            seen.extend(prototype.own_keys());
        }
        keys
    }

    fn execute_switch(
        &mut self,
        discriminant: &Expression,
        cases: &[SwitchCase],
        labels: &[String],
    ) -> Eval<Completion> {
        let discriminant = self.evaluate(discriminant)?;
        let scope = Scope::new_block(self.current_scope());
        self.with_scope(scope, |interpreter| {
            let mut start = None;
            for (index, case) in cases.iter().enumerate() {
                if let Some(test) = &case.test {
                    if interpreter.evaluate(test)?.strict_equals(&discriminant) {
                        start = Some(index);
                        break;
                    }
                }
            }
            let start = match start.or_else(|| cases.iter().position(|case| case.test.is_none())) {
                Some(start) => start,
                None => return Ok(Completion::Normal(Value::Undefined)),
            };

            for case in &cases[start..] {
                match interpreter.execute_statements(&case.body)? {
                    Completion::Normal(_) => {}
                    Completion::Break(None) => break,
                    Completion::Break(Some(label)) if labels.contains(&label) => break,
                    abrupt => return Ok(abrupt),
                }
            }
            Ok(Completion::Normal(Value::Undefined))
        })
    }

    /// The `finally` block always runs; if it completes abruptly its completion replaces
    /// whatever the `try` or `catch` block produced.
    fn execute_try(
        &mut self,
        block: &[Statement],
        parameter: Option<&str>,
        handler: Option<&[Statement]>,
        finalizer: Option<&[Statement]>,
    ) -> Eval<Completion> {
        let result = match (self.execute_block(block), handler) {
            (Err(Interruption::Throw(exception)), Some(handler)) => {
                let scope = Scope::new_block(self.current_scope());
                if let Some(parameter) = parameter {
                    scope
                        .borrow_mut()
                        .declare(parameter, exception.value, true);
                }
                self.with_scope(scope, |interpreter| interpreter.execute_block(handler))
            }
            (result, _) => result,
        };

        let finalizer = match finalizer {
            Some(finalizer) => finalizer,
            None => return result,
        };
        if let Err(Interruption::Fatal(_)) = result {
            return result;
        }
        match self.execute_block(finalizer)? {
            Completion::Normal(_) => result,
            abrupt => Ok(abrupt),
        }
    }

    /// Evaluates the left side of a `for-in`/`for-of` binding that is not a declaration.
    fn evaluate_assignment_target(&mut self, target: &Expression) -> Eval<Reference> {
        if !target.is_assignable() {
            return Err(anyhow!("SyntaxError: Invalid left-hand side in for-loop").into());
        }
        self.evaluate_reference(target)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{test_eval, test_output, test_render, CapturedConsole};
    use crate::{interpreter::Interpreter, value::Value};

    #[test]
    fn test_block_scoping() {
        let tests = vec![
            ("let x = 1; if (true) { if (true) { x = 4 } } x", "4"),
            ("let x = 1; { let x = 2; } x", "1"),
            ("var y = 1; { var y = 2; } y", "2"),
            ("function f() { var inner = 1; } f(); typeof inner", "undefined"),
            ("let total = 0; for (let i = 0; i < 5; i++) { total += i; } total", "10"),
            ("const c = 3; { const c = 4; } c", "3"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_hoisting() {
        let tests = vec![
            ("hoisted(); function hoisted() { return 1; }", "1"),
            ("typeof later; var later = 1; typeof later", "number"),
            ("function f() { v = 5; var v; return v; } f()", "5"),
            ("function f() { return typeof g; function g() {} } f()", "function"),
            ("var a; a", "undefined"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_loops() {
        let tests = vec![
            ("let i = 0; while (i < 3) { i++; } i", "3"),
            ("let i = 0; do { i++; } while (i < 0); i", "1"),
            ("let s = ''; for (let i = 0; i < 10; i++) { if (i == 3) continue; if (i == 6) break; s += i; } s", "01245"),
            ("let keys = []; for (let k in { a: 1, b: 2 }) keys.push(k); keys", "[ 'a', 'b' ]"),
            ("let out = []; for (const v of [3, 4]) out.push(v * 2); out", "[ 6, 8 ]"),
            ("let out = ''; for (const c of 'abc') out = c + out; out", "cba"),
            ("let n = 0; outer: for (let i = 0; i < 3; i++) { for (let j = 0; j < 3; j++) { if (j == 1) continue outer; if (i == 2) break outer; n++; } } n", "2"),
            ("let hit = false; block: { break block; hit = true; } hit", "false"),
            ("var k; for (k in [7, 8]) {} k", "1"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_for_in_walks_prototypes() {
        let input = r#"
            function Base() { this.own = 1; }
            Base.prototype.inherited = 2;
            let keys = [];
            for (let key in new Base()) keys.push(key);
            keys
        "#;
        assert_eq!(test_render(input), "[ 'own', 'inherited' ]");
    }

    #[test]
    fn test_let_loop_bindings_are_per_iteration() {
        let input = r#"
            let callbacks = [];
            for (let i = 0; i < 3; i++) { callbacks.push(() => i); }
            callbacks.map(f => f())
        "#;
        assert_eq!(test_render(input), "[ 0, 1, 2 ]");
    }

    #[test]
    fn test_switch() {
        let tests = vec![
            ("let r; switch (2) { case 1: r = 'one'; break; case 2: r = 'two'; break; default: r = 'other'; } r", "two"),
            ("let r = ''; switch (1) { case 1: r += 'a'; case 2: r += 'b'; break; case 3: r += 'c'; } r", "ab"),
            ("let r; switch ('x') { case 1: r = 1; break; default: r = 'default'; } r", "default"),
            ("let r = 'none'; switch (5) { case 1: r = 1; } r", "none"),
            ("let r; switch ('2') { case 2: r = 'loose'; break; default: r = 'strict'; } r", "strict"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_try_catch_finally() {
        let input = r#"
            let order = [];
            function f() {
                try { order.push('try'); throw "e"; }
                catch (e) { order.push('catch'); return "catch"; }
                finally { order.push('finally'); return "finally"; }
            }
            [f(), order]
        "#;
        assert_eq!(
            test_render(input),
            "[ 'finally', [ 'try', 'catch', 'finally' ] ]"
        );

        let tests = vec![
            ("let r; try { throw new Error('boom'); } catch (e) { r = e.message; } r", "boom"),
            ("let r = 0; try { r = 1; } finally { r = 2; } r", "2"),
            ("function f() { try { return 'try'; } finally { } } f()", "try"),
            ("let r; try { try { throw 1; } finally { r = 'inner'; } } catch (e) { r += e; } r", "inner1"),
            ("let r; try { null.x; } catch (e) { r = e instanceof TypeError; } r", "true"),
            ("let r; try { missing; } catch (e) { r = e.name; } r", "ReferenceError"),
            ("let r; try { throw 5; } catch { r = 'no binding'; } r", "no binding"),
            ("function f() { for (;;) { try { break; } finally { return 'finally wins'; } } } f()", "finally wins"),
        ];
        for (input, expected) in tests {
            assert_eq!(test_render(input), expected, "{}", input);
        }
    }

    #[test]
    fn test_early_errors_run_nothing() {
        let tests = vec![
            ("console.log('side'); return 1;", "Illegal return"),
            ("console.log('side'); break;", "Illegal break"),
            ("console.log('side'); let twice = 1; let twice = 2;", "already been declared"),
        ];
        for (input, expected) in tests {
            let console = CapturedConsole::default();
            let mut interpreter = Interpreter::new();
            interpreter.set_console(Box::new(console.clone()));
            let error = interpreter.interpret(input).unwrap_err();
            assert!(error.to_string().contains(expected), "{}: {}", input, error);
            assert!(console.0.borrow().is_empty(), "{}", input);
        }
    }

    #[test]
    fn test_statement_completion_value() {
        assert_eq!(test_eval("1; 2; 3").unwrap(), Value::from(3.0));
        assert_eq!(test_eval("if (true) { 'yes' } else { 'no' }").unwrap(), Value::from("yes"));
        assert_eq!(test_eval("1; let x = 2;").unwrap(), Value::from(1.0));
        assert_eq!(test_eval("'kept'; var v; ; class C {}").unwrap(), Value::from("kept"));
        assert_eq!(test_eval("g(); function g() { return 'called'; }").unwrap(), Value::from("called"));
        assert_eq!(test_eval("let only = 1;").unwrap(), Value::Undefined);
        assert_eq!(test_output("console.log('side effect'); 1"), vec!["side effect"]);
    }
}

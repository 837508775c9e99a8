use {
    crate::{names::NameGenerator, Error, Result},
    frontend::ast::*,
    std::collections::{BTreeMap, BTreeSet},
};

const PASS: &str = "scope flattener";

#[derive(Default)]
struct Scope {
    declared: BTreeSet<Ident>,
    hoisted: Vec<Ident>,
    renames: Vec<BTreeMap<Ident, Ident>>,
}

impl Scope {
    fn resolve(&self, name: Ident) -> Ident {
        self.renames
            .iter()
            .rev()
            .find_map(|frame| frame.get(&name))
            .cloned()
            .unwrap_or(name)
    }

    fn rename(&self, expression: Expression) -> Expression {
        match expression {
            Expression::Identifier(name) => Expression::Identifier(self.resolve(name)),
            Expression::Call(call) => Expression::Call(FunctionCall {
                arguments: call
                    .arguments
                    .into_iter()
                    .map(|argument| self.rename(argument))
                    .collect(),
                ..call
            }),
            literal => literal,
        }
    }

    fn declare(&mut self, name: Ident, names: &mut NameGenerator) -> Ident {
        let declared = if self.declared.contains(&name) {
            names.fresh_from(&name)
        } else {
            name.clone()
        };
        self.declared.insert(declared.clone());
        if let Some(frame) = self.renames.last_mut() {
            frame.insert(name, declared.clone());
        }
        declared
    }
}

struct ScopeFlattener<'a> {
    names: &'a mut NameGenerator,
    functions: Vec<FunctionDefinition>,
}

impl ScopeFlattener<'_> {
    fn function(&mut self, function: FunctionDefinition) -> Result<()> {
        let FunctionDefinition {
            name,
            parameters,
            returns,
            body,
        } = function;
        let mut scope = Scope {
            declared: parameters.iter().chain(&returns).cloned().collect(),
            ..Default::default()
        };
        let index = self.functions.len();
        self.functions.push(FunctionDefinition {
            name,
            parameters,
            returns,
            body: Block::default(),
        });
        self.functions[index].body = self.body(body.statements, &mut scope)?;
        Ok(())
    }

    fn body(&mut self, statements: Vec<Statement>, scope: &mut Scope) -> Result<Block> {
        let statements = self.statements(statements, true, scope)?;
        Ok(Block::new(
            std::mem::take(&mut scope.hoisted)
                .into_iter()
                .map(|name| Statement::declare(vec![name], None))
                .chain(statements)
                .collect(),
        ))
    }

    fn statements(
        &mut self,
        statements: Vec<Statement>,
        top_level: bool,
        scope: &mut Scope,
    ) -> Result<Vec<Statement>> {
        scope.renames.push(BTreeMap::new());
        let mut output = vec![];
        for statement in statements {
            self.statement(statement, top_level, scope, &mut output)?;
        }
        scope.renames.pop();
        Ok(output)
    }

    fn statement(
        &mut self,
        statement: Statement,
        top_level: bool,
        scope: &mut Scope,
        output: &mut Vec<Statement>,
    ) -> Result<()> {
        match statement {
            Statement::FunctionDefinition(function) => self.function(function)?,
            Statement::Block(block) => {
                output.extend(self.statements(block.statements, top_level, scope)?);
            }
            Statement::VariableDeclaration(declaration) => {
                let value = declaration.value.map(|value| scope.rename(value));
                let variables = declaration
                    .variables
                    .into_iter()
                    .map(|variable| scope.declare(variable, self.names))
                    .collect::<Vec<_>>();
                if top_level {
                    output.push(Statement::declare(variables, value));
                } else {
                    scope.hoisted.extend(variables.iter().cloned());
                    match value {
                        Some(value) => output.push(Statement::assign(variables, value)),
                        None => output.extend(variables.into_iter().map(|variable| {
                            Statement::assign(vec![variable], Expression::literal(0u8))
                        })),
                    }
                }
            }
            Statement::Assignment(assignment) => output.push(Statement::assign(
                assignment
                    .variables
                    .into_iter()
                    .map(|variable| scope.resolve(variable))
                    .collect(),
                scope.rename(assignment.value),
            )),
            Statement::Expression(expression) => {
                output.push(Statement::Expression(scope.rename(expression)));
            }
            Statement::If(r#if) => {
                let condition = scope.rename(r#if.condition);
                let body = Block::new(self.statements(r#if.body.statements, false, scope)?);
                let else_body = r#if
                    .else_body
                    .map(|else_body| self.statements(else_body.statements, false, scope))
                    .transpose()?
                    .map(Block::new);
                output.push(Statement::If(If {
                    condition,
                    body,
                    else_body,
                }));
            }
            Statement::Leave => output.push(Statement::Leave),
            Statement::Switch(_)
            | Statement::ForLoop(_)
            | Statement::Break
            | Statement::Continue => {
                return Err(Error::invariant(
                    PASS,
                    format!("{} should have been removed", statement.kind()),
                ))
            }
        }
        Ok(())
    }
}

/// Moves every function definition to the root and every declaration to the top level of
/// its function. A variable declared without a value is reset to zero where it was declared.
pub(crate) fn run(block: Block, names: &mut NameGenerator) -> Result<Block> {
    let mut flattener = ScopeFlattener {
        names,
        functions: vec![],
    };
    let root = flattener.body(block.statements, &mut Scope::default())?;
    Ok(Block::new(
        root.statements
            .into_iter()
            .chain(
                flattener
                    .functions
                    .into_iter()
                    .map(Statement::FunctionDefinition),
            )
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::passes::test_utils::block};

    fn flatten(src: &str) -> Block {
        run(block(src), &mut NameGenerator::new()).unwrap()
    }

    #[test]
    fn nested_declarations_are_hoisted() {
        let flattened = flatten(
            "{ function f(a) -> r { if a { let x := add(a, 1) if x { let z r := z } r := x } \
             { let y r := y } } }",
        );
        let expected = block(
            "{ function f(a) -> r { let x let z \
             if a { x := add(a, 1) if x { z := 0 r := z } r := x } let y r := y } }",
        );
        assert_eq!(flattened, expected);
    }

    #[test]
    fn nested_functions_move_to_the_root() {
        let flattened = flatten(
            "{ function f() -> r { function g() -> s { function h() { } s := 1 } r := g() } \
             function k() { } }",
        );
        let expected = block(
            "{ function f() -> r { r := g() } function g() -> s { s := 1 } \
             function h() { } function k() { } }",
        );
        assert_eq!(flattened, expected);
    }

    #[test]
    fn conflicting_declarations_are_renamed() {
        let flattened = flatten(
            "{ function f(a) -> r { if a { let x := 1 r := x } if r { let x := 2 r := add(r, x) } } }",
        );
        let expected = block(
            "{ function f(a) -> r { let x let __warp_x_0 \
             if a { x := 1 r := x } if r { __warp_x_0 := 2 r := add(r, __warp_x_0) } } }",
        );
        assert_eq!(flattened, expected);
    }

    #[test]
    fn root_statements_are_flattened_first() {
        let flattened = flatten("{ function f() { } let a := 1 if a { let b := a sstore(b, a) } }");
        let expected =
            block("{ let b let a := 1 if a { b := a sstore(b, a) } function f() { } }");
        assert_eq!(flattened, expected);
    }

    #[test]
    fn flattening_is_idempotent() {
        let once = flatten(
            "{ function f(a) -> r { { let x := a function g() { } } if a { let y := 2 r := y } } }",
        );
        let twice = run(once.clone(), &mut NameGenerator::new()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn loops_are_an_invariant_violation() {
        let result = run(block("{ function f() { for { } 1 { } { } } }"), &mut NameGenerator::new());
        assert!(matches!(result, Err(Error::Invariant { .. })));
    }
}

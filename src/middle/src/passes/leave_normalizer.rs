use {
    crate::{
        analysis,
        mapper::AstMapper,
        names::NameGenerator,
        Result,
    },
    frontend::ast::*,
};

fn leaves(block: &Block) -> bool {
    analysis::control_transfers(block).leaves
}

fn rewrite(flag: &Ident, statements: Vec<Statement>) -> Vec<Statement> {
    let mut output = vec![];
    let mut statements = statements.into_iter();
    while let Some(statement) = statements.next() {
        match statement {
            Statement::Leave => {
                output.push(Statement::assign(vec![flag.clone()], Expression::literal(1u8)));
                return output;
            }
            Statement::If(r#if)
                if leaves(&r#if.body) || r#if.else_body.as_ref().is_some_and(leaves) =>
            {
                output.push(Statement::If(If {
                    condition: r#if.condition,
                    body: Block::new(rewrite(flag, r#if.body.statements)),
                    else_body: r#if
                        .else_body
                        .map(|else_body| Block::new(rewrite(flag, else_body.statements))),
                }));
                let rest = rewrite(flag, statements.collect());
                if !rest.is_empty() {
                    output.push(Statement::If(If {
                        condition: Expression::call("iszero", vec![Expression::identifier(flag)]),
                        body: Block::new(rest),
                        else_body: None,
                    }));
                }
                return output;
            }
            statement => output.push(statement),
        }
    }
    output
}

fn hoist(statements: Vec<Statement>, nested: bool, hoisted: &mut Vec<Ident>) -> Vec<Statement> {
    let mut output = vec![];
    for statement in statements {
        match statement {
            Statement::VariableDeclaration(declaration) if nested => {
                hoisted.extend(declaration.variables.iter().cloned());
                if let Some(value) = declaration.value {
                    output.push(Statement::assign(declaration.variables, value));
                }
            }
            Statement::If(r#if) => output.push(Statement::If(If {
                condition: r#if.condition,
                body: Block::new(hoist(r#if.body.statements, true, hoisted)),
                else_body: r#if
                    .else_body
                    .map(|else_body| Block::new(hoist(else_body.statements, true, hoisted))),
            })),
            statement => output.push(statement),
        }
    }
    output
}

struct LeaveNormalizer<'a> {
    names: &'a mut NameGenerator,
}

impl AstMapper for LeaveNormalizer<'_> {
    fn map_function_definition(&mut self, function: FunctionDefinition) -> Result<Statement> {
        if !leaves(&function.body) {
            return Ok(Statement::FunctionDefinition(function));
        }
        let flag = self.names.fresh("leave");
        let mut hoisted = vec![];
        let statements = hoist(
            rewrite(&flag, function.body.statements),
            false,
            &mut hoisted,
        );
        let body = std::iter::once(Statement::declare(
            vec![flag],
            Some(Expression::literal(0u8)),
        ))
        .chain(
            hoisted
                .into_iter()
                .map(|name| Statement::declare(vec![name], None)),
        )
        .chain(statements)
        .collect();
        Ok(Statement::FunctionDefinition(FunctionDefinition {
            body: Block::new(body),
            ..function
        }))
    }
}

/// Removes `leave` from flat functions.
///
/// A function that leaves gets a `__warp_leave_` flag; `leave` sets it and everything that
/// could run afterwards is guarded by `if iszero(flag)`.
pub(crate) fn run(block: Block, names: &mut NameGenerator) -> Result<Block> {
    LeaveNormalizer { names }.map_block(block)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            interp::{Execute, State},
            passes::test_utils::block,
        },
        num_bigint::BigUint,
    };

    fn normalize(src: &str) -> Block {
        run(block(src), &mut NameGenerator::new()).unwrap()
    }

    #[test]
    fn statements_after_a_leave_are_guarded() {
        let normalized = normalize("{ function f(a) -> r { if a { r := 1 leave } r := 2 } }");
        let expected = block(
            "{ function f(a) -> r { let __warp_leave_0 := 0 \
             if a { r := 1 __warp_leave_0 := 1 } \
             if iszero(__warp_leave_0) { r := 2 } } }",
        );
        assert_eq!(normalized, expected);
    }

    #[test]
    fn guarded_declarations_are_hoisted() {
        let normalized =
            normalize("{ function f(a) -> r { if a { leave } let x := add(a, 1) let y r := x } }");
        let expected = block(
            "{ function f(a) -> r { let __warp_leave_0 := 0 let x let y \
             if a { __warp_leave_0 := 1 } \
             if iszero(__warp_leave_0) { x := add(a, 1) r := x } } }",
        );
        assert_eq!(normalized, expected);
    }

    #[test]
    fn functions_without_leave_are_untouched() {
        let src = "{ function f(a) -> r { if a { r := 1 } } }";
        assert_eq!(normalize(src), block(src));
    }

    #[test]
    fn behavior_is_preserved() {
        let src = "{ function f(a, b) -> r { \
                   if a { if b { r := 1 leave } r := 2 } \
                   if iszero(a) { r := 3 leave } \
                   r := add(r, 10) } }";
        let original = block(src);
        let normalized = normalize(src);
        for (a, b) in [(0u8, 0u8), (0, 1), (1, 0), (1, 1)] {
            let arguments = [BigUint::from(a), BigUint::from(b)];
            let expected = original
                .execute("f", &arguments, &mut State::default())
                .unwrap();
            let actual = normalized
                .execute("f", &arguments, &mut State::default())
                .unwrap();
            assert_eq!(actual, expected, "f({a}, {b})");
        }
    }
}

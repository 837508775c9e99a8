use {
    crate::{
        mapper::{self, AstMapper},
        names::NameGenerator,
        Error, Result,
    },
    frontend::ast::*,
};

const PASS: &str = "expression splitter";

struct ExpressionSplitter<'a> {
    names: &'a mut NameGenerator,
}

impl ExpressionSplitter<'_> {
    fn split_call(&mut self, call: FunctionCall, prefix: &mut Vec<Statement>) -> FunctionCall {
        FunctionCall {
            arguments: call
                .arguments
                .into_iter()
                .map(|argument| self.atomize(argument, prefix))
                .collect(),
            ..call
        }
    }

    fn atomize(&mut self, expression: Expression, prefix: &mut Vec<Statement>) -> Expression {
        match expression {
            Expression::Call(call) => {
                let call = self.split_call(call, prefix);
                let name = self.names.fresh("subexpr");
                prefix.push(Statement::declare(
                    vec![name.clone()],
                    Some(Expression::Call(call)),
                ));
                Expression::Identifier(name)
            }
            atom => atom,
        }
    }

    fn split_value(&mut self, value: Expression, prefix: &mut Vec<Statement>) -> Expression {
        match value {
            Expression::Call(call) => Expression::Call(self.split_call(call, prefix)),
            atom => atom,
        }
    }

    fn split(&mut self, statement: Statement) -> Result<Vec<Statement>> {
        let mut prefix = vec![];
        let statement = match statement {
            Statement::VariableDeclaration(declaration) => Statement::declare(
                declaration.variables,
                declaration
                    .value
                    .map(|value| self.split_value(value, &mut prefix)),
            ),
            Statement::Assignment(assignment) => Statement::assign(
                assignment.variables,
                self.split_value(assignment.value, &mut prefix),
            ),
            Statement::Expression(expression) => {
                Statement::Expression(self.split_value(expression, &mut prefix))
            }
            Statement::If(r#if) => {
                let r#if = mapper::walk_if(self, r#if)?;
                Statement::If(If {
                    condition: self.atomize(r#if.condition, &mut prefix),
                    ..r#if
                })
            }
            Statement::Switch(_) | Statement::ForLoop(_) => {
                return Err(Error::invariant(
                    PASS,
                    format!("{} should have been removed", statement.kind()),
                ))
            }
            statement => mapper::walk_statement(self, statement)?,
        };
        prefix.push(statement);
        Ok(prefix)
    }
}

impl AstMapper for ExpressionSplitter<'_> {
    fn map_block(&mut self, block: Block) -> Result<Block> {
        let mut statements = vec![];
        for statement in block.statements {
            statements.extend(self.split(statement)?);
        }
        Ok(Block::new(statements))
    }
}

pub(crate) fn run(block: Block, names: &mut NameGenerator) -> Result<Block> {
    ExpressionSplitter { names }.map_block(block)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::passes::test_utils::block};

    #[test]
    fn nested_calls_are_bound_left_to_right() {
        let mut names = NameGenerator::new();
        let split = run(
            block("{ function f(a) -> r { r := add(mul(a, 2), sub(a, div(a, 3))) } }"),
            &mut names,
        )
        .unwrap();
        let expected = block(
            "{ function f(a) -> r { \
             let __warp_subexpr_0 := mul(a, 2) \
             let __warp_subexpr_1 := div(a, 3) \
             let __warp_subexpr_2 := sub(a, __warp_subexpr_1) \
             r := add(__warp_subexpr_0, __warp_subexpr_2) } }",
        );
        assert_eq!(split, expected);
    }

    #[test]
    fn conditions_become_atoms() {
        let mut names = NameGenerator::new();
        let split = run(block("{ if lt(x, add(y, 1)) { sstore(0, mload(x)) } }"), &mut names)
            .unwrap();
        let expected = block(
            "{ let __warp_subexpr_1 := add(y, 1) \
             let __warp_subexpr_2 := lt(x, __warp_subexpr_1) \
             if __warp_subexpr_2 { let __warp_subexpr_0 := mload(x) sstore(0, __warp_subexpr_0) } }",
        );
        assert_eq!(split, expected);
    }

    #[test]
    fn remaining_switch_is_an_invariant_violation() {
        let result = run(block("{ switch x default { } }"), &mut NameGenerator::new());
        assert!(matches!(result, Err(Error::Invariant { .. })));
    }
}

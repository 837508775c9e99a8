use {
    crate::{
        mapper::{self, AstMapper},
        names::NameGenerator,
        Result,
    },
    frontend::ast::*,
};

struct SwitchToIf<'a> {
    names: &'a mut NameGenerator,
}

impl AstMapper for SwitchToIf<'_> {
    fn map_switch(&mut self, switch: Switch) -> Result<Statement> {
        let Switch {
            expression,
            cases,
            default,
        } = mapper::walk_switch(self, switch)?;

        let mut statements = vec![];
        let scrutinee = if expression.is_atom() {
            expression
        } else {
            let name = self.names.fresh("switch");
            statements.push(Statement::declare(vec![name.clone()], Some(expression)));
            Expression::Identifier(name)
        };

        let chain = cases.into_iter().rev().fold(default, |else_body, case| {
            Some(Block::new(vec![Statement::If(If {
                condition: Expression::call(
                    "eq",
                    vec![scrutinee.clone(), Expression::Literal(case.value)],
                ),
                body: case.body,
                else_body,
            })]))
        });
        statements.extend(chain.map(Statement::Block));

        Ok(match <[Statement; 1]>::try_from(statements) {
            Ok([statement]) => statement,
            Err(statements) => Statement::Block(Block::new(statements)),
        })
    }
}

/// Turns every switch into a chain of `if eq(scrutinee, case) { .. } else { .. }`.
pub(crate) fn run(block: Block, names: &mut NameGenerator) -> Result<Block> {
    SwitchToIf { names }.map_block(block)
}

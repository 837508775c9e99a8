use {
    crate::{
        analysis::{self, UseCounts},
        builtins::{self, Effect},
        mapper::{self, AstMapper},
        Result,
    },
    frontend::ast::*,
};

fn head_mut(statement: &mut Statement) -> Option<&mut Expression> {
    match statement {
        Statement::VariableDeclaration(declaration) => declaration.value.as_mut(),
        Statement::Assignment(assignment) => Some(&mut assignment.value),
        Statement::Expression(expression) => Some(expression),
        Statement::If(r#if) => Some(&mut r#if.condition),
        _ => None,
    }
}

fn reached_before_effects(expression: &Expression, name: &str, effects_seen: &mut bool) -> Option<bool> {
    match expression {
        Expression::Identifier(identifier) if identifier == name => Some(!*effects_seen),
        Expression::Literal(_) | Expression::Identifier(_) => None,
        Expression::Call(call) => {
            for argument in &call.arguments {
                if let Some(reached) = reached_before_effects(argument, name, effects_seen) {
                    return Some(reached);
                }
            }
            let pure = builtins::lookup(&call.name)
                .is_some_and(|builtin| builtin.effect == Effect::Pure);
            *effects_seen |= !pure;
            None
        }
    }
}

fn substitute(expression: &mut Expression, name: &str, value: &mut Option<Expression>) {
    match expression {
        Expression::Identifier(identifier) if identifier == name => {
            if let Some(value) = value.take() {
                *expression = value;
            }
        }
        Expression::Literal(_) | Expression::Identifier(_) => {}
        Expression::Call(call) => {
            for argument in &mut call.arguments {
                substitute(argument, name, value);
            }
        }
    }
}

struct VariableInliner {
    counts: UseCounts,
}

impl VariableInliner {
    fn try_inline(&self, definition: &Statement, statement: &mut Statement) -> bool {
        let Statement::VariableDeclaration(VariableDeclaration {
            variables,
            value: Some(value),
        }) = definition
        else {
            return false;
        };
        let [name] = &variables[..] else {
            return false;
        };
        if self.counts.reads(name) != 1 || self.counts.assignments(name) != 0 {
            return false;
        }
        let Some(head) = head_mut(statement) else {
            return false;
        };
        let reached = reached_before_effects(head, name, &mut false);
        match reached {
            Some(reached) if reached || analysis::is_pure(value) => {
                substitute(head, name, &mut Some(value.clone()));
                true
            }
            _ => false,
        }
    }
}

impl AstMapper for VariableInliner {
    fn map_block(&mut self, block: Block) -> Result<Block> {
        let block = mapper::walk_block(self, block)?;
        let mut output: Vec<Statement> = Vec::with_capacity(block.statements.len());
        for mut statement in block.statements {
            if let Some(previous) = output.last() {
                if self.try_inline(previous, &mut statement) {
                    output.pop();
                }
            }
            output.push(statement);
        }
        Ok(Block::new(output))
    }
}

/// Substitutes single-use variables into the statement right after their definition.
pub(crate) fn run(block: Block) -> Result<Block> {
    let counts = analysis::use_counts(&block);
    VariableInliner { counts }.map_block(block)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::passes::test_utils::block};

    #[test]
    fn chains_of_temporaries_collapse() {
        let inlined = run(block(
            "{ function f(a) -> r { let x := add(a, 1) let y := mul(x, 2) r := sub(y, a) } }",
        ))
        .unwrap();
        assert_eq!(
            inlined,
            block("{ function f(a) -> r { r := sub(mul(add(a, 1), 2), a) } }")
        );
    }

    #[test]
    fn effects_are_not_reordered() {
        let src = "{ function f() -> r { let x := mload(0) r := add(sload(0), x) } }";
        assert_eq!(run(block(src)).unwrap(), block(src));

        let moved = run(block(
            "{ function f() -> r { let x := mload(0) r := add(x, sload(0)) } }",
        ))
        .unwrap();
        assert_eq!(
            moved,
            block("{ function f() -> r { r := add(mload(0), sload(0)) } }")
        );
    }

    #[test]
    fn pure_values_move_past_effects() {
        let inlined = run(block(
            "{ function f(a) -> r { let x := add(a, 1) r := add(sload(0), x) } }",
        ))
        .unwrap();
        assert_eq!(
            inlined,
            block("{ function f(a) -> r { r := add(sload(0), add(a, 1)) } }")
        );
    }

    #[test]
    fn multiple_uses_and_bodies_are_left_alone() {
        let twice = "{ function f(a) -> r { let x := add(a, 1) r := mul(x, x) } }";
        assert_eq!(run(block(twice)).unwrap(), block(twice));
        let in_body = "{ function f(a) -> r { let x := add(a, 1) if a { r := x } } }";
        assert_eq!(run(block(in_body)).unwrap(), block(in_body));
        let reassigned = "{ function f(a) -> r { let x := add(a, 1) x := 2 r := x } }";
        assert_eq!(run(block(reassigned)).unwrap(), block(reassigned));
    }
}

use {
    crate::{
        analysis::{self, Variables},
        mapper::{self, AstMapper},
        names::NameGenerator,
        visit::AstVisitor,
        Error, Result,
    },
    frontend::ast::*,
};

const PASS: &str = "for-loop eliminator";

fn identifiers(names: &[Ident]) -> Vec<Expression> {
    names.iter().cloned().map(Expression::Identifier).collect()
}

fn assign_all(targets: &[Ident], sources: &[Ident]) -> Vec<Statement> {
    targets
        .iter()
        .zip(sources)
        .map(|(target, source)| {
            Statement::assign(vec![target.clone()], Expression::identifier(source.clone()))
        })
        .collect()
}

struct TransferRewriter<'a> {
    break_flag: Option<&'a Ident>,
    leave_flag: Option<&'a Ident>,
}

impl TransferRewriter<'_> {
    fn set_and_leave(flag: Option<&Ident>, statement: &str) -> Result<Statement> {
        let flag = flag.ok_or_else(|| {
            Error::invariant(PASS, format!("`{statement}` found after analysis missed it"))
        })?;
        Ok(Statement::Block(Block::new(vec![
            Statement::assign(vec![flag.clone()], Expression::literal(1u8)),
            Statement::Leave,
        ])))
    }
}

impl AstMapper for TransferRewriter<'_> {
    fn map_break(&mut self) -> Result<Statement> {
        Self::set_and_leave(self.break_flag, "break")
    }

    fn map_continue(&mut self) -> Result<Statement> {
        Ok(Statement::Leave)
    }

    fn map_leave(&mut self) -> Result<Statement> {
        Self::set_and_leave(self.leave_flag, "leave")
    }

    // loops are eliminated innermost first, so only function definitions can be nested here
    fn map_function_definition(&mut self, function: FunctionDefinition) -> Result<Statement> {
        Ok(Statement::FunctionDefinition(function))
    }
}

struct ForLoopEliminator<'a> {
    names: &'a mut NameGenerator,
}

impl ForLoopEliminator<'_> {
    fn eliminate(&mut self, for_loop: ForLoop) -> Result<Statement> {
        let ForLoop {
            pre,
            condition,
            post,
            body,
        } = for_loop;
        if !(pre.statements.is_empty() && post.statements.is_empty()) {
            return Err(Error::invariant(
                PASS,
                format!("loop on `{condition}` was not simplified"),
            ));
        }

        let mut variables = Variables::of_block(&body);
        variables.visit_expression(&condition);
        let read_only = variables.read_only();
        let modified = variables.modified();
        let transfers = analysis::control_transfers(&body);

        let loop_function = self.names.fresh("loop");
        let modified_inputs = modified
            .iter()
            .map(|name| self.names.fresh_from(name))
            .collect::<Vec<_>>();
        let leave_flag = transfers.leaves.then(|| self.names.fresh("loop_leave"));
        let parameters = [read_only.clone(), modified_inputs.clone()].concat();
        let arguments = identifiers(&[read_only.clone(), modified.clone()].concat());

        let mut definitions = vec![];
        let mut iteration = assign_all(&modified, &modified_inputs);
        let recursion = |outputs: Vec<Ident>| {
            Statement::assign_or_call(outputs, Expression::call(&loop_function, arguments.clone()))
        };

        if transfers.breaks || transfers.continues || transfers.leaves {
            let body_function = self.names.fresh("loop_body");
            let body_inputs = modified
                .iter()
                .map(|name| self.names.fresh_from(name))
                .collect::<Vec<_>>();
            let break_flag = transfers.breaks.then(|| self.names.fresh("loop_break"));
            let body_leave_flag = transfers.leaves.then(|| self.names.fresh("loop_leave"));

            let mut body_statements = assign_all(&modified, &body_inputs);
            body_statements.extend(
                TransferRewriter {
                    break_flag: break_flag.as_ref(),
                    leave_flag: body_leave_flag.as_ref(),
                }
                .map_block(body)?
                .statements,
            );
            let body_outputs = modified
                .iter()
                .chain(&break_flag)
                .chain(&body_leave_flag)
                .cloned()
                .collect::<Vec<_>>();
            definitions.push(Statement::FunctionDefinition(FunctionDefinition {
                name: body_function.clone(),
                parameters: [read_only.clone(), body_inputs].concat(),
                returns: body_outputs,
                body: Block::new(body_statements),
            }));

            // the loop function returns its leave flag under the same name the body uses for it
            let outputs = modified
                .iter()
                .chain(&break_flag)
                .chain(&leave_flag)
                .cloned()
                .collect::<Vec<_>>();
            let mut taken = vec![];
            if let Some(break_flag) = &break_flag {
                taken.push(Statement::declare(vec![break_flag.clone()], None));
            }
            taken.push(Statement::assign_or_call(
                outputs,
                Expression::call(&body_function, arguments.clone()),
            ));
            let stop_flags = break_flag
                .iter()
                .chain(&leave_flag)
                .cloned()
                .map(Expression::Identifier)
                .collect::<Vec<_>>();
            let recurse = recursion(modified.iter().chain(&leave_flag).cloned().collect());
            taken.push(match stop_flags.as_slice() {
                [] => recurse,
                [flag] => Statement::If(If {
                    condition: Expression::call("iszero", vec![flag.clone()]),
                    body: Block::new(vec![recurse]),
                    else_body: None,
                }),
                [first, second] => Statement::If(If {
                    condition: Expression::call(
                        "iszero",
                        vec![Expression::call("or", vec![first.clone(), second.clone()])],
                    ),
                    body: Block::new(vec![recurse]),
                    else_body: None,
                }),
                _ => unreachable!("a loop has at most a break flag and a leave flag"),
            });
            iteration.push(Statement::If(If {
                condition,
                body: Block::new(taken),
                else_body: None,
            }));
        } else {
            let mut taken = body.statements;
            taken.push(recursion(modified.clone()));
            iteration.push(Statement::If(If {
                condition,
                body: Block::new(taken),
                else_body: None,
            }));
        }

        definitions.push(Statement::FunctionDefinition(FunctionDefinition {
            name: loop_function.clone(),
            parameters,
            returns: modified.iter().chain(&leave_flag).cloned().collect(),
            body: Block::new(iteration),
        }));

        let mut statements = definitions;
        match leave_flag {
            Some(_) => {
                let left = self.names.fresh("loop_left");
                statements.push(Statement::declare(vec![left.clone()], None));
                statements.push(Statement::assign(
                    modified.iter().cloned().chain([left.clone()]).collect(),
                    Expression::call(&loop_function, arguments),
                ));
                statements.push(Statement::If(If {
                    condition: Expression::identifier(left),
                    body: Block::new(vec![Statement::Leave]),
                    else_body: None,
                }));
            }
            None => statements.push(Statement::assign_or_call(
                modified,
                Expression::call(&loop_function, arguments),
            )),
        }
        Ok(Statement::Block(Block::new(statements)))
    }
}

impl AstMapper for ForLoopEliminator<'_> {
    fn map_for_loop(&mut self, for_loop: ForLoop) -> Result<Statement> {
        let for_loop = mapper::walk_for_loop(self, for_loop)?;
        self.eliminate(for_loop)
    }
}

/// Replaces every loop, innermost first, by a self-recursive function.
///
/// A loop body that breaks, continues or leaves moves into a separate body function in which
/// `continue` becomes `leave` and `break` and `leave` additionally set a returned flag. A loop
/// that can leave returns that flag to its call site, which leaves in turn.
pub(crate) fn run(block: Block, names: &mut NameGenerator) -> Result<Block> {
    ForLoopEliminator { names }.map_block(block)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            interp::{Execute, State},
            passes::{for_loop_simplifier, test_utils::block},
        },
        num_bigint::BigUint,
    };

    fn eliminate(src: &str) -> Block {
        let simplified = for_loop_simplifier::run(block(src)).unwrap();
        run(simplified, &mut NameGenerator::new()).unwrap()
    }

    fn call(program: &Block, function: &str, arguments: &[u64]) -> Vec<BigUint> {
        let arguments = arguments.iter().copied().map(BigUint::from).collect::<Vec<_>>();
        program
            .execute(function, &arguments, &mut State::default())
            .unwrap()
    }

    fn assert_equivalent(src: &str, function: &str, inputs: &[&[u64]]) {
        let original = block(src);
        let eliminated = eliminate(src);
        assert!(!eliminated.to_string().contains("for"), "{eliminated}");
        for arguments in inputs {
            assert_eq!(
                call(&eliminated, function, arguments),
                call(&original, function, arguments),
                "{function}{arguments:?} in\n{eliminated}"
            );
        }
    }

    #[test]
    fn plain_loop_becomes_recursion() {
        let eliminated = eliminate(
            "{ function sum(n) -> total { for { let i := 0 } lt(i, n) { i := add(i, 1) } \
             { total := add(total, i) } } }",
        );
        let expected = block(
            "{ function sum(n) -> total { { let i := 0 { \
             function __warp_loop_0(n, __warp_i_0, __warp_total_0) -> i, total { \
                 i := __warp_i_0 total := __warp_total_0 \
                 if lt(i, n) { total := add(total, i) { i := add(i, 1) } \
                     i, total := __warp_loop_0(n, i, total) } } \
             i, total := __warp_loop_0(n, i, total) } } } }",
        );
        assert_eq!(eliminated, expected);
    }

    #[test]
    fn sum_is_preserved() {
        assert_equivalent(
            "{ function sum(n) -> total { for { let i := 0 } lt(i, n) { i := add(i, 1) } \
             { total := add(total, i) } } }",
            "sum",
            &[&[0], &[1], &[10]],
        );
    }

    #[test]
    fn break_and_continue_are_preserved() {
        assert_equivalent(
            "{ function f(n) -> r { for { let i := 0 } 1 { i := add(i, 1) } { \
                 if gt(i, n) { break } \
                 if mod(i, 2) { continue } \
                 r := add(r, i) } } }",
            "f",
            &[&[0], &[5], &[8]],
        );
    }

    #[test]
    fn leave_reaches_the_enclosing_function() {
        assert_equivalent(
            "{ function f(n) -> r { r := 100 for { let i := 0 } lt(i, 10) { i := add(i, 1) } { \
                 if eq(i, n) { r := i leave } } r := 200 } }",
            "f",
            &[&[3], &[20]],
        );
    }

    #[test]
    fn nested_loops_are_preserved() {
        assert_equivalent(
            "{ function f(n) -> r { for { let i := 0 } lt(i, n) { i := add(i, 1) } { \
                 for { let j := 0 } lt(j, i) { j := add(j, 1) } { \
                     if eq(j, 3) { break } \
                     r := add(r, j) } } } }",
            "f",
            &[&[0], &[3], &[7]],
        );
    }
}

use {
    crate::{
        analysis::{self, UseCounts},
        Result,
    },
    frontend::ast::*,
    std::collections::BTreeSet,
};

struct Sweep<'a> {
    counts: &'a UseCounts,
    returns: &'a BTreeSet<Ident>,
    changed: bool,
}

impl Sweep<'_> {
    fn unused(&self, name: &Ident) -> bool {
        self.counts.reads(name) == 0 && !self.returns.contains(name)
    }

    fn block(&mut self, block: Block) -> Block {
        Block::new(self.statements(block.statements))
    }

    fn statements(&mut self, statements: Vec<Statement>) -> Vec<Statement> {
        let total = statements.len();
        let mut output = vec![];
        for (index, statement) in statements.into_iter().enumerate() {
            if analysis::is_terminal(&statement) {
                self.changed |= index + 1 < total;
                output.push(statement);
                break;
            }
            if let Some(statement) = self.statement(statement) {
                output.push(statement);
            } else {
                self.changed = true;
            }
        }
        output
    }

    fn statement(&mut self, statement: Statement) -> Option<Statement> {
        match statement {
            Statement::VariableDeclaration(declaration)
                if declaration.variables.iter().all(|variable| {
                    self.unused(variable) && self.counts.assignments(variable) == 0
                }) && declaration.value.as_ref().map_or(true, analysis::is_pure) =>
            {
                None
            }
            Statement::Assignment(assignment)
                if assignment.variables.iter().all(|variable| self.unused(variable))
                    && analysis::is_pure(&assignment.value) =>
            {
                None
            }
            Statement::Expression(expression) if analysis::is_pure(&expression) => None,
            Statement::If(r#if) => {
                let body = self.block(r#if.body);
                let else_body = r#if.else_body.map(|else_body| self.block(else_body));
                let empty = body.statements.is_empty()
                    && else_body
                        .as_ref()
                        .map_or(true, |else_body| else_body.statements.is_empty());
                if empty && analysis::is_pure(&r#if.condition) {
                    None
                } else {
                    Some(Statement::If(If {
                        condition: r#if.condition,
                        body,
                        else_body,
                    }))
                }
            }
            statement => Some(statement),
        }
    }
}

fn eliminate(mut statements: Vec<Statement>, returns: &BTreeSet<Ident>) -> Vec<Statement> {
    loop {
        let counts = analysis::use_counts(&Block::new(statements.clone()));
        let mut sweep = Sweep {
            counts: &counts,
            returns,
            changed: false,
        };
        statements = sweep.statements(statements);
        if !sweep.changed {
            return statements;
        }
    }
}

/// Removes code that cannot run or whose results are never observed.
///
/// Statements after a revert or a halt are dropped, and so are unread variables whose values
/// have no effects. Return variables always count as read.
pub(crate) fn run(block: Block) -> Result<Block> {
    let (functions, root): (Vec<_>, Vec<_>) = block
        .statements
        .into_iter()
        .partition(|statement| matches!(statement, Statement::FunctionDefinition(_)));
    let root = eliminate(root, &BTreeSet::new());
    let functions = functions.into_iter().map(|statement| match statement {
        Statement::FunctionDefinition(function) => {
            let returns = function.returns.iter().cloned().collect();
            Statement::FunctionDefinition(FunctionDefinition {
                body: Block::new(eliminate(function.body.statements, &returns)),
                ..function
            })
        }
        statement => statement,
    });
    Ok(Block::new(root.into_iter().chain(functions).collect()))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::passes::test_utils::block};

    #[test]
    fn code_after_a_revert_is_dropped() {
        let eliminated = run(block(
            "{ function f(a) -> r { if a { __warp_revert() r := 1 } __warp_revert() sstore(0, 1) } }",
        ))
        .unwrap();
        assert_eq!(
            eliminated,
            block("{ function f(a) -> r { if a { __warp_revert() } __warp_revert() } }")
        );
    }

    #[test]
    fn unread_variables_are_dropped_transitively() {
        let eliminated = run(block(
            "{ function f(a) -> r { let x := add(a, 1) let y := mul(x, 2) let z \
             z := mload(0) r := a } }",
        ))
        .unwrap();
        assert_eq!(
            eliminated,
            block("{ function f(a) -> r { let z z := mload(0) r := a } }")
        );
    }

    #[test]
    fn unused_leave_flags_disappear() {
        let eliminated = run(block(
            "{ function f() -> r { let __warp_leave_0 := 0 r := 1 __warp_leave_0 := 1 } }",
        ))
        .unwrap();
        assert_eq!(eliminated, block("{ function f() -> r { r := 1 } }"));
    }

    #[test]
    fn empty_ifs_are_dropped() {
        let eliminated = run(block(
            "{ function f(a) { let x := add(a, 1) if a { pop(x) } } }",
        ))
        .unwrap();
        assert_eq!(eliminated, block("{ function f(a) { } }"));
    }

    #[test]
    fn effects_are_kept() {
        let src = "{ function f(a) { let x := sload(a) pop(g(a)) if a { sstore(a, 1) } } \
                   function g(a) -> r { } }";
        assert_eq!(run(block(src)).unwrap(), block(src));
    }
}

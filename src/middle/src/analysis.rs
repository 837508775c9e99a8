use {
    super::{
        builtins::{self, Effect},
        visit::{self, AstVisitor},
    },
    frontend::ast::*,
    std::collections::{BTreeMap, BTreeSet},
};

#[derive(Debug, Default)]
pub struct Variables {
    pub declared: BTreeSet<Ident>,
    pub read: BTreeSet<Ident>,
    pub assigned: BTreeSet<Ident>,
}

impl Variables {
    pub fn of_block(block: &Block) -> Self {
        let mut variables = Self::default();
        variables.visit_block(block);
        variables
    }

    pub fn of_statements<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> Self {
        let mut variables = Self::default();
        for statement in statements {
            variables.visit_statement(statement);
        }
        variables
    }

    pub fn modified(&self) -> Vec<Ident> {
        self.assigned.difference(&self.declared).cloned().collect()
    }

    pub fn read_only(&self) -> Vec<Ident> {
        self.read
            .iter()
            .filter(|name| !self.declared.contains(*name) && !self.assigned.contains(*name))
            .cloned()
            .collect()
    }
}

impl AstVisitor for Variables {
    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                self.declared.extend(declaration.variables.iter().cloned());
            }
            Statement::Assignment(assignment) => {
                self.assigned.extend(assignment.variables.iter().cloned());
            }
            _ => {}
        }
        visit::walk_statement(self, statement);
    }

    fn visit_function_definition(&mut self, _function: &FunctionDefinition) {}

    fn visit_expression(&mut self, expression: &Expression) {
        if let Expression::Identifier(name) = expression {
            self.read.insert(name.clone());
        }
        visit::walk_expression(self, expression);
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlTransfers {
    pub breaks: bool,
    pub continues: bool,
    pub leaves: bool,
}

#[derive(Default)]
struct ControlTransferFinder {
    transfers: ControlTransfers,
    loop_depth: usize,
}

impl AstVisitor for ControlTransferFinder {
    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Break if self.loop_depth == 0 => self.transfers.breaks = true,
            Statement::Continue if self.loop_depth == 0 => self.transfers.continues = true,
            Statement::Leave => self.transfers.leaves = true,
            _ => visit::walk_statement(self, statement),
        }
    }

    fn visit_function_definition(&mut self, _function: &FunctionDefinition) {}

    fn visit_for_loop(&mut self, for_loop: &ForLoop) {
        self.loop_depth += 1;
        visit::walk_for_loop(self, for_loop);
        self.loop_depth -= 1;
    }
}

pub fn control_transfers(block: &Block) -> ControlTransfers {
    let mut finder = ControlTransferFinder::default();
    finder.visit_block(block);
    finder.transfers
}

#[derive(Default)]
struct Calls(BTreeSet<Ident>);

impl AstVisitor for Calls {
    fn visit_function_definition(&mut self, _function: &FunctionDefinition) {}

    fn visit_function_call(&mut self, call: &FunctionCall) {
        self.0.insert(call.name.clone());
        visit::walk_function_call(self, call);
    }
}

pub fn called_functions<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> BTreeSet<Ident> {
    let mut calls = Calls::default();
    for statement in statements {
        calls.visit_statement(statement);
    }
    calls.0
}

#[derive(Debug, Default)]
pub struct UseCounts {
    pub reads: BTreeMap<Ident, usize>,
    pub assignments: BTreeMap<Ident, usize>,
}

impl UseCounts {
    pub fn reads(&self, name: &str) -> usize {
        self.reads.get(name).copied().unwrap_or_default()
    }

    pub fn assignments(&self, name: &str) -> usize {
        self.assignments.get(name).copied().unwrap_or_default()
    }
}

#[derive(Default)]
struct UseCounter(UseCounts);

impl AstVisitor for UseCounter {
    fn visit_statement(&mut self, statement: &Statement) {
        if let Statement::Assignment(assignment) = statement {
            for variable in &assignment.variables {
                *self.0.assignments.entry(variable.clone()).or_default() += 1;
            }
        }
        visit::walk_statement(self, statement);
    }

    fn visit_expression(&mut self, expression: &Expression) {
        if let Expression::Identifier(name) = expression {
            *self.0.reads.entry(name.clone()).or_default() += 1;
        }
        visit::walk_expression(self, expression);
    }
}

pub fn use_counts(block: &Block) -> UseCounts {
    let mut counter = UseCounter::default();
    counter.visit_block(block);
    counter.0
}

pub fn is_pure(expression: &Expression) -> bool {
    match expression {
        Expression::Literal(_) | Expression::Identifier(_) => true,
        Expression::Call(call) => {
            builtins::lookup(&call.name).is_some_and(|builtin| builtin.effect == Effect::Pure)
                && call.arguments.iter().all(is_pure)
        }
    }
}

pub fn is_terminal(statement: &Statement) -> bool {
    match statement {
        Statement::Expression(Expression::Call(call)) => builtins::lookup(&call.name)
            .is_some_and(|builtin| matches!(builtin.effect, Effect::Halts | Effect::Terminates)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(src: &str) -> Block {
        Block::try_from(src).unwrap()
    }

    #[test]
    fn variables_skip_nested_functions() {
        let variables = Variables::of_block(&block(
            "{ let i := n  x := add(x, i)  function f(q) -> r { r := q } }",
        ));
        assert_eq!(variables.modified(), ["x"]);
        assert_eq!(variables.read_only(), ["n"]);
        assert!(!variables.read.contains("q"));
    }

    #[test]
    fn transfers_of_nested_loops_belong_to_them() {
        let transfers = control_transfers(&block(
            "{ for { } 1 { } { break continue } if x { leave } }",
        ));
        assert_eq!(
            transfers,
            ControlTransfers {
                breaks: false,
                continues: false,
                leaves: true,
            }
        );
        assert!(control_transfers(&block("{ if x { continue } }")).continues);
    }

    #[test]
    fn purity() {
        let block = block("{ pop(add(x, mul(2, y)))  pop(mload(0)) }");
        let [Statement::Expression(pure), Statement::Expression(impure)] = &block.statements[..]
        else {
            panic!("expected two statements");
        };
        assert!(is_pure(pure));
        assert!(!is_pure(impure));
        assert!(is_terminal(&Statement::call("revert", vec![])));
        assert!(is_terminal(&Statement::call("stop", vec![])));
        assert!(!is_terminal(&Statement::call("mstore", vec![])));
    }

    #[test]
    fn use_counts_include_function_bodies() {
        let counts = use_counts(&block("{ function f(a) -> b { b := a  b := add(a, a) } }"));
        assert_eq!(counts.reads("a"), 3);
        assert_eq!(counts.assignments("b"), 2);
        assert_eq!(counts.reads("b"), 0);
    }
}

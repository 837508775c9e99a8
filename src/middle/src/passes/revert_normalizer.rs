use {
    crate::{
        analysis,
        builtins::{self, Effect, REVERT},
        mapper::{self, AstMapper},
        Result,
    },
    frontend::ast::*,
    std::collections::BTreeSet,
};

#[derive(Default)]
struct FunctionCollector<'a>(Vec<&'a FunctionDefinition>);

impl<'a> FunctionCollector<'a> {
    fn collect(&mut self, block: &'a Block) {
        for statement in &block.statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &'a Statement) {
        match statement {
            Statement::Block(block) => self.collect(block),
            Statement::FunctionDefinition(function) => {
                self.0.push(function);
                self.collect(&function.body);
            }
            Statement::If(r#if) => {
                self.collect(&r#if.body);
                if let Some(else_body) = &r#if.else_body {
                    self.collect(else_body);
                }
            }
            Statement::Switch(switch) => {
                for case in &switch.cases {
                    self.collect(&case.body);
                }
                if let Some(default) = &switch.default {
                    self.collect(default);
                }
            }
            Statement::ForLoop(for_loop) => {
                self.collect(&for_loop.pre);
                self.collect(&for_loop.post);
                self.collect(&for_loop.body);
            }
            _ => {}
        }
    }
}

fn aborts(call: &FunctionCall, reverting: &BTreeSet<Ident>) -> bool {
    reverting.contains(&call.name)
        || builtins::lookup(&call.name).is_some_and(|builtin| builtin.effect == Effect::Terminates)
}

fn reverting_functions(block: &Block) -> BTreeSet<Ident> {
    let mut collector = FunctionCollector::default();
    collector.collect(block);
    let mut reverting = BTreeSet::new();
    loop {
        let before = reverting.len();
        for function in &collector.0 {
            if !function.returns.is_empty()
                || reverting.contains(&function.name)
                || analysis::control_transfers(&function.body).leaves
            {
                continue;
            }
            if let Some(Statement::Expression(Expression::Call(call))) =
                function.body.statements.last()
            {
                if aborts(call, &reverting) {
                    reverting.insert(function.name.clone());
                }
            }
        }
        if reverting.len() == before {
            return reverting;
        }
    }
}

struct RevertNormalizer {
    reverting: BTreeSet<Ident>,
}

impl RevertNormalizer {
    fn normalize(&self, statement: Statement) -> Vec<Statement> {
        match statement {
            Statement::Expression(Expression::Call(call)) if aborts(&call, &self.reverting) => {
                if call.name == REVERT {
                    return vec![Statement::Expression(Expression::Call(call))];
                }
                let mut statements = call
                    .arguments
                    .into_iter()
                    .filter(|argument| !argument.is_atom())
                    .map(|argument| Statement::call("pop", vec![argument]))
                    .collect::<Vec<_>>();
                statements.push(Statement::call(REVERT, vec![]));
                statements
            }
            statement => vec![statement],
        }
    }
}

impl AstMapper for RevertNormalizer {
    fn map_block(&mut self, block: Block) -> Result<Block> {
        let block = mapper::walk_block(self, block)?;
        Ok(Block::new(
            block
                .statements
                .into_iter()
                .flat_map(|statement| self.normalize(statement))
                .collect(),
        ))
    }
}

pub(crate) fn run(block: Block) -> Result<Block> {
    let reverting = reverting_functions(&block);
    RevertNormalizer { reverting }.map_block(block)
}

#[cfg(test)]
pub(crate) fn is_reverting(block: &Block, name: &str) -> bool {
    reverting_functions(block).contains(name)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::passes::test_utils::block};

    #[test]
    fn abort_shapes_become_canonical() {
        let normalized = run(block(
            "{ function f(a) { revert(0, add(a, 1)) } function g() { invalid() } \
             function h(a) -> r { if a { f(a) } g() } }",
        ))
        .unwrap();
        let expected = block(
            "{ function f(a) { pop(add(a, 1)) __warp_revert() } function g() { __warp_revert() } \
             function h(a) -> r { if a { __warp_revert() } __warp_revert() } }",
        );
        assert_eq!(normalized, expected);
    }

    #[test]
    fn reverting_functions_reach_a_fixpoint() {
        let program = block(
            "{ function a() { b() } function b() { c() } function c() { revert(0, 0) } \
             function d() -> r { revert(0, 0) } function e() { if 1 { revert(0, 0) } } \
             function l() { if 1 { leave } revert(0, 0) } }",
        );
        for name in ["a", "b", "c"] {
            assert!(is_reverting(&program, name), "{name}");
        }
        assert!(!is_reverting(&program, "d"));
        assert!(!is_reverting(&program, "e"));
        assert!(!is_reverting(&program, "l"));
    }
}

use {
    crate::{analysis, Result},
    frontend::ast::*,
    std::collections::{BTreeMap, BTreeSet},
};

// with no entry points every function is kept
pub(crate) fn run(block: Block, entry_points: &[Ident]) -> Result<Block> {
    if entry_points.is_empty() {
        return Ok(block);
    }
    let functions = block
        .functions()
        .map(|function| (&function.name, function))
        .collect::<BTreeMap<_, _>>();
    let root_statements = block
        .statements
        .iter()
        .filter(|statement| !matches!(statement, Statement::FunctionDefinition(_)));

    let mut pending = entry_points
        .iter()
        .cloned()
        .chain(analysis::called_functions(root_statements))
        .collect::<Vec<_>>();
    let mut reachable = BTreeSet::new();
    while let Some(name) = pending.pop() {
        let Some(function) = functions.get(&name) else {
            continue;
        };
        if reachable.insert(name) {
            pending.extend(analysis::called_functions(&function.body.statements));
        }
    }

    Ok(Block::new(
        block
            .statements
            .into_iter()
            .filter(|statement| match statement {
                Statement::FunctionDefinition(function) => reachable.contains(&function.name),
                _ => true,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::passes::test_utils::block};

    const PROGRAM: &str = "{ sstore(0, init()) \
                           function init() -> r { r := 1 } \
                           function f(a) -> r { r := g(a) } \
                           function g(a) -> r { r := add(a, 1) } \
                           function unused() { pop(g(0)) } \
                           function h() { f2() } \
                           function f2() { h() } }";

    fn names(block: &Block) -> Vec<&str> {
        block.functions().map(|function| function.name.as_str()).collect()
    }

    #[test]
    fn unreachable_functions_are_dropped() {
        let pruned = run(block(PROGRAM), &["f".to_owned()]).unwrap();
        assert_eq!(names(&pruned), ["init", "f", "g"]);
        assert_eq!(pruned.statements.len(), 4);
    }

    #[test]
    fn recursion_terminates() {
        let pruned = run(block(PROGRAM), &["h".to_owned()]).unwrap();
        assert_eq!(names(&pruned), ["init", "h", "f2"]);
    }

    #[test]
    fn no_entry_points_keeps_everything() {
        let program = block(PROGRAM);
        assert_eq!(run(program.clone(), &[]).unwrap(), program);
    }
}

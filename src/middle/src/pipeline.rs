use {
    crate::{
        names::NameGenerator,
        passes::{
            constant_folder, dead_code_eliminator, expression_splitter, fold_if,
            for_loop_eliminator, for_loop_simplifier, function_pruner, leave_normalizer,
            name_mangler, revert_normalizer, scope_flattener, switch_to_if, variable_inliner,
        },
        verify::{self, Postconditions},
        Error, Result,
    },
    frontend::ast::{Block, Ident},
    std::collections::BTreeMap,
    tracing::{debug, trace},
};

#[derive(Debug, Clone)]
pub struct Normalized {
    pub block: Block,
    pub entry_points: BTreeMap<Ident, Ident>,
}

fn checked(pass: &'static str, conditions: Postconditions, block: Block) -> Result<Block> {
    verify::verify(pass, conditions, &block)?;
    debug!(pass, statements = block.statements.len(), "pass finished");
    trace!("after {pass}:\n{block}");
    Ok(block)
}

/// Runs every normalization pass in order, checking the shape of the tree after each.
pub fn normalize(
    block: Block,
    entry_points: &[Ident],
    names: &mut NameGenerator,
) -> Result<Normalized> {
    let mut conditions = Postconditions::default();
    let block = checked("input", conditions, block)?;

    conditions.simple_loops = true;
    let block = checked(
        "for-loop simplifier",
        conditions,
        for_loop_simplifier::run(block)?,
    )?;
    conditions.no_loops = true;
    let block = checked(
        "for-loop eliminator",
        conditions,
        for_loop_eliminator::run(block, names)?,
    )?;

    let mangled = name_mangler::run(block)?;
    let block = checked("name mangler", conditions, mangled.block)?;
    let entry_points = if entry_points.is_empty() {
        mangled.root_functions.into_iter().collect::<BTreeMap<_, _>>()
    } else {
        entry_points
            .iter()
            .map(|entry_point| {
                mangled
                    .root_functions
                    .iter()
                    .find(|(original, _)| original == entry_point)
                    .cloned()
                    .ok_or_else(|| Error::UnknownEntryPoint(entry_point.clone()))
            })
            .collect::<Result<BTreeMap<_, _>>>()?
    };
    let roots = entry_points.values().cloned().collect::<Vec<_>>();

    conditions.no_switch = true;
    let block = checked("switch to if", conditions, switch_to_if::run(block, names)?)?;
    let block = checked("variable inliner", conditions, variable_inliner::run(block)?)?;
    let block = checked("constant folder", conditions, constant_folder::run(block)?)?;
    let block = checked("fold if", conditions, fold_if::run(block)?)?;
    conditions.atomic = true;
    let block = checked(
        "expression splitter",
        conditions,
        expression_splitter::run(block, names)?,
    )?;
    let block = checked("revert normalizer", conditions, revert_normalizer::run(block)?)?;
    conditions.flat = true;
    let block = checked(
        "scope flattener",
        conditions,
        scope_flattener::run(block, names)?,
    )?;
    conditions.no_leave = true;
    let block = checked(
        "leave normalizer",
        conditions,
        leave_normalizer::run(block, names)?,
    )?;
    let block = checked("revert normalizer", conditions, revert_normalizer::run(block)?)?;
    let block = checked(
        "function pruner",
        conditions,
        function_pruner::run(block, &roots)?,
    )?;
    let block = checked(
        "dead code eliminator",
        conditions,
        dead_code_eliminator::run(block)?,
    )?;

    Ok(Normalized {
        block,
        entry_points,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::interp::{Execute, State, Trap},
        num_bigint::BigUint,
    };

    fn normalized(src: &str, entry_points: &[&str]) -> Normalized {
        let entry_points = entry_points.iter().map(|&name| name.to_owned()).collect::<Vec<_>>();
        normalize(
            Block::try_from(src).unwrap(),
            &entry_points,
            &mut NameGenerator::new(),
        )
        .unwrap()
    }

    fn assert_equivalent(src: &str, entry: &str, inputs: &[&[u64]]) {
        let original = Block::try_from(src).unwrap();
        let result = normalized(src, &[entry]);
        let mangled = &result.entry_points[entry];
        for arguments in inputs {
            let arguments = arguments.iter().copied().map(BigUint::from).collect::<Vec<_>>();
            let mut expected_state = State::default();
            let expected = original.execute(entry, &arguments, &mut expected_state);
            let mut actual_state = State::default();
            let actual = result.block.execute(mangled, &arguments, &mut actual_state);
            assert_eq!(actual, expected, "{entry}{arguments:?} in\n{}", result.block);
            assert_eq!(actual_state.storage, expected_state.storage);
        }
    }

    #[test]
    fn loops_with_every_transfer() {
        assert_equivalent(
            "{ function f(n) -> r { for { let i := 0 } lt(i, 20) { i := add(i, 1) } { \
             if eq(i, n) { leave } if gt(i, 10) { break } if mod(i, 3) { continue } \
             r := add(r, i) sstore(i, r) } r := mul(r, 2) } }",
            "f",
            &[&[0], &[4], &[9], &[30]],
        );
    }

    #[test]
    fn switches_and_nested_functions() {
        assert_equivalent(
            "{ function f(x) -> r { function g(a) -> b { switch a case 1 { b := 10 } \
             case 2 { leave } default { b := add(a, 100) } } \
             r := add(g(x), g(add(x, 1))) if gt(r, 1000) { revert(0, 0) } } }",
            "f",
            &[&[0], &[1], &[2], &[5]],
        );
    }

    #[test]
    fn reverts_are_preserved() {
        let src = "{ function fail(a) { revert(0, a) } \
                   function f(x) -> r { if x { fail(mload(0)) } r := 7 } }";
        assert_equivalent(src, "f", &[&[0], &[1]]);
        let result = normalized(src, &["f"]);
        assert_eq!(
            result.block.execute("f", &[BigUint::from(1u8)], &mut State::default()),
            Err(Trap::Revert)
        );
        assert!(!result.block.to_string().contains("fail"), "{}", result.block);
    }

    #[test]
    fn result_is_flat_and_pruned() {
        let result = normalized(
            "{ function unused() -> r { r := 1 } \
             function f(a) -> r { { let t := add(a, 1) if t { let u := mul(t, 2) r := u } } } }",
            &["f"],
        );
        assert_eq!(result.entry_points["f"], "f");
        assert_eq!(result.block.functions().count(), 1);
        assert!(result
            .block
            .statements
            .iter()
            .all(|statement| matches!(statement, frontend::ast::Statement::FunctionDefinition(_))));
    }

    #[test]
    fn entry_points_are_mangled_and_checked() {
        let src = "{ function felt(a) -> r { r := a } }";
        let result = normalized(src, &[]);
        assert_eq!(result.entry_points["felt"], "felt_1");
        let missing = normalize(
            Block::try_from(src).unwrap(),
            &["nope".to_owned()],
            &mut NameGenerator::new(),
        );
        assert!(matches!(missing, Err(Error::UnknownEntryPoint(name)) if name == "nope"));
    }
}

use {
    crate::{
        builtins,
        mapper::{self, AstMapper},
        Result,
    },
    frontend::ast::*,
};

struct ConstantFolder;

impl AstMapper for ConstantFolder {
    fn map_function_call(&mut self, call: FunctionCall) -> Result<Expression> {
        let call = mapper::walk_function_call(self, call)?;
        let literals = call
            .arguments
            .iter()
            .map(|argument| match argument {
                Expression::Literal(value) => Some(value.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>();
        Ok(literals
            .and_then(|literals| builtins::evaluate(&call.name, &literals))
            .map_or(Expression::Call(call), Expression::Literal))
    }
}

pub(crate) fn run(block: Block) -> Result<Block> {
    ConstantFolder.map_block(block)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{passes::test_utils::block, word::MODULUS},
        num_bigint::BigUint,
    };

    #[test]
    fn nested_literals_fold() {
        let folded = run(block("{ let x := add(mul(2, 3), sub(0, 1)) }")).unwrap();
        assert_eq!(folded, block("{ let x := 5 }"));
    }

    #[test]
    fn folding_wraps_around() {
        let folded = run(block(
            "{ let x := add(0x8000000000000000000000000000000000000000000000000000000000000000, \
             0x8000000000000000000000000000000000000000000000000000000000000000) \
             let y := not(0) }",
        ))
        .unwrap();
        let expected = Block::new(vec![
            Statement::declare(vec!["x".to_owned()], Some(Expression::literal(0u8))),
            Statement::declare(
                vec!["y".to_owned()],
                Some(Expression::Literal(&*MODULUS - BigUint::from(1u8))),
            ),
        ]);
        assert_eq!(folded, expected);
    }

    #[test]
    fn impure_and_partial_calls_stay() {
        let src = "{ let x := add(y, mul(2, 3)) let z := mload(0) }";
        assert_eq!(
            run(block(src)).unwrap(),
            block("{ let x := add(y, 6) let z := mload(0) }")
        );
    }
}

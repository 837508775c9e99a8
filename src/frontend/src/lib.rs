pub mod ast;
mod check;
mod json;
mod lexer;
mod parser;

pub use check::check;

use num_bigint::BigUint;

/// Identifiers starting with this prefix are reserved for generated names.
pub const RESERVED_PREFIX: &str = "__warp";

/// Packs up to 32 bytes into a word, first byte most significant, padded on the right.
fn left_aligned_word(bytes: &[u8]) -> Option<BigUint> {
    if bytes.len() > 32 {
        return None;
    }
    let mut word = [0u8; 32];
    word[..bytes.len()].copy_from_slice(bytes);
    Some(BigUint::from_bytes_be(&word))
}

impl TryFrom<&str> for ast::Block {
    type Error = anyhow::Error;

    fn try_from(src: &str) -> Result<Self, Self::Error> {
        use chumsky::Parser;

        let tokens = match lexer::lexer().parse(src).into_result() {
            Ok(tokens) => tokens,
            Err(errs) => anyhow::bail!(errs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")),
        };

        let block = match parser::ast_parser().parse(&tokens).into_result() {
            Ok(block) => block,
            Err(errs) => anyhow::bail!(errs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")),
        };

        Ok(block)
    }
}

impl ast::Block {
    /// Reads a block from the solc Yul JSON AST.
    pub fn from_json(src: &str) -> anyhow::Result<Self> {
        json::parse(src)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{ast::*, check},
        num_bigint::BigUint,
    };

    fn ingest(src: &str) -> anyhow::Result<Block> {
        let block = Block::try_from(src)?;
        check(&block)?;
        Ok(block)
    }

    const PROGRAM: &str = r#"
        {
            /* sums the first n integers */
            function sum(n) -> total {
                for { let i := 0 } lt(i, n) { i := add(i, 1) } {
                    total := add(total, i)
                }
            }
            function pick(x:u256) -> r {
                switch x
                case 0 { r := "ok" }
                case 0x10 { r := true }
                default { leave }
            }
            let a, b := pick(sum(4))
        }
    "#;

    #[test]
    fn parses_program() {
        let block = Block::try_from(PROGRAM).unwrap();
        let names = block.functions().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["sum", "pick"]);
        let Some(Statement::VariableDeclaration(declaration)) = block.statements.last() else {
            panic!("expected a trailing declaration in {block}");
        };
        assert_eq!(declaration.variables, ["a", "b"]);
        assert_eq!(
            declaration.value,
            Some(Expression::call(
                "pick",
                vec![Expression::call("sum", vec![Expression::literal(4u8)])]
            ))
        );
    }

    #[test]
    fn string_and_bool_literals_become_words() {
        let block = Block::try_from(PROGRAM).unwrap();
        let pick = block.functions().nth(1).unwrap();
        let [Statement::Switch(switch)] = &pick.body.statements[..] else {
            panic!("expected a switch in {block}");
        };
        let values = switch.cases.iter().map(|case| &case.value).collect::<Vec<_>>();
        assert_eq!(values, [&BigUint::from(0u8), &BigUint::from(16u8)]);
        assert_eq!(
            switch.cases[0].body.statements,
            [Statement::assign(
                vec!["r".to_owned()],
                Expression::literal(BigUint::from(0x6f6bu32) << 240)
            )]
        );
    }

    #[test]
    fn display_reparses_to_same_block() {
        let block = Block::try_from(PROGRAM).unwrap();
        let printed = block.to_string();
        assert_eq!(Block::try_from(&*printed).unwrap(), block);
    }

    #[test]
    fn rejects_reserved_prefix() {
        assert!(ingest("{ let __warp_x := 1 }").is_err());
        assert!(ingest("{ pop(__warp_revert()) }").is_err());
    }

    #[test]
    fn rejects_oversized_literals() {
        let long = "a".repeat(33);
        assert!(ingest(&*format!("{{ let x := \"{long}\" }}")).is_err());
        let huge = format!("0x1{}", "0".repeat(64));
        assert!(ingest(&*format!("{{ let x := {huge} }}")).is_err());
    }

    #[test]
    fn rejects_malformed_switches() {
        assert!(ingest("{ switch 1 }").is_err());
        assert!(ingest("{ switch 1 case 2 { } case 2 { } }").is_err());
    }

    #[test]
    fn rejects_bare_identifier_statement() {
        assert!(Block::try_from("{ let x := 1 x }").is_err());
    }
}

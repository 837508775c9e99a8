use {
    super::{cairo::Program, Result},
    tracing::debug,
};

pub fn validate(text: &str) -> Result<(Program, String)> {
    let program = Program::try_from(text)?;
    let formatted = program.to_string();
    debug!(bytes = formatted.len(), "validated Cairo");
    Ok((program, formatted))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::Error};

    #[test]
    fn formatting_is_canonical() {
        let text = "%lang starknet\nfunc f{range_check_ptr}(a : Uint256) -> (r : Uint256):\n  alloc_locals\n  # unused\n  return ((a))\nend";
        let (program, formatted) = validate(text).unwrap();
        assert_eq!(program.functions.len(), 1);
        assert!(formatted.contains("    return (a)\n"), "{formatted}");
        assert!(!formatted.contains('#'));
        assert_eq!(validate(&formatted).unwrap().1, formatted);
    }

    #[test]
    fn rejects_what_the_grammar_does_not_cover() {
        assert!(matches!(validate("func f(:\nend"), Err(Error::Parse(_))));
        assert!(matches!(
            validate("func f():\n    tempvar x = 1\nend"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn accepts_reserved_prefix_and_wildcards() {
        let (program, _) = validate("func __warp_f():\n    return ()\nend").unwrap();
        assert_eq!(program.functions[0].name, "__warp_f");
        let text = "func f{range_check_ptr}(a : Uint256) -> (r : Uint256):\n    let (local s : Uint256, _) = uint256_add(a, a)\n    return (s)\nend";
        assert!(validate(text).is_ok());
    }
}

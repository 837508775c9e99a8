use {
    super::word::{self, from_bool, from_signed, is_negative, shift_amount, to_signed, MODULUS},
    num_bigint::BigUint,
    num_traits::{One, ToPrimitive, Zero},
    std::{collections::BTreeMap, sync::LazyLock},
};

/// The canonical abort every revert shape is normalized into.
pub const REVERT: &str = "__warp_revert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Effect {
    Pure,
    Reads,
    Writes,
    Halts,
    Terminates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Helper {
    Add,
    Mul,
    Div,
    Sdiv,
    Mod,
    Smod,
    Exp,
    Addmod,
    Mulmod,
    Signextend,
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    Iszero,
    Shl,
    Shr,
    Sar,
    Byte,
    Revert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowering {
    Library(&'static str),
    Helper(Helper),
    Discard,
    Canonicalized,
}

#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub arguments: usize,
    pub returns: usize,
    pub effect: Effect,
    pub lowering: Lowering,
}

static BUILTINS: LazyLock<BTreeMap<&str, Builtin>> = LazyLock::new(|| {
    use {Effect::*, Lowering::*};

    let builtin = |arguments, returns, effect, lowering| Builtin {
        arguments,
        returns,
        effect,
        lowering,
    };
    BTreeMap::from([
        // arithmetic
        ("add", builtin(2, 1, Pure, Helper(self::Helper::Add))),
        ("sub", builtin(2, 1, Pure, Library("uint256_sub"))),
        ("mul", builtin(2, 1, Pure, Helper(self::Helper::Mul))),
        ("div", builtin(2, 1, Pure, Helper(self::Helper::Div))),
        ("sdiv", builtin(2, 1, Pure, Helper(self::Helper::Sdiv))),
        ("mod", builtin(2, 1, Pure, Helper(self::Helper::Mod))),
        ("smod", builtin(2, 1, Pure, Helper(self::Helper::Smod))),
        ("exp", builtin(2, 1, Pure, Helper(self::Helper::Exp))),
        ("addmod", builtin(3, 1, Pure, Helper(self::Helper::Addmod))),
        ("mulmod", builtin(3, 1, Pure, Helper(self::Helper::Mulmod))),
        ("signextend", builtin(2, 1, Pure, Helper(self::Helper::Signextend))),
        // comparison
        ("lt", builtin(2, 1, Pure, Helper(self::Helper::Lt))),
        ("gt", builtin(2, 1, Pure, Helper(self::Helper::Gt))),
        ("slt", builtin(2, 1, Pure, Helper(self::Helper::Slt))),
        ("sgt", builtin(2, 1, Pure, Helper(self::Helper::Sgt))),
        ("eq", builtin(2, 1, Pure, Helper(self::Helper::Eq))),
        ("iszero", builtin(1, 1, Pure, Helper(self::Helper::Iszero))),
        // bitwise
        ("not", builtin(1, 1, Pure, Library("uint256_not"))),
        ("and", builtin(2, 1, Pure, Library("uint256_and"))),
        ("or", builtin(2, 1, Pure, Library("uint256_or"))),
        ("xor", builtin(2, 1, Pure, Library("uint256_xor"))),
        ("byte", builtin(2, 1, Pure, Helper(self::Helper::Byte))),
        ("shl", builtin(2, 1, Pure, Helper(self::Helper::Shl))),
        ("shr", builtin(2, 1, Pure, Helper(self::Helper::Shr))),
        ("sar", builtin(2, 1, Pure, Helper(self::Helper::Sar))),
        ("pop", builtin(1, 0, Pure, Discard)),
        // memory and storage
        ("mload", builtin(1, 1, Reads, Library("mload_"))),
        ("mstore", builtin(2, 0, Writes, Library("mstore_"))),
        ("mstore8", builtin(2, 0, Writes, Library("mstore8_"))),
        ("sload", builtin(1, 1, Reads, Library("warp_sload"))),
        ("sstore", builtin(2, 0, Writes, Library("warp_sstore"))),
        ("keccak256", builtin(2, 1, Reads, Library("sha"))),
        ("msize", builtin(0, 1, Reads, Library("msize_"))),
        // environment
        ("calldataload", builtin(1, 1, Reads, Library("warp_calldataload"))),
        ("calldatasize", builtin(0, 1, Reads, Library("warp_calldatasize"))),
        ("calldatacopy", builtin(3, 0, Writes, Library("warp_calldatacopy"))),
        ("caller", builtin(0, 1, Reads, Library("warp_caller"))),
        ("address", builtin(0, 1, Reads, Library("warp_address"))),
        ("callvalue", builtin(0, 1, Reads, Library("warp_callvalue"))),
        ("gas", builtin(0, 1, Reads, Library("warp_gas"))),
        ("timestamp", builtin(0, 1, Reads, Library("warp_timestamp"))),
        ("number", builtin(0, 1, Reads, Library("warp_number"))),
        ("chainid", builtin(0, 1, Reads, Library("warp_chainid"))),
        ("returndatasize", builtin(0, 1, Reads, Library("warp_returndatasize"))),
        ("returndatacopy", builtin(3, 0, Writes, Library("warp_returndatacopy"))),
        ("codecopy", builtin(3, 0, Writes, Library("warp_codecopy"))),
        ("extcodesize", builtin(1, 1, Reads, Library("warp_extcodesize"))),
        // calls and events
        ("call", builtin(7, 1, Writes, Library("warp_call"))),
        ("staticcall", builtin(6, 1, Writes, Library("warp_static_call"))),
        ("delegatecall", builtin(6, 1, Writes, Library("warp_delegatecall"))),
        ("log0", builtin(2, 0, Writes, Library("warp_log0"))),
        ("log1", builtin(3, 0, Writes, Library("warp_log1"))),
        ("log2", builtin(4, 0, Writes, Library("warp_log2"))),
        ("log3", builtin(5, 0, Writes, Library("warp_log3"))),
        ("log4", builtin(6, 0, Writes, Library("warp_log4"))),
        // halts
        ("return", builtin(2, 0, Halts, Library("warp_return"))),
        ("stop", builtin(0, 0, Halts, Library("warp_stop"))),
        // aborts
        ("revert", builtin(2, 0, Terminates, Canonicalized)),
        ("invalid", builtin(0, 0, Terminates, Canonicalized)),
        (REVERT, builtin(0, 0, Terminates, Helper(self::Helper::Revert))),
    ])
});

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.get(name)
}

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains_key(name)
}

pub fn library_functions() -> impl Iterator<Item = &'static str> {
    BUILTINS.values().filter_map(|builtin| match builtin.lowering {
        Lowering::Library(function) => Some(function),
        _ => None,
    })
}

pub fn for_library_function(function: &str) -> Option<&'static str> {
    BUILTINS
        .iter()
        .find(|(_, builtin)| matches!(builtin.lowering, Lowering::Library(f) if f == function))
        .map(|(&name, _)| name)
}

fn signextend(byte: &BigUint, value: &BigUint) -> BigUint {
    let Some(byte) = byte.to_u64().filter(|&byte| byte < 31) else {
        return value.clone();
    };
    let bit = byte * 8 + 7;
    let mask = (BigUint::one() << (bit + 1)) - 1u8;
    if value.bit(bit) {
        value | (&*MODULUS - 1u8 - &mask)
    } else {
        value & mask
    }
}

fn byte(index: &BigUint, value: &BigUint) -> BigUint {
    match index.to_u64().filter(|&index| index < 32) {
        Some(index) => (value >> (248 - 8 * index)) & BigUint::from(0xffu8),
        None => BigUint::zero(),
    }
}

fn sar(shift: &BigUint, value: &BigUint) -> BigUint {
    match shift_amount(shift) {
        Some(shift) => from_signed(to_signed(value) >> shift),
        None if is_negative(value) => &*MODULUS - 1u8,
        None => BigUint::zero(),
    }
}

/// Exact 256-bit semantics of the pure value-returning builtins.
pub fn evaluate(name: &str, arguments: &[BigUint]) -> Option<BigUint> {
    let nonzero = |divisor: &BigUint, f: &dyn Fn() -> BigUint| {
        if divisor.is_zero() {
            BigUint::zero()
        } else {
            f()
        }
    };
    let result = match (name, arguments) {
        ("add", [a, b]) => a + b,
        ("sub", [a, b]) => a + &*MODULUS - b,
        ("mul", [a, b]) => a * b,
        ("div", [a, b]) => nonzero(b, &|| a / b),
        ("sdiv", [a, b]) => nonzero(b, &|| from_signed(to_signed(a) / to_signed(b))),
        ("mod", [a, b]) => nonzero(b, &|| a % b),
        ("smod", [a, b]) => nonzero(b, &|| from_signed(to_signed(a) % to_signed(b))),
        ("exp", [a, b]) => a.modpow(b, &MODULUS),
        ("addmod", [a, b, n]) => nonzero(n, &|| (a + b) % n),
        ("mulmod", [a, b, n]) => nonzero(n, &|| (a * b) % n),
        ("signextend", [b, x]) => signextend(b, x),
        ("lt", [a, b]) => from_bool(a < b),
        ("gt", [a, b]) => from_bool(a > b),
        ("slt", [a, b]) => from_bool(to_signed(a) < to_signed(b)),
        ("sgt", [a, b]) => from_bool(to_signed(a) > to_signed(b)),
        ("eq", [a, b]) => from_bool(a == b),
        ("iszero", [a]) => from_bool(a.is_zero()),
        ("not", [a]) => &*MODULUS - 1u8 - a,
        ("and", [a, b]) => a & b,
        ("or", [a, b]) => a | b,
        ("xor", [a, b]) => a ^ b,
        ("byte", [n, x]) => byte(n, x),
        ("shl", [s, v]) => shift_amount(s).map_or_else(BigUint::zero, |s| v << s),
        ("shr", [s, v]) => shift_amount(s).map_or_else(BigUint::zero, |s| v >> s),
        ("sar", [s, v]) => sar(s, v),
        _ => return None,
    };
    Some(word::wrap(result))
}

#[cfg(test)]
mod tests {
    use {super::*, num_bigint::BigInt};

    fn eval(name: &str, arguments: &[&BigUint]) -> BigUint {
        let arguments = arguments.iter().map(|&a| a.clone()).collect::<Vec<_>>();
        evaluate(name, &arguments).unwrap()
    }

    fn max() -> BigUint {
        &*MODULUS - 1u8
    }

    fn n(value: u64) -> BigUint {
        BigUint::from(value)
    }

    #[test]
    fn every_pure_value_builtin_evaluates() {
        for (name, builtin) in BUILTINS.iter() {
            if builtin.effect == Effect::Pure && builtin.returns == 1 {
                let arguments = vec![n(3); builtin.arguments];
                assert!(evaluate(name, &arguments).is_some(), "{name}");
            }
        }
        assert_eq!(evaluate("sload", &[n(0)]), None);
        assert_eq!(evaluate("add", &[n(1)]), None);
    }

    #[test]
    fn halting_and_memory_builtins_are_registered() {
        for (name, effect) in [
            ("return", Effect::Halts),
            ("stop", Effect::Halts),
            ("msize", Effect::Reads),
            ("codecopy", Effect::Writes),
            ("extcodesize", Effect::Reads),
        ] {
            let builtin = lookup(name).unwrap();
            assert_eq!(builtin.effect, effect, "{name}");
            assert!(matches!(builtin.lowering, Lowering::Library(_)), "{name}");
        }
        assert_eq!(for_library_function("warp_return"), Some("return"));
        assert_eq!(for_library_function("msize_"), Some("msize"));
        assert_eq!(for_library_function("__warp_add"), None);
    }

    #[test]
    fn wraparound() {
        let half = BigUint::one() << 255u32;
        assert_eq!(eval("add", &[&half, &half]), n(0));
        assert_eq!(eval("sub", &[&n(0), &n(1)]), max());
        assert_eq!(eval("mul", &[&max(), &n(2)]), &max() - 1u8);
        assert_eq!(eval("exp", &[&n(2), &n(256)]), n(0));
        assert_eq!(eval("exp", &[&n(3), &n(5)]), n(243));
    }

    #[test]
    fn division_by_zero_is_zero() {
        for name in ["div", "sdiv", "mod", "smod"] {
            assert_eq!(eval(name, &[&n(7), &n(0)]), n(0), "{name}");
        }
        assert_eq!(eval("addmod", &[&n(7), &n(8), &n(0)]), n(0));
        assert_eq!(eval("mulmod", &[&n(7), &n(8), &n(0)]), n(0));
    }

    #[test]
    fn signed_arithmetic() {
        let minus = |v: i64| from_signed(BigInt::from(-v));
        assert_eq!(eval("sdiv", &[&minus(7), &n(2)]), minus(3));
        assert_eq!(eval("smod", &[&minus(7), &n(2)]), minus(1));
        assert_eq!(eval("slt", &[&minus(1), &n(0)]), n(1));
        assert_eq!(eval("sgt", &[&minus(1), &n(0)]), n(0));
        let min = BigUint::one() << 255u32;
        assert_eq!(eval("sdiv", &[&min, &max()]), min);
    }

    #[test]
    fn modular_arithmetic_uses_full_precision() {
        assert_eq!(eval("addmod", &[&max(), &n(2), &n(10)]), (max() + 2u8) % 10u8);
        assert_eq!(eval("mulmod", &[&max(), &max(), &n(12)]), (max() * max()) % 12u8);
    }

    #[test]
    fn shifts_and_bytes() {
        assert_eq!(eval("shl", &[&n(4), &n(1)]), n(16));
        assert_eq!(eval("shl", &[&n(256), &n(1)]), n(0));
        assert_eq!(eval("shr", &[&n(1), &n(16)]), n(8));
        assert_eq!(eval("sar", &[&n(4), &max()]), max());
        assert_eq!(eval("sar", &[&n(300), &max()]), max());
        assert_eq!(eval("sar", &[&n(1), &n(16)]), n(8));
        assert_eq!(eval("byte", &[&n(31), &n(0x1234)]), n(0x34));
        assert_eq!(eval("byte", &[&n(30), &n(0x1234)]), n(0x12));
        assert_eq!(eval("byte", &[&n(32), &n(0x1234)]), n(0));
    }

    #[test]
    fn sign_extension() {
        assert_eq!(eval("signextend", &[&n(0), &n(0xff)]), max());
        assert_eq!(eval("signextend", &[&n(0), &n(0x7f)]), n(0x7f));
        assert_eq!(eval("signextend", &[&n(1), &n(0x1ff)]), n(0x1ff));
        assert_eq!(eval("signextend", &[&n(31), &n(0xff)]), n(0xff));
    }

    #[test]
    fn bitwise() {
        assert_eq!(eval("not", &[&n(0)]), max());
        assert_eq!(eval("and", &[&n(0b1100), &n(0b1010)]), n(0b1000));
        assert_eq!(eval("or", &[&n(0b1100), &n(0b1010)]), n(0b1110));
        assert_eq!(eval("xor", &[&n(0b1100), &n(0b1010)]), n(0b0110));
        assert_eq!(eval("iszero", &[&n(0)]), n(1));
        assert_eq!(eval("eq", &[&n(5), &n(5)]), n(1));
    }
}

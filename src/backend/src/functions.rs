use {
    super::{
        cairo::{Function, Name},
        parser, Result,
    },
    middle::builtins::{self, Helper, Lowering},
    std::collections::BTreeMap,
    tracing::trace,
};

const ADD: &str = "
func __warp_add(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local res : Uint256, _) = uint256_add(a, b)
    return (res)
end";

const MUL: &str = "
func __warp_mul(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local res : Uint256, _) = uint256_mul(a, b)
    return (res)
end";

const DIV: &str = "
func __warp_div(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    if b.low + b.high == 0:
        return (Uint256(0, 0))
    end
    let (local res : Uint256, _) = uint256_unsigned_div_rem(a, b)
    return (res)
end";

const SDIV: &str = "
func __warp_sdiv(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    if b.low + b.high == 0:
        return (Uint256(0, 0))
    end
    let (local res : Uint256, _) = uint256_signed_div_rem(a, b)
    return (res)
end";

const MOD: &str = "
func __warp_mod(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    if b.low + b.high == 0:
        return (Uint256(0, 0))
    end
    let (_, local res : Uint256) = uint256_unsigned_div_rem(a, b)
    return (res)
end";

const SMOD: &str = "
func __warp_smod(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    if b.low + b.high == 0:
        return (Uint256(0, 0))
    end
    let (_, local res : Uint256) = uint256_signed_div_rem(a, b)
    return (res)
end";

// square and multiply, one bit of the exponent per call
const EXP: &str = "
func __warp_exp(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    if b.low + b.high == 0:
        return (Uint256(1, 0))
    end
    let (local half : Uint256, local bit : Uint256) = uint256_unsigned_div_rem(b, Uint256(2, 0))
    let (local root : Uint256) = __warp_exp(a, half)
    let (local square : Uint256, _) = uint256_mul(root, root)
    if bit.low == 0:
        return (square)
    end
    let (local res : Uint256, _) = uint256_mul(square, a)
    return (res)
end";

const ADDMOD: &str = "
func __warp_addmod(a : Uint256, b : Uint256, c : Uint256) -> (res : Uint256):
    alloc_locals
    if c.low + c.high == 0:
        return (Uint256(0, 0))
    end
    let (_, local x : Uint256) = uint256_unsigned_div_rem(a, c)
    let (_, local y : Uint256) = uint256_unsigned_div_rem(b, c)
    let (local sum : Uint256, local carry) = uint256_add(x, y)
    if carry != 0:
        let (local wrapped : Uint256) = uint256_sub(sum, c)
        return (wrapped)
    end
    let (local below) = uint256_lt(sum, c)
    if below != 0:
        return (sum)
    end
    let (local reduced : Uint256) = uint256_sub(sum, c)
    return (reduced)
end";

const MULMOD: &str = "
func __warp_mulmod(a : Uint256, b : Uint256, c : Uint256) -> (res : Uint256):
    alloc_locals
    if c.low + c.high == 0:
        return (Uint256(0, 0))
    end
    let (_, _, local res : Uint256) = uint256_mul_div_mod(a, b, c)
    return (res)
end";

const SIGNEXTEND: &str = "
func __warp_signextend(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local small) = uint256_lt(a, Uint256(31, 0))
    if small == 0:
        return (b)
    end
    let (local bits : Uint256, _) = uint256_mul(a, Uint256(8, 0))
    let (local width : Uint256, _) = uint256_add(bits, Uint256(8, 0))
    let (local bound : Uint256) = uint256_shl(Uint256(1, 0), width)
    let (local mask : Uint256) = uint256_sub(bound, Uint256(1, 0))
    let (local position : Uint256) = uint256_sub(width, Uint256(1, 0))
    let (local shifted : Uint256) = uint256_shr(b, position)
    let (local sign : Uint256) = uint256_and(shifted, Uint256(1, 0))
    if sign.low == 0:
        let (local positive : Uint256) = uint256_and(b, mask)
        return (positive)
    end
    let (local inverted : Uint256) = uint256_not(mask)
    let (local negative : Uint256) = uint256_or(b, inverted)
    return (negative)
end";

const LT: &str = "
func __warp_lt(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local res) = uint256_lt(a, b)
    return (Uint256(res, 0))
end";

const GT: &str = "
func __warp_gt(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local res) = uint256_lt(b, a)
    return (Uint256(res, 0))
end";

const SLT: &str = "
func __warp_slt(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local res) = uint256_signed_lt(a, b)
    return (Uint256(res, 0))
end";

const SGT: &str = "
func __warp_sgt(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local res) = uint256_signed_lt(b, a)
    return (Uint256(res, 0))
end";

const EQ: &str = "
func __warp_eq(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local res) = uint256_eq(a, b)
    return (Uint256(res, 0))
end";

const ISZERO: &str = "
func __warp_iszero(a : Uint256) -> (res : Uint256):
    if a.low + a.high == 0:
        return (Uint256(1, 0))
    end
    return (Uint256(0, 0))
end";

const SHL: &str = "
func __warp_shl(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local small) = uint256_lt(a, Uint256(256, 0))
    if small == 0:
        return (Uint256(0, 0))
    end
    let (local res : Uint256) = uint256_shl(b, a)
    return (res)
end";

const SHR: &str = "
func __warp_shr(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local small) = uint256_lt(a, Uint256(256, 0))
    if small == 0:
        return (Uint256(0, 0))
    end
    let (local res : Uint256) = uint256_shr(b, a)
    return (res)
end";

// a negative value shifts as the complement of the shifted complement
const SAR: &str = "
func __warp_sar(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local negative) = uint256_signed_lt(b, Uint256(0, 0))
    if negative == 0:
        let (local positive : Uint256) = __warp_shr(a, b)
        return (positive)
    end
    let (local inverted : Uint256) = uint256_not(b)
    let (local shifted : Uint256) = __warp_shr(a, inverted)
    let (local res : Uint256) = uint256_not(shifted)
    return (res)
end";

const BYTE: &str = "
func __warp_byte(a : Uint256, b : Uint256) -> (res : Uint256):
    alloc_locals
    let (local small) = uint256_lt(a, Uint256(32, 0))
    if small == 0:
        return (Uint256(0, 0))
    end
    let (local bits : Uint256, _) = uint256_mul(a, Uint256(8, 0))
    let (local shift : Uint256) = uint256_sub(Uint256(248, 0), bits)
    let (local shifted : Uint256) = uint256_shr(b, shift)
    let (local res : Uint256) = uint256_and(shifted, Uint256(255, 0))
    return (res)
end";

const REVERT: &str = "
func __warp_revert():
    assert 0 = 1
    return ()
end";

fn template(helper: Helper) -> &'static str {
    match helper {
        Helper::Add => ADD,
        Helper::Mul => MUL,
        Helper::Div => DIV,
        Helper::Sdiv => SDIV,
        Helper::Mod => MOD,
        Helper::Smod => SMOD,
        Helper::Exp => EXP,
        Helper::Addmod => ADDMOD,
        Helper::Mulmod => MULMOD,
        Helper::Signextend => SIGNEXTEND,
        Helper::Lt => LT,
        Helper::Gt => GT,
        Helper::Slt => SLT,
        Helper::Sgt => SGT,
        Helper::Eq => EQ,
        Helper::Iszero => ISZERO,
        Helper::Shl => SHL,
        Helper::Shr => SHR,
        Helper::Sar => SAR,
        Helper::Byte => BYTE,
        Helper::Revert => REVERT,
    }
}

fn helper_named(name: &str) -> Option<Helper> {
    let builtin = match name {
        builtins::REVERT => name,
        _ => name.strip_prefix("__warp_")?,
    };
    match builtins::lookup(builtin)?.lowering {
        Lowering::Helper(helper) => Some(helper),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub(crate) struct HelperCache {
    helpers: BTreeMap<Helper, Function>,
}

impl HelperCache {
    pub fn request(&mut self, helper: Helper) -> Result<Name> {
        if let Some(function) = self.helpers.get(&helper) {
            return Ok(function.name.clone());
        }
        let function = parser::parse_function(template(helper))?;
        let name = function.name.clone();
        trace!(helper = %name, "materialized helper");
        let dependencies = function
            .calls()
            .into_iter()
            .filter_map(|(call, _)| helper_named(&call.function))
            .filter(|&dependency| dependency != helper)
            .collect::<Vec<_>>();
        self.helpers.insert(helper, function);
        for dependency in dependencies {
            self.request(dependency)?;
        }
        Ok(name)
    }

    pub fn into_functions(self) -> impl Iterator<Item = Function> {
        self.helpers.into_values()
    }
}

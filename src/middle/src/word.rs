use {
    num_bigint::{BigInt, BigUint},
    num_traits::{One, Zero},
    std::sync::LazyLock,
};

pub const BITS: u64 = 256;

pub static MODULUS: LazyLock<BigUint> = LazyLock::new(|| BigUint::one() << BITS);

static LIMB_MASK: LazyLock<BigUint> = LazyLock::new(|| (BigUint::one() << 128) - 1u8);

pub fn wrap(value: BigUint) -> BigUint {
    value % &*MODULUS
}

pub fn from_bool(value: bool) -> BigUint {
    if value {
        BigUint::one()
    } else {
        BigUint::zero()
    }
}

pub fn is_negative(value: &BigUint) -> bool {
    value.bit(BITS - 1)
}

pub fn to_signed(value: &BigUint) -> BigInt {
    if is_negative(value) {
        BigInt::from(value.clone()) - BigInt::from(MODULUS.clone())
    } else {
        BigInt::from(value.clone())
    }
}

pub fn from_signed(value: BigInt) -> BigUint {
    let modulus = BigInt::from(MODULUS.clone());
    let wrapped = ((value % &modulus) + &modulus) % &modulus;
    match wrapped.to_biguint() {
        Some(value) => value,
        None => unreachable!("a value reduced modulo 2^256 is non-negative"),
    }
}

pub fn negate(value: &BigUint) -> BigUint {
    from_signed(-BigInt::from(value.clone()))
}

pub fn split(value: &BigUint) -> (BigUint, BigUint) {
    (value & &*LIMB_MASK, (value >> 128u32) & &*LIMB_MASK)
}

pub fn join(low: &BigUint, high: &BigUint) -> BigUint {
    wrap((high << 128u32) + low)
}

pub fn shift_amount(value: &BigUint) -> Option<u64> {
    u64::try_from(value).ok().filter(|&shift| shift < BITS)
}

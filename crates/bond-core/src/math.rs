//! Fixed-point multiply/divide over [`U256`].
//!
//! The product `a * b` is formed in 512 bits so no precision is lost before
//! the division. Only the quotient must fit 256 bits.
//!
//! Rounding direction matters: what a buyer pays is rounded up
//! ([`mul_div_up`]), what a buyer receives is rounded down ([`mul_div`]).

use alloy_primitives::{U256, U512};

use crate::error::MathError;

fn widen(x: U256) -> U512 {
    let l = x.as_limbs();
    U512::from_limbs([l[0], l[1], l[2], l[3], 0, 0, 0, 0])
}

fn narrow(x: U512) -> Result<U256, MathError> {
    let l = x.as_limbs();
    if l[4..].iter().any(|&limb| limb != 0) {
        return Err(MathError::ArithmeticOverflow);
    }
    Ok(U256::from_limbs([l[0], l[1], l[2], l[3]]))
}

fn full_product(a: U256, b: U256) -> U512 {
    // Two 256-bit operands never overflow a 512-bit product.
    widen(a).wrapping_mul(widen(b))
}

/// `floor(a * b / denom)`.
///
/// # Errors
///
/// [`MathError::ArithmeticOverflow`] if `denom` is zero or the quotient does
/// not fit in 256 bits.
///
/// # Examples
///
/// ```
/// use bond_core::math::mul_div;
/// use bond_core::U256;
///
/// let q = mul_div(U256::from(10u64), U256::from(10u64), U256::from(3u64)).unwrap();
/// assert_eq!(q, U256::from(33u64));
/// assert!(mul_div(U256::from(1u64), U256::from(1u64), U256::ZERO).is_err());
/// ```
pub fn mul_div(a: U256, b: U256, denom: U256) -> Result<U256, MathError> {
    if denom.is_zero() {
        return Err(MathError::ArithmeticOverflow);
    }
    narrow(full_product(a, b) / widen(denom))
}

/// `ceil(a * b / denom)`.
///
/// # Errors
///
/// Same as [`mul_div`].
///
/// # Examples
///
/// ```
/// use bond_core::math::mul_div_up;
/// use bond_core::U256;
///
/// let q = mul_div_up(U256::from(10u64), U256::from(10u64), U256::from(3u64)).unwrap();
/// assert_eq!(q, U256::from(34u64));
/// ```
pub fn mul_div_up(a: U256, b: U256, denom: U256) -> Result<U256, MathError> {
    if denom.is_zero() {
        return Err(MathError::ArithmeticOverflow);
    }
    let product = full_product(a, b);
    let d = widen(denom);
    let quotient = product / d;
    let rounded = if (product % d).is_zero() {
        quotient
    } else {
        quotient + U512::from(1u64)
    };
    narrow(rounded)
}

/// `10^exp` as a [`U256`].
///
/// # Errors
///
/// [`MathError::ArithmeticOverflow`] for negative exponents or `exp > 77`.
pub fn pow10(exp: i32) -> Result<U256, MathError> {
    if exp < 0 {
        return Err(MathError::ArithmeticOverflow);
    }
    let ten = U256::from(10u64);
    let mut result = U256::from(1u64);
    for _ in 0..exp {
        result = result.checked_mul(ten).ok_or(MathError::ArithmeticOverflow)?;
    }
    Ok(result)
}

/// Checked addition mapped onto [`MathError`].
pub fn add(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::ArithmeticOverflow)
}

/// Checked subtraction mapped onto [`MathError`].
pub fn sub(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_sub(b).ok_or(MathError::ArithmeticOverflow)
}

/// Narrow a [`U256`] to `u64`.
pub fn to_u64(x: U256) -> Result<u64, MathError> {
    if x > U256::from(u64::MAX) {
        return Err(MathError::ArithmeticOverflow);
    }
    Ok(x.as_limbs()[0])
}

/// Number of decimal digits before the point minus one: `floor(log10(x))`.
///
/// Returns `None` for zero.
pub fn log10_floor(x: U256) -> Option<i32> {
    if x.is_zero() {
        return None;
    }
    let ten = U256::from(10u64);
    let mut value = x;
    let mut digits = 0;
    while value >= ten {
        value /= ten;
        digits += 1;
    }
    Some(digits)
}

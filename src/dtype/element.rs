//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use std::ops::{Add, Mul, Sub};

/// Trait for types that can flow through a layer pipeline
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - values are moved freely between lanes
/// - `Pod + Zeroable` - zero-initialized scratch buffers (bytemuck)
/// - `Add + Sub + Mul` - multiply, reduce and adjust arithmetic
/// - `PartialOrd` - running maximum for pooling
///
/// # Integer overflow
///
/// Pipeline arithmetic goes through [`add_wrapping`](Self::add_wrapping),
/// [`sub_wrapping`](Self::sub_wrapping) and [`mul_wrapping`](Self::mul_wrapping).
/// Integer elements wrap on overflow in every build profile, like a
/// fixed-width hardware accumulator; floats use plain IEEE arithmetic.
/// A layer whose sums can exceed the element range should use a wider type.
pub trait Element:
    Copy
    + Clone
    + Send
    + Sync
    + Pod
    + Zeroable
    + std::fmt::Debug
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for diagnostics and tolerance checks
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Additive identity, also the padding value of ragged reduction words
    fn zero() -> Self;

    /// Multiplicative identity
    fn one() -> Self;

    /// Sum used by every pipeline stage.
    #[inline]
    fn add_wrapping(self, rhs: Self) -> Self {
        self + rhs
    }

    /// Difference used by every pipeline stage.
    #[inline]
    fn sub_wrapping(self, rhs: Self) -> Self {
        self - rhs
    }

    /// Product used by every pipeline stage.
    #[inline]
    fn mul_wrapping(self, rhs: Self) -> Self {
        self * rhs
    }
}

macro_rules! impl_float_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }
        }
    };
}

macro_rules! impl_int_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn one() -> Self {
                1
            }

            #[inline]
            fn add_wrapping(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            #[inline]
            fn sub_wrapping(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            #[inline]
            fn mul_wrapping(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
        }
    };
}

impl_float_element!(f64, DType::F64);
impl_float_element!(f32, DType::F32);
impl_int_element!(i64, DType::I64);
impl_int_element!(i32, DType::I32);
impl_int_element!(i16, DType::I16);

// ============================================================================
// Half-precision floating point types (requires "f16" feature)
// ============================================================================

#[cfg(feature = "f16")]
impl Element for half::f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_f64(self) -> f64 {
        half::f16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::f16::ZERO
    }

    #[inline]
    fn one() -> Self {
        half::f16::ONE
    }
}

#[cfg(feature = "f16")]
impl Element for half::bf16 {
    const DTYPE: DType = DType::BF16;

    #[inline]
    fn to_f64(self) -> f64 {
        half::bf16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::bf16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::bf16::ZERO
    }

    #[inline]
    fn one() -> Self {
        half::bf16::ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_dtype() {
        assert_eq!(f64::DTYPE, DType::F64);
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(i32::DTYPE, DType::I32);
        assert_eq!(i16::DTYPE, DType::I16);
    }

    #[test]
    fn test_element_conversions() {
        assert_eq!(f32::from_f64(2.5).to_f64(), 2.5f32 as f64);
        assert_eq!(i16::from_f64(42.0), 42);
        assert_eq!(i32::zero() + i32::one(), 1);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(i16::MAX.add_wrapping(1), i16::MIN);
        assert_eq!(i16::MIN.sub_wrapping(1), i16::MAX);
        assert_eq!(300i16.mul_wrapping(300), 24464);
        assert_eq!(1.5f64.add_wrapping(2.0), 3.5);
    }

    #[cfg(feature = "f16")]
    #[test]
    fn test_half_element_conversions() {
        let h = half::f16::from_f64(3.0);
        assert_eq!(Element::to_f64(h), 3.0);
        assert_eq!(half::bf16::zero(), half::bf16::ZERO);
    }
}

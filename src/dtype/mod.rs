//! Data type system for convflow layers
//!
//! This module provides the `DType` enum naming the supported element types
//! and the [`Element`] trait that connects them to Rust types.

mod element;

pub use element::Element;

use std::fmt;

/// Element types a layer pipeline can be instantiated with
///
/// The discriminant values are stable:
/// - Floats: 0-9 (F64=0, F32=1, F16=2, BF16=3)
/// - Signed ints: 10-19 (I64=10, I32=11, I16=12)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point (most common)
    F32 = 1,
    /// 16-bit floating point (IEEE 754)
    F16 = 2,
    /// 16-bit brain floating point
    BF16 = 3,
    /// 64-bit signed integer
    I64 = 10,
    /// 32-bit signed integer
    I32 = 11,
    /// 16-bit signed integer, the word width of the fixed-point layer designs
    I16 = 12,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 | Self::I64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::BF16 | Self::I16 => 2,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32 | Self::F16 | Self::BF16)
    }

    /// Short name for display (e.g., "f32", "i16")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::I16 => "i16",
        }
    }

    /// Relative tolerance that a staged reduction may deviate from a
    /// left-to-right sum, per element summed.
    ///
    /// Integer types sum exactly.
    pub const fn reduction_rtol(self) -> f64 {
        match self {
            Self::F64 => 1e-12,
            Self::F32 => 1e-6,
            Self::F16 => 1e-3,
            Self::BF16 => 8e-3,
            Self::I64 | Self::I32 | Self::I16 => 0.0,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

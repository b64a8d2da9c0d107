//! Shared validation helpers for layer configuration.
//!
//! All checks run once, before a pipeline is built. A pipeline constructed
//! from validated [`LayerParams`](super::LayerParams) never fails mid-run.

use crate::error::{Error, Result};

/// Padding applied around the input feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingMode {
    /// No padding - output is smaller than input.
    #[default]
    Valid,
    /// Padding to make output same size as input (when stride=1).
    Same,
    /// Explicit padding: (top, bottom, left, right)
    Custom(usize, usize, usize, usize),
}

impl PaddingMode {
    /// Creates padding for a specific amount on all sides.
    pub fn uniform(padding: usize) -> Self {
        PaddingMode::Custom(padding, padding, padding, padding)
    }

    /// Returns the name of the padding mode for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PaddingMode::Valid => "valid",
            PaddingMode::Same => "same",
            PaddingMode::Custom(..) => "custom",
        }
    }
}

/// Explicit per-side padding after resolving a [`PaddingMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    /// Rows of zeros above the input
    pub top: usize,
    /// Rows of zeros below the input
    pub bottom: usize,
    /// Columns of zeros left of the input
    pub left: usize,
    /// Columns of zeros right of the input
    pub right: usize,
}

/// Validates that a dimension or factor is non-zero.
#[inline]
pub fn validate_positive(value: usize, name: &'static str) -> Result<()> {
    if value == 0 {
        return Err(Error::invalid_argument(
            name,
            format!("{} must be > 0, got 0", name),
        ));
    }
    Ok(())
}

/// Validates that `value` splits evenly into groups of `divisor`.
#[inline]
pub fn validate_divisible(
    value: usize,
    what: &'static str,
    divisor: usize,
    divisor_name: &'static str,
) -> Result<()> {
    if !value.is_multiple_of(divisor) {
        return Err(Error::NotDivisible {
            what,
            value,
            divisor_name,
            divisor,
        });
    }
    Ok(())
}

/// Computes output size for a single dimension in convolution.
///
/// output_size = floor((input_size + pad_before + pad_after - kernel_size) / stride + 1)
#[inline]
pub fn compute_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    pad_before: usize,
    pad_after: usize,
) -> usize {
    let padded_size = input_size + pad_before + pad_after;
    if padded_size < kernel_size {
        0
    } else {
        (padded_size - kernel_size) / stride + 1
    }
}

/// Computes padding values for "same" padding mode.
///
/// When stride > 1, output_size = ceil(input_size / stride).
#[inline]
pub fn compute_same_padding(input_size: usize, kernel_size: usize, stride: usize) -> (usize, usize) {
    let output_size = input_size.div_ceil(stride);
    let total_pad = if output_size > 0 {
        let needed = (output_size - 1) * stride + kernel_size;
        needed.saturating_sub(input_size)
    } else {
        0
    };
    let pad_before = total_pad / 2;
    (pad_before, total_pad - pad_before)
}

/// Resolves a padding mode to explicit padding for a square filter.
pub fn resolve_padding(
    padding: PaddingMode,
    input_h: usize,
    input_w: usize,
    filter_size: usize,
    stride: usize,
) -> Padding {
    match padding {
        PaddingMode::Valid => Padding::default(),
        PaddingMode::Same => {
            let (top, bottom) = compute_same_padding(input_h, filter_size, stride);
            let (left, right) = compute_same_padding(input_w, filter_size, stride);
            Padding {
                top,
                bottom,
                left,
                right,
            }
        }
        PaddingMode::Custom(top, bottom, left, right) => Padding {
            top,
            bottom,
            left,
            right,
        },
    }
}

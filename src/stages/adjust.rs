use crate::dtype::Element;
use crate::error::{Error, Result};

/// Nonlinearity applied after the affine part of an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Activation {
    /// No activation
    #[default]
    Identity,
    /// `max(0, x)`
    Relu,
    /// `x` for `x >= 0`, `slope * x` otherwise
    LeakyRelu {
        /// Negative-side slope
        slope: f64,
    },
}

impl Activation {
    /// Apply the activation to one value.
    #[inline]
    pub fn apply<T: Element>(self, x: T) -> T {
        match self {
            Activation::Identity => x,
            Activation::Relu => {
                if x < T::zero() {
                    T::zero()
                } else {
                    x
                }
            }
            Activation::LeakyRelu { slope } => {
                if x < T::zero() {
                    T::from_f64(x.to_f64() * slope)
                } else {
                    x
                }
            }
        }
    }
}

/// Per-channel batch-norm style adjustment.
///
/// One row of four values per channel: mean, inverse square root of the
/// variance, bias, and a reserved slot that is carried but never read.
/// Rows are indexed by absolute channel number.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentTable<T: Element> {
    rows: Vec<[T; 4]>,
    activation: Activation,
}

impl<T: Element> AdjustmentTable<T> {
    /// Table from explicit `[mean, inv_sqrt_var, bias, reserved]` rows.
    pub fn new(rows: Vec<[T; 4]>, activation: Activation) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::invalid_argument(
                "rows",
                "adjustment table needs at least one channel",
            ));
        }
        Ok(Self { rows, activation })
    }

    /// `(x - 0) * 1 + 0` for every channel.
    pub fn identity(channels: usize) -> Self {
        Self {
            rows: vec![[T::zero(), T::one(), T::zero(), T::zero()]; channels],
            activation: Activation::Identity,
        }
    }

    /// Table from separate per-channel columns.
    pub fn from_columns(
        mean: &[T],
        inv_sqrt_var: &[T],
        bias: &[T],
        activation: Activation,
    ) -> Result<Self> {
        if inv_sqrt_var.len() != mean.len() || bias.len() != mean.len() {
            return Err(Error::shape_mismatch(
                "adjustment columns",
                &[mean.len(), mean.len(), mean.len()],
                &[mean.len(), inv_sqrt_var.len(), bias.len()],
            ));
        }
        let rows = mean
            .iter()
            .zip(inv_sqrt_var)
            .zip(bias)
            .map(|((&m, &s), &b)| [m, s, b, T::zero()])
            .collect();
        Self::new(rows, activation)
    }

    /// Replace the activation.
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Number of channels covered.
    #[inline]
    pub fn channels(&self) -> usize {
        self.rows.len()
    }

    /// Activation applied after the affine step.
    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Raw row of `channel`.
    #[inline]
    pub fn row(&self, channel: usize) -> &[T; 4] {
        &self.rows[channel]
    }

    /// `act((sum - mean) * inv_sqrt_var + bias)` for one channel.
    #[inline]
    pub fn adjust_value(&self, sum: T, channel: usize) -> T {
        let [mean, inv_sqrt_var, bias, _] = self.rows[channel];
        let scaled = sum.sub_wrapping(mean).mul_wrapping(inv_sqrt_var);
        self.activation.apply(scaled.add_wrapping(bias))
    }

    /// Adjust a group of sums whose first lane is absolute channel
    /// `first_channel`.
    pub fn adjust(&self, sums: &[T], first_channel: usize, out: &mut [T]) {
        debug_assert_eq!(sums.len(), out.len());
        debug_assert!(first_channel + sums.len() <= self.rows.len());
        for (lane, (o, &s)) in out.iter_mut().zip(sums).enumerate() {
            *o = self.adjust_value(s, first_channel + lane);
        }
    }
}

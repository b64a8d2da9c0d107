//! Aggregation after adjustment
//!
//! An [`Aggregator`] holds the only state that survives between iterations.
//! Its behavior is fixed when it is built:
//!
//! - [`Aggregator::PassThrough`] emits every group immediately.
//! - [`Aggregator::MaxPool`] keeps one running maximum per lane for the
//!   current pooling window.
//! - [`Aggregator::RunningSum`] keeps one running sum per second-stage output
//!   channel of a fused layer, adjusts the sums on commit and clears them.

use crate::dtype::Element;
use crate::error::Result;
use crate::index::IndexStep;
use crate::layer::validate::validate_positive;
use crate::stages::AdjustmentTable;

/// Control flags for one [`Aggregator::accept`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregateFlags {
    /// Incoming values start a new aggregate
    pub reset: bool,
    /// The aggregate is complete after this call
    pub commit: bool,
}

impl AggregateFlags {
    /// Flags from explicit values.
    #[inline]
    pub const fn new(reset: bool, commit: bool) -> Self {
        Self { reset, commit }
    }

    /// Every call is a complete aggregate of its own.
    pub const IMMEDIATE: Self = Self::new(true, true);

    /// The step's overall reset/commit flags.
    #[inline]
    pub fn from_step(step: &IndexStep) -> Self {
        Self::new(step.reset_aggregate, step.commit)
    }
}

/// Running aggregate with a fixed behavior.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator<T: Element> {
    /// Values are final as soon as they arrive.
    PassThrough {
        /// Last group received
        current: Vec<T>,
    },
    /// Running per-lane maximum over a pooling window.
    MaxPool {
        /// Maximum so far in the current window
        max: Vec<T>,
    },
    /// Running per-channel sum across fusion slices.
    RunningSum {
        /// Sum so far for the current position
        sums: Vec<T>,
        /// Post-add sums of the most recent commit
        raw: Vec<T>,
        /// Adjusted values of the most recent commit
        adjusted: Vec<T>,
        /// Adjustment applied on commit
        table: AdjustmentTable<T>,
    },
}

impl<T: Element> Aggregator<T> {
    /// Pass-through over `width` lanes.
    pub fn pass_through(width: usize) -> Result<Self> {
        validate_positive(width, "aggregate_width")?;
        Ok(Self::PassThrough {
            current: vec![T::zero(); width],
        })
    }

    /// Max pooling over `width` lanes.
    pub fn max_pool(width: usize) -> Result<Self> {
        validate_positive(width, "aggregate_width")?;
        Ok(Self::MaxPool {
            max: vec![T::zero(); width],
        })
    }

    /// Running sum with one lane per row of `table`.
    pub fn running_sum(table: AdjustmentTable<T>) -> Self {
        let width = table.channels();
        Self::RunningSum {
            sums: vec![T::zero(); width],
            raw: vec![T::zero(); width],
            adjusted: vec![T::zero(); width],
            table,
        }
    }

    /// Number of lanes `accept` expects.
    pub fn width(&self) -> usize {
        self.state().len()
    }

    /// Behavior name for log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PassThrough { .. } => "pass-through",
            Self::MaxPool { .. } => "max-pool",
            Self::RunningSum { .. } => "running-sum",
        }
    }

    /// Fold `values` into the aggregate.
    ///
    /// Returns the final values when `flags.commit` is set. For
    /// [`RunningSum`](Self::RunningSum) these are the adjusted sums, and the
    /// running state is zero again when this returns.
    pub fn accept(&mut self, values: &[T], flags: AggregateFlags) -> Option<&[T]> {
        debug_assert_eq!(values.len(), self.width(), "aggregate lanes");

        match self {
            Self::PassThrough { current } => {
                current.copy_from_slice(values);
                flags.commit.then_some(current.as_slice())
            }
            Self::MaxPool { max } => {
                for (m, &v) in max.iter_mut().zip(values) {
                    // The first sample of a window is taken without comparing.
                    if flags.reset || v > *m {
                        *m = v;
                    }
                }
                flags.commit.then_some(max.as_slice())
            }
            Self::RunningSum {
                sums,
                raw,
                adjusted,
                table,
            } => {
                for (s, &v) in sums.iter_mut().zip(values) {
                    *s = if flags.reset { v } else { s.add_wrapping(v) };
                }
                if !flags.commit {
                    return None;
                }
                raw.copy_from_slice(sums);
                table.adjust(raw, 0, adjusted);
                sums.fill(T::zero());
                Some(adjusted.as_slice())
            }
        }
    }

    /// Current running aggregate.
    pub fn state(&self) -> &[T] {
        match self {
            Self::PassThrough { current } => current,
            Self::MaxPool { max } => max,
            Self::RunningSum { sums, .. } => sums,
        }
    }

    /// Unadjusted sums of the most recent running-sum commit.
    pub fn last_raw(&self) -> Option<&[T]> {
        match self {
            Self::RunningSum { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Second-stage adjustment of a running-sum aggregator.
    pub fn adjustment(&self) -> Option<&AdjustmentTable<T>> {
        match self {
            Self::RunningSum { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Clear all state back to zero.
    pub fn reset(&mut self) {
        match self {
            Self::PassThrough { current } => current.fill(T::zero()),
            Self::MaxPool { max } => max.fill(T::zero()),
            Self::RunningSum {
                sums,
                raw,
                adjusted,
                ..
            } => {
                sums.fill(T::zero());
                raw.fill(T::zero());
                adjusted.fill(T::zero());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Activation;

    fn window_flags(p: usize) -> Vec<AggregateFlags> {
        (0..p * p)
            .map(|s| AggregateFlags::new(s == 0, s == p * p - 1))
            .collect()
    }

    #[test]
    fn test_max_pool_window() {
        let mut agg = Aggregator::<i32>::max_pool(1).unwrap();
        let mut running = Vec::new();
        let mut committed = Vec::new();
        for (v, flags) in [3, 7, 2, 5].into_iter().zip(window_flags(2)) {
            if let Some(out) = agg.accept(&[v], flags) {
                committed.push(out[0]);
            }
            running.push(agg.state()[0]);
        }
        assert_eq!(running, vec![3, 7, 7, 7]);
        assert_eq!(committed, vec![7]);
    }

    #[test]
    fn test_max_pool_reset_ignores_stale_max() {
        let mut agg = Aggregator::<f32>::max_pool(2).unwrap();
        agg.accept(&[100.0, 100.0], AggregateFlags::IMMEDIATE);
        let out = agg.accept(&[-5.0, 1.0], AggregateFlags::new(true, true));
        assert_eq!(out, Some(&[-5.0, 1.0][..]));
    }

    #[test]
    fn test_max_pool_ties_keep_value() {
        let mut agg = Aggregator::<i16>::max_pool(1).unwrap();
        agg.accept(&[4], AggregateFlags::new(true, false));
        agg.accept(&[4], AggregateFlags::new(false, false));
        assert_eq!(agg.accept(&[1], AggregateFlags::new(false, true)), Some(&[4][..]));
    }

    #[test]
    fn test_running_sum_commits_on_last_slice() {
        let table = AdjustmentTable::from_columns(&[1.0f64], &[2.0], &[0.5], Activation::Identity)
            .unwrap();
        let mut agg = Aggregator::running_sum(table);
        let parts = [2.0, 3.0, 5.0, 1.0];
        let mut commits = Vec::new();
        for (k, &v) in parts.iter().enumerate() {
            let flags = AggregateFlags::new(k == 0, k == 3);
            commits.push(agg.accept(&[v], flags).map(|out| out[0]));
        }
        // (11 - 1) * 2 + 0.5
        assert_eq!(commits, vec![None, None, None, Some(20.5)]);
        assert_eq!(agg.last_raw(), Some(&[11.0][..]));
        assert_eq!(agg.state(), &[0.0]);
        assert_eq!(agg.adjustment().map(|t| t.channels()), Some(1));
    }

    #[test]
    fn test_pass_through() {
        let mut agg = Aggregator::<i64>::pass_through(3).unwrap();
        assert_eq!(
            agg.accept(&[1, 2, 3], AggregateFlags::IMMEDIATE),
            Some(&[1, 2, 3][..])
        );
        assert!(agg.last_raw().is_none());
        assert_eq!(agg.kind(), "pass-through");
    }

    #[test]
    fn test_zero_width_rejected() {
        assert!(Aggregator::<f32>::max_pool(0).is_err());
        assert!(Aggregator::<f32>::pass_through(0).is_err());
    }
}

//! Output traversal state machines
//!
//! Each layer family visits its output space in a fixed nested order, one
//! [`IndexStep`] per pipeline iteration. The order is chosen so that the
//! aggregator only ever needs state for one output in flight:
//!
//! ```text
//! Plain        k → j → i                      (k fastest)
//! Pooled       j_p → i_p → k → j/P → i/P      (whole P×P window per group)
//! Fused        k → j → i                      (k walks intermediate groups)
//! FusedPooled  k → j_p → i_p → j/P → i/P
//! ```
//!
//! All generators are cyclic: after the outermost counter wraps, the next
//! pass reproduces the identical sequence. Calling `next()` never fails.
//!
//! ```
//! use convflow::index::{PooledIndexer, Traversal};
//!
//! let mut traversal = PooledIndexer::new(1, 1, 1, 2).unwrap();
//! let offsets: Vec<_> = traversal
//!     .pass()
//!     .map(|s| (s.input.row, s.input.col))
//!     .collect();
//! assert_eq!(offsets, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
//! ```

mod fused;
mod fused_pooled;
mod plain;
mod pooled;

pub use fused::FusedIndexer;
pub use fused_pooled::FusedPooledIndexer;
pub use plain::PlainIndexer;
pub use pooled::PooledIndexer;

use crate::error::Result;
use crate::layer::{LayerParams, Variant};

/// One group of output channels at one spatial position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutputCoordinate {
    /// Row
    pub row: usize,
    /// Column
    pub col: usize,
    /// Channel group index
    pub channel_group: usize,
}

impl OutputCoordinate {
    /// Create a coordinate.
    #[inline]
    pub const fn new(row: usize, col: usize, channel_group: usize) -> Self {
        Self {
            row,
            col,
            channel_group,
        }
    }
}

/// Position inside a P×P pooling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolingSubPosition {
    /// Row offset within the window
    pub row_offset: usize,
    /// Column offset within the window
    pub col_offset: usize,
    /// Window side P
    pub factor: usize,
}

impl PoolingSubPosition {
    /// First sample of the window.
    #[inline]
    pub fn is_first(&self) -> bool {
        self.row_offset == 0 && self.col_offset == 0
    }

    /// Last sample of the window.
    #[inline]
    pub fn is_last(&self) -> bool {
        self.row_offset == self.factor - 1 && self.col_offset == self.factor - 1
    }
}

/// Which intermediate channel slice a fused step folds in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FusionSubIndex {
    /// Slice index `k`
    pub k: usize,
    /// Number of slices per output position
    pub steps: usize,
}

impl FusionSubIndex {
    /// First slice of a fusion pass.
    #[inline]
    pub fn is_first(&self) -> bool {
        self.k == 0
    }

    /// Last slice of a fusion pass.
    #[inline]
    pub fn is_last(&self) -> bool {
        self.k + 1 == self.steps
    }
}

/// Everything one pipeline iteration needs to know about where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStep {
    /// Coordinate whose input window and filters are read. For pooled
    /// layers this is the un-pooled convolution position; for fused layers
    /// `channel_group` is the intermediate slice `k`.
    pub input: OutputCoordinate,
    /// Final output coordinate the aggregate belongs to
    pub output: OutputCoordinate,
    /// Pooling window position (pooled families only)
    pub pool: Option<PoolingSubPosition>,
    /// Fusion slice (fused families only)
    pub fusion: Option<FusionSubIndex>,
    /// First contribution to the output's aggregate
    pub reset_aggregate: bool,
    /// Last contribution; the output is final after this step
    pub commit: bool,
}

impl IndexStep {
    /// The fused running sum is complete at this step.
    #[inline]
    pub fn fusion_commit(&self) -> bool {
        self.fusion.is_none_or(|f| f.is_last())
    }

    /// This step starts a pooling window.
    #[inline]
    pub fn pool_reset(&self) -> bool {
        self.pool.is_none_or(|p| p.is_first())
    }

    /// This step ends a pooling window.
    #[inline]
    pub fn pool_commit(&self) -> bool {
        self.pool.is_none_or(|p| p.is_last())
    }
}

/// A cyclic output traversal.
pub trait Traversal {
    /// Return the current step and advance.
    fn next(&mut self) -> IndexStep;

    /// Rewind to the first step.
    fn reset(&mut self);

    /// Steps in one complete pass.
    fn total_iterations(&self) -> usize;

    /// Iterate over one complete pass starting from the current state.
    fn pass(&mut self) -> Pass<'_, Self>
    where
        Self: Sized,
    {
        let remaining = self.total_iterations();
        Pass {
            generator: self,
            remaining,
        }
    }
}

/// Iterator over a fixed number of traversal steps.
#[derive(Debug)]
pub struct Pass<'a, G: Traversal> {
    generator: &'a mut G,
    remaining: usize,
}

impl<G: Traversal> Iterator for Pass<'_, G> {
    type Item = IndexStep;

    fn next(&mut self) -> Option<IndexStep> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.generator.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<G: Traversal> ExactSizeIterator for Pass<'_, G> {}

/// Traversal for any layer family, selected from [`LayerParams`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexGenerator {
    /// Plain layers
    Plain(PlainIndexer),
    /// Max-pooled layers
    Pooled(PooledIndexer),
    /// Fused convolution pairs
    Fused(FusedIndexer),
    /// Fused convolution pairs followed by max pooling
    FusedPooled(FusedPooledIndexer),
}

impl IndexGenerator {
    /// Build the traversal matching `params.variant()`.
    pub fn for_layer(params: &LayerParams) -> Result<Self> {
        let (h, w) = (params.output_height, params.output_width);
        Ok(match params.variant() {
            Variant::Plain => Self::Plain(PlainIndexer::new(h, w, params.channel_groups())?),
            Variant::Pooled => Self::Pooled(PooledIndexer::new(
                h,
                w,
                params.channel_groups(),
                params.pooling_factor,
            )?),
            Variant::Fused => Self::Fused(FusedIndexer::new(h, w, params.fusion_steps())?),
            Variant::FusedPooled => Self::FusedPooled(FusedPooledIndexer::new(
                h,
                w,
                params.pooling_factor,
                params.fusion_steps(),
            )?),
        })
    }

    fn inner(&mut self) -> &mut dyn Traversal {
        match self {
            Self::Plain(g) => g,
            Self::Pooled(g) => g,
            Self::Fused(g) => g,
            Self::FusedPooled(g) => g,
        }
    }
}

impl Traversal for IndexGenerator {
    #[inline]
    fn next(&mut self) -> IndexStep {
        self.inner().next()
    }

    fn reset(&mut self) {
        self.inner().reset()
    }

    fn total_iterations(&self) -> usize {
        match self {
            Self::Plain(g) => g.total_iterations(),
            Self::Pooled(g) => g.total_iterations(),
            Self::Fused(g) => g.total_iterations(),
            Self::FusedPooled(g) => g.total_iterations(),
        }
    }
}

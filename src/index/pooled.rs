use super::{IndexStep, OutputCoordinate, PoolingSubPosition, Traversal};
use crate::error::Result;
use crate::layer::validate::validate_positive;

/// Traversal that completes one P×P pooling window before moving on.
///
/// Counters from fastest to slowest: `j_p`, `i_p`, `k`, then the window base
/// column (`j` by P, tied to `j_out`) and row (`i` by P, tied to `i_out`).
/// A window's running maximum can then be kept in a single register per
/// channel, since no two windows are ever in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PooledIndexer {
    height: usize,
    width: usize,
    channel_groups: usize,
    factor: usize,
    i: usize,
    j: usize,
    k: usize,
    i_out: usize,
    j_out: usize,
    i_p: usize,
    j_p: usize,
}

impl PooledIndexer {
    /// `height × width` are the pooled output dimensions.
    pub fn new(height: usize, width: usize, channel_groups: usize, factor: usize) -> Result<Self> {
        validate_positive(height, "height")?;
        validate_positive(width, "width")?;
        validate_positive(channel_groups, "channel_groups")?;
        validate_positive(factor, "pooling_factor")?;
        Ok(Self {
            height,
            width,
            channel_groups,
            factor,
            i: 0,
            j: 0,
            k: 0,
            i_out: 0,
            j_out: 0,
            i_p: 0,
            j_p: 0,
        })
    }

    /// Pooling window side.
    #[inline]
    pub fn factor(&self) -> usize {
        self.factor
    }
}

impl Traversal for PooledIndexer {
    fn next(&mut self) -> IndexStep {
        let sub = PoolingSubPosition {
            row_offset: self.i_p,
            col_offset: self.j_p,
            factor: self.factor,
        };
        let step = IndexStep {
            input: OutputCoordinate::new(self.i + self.i_p, self.j + self.j_p, self.k),
            output: OutputCoordinate::new(self.i_out, self.j_out, self.k),
            pool: Some(sub),
            fusion: None,
            reset_aggregate: sub.is_first(),
            commit: sub.is_last(),
        };

        self.j_p += 1;
        if self.j_p == self.factor {
            self.j_p = 0;
            self.i_p += 1;
            if self.i_p == self.factor {
                self.i_p = 0;
                self.k += 1;
                if self.k == self.channel_groups {
                    self.k = 0;
                    self.j += self.factor;
                    self.j_out += 1;
                    if self.j_out == self.width {
                        self.j = 0;
                        self.j_out = 0;
                        self.i += self.factor;
                        self.i_out += 1;
                        if self.i_out == self.height {
                            self.i = 0;
                            self.i_out = 0;
                        }
                    }
                }
            }
        }

        step
    }

    fn reset(&mut self) {
        self.i = 0;
        self.j = 0;
        self.k = 0;
        self.i_out = 0;
        self.j_out = 0;
        self.i_p = 0;
        self.j_p = 0;
    }

    fn total_iterations(&self) -> usize {
        self.height * self.width * self.channel_groups * self.factor * self.factor
    }
}

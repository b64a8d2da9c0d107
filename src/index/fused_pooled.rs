use super::{FusionSubIndex, IndexStep, OutputCoordinate, PoolingSubPosition, Traversal};
use crate::error::Result;
use crate::layer::validate::validate_positive;

/// Traversal for a fused pair whose second layer is max-pooled.
///
/// Counters from fastest to slowest: `k`, `j_p`, `i_p`, then the pooled
/// column and row. Each sub-position finishes its fused sum before the
/// pooling window moves, so the running sum feeds the running maximum
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedPooledIndexer {
    height: usize,
    width: usize,
    factor: usize,
    steps: usize,
    i_out: usize,
    j_out: usize,
    i_p: usize,
    j_p: usize,
    k: usize,
}

impl FusedPooledIndexer {
    /// `height × width` are the pooled output dimensions.
    pub fn new(height: usize, width: usize, factor: usize, steps: usize) -> Result<Self> {
        validate_positive(height, "height")?;
        validate_positive(width, "width")?;
        validate_positive(factor, "pooling_factor")?;
        validate_positive(steps, "fusion_steps")?;
        Ok(Self {
            height,
            width,
            factor,
            steps,
            i_out: 0,
            j_out: 0,
            i_p: 0,
            j_p: 0,
            k: 0,
        })
    }
}

impl Traversal for FusedPooledIndexer {
    fn next(&mut self) -> IndexStep {
        let pool = PoolingSubPosition {
            row_offset: self.i_p,
            col_offset: self.j_p,
            factor: self.factor,
        };
        let fusion = FusionSubIndex {
            k: self.k,
            steps: self.steps,
        };
        let step = IndexStep {
            input: OutputCoordinate::new(
                self.i_out * self.factor + self.i_p,
                self.j_out * self.factor + self.j_p,
                self.k,
            ),
            output: OutputCoordinate::new(self.i_out, self.j_out, 0),
            pool: Some(pool),
            fusion: Some(fusion),
            reset_aggregate: pool.is_first() && fusion.is_first(),
            commit: pool.is_last() && fusion.is_last(),
        };

        self.k += 1;
        if self.k == self.steps {
            self.k = 0;
            self.j_p += 1;
            if self.j_p == self.factor {
                self.j_p = 0;
                self.i_p += 1;
                if self.i_p == self.factor {
                    self.i_p = 0;
                    self.j_out += 1;
                    if self.j_out == self.width {
                        self.j_out = 0;
                        self.i_out += 1;
                        if self.i_out == self.height {
                            self.i_out = 0;
                        }
                    }
                }
            }
        }

        step
    }

    fn reset(&mut self) {
        self.i_out = 0;
        self.j_out = 0;
        self.i_p = 0;
        self.j_p = 0;
        self.k = 0;
    }

    fn total_iterations(&self) -> usize {
        self.height * self.width * self.factor * self.factor * self.steps
    }
}

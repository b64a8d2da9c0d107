use super::{FusionSubIndex, IndexStep, OutputCoordinate, Traversal};
use crate::error::Result;
use crate::layer::validate::validate_positive;

/// Traversal for a fused convolution pair.
///
/// `k` walks the intermediate channel slices of one spatial position; the
/// second-layer outputs at that position accumulate across all `k` and are
/// written once, when `k` reaches its last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedIndexer {
    height: usize,
    width: usize,
    steps: usize,
    i: usize,
    j: usize,
    k: usize,
}

impl FusedIndexer {
    /// `steps` is the number of intermediate slices per position.
    pub fn new(height: usize, width: usize, steps: usize) -> Result<Self> {
        validate_positive(height, "height")?;
        validate_positive(width, "width")?;
        validate_positive(steps, "fusion_steps")?;
        Ok(Self {
            height,
            width,
            steps,
            i: 0,
            j: 0,
            k: 0,
        })
    }
}

impl Traversal for FusedIndexer {
    fn next(&mut self) -> IndexStep {
        let fusion = FusionSubIndex {
            k: self.k,
            steps: self.steps,
        };
        let step = IndexStep {
            input: OutputCoordinate::new(self.i, self.j, self.k),
            output: OutputCoordinate::new(self.i, self.j, 0),
            pool: None,
            fusion: Some(fusion),
            reset_aggregate: fusion.is_first(),
            commit: fusion.is_last(),
        };

        self.k += 1;
        if self.k == self.steps {
            self.k = 0;
            self.j += 1;
            if self.j == self.width {
                self.j = 0;
                self.i += 1;
                if self.i == self.height {
                    self.i = 0;
                }
            }
        }

        step
    }

    fn reset(&mut self) {
        self.i = 0;
        self.j = 0;
        self.k = 0;
    }

    fn total_iterations(&self) -> usize {
        self.height * self.width * self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_on_last_slice() {
        let mut traversal = FusedIndexer::new(1, 2, 4).unwrap();
        let steps: Vec<_> = traversal.pass().collect();
        let commits: Vec<_> = steps.iter().map(|s| s.commit).collect();
        assert_eq!(
            commits,
            vec![false, false, false, true, false, false, false, true]
        );
        let resets: Vec<_> = steps.iter().map(|s| s.reset_aggregate).collect();
        assert_eq!(
            resets,
            vec![true, false, false, false, true, false, false, false]
        );
    }

    #[test]
    fn test_slice_runs_fastest() {
        let mut traversal = FusedIndexer::new(2, 1, 2).unwrap();
        let seen: Vec<_> = traversal
            .pass()
            .map(|s| (s.input.row, s.input.col, s.input.channel_group))
            .collect();
        assert_eq!(seen, vec![(0, 0, 0), (0, 0, 1), (1, 0, 0), (1, 0, 1)]);
    }

    #[test]
    fn test_single_step_commits_every_iteration() {
        let mut traversal = FusedIndexer::new(2, 2, 1).unwrap();
        assert!(traversal.pass().all(|s| s.reset_aggregate && s.commit));
    }
}

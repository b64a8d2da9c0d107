use super::{IndexStep, OutputCoordinate, Traversal};
use crate::error::Result;
use crate::layer::validate::validate_positive;

/// Row-major traversal with the channel group varying fastest.
///
/// Every step is both the first and the last contribution to its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainIndexer {
    height: usize,
    width: usize,
    channel_groups: usize,
    i: usize,
    j: usize,
    k: usize,
}

impl PlainIndexer {
    /// Traverse `height × width × channel_groups`.
    pub fn new(height: usize, width: usize, channel_groups: usize) -> Result<Self> {
        validate_positive(height, "height")?;
        validate_positive(width, "width")?;
        validate_positive(channel_groups, "channel_groups")?;
        Ok(Self {
            height,
            width,
            channel_groups,
            i: 0,
            j: 0,
            k: 0,
        })
    }
}

impl Traversal for PlainIndexer {
    fn next(&mut self) -> IndexStep {
        let coord = OutputCoordinate::new(self.i, self.j, self.k);

        self.k += 1;
        if self.k == self.channel_groups {
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

        IndexStep {
            input: coord,
            output: coord,
            pool: None,
            fusion: None,
            reset_aggregate: true,
            commit: true,
        }
    }

    fn reset(&mut self) {
        self.i = 0;
        self.j = 0;
        self.k = 0;
    }

    fn total_iterations(&self) -> usize {
        self.height * self.width * self.channel_groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_order() {
        let mut traversal = PlainIndexer::new(2, 2, 2).unwrap();
        let coords: Vec<_> = traversal
            .pass()
            .map(|s| (s.output.row, s.output.col, s.output.channel_group))
            .collect();
        assert_eq!(
            coords,
            vec![
                (0, 0, 0),
                (0, 0, 1),
                (0, 1, 0),
                (0, 1, 1),
                (1, 0, 0),
                (1, 0, 1),
                (1, 1, 0),
                (1, 1, 1),
            ]
        );
    }

    #[test]
    fn test_wraps_to_origin() {
        let mut traversal = PlainIndexer::new(1, 2, 3).unwrap();
        for _ in 0..6 {
            traversal.next();
        }
        assert_eq!(traversal.next().output, OutputCoordinate::new(0, 0, 0));
    }

    #[test]
    fn test_reset_mid_pass() {
        let mut traversal = PlainIndexer::new(3, 3, 1).unwrap();
        traversal.next();
        traversal.next();
        traversal.reset();
        assert_eq!(traversal.next().output, OutputCoordinate::new(0, 0, 0));
    }

    #[test]
    fn test_zero_bound_rejected() {
        assert!(PlainIndexer::new(0, 1, 1).is_err());
        assert!(PlainIndexer::new(1, 1, 0).is_err());
    }
}

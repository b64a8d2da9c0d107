//! Reduction stage kinds and validated stage plans.

use crate::error::{Error, Result};

/// Inputs wider than this get an interleaved first stage in [`ReductionPlan::auto`].
const INTERLEAVE_THRESHOLD: usize = 256;

/// Partial-sum lanes of the interleaved first stage chosen by [`ReductionPlan::auto`].
const AUTO_INTERLEAVE_LANES: usize = 16;

/// Width at which [`ReductionPlan::pairwise`] hands over to the final stage.
const FINAL_STAGE_WIDTH: usize = 4;

/// One narrowing stage of a reduction tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionStage {
    /// Split the input into words of `word` values (the last word is padded
    /// with zeros) and reduce each word with a balanced pairwise tree.
    ///
    /// Output length: `ceil(n / word)`.
    Tree {
        /// Values per word, at least 2
        word: usize,
    },
    /// Keep `lanes` running partial sums; value `x` is added to lane
    /// `x % lanes`. A ragged final stride contributes zeros.
    ///
    /// Output length: `lanes`.
    Interleaved {
        /// Number of partial sums, at least 1
        lanes: usize,
    },
}

impl ReductionStage {
    /// Output length of this stage for an input of `len` values.
    #[inline]
    pub fn output_len(&self, len: usize) -> usize {
        match *self {
            ReductionStage::Tree { word } => len.div_ceil(word),
            ReductionStage::Interleaved { lanes } => lanes,
        }
    }
}

/// How the values left after the narrowing stages become one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalStage {
    /// Left-to-right running sum
    #[default]
    Linear,
    /// Balanced pairwise tree
    Tree,
}

/// A validated sequence of stages reducing `input_len` values to one.
///
/// Every stage strictly shrinks its input. The widths of the intermediate
/// partial-sum sets are available through [`stage_lengths`](Self::stage_lengths).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionPlan {
    input_len: usize,
    stages: Vec<ReductionStage>,
    final_stage: FinalStage,
    lengths: Vec<usize>,
}

impl ReductionPlan {
    /// Validate an explicit stage list for inputs of `input_len` values.
    pub fn new(
        input_len: usize,
        stages: Vec<ReductionStage>,
        final_stage: FinalStage,
    ) -> Result<Self> {
        if input_len == 0 {
            return Err(Error::invalid_argument(
                "input_len",
                "a reduction tree needs at least one input",
            ));
        }

        let mut lengths = Vec::with_capacity(stages.len() + 2);
        lengths.push(input_len);
        let mut len = input_len;
        for (i, stage) in stages.iter().enumerate() {
            match *stage {
                ReductionStage::Tree { word } if word < 2 => {
                    return Err(Error::invalid_plan(
                        i,
                        format!("tree word size must be at least 2, got {}", word),
                    ));
                }
                ReductionStage::Interleaved { lanes: 0 } => {
                    return Err(Error::invalid_plan(i, "interleaved stage needs at least 1 lane"));
                }
                _ => {}
            }
            let out = stage.output_len(len);
            if out >= len {
                return Err(Error::invalid_plan(
                    i,
                    format!("{:?} does not shrink {} values (produces {})", stage, len, out),
                ));
            }
            lengths.push(out);
            len = out;
        }
        if len > 1 {
            lengths.push(1);
        }

        Ok(Self {
            input_len,
            stages,
            final_stage,
            lengths,
        })
    }

    /// Width-2 tree stages until at most four values remain, then a linear sum.
    pub fn pairwise(input_len: usize) -> Result<Self> {
        let mut stages = Vec::new();
        let mut len = input_len;
        while len > FINAL_STAGE_WIDTH {
            stages.push(ReductionStage::Tree { word: 2 });
            len = len.div_ceil(2);
        }
        Self::new(input_len, stages, FinalStage::Linear)
    }

    /// Default plan: wide inputs are first folded into interleaved partial
    /// sums, the rest is reduced pairwise.
    pub fn auto(input_len: usize) -> Result<Self> {
        if input_len <= INTERLEAVE_THRESHOLD {
            return Self::pairwise(input_len);
        }
        let mut stages = vec![ReductionStage::Interleaved {
            lanes: AUTO_INTERLEAVE_LANES,
        }];
        let mut len = AUTO_INTERLEAVE_LANES;
        while len > FINAL_STAGE_WIDTH {
            stages.push(ReductionStage::Tree { word: 2 });
            len = len.div_ceil(2);
        }
        Self::new(input_len, stages, FinalStage::Linear)
    }

    /// Number of values the plan reduces.
    #[inline]
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// The narrowing stages, in order.
    #[inline]
    pub fn stages(&self) -> &[ReductionStage] {
        &self.stages
    }

    /// The final stage.
    #[inline]
    pub fn final_stage(&self) -> FinalStage {
        self.final_stage
    }

    /// Lengths of the input, every partial-sum set, and the final scalar.
    ///
    /// Strictly decreasing and ending in 1.
    #[inline]
    pub fn stage_lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Length of the widest intermediate partial-sum set.
    pub(crate) fn max_partial_len(&self) -> usize {
        self.lengths[1..].iter().copied().max().unwrap_or(1)
    }

    /// Largest tree word, used to size the padded word buffer.
    pub(crate) fn max_word(&self) -> usize {
        self.stages
            .iter()
            .filter_map(|s| match s {
                ReductionStage::Tree { word } => Some(*word),
                ReductionStage::Interleaved { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_lengths_ragged() {
        // 27 -> 14 -> 7 -> 4 -> 1
        let plan = ReductionPlan::new(
            27,
            vec![
                ReductionStage::Tree { word: 2 },
                ReductionStage::Tree { word: 2 },
                ReductionStage::Tree { word: 2 },
            ],
            FinalStage::Tree,
        )
        .unwrap();
        assert_eq!(plan.stage_lengths(), &[27, 14, 7, 4, 1]);
    }

    #[test]
    fn test_pairwise_plan() {
        let plan = ReductionPlan::pairwise(32).unwrap();
        assert_eq!(plan.stage_lengths(), &[32, 16, 8, 4, 1]);

        let plan = ReductionPlan::pairwise(3).unwrap();
        assert!(plan.stages().is_empty());
        assert_eq!(plan.stage_lengths(), &[3, 1]);

        let plan = ReductionPlan::pairwise(1).unwrap();
        assert_eq!(plan.stage_lengths(), &[1]);
    }

    #[test]
    fn test_auto_plan_interleaves_wide_inputs() {
        let plan = ReductionPlan::auto(576).unwrap();
        assert_eq!(plan.stages()[0], ReductionStage::Interleaved { lanes: 16 });
        assert_eq!(plan.stage_lengths(), &[576, 16, 8, 4, 1]);
    }

    #[test]
    fn test_rejects_non_shrinking_stage() {
        let err = ReductionPlan::new(
            8,
            vec![ReductionStage::Interleaved { lanes: 8 }],
            FinalStage::Linear,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidReductionPlan { stage: 0, .. }));

        let err = ReductionPlan::new(
            8,
            vec![
                ReductionStage::Tree { word: 4 },
                ReductionStage::Tree { word: 4 },
                ReductionStage::Tree { word: 2 },
            ],
            FinalStage::Linear,
        )
        .unwrap_err();
        // 8 -> 2 -> 1, then a third stage cannot shrink a single value
        assert!(matches!(err, Error::InvalidReductionPlan { stage: 2, .. }));
    }

    #[test]
    fn test_rejects_degenerate_words() {
        assert!(
            ReductionPlan::new(8, vec![ReductionStage::Tree { word: 1 }], FinalStage::Linear)
                .is_err()
        );
        assert!(
            ReductionPlan::new(8, vec![ReductionStage::Interleaved { lanes: 0 }], FinalStage::Linear)
                .is_err()
        );
        assert!(ReductionPlan::new(0, vec![], FinalStage::Linear).is_err());
    }
}

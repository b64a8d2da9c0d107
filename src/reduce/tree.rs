//! Staged reduction of a fixed-length vector to one scalar.

use super::plan::{FinalStage, ReductionPlan, ReductionStage};
use crate::dtype::Element;
use crate::error::{Error, Result};

/// Reduces vectors of a fixed length to their sum through a [`ReductionPlan`].
///
/// Scratch buffers are allocated once at construction; [`reduce`](Self::reduce)
/// does not allocate.
#[derive(Debug, Clone)]
pub struct ReductionTree<T: Element> {
    plan: ReductionPlan,
    front: Vec<T>,
    back: Vec<T>,
    word: Vec<T>,
}

impl<T: Element> ReductionTree<T> {
    /// Build a tree executing `plan`.
    pub fn new(plan: ReductionPlan) -> Self {
        let partial = plan.max_partial_len();
        let word = plan.max_word();
        Self {
            plan,
            front: vec![T::zero(); partial],
            back: vec![T::zero(); partial],
            word: vec![T::zero(); word],
        }
    }

    /// Build a tree with the default plan for `input_len` values.
    pub fn auto(input_len: usize) -> Result<Self> {
        Ok(Self::new(ReductionPlan::auto(input_len)?))
    }

    /// The plan this tree executes.
    #[inline]
    pub fn plan(&self) -> &ReductionPlan {
        &self.plan
    }

    /// Number of values each call reduces.
    #[inline]
    pub fn input_len(&self) -> usize {
        self.plan.input_len()
    }

    /// Sum `input` through the staged tree.
    ///
    /// `input.len()` must equal [`input_len`](Self::input_len); use
    /// [`try_reduce`](Self::try_reduce) when the length is not known to match.
    pub fn reduce(&mut self, input: &[T]) -> T {
        debug_assert_eq!(
            input.len(),
            self.plan.input_len(),
            "reduction tree input length"
        );

        let Self {
            plan,
            front,
            back,
            word,
        } = self;

        let mut len = input.len();
        let mut first = true;
        for stage in plan.stages() {
            let out_len = stage.output_len(len);
            {
                let src: &[T] = if first { input } else { &front[..len] };
                run_stage(*stage, src, &mut back[..out_len], word);
            }
            std::mem::swap(front, back);
            len = out_len;
            first = false;
        }

        let rest: &[T] = if first { input } else { &front[..len] };
        match plan.final_stage() {
            FinalStage::Linear => rest.iter().fold(T::zero(), |acc, &v| acc.add_wrapping(v)),
            FinalStage::Tree => pairwise_sum(rest),
        }
    }

    /// Checked variant of [`reduce`](Self::reduce).
    pub fn try_reduce(&mut self, input: &[T]) -> Result<T> {
        if input.len() != self.plan.input_len() {
            return Err(Error::shape_mismatch(
                "reduction input",
                &[self.plan.input_len()],
                &[input.len()],
            ));
        }
        Ok(self.reduce(input))
    }
}

/// Run one narrowing stage from `src` into `dst`.
fn run_stage<T: Element>(stage: ReductionStage, src: &[T], dst: &mut [T], word_buf: &mut [T]) {
    match stage {
        ReductionStage::Tree { word } => {
            let padded = &mut word_buf[..word];
            for (out, chunk) in dst.iter_mut().zip(src.chunks(word)) {
                padded[..chunk.len()].copy_from_slice(chunk);
                padded[chunk.len()..].fill(T::zero());
                *out = pairwise_sum(padded);
            }
        }
        ReductionStage::Interleaved { lanes } => {
            dst.fill(T::zero());
            for stride in src.chunks(lanes) {
                for (p, psum) in dst.iter_mut().enumerate() {
                    let val = stride.get(p).copied().unwrap_or_else(T::zero);
                    *psum = psum.add_wrapping(val);
                }
            }
        }
    }
}

/// Balanced binary-tree sum.
#[inline]
pub fn pairwise_sum<T: Element>(vals: &[T]) -> T {
    match vals.len() {
        0 => T::zero(),
        1 => vals[0],
        2 => vals[0].add_wrapping(vals[1]),
        n => {
            let (lo, hi) = vals.split_at(n / 2);
            pairwise_sum(lo).add_wrapping(pairwise_sum(hi))
        }
    }
}

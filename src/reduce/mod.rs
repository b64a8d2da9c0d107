//! Staged reduction trees
//!
//! A [`ReductionTree`] sums a fixed-length product vector through a small
//! number of narrowing stages described by a [`ReductionPlan`]:
//!
//! ```text
//! 27 products ──Tree{2}──▶ 14 ──Tree{2}──▶ 7 ──Tree{2}──▶ 4 ──Final──▶ 1
//!                 ▲ last word [p26, 0] is padded with zero
//! ```
//!
//! Stage widths are free choices; every plan yields the sum of all inputs up
//! to the element type's rounding. Ragged words and strides are padded with
//! the additive identity, never with repeated or uninitialized values.
//!
//! [`LaneReducer`] holds one tree per lane of a channel group. Lanes are
//! independent and may be reduced concurrently.

mod lanes;
mod plan;
mod tree;

pub use lanes::{LaneReducer, ParallelismConfig};
pub use plan::{FinalStage, ReductionPlan, ReductionStage};
pub use tree::{ReductionTree, pairwise_sum};

//! # convflow
//!
//! **Streaming evaluation of convolution layers, one channel group at a time.**
//!
//! convflow computes a convolution layer the way a fixed-function dataflow
//! accelerator does: a traversal state machine names the next output group,
//! the input window and filters are multiplied, each lane's products pass
//! through a staged reduction tree, the sums are adjusted per channel and an
//! aggregator either emits them, pools them or folds them into a fused
//! second convolution. Only one output is ever in flight.
//!
//! ## Features
//!
//! - **Four layer families**: plain, max-pooled, fused pointwise pair, and
//!   fused pair followed by pooling, all driven by one [`LayerPipeline`]
//! - **Staged reduction trees**: configurable tree and interleaved stages
//!   with zero padding of ragged tails
//! - **Deterministic traversals**: cyclic index generators that visit every
//!   output coordinate exactly once per pass
//! - **Multiple dtypes**: f64, f32, i64, i32, i16, and f16/bf16 behind a
//!   feature flag
//!
//! ## Quick Start
//!
//! ```
//! use convflow::prelude::*;
//!
//! let params = LayerConfig::new(1, 1, 4).input(1, 1, 8).group_width(4).build()?;
//! let input = FeatureMap::layer_input(&params, (1..=8).collect::<Vec<i32>>())?;
//! let filters = FilterBank::for_layer(&params, vec![1; 32])?;
//! let mut output = FeatureMap::layer_output(&params);
//!
//! let mut pipeline = LayerPipeline::new(
//!     params,
//!     ReductionPlan::pairwise(8)?,
//!     AdjustmentTable::identity(4),
//! )?;
//! pipeline.run(&input, &filters, &mut output)?;
//! assert_eq!(output.as_slice(), &[36, 36, 36, 36]);
//! # Ok::<(), convflow::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): reduce channel-group lanes in parallel
//! - `f16`: Half-precision floats (F16, BF16)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod dtype;
pub mod error;
pub mod index;
pub mod layer;
pub mod pipeline;
pub mod reduce;
pub mod reference;
pub mod stages;
pub mod store;

pub use pipeline::{LayerPipeline, RunSummary};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::{AggregateFlags, Aggregator};
    pub use crate::dtype::{DType, Element};
    pub use crate::error::{Error, Result};
    pub use crate::index::{IndexGenerator, IndexStep, OutputCoordinate, Traversal};
    pub use crate::layer::{LayerConfig, LayerParams, PaddingMode, Variant};
    pub use crate::pipeline::{LayerPipeline, RunSummary, StepOutcome};
    pub use crate::reduce::{
        FinalStage, LaneReducer, ParallelismConfig, ReductionPlan, ReductionStage, ReductionTree,
    };
    pub use crate::stages::{
        Activation, AdjustmentTable, FilterSource, InputSource, OutputSink,
    };
    pub use crate::store::{FeatureMap, FilterBank, PointwiseFilters};
}

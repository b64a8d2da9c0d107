//! In-memory storage implementing the pipeline collaborators
//!
//! - [`FeatureMap`]: dense `height × width × channels` map. Reads a
//!   convolution window ([`InputSource`](crate::stages::InputSource)) and
//!   accepts committed outputs ([`OutputSink`](crate::stages::OutputSink)).
//! - [`FilterBank`]: first-stage filters `[out][fy][fx][in]`.
//! - [`PointwiseFilters`]: second-stage 1×1 filters `[out][l1]` of a fused
//!   layer.

mod feature_map;
mod filters;

pub use feature_map::{DEFAULT_PACK_WIDTH, FeatureMap, WindowGeometry, WriteStats};
pub use filters::{FilterBank, PointwiseFilters};

//! Layer configuration
//!
//! A layer is described once with a [`LayerConfig`] builder and validated into
//! immutable [`LayerParams`]. Every dimension, loop bound and buffer size used
//! by the pipeline derives from `LayerParams`, so configuration mistakes
//! surface here rather than in the middle of a run.
//!
//! # Layer families
//!
//! | Variant | Pooling factor | Fusion | Iterations per pass |
//! |---|---|---|---|
//! | [`Variant::Plain`] | 1 | no | `H * W * C/G` |
//! | [`Variant::Pooled`] | P > 1 | no | `H * W * C/G * P * P` |
//! | [`Variant::Fused`] | 1 | yes | `H * W * L1/G` |
//! | [`Variant::FusedPooled`] | P > 1 | yes | `H * W * P * P * L1/G` |
//!
//! `H`, `W` and `C` are the final output dimensions, `G` the channel-group
//! width and `L1` the channel count of the intermediate (first-stage) feature
//! map of a fused layer.
//!
//! # Example
//!
//! ```
//! use convflow::layer::{LayerConfig, PaddingMode, Variant};
//!
//! let params = LayerConfig::new(14, 14, 32)
//!     .input(28, 28, 16)
//!     .filter(3, 1, PaddingMode::uniform(1))
//!     .group_width(8)
//!     .pooling(2)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(params.variant(), Variant::Pooled);
//! assert_eq!(params.channel_groups(), 4);
//! assert_eq!(params.total_iterations(), 14 * 14 * 4 * 2 * 2);
//! ```

pub mod validate;

pub use validate::{Padding, PaddingMode};

use crate::error::{Error, Result};
use validate::{compute_output_size, resolve_padding, validate_divisible, validate_positive};

/// The four layer families, differing only in traversal and aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// One output group per iteration, written immediately
    Plain,
    /// Max-pooled over a P×P window of convolution outputs
    Pooled,
    /// Convolution followed by a fused pointwise convolution
    Fused,
    /// Fused convolution pair followed by max pooling
    FusedPooled,
}

impl Variant {
    /// Returns the name of the variant for messages.
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Plain => "plain",
            Variant::Pooled => "pooled",
            Variant::Fused => "fused",
            Variant::FusedPooled => "fused-pooled",
        }
    }

    /// Whether a pooling window is traversed
    pub fn is_pooled(&self) -> bool {
        matches!(self, Variant::Pooled | Variant::FusedPooled)
    }

    /// Whether a second pointwise stage is fused in
    pub fn is_fused(&self) -> bool {
        matches!(self, Variant::Fused | Variant::FusedPooled)
    }
}

/// Builder for a layer description.
///
/// Defaults: input equal to the output size with the output's channel
/// count, 1×1 filter, stride 1, no padding, group width 1, no pooling and no
/// fusion.
#[derive(Debug, Clone)]
pub struct LayerConfig {
    name: String,
    output_height: usize,
    output_width: usize,
    output_channels: usize,
    input: Option<(usize, usize, usize)>,
    input_channels_padded: Option<usize>,
    filter_size: usize,
    stride: usize,
    padding: PaddingMode,
    group_width: usize,
    pooling_factor: usize,
    l1_channels: Option<usize>,
}

impl LayerConfig {
    /// Start describing a layer by its final output dimensions.
    pub fn new(output_height: usize, output_width: usize, output_channels: usize) -> Self {
        Self {
            name: String::from("layer"),
            output_height,
            output_width,
            output_channels,
            input: None,
            input_channels_padded: None,
            filter_size: 1,
            stride: 1,
            padding: PaddingMode::Valid,
            group_width: 1,
            pooling_factor: 1,
            l1_channels: None,
        }
    }

    /// Name used in log messages.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Input feature map dimensions.
    pub fn input(mut self, height: usize, width: usize, channels: usize) -> Self {
        self.input = Some((height, width, channels));
        self
    }

    /// Stored channel count of the input map when it is padded with unused
    /// channels (for example 3 channels stored as 4).
    pub fn input_channels_padded(mut self, channels: usize) -> Self {
        self.input_channels_padded = Some(channels);
        self
    }

    /// Square filter size, stride and padding of the (first) convolution.
    pub fn filter(mut self, size: usize, stride: usize, padding: PaddingMode) -> Self {
        self.filter_size = size;
        self.stride = stride;
        self.padding = padding;
        self
    }

    /// Number of channels processed together per iteration.
    pub fn group_width(mut self, width: usize) -> Self {
        self.group_width = width;
        self
    }

    /// P×P max pooling of the convolution output. `1` disables pooling.
    pub fn pooling(mut self, factor: usize) -> Self {
        self.pooling_factor = factor;
        self
    }

    /// Fuse a pointwise second convolution. `l1_channels` is the channel count
    /// of the intermediate map between the two convolutions; the group width
    /// then applies to that intermediate channel space.
    pub fn fused(mut self, l1_channels: usize) -> Self {
        self.l1_channels = Some(l1_channels);
        self
    }

    /// Validate the description and derive all loop bounds.
    pub fn build(self) -> Result<LayerParams> {
        let (input_height, input_width, input_channels) = self.input.unwrap_or((
            self.output_height * self.pooling_factor.max(1),
            self.output_width * self.pooling_factor.max(1),
            self.output_channels,
        ));

        validate_positive(self.output_height, "output_height")?;
        validate_positive(self.output_width, "output_width")?;
        validate_positive(self.output_channels, "output_channels")?;
        validate_positive(input_height, "input_height")?;
        validate_positive(input_width, "input_width")?;
        validate_positive(input_channels, "input_channels")?;
        validate_positive(self.filter_size, "filter_size")?;
        validate_positive(self.stride, "stride")?;
        validate_positive(self.group_width, "group_width")?;
        validate_positive(self.pooling_factor, "pooling_factor")?;

        let input_channels_padded = self.input_channels_padded.unwrap_or(input_channels);
        if input_channels_padded < input_channels {
            return Err(Error::invalid_argument(
                "input_channels_padded",
                format!(
                    "padded channel count {} is smaller than input_channels {}",
                    input_channels_padded, input_channels
                ),
            ));
        }

        let padding = resolve_padding(
            self.padding,
            input_height,
            input_width,
            self.filter_size,
            self.stride,
        );
        let conv_height = compute_output_size(
            input_height,
            self.filter_size,
            self.stride,
            padding.top,
            padding.bottom,
        );
        let conv_width = compute_output_size(
            input_width,
            self.filter_size,
            self.stride,
            padding.left,
            padding.right,
        );
        if conv_height == 0 || conv_width == 0 {
            return Err(Error::invalid_argument(
                "filter_size",
                format!(
                    "{}x{} filter does not fit a {}x{} input with {} padding",
                    self.filter_size,
                    self.filter_size,
                    input_height,
                    input_width,
                    self.padding.name()
                ),
            ));
        }

        let p = self.pooling_factor;
        if conv_height / p != self.output_height || conv_width / p != self.output_width {
            return Err(Error::invalid_argument(
                "output_height",
                format!(
                    "convolution produces {}x{} which pools by {} to {}x{}, but {}x{} was declared",
                    conv_height,
                    conv_width,
                    p,
                    conv_height / p,
                    conv_width / p,
                    self.output_height,
                    self.output_width
                ),
            ));
        }

        match self.l1_channels {
            Some(l1) => {
                validate_positive(l1, "l1_channels")?;
                validate_divisible(l1, "l1_channels", self.group_width, "group_width")?;
            }
            None => validate_divisible(
                self.output_channels,
                "output_channels",
                self.group_width,
                "group_width",
            )?,
        }

        let variant = match (self.l1_channels.is_some(), p > 1) {
            (false, false) => Variant::Plain,
            (false, true) => Variant::Pooled,
            (true, false) => Variant::Fused,
            (true, true) => Variant::FusedPooled,
        };

        Ok(LayerParams {
            name: self.name,
            variant,
            output_height: self.output_height,
            output_width: self.output_width,
            output_channels: self.output_channels,
            input_height,
            input_width,
            input_channels,
            input_channels_padded,
            filter_size: self.filter_size,
            stride: self.stride,
            padding,
            group_width: self.group_width,
            pooling_factor: p,
            l1_channels: self.l1_channels,
            conv_height,
            conv_width,
        })
    }
}

/// Validated layer parameters.
///
/// Constructed only through [`LayerConfig::build`]; fields are read-only
/// outside the crate so a built value always satisfies the checks `build`
/// performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerParams {
    pub(crate) name: String,
    pub(crate) variant: Variant,
    pub(crate) output_height: usize,
    pub(crate) output_width: usize,
    pub(crate) output_channels: usize,
    pub(crate) input_height: usize,
    pub(crate) input_width: usize,
    pub(crate) input_channels: usize,
    pub(crate) input_channels_padded: usize,
    pub(crate) filter_size: usize,
    pub(crate) stride: usize,
    pub(crate) padding: Padding,
    pub(crate) group_width: usize,
    pub(crate) pooling_factor: usize,
    pub(crate) l1_channels: Option<usize>,
    pub(crate) conv_height: usize,
    pub(crate) conv_width: usize,
}

impl LayerParams {
    /// Name used in log messages
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer family
    #[inline]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Final output rows
    #[inline]
    pub fn output_height(&self) -> usize {
        self.output_height
    }

    /// Final output columns
    #[inline]
    pub fn output_width(&self) -> usize {
        self.output_width
    }

    /// Final output channels
    #[inline]
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Input rows
    #[inline]
    pub fn input_height(&self) -> usize {
        self.input_height
    }

    /// Input columns
    #[inline]
    pub fn input_width(&self) -> usize {
        self.input_width
    }

    /// Input channels read per filter tap
    #[inline]
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    /// Input channels as stored (>= `input_channels`)
    #[inline]
    pub fn input_channels_padded(&self) -> usize {
        self.input_channels_padded
    }

    /// Square filter size of the first convolution
    #[inline]
    pub fn filter_size(&self) -> usize {
        self.filter_size
    }

    /// Stride of the first convolution
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Resolved padding of the first convolution
    #[inline]
    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Channels processed together per iteration
    #[inline]
    pub fn group_width(&self) -> usize {
        self.group_width
    }

    /// Pooling window side (1 when not pooled)
    #[inline]
    pub fn pooling_factor(&self) -> usize {
        self.pooling_factor
    }

    /// Intermediate channel count of a fused layer
    #[inline]
    pub fn l1_channels(&self) -> Option<usize> {
        self.l1_channels
    }

    /// Rows produced by the convolution before pooling
    #[inline]
    pub fn conv_height(&self) -> usize {
        self.conv_height
    }

    /// Columns produced by the convolution before pooling
    #[inline]
    pub fn conv_width(&self) -> usize {
        self.conv_width
    }

    /// Number of products per output element: `filter_size² × input_channels`.
    #[inline]
    pub fn filter_volume(&self) -> usize {
        self.filter_size * self.filter_size * self.input_channels
    }

    /// Channels produced by the first convolution (the lanes that are reduced).
    #[inline]
    pub fn conv_channels(&self) -> usize {
        self.l1_channels.unwrap_or(self.output_channels)
    }

    /// Number of output channel groups the traversal steps through.
    ///
    /// Fused layers produce all output channels of a position at once, so
    /// they have a single group.
    #[inline]
    pub fn channel_groups(&self) -> usize {
        if self.variant.is_fused() {
            1
        } else {
            self.output_channels / self.group_width
        }
    }

    /// Number of intermediate channel slices folded into one output position.
    #[inline]
    pub fn fusion_steps(&self) -> usize {
        self.l1_channels.map_or(1, |l1| l1 / self.group_width)
    }

    /// Width of the aggregator state: the group width, or every output
    /// channel for fused layers.
    #[inline]
    pub fn aggregate_width(&self) -> usize {
        if self.variant.is_fused() {
            self.output_channels
        } else {
            self.group_width
        }
    }

    /// Iterations in one complete pass over the output.
    pub fn total_iterations(&self) -> usize {
        let p = self.pooling_factor;
        self.output_height * self.output_width * self.channel_groups() * p * p * self.fusion_steps()
    }

    /// Output feature map shape `[height, width, channels]`.
    #[inline]
    pub fn output_shape(&self) -> [usize; 3] {
        [self.output_height, self.output_width, self.output_channels]
    }

    /// Input feature map shape as stored `[height, width, padded channels]`.
    #[inline]
    pub fn input_shape(&self) -> [usize; 3] {
        [
            self.input_height,
            self.input_width,
            self.input_channels_padded,
        ]
    }

    /// First-stage filter shape `[out_channels, fy, fx, in_channels]`.
    #[inline]
    pub fn filter_shape(&self) -> [usize; 4] {
        [
            self.conv_channels(),
            self.filter_size,
            self.filter_size,
            self.input_channels,
        ]
    }
}

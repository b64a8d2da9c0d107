//! Pipeline collaborators
//!
//! The driver never touches storage directly. Each iteration it asks an
//! [`InputSource`] for the input window, a [`FilterSource`] for the current
//! group's weights, multiplies them with [`dot_product`], adjusts reduced sums
//! with an [`AdjustmentTable`] and hands committed values to an
//! [`OutputSink`]. Reference implementations of the three storage traits live
//! in [`crate::store`].

mod adjust;
mod multiply;

pub use adjust::{Activation, AdjustmentTable};
pub use multiply::{dot_product, l2_accumulate, l2_multiply};

use crate::dtype::Element;
use crate::error::Result;
use crate::index::OutputCoordinate;
use crate::store::WindowGeometry;

/// Read side of the input feature map.
pub trait InputSource<T: Element> {
    /// Stored `[height, width, channels]`, checked before a run starts.
    fn shape(&self) -> [usize; 3];

    /// How `read_window` maps a convolution position onto stored pixels,
    /// checked against the layer before a run starts.
    fn window_geometry(&self) -> WindowGeometry;

    /// Fill `window` with the `filter_size² × input_channels` taps feeding
    /// convolution position `(row, col)`, in `[fy][fx][c]` order.
    ///
    /// Taps that fall in the padding region read as zero.
    fn read_window(&self, row: usize, col: usize, window: &mut [T]);
}

/// First-stage filter weights.
pub trait FilterSource<T: Element> {
    /// `[out_channels, fy, fx, in_channels]`.
    fn shape(&self) -> [usize; 4];

    /// Copy the filters of channel group `channel_group` into `weights`,
    /// one vector of `fy × fx × in_channels` per lane.
    fn read_filters(&self, channel_group: usize, group_width: usize, weights: &mut [Vec<T>]);
}

/// Write side of the output feature map.
pub trait OutputSink<T: Element> {
    /// Stored `[height, width, channels]`, checked before a run starts.
    fn shape(&self) -> [usize; 3];

    /// Store `values` for channels `first_channel..first_channel + values.len()`
    /// at `(coord.row, coord.col)`.
    fn write_outputs(
        &mut self,
        coord: OutputCoordinate,
        first_channel: usize,
        values: &[T],
    ) -> Result<()>;
}

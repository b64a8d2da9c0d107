use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::layer::LayerParams;
use crate::stages::FilterSource;

/// First-stage filters laid out `[out_channel][fy][fx][in_channel]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank<T: Element> {
    out_channels: usize,
    filter_size: usize,
    in_channels: usize,
    data: Vec<T>,
}

impl<T: Element> FilterBank<T> {
    /// Wrap existing weights.
    pub fn new(
        out_channels: usize,
        filter_size: usize,
        in_channels: usize,
        data: Vec<T>,
    ) -> Result<Self> {
        let expected = [out_channels, filter_size, filter_size, in_channels];
        if data.len() != expected.iter().product::<usize>() {
            return Err(Error::shape_mismatch(
                "filter bank data",
                &[expected.iter().product()],
                &[data.len()],
            ));
        }
        Ok(Self {
            out_channels,
            filter_size,
            in_channels,
            data,
        })
    }

    /// Filters of the first convolution of `params`.
    pub fn for_layer(params: &LayerParams, data: Vec<T>) -> Result<Self> {
        let [oc, fs, _, ic] = params.filter_shape();
        Self::new(oc, fs, ic, data)
    }

    /// Values per output channel.
    #[inline]
    pub fn volume(&self) -> usize {
        self.filter_size * self.filter_size * self.in_channels
    }

    /// Weights of one output channel.
    #[inline]
    pub fn filter(&self, out_channel: usize) -> &[T] {
        let vol = self.volume();
        &self.data[out_channel * vol..(out_channel + 1) * vol]
    }
}

impl<T: Element> FilterSource<T> for FilterBank<T> {
    fn shape(&self) -> [usize; 4] {
        [
            self.out_channels,
            self.filter_size,
            self.filter_size,
            self.in_channels,
        ]
    }

    fn read_filters(&self, channel_group: usize, group_width: usize, weights: &mut [Vec<T>]) {
        debug_assert_eq!(weights.len(), group_width);
        for (lane, dst) in weights.iter_mut().enumerate() {
            dst.copy_from_slice(self.filter(channel_group * group_width + lane));
        }
    }
}

/// Second-stage 1×1 filters of a fused layer, `[out_channel][l1_channel]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointwiseFilters<T: Element> {
    out_channels: usize,
    l1_channels: usize,
    data: Vec<T>,
}

impl<T: Element> PointwiseFilters<T> {
    /// Wrap existing weights.
    pub fn new(out_channels: usize, l1_channels: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != out_channels * l1_channels {
            return Err(Error::shape_mismatch(
                "pointwise filter data",
                &[out_channels, l1_channels],
                &[data.len()],
            ));
        }
        Ok(Self {
            out_channels,
            l1_channels,
            data,
        })
    }

    /// `[out_channels, l1_channels]`.
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.out_channels, self.l1_channels]
    }

    /// Intermediate channel count.
    #[inline]
    pub fn l1_channels(&self) -> usize {
        self.l1_channels
    }

    /// Weight from intermediate channel `l1` to output channel `out`.
    #[inline]
    pub fn get(&self, out: usize, l1: usize) -> T {
        self.data[out * self.l1_channels + l1]
    }

    /// All weights, row-major.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

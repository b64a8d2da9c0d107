use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::index::OutputCoordinate;
use crate::layer::LayerParams;
use crate::stages::{InputSource, OutputSink};

/// Default number of channels packed into one aligned write.
pub const DEFAULT_PACK_WIDTH: usize = 4;

/// How a convolution position maps onto stored pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    /// Square filter size
    pub filter_size: usize,
    /// Stride between convolution positions
    pub stride: usize,
    /// Zero rows above the map
    pub pad_top: usize,
    /// Zero columns left of the map
    pub pad_left: usize,
    /// Channels read per tap (may be fewer than stored)
    pub channels: usize,
}

impl WindowGeometry {
    /// Geometry of the first convolution of `params`.
    pub fn for_layer(params: &LayerParams) -> Self {
        Self {
            filter_size: params.filter_size,
            stride: params.stride,
            pad_top: params.padding.top,
            pad_left: params.padding.left,
            channels: params.input_channels,
        }
    }

    /// `[filter_size, stride, pad_top, pad_left, channels]`, for error reports.
    #[inline]
    pub fn to_array(&self) -> [usize; 5] {
        [
            self.filter_size,
            self.stride,
            self.pad_top,
            self.pad_left,
            self.channels,
        ]
    }

    /// Values in one window.
    #[inline]
    pub fn window_len(&self) -> usize {
        self.filter_size * self.filter_size * self.channels
    }
}

/// Count of writes by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteStats {
    /// Writes copied in whole packed words
    pub aligned: usize,
    /// Writes copied element by element
    pub unaligned: usize,
}

/// Dense HWC feature map.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap<T: Element> {
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<T>,
    geometry: WindowGeometry,
    pack_width: usize,
    stats: WriteStats,
}

impl<T: Element> FeatureMap<T> {
    /// Map over existing data laid out `[row][col][channel]`.
    pub fn from_vec(height: usize, width: usize, channels: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != height * width * channels {
            return Err(Error::shape_mismatch(
                "feature map data",
                &[height * width * channels],
                &[data.len()],
            ));
        }
        Ok(Self {
            height,
            width,
            channels,
            data,
            geometry: WindowGeometry {
                filter_size: 1,
                stride: 1,
                pad_top: 0,
                pad_left: 0,
                channels,
            },
            pack_width: DEFAULT_PACK_WIDTH,
            stats: WriteStats::default(),
        })
    }

    /// Zero-filled map.
    pub fn zeros(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
            data: vec![T::zero(); height * width * channels],
            geometry: WindowGeometry {
                filter_size: 1,
                stride: 1,
                pad_top: 0,
                pad_left: 0,
                channels,
            },
            pack_width: DEFAULT_PACK_WIDTH,
            stats: WriteStats::default(),
        }
    }

    /// Map from raw bytes of `T` values.
    pub fn from_bytes(height: usize, width: usize, channels: usize, bytes: &[u8]) -> Result<Self> {
        let values: &[T] = bytemuck::try_cast_slice(bytes)
            .map_err(|e| Error::invalid_argument("bytes", format!("{:?}", e)))?;
        Self::from_vec(height, width, channels, values.to_vec())
    }

    /// Input map of `params`, with its window geometry set.
    ///
    /// `data` holds `input_channels_padded` values per pixel.
    pub fn layer_input(params: &LayerParams, data: Vec<T>) -> Result<Self> {
        let [h, w, c] = params.input_shape();
        Ok(Self::from_vec(h, w, c, data)?.with_geometry(WindowGeometry::for_layer(params)))
    }

    /// Zeroed output map of `params`.
    pub fn layer_output(params: &LayerParams) -> Self {
        let [h, w, c] = params.output_shape();
        Self::zeros(h, w, c)
    }

    /// Set how convolution windows are read.
    pub fn with_geometry(mut self, geometry: WindowGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Set the aligned-write word size.
    pub fn with_pack_width(mut self, pack_width: usize) -> Result<Self> {
        crate::layer::validate::validate_positive(pack_width, "pack_width")?;
        self.pack_width = pack_width;
        Ok(self)
    }

    /// Window geometry used by `read_window`.
    #[inline]
    pub fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    /// `[height, width, channels]`.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    /// Value at `(row, col, channel)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize, channel: usize) -> T {
        self.data[(row * self.width + col) * self.channels + channel]
    }

    /// Channels stored at one pixel.
    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> &[T] {
        let start = (row * self.width + col) * self.channels;
        &self.data[start..start + self.channels]
    }

    /// All values, `[row][col][channel]`.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Raw bytes of all values.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data[..])
    }

    /// Writes so far by path.
    #[inline]
    pub fn write_stats(&self) -> WriteStats {
        self.stats
    }

    /// Consume the map, returning its data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Element> InputSource<T> for FeatureMap<T> {
    fn shape(&self) -> [usize; 3] {
        self.dims()
    }

    fn window_geometry(&self) -> WindowGeometry {
        self.geometry
    }

    fn read_window(&self, row: usize, col: usize, window: &mut [T]) {
        let WindowGeometry {
            filter_size,
            stride,
            pad_top,
            pad_left,
            channels,
        } = self.geometry;
        debug_assert_eq!(window.len(), self.geometry.window_len(), "window length");

        let mut taps = window.chunks_exact_mut(channels);
        for fy in 0..filter_size {
            let y = (row * stride + fy).checked_sub(pad_top);
            for fx in 0..filter_size {
                let x = (col * stride + fx).checked_sub(pad_left);
                let Some(tap) = taps.next() else { return };
                match (y, x) {
                    (Some(y), Some(x)) if y < self.height && x < self.width => {
                        tap.copy_from_slice(&self.pixel(y, x)[..channels]);
                    }
                    _ => tap.fill(T::zero()),
                }
            }
        }
    }
}

impl<T: Element> OutputSink<T> for FeatureMap<T> {
    fn shape(&self) -> [usize; 3] {
        self.dims()
    }

    fn write_outputs(
        &mut self,
        coord: OutputCoordinate,
        first_channel: usize,
        values: &[T],
    ) -> Result<()> {
        if coord.row >= self.height {
            return Err(Error::IndexOutOfBounds {
                what: "output row",
                index: coord.row,
                size: self.height,
            });
        }
        if coord.col >= self.width {
            return Err(Error::IndexOutOfBounds {
                what: "output column",
                index: coord.col,
                size: self.width,
            });
        }
        let end = first_channel + values.len();
        if end > self.channels {
            return Err(Error::IndexOutOfBounds {
                what: "output channel",
                index: end - 1,
                size: self.channels,
            });
        }

        let base = (coord.row * self.width + coord.col) * self.channels + first_channel;
        let dst = &mut self.data[base..base + values.len()];
        let pack = self.pack_width;
        if first_channel.is_multiple_of(pack) && values.len().is_multiple_of(pack) {
            for (word, src) in dst.chunks_exact_mut(pack).zip(values.chunks_exact(pack)) {
                word.copy_from_slice(src);
            }
            self.stats.aligned += 1;
        } else {
            for (d, &v) in dst.iter_mut().zip(values) {
                *d = v;
            }
            self.stats.unaligned += 1;
        }
        Ok(())
    }
}

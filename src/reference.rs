//! Direct (non-streaming) evaluation of a layer
//!
//! Computes the whole convolution map at once with plain nested loops, then
//! adjusts, applies the optional pointwise second stage and pools. It shares
//! no traversal, reduction or aggregation code with
//! [`LayerPipeline`](crate::pipeline::LayerPipeline) and serves as the oracle
//! the streaming path is checked against.

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::layer::LayerParams;
use crate::stages::AdjustmentTable;
use crate::store::{FeatureMap, FilterBank, PointwiseFilters};

/// Second stage of a fused layer.
#[derive(Debug, Clone, Copy)]
pub struct Fusion<'a, T: Element> {
    /// `[out_channel][l1_channel]` weights
    pub weights: &'a PointwiseFilters<T>,
    /// Adjustment of the final output channels
    pub adjustments: &'a AdjustmentTable<T>,
}

/// Evaluate `params` directly, returning the output map `[row][col][channel]`.
pub fn layer_output<T: Element>(
    params: &LayerParams,
    input: &FeatureMap<T>,
    filters: &FilterBank<T>,
    adjustments: &AdjustmentTable<T>,
    fusion: Option<Fusion<'_, T>>,
) -> Result<Vec<T>> {
    if input.dims() != params.input_shape() {
        return Err(Error::shape_mismatch(
            "input feature map",
            &params.input_shape(),
            &input.dims(),
        ));
    }
    if params.variant().is_fused() != fusion.is_some() {
        return Err(Error::UnsupportedVariant {
            operation: "reference::layer_output",
            variant: params.variant().name(),
        });
    }

    let conv = conv_adjusted(params, input, filters, adjustments);
    let (map, channels) = match fusion {
        Some(f) => (pointwise_adjusted(params, &conv, f), params.output_channels),
        None => (conv, params.conv_channels()),
    };
    Ok(max_pool(params, &map, channels))
}

/// Convolution followed by the first adjustment, `[cy][cx][oc]`.
fn conv_adjusted<T: Element>(
    params: &LayerParams,
    input: &FeatureMap<T>,
    filters: &FilterBank<T>,
    adjustments: &AdjustmentTable<T>,
) -> Vec<T> {
    let (ch, cw, oc_n) = (params.conv_height, params.conv_width, params.conv_channels());
    let ks = params.filter_size;
    let c_in = params.input_channels;
    let mut out = vec![T::zero(); ch * cw * oc_n];

    for cy in 0..ch {
        for cx in 0..cw {
            for oc in 0..oc_n {
                let weights = filters.filter(oc);
                let mut sum = T::zero();
                for ky in 0..ks {
                    for kx in 0..ks {
                        let iy = (cy * params.stride + ky) as isize - params.padding.top as isize;
                        let ix = (cx * params.stride + kx) as isize - params.padding.left as isize;
                        if iy < 0
                            || ix < 0
                            || iy as usize >= params.input_height
                            || ix as usize >= params.input_width
                        {
                            continue;
                        }
                        for ic in 0..c_in {
                            let x = input.get(iy as usize, ix as usize, ic);
                            let w = weights[(ky * ks + kx) * c_in + ic];
                            sum = sum.add_wrapping(x.mul_wrapping(w));
                        }
                    }
                }
                out[(cy * cw + cx) * oc_n + oc] = adjustments.adjust_value(sum, oc);
            }
        }
    }
    out
}

/// Pointwise second convolution and its adjustment.
fn pointwise_adjusted<T: Element>(params: &LayerParams, conv: &[T], fusion: Fusion<'_, T>) -> Vec<T> {
    let l1 = params.conv_channels();
    let oc_n = params.output_channels;
    let pixels = params.conv_height * params.conv_width;
    let mut out = vec![T::zero(); pixels * oc_n];

    for (px, inter) in conv.chunks_exact(l1).enumerate().take(pixels) {
        for o in 0..oc_n {
            let sum = inter
                .iter()
                .enumerate()
                .fold(T::zero(), |acc, (l, &x)| {
                    acc.add_wrapping(x.mul_wrapping(fusion.weights.get(o, l)))
                });
            out[px * oc_n + o] = fusion.adjustments.adjust_value(sum, o);
        }
    }
    out
}

/// Floor-mode P×P max pooling of a `[conv_h][conv_w][channels]` map.
fn max_pool<T: Element>(params: &LayerParams, map: &[T], channels: usize) -> Vec<T> {
    let p = params.pooling_factor;
    let (oh, ow, cw) = (params.output_height, params.output_width, params.conv_width);
    let mut out = vec![T::zero(); oh * ow * channels];

    for i in 0..oh {
        for j in 0..ow {
            for c in 0..channels {
                let mut best = map[((i * p) * cw + j * p) * channels + c];
                for di in 0..p {
                    for dj in 0..p {
                        let v = map[((i * p + di) * cw + j * p + dj) * channels + c];
                        if v > best {
                            best = v;
                        }
                    }
                }
                out[(i * ow + j) * channels + c] = best;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerConfig, PaddingMode};
    use crate::stages::Activation;

    #[test]
    fn test_padded_3x3_sum() {
        // all-ones 3x3 input, 3x3 ones filter, same padding: counts neighbours
        let params = LayerConfig::new(3, 3, 1)
            .input(3, 3, 1)
            .filter(3, 1, PaddingMode::Same)
            .build()
            .unwrap();
        let input = FeatureMap::layer_input(&params, vec![1i32; 9]).unwrap();
        let filters = FilterBank::for_layer(&params, vec![1; 9]).unwrap();
        let out =
            layer_output(&params, &input, &filters, &AdjustmentTable::identity(1), None).unwrap();
        assert_eq!(out, vec![4, 6, 4, 6, 9, 6, 4, 6, 4]);
    }

    #[test]
    fn test_pool_after_relu() {
        let params = LayerConfig::new(1, 1, 1)
            .input(2, 2, 1)
            .pooling(2)
            .build()
            .unwrap();
        let input = FeatureMap::layer_input(&params, vec![-3.0f32, -1.0, -2.0, -4.0]).unwrap();
        let filters = FilterBank::for_layer(&params, vec![1.0]).unwrap();
        let table = AdjustmentTable::identity(1).with_activation(Activation::Relu);
        let out = layer_output(&params, &input, &filters, &table, None).unwrap();
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn test_fusion_must_match_variant() {
        let params = LayerConfig::new(1, 1, 1).build().unwrap();
        let input = FeatureMap::layer_input(&params, vec![1i64]).unwrap();
        let filters = FilterBank::for_layer(&params, vec![1]).unwrap();
        let pw = PointwiseFilters::new(1, 1, vec![1]).unwrap();
        let table = AdjustmentTable::identity(1);
        let fusion = Fusion {
            weights: &pw,
            adjustments: &table,
        };
        let err = layer_output(&params, &input, &filters, &table, Some(fusion)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVariant { .. }));
    }
}

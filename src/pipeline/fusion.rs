use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::stages::{l2_accumulate, l2_multiply};
use crate::store::PointwiseFilters;

/// Second-stage state of a fused layer: pointwise weights and the scratch
/// for one slice's products and partial sums.
#[derive(Debug, Clone)]
pub(crate) struct FusionStage<T: Element> {
    weights: PointwiseFilters<T>,
    products: Vec<Vec<T>>,
    partials: Vec<T>,
}

impl<T: Element> FusionStage<T> {
    pub(crate) fn new(
        weights: PointwiseFilters<T>,
        out_channels: usize,
        l1_channels: usize,
        group_width: usize,
    ) -> Result<Self> {
        if weights.shape() != [out_channels, l1_channels] {
            return Err(Error::shape_mismatch(
                "pointwise filters",
                &[out_channels, l1_channels],
                &weights.shape(),
            ));
        }
        Ok(Self {
            weights,
            products: vec![vec![T::zero(); group_width]; out_channels],
            partials: vec![T::zero(); out_channels],
        })
    }

    /// Fold slice `k` of the intermediate map into per-output partial sums.
    pub(crate) fn partial_sums(&mut self, intermediate: &[T], k: usize) -> &[T] {
        l2_multiply(
            intermediate,
            self.weights.as_slice(),
            self.weights.l1_channels(),
            k,
            &mut self.products,
        );
        l2_accumulate(&self.products, &mut self.partials);
        &self.partials
    }
}

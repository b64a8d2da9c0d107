//! Common test utilities
#![allow(dead_code)]

use convflow::dtype::Element;
use convflow::layer::LayerParams;
use convflow::pipeline::{LayerPipeline, RunSummary};
use convflow::reduce::ReductionPlan;
use convflow::reference::{self, Fusion};
use convflow::stages::{Activation, AdjustmentTable};
use convflow::store::{FeatureMap, FilterBank, PointwiseFilters};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f32 slices are close within tolerance
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Route `log` output through the test harness (RUST_LOG=convflow=trace)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Uniform values in `[-1, 1)` from a fixed seed
pub fn seeded_f64(seed: u64, n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(-1.0..1.0)).collect()
}

/// Small signed integers from a fixed seed, safe to multiply and sum in i32
pub fn seeded_i32(seed: u64, n: usize) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(-8..=8)).collect()
}

/// Everything needed to run one layer through both the pipeline and the
/// direct reference.
pub struct LayerFixture<T: Element> {
    pub params: LayerParams,
    pub input: FeatureMap<T>,
    pub filters: FilterBank<T>,
    pub adjustments: AdjustmentTable<T>,
    pub l2: Option<(PointwiseFilters<T>, AdjustmentTable<T>)>,
}

impl<T: Element> LayerFixture<T> {
    /// Fill every tensor of `params` using `generate(seed, len)`.
    ///
    /// Adjustments keep `inv_sqrt_var` at one so integer layers stay exact.
    pub fn generate(params: LayerParams, seed: u64, generate: impl Fn(u64, usize) -> Vec<T>) -> Self {
        let [h, w, c] = params.input_shape();
        let input = FeatureMap::layer_input(&params, generate(seed, h * w * c)).unwrap();
        let filter_len: usize = params.filter_shape().iter().product();
        let filters = FilterBank::for_layer(&params, generate(seed + 1, filter_len)).unwrap();

        let l1 = params.conv_channels();
        let adjustments = AdjustmentTable::from_columns(
            &generate(seed + 2, l1),
            &vec![T::one(); l1],
            &generate(seed + 3, l1),
            Activation::Relu,
        )
        .unwrap();

        let l2 = params.l1_channels().map(|l1| {
            let oc = params.output_channels();
            let weights = PointwiseFilters::new(oc, l1, generate(seed + 4, oc * l1)).unwrap();
            let table = AdjustmentTable::from_columns(
                &generate(seed + 5, oc),
                &vec![T::one(); oc],
                &generate(seed + 6, oc),
                Activation::Identity,
            )
            .unwrap();
            (weights, table)
        });

        Self {
            params,
            input,
            filters,
            adjustments,
            l2,
        }
    }

    /// Build the streaming pipeline for this fixture.
    pub fn pipeline(&self, plan: ReductionPlan) -> LayerPipeline<T> {
        match &self.l2 {
            Some((weights, table)) => LayerPipeline::fused(
                self.params.clone(),
                plan,
                self.adjustments.clone(),
                weights.clone(),
                table.clone(),
            )
            .unwrap(),
            None => {
                LayerPipeline::new(self.params.clone(), plan, self.adjustments.clone()).unwrap()
            }
        }
    }

    /// Run one pass of the streaming pipeline.
    pub fn run_pipeline(&self, plan: ReductionPlan) -> (Vec<T>, RunSummary) {
        let mut pipeline = self.pipeline(plan);
        let mut output = FeatureMap::layer_output(&self.params);
        let summary = pipeline
            .run(&self.input, &self.filters, &mut output)
            .unwrap();
        (output.into_vec(), summary)
    }

    /// Evaluate directly.
    pub fn run_reference(&self) -> Vec<T> {
        let fusion = self.l2.as_ref().map(|(weights, adjustments)| Fusion {
            weights,
            adjustments,
        });
        reference::layer_output(
            &self.params,
            &self.input,
            &self.filters,
            &self.adjustments,
            fusion,
        )
        .unwrap()
    }
}

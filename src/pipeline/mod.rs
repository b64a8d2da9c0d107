//! Top-level driver
//!
//! [`LayerPipeline`] runs a layer for a fixed number of iterations. Each
//! iteration executes the same stages in the same order:
//!
//! ```text
//! index ─▶ read window ─▶ read filters ─▶ multiply ─▶ reduce ─▶ adjust ─▶ aggregate ─▶ write?
//!                                                                  │
//!                          fused layers only:  l2 multiply ─▶ l2 accumulate ─▶ running sum ─▶ (max pool)
//! ```
//!
//! Every buffer is allocated when the pipeline is built and storage shapes
//! are checked before the first iteration, so a run cannot fail part way
//! through on a well-formed configuration.

mod fusion;

use log::{debug, trace};

use crate::aggregate::{AggregateFlags, Aggregator};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::index::{IndexGenerator, IndexStep, Traversal};
use crate::layer::{LayerParams, Variant};
use crate::reduce::{LaneReducer, ParallelismConfig, ReductionPlan};
use crate::stages::{AdjustmentTable, FilterSource, InputSource, OutputSink, dot_product};
use crate::store::{PointwiseFilters, WindowGeometry};
use fusion::FusionStage;

/// Counts from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Iterations executed
    pub iterations: usize,
    /// Times the first aggregator committed
    pub commits: usize,
    /// Calls to the output sink
    pub writes: usize,
}

/// Streaming driver for one convolution layer.
#[derive(Debug)]
pub struct LayerPipeline<T: Element> {
    params: LayerParams,
    indexer: IndexGenerator,
    reducer: LaneReducer<T>,
    adjustments: AdjustmentTable<T>,
    aggregator: Aggregator<T>,
    pool: Option<Aggregator<T>>,
    fusion: Option<FusionStage<T>>,
    window: Vec<T>,
    weights: Vec<Vec<T>>,
    products: Vec<Vec<T>>,
    sums: Vec<T>,
    adjusted: Vec<T>,
}

impl<T: Element> LayerPipeline<T> {
    /// Pipeline for a plain or pooled layer.
    ///
    /// `plan` reduces one lane's `filter_volume()` products; `adjustments`
    /// has one row per output channel.
    pub fn new(
        params: LayerParams,
        plan: ReductionPlan,
        adjustments: AdjustmentTable<T>,
    ) -> Result<Self> {
        if params.variant().is_fused() {
            return Err(Error::UnsupportedVariant {
                operation: "LayerPipeline::new",
                variant: params.variant().name(),
            });
        }
        let aggregator = if params.variant().is_pooled() {
            Aggregator::max_pool(params.aggregate_width())?
        } else {
            Aggregator::pass_through(params.aggregate_width())?
        };
        Self::assemble(params, plan, adjustments, aggregator, None, None)
    }

    /// Pipeline for a fused layer, optionally pooled.
    ///
    /// `adjustments` covers the intermediate channels; `l2_adjustments`
    /// covers the final output channels and is applied when a position's
    /// running sum commits.
    pub fn fused(
        params: LayerParams,
        plan: ReductionPlan,
        adjustments: AdjustmentTable<T>,
        l2_weights: PointwiseFilters<T>,
        l2_adjustments: AdjustmentTable<T>,
    ) -> Result<Self> {
        let Some(l1) = params.l1_channels else {
            return Err(Error::UnsupportedVariant {
                operation: "LayerPipeline::fused",
                variant: params.variant().name(),
            });
        };
        if l2_adjustments.channels() != params.output_channels {
            return Err(Error::shape_mismatch(
                "second-stage adjustments",
                &[params.output_channels],
                &[l2_adjustments.channels()],
            ));
        }
        let fusion = FusionStage::new(l2_weights, params.output_channels, l1, params.group_width)?;
        let pool = match params.variant() {
            Variant::FusedPooled => Some(Aggregator::max_pool(params.output_channels)?),
            _ => None,
        };
        let aggregator = Aggregator::running_sum(l2_adjustments);
        Self::assemble(params, plan, adjustments, aggregator, pool, Some(fusion))
    }

    fn assemble(
        params: LayerParams,
        plan: ReductionPlan,
        adjustments: AdjustmentTable<T>,
        aggregator: Aggregator<T>,
        pool: Option<Aggregator<T>>,
        fusion: Option<FusionStage<T>>,
    ) -> Result<Self> {
        let volume = params.filter_volume();
        if plan.input_len() != volume {
            return Err(Error::shape_mismatch(
                "reduction plan input",
                &[volume],
                &[plan.input_len()],
            ));
        }
        if adjustments.channels() != params.conv_channels() {
            return Err(Error::shape_mismatch(
                "adjustments",
                &[params.conv_channels()],
                &[adjustments.channels()],
            ));
        }

        let g = params.group_width;
        let indexer = IndexGenerator::for_layer(&params)?;
        let reducer = LaneReducer::new(plan, g, ParallelismConfig::default())?;

        debug!(
            "Built {} pipeline '{}': {} iterations per pass, {} lanes of {} products, {} aggregation",
            params.variant().name(),
            params.name,
            params.total_iterations(),
            g,
            volume,
            aggregator.kind()
        );

        Ok(Self {
            indexer,
            reducer,
            adjustments,
            aggregator,
            pool,
            fusion,
            window: vec![T::zero(); volume],
            weights: vec![vec![T::zero(); volume]; g],
            products: vec![vec![T::zero(); volume]; g],
            sums: vec![T::zero(); g],
            adjusted: vec![T::zero(); g],
            params,
        })
    }

    /// Replace the lane parallelism settings.
    pub fn with_parallelism(mut self, parallelism: ParallelismConfig) -> Result<Self> {
        let plan = self.reducer.plan().clone();
        self.reducer = LaneReducer::new(plan, self.params.group_width, parallelism)?;
        Ok(self)
    }

    /// Validated layer parameters.
    #[inline]
    pub fn params(&self) -> &LayerParams {
        &self.params
    }

    /// Iterations in one full pass.
    #[inline]
    pub fn total_iterations(&self) -> usize {
        self.params.total_iterations()
    }

    /// The aggregator fed by every iteration.
    #[inline]
    pub fn aggregator(&self) -> &Aggregator<T> {
        &self.aggregator
    }

    /// Rewind traversal and clear all running aggregates.
    pub fn reset(&mut self) {
        self.indexer.reset();
        self.aggregator.reset();
        if let Some(pool) = &mut self.pool {
            pool.reset();
        }
    }

    /// Check storage shapes and the input's window geometry against the layer.
    ///
    /// [`run`](Self::run) and [`run_for`](Self::run_for) call this before the
    /// first iteration.
    pub fn validate_storage<I, F, O>(&self, input: &I, filters: &F, output: &O) -> Result<()>
    where
        I: InputSource<T> + ?Sized,
        F: FilterSource<T> + ?Sized,
        O: OutputSink<T> + ?Sized,
    {
        let expected = self.params.input_shape();
        if input.shape() != expected {
            return Err(Error::shape_mismatch("input feature map", &expected, &input.shape()));
        }
        let expected = WindowGeometry::for_layer(&self.params);
        let geometry = input.window_geometry();
        if geometry != expected {
            return Err(Error::shape_mismatch(
                "input window geometry",
                &expected.to_array(),
                &geometry.to_array(),
            ));
        }
        let expected = self.params.filter_shape();
        if filters.shape() != expected {
            return Err(Error::shape_mismatch("filters", &expected, &filters.shape()));
        }
        let expected = self.params.output_shape();
        if output.shape() != expected {
            return Err(Error::shape_mismatch("output feature map", &expected, &output.shape()));
        }
        Ok(())
    }

    /// Run one iteration.
    ///
    /// Returns the step that was processed and whether it wrote an output.
    ///
    /// # Errors
    ///
    /// Propagates a failed [`OutputSink::write_outputs`].
    ///
    /// # Panics
    ///
    /// Storage must have passed [`validate_storage`](Self::validate_storage).
    /// A window geometry or filter shape that does not match the layer
    /// panics in debug builds and leaves stale taps in release builds.
    pub fn step<I, F, O>(&mut self, input: &I, filters: &F, output: &mut O) -> Result<StepOutcome>
    where
        I: InputSource<T> + ?Sized,
        F: FilterSource<T> + ?Sized,
        O: OutputSink<T> + ?Sized,
    {
        let step = self.indexer.next();
        let g = self.params.group_width;

        input.read_window(step.input.row, step.input.col, &mut self.window);
        filters.read_filters(step.input.channel_group, g, &mut self.weights);
        for (lane, weights) in self.products.iter_mut().zip(&self.weights) {
            dot_product(&self.window, weights, lane);
        }
        self.reducer.reduce_lanes(&self.products, &mut self.sums);
        self.adjustments
            .adjust(&self.sums, step.input.channel_group * g, &mut self.adjusted);

        let mut outcome = StepOutcome {
            step,
            committed: false,
            written: false,
        };

        let Some(fusion) = &mut self.fusion else {
            if let Some(values) = self
                .aggregator
                .accept(&self.adjusted, AggregateFlags::from_step(&step))
            {
                outcome.committed = true;
                output.write_outputs(step.output, step.output.channel_group * g, values)?;
                outcome.written = true;
                trace!("Wrote {:?} group of {}", step.output, g);
            }
            return Ok(outcome);
        };

        let k = step.input.channel_group;
        let partials = fusion.partial_sums(&self.adjusted, k);
        let flags = AggregateFlags::new(
            step.fusion.is_some_and(|f| f.is_first()),
            step.fusion_commit(),
        );
        let Some(values) = self.aggregator.accept(partials, flags) else {
            return Ok(outcome);
        };
        outcome.committed = true;

        let values = match &mut self.pool {
            None => values,
            Some(pool) => {
                let flags = AggregateFlags::new(step.pool_reset(), step.pool_commit());
                match pool.accept(values, flags) {
                    Some(pooled) => pooled,
                    None => return Ok(outcome),
                }
            }
        };
        output.write_outputs(step.output, 0, values)?;
        outcome.written = true;
        trace!("Wrote {:?} all {} channels", step.output, values.len());
        Ok(outcome)
    }

    /// Run one full pass over the output.
    pub fn run<I, F, O>(&mut self, input: &I, filters: &F, output: &mut O) -> Result<RunSummary>
    where
        I: InputSource<T> + ?Sized,
        F: FilterSource<T> + ?Sized,
        O: OutputSink<T> + ?Sized,
    {
        self.run_for(self.total_iterations(), input, filters, output)
    }

    /// Run exactly `iterations` iterations.
    ///
    /// Traversal wraps after a full pass, so a multiple of
    /// [`total_iterations`](Self::total_iterations) recomputes the whole
    /// output that many times.
    pub fn run_for<I, F, O>(
        &mut self,
        iterations: usize,
        input: &I,
        filters: &F,
        output: &mut O,
    ) -> Result<RunSummary>
    where
        I: InputSource<T> + ?Sized,
        F: FilterSource<T> + ?Sized,
        O: OutputSink<T> + ?Sized,
    {
        self.validate_storage(input, filters, output)?;

        let mut summary = RunSummary::default();
        for _ in 0..iterations {
            let outcome = self.step(input, filters, output)?;
            summary.iterations += 1;
            summary.commits += usize::from(outcome.committed);
            summary.writes += usize::from(outcome.written);
        }

        debug!(
            "Pipeline '{}' ran {} iterations: {} commits, {} writes",
            self.params.name, summary.iterations, summary.commits, summary.writes
        );
        Ok(summary)
    }
}

/// Result of a single [`LayerPipeline::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Traversal step that was processed
    pub step: IndexStep,
    /// The first aggregator committed
    pub committed: bool,
    /// An output was written
    pub written: bool,
}

//! Kernel machine: predictions from a weighted sum of kernel evaluations
//!
//! A [`KernelMachine`] pairs a shared kernel with a [`SupportVectorModel`].
//! Training algorithms fill the model; the machine evaluates
//!
//! ```text
//! f(x_j) = Σ_i alpha[i] * k(sv[i], j) + bias
//! ```
//!
//! for every query vector `j`. Kernels that fold the weighted support
//! vectors into a cache (linear-add) or score whole batches at once are
//! used through those fast paths when available.

use crate::core::{
    BinaryLabels, Features, KernelMachineConfig, MachineError, Parallelism, RegressionLabels,
    Result, SparseFeatures,
};
use crate::kernel::traits::{read_kernel, write_kernel};
use crate::kernel::{Kernel, KernelProperty, SharedKernel};
use crate::machine::parameters::{Parameter, ParameterKind, ParameterValue};
use crate::machine::SupportVectorModel;
use crate::utils::WorkerPool;
use log::{debug, trace, warn};
use std::sync::Arc;

const NAME: &str = "KernelMachine";

fn describe(data: Option<&Arc<SparseFeatures>>) -> String {
    data.map_or_else(
        || "none".to_string(),
        |d| format!("{} vectors", d.num_vectors()),
    )
}

/// Machine predicting from kernel evaluations against support vectors
///
/// Cloning copies the model and settings and shares the kernel handle.
/// Rebuilding the model or swapping the kernel while a prediction is in
/// flight on another thread is not supported.
#[derive(Clone, Default)]
pub struct KernelMachine {
    kernel: Option<SharedKernel>,
    model: SupportVectorModel,
    config: KernelMachineConfig,
    parallelism: Parallelism,
}

impl KernelMachine {
    /// Create a machine without kernel and with an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a machine from a trained model
    pub fn with_model(
        kernel: SharedKernel,
        alphas: Vec<f64>,
        support_vectors: Vec<usize>,
        bias: f64,
    ) -> Result<Self> {
        Ok(Self {
            kernel: Some(kernel),
            model: SupportVectorModel::new(alphas, support_vectors, bias)?,
            ..Self::default()
        })
    }

    pub fn with_config(mut self, config: KernelMachineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Replace the kernel; the previous handle is released after the new
    /// one is stored
    pub fn set_kernel(&mut self, kernel: Option<SharedKernel>) {
        let previous = std::mem::replace(&mut self.kernel, kernel);
        drop(previous);
    }

    pub fn kernel(&self) -> Option<SharedKernel> {
        self.kernel.clone()
    }

    pub fn config(&self) -> &KernelMachineConfig {
        &self.config
    }

    pub fn set_batch_computation_enabled(&mut self, enable: bool) {
        self.config.use_batch_computation = enable;
    }

    pub fn batch_computation_enabled(&self) -> bool {
        self.config.use_batch_computation
    }

    pub fn set_linadd_enabled(&mut self, enable: bool) {
        self.config.use_linadd = enable;
    }

    pub fn linadd_enabled(&self) -> bool {
        self.config.use_linadd
    }

    pub fn set_bias_enabled(&mut self, enable: bool) {
        self.config.use_bias = enable;
    }

    pub fn bias_enabled(&self) -> bool {
        self.config.use_bias
    }

    pub fn parallelism(&self) -> &Parallelism {
        &self.parallelism
    }

    pub fn set_parallelism(&mut self, parallelism: Parallelism) {
        self.parallelism = parallelism;
    }

    pub fn model(&self) -> &SupportVectorModel {
        &self.model
    }

    pub fn bias(&self) -> f64 {
        self.model.bias
    }

    pub fn set_bias(&mut self, bias: f64) {
        self.model.bias = bias;
    }

    pub fn num_support_vectors(&self) -> usize {
        self.model.num_support_vectors()
    }

    pub fn alphas(&self) -> &[f64] {
        &self.model.alpha
    }

    pub fn support_vectors(&self) -> &[usize] {
        &self.model.support_vectors
    }

    pub fn set_alphas(&mut self, alphas: Vec<f64>) {
        self.model.alpha = alphas;
    }

    pub fn set_support_vectors(&mut self, support_vectors: Vec<usize>) {
        self.model.support_vectors = support_vectors;
    }

    pub fn alpha(&self, idx: usize) -> Result<f64> {
        self.model
            .alpha
            .get(idx)
            .copied()
            .ok_or(MachineError::IndexOutOfBounds {
                index: idx,
                len: self.model.alpha.len(),
            })
    }

    pub fn support_vector(&self, idx: usize) -> Result<usize> {
        self.model
            .support_vectors
            .get(idx)
            .copied()
            .ok_or(MachineError::IndexOutOfBounds {
                index: idx,
                len: self.model.support_vectors.len(),
            })
    }

    /// Overwrite one coefficient; `false` if `idx` is out of range
    pub fn set_alpha(&mut self, idx: usize, value: f64) -> bool {
        match self.model.alpha.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Overwrite one support-vector index; `false` if `idx` is out of range
    pub fn set_support_vector(&mut self, idx: usize, value: usize) -> bool {
        match self.model.support_vectors.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Replace the model with `num` zeroed support vectors and zero bias
    pub fn create_new_model(&mut self, num: usize) {
        self.model = SupportVectorModel::with_capacity(num);
    }

    /// Push support vectors and weights into the kernel's linear-add cache
    ///
    /// Must run before prediction; workers never build the cache lazily.
    pub fn init_kernel_optimization(&self) -> Result<()> {
        let shared = self.require_kernel("init_kernel_optimization")?;
        let mut kernel = write_kernel(shared)?;
        let num_sv = self.model.num_support_vectors();

        if !kernel.has_property(KernelProperty::LinAdd) {
            return Err(MachineError::Capability(format!(
                "{NAME}::init_kernel_optimization(): {} does not support linear-add",
                kernel.name()
            )));
        }
        if num_sv == 0 {
            return Err(MachineError::Capability(format!(
                "{NAME}::init_kernel_optimization(): no support vectors"
            )));
        }
        self.model.check_lengths()?;

        if !kernel.init_optimization(&self.model.support_vectors, &self.model.alpha) {
            return Err(MachineError::Capability(format!(
                "{NAME}::init_kernel_optimization(): initialization of kernel optimization failed"
            )));
        }
        debug!(
            "{NAME}: {} optimization initialised with {num_sv} support vectors",
            kernel.name()
        );
        Ok(())
    }

    /// Raw scores as continuous labels
    pub fn apply_regression(&self, data: Option<Arc<SparseFeatures>>) -> Result<RegressionLabels> {
        Ok(RegressionLabels::new(self.apply_get_outputs(data)?))
    }

    /// Raw scores with their sign decision
    pub fn apply_binary(&self, data: Option<Arc<SparseFeatures>>) -> Result<BinaryLabels> {
        Ok(BinaryLabels::from_values(self.apply_get_outputs(data)?))
    }

    /// One score per query vector using the machine's own parallelism
    pub fn apply_get_outputs(&self, data: Option<Arc<SparseFeatures>>) -> Result<Vec<f64>> {
        self.apply_get_outputs_with(data, &self.parallelism)
    }

    /// One score per query vector, in query order
    ///
    /// With `data` the kernel is re-bound to (existing lhs, `data`);
    /// without, the kernel's current rhs is scored.
    pub fn apply_get_outputs_with(
        &self,
        data: Option<Arc<SparseFeatures>>,
        parallelism: &Parallelism,
    ) -> Result<Vec<f64>> {
        self.apply_get_outputs_on(data, &WorkerPool::new(parallelism))
    }

    /// [`apply_get_outputs_with`](Self::apply_get_outputs_with) on workers
    /// the caller already holds
    pub fn apply_get_outputs_on(
        &self,
        data: Option<Arc<SparseFeatures>>,
        workers: &WorkerPool,
    ) -> Result<Vec<f64>> {
        debug!(
            "entering {NAME}::apply_get_outputs({})",
            describe(data.as_ref())
        );
        let shared = self.require_kernel("apply_get_outputs")?;

        if let Some(data) = data.as_ref() {
            let mut kernel = write_kernel(shared)?;
            let lhs = kernel.lhs().ok_or_else(|| {
                MachineError::Configuration(format!(
                    "{NAME}::apply_get_outputs(): No left hand side specified"
                ))
            })?;
            kernel.init(lhs, Arc::clone(data))?;
        }

        let guard = read_kernel(shared)?;
        let kernel: &dyn Kernel = &*guard;

        let num_lhs = kernel.num_vec_lhs();
        if num_lhs == 0 {
            return Err(MachineError::Configuration(format!(
                "{NAME}::apply_get_outputs(): No vectors on left hand side of {}, \
                 support vector indices cannot be resolved",
                kernel.name()
            )));
        }
        self.model.validate(num_lhs)?;

        // The feature set knows its size better than composed kernels do
        let num_vectors = kernel
            .rhs()
            .map_or_else(|| kernel.num_vec_rhs(), |rhs| rhs.num_vectors());
        let mut output = vec![0.0; num_vectors];

        if num_vectors == 0 {
            debug!("leaving {NAME}::apply_get_outputs(): no query vectors");
            return Ok(output);
        }
        debug!("computing output on {num_vectors} test examples");

        if kernel.has_property(KernelProperty::BatchEvaluation) && self.config.use_batch_computation
        {
            trace!("{NAME}: batch evaluation with {}", kernel.name());
            if self.model.num_support_vectors() > 0 {
                let query: Vec<usize> = (0..num_vectors).collect();
                kernel.compute_batch(
                    &mut output,
                    &query,
                    &self.model.support_vectors,
                    &self.model.alpha,
                )?;
            }
            let bias = self.model.bias;
            output.iter_mut().for_each(|o| *o += bias);
        } else {
            trace!("{NAME}: per-example evaluation with {}", kernel.name());
            if self.config.use_linadd
                && kernel.has_property(KernelProperty::LinAdd)
                && !kernel.is_optimization_initialized()
            {
                warn!(
                    "{NAME}: linear-add enabled but {} optimization is not initialised, \
                     call init_kernel_optimization() first",
                    kernel.name()
                );
            }
            workers.fill_blocks(&mut output, |start, block| {
                for (offset, slot) in block.iter_mut().enumerate() {
                    *slot = self.score(kernel, start + offset)?;
                }
                Ok(())
            })?;
        }

        debug!("leaving {NAME}::apply_get_outputs()");
        Ok(output)
    }

    /// Score of rhs vector `num` against the kernel's current binding
    pub fn apply_one(&self, num: usize) -> Result<f64> {
        let shared = self.require_kernel("apply_one")?;
        let guard = read_kernel(shared)?;
        let num_rhs = guard.num_vec_rhs();
        if num >= num_rhs {
            return Err(MachineError::IndexOutOfBounds {
                index: num,
                len: num_rhs,
            });
        }
        self.model.validate(guard.num_vec_lhs())?;
        self.score(&*guard, num)
    }

    /// Shrink the kernel's lhs to the support vectors only
    ///
    /// The lhs is replaced by a copy of the support vectors in model order,
    /// and the support-vector indices become `0..n`.
    pub fn store_model_features(&mut self) -> Result<()> {
        let shared = self.kernel.as_ref().ok_or_else(|| {
            MachineError::Configuration(format!(
                "{NAME}::store_model_features(): kernel is needed to store SV features"
            ))
        })?;
        let mut kernel = write_kernel(shared)?;
        let lhs = kernel.lhs().ok_or_else(|| {
            MachineError::Configuration(format!(
                "{NAME}::store_model_features(): kernel lhs is needed to store SV features"
            ))
        })?;

        let sv_features = Arc::new(lhs.copy_subset(&self.model.support_vectors)?);
        let rhs = kernel.rhs().unwrap_or_else(|| Arc::clone(&sv_features));
        kernel.init(sv_features, rhs)?;
        drop(kernel);

        let n = self.model.support_vectors.len();
        self.model.support_vectors = (0..n).collect();
        debug!("{NAME}: stored {n} support vector features");
        Ok(())
    }

    /// Registered fields with their role, for external persistence
    pub fn parameters(&self) -> Result<Vec<Parameter>> {
        let kernel_name = match &self.kernel {
            Some(shared) => Some(read_kernel(shared)?.name().to_string()),
            None => None,
        };

        Ok(vec![
            Parameter::new(
                "kernel",
                "Kernel function.",
                ParameterKind::Hyper,
                ParameterValue::Name(kernel_name),
            ),
            Parameter::new(
                "use_batch_computation",
                "Batch computation is enabled.",
                ParameterKind::Setting,
                ParameterValue::Bool(self.config.use_batch_computation),
            ),
            Parameter::new(
                "use_linadd",
                "Linadd is enabled.",
                ParameterKind::Setting,
                ParameterValue::Bool(self.config.use_linadd),
            ),
            Parameter::new(
                "use_bias",
                "Bias shall be used.",
                ParameterKind::Setting,
                ParameterValue::Bool(self.config.use_bias),
            ),
            Parameter::new(
                "m_bias",
                "Bias term.",
                ParameterKind::Model,
                ParameterValue::Float(self.model.bias),
            ),
            Parameter::new(
                "m_alpha",
                "Array of coefficients alpha.",
                ParameterKind::Model,
                ParameterValue::Floats(self.model.alpha.clone()),
            ),
            Parameter::new(
                "m_svs",
                "Indices of support vectors.",
                ParameterKind::Model,
                ParameterValue::Indices(self.model.support_vectors.clone()),
            ),
        ])
    }

    fn require_kernel(&self, operation: &str) -> Result<&SharedKernel> {
        self.kernel.as_ref().ok_or_else(|| {
            MachineError::Configuration(format!("{NAME}::{operation}(): No kernel assigned"))
        })
    }

    fn score(&self, kernel: &dyn Kernel, vec: usize) -> Result<f64> {
        let score = if kernel.has_property(KernelProperty::LinAdd)
            && kernel.is_optimization_initialized()
        {
            kernel.compute_optimized(vec)?
        } else {
            self.model
                .alpha
                .iter()
                .zip(&self.model.support_vectors)
                .map(|(&alpha, &sv)| kernel.kernel(sv, vec) * alpha)
                .sum()
        };
        Ok(score + self.model.bias)
    }
}

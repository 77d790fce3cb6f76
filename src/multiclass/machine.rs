//! Multiclass machine composed of one kernel machine per class

use crate::core::{MachineError, MulticlassLabels, Parallelism, Result, SparseFeatures};
use crate::kernel::traits::write_kernel;
use crate::kernel::{KernelProperty, SharedKernel};
use crate::machine::KernelMachine;
use crate::multiclass::{MulticlassStrategy, ProbHeuristic};
use crate::utils::WorkerPool;
use log::debug;
use std::sync::Arc;

const NAME: &str = "KernelMulticlassMachine";

/// Per-class kernel machines sharing one kernel, decoded by a strategy
///
/// Sub-machine `k` scores class `k`. All sub-machines are re-pointed at the
/// multiclass machine's kernel when added, so binding a query set once
/// serves every class. The kernel's linear-add cache belongs to whichever
/// class is being scored: it is rebuilt per class and dropped afterwards.
pub struct KernelMulticlassMachine {
    strategy: Box<dyn MulticlassStrategy>,
    kernel: SharedKernel,
    machines: Vec<KernelMachine>,
    sigmoid: Option<(Vec<f64>, Vec<f64>)>,
    parallelism: Parallelism,
}

impl KernelMulticlassMachine {
    pub fn new(strategy: Box<dyn MulticlassStrategy>, kernel: SharedKernel) -> Self {
        Self {
            strategy,
            kernel,
            machines: Vec::new(),
            sigmoid: None,
            parallelism: Parallelism::default(),
        }
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Per-class sigmoid parameters used by softmax rescaling
    pub fn with_sigmoid_params(mut self, a: Vec<f64>, b: Vec<f64>) -> Self {
        self.sigmoid = Some((a, b));
        self
    }

    pub fn strategy(&self) -> &dyn MulticlassStrategy {
        self.strategy.as_ref()
    }

    pub fn strategy_mut(&mut self) -> &mut dyn MulticlassStrategy {
        self.strategy.as_mut()
    }

    pub fn kernel(&self) -> SharedKernel {
        Arc::clone(&self.kernel)
    }

    /// Append the sub-machine for the next class
    pub fn add_machine(&mut self, mut machine: KernelMachine) {
        machine.set_kernel(Some(Arc::clone(&self.kernel)));
        self.machines.push(machine);
    }

    pub fn set_machines(&mut self, machines: Vec<KernelMachine>) {
        self.machines.clear();
        machines.into_iter().for_each(|m| self.add_machine(m));
    }

    pub fn machines(&self) -> &[KernelMachine] {
        &self.machines
    }

    pub fn num_machines(&self) -> usize {
        self.machines.len()
    }

    /// One label per query vector, `REJECTION_LABEL` where rejected
    pub fn apply_multiclass(&self, data: Option<Arc<SparseFeatures>>) -> Result<MulticlassLabels> {
        let workers = WorkerPool::new(&self.parallelism);
        let outputs = self.class_outputs(data, &workers)?;
        let num_vectors = outputs.first().map_or(0, Vec::len);

        let mut labels = vec![0i32; num_vectors];
        workers.fill_blocks(&mut labels, |start, block| {
            for (offset, slot) in block.iter_mut().enumerate() {
                let mut row = column(&outputs, start + offset);
                self.rescale(&mut row)?;
                *slot = self.strategy.decide_label(&row);
            }
            Ok(())
        })?;

        Ok(MulticlassLabels::new(labels))
    }

    /// The `n` best classes per query vector, best first
    pub fn apply_multiclass_multiple_output(
        &self,
        data: Option<Arc<SparseFeatures>>,
        n: usize,
    ) -> Result<Vec<Vec<usize>>> {
        let workers = WorkerPool::new(&self.parallelism);
        let outputs = self.class_outputs(data, &workers)?;
        let num_vectors = outputs.first().map_or(0, Vec::len);

        let mut ranked = vec![Vec::new(); num_vectors];
        workers.fill_blocks(&mut ranked, |start, block| {
            for (offset, slot) in block.iter_mut().enumerate() {
                let row = column(&outputs, start + offset);
                *slot = self.strategy.decide_label_multiple_output(&row, n);
            }
            Ok(())
        })?;

        Ok(ranked)
    }

    fn rescale(&self, row: &mut [f64]) -> Result<()> {
        match (&self.sigmoid, self.strategy.prob_heuristic()) {
            (_, ProbHeuristic::None) => Ok(()),
            (Some((a, b)), _) => self.strategy.rescale_outputs_with_sigmoid(row, a, b),
            (None, _) => self.strategy.rescale_outputs(row),
        }
    }

    /// Outputs of every sub-machine, indexed `[class][vector]`
    fn class_outputs(
        &self,
        data: Option<Arc<SparseFeatures>>,
        workers: &WorkerPool,
    ) -> Result<Vec<Vec<f64>>> {
        let num_classes = self.strategy.num_classes();
        if num_classes == 0 {
            return Err(MachineError::Configuration(format!(
                "{NAME}: strategy {} has no classes",
                self.strategy.name()
            )));
        }
        if self.machines.len() != num_classes {
            return Err(MachineError::dimension_mismatch(
                format!("{NAME} sub-machines"),
                num_classes,
                self.machines.len(),
            ));
        }

        if let Some(data) = data {
            let mut kernel = write_kernel(&self.kernel)?;
            let lhs = kernel.lhs().ok_or_else(|| {
                MachineError::Configuration(format!("{NAME}: No left hand side specified"))
            })?;
            kernel.init(lhs, data)?;
        }

        debug!("{NAME}: scoring {num_classes} classes");
        self.machines
            .iter()
            .map(|machine| self.score_class(machine, workers))
            .collect()
    }

    /// Outputs of one sub-machine against the bound query set
    ///
    /// Any linear-add cache left on the shared kernel is dropped first. A
    /// sub-machine on the per-example path with linear-add enabled gets a
    /// cache built from its own model, dropped again once it is scored.
    fn score_class(&self, machine: &KernelMachine, workers: &WorkerPool) -> Result<Vec<f64>> {
        let own_cache = {
            let mut kernel = write_kernel(&self.kernel)?;
            kernel.delete_optimization();
            let batch = kernel.has_property(KernelProperty::BatchEvaluation)
                && machine.batch_computation_enabled();
            !batch
                && machine.linadd_enabled()
                && machine.num_support_vectors() > 0
                && kernel.has_property(KernelProperty::LinAdd)
        };

        if own_cache {
            machine.init_kernel_optimization()?;
        }
        let outputs = machine.apply_get_outputs_on(None, workers);
        if own_cache {
            write_kernel(&self.kernel)?.delete_optimization();
        }
        outputs
    }
}

fn column(outputs: &[Vec<f64>], i: usize) -> Vec<f64> {
    outputs.iter().map(|class| class[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KernelMachineConfig;
    use crate::kernel::{shared_kernel, Kernel, LinearKernel};
    use crate::multiclass::{OneVsRestStrategy, ThresholdRejectionStrategy};

    fn axis_machine(strategy: OneVsRestStrategy) -> (KernelMulticlassMachine, Arc<SparseFeatures>) {
        axis_machine_with(strategy, KernelMachineConfig::default())
    }

    /// Three prototypes on the axes; class k scores the k-th coordinate
    fn axis_machine_with(
        strategy: OneVsRestStrategy,
        config: KernelMachineConfig,
    ) -> (KernelMulticlassMachine, Arc<SparseFeatures>) {
        let train = Arc::new(SparseFeatures::from_dense_rows(&[
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ]));
        let mut kernel = LinearKernel::new();
        kernel
            .init(Arc::clone(&train), train)
            .expect("init");

        let mut machine =
            KernelMulticlassMachine::new(Box::new(strategy), shared_kernel(kernel));
        let shared = machine.kernel();
        for class in 0..3 {
            machine.add_machine(
                KernelMachine::with_model(Arc::clone(&shared), vec![1.0], vec![class], 0.0)
                    .expect("model")
                    .with_config(config),
            );
        }

        let queries = Arc::new(SparseFeatures::from_dense_rows(&[
            vec![0.9, 0.1, 0.0],
            vec![0.0, 0.2, 0.7],
            vec![0.3, 0.6, 0.1],
            vec![0.1, 0.1, 0.1],
        ]));
        (machine, queries)
    }

    #[test]
    fn test_apply_multiclass() {
        let (machine, queries) = axis_machine(OneVsRestStrategy::with_num_classes(3));
        let labels = machine.apply_multiclass(Some(queries)).expect("labels");

        // Ties on the last query resolve to the first class
        assert_eq!(labels.labels(), &[0, 2, 1, 0]);
    }

    /// A linear-add cache built by one sub-machine must not score the others
    #[test]
    fn test_cache_of_one_class_not_used_for_others() {
        let config = KernelMachineConfig::default()
            .with_batch_computation(false)
            .with_linadd(false);
        let (machine, queries) = axis_machine_with(OneVsRestStrategy::with_num_classes(3), config);

        let before = machine
            .apply_multiclass(Some(Arc::clone(&queries)))
            .expect("labels");
        machine.machines()[0]
            .init_kernel_optimization()
            .expect("cache for class 0");
        let after = machine.apply_multiclass(Some(queries)).expect("labels");

        assert_eq!(before.labels(), &[0, 2, 1, 0]);
        assert_eq!(after.labels(), before.labels());
    }

    #[test]
    fn test_each_class_builds_its_own_cache() {
        let config = KernelMachineConfig::default().with_batch_computation(false);
        let (machine, queries) = axis_machine_with(OneVsRestStrategy::with_num_classes(3), config);
        let machine = machine.with_parallelism(Parallelism::with_threads(2));
        machine.machines()[2]
            .init_kernel_optimization()
            .expect("cache for class 2");

        let labels = machine.apply_multiclass(Some(queries)).expect("labels");
        assert_eq!(labels.labels(), &[0, 2, 1, 0]);

        let shared = machine.kernel();
        let kernel = shared.read().expect("kernel lock");
        assert!(!kernel.is_optimization_initialized());
    }

    #[test]
    fn test_apply_multiclass_with_rejection() {
        let strategy = OneVsRestStrategy::with_num_classes(3)
            .with_rejection_strategy(Arc::new(ThresholdRejectionStrategy::new(0.5)));
        let (machine, queries) = axis_machine(strategy);
        let labels = machine.apply_multiclass(Some(queries)).expect("labels");

        assert_eq!(
            labels.labels(),
            &[0, 2, 1, MulticlassLabels::REJECTION_LABEL]
        );
    }

    #[test]
    fn test_normalised_outputs_keep_decision() {
        let strategy = OneVsRestStrategy::with_num_classes(3)
            .with_prob_heuristic(ProbHeuristic::OvaNorm);
        let (machine, queries) = axis_machine(strategy);
        let labels = machine.apply_multiclass(Some(queries)).expect("labels");

        assert_eq!(labels.labels(), &[0, 2, 1, 0]);
    }

    #[test]
    fn test_multiple_output() {
        let (machine, queries) = axis_machine(OneVsRestStrategy::with_num_classes(3));
        let ranked = machine
            .apply_multiclass_multiple_output(Some(queries), 2)
            .expect("ranked");

        assert_eq!(ranked, vec![vec![0, 1], vec![2, 1], vec![1, 0], vec![0, 1]]);
    }

    #[test]
    fn test_machine_count_must_match_classes() {
        let (mut machine, queries) = axis_machine(OneVsRestStrategy::with_num_classes(4));
        assert!(matches!(
            machine.apply_multiclass(Some(Arc::clone(&queries))),
            Err(MachineError::DimensionMismatch {
                expected: 4,
                actual: 3,
                ..
            })
        ));

        machine.strategy_mut().set_num_classes(3);
        assert_eq!(machine.num_machines(), 3);
        assert!(machine.apply_multiclass(Some(queries)).is_ok());
    }

    #[test]
    fn test_add_machine_shares_kernel() {
        let (machine, _) = axis_machine(OneVsRestStrategy::with_num_classes(3));
        let shared = machine.kernel();
        for sub in machine.machines() {
            let kernel = sub.kernel().expect("kernel set");
            assert!(Arc::ptr_eq(&kernel, &shared));
        }
    }
}

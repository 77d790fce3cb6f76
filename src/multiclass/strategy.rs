//! Multiclass strategy contract and shared training state

use crate::core::{BinaryLabels, MachineError, MulticlassLabels, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Heuristic turning raw per-class scores into pseudo-probabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbHeuristic {
    #[default]
    None,
    /// One-vs-rest: divide by the sum of outputs
    OvaNorm,
    /// One-vs-rest: sigmoid-parameterised exponentials, then normalise
    OvaSoftmax,
    OvoPrice,
    OvoHastie,
    OvoHamamura,
}

/// Decides whether a set of per-class outputs is too weak to label
pub trait RejectionStrategy: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// True when no label should be assigned for `outputs`
    fn reject(&self, outputs: &[f64]) -> bool;
}

/// State shared by every strategy implementation
#[derive(Debug, Clone, Default)]
pub struct StrategyState {
    pub(crate) orig_labels: Option<MulticlassLabels>,
    pub(crate) train_labels: Option<BinaryLabels>,
    pub(crate) train_iter: usize,
    pub(crate) num_classes: usize,
    pub(crate) rejection: Option<Arc<dyn RejectionStrategy>>,
    pub(crate) prob_heuristic: ProbHeuristic,
}

impl StrategyState {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Self::default()
        }
    }

    /// Check that a training iteration may start; returns its index
    pub(crate) fn next_iteration(&self, owner: &str) -> Result<usize> {
        if self.orig_labels.is_none() {
            return Err(MachineError::Configuration(format!(
                "{owner}::train_prepare_next(): train_start() was not called"
            )));
        }
        if self.train_iter >= self.num_classes {
            return Err(MachineError::Configuration(format!(
                "{owner}::train_prepare_next(): all {} classes already prepared",
                self.num_classes
            )));
        }
        Ok(self.train_iter)
    }
}

/// Decomposition of a multiclass problem into binary sub-problems
///
/// Training walks `train_start`, then `train_prepare_next` while
/// `train_has_more`, then `train_stop`. Decoding maps one output per
/// sub-machine to a class.
pub trait MulticlassStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn state(&self) -> &StrategyState;

    fn state_mut(&mut self) -> &mut StrategyState;

    fn num_classes(&self) -> usize {
        self.state().num_classes
    }

    fn set_num_classes(&mut self, num_classes: usize) {
        self.state_mut().num_classes = num_classes;
    }

    fn train_iter(&self) -> usize {
        self.state().train_iter
    }

    /// Binary labels produced by the last `train_prepare_next`
    fn train_labels(&self) -> Option<&BinaryLabels> {
        self.state().train_labels.as_ref()
    }

    fn rejection_strategy(&self) -> Option<Arc<dyn RejectionStrategy>> {
        self.state().rejection.clone()
    }

    fn set_rejection_strategy(&mut self, rejection: Option<Arc<dyn RejectionStrategy>>) {
        self.state_mut().rejection = rejection;
    }

    fn prob_heuristic(&self) -> ProbHeuristic {
        self.state().prob_heuristic
    }

    fn set_prob_heuristic(&mut self, heuristic: ProbHeuristic) {
        self.state_mut().prob_heuristic = heuristic;
    }

    /// Begin training against `orig_labels`
    fn train_start(&mut self, orig_labels: MulticlassLabels) -> Result<()> {
        let num_classes = orig_labels.num_classes();
        if num_classes == 0 {
            return Err(MachineError::Configuration(format!(
                "{}::train_start(): labels contain no classes",
                self.name()
            )));
        }
        let state = self.state_mut();
        state.train_labels = Some(BinaryLabels::with_len(orig_labels.len()));
        state.orig_labels = Some(orig_labels);
        state.num_classes = num_classes;
        state.train_iter = 0;
        Ok(())
    }

    fn train_has_more(&self) -> bool {
        let state = self.state();
        state.orig_labels.is_some() && state.train_iter < state.num_classes
    }

    /// Relabel the training set for the next sub-machine
    fn train_prepare_next(&mut self) -> Result<&BinaryLabels>;

    fn train_stop(&mut self) {
        let state = self.state_mut();
        state.orig_labels = None;
        state.train_labels = None;
    }

    /// Class for one set of outputs, or the rejection label
    fn decide_label(&self, outputs: &[f64]) -> i32;

    /// The `n` best classes, best first
    fn decide_label_multiple_output(&self, outputs: &[f64], n: usize) -> Vec<usize>;

    /// Rescale outputs in place with the configured heuristic
    fn rescale_outputs(&self, outputs: &mut [f64]) -> Result<()>;

    /// Rescale outputs with per-class sigmoid parameters `a` and `b`
    fn rescale_outputs_with_sigmoid(&self, outputs: &mut [f64], a: &[f64], b: &[f64])
        -> Result<()>;
}

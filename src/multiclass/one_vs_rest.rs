//! One-vs-rest decomposition
//!
//! Trains one binary sub-machine per class (class k against all others)
//! and decodes by picking the class whose sub-machine scores highest.

use crate::core::{BinaryLabels, MachineError, MulticlassLabels, Result};
use crate::multiclass::{MulticlassStrategy, ProbHeuristic, RejectionStrategy, StrategyState};
use crate::utils::{arg_max, argsort_descending};
use log::trace;
use std::sync::Arc;

const NAME: &str = "OneVsRestStrategy";

/// Added to the normaliser so all-zero outputs stay finite
const NORM_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Default)]
pub struct OneVsRestStrategy {
    state: StrategyState,
}

impl OneVsRestStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategy for decoding only, without a training pass
    pub fn with_num_classes(num_classes: usize) -> Self {
        Self {
            state: StrategyState::new(num_classes),
        }
    }

    pub fn with_prob_heuristic(mut self, heuristic: ProbHeuristic) -> Self {
        self.state.prob_heuristic = heuristic;
        self
    }

    pub fn with_rejection_strategy(mut self, rejection: Arc<dyn RejectionStrategy>) -> Self {
        self.state.rejection = Some(rejection);
        self
    }

    fn check_outputs(&self, operation: &str, name: &str, len: usize) -> Result<()> {
        if len != self.state.num_classes {
            return Err(MachineError::dimension_mismatch(
                format!("{NAME}::{operation}() {name}"),
                self.state.num_classes,
                len,
            ));
        }
        Ok(())
    }

    fn rescale_norm(&self, outputs: &mut [f64]) -> Result<()> {
        self.check_outputs("rescale_heuristic_norm", "outputs", outputs.len())?;
        normalise(outputs);
        Ok(())
    }

    fn rescale_softmax(&self, outputs: &mut [f64], a: &[f64], b: &[f64]) -> Result<()> {
        self.check_outputs("rescale_heuristic_softmax", "outputs", outputs.len())?;
        self.check_outputs("rescale_heuristic_softmax", "a", a.len())?;
        self.check_outputs("rescale_heuristic_softmax", "b", b.len())?;

        for ((output, &a), &b) in outputs.iter_mut().zip(a).zip(b) {
            *output = (-a * *output - b).exp();
        }
        normalise(outputs);
        Ok(())
    }

    fn unknown_heuristic(&self) -> MachineError {
        MachineError::Configuration(format!(
            "{NAME}: unknown one-vs-rest probability heuristic {:?}",
            self.state.prob_heuristic
        ))
    }
}

fn normalise(outputs: &mut [f64]) {
    let norm = outputs.iter().sum::<f64>() + NORM_EPSILON;
    for output in outputs.iter_mut() {
        *output /= norm;
    }
}

impl MulticlassStrategy for OneVsRestStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StrategyState {
        &mut self.state
    }

    fn train_prepare_next(&mut self) -> Result<&BinaryLabels> {
        let class = self.state.next_iteration(NAME)? as i32;
        let state = &mut self.state;
        let (Some(orig), Some(train)) = (state.orig_labels.as_ref(), state.train_labels.as_mut())
        else {
            return Err(MachineError::Configuration(format!(
                "{NAME}::train_prepare_next(): train_start() was not called"
            )));
        };

        for (i, &label) in orig.labels().iter().enumerate() {
            train.set_label(i, if label == class { 1.0 } else { -1.0 });
        }
        trace!("{NAME}: prepared class {class} against the rest");
        state.train_iter += 1;
        Ok(train)
    }

    fn decide_label(&self, outputs: &[f64]) -> i32 {
        if let Some(rejection) = &self.state.rejection {
            if rejection.reject(outputs) {
                return MulticlassLabels::REJECTION_LABEL;
            }
        }
        arg_max(outputs).map_or(MulticlassLabels::REJECTION_LABEL, |i| i as i32)
    }

    fn decide_label_multiple_output(&self, outputs: &[f64], n: usize) -> Vec<usize> {
        let mut ranked = argsort_descending(outputs);
        ranked.truncate(n);
        ranked
    }

    fn rescale_outputs(&self, outputs: &mut [f64]) -> Result<()> {
        match self.state.prob_heuristic {
            ProbHeuristic::None => Ok(()),
            ProbHeuristic::OvaNorm => self.rescale_norm(outputs),
            ProbHeuristic::OvaSoftmax => Err(MachineError::Configuration(format!(
                "{NAME}::rescale_outputs(): softmax rescaling needs sigmoid parameters"
            ))),
            _ => Err(self.unknown_heuristic()),
        }
    }

    fn rescale_outputs_with_sigmoid(
        &self,
        outputs: &mut [f64],
        a: &[f64],
        b: &[f64],
    ) -> Result<()> {
        match self.state.prob_heuristic {
            ProbHeuristic::OvaSoftmax => self.rescale_softmax(outputs, a, b),
            _ => self.rescale_outputs(outputs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiclass::ThresholdRejectionStrategy;
    use approx::assert_relative_eq;

    #[test]
    fn test_prepare_next_relabels_one_class() {
        let mut strategy = OneVsRestStrategy::new();
        strategy
            .train_start(MulticlassLabels::new(vec![0, 2, 1, 2, 0]))
            .expect("start");
        assert_eq!(strategy.num_classes(), 3);
        assert_eq!(strategy.train_iter(), 0);

        let labels = strategy.train_prepare_next().expect("class 0");
        assert_eq!(labels.labels(), &[1.0, -1.0, -1.0, -1.0, 1.0]);
        let labels = strategy.train_prepare_next().expect("class 1");
        assert_eq!(labels.labels(), &[-1.0, -1.0, 1.0, -1.0, -1.0]);
        let labels = strategy.train_prepare_next().expect("class 2");
        assert_eq!(labels.labels(), &[-1.0, 1.0, -1.0, 1.0, -1.0]);

        assert_eq!(strategy.train_iter(), 3);
        assert!(!strategy.train_has_more());
        assert!(matches!(
            strategy.train_prepare_next(),
            Err(MachineError::Configuration(_))
        ));

        strategy.train_stop();
        assert!(strategy.train_labels().is_none());
    }

    #[test]
    fn test_prepare_next_requires_start() {
        let mut strategy = OneVsRestStrategy::with_num_classes(2);
        assert!(!strategy.train_has_more());
        assert!(strategy.train_prepare_next().is_err());
    }

    #[test]
    fn test_decide_label_first_maximum() {
        let strategy = OneVsRestStrategy::with_num_classes(4);
        let outputs = [0.2, 0.9, 0.9, 0.1];

        assert_eq!(strategy.decide_label(&outputs), 1);
        assert_eq!(strategy.decide_label_multiple_output(&outputs, 2), vec![1, 2]);
        assert_eq!(
            strategy.decide_label_multiple_output(&outputs, 10),
            vec![1, 2, 0, 3]
        );
    }

    #[test]
    fn test_decide_label_with_rejection() {
        let strategy = OneVsRestStrategy::with_num_classes(3)
            .with_rejection_strategy(Arc::new(ThresholdRejectionStrategy::new(0.5)));

        assert_eq!(
            strategy.decide_label(&[0.1, 0.4, 0.2]),
            MulticlassLabels::REJECTION_LABEL
        );
        assert_eq!(strategy.decide_label(&[0.1, 0.4, 0.7]), 2);
    }

    #[test]
    fn test_rescale_norm() {
        let strategy =
            OneVsRestStrategy::with_num_classes(3).with_prob_heuristic(ProbHeuristic::OvaNorm);
        let mut outputs = vec![1.0, 1.0, 2.0];
        strategy.rescale_outputs(&mut outputs).expect("rescale");

        assert_relative_eq!(outputs[0], 0.25, epsilon = 1e-9);
        assert_relative_eq!(outputs[1], 0.25, epsilon = 1e-9);
        assert_relative_eq!(outputs[2], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rescale_mismatch_leaves_outputs() {
        let strategy =
            OneVsRestStrategy::with_num_classes(3).with_prob_heuristic(ProbHeuristic::OvaNorm);
        let mut outputs = vec![1.0, 2.0];
        assert!(matches!(
            strategy.rescale_outputs(&mut outputs),
            Err(MachineError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
        assert_eq!(outputs, vec![1.0, 2.0]);

        let strategy = strategy.with_prob_heuristic(ProbHeuristic::OvaSoftmax);
        assert!(strategy
            .rescale_outputs_with_sigmoid(&mut outputs, &[1.0; 3], &[0.0; 3])
            .is_err());
        assert_eq!(outputs, vec![1.0, 2.0]);
    }

    #[test]
    fn test_rescale_softmax() {
        let strategy =
            OneVsRestStrategy::with_num_classes(2).with_prob_heuristic(ProbHeuristic::OvaSoftmax);
        let mut outputs = vec![0.0, 1.0];
        strategy
            .rescale_outputs_with_sigmoid(&mut outputs, &[-1.0, -1.0], &[0.0, 0.0])
            .expect("rescale");

        let total = 1.0 + std::f64::consts::E;
        assert_relative_eq!(outputs[0], 1.0 / total, epsilon = 1e-9);
        assert_relative_eq!(outputs[1], std::f64::consts::E / total, epsilon = 1e-9);

        let mut short_params = vec![0.0, 1.0];
        assert!(strategy
            .rescale_outputs_with_sigmoid(&mut short_params, &[1.0], &[0.0, 0.0])
            .is_err());
    }

    #[test]
    fn test_rescale_configuration_errors() {
        let mut outputs = vec![1.0, 2.0];

        let softmax =
            OneVsRestStrategy::with_num_classes(2).with_prob_heuristic(ProbHeuristic::OvaSoftmax);
        assert!(matches!(
            softmax.rescale_outputs(&mut outputs),
            Err(MachineError::Configuration(_))
        ));

        let pairwise =
            OneVsRestStrategy::with_num_classes(2).with_prob_heuristic(ProbHeuristic::OvoHastie);
        assert!(matches!(
            pairwise.rescale_outputs(&mut outputs),
            Err(MachineError::Configuration(_))
        ));

        let none = OneVsRestStrategy::with_num_classes(5);
        none.rescale_outputs(&mut outputs).expect("no-op");
        assert_eq!(outputs, vec![1.0, 2.0]);
    }
}

//! Named, tagged parameter listings for external persistence layers

use serde::{Deserialize, Serialize};

/// Role a parameter plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Chosen before training, e.g. the kernel
    Hyper,
    /// Behavioural switch
    Setting,
    /// Learned state
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Float(f64),
    Floats(Vec<f64>),
    Indices(Vec<usize>),
    Name(Option<String>),
}

/// One registered field of a machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
    pub value: ParameterValue,
}

impl Parameter {
    pub fn new(
        name: &str,
        description: &str,
        kind: ParameterKind,
        value: ParameterValue,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            value,
        }
    }
}

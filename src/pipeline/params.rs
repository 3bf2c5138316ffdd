//! Hyperparameter values, candidate sets and the exhaustive grid

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

/// A single hyperparameter value as written in `model.yaml`.
///
/// `hidden_layer_sizes` style values are lists; everything else is a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// A layer-size list: either `[10, 5]` or a bare `10` meaning `[10]`.
    pub fn as_usize_list(&self) -> Option<Vec<usize>> {
        match self {
            ParamValue::List(items) => items.iter().map(ParamValue::as_usize).collect(),
            other => other.as_usize().map(|v| vec![v]),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                if inner.len() == 1 {
                    write!(f, "({},)", inner[0])
                } else {
                    write!(f, "({})", inner.join(", "))
                }
            }
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::List(v.into_iter().map(ParamValue::Int).collect())
    }
}

/// One concrete assignment of hyperparameters (one grid candidate).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(pub BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{{defaults}}");
        }
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Parameter name -> list of values to try.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(pub BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.0.insert(name.to_string(), values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parameter names in enumeration order.
    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }

    /// Enumerate every candidate.
    ///
    /// Names are visited in sorted order and the last name varies fastest, so
    /// the enumeration is fixed for a given grid. An empty grid yields exactly
    /// one candidate with no overrides.
    pub fn candidates(&self) -> Result<Vec<ParamSet>> {
        for (name, values) in &self.0 {
            if values.is_empty() {
                return Err(ChurnError::InvalidParameter {
                    name: name.clone(),
                    value: "[]".to_string(),
                    reason: "parameter grid values must be a non-empty list".to_string(),
                });
            }
        }

        let mut candidates = vec![ParamSet::new()];
        for (name, values) in &self.0 {
            candidates = candidates
                .into_iter()
                .flat_map(|base| {
                    values
                        .iter()
                        .map(move |v| base.clone().with(name, v.clone()))
                        .collect::<Vec<_>>()
                })
                .collect();
        }

        Ok(candidates)
    }
}

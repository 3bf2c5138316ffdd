//! Serde helpers for floats that may be non-finite
//!
//! JSON has no literal for NaN or infinity and `serde_json` writes them as
//! `null`, which does not read back as `f64`. These helpers write non-finite
//! values as the strings `"NaN"`, `"inf"` and `"-inf"` instead.
//!
//! Use with `#[serde(with = "crate::utils::serde_float")]` on an `f64`, or the
//! `map` / `map_vec` submodules on score maps.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if *value > 0.0 {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_str("-inf")
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(v) => Ok(v),
        Repr::Text(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            other => Err(D::Error::custom(format!("invalid float '{}'", other))),
        },
    }
}

#[derive(Clone, Copy)]
struct Float(f64);

impl Serialize for Float {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Float {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize(deserializer).map(Float)
    }
}

pub mod map {
    use super::*;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let wrapped: BTreeMap<&String, Float> = map.iter().map(|(k, v)| (k, Float(*v))).collect();
        wrapped.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, f64>, D::Error> {
        let wrapped: BTreeMap<String, Float> = BTreeMap::deserialize(deserializer)?;
        Ok(wrapped.into_iter().map(|(k, v)| (k, v.0)).collect())
    }
}

pub mod map_vec {
    use super::*;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<f64>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let wrapped: BTreeMap<&String, Vec<Float>> = map
            .iter()
            .map(|(k, v)| (k, v.iter().copied().map(Float).collect()))
            .collect();
        wrapped.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<f64>>, D::Error> {
        let wrapped: BTreeMap<String, Vec<Float>> = BTreeMap::deserialize(deserializer)?;
        Ok(wrapped
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().map(|f| f.0).collect()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Bounds {
        #[serde(with = "crate::utils::serde_float")]
        lower: f64,
        #[serde(with = "crate::utils::serde_float")]
        upper: f64,
        #[serde(with = "crate::utils::serde_float::map")]
        scores: BTreeMap<String, f64>,
    }

    #[test]
    fn test_non_finite_values_survive_json() {
        let bounds = Bounds {
            lower: f64::NEG_INFINITY,
            upper: 2.5,
            scores: [("roc_auc".to_string(), f64::NAN)].into_iter().collect(),
        };
        let json = serde_json::to_string(&bounds).unwrap();
        assert!(json.contains("\"-inf\""));

        let back: Bounds = serde_json::from_str(&json).unwrap();
        assert_eq!(back.lower, f64::NEG_INFINITY);
        assert_eq!(back.upper, 2.5);
        assert!(back.scores["roc_auc"].is_nan());
    }

    #[test]
    fn test_unknown_text_rejected() {
        let result: Result<Bounds, _> =
            serde_json::from_str(r#"{"lower": "low", "upper": 1.0, "scores": {}}"#);
        assert!(result.is_err());
    }
}

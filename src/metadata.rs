//! Metadata attached to points and lines.
//!
//! Values are a closed set of kinds so the merge rules can match on them
//! exhaustively. Stored blobs are plain JSON objects whose values are strings,
//! numbers, booleans or arrays of those.

use crate::errors::{NetworkError, Result, validation_err};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<MetaValue>),
}

impl MetaValue {
    pub fn kind(&self) -> &'static str {
        match self {
            MetaValue::Bool(_) => "boolean",
            MetaValue::Number(_) => "number",
            MetaValue::Text(_) => "string",
            MetaValue::List(_) => "list",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            MetaValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// NaN and infinities have no JSON representation.
    pub fn is_finite(&self) -> bool {
        match self {
            MetaValue::Number(n) => n.is_finite(),
            MetaValue::List(items) => items.iter().all(MetaValue::is_finite),
            MetaValue::Bool(_) | MetaValue::Text(_) => true,
        }
    }

    /// Combine `source` into `target` following the merge rule table.
    /// `None` means the kinds are incompatible.
    fn merged_with(&self, source: &MetaValue) -> Option<MetaValue> {
        match (self, source) {
            (MetaValue::List(target), MetaValue::List(source)) => {
                let mut combined: Vec<MetaValue> = Vec::with_capacity(target.len() + source.len());
                for item in target.iter().chain(source.iter()) {
                    if !combined.contains(item) {
                        combined.push(item.clone());
                    }
                }
                Some(MetaValue::List(combined))
            }
            (MetaValue::Number(target), MetaValue::Number(source)) => {
                Some(MetaValue::Number(target.max(*source)))
            }
            (MetaValue::Bool(target), MetaValue::Bool(source)) => {
                Some(MetaValue::Bool(*target || *source))
            }
            (MetaValue::Text(target), MetaValue::Text(source)) => {
                Some(MetaValue::Text(format!("{}/{}", target, source)))
            }
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Number(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Number(value as f64)
    }
}

impl From<i32> for MetaValue {
    fn from(value: i32) -> Self {
        MetaValue::Number(value as f64)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl<T: Into<MetaValue>> From<Vec<T>> for MetaValue {
    fn from(items: Vec<T>) -> Self {
        MetaValue::List(items.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetaValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a MetaValue) -> &'a MetaValue {
        self.0.get(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetaValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetaValue)> {
        self.0.iter()
    }

    /// Merge `source` into `self` key by key.
    ///
    /// Either every key merges and `self` is replaced, or an error is returned
    /// and `self` is left untouched.
    pub fn merge_from(&mut self, source: &Metadata) -> Result<()> {
        let merged = self.merged_with(source)?;
        *self = merged;
        Ok(())
    }

    pub fn merged_with(&self, source: &Metadata) -> Result<Metadata> {
        let mut merged = self.0.clone();
        for (key, source_value) in &source.0 {
            match merged.get(key) {
                None => {
                    merged.insert(key.clone(), source_value.clone());
                }
                Some(target_value) => {
                    let combined = target_value.merged_with(source_value).ok_or_else(|| {
                        NetworkError::MetadataMerge {
                            key: key.clone(),
                            target_kind: target_value.kind(),
                            source_kind: source_value.kind(),
                        }
                    })?;
                    merged.insert(key.clone(), combined);
                }
            }
        }
        Ok(Metadata(merged))
    }

    /// Rejects any key holding a non-finite number.
    pub fn validate(&self) -> Result<()> {
        match self.0.iter().find(|(_, value)| !value.is_finite()) {
            Some((key, _)) => Err(validation_err!(
                "metadata key '{}' holds a non-finite number",
                key
            )),
            None => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        let object = self
            .0
            .iter()
            .map(|(key, value)| {
                meta_value_to_json(value)
                    .map(|json| (key.clone(), json))
                    .ok_or_else(|| {
                        validation_err!("metadata key '{}' holds a non-finite number", key)
                    })
            })
            .collect::<Result<serde_json::Map<String, serde_json::Value>>>()?;
        Ok(serde_json::Value::Object(object))
    }

    pub fn from_json(value: &serde_json::Value) -> std::result::Result<Self, String> {
        match value {
            serde_json::Value::Null => Ok(Metadata::new()),
            serde_json::Value::Object(_) => {
                serde_json::from_value(value.clone()).map_err(|e| e.to_string())
            }
            other => Err(format!("metadata must be a JSON object, got {}", other)),
        }
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Metadata(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

fn meta_value_to_json(value: &MetaValue) -> Option<serde_json::Value> {
    match value {
        MetaValue::Bool(b) => Some(serde_json::Value::Bool(*b)),
        MetaValue::Number(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number),
        MetaValue::Text(s) => Some(serde_json::Value::String(s.clone())),
        MetaValue::List(items) => items
            .iter()
            .map(meta_value_to_json)
            .collect::<Option<Vec<_>>>()
            .map(serde_json::Value::Array),
    }
}

/// Key/value conditions over metadata. A point matches when every condition holds.
///
/// A `false` condition is also satisfied by a missing key, so `is_end=false`
/// selects every point that is not flagged as an end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    conditions: Vec<(String, MetaValue)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, MetaValue)] {
        &self.conditions
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| match metadata.get(key) {
                Some(actual) => actual == expected,
                None => matches!(expected, MetaValue::Bool(false)),
            })
    }

    /// Parse a `key=value` condition. The value is read as JSON when possible
    /// (`true`, `12`, `["a","b"]`) and as a plain string otherwise.
    pub fn parse_condition(raw: &str) -> Result<(String, MetaValue)> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| validation_err!("filter condition '{}' is not key=value", raw))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(validation_err!("filter condition '{}' has an empty key", raw));
        }
        let value = value.trim();
        let parsed = serde_json::from_str::<MetaValue>(value)
            .unwrap_or_else(|_| MetaValue::Text(value.to_string()));
        Ok((key.to_string(), parsed))
    }

    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let mut filter = MetadataFilter::new();
        for condition in raw {
            let (key, value) = Self::parse_condition(condition.as_ref())?;
            filter.conditions.push((key, value));
        }
        Ok(filter)
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for MetadataFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MetadataFilter {
            conditions: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_merge_deduplicates_in_order() {
        let mut target: Metadata = [("services", vec!["taxi", "bus"])].into_iter().collect();
        let source: Metadata = [("services", vec!["bus", "metro"])].into_iter().collect();
        target.merge_from(&source).unwrap();
        assert_eq!(
            target.get("services"),
            Some(&MetaValue::from(vec!["taxi", "bus", "metro"]))
        );
    }

    #[test]
    fn test_scalar_merge_rules() {
        let mut target = Metadata::new();
        target.set("capacity", 1000);
        target.set("emergency", false);
        target.set("name", "Central Station");

        let mut source = Metadata::new();
        source.set("capacity", 500);
        source.set("emergency", true);
        source.set("name", "Metro Platform");
        source.set("wifi", true);

        target.merge_from(&source).unwrap();
        assert_eq!(target.get("capacity"), Some(&MetaValue::Number(1000.0)));
        assert_eq!(target.get("emergency"), Some(&MetaValue::Bool(true)));
        assert_eq!(
            target.get("name"),
            Some(&MetaValue::Text("Central Station/Metro Platform".to_string()))
        );
        assert_eq!(target.get("wifi"), Some(&MetaValue::Bool(true)));
    }

    #[test]
    fn test_conflicting_kinds_leave_target_untouched() {
        let mut target = Metadata::new();
        target.set("capacity", 10);
        target.set("name", "A");
        let before = target.clone();

        let mut source = Metadata::new();
        source.set("name", "B");
        source.set("capacity", "large");

        let err = target.merge_from(&source).unwrap_err();
        match err {
            NetworkError::MetadataMerge { key, .. } => assert_eq!(key, "capacity"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(target, before, "failed merge must not partially apply");
    }

    #[test]
    fn test_json_blob_round_trip() {
        let mut metadata = Metadata::new();
        metadata.set("lanes", 2);
        metadata.set("toll", false);
        metadata.set("services", vec!["bus"]);
        let blob = metadata.to_json().unwrap();
        assert_eq!(blob["lanes"], serde_json::json!(2.0));
        assert_eq!(Metadata::from_json(&blob).unwrap(), metadata);
    }

    #[test]
    fn test_json_blob_rejects_non_finite_numbers() {
        let mut metadata = Metadata::new();
        metadata.set("name", "depot");
        metadata.set("weight", f64::NAN);
        assert!(matches!(metadata.to_json(), Err(NetworkError::Validation(_))));
        assert!(metadata.validate().is_err());

        let mut nested = Metadata::new();
        nested.set("speeds", vec![30.0, f64::INFINITY]);
        assert!(nested.to_json().is_err());
        assert!(nested.validate().is_err());

        nested.set("speeds", vec![30.0, 50.0]);
        assert!(nested.validate().is_ok());
        assert_eq!(Metadata::from_json(&nested.to_json().unwrap()).unwrap(), nested);
    }

    #[test]
    fn test_json_blob_rejects_objects_and_nulls() {
        assert!(Metadata::from_json(&serde_json::json!({"a": {"nested": 1}})).is_err());
        assert!(Metadata::from_json(&serde_json::json!({"a": null})).is_err());
        assert!(Metadata::from_json(&serde_json::json!([1, 2])).is_err());
        assert!(Metadata::from_json(&serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_filter_matching() {
        let mut station = Metadata::new();
        station.set("is_end", true);
        station.set("type", "station");
        let terminal: Metadata = [("type", "terminal")].into_iter().collect();

        let ends = MetadataFilter::new().with("is_end", true);
        assert!(ends.matches(&station));
        assert!(!ends.matches(&terminal));

        let not_ends = MetadataFilter::new().with("is_end", false);
        assert!(!not_ends.matches(&station));
        assert!(not_ends.matches(&terminal), "missing flag reads as false");

        assert!(MetadataFilter::new().matches(&terminal));
    }

    #[test]
    fn test_parse_condition() {
        assert_eq!(
            MetadataFilter::parse_condition("is_end=true").unwrap(),
            ("is_end".to_string(), MetaValue::Bool(true))
        );
        assert_eq!(
            MetadataFilter::parse_condition("lanes = 2").unwrap(),
            ("lanes".to_string(), MetaValue::Number(2.0))
        );
        assert_eq!(
            MetadataFilter::parse_condition("type=station").unwrap(),
            ("type".to_string(), MetaValue::Text("station".to_string()))
        );
        assert!(MetadataFilter::parse_condition("no_equals").is_err());
        assert!(MetadataFilter::parse_condition("=5").is_err());
    }
}

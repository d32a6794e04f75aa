use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ResultSetError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<i64>> for MetricValue {
    fn from(v: Vec<i64>) -> Self {
        Self::IntList(v)
    }
}

impl From<Vec<f64>> for MetricValue {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatList(v)
    }
}

/// One (job, layer) measurement: flat scalars plus `frame-*` sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricRecord(BTreeMap<String, MetricValue>);

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Adds every field of `other`, overwriting on key collisions.
    pub fn merge(&mut self, other: MetricRecord) {
        self.0.extend(other.0);
    }

    pub fn remove(&mut self, key: &str) -> Option<MetricValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn as_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(MetricValue::as_f64)
    }

    pub fn as_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            MetricValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            MetricValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_list(&self, key: &str) -> Option<&[i64]> {
        match self.get(key)? {
            MetricValue::IntList(v) => Some(v),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Records of one run, in append order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<MetricRecord>,
}

impl ResultSet {
    pub fn new(records: Vec<MetricRecord>) -> Self {
        Self { records }
    }

    /// Parses a result document. Plain JSON arrays are accepted, as is a prefix left
    /// behind by an interrupted run (no closing bracket, trailing comma).
    pub fn parse(text: &str) -> Result<Self, ResultSetError> {
        if let Ok(records) = serde_json::from_str::<Vec<MetricRecord>>(text) {
            return Ok(Self { records });
        }
        let mut records = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line == "[" || line == "]" {
                continue;
            }
            let line = line.strip_suffix(',').unwrap_or(line);
            let record = serde_json::from_str(line).map_err(|source| ResultSetError::Record {
                line: index + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn read(path: &Path) -> Result<Self, ResultSetError> {
        let text = fs::read_to_string(path).map_err(|source| ResultSetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MetricRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a MetricRecord;
    type IntoIter = std::slice::Iter<'a, MetricRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

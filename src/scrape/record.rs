use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields extracted from a registry page
///
/// A field is present only when a value was found; there are no empty
/// placeholders. An empty record is a valid outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord(BTreeMap<String, String>);

impl ExtractedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field value, ignoring values that are empty after trimming
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.0.insert(field.into(), value);
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        serde_json::from_value(value.clone())
    }
}

impl FromIterator<(String, String)> for ExtractedRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_omitted() {
        let mut record = ExtractedRecord::new();
        record.insert("razao_social", "   ");
        record.insert("cnpj", "00.006.486/0001-75");
        assert_eq!(record.len(), 1);
        assert!(!record.contains("razao_social"));
    }

    #[test]
    fn test_value_conversion() {
        let mut record = ExtractedRecord::new();
        record.insert("cnpj", "00.006.486/0001-75");
        let value = record.to_value();
        assert_eq!(value, serde_json::json!({"cnpj": "00.006.486/0001-75"}));
        assert_eq!(ExtractedRecord::from_value(&value).unwrap(), record);
    }
}

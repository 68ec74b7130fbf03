//! The `Record` type: an ordered field-name to value mapping.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the table.
///
/// Field order is insertion order and is significant: the first record of a
/// table decides the header, and therefore the column order, of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field, returning the record.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field. An existing field keeps its position; a new one goes last.
    ///
    /// Returns the previous value, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    /// Returns the value of a field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Iterates over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overlays `patch` onto this record.
    ///
    /// Patched fields overwrite in place, fields only in `self` are kept and
    /// fields only in `patch` are appended.
    pub fn merge(&mut self, patch: &Record) {
        for (name, value) in patch.iter() {
            self.insert(name, value);
        }
    }

    /// Lays the record out against `header`: absent fields become empty,
    /// fields not named by the header are dropped.
    pub fn project<'a>(&'a self, header: &[String]) -> Vec<&'a str> {
        header
            .iter()
            .map(|name| self.get(name).unwrap_or(""))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field names to scalar values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
        let mut record = Record::new();
        while let Some((name, FieldValue(value))) = access.next_entry::<String, FieldValue>()? {
            record.insert(name, value);
        }
        Ok(record)
    }
}

/// A field value as it arrives on the wire. Scalars are stringified, `null`
/// becomes empty, nested structures are rejected.
struct FieldValue(String);

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number, boolean or null")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
        Ok(FieldValue(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<FieldValue, E> {
        Ok(FieldValue(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<FieldValue, E> {
        Ok(FieldValue(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
        Ok(FieldValue(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
        Ok(FieldValue(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
        Ok(FieldValue(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue(String::new()))
    }

    fn visit_none<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_position_of_existing_field() {
        let mut record = Record::new().with_field("name", "x").with_field("qty", "1");
        assert_eq!(record.insert("name", "y"), Some("x".to_string()));
        assert_eq!(record.field_names().collect::<Vec<_>>(), ["name", "qty"]);
        assert_eq!(record.get("name"), Some("y"));
    }

    #[test]
    fn merge_overwrites_and_appends() {
        let mut record = Record::new().with_field("name", "x").with_field("qty", "1");
        let patch = Record::new().with_field("qty", "5").with_field("note", "new");
        record.merge(&patch);

        let pairs: Vec<_> = record.iter().collect();
        assert_eq!(pairs, [("name", "x"), ("qty", "5"), ("note", "new")]);
    }

    #[test]
    fn project_fills_and_drops() {
        let record = Record::new().with_field("qty", "2").with_field("extra", "z");
        let header = vec!["name".to_string(), "qty".to_string()];
        assert_eq!(record.project(&header), ["", "2"]);
    }

    #[test]
    fn json_preserves_document_order() {
        let record: Record = serde_json::from_str(r#"{"zeta":"1","alpha":"2"}"#).unwrap();
        assert_eq!(record.field_names().collect::<Vec<_>>(), ["zeta", "alpha"]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"zeta":"1","alpha":"2"}"#
        );
    }

    #[test]
    fn json_scalars_are_stringified() {
        let record: Record =
            serde_json::from_str(r#"{"qty":3,"ok":true,"price":2.5,"gone":null}"#).unwrap();
        assert_eq!(record.get("qty"), Some("3"));
        assert_eq!(record.get("ok"), Some("true"));
        assert_eq!(record.get("price"), Some("2.5"));
        assert_eq!(record.get("gone"), Some(""));
    }

    #[test]
    fn json_rejects_nested_values() {
        assert!(serde_json::from_str::<Record>(r#"{"tags":["a"]}"#).is_err());
        assert!(serde_json::from_str::<Record>(r#"{"inner":{"a":"b"}}"#).is_err());
        assert!(serde_json::from_str::<Record>(r#"["not","a","map"]"#).is_err());
    }
}

//! Metadata describing the next unit of data handed to a session.

use std::collections::BTreeMap;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::session::Session;

/// A single typed metadata entry, mapped onto one `multio_metadata_set_*` call.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    #[serde(skip_deserializing)]
    Float(f32),
    Double(f64),
    String(String),
    IntArray(Vec<i64>),
    DoubleArray(Vec<f64>),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i32> for MetadataValue {
    fn from(v: i32) -> Self {
        MetadataValue::Int(v.into())
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<f32> for MetadataValue {
    fn from(v: f32) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Double(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.into())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<Vec<i64>> for MetadataValue {
    fn from(v: Vec<i64>) -> Self {
        MetadataValue::IntArray(v)
    }
}

impl From<Vec<f64>> for MetadataValue {
    fn from(v: Vec<f64>) -> Self {
        MetadataValue::DoubleArray(v)
    }
}

/// Ordered set of metadata entries used to initialise a [`Metadata`].
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(transparent)]
pub struct Fields {
    inner: BTreeMap<String, MetadataValue>,
}

impl Fields {
    pub fn new() -> Fields {
        Fields {
            inner: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with<K: Into<String>, V: Into<MetadataValue>>(mut self, key: K, value: V) -> Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    /// Decodes a mapping such as `{"name": "2t", "level": 1, "step": 0.5}`.
    ///
    /// Integers become [`MetadataValue::Int`], other numbers
    /// [`MetadataValue::Double`]; homogeneous arrays of either become the
    /// matching array variant.
    pub fn from_value(value: &Value) -> Result<Fields> {
        if !value.is_object() {
            return Err(Error::InvalidMetadata(format!(
                "expected a mapping of fields, got '{}'",
                value
            )));
        }
        let fields =
            Fields::deserialize(value).map_err(|e| Error::InvalidMetadata(e.to_string()))?;
        fields.validate()?;
        Ok(fields)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (key, value) in self.inner.iter() {
            if key.is_empty() || key.contains('\0') {
                return Err(Error::InvalidMetadata(format!(
                    "invalid key '{}'",
                    key.escape_default()
                )));
            }
            if let MetadataValue::String(s) = value {
                if s.contains('\0') {
                    return Err(Error::InvalidMetadata(format!(
                        "value of '{}' contains a NUL byte",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Deref for Fields {
    type Target = BTreeMap<String, MetadataValue>;

    fn deref(&self) -> &BTreeMap<String, MetadataValue> {
        &self.inner
    }
}

impl DerefMut for Fields {
    fn deref_mut(&mut self) -> &mut BTreeMap<String, MetadataValue> {
        &mut self.inner
    }
}

impl<K: Into<String>, V: Into<MetadataValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// An owned native metadata object.
///
/// Metadata is immutable once created: start a new write cycle with a new
/// instance, or [`try_clone`](Metadata::try_clone) an existing one.
pub struct Metadata<B: Backend> {
    backend: Rc<B>,
    raw: ManuallyDrop<B::Metadata>,
    fields: Fields,
}

impl<B: Backend> Metadata<B> {
    pub fn create(session: &Session<B>, fields: Option<&Fields>) -> Result<Self> {
        let fields = fields.cloned().unwrap_or_default();
        fields.validate()?;

        let backend = session.backend().clone();
        let raw = backend
            .new_metadata(session.raw())
            .map_err(Error::MetadataCreate)?;
        let metadata = Metadata {
            backend,
            raw: ManuallyDrop::new(raw),
            fields,
        };

        for (key, value) in metadata.fields.iter() {
            metadata
                .backend
                .metadata_set(&metadata.raw, key, value)
                .map_err(Error::MetadataCreate)?;
        }

        debug!("created metadata with {} fields", metadata.fields.len());
        Ok(metadata)
    }

    pub fn try_clone(&self) -> Result<Self> {
        let raw = self
            .backend
            .copy_metadata(&self.raw)
            .map_err(Error::MetadataCreate)?;
        Ok(Metadata {
            backend: self.backend.clone(),
            raw: ManuallyDrop::new(raw),
            fields: self.fields.clone(),
        })
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub(crate) fn raw(&self) -> &B::Metadata {
        &self.raw
    }
}

impl<B: Backend> Drop for Metadata<B> {
    fn drop(&mut self) {
        // SAFETY: `raw` is not touched again after this.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        if let Err(e) = self.backend.delete_metadata(raw) {
            warn!("failed to release metadata: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_from_value() {
        let fields = Fields::from_value(&json!({
            "name": "2t",
            "level": 1,
            "step": 0.5,
            "accumulated": false,
            "levels": [1, 2, 3],
            "weights": [0.5, 1.5],
        }))
        .unwrap();

        assert_eq!(fields["name"], MetadataValue::String("2t".into()));
        assert_eq!(fields["level"], MetadataValue::Int(1));
        assert_eq!(fields["step"], MetadataValue::Double(0.5));
        assert_eq!(fields["accumulated"], MetadataValue::Bool(false));
        assert_eq!(fields["levels"], MetadataValue::IntArray(vec![1, 2, 3]));
        assert_eq!(fields["weights"], MetadataValue::DoubleArray(vec![0.5, 1.5]));
    }

    #[test]
    fn test_fields_reject_bad_shapes() {
        assert!(matches!(
            Fields::from_value(&json!([1, 2])),
            Err(Error::InvalidMetadata(_))
        ));
        assert!(matches!(
            Fields::from_value(&json!({"nested": {"a": 1}})),
            Err(Error::InvalidMetadata(_))
        ));
        assert!(matches!(
            Fields::from_value(&json!({"name": null})),
            Err(Error::InvalidMetadata(_))
        ));
        assert!(matches!(
            Fields::from_value(&json!({"bad\u{0}key": 1})),
            Err(Error::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_fields_builder() {
        let fields = Fields::new()
            .with("param", "u")
            .with("level", 850)
            .with("scale", 0.25f32);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["scale"], MetadataValue::Float(0.25));

        let collected: Fields = vec![("a", 1i64), ("b", 2i64)].into_iter().collect();
        assert_eq!(collected["b"], MetadataValue::Int(2));
    }
}

//! # Document Attributes
//!
//! Typed key/value pairs hung off a document path (links, custom meta).
//! They live in their own store under `path/$type/key` and never touch the
//! version chain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{MetaError, MetaResult};
use crate::keystore::KeyStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// Reference to another document
    Link,
    /// Free-form metadata such as a mime type
    Meta,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Link => "link",
            AttributeType::Meta => "meta",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link" => Ok(AttributeType::Link),
            "meta" => Ok(AttributeType::Meta),
            other => Err(MetaError::UnknownAttributeType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAttribute {
    pub attribute_type: AttributeType,
    pub key: String,
    pub value: String,
}

impl DocumentAttribute {
    pub fn new(attribute_type: AttributeType, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute_type,
            key: key.into(),
            value: value.into(),
        }
    }
}

fn type_prefix(path: &str, attribute_type: AttributeType) -> String {
    format!("{}/${}/", path.trim_end_matches('/'), attribute_type)
}

fn attribute_key(path: &str, attribute_type: AttributeType, key: &str) -> String {
    format!("{}{}", type_prefix(path, attribute_type), key)
}

pub(crate) fn set_attribute(store: &dyn KeyStore, path: &str, attribute: &DocumentAttribute) -> MetaResult<()> {
    let key = attribute_key(path, attribute.attribute_type, &attribute.key);
    store.put(&key, &attribute.value)?;
    Ok(())
}

pub(crate) fn get_attribute(
    store: &dyn KeyStore,
    path: &str,
    attribute_type: AttributeType,
    key: &str,
) -> MetaResult<Option<DocumentAttribute>> {
    let value = store.get(&attribute_key(path, attribute_type, key))?;
    Ok(value.map(|value| DocumentAttribute::new(attribute_type, key, value)))
}

pub(crate) fn get_attributes(
    store: &dyn KeyStore,
    path: &str,
    attribute_type: AttributeType,
) -> MetaResult<Vec<DocumentAttribute>> {
    let prefix = type_prefix(path, attribute_type);
    let mut attributes = Vec::new();
    store.visit_keys(&prefix, &mut |key, value| {
        if let Some(name) = key.strip_prefix(prefix.as_str()) {
            attributes.push(DocumentAttribute::new(attribute_type, name, value));
        }
        true
    })?;
    Ok(attributes)
}

pub(crate) fn delete_attribute(
    store: &dyn KeyStore,
    path: &str,
    attribute_type: AttributeType,
    key: &str,
) -> MetaResult<bool> {
    Ok(store.delete(&attribute_key(path, attribute_type, key))?)
}

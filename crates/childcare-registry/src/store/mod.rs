//! Document store seam.
//!
//! Every component receives a store handle explicitly; there is no ambient
//! global client. Writes travel as [`WriteBatch`]es that an implementation
//! must apply all-or-nothing, and patches carry the three update shapes the
//! registry relies on: shallow merge-set, field delete, and array set-union.

mod batch;
mod memory;

pub use batch::{BatchStats, BatchWriter};
pub use memory::MemoryStore;

use serde::Serialize;
use serde_json::Value;

/// A stored document: a flat JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Serialize a domain value into a [`Document`].
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Codec(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(err) => Err(StoreError::Codec(err.to_string())),
    }
}

/// Mutation applied to a single document under merge-upsert semantics:
/// fields in `sets` overwrite, `deletes` unset, `unions` add missing values
/// to an array field. Fields not mentioned are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    sets: Document,
    deletes: Vec<String>,
    unions: Vec<(String, Vec<Value>)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: Document) -> Self {
        Self {
            sets: doc,
            ..Self::default()
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.sets.insert(field.to_string(), value.into());
        self
    }

    pub fn delete_field(mut self, field: &str) -> Self {
        self.deletes.push(field.to_string());
        self
    }

    pub fn array_union(mut self, field: &str, values: Vec<Value>) -> Self {
        self.unions.push((field.to_string(), values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() && self.deletes.is_empty() && self.unions.is_empty()
    }

    /// Apply this patch to an in-memory document.
    pub fn apply_to(&self, doc: &mut Document) {
        for (field, value) in &self.sets {
            doc.insert(field.clone(), value.clone());
        }
        for field in &self.deletes {
            doc.remove(field);
        }
        for (field, values) in &self.unions {
            let entry = doc
                .entry(field.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(items) = entry {
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
        }
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    MergeSet {
        collection: String,
        id: String,
        patch: Patch,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn merge_set(collection: &str, id: &str, patch: Patch) -> Self {
        Self::MergeSet {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        Self::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Ordered writes committed as one all-or-nothing unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("document codec error: {0}")]
    Codec(String),
}

/// Storage abstraction over a collection/document database.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// All documents of a collection in id order.
    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;

    /// Documents whose `field` equals `value` exactly (type-sensitive:
    /// the number `29112233` and the string `"29112233"` are distinct).
    fn find_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Document)>, StoreError>;

    /// Apply a batch atomically: either every op lands or none do.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn patch_merge_set_overwrites_only_named_fields() {
        let mut target = doc(json!({ "a": 1, "b": "keep" }));
        Patch::new().set("a", 2).apply_to(&mut target);
        assert_eq!(target["a"], 2);
        assert_eq!(target["b"], "keep");
    }

    #[test]
    fn patch_delete_field_unsets() {
        let mut target = doc(json!({ "parentId": "uid-1", "name": "x" }));
        Patch::new().delete_field("parentId").apply_to(&mut target);
        assert!(!target.contains_key("parentId"));
        assert_eq!(target["name"], "x");
    }

    #[test]
    fn patch_array_union_adds_missing_values_once() {
        let mut target = doc(json!({ "parentIds": ["a"] }));
        let patch = Patch::new().array_union("parentIds", vec![json!("a"), json!("b")]);
        patch.apply_to(&mut target);
        patch.apply_to(&mut target);
        assert_eq!(target["parentIds"], json!(["a", "b"]));
    }

    #[test]
    fn to_document_rejects_non_objects() {
        assert!(to_document(&"just a string").is_err());
        let document = to_document(&json!({ "k": "v" })).expect("object");
        assert_eq!(document["k"], "v");
    }
}

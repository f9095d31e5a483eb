use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{Document, DocumentStore, StoreError, WriteBatch, WriteOp};

/// Mutex-guarded in-memory store. Commits hold the lock for the whole batch,
/// so a batch is observed all-or-nothing by every reader.
#[derive(Default, Clone)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<String, BTreeMap<String, Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a document directly, bypassing batch semantics. Intended for
    /// seeding fixtures and infrastructure bootstrap.
    pub fn seed(&self, collection: &str, id: &str, doc: Document) {
        let mut guard = self.collections.lock().expect("store mutex poisoned");
        guard
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
    }

    pub fn document_count(&self, collection: &str) -> usize {
        let guard = self.collections.lock().expect("store mutex poisoned");
        guard.get(collection).map(BTreeMap::len).unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| doc.get(field) == Some(value))
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut guard = self.collections.lock().expect("store mutex poisoned");
        for op in batch.into_ops() {
            match op {
                WriteOp::MergeSet {
                    collection,
                    id,
                    patch,
                } => {
                    let doc = guard
                        .entry(collection)
                        .or_default()
                        .entry(id)
                        .or_insert_with(Document::new);
                    patch.apply_to(doc);
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(docs) = guard.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Patch;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn merge_set_upserts_and_preserves_untouched_fields() {
        let store = MemoryStore::new();
        store.seed("users", "u1", doc(json!({ "email": "a@b.lv" })));

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::merge_set(
            "users",
            "u1",
            Patch::new().set("phone", "29112233"),
        ));
        store.commit(batch).expect("commit");

        let stored = store.get("users", "u1").expect("get").expect("present");
        assert_eq!(stored["email"], "a@b.lv");
        assert_eq!(stored["phone"], "29112233");
    }

    #[test]
    fn find_eq_is_type_sensitive() {
        let store = MemoryStore::new();
        store.seed("parent", "ph-1", doc(json!({ "phone": 29112233 })));
        store.seed("parent", "ph-2", doc(json!({ "phone": "29112233" })));

        let numeric = store
            .find_eq("parent", "phone", &json!(29112233))
            .expect("query");
        assert_eq!(numeric.len(), 1);
        assert_eq!(numeric[0].0, "ph-1");

        let text = store
            .find_eq("parent", "phone", &json!("29112233"))
            .expect("query");
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].0, "ph-2");
    }

    #[test]
    fn delete_removes_document() {
        let store = MemoryStore::new();
        store.seed("mergeIntents", "src", doc(json!({ "phone": "+371" })));

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::delete("mergeIntents", "src"));
        store.commit(batch).expect("commit");

        assert!(store.get("mergeIntents", "src").expect("get").is_none());
    }

    #[test]
    fn list_returns_documents_in_id_order() {
        let store = MemoryStore::new();
        store.seed("child", "b", doc(json!({ "n": 2 })));
        store.seed("child", "a", doc(json!({ "n": 1 })));

        let ids: Vec<String> = store
            .list("child")
            .expect("list")
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

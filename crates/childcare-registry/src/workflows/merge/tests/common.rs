use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::{json, Value};

use crate::store::{Document, MemoryStore};
use crate::workflows::import::PARENT_COLLECTION;
use crate::workflows::merge::directory::{DirectoryError, IdentityProvider};
use crate::workflows::merge::service::{
    AccountMergeService, APPLICATIONS_COLLECTION, MERGE_INTENTS_COLLECTION, USERS_COLLECTION,
};

pub(super) const TARGET: &str = "uid-target-account-000001";
pub(super) const SOURCE: &str = "uid-source-account-000002";

/// Identity provider backed by a plain map of verified phones.
#[derive(Default)]
pub(super) struct MemoryDirectory {
    phones: Mutex<HashMap<String, String>>,
    revoked: Mutex<HashSet<String>>,
}

impl MemoryDirectory {
    pub(super) fn with_phone(uid: &str, phone: &str) -> Self {
        let directory = Self::default();
        directory
            .phones
            .lock()
            .expect("directory mutex poisoned")
            .insert(uid.to_string(), phone.to_string());
        directory
    }

    pub(super) fn phone_of(&self, uid: &str) -> Option<String> {
        self.phones
            .lock()
            .expect("directory mutex poisoned")
            .get(uid)
            .cloned()
    }

    pub(super) fn sessions_revoked(&self, uid: &str) -> bool {
        self.revoked
            .lock()
            .expect("directory mutex poisoned")
            .contains(uid)
    }
}

impl IdentityProvider for MemoryDirectory {
    fn verified_phone(&self, uid: &str) -> Result<Option<String>, DirectoryError> {
        Ok(self.phone_of(uid))
    }

    fn clear_phone(&self, uid: &str) -> Result<(), DirectoryError> {
        self.phones
            .lock()
            .expect("directory mutex poisoned")
            .remove(uid);
        Ok(())
    }

    fn revoke_sessions(&self, uid: &str) -> Result<(), DirectoryError> {
        self.revoked
            .lock()
            .expect("directory mutex poisoned")
            .insert(uid.to_string());
        Ok(())
    }
}

/// Identity provider that fails every call, for the 502 mapping.
pub(super) struct OfflineDirectory;

impl IdentityProvider for OfflineDirectory {
    fn verified_phone(&self, _uid: &str) -> Result<Option<String>, DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }

    fn clear_phone(&self, _uid: &str) -> Result<(), DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }

    fn revoke_sessions(&self, _uid: &str) -> Result<(), DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }
}

pub(super) fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub(super) fn build_service(
    store: MemoryStore,
    directory: MemoryDirectory,
) -> (
    AccountMergeService<MemoryStore, MemoryDirectory>,
    Arc<MemoryStore>,
    Arc<MemoryDirectory>,
) {
    let store = Arc::new(store);
    let directory = Arc::new(directory);
    let service = AccountMergeService::new(store.clone(), directory.clone(), "371");
    (service, store, directory)
}

/// Store primed for the complete-merge scenario: a source account with three
/// applications and a standing merge intent for the target's phone.
pub(super) fn merge_ready_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.seed(
        USERS_COLLECTION,
        TARGET,
        doc(json!({
            "displayName": "Ilze Liepa",
            "phone": "+37129112233",
            "phoneVerified": true,
            "legacy": { "matched": false, "matches": 0 }
        })),
    );
    store.seed(
        USERS_COLLECTION,
        SOURCE,
        doc(json!({
            "displayName": "Ilze Liepa (old)",
            "email": "ilze@example.lv",
            "address": "Rīga, Brīvības 1",
            "legacy": { "matched": true, "matches": 2 }
        })),
    );
    for n in 1..=3 {
        store.seed(
            APPLICATIONS_COLLECTION,
            &format!("app-{n}"),
            doc(json!({ "parentId": SOURCE, "childName": "Anna", "status": "waitlist" })),
        );
    }
    store.seed(
        MERGE_INTENTS_COLLECTION,
        SOURCE,
        doc(json!({ "phone": "29112233", "requestedBy": TARGET })),
    );
    store
}

/// Store with legacy parent documents carrying the three historical phone
/// representations.
pub(super) fn legacy_parent_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.seed(
        PARENT_COLLECTION,
        "ph-37129112233",
        doc(json!({
            "firstName": "Ilze", "lastName": "Liepa",
            "phone": "29112233",
            "email": "ilze@example.lv",
            "address": "Rīga, Brīvības 1",
            "updatedAt": "2023-06-01T00:00:00Z"
        })),
    );
    store.seed(
        PARENT_COLLECTION,
        "pk-12019912345",
        doc(json!({
            "vards": "Ilze", "uzvards": "Liepa",
            "phone": 29112233u64,
            "personaskods": "120199-12345",
            "ligumsnr": "L-2019-17",
            "updatedAt": "2024-01-01T00:00:00Z"
        })),
    );
    store.seed(
        PARENT_COLLECTION,
        "nm-ilze-liepa",
        doc(json!({
            "fullName": "Ilze Liepa",
            "phone": "+37129112233",
            "updatedAt": "2022-01-01T00:00:00Z"
        })),
    );
    store
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

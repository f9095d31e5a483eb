use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use childcare_registry::workflows::merge::{DirectoryError, IdentityProvider};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory identity provider. Verified phones come from the
/// `VERIFIED_PHONES` env var (`uid=+37129112233,uid2=+37128445566`), which is
/// enough for local runs and workflow testing against the memory store.
#[derive(Default)]
pub(crate) struct MemoryDirectory {
    phones: Mutex<HashMap<String, String>>,
    revoked: Mutex<HashSet<String>>,
}

impl MemoryDirectory {
    pub(crate) fn from_env() -> Self {
        let mut phones = HashMap::new();
        if let Ok(raw) = std::env::var("VERIFIED_PHONES") {
            for pair in raw.split(',') {
                if let Some((uid, phone)) = pair.split_once('=') {
                    let (uid, phone) = (uid.trim(), phone.trim());
                    if !uid.is_empty() && !phone.is_empty() {
                        phones.insert(uid.to_string(), phone.to_string());
                    }
                }
            }
        }
        Self {
            phones: Mutex::new(phones),
            revoked: Mutex::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_phone(uid: &str, phone: &str) -> Self {
        let directory = Self::default();
        directory
            .phones
            .lock()
            .expect("directory mutex poisoned")
            .insert(uid.to_string(), phone.to_string());
        directory
    }

}

impl IdentityProvider for MemoryDirectory {
    fn verified_phone(&self, uid: &str) -> Result<Option<String>, DirectoryError> {
        let guard = self.phones.lock().expect("directory mutex poisoned");
        Ok(guard.get(uid).cloned())
    }

    fn clear_phone(&self, uid: &str) -> Result<(), DirectoryError> {
        let mut guard = self.phones.lock().expect("directory mutex poisoned");
        guard.remove(uid);
        Ok(())
    }

    fn revoke_sessions(&self, uid: &str) -> Result<(), DirectoryError> {
        let mut guard = self.revoked.lock().expect("directory mutex poisoned");
        guard.insert(uid.to_string());
        Ok(())
    }
}

//! Schema migration from the v1 layout to the v2 reference model.
//!
//! Step 1 rewrites the legacy scalar `child.parentId` into the `parentIds`
//! reference set, batching the upgrades through the shared chunked writer.
//! Step 2 lifts embedded `parent.children[]` descriptions out into
//! first-class `child` documents, resolving existing children by personal
//! code and then by fingerprint so re-runs never duplicate. Step 2 commits
//! one document at a time: each upsert must be visible to the lookups for
//! the embedded descriptions that follow it in the same run.
//! Both steps are idempotent and safe to repeat.

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::ChildStatus;
use crate::store::{
    BatchWriter, Document, DocumentStore, Patch, StoreError, WriteBatch, WriteOp,
};
use crate::workflows::import::docid::{child_base_id, IdAllocator};
use crate::workflows::import::identity::{fingerprint, ChildKey};
use crate::workflows::import::normalize::{format_iso, parse_date_flexible};
use crate::workflows::import::{CHILD_COLLECTION, PARENT_COLLECTION};

/// Field on a parent document naming its linked account uid. The old
/// deployment never wrote it consistently, hence the heuristic fallback.
const ACCOUNT_UID_FIELD: &str = "accountUid";

/// Chunk size for the step-1 reference upgrades.
const BATCH_LIMIT: usize = 400;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tally of what a migration run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Children whose scalar `parentId` became a `parentIds` entry.
    pub reference_upgrades: usize,
    /// Embedded child descriptions examined in step 2.
    pub embedded_processed: usize,
    /// New `child` documents created from embedded descriptions.
    pub children_created: usize,
    /// Existing `child` documents enriched from embedded descriptions.
    pub children_merged: usize,
    /// Parent documents with no resolvable account uid (data-quality gap).
    pub parents_missing_uid: usize,
}

pub struct SchemaMigration<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    dry_run: bool,
}

impl<'a, S: DocumentStore + ?Sized> SchemaMigration<'a, S> {
    pub fn new(store: &'a S, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    pub fn run(&self, now: &str) -> Result<MigrationReport, MigrationError> {
        let mut report = MigrationReport::default();
        self.upgrade_parent_references(now, &mut report)?;
        self.lift_embedded_children(now, &mut report)?;
        Ok(report)
    }

    /// Step 1: `child.parentId` (scalar) → `parentIds` (set).
    fn upgrade_parent_references(
        &self,
        now: &str,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        let mut writer = BatchWriter::new(self.store, BATCH_LIMIT);
        for (id, doc) in self.store.list(CHILD_COLLECTION)? {
            let Some(Value::String(parent_id)) = doc.get("parentId") else {
                continue;
            };
            report.reference_upgrades += 1;

            let patch = Patch::new()
                .array_union("parentIds", vec![Value::String(parent_id.clone())])
                .delete_field("parentId")
                .set("updatedAt", now);
            if self.dry_run {
                debug!(child = %id, "would upgrade scalar parentId");
                continue;
            }
            writer.queue(WriteOp::merge_set(CHILD_COLLECTION, &id, patch))?;
        }
        writer.finish()?;
        Ok(())
    }

    /// Step 2: `parent.children[]` → `child` documents plus `parentIds`.
    fn lift_embedded_children(
        &self,
        now: &str,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        let mut ids = IdAllocator::new();
        for (id, _) in self.store.list(CHILD_COLLECTION)? {
            ids.reserve(&id);
        }

        for (parent_doc_id, parent_doc) in self.store.list(PARENT_COLLECTION)? {
            let Some(Value::Array(embedded)) = parent_doc.get("children") else {
                continue;
            };
            if embedded.is_empty() {
                continue;
            }

            let account_uid = resolve_account_uid(&parent_doc_id, &parent_doc);
            if account_uid.is_none() {
                report.parents_missing_uid += 1;
                warn!(
                    parent = %parent_doc_id,
                    "no account uid on parent; children updated without a parentIds link"
                );
            }

            for item in embedded {
                let Some(emb) = item.as_object() else {
                    continue;
                };
                report.embedded_processed += 1;
                self.upsert_embedded_child(emb, account_uid.as_deref(), &mut ids, now, report)?;
            }
        }
        Ok(())
    }

    fn upsert_embedded_child(
        &self,
        emb: &Document,
        account_uid: Option<&str>,
        ids: &mut IdAllocator,
        now: &str,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError> {
        let fields = EmbeddedChild::from_document(emb);

        let existing = self.find_existing_child(&fields)?;
        let (child_id, patch) = match existing {
            Some((id, current)) => {
                report.children_merged += 1;
                (id, fields.fill_only_patch(&current, now))
            }
            None => {
                report.children_created += 1;
                let key = fields.identity_key();
                let base = key
                    .as_ref()
                    .map(child_base_id)
                    .unwrap_or_else(|| "child".to_string());
                (ids.claim(&base), fields.create_patch(now))
            }
        };

        let patch = match account_uid {
            Some(uid) => patch.array_union("parentIds", vec![Value::String(uid.to_string())]),
            None => patch,
        };

        if self.dry_run {
            debug!(child = %child_id, "would upsert embedded child");
            return Ok(());
        }
        self.commit_one(WriteOp::merge_set(CHILD_COLLECTION, &child_id, patch))?;
        Ok(())
    }

    fn find_existing_child(
        &self,
        fields: &EmbeddedChild,
    ) -> Result<Option<(String, Document)>, MigrationError> {
        if let Some(code) = &fields.personal_code {
            let hits =
                self.store
                    .find_eq(CHILD_COLLECTION, "personalCode", &Value::String(code.clone()))?;
            if let Some(hit) = hits.into_iter().next() {
                return Ok(Some(hit));
            }
        }
        if let Some(fp) = fields.fingerprint() {
            let hits = self
                .store
                .find_eq(CHILD_COLLECTION, "fingerprint", &Value::String(fp))?;
            if let Some(hit) = hits.into_iter().next() {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    fn commit_one(&self, op: WriteOp) -> Result<(), MigrationError> {
        let mut batch = WriteBatch::new();
        batch.push(op);
        self.store.commit(batch)?;
        Ok(())
    }
}

/// Preferred linkage is the explicit `accountUid` field; the shape-of-a-uid
/// heuristic on the document id survives only as a warned fallback for
/// documents created before the field existed.
fn resolve_account_uid(doc_id: &str, doc: &Document) -> Option<String> {
    if let Some(uid) = doc
        .get(ACCOUNT_UID_FIELD)
        .and_then(Value::as_str)
        .filter(|uid| !uid.trim().is_empty())
    {
        return Some(uid.to_string());
    }
    if looks_like_account_uid(doc_id) {
        warn!(parent = %doc_id, "using document id as account uid (heuristic linkage)");
        return Some(doc_id.to_string());
    }
    None
}

fn looks_like_account_uid(value: &str) -> bool {
    (20..=40).contains(&value.len()) && value.chars().any(|c| c.is_ascii_alphabetic())
}

/// Embedded child description with both canonical and legacy Latvian field
/// spellings resolved.
struct EmbeddedChild {
    first_name: Option<String>,
    last_name: Option<String>,
    personal_code: Option<String>,
    dob: Option<String>,
    group: Option<String>,
    address: Option<String>,
    start_date: Option<String>,
    status: Option<ChildStatus>,
}

impl EmbeddedChild {
    fn from_document(emb: &Document) -> Self {
        Self {
            first_name: aliased(emb, &["vards", "firstName"]),
            last_name: aliased(emb, &["uzvards", "lastName"]),
            personal_code: aliased(emb, &["personaskods", "personalCode"]),
            dob: aliased(emb, &["dzimsanasDatums", "dob"]).and_then(|raw| {
                parse_date_flexible(&raw).map(format_iso)
            }),
            group: aliased(emb, &["grupina", "group"]),
            address: aliased(emb, &["adrese", "address"]),
            start_date: aliased(emb, &["saksanasDatums", "startDate"]).and_then(|raw| {
                parse_date_flexible(&raw).map(format_iso)
            }),
            status: aliased(emb, &["status", "statuss"]).and_then(|raw| map_status(&raw)),
        }
    }

    fn identity_key(&self) -> Option<ChildKey> {
        ChildKey::derive(
            self.personal_code.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.dob.as_deref(),
        )
    }

    fn fingerprint(&self) -> Option<String> {
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        let dob = self.dob.as_deref().unwrap_or_default();
        if first.is_empty() && last.is_empty() && dob.is_empty() {
            return None;
        }
        Some(fingerprint(first, last, dob))
    }

    /// Full payload for a newly created child document.
    fn create_patch(&self, now: &str) -> Patch {
        let mut patch = self
            .common_fields(Patch::new())
            .set("createdAt", now)
            .set("updatedAt", now);
        if let Some(fp) = self.fingerprint() {
            patch = patch.set("fingerprint", fp);
        }
        patch
    }

    /// Patch that only fills fields the stored document leaves empty.
    fn fill_only_patch(&self, current: &Document, now: &str) -> Patch {
        let mut patch = Patch::new().set("updatedAt", now);
        let pairs: [(&str, Option<&str>); 7] = [
            ("firstName", self.first_name.as_deref()),
            ("lastName", self.last_name.as_deref()),
            ("personalCode", self.personal_code.as_deref()),
            ("dob", self.dob.as_deref()),
            ("group", self.group.as_deref()),
            ("address", self.address.as_deref()),
            ("startDate", self.start_date.as_deref()),
        ];
        for (field, value) in pairs {
            if let Some(value) = value {
                if is_empty_field(current.get(field)) {
                    patch = patch.set(field, value);
                }
            }
        }
        if let Some(status) = self.status {
            if is_empty_field(current.get("status")) {
                patch = patch.set("status", status_label(status));
            }
        }
        if is_empty_field(current.get("fingerprint")) {
            if let Some(fp) = self.fingerprint() {
                patch = patch.set("fingerprint", fp);
            }
        }
        patch
    }

    fn common_fields(&self, patch: Patch) -> Patch {
        let mut patch = patch
            .set("firstName", option_value(self.first_name.as_deref()))
            .set("lastName", option_value(self.last_name.as_deref()))
            .set("personalCode", option_value(self.personal_code.as_deref()))
            .set("dob", option_value(self.dob.as_deref()))
            .set("group", option_value(self.group.as_deref()))
            .set("address", option_value(self.address.as_deref()))
            .set("startDate", option_value(self.start_date.as_deref()));
        patch = match self.status {
            Some(status) => patch.set("status", status_label(status)),
            None => patch.set("status", Value::Null),
        };
        patch
    }
}

fn aliased(doc: &Document, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| doc.get(*field))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

fn option_value(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::String(text.to_string()),
        None => Value::Null,
    }
}

fn is_empty_field(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

/// Legacy status labels, Latvian and English, onto the canonical lifecycle.
fn map_status(raw: &str) -> Option<ChildStatus> {
    match raw.trim().to_lowercase().as_str() {
        "rindā" | "waitlist" | "submitted" => Some(ChildStatus::Waitlist),
        "apstiprināts" | "approved" => Some(ChildStatus::Approved),
        "līgums" | "contract" => Some(ChildStatus::Contract),
        "beidzis" | "finished" => Some(ChildStatus::Finished),
        "izstājies" | "withdrawn" => Some(ChildStatus::Withdrawn),
        _ => None,
    }
}

fn status_label(status: ChildStatus) -> &'static str {
    match status {
        ChildStatus::Waitlist => "waitlist",
        ChildStatus::Approved => "approved",
        ChildStatus::Contract => "contract",
        ChildStatus::Finished => "finished",
        ChildStatus::Withdrawn => "withdrawn",
    }
}

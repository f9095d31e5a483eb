use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::domain::LegacySummary;
use crate::store::{Document, DocumentStore, Patch, StoreError, WriteBatch, WriteOp};
use crate::workflows::import::aggregate::{aliased_text, select_best_donor};
use crate::workflows::import::normalize::{normalize_phone, NormalizedPhone};
use crate::workflows::import::PARENT_COLLECTION;

use super::directory::{DirectoryError, IdentityProvider};

pub const USERS_COLLECTION: &str = "users";
pub const APPLICATIONS_COLLECTION: &str = "applications";
pub const MERGE_INTENTS_COLLECTION: &str = "mergeIntents";

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("caller does not own the target account")]
    NotAccountOwner,
    #[error("admin role required")]
    AdminRequired,
    #[error("account has no verified phone")]
    PhoneNotVerified,
    #[error("verified phone does not match")]
    PhoneMismatch,
    #[error("source and target are the same account")]
    SameAccount,
    #[error("no merge intent for that account")]
    IntentNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl MergeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAccountOwner | Self::AdminRequired | Self::PhoneMismatch => {
                StatusCode::FORBIDDEN
            }
            Self::PhoneNotVerified => StatusCode::PRECONDITION_FAILED,
            Self::SameAccount => StatusCode::CONFLICT,
            Self::IntentNotFound => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Directory(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeParentDataRequest {
    pub phone: String,
    pub target_uid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeParentDataResponse {
    pub merged: bool,
    pub matches: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMergeRequest {
    pub source_uid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMergeResponse {
    pub ok: bool,
    pub moved_applications: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnlinkPhoneRequest {
    pub uid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnlinkPhoneResponse {
    pub ok: bool,
}

/// Orchestrates the phone-verified account merge flows. Every precondition
/// is checked before the first write; each operation then lands as a single
/// atomic batch, so a rejected call leaves the store untouched.
pub struct AccountMergeService<S, P> {
    store: Arc<S>,
    directory: Arc<P>,
    default_cc: String,
}

impl<S, P> AccountMergeService<S, P>
where
    S: DocumentStore + 'static,
    P: IdentityProvider + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<P>, default_cc: &str) -> Self {
        Self {
            store,
            directory,
            default_cc: default_cc.to_string(),
        }
    }

    /// Pull legacy parent data into the caller's own account after phone
    /// verification. Nothing is deleted or disabled here; the account just
    /// gets the richest matching parent record folded in, fill-only.
    pub fn merge_parent_data(
        &self,
        caller: &str,
        request: &MergeParentDataRequest,
    ) -> Result<MergeParentDataResponse, MergeError> {
        if caller != request.target_uid {
            return Err(MergeError::NotAccountOwner);
        }
        let verified = self.verified_phone(caller)?;
        let requested = normalize_phone(&request.phone, &self.default_cc);
        if !same_number(&verified, &requested) {
            return Err(MergeError::PhoneMismatch);
        }

        let hits = self.probe_parents(&verified)?;
        let matches = hits.len() as u64;
        let account = self.store.get(USERS_COLLECTION, caller)?;
        let now = timestamp();

        let mut patch = Patch::new()
            .set("phoneVerified", true)
            .set("legacy", json!({ "matched": matches > 0, "matches": matches }))
            .set("updatedAt", now.as_str());
        if account_needs_role(account.as_ref()) {
            patch = patch.set("role", "parent");
        }
        if let Some((donor_id, donor)) = select_best_donor(&hits) {
            info!(account = caller, donor = %donor_id, matches, "merging legacy parent data");
            let current = account.unwrap_or_default();
            patch = fill_from_parent(patch, &current, donor);
        }

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::merge_set(USERS_COLLECTION, caller, patch));
        self.store.commit(batch)?;

        Ok(MergeParentDataResponse {
            merged: matches > 0,
            matches,
        })
    }

    /// Fold a duplicate account into the caller's, consuming the merge
    /// intent recorded for the source. Applications are re-pointed, the
    /// source profile fills gaps in the target, and the source account is
    /// disabled — all in one batch, so a double submit finds no intent.
    pub fn complete_merge(
        &self,
        caller: &str,
        request: &CompleteMergeRequest,
    ) -> Result<CompleteMergeResponse, MergeError> {
        let source = request.source_uid.as_str();
        if source == caller {
            return Err(MergeError::SameAccount);
        }
        let intent = self
            .store
            .get(MERGE_INTENTS_COLLECTION, source)?
            .ok_or(MergeError::IntentNotFound)?;
        let verified = self.verified_phone(caller)?;
        let intent_phone = intent
            .get("phone")
            .and_then(Value::as_str)
            .map(|raw| normalize_phone(raw, &self.default_cc))
            .unwrap_or_default();
        if !same_number(&verified, &intent_phone) {
            return Err(MergeError::PhoneMismatch);
        }

        let applications = self.store.find_eq(
            APPLICATIONS_COLLECTION,
            "parentId",
            &Value::String(source.to_string()),
        )?;
        let target_doc = self.store.get(USERS_COLLECTION, caller)?.unwrap_or_default();
        let source_doc = self.store.get(USERS_COLLECTION, source)?.unwrap_or_default();
        let now = timestamp();

        let mut batch = WriteBatch::new();
        for (application_id, _) in &applications {
            batch.push(WriteOp::merge_set(
                APPLICATIONS_COLLECTION,
                application_id,
                Patch::new()
                    .set("parentId", caller)
                    .set("updatedAt", now.as_str()),
            ));
        }

        let combined = combine_legacy(&target_doc, &source_doc);
        let target_patch = fill_from_account(Patch::new(), &target_doc, &source_doc)
            .set("legacy", json!({ "matched": combined.matched, "matches": combined.matches }))
            .set("mergedFrom", source)
            .set("updatedAt", now.as_str());
        batch.push(WriteOp::merge_set(USERS_COLLECTION, caller, target_patch));

        batch.push(WriteOp::merge_set(
            USERS_COLLECTION,
            source,
            Patch::new()
                .set("mergedTo", caller)
                .set("disabled", true)
                .set("updatedAt", now.as_str()),
        ));
        batch.push(WriteOp::delete(MERGE_INTENTS_COLLECTION, source));
        self.store.commit(batch)?;

        info!(
            target = caller,
            source,
            moved = applications.len(),
            "account merge completed"
        );
        Ok(CompleteMergeResponse {
            ok: true,
            moved_applications: applications.len(),
        })
    }

    /// Detach a phone number from an account so its owner can re-verify it
    /// elsewhere. Admin-only; active sessions are revoked afterwards.
    pub fn admin_unlink_phone(
        &self,
        caller: &str,
        request: &UnlinkPhoneRequest,
    ) -> Result<UnlinkPhoneResponse, MergeError> {
        let caller_doc = self.store.get(USERS_COLLECTION, caller)?;
        let is_admin = caller_doc
            .as_ref()
            .and_then(|doc| doc.get("role"))
            .and_then(Value::as_str)
            .is_some_and(|role| role == "admin");
        if !is_admin {
            return Err(MergeError::AdminRequired);
        }

        self.directory.clear_phone(&request.uid)?;

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::merge_set(
            USERS_COLLECTION,
            &request.uid,
            Patch::new()
                .set("phone", Value::Null)
                .set("phoneVerified", false)
                .set("updatedAt", timestamp().as_str()),
        ));
        self.store.commit(batch)?;

        self.directory.revoke_sessions(&request.uid)?;
        info!(admin = caller, account = %request.uid, "phone unlinked");
        Ok(UnlinkPhoneResponse { ok: true })
    }

    fn verified_phone(&self, uid: &str) -> Result<NormalizedPhone, MergeError> {
        let raw = self
            .directory
            .verified_phone(uid)?
            .ok_or(MergeError::PhoneNotVerified)?;
        let normalized = normalize_phone(&raw, &self.default_cc);
        if normalized.e164.is_none() {
            return Err(MergeError::PhoneNotVerified);
        }
        Ok(normalized)
    }

    /// Legacy parent documents stored the phone under three different
    /// representations over the years: the national digits as a bare number,
    /// the national digits as a string, and the full E.164 string. Probe all
    /// of them.
    fn probe_parents(
        &self,
        phone: &NormalizedPhone,
    ) -> Result<Vec<(String, Document)>, MergeError> {
        let mut probes = Vec::new();
        if let Some(digits) = phone.key_digits() {
            let local = digits
                .strip_prefix(self.default_cc.as_str())
                .filter(|rest| rest.len() >= 8)
                .unwrap_or(digits);
            if let Ok(number) = local.parse::<u64>() {
                probes.push(Value::Number(number.into()));
            }
            probes.push(Value::String(local.to_string()));
        }
        if let Some(e164) = phone.e164.as_deref() {
            probes.push(Value::String(e164.to_string()));
        }

        let mut hits: BTreeMap<String, Document> = BTreeMap::new();
        for probe in &probes {
            for (id, doc) in self.store.find_eq(PARENT_COLLECTION, "phone", probe)? {
                hits.entry(id).or_insert(doc);
            }
        }
        Ok(hits.into_iter().collect())
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn same_number(a: &NormalizedPhone, b: &NormalizedPhone) -> bool {
    match (a.key_digits(), b.key_digits()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn account_needs_role(account: Option<&Document>) -> bool {
    !account
        .and_then(|doc| doc.get("role"))
        .and_then(Value::as_str)
        .is_some_and(|role| !role.trim().is_empty())
}

/// Fill account gaps from a legacy parent document. Legacy documents may use
/// either the canonical or the pre-import field spellings.
fn fill_from_parent(mut patch: Patch, current: &Document, donor: &Document) -> Patch {
    if is_blank(current, "displayName") {
        if let Some(name) = donor_display_name(donor) {
            patch = patch.set("displayName", name);
        }
    }
    let pairs: [(&str, &[&str]); 4] = [
        ("email", &["email", "epasts"]),
        ("address", &["address", "adrese"]),
        ("personalCode", &["personalCode", "personaskods"]),
        ("billingInfo", &["billingInfo", "rek_info"]),
    ];
    for (field, aliases) in pairs {
        if is_blank(current, field) {
            if let Some(text) = aliased_text(donor, aliases) {
                patch = patch.set(field, text);
            }
        }
    }
    if is_blank(current, "phone") {
        if let Some(phone) = donor_phone(donor) {
            patch = patch.set("phone", phone);
        }
    }
    patch
}

/// Fill account gaps from another account document (merge source → target).
/// The phone is excluded: it is the target's verified credential and must
/// never be overwritten or filled in from the account being merged away.
fn fill_from_account(mut patch: Patch, target: &Document, source: &Document) -> Patch {
    for field in ["displayName", "email", "address", "personalCode"] {
        if is_blank(target, field) {
            if let Some(Value::String(text)) = source.get(field) {
                if !text.trim().is_empty() {
                    patch = patch.set(field, text.as_str());
                }
            }
        }
    }
    patch
}

fn donor_display_name(donor: &Document) -> Option<String> {
    let first = aliased_text(donor, &["firstName", "vards"]);
    let last = aliased_text(donor, &["lastName", "uzvards"]);
    let joined = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        aliased_text(donor, &["fullName"]).map(str::to_string)
    } else {
        Some(joined)
    }
}

/// The phone field on old parent documents is sometimes a bare number.
fn donor_phone(donor: &Document) -> Option<String> {
    match donor.get("phone") {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

fn combine_legacy(target: &Document, source: &Document) -> LegacySummary {
    let target = legacy_summary(target);
    let source = legacy_summary(source);
    LegacySummary {
        matched: target.matched || source.matched,
        matches: target.matches.max(source.matches),
    }
}

fn legacy_summary(doc: &Document) -> LegacySummary {
    doc.get("legacy")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

fn is_blank(doc: &Document, field: &str) -> bool {
    match doc.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

//! Typed shapes of the persisted document collections.
//!
//! Field names serialize in camelCase to match the layouts already present in
//! the `parent`, `child`, `users`, `applications`, and `mergeIntents`
//! collections, so a struct round-trips against a live document without
//! renaming. Unknown fields on stored documents are preserved by writing
//! narrow merge patches, never whole documents, once a record is live.

use serde::{Deserialize, Serialize};

/// Canonical deduplicated parent record produced by the legacy import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentEntity {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub personal_code: Option<String>,
    pub email: Option<String>,
    /// Local digits exactly as they appeared in the source row.
    pub phone: Option<String>,
    #[serde(rename = "phoneE164")]
    pub phone_e164: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Canonical deduplicated child record. The `parentIds` reference set lives
/// outside this struct (accumulated per aggregation group) because it is a
/// relation, not a field the fill-only merge may touch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildEntity {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub personal_code: Option<String>,
    /// Date of birth, ISO `YYYY-MM-DD`.
    pub dob: Option<String>,
    pub address: Option<String>,
    pub group: Option<String>,
    pub start_date: Option<String>,
    pub status: Option<ChildStatus>,
    /// Fallback identity key (`first|last|dob`), kept on the document so the
    /// schema migration can find existing children without a personal code.
    pub fingerprint: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Lifecycle of a child's relationship with the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildStatus {
    Waitlist,
    Approved,
    Contract,
    Finished,
    Withdrawn,
}

/// Root identity for a human. Created at signup, mutated by profile edits,
/// phone verification, and merges; merged-away accounts are disabled, never
/// deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub personal_code: Option<String>,
    pub role: Option<String>,
    pub phone_verified: Option<bool>,
    pub legacy: Option<LegacySummary>,
    pub merged_to: Option<String>,
    pub merged_from: Option<String>,
    pub disabled: Option<bool>,
    pub updated_at: Option<String>,
}

/// Outcome of matching an account against the legacy parent records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySummary {
    pub matched: bool,
    pub matches: u64,
}

/// A request linking a child description to a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub parent_id: String,
    pub child_name: Option<String>,
    pub status: ApplicationStatus,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Submitted,
    Waitlist,
    Approved,
    Cancelled,
}

/// Transient claim that the holder of `phone` wants the source account merged
/// into their own. Keyed by the source account uid; consumed atomically when
/// the merge completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeIntent {
    pub phone: String,
    pub requested_by: Option<String>,
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_entity_serializes_with_document_field_names() {
        let parent = ParentEntity {
            first_name: Some("Anna".to_string()),
            phone_e164: Some("+37129112233".to_string()),
            ..ParentEntity::default()
        };
        let value = serde_json::to_value(&parent).expect("serialize");
        assert_eq!(value["firstName"], "Anna");
        assert_eq!(value["phoneE164"], "+37129112233");
    }

    #[test]
    fn child_status_uses_lowercase_labels() {
        assert_eq!(
            serde_json::to_value(ChildStatus::Waitlist).expect("serialize"),
            serde_json::json!("waitlist")
        );
        let parsed: ChildStatus =
            serde_json::from_value(serde_json::json!("withdrawn")).expect("parse");
        assert_eq!(parsed, ChildStatus::Withdrawn);
    }

    #[test]
    fn user_account_tolerates_unknown_document_fields() {
        let doc = serde_json::json!({
            "displayName": "Anna Liepa",
            "legacy": { "matched": true, "matches": 2 },
            "someLegacyField": "ignored"
        });
        let account: UserAccount = serde_json::from_value(doc).expect("parse");
        assert_eq!(account.display_name.as_deref(), Some("Anna Liepa"));
        assert_eq!(
            account.legacy,
            Some(LegacySummary {
                matched: true,
                matches: 2
            })
        );
    }
}

//! Live account-merge workflows.
//!
//! Three operations run against the production collections: pulling legacy
//! parent data into a phone-verified account, completing a merge of a
//! duplicate account, and the admin-only phone unlink. All preconditions are
//! checked before the first write, and each operation commits as one atomic
//! batch.

pub mod directory;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use directory::{DirectoryError, IdentityProvider};
pub use router::{merge_router, AUTH_UID_HEADER};
pub use service::{
    AccountMergeService, CompleteMergeRequest, CompleteMergeResponse, MergeError,
    MergeParentDataRequest, MergeParentDataResponse, UnlinkPhoneRequest, UnlinkPhoneResponse,
    APPLICATIONS_COLLECTION, MERGE_INTENTS_COLLECTION, USERS_COLLECTION,
};

/// Seam to the external identity provider. User credentials (phone numbers,
/// sessions) live there, not in the document store; the merge workflow only
/// ever reads the verified phone and issues revocations through this trait.
pub trait IdentityProvider: Send + Sync {
    /// The account's verified phone number, if one is attached.
    fn verified_phone(&self, uid: &str) -> Result<Option<String>, DirectoryError>;

    /// Detach the phone number from the account.
    fn clear_phone(&self, uid: &str) -> Result<(), DirectoryError>;

    /// Invalidate every active session for the account.
    fn revoke_sessions(&self, uid: &str) -> Result<(), DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("unknown account: {0}")]
    UnknownAccount(String),
}

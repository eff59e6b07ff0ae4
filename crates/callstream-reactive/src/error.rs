use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// `update` was called for an owner whose stream was never created (or
    /// was already disposed).
    #[error("no stream cached for owner {owner}")]
    UnknownOwner { owner: String },
}

impl StreamError {
    #[must_use]
    pub fn unknown_owner(owner: &impl std::fmt::Debug) -> Self {
        Self::UnknownOwner {
            owner: format!("{owner:?}"),
        }
    }
}

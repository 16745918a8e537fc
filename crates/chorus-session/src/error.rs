//! Session error type.

use chorus_storage::StorageError;

/// Error returned by [`CommentSession`](crate::CommentSession) operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Referenced comment or reaction does not exist.
    #[error("comment not found: {0}")]
    NotFound(String),

    /// Storage returned an id that is already in the session.
    #[error("comment already exists: {0}")]
    DuplicateId(String),

    /// The draft or patch was rejected before reaching storage.
    #[error("invalid comment: {0}")]
    Validation(String),

    /// Storage adapter failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use chorus_storage::StorageErrorKind;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SessionError::NotFound("c1".to_owned()).to_string(),
            "comment not found: c1"
        );
        assert_eq!(
            SessionError::Validation("comment is empty".to_owned()).to_string(),
            "invalid comment: comment is empty"
        );
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: SessionError = StorageError::new(StorageErrorKind::Timeout)
            .with_backend("Mock")
            .into();

        assert_eq!(err.to_string(), "[Mock] Timeout");
    }
}

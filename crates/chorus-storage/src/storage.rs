//! Storage trait and error types.
//!
//! Provides the core [`CommentStorage`] trait for persisting comments,
//! along with [`StorageError`] for unified error handling across backends.

use async_trait::async_trait;
use chorus_comments::{Comment, CommentPatch, CommentReaction};
use serde::{Deserialize, Serialize};

/// Which comments a bulk load should return.
///
/// An empty scope means "everything the backend holds".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadScope {
    /// Only comments attached to this entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Only comments attached to this kind of entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

impl LoadScope {
    /// Scope that matches every comment.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Scope for one external entity.
    #[must_use]
    pub fn source(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            source_type: None,
        }
    }

    /// Narrow the scope to one entity kind.
    #[must_use]
    pub fn with_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    /// True if the comment falls inside this scope.
    #[must_use]
    pub fn matches(&self, comment: &Comment) -> bool {
        let id_ok = self
            .source_id
            .as_deref()
            .is_none_or(|id| comment.source_id.as_deref() == Some(id));
        let type_ok = self
            .source_type
            .as_deref()
            .is_none_or(|kind| comment.source_type.as_deref() == Some(kind));
        id_ok && type_ok
    }
}

/// Semantic error categories (inspired by Object Store + `OpenDAL`).
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// Comment or reaction does not exist.
    NotFound,
    /// Permission denied.
    PermissionDenied,
    /// Comment already exists (for create operations).
    AlreadyExists,
    /// Payload rejected by the backend.
    InvalidInput,
    /// Backend is temporarily unavailable.
    Unavailable,
    /// Operation timed out.
    Timeout,
    /// Other/unknown error category.
    Other,
}

/// Retry guidance (from `OpenDAL`).
#[derive(Debug, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Don't retry (not found, invalid input).
    #[default]
    Permanent,
    /// Retry immediately (timeout, connection reset).
    Temporary,
    /// Retry with backoff (service unavailable).
    Persistent,
}

/// Storage error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct StorageError {
    /// Semantic error category.
    pub kind: StorageErrorKind,
    /// Retry guidance.
    pub status: ErrorStatus,
    /// Comment id context (if applicable).
    pub comment_id: Option<String>,
    /// Backend identifier (e.g., "Http", "Mock").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    /// Create a new storage error.
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        let status = match kind {
            StorageErrorKind::Timeout => ErrorStatus::Temporary,
            StorageErrorKind::Unavailable => ErrorStatus::Persistent,
            _ => ErrorStatus::Permanent,
        };
        Self {
            kind,
            status,
            comment_id: None,
            backend: None,
            source: None,
        }
    }

    /// Attach comment id context.
    #[must_use]
    pub fn with_comment_id(mut self, id: impl Into<String>) -> Self {
        self.comment_id = Some(id.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set retry status.
    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }

    /// Create a not found error for a comment.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_comment_id(id)
    }

    /// True if retrying the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status != ErrorStatus::Permanent
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message (comment: c1)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            StorageErrorKind::NotFound => "Not found",
            StorageErrorKind::PermissionDenied => "Permission denied",
            StorageErrorKind::AlreadyExists => "Already exists",
            StorageErrorKind::InvalidInput => "Invalid input",
            StorageErrorKind::Unavailable => "Unavailable",
            StorageErrorKind::Timeout => "Timeout",
            StorageErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(id) = &self.comment_id {
            write!(f, " (comment: {id})")?;
        }

        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Persistence backend for comments.
///
/// Implementations own durability and may rewrite fields (for example assign
/// server-side timestamps); the session always feeds the returned values into
/// the reducer.
#[async_trait]
pub trait CommentStorage: Send + Sync {
    /// Load every comment inside `scope`, in display order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be read.
    async fn load(&self, scope: &LoadScope) -> Result<Vec<Comment>, StorageError>;

    /// Persist a new comment and return the stored version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] with [`StorageErrorKind::AlreadyExists`] if the
    /// id is taken, or any backend failure.
    async fn create(&self, comment: Comment) -> Result<Comment, StorageError>;

    /// Apply a partial update and return the stored version.
    ///
    /// Backends mark the comment edited and refresh `updatedAt`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] with [`StorageErrorKind::NotFound`] if the
    /// comment doesn't exist, or any backend failure.
    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<Comment, StorageError>;

    /// Remove a comment.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the comment doesn't exist or can't be removed.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Attach a reaction and return the stored version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the comment doesn't exist or the write fails.
    async fn add_reaction(
        &self,
        comment_id: &str,
        reaction: CommentReaction,
    ) -> Result<CommentReaction, StorageError>;

    /// Remove a reaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the comment or reaction doesn't exist.
    async fn remove_reaction(&self, comment_id: &str, reaction_id: &str)
    -> Result<(), StorageError>;
}

//! Mock storage implementation for testing.
//!
//! Provides [`MockStorage`] for unit testing without a real backend.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chorus_comments::{ApplyPatch, Comment, CommentPatch, CommentReaction};
use chrono::Utc;

use crate::storage::{CommentStorage, LoadScope, StorageError, StorageErrorKind};

/// In-memory storage for tests and dry runs.
///
/// Stores comments in memory. Use the builder methods to configure the mock
/// with test data, and [`fail_next`](Self::fail_next) to inject failures.
///
/// # Example
///
/// ```ignore
/// use chorus_storage::{CommentStorage, LoadScope, MockStorage, StorageErrorKind};
///
/// let storage = MockStorage::new().with_comment(comment);
/// storage.fail_next(StorageErrorKind::Unavailable);
///
/// assert!(storage.load(&LoadScope::all()).await.is_err());
/// assert_eq!(storage.load(&LoadScope::all()).await.unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockStorage {
    comments: RwLock<Vec<Comment>>,
    failures: RwLock<VecDeque<StorageErrorKind>>,
    calls: RwLock<Vec<String>>,
}

impl MockStorage {
    /// Create a new empty mock storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored comment.
    #[must_use]
    pub fn with_comment(self, comment: Comment) -> Self {
        self.comments.write().unwrap_or_else(PoisonError::into_inner).push(comment);
        self
    }

    /// Seed several stored comments.
    #[must_use]
    pub fn with_comments(self, comments: impl IntoIterator<Item = Comment>) -> Self {
        self.comments.write().unwrap_or_else(PoisonError::into_inner).extend(comments);
        self
    }

    /// Make the next operation fail with the given kind.
    ///
    /// Queued failures are consumed one per operation, in order.
    pub fn fail_next(&self, kind: StorageErrorKind) {
        self.failures.write().unwrap_or_else(PoisonError::into_inner).push_back(kind);
    }

    /// Snapshot of stored comments.
    #[must_use]
    pub fn stored(&self) -> Vec<Comment> {
        self.comments.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Operations performed so far, as `"op:id"` strings.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn begin(&self, op: &str, id: Option<&str>) -> Result<(), StorageError> {
        let call = match id {
            Some(id) => format!("{op}:{id}"),
            None => op.to_owned(),
        };
        self.calls.write().unwrap_or_else(PoisonError::into_inner).push(call);

        match self.failures.write().unwrap_or_else(PoisonError::into_inner).pop_front() {
            Some(kind) => {
                let mut err = StorageError::new(kind).with_backend("Mock");
                if let Some(id) = id {
                    err = err.with_comment_id(id);
                }
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn not_found(id: &str) -> StorageError {
        StorageError::not_found(id).with_backend("Mock")
    }
}

#[async_trait]
impl CommentStorage for MockStorage {
    async fn load(&self, scope: &LoadScope) -> Result<Vec<Comment>, StorageError> {
        self.begin("load", scope.source_id.as_deref())?;
        Ok(self
            .comments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| scope.matches(c))
            .cloned()
            .collect())
    }

    async fn create(&self, comment: Comment) -> Result<Comment, StorageError> {
        self.begin("create", Some(&comment.id))?;
        let mut comments = self.comments.write().unwrap_or_else(PoisonError::into_inner);
        if comments.iter().any(|c| c.id == comment.id) {
            return Err(StorageError::new(StorageErrorKind::AlreadyExists)
                .with_comment_id(&comment.id)
                .with_backend("Mock"));
        }
        comments.push(comment.clone());
        Ok(comment)
    }

    async fn update(&self, id: &str, patch: &CommentPatch) -> Result<Comment, StorageError> {
        self.begin("update", Some(id))?;
        let mut comments = self.comments.write().unwrap_or_else(PoisonError::into_inner);
        let comment = comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        comment.apply_patch(patch.clone());
        comment.is_edited = true;
        comment.updated_at = Utc::now().max(comment.created_at);
        Ok(comment.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.begin("delete", Some(id))?;
        let mut comments = self.comments.write().unwrap_or_else(PoisonError::into_inner);
        let before = comments.len();
        comments.retain(|c| c.id != id);
        if comments.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    async fn add_reaction(
        &self,
        comment_id: &str,
        reaction: CommentReaction,
    ) -> Result<CommentReaction, StorageError> {
        self.begin("add_reaction", Some(comment_id))?;
        let mut comments = self.comments.write().unwrap_or_else(PoisonError::into_inner);
        let comment = comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| Self::not_found(comment_id))?;
        comment.reactions.push(reaction.clone());
        Ok(reaction)
    }

    async fn remove_reaction(
        &self,
        comment_id: &str,
        reaction_id: &str,
    ) -> Result<(), StorageError> {
        self.begin("remove_reaction", Some(comment_id))?;
        let mut comments = self.comments.write().unwrap_or_else(PoisonError::into_inner);
        let comment = comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| Self::not_found(comment_id))?;
        comment.reactions.retain(|r| r.id != reaction_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chorus_comments::{ReactionType, User};
    use pretty_assertions::assert_eq;

    use super::*;

    fn comment(id: &str, source: &str) -> Comment {
        Comment::new(id, id, User::new("u1", "Ada")).with_source(source, Some("page"))
    }

    #[test]
    fn test_mock_storage_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockStorage>();
    }

    #[tokio::test]
    async fn test_load_filters_by_scope() {
        let storage = MockStorage::new().with_comments([
            comment("a", "doc"),
            comment("b", "other"),
            comment("c", "doc"),
        ]);

        let all = storage.load(&LoadScope::all()).await.unwrap();
        let doc = storage.load(&LoadScope::source("doc")).await.unwrap();

        assert_eq!(all.len(), 3);
        let ids: Vec<_> = doc.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate() {
        let storage = MockStorage::new().with_comment(comment("a", "doc"));

        let err = storage.create(comment("a", "doc")).await.unwrap_err();

        assert_eq!(err.kind, StorageErrorKind::AlreadyExists);
        assert_eq!(storage.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_update_marks_edited() {
        let storage = MockStorage::new().with_comment(comment("a", "doc"));

        let updated = storage
            .update("a", &CommentPatch::new().content("new"))
            .await
            .unwrap();

        assert_eq!(updated.content, "new");
        assert!(updated.is_edited);
        assert_eq!(storage.stored()[0].content, "new");
    }

    #[tokio::test]
    async fn test_missing_comment_is_not_found() {
        let storage = MockStorage::new();

        let err = storage.delete("nope").await.unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::NotFound);
        assert_eq!(err.comment_id.as_deref(), Some("nope"));

        let err = storage
            .update("nope", &CommentPatch::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_reactions_round_trip() {
        let storage = MockStorage::new().with_comment(comment("a", "doc"));
        let reaction = CommentReaction::new("u2", ReactionType::Like);

        let stored = storage.add_reaction("a", reaction.clone()).await.unwrap();
        assert_eq!(stored, reaction);
        assert_eq!(storage.stored()[0].reactions.len(), 1);

        storage.remove_reaction("a", &reaction.id).await.unwrap();
        assert!(storage.stored()[0].reactions.is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_is_consumed_once() {
        let storage = MockStorage::new().with_comment(comment("a", "doc"));
        storage.fail_next(StorageErrorKind::Unavailable);

        let err = storage.load(&LoadScope::all()).await.unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::Unavailable);
        assert_eq!(err.backend, Some("Mock"));

        assert_eq!(storage.load(&LoadScope::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let storage = MockStorage::new().with_comment(comment("a", "doc"));

        storage.load(&LoadScope::all()).await.unwrap();
        storage.delete("a").await.unwrap();

        assert_eq!(storage.calls(), vec!["load", "delete:a"]);
    }
}

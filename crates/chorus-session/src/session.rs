//! The comment session: one state, one emitter, one hook registry and a
//! storage adapter, wired into the add/update/delete/react pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use chorus_comments::views::{self, CommentStats, CommentThread};
use chorus_comments::{
    Comment, CommentAction, CommentDraft, CommentPatch, CommentReaction, CommentState, NewComment,
    ReactionType, User,
};
use chorus_events::{CommentEvent, EventEmitter, HookContext, HookPoint, HookRegistry};
use chorus_mentions::{Extraction, Extractor};
use chorus_storage::{CommentStorage, LoadScope, StorageError};
use chrono::Utc;
use uuid::Uuid;

use crate::error::SessionError;

/// Default maximum comment length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 10_000;

/// Tunables for a [`CommentSession`].
#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Longest accepted comment, in characters.
    pub max_length: usize,
    /// Extractor used to fill mentions and tags from `editorState`.
    pub extractor: Extractor,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            extractor: Extractor::new(),
        }
    }
}

/// Orchestrates comment operations for one scope.
///
/// Every mutation goes through the same steps: hooks, storage, reducer,
/// event. Methods take `&mut self`, so transitions never interleave.
pub struct CommentSession {
    state: CommentState,
    storage: Arc<dyn CommentStorage>,
    hooks: HookRegistry,
    user: User,
    options: SessionOptions,
}

impl std::fmt::Debug for CommentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentSession")
            .field("user", &self.user.id)
            .field("comments", &self.state.len())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl CommentSession {
    /// Create a session acting as `user`, with a fresh emitter and registry.
    #[must_use]
    pub fn new(storage: Arc<dyn CommentStorage>, user: User) -> Self {
        Self {
            state: CommentState::new(),
            storage,
            hooks: HookRegistry::new(EventEmitter::new()),
            user,
            options: SessionOptions::default(),
        }
    }

    /// Use an existing hook registry. Events go to the registry's emitter.
    #[must_use]
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the session options.
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> &CommentState {
        &self.state
    }

    /// Comments in display order.
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.state.comments
    }

    /// Look up a comment by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Comment> {
        self.state.find(id)
    }

    /// Acting user.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Event bus for this session.
    #[must_use]
    pub fn emitter(&self) -> &EventEmitter {
        self.hooks.emitter()
    }

    /// Hook registry for this session.
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Threads in display order.
    #[must_use]
    pub fn threads(&self) -> Vec<CommentThread<'_>> {
        views::threads(&self.state.comments)
    }

    /// Active threads without a `resolved` reaction.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        views::unresolved_count(&self.state.comments)
    }

    /// Aggregate statistics.
    #[must_use]
    pub fn stats(&self) -> CommentStats {
        views::stats(&self.state.comments)
    }

    /// Replace the state with the comments storage holds for `scope`.
    ///
    /// Returns the number of comments loaded.
    pub async fn load(&mut self, scope: &LoadScope) -> Result<usize, SessionError> {
        self.state.dispatch(CommentAction::SetLoading(true));
        let comments = match self.storage.load(scope).await {
            Ok(comments) => comments,
            Err(e) => return Err(self.storage_failed("load", e)),
        };

        let count = comments.len();
        tracing::debug!(count, source = ?scope.source_id, "Loaded comments");
        self.state.dispatch(CommentAction::Load(comments.clone()));
        self.emitter().emit(&CommentEvent::CommentsLoaded(comments));
        Ok(count)
    }

    /// Create a comment from a draft.
    ///
    /// Runs `beforeAddComment` and `beforeSaveComment` hooks, persists the
    /// comment, then runs `afterSaveComment` before the comment enters the
    /// state. `afterAddComment` hooks only shape the returned value.
    ///
    /// A reply to a reply is re-targeted onto the thread root. A
    /// `beforeAddComment` hook can reject the draft by clearing its content.
    pub async fn add_comment(&mut self, draft: CommentDraft) -> Result<Comment, SessionError> {
        self.validate_content(&draft.content)?;

        let mut new = NewComment::from_draft(draft, self.user.clone());
        if let Some(parent_id) = new.parent_id.take() {
            if !self.state.contains(&parent_id) {
                return Err(SessionError::NotFound(parent_id));
            }
            new.parent_id = Some(self.root_id(&parent_id));
        }
        if let Some(editor_state) = &new.editor_state {
            let extraction = self.extract_references(editor_state);
            new.mentions = extraction.mentions;
            new.tags = extraction.tags;
        }

        let ctx = HookContext::new(HookPoint::BeforeAddComment)
            .with_user(self.user.clone())
            .with_source(new.source_id.clone(), new.source_type.clone());
        let new = self.hooks.run_before_add(new, ctx.clone()).await;
        self.validate_content(&new.content)?;

        let comment = new.into_comment(Uuid::new_v4().to_string(), Utc::now());
        let ctx = ctx.with_comment_id(&comment.id);
        let comment = self.hooks.run_before_save(comment, ctx.clone()).await;

        let stored = match self.storage.create(comment).await {
            Ok(stored) => stored,
            Err(e) => return Err(self.storage_failed("create", e)),
        };
        let stored = self.hooks.run_after_save(stored, ctx.clone()).await;
        if self.state.contains(&stored.id) {
            tracing::error!(id = %stored.id, "Storage returned an id already in use");
            self.report_failure("create", format!("duplicate comment id {}", stored.id));
            return Err(SessionError::DuplicateId(stored.id));
        }

        tracing::info!(id = %stored.id, reply = stored.is_reply(), "Added comment");
        self.state.dispatch(CommentAction::Add(stored.clone()));
        self.emitter().emit(&CommentEvent::CommentAdded(stored.clone()));

        Ok(self.hooks.run_after_add(stored, ctx).await)
    }

    /// Reply to `parent_id`. Replies always land on the thread root.
    pub async fn reply(
        &mut self,
        parent_id: &str,
        draft: CommentDraft,
    ) -> Result<Comment, SessionError> {
        self.add_comment(draft.with_parent(parent_id)).await
    }

    /// Apply a partial update.
    ///
    /// Mentions and tags are re-extracted when the patch carries a new
    /// `editorState` and no explicit references.
    pub async fn update_comment(
        &mut self,
        id: &str,
        mut patch: CommentPatch,
    ) -> Result<Comment, SessionError> {
        let existing = self
            .state
            .find(id)
            .ok_or_else(|| SessionError::NotFound(id.to_owned()))?;
        if let Some(content) = &patch.content {
            self.validate_content(content)?;
        }

        let editor_state_changed = patch
            .editor_state
            .as_ref()
            .is_some_and(|state| existing.editor_state != *state);
        if editor_state_changed && patch.mentions.is_none() && patch.tags.is_none() {
            // A cleared document carries no references.
            let extraction = match patch.editor_state.as_ref().and_then(Option::as_deref) {
                Some(editor_state) => self.extract_references(editor_state),
                None => Extraction::default(),
            };
            patch.mentions = Some(extraction.mentions);
            patch.tags = Some(extraction.tags);
        }

        let ctx = HookContext::new(HookPoint::BeforeUpdateComment)
            .with_user(self.user.clone())
            .with_comment_id(id)
            .with_source(existing.source_id.clone(), existing.source_type.clone());
        let patch = self.hooks.run_before_update(patch, ctx.clone()).await;
        if let Some(content) = &patch.content {
            self.validate_content(content)?;
        }

        let stored = match self.storage.update(id, &patch).await {
            Ok(stored) => stored,
            Err(e) => return Err(self.storage_failed("update", e)),
        };
        let stored = self.hooks.run_after_save(stored, ctx.clone()).await;

        // Keep the edit time storage recorded.
        self.state.dispatch_at(
            CommentAction::Update {
                id: id.to_owned(),
                updates: CommentPatch::from(&stored),
            },
            stored.updated_at,
        );
        let updated = self.state.find(id).cloned().unwrap_or(stored);
        tracing::info!(id, "Updated comment");
        self.emitter()
            .emit(&CommentEvent::CommentUpdated(updated.clone()));

        Ok(self.hooks.run_after_update(updated, ctx).await)
    }

    /// Delete a comment and every reply beneath it.
    ///
    /// Replies are removed first. One `commentDeleted` event is emitted per
    /// removed comment. Returns the removed ids in removal order.
    pub async fn delete_comment(&mut self, id: &str) -> Result<Vec<String>, SessionError> {
        if !self.state.contains(id) {
            return Err(SessionError::NotFound(id.to_owned()));
        }

        let mut targets = self.descendants(id);
        targets.push(id.to_owned());

        for target in &targets {
            if let Err(e) = self.storage.delete(target).await {
                return Err(self.storage_failed("delete", e));
            }
            self.state.dispatch(CommentAction::Delete { id: target.clone() });
            self.emitter()
                .emit(&CommentEvent::CommentDeleted { id: target.clone() });
        }

        tracing::info!(id, removed = targets.len(), "Deleted comment");
        Ok(targets)
    }

    /// React to a comment as the session user.
    pub async fn add_reaction(
        &mut self,
        comment_id: &str,
        reaction_type: ReactionType,
    ) -> Result<CommentReaction, SessionError> {
        if !self.state.contains(comment_id) {
            return Err(SessionError::NotFound(comment_id.to_owned()));
        }

        let reaction = CommentReaction::new(self.user.id.clone(), reaction_type);
        let stored = match self.storage.add_reaction(comment_id, reaction).await {
            Ok(stored) => stored,
            Err(e) => return Err(self.storage_failed("add_reaction", e)),
        };

        self.state.dispatch(CommentAction::AddReaction {
            comment_id: comment_id.to_owned(),
            reaction: stored.clone(),
        });
        self.emitter().emit(&CommentEvent::ReactionAdded {
            comment_id: comment_id.to_owned(),
            reaction: stored.clone(),
        });
        Ok(stored)
    }

    /// Remove a reaction from a comment.
    pub async fn remove_reaction(
        &mut self,
        comment_id: &str,
        reaction_id: &str,
    ) -> Result<(), SessionError> {
        let comment = self
            .state
            .find(comment_id)
            .ok_or_else(|| SessionError::NotFound(comment_id.to_owned()))?;
        if !comment.reactions.iter().any(|r| r.id == reaction_id) {
            return Err(SessionError::NotFound(reaction_id.to_owned()));
        }

        if let Err(e) = self.storage.remove_reaction(comment_id, reaction_id).await {
            return Err(self.storage_failed("remove_reaction", e));
        }

        self.state.dispatch(CommentAction::RemoveReaction {
            comment_id: comment_id.to_owned(),
            reaction_id: reaction_id.to_owned(),
        });
        self.emitter().emit(&CommentEvent::ReactionRemoved {
            comment_id: comment_id.to_owned(),
            reaction_id: reaction_id.to_owned(),
        });
        Ok(())
    }

    /// Add the session user's reaction of this type, or remove it if present.
    ///
    /// Returns the new reaction, or `None` if one was removed.
    pub async fn toggle_reaction(
        &mut self,
        comment_id: &str,
        reaction_type: ReactionType,
    ) -> Result<Option<CommentReaction>, SessionError> {
        let comment = self
            .state
            .find(comment_id)
            .ok_or_else(|| SessionError::NotFound(comment_id.to_owned()))?;

        match comment.reaction_by(&self.user.id, reaction_type) {
            Some(existing) => {
                let reaction_id = existing.id.clone();
                self.remove_reaction(comment_id, &reaction_id).await?;
                Ok(None)
            }
            None => self
                .add_reaction(comment_id, reaction_type)
                .await
                .map(Some),
        }
    }

    /// Mark the thread containing `comment_id` resolved.
    ///
    /// Returns `None` if the thread was already resolved.
    pub async fn resolve_thread(
        &mut self,
        comment_id: &str,
    ) -> Result<Option<CommentReaction>, SessionError> {
        if !self.state.contains(comment_id) {
            return Err(SessionError::NotFound(comment_id.to_owned()));
        }
        let root_id = self.root_id(comment_id);
        if self.state.find(&root_id).is_some_and(Comment::is_resolved) {
            return Ok(None);
        }
        self.add_reaction(&root_id, ReactionType::Resolved)
            .await
            .map(Some)
    }

    /// Reopen the thread containing `comment_id` by removing every
    /// `resolved` reaction on its root.
    ///
    /// Returns the number of reactions removed.
    pub async fn reopen_thread(&mut self, comment_id: &str) -> Result<usize, SessionError> {
        if !self.state.contains(comment_id) {
            return Err(SessionError::NotFound(comment_id.to_owned()));
        }
        let root_id = self.root_id(comment_id);
        let resolved: Vec<String> = self
            .state
            .find(&root_id)
            .map(|root| {
                root.reactions
                    .iter()
                    .filter(|r| r.reaction_type == ReactionType::Resolved)
                    .map(|r| r.id.clone())
                    .collect()
            })
            .unwrap_or_default();

        for reaction_id in &resolved {
            self.remove_reaction(&root_id, reaction_id).await?;
        }
        Ok(resolved.len())
    }

    /// Drop every comment from the state. Storage is not touched.
    pub fn clear(&mut self) {
        self.state.dispatch(CommentAction::Load(Vec::new()));
        self.emitter().emit(&CommentEvent::CommentsCleared);
    }

    fn validate_content(&self, content: &str) -> Result<(), SessionError> {
        if content.trim().is_empty() {
            return Err(SessionError::Validation("comment is empty".to_owned()));
        }
        let length = content.chars().count();
        if length > self.options.max_length {
            return Err(SessionError::Validation(format!(
                "comment is {length} characters, the limit is {}",
                self.options.max_length
            )));
        }
        Ok(())
    }

    /// Mentions and tags in `editor_state`. A malformed document yields none.
    fn extract_references(&self, editor_state: &str) -> Extraction {
        match self.options.extractor.extract(editor_state) {
            Ok(extraction) => extraction,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring malformed editor state");
                Extraction::default()
            }
        }
    }

    /// Thread root of `id`. A comment whose parent is missing is its own root.
    fn root_id(&self, id: &str) -> String {
        let mut current = id;
        let mut seen = HashSet::new();
        while let Some(parent) = self
            .state
            .find(current)
            .and_then(|c| c.parent_id.as_deref())
            .filter(|parent| self.state.contains(parent))
        {
            if !seen.insert(current) {
                break;
            }
            current = parent;
        }
        current.to_owned()
    }

    /// Every comment below `id`, each listed before its own parent.
    fn descendants(&self, id: &str) -> Vec<String> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::from([id.to_owned()]);
        let mut frontier = vec![id.to_owned()];
        while let Some(parent) = frontier.pop() {
            for reply in self.state.replies_to(&parent) {
                if seen.insert(reply.id.clone()) {
                    ordered.push(reply.id.clone());
                    frontier.push(reply.id.clone());
                }
            }
        }
        ordered.reverse();
        ordered
    }

    fn storage_failed(&mut self, operation: &str, err: StorageError) -> SessionError {
        tracing::error!(operation, error = %err, "Storage operation failed");
        self.report_failure(operation, err.to_string());
        SessionError::Storage(err)
    }

    /// Put a storage-side problem into `state.error` and emit it as `error`.
    fn report_failure(&mut self, operation: &str, message: String) {
        self.state
            .dispatch(CommentAction::SetError(Some(message.clone())));
        self.emitter()
            .emit(&CommentEvent::error(message, format!("storage:{operation}")));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chorus_comments::{CommentStatus, TagType};
    use chorus_events::{EventKind, Hook, HookError};
    use chorus_storage::{MockStorage, StorageErrorKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn ada() -> User {
        User::new("u1", "Ada")
    }

    fn session() -> (CommentSession, Arc<MockStorage>) {
        let storage = Arc::new(MockStorage::new());
        let session = CommentSession::new(
            Arc::clone(&storage) as Arc<dyn CommentStorage>,
            ada(),
        );
        (session, storage)
    }

    /// Record every event name the session emits.
    fn record(session: &CommentSession) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let sink = Arc::clone(&log);
            session.emitter().on(kind, move |event| {
                let name = match event {
                    CommentEvent::CommentDeleted { id } => format!("{}:{id}", event.kind()),
                    CommentEvent::Error { context, .. } => format!("error:{context}"),
                    _ => event.kind().to_string(),
                };
                sink.lock().unwrap().push(name);
                Ok(())
            });
        }
        log
    }

    fn document() -> String {
        json!({
            "root": {"type": "root", "children": [{
                "type": "paragraph",
                "children": [
                    {"type": "text", "text": "Ask "},
                    {"type": "beautifulMention", "trigger": "@", "value": "grace",
                     "data": {"id": "u2", "name": "Grace"}},
                    {"type": "text", "text": " about "},
                    {"type": "beautifulMention", "trigger": "#", "value": "refunds",
                     "data": {"id": "r1", "type": "rule"}}
                ]
            }]}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_add_comment_pipeline() {
        let (mut session, storage) = session();
        let events = record(&session);

        let comment = session
            .add_comment(CommentDraft::new("Ask @grace").with_source("doc", "page"))
            .await
            .unwrap();

        assert_eq!(comment.author, ada());
        assert_eq!(comment.author_id, "u1");
        assert_eq!(comment.status, CommentStatus::Active);
        assert!(!comment.is_edited);
        assert_eq!(comment.created_at, comment.updated_at);
        assert!(Uuid::parse_str(&comment.id).is_ok());
        assert_eq!(session.comments(), std::slice::from_ref(&comment));
        assert_eq!(storage.stored(), vec![comment]);
        assert_eq!(*events.lock().unwrap(), vec!["commentAdded"]);
    }

    #[tokio::test]
    async fn test_add_extracts_references() {
        let (mut session, _) = session();

        let comment = session
            .add_comment(CommentDraft::new("Ask @grace about #refunds").with_editor_state(document()))
            .await
            .unwrap();

        assert_eq!(comment.mentions.len(), 1);
        assert_eq!(comment.mentions[0].id, "u2");
        assert_eq!(comment.tags.len(), 1);
        assert_eq!(comment.tags[0].tag_type, TagType::Rule);
    }

    #[tokio::test]
    async fn test_add_with_broken_editor_state_keeps_going() {
        let (mut session, _) = session();

        let comment = session
            .add_comment(CommentDraft::new("hi").with_editor_state("{not json"))
            .await
            .unwrap();

        assert!(comment.mentions.is_empty());
        assert!(comment.tags.is_empty());
        assert_eq!(comment.editor_state.as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn test_validation_rejects_without_touching_state() {
        let (session, storage) = session();
        let mut session = session.with_options(SessionOptions {
            max_length: 5,
            ..SessionOptions::default()
        });
        let events = record(&session);

        let empty = session.add_comment(CommentDraft::new("   ")).await;
        let long = session.add_comment(CommentDraft::new("too long")).await;

        assert!(matches!(empty, Err(SessionError::Validation(_))));
        assert!(matches!(long, Err(SessionError::Validation(_))));
        assert!(session.comments().is_empty());
        assert!(session.state().error.is_none());
        assert!(storage.calls().is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reply_to_reply_targets_root() {
        let (mut session, _) = session();
        let root = session.add_comment(CommentDraft::new("root")).await.unwrap();
        let first = session.reply(&root.id, CommentDraft::new("first")).await.unwrap();

        let second = session.reply(&first.id, CommentDraft::new("second")).await.unwrap();

        assert_eq!(second.parent_id.as_deref(), Some(root.id.as_str()));
        let threads = session.threads();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies.len(), 2);
    }

    #[tokio::test]
    async fn test_reply_to_missing_parent() {
        let (mut session, _) = session();

        let result = session.reply("ghost", CommentDraft::new("hi")).await;

        assert!(matches!(result, Err(SessionError::NotFound(id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_in_state_and_events() {
        let (mut session, storage) = session();
        let events = record(&session);
        storage.fail_next(StorageErrorKind::Unavailable);

        let result = session.add_comment(CommentDraft::new("hi")).await;

        assert!(matches!(result, Err(SessionError::Storage(_))));
        assert!(session.comments().is_empty());
        assert!(
            session
                .state()
                .error
                .as_deref()
                .is_some_and(|e| e.starts_with("[Mock] Unavailable"))
        );
        assert_eq!(*events.lock().unwrap(), vec!["error:storage:create"]);

        session.add_comment(CommentDraft::new("again")).await.unwrap();
        assert!(session.state().error.is_none());
    }

    #[tokio::test]
    async fn test_hooks_shape_the_comment() {
        let (mut session, _) = session();
        session.hooks().register(Hook::before_add(|new: NewComment, _| async move {
            Ok(Some(CommentPatch::new().content(new.content.to_uppercase())))
        }));
        session.hooks().register(Hook::before_save(|_, ctx: HookContext| async move {
            let mut metadata = chorus_comments::Attributes::new();
            metadata.insert("savedBy".to_owned(), json!(ctx.user.map(|u| u.id)));
            Ok(Some(CommentPatch::new().metadata(metadata)))
        }));

        let comment = session.add_comment(CommentDraft::new("hello")).await.unwrap();

        assert_eq!(comment.content, "HELLO");
        assert_eq!(comment.metadata["savedBy"], json!("u1"));
        assert_eq!(session.comments()[0].content, "HELLO");
    }

    #[tokio::test]
    async fn test_after_add_shapes_result_only() {
        let (mut session, _) = session();
        session.hooks().register(Hook::after_add(|_, _| async {
            Ok(Some(CommentPatch::new().content("decorated")))
        }));

        let comment = session.add_comment(CommentDraft::new("plain")).await.unwrap();

        assert_eq!(comment.content, "decorated");
        assert_eq!(session.comments()[0].content, "plain");
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_block_add() {
        let (mut session, _) = session();
        let events = record(&session);
        session.hooks().register(Hook::before_add(|_, _| async {
            Err(HookError::failed("analytics offline"))
        }));

        let comment = session.add_comment(CommentDraft::new("hi")).await.unwrap();

        assert_eq!(comment.content, "hi");
        assert_eq!(
            *events.lock().unwrap(),
            vec!["error:hook:beforeAddComment", "commentAdded"]
        );
    }

    #[tokio::test]
    async fn test_hook_can_reject_by_clearing_content() {
        let (mut session, storage) = session();
        session.hooks().register(Hook::before_add(|_, _| async {
            Ok(Some(CommentPatch::new().content("")))
        }));

        let result = session.add_comment(CommentDraft::new("spam")).await;

        assert!(matches!(result, Err(SessionError::Validation(_))));
        assert!(storage.stored().is_empty());
    }

    #[tokio::test]
    async fn test_update_reextracts_and_marks_edited() {
        let (mut session, _) = session();
        let comment = session.add_comment(CommentDraft::new("draft")).await.unwrap();
        let events = record(&session);

        let updated = session
            .update_comment(
                &comment.id,
                CommentPatch::new()
                    .content("Ask @grace about #refunds")
                    .editor_state(document()),
            )
            .await
            .unwrap();

        assert!(updated.is_edited);
        assert!(updated.updated_at >= updated.created_at);
        assert_eq!(updated.mentions.len(), 1);
        assert_eq!(updated.tags.len(), 1);
        assert_eq!(session.find(&comment.id), Some(&updated));
        assert_eq!(*events.lock().unwrap(), vec!["commentUpdated"]);
    }

    #[tokio::test]
    async fn test_update_missing_comment() {
        let (mut session, storage) = session();

        let result = session
            .update_comment("ghost", CommentPatch::new().content("x"))
            .await;

        assert!(matches!(result, Err(SessionError::NotFound(_))));
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_replies() {
        let (mut session, storage) = session();
        let root = session.add_comment(CommentDraft::new("root")).await.unwrap();
        let reply = session.reply(&root.id, CommentDraft::new("reply")).await.unwrap();
        let other = session.add_comment(CommentDraft::new("other")).await.unwrap();
        let events = record(&session);

        let removed = session.delete_comment(&root.id).await.unwrap();

        assert_eq!(removed, vec![reply.id.clone(), root.id.clone()]);
        assert_eq!(session.comments(), std::slice::from_ref(&other));
        assert_eq!(storage.stored(), vec![other]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                format!("commentDeleted:{}", reply.id),
                format!("commentDeleted:{}", root.id)
            ]
        );
    }

    #[tokio::test]
    async fn test_toggle_reaction() {
        let (mut session, _) = session();
        let comment = session.add_comment(CommentDraft::new("hi")).await.unwrap();

        let added = session
            .toggle_reaction(&comment.id, ReactionType::Like)
            .await
            .unwrap();
        assert!(added.is_some());
        assert!(session.find(&comment.id).unwrap().has_reaction(ReactionType::Like));

        let removed = session
            .toggle_reaction(&comment.id, ReactionType::Like)
            .await
            .unwrap();
        assert!(removed.is_none());
        assert!(session.find(&comment.id).unwrap().reactions.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_reaction() {
        let (mut session, _) = session();
        let comment = session.add_comment(CommentDraft::new("hi")).await.unwrap();

        let result = session.remove_reaction(&comment.id, "nope").await;

        assert!(matches!(result, Err(SessionError::NotFound(id)) if id == "nope"));
    }

    #[tokio::test]
    async fn test_resolve_and_reopen_via_reply() {
        let (mut session, _) = session();
        let root = session.add_comment(CommentDraft::new("root")).await.unwrap();
        let reply = session.reply(&root.id, CommentDraft::new("reply")).await.unwrap();
        assert_eq!(session.unresolved_count(), 1);

        let reaction = session.resolve_thread(&reply.id).await.unwrap();
        assert!(reaction.is_some());
        assert_eq!(session.unresolved_count(), 0);
        assert!(session.find(&root.id).unwrap().is_resolved());
        assert!(session.resolve_thread(&root.id).await.unwrap().is_none());

        assert_eq!(session.reopen_thread(&reply.id).await.unwrap(), 1);
        assert_eq!(session.unresolved_count(), 1);
    }

    #[tokio::test]
    async fn test_load_scope_and_clear() {
        let storage = Arc::new(MockStorage::new().with_comments([
            Comment::new("a", "a", ada()).with_source("doc", Some("page")),
            Comment::new("b", "b", ada()).with_source("other", Some("page")),
        ]));
        let mut session = CommentSession::new(storage, ada());
        let events = record(&session);

        let count = session.load(&LoadScope::source("doc")).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(session.comments()[0].id, "a");
        assert!(!session.state().loading);

        session.clear();
        assert!(session.comments().is_empty());
        assert_eq!(
            *events.lock().unwrap(),
            vec!["commentsLoaded", "commentsCleared"]
        );
    }

    #[tokio::test]
    async fn test_load_failure_clears_loading() {
        let (mut session, storage) = session();
        storage.fail_next(StorageErrorKind::Timeout);

        let result = session.load(&LoadScope::all()).await;

        assert!(result.is_err());
        assert!(!session.state().loading);
        assert!(session.state().error.is_some());
    }

    /// Backend that hands every created comment the same id and keeps it.
    #[derive(Default)]
    struct FixedIdStorage {
        inner: MockStorage,
        created: Mutex<Vec<Comment>>,
    }

    #[async_trait::async_trait]
    impl CommentStorage for FixedIdStorage {
        async fn load(&self, scope: &LoadScope) -> Result<Vec<Comment>, StorageError> {
            self.inner.load(scope).await
        }

        async fn create(&self, mut comment: Comment) -> Result<Comment, StorageError> {
            comment.id = "fixed".to_owned();
            self.created.lock().unwrap().push(comment.clone());
            Ok(comment)
        }

        async fn update(&self, id: &str, patch: &CommentPatch) -> Result<Comment, StorageError> {
            self.inner.update(id, patch).await
        }

        async fn delete(&self, id: &str) -> Result<(), StorageError> {
            self.inner.delete(id).await
        }

        async fn add_reaction(
            &self,
            comment_id: &str,
            reaction: CommentReaction,
        ) -> Result<CommentReaction, StorageError> {
            self.inner.add_reaction(comment_id, reaction).await
        }

        async fn remove_reaction(
            &self,
            comment_id: &str,
            reaction_id: &str,
        ) -> Result<(), StorageError> {
            self.inner.remove_reaction(comment_id, reaction_id).await
        }
    }

    #[tokio::test]
    async fn test_duplicate_id_from_storage_is_reported() {
        let storage = Arc::new(FixedIdStorage::default());
        let mut session =
            CommentSession::new(Arc::clone(&storage) as Arc<dyn CommentStorage>, ada());
        session.add_comment(CommentDraft::new("one")).await.unwrap();
        let events = record(&session);

        let result = session.add_comment(CommentDraft::new("two")).await;

        assert!(matches!(result, Err(SessionError::DuplicateId(id)) if id == "fixed"));
        assert_eq!(session.comments().len(), 1);
        assert_eq!(session.comments()[0].content, "one");
        // Storage kept the second comment; the mismatch must be visible.
        let stored: Vec<String> = storage
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.content.clone())
            .collect();
        assert_eq!(stored, vec!["one", "two"]);
        assert_eq!(
            session.state().error.as_deref(),
            Some("duplicate comment id fixed")
        );
        assert_eq!(*events.lock().unwrap(), vec!["error:storage:create"]);
    }

    #[tokio::test]
    async fn test_update_keeps_storage_timestamp() {
        let (mut session, storage) = session();
        let comment = session.add_comment(CommentDraft::new("draft")).await.unwrap();

        let updated = session
            .update_comment(&comment.id, CommentPatch::new().content("final"))
            .await
            .unwrap();

        let stored = storage.stored();
        assert_eq!(stored[0].updated_at, updated.updated_at);
        assert_eq!(session.find(&comment.id).unwrap().updated_at, stored[0].updated_at);
    }

    #[tokio::test]
    async fn test_update_can_detach_source_and_editor_state() {
        let (mut session, storage) = session();
        let comment = session
            .add_comment(
                CommentDraft::new("Ask @grace about #refunds")
                    .with_editor_state(document())
                    .with_source("doc-1", "page"),
            )
            .await
            .unwrap();
        assert_eq!(comment.mentions.len(), 1);

        let mut patch = CommentPatch::new().source(None, None);
        patch.editor_state = Some(None);
        let updated = session.update_comment(&comment.id, patch).await.unwrap();

        assert_eq!(updated.source_id, None);
        assert_eq!(updated.editor_state, None);
        assert!(updated.mentions.is_empty());
        assert!(updated.tags.is_empty());
        assert_eq!(session.find(&comment.id), Some(&updated));
        assert_eq!(storage.stored()[0].source_id, None);
    }
}

//! Interceptor hooks around add, update and save.
//!
//! A [`HookRegistry`] holds an ordered list of [`Hook`]s. Each hook targets
//! one [`HookPoint`] and receives a typed payload. Hooks run one after the
//! other; a hook may return a [`CommentPatch`] that is shallow-merged onto
//! the payload before the next hook sees it.
//!
//! Failures never abort a chain. A hook that returns an error or panics is
//! logged, reported as an [`CommentEvent::Error`] on the registry's emitter,
//! and skipped.

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use chorus_comments::{ApplyPatch, Comment, CommentPatch, NewComment, User};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::emitter::{CommentEvent, EventEmitter, panic_message};

/// Interception point in the comment pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Before a new comment is built from a draft.
    BeforeAddComment,
    /// After a new comment entered the store.
    AfterAddComment,
    /// Before a patch is sent to storage.
    BeforeUpdateComment,
    /// After an update entered the store.
    AfterUpdateComment,
    /// Before a comment is written to storage.
    BeforeSaveComment,
    /// After storage returned the saved comment.
    AfterSaveComment,
}

impl HookPoint {
    /// Wire name of the hook point.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeAddComment => "beforeAddComment",
            Self::AfterAddComment => "afterAddComment",
            Self::BeforeUpdateComment => "beforeUpdateComment",
            Self::AfterUpdateComment => "afterUpdateComment",
            Self::BeforeSaveComment => "beforeSaveComment",
            Self::AfterSaveComment => "afterSaveComment",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook knows about the operation it intercepts.
#[derive(Clone, Debug, PartialEq)]
pub struct HookContext {
    /// Point being executed. Set by the registry.
    pub point: HookPoint,
    /// Acting user.
    pub user: Option<User>,
    /// Target comment, once it has an id.
    pub comment_id: Option<String>,
    /// Entity the comment is attached to.
    pub source_id: Option<String>,
    /// Kind of that entity.
    pub source_type: Option<String>,
}

impl HookContext {
    /// Empty context for a point.
    #[must_use]
    pub fn new(point: HookPoint) -> Self {
        Self {
            point,
            user: None,
            comment_id: None,
            source_id: None,
            source_type: None,
        }
    }

    /// Set the acting user.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Set the target comment id.
    #[must_use]
    pub fn with_comment_id(mut self, id: impl Into<String>) -> Self {
        self.comment_id = Some(id.into());
        self
    }

    /// Set the attached entity.
    #[must_use]
    pub fn with_source(mut self, source_id: Option<String>, source_type: Option<String>) -> Self {
        self.source_id = source_id;
        self.source_type = source_type;
        self
    }
}

/// Failure of a single hook.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HookError {
    /// The hook returned an error.
    #[error("{0}")]
    Failed(String),

    /// The hook panicked.
    #[error("hook panicked: {0}")]
    Panicked(String),
}

impl HookError {
    /// Create a hook failure with a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Value a hook resolves to: an optional patch to merge onto the payload.
pub type HookResult = Result<Option<CommentPatch>, HookError>;

/// Type-erased async hook callback for payload `T`.
pub type HookFn<T> = Arc<dyn Fn(T, HookContext) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// A registered hook: one variant per [`HookPoint`].
///
/// Cloning a hook clones the callback handle, so a clone can later be
/// passed to [`HookRegistry::unregister`].
#[derive(Clone)]
pub enum Hook {
    /// Runs over the [`NewComment`] before it becomes a comment.
    BeforeAddComment(HookFn<NewComment>),
    /// Runs over the added comment. The result goes back to the caller only.
    AfterAddComment(HookFn<Comment>),
    /// Runs over the update patch.
    BeforeUpdateComment(HookFn<CommentPatch>),
    /// Runs over the updated comment. The result goes back to the caller only.
    AfterUpdateComment(HookFn<Comment>),
    /// Runs over the comment about to be written.
    BeforeSaveComment(HookFn<Comment>),
    /// Runs over the comment storage returned.
    AfterSaveComment(HookFn<Comment>),
}

fn boxed<T, F, Fut>(f: F) -> HookFn<T>
where
    T: 'static,
    F: Fn(T, HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Arc::new(move |payload, ctx| f(payload, ctx).boxed())
}

impl Hook {
    /// Hook for [`HookPoint::BeforeAddComment`].
    pub fn before_add<F, Fut>(f: F) -> Self
    where
        F: Fn(NewComment, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self::BeforeAddComment(boxed(f))
    }

    /// Hook for [`HookPoint::AfterAddComment`].
    pub fn after_add<F, Fut>(f: F) -> Self
    where
        F: Fn(Comment, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self::AfterAddComment(boxed(f))
    }

    /// Hook for [`HookPoint::BeforeUpdateComment`].
    pub fn before_update<F, Fut>(f: F) -> Self
    where
        F: Fn(CommentPatch, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self::BeforeUpdateComment(boxed(f))
    }

    /// Hook for [`HookPoint::AfterUpdateComment`].
    pub fn after_update<F, Fut>(f: F) -> Self
    where
        F: Fn(Comment, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self::AfterUpdateComment(boxed(f))
    }

    /// Hook for [`HookPoint::BeforeSaveComment`].
    pub fn before_save<F, Fut>(f: F) -> Self
    where
        F: Fn(Comment, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self::BeforeSaveComment(boxed(f))
    }

    /// Hook for [`HookPoint::AfterSaveComment`].
    pub fn after_save<F, Fut>(f: F) -> Self
    where
        F: Fn(Comment, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self::AfterSaveComment(boxed(f))
    }

    /// Point this hook runs at.
    #[must_use]
    pub fn point(&self) -> HookPoint {
        match self {
            Self::BeforeAddComment(_) => HookPoint::BeforeAddComment,
            Self::AfterAddComment(_) => HookPoint::AfterAddComment,
            Self::BeforeUpdateComment(_) => HookPoint::BeforeUpdateComment,
            Self::AfterUpdateComment(_) => HookPoint::AfterUpdateComment,
            Self::BeforeSaveComment(_) => HookPoint::BeforeSaveComment,
            Self::AfterSaveComment(_) => HookPoint::AfterSaveComment,
        }
    }

    /// True if both hooks hold the same callback.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::BeforeAddComment(a), Self::BeforeAddComment(b)) => Arc::ptr_eq(a, b),
            (Self::BeforeUpdateComment(a), Self::BeforeUpdateComment(b)) => Arc::ptr_eq(a, b),
            (Self::AfterAddComment(a), Self::AfterAddComment(b))
            | (Self::AfterUpdateComment(a), Self::AfterUpdateComment(b))
            | (Self::BeforeSaveComment(a), Self::BeforeSaveComment(b))
            | (Self::AfterSaveComment(a), Self::AfterSaveComment(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.point()).finish()
    }
}

#[derive(Default)]
struct Hooks {
    next_id: u64,
    entries: Vec<(u64, Hook)>,
}

/// Ordered, shared set of hooks.
///
/// Cloning yields another handle to the same set.
#[derive(Clone)]
pub struct HookRegistry {
    inner: Arc<RwLock<Hooks>>,
    emitter: EventEmitter,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.len())
            .finish_non_exhaustive()
    }
}

impl HookRegistry {
    /// Create an empty registry that reports failures on `emitter`.
    #[must_use]
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            inner: Arc::default(),
            emitter,
        }
    }

    /// Emitter that receives hook failure events.
    #[must_use]
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Append a hook. It runs after every hook already registered for its point.
    pub fn register(&self, hook: Hook) -> HookHandle {
        let mut hooks = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = hooks.next_id;
        hooks.next_id += 1;
        let point = hook.point();
        hooks.entries.push((id, hook));
        tracing::debug!(hook = %point, "Registered hook");
        HookHandle {
            id,
            point,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Remove every registration of `hook`'s callback.
    ///
    /// Returns `true` if anything was removed.
    pub fn unregister(&self, hook: &Hook) -> bool {
        let mut hooks = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = hooks.entries.len();
        hooks.entries.retain(|(_, h)| !h.same_as(hook));
        hooks.entries.len() != before
    }

    /// Remove every hook.
    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clear();
    }

    /// Total number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// True if no hook is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of hooks registered for `point`.
    #[must_use]
    pub fn count(&self, point: HookPoint) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .filter(|(_, h)| h.point() == point)
            .count()
    }

    /// Run `beforeAddComment` hooks.
    pub async fn run_before_add(&self, draft: NewComment, ctx: HookContext) -> NewComment {
        let hooks = self.snapshot(|h| match h {
            Hook::BeforeAddComment(f) => Some(Arc::clone(f)),
            _ => None,
        });
        self.execute(HookPoint::BeforeAddComment, hooks, draft, ctx)
            .await
    }

    /// Run `afterAddComment` hooks.
    pub async fn run_after_add(&self, comment: Comment, ctx: HookContext) -> Comment {
        let hooks = self.snapshot(|h| match h {
            Hook::AfterAddComment(f) => Some(Arc::clone(f)),
            _ => None,
        });
        self.execute(HookPoint::AfterAddComment, hooks, comment, ctx)
            .await
    }

    /// Run `beforeUpdateComment` hooks.
    pub async fn run_before_update(&self, patch: CommentPatch, ctx: HookContext) -> CommentPatch {
        let hooks = self.snapshot(|h| match h {
            Hook::BeforeUpdateComment(f) => Some(Arc::clone(f)),
            _ => None,
        });
        self.execute(HookPoint::BeforeUpdateComment, hooks, patch, ctx)
            .await
    }

    /// Run `afterUpdateComment` hooks.
    pub async fn run_after_update(&self, comment: Comment, ctx: HookContext) -> Comment {
        let hooks = self.snapshot(|h| match h {
            Hook::AfterUpdateComment(f) => Some(Arc::clone(f)),
            _ => None,
        });
        self.execute(HookPoint::AfterUpdateComment, hooks, comment, ctx)
            .await
    }

    /// Run `beforeSaveComment` hooks.
    pub async fn run_before_save(&self, comment: Comment, ctx: HookContext) -> Comment {
        let hooks = self.snapshot(|h| match h {
            Hook::BeforeSaveComment(f) => Some(Arc::clone(f)),
            _ => None,
        });
        self.execute(HookPoint::BeforeSaveComment, hooks, comment, ctx)
            .await
    }

    /// Run `afterSaveComment` hooks.
    pub async fn run_after_save(&self, comment: Comment, ctx: HookContext) -> Comment {
        let hooks = self.snapshot(|h| match h {
            Hook::AfterSaveComment(f) => Some(Arc::clone(f)),
            _ => None,
        });
        self.execute(HookPoint::AfterSaveComment, hooks, comment, ctx)
            .await
    }

    fn snapshot<T>(&self, select: impl Fn(&Hook) -> Option<HookFn<T>>) -> Vec<HookFn<T>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .filter_map(|(_, h)| select(h))
            .collect()
    }

    async fn execute<T>(
        &self,
        point: HookPoint,
        hooks: Vec<HookFn<T>>,
        mut payload: T,
        mut ctx: HookContext,
    ) -> T
    where
        T: ApplyPatch + Clone + Send,
    {
        ctx.point = point;
        for hook in hooks {
            let outcome = match catch_unwind(AssertUnwindSafe(|| hook(payload.clone(), ctx.clone())))
            {
                Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(HookError::Panicked(panic_message(panic.as_ref()).to_owned())),
                },
                Err(panic) => Err(HookError::Panicked(panic_message(panic.as_ref()).to_owned())),
            };

            match outcome {
                Ok(Some(patch)) => payload.apply_patch(patch),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(hook = %point, error = %e, "Hook failed");
                    self.emitter.emit(&CommentEvent::error(
                        e.to_string(),
                        format!("hook:{point}"),
                    ));
                }
            }
        }
        payload
    }
}

/// Registration of one hook.
pub struct HookHandle {
    id: u64,
    point: HookPoint,
    inner: Arc<RwLock<Hooks>>,
}

impl fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookHandle")
            .field("id", &self.id)
            .field("point", &self.point)
            .finish()
    }
}

impl HookHandle {
    /// Point the hook runs at.
    #[must_use]
    pub fn point(&self) -> HookPoint {
        self.point
    }

    /// Remove exactly this registration.
    ///
    /// Returns `false` if it was already removed.
    pub fn unregister(self) -> bool {
        let mut hooks = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = hooks.entries.len();
        hooks.entries.retain(|(id, _)| *id != self.id);
        hooks.entries.len() != before
    }
}

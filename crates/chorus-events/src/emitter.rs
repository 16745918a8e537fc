//! Publish/subscribe bus for comment lifecycle events.
//!
//! An [`EventEmitter`] is a cheap, cloneable handle. Every clone shares the
//! same listener table, so a session and the UI layer observing it can hold
//! their own copies.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use chorus_comments::{Comment, CommentReaction};
use serde::Serialize;

/// Name of a lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// A comment entered the store.
    CommentAdded,
    /// A comment was edited.
    CommentUpdated,
    /// A comment was removed.
    CommentDeleted,
    /// A reaction was attached.
    ReactionAdded,
    /// A reaction was removed.
    ReactionRemoved,
    /// The store was replaced by a bulk load.
    CommentsLoaded,
    /// The store was emptied.
    CommentsCleared,
    /// An operation, hook or storage call failed.
    Error,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [Self; 8] = [
        Self::CommentAdded,
        Self::CommentUpdated,
        Self::CommentDeleted,
        Self::ReactionAdded,
        Self::ReactionRemoved,
        Self::CommentsLoaded,
        Self::CommentsCleared,
        Self::Error,
    ];

    /// Wire name of the event.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommentAdded => "commentAdded",
            Self::CommentUpdated => "commentUpdated",
            Self::CommentDeleted => "commentDeleted",
            Self::ReactionAdded => "reactionAdded",
            Self::ReactionRemoved => "reactionRemoved",
            Self::CommentsLoaded => "commentsLoaded",
            Self::CommentsCleared => "commentsCleared",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event with its payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum CommentEvent {
    /// A comment entered the store.
    CommentAdded(Comment),
    /// A comment was edited. Carries the stored version.
    CommentUpdated(Comment),
    /// A comment was removed.
    CommentDeleted {
        /// Removed comment.
        id: String,
    },
    /// A reaction was attached.
    ReactionAdded {
        /// Comment the reaction belongs to.
        comment_id: String,
        /// The stored reaction.
        reaction: CommentReaction,
    },
    /// A reaction was removed.
    ReactionRemoved {
        /// Comment the reaction belonged to.
        comment_id: String,
        /// Removed reaction.
        reaction_id: String,
    },
    /// The store was replaced by a bulk load.
    CommentsLoaded(Vec<Comment>),
    /// The store was emptied.
    CommentsCleared,
    /// Something failed.
    Error {
        /// Human-readable failure.
        message: String,
        /// Where it failed, e.g. `"storage:create"` or `"hook:beforeAddComment"`.
        context: String,
    },
}

impl CommentEvent {
    /// Build an error event.
    #[must_use]
    pub fn error(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CommentAdded(_) => EventKind::CommentAdded,
            Self::CommentUpdated(_) => EventKind::CommentUpdated,
            Self::CommentDeleted { .. } => EventKind::CommentDeleted,
            Self::ReactionAdded { .. } => EventKind::ReactionAdded,
            Self::ReactionRemoved { .. } => EventKind::ReactionRemoved,
            Self::CommentsLoaded(_) => EventKind::CommentsLoaded,
            Self::CommentsCleared => EventKind::CommentsCleared,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

/// Failure reported by a listener.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    /// Create a listener error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

type Listener = Arc<dyn Fn(&CommentEvent) -> Result<(), ListenerError> + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, EventKind, Listener)>,
}

/// Shared event bus.
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Arc<RwLock<Registry>>,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventEmitter")
            .field("listeners", &registry.listeners.len())
            .finish()
    }
}

impl EventEmitter {
    /// Create an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to one event kind.
    ///
    /// Listeners run in registration order. The returned [`Subscription`]
    /// must be passed to [`Subscription::unsubscribe`] to remove the listener;
    /// dropping it leaves the listener in place.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&CommentEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut registry = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, kind, Arc::new(listener)));
        Subscription {
            id,
            kind,
            emitter: self.clone(),
        }
    }

    /// Remove every listener of one event kind.
    pub fn off(&self, kind: EventKind) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .retain(|(_, k, _)| *k != kind);
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .clear();
    }

    /// Number of listeners subscribed to `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    /// Deliver `event` to its listeners.
    ///
    /// Listeners are called on a snapshot taken before the first one runs,
    /// so subscribing or unsubscribing from inside a listener only affects
    /// later emits. A listener that fails or panics is logged and skipped.
    ///
    /// Returns the number of listeners that completed successfully.
    pub fn emit(&self, event: &CommentEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<Listener> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        tracing::trace!(event = %kind, listeners = snapshot.len(), "Emitting event");

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::error!(event = %kind, error = %e, "Event listener failed");
                }
                Err(panic) => {
                    tracing::error!(
                        event = %kind,
                        panic = panic_message(panic.as_ref()),
                        "Event listener panicked"
                    );
                }
            }
        }
        delivered
    }

    fn remove(&self, id: u64) -> bool {
        let mut registry = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = registry.listeners.len();
        registry.listeners.retain(|(lid, _, _)| *lid != id);
        registry.listeners.len() != before
    }
}

/// Registration of one listener.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    emitter: EventEmitter,
}

impl Subscription {
    /// Event kind this subscription listens to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove exactly this listener.
    ///
    /// Returns `false` if it was already removed (by `off` or `clear`).
    pub fn unsubscribe(self) -> bool {
        self.emitter.remove(self.id)
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

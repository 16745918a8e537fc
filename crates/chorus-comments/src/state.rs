//! Comment state container and reducer.
//!
//! [`CommentState`] is the only mutable aggregate in Chorus. It changes
//! exclusively through [`CommentState::reduce`], a total function: every
//! [`CommentAction`] produces a new state and nothing panics. Payloads that
//! reference unknown comment ids produce no visible change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::draft::{ApplyPatch, CommentPatch};
use crate::model::{Comment, CommentReaction};

/// Comment list plus loading and error flags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentState {
    /// Comments in display order.
    pub comments: Vec<Comment>,
    /// True while a bulk load is in flight.
    #[serde(default)]
    pub loading: bool,
    /// Last storage-reported error, for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every transition the reducer understands.
///
/// Serialized as `{"type": "ADD_COMMENT", "payload": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[non_exhaustive]
pub enum CommentAction {
    /// Replace all comments (initial hydration).
    #[serde(rename = "LOAD_COMMENTS")]
    Load(Vec<Comment>),
    /// Append a comment.
    #[serde(rename = "ADD_COMMENT")]
    Add(Comment),
    /// Merge a partial update into the comment with this id.
    #[serde(rename = "UPDATE_COMMENT")]
    Update {
        /// Target comment id.
        id: String,
        /// Fields to replace.
        updates: CommentPatch,
    },
    /// Remove the comment with this id.
    #[serde(rename = "DELETE_COMMENT")]
    Delete {
        /// Target comment id.
        id: String,
    },
    /// Append a reaction to a comment.
    #[serde(rename = "ADD_REACTION")]
    AddReaction {
        /// Target comment id.
        #[serde(rename = "commentId")]
        comment_id: String,
        /// Reaction to append.
        reaction: CommentReaction,
    },
    /// Remove a reaction from a comment.
    #[serde(rename = "REMOVE_REACTION")]
    RemoveReaction {
        /// Target comment id.
        #[serde(rename = "commentId")]
        comment_id: String,
        /// Reaction to remove.
        #[serde(rename = "reactionId")]
        reaction_id: String,
    },
    /// Toggle the loading flag.
    #[serde(rename = "SET_LOADING")]
    SetLoading(bool),
    /// Set or clear the error message.
    #[serde(rename = "SET_ERROR")]
    SetError(Option<String>),
}

impl CommentAction {
    /// Wire name of the action.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load(_) => "LOAD_COMMENTS",
            Self::Add(_) => "ADD_COMMENT",
            Self::Update { .. } => "UPDATE_COMMENT",
            Self::Delete { .. } => "DELETE_COMMENT",
            Self::AddReaction { .. } => "ADD_REACTION",
            Self::RemoveReaction { .. } => "REMOVE_REACTION",
            Self::SetLoading(_) => "SET_LOADING",
            Self::SetError(_) => "SET_ERROR",
        }
    }
}

impl CommentState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an action, using the current time for edit timestamps.
    #[must_use]
    pub fn reduce(self, action: CommentAction) -> Self {
        self.reduce_at(action, Utc::now())
    }

    /// Apply an action with an explicit clock reading.
    ///
    /// `now` is only consulted by [`CommentAction::Update`].
    #[must_use]
    pub fn reduce_at(mut self, action: CommentAction, now: DateTime<Utc>) -> Self {
        tracing::trace!(action = action.name(), "Reducing comment action");

        match action {
            CommentAction::Load(comments) => {
                return Self {
                    comments,
                    loading: false,
                    error: None,
                };
            }
            CommentAction::Add(comment) => {
                self.error = None;
                if self.contains(&comment.id) {
                    tracing::warn!(id = %comment.id, "Ignoring ADD_COMMENT with duplicate id");
                } else {
                    self.comments.push(comment);
                }
            }
            CommentAction::Update { id, updates } => {
                self.error = None;
                for comment in self.comments.iter_mut().filter(|c| c.id == id) {
                    comment.apply_patch(updates.clone());
                    comment.is_edited = true;
                    comment.updated_at = now.max(comment.created_at);
                }
            }
            CommentAction::Delete { id } => {
                self.error = None;
                self.comments.retain(|c| c.id != id);
            }
            CommentAction::AddReaction {
                comment_id,
                reaction,
            } => {
                self.error = None;
                if let Some(comment) = self.find_mut(&comment_id) {
                    comment.reactions.push(reaction);
                }
            }
            CommentAction::RemoveReaction {
                comment_id,
                reaction_id,
            } => {
                self.error = None;
                if let Some(comment) = self.find_mut(&comment_id) {
                    comment.reactions.retain(|r| r.id != reaction_id);
                }
            }
            CommentAction::SetLoading(loading) => {
                self.loading = loading;
            }
            CommentAction::SetError(error) => {
                self.error = error;
                self.loading = false;
            }
        }

        self
    }

    /// Apply an action in place.
    pub fn dispatch(&mut self, action: CommentAction) {
        self.dispatch_at(action, Utc::now());
    }

    /// Apply an action in place with an explicit clock reading.
    pub fn dispatch_at(&mut self, action: CommentAction, now: DateTime<Utc>) {
        let state = std::mem::take(self);
        *self = state.reduce_at(action, now);
    }

    /// Look up a comment by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }

    /// True if a comment with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Replies to the given comment, in order.
    pub fn replies_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Comment> + 'a {
        self.comments
            .iter()
            .filter(move |c| c.parent_id.as_deref() == Some(id))
    }

    /// Number of comments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    /// True if there are no comments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

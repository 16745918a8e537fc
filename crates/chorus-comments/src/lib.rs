//! Comment model and state container for Chorus.
//!
//! This crate holds the canonical comment data model and the reducer that
//! owns all comment mutation. Everything else in the workspace (the session,
//! the hook registry, the event emitter) builds on these types.
//!
//! # Architecture
//!
//! - [`Comment`] and friends ([`User`], [`CommentReaction`], [`MentionUser`],
//!   [`MentionTag`]) form the data model. JSON uses camelCase field names.
//! - [`CommentState`] is the single mutable aggregate. It changes only through
//!   [`CommentState::reduce`], a total function over [`CommentAction`].
//! - [`views`] computes threads, per-source slices and statistics on read.
//!   Nothing derived is ever stored.
//! - [`CommentDraft`], [`NewComment`] and [`CommentPatch`] describe comments
//!   before they exist and partial updates after. [`ApplyPatch`] implements
//!   the shallow-merge rule shared by the reducer and the hook registry.
//!
//! # Example
//!
//! ```
//! use chorus_comments::{CommentAction, CommentState, Comment, User};
//!
//! let author = User::new("u1", "Ada");
//! let comment = Comment::new("c1", "Looks good", author);
//!
//! let state = CommentState::new().reduce(CommentAction::Add(comment));
//! assert_eq!(state.comments.len(), 1);
//! assert_eq!(chorus_comments::views::unresolved_count(&state.comments), 1);
//! ```

mod draft;
mod model;
mod state;
pub mod views;

pub use draft::{ApplyPatch, CommentDraft, CommentPatch, NewComment};
pub use model::{
    Attributes, Comment, CommentReaction, CommentStatus, MentionTag, MentionUser, ReactionType,
    TagType, User,
};
pub use state::{CommentAction, CommentState};

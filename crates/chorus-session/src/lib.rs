//! Comment session for Chorus.
//!
//! A [`CommentSession`] owns one [`CommentState`](chorus_comments::CommentState)
//! and drives every mutation through the same pipeline:
//!
//! 1. validate the draft or patch;
//! 2. fill mentions and tags from the editor state;
//! 3. run the "before" hooks;
//! 4. call the storage adapter;
//! 5. dispatch the reducer action and emit the lifecycle event;
//! 6. run the "after" hooks.
//!
//! Storage failures are written to the state's `error` field, emitted as
//! `error` events and returned. Hook and listener failures are reported and
//! never interrupt the pipeline.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chorus_comments::{CommentDraft, User};
//! use chorus_session::CommentSession;
//!
//! let mut session = CommentSession::new(Arc::new(storage), User::new("u1", "Ada"));
//! let root = session.add_comment(CommentDraft::new("Is this right?")).await?;
//! session.reply(&root.id, CommentDraft::new("Yes")).await?;
//! session.resolve_thread(&root.id).await?;
//! assert_eq!(session.unresolved_count(), 0);
//! ```

mod error;
mod session;

pub use error::SessionError;
pub use session::{CommentSession, DEFAULT_MAX_LENGTH, SessionOptions};

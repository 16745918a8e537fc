//! Comment lifecycle events and interceptor hooks.
//!
//! Two collaborators of the comment session live here:
//!
//! - [`EventEmitter`]: a publish/subscribe bus. Listeners subscribe to one
//!   [`EventKind`] and receive the matching [`CommentEvent`] synchronously.
//!   A failing listener is logged and never affects its siblings.
//! - [`HookRegistry`]: ordered async interceptors around add, update and
//!   save. A hook may return a [`CommentPatch`](chorus_comments::CommentPatch)
//!   that is merged onto the payload; failures are reported as
//!   [`CommentEvent::Error`] and the chain continues.
//!
//! Both are cheap to clone and share their state between clones. Neither is a
//! global: the owner constructs them and hands clones to whoever needs them.

mod emitter;
mod hooks;

pub use emitter::{CommentEvent, EventEmitter, EventKind, ListenerError, Subscription};
pub use hooks::{
    Hook, HookContext, HookError, HookFn, HookHandle, HookPoint, HookRegistry, HookResult,
};

//! Storage adapter contract for Chorus.
//!
//! Chorus keeps no comments on disk itself. Persistence is delegated to a
//! [`CommentStorage`] implementation supplied by the host application. This
//! enables:
//!
//! - **Unit testing** without a real backend
//! - **Backend flexibility** (HTTP API, `PostgreSQL`, browser storage)
//! - **Clean separation** between comment state logic and I/O
//!
//! # Architecture
//!
//! The crate provides:
//! - [`CommentStorage`] trait with bulk load, create, update, delete and
//!   reaction methods
//! - [`StorageError`] with a semantic [`StorageErrorKind`] and retry hint
//! - [`MockStorage`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use chorus_storage::{CommentStorage, LoadScope, MockStorage};
//!
//! let storage = MockStorage::new().with_comment(comment);
//! let comments = storage.load(&LoadScope::source("doc-1")).await?;
//! ```

#[cfg(feature = "mock")]
mod mock;
mod storage;

#[cfg(feature = "mock")]
pub use mock::MockStorage;
pub use storage::{CommentStorage, ErrorStatus, LoadScope, StorageError, StorageErrorKind};

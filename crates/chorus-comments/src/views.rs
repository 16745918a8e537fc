//! Derived projections over a comment list.
//!
//! Threads, per-source slices and statistics are computed on read and never
//! stored. Every function here is pure and borrows from the input slice.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::model::{Comment, CommentStatus, ReactionType};

/// A root comment with its replies.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentThread<'a> {
    /// Thread root.
    pub root: &'a Comment,
    /// Replies, in list order.
    pub replies: Vec<&'a Comment>,
}

impl CommentThread<'_> {
    /// A thread is resolved when its root carries a `resolved` reaction.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.root.is_resolved()
    }

    /// Number of comments in the thread, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.replies.len()
    }

    /// Always false; a thread has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Comments attached to the given source.
///
/// When `source_type` is `None` only the source id is compared.
#[must_use]
pub fn for_source<'a>(
    comments: &'a [Comment],
    source_id: &str,
    source_type: Option<&str>,
) -> Vec<&'a Comment> {
    comments
        .iter()
        .filter(|c| c.belongs_to(source_id, source_type))
        .collect()
}

/// Comments whose status is `active`.
#[must_use]
pub fn visible(comments: &[Comment]) -> Vec<&Comment> {
    comments
        .iter()
        .filter(|c| c.status == CommentStatus::Active)
        .collect()
}

/// Group comments into threads.
///
/// Threads appear in the order of their roots. A reply is attached to the
/// top-most ancestor that exists in `comments`; a reply whose parent is
/// missing becomes a root itself, so no comment disappears from the view.
#[must_use]
pub fn threads(comments: &[Comment]) -> Vec<CommentThread<'_>> {
    let mut index: HashMap<&str, &Comment> = HashMap::with_capacity(comments.len());
    for comment in comments {
        index.entry(comment.id.as_str()).or_insert(comment);
    }

    let roots: Vec<&Comment> = comments
        .iter()
        .map(|c| (c, root_of(c, &index)))
        .filter(|(c, root)| std::ptr::eq(*c, *root))
        .map(|(c, _)| c)
        .collect();

    let mut threads: Vec<CommentThread<'_>> = roots
        .iter()
        .map(|&root| CommentThread {
            root,
            replies: Vec::new(),
        })
        .collect();
    let position: HashMap<*const Comment, usize> = roots
        .iter()
        .enumerate()
        .map(|(i, root)| (std::ptr::from_ref(*root), i))
        .collect();

    for comment in comments {
        let root = root_of(comment, &index);
        if std::ptr::eq(comment, root) {
            continue;
        }
        if let Some(&i) = position.get(&std::ptr::from_ref(root)) {
            threads[i].replies.push(comment);
        }
    }

    threads
}

/// Follow parent links to the top-most existing ancestor.
fn root_of<'a>(comment: &'a Comment, index: &HashMap<&str, &'a Comment>) -> &'a Comment {
    let mut current = comment;
    let mut seen = HashSet::new();
    while let Some(parent_id) = current.parent_id.as_deref() {
        // Cycles in malformed data stop at the first repeat.
        if !seen.insert(current.id.as_str()) {
            break;
        }
        match index.get(parent_id) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

/// Number of threads whose root is active and not resolved.
#[must_use]
pub fn unresolved_count(comments: &[Comment]) -> usize {
    threads(comments)
        .iter()
        .filter(|t| t.root.status == CommentStatus::Active && !t.is_resolved())
        .count()
}

/// Summary counts over a comment list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentStats {
    /// All comments.
    pub total: usize,
    /// Thread roots.
    pub roots: usize,
    /// Replies attached to a root.
    pub replies: usize,
    /// Threads with a `resolved` reaction on the root.
    pub resolved_threads: usize,
    /// Active threads without a `resolved` reaction.
    pub unresolved_threads: usize,
    /// Comments edited at least once.
    pub edited: usize,
    /// Reaction counts by type.
    pub reactions: BTreeMap<ReactionType, usize>,
}

/// Compute [`CommentStats`] for a comment list.
#[must_use]
pub fn stats(comments: &[Comment]) -> CommentStats {
    let threads = threads(comments);

    let mut reactions = BTreeMap::new();
    for reaction in comments.iter().flat_map(|c| &c.reactions) {
        *reactions.entry(reaction.reaction_type).or_insert(0) += 1;
    }

    CommentStats {
        total: comments.len(),
        roots: threads.len(),
        replies: threads.iter().map(|t| t.replies.len()).sum(),
        resolved_threads: threads.iter().filter(|t| t.is_resolved()).count(),
        unresolved_threads: threads
            .iter()
            .filter(|t| t.root.status == CommentStatus::Active && !t.is_resolved())
            .count(),
        edited: comments.iter().filter(|c| c.is_edited).count(),
        reactions,
    }
}

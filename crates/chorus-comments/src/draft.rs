//! Comment drafts and partial updates.
//!
//! A [`CommentDraft`] is what a UI submits. Once an author is attached it
//! becomes a [`NewComment`], the payload seen by `beforeAddComment` hooks.
//! [`CommentPatch`] is the partial-update shape used by the reducer and
//! returned by hooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::{Attributes, Comment, CommentStatus, MentionTag, MentionUser, User};

/// Comment content as submitted by a UI, before authorship is attached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDraft {
    /// Plain-text rendering.
    pub content: String,
    /// Serialized rich-text document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_state: Option<String>,
    /// Comment being replied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// External entity id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// External entity kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Host-defined metadata.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub metadata: Attributes,
}

impl CommentDraft {
    /// Create a draft with plain-text content only.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Attach the serialized rich-text document.
    #[must_use]
    pub fn with_editor_state(mut self, editor_state: impl Into<String>) -> Self {
        self.editor_state = Some(editor_state.into());
        self
    }

    /// Attach the draft to an external entity.
    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>, source_type: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self.source_type = Some(source_type.into());
        self
    }

    /// Mark the draft as a reply.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A comment about to be created: draft content plus author and references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    /// Author snapshot.
    pub author: User,
    /// Plain-text rendering.
    pub content: String,
    /// Serialized rich-text document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_state: Option<String>,
    /// Root comment being replied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// External entity id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// External entity kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Extracted user mentions.
    #[serde(default)]
    pub mentions: Vec<MentionUser>,
    /// Extracted resource tags.
    #[serde(default)]
    pub tags: Vec<MentionTag>,
    /// Host-defined metadata.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub metadata: Attributes,
}

impl NewComment {
    /// Attach an author to a draft. References start out empty.
    #[must_use]
    pub fn from_draft(draft: CommentDraft, author: User) -> Self {
        Self {
            author,
            content: draft.content,
            editor_state: draft.editor_state,
            parent_id: draft.parent_id,
            source_id: draft.source_id,
            source_type: draft.source_type,
            mentions: Vec::new(),
            tags: Vec::new(),
            metadata: draft.metadata,
        }
    }

    /// Materialize an active, unedited comment with the given id and time.
    #[must_use]
    pub fn into_comment(self, id: impl Into<String>, now: DateTime<Utc>) -> Comment {
        Comment {
            id: id.into(),
            content: self.content,
            editor_state: self.editor_state,
            author_id: self.author.id.clone(),
            author: self.author,
            source_id: self.source_id,
            source_type: self.source_type,
            parent_id: self.parent_id,
            mentions: self.mentions,
            tags: self.tags,
            reactions: Vec::new(),
            status: CommentStatus::Active,
            is_edited: false,
            created_at: now,
            updated_at: now,
            metadata: self.metadata,
        }
    }
}

/// Partial comment update. Every `Some` field replaces the target's field.
///
/// The optional fields of a comment (`editorState`, `parentId`, `sourceId`,
/// `sourceType`) are doubly optional: `None` leaves them alone and
/// `Some(None)` clears them. On the wire an absent key means "unchanged" and
/// `null` means "clear".
///
/// There are no authorship fields: author and author id cannot change after
/// creation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    /// New plain-text rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New serialized rich-text document.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "clearable"
    )]
    pub editor_state: Option<Option<String>>,
    /// New mention list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<MentionUser>>,
    /// New tag list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<MentionTag>>,
    /// New lifecycle status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CommentStatus>,
    /// New parent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "clearable"
    )]
    pub parent_id: Option<Option<String>>,
    /// New source id.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "clearable"
    )]
    pub source_id: Option<Option<String>>,
    /// New source kind.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "clearable"
    )]
    pub source_type: Option<Option<String>>,
    /// Replacement metadata object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Attributes>,
}

impl CommentPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content.
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the serialized rich-text document.
    #[must_use]
    pub fn editor_state(mut self, editor_state: impl Into<String>) -> Self {
        self.editor_state = Some(Some(editor_state.into()));
        self
    }

    /// Set or clear the parent.
    #[must_use]
    pub fn parent_id(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set or clear the attached source.
    #[must_use]
    pub fn source(mut self, source_id: Option<String>, source_type: Option<String>) -> Self {
        self.source_id = Some(source_id);
        self.source_type = Some(source_type);
        self
    }

    /// Set the status.
    #[must_use]
    pub fn status(mut self, status: CommentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Replace the metadata object.
    #[must_use]
    pub fn metadata(mut self, metadata: Attributes) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// True if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&Comment> for CommentPatch {
    /// Patch that sets every patchable field to the comment's value.
    fn from(comment: &Comment) -> Self {
        Self {
            content: Some(comment.content.clone()),
            editor_state: Some(comment.editor_state.clone()),
            mentions: Some(comment.mentions.clone()),
            tags: Some(comment.tags.clone()),
            status: Some(comment.status),
            parent_id: Some(comment.parent_id.clone()),
            source_id: Some(comment.source_id.clone()),
            source_type: Some(comment.source_type.clone()),
            metadata: Some(comment.metadata.clone()),
        }
    }
}

/// Present-but-null deserializes to `Some(None)`; an absent key stays `None`
/// through `#[serde(default)]`.
fn clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Shallow merge of a [`CommentPatch`] onto a payload.
///
/// Top-level fields present in the patch replace the payload's fields.
/// Nested values (such as `metadata`) are replaced wholesale.
pub trait ApplyPatch {
    /// Merge `patch` on top of `self`.
    fn apply_patch(&mut self, patch: CommentPatch);
}

impl ApplyPatch for Comment {
    fn apply_patch(&mut self, patch: CommentPatch) {
        let CommentPatch {
            content,
            editor_state,
            mentions,
            tags,
            status,
            parent_id,
            source_id,
            source_type,
            metadata,
        } = patch;

        if let Some(content) = content {
            self.content = content;
        }
        if let Some(editor_state) = editor_state {
            self.editor_state = editor_state;
        }
        if let Some(mentions) = mentions {
            self.mentions = mentions;
        }
        if let Some(tags) = tags {
            self.tags = tags;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(parent_id) = parent_id {
            self.parent_id = parent_id;
        }
        if let Some(source_id) = source_id {
            self.source_id = source_id;
        }
        if let Some(source_type) = source_type {
            self.source_type = source_type;
        }
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
    }
}

impl ApplyPatch for NewComment {
    fn apply_patch(&mut self, patch: CommentPatch) {
        // A draft has no status yet; a status in the patch is ignored.
        let CommentPatch {
            content,
            editor_state,
            mentions,
            tags,
            status: _,
            parent_id,
            source_id,
            source_type,
            metadata,
        } = patch;

        if let Some(content) = content {
            self.content = content;
        }
        if let Some(editor_state) = editor_state {
            self.editor_state = editor_state;
        }
        if let Some(mentions) = mentions {
            self.mentions = mentions;
        }
        if let Some(tags) = tags {
            self.tags = tags;
        }
        if let Some(parent_id) = parent_id {
            self.parent_id = parent_id;
        }
        if let Some(source_id) = source_id {
            self.source_id = source_id;
        }
        if let Some(source_type) = source_type {
            self.source_type = source_type;
        }
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
    }
}

impl ApplyPatch for CommentPatch {
    fn apply_patch(&mut self, patch: CommentPatch) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if patch.$field.is_some() { self.$field = patch.$field; })*
            };
        }
        overlay!(
            content,
            editor_state,
            mentions,
            tags,
            status,
            parent_id,
            source_id,
            source_type,
            metadata
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_draft_to_comment() {
        let draft = CommentDraft::new("hello")
            .with_source("doc", "page")
            .with_metadata("channel", "web");
        let new = NewComment::from_draft(draft, User::new("u1", "Ada"));

        let comment = new.into_comment("c1", ts());

        assert_eq!(comment.id, "c1");
        assert_eq!(comment.author_id, "u1");
        assert_eq!(comment.source_type.as_deref(), Some("page"));
        assert_eq!(comment.metadata.get("channel"), Some(&json!("web")));
        assert_eq!(comment.created_at, comment.updated_at);
        assert_eq!(comment.status, CommentStatus::Active);
    }

    #[test]
    fn test_patch_leaves_absent_fields() {
        let mut comment = Comment::new_at("c1", "before", User::new("u1", "Ada"), ts())
            .with_source("doc", Some("page"));

        comment.apply_patch(CommentPatch::new().content("after"));

        assert_eq!(comment.content, "after");
        assert_eq!(comment.source_id.as_deref(), Some("doc"));
        assert_eq!(comment.status, CommentStatus::Active);
    }

    #[test]
    fn test_patch_replaces_metadata_wholesale() {
        let mut comment = Comment::new_at("c1", "x", User::new("u1", "Ada"), ts());
        comment.metadata.insert("a".to_owned(), json!(1));

        let mut replacement = Attributes::new();
        replacement.insert("b".to_owned(), json!(2));
        comment.apply_patch(CommentPatch::new().metadata(replacement));

        assert!(comment.metadata.get("a").is_none());
        assert_eq!(comment.metadata.get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_patch_onto_patch_later_wins() {
        let mut base = CommentPatch::new().content("one").status(CommentStatus::Hidden);

        base.apply_patch(CommentPatch::new().content("two"));

        assert_eq!(base.content.as_deref(), Some("two"));
        assert_eq!(base.status, Some(CommentStatus::Hidden));
    }

    #[test]
    fn test_new_comment_ignores_status() {
        let mut new = NewComment::from_draft(CommentDraft::new("x"), User::new("u1", "Ada"));

        new.apply_patch(CommentPatch::new().status(CommentStatus::Deleted).content("y"));

        assert_eq!(new.content, "y");
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(CommentPatch::new().is_empty());
        assert!(!CommentPatch::new().content("x").is_empty());
    }

    #[test]
    fn test_patch_wire_shape() {
        let patch = CommentPatch::new().editor_state("{}").status(CommentStatus::Deleted);

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"editorState": "{}", "status": "deleted"})
        );
    }

    #[test]
    fn test_patch_null_clears_optional_fields() {
        let mut comment = Comment::new_at("c1", "x", User::new("u1", "Ada"), ts())
            .with_parent("root")
            .with_source("doc", Some("page"));
        comment.editor_state = Some("{}".to_owned());

        let patch: CommentPatch =
            serde_json::from_value(json!({"parentId": null, "sourceType": null})).unwrap();
        comment.apply_patch(patch.clone());

        assert_eq!(patch.parent_id, Some(None));
        assert_eq!(patch.source_id, None);
        assert_eq!(comment.parent_id, None);
        assert_eq!(comment.source_type, None);
        assert_eq!(comment.source_id.as_deref(), Some("doc"));
        assert_eq!(comment.editor_state.as_deref(), Some("{}"));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"parentId": null, "sourceType": null})
        );
    }

    #[test]
    fn test_patch_builders_clear_fields() {
        let mut new = NewComment::from_draft(
            CommentDraft::new("x").with_parent("p1").with_source("doc", "page"),
            User::new("u1", "Ada"),
        );

        new.apply_patch(CommentPatch::new().parent_id(None).source(None, None));

        assert_eq!(new.parent_id, None);
        assert_eq!(new.source_id, None);
        assert_eq!(new.source_type, None);
    }

    #[test]
    fn test_patch_from_comment_clears_what_the_comment_lacks() {
        let source = Comment::new_at("c1", "stored", User::new("u1", "Ada"), ts());
        let mut target = Comment::new_at("c1", "old", User::new("u1", "Ada"), ts())
            .with_parent("p1")
            .with_source("doc", Some("page"));
        target.editor_state = Some("{}".to_owned());

        target.apply_patch(CommentPatch::from(&source));

        assert_eq!(target, source);
    }

    #[test]
    fn test_patch_from_comment_reproduces_it() {
        let mut source = Comment::new_at("c1", "stored", User::new("u1", "Ada"), ts())
            .with_source("doc", Some("page"));
        source.status = CommentStatus::Hidden;
        source.metadata.insert("k".to_owned(), json!(1));
        let mut target = Comment::new_at("c1", "old", User::new("u1", "Ada"), ts());

        target.apply_patch(CommentPatch::from(&source));

        assert_eq!(target, source);
    }
}

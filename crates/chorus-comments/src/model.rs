//! Comment data model.
//!
//! All types serialize with camelCase field names so the JSON shape matches
//! what storage adapters and editor front-ends exchange.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form JSON object (comment metadata, extra mention data).
pub type Attributes = Map<String, Value>;

/// A user who can author comments or be mentioned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable user identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl User {
    /// Create a user with only an id and display name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            avatar_url: None,
        }
    }

    /// Attach an email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Kind of reaction a user can leave on a comment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    /// Thumbs up.
    Like,
    /// Explicit approval.
    Approve,
    /// Raises a concern.
    Concern,
    /// Marks the thread as resolved.
    Resolved,
}

impl ReactionType {
    /// Every reaction type, in display order.
    pub const ALL: [Self; 4] = [Self::Like, Self::Approve, Self::Concern, Self::Resolved];

    /// Wire name of the reaction type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Approve => "approve",
            Self::Concern => "concern",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reaction owned by exactly one comment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReaction {
    /// Reaction identifier.
    pub id: String,
    /// User who reacted.
    pub user_id: String,
    /// Reaction kind.
    #[serde(rename = "type")]
    pub reaction_type: ReactionType,
    /// When the reaction was left.
    pub created_at: DateTime<Utc>,
}

impl CommentReaction {
    /// Create a reaction with a fresh id, stamped with the current time.
    #[must_use]
    pub fn new(user_id: impl Into<String>, reaction_type: ReactionType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            reaction_type,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle status of a comment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    /// Visible and editable.
    #[default]
    Active,
    /// Soft-deleted; kept for thread continuity.
    Deleted,
    /// Hidden by moderation.
    Hidden,
}

/// Kind of external resource a `#` tag points at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    /// Generic resource. Also used when the editor supplied no type.
    #[default]
    Resource,
    /// A rule.
    Rule,
    /// A document section.
    Section,
    /// A question.
    Question,
}

impl TagType {
    /// Parse a wire name. Returns `None` for unknown names.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "resource" => Some(Self::Resource),
            "rule" => Some(Self::Rule),
            "section" => Some(Self::Section),
            "question" => Some(Self::Question),
            _ => None,
        }
    }
}

/// An `@` reference to a user, positioned in the comment's plain text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionUser {
    /// Referenced user id.
    pub id: String,
    /// Text the mention renders as (without the trigger).
    pub value: String,
    /// Display name, when the editor supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Start offset (characters) in the rendered content, inclusive.
    pub start: usize,
    /// End offset (characters) in the rendered content, exclusive.
    pub end: usize,
    /// Remaining editor data carried by the mention node.
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// A `#` reference to a typed resource, positioned in the comment's plain text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionTag {
    /// Referenced resource id.
    pub id: String,
    /// Text the tag renders as (without the trigger).
    pub value: String,
    /// Resource kind.
    #[serde(default)]
    pub tag_type: TagType,
    /// Start offset (characters) in the rendered content, inclusive.
    pub start: usize,
    /// End offset (characters) in the rendered content, exclusive.
    pub end: usize,
    /// Remaining editor data carried by the tag node.
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// A single user-authored note, possibly a reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Unique comment id, never reused.
    pub id: String,
    /// Plain-text rendering.
    pub content: String,
    /// Serialized rich-text document. Source of truth for re-editing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_state: Option<String>,
    /// Author id. Immutable.
    pub author_id: String,
    /// Author snapshot taken at creation. Immutable.
    pub author: User,
    /// External entity this comment is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Kind of the external entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Root comment this is a reply to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// User mentions, in document order.
    #[serde(default)]
    pub mentions: Vec<MentionUser>,
    /// Resource tags, in document order.
    #[serde(default)]
    pub tags: Vec<MentionTag>,
    /// Reactions, in the order they were added.
    #[serde(default)]
    pub reactions: Vec<CommentReaction>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: CommentStatus,
    /// True once the comment has been updated at least once.
    #[serde(default)]
    pub is_edited: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time. Never earlier than `created_at`.
    pub updated_at: DateTime<Utc>,
    /// Host-defined metadata, typically filled in by hooks.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Attributes,
}

impl Comment {
    /// Create an active root comment stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>, author: User) -> Self {
        Self::new_at(id, content, author, Utc::now())
    }

    /// Create an active root comment with explicit timestamps.
    #[must_use]
    pub fn new_at(
        id: impl Into<String>,
        content: impl Into<String>,
        author: User,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            editor_state: None,
            author_id: author.id.clone(),
            author,
            source_id: None,
            source_type: None,
            parent_id: None,
            mentions: Vec::new(),
            tags: Vec::new(),
            reactions: Vec::new(),
            status: CommentStatus::Active,
            is_edited: false,
            created_at: now,
            updated_at: now,
            metadata: Attributes::new(),
        }
    }

    /// Make this comment a reply to `parent_id`.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Attach this comment to an external entity.
    #[must_use]
    pub fn with_source(
        mut self,
        source_id: impl Into<String>,
        source_type: Option<impl Into<String>>,
    ) -> Self {
        self.source_id = Some(source_id.into());
        self.source_type = source_type.map(Into::into);
        self
    }

    /// True if this comment is a reply.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// True if the comment carries a `resolved` reaction.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.has_reaction(ReactionType::Resolved)
    }

    /// True if any reaction of the given type is present.
    #[must_use]
    pub fn has_reaction(&self, reaction_type: ReactionType) -> bool {
        self.reactions
            .iter()
            .any(|r| r.reaction_type == reaction_type)
    }

    /// Find the reaction a user left with the given type.
    #[must_use]
    pub fn reaction_by(&self, user_id: &str, reaction_type: ReactionType) -> Option<&CommentReaction> {
        self.reactions
            .iter()
            .find(|r| r.user_id == user_id && r.reaction_type == reaction_type)
    }

    /// True if the comment is attached to the given source.
    ///
    /// When `source_type` is `None` only the id is compared.
    #[must_use]
    pub fn belongs_to(&self, source_id: &str, source_type: Option<&str>) -> bool {
        if self.source_id.as_deref() != Some(source_id) {
            return false;
        }
        match source_type {
            Some(kind) => self.source_type.as_deref() == Some(kind),
            None => true,
        }
    }
}

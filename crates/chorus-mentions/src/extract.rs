//! Mention/tag extraction from serialized editor state.
//!
//! The input is a JSON object whose `root` field holds a node tree. Each node
//! looks like `{type, value?, text?, data?, trigger?, children?}`. The walk is
//! depth-first and pre-order, so references come out in document order.
//!
//! While walking, the extractor also renders the document's plain text:
//!
//! - `text` nodes contribute their `text`
//! - mention nodes contribute `trigger + value`
//! - `linebreak` nodes contribute `"\n"`, `tab` nodes contribute `"\t"`
//! - top-level blocks (children of `root`) are separated by `"\n"`
//!
//! Spans are character offsets (Unicode scalar values) into that text.
//!
//! Editors store node-specific fields of any type (a list item's `value` is a
//! number, for example). Fields of an unexpected type are ignored rather than
//! rejected: a non-string `value`/`text`/`trigger` reads as absent, a
//! non-object `data` as empty and a non-array `children` as no children.

use chorus_comments::{Attributes, MentionTag, MentionUser, TagType};
use serde::Serialize;
use serde_json::Value;

/// Node `type` that marks a mention in the serialized document.
pub const DEFAULT_MENTION_NODE_TYPE: &str = "beautifulMention";

const MENTION_TRIGGER: &str = "@";
const TAG_TRIGGER: &str = "#";

/// Error parsing serialized editor state.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// Input is not JSON.
    #[error("editor state is not valid JSON")]
    Json(#[source] serde_json::Error),

    /// Input has no `root` object.
    #[error("editor state has no root node")]
    MissingRoot,
}

/// References and rendered text pulled out of one document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    /// `@` mentions in document order.
    pub mentions: Vec<MentionUser>,
    /// `#` tags in document order.
    pub tags: Vec<MentionTag>,
    /// Plain-text rendering the spans point into.
    pub text: String,
}

impl Extraction {
    /// True if no mentions or tags were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty() && self.tags.is_empty()
    }
}

/// Borrowed view of one tree node.
#[derive(Clone, Copy)]
struct Node<'a>(&'a Attributes);

impl<'a> Node<'a> {
    fn string(self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(Value::as_str)
    }

    fn node_type(self) -> &'a str {
        self.string("type").unwrap_or_default()
    }

    fn data(self) -> Option<&'a Attributes> {
        self.0.get("data").and_then(Value::as_object)
    }

    fn children(self) -> impl Iterator<Item = Node<'a>> {
        self.0
            .get("children")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(Node)
    }
}

/// Mention/tag extractor with a configurable mention node type.
#[derive(Clone, Debug)]
pub struct Extractor {
    node_type: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Create an extractor that recognizes [`DEFAULT_MENTION_NODE_TYPE`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            node_type: DEFAULT_MENTION_NODE_TYPE.to_owned(),
        }
    }

    /// Recognize a different mention node type.
    #[must_use]
    pub fn with_node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    /// Node type this extractor treats as a mention.
    #[must_use]
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Parse a document and collect its references.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the input is not JSON or has no `root`
    /// object.
    pub fn extract(&self, editor_state: &str) -> Result<Extraction, ExtractError> {
        let document: Value = serde_json::from_str(editor_state).map_err(ExtractError::Json)?;
        let root = document
            .get("root")
            .and_then(Value::as_object)
            .map(Node)
            .ok_or(ExtractError::MissingRoot)?;

        let mut walker = Walker::new(&self.node_type);
        for (i, block) in root.children().enumerate() {
            if i > 0 {
                walker.push_text("\n");
            }
            walker.visit(block);
        }

        tracing::trace!(
            mentions = walker.extraction.mentions.len(),
            tags = walker.extraction.tags.len(),
            "Extracted references"
        );

        Ok(walker.extraction)
    }

    /// Like [`extract`](Self::extract), but never fails.
    ///
    /// Parse failures are logged and yield an empty [`Extraction`], which is
    /// indistinguishable from a document without references.
    #[must_use]
    pub fn extract_lenient(&self, editor_state: &str) -> Extraction {
        match self.extract(editor_state) {
            Ok(extraction) => extraction,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to extract mentions and tags");
                Extraction::default()
            }
        }
    }
}

/// Parse a document with the default extractor.
///
/// # Errors
///
/// See [`Extractor::extract`].
pub fn parse_references(editor_state: &str) -> Result<Extraction, ExtractError> {
    Extractor::new().extract(editor_state)
}

/// Collect references with the default extractor, returning empty results on
/// parse failure.
#[must_use]
pub fn extract_mentions_and_tags(editor_state: &str) -> Extraction {
    Extractor::new().extract_lenient(editor_state)
}

struct Walker<'a> {
    node_type: &'a str,
    offset: usize,
    extraction: Extraction,
}

impl<'a> Walker<'a> {
    fn new(node_type: &'a str) -> Self {
        Self {
            node_type,
            offset: 0,
            extraction: Extraction::default(),
        }
    }

    fn push_text(&mut self, text: &str) {
        self.offset += text.chars().count();
        self.extraction.text.push_str(text);
    }

    fn visit(&mut self, node: Node<'_>) {
        match node.node_type() {
            t if t == self.node_type => self.visit_mention(node),
            "text" => {
                if let Some(text) = node.string("text") {
                    self.push_text(text);
                }
            }
            "linebreak" => self.push_text("\n"),
            "tab" => self.push_text("\t"),
            _ => {}
        }

        for child in node.children() {
            self.visit(child);
        }
    }

    fn visit_mention(&mut self, node: Node<'_>) {
        let trigger = node.string("trigger").unwrap_or_default();
        let value = node.string("value").unwrap_or_default();

        let start = self.offset;
        self.push_text(trigger);
        self.push_text(value);
        let end = self.offset;

        let mut record = Attributes::new();
        record.insert("value".to_owned(), Value::String(value.to_owned()));
        if let Some(data) = node.data() {
            record.extend(data.clone());
        }

        match trigger {
            MENTION_TRIGGER => self
                .extraction
                .mentions
                .push(mention_from_record(record, start, end)),
            TAG_TRIGGER => self
                .extraction
                .tags
                .push(tag_from_record(record, start, end)),
            _ => {}
        }
    }
}

/// Keys serialized by [`MentionUser`] and [`MentionTag`] themselves. Extra
/// attributes must not repeat them or the record stops deserializing.
const RESERVED_KEYS: [&str; 6] = ["id", "value", "name", "start", "end", "tagType"];

/// Remove `key`, keeping it only if it is a string or a number.
fn take_string(record: &mut Attributes, key: &str) -> Option<String> {
    match record.remove(key)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn drop_reserved(record: &mut Attributes) {
    for key in RESERVED_KEYS {
        if record.remove(key).is_some() {
            tracing::debug!(key, "Dropping reserved key from mention data");
        }
    }
}

fn mention_from_record(mut record: Attributes, start: usize, end: usize) -> MentionUser {
    let value = take_string(&mut record, "value").unwrap_or_default();
    let id = take_string(&mut record, "id").unwrap_or_else(|| value.clone());
    let name = take_string(&mut record, "name");
    drop_reserved(&mut record);

    MentionUser {
        id,
        value,
        name,
        start,
        end,
        attributes: record,
    }
}

fn tag_from_record(mut record: Attributes, start: usize, end: usize) -> MentionTag {
    let value = take_string(&mut record, "value").unwrap_or_default();
    let id = take_string(&mut record, "id").unwrap_or_else(|| value.clone());
    let tag_type = match take_string(&mut record, "type") {
        Some(name) => TagType::parse(&name).unwrap_or_else(|| {
            record.insert("type".to_owned(), Value::String(name));
            TagType::default()
        }),
        None => TagType::default(),
    };
    drop_reserved(&mut record);

    MentionTag {
        id,
        value,
        tag_type,
        start,
        end,
        attributes: record,
    }
}

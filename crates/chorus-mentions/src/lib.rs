//! Mention and tag support for Chorus.
//!
//! Two halves:
//!
//! - [`Extractor`] walks a serialized rich-text document (a JSON object with
//!   a `root` node tree) and collects `@` mentions and `#` tags with their
//!   character spans in the rendered plain text.
//! - [`MentionCandidates`] supplies the users and tags an editor can suggest,
//!   either pre-seeded or fetched once from a [`MentionDataProvider`].
//!
//! # Example
//!
//! ```
//! let doc = r#"{"root": {"type": "root", "children": [
//!     {"type": "paragraph", "children": [
//!         {"type": "text", "text": "ping "},
//!         {"type": "beautifulMention", "trigger": "@", "value": "ada", "data": {"id": "u1"}}
//!     ]}
//! ]}}"#;
//!
//! let extraction = chorus_mentions::parse_references(doc).unwrap();
//! assert_eq!(extraction.text, "ping @ada");
//! assert_eq!(extraction.mentions[0].id, "u1");
//! assert_eq!((extraction.mentions[0].start, extraction.mentions[0].end), (5, 9));
//! ```

mod extract;
mod provider;

pub use extract::{
    DEFAULT_MENTION_NODE_TYPE, ExtractError, Extraction, Extractor, extract_mentions_and_tags,
    parse_references,
};
pub use provider::{MentionCandidates, MentionDataProvider, ProviderError, TagCandidate};

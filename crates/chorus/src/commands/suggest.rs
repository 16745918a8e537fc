//! `chorus suggest` command implementation.

use chorus_config::{Config, TagConfig};
use chorus_mentions::{MentionCandidates, TagCandidate};
use clap::Args;

use crate::error::CliError;
use crate::output::{Output, write_json};

/// Arguments for the suggest command.
#[derive(Args)]
pub(crate) struct SuggestArgs {
    /// Text typed after the trigger character.
    #[arg(default_value = "")]
    query: String,

    /// Search taggable resources instead of users.
    #[arg(long)]
    tags: bool,

    /// Maximum number of suggestions (defaults to `mentions.max_suggestions`).
    #[arg(long)]
    limit: Option<usize>,
}

impl SuggestArgs {
    /// Execute the suggest command.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime can't start or the lookup fails.
    pub(crate) fn execute(self, config: &Config) -> Result<(), CliError> {
        let output = Output::new();
        let candidates = candidates(config);
        let rt = super::runtime()?;

        let found = if self.tags {
            let tags = rt.block_on(candidates.search_tags(&self.query, self.limit))?;
            let found = tags.len();
            write_json(&tags)?;
            found
        } else {
            let users = rt.block_on(candidates.search_users(&self.query, self.limit))?;
            let found = users.len();
            write_json(&users)?;
            found
        };

        if found == 0 {
            output.warning(&format!("No suggestions for \"{}\"", self.query));
        }
        Ok(())
    }
}

/// Candidate lists seeded from the `[mentions]` config section.
fn candidates(config: &Config) -> MentionCandidates {
    let tags = config.mentions.tags.iter().map(tag_candidate).collect();
    MentionCandidates::seeded(config.mentions.users.clone(), tags)
        .with_max_suggestions(config.mentions.max_suggestions)
}

fn tag_candidate(tag: &TagConfig) -> TagCandidate {
    let mut candidate = TagCandidate::new(&tag.id, &tag.name, tag.tag_type);
    candidate.description.clone_from(&tag.description);
    candidate
}

//! `chorus replay` command implementation.

use std::path::PathBuf;

use chorus_comments::{CommentAction, CommentState, views};
use chrono::{DateTime, Utc};
use clap::Args;

use crate::error::CliError;
use crate::output::{Output, write_json};

/// Arguments for the replay command.
#[derive(Args)]
pub(crate) struct ReplayArgs {
    /// JSON array of reducer actions. Use `-` for stdin.
    file: PathBuf,

    /// Clock reading used for edit timestamps (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    at: Option<DateTime<Utc>>,

    /// Print statistics instead of the final state.
    #[arg(long)]
    stats: bool,
}

impl ReplayArgs {
    /// Execute the replay command.
    ///
    /// # Errors
    ///
    /// Returns an error if the input can't be read or isn't a list of actions.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let actions: Vec<CommentAction> = serde_json::from_str(&super::read_input(&self.file)?)?;
        let count = actions.len();

        let state = fold(actions, self.at.unwrap_or_else(Utc::now));

        output.info(&format!("Replayed {count} action(s)"));
        if let Some(error) = &state.error {
            output.warning(&format!("State carries an error: {error}"));
        }

        if self.stats {
            write_json(&views::stats(&state.comments))?;
        } else {
            write_json(&state)?;
        }
        Ok(())
    }
}

/// Fold actions through the reducer with a fixed clock.
fn fold(actions: Vec<CommentAction>, now: DateTime<Utc>) -> CommentState {
    actions
        .into_iter()
        .fold(CommentState::new(), |state, action| state.reduce_at(action, now))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_fold_wire_actions() {
        let actions: Vec<CommentAction> = serde_json::from_value(json!([
            {"type": "ADD_COMMENT", "payload": {
                "id": "c1", "content": "hi", "authorId": "u1",
                "author": {"id": "u1", "name": "Ada"},
                "mentions": [], "tags": [], "reactions": [],
                "status": "active", "isEdited": false,
                "createdAt": "2024-05-01T12:00:00Z", "updatedAt": "2024-05-01T12:00:00Z"
            }},
            {"type": "UPDATE_COMMENT", "payload": {"id": "c1", "updates": {"content": "edited"}}},
            {"type": "SET_ERROR", "payload": "offline"}
        ]))
        .unwrap();
        let now = parse_timestamp("2024-05-02T08:00:00Z").unwrap();

        let state = fold(actions, now);

        assert_eq!(state.comments.len(), 1);
        assert_eq!(state.comments[0].content, "edited");
        assert!(state.comments[0].is_edited);
        assert_eq!(state.comments[0].updated_at, now);
        assert_eq!(state.error.as_deref(), Some("offline"));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2024-05-02T08:00:00+02:00").is_ok());
    }
}

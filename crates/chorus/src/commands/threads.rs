//! `chorus threads` command implementation.

use std::path::PathBuf;

use chorus_comments::Comment;
use chorus_comments::views::{self, CommentThread};
use clap::Args;

use crate::error::CliError;
use crate::output::{Output, write_lines};

/// Arguments for the threads command.
#[derive(Args)]
pub(crate) struct ThreadsArgs {
    /// JSON array of comments. Use `-` for stdin.
    file: PathBuf,

    /// Only show comments attached to this source.
    #[arg(long)]
    source_id: Option<String>,

    /// Source type to match together with `--source-id`.
    #[arg(long, requires = "source_id")]
    source_type: Option<String>,
}

impl ThreadsArgs {
    /// Execute the threads command.
    ///
    /// # Errors
    ///
    /// Returns an error if the input can't be read or isn't a list of comments.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let comments: Vec<Comment> = serde_json::from_str(&super::read_input(&self.file)?)?;

        let comments: Vec<Comment> = match &self.source_id {
            Some(source_id) => {
                views::for_source(&comments, source_id, self.source_type.as_deref())
                    .into_iter()
                    .cloned()
                    .collect()
            }
            None => comments,
        };

        let threads = views::threads(&comments);
        write_lines(&render(&threads))?;

        output.highlight(&format!(
            "{} thread(s), {} unresolved",
            threads.len(),
            views::unresolved_count(&comments)
        ));
        Ok(())
    }
}

/// One line per comment, replies indented under their root.
fn render(threads: &[CommentThread<'_>]) -> Vec<String> {
    let mut lines = Vec::new();
    for thread in threads {
        let marker = if thread.is_resolved() { " [resolved]" } else { "" };
        lines.push(format!("{}{marker}", describe(thread.root)));
        lines.extend(thread.replies.iter().map(|reply| format!("  {}", describe(reply))));
    }
    lines
}

fn describe(comment: &Comment) -> String {
    format!("{} {}: {}", comment.id, comment.author.name, comment.content)
}

//! `chorus extract` command implementation.

use std::path::PathBuf;

use chorus_config::Config;
use chorus_mentions::{Extraction, Extractor};
use clap::Args;

use crate::error::CliError;
use crate::output::{Output, write_json};

/// Arguments for the extract command.
#[derive(Args)]
pub(crate) struct ExtractArgs {
    /// Serialized editor state (JSON). Use `-` for stdin.
    file: PathBuf,

    /// Fail on malformed input instead of printing empty results.
    #[arg(long)]
    strict: bool,
}

impl ExtractArgs {
    /// Execute the extract command.
    ///
    /// # Errors
    ///
    /// Returns an error if the input can't be read, or if it is malformed and
    /// `--strict` is set.
    pub(crate) fn execute(self, config: &Config) -> Result<(), CliError> {
        let output = Output::new();
        let editor_state = super::read_input(&self.file)?;
        let extractor = Extractor::new().with_node_type(&config.mentions.node_type);

        let extraction = match extractor.extract(&editor_state) {
            Ok(extraction) => extraction,
            Err(err) if self.strict => return Err(err.into()),
            Err(err) => {
                output.warning(&format!("Warning: {err}; no references extracted"));
                Extraction::default()
            }
        };

        tracing::info!(
            mentions = extraction.mentions.len(),
            tags = extraction.tags.len(),
            "Extraction finished"
        );
        write_json(&extraction)?;
        Ok(())
    }
}

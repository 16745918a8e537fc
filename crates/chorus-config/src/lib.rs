//! Configuration management for Chorus.
//!
//! Parses `chorus.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `user.id`
//! - `user.name`
//! - `user.email`

mod expand;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chorus_comments::{TagType, User};
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override acting user id.
    pub user_id: Option<String>,
    /// Override acting user display name.
    pub user_name: Option<String>,
    /// Override maximum comment length.
    pub max_length: Option<usize>,
    /// Override mention node type.
    pub node_type: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "chorus.toml";

/// Upper bound accepted for `comments.max_length`.
const MAX_COMMENT_LENGTH: usize = 1_000_000;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Acting user for sessions.
    pub user: UserConfig,
    /// Comment limits.
    pub comments: CommentsConfig,
    /// Mention extraction and candidate lists.
    pub mentions: MentionsConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Acting user configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// User id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: "local".to_owned(),
            name: "Local User".to_owned(),
            email: None,
        }
    }
}

impl UserConfig {
    /// The configured user as a comment author.
    #[must_use]
    pub fn to_user(&self) -> User {
        let user = User::new(&self.id, &self.name);
        match &self.email {
            Some(email) => user.with_email(email),
            None => user,
        }
    }
}

/// Comment limits.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    /// Longest accepted comment, in characters.
    pub max_length: usize,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self { max_length: 10_000 }
    }
}

/// Mention configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MentionsConfig {
    /// Node type treated as a mention in serialized documents.
    pub node_type: String,
    /// Default number of suggestions per search.
    pub max_suggestions: usize,
    /// Pre-seeded mentionable users.
    pub users: Vec<User>,
    /// Pre-seeded taggable resources.
    pub tags: Vec<TagConfig>,
}

impl Default for MentionsConfig {
    fn default() -> Self {
        Self {
            node_type: "beautifulMention".to_owned(),
            max_suggestions: 10,
            users: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// A taggable resource listed in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagConfig {
    /// Resource id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resource kind.
    #[serde(rename = "type", default)]
    pub tag_type: TagType,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`user.email`").
        field: String,
        /// Error message (e.g., "${`CHORUS_EMAIL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `chorus.toml` in current directory and parents,
    /// falling back to defaults.
    ///
    /// CLI settings are applied after loading; the result is then validated.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing or
    /// expansion fails, or the final configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = std::env::current_dir()
            .ok()
            .and_then(|cwd| Self::discover_config(&cwd))
        {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(user_id) = &settings.user_id {
            self.user.id.clone_from(user_id);
        }
        if let Some(user_name) = &settings.user_name {
            self.user.name.clone_from(user_name);
        }
        if let Some(max_length) = settings.max_length {
            self.comments.max_length = max_length;
        }
        if let Some(node_type) = &settings.node_type {
            self.mentions.node_type.clone_from(node_type);
        }
    }

    /// Search for config file in `start` and its parents.
    fn discover_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically by [`Config::load`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_user()?;
        self.validate_comments()?;
        self.validate_mentions()?;
        Ok(())
    }

    fn validate_user(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.user.id, "user.id")?;
        require_non_empty(&self.user.name, "user.name")?;
        if let Some(email) = &self.user.email
            && !email.contains('@')
        {
            return Err(ConfigError::Validation(
                "user.email must be an email address".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_comments(&self) -> Result<(), ConfigError> {
        let max_length = self.comments.max_length;
        if max_length == 0 {
            return Err(ConfigError::Validation(
                "comments.max_length must be greater than 0".to_owned(),
            ));
        }
        if max_length > MAX_COMMENT_LENGTH {
            return Err(ConfigError::Validation(format!(
                "comments.max_length cannot exceed {MAX_COMMENT_LENGTH}"
            )));
        }
        Ok(())
    }

    fn validate_mentions(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.mentions.node_type, "mentions.node_type")?;
        if self.mentions.max_suggestions == 0 {
            return Err(ConfigError::Validation(
                "mentions.max_suggestions must be greater than 0".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        for user in &self.mentions.users {
            require_non_empty(&user.id, "mentions.users.id")?;
            if !seen.insert(user.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "mentions.users contains duplicate id {}",
                    user.id
                )));
            }
        }

        let mut seen = HashSet::new();
        for tag in &self.mentions.tags {
            require_non_empty(&tag.id, "mentions.tags.id")?;
            if !seen.insert(tag.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "mentions.tags contains duplicate id {}",
                    tag.id
                )));
            }
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.user.id = expand::expand_env(&self.user.id, "user.id")?;
        self.user.name = expand::expand_env(&self.user.name, "user.name")?;
        if let Some(ref email) = self.user.email {
            self.user.email = Some(expand::expand_env(email, "user.email")?);
        }
        Ok(())
    }
}

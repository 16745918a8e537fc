//! Mention candidate lists.
//!
//! [`MentionCandidates`] holds the users and tags an editor offers while the
//! author types `@` or `#`. Each list is either seeded up front or fetched
//! lazily from a [`MentionDataProvider`], at most once.

use std::sync::Arc;

use async_trait::async_trait;
use chorus_comments::{TagType, User};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

/// Default number of suggestions returned by a search.
const DEFAULT_MAX_SUGGESTIONS: usize = 10;

/// A resource that can be `#`-tagged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCandidate {
    /// Resource id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resource kind.
    #[serde(default)]
    pub tag_type: TagType,
    /// Short description shown next to the suggestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TagCandidate {
    /// Create a tag candidate.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, tag_type: TagType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tag_type,
            description: None,
        }
    }
}

/// Error fetching mention candidates.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not produce the list.
    #[error("failed to fetch {list}: {message}")]
    Fetch {
        /// Which list was requested ("users" or "tags").
        list: &'static str,
        /// Provider-specific message.
        message: String,
    },
}

/// Source of mentionable users and taggable resources.
#[async_trait]
pub trait MentionDataProvider: Send + Sync {
    /// Fetch every mentionable user.
    async fn fetch_users(&self) -> Result<Vec<User>, ProviderError>;

    /// Fetch every taggable resource.
    async fn fetch_tags(&self) -> Result<Vec<TagCandidate>, ProviderError>;
}

/// Cached mention candidates with query search.
pub struct MentionCandidates {
    provider: Option<Arc<dyn MentionDataProvider>>,
    users: OnceCell<Vec<User>>,
    tags: OnceCell<Vec<TagCandidate>>,
    max_suggestions: usize,
}

impl std::fmt::Debug for MentionCandidates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MentionCandidates")
            .field("has_provider", &self.provider.is_some())
            .field("users", &self.users.get().map(Vec::len))
            .field("tags", &self.tags.get().map(Vec::len))
            .field("max_suggestions", &self.max_suggestions)
            .finish()
    }
}

impl Default for MentionCandidates {
    fn default() -> Self {
        Self::seeded(Vec::new(), Vec::new())
    }
}

impl MentionCandidates {
    /// Candidates fixed up front. No provider is ever called.
    #[must_use]
    pub fn seeded(users: Vec<User>, tags: Vec<TagCandidate>) -> Self {
        Self {
            provider: None,
            users: OnceCell::new_with(Some(users)),
            tags: OnceCell::new_with(Some(tags)),
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    /// Candidates fetched from `provider` on first use.
    #[must_use]
    pub fn lazy(provider: Arc<dyn MentionDataProvider>) -> Self {
        Self {
            provider: Some(provider),
            users: OnceCell::new(),
            tags: OnceCell::new(),
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    /// Pre-seed the user list; the provider is then only asked for tags.
    #[must_use]
    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = OnceCell::new_with(Some(users));
        self
    }

    /// Pre-seed the tag list; the provider is then only asked for users.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<TagCandidate>) -> Self {
        self.tags = OnceCell::new_with(Some(tags));
        self
    }

    /// Cap the number of results a search returns when no limit is given.
    #[must_use]
    pub fn with_max_suggestions(mut self, max_suggestions: usize) -> Self {
        self.max_suggestions = max_suggestions;
        self
    }

    /// All mentionable users, fetching them on first call.
    ///
    /// A failed fetch is not cached; the next call tries again.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the fetch fails.
    pub async fn users(&self) -> Result<&[User], ProviderError> {
        let users = self
            .users
            .get_or_try_init(|| async {
                match &self.provider {
                    Some(provider) => {
                        tracing::debug!("Fetching mentionable users");
                        provider.fetch_users().await
                    }
                    None => Ok(Vec::new()),
                }
            })
            .await?;
        Ok(users)
    }

    /// All taggable resources, fetching them on first call.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the fetch fails.
    pub async fn tags(&self) -> Result<&[TagCandidate], ProviderError> {
        let tags = self
            .tags
            .get_or_try_init(|| async {
                match &self.provider {
                    Some(provider) => {
                        tracing::debug!("Fetching taggable resources");
                        provider.fetch_tags().await
                    }
                    None => Ok(Vec::new()),
                }
            })
            .await?;
        Ok(tags)
    }

    /// Users matching `query` by name or id, best matches first.
    ///
    /// `limit` defaults to the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the list has to be fetched and fails.
    pub async fn search_users(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<User>, ProviderError> {
        let users = self.users().await?;
        let limit = limit.unwrap_or(self.max_suggestions);
        Ok(rank(users, query, limit, |u| [u.name.as_str(), u.id.as_str()])
            .into_iter()
            .cloned()
            .collect())
    }

    /// Tags matching `query` by name or id, best matches first.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the list has to be fetched and fails.
    pub async fn search_tags(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TagCandidate>, ProviderError> {
        let tags = self.tags().await?;
        let limit = limit.unwrap_or(self.max_suggestions);
        Ok(rank(tags, query, limit, |t| [t.name.as_str(), t.id.as_str()])
            .into_iter()
            .cloned()
            .collect())
    }
}

/// Case-insensitive match: prefix matches first, then substring matches.
/// Ties keep input order.
fn rank<'a, T>(
    items: &'a [T],
    query: &str,
    limit: usize,
    keys: impl Fn(&T) -> [&str; 2],
) -> Vec<&'a T> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return items.iter().take(limit).collect();
    }

    let mut scored: Vec<(u8, &T)> = items
        .iter()
        .filter_map(|item| {
            let keys = keys(item).map(str::to_lowercase);
            if keys.iter().any(|k| k.starts_with(&query)) {
                Some((0, item))
            } else if keys.iter().any(|k| k.contains(&query)) {
                Some((1, item))
            } else {
                None
            }
        })
        .collect();
    scored.sort_by_key(|(score, _)| *score);
    scored.into_iter().take(limit).map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct CountingProvider {
        user_calls: AtomicUsize,
        tag_calls: AtomicUsize,
        fail_users_once: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl MentionDataProvider for CountingProvider {
        async fn fetch_users(&self) -> Result<Vec<User>, ProviderError> {
            self.user_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_users_once.swap(false, Ordering::SeqCst) {
                return Err(ProviderError::Fetch {
                    list: "users",
                    message: "offline".to_owned(),
                });
            }
            Ok(vec![User::new("u1", "Ada"), User::new("u2", "Grace")])
        }

        async fn fetch_tags(&self) -> Result<Vec<TagCandidate>, ProviderError> {
            self.tag_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![TagCandidate::new("s1", "Billing", TagType::Section)])
        }
    }

    fn names(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_lazy_fetches_once() {
        let provider = Arc::new(CountingProvider::default());
        let candidates = MentionCandidates::lazy(Arc::clone(&provider) as Arc<dyn MentionDataProvider>);

        assert_eq!(candidates.users().await.unwrap().len(), 2);
        assert_eq!(candidates.users().await.unwrap().len(), 2);
        candidates.search_users("gr", None).await.unwrap();
        assert_eq!(candidates.tags().await.unwrap().len(), 1);

        assert_eq!(provider.user_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.tag_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried() {
        let provider = Arc::new(CountingProvider::default());
        provider.fail_users_once.store(true, Ordering::SeqCst);
        let candidates = MentionCandidates::lazy(Arc::clone(&provider) as Arc<dyn MentionDataProvider>);

        assert!(candidates.users().await.is_err());
        assert_eq!(candidates.users().await.unwrap().len(), 2);
        assert_eq!(provider.user_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_seeded_list_skips_provider() {
        let provider = Arc::new(CountingProvider::default());
        let candidates =
            MentionCandidates::lazy(Arc::clone(&provider) as Arc<dyn MentionDataProvider>).with_users(vec![User::new("u9", "Seeded")]);

        assert_eq!(names(candidates.users().await.unwrap()), vec!["Seeded"]);
        assert_eq!(provider.user_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_provider_yields_empty_lists() {
        let candidates = MentionCandidates::default();

        assert!(candidates.users().await.unwrap().is_empty());
        assert!(candidates.search_tags("x", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_prefix_before_substring() {
        let candidates = MentionCandidates::seeded(
            vec![
                User::new("u1", "Mary Ann"),
                User::new("u2", "Annabel"),
                User::new("u3", "Bob"),
                User::new("u4", "anne"),
            ],
            Vec::new(),
        );

        let found = candidates.search_users("ann", None).await.unwrap();

        assert_eq!(names(&found), vec!["Annabel", "anne", "Mary Ann"]);
    }

    #[tokio::test]
    async fn test_search_matches_id_and_limits() {
        let candidates = MentionCandidates::seeded(
            (0..20).map(|i| User::new(format!("user-{i}"), format!("Name {i}"))).collect(),
            Vec::new(),
        )
        .with_max_suggestions(5);

        assert_eq!(candidates.search_users("user-", None).await.unwrap().len(), 5);
        assert_eq!(candidates.search_users("", Some(3)).await.unwrap().len(), 3);
        assert_eq!(
            candidates.search_users("user-17", None).await.unwrap()[0].id,
            "user-17"
        );
    }

    #[tokio::test]
    async fn test_search_tags() {
        let candidates = MentionCandidates::seeded(
            Vec::new(),
            vec![
                TagCandidate::new("r1", "Refund rule", TagType::Rule),
                TagCandidate::new("s1", "Billing", TagType::Section),
            ],
        );

        let found = candidates.search_tags("BILL", None).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag_type, TagType::Section);
    }
}

pub mod api;
pub mod auth;

pub use api::{build_http_client, flatten_comments, RedditApiClient};
pub use auth::{RedditOAuth2Config, RedditToken};

use async_trait::async_trait;
use reddit_mcp_core::{
    CoreError, Credentials, PostDetail, RedditApiError, RedditSettings, ThreadSummary,
};
use secrecy::ExposeSecret;
use tracing::{debug, info};

/// Longest subreddit name Reddit accepts.
const MAX_SUBREDDIT_LEN: usize = 21;

/// The two read operations exposed to MCP tools.
#[async_trait]
pub trait RedditApi: Send + Sync {
    /// Hot threads of `subreddit` in upstream ranking order, at most `limit` of them.
    async fn list_hot_threads(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ThreadSummary>, CoreError>;

    /// One post with at most `comment_limit` comments shallower than `comment_depth`.
    async fn get_post_detail(
        &self,
        post_id: &str,
        comment_limit: u32,
        comment_depth: u32,
    ) -> Result<PostDetail, CoreError>;
}

/// Turns per-request credentials into an authenticated [`RedditApi`].
#[async_trait]
pub trait RedditConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RedditApi>, CoreError>;
}

/// Strips an `r/` prefix and checks the name against Reddit's naming rules.
pub fn normalize_subreddit(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim().trim_start_matches('/');
    let name = trimmed
        .strip_prefix("r/")
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if name.len() < 2 || name.len() > MAX_SUBREDDIT_LEN || !valid_chars {
        return Err(CoreError::invalid_input(format!(
            "'{}' is not a valid subreddit name",
            raw
        )));
    }
    Ok(name.to_string())
}

/// Accepts bare ids (`abc123`) and fullnames (`t3_abc123`).
pub fn normalize_post_id(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    let id = trimmed.strip_prefix("t3_").unwrap_or(trimmed);

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::invalid_input(format!(
            "'{}' is not a valid Reddit post id",
            raw
        )));
    }
    Ok(id.to_string())
}

pub struct RedditClient {
    config: RedditOAuth2Config,
    http_client: reqwest::Client,
    api: RedditApiClient,
    token: Option<RedditToken>,
}

impl RedditClient {
    pub fn new(
        config: RedditOAuth2Config,
        http_client: reqwest::Client,
        api_base_url: &str,
    ) -> Self {
        let api = RedditApiClient::new(http_client.clone(), api_base_url);
        Self {
            config,
            http_client,
            api,
            token: None,
        }
    }

    pub async fn authenticate(&mut self) -> Result<(), CoreError> {
        let token = auth::request_app_token(&self.http_client, &self.config).await?;
        self.set_token(token);
        Ok(())
    }

    pub fn set_token(&mut self, token: RedditToken) {
        self.token = Some(token);
    }

    fn access_token(&self) -> Result<&str, CoreError> {
        match &self.token {
            Some(token) if !token.is_expired() => Ok(token.access_token.expose_secret()),
            _ => Err(CoreError::RedditApi(RedditApiError::InvalidToken)),
        }
    }
}

#[async_trait]
impl RedditApi for RedditClient {
    async fn list_hot_threads(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<ThreadSummary>, CoreError> {
        let subreddit = normalize_subreddit(subreddit)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let listing = self
            .api
            .get_hot_posts(self.access_token()?, &subreddit, limit)
            .await?;

        let threads: Vec<ThreadSummary> = listing
            .data
            .children
            .into_iter()
            .take(limit as usize)
            .map(|child| child.data.into())
            .collect();

        info!("Fetched {} hot threads from r/{}", threads.len(), subreddit);
        Ok(threads)
    }

    async fn get_post_detail(
        &self,
        post_id: &str,
        comment_limit: u32,
        comment_depth: u32,
    ) -> Result<PostDetail, CoreError> {
        let post_id = normalize_post_id(post_id)?;

        let (post, comment_tree) = self
            .api
            .get_post_comments(self.access_token()?, &post_id, comment_limit, comment_depth)
            .await?;

        let comments = flatten_comments(&comment_tree, comment_depth, comment_limit as usize);
        let mut summary = ThreadSummary::from(post);
        let body = summary.selftext.take().unwrap_or_default();

        debug!("Post {} flattened to {} comments", post_id, comments.len());
        Ok(PostDetail {
            summary,
            body,
            comments,
        })
    }
}

/// Production connector: one token exchange per call, shared HTTP pool.
#[derive(Debug, Clone)]
pub struct RedditClientFactory {
    settings: RedditSettings,
    http_client: reqwest::Client,
}

impl RedditClientFactory {
    pub fn new(settings: RedditSettings) -> Result<Self, CoreError> {
        let http_client = build_http_client(&settings)?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    pub fn settings(&self) -> &RedditSettings {
        &self.settings
    }
}

#[async_trait]
impl RedditConnector for RedditClientFactory {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RedditApi>, CoreError> {
        let config = RedditOAuth2Config::new(credentials, &self.settings);
        let mut client = RedditClient::new(
            config,
            self.http_client.clone(),
            &self.settings.api_base_url,
        );
        client.authenticate().await?;
        Ok(Box::new(client))
    }
}

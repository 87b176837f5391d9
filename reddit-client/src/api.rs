use chrono::{TimeZone, Utc};
use reddit_mcp_core::{Comment, CoreError, PostType, RedditApiError, RedditSettings, ThreadSummary};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{redirect, Client, Method, Response};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Prefix for permalinks handed back to callers.
pub const REDDIT_WEB_BASE: &str = "https://reddit.com";

/// Reddit never returns more than this many items per listing request.
pub const MAX_LISTING_LIMIT: u32 = 100;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    pub score: i64,
    pub num_comments: u64,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub is_gallery: bool,
}

impl RedditPostData {
    pub fn post_type(&self) -> PostType {
        if self.is_gallery {
            PostType::Gallery
        } else if self.is_self {
            PostType::Text
        } else {
            PostType::Link
        }
    }
}

/// Comment listings mix real comments (`t1`) with "load more" stubs.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum CommentThing {
    #[serde(rename = "t1")]
    Comment(RedditCommentData),
    #[serde(rename = "more")]
    More(IgnoredAny),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    #[serde(default = "deleted_author")]
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub replies: CommentReplies,
}

/// Reddit sends `""` instead of an empty listing when a comment has no replies.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CommentReplies {
    Listing(Box<CommentListing>),
    Empty(IgnoredAny),
}

impl Default for CommentReplies {
    fn default() -> Self {
        CommentReplies::Empty(IgnoredAny)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentListing {
    pub kind: String,
    pub data: CommentListingData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentListingData {
    pub children: Vec<CommentThing>,
}

fn deleted_author() -> String {
    "[deleted]".to_string()
}

/// Builds the pooled HTTP client used for both token and API requests.
///
/// Redirects are disabled: Reddit answers unknown subreddits with a redirect
/// to its search page, which has to surface as "not found".
pub fn build_http_client(settings: &RedditSettings) -> Result<Client, CoreError> {
    Client::builder()
        .user_agent(&settings.user_agent)
        .timeout(settings.request_timeout)
        .redirect(redirect::Policy::none())
        .build()
        .map_err(CoreError::Network)
}

#[derive(Debug, Clone)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(http_client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let start_time = Instant::now();

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        info!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        debug!(
            "Reddit responded {} for {} in {:?}",
            status,
            endpoint,
            start_time.elapsed()
        );

        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);

        let api_error = match status.as_u16() {
            429 => {
                let retry_after = retry_after_secs(response.headers());
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            401 => RedditApiError::InvalidToken,
            403 => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            404 => RedditApiError::ResourceNotFound {
                endpoint: endpoint.to_string(),
            },
            _ if status.is_redirection() => RedditApiError::ResourceNotFound {
                endpoint: endpoint.to_string(),
            },
            code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
            code => {
                let body = response.text().await.unwrap_or_default();
                RedditApiError::UnexpectedStatus {
                    status_code: code,
                    message: truncate(&body, 200),
                }
            }
        };

        Err(CoreError::RedditApi(api_error))
    }

    pub async fn get_hot_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/hot", subreddit);
        let limit_str = limit.min(MAX_LISTING_LIMIT).to_string();
        let params = [("limit", limit_str.as_str()), ("raw_json", "1")];

        let response = self
            .make_request(Method::GET, &endpoint, access_token, Some(&params))
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::ResourceNotFound { .. }) => {
                    CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    })
                }
                other => other,
            })?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit posts: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse posts for r/{}", subreddit),
            })
        })?;

        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }

    /// Fetches a post together with its top-sorted comment tree.
    pub async fn get_post_comments(
        &self,
        access_token: &str,
        post_id: &str,
        comment_limit: u32,
        comment_depth: u32,
    ) -> Result<(RedditPostData, Vec<CommentThing>), CoreError> {
        let endpoint = format!("/comments/{}", post_id);
        let limit_str = comment_limit.min(MAX_LISTING_LIMIT).to_string();
        let depth_str = comment_depth.to_string();
        let params = [
            ("sort", "top"),
            ("limit", limit_str.as_str()),
            ("depth", depth_str.as_str()),
            ("raw_json", "1"),
        ];

        let not_found = || {
            CoreError::RedditApi(RedditApiError::PostNotFound {
                post_id: post_id.to_string(),
            })
        };

        let response = self
            .make_request(Method::GET, &endpoint, access_token, Some(&params))
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::ResourceNotFound { .. }) => not_found(),
                other => other,
            })?;

        let (post_listing, comment_listing): (RedditListing<RedditPostData>, CommentListing) =
            response.json().await.map_err(|e| {
                error!("Failed to parse post {}: {}", post_id, e);
                CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("Failed to parse post {}", post_id),
                })
            })?;

        let post = post_listing
            .data
            .children
            .into_iter()
            .next()
            .map(|child| child.data)
            .ok_or_else(not_found)?;

        debug!(
            "Retrieved post {} with {} top-level comment entries",
            post_id,
            comment_listing.data.children.len()
        );
        Ok((post, comment_listing.data.children))
    }
}

/// Flattens a comment tree in pre-order, skipping "load more" stubs.
///
/// Only comments with depth below `max_depth` are kept, and at most `limit`
/// comments are returned.
pub fn flatten_comments(children: &[CommentThing], max_depth: u32, limit: usize) -> Vec<Comment> {
    let mut comments = Vec::with_capacity(limit.min(64));
    collect_comments(children, 0, max_depth, limit, &mut comments);
    comments
}

fn collect_comments(
    children: &[CommentThing],
    depth: u32,
    max_depth: u32,
    limit: usize,
    out: &mut Vec<Comment>,
) {
    if depth >= max_depth {
        return;
    }

    for child in children {
        if out.len() >= limit {
            return;
        }
        if let CommentThing::Comment(data) = child {
            out.push(Comment {
                author: data.author.clone(),
                body: data.body.clone(),
                score: data.score,
                depth,
            });
            if let CommentReplies::Listing(replies) = &data.replies {
                collect_comments(&replies.data.children, depth + 1, max_depth, limit, out);
            }
        }
    }
}

/// Seconds to wait according to `Retry-After`, or a minute when absent.
pub(crate) fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn parse_retry_after(value: &str) -> Option<u64> {
    // Seconds, possibly fractional.
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl From<RedditPostData> for ThreadSummary {
    fn from(post_data: RedditPostData) -> Self {
        let post_type = post_data.post_type();
        Self {
            created_utc: Utc
                .timestamp_opt(post_data.created_utc as i64, 0)
                .single()
                .unwrap_or_default(),
            url: match post_type {
                PostType::Text => None,
                PostType::Link | PostType::Gallery => Some(post_data.url),
            },
            selftext: match post_type {
                PostType::Text => Some(post_data.selftext),
                PostType::Link | PostType::Gallery => None,
            },
            permalink: format!("{}{}", REDDIT_WEB_BASE, post_data.permalink),
            id: post_data.id,
            subreddit: post_data.subreddit,
            title: post_data.title,
            author: post_data.author,
            score: post_data.score,
            num_comments: post_data.num_comments,
            post_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_data(is_self: bool, is_gallery: bool) -> RedditPostData {
        RedditPostData {
            id: "test123".to_string(),
            title: "Test Post".to_string(),
            selftext: "This is test content".to_string(),
            author: "test_user".to_string(),
            subreddit: "test".to_string(),
            url: "https://example.com/article".to_string(),
            permalink: "/r/test/comments/test123/test_post/".to_string(),
            created_utc: 1640995200.0,
            score: 42,
            num_comments: 5,
            is_self,
            is_gallery,
        }
    }

    #[test]
    fn test_thread_summary_conversion() {
        let summary: ThreadSummary = post_data(true, false).into();
        assert_eq!(summary.id, "test123");
        assert_eq!(summary.title, "Test Post");
        assert_eq!(summary.post_type, PostType::Text);
        assert_eq!(summary.url, None);
        assert_eq!(summary.selftext.as_deref(), Some("This is test content"));
        assert_eq!(
            summary.permalink,
            "https://reddit.com/r/test/comments/test123/test_post/"
        );
        assert_eq!(summary.created_utc.timestamp(), 1640995200);
    }

    #[test]
    fn test_post_type_detection() {
        assert_eq!(post_data(false, false).post_type(), PostType::Link);
        assert_eq!(post_data(false, true).post_type(), PostType::Gallery);

        let link: ThreadSummary = post_data(false, false).into();
        assert_eq!(link.url.as_deref(), Some("https://example.com/article"));
        assert_eq!(link.selftext, None);
    }

    #[test]
    fn test_comment_tree_deserialization_and_flattening() {
        let json = serde_json::json!({
            "kind": "Listing",
            "data": {
                "children": [
                    {
                        "kind": "t1",
                        "data": {
                            "id": "c1",
                            "author": "alice",
                            "body": "first",
                            "score": 10,
                            "replies": {
                                "kind": "Listing",
                                "data": {
                                    "children": [
                                        {
                                            "kind": "t1",
                                            "data": {
                                                "id": "c1a",
                                                "author": "bob",
                                                "body": "reply",
                                                "score": 3,
                                                "replies": ""
                                            }
                                        },
                                        {
                                            "kind": "more",
                                            "data": { "count": 4, "children": ["x"] }
                                        }
                                    ]
                                }
                            }
                        }
                    },
                    {
                        "kind": "t1",
                        "data": { "id": "c2", "body": "second", "score": 7, "replies": "" }
                    }
                ]
            }
        });

        let listing: CommentListing = serde_json::from_value(json).unwrap();
        let comments = flatten_comments(&listing.data.children, 3, 10);

        let order: Vec<(&str, u32)> = comments
            .iter()
            .map(|c| (c.body.as_str(), c.depth))
            .collect();
        assert_eq!(order, vec![("first", 0), ("reply", 1), ("second", 0)]);
        assert_eq!(comments[2].author, "[deleted]");

        let top_level_only = flatten_comments(&listing.data.children, 1, 10);
        assert_eq!(top_level_only.len(), 2);
        assert!(top_level_only.iter().all(|c| c.depth == 0));

        let truncated = flatten_comments(&listing.data.children, 3, 2);
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated[1].body, "reply");
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after("30"), Some(30));
        assert_eq!(parse_retry_after("12.4"), Some(13));
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// A Reddit application identity used for one request.
///
/// The secret is wrapped so it never shows up in `Debug` output or logs.
#[derive(Debug)]
pub struct Credentials {
    client_id: String,
    client_secret: SecretString,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Builds credentials only when both halves are non-empty after trimming.
    pub fn from_parts(client_id: Option<&str>, client_secret: Option<&str>) -> Option<Self> {
        let client_id = client_id.map(str::trim).filter(|s| !s.is_empty())?;
        let client_secret = client_secret.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self::new(client_id, client_secret))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    /// Fresh copy for a new request. Used when handing out configured defaults.
    pub fn duplicate(&self) -> Self {
        Self::new(self.client_id.clone(), self.client_secret.expose_secret())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Text,
    Link,
    Gallery,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Text => "text",
            PostType::Link => "link",
            PostType::Gallery => "gallery",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub subreddit: String,
    pub title: String,
    pub author: String,
    pub score: i64,
    pub num_comments: u64,
    /// Absolute URL of the thread on reddit.com.
    pub permalink: String,
    pub created_utc: DateTime<Utc>,
    pub post_type: PostType,
    /// Link target for link and gallery posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Body of a text post. Left empty on [`PostDetail::summary`], which carries it as `body`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selftext: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub score: i64,
    /// 0 for top-level comments.
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub summary: ThreadSummary,
    pub body: String,
    pub comments: Vec<Comment>,
}

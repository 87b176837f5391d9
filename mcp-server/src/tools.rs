//! The two Reddit tools and their argument handling.

use crate::registry::{tool_definition, ToolHandler, ToolOutput};
use async_trait::async_trait;
use reddit_client::{normalize_post_id, normalize_subreddit, RedditApi};
use reddit_mcp_core::{Comment, CoreError, PostDetail, ThreadSummary};
use rmcp::model::Tool;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::ops::RangeInclusive;
use tracing::info;

pub const HOT_THREADS_TOOL: &str = "fetch_reddit_hot_threads";
pub const POST_CONTENT_TOOL: &str = "fetch_reddit_post_content";

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_COMMENT_LIMIT: u32 = 20;
pub const DEFAULT_COMMENT_DEPTH: u32 = 3;

const LIMIT_RANGE: RangeInclusive<u32> = 1..=100;
const COMMENT_DEPTH_RANGE: RangeInclusive<u32> = 1..=10;

const DELETED_AUTHOR: &str = "[deleted]";

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_comment_limit() -> u32 {
    DEFAULT_COMMENT_LIMIT
}

fn default_comment_depth() -> u32 {
    DEFAULT_COMMENT_DEPTH
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HotThreadsArgs {
    pub subreddit: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl HotThreadsArgs {
    /// Checks ranges and returns the arguments with the subreddit normalised.
    pub fn validated(self) -> Result<Self, CoreError> {
        check_range("limit", self.limit, &LIMIT_RANGE)?;
        Ok(Self {
            subreddit: normalize_subreddit(&self.subreddit)?,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostContentArgs {
    pub post_id: String,
    #[serde(default = "default_comment_limit")]
    pub comment_limit: u32,
    #[serde(default = "default_comment_depth")]
    pub comment_depth: u32,
}

impl PostContentArgs {
    pub fn validated(self) -> Result<Self, CoreError> {
        check_range("comment_limit", self.comment_limit, &LIMIT_RANGE)?;
        check_range("comment_depth", self.comment_depth, &COMMENT_DEPTH_RANGE)?;
        Ok(Self {
            post_id: normalize_post_id(&self.post_id)?,
            ..self
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotThreadsOutput {
    pub subreddit: String,
    pub threads: Vec<ThreadSummary>,
}

fn check_range(field: &str, value: u32, range: &RangeInclusive<u32>) -> Result<(), CoreError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(CoreError::invalid_input(format!(
            "{} must be between {} and {}, got {}",
            field,
            range.start(),
            range.end(),
            value
        )))
    }
}

fn decode<T: DeserializeOwned>(arguments: &Value) -> Result<T, CoreError> {
    T::deserialize(arguments)
        .map_err(|e| CoreError::invalid_input(format!("invalid arguments: {}", e)))
}

fn to_structured<T: Serialize>(value: &T) -> Result<Value, CoreError> {
    Ok(serde_json::to_value(value)?)
}

fn display_author(author: &str) -> &str {
    if author.is_empty() {
        DELETED_AUTHOR
    } else {
        author
    }
}

// ── fetch_reddit_hot_threads ────────────────────────────────────────

pub struct HotThreadsTool;

#[async_trait]
impl ToolHandler for HotThreadsTool {
    fn definition(&self) -> Tool {
        tool_definition(
            HOT_THREADS_TOOL,
            "Fetch hot threads from a subreddit",
            json!({
                "type": "object",
                "properties": {
                    "subreddit": {
                        "type": "string",
                        "description": "Name of the subreddit, with or without the r/ prefix"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Number of posts to fetch",
                        "minimum": LIMIT_RANGE.start(),
                        "maximum": LIMIT_RANGE.end(),
                        "default": DEFAULT_LIMIT
                    }
                },
                "required": ["subreddit"]
            }),
            Some(json!({
                "type": "object",
                "properties": {
                    "subreddit": {"type": "string"},
                    "threads": {"type": "array", "items": thread_summary_schema()}
                },
                "required": ["subreddit", "threads"]
            })),
        )
    }

    fn validate(&self, arguments: &Value) -> Result<(), CoreError> {
        decode::<HotThreadsArgs>(arguments)?.validated().map(|_| ())
    }

    async fn call(&self, api: &dyn RedditApi, arguments: &Value) -> Result<ToolOutput, CoreError> {
        let args = decode::<HotThreadsArgs>(arguments)?.validated()?;
        info!("Fetching {} hot threads from r/{}", args.limit, args.subreddit);

        let threads = api.list_hot_threads(&args.subreddit, args.limit).await?;
        let output = HotThreadsOutput {
            subreddit: args.subreddit,
            threads,
        };

        Ok(ToolOutput {
            text: render_hot_threads(&output),
            structured: to_structured(&output)?,
        })
    }
}

pub fn render_hot_threads(output: &HotThreadsOutput) -> String {
    if output.threads.is_empty() {
        return format!("No hot threads found in r/{}.", output.subreddit);
    }

    output
        .threads
        .iter()
        .map(render_thread)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_thread(thread: &ThreadSummary) -> String {
    let content = thread
        .selftext
        .as_deref()
        .or(thread.url.as_deref())
        .map(|content| format!("Content: {}\n", content))
        .unwrap_or_default();

    format!(
        "Title: {}\nScore: {}\nComments: {}\nAuthor: {}\nType: {}\n{}Link: {}\n---",
        thread.title,
        thread.score,
        thread.num_comments,
        display_author(&thread.author),
        thread.post_type,
        content,
        thread.permalink
    )
}

// ── fetch_reddit_post_content ───────────────────────────────────────

pub struct PostContentTool;

#[async_trait]
impl ToolHandler for PostContentTool {
    fn definition(&self) -> Tool {
        let mut detail_schema = thread_summary_schema();
        if let Some(properties) = detail_schema["properties"].as_object_mut() {
            properties.insert("body".to_string(), json!({"type": "string"}));
            properties.insert(
                "comments".to_string(),
                json!({
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "author": {"type": "string"},
                            "body": {"type": "string"},
                            "score": {"type": "integer"},
                            "depth": {"type": "integer", "minimum": 0}
                        },
                        "required": ["author", "body", "score", "depth"]
                    }
                }),
            );
        }
        if let Some(required) = detail_schema["required"].as_array_mut() {
            required.push(json!("body"));
            required.push(json!("comments"));
        }

        tool_definition(
            POST_CONTENT_TOOL,
            "Fetch detailed content of a specific post, with its top comments",
            json!({
                "type": "object",
                "properties": {
                    "post_id": {
                        "type": "string",
                        "description": "Reddit post id, e.g. 1abc23 or t3_1abc23"
                    },
                    "comment_limit": {
                        "type": "integer",
                        "description": "Maximum number of comments to return",
                        "minimum": LIMIT_RANGE.start(),
                        "maximum": LIMIT_RANGE.end(),
                        "default": DEFAULT_COMMENT_LIMIT
                    },
                    "comment_depth": {
                        "type": "integer",
                        "description": "Maximum depth of the comment tree to traverse",
                        "minimum": COMMENT_DEPTH_RANGE.start(),
                        "maximum": COMMENT_DEPTH_RANGE.end(),
                        "default": DEFAULT_COMMENT_DEPTH
                    }
                },
                "required": ["post_id"]
            }),
            Some(detail_schema),
        )
    }

    fn validate(&self, arguments: &Value) -> Result<(), CoreError> {
        decode::<PostContentArgs>(arguments)?.validated().map(|_| ())
    }

    async fn call(&self, api: &dyn RedditApi, arguments: &Value) -> Result<ToolOutput, CoreError> {
        let args = decode::<PostContentArgs>(arguments)?.validated()?;
        info!(
            "Fetching post {} (comment_limit={}, comment_depth={})",
            args.post_id, args.comment_limit, args.comment_depth
        );

        let detail = api
            .get_post_detail(&args.post_id, args.comment_limit, args.comment_depth)
            .await?;

        Ok(ToolOutput {
            text: render_post_detail(&detail),
            structured: to_structured(&detail)?,
        })
    }
}

pub fn render_post_detail(detail: &PostDetail) -> String {
    let summary = &detail.summary;
    let content = match &summary.url {
        Some(url) if detail.body.is_empty() => url.as_str(),
        _ => detail.body.as_str(),
    };

    let mut text = format!(
        "Title: {}\nScore: {}\nAuthor: {}\nType: {}\nContent: {}\n",
        summary.title,
        summary.score,
        display_author(&summary.author),
        summary.post_type,
        content
    );

    if detail.comments.is_empty() {
        text.push_str("\nNo comments found.");
        return text;
    }

    text.push_str("\nComments:\n");
    for comment in &detail.comments {
        text.push_str(&render_comment(comment));
    }
    text
}

fn render_comment(comment: &Comment) -> String {
    let indent = "-- ".repeat(comment.depth as usize);
    format!(
        "\n{indent}* Author: {}\n{indent}  Score: {}\n{indent}  {}\n",
        display_author(&comment.author),
        comment.score,
        comment.body,
        indent = indent
    )
}

fn thread_summary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "subreddit": {"type": "string"},
            "title": {"type": "string"},
            "author": {"type": "string"},
            "score": {"type": "integer"},
            "num_comments": {"type": "integer", "minimum": 0},
            "permalink": {"type": "string"},
            "created_utc": {"type": "string", "format": "date-time"},
            "post_type": {"type": "string", "enum": ["text", "link", "gallery"]},
            "url": {"type": "string"},
            "selftext": {"type": "string"}
        },
        "required": [
            "id", "subreddit", "title", "author", "score",
            "num_comments", "permalink", "created_utc", "post_type"
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use reddit_mcp_core::{ErrorCategory, ErrorExt, PostType};

    fn summary(id: &str, post_type: PostType, url: Option<&str>) -> ThreadSummary {
        ThreadSummary {
            id: id.to_string(),
            subreddit: "rust".to_string(),
            title: format!("Post {}", id),
            author: "ferris".to_string(),
            score: 42,
            num_comments: 7,
            permalink: format!("https://reddit.com/r/rust/comments/{}/post/", id),
            created_utc: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            post_type,
            url: url.map(str::to_string),
            selftext: None,
        }
    }

    #[test]
    fn test_hot_threads_defaults() {
        let args: HotThreadsArgs = decode(&json!({"subreddit": "r/rust"})).unwrap();
        let args = args.validated().unwrap();
        assert_eq!(args.subreddit, "rust");
        assert_eq!(args.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_post_content_defaults() {
        let args: PostContentArgs = decode(&json!({"post_id": "t3_abc123"})).unwrap();
        let args = args.validated().unwrap();
        assert_eq!(args.post_id, "abc123");
        assert_eq!(args.comment_limit, DEFAULT_COMMENT_LIMIT);
        assert_eq!(args.comment_depth, DEFAULT_COMMENT_DEPTH);
    }

    #[test]
    fn test_argument_validation() {
        let tool = HotThreadsTool;
        assert!(tool.validate(&json!({"subreddit": "rust", "limit": 100})).is_ok());

        for bad in [
            json!({}),
            json!({"subreddit": "rust", "limit": 0}),
            json!({"subreddit": "rust", "limit": 101}),
            json!({"subreddit": "rust", "limit": -3}),
            json!({"subreddit": "rust", "limit": "ten"}),
            json!({"subreddit": "not a subreddit"}),
        ] {
            let err = tool.validate(&bad).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::InvalidInput, "{}", bad);
        }

        let tool = PostContentTool;
        assert!(tool.validate(&json!({"post_id": "abc", "comment_depth": 10})).is_ok());
        assert!(tool.validate(&json!({"post_id": "abc", "comment_depth": 11})).is_err());
        assert!(tool.validate(&json!({"post_id": "abc", "comment_limit": 0})).is_err());
        assert!(tool.validate(&json!({"post_id": ""})).is_err());
    }

    #[test]
    fn test_definitions_declare_schemas() {
        let hot = HotThreadsTool.definition();
        assert_eq!(hot.name, HOT_THREADS_TOOL);
        assert_eq!(hot.input_schema.get("required"), Some(&json!(["subreddit"])));
        assert_eq!(hot.input_schema["properties"]["limit"]["default"], 10);
        assert!(hot.output_schema.is_some());

        let post = PostContentTool.definition();
        assert_eq!(post.name, POST_CONTENT_TOOL);
        let output = post.output_schema.unwrap();
        assert!(output["properties"]["comments"].is_object());
        assert!(output["required"]
            .as_array()
            .unwrap()
            .contains(&json!("comments")));
    }

    #[test]
    fn test_render_hot_threads() {
        let output = HotThreadsOutput {
            subreddit: "rust".to_string(),
            threads: vec![
                ThreadSummary {
                    selftext: Some("Selftext of a1".to_string()),
                    ..summary("a1", PostType::Text, None)
                },
                summary("b2", PostType::Link, Some("https://example.com/")),
            ],
        };
        let text = render_hot_threads(&output);

        assert!(text.starts_with(
            "Title: Post a1\nScore: 42\nComments: 7\nAuthor: ferris\nType: text\n\
             Content: Selftext of a1\n"
        ));
        assert!(text.contains("Type: link\nContent: https://example.com/\n"));
        assert!(text.contains("Link: https://reddit.com/r/rust/comments/b2/post/\n---"));
        assert_eq!(text.matches("---").count(), 2);

        let empty = HotThreadsOutput {
            subreddit: "rust".to_string(),
            threads: Vec::new(),
        };
        assert_eq!(render_hot_threads(&empty), "No hot threads found in r/rust.");
    }

    #[test]
    fn test_render_post_detail_indents_by_depth() {
        let detail = PostDetail {
            summary: summary("c3", PostType::Text, None),
            body: "Hello there".to_string(),
            comments: vec![
                Comment {
                    author: "alice".to_string(),
                    body: "top".to_string(),
                    score: 5,
                    depth: 0,
                },
                Comment {
                    author: String::new(),
                    body: "reply".to_string(),
                    score: 1,
                    depth: 2,
                },
            ],
        };
        let text = render_post_detail(&detail);

        assert!(text.contains("Content: Hello there\n"));
        assert!(text.contains("\nComments:\n"));
        assert!(text.contains("* Author: alice\n  Score: 5\n  top\n"));
        assert!(text.contains("-- -- * Author: [deleted]\n-- --   Score: 1\n-- --   reply\n"));

        let bare = PostDetail {
            comments: Vec::new(),
            ..detail
        };
        assert!(render_post_detail(&bare).ends_with("No comments found."));
    }
}

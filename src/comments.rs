//! YouTube comment fetching.
//!
//! Two reads against the Data API v3:
//! - `videos?part=statistics` for the `commentCount` statistic (a decimal string)
//! - `commentThreads?part=snippet&order=time` for the latest top-level comments

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::YouTubeConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no YouTube API key configured (set YOUTUBE_API_KEY)")]
    MissingApiKey,
    #[error("not a YouTube video URL or id: {0:?}")]
    InvalidVideoId(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("video {0} not found")]
    VideoNotFound(String),
    #[error("unexpected commentCount value {0:?}")]
    InvalidCount(String),
}

/// Source of comment data for a video.
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn comment_count(&self, video_id: &str) -> Result<u64, FetchError>;

    /// Newest first, at most `max`.
    async fn latest_comments(&self, video_id: &str, max: u32) -> Result<Vec<Comment>, FetchError>;
}

fn video_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/|/live/)([A-Za-z0-9_-]{11})").ok()
    })
    .as_ref()
}

fn bare_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").ok()).as_ref()
}

/// Extract the 11-character video id from a URL, or accept a bare id.
pub fn video_id_from_url(input: &str) -> Result<String, FetchError> {
    let input = input.trim();
    if bare_id_regex().map_or(false, |re| re.is_match(input)) {
        return Ok(input.to_string());
    }
    video_id_regex()
        .and_then(|re| re.captures(input))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| FetchError::InvalidVideoId(input.to_string()))
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentThreadListResponse {
    #[serde(default)]
    items: Vec<CommentThread>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    snippet: Option<ThreadSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: Option<TopLevelComment>,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: Option<CommentSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    text_display: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

fn comment_count_from(video_id: &str, resp: VideoListResponse) -> Result<u64, FetchError> {
    let item = resp
        .items
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::VideoNotFound(video_id.to_string()))?;
    // Comments disabled: the statistic is absent.
    let Some(raw) = item.statistics.and_then(|s| s.comment_count) else {
        return Ok(0);
    };
    raw.parse()
        .map_err(|_| FetchError::InvalidCount(raw.clone()))
}

fn comments_from(resp: CommentThreadListResponse) -> Vec<Comment> {
    let total = resp.items.len();
    let comments: Vec<Comment> = resp
        .items
        .into_iter()
        .filter_map(|t| {
            let s = t.snippet?.top_level_comment?.snippet?;
            Some(Comment {
                text: s.text_display?,
                published_at: s.published_at?,
            })
        })
        .collect();
    if comments.len() < total {
        debug!(dropped = total - comments.len(), "Skipped incomplete comment threads");
    }
    comments
}

#[derive(Debug, Clone)]
pub struct YouTubeClient {
    base: String,
    api_key: String,
    client: Client,
}

impl YouTubeClient {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn from_config(cfg: &YouTubeConfig) -> Result<Self, FetchError> {
        let key = cfg
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(FetchError::MissingApiKey)?;
        Self::new(
            cfg.api_base.as_str(),
            key,
            Duration::from_millis(cfg.request_timeout_ms),
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base, path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(path, status=%status, "YouTube API request failed");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl CommentSource for YouTubeClient {
    async fn comment_count(&self, video_id: &str) -> Result<u64, FetchError> {
        let resp: VideoListResponse = self
            .get_json("videos", &[("part", "statistics"), ("id", video_id)])
            .await?;
        comment_count_from(video_id, resp)
    }

    async fn latest_comments(&self, video_id: &str, max: u32) -> Result<Vec<Comment>, FetchError> {
        let max = max.to_string();
        let resp: CommentThreadListResponse = self
            .get_json(
                "commentThreads",
                &[
                    ("part", "snippet"),
                    ("videoId", video_id),
                    ("maxResults", max.as_str()),
                    ("order", "time"),
                ],
            )
            .await?;
        Ok(comments_from(resp))
    }
}

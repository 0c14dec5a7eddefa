use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ActorType, PostId, PostStatus, PostType, TargetType, VoteDirection},
    error::ApiError,
};

/// Success envelope: `{"data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ApiError,
}

/// Body for POST /v1/follow and DELETE /v1/follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowRequest {
    pub target_type: TargetType,
    pub target_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowStatusResponse {
    pub following: bool,
}

/// Body for POST /v1/posts/{id}/vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteStatusResponse {
    #[serde(default)]
    pub user_vote: VoteDirection,
    pub vote_score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}

/// Body for POST /v1/users/me/bookmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkRequest {
    pub post_id: PostId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkStatusResponse {
    pub bookmarked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkEntry {
    pub post_id: PostId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: PostId,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub posted_by_type: ActorType,
    pub posted_by_id: String,
    pub status: PostStatus,
    pub vote_score: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: PostId,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub posted_by_type: ActorType,
    pub posted_by_id: String,
    pub status: PostStatus,
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub has_more: bool,
}

/// Paginated list envelope: `{"data": [...], "meta": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub data: Vec<PostSummary>,
    pub meta: PageMeta,
}

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use shared::{
    domain::{ActorRef, PostId, TargetRef, VoteDirection},
    error::ApiException,
    protocol::{
        BookmarkEntry, BookmarkRequest, BookmarkStatusResponse, Envelope, ErrorEnvelope,
        FollowRequest, FollowStatusResponse, Page, PostResponse, PostSummary, SearchResponse,
        VoteRequest, VoteStatusResponse,
    },
};
use tracing::debug;

pub mod bookmark_store;
pub mod toggle;

pub use bookmark_store::BookmarkStore;
pub use toggle::{
    BinaryToggle, MissingToggleBackend, ToggleBackend, ToggleController, ToggleEvent, ToggleShape,
    ToggleState, VoteIntent, VoteSnapshot, VoteToggle,
};

const API_KEY_HEADER: &str = "X-API-Key";

/// How requests are authenticated: humans carry a bearer token, agents an
/// API key. Anonymous clients can still perform public reads.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    Bearer(String),
    ApiKey(String),
    Anonymous,
}

/// HTTP client for the platform's REST surface.
///
/// Mutations return success or failure only; the optimistic controllers
/// trust their own computed state rather than any response payload.
pub struct SocialApiClient {
    http: Client,
    base_url: String,
    auth: AuthScheme,
}

impl SocialApiClient {
    pub fn new(base_url: impl Into<String>, auth: AuthScheme) -> Arc<Self> {
        let base_url: String = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Arc::new(Self {
            http: Client::new(),
            base_url,
            auth,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.auth {
            AuthScheme::Bearer(token) => builder.bearer_auth(token),
            AuthScheme::ApiKey(key) => builder.header(API_KEY_HEADER, key),
            AuthScheme::Anonymous => builder,
        }
    }

    pub async fn follow(&self, target: &TargetRef) -> Result<()> {
        let response = self
            .request(Method::POST, "/v1/follow")
            .json(&FollowRequest {
                target_type: target.target_type,
                target_id: target.target_id.clone(),
            })
            .send()
            .await?;
        expect_success(response).await?;
        debug!(target_id = %target.target_id, "follow created");
        Ok(())
    }

    pub async fn unfollow(&self, target: &TargetRef) -> Result<()> {
        let response = self
            .request(Method::DELETE, "/v1/follow")
            .json(&FollowRequest {
                target_type: target.target_type,
                target_id: target.target_id.clone(),
            })
            .send()
            .await?;
        expect_success(response).await?;
        debug!(target_id = %target.target_id, "follow removed");
        Ok(())
    }

    pub async fn follow_status(&self, target: &TargetRef) -> Result<bool> {
        let response = self
            .request(Method::GET, "/v1/follow/status")
            .query(&[
                ("target_type", target_type_str(target)),
                ("target_id", target.target_id.as_str()),
            ])
            .send()
            .await?;
        let body: Envelope<FollowStatusResponse> = expect_success(response).await?.json().await?;
        Ok(body.data.following)
    }

    /// Records a vote; `VoteDirection::None` retracts the actor's vote.
    pub async fn vote(
        &self,
        post_id: &PostId,
        direction: VoteDirection,
    ) -> Result<VoteStatusResponse> {
        let response = self
            .request(Method::POST, &format!("/v1/posts/{post_id}/vote"))
            .json(&VoteRequest { direction })
            .send()
            .await?;
        let body: Envelope<VoteStatusResponse> = expect_success(response).await?.json().await?;
        Ok(body.data)
    }

    pub async fn vote_status(&self, post_id: &PostId) -> Result<VoteStatusResponse> {
        let response = self
            .request(Method::GET, &format!("/v1/posts/{post_id}/vote"))
            .send()
            .await?;
        let body: Envelope<VoteStatusResponse> = expect_success(response).await?.json().await?;
        Ok(body.data)
    }

    pub async fn add_bookmark(&self, post_id: &PostId) -> Result<()> {
        let response = self
            .request(Method::POST, "/v1/users/me/bookmarks")
            .json(&BookmarkRequest {
                post_id: post_id.clone(),
            })
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    pub async fn remove_bookmark(&self, post_id: &PostId) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/v1/users/me/bookmarks/{post_id}"))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    pub async fn bookmark_status(&self, post_id: &PostId) -> Result<bool> {
        let response = self
            .request(Method::GET, &format!("/v1/users/me/bookmarks/{post_id}"))
            .send()
            .await?;
        let body: Envelope<BookmarkStatusResponse> = expect_success(response).await?.json().await?;
        Ok(body.data.bookmarked)
    }

    pub async fn list_bookmarks(&self, page: u32, per_page: u32) -> Result<Page<BookmarkEntry>> {
        let response = self
            .request(Method::GET, "/v1/users/me/bookmarks")
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        let body: Page<BookmarkEntry> = expect_success(response).await?.json().await?;
        Ok(body)
    }

    pub async fn get_post(&self, post_id: &PostId) -> Result<PostResponse> {
        let response = self
            .request(Method::GET, &format!("/v1/posts/{post_id}"))
            .send()
            .await?;
        let body: Envelope<PostResponse> = expect_success(response).await?.json().await?;
        Ok(body.data)
    }

    pub async fn list_posts(&self, page: u32, per_page: u32) -> Result<Page<PostSummary>> {
        let response = self
            .request(Method::GET, "/v1/posts")
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        let body: Page<PostSummary> = expect_success(response).await?.json().await?;
        Ok(body)
    }

    pub async fn search(&self, query: &str, page: u32, per_page: u32) -> Result<SearchResponse> {
        let response = self
            .request(Method::GET, "/v1/search")
            .query(&[
                ("q", query.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await?;
        let body: SearchResponse = expect_success(response).await?.json().await?;
        Ok(body)
    }

    /// Follow/unfollow control for `target`, self-guarded against `actor`.
    pub fn follow_controller(
        self: &Arc<Self>,
        actor: &ActorRef,
        target: TargetRef,
    ) -> Arc<ToggleController<BinaryToggle>> {
        ToggleController::new(
            actor,
            target,
            Arc::new(FollowBackend {
                client: Arc::clone(self),
            }),
        )
    }

    /// Vote control for a post. Posts never match an actor identity, so
    /// the controller is never inert; the server still rejects votes on
    /// own content.
    pub fn vote_controller(
        self: &Arc<Self>,
        actor: &ActorRef,
        post_id: &PostId,
    ) -> Arc<ToggleController<VoteToggle>> {
        ToggleController::new(
            actor,
            TargetRef::post(post_id),
            Arc::new(VoteBackend {
                client: Arc::clone(self),
            }),
        )
    }

    /// Bookmark control for a post; confirmed mutations are mirrored into
    /// the shared `store`.
    pub fn bookmark_controller(
        self: &Arc<Self>,
        actor: &ActorRef,
        post_id: &PostId,
        store: Arc<BookmarkStore>,
    ) -> Arc<ToggleController<BinaryToggle>> {
        ToggleController::new(
            actor,
            TargetRef::post(post_id),
            Arc::new(BookmarkBackend {
                client: Arc::clone(self),
                store,
            }),
        )
    }
}

fn target_type_str(target: &TargetRef) -> &'static str {
    match target.target_type {
        shared::domain::TargetType::Human => "human",
        shared::domain::TargetType::Agent => "agent",
        shared::domain::TargetType::Post => "post",
    }
}

/// Maps non-2xx responses to errors, decoding the API's error envelope
/// when the body carries one.
async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(decode_error(status, response).await)
}

async fn decode_error(status: StatusCode, response: Response) -> anyhow::Error {
    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => ApiException::from(envelope.error).into(),
        Err(_) => anyhow!("request failed with status {status}"),
    }
}

struct FollowBackend {
    client: Arc<SocialApiClient>,
}

#[async_trait]
impl ToggleBackend<BinaryToggle> for FollowBackend {
    async fn read(&self, target: &TargetRef) -> Result<bool> {
        self.client.follow_status(target).await
    }

    async fn apply(&self, target: &TargetRef, _before: bool, after: bool) -> Result<()> {
        if after {
            self.client.follow(target).await
        } else {
            self.client.unfollow(target).await
        }
    }
}

struct VoteBackend {
    client: Arc<SocialApiClient>,
}

#[async_trait]
impl ToggleBackend<VoteToggle> for VoteBackend {
    async fn read(&self, target: &TargetRef) -> Result<VoteSnapshot> {
        let post_id = PostId::new(target.target_id.clone());
        let status = self.client.vote_status(&post_id).await?;
        Ok(VoteSnapshot::new(status.user_vote, status.vote_score))
    }

    async fn apply(
        &self,
        target: &TargetRef,
        _before: VoteSnapshot,
        after: VoteSnapshot,
    ) -> Result<()> {
        // One wire call per transition: the net new direction covers
        // flips and retracts alike.
        let post_id = PostId::new(target.target_id.clone());
        self.client.vote(&post_id, after.direction).await?;
        Ok(())
    }
}

struct BookmarkBackend {
    client: Arc<SocialApiClient>,
    store: Arc<BookmarkStore>,
}

#[async_trait]
impl ToggleBackend<BinaryToggle> for BookmarkBackend {
    async fn read(&self, target: &TargetRef) -> Result<bool> {
        let post_id = PostId::new(target.target_id.clone());
        let bookmarked = self.client.bookmark_status(&post_id).await?;
        if bookmarked {
            self.store.insert(&post_id);
        } else {
            self.store.remove(&post_id);
        }
        Ok(bookmarked)
    }

    async fn apply(&self, target: &TargetRef, _before: bool, after: bool) -> Result<()> {
        let post_id = PostId::new(target.target_id.clone());
        if after {
            self.client.add_bookmark(&post_id).await?;
            self.store.insert(&post_id);
        } else {
            self.client.remove_bookmark(&post_id).await?;
            self.store.remove(&post_id);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/toggle_tests.rs"]
mod toggle_tests;

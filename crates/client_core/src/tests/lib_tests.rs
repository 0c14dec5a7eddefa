use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use shared::{
    domain::{ActorType, PostId, PostStatus, PostType},
    error::ErrorCode,
    protocol::{PageMeta, PostSummary, SearchResponse},
};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Clone, Default)]
struct ServerState {
    follows: Arc<Mutex<Vec<(Option<String>, Option<String>, FollowRequest)>>>,
    unfollows: Arc<Mutex<Vec<FollowRequest>>>,
    votes: Arc<Mutex<Vec<(String, VoteDirection)>>>,
    bookmarks_added: Arc<Mutex<Vec<String>>>,
    bookmarks_removed: Arc<Mutex<Vec<String>>>,
    following: Arc<Mutex<bool>>,
    bookmarked: Arc<Mutex<bool>>,
    malformed_follow_status: Arc<Mutex<bool>>,
    reject_votes_as_duplicate: Arc<Mutex<bool>>,
}

fn auth_headers(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let api_key = headers
        .get("X-API-Key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bearer = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    (api_key, bearer)
}

async fn handle_follow(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<FollowRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let (api_key, bearer) = auth_headers(&headers);
    state.follows.lock().await.push((api_key, bearer, body));
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "data": { "created": true } })),
    )
}

async fn handle_unfollow(
    State(state): State<ServerState>,
    Json(body): Json<FollowRequest>,
) -> StatusCode {
    state.unfollows.lock().await.push(body);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct FollowStatusQuery {
    target_type: String,
    target_id: String,
}

async fn handle_follow_status(
    State(state): State<ServerState>,
    Query(query): Query<FollowStatusQuery>,
) -> (StatusCode, String) {
    assert!(!query.target_type.is_empty());
    assert!(!query.target_id.is_empty());
    if *state.malformed_follow_status.lock().await {
        return (StatusCode::OK, "not json".to_string());
    }
    let following = *state.following.lock().await;
    (
        StatusCode::OK,
        serde_json::json!({ "data": { "following": following } }).to_string(),
    )
}

async fn handle_vote(
    State(state): State<ServerState>,
    Path(post_id): Path<String>,
    Json(body): Json<VoteRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if *state.reject_votes_as_duplicate.lock().await {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": {
                    "code": "DUPLICATE_VOTE",
                    "message": "you have already voted on this post"
                }
            })),
        );
    }
    state.votes.lock().await.push((post_id, body.direction));
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "data": {
                "user_vote": body.direction,
                "vote_score": 5,
                "upvotes": 6,
                "downvotes": 1
            }
        })),
    )
}

async fn handle_vote_status(Path(_post_id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "data": { "user_vote": "none", "vote_score": 4, "upvotes": 4, "downvotes": 0 }
    }))
}

async fn handle_add_bookmark(
    State(state): State<ServerState>,
    Json(body): Json<BookmarkRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.bookmarks_added.lock().await.push(body.post_id.0);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "data": { "created": true } })),
    )
}

async fn handle_remove_bookmark(
    State(state): State<ServerState>,
    Path(post_id): Path<String>,
) -> StatusCode {
    state.bookmarks_removed.lock().await.push(post_id);
    StatusCode::NO_CONTENT
}

async fn handle_bookmark_status(
    State(state): State<ServerState>,
    Path(_post_id): Path<String>,
) -> Json<serde_json::Value> {
    let bookmarked = *state.bookmarked.lock().await;
    Json(serde_json::json!({ "data": { "bookmarked": bookmarked } }))
}

async fn handle_get_post(Path(post_id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "data": {
            "id": post_id,
            "type": "problem",
            "title": "rate limiter drops bursts",
            "description": "token bucket empties too fast",
            "posted_by_type": "agent",
            "posted_by_id": "agent-9",
            "status": "open",
            "upvotes": 3,
            "downvotes": 1,
            "vote_score": 2,
            "created_at": "2024-05-01T12:00:00Z"
        }
    }))
}

async fn handle_search(Query(query): Query<SearchQuery>) -> Json<SearchResponse> {
    Json(SearchResponse {
        query: query.q.clone(),
        data: vec![PostSummary {
            id: PostId::new("post-7"),
            post_type: PostType::Question,
            title: "how to dedupe events".to_string(),
            tags: vec!["events".to_string()],
            posted_by_type: ActorType::Human,
            posted_by_id: "user-3".to_string(),
            status: PostStatus::Open,
            vote_score: 1,
            created_at: "2024-05-01T12:00:00Z".parse().expect("timestamp"),
        }],
        meta: PageMeta {
            total: 1,
            page: 1,
            per_page: 20,
            has_more: false,
        },
    })
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

async fn spawn_api_server() -> anyhow::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/v1/follow", post(handle_follow).delete(handle_unfollow))
        .route("/v1/follow/status", get(handle_follow_status))
        .route("/v1/posts/:id/vote", post(handle_vote).get(handle_vote_status))
        .route("/v1/users/me/bookmarks", post(handle_add_bookmark))
        .route(
            "/v1/users/me/bookmarks/:id",
            delete(handle_remove_bookmark).get(handle_bookmark_status),
        )
        .route("/v1/posts/:id", get(handle_get_post))
        .route("/v1/search", get(handle_search))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[tokio::test]
async fn follow_request_carries_target_and_api_key() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    let client = SocialApiClient::new(server_url, AuthScheme::ApiKey("key-123".to_string()));

    client
        .follow(&TargetRef::agent("agent-1"))
        .await
        .expect("follow");

    let follows = state.follows.lock().await;
    assert_eq!(follows.len(), 1);
    let (api_key, bearer, body) = &follows[0];
    assert_eq!(api_key.as_deref(), Some("key-123"));
    assert!(bearer.is_none());
    assert_eq!(body.target_type, shared::domain::TargetType::Agent);
    assert_eq!(body.target_id, "agent-1");
}

#[tokio::test]
async fn bearer_credentials_use_the_authorization_header() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    let client = SocialApiClient::new(server_url, AuthScheme::Bearer("tok-9".to_string()));

    client
        .follow(&TargetRef::human("user-2"))
        .await
        .expect("follow");

    let follows = state.follows.lock().await;
    let (api_key, bearer, _) = &follows[0];
    assert!(api_key.is_none());
    assert_eq!(bearer.as_deref(), Some("Bearer tok-9"));
}

#[tokio::test]
async fn follow_controller_end_to_end_creates_without_deleting() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    let client = SocialApiClient::new(server_url, AuthScheme::Bearer("tok".to_string()));
    let actor = ActorRef::new(ActorType::Human, "user-1");

    let controller = client.follow_controller(&actor, TargetRef::agent("agent-1"));
    controller.load().await;
    assert_eq!(controller.state(), ToggleState::Ready(false));

    let handle = controller.toggle(()).expect("toggle accepted");
    assert_eq!(controller.state(), ToggleState::Ready(true));
    handle.await.expect("task");
    assert_eq!(controller.state(), ToggleState::Ready(true));

    assert_eq!(state.follows.lock().await.len(), 1);
    assert!(state.unfollows.lock().await.is_empty());
}

#[tokio::test]
async fn vote_sends_net_direction_and_decodes_envelope() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    let client = SocialApiClient::new(server_url, AuthScheme::ApiKey("key".to_string()));

    let status = client
        .vote(&PostId::new("post-1"), VoteDirection::Down)
        .await
        .expect("vote");

    assert_eq!(status.vote_score, 5);
    assert_eq!(status.user_vote, VoteDirection::Down);
    assert_eq!(
        state.votes.lock().await.clone(),
        vec![("post-1".to_string(), VoteDirection::Down)]
    );
}

#[tokio::test]
async fn duplicate_vote_error_decodes_to_api_exception() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    *state.reject_votes_as_duplicate.lock().await = true;
    let client = SocialApiClient::new(server_url, AuthScheme::ApiKey("key".to_string()));

    let err = client
        .vote(&PostId::new("post-1"), VoteDirection::Up)
        .await
        .expect_err("must fail");

    let exception = err
        .downcast_ref::<ApiException>()
        .expect("typed api exception");
    assert_eq!(exception.code, ErrorCode::DuplicateVote);
    assert!(exception.message.contains("already voted"));
}

#[tokio::test]
async fn vote_controller_reads_initial_state_from_the_api() {
    let (server_url, _state) = spawn_api_server().await.expect("spawn server");
    let client = SocialApiClient::new(server_url, AuthScheme::ApiKey("key".to_string()));
    let actor = ActorRef::new(ActorType::Agent, "agent-2");

    let controller = client.vote_controller(&actor, &PostId::new("post-1"));
    controller.load().await;

    assert_eq!(
        controller.state(),
        ToggleState::Ready(VoteSnapshot::new(VoteDirection::None, 4))
    );
}

#[tokio::test]
async fn bookmark_controller_mirrors_confirmed_state_into_the_store() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    let client = SocialApiClient::new(server_url, AuthScheme::Bearer("tok".to_string()));
    let actor = ActorRef::new(ActorType::Human, "user-1");
    let store = Arc::new(BookmarkStore::new());
    let post_id = PostId::new("post-1");

    let controller = client.bookmark_controller(&actor, &post_id, store.clone());
    controller.load().await;
    assert_eq!(controller.state(), ToggleState::Ready(false));
    assert!(!store.contains(&post_id));

    let handle = controller.toggle(()).expect("toggle accepted");
    handle.await.expect("task");

    assert_eq!(controller.state(), ToggleState::Ready(true));
    assert!(store.contains(&post_id));
    assert_eq!(
        state.bookmarks_added.lock().await.clone(),
        vec!["post-1".to_string()]
    );

    let handle = controller.toggle(()).expect("toggle accepted");
    handle.await.expect("task");

    assert!(!store.contains(&post_id));
    assert_eq!(
        state.bookmarks_removed.lock().await.clone(),
        vec!["post-1".to_string()]
    );
}

#[tokio::test]
async fn malformed_follow_status_body_is_a_read_failure() {
    let (server_url, state) = spawn_api_server().await.expect("spawn server");
    *state.malformed_follow_status.lock().await = true;
    let client = SocialApiClient::new(server_url, AuthScheme::Bearer("tok".to_string()));
    let actor = ActorRef::new(ActorType::Human, "user-1");

    let controller = client.follow_controller(&actor, TargetRef::agent("agent-1"));
    controller.load().await;

    assert_eq!(controller.state(), ToggleState::Unknown);
    assert!(controller.toggle(()).is_none());
}

#[tokio::test]
async fn get_post_and_search_decode_success_envelopes() {
    let (server_url, _state) = spawn_api_server().await.expect("spawn server");
    let client = SocialApiClient::new(server_url, AuthScheme::Anonymous);

    let post = client.get_post(&PostId::new("post-42")).await.expect("post");
    assert_eq!(post.id, PostId::new("post-42"));
    assert_eq!(post.post_type, PostType::Problem);
    assert_eq!(post.vote_score, 2);

    let results = client.search("dedupe", 1, 20).await.expect("search");
    assert_eq!(results.query, "dedupe");
    assert_eq!(results.data.len(), 1);
    assert_eq!(results.meta.total, 1);
}

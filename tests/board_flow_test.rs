//! Integration tests for the board client
//!
//! Drives the board through the in-memory backend: paging with placeholder
//! data, per-mutation invalidation cascades, the ownership gate, and retry
//! of transient failures.

use queryhaus::board::memory::ops;
use queryhaus::board::{PostPage, all_posts, comments_key, post_key, posts_key};
use queryhaus::prelude::*;
use std::sync::Arc;

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.retry = RetryConfig::disabled();
    config
}

fn board_with(backend: Arc<MemoryBoard>, config: &AppConfig) -> BoardClient {
    BoardClient::new(QueryClient::new(config), backend.clone(), backend)
}

/// A backend with `posts` posts written by a signed-in user
fn seeded(posts: usize) -> (Arc<MemoryBoard>, Identity) {
    let backend = Arc::new(MemoryBoard::new());
    let kim = backend.add_user("kim@test.com", "kim", "pw");
    for i in 0..posts {
        backend.seed_post(&kim, &format!("post {}", i), "body");
    }
    backend.sign_in_as(&kim);
    (backend, kim)
}

fn titles(page: &PostPage) -> Vec<String> {
    page.content.iter().map(|p| p.title.clone()).collect()
}

#[tokio::test]
async fn next_page_keeps_previous_page_until_loaded() {
    let (backend, _) = seeded(15);
    let board = board_with(Arc::clone(&backend), &config());

    let mut list = board.posts(0, "");
    let page0 = list.settled().await.data.unwrap();
    assert_eq!(page0.content.len(), 10);
    assert_eq!(page0.total_pages, 2);

    board.show_posts_page(&mut list, 1, "");
    let state = list.state();
    assert_eq!(state.status, QueryStatus::Loading);
    assert!(state.is_placeholder);
    assert_eq!(titles(state.data.as_ref().unwrap()), titles(&page0));

    let state = list.settled().await;
    assert_eq!(state.status, QueryStatus::Success);
    assert!(!state.is_placeholder);
    assert_eq!(state.data.unwrap().content.len(), 5);
    assert_eq!(backend.calls(ops::FETCH_POSTS), 2);
}

#[tokio::test]
async fn returning_to_a_cached_page_does_not_refetch() {
    let (backend, _) = seeded(15);
    let board = board_with(Arc::clone(&backend), &config());

    let mut list = board.posts(0, "");
    list.settled().await;
    board.show_posts_page(&mut list, 1, "");
    list.settled().await;
    board.show_posts_page(&mut list, 0, "");

    let state = list.state();
    assert_eq!(state.status, QueryStatus::Success);
    assert!(!state.is_placeholder);
    assert_eq!(backend.calls(ops::FETCH_POSTS), 2);
}

#[tokio::test]
async fn search_keeps_results_on_screen_while_loading() {
    let (backend, kim) = seeded(3);
    backend.seed_post(&kim, "Rust ownership", "body");
    let board = board_with(Arc::clone(&backend), &config());

    let mut list = board.posts(0, "");
    list.settled().await;
    board.show_posts_page(&mut list, 0, "rust");
    assert!(list.state().is_placeholder);

    let found = list.settled().await.data.unwrap();
    assert_eq!(titles(&found), vec!["Rust ownership".to_string()]);
    assert!(board.client().entry(&posts_key(0, "")).is_some());
}

#[tokio::test]
async fn comment_create_leaves_post_list_untouched() {
    let (backend, _) = seeded(1);
    let board = board_with(Arc::clone(&backend), &config());
    board.resolve_identity().await;

    let list = board.posts(0, "");
    list.settled().await;
    let comments = board.comments(1);
    assert!(comments.settled().await.data.unwrap().is_empty());
    let list_fetched_at = board.client().entry(&posts_key(0, "")).unwrap().last_fetched_at();

    let record = board
        .create_comment_action(1)
        .invoke(CommentPayload::new("  first!  "))
        .await;
    assert!(record.is_success());
    assert_eq!(record.affected_prefixes, vec![comments_key(1)]);

    let comments = comments.settled().await.data.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content, "first!");

    let list_entry = board.client().entry(&posts_key(0, "")).unwrap();
    assert_eq!(list_entry.status(), QueryStatus::Success);
    assert_eq!(list_entry.last_fetched_at(), list_fetched_at);
    assert_eq!(backend.calls(ops::FETCH_POSTS), 1);
}

#[tokio::test]
async fn post_update_refreshes_list_and_detail() {
    let (backend, kim) = seeded(2);
    let board = board_with(Arc::clone(&backend), &config());
    board.resolve_identity().await;

    let list = board.posts(0, "");
    let detail = board.post(1);
    list.settled().await;
    detail.settled().await;

    let record = board
        .update_post_action(1, Some(kim.id.clone()))
        .invoke(PostPayload::new("renamed", "new body"))
        .await;
    assert!(record.is_success());
    assert_eq!(record.affected_prefixes, vec![all_posts(), post_key(1)]);

    assert_eq!(detail.settled().await.data.unwrap().title, "renamed");
    let list = list.settled().await.data.unwrap();
    assert!(titles(&list).contains(&"renamed".to_string()));
}

#[tokio::test]
async fn delete_by_non_owner_is_blocked_locally() {
    let (backend, kim) = seeded(1);
    let lee = backend.add_user("lee@test.com", "lee", "pw");
    backend.sign_in_as(&lee);
    let board = board_with(Arc::clone(&backend), &config());

    let detail = board.post(1);
    let post = detail.settled().await.data.unwrap();
    assert!(!board.can_edit(post.owner_id()));

    // Before the identity is known the gate is closed too
    let record = board
        .delete_post_action(post.id, post.owner_id().cloned())
        .invoke(())
        .await;
    assert_eq!(record.status, MutationStatus::Error);

    assert_eq!(board.resolve_identity().await, IdentityState::Authenticated(lee));
    let record = board
        .delete_post_action(post.id, post.owner_id().cloned())
        .invoke(())
        .await;
    assert!(matches!(record.error, Some(QueryError::Auth(_))));
    assert_eq!(backend.calls(ops::DELETE_POST), 0);
    assert!(backend.stored_post(1).is_some());
    assert!(!board.can_edit(Some(&kim.id)));
}

#[tokio::test]
async fn owner_can_delete_a_comment() {
    let (backend, kim) = seeded(1);
    let comment = backend.seed_comment(1, &kim, "hello");
    let board = board_with(Arc::clone(&backend), &config());
    board.resolve_identity().await;

    let comments = board.comments(1);
    let listed = comments.settled().await.data.unwrap();
    assert!(board.can_edit(listed[0].owner_id()));

    let record = board
        .delete_comment_action(1)
        .invoke(CommentRef::from(&comment))
        .await;
    assert!(record.is_success());
    assert!(comments.settled().await.data.unwrap().is_empty());
}

#[tokio::test]
async fn failed_write_keeps_cache_and_input() {
    let (backend, _) = seeded(1);
    let board = board_with(Arc::clone(&backend), &config());
    board.resolve_identity().await;
    let list = board.posts(0, "");
    let before = list.settled().await;
    let generation = board.client().entry(&posts_key(0, "")).unwrap().generation();

    backend.fail_next(ops::CREATE_POST, QueryError::from_status(500, "server error"));
    let payload = PostPayload::new("draft", "keep me");
    let record = board.create_post_action().invoke(payload.clone()).await;

    assert_eq!(record.status, MutationStatus::Error);
    assert_eq!(record.variables, payload);
    assert_eq!(list.state(), before);
    assert_eq!(board.client().entry(&posts_key(0, "")).unwrap().generation(), generation);
    assert_eq!(backend.calls(ops::FETCH_POSTS), 1);
}

#[tokio::test]
async fn edit_form_in_create_mode_does_not_fetch() {
    let (backend, _) = seeded(1);
    let board = board_with(Arc::clone(&backend), &config());

    let form = board.post_for_edit(1, false);
    assert_eq!(form.state().status, QueryStatus::Idle);
    assert_eq!(backend.calls(ops::FETCH_POST), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_list_failures_are_retried() {
    let (backend, _) = seeded(3);
    backend.fail_next(ops::FETCH_POSTS, QueryError::from_status(503, "unavailable"));
    backend.fail_next(ops::FETCH_POSTS, QueryError::Network("connection reset".into()));

    let mut config = AppConfig::default();
    config.retry = RetryConfig::new(3, 100, 1_000, 10);
    let board = board_with(Arc::clone(&backend), &config);

    let list = board.posts(0, "");
    let state = list.settled().await;
    assert_eq!(state.status, QueryStatus::Success);
    assert_eq!(backend.calls(ops::FETCH_POSTS), 3);
}

#[tokio::test]
async fn missing_post_is_an_error_with_manual_retry() {
    let (backend, kim) = seeded(0);
    let board = board_with(Arc::clone(&backend), &config());

    let detail = board.post(1);
    let state = detail.settled().await;
    assert!(matches!(state.error, Some(QueryError::NotFound(_))));
    assert_eq!(backend.calls(ops::FETCH_POST), 1);

    backend.seed_post(&kim, "now it exists", "body");
    assert_eq!(detail.refetch().await, FetchOutcome::Committed);
    assert_eq!(detail.state().data.unwrap().title, "now it exists");
}

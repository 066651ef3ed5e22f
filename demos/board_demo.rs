//! # Board Client Demo
//!
//! Walks through the query cache against the in-memory board backend:
//! - Shared fetches and cached reads
//! - Paging with the previous page kept on screen
//! - Writes and the invalidation they cascade into
//! - The ownership gate before edits and deletes
//!
//! Run with: RUST_LOG=queryhaus=debug cargo run --example board_demo

use queryhaus::board::memory::ops;
use queryhaus::board::{PostPage, posts_key};
use queryhaus::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn print_page(label: &str, state: &QueryState<PostPage>) {
    let titles: Vec<_> = state
        .data
        .iter()
        .flat_map(|page| page.content.iter().map(|p| p.title.as_str()))
        .collect();
    println!(
        "   {label}: status={} placeholder={} titles={:?}",
        state.status, state.is_placeholder, titles
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("queryhaus=info")))
        .init();

    println!("🚀 QueryHaus Board Demo");
    println!("=======================");

    // 1. Backend and client
    let backend = Arc::new(MemoryBoard::new().with_latency(Duration::from_millis(50)));
    let kim = backend.add_user("kim@test.com", "kim", "secret");
    let lee = backend.add_user("lee@test.com", "lee", "secret");
    for i in 1..=12 {
        backend.seed_post(&kim, &format!("Post number {}", i), "Lorem ipsum");
    }
    backend.seed_post(&lee, "Lee's first post", "Hello board");

    let config = AppConfig::load().unwrap_or_else(|e| {
        println!("   (using default configuration: {})", e);
        AppConfig::default()
    });
    let board = BoardClient::new(QueryClient::new(&config), backend.clone(), backend.clone());
    println!("✅ Board client ready");

    // 2. Reading the list
    println!("\n📄 Post list");
    println!("------------");
    let mut list = board.posts(0, "");
    print_page("page 0 (initial)", &list.state());
    print_page("page 0 (settled)", &list.settled().await);

    board.show_posts_page(&mut list, 1, "");
    print_page("page 1 (loading)", &list.state());
    print_page("page 1 (settled)", &list.settled().await);

    board.show_posts_page(&mut list, 0, "");
    print_page("page 0 (cached)", &list.state());
    println!("   list requests so far: {}", backend.calls(ops::FETCH_POSTS));

    // 3. Signing in
    println!("\n🔐 Identity");
    println!("-----------");
    println!("   before lookup: {:?}", board.identity_state());
    println!("   after lookup: {:?}", board.resolve_identity().await);

    let login = board.login_action();
    let record = login.invoke(Credentials::new("kim@test.com", "secret")).await;
    println!("   login: {:?}", record.status);
    println!("   now: {:?}", board.resolve_identity().await);

    // 4. Writing
    println!("\n✏️  Writes");
    println!("----------");
    let create = board.create_post_action().on_success(|post| {
        println!("   created post {} ({})", post.id, post.title);
    });

    let rejected = create.invoke(PostPayload::new("   ", "no title")).await;
    println!("   blank title: {:?} {:?}", rejected.status, rejected.error);

    let record = create.invoke(PostPayload::new("Fresh post", "Just written")).await;
    println!("   refetching after create: {:?}", record.refetching);
    print_page("page 0 (after create)", &list.settled().await);

    let comments = board.comments(1);
    comments.settled().await;
    let list_tick = board.client().entry(&posts_key(0, "")).and_then(|e| e.last_fetched_at());
    board
        .create_comment_action(1)
        .invoke(CommentPayload::new("Nice post!"))
        .await;
    let comment_count = comments.settled().await.data.map(|c| c.len()).unwrap_or(0);
    let list_tick_after = board.client().entry(&posts_key(0, "")).and_then(|e| e.last_fetched_at());
    println!("   comments on post 1: {}", comment_count);
    println!("   list untouched by comment: {}", list_tick == list_tick_after);

    // 5. Ownership gate
    println!("\n🛡️  Ownership gate");
    println!("------------------");
    let lee_post = board.post(13);
    if let Some(post) = lee_post.settled().await.data {
        println!("   can edit lee's post: {}", board.can_edit(post.owner_id()));
        let record = board
            .delete_post_action(post.id, post.owner_id().cloned())
            .invoke(())
            .await;
        println!("   delete attempt: {:?}", record.error);
        println!("   delete requests sent: {}", backend.calls(ops::DELETE_POST));
    }

    board.logout().await?;
    println!("   after logout: {:?}", board.identity_state());

    let stats = board.client().signals().stats();
    println!("\n📊 {} cache entries, {} events emitted", board.client().store().len(), stats.events_emitted);
    Ok(())
}

//! In-memory board backend
//!
//! A complete [`BoardTransport`] and [`IdentityProvider`] over process
//! memory. It enforces the same rules a real server would (sessions,
//! ownership, required fields) and counts calls per operation, which makes
//! it the backend of the demo and of the test suite. Failures can be
//! scripted per operation with [`MemoryBoard::fail_next`].

use async_trait::async_trait;
use cache_system::QueryError;
use chrono::Utc;
use signal_system::lock::{rw_read, rw_write};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;
use uuid::Uuid;

use super::models::{
    AuthSession, Comment, CommentPayload, Credentials, Identity, ImageUpload, Post, PostListParams,
    PostPage, PostPayload, Registration, UploadedImage,
};
use super::transport::{BoardTransport, IdentityProvider};
use crate::gate::UserId;

const SOURCE: &str = "queryhaus::board::memory";

/// Operation names used for call counting and failure scripting
pub mod ops {
    pub const FETCH_POSTS: &str = "fetch_posts";
    pub const FETCH_POST: &str = "fetch_post";
    pub const CREATE_POST: &str = "create_post";
    pub const UPDATE_POST: &str = "update_post";
    pub const DELETE_POST: &str = "delete_post";
    pub const FETCH_COMMENTS: &str = "fetch_comments";
    pub const CREATE_COMMENT: &str = "create_comment";
    pub const UPDATE_COMMENT: &str = "update_comment";
    pub const DELETE_COMMENT: &str = "delete_comment";
    pub const LOGIN: &str = "login";
    pub const REGISTER: &str = "register";
    pub const UPLOAD_IMAGE: &str = "upload_image";
    pub const LOGOUT: &str = "logout";
    pub const CURRENT_IDENTITY: &str = "current_identity";
}

struct Account {
    identity: Identity,
    password: String,
}

#[derive(Default)]
struct BoardState {
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Vec<Comment>>,
    accounts: Vec<Account>,
    session: Option<Identity>,
    next_post_id: i64,
    next_comment_id: i64,
    next_user_id: i64,
}

impl BoardState {
    fn session(&self) -> Result<&Identity, QueryError> {
        self.session
            .as_ref()
            .ok_or_else(|| QueryError::Auth("login required".to_string()))
    }

    fn post_mut(&mut self, id: i64) -> Result<&mut Post, QueryError> {
        self.posts
            .get_mut(&id)
            .ok_or_else(|| QueryError::NotFound(format!("post {}", id)))
    }
}

fn ensure_owner(session: &Identity, owner: Option<&UserId>) -> Result<(), QueryError> {
    match owner {
        Some(owner) if session.id.same_as(owner) => Ok(()),
        _ => Err(QueryError::Auth("not the author".to_string())),
    }
}

#[derive(Default)]
pub struct MemoryBoard {
    state: RwLock<BoardState>,
    calls: RwLock<HashMap<&'static str, usize>>,
    failures: RwLock<HashMap<&'static str, VecDeque<QueryError>>>,
    latency: Option<Duration>,
}

impl std::fmt::Debug for MemoryBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = rw_read(&self.state, SOURCE, "debug");
        f.debug_struct("MemoryBoard")
            .field("posts", &state.posts.len())
            .field("accounts", &state.accounts.len())
            .field("signed_in", &state.session.is_some())
            .finish()
    }
}

impl MemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Create an account and return its identity
    pub fn add_user(&self, email: &str, nickname: &str, password: &str) -> Identity {
        let mut state = rw_write(&self.state, SOURCE, "add_user");
        state.next_user_id += 1;
        let identity = Identity::new(state.next_user_id, nickname).with_email(email);
        state.accounts.push(Account {
            identity: identity.clone(),
            password: password.to_string(),
        });
        identity
    }

    /// Start a session without going through login
    pub fn sign_in_as(&self, identity: &Identity) {
        rw_write(&self.state, SOURCE, "sign_in_as").session = Some(identity.clone());
    }

    pub fn sign_out(&self) {
        rw_write(&self.state, SOURCE, "sign_out").session = None;
    }

    /// Store a post directly, bypassing session checks
    pub fn seed_post(&self, author: &Identity, title: &str, content: &str) -> Post {
        let mut state = rw_write(&self.state, SOURCE, "seed_post");
        state.next_post_id += 1;
        let post = Post {
            id: state.next_post_id,
            title: title.to_string(),
            content: content.to_string(),
            image_url: None,
            read_count: 0,
            created_at: Some(Utc::now().naive_utc()),
            updated_at: None,
            author: Some(author.author()),
        };
        state.posts.insert(post.id, post.clone());
        post
    }

    /// Store a comment directly, bypassing session checks
    pub fn seed_comment(&self, post_id: i64, author: &Identity, content: &str) -> Comment {
        let mut state = rw_write(&self.state, SOURCE, "seed_comment");
        state.next_comment_id += 1;
        let comment = Comment {
            id: state.next_comment_id,
            content: content.to_string(),
            created_at: Some(Utc::now().naive_utc()),
            author: Some(author.author()),
        };
        state.comments.entry(post_id).or_default().push(comment.clone());
        comment
    }

    /// Current server copy of a post
    pub fn stored_post(&self, id: i64) -> Option<Post> {
        rw_read(&self.state, SOURCE, "stored_post").posts.get(&id).cloned()
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: &'static str, error: QueryError) {
        rw_write(&self.failures, SOURCE, "fail_next")
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Calls made to `op` so far
    pub fn calls(&self, op: &str) -> usize {
        rw_read(&self.calls, SOURCE, "calls").get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        rw_read(&self.calls, SOURCE, "total_calls").values().sum()
    }

    async fn enter(&self, op: &'static str) -> Result<(), QueryError> {
        *rw_write(&self.calls, SOURCE, "enter").entry(op).or_insert(0) += 1;
        tracing::trace!(op, "Memory board call");

        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        let scripted = rw_write(&self.failures, SOURCE, "enter")
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BoardTransport for MemoryBoard {
    async fn fetch_posts(&self, params: &PostListParams) -> Result<PostPage, QueryError> {
        self.enter(ops::FETCH_POSTS).await?;
        let state = rw_read(&self.state, SOURCE, ops::FETCH_POSTS);

        let keyword = params.keyword.trim().to_lowercase();
        let matching: Vec<_> = state
            .posts
            .values()
            .rev()
            .filter(|p| keyword.is_empty() || p.title.to_lowercase().contains(&keyword))
            .collect();

        let size = params.size.max(1) as usize;
        let total_pages = matching.len().div_ceil(size) as u32;
        let content = matching
            .into_iter()
            .skip(params.page as usize * size)
            .take(size)
            .map(Post::summary)
            .collect();

        Ok(PostPage { content, total_pages })
    }

    async fn fetch_post(&self, id: i64) -> Result<Post, QueryError> {
        self.enter(ops::FETCH_POST).await?;
        let mut state = rw_write(&self.state, SOURCE, ops::FETCH_POST);
        let post = state.post_mut(id)?;
        post.read_count += 1;
        Ok(post.clone())
    }

    async fn create_post(&self, payload: &PostPayload) -> Result<Post, QueryError> {
        self.enter(ops::CREATE_POST).await?;
        let payload = payload.validated()?;
        let mut state = rw_write(&self.state, SOURCE, ops::CREATE_POST);
        let author = state.session()?.author();

        state.next_post_id += 1;
        let post = Post {
            id: state.next_post_id,
            title: payload.title,
            content: payload.content,
            image_url: payload.image_url,
            read_count: 0,
            created_at: Some(Utc::now().naive_utc()),
            updated_at: None,
            author: Some(author),
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: i64, payload: &PostPayload) -> Result<Post, QueryError> {
        self.enter(ops::UPDATE_POST).await?;
        let payload = payload.validated()?;
        let mut state = rw_write(&self.state, SOURCE, ops::UPDATE_POST);
        let session = state.session()?.clone();
        let post = state.post_mut(id)?;
        ensure_owner(&session, post.owner_id())?;

        post.title = payload.title;
        post.content = payload.content;
        post.image_url = payload.image_url;
        post.updated_at = Some(Utc::now().naive_utc());
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), QueryError> {
        self.enter(ops::DELETE_POST).await?;
        let mut state = rw_write(&self.state, SOURCE, ops::DELETE_POST);
        let session = state.session()?.clone();
        ensure_owner(&session, state.post_mut(id)?.owner_id())?;

        state.posts.remove(&id);
        state.comments.remove(&id);
        Ok(())
    }

    async fn fetch_comments(&self, post_id: i64) -> Result<Vec<Comment>, QueryError> {
        self.enter(ops::FETCH_COMMENTS).await?;
        let state = rw_read(&self.state, SOURCE, ops::FETCH_COMMENTS);
        if !state.posts.contains_key(&post_id) {
            return Err(QueryError::NotFound(format!("post {}", post_id)));
        }
        Ok(state.comments.get(&post_id).cloned().unwrap_or_default())
    }

    async fn create_comment(&self, post_id: i64, payload: &CommentPayload) -> Result<Comment, QueryError> {
        self.enter(ops::CREATE_COMMENT).await?;
        let payload = payload.validated()?;
        let mut state = rw_write(&self.state, SOURCE, ops::CREATE_COMMENT);
        let author = state.session()?.author();
        state.post_mut(post_id)?;

        state.next_comment_id += 1;
        let comment = Comment {
            id: state.next_comment_id,
            content: payload.content,
            created_at: Some(Utc::now().naive_utc()),
            author: Some(author),
        };
        state.comments.entry(post_id).or_default().push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(
        &self,
        post_id: i64,
        comment_id: i64,
        payload: &CommentPayload,
    ) -> Result<Comment, QueryError> {
        self.enter(ops::UPDATE_COMMENT).await?;
        let payload = payload.validated()?;
        let mut state = rw_write(&self.state, SOURCE, ops::UPDATE_COMMENT);
        let session = state.session()?.clone();

        let comment = state
            .comments
            .get_mut(&post_id)
            .and_then(|list| list.iter_mut().find(|c| c.id == comment_id))
            .ok_or_else(|| QueryError::NotFound(format!("comment {}", comment_id)))?;
        ensure_owner(&session, comment.owner_id())?;

        comment.content = payload.content;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<(), QueryError> {
        self.enter(ops::DELETE_COMMENT).await?;
        let mut state = rw_write(&self.state, SOURCE, ops::DELETE_COMMENT);
        let session = state.session()?.clone();

        let list = state
            .comments
            .get_mut(&post_id)
            .ok_or_else(|| QueryError::NotFound(format!("comment {}", comment_id)))?;
        let index = list
            .iter()
            .position(|c| c.id == comment_id)
            .ok_or_else(|| QueryError::NotFound(format!("comment {}", comment_id)))?;
        ensure_owner(&session, list[index].owner_id())?;

        list.remove(index);
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, QueryError> {
        self.enter(ops::LOGIN).await?;
        let mut state = rw_write(&self.state, SOURCE, ops::LOGIN);

        let identity = state
            .accounts
            .iter()
            .find(|a| {
                a.identity.email.as_deref() == Some(credentials.email.as_str())
                    && a.password == credentials.password
            })
            .map(|a| a.identity.clone())
            .ok_or_else(|| QueryError::Auth("invalid email or password".to_string()))?;

        state.session = Some(identity);
        Ok(AuthSession {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Some(Uuid::new_v4().to_string()),
        })
    }

    async fn register(&self, registration: &Registration) -> Result<Identity, QueryError> {
        self.enter(ops::REGISTER).await?;
        if registration.email.is_empty() || registration.nickname.is_empty() || registration.password.is_empty() {
            return Err(QueryError::validation("email, nickname and password are required"));
        }

        let exists = rw_read(&self.state, SOURCE, ops::REGISTER)
            .accounts
            .iter()
            .any(|a| a.identity.email.as_deref() == Some(registration.email.as_str()));
        if exists {
            return Err(QueryError::Conflict(format!("{} is already registered", registration.email)));
        }

        Ok(self.add_user(&registration.email, &registration.nickname, &registration.password))
    }

    async fn upload_image(&self, upload: &ImageUpload) -> Result<UploadedImage, QueryError> {
        self.enter(ops::UPLOAD_IMAGE).await?;
        rw_read(&self.state, SOURCE, ops::UPLOAD_IMAGE).session()?;
        Ok(UploadedImage {
            image_url: format!("/uploads/{}-{}", Uuid::new_v4(), upload.file_name),
        })
    }

    async fn logout(&self) -> Result<(), QueryError> {
        self.enter(ops::LOGOUT).await?;
        rw_write(&self.state, SOURCE, ops::LOGOUT).session = None;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MemoryBoard {
    async fn current_identity(&self) -> Result<Option<Identity>, QueryError> {
        self.enter(ops::CURRENT_IDENTITY).await?;
        Ok(rw_read(&self.state, SOURCE, ops::CURRENT_IDENTITY).session.clone())
    }
}

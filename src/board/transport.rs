//! Transport traits
//!
//! The board layer never speaks HTTP itself. An implementation of
//! [`BoardTransport`] performs the requests (attaching credentials, mapping
//! status codes with [`QueryError::from_status`]) and [`IdentityProvider`]
//! answers who is signed in.

use async_trait::async_trait;
use cache_system::QueryError;

use super::models::{
    AuthSession, Comment, CommentPayload, Credentials, Identity, ImageUpload, Post, PostListParams,
    PostPage, PostPayload, Registration, UploadedImage,
};

/// Requests the board client can make against the server
#[async_trait]
pub trait BoardTransport: Send + Sync {
    /// Get one page of the post list
    async fn fetch_posts(&self, params: &PostListParams) -> Result<PostPage, QueryError>;

    /// Get a post by its ID
    async fn fetch_post(&self, id: i64) -> Result<Post, QueryError>;

    /// Create a post; returns the stored post
    async fn create_post(&self, payload: &PostPayload) -> Result<Post, QueryError>;

    /// Replace the title, content and image of a post
    async fn update_post(&self, id: i64, payload: &PostPayload) -> Result<Post, QueryError>;

    async fn delete_post(&self, id: i64) -> Result<(), QueryError>;

    /// Get every comment of a post, oldest first
    async fn fetch_comments(&self, post_id: i64) -> Result<Vec<Comment>, QueryError>;

    async fn create_comment(&self, post_id: i64, payload: &CommentPayload) -> Result<Comment, QueryError>;

    async fn update_comment(
        &self,
        post_id: i64,
        comment_id: i64,
        payload: &CommentPayload,
    ) -> Result<Comment, QueryError>;

    async fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<(), QueryError>;

    /// Exchange credentials for a session; the transport keeps the tokens
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, QueryError>;

    async fn register(&self, registration: &Registration) -> Result<Identity, QueryError>;

    /// Upload an image; the returned URL goes into a post payload
    async fn upload_image(&self, upload: &ImageUpload) -> Result<UploadedImage, QueryError>;

    /// Forget the stored session
    async fn logout(&self) -> Result<(), QueryError>;
}

/// Resolves the identity of the current session
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when nobody is signed in
    async fn current_identity(&self) -> Result<Option<Identity>, QueryError>;
}

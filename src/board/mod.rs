//! Discussion board layer
//!
//! Posts, comments and the signed-in identity, read through the query cache
//! and written through mutation actions. The HTTP side is abstracted behind
//! [`BoardTransport`] and [`IdentityProvider`]; [`MemoryBoard`] implements
//! both in memory.

pub mod client;
pub mod keys;
pub mod memory;
pub mod models;
pub mod transport;

pub use client::BoardClient;
pub use keys::{all_posts, comments_key, me_key, post_key, posts_key};
pub use memory::MemoryBoard;
pub use models::{
    AuthSession, Author, Comment, CommentEdit, CommentPayload, CommentRef, Credentials, Identity, ImageUpload,
    MAX_IMAGE_BYTES, PAGE_SIZE, Post, PostListParams, PostPage, PostPayload, PostSummary, Registration,
    UploadedImage,
};
pub use transport::{BoardTransport, IdentityProvider};

//! Board records
//!
//! Wire shapes of posts, comments and identities. Field names are camelCase
//! on the wire; optional fields default so partial server payloads decode.

use cache_system::QueryError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::gate::UserId;

/// Posts per list page
pub const PAGE_SIZE: u32 = 10;

/// Largest image accepted for upload (5 MiB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    pub nickname: String,
}

impl Identity {
    pub fn new(id: impl Into<UserId>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            nickname: nickname.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn author(&self) -> Author {
        Author {
            id: Some(self.id.clone()),
            nickname: Some(self.nickname.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// One row of the post list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub read_count: u64,
    // The list endpoint spells it `createAt`
    #[serde(default, alias = "createAt")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub author: Option<Author>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub read_count: u64,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub author: Option<Author>,
}

impl Post {
    pub fn owner_id(&self) -> Option<&UserId> {
        self.author.as_ref().and_then(|a| a.id.as_ref())
    }

    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            title: self.title.clone(),
            read_count: self.read_count,
            created_at: self.created_at,
            author: self.author.clone(),
        }
    }
}

/// One page of the post list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub content: Vec<PostSummary>,
    pub total_pages: u32,
}

impl PostPage {
    pub fn has_next(&self, page: u32) -> bool {
        page.saturating_add(1) < self.total_pages
    }

    /// The page after `page`, or `page` itself on the last page
    pub fn next_page(&self, page: u32) -> u32 {
        if self.has_next(page) { page + 1 } else { page }
    }

    pub fn prev_page(&self, page: u32) -> u32 {
        page.saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub author: Option<Author>,
}

impl Comment {
    pub fn owner_id(&self) -> Option<&UserId> {
        self.author.as_ref().and_then(|a| a.id.as_ref())
    }
}

/// List query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListParams {
    pub page: u32,
    pub size: u32,
    pub keyword: String,
}

impl PostListParams {
    pub fn new(page: u32, keyword: impl Into<String>) -> Self {
        Self {
            page,
            size: PAGE_SIZE,
            keyword: keyword.into(),
        }
    }
}

/// Body of a create or update post request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
}

impl PostPayload {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Trimmed copy of the payload; title and content are required
    pub fn validated(&self) -> Result<Self, QueryError> {
        let title = self.title.trim();
        let content = self.content.trim();

        let mut error = None;
        if title.is_empty() {
            error = Some(QueryError::validation("title and content are required").with_field("title", "required"));
        }
        if content.is_empty() {
            error = Some(
                error
                    .unwrap_or_else(|| QueryError::validation("title and content are required"))
                    .with_field("content", "required"),
            );
        }
        if let Some(error) = error {
            return Err(error);
        }

        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
            image_url: self.image_url.clone().filter(|url| !url.is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub content: String,
}

impl CommentPayload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn validated(&self) -> Result<Self, QueryError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(QueryError::validation("comment is empty").with_field("content", "required"));
        }
        Ok(Self::new(content))
    }
}

/// Variables of a comment edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub comment_id: i64,
    pub owner: Option<UserId>,
    pub payload: CommentPayload,
}

impl CommentEdit {
    pub fn new(comment: &Comment, content: impl Into<String>) -> Self {
        Self {
            comment_id: comment.id,
            owner: comment.owner_id().cloned(),
            payload: CommentPayload::new(content),
        }
    }
}

/// Variables of a comment delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRef {
    pub comment_id: i64,
    pub owner: Option<UserId>,
}

impl From<&Comment> for CommentRef {
    fn from(comment: &Comment) -> Self {
        Self {
            comment_id: comment.id,
            owner: comment.owner_id().cloned(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tokens returned by a successful login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession").finish_non_exhaustive()
    }
}

/// Sign-up request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub nickname: String,
    pub password: String,
    /// Checked locally, never sent
    #[serde(skip)]
    pub password_confirm: String,
}

impl Registration {
    pub fn new(
        email: impl Into<String>,
        nickname: impl Into<String>,
        password: impl Into<String>,
        password_confirm: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into().trim().to_string(),
            nickname: nickname.into().trim().to_string(),
            password: password.into(),
            password_confirm: password_confirm.into(),
        }
    }

    /// Every field is required and the confirmation must match
    pub fn validated(&self) -> Result<Self, QueryError> {
        let mut error = None;
        for (field, value) in [
            ("email", self.email.trim()),
            ("nickname", self.nickname.trim()),
            ("password", self.password.as_str()),
        ] {
            if value.is_empty() {
                error = Some(
                    error
                        .unwrap_or_else(|| QueryError::validation("email, nickname and password are required"))
                        .with_field(field, "required"),
                );
            }
        }
        if let Some(error) = error {
            return Err(error);
        }
        if self.password != self.password_confirm {
            return Err(QueryError::validation("passwords do not match").with_field("passwordConfirm", "mismatch"));
        }
        Ok(self.clone())
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("nickname", &self.nickname)
            .finish_non_exhaustive()
    }
}

/// An image file to attach to a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn validated(self) -> Result<Self, QueryError> {
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(QueryError::validation("image must be 5MB or smaller").with_field("file", "too large"));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub image_url: String,
}

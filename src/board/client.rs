//! Board client
//!
//! Binds the board's resources to the query cache: which key each read is
//! cached under, which fetch fills it, and which key families each write
//! invalidates.
//!
//! | write            | invalidates                 |
//! |------------------|-----------------------------|
//! | create post      | `(posts)`                   |
//! | update post      | `(posts)`, `(post, id)`     |
//! | delete post      | `(posts)`, `(post, id)`     |
//! | any comment write| `(comments, post_id)`       |
//! | login            | `(me)`                      |
//! | logout           | sets `(me)` to `null`       |

use cache_system::{QueryError, QueryOptions};
use query_types::QueryStatus;
use std::sync::Arc;

use super::keys::{all_posts, comments_key, me_key, post_key, posts_key};
use super::models::{
    AuthSession, Comment, CommentEdit, CommentPayload, CommentRef, Credentials, Identity, ImageUpload, Post,
    PostListParams, PostPage, PostPayload, Registration, UploadedImage,
};
use super::transport::{BoardTransport, IdentityProvider};
use crate::core::QueryClient;
use crate::fetch::{Fetcher, fetcher};
use crate::gate::{IdentityState, UserId, can_mutate};
use crate::mutation::{MutationAction, mutation_fn};
use crate::observer::QueryObserver;

#[derive(Clone)]
pub struct BoardClient {
    client: QueryClient,
    transport: Arc<dyn BoardTransport>,
    identity: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for BoardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardClient").field("client", &self.client).finish()
    }
}

/// Identity as currently known to the cache
///
/// An entry with no data yet is still resolving. A failed lookup counts as
/// signed out.
fn identity_state_of(client: &QueryClient) -> IdentityState {
    let Some(entry) = client.entry(&me_key()) else {
        return IdentityState::Resolving;
    };
    // Data from before an invalidation belongs to the previous session
    match entry.status() {
        QueryStatus::Error => return IdentityState::Anonymous,
        QueryStatus::Idle | QueryStatus::Loading => return IdentityState::Resolving,
        QueryStatus::Success if entry.is_invalidated() => return IdentityState::Resolving,
        QueryStatus::Success => {}
    }
    match entry.data_as::<Option<Identity>>() {
        Ok(Some(Some(identity))) => IdentityState::Authenticated(identity),
        Ok(Some(None)) => IdentityState::Anonymous,
        Ok(None) => IdentityState::Resolving,
        Err(e) => {
            tracing::warn!(error = %e, "Cached identity did not decode");
            IdentityState::Anonymous
        }
    }
}

fn ensure_owner(client: &QueryClient, owner: Option<&UserId>, action: &str) -> Result<(), QueryError> {
    let identity = identity_state_of(client);
    if can_mutate(&identity, owner) {
        Ok(())
    } else {
        tracing::debug!(action, resolving = matches!(identity, IdentityState::Resolving), "Ownership check denied");
        Err(QueryError::Auth(format!("only the author can {}", action)))
    }
}

fn ensure_signed_in(client: &QueryClient) -> Result<(), QueryError> {
    if identity_state_of(client).is_authenticated() {
        Ok(())
    } else {
        Err(QueryError::Auth("login required".to_string()))
    }
}

impl BoardClient {
    pub fn new(
        client: QueryClient,
        transport: Arc<dyn BoardTransport>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            client,
            transport,
            identity,
        }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn transport(&self) -> &Arc<dyn BoardTransport> {
        &self.transport
    }

    fn posts_fetcher(&self, page: u32, keyword: &str) -> Fetcher {
        let transport = Arc::clone(&self.transport);
        let params = PostListParams::new(page, keyword);
        fetcher(move || {
            let transport = Arc::clone(&transport);
            let params = params.clone();
            async move { transport.fetch_posts(&params).await }
        })
    }

    fn post_fetcher(&self, id: i64) -> Fetcher {
        let transport = Arc::clone(&self.transport);
        fetcher(move || {
            let transport = Arc::clone(&transport);
            async move { transport.fetch_post(id).await }
        })
    }

    fn comments_fetcher(&self, post_id: i64) -> Fetcher {
        let transport = Arc::clone(&self.transport);
        fetcher(move || {
            let transport = Arc::clone(&transport);
            async move { transport.fetch_comments(post_id).await }
        })
    }

    fn me_fetcher(&self) -> Fetcher {
        let identity = Arc::clone(&self.identity);
        fetcher(move || {
            let identity = Arc::clone(&identity);
            async move { identity.current_identity().await }
        })
    }

    // Reads

    /// Post list page; keeps the previous page on screen while a new page
    /// or search loads, unless configured otherwise
    pub fn posts(&self, page: u32, keyword: &str) -> QueryObserver<PostPage> {
        let options = QueryOptions::from_config(self.client.cache_config());
        self.client
            .watch_with(posts_key(page, keyword), self.posts_fetcher(page, keyword), options)
    }

    /// Move a list observer to another page or search
    pub fn show_posts_page(&self, observer: &mut QueryObserver<PostPage>, page: u32, keyword: &str) {
        observer.set_key(posts_key(page, keyword), self.posts_fetcher(page, keyword));
    }

    pub fn post(&self, id: i64) -> QueryObserver<Post> {
        self.client.watch(post_key(id), self.post_fetcher(id))
    }

    /// The post being edited; a form in create mode passes `enabled = false`
    pub fn post_for_edit(&self, id: i64, enabled: bool) -> QueryObserver<Post> {
        let options = QueryOptions::from_config(self.client.cache_config())
            .keep_previous_data(false)
            .enabled(enabled);
        self.client.watch_with(post_key(id), self.post_fetcher(id), options)
    }

    pub fn comments(&self, post_id: i64) -> QueryObserver<Vec<Comment>> {
        self.client
            .watch(comments_key(post_id), self.comments_fetcher(post_id))
    }

    /// The signed-in user, `None` when signed out
    pub fn me(&self) -> QueryObserver<Option<Identity>> {
        self.client.watch(me_key(), self.me_fetcher())
    }

    pub fn identity_state(&self) -> IdentityState {
        identity_state_of(&self.client)
    }

    /// Look up the identity if the cache cannot answer, then report it
    pub async fn resolve_identity(&self) -> IdentityState {
        match self
            .client
            .fetch_query::<Option<Identity>>(&me_key(), self.me_fetcher())
            .await
        {
            Ok(Some(identity)) => IdentityState::Authenticated(identity),
            Ok(None) => IdentityState::Anonymous,
            Err(e) => {
                tracing::debug!(error = %e, "Identity lookup failed");
                IdentityState::Anonymous
            }
        }
    }

    /// Whether edit and delete controls should be offered for a resource
    pub fn can_edit(&self, owner_id: Option<&UserId>) -> bool {
        can_mutate(&self.identity_state(), owner_id)
    }

    // Writes

    pub fn create_post_action(&self) -> MutationAction<PostPayload, Post> {
        let transport = Arc::clone(&self.transport);
        self.client.mutation(
            mutation_fn(move |payload: PostPayload| {
                let transport = Arc::clone(&transport);
                async move {
                    let payload = payload.validated()?;
                    transport.create_post(&payload).await
                }
            }),
            vec![all_posts()],
        )
    }

    pub fn update_post_action(&self, id: i64, owner: Option<UserId>) -> MutationAction<PostPayload, Post> {
        let transport = Arc::clone(&self.transport);
        let client = self.client.clone();
        self.client.mutation(
            mutation_fn(move |payload: PostPayload| {
                let transport = Arc::clone(&transport);
                let gate = ensure_owner(&client, owner.as_ref(), "edit this post");
                async move {
                    gate?;
                    let payload = payload.validated()?;
                    transport.update_post(id, &payload).await
                }
            }),
            vec![all_posts(), post_key(id)],
        )
    }

    pub fn delete_post_action(&self, id: i64, owner: Option<UserId>) -> MutationAction<(), ()> {
        let transport = Arc::clone(&self.transport);
        let client = self.client.clone();
        self.client.mutation(
            mutation_fn(move |_: ()| {
                let transport = Arc::clone(&transport);
                let gate = ensure_owner(&client, owner.as_ref(), "delete this post");
                async move {
                    gate?;
                    transport.delete_post(id).await
                }
            }),
            vec![all_posts(), post_key(id)],
        )
    }

    pub fn create_comment_action(&self, post_id: i64) -> MutationAction<CommentPayload, Comment> {
        let transport = Arc::clone(&self.transport);
        let client = self.client.clone();
        self.client.mutation(
            mutation_fn(move |payload: CommentPayload| {
                let transport = Arc::clone(&transport);
                let gate = ensure_signed_in(&client);
                async move {
                    gate?;
                    let payload = payload.validated()?;
                    transport.create_comment(post_id, &payload).await
                }
            }),
            vec![comments_key(post_id)],
        )
    }

    pub fn update_comment_action(&self, post_id: i64) -> MutationAction<CommentEdit, Comment> {
        let transport = Arc::clone(&self.transport);
        let client = self.client.clone();
        self.client.mutation(
            mutation_fn(move |edit: CommentEdit| {
                let transport = Arc::clone(&transport);
                let gate = ensure_owner(&client, edit.owner.as_ref(), "edit this comment");
                async move {
                    gate?;
                    let payload = edit.payload.validated()?;
                    transport.update_comment(post_id, edit.comment_id, &payload).await
                }
            }),
            vec![comments_key(post_id)],
        )
    }

    pub fn delete_comment_action(&self, post_id: i64) -> MutationAction<CommentRef, ()> {
        let transport = Arc::clone(&self.transport);
        let client = self.client.clone();
        self.client.mutation(
            mutation_fn(move |target: CommentRef| {
                let transport = Arc::clone(&transport);
                let gate = ensure_owner(&client, target.owner.as_ref(), "delete this comment");
                async move {
                    gate?;
                    transport.delete_comment(post_id, target.comment_id).await
                }
            }),
            vec![comments_key(post_id)],
        )
    }

    pub fn login_action(&self) -> MutationAction<Credentials, AuthSession> {
        let transport = Arc::clone(&self.transport);
        self.client.mutation(
            mutation_fn(move |credentials: Credentials| {
                let transport = Arc::clone(&transport);
                async move {
                    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
                        return Err(QueryError::validation("email and password are required"));
                    }
                    transport.login(&credentials).await
                }
            }),
            vec![me_key()],
        )
    }

    /// Sign-up; validated locally, touches no cached query
    pub fn register_action(&self) -> MutationAction<Registration, Identity> {
        let transport = Arc::clone(&self.transport);
        self.client.mutation(
            mutation_fn(move |registration: Registration| {
                let transport = Arc::clone(&transport);
                async move {
                    let registration = registration.validated()?;
                    transport.register(&registration).await
                }
            }),
            vec![],
        )
    }

    /// Image upload for a post form; touches no cached query
    pub fn upload_image_action(&self) -> MutationAction<ImageUpload, UploadedImage> {
        let transport = Arc::clone(&self.transport);
        self.client.mutation(
            mutation_fn(move |upload: ImageUpload| {
                let transport = Arc::clone(&transport);
                async move {
                    let upload = upload.validated()?;
                    transport.upload_image(&upload).await
                }
            }),
            vec![],
        )
    }

    /// Sign out and clear the cached identity immediately
    ///
    /// The identity is cleared even when the transport call fails.
    pub async fn logout(&self) -> Result<(), QueryError> {
        let result = self.transport.logout().await;
        self.client.set_query_data(&me_key(), &None::<Identity>)?;
        result
    }
}

//! Mutation execution
//!
//! Write operations run against the transport directly and never touch the
//! cache on their own. On success the executor invalidates every declared
//! key prefix before the record is handed back, so the next read of an
//! affected key cannot see pre-write data as fresh. On failure the cache is
//! left exactly as it was.

use cache_system::QueryError;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use query_types::QueryKey;
use serde::{Deserialize, Serialize};
use signal_system::lock::{rw_read, rw_write};
use std::future::Future;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::core::QueryClient;

const SOURCE: &str = "queryhaus::mutation";

/// A write operation against the server
pub type MutationFn<V, R> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<R, QueryError>> + Send + Sync>;

/// Computes the key prefixes to invalidate from the variables and the result
pub type PrefixFn<V, R> = Arc<dyn Fn(&V, &R) -> Vec<QueryKey> + Send + Sync>;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Wrap an async function as a [`MutationFn`]
pub fn mutation_fn<V, R, F, Fut>(f: F) -> MutationFn<V, R>
where
    F: Fn(V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, QueryError>> + Send + 'static,
{
    Arc::new(move |variables| Box::pin(f(variables)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

/// Outcome of one mutation invocation; never stored in the cache
#[derive(Debug, Clone)]
pub struct MutationRecord<V, R> {
    pub id: Uuid,
    pub variables: V,
    pub status: MutationStatus,
    pub result: Option<R>,
    pub error: Option<QueryError>,
    /// Prefixes invalidated because of this mutation
    pub affected_prefixes: Vec<QueryKey>,
    /// Observed keys whose refetch was started by the invalidation
    pub refetching: Vec<QueryKey>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl<V, R> MutationRecord<V, R> {
    fn pending(variables: V) -> Self {
        Self {
            id: Uuid::new_v4(),
            variables,
            status: MutationStatus::Pending,
            result: None,
            error: None,
            affected_prefixes: Vec::new(),
            refetching: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    /// The result, or the error the mutation failed with
    pub fn into_result(self) -> Result<R, QueryError> {
        match (self.result, self.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(error),
            (None, None) => Err(QueryError::Unknown("mutation did not complete".to_string())),
        }
    }
}

/// Runs mutations and cascades invalidation into the cache
#[derive(Debug, Clone)]
pub struct MutationExecutor {
    client: QueryClient,
}

impl MutationExecutor {
    pub fn new(client: QueryClient) -> Self {
        Self { client }
    }

    /// Run `mutation_fn` and invalidate `affected_prefixes` on success
    pub async fn execute<V, R>(
        &self,
        mutation_fn: &MutationFn<V, R>,
        variables: V,
        affected_prefixes: Vec<QueryKey>,
    ) -> MutationRecord<V, R>
    where
        V: Clone,
    {
        self.execute_with(mutation_fn, variables, move |_, _| affected_prefixes)
            .await
    }

    /// Like [`execute`](Self::execute), with prefixes computed from the
    /// variables and the server's result
    pub async fn execute_with<V, R, P>(
        &self,
        mutation_fn: &MutationFn<V, R>,
        variables: V,
        prefixes: P,
    ) -> MutationRecord<V, R>
    where
        V: Clone,
        P: FnOnce(&V, &R) -> Vec<QueryKey>,
    {
        let mut record = MutationRecord::pending(variables.clone());
        debug_log!(mutation = %record.id, "Mutation started");

        match mutation_fn(variables).await {
            Ok(result) => {
                let affected = prefixes(&record.variables, &result);
                for prefix in &affected {
                    record.refetching.extend(self.client.invalidate(prefix));
                }
                tracing::debug!(
                    mutation = %record.id,
                    prefixes = affected.len(),
                    refetching = record.refetching.len(),
                    "Mutation succeeded"
                );
                record.affected_prefixes = affected;
                record.result = Some(result);
                record.status = MutationStatus::Success;
            }
            Err(error) => {
                tracing::debug!(mutation = %record.id, error = %error, "Mutation failed");
                record.error = Some(error);
                record.status = MutationStatus::Error;
            }
        }

        record.finished_at = Some(Utc::now());
        record
    }
}

/// A reusable write action bound to one client
///
/// Each [`invoke`](Self::invoke) runs the mutation once, invalidates the
/// declared prefixes on success, then fires the matching callback exactly
/// once. Errors are only ever reported to the invoker.
pub struct MutationAction<V, R> {
    executor: MutationExecutor,
    mutation_fn: MutationFn<V, R>,
    prefixes: PrefixFn<V, R>,
    on_success: Option<Callback<R>>,
    on_error: Option<Callback<QueryError>>,
    status: Arc<RwLock<MutationStatus>>,
}

impl<V, R> Clone for MutationAction<V, R> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            mutation_fn: Arc::clone(&self.mutation_fn),
            prefixes: Arc::clone(&self.prefixes),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            status: Arc::clone(&self.status),
        }
    }
}

impl<V, R> std::fmt::Debug for MutationAction<V, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationAction")
            .field("status", &self.status())
            .finish()
    }
}

impl<V, R> MutationAction<V, R> {
    /// Status of the most recent invocation
    pub fn status(&self) -> MutationStatus {
        *rw_read(&self.status, SOURCE, "status")
    }
}

impl<V, R> MutationAction<V, R>
where
    V: Clone + Send + 'static,
    R: Send + 'static,
{
    pub fn new(client: QueryClient, mutation_fn: MutationFn<V, R>, affected_prefixes: Vec<QueryKey>) -> Self {
        Self {
            executor: client.mutations(),
            mutation_fn,
            prefixes: Arc::new(move |_, _| affected_prefixes.clone()),
            on_success: None,
            on_error: None,
            status: Arc::new(RwLock::new(MutationStatus::Idle)),
        }
    }

    /// Replace the declared prefixes with ones computed per invocation
    pub fn with_prefixes<F>(mut self, prefixes: F) -> Self
    where
        F: Fn(&V, &R) -> Vec<QueryKey> + Send + Sync + 'static,
    {
        self.prefixes = Arc::new(prefixes);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&R) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&QueryError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub async fn invoke(&self, variables: V) -> MutationRecord<V, R> {
        *rw_write(&self.status, SOURCE, "invoke") = MutationStatus::Pending;

        let prefixes = Arc::clone(&self.prefixes);
        let record = self
            .executor
            .execute_with(&self.mutation_fn, variables, move |v, r| prefixes(v, r))
            .await;

        *rw_write(&self.status, SOURCE, "invoke") = record.status;

        match (&record.result, &record.error) {
            (Some(result), _) => {
                if let Some(callback) = &self.on_success {
                    callback(result);
                }
            }
            (None, Some(error)) => {
                if let Some(callback) = &self.on_error {
                    callback(error);
                }
            }
            (None, None) => {}
        }

        record
    }
}

impl QueryClient {
    /// Bind a mutation to this client with fixed affected prefixes
    pub fn mutation<V, R>(&self, mutation_fn: MutationFn<V, R>, affected_prefixes: Vec<QueryKey>) -> MutationAction<V, R>
    where
        V: Clone + Send + 'static,
        R: Send + 'static,
    {
        MutationAction::new(self.clone(), mutation_fn, affected_prefixes)
    }
}

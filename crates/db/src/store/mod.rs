//! Transactional key-document store.
//!
//! Documents are JSON objects addressed by slash-separated paths such as
//! `blobs/{id}/chunks/{index}`. A collection is a document path minus its
//! last segment. Every write assigns a fresh version; a transaction commits
//! only if every document it read is still at the version it observed, so
//! read-modify-write cycles on counters are safe under concurrency.

mod memory;
mod query;
mod sql;

pub use memory::MemoryBackend;
pub use query::{Direction, Query};
pub use sql::SqlBackend;

use async_trait::async_trait;
use blobhub_common::{AppError, AppResult};
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of attempts for [`DocumentStore::run_transaction`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Full document path.
    pub path: String,
    /// Store-assigned version of this revision.
    pub version: i64,
    /// Document body.
    pub data: Value,
}

impl Snapshot {
    /// Last path segment.
    #[must_use]
    pub fn id(&self) -> &str {
        document_id(&self.path)
    }

    /// Decode the body into a typed document.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            AppError::Internal(format!("document {} failed to decode: {e}", self.path))
        })
    }
}

/// Version observed by a transactional read; `None` means the document was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadStamp {
    /// Document path.
    pub path: String,
    /// Observed version.
    pub version: Option<i64>,
}

/// A buffered mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or replace the document.
    Set {
        /// Document path.
        path: String,
        /// New body.
        data: Value,
    },
    /// Remove the document if present.
    Delete {
        /// Document path.
        path: String,
    },
}

impl Write {
    /// Path this write touches.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Set { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// Result of an atomic commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All writes applied.
    Committed,
    /// A read was stale; nothing was written.
    Conflict,
}

/// Storage engine behind a [`DocumentStore`].
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Fetch a single document.
    async fn get(&self, path: &str) -> AppResult<Option<Snapshot>>;

    /// Direct children of `collection`, ordered by path.
    async fn list(&self, collection: &str) -> AppResult<Vec<Snapshot>>;

    /// Apply `writes` atomically if every stamp in `reads` still holds.
    async fn commit(&self, reads: &[ReadStamp], writes: &[Write]) -> AppResult<CommitOutcome>;

    /// Run a filtered, ordered, limited query over one collection.
    async fn query(&self, query: &Query) -> AppResult<Vec<Snapshot>> {
        let docs = self.list(&query.collection).await?;
        Ok(query.apply(docs))
    }
}

/// Collection part of a document path.
#[must_use]
pub fn collection_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(collection, _)| collection)
}

/// Last segment of a document path.
#[must_use]
pub fn document_id(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, id)| id)
}

/// Cloneable handle over a backend.
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    max_attempts: u32,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Override the retry budget for transactions (minimum 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Retry budget for transactions.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Read a document outside any transaction.
    pub async fn get(&self, path: &str) -> AppResult<Option<Snapshot>> {
        self.backend.get(path).await
    }

    /// Read and decode a document outside any transaction.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> AppResult<Option<T>> {
        self.backend
            .get(path)
            .await?
            .map(|snapshot| snapshot.decode())
            .transpose()
    }

    /// Blind upsert.
    pub async fn set<T: Serialize + Sync>(&self, path: &str, value: &T) -> AppResult<()> {
        let write = Write::Set {
            path: path.to_string(),
            data: serde_json::to_value(value)?,
        };
        self.commit_blind(&[write]).await
    }

    /// Blind delete; absent documents are ignored.
    pub async fn delete(&self, path: &str) -> AppResult<()> {
        self.delete_all(&[path.to_string()]).await
    }

    /// Delete several documents in one atomic write.
    pub async fn delete_all(&self, paths: &[String]) -> AppResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let writes: Vec<Write> = paths
            .iter()
            .map(|path| Write::Delete { path: path.clone() })
            .collect();
        self.commit_blind(&writes).await
    }

    async fn commit_blind(&self, writes: &[Write]) -> AppResult<()> {
        for attempt in 1..=self.max_attempts {
            match self.backend.commit(&[], writes).await? {
                CommitOutcome::Committed => return Ok(()),
                CommitOutcome::Conflict => debug!(attempt, "Blind write raced an insert, retrying"),
            }
        }
        Err(AppError::TransactionConflict {
            attempts: self.max_attempts,
        })
    }

    /// Direct children of a collection.
    pub async fn list(&self, collection: &str) -> AppResult<Vec<Snapshot>> {
        self.backend.list(collection).await
    }

    /// Run a query.
    pub async fn query(&self, query: &Query) -> AppResult<Vec<Snapshot>> {
        self.backend.query(query).await
    }

    /// Run `body` in an optimistic transaction, retrying on conflict.
    ///
    /// The body may run several times, so it must not have side effects
    /// outside the [`Transaction`]. An error returned by the body aborts the
    /// attempt without writing anything. Once the retry budget is spent the
    /// call fails with [`AppError::TransactionConflict`].
    pub async fn run_transaction<T, F>(&self, body: F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, AppResult<T>> + Send + Sync,
    {
        for attempt in 1..=self.max_attempts {
            let mut tx = Transaction::new(self.backend.clone());
            let value = body(&mut tx).await?;
            let (reads, writes) = tx.into_parts();

            match self.backend.commit(&reads, &writes).await? {
                CommitOutcome::Committed => return Ok(value),
                CommitOutcome::Conflict => {
                    debug!(attempt, max_attempts = self.max_attempts, "Transaction conflict, retrying");
                }
            }
        }

        warn!(attempts = self.max_attempts, "Transaction retries exhausted");
        Err(AppError::TransactionConflict {
            attempts: self.max_attempts,
        })
    }
}

/// One attempt of an optimistic transaction.
///
/// Reads go to the backend and remember the first version seen for each
/// path. Writes are buffered until commit and are visible to later reads in
/// the same attempt.
pub struct Transaction {
    backend: Arc<dyn DocumentBackend>,
    reads: BTreeMap<String, Option<i64>>,
    writes: BTreeMap<String, Option<Value>>,
}

impl Transaction {
    fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Read a document body.
    pub async fn get(&mut self, path: &str) -> AppResult<Option<Value>> {
        if let Some(buffered) = self.writes.get(path) {
            return Ok(buffered.clone());
        }

        let snapshot = self.backend.get(path).await?;
        self.reads
            .entry(path.to_string())
            .or_insert_with(|| snapshot.as_ref().map(|s| s.version));
        Ok(snapshot.map(|s| s.data))
    }

    /// Read and decode a document.
    pub async fn get_as<T: DeserializeOwned>(&mut self, path: &str) -> AppResult<Option<T>> {
        match self.get(path).await? {
            Some(data) => serde_json::from_value(data).map(Some).map_err(|e| {
                AppError::Internal(format!("document {path} failed to decode: {e}"))
            }),
            None => Ok(None),
        }
    }

    /// Whether a document exists.
    pub async fn exists(&mut self, path: &str) -> AppResult<bool> {
        Ok(self.get(path).await?.is_some())
    }

    /// Buffer an upsert.
    pub fn set<T: Serialize>(&mut self, path: &str, value: &T) -> AppResult<()> {
        let data = serde_json::to_value(value)?;
        self.writes.insert(path.to_string(), Some(data));
        Ok(())
    }

    /// Buffer a delete.
    pub fn delete(&mut self, path: &str) {
        self.writes.insert(path.to_string(), None);
    }

    fn into_parts(self) -> (Vec<ReadStamp>, Vec<Write>) {
        let reads = self
            .reads
            .into_iter()
            .map(|(path, version)| ReadStamp { path, version })
            .collect();
        let writes = self
            .writes
            .into_iter()
            .map(|(path, data)| match data {
                Some(data) => Write::Set { path, data },
                None => Write::Delete { path },
            })
            .collect();
        (reads, writes)
    }
}

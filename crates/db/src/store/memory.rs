//! Process-local backend.

use super::{CommitOutcome, DocumentBackend, ReadStamp, Snapshot, Write};
use async_trait::async_trait;
use blobhub_common::AppResult;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    docs: BTreeMap<String, (i64, Value)>,
    clock: i64,
}

/// In-memory backend. Commits serialize on a single write lock; versions
/// come from one counter so they are never reused.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    injected_conflicts: AtomicU32,
}

impl MemoryBackend {
    /// Empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` transactional commits report a conflict.
    ///
    /// Only commits that carry reads are affected; blind writes go through.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.state.read().await.docs.len()
    }

    /// Whether the backend holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.docs.is_empty()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn get(&self, path: &str) -> AppResult<Option<Snapshot>> {
        let state = self.state.read().await;
        Ok(state.docs.get(path).map(|(version, data)| Snapshot {
            path: path.to_string(),
            version: *version,
            data: data.clone(),
        }))
    }

    async fn list(&self, collection: &str) -> AppResult<Vec<Snapshot>> {
        let prefix = format!("{collection}/");
        let state = self.state.read().await;
        Ok(state
            .docs
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/'))
            .map(|(path, (version, data))| Snapshot {
                path: path.clone(),
                version: *version,
                data: data.clone(),
            })
            .collect())
    }

    async fn commit(&self, reads: &[ReadStamp], writes: &[Write]) -> AppResult<CommitOutcome> {
        if !reads.is_empty() && self.take_injected_conflict() {
            return Ok(CommitOutcome::Conflict);
        }

        let mut state = self.state.write().await;
        let stale = reads.iter().any(|read| {
            state.docs.get(&read.path).map(|(version, _)| *version) != read.version
        });
        if stale {
            return Ok(CommitOutcome::Conflict);
        }

        for write in writes {
            match write {
                Write::Set { path, data } => {
                    state.clock += 1;
                    let version = state.clock;
                    state.docs.insert(path.clone(), (version, data.clone()));
                }
                Write::Delete { path } => {
                    state.docs.remove(path);
                }
            }
        }
        Ok(CommitOutcome::Committed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(path: &str, data: Value) -> Write {
        Write::Set {
            path: path.to_string(),
            data,
        }
    }

    #[tokio::test]
    async fn test_list_returns_direct_children_only() {
        let backend = MemoryBackend::new();
        backend
            .commit(
                &[],
                &[
                    set("blobs/a", json!({})),
                    set("blobs/a/chunks/0", json!({})),
                    set("blobs/b", json!({})),
                    set("blobsx/c", json!({})),
                ],
            )
            .await
            .unwrap();

        let ids: Vec<String> = backend
            .list("blobs")
            .await
            .unwrap()
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(backend.list("blobs/a/chunks").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_read_conflicts() {
        let backend = MemoryBackend::new();
        backend
            .commit(&[], &[set("users/u", json!({ "n": 1 }))])
            .await
            .unwrap();
        let seen = backend.get("users/u").await.unwrap().unwrap();

        backend
            .commit(&[], &[set("users/u", json!({ "n": 2 }))])
            .await
            .unwrap();

        let outcome = backend
            .commit(
                &[ReadStamp {
                    path: "users/u".to_string(),
                    version: Some(seen.version),
                }],
                &[set("users/u", json!({ "n": 99 }))],
            )
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
        assert_eq!(
            backend.get("users/u").await.unwrap().unwrap().data,
            json!({ "n": 2 })
        );
    }

    #[tokio::test]
    async fn test_absence_is_a_read() {
        let backend = MemoryBackend::new();
        let absent = ReadStamp {
            path: "likes/x".to_string(),
            version: None,
        };
        backend
            .commit(&[], &[set("likes/x", json!({}))])
            .await
            .unwrap();

        let outcome = backend
            .commit(&[absent], &[set("likes/x", json!({ "dup": true }))])
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_versions_not_reused_after_recreate() {
        let backend = MemoryBackend::new();
        backend.commit(&[], &[set("a/b", json!(1))]).await.unwrap();
        let first = backend.get("a/b").await.unwrap().unwrap().version;

        backend
            .commit(
                &[],
                &[Write::Delete {
                    path: "a/b".to_string(),
                }],
            )
            .await
            .unwrap();
        backend.commit(&[], &[set("a/b", json!(1))]).await.unwrap();
        let second = backend.get("a/b").await.unwrap().unwrap().version;

        assert!(second > first);
        assert!(!backend.is_empty().await);
    }
}

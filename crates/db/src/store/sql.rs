//! `PostgreSQL` backend on sea-orm.
//!
//! All documents live in one `document` table. A commit opens a database
//! transaction, re-reads every stamped row with `FOR UPDATE`, and only then
//! applies the writes. Two commits that both saw a path as absent race on
//! the primary key; the loser gets a unique violation, reported as a conflict.

use super::{CommitOutcome, DocumentBackend, ReadStamp, Snapshot, Write, collection_of};
use crate::entities::document;
use async_trait::async_trait;
use blobhub_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;

/// sea-orm backed document storage.
#[derive(Clone)]
pub struct SqlBackend {
    db: Arc<DatabaseConnection>,
}

impl SqlBackend {
    /// Wrap an open connection. Run the migrations first.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn db_err(e: DbErr) -> AppError {
    AppError::Database(e.to_string())
}

fn snapshot(model: document::Model) -> Snapshot {
    Snapshot {
        path: model.path,
        version: model.version,
        data: model.data,
    }
}

/// Next version for a row: strictly above the previous one and never below
/// the wall clock, so a deleted and recreated path does not repeat a version.
fn next_version(previous: Option<i64>) -> i64 {
    let now = Utc::now().timestamp_micros();
    previous.map_or(now, |prev| now.max(prev + 1))
}

async fn locked_version(txn: &DatabaseTransaction, path: &str) -> AppResult<Option<i64>> {
    let row = document::Entity::find_by_id(path.to_string())
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(db_err)?;
    Ok(row.map(|r| r.version))
}

async fn apply(txn: &DatabaseTransaction, write: &Write) -> Result<(), DbErr> {
    match write {
        Write::Set { path, data } => {
            let existing = document::Entity::find_by_id(path.clone())
                .lock_exclusive()
                .one(txn)
                .await?;
            let now = Utc::now().fixed_offset();
            match existing {
                Some(row) => {
                    let version = next_version(Some(row.version));
                    let mut active: document::ActiveModel = row.into();
                    active.version = Set(version);
                    active.data = Set(data.clone());
                    active.updated_at = Set(now);
                    active.update(txn).await?;
                }
                None => {
                    document::ActiveModel {
                        path: Set(path.clone()),
                        collection: Set(collection_of(path).to_string()),
                        version: Set(next_version(None)),
                        data: Set(data.clone()),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;
                }
            }
        }
        Write::Delete { path } => {
            document::Entity::delete_by_id(path.clone()).exec(txn).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentBackend for SqlBackend {
    async fn get(&self, path: &str) -> AppResult<Option<Snapshot>> {
        document::Entity::find_by_id(path.to_string())
            .one(self.db.as_ref())
            .await
            .map(|row| row.map(snapshot))
            .map_err(db_err)
    }

    async fn list(&self, collection: &str) -> AppResult<Vec<Snapshot>> {
        document::Entity::find()
            .filter(document::Column::Collection.eq(collection))
            .order_by_asc(document::Column::Path)
            .all(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().map(snapshot).collect())
            .map_err(db_err)
    }

    async fn commit(&self, reads: &[ReadStamp], writes: &[Write]) -> AppResult<CommitOutcome> {
        let txn = self.db.begin().await.map_err(db_err)?;

        for read in reads {
            if locked_version(&txn, &read.path).await? != read.version {
                txn.rollback().await.map_err(db_err)?;
                return Ok(CommitOutcome::Conflict);
            }
        }

        for write in writes {
            if let Err(e) = apply(&txn, write).await {
                txn.rollback().await.map_err(db_err)?;
                return match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => Ok(CommitOutcome::Conflict),
                    _ => Err(db_err(e)),
                };
            }
        }

        txn.commit().await.map_err(db_err)?;
        Ok(CommitOutcome::Committed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn row(path: &str, version: i64, data: serde_json::Value) -> document::Model {
        document::Model {
            path: path.to_string(),
            collection: collection_of(path).to_string(),
            version,
            data,
            updated_at: Utc::now().fixed_offset(),
        }
    }

    #[tokio::test]
    async fn test_get_maps_row_to_snapshot() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row("blobUsers/u1", 42, json!({ "totalBytesUsed": 10 }))]])
            .into_connection();
        let backend = SqlBackend::new(Arc::new(db));

        let snapshot = backend.get("blobUsers/u1").await.unwrap().unwrap();

        assert_eq!(snapshot.version, 42);
        assert_eq!(snapshot.id(), "u1");
        assert_eq!(snapshot.data["totalBytesUsed"], json!(10));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<document::Model>::new()])
            .into_connection();
        let backend = SqlBackend::new(Arc::new(db));

        assert!(backend.get("blobs/none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_returns_rows_in_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                row("blobs/b1/likes/alice", 1, json!({ "uid": "alice" })),
                row("blobs/b1/likes/bob", 2, json!({ "uid": "bob" })),
            ]])
            .into_connection();
        let backend = SqlBackend::new(Arc::new(db));

        let docs = backend.list("blobs/b1/likes").await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].id(), "bob");
    }

    #[test]
    fn test_next_version_moves_forward() {
        let far_future = i64::MAX / 2;
        assert_eq!(next_version(Some(far_future)), far_future + 1);
        assert!(next_version(None) > 0);
    }
}

//! Document row for the SQL backend.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One stored document.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document")]
pub struct Model {
    /// Full slash-separated path.
    #[sea_orm(primary_key, auto_increment = false)]
    pub path: String,

    /// Path minus its last segment.
    #[sea_orm(indexed)]
    pub collection: String,

    /// Version stamp checked by optimistic commits.
    pub version: i64,

    /// Document body.
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,

    /// When the row was last written.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Key/value metadata stored in the `metadata` JSONB column of `shops` and
//! `products`.
//!
//! Each mutation locks the owning row, edits the map in memory, and writes
//! it back inside one transaction.

use std::collections::BTreeMap;

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

pub type MetadataMap = BTreeMap<String, String>;

/// The soft-deletable tables that carry a metadata map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataOwner {
    Shop,
    Product,
}

impl MetadataOwner {
    fn table(self) -> &'static str {
        match self {
            Self::Shop => "shops",
            Self::Product => "products",
        }
    }
}

/// Returns the metadata map of a visible shop or product, or `None` if the
/// owner is absent or soft-deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_metadata(
    pool: &PgPool,
    owner: MetadataOwner,
    id: i64,
) -> Result<Option<MetadataMap>, DbError> {
    let sql = format!(
        "SELECT metadata FROM {} WHERE id = $1 AND deleted_at IS NULL",
        owner.table()
    );
    let row = sqlx::query_scalar::<_, Json<MetadataMap>>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|Json(map)| map))
}

/// Adds `key` to the owner's metadata and returns the updated map.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the owner is not visible,
/// [`DbError::Conflict`] if `key` already exists, or [`DbError::Sqlx`] if a
/// query fails.
pub async fn insert_metadata_key(
    pool: &PgPool,
    owner: MetadataOwner,
    id: i64,
    key: &str,
    value: &str,
) -> Result<MetadataMap, DbError> {
    let mut tx = pool.begin().await?;
    let mut map = lock_metadata(&mut tx, owner, id).await?;

    if map.contains_key(key) {
        return Err(DbError::Conflict(format!(
            "metadata key '{key}' already exists"
        )));
    }
    map.insert(key.to_owned(), value.to_owned());

    store_metadata(&mut tx, owner, id, &map).await?;
    tx.commit().await?;
    Ok(map)
}

/// Replaces the value of an existing `key` and returns the updated map.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the owner is not visible,
/// [`DbError::MissingMetadataKey`] if `key` is absent, or [`DbError::Sqlx`]
/// if a query fails.
pub async fn update_metadata_key(
    pool: &PgPool,
    owner: MetadataOwner,
    id: i64,
    key: &str,
    value: &str,
) -> Result<MetadataMap, DbError> {
    let mut tx = pool.begin().await?;
    let mut map = lock_metadata(&mut tx, owner, id).await?;

    match map.get_mut(key) {
        Some(existing) => value.clone_into(existing),
        None => return Err(DbError::MissingMetadataKey(key.to_owned())),
    }

    store_metadata(&mut tx, owner, id, &map).await?;
    tx.commit().await?;
    Ok(map)
}

/// Removes `key` and returns the updated map.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the owner is not visible,
/// [`DbError::MissingMetadataKey`] if `key` is absent, or [`DbError::Sqlx`]
/// if a query fails.
pub async fn delete_metadata_key(
    pool: &PgPool,
    owner: MetadataOwner,
    id: i64,
    key: &str,
) -> Result<MetadataMap, DbError> {
    let mut tx = pool.begin().await?;
    let mut map = lock_metadata(&mut tx, owner, id).await?;

    if map.remove(key).is_none() {
        return Err(DbError::MissingMetadataKey(key.to_owned()));
    }

    store_metadata(&mut tx, owner, id, &map).await?;
    tx.commit().await?;
    Ok(map)
}

async fn lock_metadata(
    tx: &mut Transaction<'_, Postgres>,
    owner: MetadataOwner,
    id: i64,
) -> Result<MetadataMap, DbError> {
    let sql = format!(
        "SELECT metadata FROM {} WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        owner.table()
    );
    sqlx::query_scalar::<_, Json<MetadataMap>>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .map(|Json(map)| map)
        .ok_or(DbError::NotFound)
}

async fn store_metadata(
    tx: &mut Transaction<'_, Postgres>,
    owner: MetadataOwner,
    id: i64,
    map: &MetadataMap,
) -> Result<(), DbError> {
    let sql = format!(
        "UPDATE {} SET metadata = $2, updated_at = NOW() WHERE id = $1",
        owner.table()
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(Json(map))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

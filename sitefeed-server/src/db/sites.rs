//! Site resolution
//!
//! A site is identified by its exact coordinate pair. Find-or-create runs
//! inside the caller's transaction and relies on the `UNIQUE(latitude,
//! longitude)` constraint: when two submissions race to create the same
//! site, the loser's insert is a no-op and it reads back the winner's row.

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::parse_stored_uuid;
use sitefeed_common::db::Site;
use sitefeed_common::{time, Error, Result};

const SELECT_SITE: &str = "SELECT id, latitude, longitude, address, created_at FROM sites";

/// Return the site at exactly `(latitude, longitude)`, creating it if needed
///
/// The insert is issued first so the enclosing transaction takes the write
/// lock before reading; a read-then-write upgrade can fail outright under WAL.
pub async fn resolve_site(
    conn: &mut SqliteConnection,
    latitude: f64,
    longitude: f64,
    address: Option<&str>,
) -> Result<Site> {
    let id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO sites (id, latitude, longitude, address, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(latitude, longitude) DO NOTHING
        "#,
    )
    .bind(id.to_string())
    .bind(latitude)
    .bind(longitude)
    .bind(address)
    .bind(time::to_db(&time::now()))
    .execute(&mut *conn)
    .await
    .map_err(Error::from_storage)?
    .rows_affected();

    let site = find_by_coordinates(&mut *conn, latitude, longitude)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!(
                "Site at ({}, {}) missing after insert",
                latitude, longitude
            ))
        })?;

    if inserted == 1 {
        info!(site_id = %site.id, latitude, longitude, "Created site");
    } else {
        debug!(site_id = %site.id, latitude, longitude, "Reusing existing site");
    }
    Ok(site)
}

/// Exact-match lookup (no tolerance)
pub async fn find_by_coordinates<'e, E>(
    executor: E,
    latitude: f64,
    longitude: f64,
) -> Result<Option<Site>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE latitude = ? AND longitude = ?", SELECT_SITE))
        .bind(latitude)
        .bind(longitude)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(site_from_row).transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Site>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_SITE))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(site_from_row).transpose()
}

pub async fn count_sites(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn site_from_row(row: &SqliteRow) -> Result<Site> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Site {
        id: parse_stored_uuid(&id)?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        address: row.try_get("address")?,
        created_at: time::from_db(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitefeed_common::db::init_database;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("sitefeed.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_same_coordinates_resolve_to_same_site() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = resolve_site(&mut conn, 12.9, 77.6, Some("Gate 3")).await.unwrap();
        let second = resolve_site(&mut conn, 12.9, 77.6, None).await.unwrap();

        assert_eq!(first.id, second.id);
        // The first submission's address sticks
        assert_eq!(second.address.as_deref(), Some("Gate 3"));
        assert_eq!(count_sites(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nearby_coordinates_are_distinct_sites() {
        let (_dir, pool) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let a = resolve_site(&mut conn, 12.9, 77.6, None).await.unwrap();
        let b = resolve_site(&mut conn, 12.900001, 77.6, None).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(count_sites(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_creates_one_site() {
        let (_dir, pool) = test_pool().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let mut tx = pool.begin().await.unwrap();
                let site = resolve_site(&mut tx, -33.8688, 151.2093, None).await.unwrap();
                tx.commit().await.unwrap();
                site.id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all submissions must share one site");
        assert_eq!(count_sites(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_id_absent_is_none() {
        let (_dir, pool) = test_pool().await;
        assert!(find_by_id(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }
}

//! Database queries for the persistent key/value store.

use crate::db::pool::DbPool;
use chrono::Utc;

/// Read a value by key.
pub async fn get_value(pool: &DbPool, key: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT value FROM persistent_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(value,)| value))
}

/// Insert or overwrite a value.
pub async fn set_value(pool: &DbPool, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO persistent_storage (key, value, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove a value. Removing a missing key is not an error.
pub async fn remove_value(pool: &DbPool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM persistent_storage WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_overwrite_remove() {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("kv.db")).await.unwrap();

        assert_eq!(get_value(&pool, "k").await.unwrap(), None);

        set_value(&pool, "k", "1").await.unwrap();
        set_value(&pool, "k", "2").await.unwrap();
        assert_eq!(get_value(&pool, "k").await.unwrap().as_deref(), Some("2"));

        remove_value(&pool, "k").await.unwrap();
        remove_value(&pool, "k").await.unwrap();
        assert_eq!(get_value(&pool, "k").await.unwrap(), None);
    }
}

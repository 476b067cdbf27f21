use anyhow::Result;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// Known department names; users reference departments by name, so user
/// writes validate against this before touching the database.
pub static DEPARTMENT_CACHE: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(3600))
        .build()
});

pub async fn mark_known(name: &str) {
    DEPARTMENT_CACHE.insert(name.to_string(), true).await;
}

pub async fn forget(name: &str) {
    DEPARTMENT_CACHE.invalidate(name).await;
}

/// Cache-first existence check with a database fallback.
pub async fn is_known(pool: &MySqlPool, name: &str) -> Result<bool> {
    if DEPARTMENT_CACHE.get(name).await.unwrap_or(false) {
        return Ok(true);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM departments WHERE name = ? LIMIT 1)",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;

    if exists {
        mark_known(name).await;
    }
    Ok(exists)
}

/// First name that does not resolve to a department, if any.
pub async fn find_unknown(pool: &MySqlPool, names: &[String]) -> Result<Option<String>> {
    for name in names {
        if !is_known(pool, name).await? {
            return Ok(Some(name.clone()));
        }
    }
    Ok(None)
}

/// Preloads every department name at startup.
pub async fn warmup_department_cache(pool: &MySqlPool) -> Result<()> {
    let names = sqlx::query_scalar::<_, String>("SELECT name FROM departments")
        .fetch_all(pool)
        .await?;

    let count = names.len();
    for name in names {
        DEPARTMENT_CACHE.insert(name, true).await;
    }

    log::info!("Department cache warmup complete: {} departments", count);
    Ok(())
}

//! Fast-path uniqueness checks for user emails and employee codes.
//!
//! Lookups go cuckoo filter (definite "free") -> moka cache (definite "taken")
//! -> database. The unique keys in `users` remain the final authority.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;
use tracing::info;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// Keys known to be taken
static TAKEN: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

#[derive(Debug, Clone, Copy)]
pub enum IdentityKey<'a> {
    Email(&'a str),
    EmployeeCode(&'a str),
}

impl IdentityKey<'_> {
    fn normalized(&self) -> String {
        match self {
            IdentityKey::Email(e) => format!("email:{}", e.trim().to_lowercase()),
            IdentityKey::EmployeeCode(c) => format!("code:{}", c.trim().to_uppercase()),
        }
    }

    fn column(&self) -> &'static str {
        match self {
            IdentityKey::Email(_) => "email",
            IdentityKey::EmployeeCode(_) => "employee_code",
        }
    }

    fn value(&self) -> String {
        match self {
            IdentityKey::Email(e) => e.trim().to_lowercase(),
            IdentityKey::EmployeeCode(c) => c.trim().to_uppercase(),
        }
    }
}

/// Answer from the in-memory layers only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Free,
    Taken,
    Unknown,
}

pub async fn quick_lookup(key: IdentityKey<'_>) -> Lookup {
    let k = key.normalized();

    let maybe = FILTER
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains(&k);
    if !maybe {
        return Lookup::Free;
    }

    if TAKEN.get(&k).await.is_some() {
        return Lookup::Taken;
    }

    Lookup::Unknown
}

/// true => nobody holds this key
pub async fn is_available(key: IdentityKey<'_>, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
    match quick_lookup(key).await {
        Lookup::Free => return Ok(true),
        Lookup::Taken => return Ok(false),
        Lookup::Unknown => {}
    }

    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM users WHERE {} = ? LIMIT 1)",
        key.column()
    );
    let exists = sqlx::query_scalar::<_, i64>(&sql)
        .bind(key.value())
        .fetch_one(pool)
        .await?
        != 0;

    if exists {
        TAKEN.insert(key.normalized(), ()).await;
    }

    Ok(!exists)
}

/// Record a key that now belongs to a user
pub async fn remember(key: IdentityKey<'_>) {
    let k = key.normalized();
    FILTER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .add(&k);
    TAKEN.insert(k, ()).await;
}

/// Release a key after a user changed their email or code
pub async fn forget(key: IdentityKey<'_>) {
    let k = key.normalized();
    FILTER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(&k);
    TAKEN.invalidate(&k).await;
}

/// Stream every user's email and code into the filter in batches
pub async fn warmup(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream =
        sqlx::query_as::<_, (String, String)>("SELECT email, employee_code FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size * 2);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (email, code) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(IdentityKey::Email(&email).normalized());
        batch.push(IdentityKey::EmployeeCode(&code).normalized());
        total += 1;

        if batch.len() >= batch_size * 2 {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    info!(users = total, "Directory index warmup complete");
    Ok(())
}

fn insert_batch(keys: &[String]) {
    let mut filter = FILTER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    for k in keys {
        filter.add(k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_normalized_per_kind() {
        assert_eq!(
            IdentityKey::Email("  Jane.Doe@Company.COM ").normalized(),
            "email:jane.doe@company.com"
        );
        assert_eq!(IdentityKey::EmployeeCode("emp-7").normalized(), "code:EMP-7");
    }

    #[actix_web::test]
    async fn unseen_key_is_free() {
        let lookup = quick_lookup(IdentityKey::Email("never-seen-4711@company.com")).await;
        assert_eq!(lookup, Lookup::Free);
    }

    #[actix_web::test]
    async fn remembered_key_is_taken_until_forgotten() {
        let key = IdentityKey::EmployeeCode("idx-test-0815");
        remember(key).await;
        assert_eq!(quick_lookup(key).await, Lookup::Taken);

        forget(key).await;
        assert_eq!(quick_lookup(IdentityKey::EmployeeCode("IDX-TEST-0815")).await, Lookup::Free);
    }

    #[actix_web::test]
    async fn email_and_code_namespaces_do_not_collide() {
        remember(IdentityKey::EmployeeCode("shared-value-99")).await;
        assert_eq!(
            quick_lookup(IdentityKey::Email("shared-value-99")).await,
            Lookup::Free
        );
    }
}

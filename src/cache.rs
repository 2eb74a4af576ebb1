use std::{collections::HashMap, sync::Arc, sync::Mutex, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use time::OffsetDateTime;

/// Ephemeral string store where every entry carries a time-to-live.
///
/// An entry whose TTL has elapsed is indistinguishable from one that was
/// never written: `get` returns `None` for both.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
    /// Bumps an integer counter, starting from 0 when absent or expired, and
    /// resets its TTL. Returns the new value.
    async fn incr(&self, key: &str, ttl: Duration) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct RedisKvStore {
    pool: Arc<Pool>,
}

impl RedisKvStore {
    pub fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .context("create redis pool")?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn conn(&self) -> anyhow::Result<deadpool_redis::Connection> {
        self.pool.get().await.context("redis pool get")
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        // SET key value EX ttl, a single atomic command
        let _: () = conn
            .set_ex(key, value, ttl.as_secs().max(1))
            .await
            .with_context(|| format!("redis SET {key}"))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("redis GET {key}"))?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn
            .del(key)
            .await
            .with_context(|| format!("redis DEL {key}"))?;
        Ok(removed > 0)
    }

    async fn incr(&self, key: &str, ttl: Duration) -> anyhow::Result<u64> {
        let mut conn = self.conn().await?;
        let (count,): (u64,) = deadpool_redis::redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .ignore()
            .query_async(&mut *conn)
            .await
            .with_context(|| format!("redis INCR {key}"))?;
        Ok(count)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Process-local store for development and tests. Expired entries are
/// dropped lazily on access.
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, (String, OffsetDateTime)>>,
    clock: Arc<dyn Clock>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let expires_at = self.clock.now() + ttl;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("kv store lock poisoned"))?;
        entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("kv store lock poisoned"))?;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= now => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("kv store lock poisoned"))?;
        Ok(matches!(entries.remove(key), Some((_, expires_at)) if expires_at > now))
    }

    async fn incr(&self, key: &str, ttl: Duration) -> anyhow::Result<u64> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("kv store lock poisoned"))?;
        let current = match entries.get(key) {
            Some((value, expires_at)) if *expires_at > now => value
                .parse::<u64>()
                .with_context(|| format!("{key} does not hold a counter"))?,
            _ => 0,
        };
        let next = current + 1;
        entries.insert(key.to_string(), (next.to_string(), now + ttl));
        Ok(next)
    }
}

#[cfg(test)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(OffsetDateTime::now_utc()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

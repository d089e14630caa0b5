/// Redis wrapper with graceful degradation.
///
/// Every operation reports a miss (`None` or `false`) instead of an error, after logging a
/// warning. A run without Redis behaves exactly like a run with an empty cache.
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisCache {
    client: Option<redis::Client>,
}

impl RedisCache {
    /// Create a client for `url`. `None` or an unparsable URL gives a cache that never hits.
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client, cache disabled"))
                .ok()
        });
        Self { client }
    }

    /// PING the server. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection().await?;
        let value: Result<Option<String>, _> = conn.get(key).await;
        value
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()
            .flatten()
    }

    /// Store `value` under `key` for `ttl_secs`. Returns `true` if the write landed.
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SETEX failed"))
            .is_ok()
    }

    /// Remove every key starting with `prefix`, walking the keyspace with SCAN.
    pub async fn delete_by_prefix(&self, prefix: &str) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        loop {
            let scanned: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await;
            let (next, keys) = match scanned {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, pattern, "redis SCAN failed");
                    return false;
                }
            };
            if !keys.is_empty() {
                if let Err(e) = conn.del::<_, ()>(&keys).await {
                    warn!(error = %e, keys = keys.len(), "redis DEL failed during prefix delete");
                    return false;
                }
            }
            if next == 0 {
                return true;
            }
            cursor = next;
        }
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        self.client
            .as_ref()?
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = RedisCache::new(None);
        assert!(!cache.is_available().await);
        assert_eq!(cache.get("shopscan:v1:score:x").await, None);
        assert!(!cache.set_with_ttl("shopscan:v1:score:x", "1", 60).await);
        assert!(!cache.delete_by_prefix("shopscan:v1:").await);
    }

    #[test]
    fn bad_url_disables_cache() {
        let cache = RedisCache::new(Some("not a redis url"));
        assert!(cache.client.is_none());
    }
}

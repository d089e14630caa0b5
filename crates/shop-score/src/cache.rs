/// Redis cache of per-URL scores.
///
/// All operations degrade gracefully: a miss or a Redis failure means the URL is fetched
/// and scored as usual.
///
/// Key schema:
/// - `shopscan:v1:score:{sha256(rule set fingerprint | url)}`: JSON-serialized `Outcome`
///   (TTL: `SCORE_CACHE_TTL_SECS`)
///
/// Keys include the rule set fingerprint, so editing a rule set never serves stale scores.
/// Fetch failures are never stored.
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use shopscan_common::model::Outcome;
use shopscan_common::redis::RedisCache;

const KEY_PREFIX: &str = "shopscan:v1:";

pub struct ScoreCache {
    redis: RedisCache,
    fingerprint: String,
    ttl_secs: u64,
}

impl ScoreCache {
    pub fn new(redis: RedisCache, fingerprint: String, ttl_secs: u64) -> Self {
        Self {
            redis,
            fingerprint,
            ttl_secs,
        }
    }

    pub async fn get(&self, url: &str) -> Option<Outcome> {
        let key = score_key(&self.fingerprint, url);
        let json = self.redis.get(&key).await?;
        serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()
    }

    pub async fn set(&self, url: &str, outcome: &Outcome) {
        if !is_cacheable(outcome) {
            return;
        }
        let key = score_key(&self.fingerprint, url);
        if let Ok(json) = serde_json::to_string(outcome) {
            self.redis.set_with_ttl(&key, &json, self.ttl_secs).await;
        }
    }

    /// Delete every cached score, for all rule sets.
    pub async fn invalidate_all(&self) {
        if self.redis.delete_by_prefix(KEY_PREFIX).await {
            info!("score cache cleared");
        }
    }
}

fn is_cacheable(outcome: &Outcome) -> bool {
    !matches!(outcome, Outcome::FetchFailed { .. })
}

fn score_key(fingerprint: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    let hash = hasher.finalize();
    format!("{KEY_PREFIX}score:{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_depend_on_rules_and_url() {
        let a = score_key("rules-a", "https://shop.de");
        assert_eq!(a, score_key("rules-a", "https://shop.de"));
        assert_ne!(a, score_key("rules-b", "https://shop.de"));
        assert_ne!(a, score_key("rules-a", "https://shop.at"));
        assert!(a.starts_with("shopscan:v1:score:"));
        assert_eq!(a.len(), "shopscan:v1:score:".len() + 64);
    }

    #[test]
    fn failures_are_not_cacheable() {
        assert!(is_cacheable(&Outcome::Scored(42.0)));
        assert!(is_cacheable(&Outcome::Excluded {
            token: "Barbershop".to_string()
        }));
        assert!(!is_cacheable(&Outcome::FetchFailed {
            error: "timeout".to_string()
        }));
    }

    #[tokio::test]
    async fn disabled_redis_misses() {
        let cache = ScoreCache::new(RedisCache::new(None), "fp".to_string(), 60);
        cache.set("https://shop.de", &Outcome::Scored(10.0)).await;
        assert_eq!(cache.get("https://shop.de").await, None);
    }
}

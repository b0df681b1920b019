use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::currency::{Currency, RateQuote};
use crate::db::{DbPool, OrmConn};

/// Small in-process TTL cache for lookups we are allowed to serve stale for
/// a while (exchange rates: 1 hour, country guesses: 24 hours).
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    inner: Arc<RwLock<HashMap<K, (Instant, V)>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let guard = self.inner.read().await;
        guard
            .get(key)
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, v)| v.clone())
    }

    pub async fn put(&self, key: K, value: V) {
        self.inner.write().await.insert(key, (Instant::now(), value));
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: AppConfig,
    pub http: reqwest::Client,
    pub rates: TtlCache<Currency, RateQuote>,
    pub countries: TtlCache<String, Option<String>>,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn, config: AppConfig) -> Self {
        Self {
            pool,
            orm,
            config,
            http: reqwest::Client::new(),
            rates: TtlCache::new(Duration::from_secs(60 * 60)),
            countries: TtlCache::new(Duration::from_secs(60 * 60 * 24)),
        }
    }
}

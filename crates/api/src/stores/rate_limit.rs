//! Dual-dimension fixed-window rate limiting.
//!
//! Every check consults two counters: one keyed by the resolved identity and
//! one keyed by the raw caller address. The address dimension applies even when
//! the identity is already address-derived, so header differences between
//! requests cannot mint fresh quota for the same machine. Either dimension at
//! the max blocks the request.
//!
//! Counters are immutable `{count, window_start}` snapshots; whether a window
//! is still active is pure math over `(now, window_start, window)`. The
//! increment is a per-key conditional primitive (Lua on Redis) so two
//! concurrent requests can never both take the last slot.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::clock::Clock;

/// Counter snapshot for one dimension. `window_start` is epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub count: i64,
    pub window_start: i64,
}

/// A window is active while `now` is strictly inside `[start, start + window)`.
pub fn window_active(now: DateTime<Utc>, window_start: i64, window: Duration) -> bool {
    let elapsed = now.timestamp() - window_start;
    elapsed >= 0 && elapsed < window.num_seconds()
}

/// Store for rate-limit counters.
///
/// `incr_in_window` must be atomic per key: the read-reset-increment sequence
/// is a single operation against the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Health check - verify store connectivity.
    async fn health_check(&self) -> Result<bool>;

    /// Read a counter as stored, active window or not.
    async fn get(&self, key: &str) -> Result<Option<Counter>>;

    /// Atomically increment, starting a fresh window when the stored one is
    /// absent or has elapsed. Returns the post-increment snapshot.
    async fn incr_in_window(&self, key: &str, window_secs: i64, now_epoch: i64) -> Result<Counter>;

    /// Overwrite a counter (login merge only).
    async fn put(&self, key: &str, counter: Counter, ttl_secs: i64) -> Result<()>;
}

/// Redis implementation of CounterStore. Counters are stored as
/// `"{count}:{window_start}"` strings under `ratelimit:{key}`.
#[derive(Clone)]
pub struct RedisCounterStore {
    client: redis::Client,
}

impl RedisCounterStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn counter_key(key: &str) -> String {
        format!("ratelimit:{}", key)
    }

    fn parse(raw: &str) -> Option<Counter> {
        let (count, start) = raw.split_once(':')?;
        Some(Counter {
            count: count.parse().ok()?,
            window_start: start.parse().ok()?,
        })
    }
}

const INCR_IN_WINDOW: &str = r#"
local raw = redis.call('GET', KEYS[1])
local window = tonumber(ARGV[1])
local now = tonumber(ARGV[2])
local count = 0
local start = now
if raw then
  local sep = string.find(raw, ':', 1, true)
  count = tonumber(string.sub(raw, 1, sep - 1))
  start = tonumber(string.sub(raw, sep + 1))
  if now - start >= window then
    count = 0
    start = now
  end
end
count = count + 1
redis.call('SET', KEYS[1], count .. ':' .. start, 'EX', window)
return {count, start}
"#;

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(result == "PONG")
    }

    async fn get(&self, key: &str) -> Result<Option<Counter>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::counter_key(key))
            .query_async(&mut conn)
            .await?;

        Ok(raw.as_deref().and_then(Self::parse))
    }

    async fn incr_in_window(&self, key: &str, window_secs: i64, now_epoch: i64) -> Result<Counter> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(INCR_IN_WINDOW);

        let (count, window_start): (i64, i64) = script
            .key(Self::counter_key(key))
            .arg(window_secs)
            .arg(now_epoch)
            .invoke_async(&mut conn)
            .await?;

        Ok(Counter {
            count,
            window_start,
        })
    }

    async fn put(&self, key: &str, counter: Counter, ttl_secs: i64) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("SET")
            .arg(Self::counter_key(key))
            .arg(format!("{}:{}", counter.count, counter.window_start))
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

/// Which dimension tripped the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedBy {
    Identity,
    Address,
    /// Counter store unreachable; the limiter fails closed.
    Unavailable,
}

impl BlockedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockedBy::Identity => "identity",
            BlockedBy::Address => "address",
            BlockedBy::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
    pub current_count: i64,
    pub blocked_by: Option<BlockedBy>,
}

/// Sentinel count reported when the store is unreachable.
const UNAVAILABLE_COUNT: i64 = -1;
/// Synthetic reset horizon for fail-closed decisions.
const UNAVAILABLE_RESET_DAYS: i64 = 365;

/// Enforces the dual-dimension quota.
///
/// Infrastructure errors never surface: the limiter fails closed, returning a
/// blocked decision with a far-future reset. Unlimited requests on a store
/// outage is the worse failure mode.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    max: i64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        max: i64,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            max,
            window,
        }
    }

    /// The address dimension key. Raw addresses only ever appear in this
    /// prefixed form; identity-keyed records carry the salted hash instead.
    fn address_key(address: &str) -> String {
        format!("ip-{}", address)
    }

    fn user_key(user_id: &str) -> String {
        format!("user:{}", user_id)
    }

    fn window_end(&self, window_start: i64) -> DateTime<Utc> {
        let start = Utc
            .timestamp_opt(window_start, 0)
            .single()
            .unwrap_or_else(|| self.clock.now());
        start + self.window
    }

    fn blocked(&self, by: BlockedBy, counter: Counter) -> RateLimitDecision {
        RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at: self.window_end(counter.window_start),
            current_count: counter.count,
            blocked_by: Some(by),
        }
    }

    /// Keeps only counters whose window is still active at `now`.
    fn active(&self, counter: Option<Counter>, now: DateTime<Utc>) -> Option<Counter> {
        counter.filter(|c| window_active(now, c.window_start, self.window))
    }

    pub async fn check_and_increment(&self, identity: &str, address: &str) -> RateLimitDecision {
        match self.try_check(identity, address).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::error!(error = ?err, "rate limit store unreachable, failing closed");
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at: self.clock.now() + Duration::days(UNAVAILABLE_RESET_DAYS),
                    current_count: UNAVAILABLE_COUNT,
                    blocked_by: Some(BlockedBy::Unavailable),
                }
            }
        }
    }

    async fn try_check(&self, identity: &str, address: &str) -> Result<RateLimitDecision> {
        let now = self.clock.now();
        let window_secs = self.window.num_seconds();
        let address_key = Self::address_key(address);

        // Read first: a blocked request must not consume quota.
        let identity_counter = self.active(self.store.get(identity).await?, now);
        if let Some(counter) = identity_counter {
            if counter.count >= self.max {
                return Ok(self.blocked(BlockedBy::Identity, counter));
            }
        }

        let address_counter = self.active(self.store.get(&address_key).await?, now);
        if let Some(counter) = address_counter {
            if counter.count >= self.max {
                return Ok(self.blocked(BlockedBy::Address, counter));
            }
        }

        // Both dimensions have room: take a slot in each. A concurrent loser
        // sees a post-increment count above the max and is refused here.
        let identity_after = self
            .store
            .incr_in_window(identity, window_secs, now.timestamp())
            .await?;
        let address_after = self
            .store
            .incr_in_window(&address_key, window_secs, now.timestamp())
            .await?;

        if identity_after.count > self.max {
            return Ok(self.blocked(BlockedBy::Identity, identity_after));
        }
        if address_after.count > self.max {
            return Ok(self.blocked(BlockedBy::Address, address_after));
        }

        let tightest = identity_after.count.max(address_after.count);
        Ok(RateLimitDecision {
            allowed: true,
            remaining: self.max - tightest,
            reset_at: self.window_end(identity_after.window_start),
            current_count: identity_after.count,
            blocked_by: None,
        })
    }

    /// Folds the address-keyed counter into the user-identity counter at login.
    ///
    /// Active-window counts are summed (not overwritten) so switching from the
    /// anonymous identity to the user identity mid-window cannot reset quota.
    /// The earlier window start wins, which never extends the reset time.
    pub async fn merge(&self, raw_address: &str, user_id: &str) -> Result<()> {
        let now = self.clock.now();
        let address_key = Self::address_key(raw_address);
        let user_key = Self::user_key(user_id);

        let address_counter = self.active(self.store.get(&address_key).await?, now);
        let Some(address_counter) = address_counter else {
            return Ok(());
        };

        let merged = match self.active(self.store.get(&user_key).await?, now) {
            Some(user_counter) => Counter {
                count: user_counter.count + address_counter.count,
                window_start: user_counter.window_start.min(address_counter.window_start),
            },
            None => address_counter,
        };

        let ttl = merged.window_start + self.window.num_seconds() - now.timestamp();
        self.store.put(&user_key, merged, ttl).await?;

        tracing::info!(
            user_id = %user_id,
            merged_count = merged.count,
            "rate limit counter merged at login"
        );

        Ok(())
    }
}

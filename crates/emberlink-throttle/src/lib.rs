//! Per-key cooldown rate limiter for Emberlink.
//!
//! Each key (a chat type, a command kind, ...) owns one async critical
//! section. [`RateLimiter::acquire`] takes it, sleeps out whatever is left of
//! the key's cooldown, and hands back a [`CooldownPermit`]. The caller sends
//! and, only if the send went through, calls [`CooldownPermit::record`].
//! Dropping the permit without recording leaves the previous timestamp in
//! place, so a cancelled or failed send never consumes a cooldown.
//!
//! The critical section is a `tokio::sync::Mutex`, which is fair: callers
//! queued on the same key are served in arrival order.
//!
//! ```ignore
//! let permit = limiter.acquire(ChatType::Say, &cancel).await?;
//! transport.send(opcode, bytes, &cancel).await?;
//! permit.record();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by [`RateLimiter::acquire`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThrottleError {
    /// The cancellation token fired while waiting.
    #[error("cancelled while waiting for cooldown")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Cooldown table: one duration per key, with a fallback for keys not
/// listed.
#[derive(Debug, Clone)]
pub struct CooldownConfig<K> {
    /// Applied to keys without an entry in `per_key`.
    pub default: Duration,
    /// Key-specific cooldowns.
    pub per_key: HashMap<K, Duration>,
}

impl<K> Default for CooldownConfig<K> {
    fn default() -> Self {
        Self {
            default: Duration::ZERO,
            per_key: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + fmt::Debug> CooldownConfig<K> {
    /// Longest cooldown accepted. Anything longer is clamped.
    pub const MAX_COOLDOWN: Duration = Duration::from_secs(60);

    /// A table where every key uses `default`.
    pub fn uniform(default: Duration) -> Self {
        Self {
            default,
            per_key: HashMap::new(),
        }
    }

    /// Adds or replaces the cooldown for `key`.
    pub fn with(mut self, key: K, cooldown: Duration) -> Self {
        self.per_key.insert(key, cooldown);
        self
    }

    /// Clamps every cooldown to [`Self::MAX_COOLDOWN`].
    ///
    /// Called automatically by [`RateLimiter::new`].
    pub fn validated(mut self) -> Self {
        if self.default > Self::MAX_COOLDOWN {
            warn!(
                default_ms = self.default.as_millis() as u64,
                "default cooldown exceeds maximum, clamping"
            );
            self.default = Self::MAX_COOLDOWN;
        }
        for (key, cooldown) in self.per_key.iter_mut() {
            if *cooldown > Self::MAX_COOLDOWN {
                warn!(
                    ?key,
                    cooldown_ms = cooldown.as_millis() as u64,
                    "cooldown exceeds maximum, clamping"
                );
                *cooldown = Self::MAX_COOLDOWN;
            }
        }
        self
    }

    /// Cooldown for `key`.
    pub fn cooldown(&self, key: &K) -> Duration {
        self.per_key.get(key).copied().unwrap_or(self.default)
    }
}

// ---------------------------------------------------------------------------
// Permit
// ---------------------------------------------------------------------------

/// Exclusive right to send once under a key.
///
/// Holding the permit keeps every other caller for the same key waiting.
/// Call [`record`](Self::record) after a successful send; drop it otherwise.
#[must_use = "a permit that is never recorded does not consume the cooldown"]
pub struct CooldownPermit {
    last_sent: OwnedMutexGuard<Option<Instant>>,
    waited: Duration,
}

impl CooldownPermit {
    /// Stamps the key's last-send time with the current instant and
    /// releases the key.
    pub fn record(mut self) {
        *self.last_sent = Some(Instant::now());
    }

    /// How long [`RateLimiter::acquire`] slept before granting the permit.
    /// Time spent queued behind other callers is not included.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl fmt::Debug for CooldownPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CooldownPermit")
            .field("last_sent", &*self.last_sent)
            .field("waited", &self.waited)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Limiter
// ---------------------------------------------------------------------------

type Slot = Arc<AsyncMutex<Option<Instant>>>;

/// Per-key cooldown gate.
///
/// Keys are created lazily on first use. Different keys never wait on each
/// other.
pub struct RateLimiter<K> {
    config: CooldownConfig<K>,
    slots: Mutex<HashMap<K, Slot>>,
}

impl<K> RateLimiter<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates a limiter from a cooldown table.
    pub fn new(config: CooldownConfig<K>) -> Self {
        Self {
            config: config.validated(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Cooldown configured for `key`.
    pub fn cooldown(&self, key: &K) -> Duration {
        self.config.cooldown(key)
    }

    fn slot(&self, key: &K) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Waits until `key` may be used again and returns the permit for it.
    ///
    /// Returns [`ThrottleError::Cancelled`] if `cancel` fires first, either
    /// while queued behind another caller or while sleeping out the
    /// cooldown. Nothing is recorded in that case.
    pub async fn acquire(
        &self,
        key: K,
        cancel: &CancellationToken,
    ) -> Result<CooldownPermit, ThrottleError> {
        if cancel.is_cancelled() {
            return Err(ThrottleError::Cancelled);
        }
        let slot = self.slot(&key);

        let last_sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ThrottleError::Cancelled),
            guard = slot.lock_owned() => guard,
        };

        let cooldown = self.config.cooldown(&key);
        let ready_at = last_sent.map(|at| at + cooldown);
        let waited = ready_at
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO);

        if let Some(ready_at) = ready_at.filter(|_| !waited.is_zero()) {
            trace!(?key, wait_ms = waited.as_millis() as u64, "waiting out cooldown");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ThrottleError::Cancelled),
                _ = time::sleep_until(ready_at) => {}
            }
        }

        Ok(CooldownPermit { last_sent, waited })
    }

    /// When `key` was last recorded, if it has been and nobody currently
    /// holds its permit.
    pub fn last_sent(&self, key: &K) -> Option<Instant> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(key)?;
        slot.try_lock().ok().and_then(|guard| *guard)
    }
}

impl<K> fmt::Debug for RateLimiter<K>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_falls_back_to_default() {
        let config =
            CooldownConfig::uniform(Duration::from_millis(500)).with("say", Duration::from_secs(1));
        assert_eq!(config.cooldown(&"say"), Duration::from_secs(1));
        assert_eq!(config.cooldown(&"emote"), Duration::from_millis(500));
    }

    #[test]
    fn test_validated_clamps_long_cooldowns() {
        let config = CooldownConfig::uniform(Duration::from_secs(600))
            .with(1u8, Duration::from_secs(90))
            .with(2u8, Duration::from_secs(2))
            .validated();
        assert_eq!(config.default, CooldownConfig::<u8>::MAX_COOLDOWN);
        assert_eq!(config.cooldown(&1), CooldownConfig::<u8>::MAX_COOLDOWN);
        assert_eq!(config.cooldown(&2), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(CooldownConfig::uniform(Duration::from_secs(1)));
        let start = Instant::now();

        let permit = limiter.acquire("say", &CancellationToken::new()).await.unwrap();

        assert_eq!(permit.waited(), Duration::ZERO);
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecorded_permit_does_not_start_cooldown() {
        let limiter = RateLimiter::new(CooldownConfig::uniform(Duration::from_secs(1)));
        let cancel = CancellationToken::new();

        drop(limiter.acquire("say", &cancel).await.unwrap());
        let start = Instant::now();
        let permit = limiter.acquire("say", &cancel).await.unwrap();

        assert_eq!(permit.waited(), Duration::ZERO);
        assert_eq!(Instant::now(), start);
        assert_eq!(limiter.last_sent(&"say"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorded_permit_delays_next_acquire() {
        let limiter = RateLimiter::new(CooldownConfig::uniform(Duration::from_secs(1)));
        let cancel = CancellationToken::new();

        limiter.acquire("say", &cancel).await.unwrap().record();
        let start = Instant::now();
        let permit = limiter.acquire("say", &cancel).await.unwrap();

        assert_eq!(Instant::now() - start, Duration::from_secs(1));
        assert_eq!(permit.waited(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_fails_fast() {
        let limiter: RateLimiter<&str> = RateLimiter::new(CooldownConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = limiter.acquire("say", &cancel).await;

        assert_eq!(result.unwrap_err(), ThrottleError::Cancelled);
    }
}

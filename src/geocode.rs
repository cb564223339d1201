//! Geocode cache: the only path from the optimizer to the geocoding provider.
//!
//! Entries are keyed by a hash of the trimmed, lower-cased address, so
//! addresses differing only in case or surrounding whitespace share one
//! entry. Both matches and misses are cached; an address the provider could
//! not resolve is not retried on later calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GeocodeConfig;
use crate::error::{GeocodeError, ProviderError, StorageError};
use crate::model::Coordinate;
use crate::traits::{GeocodeRepository, Geocoder};

/// A cached geocoding outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeCacheEntry {
    pub key: String,
    pub address: String,
    pub coordinate: Coordinate,
    pub valid: bool,
    pub attempts: u32,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeocacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub invalid_entries: usize,
    pub total_attempts: u64,
}

/// Cache key for an address: hex blake3 of the trimmed, lower-cased text.
pub fn cache_key(address: &str) -> String {
    let normalized = address.trim().to_lowercase();
    blake3::hash(normalized.as_bytes()).to_hex().to_string()
}

/// Spaces the starts of provider calls at least `interval` apart.
///
/// The lock is held while sleeping, so concurrent callers queue up behind
/// each other and the ceiling holds regardless of worker count.
#[derive(Debug)]
struct RateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    fn acquire(&self) {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            let now = Instant::now();
            if ready_at > now {
                thread::sleep(ready_at - now);
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Clone)]
pub struct GeocodeCache {
    geocoder: Arc<dyn Geocoder>,
    store: Arc<dyn GeocodeRepository>,
    config: GeocodeConfig,
    limiter: Arc<RateLimiter>,
    /// Worker pool for batch misses; `None` resolves them on the caller's thread.
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl GeocodeCache {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        store: Arc<dyn GeocodeRepository>,
        config: GeocodeConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(config.request_delay_ms)));
        let pool = (config.workers > 1)
            .then(|| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.workers)
                    .thread_name(|i| format!("geocode-{i}"))
                    .build()
            })
            .and_then(|built| match built {
                Ok(pool) => Some(Arc::new(pool)),
                Err(err) => {
                    warn!(error = %err, "geocode worker pool unavailable, resolving sequentially");
                    None
                }
            });

        Self {
            geocoder,
            store,
            config,
            limiter,
            pool,
        }
    }

    /// Resolves an address, consulting the provider only on a cache miss.
    ///
    /// A provider failure is cached as an unresolved entry and then reported
    /// as [`GeocodeError::Provider`]; later calls for the same address return
    /// the unresolved coordinate without touching the provider. A failed cache
    /// write is logged and the provider answer is returned anyway.
    pub fn resolve(&self, address: &str) -> Result<Coordinate, GeocodeError> {
        let key = cache_key(address);
        if let Some(entry) = self.store.get(&key)? {
            debug!(key = %key, valid = entry.valid, "geocode cache hit");
            return Ok(entry.coordinate);
        }

        debug!(key = %key, "geocode cache miss");
        self.lookup_and_store(key, address, None)
    }

    /// Forces a provider call and updates the existing entry in place.
    pub fn refresh(&self, address: &str) -> Result<Coordinate, GeocodeError> {
        let key = cache_key(address);
        let previous = self.store.get(&key)?;
        self.lookup_and_store(key, address, previous)
    }

    /// Resolves many addresses; failures come back as unresolved coordinates.
    ///
    /// The result is keyed by the addresses as given. Cache hits are served
    /// immediately; misses are rate limited and run on at most
    /// `config.workers` threads.
    pub fn resolve_batch(&self, addresses: &[String]) -> HashMap<String, Coordinate> {
        let mut resolved = HashMap::with_capacity(addresses.len());
        let mut misses: Vec<(String, String)> = Vec::new();
        let mut by_key: HashMap<String, Vec<String>> = HashMap::new();

        for address in addresses {
            let key = cache_key(address);
            if let Some(aliases) = by_key.get_mut(&key) {
                aliases.push(address.clone());
                continue;
            }
            by_key.insert(key.clone(), vec![address.clone()]);

            match self.store.get(&key) {
                Ok(Some(entry)) => {
                    resolved.insert(address.clone(), entry.coordinate);
                }
                Ok(None) => misses.push((key, address.clone())),
                Err(err) => {
                    warn!(error = %err, "geocode cache read failed, treating as miss");
                    misses.push((key, address.clone()));
                }
            }
        }

        if !misses.is_empty() {
            debug!(
                misses = misses.len(),
                workers = self.config.workers,
                "resolving geocode misses"
            );
            resolved.extend(self.resolve_misses(misses));
        }

        for aliases in by_key.values() {
            let Some(coordinate) = aliases.iter().find_map(|a| resolved.get(a)).cloned() else {
                continue;
            };
            for alias in aliases {
                resolved
                    .entry(alias.clone())
                    .or_insert_with(|| coordinate.clone());
            }
        }

        resolved
    }

    pub fn stats(&self) -> Result<GeocacheStats, StorageError> {
        let entries = self.store.entries()?;
        let valid_entries = entries.iter().filter(|entry| entry.valid).count();
        Ok(GeocacheStats {
            total_entries: entries.len(),
            valid_entries,
            invalid_entries: entries.len() - valid_entries,
            total_attempts: entries.iter().map(|entry| u64::from(entry.attempts)).sum(),
        })
    }

    pub fn clear(&self) -> Result<usize, StorageError> {
        self.store.clear()
    }

    fn resolve_misses(&self, misses: Vec<(String, String)>) -> Vec<(String, Coordinate)> {
        let run = |(key, address): (String, String)| {
            let coordinate = match self.lookup_and_store(key, &address, None) {
                Ok(coordinate) => coordinate,
                Err(err) => {
                    warn!(error = %err, "geocoding failed, continuing unresolved");
                    Coordinate::unresolved()
                }
            };
            (address, coordinate)
        };

        match &self.pool {
            Some(pool) => pool.install(|| misses.into_par_iter().map(run).collect()),
            None => misses.into_iter().map(run).collect(),
        }
    }

    fn lookup_and_store(
        &self,
        key: String,
        address: &str,
        previous: Option<GeocodeCacheEntry>,
    ) -> Result<Coordinate, GeocodeError> {
        let (outcome, calls) = self.call_provider(address);
        let attempts = previous.map(|entry| entry.attempts).unwrap_or(0) + calls;

        let coordinate = match &outcome {
            Ok(Some(coordinate)) => Coordinate {
                valid: true,
                ..coordinate.clone()
            },
            Ok(None) | Err(_) => Coordinate::unresolved(),
        };

        let entry = GeocodeCacheEntry {
            key,
            address: address.to_string(),
            coordinate: coordinate.clone(),
            valid: coordinate.valid,
            attempts,
            resolved_at: Utc::now(),
        };
        // The provider answer stands even if it cannot be remembered.
        if let Err(err) = self.store.put(entry) {
            warn!(error = %err, valid = coordinate.valid, "geocode cache write failed");
        }

        match outcome {
            Ok(_) => Ok(coordinate),
            Err(source) => Err(GeocodeError::Provider {
                address: address.to_string(),
                source,
            }),
        }
    }

    /// Calls the provider, retrying failures `provider_retries` times.
    fn call_provider(&self, address: &str) -> (Result<Option<Coordinate>, ProviderError>, u32) {
        let mut calls = 0;
        loop {
            self.limiter.acquire();
            calls += 1;
            match self.geocoder.geocode(address) {
                Err(err) if calls <= self.config.provider_retries => {
                    warn!(attempt = calls, error = %err, "geocoding provider failed, retrying");
                    thread::sleep(Duration::from_millis(
                        self.config.retry_backoff_ms * u64::from(calls),
                    ));
                }
                outcome => return (outcome, calls),
            }
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Price Feed
//!
//! Spot USD prices from CoinGecko's `simple/price` endpoint, cached per
//! token id with a TTL.
//!
//! Price failures are not user-facing: they are logged and the price stays
//! unknown, which [`usd_value`] renders as `0.0`.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use alloy::primitives::U256;
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;

use crate::chain::wei_to_ether;
use crate::error::ClientError;

pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const COINGECKO_API_KEY_HEADER: &str = "x-cg-demo-api-key";
pub const ETHEREUM_TOKEN_ID: &str = "ethereum";

const DEFAULT_CACHE_CAPACITY: usize = 32;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn usd_price(&self, token_id: &str) -> Result<f64, ClientError>;
}

pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(api_key: Option<String>) -> Result<Self, ClientError> {
        Self::with_base_url(COINGECKO_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoClient {
    async fn usd_price(&self, token_id: &str) -> Result<f64, ClientError> {
        let mut request = self
            .http
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", token_id), ("vs_currencies", "usd")]);
        if let Some(key) = &self.api_key {
            request = request.header(COINGECKO_API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Remote {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        body.get(token_id)
            .and_then(|t| t.get("usd"))
            .and_then(Value::as_f64)
            .ok_or_else(|| ClientError::NotFound(format!("no USD price for {token_id}")))
    }
}

// =============================================================================
// Cache
// =============================================================================

struct CacheEntry {
    price: f64,
    inserted_at: Instant,
}

/// LRU + TTL cache in front of a [`PriceFeed`].
pub struct CachedPriceFeed<F> {
    inner: F,
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl<F: PriceFeed> CachedPriceFeed<F> {
    pub fn new(inner: F) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }

    pub fn with_capacity(inner: F, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn cached(&self, token_id: &str) -> Option<f64> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(token_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.price);
            }
            cache.pop(token_id);
        }
        None
    }

    /// Price for `token_id`, or `None` when the feed fails.
    pub async fn price(&self, token_id: &str) -> Option<f64> {
        if let Some(price) = self.cached(token_id) {
            return Some(price);
        }

        match self.inner.usd_price(token_id).await {
            Ok(price) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(
                        token_id.to_string(),
                        CacheEntry {
                            price,
                            inserted_at: Instant::now(),
                        },
                    );
                }
                Some(price)
            }
            Err(e) => {
                tracing::warn!(token_id, error = %e, "Price fetch failed");
                None
            }
        }
    }
}

/// USD value of a wei balance; `0.0` when the price is unknown or not finite.
pub fn usd_value(balance_wei: U256, price: Option<f64>) -> f64 {
    match price {
        Some(price) if price.is_finite() => {
            let value = wei_to_ether(balance_wei) * price;
            if value.is_finite() {
                value
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

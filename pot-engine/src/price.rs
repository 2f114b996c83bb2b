//! Entry Price Book
//!
//! The running entry price lives here and in the ledger as a date-stamped
//! value. A refresh on a day that already has a stamp reuses it; otherwise
//! a USD quote is fetched and converted.

use async_trait::async_trait;
use chrono::NaiveDate;
use pot_core::pricing::{entry_price_from_usd, USD_QUOTE_SCALE};
use pot_core::PriceStamp;
use pot_store::LedgerStore;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::notify::Notifier;

const QUOTE_DECIMALS: u32 = 8;

/// Coin/USD quote provider
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD per coin, scaled by 1e8
    async fn coin_usd(&self) -> EngineResult<u64>;
}

/// Fixed quote
#[derive(Debug, Clone, Copy)]
pub struct StaticPriceSource(pub u64);

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn coin_usd(&self) -> EngineResult<u64> {
        Ok(self.0)
    }
}

#[derive(Debug, Deserialize)]
struct Ticker {
    success: bool,
    #[serde(default)]
    price: String,
}

/// TradeOgre ticker quote (USDT-BTC × BTC-XMR)
pub struct TradeOgreSource {
    client: Client,
    base_url: String,
}

impl TradeOgreSource {
    pub const DEFAULT_URL: &'static str = "https://tradeogre.com/api/v1/ticker";

    pub fn new() -> EngineResult<Self> {
        Self::with_base_url(Self::DEFAULT_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn ticker(&self, market: &str) -> EngineResult<u64> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), market);
        let ticker: Ticker = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::PriceUnavailable(format!("{}: {}", market, e)))?
            .json()
            .await
            .map_err(|e| EngineError::PriceUnavailable(format!("{}: {}", market, e)))?;
        if !ticker.success {
            return Err(EngineError::PriceUnavailable(format!("{}: market returned no price", market)));
        }
        scaled_quote(&ticker.price, QUOTE_DECIMALS)
            .ok_or_else(|| EngineError::PriceUnavailable(format!("{}: bad price {:?}", market, ticker.price)))
    }
}

#[async_trait]
impl PriceSource for TradeOgreSource {
    async fn coin_usd(&self) -> EngineResult<u64> {
        let btc_usd = self.ticker("USDT-BTC").await?;
        let coin_btc = self.ticker("BTC-XMR").await?;
        let quote = btc_usd as u128 * coin_btc as u128 / USD_QUOTE_SCALE as u128;
        debug!(btc_usd, coin_btc, quote, "Fetched USD quote");
        u64::try_from(quote).map_err(|_| EngineError::PriceUnavailable(format!("quote overflow: {}", quote)))
    }
}

/// Convert a quoted decimal price into an integer scaled by 10^decimals.
/// Extra fractional digits are truncated.
pub fn scaled_quote(raw: &str, decimals: u32) -> Option<u64> {
    let price: Decimal = raw.trim().parse().ok()?;
    if price.is_sign_negative() {
        return None;
    }
    price
        .checked_mul(Decimal::from(10u64.pow(decimals)))?
        .trunc()
        .to_u64()
}

/// Running entry price
pub struct PriceBook {
    source: Arc<dyn PriceSource>,
    store: LedgerStore,
    notifier: Notifier,
    current: AtomicU64,
    refresh_lock: Mutex<()>,
}

impl PriceBook {
    /// Create a book primed with the last persisted price, if any
    pub fn new(source: Arc<dyn PriceSource>, store: LedgerStore, notifier: Notifier) -> EngineResult<Self> {
        let current = store.current_price()?.map(|s| s.price).unwrap_or(0);
        Ok(Self {
            source,
            store,
            notifier,
            current: AtomicU64::new(current),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Current price in atomic units, `None` before the first refresh
    pub fn current(&self) -> Option<u64> {
        match self.current.load(Ordering::SeqCst) {
            0 => None,
            price => Some(price),
        }
    }

    /// Make sure the price is stamped for `today`
    pub async fn refresh(&self, today: NaiveDate) -> EngineResult<u64> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(stamp) = self.store.current_price()? {
            if stamp.is_current(today) && stamp.price > 0 {
                self.current.store(stamp.price, Ordering::SeqCst);
                debug!(price = stamp.price, "Entry price already current");
                return Ok(stamp.price);
            }
        }

        let quote = self.source.coin_usd().await?;
        let price = entry_price_from_usd(quote)?;
        self.store.set_current_price(&PriceStamp::new(today, price))?;
        self.current.store(price, Ordering::SeqCst);
        self.notifier.price_changed(price);

        info!(%today, quote, price, "Entry price updated");
        Ok(price)
    }

    /// The current price, refreshing first if none has been set
    pub async fn ensure(&self, today: NaiveDate) -> EngineResult<u64> {
        match self.current() {
            Some(price) => Ok(price),
            None => self.refresh(today).await,
        }
    }
}

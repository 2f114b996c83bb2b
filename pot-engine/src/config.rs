//! Engine Configuration
//!
//! Supports loading from environment variables with the POT_ prefix.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Length of a standard wallet address
pub const ADDRESS_LENGTH: usize = 95;

/// UTC wall-clock time for daily jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Parse `HH:MM`
    pub fn parse(s: &str) -> Option<Self> {
        let (hour, minute) = s.trim().split_once(':')?;
        let time = Self::new(hour.parse().ok()?, minute.parse().ok()?);
        time.is_valid().then_some(time)
    }

    pub fn is_valid(&self) -> bool {
        self.hour < 24 && self.minute < 60
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Transfer parameters used for payouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutParams {
    pub account_index: u64,
    pub priority: u64,
    pub mixin: u64,
    pub ring_size: u64,
    pub unlock_time: u64,
}

impl Default for PayoutParams {
    fn default() -> Self {
        Self {
            account_index: 0,
            priority: 0,
            mixin: 8,
            ring_size: 8,
            unlock_time: 10,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Production mode (slower polling, e-mail style alerts)
    pub production: bool,
    /// Root for the ledger, payout audit files and backups
    pub data_path: PathBuf,
    /// Receives the maintenance share
    pub maintenance_address: String,
    /// Receives the fund share; kept in the wallet when unset
    pub fund_address: Option<String>,
    /// Seconds between reconcile ticks
    pub reconcile_interval_secs: u64,
    /// Run the missed-transfer audit every N reconcile ticks
    pub audit_every_ticks: u64,
    /// Delay before retrying a failed draw or price refresh
    pub retry_delay_secs: u64,
    pub price_refresh_at: TimeOfDay,
    pub backup_at: TimeOfDay,
    pub backup_retention_days: i64,
    pub payout: PayoutParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl EngineConfig {
    fn for_mode(production: bool) -> Self {
        Self {
            production,
            data_path: PathBuf::from("./data"),
            maintenance_address: String::new(),
            fund_address: None,
            reconcile_interval_secs: if production { 30 } else { 10 },
            audit_every_ticks: if production { 120 } else { 2 },
            retry_delay_secs: 60,
            price_refresh_at: TimeOfDay::new(0, 40),
            backup_at: TimeOfDay::new(23, 30),
            backup_retention_days: 60,
            payout: PayoutParams::default(),
        }
    }

    /// Defaults for a production deployment
    pub fn production() -> Self {
        Self::for_mode(true)
    }

    /// Defaults for local development
    pub fn development() -> Self {
        Self::for_mode(false)
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - POT_PRODUCTION: Production mode (true/false)
    /// - POT_DATA_PATH: Data directory
    /// - POT_MAINTENANCE_ADDRESS: Maintenance payout address (required)
    /// - POT_FUND_ADDRESS: Fund payout address (optional)
    /// - POT_RECONCILE_INTERVAL: Seconds between reconcile ticks
    /// - POT_AUDIT_EVERY: Reconcile ticks between audits
    /// - POT_RETRY_DELAY: Seconds before retrying a failed draw
    /// - POT_PRICE_REFRESH_AT / POT_BACKUP_AT: Daily job times (HH:MM, UTC)
    /// - POT_BACKUP_RETENTION_DAYS: Days to keep backups
    pub fn from_env() -> Self {
        let production = env::var("POT_PRODUCTION")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(false);
        let defaults = Self::for_mode(production);

        Self {
            production,
            data_path: env::var("POT_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            maintenance_address: env::var("POT_MAINTENANCE_ADDRESS").unwrap_or_default(),
            fund_address: env::var("POT_FUND_ADDRESS").ok().filter(|s| !s.is_empty()),
            reconcile_interval_secs: env_parse("POT_RECONCILE_INTERVAL")
                .unwrap_or(defaults.reconcile_interval_secs),
            audit_every_ticks: env_parse("POT_AUDIT_EVERY").unwrap_or(defaults.audit_every_ticks),
            retry_delay_secs: env_parse("POT_RETRY_DELAY").unwrap_or(defaults.retry_delay_secs),
            price_refresh_at: env::var("POT_PRICE_REFRESH_AT")
                .ok()
                .and_then(|s| TimeOfDay::parse(&s))
                .unwrap_or(defaults.price_refresh_at),
            backup_at: env::var("POT_BACKUP_AT")
                .ok()
                .and_then(|s| TimeOfDay::parse(&s))
                .unwrap_or(defaults.backup_at),
            backup_retention_days: env_parse("POT_BACKUP_RETENTION_DAYS")
                .unwrap_or(defaults.backup_retention_days),
            payout: defaults.payout,
        }
    }

    pub fn with_maintenance_address(mut self, address: impl Into<String>) -> Self {
        self.maintenance_address = address.into();
        self
    }

    pub fn with_fund_address(mut self, address: impl Into<String>) -> Self {
        self.fund_address = Some(address.into());
        self
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Check required settings
    pub fn validate(&self) -> EngineResult<()> {
        if self.maintenance_address.len() != ADDRESS_LENGTH {
            return Err(EngineError::Configuration(format!(
                "maintenance address must be {} characters, got {}",
                ADDRESS_LENGTH,
                self.maintenance_address.len()
            )));
        }
        if let Some(fund) = &self.fund_address {
            if fund.len() != ADDRESS_LENGTH {
                return Err(EngineError::Configuration(format!(
                    "fund address must be {} characters, got {}",
                    ADDRESS_LENGTH,
                    fund.len()
                )));
            }
        }
        if self.reconcile_interval_secs == 0 || self.audit_every_ticks == 0 {
            return Err(EngineError::Configuration(
                "reconcile interval and audit cadence must be positive".to_string(),
            ));
        }
        if !self.price_refresh_at.is_valid() || !self.backup_at.is_valid() {
            return Err(EngineError::Configuration("invalid time of day".to_string()));
        }
        if self.backup_retention_days <= 0 {
            return Err(EngineError::Configuration(
                "backup retention must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_path.join("ledger")
    }

    /// Directory of the per-month payout audit files
    pub fn transfers_dir(&self) -> PathBuf {
        self.data_path.join("transfers")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_path.join("backups")
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

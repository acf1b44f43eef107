//! Rate tables and tier configuration.
//!
//! A [`RateTable`] pairs the global [`SystemConfig`] (rates, fees,
//! multipliers) with the per-tier commission table.  Rate tables are
//! versioned and stored externally as JSON files; every price records
//! the version it was computed from.

use crate::error::{PricingError, Result};
use crate::models::{Money, WorkerTier};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_slope_multiplier() -> Decimal {
    dec!(1.15)
}

/// Global rates applied to every job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Version tag, e.g. `"default-v1"` or `"2025-03"`.
    pub version: String,
    /// Ordering key between tables; the highest revision is the active
    /// one unless a version is pinned.
    #[serde(default)]
    pub revision: u32,
    pub base_price_per_sqm: Money,
    /// Worker pay never falls below `estimated hours × min_hourly_rate`.
    pub min_hourly_rate: Money,
    pub travel_base_fee: Money,
    pub tall_grass_multiplier: Decimal,
    pub difficult_access_fee: Money,
    /// Older tables predate this field; they get the historical 15%.
    #[serde(default = "default_slope_multiplier")]
    pub slope_multiplier: Decimal,
    /// Fraction of the platform fee charged as tax.
    pub tax_percentage: Decimal,
    /// Fraction of the total charged on late cancellation.
    pub cancel_penalty_percentage: Decimal,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            version: "default-v1".to_string(),
            revision: 1,
            base_price_per_sqm: dec!(150),
            min_hourly_rate: dec!(6000),
            travel_base_fee: dec!(1500),
            tall_grass_multiplier: dec!(1.30),
            difficult_access_fee: dec!(2000),
            slope_multiplier: default_slope_multiplier(),
            tax_percentage: dec!(0.21),
            cancel_penalty_percentage: dec!(0.30),
        }
    }
}

fn check_fraction(name: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(PricingError::invalid_system(format!(
            "{name} must lie in [0, 1), got {value}"
        )));
    }
    Ok(())
}

impl SystemConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(PricingError::invalid_system("version must not be empty"));
        }
        let amounts = [
            ("base_price_per_sqm", self.base_price_per_sqm),
            ("min_hourly_rate", self.min_hourly_rate),
            ("travel_base_fee", self.travel_base_fee),
            ("difficult_access_fee", self.difficult_access_fee),
        ];
        for (name, value) in amounts {
            if value < Decimal::ZERO {
                return Err(PricingError::invalid_system(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        let multipliers = [
            ("tall_grass_multiplier", self.tall_grass_multiplier),
            ("slope_multiplier", self.slope_multiplier),
        ];
        for (name, value) in multipliers {
            if value < Decimal::ONE {
                return Err(PricingError::invalid_system(format!(
                    "{name} must be at least 1, got {value}"
                )));
            }
        }
        check_fraction("tax_percentage", self.tax_percentage)?;
        check_fraction("cancel_penalty_percentage", self.cancel_penalty_percentage)?;
        Ok(())
    }
}

/// Commission and threshold for one worker tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Reputation points required to hold the tier.
    pub min_points: u64,
    /// Fraction of the client's pre-tax total retained by the platform.
    pub commission_fee: Decimal,
}

impl TierConfig {
    pub fn check_commission(&self, tier: WorkerTier) -> Result<()> {
        check_commission_fee(tier, self.commission_fee)
    }
}

/// Commission must leave something for the worker: `f` in [0, 1).
pub fn check_commission_fee(tier: WorkerTier, commission_fee: Decimal) -> Result<()> {
    if commission_fee < Decimal::ZERO || commission_fee >= Decimal::ONE {
        return Err(PricingError::invalid_tier(format!(
            "{tier} commission_fee must lie in [0, 1), got {commission_fee}"
        )));
    }
    Ok(())
}

/// One [`TierConfig`] per [`WorkerTier`].  Lookup is total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct TierTable {
    pub starter: TierConfig,
    pub pro: TierConfig,
    pub elite: TierConfig,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            starter: TierConfig { min_points: 0, commission_fee: dec!(0.25) },
            pro: TierConfig { min_points: 500, commission_fee: dec!(0.20) },
            elite: TierConfig { min_points: 2000, commission_fee: dec!(0.15) },
        }
    }
}

impl TierTable {
    pub fn get(&self, tier: WorkerTier) -> &TierConfig {
        match tier {
            WorkerTier::Starter => &self.starter,
            WorkerTier::Pro => &self.pro,
            WorkerTier::Elite => &self.elite,
        }
    }

    /// Highest tier whose `min_points` is met; `Starter` otherwise.
    pub fn tier_for_points(&self, points: u64) -> WorkerTier {
        WorkerTier::DESCENDING
            .into_iter()
            .find(|tier| points >= self.get(*tier).min_points)
            .unwrap_or(WorkerTier::Starter)
    }

    /// Commissions in [0, 1) and strictly decreasing with rank;
    /// thresholds strictly increasing with rank.
    pub fn validate(&self) -> Result<()> {
        for tier in WorkerTier::DESCENDING {
            self.get(tier).check_commission(tier)?;
        }
        let ranked = [WorkerTier::Starter, WorkerTier::Pro, WorkerTier::Elite];
        for pair in ranked.windows(2) {
            let (lower, higher) = (self.get(pair[0]), self.get(pair[1]));
            if higher.commission_fee >= lower.commission_fee {
                return Err(PricingError::invalid_tier(format!(
                    "{} commission ({}) must be below {} commission ({})",
                    pair[1], higher.commission_fee, pair[0], lower.commission_fee
                )));
            }
            if higher.min_points <= lower.min_points {
                return Err(PricingError::invalid_tier(format!(
                    "{} min_points ({}) must exceed {} min_points ({})",
                    pair[1], higher.min_points, pair[0], lower.min_points
                )));
            }
        }
        Ok(())
    }
}

/// The unit handed out by a configuration provider, so a single
/// calculation never mixes rates from two versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub system: SystemConfig,
    pub tiers: TierTable,
}

impl RateTable {
    pub fn version(&self) -> &str {
        &self.system.version
    }

    pub fn validate(&self) -> Result<()> {
        self.system.validate()?;
        self.tiers.validate()
    }
}

/// Load all rate tables from a directory.
///
/// Every `.json` file is parsed as a [`RateTable`] and validated.
/// Files that fail either step are skipped with a warning.  A missing
/// directory yields an empty vector.
pub fn load_rate_tables_from_dir(path: &Path) -> Result<Vec<RateTable>> {
    let mut tables = Vec::new();
    if !path.is_dir() {
        return Ok(tables);
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file = entry.path();
        if !entry.file_type()?.is_file() || file.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let data = std::fs::read_to_string(&file)?;
        let table = match serde_json::from_str::<RateTable>(&data) {
            Ok(table) => table,
            Err(err) => {
                tracing::warn!(file = %file.display(), error = %err, "failed to parse rate table");
                continue;
            }
        };
        if let Err(err) = table.validate() {
            tracing::warn!(file = %file.display(), error = %err, "rejecting invalid rate table");
            continue;
        }
        tracing::debug!(file = %file.display(), version = table.version(), "loaded rate table");
        tables.push(table);
    }
    Ok(tables)
}

/// Pick `version` if given, else the table with the highest revision.
///
/// Two tables sharing the highest revision cannot be ordered and are
/// reported as unavailable until one is pinned.
pub fn select_rate_table(tables: Vec<RateTable>, version: Option<&str>) -> Result<RateTable> {
    if let Some(wanted) = version {
        return tables
            .into_iter()
            .find(|t| t.version() == wanted)
            .ok_or_else(|| PricingError::ConfigUnavailable(format!("rate table version {wanted} not found")));
    }
    let latest = tables
        .iter()
        .map(|t| t.system.revision)
        .max()
        .ok_or_else(|| PricingError::ConfigUnavailable("no rate tables found".to_string()))?;
    let mut candidates: Vec<RateTable> = tables.into_iter().filter(|t| t.system.revision == latest).collect();
    if candidates.len() > 1 {
        let versions: Vec<&str> = candidates.iter().map(RateTable::version).collect();
        return Err(PricingError::ConfigUnavailable(format!(
            "rate tables {} share revision {latest}; pin a version",
            versions.join(", ")
        )));
    }
    Ok(candidates.remove(0))
}

//! Data models for the Pricing Engine.
//!
//! The `models` module defines the serialisable job inputs and price
//! outputs exchanged between the engine, the HTTP layer and whatever
//! persists a job alongside its quote.  Monetary values are exact
//! [`Decimal`]s expressed in whole currency units once rounded.

use crate::error::{PricingError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency amount.  Rounded amounts carry no fractional part.
pub type Money = Decimal;

/// A worker's standing level.  Higher tiers pay a lower platform
/// commission.  Variants are declared in rank order so the derived
/// `Ord` matches tier ordering (`Starter < Pro < Elite`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerTier {
    #[default]
    Starter,
    Pro,
    Elite,
}

impl WorkerTier {
    /// All tiers, highest rank first.
    pub const DESCENDING: [WorkerTier; 3] = [WorkerTier::Elite, WorkerTier::Pro, WorkerTier::Starter];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerTier::Starter => "STARTER",
            WorkerTier::Pro => "PRO",
            WorkerTier::Elite => "ELITE",
        }
    }
}

impl fmt::Display for WorkerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Site conditions flagged on a job request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurchargeOptions {
    /// Overgrown vegetation.
    #[serde(default)]
    pub has_high_weeds: bool,
    #[serde(default)]
    pub complicated_access: bool,
    #[serde(default)]
    pub has_slope: bool,
}

/// Physical and contextual attributes of a job.
///
/// `ai_estimated_hours` and `ai_difficulty_multiplier` come from an
/// external estimation step; the engine only consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAttributes {
    pub square_meters: Decimal,
    pub ai_estimated_hours: Decimal,
    pub ai_difficulty_multiplier: Decimal,
    #[serde(default)]
    pub options: SurchargeOptions,
}

impl JobAttributes {
    pub const MIN_DIFFICULTY: Decimal = dec!(1.0);
    pub const MAX_DIFFICULTY: Decimal = dec!(2.0);

    pub fn new(square_meters: Decimal, ai_estimated_hours: Decimal, ai_difficulty_multiplier: Decimal) -> Self {
        Self {
            square_meters,
            ai_estimated_hours,
            ai_difficulty_multiplier,
            options: SurchargeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SurchargeOptions) -> Self {
        self.options = options;
        self
    }

    /// Reject attributes that would produce a meaningless price.
    pub fn validate(&self) -> Result<()> {
        if self.square_meters <= Decimal::ZERO {
            return Err(PricingError::invalid_job(format!(
                "square_meters must be positive, got {}",
                self.square_meters
            )));
        }
        if self.ai_estimated_hours <= Decimal::ZERO {
            return Err(PricingError::invalid_job(format!(
                "ai_estimated_hours must be positive, got {}",
                self.ai_estimated_hours
            )));
        }
        if self.ai_difficulty_multiplier < Self::MIN_DIFFICULTY
            || self.ai_difficulty_multiplier > Self::MAX_DIFFICULTY
        {
            return Err(PricingError::invalid_job(format!(
                "ai_difficulty_multiplier must lie in [{}, {}], got {}",
                Self::MIN_DIFFICULTY,
                Self::MAX_DIFFICULTY,
                self.ai_difficulty_multiplier
            )));
        }
        Ok(())
    }
}

/// An adjustment applied to the base pay, in application order.
#[derive(Debug, Clone, PartialEq)]
pub enum Surcharge {
    /// Base pay raised to `hours × min_hourly_rate`.
    HourlyFloor,
    HighWeeds { multiplier: Decimal },
    DifficultAccess { fee: Money },
    Slope { multiplier: Decimal },
}

fn percent_over_one(multiplier: Decimal) -> Decimal {
    ((multiplier - Decimal::ONE) * dec!(100)).normalize()
}

impl fmt::Display for Surcharge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surcharge::HourlyFloor => f.write_str("Ajuste por Mínimo Horario"),
            Surcharge::HighWeeds { multiplier } => {
                write!(f, "Pasto Alto (+{}%)", percent_over_one(*multiplier))
            }
            Surcharge::DifficultAccess { fee } => write!(f, "Acceso Difícil (+${})", fee.normalize()),
            Surcharge::Slope { multiplier } => write!(f, "Pendiente (+{}%)", percent_over_one(*multiplier)),
        }
    }
}

/// Audit record stored with a job for dispute resolution.  Never
/// recomputed once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationSnapshot {
    /// `base_price_per_sqm` of the rate table used.
    pub base_rate: Money,
    pub difficulty_multiplier: Decimal,
    pub applied_surcharges: Vec<String>,
    pub config_version: String,
    pub worker_tier_applied: WorkerTier,
    pub commission_fee: Decimal,
}

/// Price of a job as quoted to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Amount charged to the client, taxes included.
    pub total: Money,
    /// Amount guaranteed to the worker.
    pub worker_net: Money,
    pub platform_fee: Money,
    /// Tax levied on `platform_fee` only.
    pub taxes: Money,
    pub calculation_snapshot: CalculationSnapshot,
}

impl PriceBreakdown {
    /// Client-facing total before taxes (`worker_net + platform_fee`).
    pub fn pre_tax_total(&self) -> Money {
        self.worker_net + self.platform_fee
    }
}

/// Additive charge for hours worked beyond the original quote.  The
/// original [`PriceBreakdown`] is left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    pub extra_hours: Decimal,
    pub total: Money,
    pub worker_net: Money,
    pub platform_fee: Money,
    pub taxes: Money,
    pub config_version: String,
    pub worker_tier_applied: WorkerTier,
}

/// A single job to be priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub job: JobAttributes,
    #[serde(default)]
    pub worker_tier: WorkerTier,
}

/// Outcome of one request within a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteOutcome {
    Breakdown(PriceBreakdown),
    Error(String),
}

//! Job pricing engine.
//!
//! The `engine` module turns [`JobAttributes`] and a worker tier into a
//! [`PriceBreakdown`].  The calculation itself is pure: [`price_job`]
//! depends only on its arguments, and [`PricingEngine`] merely pulls a
//! rate-table snapshot from its [`ConfigProvider`] before delegating.
//!
//! Amounts are rounded to whole currency units (half away from zero)
//! at exactly three points: worker net pay, the commission-inclusive
//! pre-tax total, and taxes.  Moving a rounding point changes results
//! by a unit here and there, which matters for reconciliation.

use crate::config::{check_commission_fee, RateTable, SystemConfig};
use crate::error::{PricingError, Result};
use crate::models::{
    CalculationSnapshot, JobAttributes, Money, PriceAdjustment, PriceBreakdown, QuoteOutcome, QuoteRequest,
    Surcharge, WorkerTier,
};
use crate::provider::ConfigProvider;
use rayon::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round to a whole currency unit, half up.
pub fn round_currency(amount: Decimal) -> Money {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Unwrap a checked decimal operation, reporting overflow as bad input.
fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| PricingError::invalid_job(format!("{what} overflows the supported currency range")))
}

/// Worker pay split into what the platform and the tax authority add
/// on top of it.
struct Commission {
    pre_tax_total: Money,
    platform_fee: Money,
    taxes: Money,
}

impl Commission {
    fn total(&self) -> Result<Money> {
        checked(self.pre_tax_total.checked_add(self.taxes), "total")
    }
}

/// Gross a rounded worker payout up so that the platform keeps exactly
/// `commission_fee` of the client's pre-tax total, then tax the
/// platform's share.
fn apply_commission(worker_net: Money, tier: WorkerTier, commission_fee: Decimal, system: &SystemConfig) -> Result<Commission> {
    check_commission_fee(tier, commission_fee)?;
    let pre_tax_total = round_currency(checked(
        worker_net.checked_div(Decimal::ONE - commission_fee),
        "pre-tax total",
    )?);
    let platform_fee = pre_tax_total - worker_net;
    let taxes = round_currency(checked(platform_fee.checked_mul(system.tax_percentage), "taxes")?);
    Ok(Commission {
        pre_tax_total,
        platform_fee,
        taxes,
    })
}

/// Price a job against an explicit rate table.
pub fn price_job(job: &JobAttributes, tier: WorkerTier, table: &RateTable) -> Result<PriceBreakdown> {
    job.validate()?;
    let system = &table.system;
    let tier_config = table.tiers.get(tier);

    let mut surcharges = Vec::new();
    let mut base_pay = checked(
        job.square_meters
            .checked_mul(system.base_price_per_sqm)
            .and_then(|pay| pay.checked_mul(job.ai_difficulty_multiplier)),
        "area pay",
    )?;

    let hourly_floor = checked(job.ai_estimated_hours.checked_mul(system.min_hourly_rate), "hourly floor")?;
    if hourly_floor > base_pay {
        base_pay = hourly_floor;
        surcharges.push(Surcharge::HourlyFloor);
    }

    // Order is part of the price: multipliers compound on whatever came before.
    if job.options.has_high_weeds {
        base_pay = checked(base_pay.checked_mul(system.tall_grass_multiplier), "high weeds surcharge")?;
        surcharges.push(Surcharge::HighWeeds {
            multiplier: system.tall_grass_multiplier,
        });
    }
    if job.options.complicated_access {
        base_pay = checked(base_pay.checked_add(system.difficult_access_fee), "access surcharge")?;
        surcharges.push(Surcharge::DifficultAccess {
            fee: system.difficult_access_fee,
        });
    }
    if job.options.has_slope {
        base_pay = checked(base_pay.checked_mul(system.slope_multiplier), "slope surcharge")?;
        surcharges.push(Surcharge::Slope {
            multiplier: system.slope_multiplier,
        });
    }

    base_pay = checked(base_pay.checked_add(system.travel_base_fee), "travel fee")?;

    let worker_net = round_currency(base_pay);
    let commission = apply_commission(worker_net, tier, tier_config.commission_fee, system)?;

    let breakdown = PriceBreakdown {
        total: commission.total()?,
        worker_net,
        platform_fee: commission.platform_fee,
        taxes: commission.taxes,
        calculation_snapshot: CalculationSnapshot {
            base_rate: system.base_price_per_sqm,
            difficulty_multiplier: job.ai_difficulty_multiplier,
            applied_surcharges: surcharges.iter().map(ToString::to_string).collect(),
            config_version: system.version.clone(),
            worker_tier_applied: tier,
            commission_fee: tier_config.commission_fee,
        },
    };
    tracing::debug!(
        config_version = %system.version,
        %tier,
        worker_net = %breakdown.worker_net,
        platform_fee = %breakdown.platform_fee,
        taxes = %breakdown.taxes,
        total = %breakdown.total,
        "priced job"
    );
    Ok(breakdown)
}

/// Penalty charged when a client cancels late.
pub fn cancellation_fee(total_price: Money, system: &SystemConfig) -> Result<Money> {
    if total_price < Decimal::ZERO {
        return Err(PricingError::invalid_job(format!(
            "total_price must be non-negative, got {total_price}"
        )));
    }
    let fee = checked(total_price.checked_mul(system.cancel_penalty_percentage), "cancellation fee")?;
    Ok(round_currency(fee))
}

/// Price extra hours on a job that has already been quoted.
///
/// The extra time is paid at the current hourly floor rate and grossed
/// up with the commission recorded in the original snapshot.
pub fn extra_time_adjustment(original: &PriceBreakdown, extra_hours: Decimal, table: &RateTable) -> Result<PriceAdjustment> {
    if extra_hours <= Decimal::ZERO {
        return Err(PricingError::invalid_job(format!(
            "extra_hours must be positive, got {extra_hours}"
        )));
    }
    let snapshot = &original.calculation_snapshot;
    if snapshot.config_version != table.version() {
        tracing::warn!(
            original_version = %snapshot.config_version,
            current_version = table.version(),
            "pricing extra time against a different rate table than the original quote"
        );
    }
    let tier = snapshot.worker_tier_applied;
    let worker_net = round_currency(checked(
        extra_hours.checked_mul(table.system.min_hourly_rate),
        "extra time pay",
    )?);
    let commission = apply_commission(worker_net, tier, snapshot.commission_fee, &table.system)?;
    Ok(PriceAdjustment {
        extra_hours,
        total: commission.total()?,
        worker_net,
        platform_fee: commission.platform_fee,
        taxes: commission.taxes,
        config_version: table.version().to_string(),
        worker_tier_applied: tier,
    })
}

/// Prices jobs against whatever rate table its provider currently
/// serves.
#[derive(Debug, Clone)]
pub struct PricingEngine<P> {
    provider: P,
}

impl<P: ConfigProvider> PricingEngine<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn calculate_service_price(&self, job: &JobAttributes, tier: WorkerTier) -> Result<PriceBreakdown> {
        price_job(job, tier, &self.provider.rate_table())
    }

    pub fn calculate_cancellation_fee(&self, total_price: Money) -> Result<Money> {
        cancellation_fee(total_price, &self.provider.rate_table().system)
    }

    pub fn calculate_tier_from_points(&self, points: u64) -> WorkerTier {
        self.provider.tier_for_points(points)
    }

    pub fn extra_time_adjustment(&self, original: &PriceBreakdown, extra_hours: Decimal) -> Result<PriceAdjustment> {
        extra_time_adjustment(original, extra_hours, &self.provider.rate_table())
    }

    /// Price many jobs in parallel.  All jobs see the same rate table;
    /// a failing job does not affect the others.
    pub fn quote_batch(&self, requests: Vec<QuoteRequest>) -> Vec<QuoteOutcome> {
        let table = self.provider.rate_table();
        requests
            .into_par_iter()
            .map(|request| match price_job(&request.job, request.worker_tier, &table) {
                Ok(breakdown) => QuoteOutcome::Breakdown(breakdown),
                Err(err) => QuoteOutcome::Error(err.to_string()),
            })
            .collect()
    }
}

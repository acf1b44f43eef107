//! Pricing Engine library crate.
//!
//! This crate exposes the job pricing engine, its rate-table
//! configuration and the HTTP API as reusable modules.  Applications
//! may call [`engine::price_job`] directly with a rate table, wrap a
//! [`provider::ConfigProvider`] in an [`engine::PricingEngine`], or embed
//! the API via [`api::build_router`].

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod settings;

pub use engine::{price_job, PricingEngine};
pub use error::{PricingError, Result};

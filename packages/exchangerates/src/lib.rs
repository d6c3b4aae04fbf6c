//! IMF exchange rates - Export agency exchange rate series as a flat CSV.
//!
//! This crate downloads exchange rate series from the IMF data service,
//! reconciles them against ISO currency and country reference data, and
//! writes a denormalized CSV plus two JSON currency snapshots.
//!
//! # Example
//!
//! ```
//! use imf_exchangerates::config;
//! use imf_exchangerates::period::normalize_date;
//! use imf_exchangerates::types::{RateSource, Target};
//!
//! // Source and target must describe the same series family
//! assert!(config::validate_parameters(RateSource::Ende, Target::Usd).is_ok());
//! assert!(config::validate_parameters(RateSource::Ense, Target::Usd).is_err());
//!
//! // Periods are stamped with their last calendar day
//! assert_eq!(normalize_date("2000-Q1").unwrap(), "2000-03-31");
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Constants, endpoints, backoff settings and validation
//! - [`types`]: Request parameters, series and output rows
//! - [`error`]: Error types and Result alias
//! - [`http`]: Rate-limited fetcher behind the [`http::Fetch`] trait
//! - [`xml`]: XML utilities
//! - [`reference`]: Country and currency reconciliation
//! - [`period`]: Period label normalization
//! - [`rates`]: Exchange rate decoding and row flattening
//! - [`writer`]: CSV and JSON output
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod period;
pub mod rates;
pub mod reference;
pub mod types;
pub mod writer;
pub mod xml;

// Re-export main functions
pub use rates::{get_exchange_rates, get_rates_and_country_data, write_data_for_country};
pub use writer::{write_countries_currencies, write_exchange_rates};

// Re-export commonly used items
pub use config::{validate_parameters, Backoff, Endpoints};
pub use error::{RatesError, Result};
pub use http::{Fetch, RateLimitedFetcher};
pub use reference::{OverrideTables, Reconciler};
pub use types::{Entity, Frequency, OutputRow, RateRequest, RateSource, Target};

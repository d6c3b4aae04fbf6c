//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use imf_exchangerates::config::{exchange_rate_url, Endpoints};
use imf_exchangerates::error::{RatesError, Result};
use imf_exchangerates::http::Fetch;
use imf_exchangerates::reference::{OverrideTables, Reconciler};
use imf_exchangerates::types::{Base, Entity, Frequency, RateSource, Target};

pub const MIRROR: &str = "http://fixtures.invalid";

/// Load fixture file content.
pub fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

/// Directory holding the shipped override tables.
pub fn overrides_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("source")
}

pub fn endpoints() -> Endpoints {
    Endpoints::with_root(MIRROR)
}

/// Data URL for a monthly USD series, as built by the pipeline.
pub fn monthly_url(entity: &Entity, source: RateSource, base: Base) -> String {
    exchange_rate_url(
        &endpoints().agency_data,
        Frequency::Monthly,
        source,
        Target::Usd,
        entity,
        base,
    )
}

/// Serves fixture files by URL and records every request.
#[derive(Default)]
pub struct FixtureFetcher {
    bodies: HashMap<String, String>,
    pub requests: Vec<String>,
}

impl FixtureFetcher {
    /// Fetcher serving the reference documents and the monthly ENDE/USD series.
    pub fn monthly() -> Self {
        let endpoints = endpoints();
        let usa = Entity::Code("USA".to_string());
        let g163 = Entity::Code("G163".to_string());

        Self::default()
            .with(&endpoints.iso_currencies, "iso_list_one.xml")
            .with(&endpoints.country_codelist, "country.json")
            .with(&endpoints.region_codelist, "region.json")
            .with(&endpoints.agency_codelist, "cl_country.json")
            .with(&monthly_url(&g163, RateSource::Ende, Base::Domestic), "er_g163.json")
            .with(&monthly_url(&Entity::All, RateSource::Ende, Base::Domestic), "er_all.json")
            .with(&monthly_url(&usa, RateSource::Ende, Base::Sdr), "er_usa_xdr.json")
    }

    pub fn with(mut self, url: &str, fixture: &str) -> Self {
        self.bodies.insert(url.to_string(), load_fixture(fixture));
        self
    }

    fn body(&mut self, url: &str) -> Result<String> {
        self.requests.push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| RatesError::decode("fixture", format!("no fixture for {url}")))
    }
}

impl Fetch for FixtureFetcher {
    fn fetch_json(&mut self, url: &str) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body(url)?)?)
    }

    fn fetch_xml(&mut self, url: &str) -> Result<String> {
        self.body(url)
    }
}

/// Reconciler built from the fixtures and the shipped override tables.
pub fn reconciler(fetcher: &mut FixtureFetcher) -> Reconciler {
    let overrides = OverrideTables::load(&overrides_dir()).expect("override tables load");
    Reconciler::fetch(fetcher, &endpoints(), overrides).expect("reference data reconciles")
}

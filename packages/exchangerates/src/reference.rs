//! Country and currency reference data reconciliation.
//!
//! Three vocabularies have to be joined: the ISO currency list is keyed by
//! upper-case country name, the country codelist by 2-letter code, and the
//! agency's series by 3-letter code. The join goes name → 2-letter code
//! first, then 3-letter → 2-letter code. Historical currencies, disputed
//! territories and spelling variants cannot be matched automatically and
//! come from the authored override tables.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use roxmltree::Document;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use unicode_normalization::UnicodeNormalization;

use crate::config::Endpoints;
use crate::error::{RatesError, Result};
use crate::http::Fetch;
use crate::types::CountryReference;
use crate::xml::{child_text, find_child, find_descendants};

/// Code of the agency's composite reserve-asset unit.
pub const SDR_CODE: &str = "XDR";

/// Display name injected for [`SDR_CODE`].
pub const SDR_DISPLAY_NAME: &str = "IMF Special Drawing Rights";

/// File name of the eurozone override table.
pub const EUROZONE_TABLE: &str = "eurozone.csv";

/// File name of the missing-country override table.
pub const MISSING_TABLE: &str = "missing.csv";

/// One authored correction row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OverrideRecord {
    pub country_name: String,
    pub country_code_2: String,
    pub country_code_3: Option<String>,
    pub currency_code: Option<String>,
}

/// Both override tables, loaded once per process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTables {
    /// Pre-euro national currencies and euro users outside the union.
    pub eurozone: Vec<OverrideRecord>,
    /// Countries whose names differ between the ISO list and the codelist.
    pub missing: Vec<OverrideRecord>,
}

impl OverrideTables {
    /// Load `eurozone.csv` and `missing.csv` from a directory.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            eurozone: read_table_file(&dir.join(EUROZONE_TABLE))?,
            missing: read_table_file(&dir.join(MISSING_TABLE))?,
        })
    }

    /// Parse both tables from in-memory CSV sources.
    pub fn from_readers(eurozone: impl Read, missing: impl Read) -> Result<Self> {
        Ok(Self {
            eurozone: read_table(eurozone)?,
            missing: read_table(missing)?,
        })
    }
}

fn read_table_file(path: &Path) -> Result<Vec<OverrideRecord>> {
    let file = std::fs::File::open(path).map_err(|e| RatesError::OverrideTable {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    read_table(file).map_err(|e| match e {
        RatesError::Csv(source) => RatesError::OverrideTable {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

fn read_table(reader: impl Read) -> Result<Vec<OverrideRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in reader.deserialize::<OverrideRecord>() {
        records.push(row?);
    }
    Ok(records)
}

/// `{data: [...]}` envelope of the public codelists.
#[derive(Debug, Deserialize)]
struct CodelistEnvelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CountryCode {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RegionCode {
    #[serde(rename = "iso-alpha-3-code")]
    alpha3: Option<String>,
    #[serde(rename = "iso-alpha-2-code")]
    alpha2: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgencyCodelistEnvelope {
    data: AgencyCodelistData,
}

#[derive(Debug, Deserialize)]
struct AgencyCodelistData {
    codelists: Vec<AgencyCodelist>,
}

#[derive(Debug, Deserialize)]
struct AgencyCodelist {
    #[serde(default)]
    codes: Vec<AgencyCode>,
}

#[derive(Debug, Deserialize)]
struct AgencyCode {
    id: String,
    name: String,
}

fn decode<T: DeserializeOwned>(context: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| RatesError::decode(context, e.to_string()))
}

/// Canonical form of a country name used as a join key.
///
/// # Examples
/// ```
/// use imf_exchangerates::reference::normalize_name;
///
/// assert_eq!(normalize_name(" Åland Islands"), "ÅLAND ISLANDS");
/// // Decomposed "A" + combining ring matches the composed form.
/// assert_eq!(normalize_name("A\u{30a}land Islands"), "ÅLAND ISLANDS");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.trim().nfc().collect::<String>().to_uppercase()
}

/// Parse the ISO currency list into `country name → currency code`.
///
/// Entries without a name or code, and fund currencies, are skipped. The
/// last entry for a name wins.
pub fn parse_names_to_currencies(xml: &str) -> Result<BTreeMap<String, String>> {
    let doc = Document::parse(xml)?;
    let mut names = BTreeMap::new();

    for entry in find_descendants(doc.root_element(), "CcyNtry") {
        let (Some(country), Some(currency)) =
            (child_text(entry, "CtryNm"), child_text(entry, "Ccy"))
        else {
            continue;
        };

        let is_fund = find_child(entry, "CcyNm")
            .and_then(|n| n.attribute("IsFund"))
            .is_some_and(|flag| !flag.eq_ignore_ascii_case("false"));
        if is_fund {
            continue;
        }

        names.insert(normalize_name(&country), currency);
    }

    Ok(names)
}

/// Parse the country codelist into `2-letter code → name`.
pub fn parse_code2_to_names(value: serde_json::Value) -> Result<BTreeMap<String, String>> {
    let envelope: CodelistEnvelope<CountryCode> = decode("country codelist", value)?;
    Ok(envelope
        .data
        .into_iter()
        .map(|c| (c.code.trim().to_string(), c.name))
        .collect())
}

/// Parse the region codelist into `3-letter code → 2-letter code` pairs.
pub fn parse_region_pairs(value: serde_json::Value) -> Result<BTreeMap<String, String>> {
    let envelope: CodelistEnvelope<RegionCode> = decode("region codelist", value)?;
    Ok(envelope
        .data
        .into_iter()
        .filter_map(|r| match (r.alpha3, r.alpha2) {
            (Some(alpha3), Some(alpha2)) if !alpha3.is_empty() && !alpha2.is_empty() => {
                Some((alpha3, alpha2))
            }
            _ => None,
        })
        .collect())
}

/// Parse the agency code list into `3-letter code → display name`.
pub fn parse_agency_names(value: serde_json::Value) -> Result<BTreeMap<String, String>> {
    let envelope: AgencyCodelistEnvelope = decode("agency codelist", value)?;
    Ok(envelope
        .data
        .codelists
        .into_iter()
        .flat_map(|list| list.codes)
        .map(|code| (code.id, code.name))
        .collect())
}

/// Raw upstream documents the reconciler is built from.
#[derive(Debug, Clone)]
pub struct ReferenceSources {
    pub iso_currencies_xml: String,
    pub country_codelist: serde_json::Value,
    pub region_codelist: serde_json::Value,
    pub agency_codelist: serde_json::Value,
}

impl ReferenceSources {
    /// Download all four reference documents.
    pub fn fetch<F: Fetch + ?Sized>(fetcher: &mut F, endpoints: &Endpoints) -> Result<Self> {
        tracing::info!("Fetching reference data");
        Ok(Self {
            iso_currencies_xml: fetcher.fetch_xml(&endpoints.iso_currencies)?,
            country_codelist: fetcher.fetch_json(&endpoints.country_codelist)?,
            region_codelist: fetcher.fetch_json(&endpoints.region_codelist)?,
            agency_codelist: fetcher.fetch_json(&endpoints.agency_codelist)?,
        })
    }
}

/// Reconciled reference mappings.
///
/// Built once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Reconciler {
    names_to_currencies: BTreeMap<String, String>,
    code2_to_names: BTreeMap<String, String>,
    code3_to_code2s: BTreeMap<String, String>,
    code3_to_names: BTreeMap<String, String>,
    overrides: OverrideTables,
    /// `code2_to_currencies(true, true)`, used for every join.
    currencies: BTreeMap<String, Option<String>>,
}

impl Reconciler {
    /// Download the reference documents and reconcile them.
    pub fn fetch<F: Fetch + ?Sized>(
        fetcher: &mut F,
        endpoints: &Endpoints,
        overrides: OverrideTables,
    ) -> Result<Self> {
        let sources = ReferenceSources::fetch(fetcher, endpoints)?;
        Self::from_sources(sources, overrides)
    }

    /// Reconcile already-downloaded documents.
    pub fn from_sources(sources: ReferenceSources, overrides: OverrideTables) -> Result<Self> {
        let names_to_currencies = parse_names_to_currencies(&sources.iso_currencies_xml)?;
        let code2_to_names = parse_code2_to_names(sources.country_codelist)?;

        let mut code3_to_code2s = parse_region_pairs(sources.region_codelist)?;
        for record in &overrides.missing {
            if let Some(code3) = record.country_code_3.as_ref().filter(|c| !c.is_empty()) {
                code3_to_code2s.insert(code3.clone(), record.country_code_2.clone());
            }
        }
        code3_to_code2s.insert(SDR_CODE.to_string(), SDR_CODE.to_string());

        let mut code3_to_names = parse_agency_names(sources.agency_codelist)?;
        code3_to_names.insert(SDR_CODE.to_string(), SDR_DISPLAY_NAME.to_string());

        let mut reconciler = Self {
            names_to_currencies,
            code2_to_names,
            code3_to_code2s,
            code3_to_names,
            overrides,
            currencies: BTreeMap::new(),
        };
        reconciler.currencies = reconciler.code2_to_currencies(true, true);

        tracing::debug!(
            names = reconciler.names_to_currencies.len(),
            code2 = reconciler.code2_to_names.len(),
            code3 = reconciler.code3_to_code2s.len(),
            entities = reconciler.code3_to_names.len(),
            "Reconciled reference data"
        );

        Ok(reconciler)
    }

    /// Upper-case country name → currency code, from the ISO list.
    pub fn names_to_currencies(&self) -> &BTreeMap<String, String> {
        &self.names_to_currencies
    }

    /// 2-letter code → country name, from the codelist.
    pub fn code2_to_names(&self) -> &BTreeMap<String, String> {
        &self.code2_to_names
    }

    /// 3-letter code → 2-letter code, including missing-table links and XDR.
    pub fn code3_to_code2s(&self) -> &BTreeMap<String, String> {
        &self.code3_to_code2s
    }

    /// 3-letter code → agency display name, including XDR.
    pub fn code3_to_names(&self) -> &BTreeMap<String, String> {
        &self.code3_to_names
    }

    /// 2-letter code → currency code.
    ///
    /// Codes whose name has no ISO match map to `None`. The eurozone table
    /// is applied before the missing table; within a table later rows win.
    /// `XDR → XDR` is always present.
    pub fn code2_to_currencies(
        &self,
        apply_eurozone: bool,
        apply_missing: bool,
    ) -> BTreeMap<String, Option<String>> {
        let mut currencies: BTreeMap<String, Option<String>> = self
            .code2_to_names
            .iter()
            .map(|(code2, name)| {
                let currency = self.names_to_currencies.get(&normalize_name(name)).cloned();
                (code2.clone(), currency)
            })
            .collect();

        let tables = [
            (apply_eurozone, &self.overrides.eurozone),
            (apply_missing, &self.overrides.missing),
        ];
        for (apply, table) in tables {
            if !apply {
                continue;
            }
            for record in table {
                currencies.insert(record.country_code_2.clone(), record.currency_code.clone());
            }
        }

        currencies.insert(SDR_CODE.to_string(), Some(SDR_CODE.to_string()));
        currencies
    }

    /// Join a 3-letter entity code against all mappings.
    ///
    /// Unknown links leave the corresponding fields empty.
    pub fn resolve(&self, code3: &str) -> CountryReference {
        let code2 = self.code3_to_code2s.get(code3).cloned();
        let currency = code2
            .as_ref()
            .and_then(|c| self.currencies.get(c))
            .cloned()
            .flatten();

        CountryReference {
            code3: code3.to_string(),
            code2,
            display_name: self.code3_to_names.get(code3).cloned(),
            currency,
        }
    }
}

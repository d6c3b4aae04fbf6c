//! Exchange rate retrieval, decoding and flattening into output rows.
//!
//! The agency answers with an index-addressed payload: the series dimension
//! lists map ordinals to entity codes, the observation dimension maps
//! ordinals to period labels, and every series and observation is keyed by
//! those ordinals. The payload is decoded into typed indices at the parse
//! boundary so a malformed response fails with a `Decode` error instead of
//! a silent gap.

use std::collections::BTreeMap;
use std::io;

use serde::Deserialize;

use crate::config::{exchange_rate_url, validate_parameters, Endpoints};
use crate::error::{RatesError, Result};
use crate::http::Fetch;
use crate::period::normalize_date;
use crate::reference::{Reconciler, SDR_CODE};
use crate::types::{
    Base, CountryRates, Entity, ExchangeRateSeries, Frequency, Observation, OutputRow, RateRequest,
    RateSource, Target, AGENCY,
};

/// Entity under which the agency publishes the SDR series.
pub const SDR_SERIES_ENTITY: &str = "USA";

/// Series dimension holding the reporting entity.
const ENTITY_DIMENSION: &str = "COUNTRY";

/// Observation dimension holding the period label.
const PERIOD_DIMENSION: &str = "TIME_PERIOD";

const CONTEXT: &str = "exchange rate";

#[derive(Debug, Deserialize)]
struct DataMessage {
    data: DataPayload,
}

#[derive(Debug, Deserialize)]
struct DataPayload {
    #[serde(rename = "dataSets", default)]
    data_sets: Vec<DataSet>,
    #[serde(default)]
    structures: Vec<Structure>,
}

#[derive(Debug, Deserialize)]
struct DataSet {
    #[serde(default)]
    series: BTreeMap<String, RawSeries>,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    #[serde(default)]
    observations: BTreeMap<String, Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Structure {
    dimensions: Dimensions,
}

#[derive(Debug, Deserialize)]
struct Dimensions {
    #[serde(default)]
    series: Vec<Dimension>,
    #[serde(default)]
    observation: Vec<Dimension>,
}

#[derive(Debug, Deserialize)]
struct Dimension {
    id: String,
    #[serde(default)]
    values: Vec<DimensionValue>,
}

#[derive(Debug, Deserialize)]
struct DimensionValue {
    id: Option<String>,
    value: Option<String>,
}

impl Dimension {
    fn codes(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|v| v.id.clone().or_else(|| v.value.clone()).unwrap_or_default())
            .collect()
    }
}

/// Ordinal → entity code, plus where the entity sits in a series key.
#[derive(Debug)]
struct SeriesIndex {
    position: usize,
    codes: Vec<String>,
}

impl SeriesIndex {
    fn from_dimensions(dimensions: &[Dimension]) -> Result<Self> {
        let position = dimensions
            .iter()
            .position(|d| d.id == ENTITY_DIMENSION)
            .unwrap_or(0);
        let dimension = dimensions
            .get(position)
            .ok_or_else(|| RatesError::decode(CONTEXT, "no series dimensions"))?;

        Ok(Self {
            position,
            codes: dimension.codes(),
        })
    }

    /// Entity code for a `"<ord>:<ord>:..."` series key.
    fn entity(&self, key: &str) -> Result<&str> {
        key.split(':')
            .nth(self.position)
            .and_then(|ordinal| ordinal.parse::<usize>().ok())
            .and_then(|ordinal| self.codes.get(ordinal))
            .map(String::as_str)
            .ok_or_else(|| RatesError::decode(CONTEXT, format!("series key '{key}' out of range")))
    }
}

/// Ordinal → period label.
#[derive(Debug)]
struct ObservationIndex {
    periods: Vec<String>,
}

impl ObservationIndex {
    fn from_dimensions(dimensions: &[Dimension]) -> Result<Self> {
        let dimension = dimensions
            .iter()
            .find(|d| d.id == PERIOD_DIMENSION)
            .or_else(|| dimensions.first())
            .ok_or_else(|| RatesError::decode(CONTEXT, "no observation dimension"))?;

        Ok(Self {
            periods: dimension.codes(),
        })
    }

    fn period(&self, key: &str) -> Result<&str> {
        key.parse::<usize>()
            .ok()
            .and_then(|ordinal| self.periods.get(ordinal))
            .map(String::as_str)
            .ok_or_else(|| {
                RatesError::decode(CONTEXT, format!("observation key '{key}' out of range"))
            })
    }
}

/// Observation value as text. Numbers keep their JSON rendering.
fn observation_value(values: &[serde_json::Value]) -> Option<String> {
    match values.first()? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode an agency data response into one series per entity.
///
/// Entities whose series carries no observations are skipped with a
/// warning. An empty response yields an empty map.
pub fn parse_exchange_rates(
    value: serde_json::Value,
) -> Result<BTreeMap<String, ExchangeRateSeries>> {
    let message: DataMessage =
        serde_json::from_value(value).map_err(|e| RatesError::decode(CONTEXT, e.to_string()))?;

    let mut rates = BTreeMap::new();
    let Some(data_set) = message.data.data_sets.into_iter().next() else {
        return Ok(rates);
    };
    if data_set.series.is_empty() {
        return Ok(rates);
    }

    let structure = message
        .data
        .structures
        .first()
        .ok_or_else(|| RatesError::decode(CONTEXT, "series without structure"))?;
    let series_index = SeriesIndex::from_dimensions(&structure.dimensions.series)?;
    let observation_index = ObservationIndex::from_dimensions(&structure.dimensions.observation)?;

    for (key, raw) in &data_set.series {
        let code3 = series_index.entity(key)?;

        if raw.observations.is_empty() {
            tracing::warn!(entity = code3, "No observations for entity, skipping");
            continue;
        }

        let observations = raw
            .observations
            .iter()
            .map(|(obs_key, values)| {
                Ok(Observation {
                    period: observation_index.period(obs_key)?.to_string(),
                    value: observation_value(values),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        rates.insert(
            code3.to_string(),
            ExchangeRateSeries::new(code3, observations),
        );
    }

    Ok(rates)
}

/// Fetch exchange rate series for one or all entities.
///
/// Fails with `InvalidParameterCombination` before any request when the
/// source does not match the target.
pub fn get_exchange_rates<F: Fetch + ?Sized>(
    fetcher: &mut F,
    endpoints: &Endpoints,
    request: &RateRequest,
    entity: &Entity,
    base: Base,
) -> Result<BTreeMap<String, ExchangeRateSeries>> {
    validate_parameters(request.source, request.target)?;

    let url = exchange_rate_url(
        &endpoints.agency_data,
        request.frequency,
        request.source,
        request.target,
        entity,
        base,
    );
    tracing::info!(entity = entity.as_key(), base = base.as_str(), "Fetching exchange rates");

    let rates = parse_exchange_rates(fetcher.fetch_json(&url)?)?;
    if rates.is_empty() {
        tracing::warn!(entity = entity.as_key(), "No series returned");
    }
    Ok(rates)
}

/// Fetch series and join each against the reference data.
///
/// With an SDR base the join key is forced to `XDR`, since the agency
/// reports that series under the US entity.
pub fn get_rates_and_country_data<F: Fetch + ?Sized>(
    fetcher: &mut F,
    endpoints: &Endpoints,
    reconciler: &Reconciler,
    request: &RateRequest,
    entity: &Entity,
    base: Base,
) -> Result<Vec<CountryRates>> {
    let rates = get_exchange_rates(fetcher, endpoints, request, entity, base)?;

    Ok(rates
        .into_values()
        .map(|mut series| {
            if base == Base::Sdr {
                series.code3 = SDR_CODE.to_string();
            }
            CountryRates {
                country: reconciler.resolve(&series.code3),
                series,
            }
        })
        .collect())
}

/// Request for the SDR series matching the period convention of `request`.
fn sdr_request(request: &RateRequest) -> RateRequest {
    let source = if request.source.is_end_of_period() {
        RateSource::Ende
    } else {
        RateSource::Enda
    };
    RateRequest::new(request.frequency, source, Target::Usd)
}

/// Destination for output rows.
pub trait RowSink {
    fn write_row(&mut self, row: &OutputRow) -> Result<()>;
}

impl<W: io::Write> RowSink for csv::Writer<W> {
    fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        self.serialize(row)?;
        Ok(())
    }
}

impl RowSink for Vec<OutputRow> {
    fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

/// Flatten one country's series into rows.
///
/// Observations without a value are dropped. Period labels that cannot be
/// normalized are skipped with a warning. Unresolved reference fields are
/// left blank.
pub fn rows_for(rates: &CountryRates, frequency: Frequency) -> Vec<OutputRow> {
    let country = &rates.country;

    rates
        .series
        .observations
        .iter()
        .filter_map(|obs| {
            let value = obs.value.as_ref()?;
            let date = match normalize_date(&obs.period) {
                Ok(date) => date,
                Err(e) => {
                    tracing::warn!(
                        entity = %rates.series.code3,
                        error = %e,
                        "Skipping observation"
                    );
                    return None;
                }
            };

            Some(OutputRow {
                date,
                rate: value.clone(),
                currency: country.currency.clone().unwrap_or_default(),
                frequency: frequency.as_str().to_string(),
                source: AGENCY.to_string(),
                country_code: country.code2.clone().unwrap_or_default(),
                country: country.display_name.clone().unwrap_or_default(),
            })
        })
        .collect()
}

/// Fetch, join and write the rows for one or all entities.
///
/// For all entities the SDR series is appended and the combined list is
/// sorted by display name. Returns the number of rows written.
pub fn write_data_for_country<F: Fetch + ?Sized, S: RowSink + ?Sized>(
    fetcher: &mut F,
    endpoints: &Endpoints,
    reconciler: &Reconciler,
    request: &RateRequest,
    entity: &Entity,
    sink: &mut S,
) -> Result<usize> {
    validate_parameters(request.source, request.target)?;

    let mut bundles = get_rates_and_country_data(
        fetcher,
        endpoints,
        reconciler,
        request,
        entity,
        Base::Domestic,
    )?;

    if *entity == Entity::All {
        bundles.extend(get_rates_and_country_data(
            fetcher,
            endpoints,
            reconciler,
            &sdr_request(request),
            &Entity::Code(SDR_SERIES_ENTITY.to_string()),
            Base::Sdr,
        )?);
        bundles.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
    }

    let mut written = 0;
    for bundle in &bundles {
        for row in rows_for(bundle, request.frequency) {
            sink.write_row(&row)?;
            written += 1;
        }
    }

    tracing::info!(entities = bundles.len(), rows = written, "Wrote exchange rates");
    Ok(written)
}

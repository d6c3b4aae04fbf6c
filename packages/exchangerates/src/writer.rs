//! CSV and JSON output files.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::config::{
    output_filename, validate_parameters, Endpoints, CURRENCIES_FILE, CURRENCIES_PRE_EUROZONE_FILE,
};
use crate::error::Result;
use crate::http::Fetch;
use crate::rates::write_data_for_country;
use crate::reference::Reconciler;
use crate::types::{Entity, RateRequest};

/// CSV header, in column order.
pub const FIELDNAMES: [&str; 7] = [
    "Date",
    "Rate",
    "Currency",
    "Frequency",
    "Source",
    "Country code",
    "Country",
];

/// Result of writing the exchange rate CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows: usize,
}

/// Write the exchange rate CSV for `request` into `output_dir`.
///
/// The header is always written, even when no rows follow. Any existing
/// file with the same name is overwritten. Nothing is created when the
/// source/target combination is invalid.
pub fn write_exchange_rates<F: Fetch + ?Sized>(
    fetcher: &mut F,
    endpoints: &Endpoints,
    reconciler: &Reconciler,
    request: &RateRequest,
    entity: &Entity,
    output_dir: &Path,
) -> Result<WriteSummary> {
    validate_parameters(request.source, request.target)?;
    let path = output_dir.join(output_filename(request, entity));

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(File::create(&path)?));
    writer.write_record(FIELDNAMES)?;

    let rows = write_data_for_country(
        fetcher,
        endpoints,
        reconciler,
        request,
        entity,
        &mut writer,
    )?;
    writer.flush()?;

    tracing::info!(path = %path.display(), rows, "Wrote exchange rate CSV");
    Ok(WriteSummary { path, rows })
}

/// Write both currency mapping snapshots into `output_dir`.
///
/// Returns the paths of `currencies_pre_eurozone.json` and
/// `currencies.json`, in that order.
pub fn write_countries_currencies(
    reconciler: &Reconciler,
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    let pre_eurozone = output_dir.join(CURRENCIES_PRE_EUROZONE_FILE);
    write_json(&pre_eurozone, &reconciler.code2_to_currencies(true, true))?;

    let current = output_dir.join(CURRENCIES_FILE);
    write_json(&current, &reconciler.code2_to_currencies(false, true))?;

    Ok((pre_eurozone, current))
}

fn write_json(path: &Path, currencies: &BTreeMap<String, Option<String>>) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut file, currencies)?;
    file.flush()?;
    tracing::debug!(path = %path.display(), entries = currencies.len(), "Wrote currency snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::exchange_rate_url;
    use crate::error::RatesError;
    use crate::http::testing::FixtureFetcher;
    use crate::reference::{OverrideTables, ReferenceSources};
    use crate::types::{Base, Frequency, RateSource, Target};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn reconciler() -> Reconciler {
        let sources = ReferenceSources {
            iso_currencies_xml: "<ISO_4217><CcyTbl>\
                <CcyNtry><CtryNm>GERMANY</CtryNm><CcyNm>Euro</CcyNm><Ccy>EUR</Ccy></CcyNtry>\
                </CcyTbl></ISO_4217>"
                .to_string(),
            country_codelist: json!({"data": [
                {"code": "DE", "name": "Germany"},
                {"code": "TW", "name": "Taiwan"}
            ]}),
            region_codelist: json!({"data": [
                {"iso-alpha-3-code": "DEU", "iso-alpha-2-code": "DE"}
            ]}),
            agency_codelist: json!({"data": {"codelists": [{"codes": [
                {"id": "DEU", "name": "Germany"}
            ]}]}}),
        };
        let overrides = OverrideTables::from_readers(
            "country_name,country_code_2,country_code_3,currency_code\nGermany,DE,DEU,DEM\n"
                .as_bytes(),
            "country_name,country_code_2,country_code_3,currency_code\n".as_bytes(),
        )
        .unwrap();
        Reconciler::from_sources(sources, overrides).unwrap()
    }

    #[test]
    fn test_write_countries_currencies() {
        let dir = tempdir().unwrap();
        let (pre_eurozone, current) =
            write_countries_currencies(&reconciler(), dir.path()).unwrap();

        assert_eq!(pre_eurozone.file_name().unwrap(), "currencies_pre_eurozone.json");
        assert_eq!(
            std::fs::read_to_string(&pre_eurozone).unwrap(),
            r#"{"DE":"DEM","TW":null,"XDR":"XDR"}"#
        );
        assert_eq!(
            std::fs::read_to_string(&current).unwrap(),
            r#"{"DE":"EUR","TW":null,"XDR":"XDR"}"#
        );
    }

    #[test]
    fn test_write_exchange_rates_single_entity() {
        let dir = tempdir().unwrap();
        let endpoints = Endpoints::with_root("http://fixtures");
        let request = RateRequest::new(Frequency::Annual, RateSource::Enda, Target::Usd);
        let entity = Entity::Code("DEU".to_string());

        let url = exchange_rate_url(
            &endpoints.agency_data,
            request.frequency,
            request.source,
            request.target,
            &entity,
            Base::Domestic,
        );
        let body = json!({"data": {
            "dataSets": [{"series": {"0": {"observations": {"0": ["1.94"], "1": ["0.94"]}}}}],
            "structures": [{"dimensions": {
                "series": [{"id": "COUNTRY", "values": [{"id": "DEU"}]}],
                "observation": [{
                    "id": "TIME_PERIOD",
                    "values": [{"value": "1998"}, {"value": "1999"}]
                }]
            }}]
        }});
        let mut fetcher = FixtureFetcher::default().with(url, body.to_string());

        let summary = write_exchange_rates(
            &mut fetcher,
            &endpoints,
            &reconciler(),
            &request,
            &entity,
            dir.path(),
        )
        .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(
            summary.path,
            dir.path().join("imf_exchangerates_A_ENDA_USD_DEU.csv")
        );
        assert_eq!(
            std::fs::read_to_string(&summary.path).unwrap(),
            "Date,Rate,Currency,Frequency,Source,Country code,Country\n\
             1998-12-31,1.94,DEM,A,IMF,DE,Germany\n\
             1999-12-31,0.94,DEM,A,IMF,DE,Germany\n"
        );
    }

    #[test]
    fn test_write_exchange_rates_invalid_combination_creates_nothing() {
        let dir = tempdir().unwrap();
        let endpoints = Endpoints::with_root("http://fixtures");
        let request = RateRequest::new(Frequency::Monthly, RateSource::Ense, Target::Usd);
        let mut fetcher = FixtureFetcher::default();

        let err = write_exchange_rates(
            &mut fetcher,
            &endpoints,
            &reconciler(),
            &request,
            &Entity::All,
            dir.path(),
        )
        .unwrap_err();

        assert!(matches!(err, RatesError::InvalidParameterCombination { .. }));
        assert!(fetcher.requests.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_exchange_rates_header_only_when_empty() {
        let dir = tempdir().unwrap();
        let endpoints = Endpoints::with_root("http://fixtures");
        let request = RateRequest::new(Frequency::Monthly, RateSource::Ende, Target::Usd);
        let entity = Entity::Code("ATA".to_string());

        let url = exchange_rate_url(
            &endpoints.agency_data,
            request.frequency,
            request.source,
            request.target,
            &entity,
            Base::Domestic,
        );
        let mut fetcher =
            FixtureFetcher::default().with(url, json!({"data": {"dataSets": []}}).to_string());

        let summary = write_exchange_rates(
            &mut fetcher,
            &endpoints,
            &reconciler(),
            &request,
            &entity,
            dir.path(),
        )
        .unwrap();

        assert_eq!(summary.rows, 0);
        assert_eq!(
            std::fs::read_to_string(&summary.path).unwrap(),
            "Date,Rate,Currency,Frequency,Source,Country code,Country\n"
        );
    }
}

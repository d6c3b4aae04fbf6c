//! Configuration constants, endpoint settings and parameter validation.

use std::time::Duration;

use crate::error::{RatesError, Result};
use crate::types::{Base, Denomination, Entity, Frequency, RateRequest, RateSource, Target};

/// ISO 4217 currency list (XML).
pub const ISO_CURRENCIES_URL: &str =
    "https://www.six-group.com/dam/download/financial-information/data-center/iso-currrency/lists/list-one.xml";

/// Country codelist with 2-letter codes and names (JSON).
pub const COUNTRY_CODELIST_URL: &str = "https://codelists.codeforiati.org/api/json/en/Country.json";

/// Region codelist with ISO alpha-3 to alpha-2 pairs (JSON).
pub const REGION_CODELIST_URL: &str =
    "https://codelists.codeforiati.org/api/json/en/RegionM49.json";

/// Agency code list of reporting entities (JSON).
pub const AGENCY_CODELIST_URL: &str =
    "https://api.imf.org/external/sdmx/3.0/structure/codelist/IMF/CL_COUNTRY/%2B";

/// Agency exchange rate dataflow (JSON). The series key is appended.
pub const AGENCY_DATA_URL: &str =
    "https://api.imf.org/external/sdmx/3.0/data/dataflow/IMF.STA/ER/%2B";

/// Query string requesting observations indexed by time period.
const AGENCY_DATA_QUERY: &str = "dimensionAtObservation=TIME_PERIOD&attributes=dsd&measures=all";

/// HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Default frequency when none is given.
pub const DEFAULT_FREQUENCY: Frequency = Frequency::Monthly;

/// Default series variant when none is given.
pub const DEFAULT_SOURCE: RateSource = RateSource::Ende;

/// Default conversion target when none is given.
pub const DEFAULT_TARGET: Target = Target::Usd;

/// Stem of the exchange rate CSV file name.
pub const OUTPUT_STEM: &str = "imf_exchangerates";

/// Snapshot of the currency mapping without eurozone overrides.
pub const CURRENCIES_FILE: &str = "currencies.json";

/// Snapshot of the currency mapping with eurozone overrides.
pub const CURRENCIES_PRE_EUROZONE_FILE: &str = "currencies_pre_eurozone.json";

/// Default directory holding `eurozone.csv` and `missing.csv`.
pub const DEFAULT_OVERRIDES_DIR: &str = "source";

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Initial delay before every request.
///
/// The agency allows 10 requests per 5 seconds.
pub const BASE_DELAY_MS: u64 = 250;

/// Added to the delay each time a response fails to decode.
pub const DELAY_STEP_MS: u64 = 500;

/// Once the delay reaches this ceiling the fetch gives up.
pub const DELAY_CEILING_SECS: u64 = 60;

/// Backoff parameters for the rate-limited fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay slept before the first attempt of the first request.
    pub base_delay: Duration,
    /// Increment applied after every failed attempt.
    pub step: Duration,
    /// Delay at which the fetcher stops retrying.
    pub ceiling: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            step: Duration::from_millis(DELAY_STEP_MS),
            ceiling: Duration::from_secs(DELAY_CEILING_SECS),
        }
    }
}

/// Upstream endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub iso_currencies: String,
    pub country_codelist: String,
    pub region_codelist: String,
    pub agency_codelist: String,
    pub agency_data: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            iso_currencies: ISO_CURRENCIES_URL.to_string(),
            country_codelist: COUNTRY_CODELIST_URL.to_string(),
            region_codelist: REGION_CODELIST_URL.to_string(),
            agency_codelist: AGENCY_CODELIST_URL.to_string(),
            agency_data: AGENCY_DATA_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at a mirror rooted at `root`.
    ///
    /// # Examples
    /// ```
    /// use imf_exchangerates::config::Endpoints;
    ///
    /// let endpoints = Endpoints::with_root("http://localhost:8080/");
    /// assert_eq!(endpoints.iso_currencies, "http://localhost:8080/iso/list-one.xml");
    /// assert_eq!(endpoints.agency_data, "http://localhost:8080/data/ER");
    /// ```
    pub fn with_root(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            iso_currencies: format!("{root}/iso/list-one.xml"),
            country_codelist: format!("{root}/codelists/Country.json"),
            region_codelist: format!("{root}/codelists/Region.json"),
            agency_codelist: format!("{root}/codelist/CL_COUNTRY"),
            agency_data: format!("{root}/data/ER"),
        }
    }
}

/// Reject source/target pairs that do not describe the same series family.
///
/// A USD target needs a domestic-currency series (`ENDE`, `ENDA`) and an
/// XDR target needs an SDR-relative one (`ENSE`, `ENSA`).
///
/// # Examples
/// ```
/// use imf_exchangerates::config::validate_parameters;
/// use imf_exchangerates::types::{RateSource, Target};
///
/// assert!(validate_parameters(RateSource::Ende, Target::Usd).is_ok());
/// assert!(validate_parameters(RateSource::Ense, Target::Usd).is_err());
/// ```
pub fn validate_parameters(source: RateSource, target: Target) -> Result<()> {
    let expected = match target {
        Target::Usd => Denomination::Domestic,
        Target::Xdr => Denomination::Sdr,
    };

    if source.denomination() == expected {
        Ok(())
    } else {
        Err(RatesError::InvalidParameterCombination {
            rate_source: source.to_string(),
            target: target.to_string(),
        })
    }
}

/// Build the data URL for one series key.
///
/// Key layout is `<entity>.<base>_<target>.<transformation>.<frequency>`.
///
/// # Examples
/// ```
/// use imf_exchangerates::config::exchange_rate_url;
/// use imf_exchangerates::types::{Base, Entity, Frequency, RateSource, Target};
///
/// let url = exchange_rate_url(
///     "https://example.org/data/ER",
///     Frequency::Monthly,
///     RateSource::Ende,
///     Target::Usd,
///     &Entity::Code("G163".to_string()),
///     Base::Domestic,
/// );
/// assert_eq!(
///     url,
///     "https://example.org/data/ER/G163.XDC_USD.EOP_RT.M?dimensionAtObservation=TIME_PERIOD&attributes=dsd&measures=all"
/// );
/// ```
pub fn exchange_rate_url(
    data_url: &str,
    frequency: Frequency,
    source: RateSource,
    target: Target,
    entity: &Entity,
    base: Base,
) -> String {
    format!(
        "{data_url}/{entity}.{base}_{target}.{transformation}.{frequency}?{AGENCY_DATA_QUERY}",
        entity = entity.as_key(),
        base = base.as_str(),
        target = target.as_str(),
        transformation = source.transformation(),
        frequency = frequency.as_str(),
    )
}

/// File name of the exchange rate CSV.
///
/// The bare name is used for the default parameters; any other combination
/// gets a `_<freq>_<source>_<target>` suffix, and a single entity adds its
/// code, so exploratory runs never overwrite the main dataset.
///
/// # Examples
/// ```
/// use imf_exchangerates::config::output_filename;
/// use imf_exchangerates::types::{Entity, Frequency, RateRequest, RateSource, Target};
///
/// let default = RateRequest::new(Frequency::Monthly, RateSource::Ende, Target::Usd);
/// assert_eq!(output_filename(&default, &Entity::All), "imf_exchangerates.csv");
///
/// let other = RateRequest::new(Frequency::Annual, RateSource::Ense, Target::Xdr);
/// assert_eq!(output_filename(&other, &Entity::All), "imf_exchangerates_A_ENSE_XDR.csv");
/// ```
pub fn output_filename(request: &RateRequest, entity: &Entity) -> String {
    let mut name = OUTPUT_STEM.to_string();

    let is_default = request.frequency == DEFAULT_FREQUENCY
        && request.source == DEFAULT_SOURCE
        && request.target == DEFAULT_TARGET;
    if !is_default {
        name.push_str(&format!(
            "_{}_{}_{}",
            request.frequency, request.source, request.target
        ));
    }

    if let Entity::Code(code) = entity {
        name.push('_');
        name.push_str(code);
    }

    name.push_str(".csv");
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_parameters_valid() {
        assert!(validate_parameters(RateSource::Ende, Target::Usd).is_ok());
        assert!(validate_parameters(RateSource::Enda, Target::Usd).is_ok());
        assert!(validate_parameters(RateSource::Ense, Target::Xdr).is_ok());
        assert!(validate_parameters(RateSource::Ensa, Target::Xdr).is_ok());
    }

    #[test]
    fn test_validate_parameters_invalid() {
        let err = validate_parameters(RateSource::Ense, Target::Usd).unwrap_err();
        assert!(matches!(
            err,
            RatesError::InvalidParameterCombination { ref rate_source, ref target }
                if rate_source == "ENSE" && target == "USD"
        ));

        assert!(validate_parameters(RateSource::Ensa, Target::Usd).is_err());
        assert!(validate_parameters(RateSource::Ende, Target::Xdr).is_err());
        assert!(validate_parameters(RateSource::Enda, Target::Xdr).is_err());
    }

    #[test]
    fn test_exchange_rate_url_wildcard() {
        let url = exchange_rate_url(
            AGENCY_DATA_URL,
            Frequency::Quarterly,
            RateSource::Ensa,
            Target::Xdr,
            &Entity::All,
            Base::Domestic,
        );
        assert_eq!(
            url,
            "https://api.imf.org/external/sdmx/3.0/data/dataflow/IMF.STA/ER/%2B/*.XDC_XDR.PA_RT.Q?dimensionAtObservation=TIME_PERIOD&attributes=dsd&measures=all"
        );
    }

    #[test]
    fn test_exchange_rate_url_sdr_base() {
        let url = exchange_rate_url(
            "http://mirror/data/ER",
            Frequency::Monthly,
            RateSource::Ende,
            Target::Usd,
            &Entity::Code("USA".to_string()),
            Base::Sdr,
        );
        assert!(url.starts_with("http://mirror/data/ER/USA.XDR_USD.EOP_RT.M?"));
    }

    #[test]
    fn test_output_filename_single_entity() {
        let request = RateRequest::new(Frequency::Monthly, RateSource::Ende, Target::Usd);
        assert_eq!(
            output_filename(&request, &Entity::Code("G163".to_string())),
            "imf_exchangerates_G163.csv"
        );
    }

    #[test]
    fn test_output_filename_frequency_only_differs() {
        let request = RateRequest::new(Frequency::Quarterly, RateSource::Ende, Target::Usd);
        assert_eq!(
            output_filename(&request, &Entity::All),
            "imf_exchangerates_Q_ENDE_USD.csv"
        );
    }

    #[test]
    fn test_backoff_default() {
        let backoff = Backoff::default();
        assert_eq!(backoff.base_delay, Duration::from_millis(250));
        assert_eq!(backoff.step, Duration::from_millis(500));
        assert_eq!(backoff.ceiling, Duration::from_secs(60));
    }
}

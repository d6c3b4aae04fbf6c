//! Core data types for exchange rate series and their reference data.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::RatesError;

/// Agency label written into the `Source` column of every row.
pub const AGENCY: &str = "IMF";

/// Sampling frequency of an exchange rate series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Frequency {
    /// Annual observations ("YYYY").
    #[value(name = "A", alias = "annual")]
    Annual,

    /// Quarterly observations ("YYYY-Qn").
    #[value(name = "Q", alias = "quarterly")]
    Quarterly,

    /// Monthly observations ("YYYY-Mnn").
    #[value(name = "M", alias = "monthly")]
    Monthly,
}

impl Frequency {
    /// Agency code for this frequency.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "A",
            Self::Quarterly => "Q",
            Self::Monthly => "M",
        }
    }
}

/// Published series variant.
///
/// The first two letters are always `EN`; the third says whether the rate
/// is expressed against the target (`D`, domestic currency per target) or
/// against SDR (`S`); the fourth picks end of period (`E`) or period
/// average (`A`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum RateSource {
    /// National currency per SDR, end of period.
    #[value(name = "ENSE")]
    Ense,

    /// National currency per SDR, period average.
    #[value(name = "ENSA")]
    Ensa,

    /// Domestic currency per target, end of period.
    #[value(name = "ENDE")]
    Ende,

    /// Domestic currency per target, period average.
    #[value(name = "ENDA")]
    Enda,
}

/// What a series is denominated against, taken from the second-to-last
/// character of the source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denomination {
    /// `D`: domestic currency per target currency.
    Domestic,
    /// `S`: national currency per SDR.
    Sdr,
}

impl RateSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ense => "ENSE",
            Self::Ensa => "ENSA",
            Self::Ende => "ENDE",
            Self::Enda => "ENDA",
        }
    }

    /// True when the code ends in `E`.
    #[must_use]
    pub fn is_end_of_period(&self) -> bool {
        self.as_str().ends_with('E')
    }

    #[must_use]
    pub fn denomination(&self) -> Denomination {
        if self.as_str().chars().rev().nth(1) == Some('S') {
            Denomination::Sdr
        } else {
            Denomination::Domestic
        }
    }

    /// Agency transformation code selected by the final character.
    #[must_use]
    pub fn transformation(&self) -> &'static str {
        if self.is_end_of_period() {
            "EOP_RT"
        } else {
            "PA_RT"
        }
    }
}

/// Conversion target currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Target {
    /// Special Drawing Rights.
    #[value(name = "XDR", alias = "SDR")]
    Xdr,

    /// US dollar.
    #[value(name = "USD")]
    Usd,
}

impl Target {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xdr => "XDR",
            Self::Usd => "USD",
        }
    }
}

/// Base currency of the requested indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Base {
    /// The reporting entity's own currency (`XDC`).
    #[default]
    Domestic,

    /// Special Drawing Rights (`XDR`), only published under the US entity.
    Sdr,
}

impl Base {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domestic => "XDC",
            Self::Sdr => "XDR",
        }
    }
}

/// Which reporting entities to request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Entity {
    /// Every entity the agency publishes (`*`).
    #[default]
    All,

    /// One entity by its 3-letter (or agency-specific) code.
    Code(String),
}

impl Entity {
    /// Key component used in the data URL.
    #[must_use]
    pub fn as_key(&self) -> &str {
        match self {
            Self::All => "*",
            Self::Code(code) => code,
        }
    }
}

macro_rules! impl_code_traits {
    ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = RatesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| RatesError::UnknownValue {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_code_traits!(
    Frequency,
    "frequency",
    [Frequency::Annual, Frequency::Quarterly, Frequency::Monthly]
);
impl_code_traits!(
    RateSource,
    "source",
    [
        RateSource::Ense,
        RateSource::Ensa,
        RateSource::Ende,
        RateSource::Enda
    ]
);
impl_code_traits!(Target, "target", [Target::Xdr, Target::Usd]);

impl FromStr for Entity {
    type Err = RatesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        match code {
            "" => Err(RatesError::UnknownValue {
                kind: "entity",
                value: s.to_string(),
            }),
            "*" => Ok(Self::All),
            c if c.eq_ignore_ascii_case("all") => Ok(Self::All),
            c => Ok(Self::Code(c.to_uppercase())),
        }
    }
}

/// Frequency/source/target triple that identifies one output dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateRequest {
    pub frequency: Frequency,
    pub source: RateSource,
    pub target: Target,
}

impl RateRequest {
    pub fn new(frequency: Frequency, source: RateSource, target: Target) -> Self {
        Self {
            frequency,
            source,
            target,
        }
    }
}

/// One raw observation as published: the period label and the value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub period: String,
    pub value: Option<String>,
}

/// Observations for one reporting entity, ascending by period label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRateSeries {
    pub code3: String,
    pub observations: Vec<Observation>,
}

impl ExchangeRateSeries {
    /// Create a series, sorting observations by their raw period label.
    ///
    /// Labels are fixed width per frequency, so lexical order is
    /// chronological order.
    pub fn new(code3: impl Into<String>, mut observations: Vec<Observation>) -> Self {
        observations.sort_by(|a, b| a.period.cmp(&b.period));
        Self {
            code3: code3.into(),
            observations,
        }
    }
}

/// Canonical identity of one country after reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryReference {
    pub code3: String,
    pub code2: Option<String>,
    pub display_name: Option<String>,
    pub currency: Option<String>,
}

/// A series joined with the reference data of its entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryRates {
    pub country: CountryReference,
    pub series: ExchangeRateSeries,
}

impl CountryRates {
    /// Sort key used for deterministic output ordering.
    #[must_use]
    pub fn sort_key(&self) -> &str {
        self.country.display_name.as_deref().unwrap_or_default()
    }
}

/// Flattened CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Rate")]
    pub rate: String,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Frequency")]
    pub frequency: String,
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Country code")]
    pub country_code: String,
    #[serde(rename = "Country")]
    pub country: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_source_rules() {
        assert!(RateSource::Ense.is_end_of_period());
        assert!(RateSource::Ende.is_end_of_period());
        assert!(!RateSource::Ensa.is_end_of_period());
        assert!(!RateSource::Enda.is_end_of_period());

        assert_eq!(RateSource::Ense.denomination(), Denomination::Sdr);
        assert_eq!(RateSource::Ensa.denomination(), Denomination::Sdr);
        assert_eq!(RateSource::Ende.denomination(), Denomination::Domestic);
        assert_eq!(RateSource::Enda.denomination(), Denomination::Domestic);
    }

    #[test]
    fn test_transformation() {
        assert_eq!(RateSource::Ende.transformation(), "EOP_RT");
        assert_eq!(RateSource::Enda.transformation(), "PA_RT");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("M".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("q".parse::<Frequency>().unwrap(), Frequency::Quarterly);
        assert_eq!("ende".parse::<RateSource>().unwrap(), RateSource::Ende);
        assert_eq!("XDR".parse::<Target>().unwrap(), Target::Xdr);
        assert!("W".parse::<Frequency>().is_err());
        assert!("ENXX".parse::<RateSource>().is_err());
    }

    #[test]
    fn test_entity_from_str() {
        assert_eq!("*".parse::<Entity>().unwrap(), Entity::All);
        assert_eq!("all".parse::<Entity>().unwrap(), Entity::All);
        assert_eq!(
            "g163".parse::<Entity>().unwrap(),
            Entity::Code("G163".to_string())
        );
        assert!("".parse::<Entity>().is_err());
        assert_eq!(Entity::All.as_key(), "*");
    }

    #[test]
    fn test_series_sorted_by_period() {
        let series = ExchangeRateSeries::new(
            "USA",
            vec![
                Observation {
                    period: "2000-M02".to_string(),
                    value: Some("1".to_string()),
                },
                Observation {
                    period: "2000-M01".to_string(),
                    value: None,
                },
            ],
        );
        assert_eq!(series.observations[0].period, "2000-M01");
        assert_eq!(series.observations[1].period, "2000-M02");
    }
}
